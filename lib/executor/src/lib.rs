pub mod context;
pub mod execution;
pub mod executors;
pub mod projection;
pub mod response;
pub mod utils;
pub mod variables;

#[cfg(test)]
mod tests;

pub use execution::{
    options::{ErrorFilter, ExecutionOptions},
    plan::{execute_query_plan, QueryPlanExecution},
    subscription::{execute_subscription, SubscriptionExecution},
};
pub use executors::map::SubgraphExecutorMap;
pub use response::response::ExecutionResponse;

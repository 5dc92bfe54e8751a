pub mod ast;
pub mod planner;
pub mod schema;
pub mod utils;

#[cfg(test)]
mod tests;

pub use planner::{Planner, PlannerOptions};
pub use schema::FusedSchema;

mod execution;
mod subgraph_errors;
mod subscriptions;

pub mod arguments;
pub mod cache;
pub mod config;
pub mod contracts;
pub mod errors; // Structured error handling, one enum per layer
pub mod logger;
pub mod rewards;
pub mod rpc;
pub mod subgraph;
pub mod utils;

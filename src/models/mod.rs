pub mod config;
pub mod connections;
pub mod plan;
pub mod results;
pub mod schema;

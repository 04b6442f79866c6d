//! From AI output to SQL: parse the JSON plan, compile it, and keep the last
//! read-only plan around for paging.

pub mod compiler;
pub mod context;
pub mod coordinator;
pub mod executor;
pub mod parser;

pub use compiler::{compile, compile_count};
pub use context::format_schema_context;
pub use coordinator::{Dispatch, PageCommand, PlanCoordinator, PreparedQuery};
pub use parser::parse_plan;

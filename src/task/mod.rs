pub mod registry;
pub mod report;
pub mod types;

#[cfg(test)]
mod tests;

pub use registry::*;
pub use report::{build_summary, format_task_list, verdict};
pub use types::*;

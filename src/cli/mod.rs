//! CLI command handling

pub mod check_config;
pub mod dispatch;
pub mod output;

pub use check_config::*;
pub use dispatch::*;
pub use output::*;

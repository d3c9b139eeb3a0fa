//! Command implementations.

pub mod config;
pub mod import;
pub mod run;

pub use self::config::execute_config;
pub use self::import::execute_import;
pub use self::run::execute_run;

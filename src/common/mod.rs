pub mod config;
pub mod errors;
pub mod format;
pub mod logging;
pub mod paths;
pub mod process;
pub mod safety;

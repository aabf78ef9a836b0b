pub mod build_info;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod output;
pub mod process;
pub mod scanner;
pub mod store;

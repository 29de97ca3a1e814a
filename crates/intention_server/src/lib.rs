//! The `intention` application: HTTP API, configuration, logging and the
//! command-line workbench.
pub mod analyze;
pub mod cli;
pub mod config;
pub mod http;
pub mod logging;
pub mod server;
pub mod workbench;

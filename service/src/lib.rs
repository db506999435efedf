//! Process-level infrastructure shared by every other crate: configuration parsed from
//! the command line and environment, and logger initialization.

pub mod config;
pub mod logging;

//! On-board telecommand script subsystem
//!
//! Scripts uplinked from the ground are parsed against a registry of command
//! prototypes; each script runs one clone of the command it names.

pub mod audit;
pub mod command;
pub mod config;
pub mod daemon;
pub mod parser;
pub mod toolkit;
pub mod transport;

//! Telecommand model for the flight computer
//!
//! This module handles:
//! - The executable command and its status lifecycle
//! - The registry of named command prototypes
//! - The built-in command behaviors

pub mod handlers;
mod registry;
pub(crate) mod telecommand;

pub use registry::CommandRegistry;
pub use telecommand::{
    Argument, Behavior, Command, CommandResult, CommandType, HandlerContext, UnboundBehavior,
};

//! Built-in command behaviors

mod count;
mod echo;
mod status;

pub use count::CountBehavior;
pub use echo::EchoBehavior;
pub use status::StatusBehavior;

use super::{Command, CommandRegistry, CommandType};
use crate::toolkit::Toolkit;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;
use tracing::info;

pub const COUNT: CommandType = CommandType(1);
pub const ECHO: CommandType = CommandType(2);
pub const STATUS: CommandType = CommandType(3);

/// Register the built-in prototypes
///
/// Safe to call more than once: names already present keep their first
/// prototype. Returns the number of names newly registered.
pub fn register_builtin_commands(
    registry: &mut CommandRegistry,
    toolkit: &Arc<Toolkit>,
    counter: Arc<AtomicU32>,
) -> usize {
    let prototypes = [
        ("count", Command::new(COUNT, CountBehavior::new(counter), toolkit.clone())),
        ("echo", Command::new(ECHO, EchoBehavior, toolkit.clone())),
        ("status", Command::new(STATUS, StatusBehavior, toolkit.clone())),
    ];

    let registered = prototypes
        .into_iter()
        .map(|(name, prototype)| registry.register(name, prototype))
        .filter(|added| *added)
        .count();

    info!("Registered {} built-in commands ({} total)", registered, registry.len());
    registered
}

//! Name-keyed store of command prototypes
//!
//! The registry is built mutably while the flight software starts, then
//! frozen behind an `Arc` and handed to the parser. Nothing registers once
//! the daemon is running; dropping the last `Arc` tears it down.

use super::telecommand::Command;
use std::collections::HashMap;
use telecommand_shared::limits::REGISTRY_KEY_LENGTH;
use tracing::{debug, warn};

/// Registry keys are the first 20 bytes of a name
fn registry_key(name: &[u8]) -> &[u8] {
    &name[..name.len().min(REGISTRY_KEY_LENGTH)]
}

#[derive(Default)]
pub struct CommandRegistry {
    prototypes: HashMap<Box<[u8]>, Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `prototype` under `name`
    ///
    /// Names are truncated to 20 bytes. The first registration of a name
    /// wins: a later one is refused and returns false. Prototypes whose
    /// behavior cannot be cloned are refused as well, since no invocation of
    /// them could ever run.
    pub fn register(&mut self, name: impl AsRef<[u8]>, prototype: Command) -> bool {
        let key = registry_key(name.as_ref());
        let shown = String::from_utf8_lossy(key);

        if self.prototypes.contains_key(key) {
            warn!("Command \"{}\" already registered, keeping the first prototype", shown);
            return false;
        }

        match prototype.clone_command() {
            Some(check) => check.destroy(),
            None => {
                warn!("Command \"{}\" cannot be cloned, not registering it", shown);
                return false;
            }
        }

        debug!("Registered command \"{}\" (type {})", shown, prototype.kind());
        self.prototypes.insert(key.into(), prototype);
        true
    }

    /// Look up the prototype registered under `name`
    pub fn resolve(&self, name: impl AsRef<[u8]>) -> Option<&Command> {
        self.prototypes.get(registry_key(name.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .prototypes
            .keys()
            .map(|key| String::from_utf8_lossy(key).into_owned())
            .collect();
        names.sort();
        names
    }
}

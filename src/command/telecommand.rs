//! Executable telecommands and the behaviors bound to them

use crate::toolkit::Toolkit;
use async_trait::async_trait;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use telecommand_shared::limits::MAX_ARGUMENT_LENGTH;
use telecommand_shared::state_machine::{StatusEvent, StatusMachine, TransitionResult};
use telecommand_shared::{CommandStatus, Failure};
use tracing::{debug, trace, warn};

/// Identifies the concrete behavior of a command in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CommandType(pub u16);

impl CommandType {
    /// Reserved tag; commands of this type are never audited
    pub const DEFAULT: CommandType = CommandType(0);
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of running a command behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Behavior finished normally
    Completed { message: String },
    /// Behavior ended in a terminal failure
    Failed { failure: Failure, message: String },
}

impl CommandResult {
    pub fn completed(message: impl Into<String>) -> Self {
        CommandResult::Completed {
            message: message.into(),
        }
    }

    pub fn failed(failure: Failure, message: impl Into<String>) -> Self {
        CommandResult::Failed {
            failure,
            message: message.into(),
        }
    }
}

/// Context passed to command behaviors
pub struct HandlerContext<'a> {
    pub id: u32,
    pub kind: CommandType,
    pub argument: &'a [u8],
    pub toolkit: &'a Toolkit,
}

impl HandlerContext<'_> {
    pub fn argument_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.argument)
    }
}

/// What a command does when executed
///
/// Behaviors are registered at runtime. A behavior that cannot produce an
/// independent copy of itself keeps the default `clone_behavior`, and its
/// prototypes are refused by the registry.
#[async_trait]
pub trait Behavior: Send + Sync {
    async fn execute(&mut self, ctx: &HandlerContext<'_>) -> CommandResult;

    fn clone_behavior(&self) -> Option<Box<dyn Behavior>> {
        None
    }
}

/// Behavior of a command nobody bound anything to
pub struct UnboundBehavior;

#[async_trait]
impl Behavior for UnboundBehavior {
    async fn execute(&mut self, _ctx: &HandlerContext<'_>) -> CommandResult {
        CommandResult::failed(Failure::Failed, "No behavior bound to command")
    }
}

/// Bounded command argument
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Argument {
    bytes: [u8; MAX_ARGUMENT_LENGTH],
    len: usize,
}

impl Argument {
    /// Copy up to 30 bytes of `text`; the rest is dropped
    pub fn new(text: &[u8]) -> Self {
        let len = text.len().min(MAX_ARGUMENT_LENGTH);
        let mut bytes = [0u8; MAX_ARGUMENT_LENGTH];
        bytes[..len].copy_from_slice(&text[..len]);
        Self { bytes, len }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.as_bytes()))
    }
}

/// An executable telecommand
///
/// Prototypes live in the registry and are never executed; every uplinked
/// invocation runs on its own clone, exactly once.
pub struct Command {
    id: u32,
    kind: CommandType,
    fsm: StatusMachine,
    argument: Argument,
    toolkit: Arc<Toolkit>,
    behavior: Box<dyn Behavior>,
}

impl Command {
    pub fn new(
        kind: CommandType,
        behavior: impl Behavior + 'static,
        toolkit: Arc<Toolkit>,
    ) -> Self {
        Self::from_boxed(kind, Box::new(behavior), toolkit)
    }

    /// A default-typed command with no behavior; it fails when executed
    pub fn unbound(toolkit: Arc<Toolkit>) -> Self {
        Self::new(CommandType::DEFAULT, UnboundBehavior, toolkit)
    }

    fn from_boxed(kind: CommandType, behavior: Box<dyn Behavior>, toolkit: Arc<Toolkit>) -> Self {
        Self {
            id: 0,
            kind,
            fsm: StatusMachine::new(),
            argument: Argument::default(),
            toolkit,
            behavior,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    pub fn kind(&self) -> CommandType {
        self.kind
    }

    pub fn status(&self) -> CommandStatus {
        self.fsm.status()
    }

    pub fn argument(&self) -> &Argument {
        &self.argument
    }

    /// Store up to 30 bytes of `text` as the argument
    ///
    /// Longer input is truncated, never rejected.
    pub fn set_argument(&mut self, text: &[u8]) {
        self.argument = Argument::new(text);
    }

    /// Independent copy for a single execution
    ///
    /// The copy starts out PENDING and shares the toolkit handle. Returns
    /// `None` when the behavior cannot be cloned.
    pub fn clone_command(&self) -> Option<Command> {
        let behavior = self.behavior.clone_behavior()?;
        let mut clone = Self::from_boxed(self.kind, behavior, self.toolkit.clone());
        clone.id = self.id;
        clone.argument = self.argument;
        Some(clone)
    }

    /// Run the bound behavior
    pub async fn execute(&mut self) {
        self.run(None).await
    }

    /// Run the bound behavior, failing the command if it outlives `deadline`
    pub async fn execute_within(&mut self, deadline: Duration) {
        self.run(Some(deadline)).await
    }

    async fn run(&mut self, deadline: Option<Duration>) {
        let started = self.fsm.process_event(StatusEvent::Started);
        if let TransitionResult::Invalid { from, .. } = started {
            warn!(
                "Command id={} type={} already ran (status {}), not executing again",
                self.id, self.kind, from
            );
            return;
        }

        // Default commands are kept out of the log to avoid clutter
        let audited = self.kind != CommandType::DEFAULT;
        if audited {
            self.toolkit.audit_log().record(self.kind, CommandStatus::Executing).await;
        }

        let ctx = HandlerContext {
            id: self.id,
            kind: self.kind,
            argument: self.argument.as_bytes(),
            toolkit: &self.toolkit,
        };

        let behavior = self.behavior.execute(&ctx);
        let result = match deadline {
            Some(limit) => match tokio::time::timeout(limit, behavior).await {
                Ok(result) => result,
                Err(_) => CommandResult::failed(
                    Failure::Failed,
                    format!("Execution exceeded {}ms deadline", limit.as_millis()),
                ),
            },
            None => behavior.await,
        };

        let event = match result {
            CommandResult::Completed { message } => {
                debug!("Command id={} type={} completed: {}", self.id, self.kind, message);
                StatusEvent::Completed
            }
            CommandResult::Failed { failure, message } => {
                warn!("Command id={} type={} failed: {}", self.id, self.kind, message);
                StatusEvent::Failed(failure)
            }
        };
        self.fsm.process_event(event);

        if audited {
            self.toolkit.audit_log().record(self.kind, self.status()).await;
        }
    }

    /// Release the command and its behavior
    pub fn destroy(self) {
        trace!("Destroying command id={} type={} ({})", self.id, self.kind, self.status());
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("status", &self.status())
            .field("argument", &self.argument)
            .finish()
    }
}

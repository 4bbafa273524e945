//! Command Status State Machine
//!
//! Defines the execution status of a command clone and the forward-only
//! transitions between statuses.

use std::fmt;

/// Execution status of a command
///
/// The discriminants are the status byte written to the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandStatus {
    /// In the process of executing
    Executing = 0,
    /// Finished executing
    Executed = 1,
    /// Awaiting execution
    Pending = 2,
    /// Failed to execute correctly
    Failed = 3,
    /// Failed due to buffer overflow
    Overflow = 4,
    /// Failed due to full non volatile memory
    MemoryFull = 5,
    /// Failed interacting with non volatile memory
    StorageError = 6,
    /// Failed to apply a time stamp
    TimeError = 7,
    /// Invalid syntax
    SyntaxError = 8,
}

impl From<CommandStatus> for u8 {
    fn from(status: CommandStatus) -> u8 {
        status as u8
    }
}

impl TryFrom<u8> for CommandStatus {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use CommandStatus::*;

        Ok(match value {
            0 => Executing,
            1 => Executed,
            2 => Pending,
            3 => Failed,
            4 => Overflow,
            5 => MemoryFull,
            6 => StorageError,
            7 => TimeError,
            8 => SyntaxError,
            other => return Err(other),
        })
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandStatus::Executing => "EXECUTING",
            CommandStatus::Executed => "EXECUTED",
            CommandStatus::Pending => "PENDING",
            CommandStatus::Failed => "FAILED",
            CommandStatus::Overflow => "OVERFLOW",
            CommandStatus::MemoryFull => "MEMORY_FULL",
            CommandStatus::StorageError => "STORAGE_ERROR",
            CommandStatus::TimeError => "TIME_ERROR",
            CommandStatus::SyntaxError => "SYNTAX_ERROR",
        };
        f.write_str(name)
    }
}

/// Terminal failure a command behavior can report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Failed,
    Overflow,
    MemoryFull,
    StorageError,
    TimeError,
    SyntaxError,
}

impl From<Failure> for CommandStatus {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Failed => CommandStatus::Failed,
            Failure::Overflow => CommandStatus::Overflow,
            Failure::MemoryFull => CommandStatus::MemoryFull,
            Failure::StorageError => CommandStatus::StorageError,
            Failure::TimeError => CommandStatus::TimeError,
            Failure::SyntaxError => CommandStatus::SyntaxError,
        }
    }
}

/// Events that can trigger status transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    /// `execute()` was entered
    Started,
    /// The behavior returned without reporting a failure
    Completed,
    /// The behavior reported a terminal failure
    Failed(Failure),
}

/// Result of a status transition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid and status changed
    Success(CommandStatus),
    /// Transition was invalid from the current status
    Invalid { from: CommandStatus, event: StatusEvent },
}

/// Status holder that only moves forward
#[derive(Debug, Clone)]
pub struct StatusMachine {
    current: CommandStatus,
}

impl Default for StatusMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusMachine {
    /// Create a new state machine in Pending status
    pub fn new() -> Self {
        Self {
            current: CommandStatus::Pending,
        }
    }

    /// Get current status
    pub fn status(&self) -> CommandStatus {
        self.current
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: StatusEvent) -> TransitionResult {
        match self.next_status(event) {
            Some(status) => {
                self.current = status;
                TransitionResult::Success(status)
            }
            None => TransitionResult::Invalid {
                from: self.current,
                event,
            },
        }
    }

    fn next_status(&self, event: StatusEvent) -> Option<CommandStatus> {
        use CommandStatus::*;

        match (self.current, event) {
            (Pending, StatusEvent::Started) => Some(Executing),
            (Executing, StatusEvent::Completed) => Some(Executed),
            (Executing, StatusEvent::Failed(failure)) => Some(failure.into()),
            _ => None,
        }
    }
}

//! Parsed form of an uplinked script
//!
//! The tree has exactly two node kinds. Each node owns its children, and an
//! invocation owns the command clone it runs, so dropping a tree (or any
//! partial tree on a failed parse) releases everything it holds.

use crate::command::Command;
use std::time::Duration;
use tracing::trace;

/// Leaf node running one command clone
#[derive(Debug)]
pub struct Invocation {
    command: Command,
}

impl Invocation {
    pub fn new(command: Command) -> Self {
        Self { command }
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Debug)]
pub enum Ast {
    /// Root of a script; forwards to its child
    Statement(Box<Ast>),
    Invocation(Invocation),
}

impl Ast {
    pub fn statement(child: Ast) -> Self {
        Ast::Statement(Box::new(child))
    }

    pub fn invocation(command: Command) -> Self {
        Ast::Invocation(Invocation::new(command))
    }

    /// The command this tree runs
    pub fn command(&self) -> &Command {
        match self {
            Ast::Statement(child) => child.command(),
            Ast::Invocation(invocation) => invocation.command(),
        }
    }

    pub fn command_mut(&mut self) -> &mut Command {
        match self {
            Ast::Statement(child) => child.command_mut(),
            Ast::Invocation(invocation) => &mut invocation.command,
        }
    }

    /// Execute the script
    pub async fn interpret(&mut self) {
        self.command_mut().execute().await
    }

    /// Execute the script, failing its command after `deadline`
    pub async fn interpret_within(&mut self, deadline: Duration) {
        self.command_mut().execute_within(deadline).await
    }

    /// Tear down the tree, children first
    pub fn destroy(self) {
        match self {
            Ast::Statement(child) => {
                (*child).destroy();
                trace!("Statement destroyed");
            }
            Ast::Invocation(invocation) => invocation.command.destroy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::command::telecommand::tests::{test_toolkit, Scripted, Tally};
    use crate::command::{CommandResult, CommandType};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use telecommand_shared::CommandStatus;

    fn tree(tally: &Arc<Tally>) -> Ast {
        let command = Command::new(
            CommandType(4),
            Scripted::new(CommandResult::completed("ok"), tally.clone()),
            test_toolkit(AuditLog::disabled()),
        );
        Ast::statement(Ast::invocation(command))
    }

    #[tokio::test]
    async fn test_statement_forwards_to_invocation() {
        let tally = Arc::new(Tally::default());
        let mut ast = tree(&tally);

        ast.interpret().await;
        assert_eq!(tally.executed.load(Ordering::SeqCst), 1);
        assert_eq!(ast.command().status(), CommandStatus::Executed);

        ast.destroy();
        assert_eq!(tally.live(), 0);
    }

    #[test]
    fn test_drop_releases_command() {
        let tally = Arc::new(Tally::default());
        let ast = tree(&tally);
        assert_eq!(tally.live(), 1);

        drop(ast);
        assert_eq!(tally.live(), 0);
    }
}

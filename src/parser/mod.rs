//! Uplinked script parser
//!
//! Grammar:
//! ```text
//! statement := INVOKE "(" STRING ("," STRING)? ")" ";"
//! script    := statement (SCRIPT_END | end of input)
//! ```
//! Whitespace (space, CR, LF) may appear between tokens. A script holds exactly
//! one statement.

pub mod ast;
mod lexer;

pub use ast::{Ast, Invocation};

use crate::command::CommandRegistry;
use lexer::{Lexer, Symbol};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Why a script was dropped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Empty script")]
    EmptyScript,

    #[error("Script has no statement")]
    NoStatement,

    #[error("Expected '{expected}' at byte {offset}, found '{found}'")]
    UnexpectedCharacter {
        expected: char,
        found: char,
        offset: usize,
    },

    #[error("Expected '{expected}', but the script ended")]
    UnexpectedEnd { expected: char },

    #[error("String starting at byte {offset} is not terminated")]
    UnterminatedString { offset: usize },

    #[error("Unknown symbol \"{0}\"")]
    UnknownSymbol(String),

    #[error("Expected end of script after the statement")]
    ExpectedEnd,

    #[error("No command registered as \"{0}\"")]
    UnknownCommand(String),

    #[error("Command \"{0}\" cannot be cloned")]
    NotCloneable(String),
}

/// Turns script buffers into executable trees
///
/// Commands are resolved against a frozen registry and cloned, so every tree
/// owns the command it runs.
pub struct Parser {
    registry: Arc<CommandRegistry>,
}

impl Parser {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Parse a script, or `None` if it is malformed or names no usable command
    pub fn parse(&self, script: &[u8]) -> Option<Ast> {
        match self.try_parse(script) {
            Ok(ast) => Some(ast),
            Err(e) => {
                debug!("Script dropped: {}", e);
                None
            }
        }
    }

    /// Parse a script, reporting why it was rejected
    ///
    /// Nodes built before an error are dropped on return.
    pub fn try_parse(&self, script: &[u8]) -> Result<Ast, ParseError> {
        if script.is_empty() {
            return Err(ParseError::EmptyScript);
        }

        let mut lexer = Lexer::new(script);
        if lexer.symbol()? == Symbol::End {
            return Err(ParseError::NoStatement);
        }

        let invocation = self.invocation(&mut lexer)?;

        match lexer.symbol() {
            Ok(Symbol::End) => Ok(Ast::statement(invocation)),
            _ => Err(ParseError::ExpectedEnd),
        }
    }

    /// Everything after the INVOKE keyword
    fn invocation(&self, lexer: &mut Lexer<'_>) -> Result<Ast, ParseError> {
        lexer.expect(b'(')?;
        let name = lexer.string()?;
        let argument = if lexer.accept(b',') {
            Some(lexer.string()?)
        } else {
            None
        };
        lexer.expect(b')')?;
        lexer.expect(b';')?;

        // Only a well-formed invocation is resolved
        let shown = || String::from_utf8_lossy(name).into_owned();
        let prototype = self
            .registry
            .resolve(name)
            .ok_or_else(|| ParseError::UnknownCommand(shown()))?;
        let mut command = prototype
            .clone_command()
            .ok_or_else(|| ParseError::NotCloneable(shown()))?;

        if let Some(argument) = argument.filter(|a| !a.is_empty()) {
            command.set_argument(argument);
        }

        Ok(Ast::invocation(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::command::telecommand::tests::{test_toolkit, Flaky, Scripted, Tally};
    use crate::command::{Command, CommandResult, CommandType};
    use std::sync::atomic::Ordering;
    use telecommand_shared::CommandStatus;

    /// Parser knowing "ping", plus the tally of its behaviors
    fn ping_parser() -> (Parser, Arc<Tally>) {
        let tally = Arc::new(Tally::default());
        let mut registry = CommandRegistry::new();
        registry.register(
            "ping",
            Command::new(
                CommandType(1),
                Scripted::new(CommandResult::completed("pong"), tally.clone()),
                test_toolkit(AuditLog::disabled()),
            ),
        );
        (Parser::new(Arc::new(registry)), tally)
    }

    #[tokio::test]
    async fn test_invoke_registered_command() {
        let (parser, tally) = ping_parser();

        let mut ast = parser.parse(br#"INVOKE("ping");"#).expect("script rejected");
        assert!(matches!(&ast, Ast::Statement(child) if matches!(**child, Ast::Invocation(_))));
        assert_eq!(ast.command().kind(), CommandType(1));
        assert_eq!(ast.command().status(), CommandStatus::Pending);

        ast.interpret().await;
        assert_eq!(ast.command().status(), CommandStatus::Executed);
        assert_eq!(tally.executed.load(Ordering::SeqCst), 1);

        ast.destroy();
        // Only the registered prototype is left
        assert_eq!(tally.live(), 1);
    }

    #[test]
    fn test_unknown_command() {
        let (parser, tally) = ping_parser();

        assert_eq!(
            parser.try_parse(br#"INVOKE("unknown");"#).err(),
            Some(ParseError::UnknownCommand("unknown".into()))
        );
        assert_eq!(tally.executed.load(Ordering::SeqCst), 0);
        assert_eq!(tally.live(), 1);
    }

    #[test]
    fn test_argument_truncated() {
        let (parser, _tally) = ping_parser();

        let ast = parser
            .parse(br#"INVOKE("ping","abcdefghijklmnopqrstuvwxyz012345");"#)
            .expect("script rejected");
        let argument = ast.command().argument();
        assert_eq!(argument.len(), 30);
        assert_eq!(argument.as_bytes(), b"abcdefghijklmnopqrstuvwxyz0123");
    }

    #[test]
    fn test_empty_script() {
        let (parser, tally) = ping_parser();

        assert_eq!(parser.try_parse(b"").err(), Some(ParseError::EmptyScript));
        assert!(parser.parse(b"").is_none());
        assert_eq!(tally.live(), 1);
    }

    #[test]
    fn test_whitespace_between_tokens() {
        let (parser, _tally) = ping_parser();

        let ast = parser
            .parse(b" INVOKE \r\n( \"ping\" ,\n\"arg\" ) ;\r\n")
            .expect("script rejected");
        assert_eq!(ast.command().argument().as_bytes(), b"arg");
    }

    #[test]
    fn test_explicit_script_end() {
        let (parser, _tally) = ping_parser();
        assert!(parser.parse(br#"INVOKE("ping"); SCRIPT_END"#).is_some());
    }

    #[test]
    fn test_empty_argument_left_unset() {
        let (parser, _tally) = ping_parser();

        let ast = parser.parse(br#"INVOKE("ping","");"#).expect("script rejected");
        assert!(ast.command().argument().is_empty());
    }

    #[test]
    fn test_no_statement() {
        let (parser, _tally) = ping_parser();

        assert_eq!(parser.try_parse(b" \r\n").err(), Some(ParseError::NoStatement));
        assert_eq!(parser.try_parse(b"SCRIPT_END").err(), Some(ParseError::NoStatement));
    }

    #[test]
    fn test_grammar_violations_leave_nothing_behind() {
        let (parser, tally) = ping_parser();

        let cases: [(&[u8], ParseError); 7] = [
            (
                br#"INVOKE("ping")"#,
                ParseError::UnexpectedEnd { expected: ';' },
            ),
            (
                br#"INVOKE("ping"]"#,
                ParseError::UnexpectedCharacter {
                    expected: ')',
                    found: ']',
                    offset: 13,
                },
            ),
            (
                br#"INVOKE("ping","abc);"#,
                ParseError::UnterminatedString { offset: 14 },
            ),
            (
                br#"EXECUTE("ping");"#,
                ParseError::UnknownSymbol("EXECUTE".into()),
            ),
            (
                br#"INVOKE "ping");"#,
                ParseError::UnexpectedCharacter {
                    expected: '(',
                    found: '"',
                    offset: 7,
                },
            ),
            (
                br#"INVOKE("ping");INVOKE("ping");"#,
                ParseError::ExpectedEnd,
            ),
            (
                br#"INVOKE(ping);"#,
                ParseError::UnexpectedCharacter {
                    expected: '"',
                    found: 'p',
                    offset: 7,
                },
            ),
        ];

        for (script, expected) in cases {
            assert_eq!(
                parser.try_parse(script).err(),
                Some(expected),
                "script {:?}",
                String::from_utf8_lossy(script)
            );
            assert_eq!(tally.live(), 1, "clone leaked for {:?}", String::from_utf8_lossy(script));
        }

        assert_eq!(tally.executed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_clone_failure_at_resolution() {
        let tally = Arc::new(Tally::default());
        let mut registry = CommandRegistry::new();
        // The registration check uses up the only clone
        assert!(registry.register(
            "flaky",
            Command::new(
                CommandType(7),
                Flaky::new(1, tally.clone()),
                test_toolkit(AuditLog::disabled()),
            ),
        ));
        let parser = Parser::new(Arc::new(registry));

        assert_eq!(
            parser.try_parse(br#"INVOKE("flaky");"#).err(),
            Some(ParseError::NotCloneable("flaky".into()))
        );
        assert_eq!(tally.live(), 1);
        assert_eq!(tally.executed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_grammar_checked_before_resolution() {
        let (parser, tally) = ping_parser();

        assert_eq!(
            parser.try_parse(br#"INVOKE("unknown""#).err(),
            Some(ParseError::UnexpectedEnd { expected: ')' })
        );
        assert_eq!(
            parser.try_parse(br#"INVOKE("unknown","x")"#).err(),
            Some(ParseError::UnexpectedEnd { expected: ';' })
        );
        assert_eq!(tally.live(), 1);
    }
}

//! Script daemon: receives uplinked scripts and runs them one at a time
//!
//! Loop:
//! 1. Block on the ground link for a script on the telecommand port
//! 2. Parse it; malformed or unresolvable scripts are dropped silently
//! 3. Interpret the tree (runs exactly one command), then destroy it
//! 4. Sleep briefly and repeat
//!
//! Cancellation is observed while waiting for a script and while sleeping.
//! A command that is already running is allowed to finish.

use crate::command::CommandType;
use crate::parser::{ParseError, Parser};
use crate::transport::GroundLink;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use telecommand_shared::limits::{DAEMON_SLEEP_MS, SCRIPT_MAX_LENGTH};
use telecommand_shared::{CommandStatus, Port, TELECOMMAND_PORT};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Configuration for the script daemon
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Port scripts are read from
    pub port: Port,

    /// Pause between two scripts
    pub sleep: Duration,

    /// Read timeout; `None` blocks until a script arrives
    pub read_timeout: Option<Duration>,

    /// Upper bound on a single command's execution
    pub execution_deadline: Option<Duration>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            port: TELECOMMAND_PORT,
            sleep: Duration::from_millis(DAEMON_SLEEP_MS),
            read_timeout: None,
            execution_deadline: None,
        }
    }
}

/// Counters kept by the daemon
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DaemonStats {
    pub received: u64,
    pub executed: u64,
    pub dropped: u64,
}

/// What happened to one received buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOutcome {
    /// Nothing was received
    Empty,
    /// Script rejected before anything ran
    Dropped(ParseError),
    /// The script's command ran to a terminal status
    Executed {
        id: u32,
        kind: CommandType,
        status: CommandStatus,
    },
}

pub struct ScriptDaemon {
    buffer: [u8; SCRIPT_MAX_LENGTH],
    parser: Parser,
    ground_link: Arc<dyn GroundLink>,
    config: DaemonConfig,
    stats: DaemonStats,
    next_id: u32,
}

impl ScriptDaemon {
    pub fn new(parser: Parser, ground_link: Arc<dyn GroundLink>, config: DaemonConfig) -> Self {
        Self {
            buffer: [0u8; SCRIPT_MAX_LENGTH],
            parser,
            ground_link,
            config,
            stats: DaemonStats::default(),
            next_id: 1,
        }
    }

    pub fn stats(&self) -> DaemonStats {
        self.stats
    }

    /// Run one script as if it had just been received
    ///
    /// Scripts longer than the receive buffer are cut to its size.
    pub async fn handle_script(&mut self, script: &[u8]) -> ScriptOutcome {
        let len = script.len().min(SCRIPT_MAX_LENGTH);
        self.buffer[..len].copy_from_slice(&script[..len]);
        self.handle_received(len).await
    }

    async fn handle_received(&mut self, len: usize) -> ScriptOutcome {
        if len == 0 {
            return ScriptOutcome::Empty;
        }
        self.stats.received += 1;

        let mut ast = match self.parser.try_parse(&self.buffer[..len]) {
            Ok(ast) => ast,
            Err(e) => {
                debug!("Dropping script: {}", e);
                self.stats.dropped += 1;
                return ScriptOutcome::Dropped(e);
            }
        };

        ast.command_mut().set_id(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);

        match self.config.execution_deadline {
            Some(deadline) => ast.interpret_within(deadline).await,
            None => ast.interpret().await,
        }

        let command = ast.command();
        let outcome = ScriptOutcome::Executed {
            id: command.id(),
            kind: command.kind(),
            status: command.status(),
        };
        ast.destroy();
        self.stats.executed += 1;

        outcome
    }

    /// Receive and run scripts until `cancel` fires
    pub async fn run(mut self, cancel: CancellationToken) -> DaemonStats {
        info!(
            "Script daemon listening on {} (buffer {} bytes)",
            self.config.port, SCRIPT_MAX_LENGTH
        );

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                n = self.ground_link.read(
                    &mut self.buffer,
                    self.config.port,
                    self.config.read_timeout,
                ) => n,
            };

            let outcome = self.handle_received(received).await;
            if let ScriptOutcome::Executed { id, kind, status } = outcome {
                info!("Script {} ran command type {}: {}", id, kind, status);
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.sleep) => {}
            }
        }

        info!(
            "Script daemon stopped: {} received, {} executed, {} dropped",
            self.stats.received, self.stats.executed, self.stats.dropped
        );
        self.stats
    }

    /// Start the daemon on its own task
    pub fn spawn(self, cancel: CancellationToken) -> DaemonHandle {
        let task = tokio::spawn(self.run(cancel.clone()));
        DaemonHandle { task, cancel }
    }
}

/// Handle to a spawned daemon
pub struct DaemonHandle {
    task: JoinHandle<DaemonStats>,
    cancel: CancellationToken,
}

impl DaemonHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the daemon and wait for it to exit
    pub async fn shutdown(self) -> Result<DaemonStats> {
        self.cancel.cancel();
        match self.task.await {
            Ok(stats) => Ok(stats),
            Err(e) => {
                warn!("Script daemon task failed: {}", e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::command::handlers::{self, CountBehavior};
    use crate::command::telecommand::tests::{test_toolkit, Flaky, Scripted, Tally};
    use crate::command::{Command, CommandRegistry, CommandResult};
    use crate::toolkit::Toolkit;
    use crate::transport::QueueGroundLink;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick_config() -> DaemonConfig {
        DaemonConfig {
            sleep: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn ping_daemon(link: Arc<QueueGroundLink>) -> (ScriptDaemon, Arc<Tally>) {
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

        let parser = Parser::new(Arc::new(registry));
        (ScriptDaemon::new(parser, link, quick_config()), tally)
    }

    #[tokio::test]
    async fn test_handle_script_outcomes() {
        let (mut daemon, tally) = ping_daemon(Arc::new(QueueGroundLink::new()));

        assert_eq!(daemon.handle_script(b"").await, ScriptOutcome::Empty);
        assert_eq!(
            daemon.handle_script(br#"INVOKE("ping");"#).await,
            ScriptOutcome::Executed {
                id: 1,
                kind: CommandType(1),
                status: CommandStatus::Executed
            }
        );
        assert_eq!(
            daemon.handle_script(br#"INVOKE("unknown");"#).await,
            ScriptOutcome::Dropped(ParseError::UnknownCommand("unknown".into()))
        );

        assert_eq!(
            daemon.stats(),
            DaemonStats {
                received: 2,
                executed: 1,
                dropped: 1
            }
        );
        assert_eq!(tally.live(), 1);
    }

    #[tokio::test]
    async fn test_repeated_scripts_do_not_accumulate() {
        let (mut daemon, tally) = ping_daemon(Arc::new(QueueGroundLink::new()));

        for i in 0..200 {
            let script: &[u8] = if i % 3 == 0 {
                br#"INVOKE("ping""#
            } else {
                br#"INVOKE("ping","iteration");"#
            };
            daemon.handle_script(script).await;
            assert_eq!(tally.live(), 1);
        }

        let stats = daemon.stats();
        assert_eq!(stats.received, 200);
        assert_eq!(stats.dropped, 67);
        assert_eq!(stats.executed, 133);
        assert_eq!(tally.executed.load(Ordering::SeqCst), 133);
    }

    #[tokio::test]
    async fn test_oversized_script_cut_to_buffer() {
        let (mut daemon, _tally) = ping_daemon(Arc::new(QueueGroundLink::new()));

        let mut script = br#"INVOKE("ping","#.to_vec();
        script.extend_from_slice(&[b' '; 120]);
        script.extend_from_slice(br#""x");"#);

        assert!(matches!(
            daemon.handle_script(&script).await,
            ScriptOutcome::Dropped(ParseError::UnexpectedEnd { expected: '"' })
        ));
    }

    #[tokio::test]
    async fn test_run_executes_uplinked_scripts() {
        let link = Arc::new(QueueGroundLink::new());
        let counter = Arc::new(AtomicU32::new(0));
        let toolkit = Arc::new(Toolkit::new(link.clone(), AuditLog::disabled()));

        let mut registry = CommandRegistry::new();
        handlers::register_builtin_commands(&mut registry, &toolkit, counter.clone());
        let daemon = ScriptDaemon::new(
            Parser::new(Arc::new(registry)),
            link.clone(),
            quick_config(),
        );

        let handle = daemon.spawn(CancellationToken::new());
        link.insert(br#"INVOKE("count");"#);
        link.insert(b"garbage");
        link.insert(br#"INVOKE("count","again");"#);

        for _ in 0..200 {
            if counter.load(Ordering::SeqCst) == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let stats = handle.shutdown().await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(stats.received, 3);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.executed, 2);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting() {
        let (daemon, _tally) = ping_daemon(Arc::new(QueueGroundLink::new()));
        let cancel = CancellationToken::new();
        let handle = daemon.spawn(cancel.clone());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_finished());

        let stats = tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .expect("daemon did not stop")
            .unwrap();
        assert_eq!(stats, DaemonStats::default());
    }

    #[tokio::test]
    async fn test_count_prototype_never_runs() {
        let counter = Arc::new(AtomicU32::new(0));
        let toolkit = test_toolkit(AuditLog::disabled());
        let mut registry = CommandRegistry::new();
        let prototype = Command::new(handlers::COUNT, CountBehavior::new(counter.clone()), toolkit);
        registry.register("count", prototype);

        let mut daemon = ScriptDaemon::new(
            Parser::new(Arc::new(registry)),
            Arc::new(QueueGroundLink::new()),
            quick_config(),
        );
        daemon.handle_script(br#"INVOKE("count");"#).await;
        daemon.handle_script(br#"INVOKE("count");"#).await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        let prototype = daemon.parser.registry().resolve("count").unwrap();
        assert_eq!(prototype.status(), CommandStatus::Pending);
    }

    #[tokio::test]
    async fn test_dropped_scripts_leave_no_audit_trace() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("tc_log.bin"));
        let tally = Arc::new(Tally::default());

        let mut registry = CommandRegistry::new();
        registry.register(
            "ping",
            Command::new(
                CommandType(1),
                Scripted::new(CommandResult::completed("pong"), tally.clone()),
                test_toolkit(log.clone()),
            ),
        );
        let mut daemon = ScriptDaemon::new(
            Parser::new(Arc::new(registry)),
            Arc::new(QueueGroundLink::new()),
            quick_config(),
        );

        let dropped: [&[u8]; 3] = [b"garbage", br#"INVOKE("unknown");"#, br#"INVOKE("ping""#];
        for script in dropped {
            assert!(matches!(daemon.handle_script(script).await, ScriptOutcome::Dropped(_)));
        }
        assert!(log.read_all().await.unwrap().is_empty());
        assert_eq!(tally.live(), 1);

        daemon.handle_script(br#"INVOKE("ping");"#).await;
        let records = log.read_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].status, CommandStatus::Executed);
    }

    #[tokio::test]
    async fn test_clone_failure_drops_script() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("tc_log.bin"));
        let tally = Arc::new(Tally::default());

        // One clone is spent on the registration check
        let mut registry = CommandRegistry::new();
        assert!(registry.register(
            "flaky",
            Command::new(CommandType(7), Flaky::new(1, tally.clone()), test_toolkit(log.clone())),
        ));
        let mut daemon = ScriptDaemon::new(
            Parser::new(Arc::new(registry)),
            Arc::new(QueueGroundLink::new()),
            quick_config(),
        );

        assert_eq!(
            daemon.handle_script(br#"INVOKE("flaky");"#).await,
            ScriptOutcome::Dropped(ParseError::NotCloneable("flaky".into()))
        );
        assert_eq!(tally.executed.load(Ordering::SeqCst), 0);
        assert_eq!(tally.live(), 1);
        assert!(log.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_executed_scripts_numbered_in_order() {
        let (mut daemon, _tally) = ping_daemon(Arc::new(QueueGroundLink::new()));

        let mut ids = Vec::new();
        let scripts: [&[u8]; 3] = [br#"INVOKE("ping");"#, b"garbage", br#"INVOKE("ping");"#];
        for script in scripts {
            if let ScriptOutcome::Executed { id, .. } = daemon.handle_script(script).await {
                ids.push(id);
            }
        }
        assert_eq!(ids, vec![1, 2]);

        // The prototype keeps its own id
        let prototype = daemon.parser.registry().resolve("ping").unwrap();
        assert_eq!(prototype.id(), 0);
    }
}

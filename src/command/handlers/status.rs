//! Status request command handler

use crate::command::{Behavior, CommandResult, HandlerContext};
use async_trait::async_trait;
use std::time::Duration;
use telecommand_shared::{Failure, TELEMETRY_PORT};
use tracing::info;

const DOWNLINK_TIMEOUT: Duration = Duration::from_secs(1);

/// Downlinks a one-line status report
#[derive(Clone)]
pub struct StatusBehavior;

#[async_trait]
impl Behavior for StatusBehavior {
    async fn execute(&mut self, ctx: &HandlerContext<'_>) -> CommandResult {
        let link = ctx.toolkit.ground_link();

        // Nobody to report to
        if !link.is_in_range() {
            return CommandResult::failed(Failure::Failed, "Ground station out of range");
        }

        let report = format!(
            "uptime={}s audit={}",
            ctx.toolkit.uptime().as_secs(),
            if ctx.toolkit.audit_log().path().is_some() { "on" } else { "off" },
        );
        info!("[STATUS] {}", report);

        let written = link
            .write(report.as_bytes(), TELEMETRY_PORT, Some(DOWNLINK_TIMEOUT))
            .await;
        if written < report.len() {
            return CommandResult::failed(
                Failure::Overflow,
                format!("Downlinked {} of {} bytes", written, report.len()),
            );
        }

        CommandResult::completed(report)
    }

    fn clone_behavior(&self) -> Option<Box<dyn Behavior>> {
        Some(Box::new(self.clone()))
    }
}

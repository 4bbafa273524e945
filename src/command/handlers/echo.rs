//! Echo command handler

use crate::command::{Behavior, CommandResult, HandlerContext};
use async_trait::async_trait;
use std::time::Duration;
use telecommand_shared::{Failure, TELEMETRY_PORT};
use tracing::info;

const DOWNLINK_TIMEOUT: Duration = Duration::from_secs(1);

/// Downlinks the command argument back to the ground station
#[derive(Clone)]
pub struct EchoBehavior;

#[async_trait]
impl Behavior for EchoBehavior {
    async fn execute(&mut self, ctx: &HandlerContext<'_>) -> CommandResult {
        if ctx.argument.is_empty() {
            return CommandResult::failed(Failure::SyntaxError, "Nothing to echo");
        }

        info!("[ECHO] {:?}", ctx.argument_str());
        let written = ctx
            .toolkit
            .ground_link()
            .write(ctx.argument, TELEMETRY_PORT, Some(DOWNLINK_TIMEOUT))
            .await;

        if written < ctx.argument.len() {
            return CommandResult::failed(
                Failure::Overflow,
                format!("Downlinked {} of {} bytes", written, ctx.argument.len()),
            );
        }

        CommandResult::completed(format!("Echoed {} bytes", written))
    }

    fn clone_behavior(&self) -> Option<Box<dyn Behavior>> {
        Some(Box::new(self.clone()))
    }
}

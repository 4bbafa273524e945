//! Counter command handler

use crate::command::{Behavior, CommandResult, HandlerContext};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::info;

/// Increments a counter shared by the prototype and all of its clones
#[derive(Clone)]
pub struct CountBehavior {
    count: Arc<AtomicU32>,
}

impl CountBehavior {
    pub fn new(count: Arc<AtomicU32>) -> Self {
        Self { count }
    }
}

#[async_trait]
impl Behavior for CountBehavior {
    async fn execute(&mut self, ctx: &HandlerContext<'_>) -> CommandResult {
        let count = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        info!("[COUNT] count={} argument={:?}", count, ctx.argument_str());

        CommandResult::completed(format!("Count is {}", count))
    }

    fn clone_behavior(&self) -> Option<Box<dyn Behavior>> {
        Some(Box::new(self.clone()))
    }
}

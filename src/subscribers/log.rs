//! # LogWriter: tracing-backed event logger
//!
//! A minimal subscriber that forwards every [`Event`] to `tracing`. Attach it during
//! development to see what the loops are producing.
//!
//! ## Example output
//! ```text
//! INFO taskpoller::subscribers::log: instruction task="mailer" instruction="send-42"
//! WARN taskpoller::subscribers::log: round error task="mailer" label="poll_schedule_failed" error=schedule failed: db down
//! ```

use async_trait::async_trait;

use crate::events::Event;
use crate::subscribers::Subscribe;

/// Event logging subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e {
            Event::Task(ev) => {
                tracing::info!(task = %ev.task, instruction = %ev.instruction, "instruction");
            }
            Event::Error(ev) => {
                tracing::warn!(
                    task = %ev.task,
                    label = ev.error.as_label(),
                    error = %ev.error,
                    "round error"
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}

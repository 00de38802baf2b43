use std::sync::Arc;

use stepreel_protocol::{RenderCommand, TimedCommand};
use tokio::sync::Notify;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::Instant;

/// Outgoing command stream, stamped with the scheduler clock.
#[derive(Debug, Clone)]
pub struct CommandSink {
    tx: UnboundedSender<TimedCommand>,
    origin: Instant,
}

impl CommandSink {
    pub fn new(tx: UnboundedSender<TimedCommand>) -> Self {
        Self {
            tx,
            origin: Instant::now(),
        }
    }

    pub fn channel() -> (Self, UnboundedReceiver<TimedCommand>) {
        let (tx, rx) = unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Milliseconds since the sink was created.
    pub fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    pub fn emit(&self, command: RenderCommand) {
        let timed = TimedCommand {
            at_ms: self.now_ms(),
            command,
        };
        // A renderer that went away just stops watching.
        if self.tx.send(timed).is_err() {
            tracing::trace!("command receiver dropped");
        }
    }
}

/// External "resume" button for permanent pauses.
#[derive(Debug, Clone, Default)]
pub struct ResumeSignal(Arc<Notify>);

impl ResumeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Release the pause currently waiting. A press while nothing waits is
    /// not remembered.
    pub fn resume(&self) {
        self.0.notify_waiters();
    }

    pub(crate) async fn wait(&self) {
        self.0.notified().await;
    }
}

/// Drain everything currently buffered in `rx`.
pub fn drain(rx: &mut UnboundedReceiver<TimedCommand>) -> Vec<TimedCommand> {
    let mut out = Vec::new();
    while let Ok(command) = rx.try_recv() {
        out.push(command);
    }
    out
}

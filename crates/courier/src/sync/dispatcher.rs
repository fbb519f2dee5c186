//! Message delivery to caller-supplied handlers

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use anyhow::anyhow;
use log::warn;

use super::{PollError, SyncError};
use crate::models::{InboundMessage, MessageId};

/// Receives each inbound message exactly once
pub trait MessageHandler: Send {
    fn handle(&mut self, message: InboundMessage) -> anyhow::Result<()>;
}

impl<F> MessageHandler for F
where
    F: FnMut(InboundMessage) -> anyhow::Result<()> + Send,
{
    fn handle(&mut self, message: InboundMessage) -> anyhow::Result<()> {
        self(message)
    }
}

/// Everything the session loop reports without stopping
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error(transparent)]
    Poll(#[from] PollError),
    #[error(transparent)]
    Fetch(#[from] SyncError),
    #[error("handler failed for message {msg_id}")]
    Handler {
        msg_id: MessageId,
        #[source]
        source: anyhow::Error,
    },
}

/// Receives errors the loop reports and then continues past
pub trait ErrorSink: Send {
    fn report(&mut self, error: LoopError);
}

impl<F> ErrorSink for F
where
    F: FnMut(LoopError) + Send,
{
    fn report(&mut self, error: LoopError) {
        self(error)
    }
}

/// Sink that writes every error to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&mut self, error: LoopError) {
        warn!("{:#}", anyhow::Error::from(error));
    }
}

/// Statistics from one dispatched batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: usize,
    pub failed: usize,
}

/// Delivers batches to a handler in order, isolating handler failures
pub struct MessageDispatcher {
    handler: Box<dyn MessageHandler>,
    sink: Box<dyn ErrorSink>,
}

impl MessageDispatcher {
    pub fn new(handler: impl MessageHandler + 'static, sink: impl ErrorSink + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            sink: Box::new(sink),
        }
    }

    /// Hand every message to the handler, in order
    ///
    /// A failing or panicking message is reported to the sink and the rest
    /// of the batch is still delivered.
    pub fn dispatch(&mut self, messages: Vec<InboundMessage>) -> DispatchStats {
        let mut stats = DispatchStats::default();

        for message in messages {
            let msg_id = message.msg_id.clone();
            let outcome = catch_unwind(AssertUnwindSafe(|| self.handler.handle(message)))
                .unwrap_or_else(|payload| {
                    Err(anyhow!("handler panicked: {}", panic_message(&*payload)))
                });
            match outcome {
                Ok(()) => stats.delivered += 1,
                Err(source) => {
                    stats.failed += 1;
                    self.sink.report(LoopError::Handler { msg_id, source });
                }
            }
        }

        stats
    }

    /// Forward an error to the sink
    pub fn report(&mut self, error: LoopError) {
        self.sink.report(error);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string payload"
    }
}

//! Channel-backed client sink.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::application::ports::{ClientSink, PushError};

/// [`ClientSink`] over the bounded queue drained by a connection's writer task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Arc<str>>,
}

impl ChannelSink {
    /// Wrap the sending half of a client's outbound queue.
    #[must_use]
    pub const fn new(tx: mpsc::Sender<Arc<str>>) -> Self {
        Self { tx }
    }
}

impl ClientSink for ChannelSink {
    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    fn push(&self, payload: Arc<str>) -> Result<(), PushError> {
        self.tx.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => PushError::Full,
            TrySendError::Closed(_) => PushError::Closed,
        })
    }
}

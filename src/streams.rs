//! Canonical stream directions.
//!
//! The transport owns framing; the adapter only needs two seams: a reader of
//! canonical request payloads (client-streaming directions) and a writer of
//! canonical response payloads (server-streaming directions). Both are async
//! traits so transports can back them with whatever channel or socket
//! machinery they use. Bounded-channel implementations are provided for
//! in-process transports and tests.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::payload::PayloadValue;
use crate::types::{Error, Result};

/// Reader of canonical payloads for client-streaming directions.
///
/// `next` returns `None` on clean end-of-stream. Item-level errors (decode
/// failures surfaced by the transport) arrive as `Some(Err(_))`.
#[async_trait]
pub trait PayloadReader: Send {
    async fn next(&mut self) -> Option<Result<PayloadValue>>;
}

/// Writer of canonical payloads for server-streaming directions.
#[async_trait]
pub trait PayloadWriter: Send {
    async fn write(&mut self, item: PayloadValue) -> Result<()>;
}

/// Create a bounded in-process payload channel.
///
/// The writer half is handed to the producing side, the reader half to the
/// consuming side. Capacity bounds in-flight items (backpressure).
pub fn payload_channel(capacity: usize) -> (ChannelWriter, ChannelReader) {
    let (tx, rx) = mpsc::channel(capacity);
    (ChannelWriter { tx }, ChannelReader { rx })
}

/// Channel-backed [`PayloadReader`].
#[derive(Debug)]
pub struct ChannelReader {
    rx: mpsc::Receiver<Result<PayloadValue>>,
}

#[async_trait]
impl PayloadReader for ChannelReader {
    async fn next(&mut self) -> Option<Result<PayloadValue>> {
        self.rx.recv().await
    }
}

/// Channel-backed [`PayloadWriter`].
#[derive(Debug)]
pub struct ChannelWriter {
    tx: mpsc::Sender<Result<PayloadValue>>,
}

impl ChannelWriter {
    /// Forward a transport-level item error to the consuming side.
    pub async fn write_err(&mut self, err: Error) -> Result<()> {
        self.tx
            .send(Err(err))
            .await
            .map_err(|_| Error::cancelled("stream consumer dropped"))
    }
}

#[async_trait]
impl PayloadWriter for ChannelWriter {
    async fn write(&mut self, item: PayloadValue) -> Result<()> {
        self.tx
            .send(Ok(item))
            .await
            .map_err(|_| Error::cancelled("stream consumer dropped"))
    }
}

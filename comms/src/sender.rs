//! The sending end of the length-prefixed message protocol.

use std::io;

use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{LEN_TYPE_SIZE, LenType};

pub struct FrameSender<W: AsyncWrite + Unpin> {
    tx: W,
    buf: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> FrameSender<W> {
    /// Creates a new `FrameSender` instance.
    ///
    /// # Arguments
    /// * `tx` - The underlying writer.
    pub fn new(tx: W) -> Self {
        Self {
            tx,
            buf: Vec::with_capacity(64 * 1024),
        }
    }

    /// Sends `msg` through the inner writer.
    ///
    /// Serializes into the reusable buffer, patches the length prefix in
    /// front and writes the whole frame.
    ///
    /// # Arguments
    /// * `msg` - The message to be serialized and sent.
    pub async fn send<T: Serialize>(&mut self, msg: &T) -> io::Result<()> {
        self.buf.clear();
        self.buf.resize(LEN_TYPE_SIZE, 0);
        serde_json::to_writer(&mut self.buf, msg)?;

        let len = (self.buf.len() - LEN_TYPE_SIZE) as LenType;
        self.buf[..LEN_TYPE_SIZE].copy_from_slice(&len.to_be_bytes());
        self.tx.write_all(&self.buf).await
    }
}

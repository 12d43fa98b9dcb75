//! The receiving end of the length-prefixed message protocol.

use std::io;

use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{LEN_TYPE_SIZE, LenType};

pub struct FrameReceiver<R: AsyncRead + Unpin> {
    rx: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReceiver<R> {
    /// Creates a new `FrameReceiver` instance.
    ///
    /// Will read all its data from `rx`.
    pub fn new(rx: R) -> Self {
        Self {
            rx,
            buf: Vec::new(),
        }
    }

    /// Waits to receive a new message from the inner reader.
    ///
    /// A peer that closes the connection between frames surfaces as
    /// `UnexpectedEof`.
    pub async fn recv<T: DeserializeOwned>(&mut self) -> io::Result<T> {
        let mut size_buf = [0; LEN_TYPE_SIZE];
        self.rx.read_exact(&mut size_buf).await?;
        let len = LenType::from_be_bytes(size_buf) as usize;

        self.buf.resize(len, 0);
        self.rx.read_exact(&mut self.buf).await?;

        serde_json::from_slice(&self.buf).map_err(io::Error::from)
    }
}

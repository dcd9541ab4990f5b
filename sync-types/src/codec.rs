//! Length-prefixed framing for peersync messages.
//!
//! Message boundaries never depend on how the transport chunks bytes across
//! reads: every frame carries a 4-byte big-endian length prefix, and raw file
//! payloads are only read after their header declared an exact size.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Message, SyncError};

/// Size of the frame length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum frame body size (16 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default per-operation I/O deadline.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Chunk size used when streaming raw file payloads.
pub const PAYLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Limits applied to every framed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Largest accepted frame body, in bytes.
    pub max_message_size: usize,
    /// Deadline for each individual read or write.
    pub io_timeout: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

/// Buffer-level encoder/decoder for framed messages.
pub struct Codec;

impl Codec {
    /// Encode a message with framing: [4 bytes len][MessagePack map]
    pub fn encode(msg: &Message, max_message_size: usize) -> Result<Vec<u8>, SyncError> {
        let body = msg.to_bytes()?;
        if body.len() > max_message_size || body.len() > u32::MAX as usize {
            return Err(SyncError::MessageTooLarge {
                size: body.len(),
                max: max_message_size,
            });
        }
        let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + body.len());
        buf.extend_from_slice(&(body.len() as u32).to_be_bytes());
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    /// Decode one framed message from the front of `data`.
    ///
    /// Returns the message and the number of bytes consumed.
    pub fn decode(data: &[u8], max_message_size: usize) -> Result<(Message, usize), SyncError> {
        if data.len() < LENGTH_PREFIX_SIZE {
            return Err(SyncError::Framing(format!(
                "incomplete length prefix: have {} bytes",
                data.len()
            )));
        }
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        prefix.copy_from_slice(&data[..LENGTH_PREFIX_SIZE]);
        let len = Self::check_length(prefix, max_message_size)?;

        let total = LENGTH_PREFIX_SIZE + len;
        if data.len() < total {
            return Err(SyncError::Framing(format!(
                "incomplete body: have {}, need {}",
                data.len(),
                total
            )));
        }
        let msg = Message::from_bytes(&data[LENGTH_PREFIX_SIZE..total])?;
        Ok((msg, total))
    }

    fn check_length(prefix: [u8; LENGTH_PREFIX_SIZE], max: usize) -> Result<usize, SyncError> {
        let len = u32::from_be_bytes(prefix) as usize;
        if len == 0 {
            return Err(SyncError::Framing("zero-length frame".into()));
        }
        if len > max {
            return Err(SyncError::MessageTooLarge { size: len, max });
        }
        Ok(len)
    }
}

/// A byte stream carrying framed messages and raw payloads.
///
/// Every read and write is bounded by [`FrameConfig::io_timeout`].
#[derive(Debug)]
pub struct FramedStream<S> {
    inner: S,
    config: FrameConfig,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a stream.
    pub fn new(inner: S, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// The limits in force on this stream.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Unwrap the underlying stream.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Write one framed message and flush it.
    pub async fn send(&mut self, msg: &Message) -> Result<(), SyncError> {
        let frame = Codec::encode(msg, self.config.max_message_size)?;
        let limit = self.config.io_timeout;
        deadline(limit, self.inner.write_all(&frame)).await?;
        deadline(limit, self.inner.flush()).await?;
        tracing::trace!("sent {} frame ({} bytes)", msg.type_name(), frame.len());
        Ok(())
    }

    /// Read exactly one framed message.
    pub async fn recv(&mut self) -> Result<Message, SyncError> {
        let limit = self.config.io_timeout;

        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        deadline(limit, self.inner.read_exact(&mut prefix))
            .await
            .map_err(|e| eof_as_framing(e, "connection closed before length prefix"))?;
        let len = Codec::check_length(prefix, self.config.max_message_size)?;

        let mut body = vec![0u8; len];
        deadline(limit, self.inner.read_exact(&mut body))
            .await
            .map_err(|e| eof_as_framing(e, "connection closed mid-frame"))?;

        let msg = Message::from_bytes(&body)?;
        tracing::trace!("received {} frame ({} bytes)", msg.type_name(), len);
        Ok(msg)
    }

    /// Stream up to `size` bytes from `source` as a raw payload.
    ///
    /// Returns the number of bytes written; fewer than `size` means `source`
    /// hit end-of-file first. Reads from `source` are not bounded by the
    /// stream deadline, writes to the peer are.
    pub async fn write_payload<R>(&mut self, source: &mut R, size: u64) -> Result<u64, SyncError>
    where
        R: AsyncRead + Unpin,
    {
        let limit = self.config.io_timeout;
        let mut buf = vec![0u8; PAYLOAD_CHUNK_SIZE.min(size as usize).max(1)];
        let mut sent = 0u64;

        while sent < size {
            let want = (size - sent).min(buf.len() as u64) as usize;
            let n = source.read(&mut buf[..want]).await?;
            if n == 0 {
                break;
            }
            deadline(limit, self.inner.write_all(&buf[..n])).await?;
            sent += n as u64;
        }
        deadline(limit, self.inner.flush()).await?;
        Ok(sent)
    }

    /// Receive up to `size` raw payload bytes into `sink`.
    ///
    /// Returns the number of bytes received; fewer than `size` means the
    /// peer closed the stream early.
    pub async fn read_payload<W>(&mut self, sink: &mut W, size: u64) -> Result<u64, SyncError>
    where
        W: AsyncWrite + Unpin,
    {
        let limit = self.config.io_timeout;
        let mut buf = vec![0u8; PAYLOAD_CHUNK_SIZE.min(size as usize).max(1)];
        let mut received = 0u64;

        while received < size {
            let want = (size - received).min(buf.len() as u64) as usize;
            let n = match deadline(limit, self.inner.read(&mut buf[..want])).await {
                Ok(n) => n,
                // A reset after some bytes is the same observable outcome as EOF.
                Err(SyncError::Io(e)) if is_disconnect(&e) => 0,
                Err(e) => return Err(e),
            };
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n]).await?;
            received += n as u64;
        }
        sink.flush().await?;
        Ok(received)
    }

    /// Close the write half. Errors are ignored: the exchange is over.
    pub async fn shutdown(&mut self) {
        let limit = self.config.io_timeout;
        if let Err(e) = deadline(limit, self.inner.shutdown()).await {
            tracing::trace!("shutdown failed: {}", e);
        }
    }
}

async fn deadline<T, F>(limit: Duration, fut: F) -> Result<T, SyncError>
where
    F: Future<Output = std::io::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res.map_err(SyncError::Io),
        Err(_) => Err(SyncError::Timeout),
    }
}

fn eof_as_framing(err: SyncError, what: &str) -> SyncError {
    match err {
        SyncError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            SyncError::Framing(what.to_string())
        }
        other => other,
    }
}

fn is_disconnect(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{FileEntry, ListResponse, PullResponse, PushRequest};

    fn framed(s: tokio::io::DuplexStream) -> FramedStream<tokio::io::DuplexStream> {
        FramedStream::new(s, FrameConfig::default())
    }

    // ===========================================
    // Buffer-level codec
    // ===========================================

    #[test]
    fn encode_writes_big_endian_length() {
        let frame = Codec::encode(&Message::ListRequest, DEFAULT_MAX_MESSAGE_SIZE).unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - LENGTH_PREFIX_SIZE);
    }

    #[test]
    fn decode_reports_consumed_bytes() {
        let msg = Message::PushRequest(PushRequest {
            path: "a/b.txt".into(),
            size: 0,
            mtime: 12.5,
        });
        let mut data = Codec::encode(&msg, DEFAULT_MAX_MESSAGE_SIZE).unwrap();
        let frame_len = data.len();
        // Trailing bytes belong to whatever follows (e.g. a raw payload).
        data.extend_from_slice(b"payload");

        let (decoded, consumed) = Codec::decode(&data, DEFAULT_MAX_MESSAGE_SIZE).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(consumed, frame_len);
    }

    #[test]
    fn decode_truncated_prefix() {
        let err = Codec::decode(&[0, 0, 0], DEFAULT_MAX_MESSAGE_SIZE).unwrap_err();
        assert!(matches!(err, SyncError::Framing(_)));
    }

    #[test]
    fn decode_truncated_body() {
        let frame = Codec::encode(&Message::ack_ok(), DEFAULT_MAX_MESSAGE_SIZE).unwrap();
        let err = Codec::decode(&frame[..frame.len() - 1], DEFAULT_MAX_MESSAGE_SIZE).unwrap_err();
        assert!(matches!(err, SyncError::Framing(_)));
    }

    #[test]
    fn decode_zero_length() {
        let err = Codec::decode(&[0, 0, 0, 0], DEFAULT_MAX_MESSAGE_SIZE).unwrap_err();
        assert!(matches!(err, SyncError::Framing(_)));
    }

    #[test]
    fn decode_rejects_oversized_declaration() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0x00];
        let err = Codec::decode(&data, 1024).unwrap_err();
        assert!(matches!(err, SyncError::MessageTooLarge { max: 1024, .. }));
    }

    #[test]
    fn encode_rejects_oversized_message() {
        let msg = Message::ListResponse(ListResponse {
            files: (0..100)
                .map(|i| FileEntry::new(format!("file-{i}"), i, 0.0))
                .collect(),
        });
        let err = Codec::encode(&msg, 64).unwrap_err();
        assert!(matches!(err, SyncError::MessageTooLarge { .. }));
    }

    // ===========================================
    // Stream-level framing
    // ===========================================

    #[tokio::test]
    async fn send_and_recv_over_stream() {
        let (a, b) = tokio::io::duplex(64);
        let mut client = framed(a);
        let mut server = framed(b);

        let msg = Message::ListResponse(ListResponse {
            files: vec![FileEntry::new("big.bin", 1 << 40, 1_705_000_000.5)],
        });

        // Small duplex buffer forces the frame across many reads.
        let sent = msg.clone();
        let writer = tokio::spawn(async move { client.send(&sent).await });
        let received = server.recv().await.unwrap();
        writer.await.unwrap().unwrap();

        assert_eq!(received, msg);
    }

    #[tokio::test]
    async fn payload_follows_header_on_same_stream() {
        let (a, b) = tokio::io::duplex(1024);
        let mut sender = framed(a);
        let mut receiver = framed(b);

        let content = b"hello, peer".to_vec();
        let header = Message::PullResponse(PullResponse {
            path: "greeting.txt".into(),
            size: content.len() as u64,
            mtime: 1.0,
        });
        sender.send(&header).await.unwrap();
        let written = sender
            .write_payload(&mut content.as_slice(), content.len() as u64)
            .await
            .unwrap();
        assert_eq!(written, content.len() as u64);
        sender.send(&Message::ack_ok()).await.unwrap();

        let size = match receiver.recv().await.unwrap() {
            Message::PullResponse(r) => r.size,
            other => panic!("unexpected {:?}", other),
        };
        let mut sink = Vec::new();
        let got = receiver.read_payload(&mut sink, size).await.unwrap();
        assert_eq!(got, size);
        assert_eq!(sink, content);

        // The next frame decodes cleanly after the payload.
        assert!(matches!(receiver.recv().await.unwrap(), Message::Ack(_)));
    }

    #[tokio::test]
    async fn write_payload_stops_at_declared_size() {
        let (a, b) = tokio::io::duplex(1024);
        let mut sender = framed(a);
        let mut receiver = framed(b);

        let source = vec![7u8; 100];
        let written = sender.write_payload(&mut source.as_slice(), 40).await.unwrap();
        assert_eq!(written, 40);
        drop(sender);

        let mut sink = Vec::new();
        let got = receiver.read_payload(&mut sink, 1000).await.unwrap();
        assert_eq!(got, 40);
    }

    #[tokio::test]
    async fn write_payload_reports_short_source() {
        let (a, _b) = tokio::io::duplex(1024);
        let mut sender = framed(a);

        let source = vec![1u8; 10];
        let written = sender.write_payload(&mut source.as_slice(), 50).await.unwrap();
        assert_eq!(written, 10);
    }

    #[tokio::test]
    async fn read_payload_reports_early_close() {
        let (a, b) = tokio::io::duplex(1024);
        let mut sender = framed(a);
        let mut receiver = framed(b);

        sender.write_payload(&mut &b"abc"[..], 3).await.unwrap();
        drop(sender);

        let mut sink = Vec::new();
        let got = receiver.read_payload(&mut sink, 10).await.unwrap();
        assert_eq!(got, 3);
        assert_eq!(sink, b"abc");
    }

    #[tokio::test]
    async fn zero_size_payload_reads_nothing() {
        let (_a, b) = tokio::io::duplex(16);
        let mut receiver = framed(b);

        let mut sink = Vec::new();
        let got = receiver.read_payload(&mut sink, 0).await.unwrap();
        assert_eq!(got, 0);
    }

    // ===========================================
    // Error Condition Tests
    // ===========================================

    #[tokio::test]
    async fn recv_on_closed_stream_is_framing_error() {
        let (a, b) = tokio::io::duplex(64);
        drop(a);
        let mut receiver = framed(b);

        let err = receiver.recv().await.unwrap_err();
        assert!(matches!(err, SyncError::Framing(_)));
    }

    #[tokio::test]
    async fn recv_truncated_body_is_framing_error() {
        let (mut a, b) = tokio::io::duplex(64);
        let frame = Codec::encode(&Message::ack_ok(), DEFAULT_MAX_MESSAGE_SIZE).unwrap();
        a.write_all(&frame[..frame.len() - 2]).await.unwrap();
        drop(a);

        let mut receiver = framed(b);
        let err = receiver.recv().await.unwrap_err();
        assert!(matches!(err, SyncError::Framing(_)));
    }

    #[tokio::test]
    async fn recv_rejects_oversized_frame_without_reading_body() {
        let (mut a, b) = tokio::io::duplex(64);
        a.write_all(&(1u32 << 30).to_be_bytes()).await.unwrap();

        let mut receiver = FramedStream::new(
            b,
            FrameConfig {
                max_message_size: 1024,
                ..FrameConfig::default()
            },
        );
        let err = receiver.recv().await.unwrap_err();
        assert!(matches!(err, SyncError::MessageTooLarge { .. }));
    }

    #[tokio::test]
    async fn recv_times_out_on_silent_peer() {
        let (_a, b) = tokio::io::duplex(64);
        let mut receiver = FramedStream::new(
            b,
            FrameConfig {
                io_timeout: Duration::from_millis(50),
                ..FrameConfig::default()
            },
        );

        let err = receiver.recv().await.unwrap_err();
        assert!(matches!(err, SyncError::Timeout));
    }
}

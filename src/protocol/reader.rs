//! Timeout-bounded frame I/O on an async byte stream.
//!
//! [`read_frame`] reads the length byte, then exactly that many further
//! bytes. Both reads are bounded by the link timeout; a frame that is only
//! partially received when the timeout fires is a timeout failure, never a
//! speculative decode.
//!
//! [`discard_pending`] drops whatever is already buffered without waiting,
//! so a reply that arrived after its read timed out is never taken as the
//! answer to the next request.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::wire_format::LENGTH_PREFIX_SIZE;
use super::Frame;
use crate::error::{LinkError, Result};

/// Read one complete frame, waiting at most `timeout` for each part.
///
/// # Errors
///
/// - `Timeout` if the length byte or the frame body does not arrive in time
/// - `Io` if the stream fails or reaches EOF
/// - `Protocol` / `UnknownMessageType` for a malformed frame
pub async fn read_frame<R>(reader: &mut R, timeout: Duration) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut len = [0u8; LENGTH_PREFIX_SIZE];
    tokio::time::timeout(timeout, reader.read_exact(&mut len))
        .await
        .map_err(|_| LinkError::Timeout(timeout))??;

    let len = len[0] as usize;
    if len == 0 {
        return Err(LinkError::Protocol(
            "Length byte 0 leaves no room for a type byte".to_string(),
        ));
    }

    let mut body = vec![0u8; len];
    tokio::time::timeout(timeout, reader.read_exact(&mut body))
        .await
        .map_err(|_| LinkError::Timeout(timeout))??;

    Frame::decode_body(&body)
}

/// Drop every byte that can be read without waiting. Returns the number of
/// bytes discarded.
///
/// End of stream is not an error here; the next write or read reports it.
pub async fn discard_pending<R>(reader: &mut R) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 64];
    let mut discarded = 0;
    loop {
        // A zero timeout polls the read once and gives up if it would block.
        match tokio::time::timeout(Duration::ZERO, reader.read(&mut buf)).await {
            Ok(Ok(0)) | Err(_) => return Ok(discarded),
            Ok(Ok(n)) => discarded += n,
            Ok(Err(e)) => return Err(e.into()),
        }
    }
}

/// Write one frame and flush it. Writes carry no timeout.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = frame.encode()?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MessageType;
    use tokio::io::duplex;

    const TIMEOUT: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn test_read_complete_frame() {
        let (mut host, mut device) = duplex(64);
        device.write_all(&[2, 4, 15]).await.unwrap();

        let frame = read_frame(&mut host, TIMEOUT).await.unwrap();
        assert!(frame.is(MessageType::Sync));
        assert_eq!(frame.payload(), &[15]);
    }

    #[tokio::test]
    async fn test_read_consecutive_frames() {
        let (mut host, mut device) = duplex(64);
        device.write_all(&[1, 2, 2, 4, 7]).await.unwrap();

        let first = read_frame(&mut host, TIMEOUT).await.unwrap();
        let second = read_frame(&mut host, TIMEOUT).await.unwrap();
        assert!(first.is(MessageType::Ack));
        assert!(second.is(MessageType::Sync));
        assert_eq!(second.payload(), &[7]);
    }

    #[tokio::test]
    async fn test_no_length_byte_times_out() {
        let (mut host, _device) = duplex(64);

        let result = read_frame(&mut host, TIMEOUT).await;
        assert!(matches!(result, Err(LinkError::Timeout(t)) if t == TIMEOUT));
    }

    #[tokio::test]
    async fn test_short_body_times_out() {
        let (mut host, mut device) = duplex(64);
        // Claims 4 bytes, delivers 2.
        device.write_all(&[4, 4, 49]).await.unwrap();

        let result = read_frame(&mut host, TIMEOUT).await;
        assert!(matches!(result, Err(LinkError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_closed_stream_is_io_error() {
        let (mut host, device) = duplex(64);
        drop(device);

        let result = read_frame(&mut host, TIMEOUT).await;
        assert!(matches!(result, Err(LinkError::Io(_))));
    }

    #[tokio::test]
    async fn test_zero_length_byte() {
        let (mut host, mut device) = duplex(64);
        device.write_all(&[0]).await.unwrap();

        let result = read_frame(&mut host, TIMEOUT).await;
        assert!(matches!(result, Err(LinkError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_discard_pending_drops_buffered_bytes() {
        let (mut host, mut device) = duplex(64);
        // A late ACK and half of a SYNC.
        device.write_all(&[1, 2, 2, 4]).await.unwrap();

        assert_eq!(discard_pending(&mut host).await.unwrap(), 4);

        device.write_all(&[1, 3]).await.unwrap();
        let frame = read_frame(&mut host, TIMEOUT).await.unwrap();
        assert!(frame.is(MessageType::Nack));
    }

    #[tokio::test]
    async fn test_discard_pending_does_not_wait() {
        let (mut host, _device) = duplex(64);

        let started = tokio::time::Instant::now();
        assert_eq!(discard_pending(&mut host).await.unwrap(), 0);
        assert!(started.elapsed() < TIMEOUT);
    }

    #[tokio::test]
    async fn test_discard_pending_at_end_of_stream() {
        let (mut host, device) = duplex(64);
        drop(device);

        assert_eq!(discard_pending(&mut host).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_write_frame() {
        let (mut host, mut device) = duplex(64);
        write_frame(&mut host, &Frame::empty(MessageType::Conn))
            .await
            .unwrap();

        let mut buf = [0u8; 2];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [1, 1]);
    }
}

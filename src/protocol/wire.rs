//! Transfer primitives: framed exchange of a file name, a file size, and
//! raw payload bytes over an ordered byte stream.
//!
//! Text tokens are UTF-8 terminated by a single `\n`; the payload is raw
//! bytes moved in bounded chunks. The stream is not message-oriented, so
//! every receive here tolerates short and coalesced reads. There are no
//! retries: the first failure aborts and is reported to the caller.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::constants::TOKEN_DELIMITER;
use crate::protocol::error::ProtocolError;

/// Write one text token followed by the delimiter.
pub async fn send_token<W>(writer: &mut W, token: &str) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(token.as_bytes()).await?;
    writer.write_all(&[TOKEN_DELIMITER]).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one delimiter-terminated token of at most `max_len` bytes.
///
/// Reads a byte at a time so nothing past the delimiter is consumed; the
/// tokens on this wire are all short. A stream that closes before the
/// delimiter arrives yields `ConnectionClosed`.
pub async fn recv_token<R>(reader: &mut R, max_len: usize) -> Result<String, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = reader.read(&mut byte).await?;
        if n == 0 {
            return Err(ProtocolError::ConnectionClosed);
        }
        if byte[0] == TOKEN_DELIMITER {
            break;
        }
        if buf.len() >= max_len {
            return Err(ProtocolError::TokenTooLong(max_len));
        }
        buf.push(byte[0]);
    }
    String::from_utf8(buf).map_err(|_| ProtocolError::InvalidToken)
}

pub async fn send_name<W>(writer: &mut W, name: &str) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    send_token(writer, name).await
}

pub async fn recv_name<R>(reader: &mut R, max_len: usize) -> Result<String, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    recv_token(reader, max_len).await
}

/// Transmit a file size as decimal text.
pub async fn send_size<W>(writer: &mut W, size: u64) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    send_token(writer, &size.to_string()).await
}

/// Receive a file size. Returns the parsed value together with the raw
/// token, which the client echoes back verbatim.
pub async fn recv_size<R>(reader: &mut R, max_len: usize) -> Result<(u64, String), ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let token = recv_token(reader, max_len).await?;
    let size = token
        .trim()
        .parse::<u64>()
        .map_err(|_| ProtocolError::MalformedSize(token.clone()))?;
    Ok((size, token))
}

/// Stream `data` in writes of at most `chunk_size` bytes.
pub async fn send_payload<W>(
    writer: &mut W,
    data: &[u8],
    chunk_size: usize,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    for chunk in data.chunks(chunk_size.max(1)) {
        writer.write_all(chunk).await?;
    }
    writer.flush().await?;
    Ok(())
}

/// Read exactly `size` bytes, issuing reads of at most `chunk_size` bytes
/// and accumulating across short reads. A stream that closes early yields
/// `TruncatedTransfer` with the byte counts.
pub async fn recv_payload<R>(
    reader: &mut R,
    size: u64,
    chunk_size: usize,
) -> Result<Vec<u8>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let total = size as usize;
    let mut data = Vec::with_capacity(total);
    let mut buf = vec![0u8; chunk_size.max(1)];
    while data.len() < total {
        let want = buf.len().min(total - data.len());
        let n = reader.read(&mut buf[..want]).await?;
        if n == 0 {
            return Err(ProtocolError::TruncatedTransfer {
                expected: size,
                received: data.len() as u64,
            });
        }
        data.extend_from_slice(&buf[..n]);
    }
    Ok(data)
}

/// Apply an optional deadline to one wire operation. `None` means block
/// indefinitely, preserving the original no-timeout behavior when the
/// operator disables the policy.
pub async fn with_deadline<T, F>(deadline: Option<Duration>, op: F) -> Result<T, ProtocolError>
where
    F: Future<Output = Result<T, ProtocolError>>,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, op)
            .await
            .map_err(|_| ProtocolError::Timeout)?,
        None => op.await,
    }
}

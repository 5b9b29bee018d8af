//! RPC message framing as specified in RFC 5531 (previously RFC 1057 section 10).
//!
//! This module implements the Record Marking Standard for sending RPC messages
//! over TCP connections:
//!
//! - each record travels as one or more fragments;
//! - every fragment is prefixed by a 4-byte header whose lower 31 bits hold the
//!   fragment length and whose highest bit marks the last fragment of a record.
//!
//! Datagram transports carry one message per datagram and skip this layer.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::protocol::rpc;
use crate::{Error, Result};

/// Maximum fragment size is 2^31 - 1 bytes
const MAX_FRAGMENT_SIZE: usize = (1 << 31) - 1;

/// Highest bit of the fragment header.
const LAST_FRAGMENT: u32 = 1 << 31;

/// Reads a single record-marked fragment from a stream
///
/// This function:
/// 1. Reads the 4-byte header from the socket
/// 2. Extracts the fragment length (lower 31 bits) and last-fragment flag (highest bit)
/// 3. Reads exactly that many bytes from the socket
/// 4. Appends the read data to the provided buffer
///
/// Returns true if this was the last fragment in the RPC record, false otherwise.
pub async fn read_fragment<R>(socket: &mut R, append_to: &mut Vec<u8>) -> Result<bool>
where
    R: AsyncRead + Unpin,
{
    let mut header_buf = [0_u8; 4];
    socket.read_exact(&mut header_buf).await?;
    let fragment_header = u32::from_be_bytes(header_buf);
    let is_last = (fragment_header & LAST_FRAGMENT) > 0;
    let length = (fragment_header & !LAST_FRAGMENT) as usize;
    trace!("Reading fragment length:{}, last:{}", length, is_last);
    if append_to.len().saturating_add(length) > rpc::MAX_RPC_RECORD_LENGTH {
        return Err(Error::MalformedReply(format!(
            "RPC record length {} exceeds max {}",
            append_to.len().saturating_add(length),
            rpc::MAX_RPC_RECORD_LENGTH
        )));
    }
    let start_offset = append_to.len();
    append_to.resize(start_offset + length, 0);
    socket.read_exact(&mut append_to[start_offset..]).await?;
    Ok(is_last)
}

/// Reads fragments until the one carrying the last-fragment flag and
/// returns the reassembled record.
pub async fn read_record<R>(socket: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut record = Vec::new();
    while !read_fragment(socket, &mut record).await? {}
    Ok(record)
}

/// Writes data as record-marked fragments to a stream
///
/// The function:
/// 1. Divides large buffers into fragments of at most 2^31 - 1 bytes
/// 2. Prefixes each fragment with a 4-byte header
///    - The lower 31 bits contain the fragment length
///    - The highest bit indicates if this is the last fragment (1=last, 0=more)
/// 3. Writes both header and data to the socket
///
/// An empty buffer still goes out as one empty last fragment.
pub async fn write_fragment<W>(socket: &mut W, buf: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if buf.len() > rpc::MAX_RPC_RECORD_LENGTH {
        return Err(Error::InvalidArgument(format!(
            "RPC record length {} exceeds max {}",
            buf.len(),
            rpc::MAX_RPC_RECORD_LENGTH
        )));
    }

    let mut offset = 0;
    loop {
        let remaining = buf.len() - offset;
        let fragment_size = std::cmp::min(remaining, MAX_FRAGMENT_SIZE);
        let is_last = offset + fragment_size >= buf.len();

        let fragment_header =
            if is_last { fragment_size as u32 | LAST_FRAGMENT } else { fragment_size as u32 };

        socket.write_all(&fragment_header.to_be_bytes()).await?;
        trace!("Writing fragment length:{}, last:{}", fragment_size, is_last);
        socket.write_all(&buf[offset..offset + fragment_size]).await?;

        offset += fragment_size;
        if is_last {
            break;
        }
    }
    socket.flush().await?;

    Ok(())
}

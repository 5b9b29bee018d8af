//! File streams layered over READ, WRITE and COMMIT.
//!
//! The server keeps no per-stream state: a stream is a handle plus a
//! client-side offset. Streams are not meant to be shared between tasks;
//! each call advances the offset, so concurrent use would interleave.
//!
//! Both streams also implement the tokio I/O traits, so they work with
//! `tokio::io::copy` and the `AsyncReadExt`/`AsyncWriteExt` helpers.
//! `shutdown` on a [`FileWriter`] does what [`FileWriter::close`] does. Mixing
//! the inherent async methods with the trait methods on one stream while a
//! trait call is still pending is not supported.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::{debug, warn};

use crate::handle::FileHandle;
use crate::protocol::nfs::v3;
use crate::protocol::xdr::nfs3::file::{
    stable_how, COMMIT3args, READ3args, WRITE3args, WRITE3resok,
};
use crate::protocol::xdr::nfs3::writeverf3;
use crate::target::Target;
use crate::{Error, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum StreamState {
    Open,
    /// `poll_shutdown` has started and may still be committing.
    Closing,
    Closed,
}

/// An RPC started from a `poll_*` method, kept until it completes.
struct InFlight<T>(Pin<Box<dyn Future<Output = Result<T>> + Send>>);

impl<T> InFlight<T> {
    fn new(op: impl Future<Output = Result<T>> + Send + 'static) -> Self {
        InFlight(Box::pin(op))
    }

    fn poll(&mut self, cx: &mut Context<'_>) -> Poll<Result<T>> {
        self.0.as_mut().poll(cx)
    }
}

impl<T> fmt::Debug for InFlight<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InFlight")
    }
}

/// Sequential reader over one file.
#[derive(Debug)]
pub struct FileReader {
    target: Target,
    handle: FileHandle,
    offset: u64,
    state: StreamState,
    reading: Option<InFlight<(Vec<u8>, bool)>>,
}

impl FileReader {
    pub(crate) fn new(target: Target, handle: FileHandle) -> FileReader {
        FileReader { target, handle, offset: 0, state: StreamState::Open, reading: None }
    }

    pub fn handle(&self) -> &FileHandle {
        &self.handle
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.ensure_open()?;
        self.offset = offset;
        self.reading = None;
        Ok(())
    }

    /// Reads at most one chunk into `buf` and advances the offset by the
    /// bytes returned. `Ok(0)` means end of file.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        if buf.is_empty() {
            return Ok(0);
        }
        let count = buf.len().min(self.target.read_size() as usize);
        let (data, _) = self.read_chunk(count as u32).await?;
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }

    /// Reads from the offset to the end of the file, appending to `out`.
    /// Returns the number of bytes appended.
    pub async fn read_to_end(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        self.ensure_open()?;
        let start = out.len();
        loop {
            let (data, eof) = self.read_chunk(self.target.read_size()).await?;
            let done = eof || data.is_empty();
            out.extend_from_slice(&data);
            if done {
                return Ok(out.len() - start);
            }
        }
    }

    /// Closes the stream. Any further call fails with [`Error::StreamClosed`].
    pub async fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.state = StreamState::Closed;
        self.reading = None;
        Ok(())
    }

    async fn read_chunk(&mut self, count: u32) -> Result<(Vec<u8>, bool)> {
        let res = read_at(self.target.clone(), self.handle.clone(), self.offset, count).await?;
        self.offset += res.0.len() as u64;
        Ok(res)
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            StreamState::Open => Ok(()),
            StreamState::Closing | StreamState::Closed => Err(Error::StreamClosed),
        }
    }
}

impl AsyncRead for FileReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.ensure_open()?;
        if this.reading.is_none() {
            if buf.remaining() == 0 {
                return Poll::Ready(Ok(()));
            }
            let count = buf.remaining().min(this.target.read_size() as usize) as u32;
            let op = read_at(this.target.clone(), this.handle.clone(), this.offset, count);
            this.reading = Some(InFlight::new(op));
        }
        let Some(op) = this.reading.as_mut() else {
            return Poll::Ready(Ok(()));
        };
        let res = ready!(op.poll(cx));
        this.reading = None;
        let (data, _) = res?;
        // The caller may come back with a smaller buffer than the one the
        // READ was sized for; the rest is fetched again next time.
        let n = data.len().min(buf.remaining());
        buf.put_slice(&data[..n]);
        this.offset += n as u64;
        Poll::Ready(Ok(()))
    }
}

/// One READ at `offset`. Returns the data and the EOF flag.
async fn read_at(
    target: Target,
    handle: FileHandle,
    offset: u64,
    count: u32,
) -> Result<(Vec<u8>, bool)> {
    target.ensure_open()?;
    let args = READ3args { file: handle.to_nfs(), offset, count };
    let res = v3::nfsproc3_read(target.client(), target.auth(), &args).await?;
    if res.data.len() > count as usize {
        return Err(Error::MalformedReply(format!(
            "READ of {count} bytes returned {}",
            res.data.len()
        )));
    }
    Ok((res.data, res.eof))
}

/// Sequential writer over one file.
///
/// Over a stream transport every WRITE asks for `FILE_SYNC`. Over a datagram
/// transport WRITEs are `UNSTABLE` and [`FileWriter::close`] COMMITs them;
/// it also COMMITs whenever a server answered with weaker stability than
/// requested.
#[derive(Debug)]
pub struct FileWriter {
    target: Target,
    handle: FileHandle,
    offset: u64,
    stable: stable_how,
    needs_commit: bool,
    verf: Option<writeverf3>,
    requested: u64,
    written: u64,
    short: bool,
    state: StreamState,
    writing: Option<InFlight<(usize, WRITE3resok)>>,
    committing: Option<InFlight<writeverf3>>,
}

impl FileWriter {
    pub(crate) fn new(target: Target, handle: FileHandle) -> FileWriter {
        let stable = if target.client().is_datagram() {
            stable_how::UNSTABLE
        } else {
            stable_how::FILE_SYNC
        };
        FileWriter {
            target,
            handle,
            offset: 0,
            stable,
            needs_commit: false,
            verf: None,
            requested: 0,
            written: 0,
            short: false,
            state: StreamState::Open,
            writing: None,
            committing: None,
        }
    }

    pub fn handle(&self) -> &FileHandle {
        &self.handle
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.ensure_open()?;
        self.offset = offset;
        Ok(())
    }

    /// Sends at most one chunk of `buf` and returns how many bytes the server
    /// accepted. Fewer than were sent is remembered and fails
    /// [`FileWriter::close`].
    pub async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        if buf.is_empty() {
            return Ok(0);
        }
        let chunk = &buf[..buf.len().min(self.target.write_size() as usize)];
        self.write_chunk(chunk).await
    }

    /// Writes the whole of `buf`, failing as soon as the server accepts less
    /// than a chunk it was sent.
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.ensure_open()?;
        let size = self.target.write_size() as usize;
        let mut sent = 0;
        for chunk in buf.chunks(size) {
            let n = self.write_chunk(chunk).await?;
            sent += n;
            if n < chunk.len() {
                return Err(Error::ShortWrite {
                    requested: buf.len() as u64,
                    written: sent as u64,
                });
            }
        }
        Ok(())
    }

    /// Commits unstable data and closes the stream.
    ///
    /// The stream is closed even when the COMMIT fails. A short write seen
    /// earlier is reported here as [`Error::ShortWrite`].
    pub async fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.state = StreamState::Closed;
        if self.commit_needed() {
            let verf = commit(self.target.clone(), self.handle.clone()).await?;
            debug!(handle = ?self.handle, "committed");
            self.note_verifier(verf);
        }
        self.short_write_result()
    }

    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<usize> {
        let op = write_at(
            self.target.clone(),
            self.handle.clone(),
            self.offset,
            self.stable,
            chunk.to_vec(),
        );
        let (sent, res) = op.await?;
        self.record_write(sent, &res)
    }

    /// Books a WRITE reply: offset, counters, stability and verifier.
    fn record_write(&mut self, sent: usize, res: &WRITE3resok) -> Result<usize> {
        let accepted = res.count as usize;
        if accepted > sent {
            return Err(Error::MalformedReply(format!(
                "WRITE of {sent} bytes reported {accepted} written"
            )));
        }
        if res.committed < stable_how::FILE_SYNC {
            self.needs_commit = true;
        }
        self.note_verifier(res.verf);

        self.requested += sent as u64;
        self.written += accepted as u64;
        self.offset += accepted as u64;
        if accepted < sent {
            warn!(offset = self.offset, sent, accepted, "short write");
            self.short = true;
        }
        Ok(accepted)
    }

    fn commit_needed(&self) -> bool {
        self.needs_commit || self.stable != stable_how::FILE_SYNC
    }

    fn short_write_result(&self) -> Result<()> {
        if self.short {
            return Err(Error::ShortWrite { requested: self.requested, written: self.written });
        }
        Ok(())
    }

    fn note_verifier(&mut self, verf: writeverf3) {
        match self.verf {
            Some(seen) if seen != verf => {
                warn!(
                    handle = ?self.handle,
                    "write verifier changed; the server restarted and unstable data may be lost"
                );
                self.verf = Some(verf);
            }
            Some(_) => {}
            None => self.verf = Some(verf),
        }
    }

    /// Drives a WRITE started by `poll_write` to completion. `Ready(Ok(0))`
    /// when none is pending.
    fn poll_writing(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<usize>> {
        let Some(op) = self.writing.as_mut() else {
            return Poll::Ready(Ok(0));
        };
        let res = ready!(op.poll(cx));
        self.writing = None;
        let (sent, res) = res?;
        Poll::Ready(self.record_write(sent, &res).map_err(io::Error::from))
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            StreamState::Open => Ok(()),
            StreamState::Closing | StreamState::Closed => Err(Error::StreamClosed),
        }
    }
}

impl AsyncWrite for FileWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.writing.is_none() {
            this.ensure_open()?;
            if buf.is_empty() {
                return Poll::Ready(Ok(0));
            }
            let len = buf.len().min(this.target.write_size() as usize);
            let op = write_at(
                this.target.clone(),
                this.handle.clone(),
                this.offset,
                this.stable,
                buf[..len].to_vec(),
            );
            this.writing = Some(InFlight::new(op));
        }
        this.poll_writing(cx)
    }

    /// Every WRITE is sent before `poll_write` returns, so there is nothing
    /// buffered beyond a pending WRITE.
    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_writing(cx))?;
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_writing(cx))?;
        match this.state {
            StreamState::Open => {
                this.state = StreamState::Closing;
                if this.commit_needed() {
                    let op = commit(this.target.clone(), this.handle.clone());
                    this.committing = Some(InFlight::new(op));
                }
            }
            StreamState::Closing => {}
            StreamState::Closed => return Poll::Ready(Err(Error::StreamClosed.into())),
        }
        if let Some(op) = this.committing.as_mut() {
            let res = ready!(op.poll(cx));
            this.committing = None;
            this.state = StreamState::Closed;
            let verf = res?;
            debug!(handle = ?this.handle, "committed");
            this.note_verifier(verf);
        }
        this.state = StreamState::Closed;
        Poll::Ready(this.short_write_result().map_err(io::Error::from))
    }
}

/// One WRITE at `offset`. Returns the number of bytes sent with the reply.
async fn write_at(
    target: Target,
    handle: FileHandle,
    offset: u64,
    stable: stable_how,
    data: Vec<u8>,
) -> Result<(usize, WRITE3resok)> {
    target.ensure_open()?;
    let sent = data.len();
    let args = WRITE3args { file: handle.to_nfs(), offset, count: sent as u32, stable, data };
    let res = v3::nfsproc3_write(target.client(), target.auth(), &args).await?;
    Ok((sent, res))
}

/// COMMITs the whole file and returns the server's write verifier.
async fn commit(target: Target, handle: FileHandle) -> Result<writeverf3> {
    target.ensure_open()?;
    let args = COMMIT3args { file: handle.to_nfs(), offset: 0, count: 0 };
    let res = v3::nfsproc3_commit(target.client(), target.auth(), &args).await?;
    Ok(res.verf)
}

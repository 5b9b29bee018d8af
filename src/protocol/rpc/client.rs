//! The calling side of an ONC RPC connection.
//!
//! One [`RpcClient`] owns one transport. Any number of tasks may issue calls
//! through it concurrently:
//!
//! - records are queued to a single writer task that owns the write side,
//!   so bytes of two calls never interleave and a caller that gives up never
//!   leaves half a record on the wire;
//! - a background reader task pulls whole replies off the transport and
//!   routes each one by XID through the [`TransactionTracker`];
//! - a caller that times out withdraws its XID, so a late reply is logged
//!   and dropped rather than handed to someone else.

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::transaction_tracker::PendingCall;
use super::{wire, Auth, TransactionTracker, MAX_DATAGRAM_LENGTH, MAX_RPC_RECORD_LENGTH};
use crate::protocol::xdr::rpc::{accept_body, rejected_reply, reply_body, rpc_body, rpc_msg};
use crate::protocol::xdr::{self, Deserialize, Serialize};
use crate::transport::{self, DialOptions, Transport};
use crate::{Error, Result, RpcError};

/// Attempts at finding an XID not already in flight before giving up.
const XID_ATTEMPTS: usize = 16;

enum Sink {
    Stream(OwnedWriteHalf),
    Datagram(Arc<UdpSocket>),
}

/// A record waiting for the writer task, with a slot for the send outcome.
struct Outgoing {
    record: Vec<u8>,
    sent: oneshot::Sender<Result<()>>,
}

struct Shared {
    tracker: TransactionTracker,
    next_xid: AtomicU32,
    closed: AtomicBool,
}

/// A connection to one RPC endpoint.
pub struct RpcClient {
    shared: Arc<Shared>,
    queue: mpsc::UnboundedSender<Outgoing>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    peer: SocketAddr,
    datagram: bool,
    timeout: Duration,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("peer", &self.peer)
            .field("datagram", &self.datagram)
            .field("timeout", &self.timeout)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl RpcClient {
    /// Connects to `host:port`. `timeout` bounds the connection setup and is
    /// also the default wait for each reply.
    pub async fn dial(
        host: &str,
        port: u16,
        use_datagram: bool,
        timeout: Duration,
    ) -> Result<RpcClient> {
        let opts = DialOptions { datagram: use_datagram, timeout, privileged_port: false };
        Self::dial_with(host, port, &opts).await
    }

    pub async fn dial_with(host: &str, port: u16, opts: &DialOptions) -> Result<RpcClient> {
        match transport::dial(host, port, opts).await? {
            Transport::Stream(stream) => Self::from_stream(stream, opts.timeout),
            Transport::Datagram(socket) => Self::from_datagram(socket, opts.timeout),
        }
    }

    /// Wraps an already connected TCP stream.
    pub fn from_stream(stream: TcpStream, timeout: Duration) -> Result<RpcClient> {
        let peer = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();
        let shared = Shared::new();
        let reader = tokio::spawn(read_stream(read_half, shared.clone()));
        Ok(Self::assemble(shared, Sink::Stream(write_half), reader, peer, timeout))
    }

    /// Wraps an already connected UDP socket.
    pub fn from_datagram(socket: UdpSocket, timeout: Duration) -> Result<RpcClient> {
        let peer = socket.peer_addr()?;
        let socket = Arc::new(socket);
        let shared = Shared::new();
        let reader = tokio::spawn(read_datagrams(socket.clone(), shared.clone()));
        Ok(Self::assemble(shared, Sink::Datagram(socket), reader, peer, timeout))
    }

    fn assemble(
        shared: Arc<Shared>,
        sink: Sink,
        reader: JoinHandle<()>,
        peer: SocketAddr,
        timeout: Duration,
    ) -> RpcClient {
        let datagram = matches!(sink, Sink::Datagram(_));
        let (queue, records) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_records(sink, records, shared.clone()));
        RpcClient {
            shared,
            queue,
            tasks: Mutex::new(vec![reader, writer]),
            peer,
            datagram,
            timeout,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_datagram(&self) -> bool {
        self.datagram
    }

    /// Default wait for a reply.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Number of calls currently awaiting a reply.
    pub fn in_flight(&self) -> usize {
        self.shared.tracker.in_flight()
    }

    /// Issues a call and waits up to the client's default timeout for the reply.
    pub async fn call<A, R>(
        &self,
        prog: u32,
        vers: u32,
        proc: u32,
        auth: &Auth,
        args: &A,
    ) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: Deserialize + Default,
    {
        self.call_with_timeout(prog, vers, proc, auth, args, self.timeout).await
    }

    /// Issues a call and waits up to `timeout` for the reply.
    ///
    /// On timeout the call is abandoned: the connection stays usable for
    /// every other call and a reply arriving later is discarded. A record
    /// already queued is still written out whole.
    pub async fn call_with_timeout<A, R>(
        &self,
        prog: u32,
        vers: u32,
        proc: u32,
        auth: &Auth,
        args: &A,
        timeout: Duration,
    ) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: Deserialize + Default,
    {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        let (cred, verf) = auth.encode()?;
        let mut pending = self.register()?;
        let xid = pending.xid();

        let mut record = Vec::new();
        rpc_msg::call(xid, prog, vers, proc, cred, verf)
            .serialize(&mut record)
            .map_err(Error::Xdr)?;
        args.serialize(&mut record).map_err(Error::Xdr)?;
        self.check_size(record.len())?;
        trace!(xid, prog, vers, proc, len = record.len(), "sending call");

        let (sent, outcome) = oneshot::channel();
        self.queue.send(Outgoing { record, sent }).map_err(|_| Error::ConnectionClosed)?;
        let exchange = async {
            outcome.await.unwrap_or_else(|_| Err(Error::ConnectionClosed))?;
            pending.wait().await
        };
        let reply = match tokio::time::timeout(timeout, exchange).await {
            Ok(reply) => reply?,
            Err(_) => {
                debug!(xid, prog, proc, ?timeout, "call timed out");
                return Err(Error::Timeout {
                    what: format!("reply to xid {xid:#010x} (program {prog}, procedure {proc})"),
                });
            }
        };
        drop(pending);
        decode_reply(xid, &reply)
    }

    /// Calls procedure 0 of `prog`, which every RPC program implements as a no-op.
    pub async fn null(&self, prog: u32, vers: u32) -> Result<()> {
        self.call(prog, vers, 0, &Auth::none(), &()).await
    }

    /// Tears the connection down. Calls still awaiting a reply resolve with
    /// [`Error::ConnectionClosed`].
    pub async fn close(&self) -> Result<()> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(peer = %self.peer, in_flight = self.in_flight(), "closing connection");
        self.shared.tracker.close_all();
        // Dropping the write half shuts the stream down.
        self.abort_tasks();
        Ok(())
    }

    fn abort_tasks(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            task.abort();
        }
    }

    fn register(&self) -> Result<PendingCall<'_>> {
        for _ in 0..XID_ATTEMPTS {
            let xid = self.shared.next_xid.fetch_add(1, Ordering::Relaxed);
            if let Some(pending) = self.shared.tracker.register(xid)? {
                return Ok(pending);
            }
            trace!(xid, "xid still in flight, picking another");
        }
        Err(Error::InvalidArgument("no free transaction id".into()))
    }

    /// Refuses records the writer task would have to reject after queueing.
    fn check_size(&self, len: usize) -> Result<()> {
        let (limit, what) = if self.datagram {
            (MAX_DATAGRAM_LENGTH, "a datagram")
        } else {
            (MAX_RPC_RECORD_LENGTH, "an RPC record")
        };
        if len > limit {
            return Err(Error::InvalidArgument(format!(
                "call of {len} bytes does not fit in {what}"
            )));
        }
        Ok(())
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.tracker.close_all();
        self.abort_tasks();
    }
}

impl Shared {
    fn new() -> Arc<Shared> {
        Arc::new(Shared {
            tracker: TransactionTracker::new(),
            next_xid: AtomicU32::new(initial_xid()),
            closed: AtomicBool::new(false),
        })
    }

    fn dispatch(&self, record: Vec<u8>) {
        let xid = record.get(..4).map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]));
        let Some(xid) = xid else {
            warn!(len = record.len(), "discarding record too short to carry an xid");
            return;
        };
        if !self.tracker.complete(xid, record) {
            warn!(xid, "discarding reply with no pending call");
        }
    }

    fn shut(&self, reason: &Error) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(%reason, "connection lost");
        }
        self.tracker.close_all();
    }
}

/// XIDs start from a clock-derived value so that a restarted client does not
/// replay the XIDs of its previous life to a server's duplicate request cache.
fn initial_xid() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| (d.as_secs() as u32).wrapping_mul(0x9e37_79b9) ^ d.subsec_nanos())
        .unwrap_or(1)
}

/// Writes queued records one at a time. A stream write failure tears the
/// connection down, since the peer may have seen a partial record; a failed
/// datagram only fails its own call.
async fn write_records(
    mut sink: Sink,
    mut records: mpsc::UnboundedReceiver<Outgoing>,
    shared: Arc<Shared>,
) {
    while let Some(Outgoing { record, sent }) = records.recv().await {
        if shared.closed.load(Ordering::Acquire) {
            let _ = sent.send(Err(Error::ConnectionClosed));
            break;
        }
        match &mut sink {
            Sink::Stream(half) => match wire::write_fragment(half, &record).await {
                Ok(()) => {
                    let _ = sent.send(Ok(()));
                }
                Err(e) => {
                    shared.shut(&e);
                    let _ = sent.send(Err(e));
                    break;
                }
            },
            Sink::Datagram(socket) => {
                let res = socket.send(&record).await.map(drop).map_err(Error::Io);
                let _ = sent.send(res);
            }
        }
    }
    if let Sink::Stream(mut half) = sink {
        if let Err(e) = half.shutdown().await {
            trace!(error = %e, "shutdown of write half failed");
        }
    }
    debug!("writer finished");
}

async fn read_stream(mut read_half: OwnedReadHalf, shared: Arc<Shared>) {
    loop {
        match wire::read_record(&mut read_half).await {
            Ok(record) => shared.dispatch(record),
            Err(e) => {
                shared.shut(&e);
                return;
            }
        }
    }
}

async fn read_datagrams(socket: Arc<UdpSocket>, shared: Arc<Shared>) {
    let mut buf = vec![0_u8; MAX_DATAGRAM_LENGTH + 1];
    loop {
        match socket.recv(&mut buf).await {
            Ok(n) => shared.dispatch(buf[..n].to_vec()),
            Err(e) => {
                shared.shut(&Error::Io(e));
                return;
            }
        }
    }
}

/// Decodes the reply header and, on success, the procedure results.
fn decode_reply<R: Deserialize + Default>(xid: u32, record: &[u8]) -> Result<R> {
    let mut cursor = Cursor::new(record);
    let msg = xdr::deserialize::<rpc_msg>(&mut cursor)
        .map_err(|e| Error::MalformedReply(format!("reply header for xid {xid:#010x}: {e}")))?;
    let reply = match msg.body {
        rpc_body::REPLY(reply) => reply,
        rpc_body::CALL(_) => {
            return Err(Error::MalformedReply(format!("xid {xid:#010x} answered with a call")))
        }
    };

    let refusal = match reply {
        reply_body::MSG_ACCEPTED(accepted) => match accepted.reply_data {
            accept_body::SUCCESS => return xdr::deserialize::<R>(&mut cursor).map_err(Error::Xdr),
            accept_body::PROG_UNAVAIL => RpcError::ProgUnavail,
            accept_body::PROG_MISMATCH(m) => RpcError::ProgMismatch { low: m.low, high: m.high },
            accept_body::PROC_UNAVAIL => RpcError::ProcUnavail,
            accept_body::GARBAGE_ARGS => RpcError::GarbageArgs,
            accept_body::SYSTEM_ERR => RpcError::SystemErr,
        },
        reply_body::MSG_DENIED(rejected_reply::RPC_MISMATCH(m)) => {
            RpcError::RpcMismatch { low: m.low, high: m.high }
        }
        reply_body::MSG_DENIED(rejected_reply::AUTH_ERROR(stat)) => RpcError::AuthError(stat),
    };
    debug!(xid, %refusal, "call refused");
    Err(refusal.into())
}

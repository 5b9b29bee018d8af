//! Error type shared by every layer of the client.
//!
//! Failures fall into four families, and [`Error::kind`] flattens them into
//! an [`ErrorKind`] callers can branch on:
//!
//! - transport: the server could not be reached, stopped answering, or sent
//!   something that is not a well-formed RPC reply;
//! - RPC: the server answered but refused the call ([`RpcError`]);
//! - decode: the procedure results could not be decoded;
//! - application: the NFS or MOUNT procedure ran and reported a status.
//!
//! Nothing is retried internally.

use std::io;

use thiserror::Error;

use crate::protocol::xdr::mount::mountstat3;
use crate::protocol::xdr::nfs3::{nfsstat3, NFSProgram};
use crate::protocol::xdr::rpc::auth_stat;
use crate::protocol::xdr::UnknownDiscriminant;

pub type Result<T> = std::result::Result<T, Error>;

/// RPC-level refusal decoded from the reply's accept or reject status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error("program unavailable")]
    ProgUnavail,
    #[error("program version mismatch, server supports {low}..={high}")]
    ProgMismatch { low: u32, high: u32 },
    #[error("procedure unavailable")]
    ProcUnavail,
    #[error("server could not decode the arguments")]
    GarbageArgs,
    #[error("server system error")]
    SystemErr,
    #[error("RPC version mismatch, server supports {low}..={high}")]
    RpcMismatch { low: u32, high: u32 },
    #[error("authentication failed: {0:?}")]
    AuthError(auth_stat),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("timed out waiting for {what}")]
    Timeout { what: String },
    #[error("connection closed")]
    ConnectionClosed,
    #[error("malformed reply: {0}")]
    MalformedReply(String),
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    #[error("call rejected: {0}")]
    Rpc(#[from] RpcError),
    #[error("failed to decode results: {0}")]
    Xdr(#[source] io::Error),
    #[error("NFS {proc} failed: {status:?}")]
    Nfs { proc: NFSProgram, status: nfsstat3 },
    #[error("MOUNT failed: {0:?}")]
    Mount(mountstat3),
    #[error("program {prog} version {vers} is not registered with the portmapper")]
    NotRegistered { prog: u32, vers: u32 },
    #[error("stream is closed")]
    StreamClosed,
    #[error("target is closed")]
    TargetClosed,
    #[error("short write: requested {requested} bytes, server accepted {written}")]
    ShortWrite { requested: u64, written: u64 },
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

/// Flat classification of [`Error`] for programmatic branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Timeout,
    ConnectionClosed,
    Rpc,
    Truncated,
    UnknownVariant,
    Decode,
    NotFound,
    AccessDenied,
    NoSpace,
    StaleHandle,
    Exists,
    NotDirectory,
    Nfs,
    Mount,
    Closed,
    ShortWrite,
    Config,
    InvalidArgument,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connect { .. } | Error::MalformedReply(_) | Error::Io(_) => {
                ErrorKind::Transport
            }
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::ConnectionClosed => ErrorKind::ConnectionClosed,
            Error::Rpc(_) | Error::NotRegistered { .. } => ErrorKind::Rpc,
            Error::Xdr(e) => decode_kind(e),
            Error::Nfs { status, .. } => nfs_kind(*status),
            Error::Mount(stat) => match stat {
                mountstat3::MNT3ERR_NOENT => ErrorKind::NotFound,
                mountstat3::MNT3ERR_ACCES | mountstat3::MNT3ERR_PERM => ErrorKind::AccessDenied,
                mountstat3::MNT3ERR_NOTDIR => ErrorKind::NotDirectory,
                _ => ErrorKind::Mount,
            },
            Error::StreamClosed | Error::TargetClosed => ErrorKind::Closed,
            Error::ShortWrite { .. } => ErrorKind::ShortWrite,
            Error::NotADirectory(_) => ErrorKind::NotDirectory,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// True when the server no longer recognizes the file handle used.
    pub fn is_stale(&self) -> bool {
        self.kind() == ErrorKind::StaleHandle
    }

    /// The NFS status carried by an application-level failure.
    pub fn nfs_status(&self) -> Option<nfsstat3> {
        match self {
            Error::Nfs { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn nfs(proc: NFSProgram, status: nfsstat3) -> Self {
        Error::Nfs { proc, status }
    }
}

/// Used by the `AsyncRead`/`AsyncWrite` impls of the file streams. A socket
/// error comes back unchanged; anything else is wrapped and can be recovered
/// with `get_ref().downcast_ref::<Error>()`.
impl From<Error> for io::Error {
    fn from(e: Error) -> io::Error {
        let kind = match e.kind() {
            ErrorKind::Timeout => io::ErrorKind::TimedOut,
            ErrorKind::ConnectionClosed => io::ErrorKind::ConnectionAborted,
            ErrorKind::Truncated => io::ErrorKind::UnexpectedEof,
            ErrorKind::UnknownVariant | ErrorKind::Decode => io::ErrorKind::InvalidData,
            ErrorKind::NotFound => io::ErrorKind::NotFound,
            ErrorKind::AccessDenied => io::ErrorKind::PermissionDenied,
            ErrorKind::Exists => io::ErrorKind::AlreadyExists,
            ErrorKind::Closed => io::ErrorKind::BrokenPipe,
            ErrorKind::ShortWrite => io::ErrorKind::WriteZero,
            ErrorKind::InvalidArgument => io::ErrorKind::InvalidInput,
            _ => io::ErrorKind::Other,
        };
        match e {
            Error::Io(inner) => inner,
            e => io::Error::new(kind, e),
        }
    }
}

fn decode_kind(e: &io::Error) -> ErrorKind {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        return ErrorKind::Truncated;
    }
    let unknown = e
        .get_ref()
        .is_some_and(|inner| inner.downcast_ref::<UnknownDiscriminant>().is_some());
    if unknown {
        ErrorKind::UnknownVariant
    } else {
        ErrorKind::Decode
    }
}

fn nfs_kind(status: nfsstat3) -> ErrorKind {
    match status {
        nfsstat3::NFS3ERR_NOENT => ErrorKind::NotFound,
        nfsstat3::NFS3ERR_ACCES | nfsstat3::NFS3ERR_PERM | nfsstat3::NFS3ERR_ROFS => {
            ErrorKind::AccessDenied
        }
        nfsstat3::NFS3ERR_NOSPC | nfsstat3::NFS3ERR_DQUOT => ErrorKind::NoSpace,
        nfsstat3::NFS3ERR_STALE | nfsstat3::NFS3ERR_BADHANDLE => ErrorKind::StaleHandle,
        nfsstat3::NFS3ERR_EXIST => ErrorKind::Exists,
        nfsstat3::NFS3ERR_NOTDIR => ErrorKind::NotDirectory,
        _ => ErrorKind::Nfs,
    }
}

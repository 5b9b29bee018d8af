//! NFS Mamont Client - a Network File System (NFS) version 3 client in Rust
//!
//! This library mounts a remote export and performs file and directory
//! operations against an NFS server entirely in user space, without a kernel
//! mount.
//!
//! ## Supported Features
//!
//! - ONC RPC over TCP (record marking) and UDP, with many calls in flight on
//!   one connection
//! - AUTH_NONE and AUTH_UNIX credentials, optional reserved source port
//! - PORTMAP lookups of the MOUNT and NFS services
//! - MOUNT: export listing, mount and unmount
//! - NFSv3: LOOKUP, GETATTR, READ, WRITE, CREATE, MKDIR, REMOVE, RMDIR,
//!   READDIRPLUS, FSINFO, COMMIT
//! - File-like read and write streams and lazily paged directory listings
//! - Asynchronous operation with Tokio runtime
//!
//! ## Main Components
//!
//! - [`MountClient`]: connects to the MOUNT service of a host and turns an
//!   export path into a [`Target`].
//!
//! - [`Target`]: a mounted export; opens [`FileReader`]s and [`FileWriter`]s,
//!   lists directories through [`DirPager`], and removes entries.
//!
//! - `protocol`: the RPC client and the PORTMAP, MOUNT and NFS procedures,
//!   including XDR (External Data Representation) encoding/decoding.
//!
//! ## Standards Compliance
//!
//! This implementation follows these RFCs:
//! - RFC 1813: NFS Version 3 Protocol Specification
//! - RFC 5531: RPC: Remote Procedure Call Protocol Specification Version 2 (obsoletes RFC 1831)
//! - RFC 4506: XDR: External Data Representation Standard (obsoletes RFC 1832)
//! - RFC 1833: Binding Protocols for ONC RPC Version 2
//!
//! ## Usage
//!
//! Dial the MOUNT service with [`MountClient::dial_mount`], mount an export
//! with [`MountClient::mount`], then work through the returned [`Target`].
//! Nothing is retried internally; every failure reaches the caller as an
//! [`Error`] whose [`Error::kind`] can be branched on.

pub mod config;
mod dir;
mod error;
mod file;
mod handle;
mod mount;
pub mod protocol;
mod target;
pub mod transport;

pub use config::ClientConfig;
pub use dir::{DirPager, EntryPlus};
pub use error::{Error, ErrorKind, Result, RpcError};
pub use file::{FileReader, FileWriter};
pub use handle::FileHandle;
pub use mount::{Export, MountClient};
pub use protocol::rpc::{Auth, RpcClient};
pub use protocol::xdr;
pub use target::Target;
pub use transport::DialOptions;

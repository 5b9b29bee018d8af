//! Client sides of the three ONC RPC programs an NFS mount involves:
//!
//! - `portmap`: The PORTMAP protocol (also known as RPCBIND), used to
//!   discover which port a given RPC program and version listens on.
//!
//! - `mount`: The MOUNT protocol, which lists exports and hands out the root
//!   file handle of an export. It is a prerequisite for using NFS as it
//!   provides the initial file handle for the mount point.
//!
//! - `v3`: The NFS version 3 procedures as specified in RFC 1813.
//!
//! Every function here is one RPC round trip with typed arguments and
//! results. Composing them into a mount, a file stream or a directory
//! listing is the job of [`crate::MountClient`] and [`crate::Target`].

pub mod mount;
pub mod portmap;
pub mod v3;

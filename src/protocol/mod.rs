//! Protocol module implements the calling side of the NFS version 3 protocol suite.
//!
//! This module contains three main components:
//!
//! - `xdr`: External Data Representation (XDR) for serialization and deserialization
//!   of data structures according to RFC 4506.
//!
//! - `rpc`: Remote Procedure Call (RPC) client as defined in RFC 5531: record
//!   marking, transaction tracking, credentials and reply status decoding.
//!
//! - `nfs`: One async function per issued procedure of the PORTMAP, MOUNT and
//!   NFSv3 (RFC 1813) programs.
//!
//! The NFS protocol is a network file system protocol originally designed by Sun Microsystems.
//! It is stateless, using file handles to identify files rather than path names, so the
//! client alone keeps track of offsets and directory positions.

pub mod nfs;
pub mod rpc;
pub mod xdr;

//! This module implements the `MOUNT` protocol (RFC 1813 Appendix I) data structures
//! for XDR serialization and deserialization.
//!
//! The `MOUNT` protocol is used to establish the initial connection between an NFS client
//! and server. It provides functions for mounting and unmounting file systems, and
//! obtaining the initial file handle that serves as the root of the mounted file system.

// Keep original RFC naming conventions for consistency with the RFCs
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::*;

/// MOUNT program number for RPC
pub const PROGRAM: u32 = 100005;
/// MOUNT protocol version 3
pub const VERSION: u32 = 3;

/// Maximum bytes in a path name
pub const MNTPATHLEN: u32 = 1024;
/// Maximum bytes in a name
pub const MNTNAMLEN: u32 = 255;
/// Maximum bytes in a V3 file handle
pub const FHSIZE3: u32 = 64;

/// File handle for NFS version 3
pub type fhandle3 = Vec<u8>;
/// Directory path on the server
pub type dirpath = Vec<u8>;
/// Name in the directory
pub type name = Vec<u8>;

/// Status codes returned by `MOUNT` protocol operations
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum mountstat3 {
    /// No error
    MNT3_OK = 0,
    /// Not owner
    MNT3ERR_PERM = 1,
    /// No such file or directory
    MNT3ERR_NOENT = 2,
    /// I/O error
    MNT3ERR_IO = 5,
    /// Permission denied
    MNT3ERR_ACCES = 13,
    /// Not a directory
    MNT3ERR_NOTDIR = 20,
    /// Invalid argument
    MNT3ERR_INVAL = 22,
    /// Filename too long
    MNT3ERR_NAMETOOLONG = 63,
    /// Operation not supported
    MNT3ERR_NOTSUPP = 10004,
    /// A failure on the server
    #[default]
    MNT3ERR_SERVERFAULT = 10006,
}
SerializeEnum!(mountstat3);
DeserializeEnum!(mountstat3);

/// Successful response to a mount request
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct mountres3_ok {
    /// File handle for the mounted directory
    pub fhandle: fhandle3,
    /// List of authentication flavors supported by the server
    pub auth_flavors: Vec<u32>,
}
DeserializeStruct!(mountres3_ok, fhandle, auth_flavors);
SerializeStruct!(mountres3_ok, fhandle, auth_flavors);

/// Result of MOUNTPROC3_MNT, discriminated by [`mountstat3`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum mountres3 {
    Ok(mountres3_ok),
    Err(mountstat3),
}

impl Default for mountres3 {
    fn default() -> mountres3 {
        mountres3::Err(mountstat3::default())
    }
}

impl Serialize for mountres3 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            mountres3::Ok(ok) => {
                mountstat3::MNT3_OK.serialize(dest)?;
                ok.serialize(dest)
            }
            mountres3::Err(stat) => stat.serialize(dest),
        }
    }
}

impl Deserialize for mountres3 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<mountstat3>(src)? {
            mountstat3::MNT3_OK => *self = mountres3::Ok(deserialize(src)?),
            stat => *self = mountres3::Err(stat),
        }
        Ok(())
    }
}

/// One exported directory and the client groups allowed to mount it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct exportnode {
    /// Exported path
    pub ex_dir: dirpath,
    /// Hosts or netgroups allowed to mount `ex_dir`; empty means everyone
    pub ex_groups: List<name>,
}
DeserializeStruct!(exportnode, ex_dir, ex_groups);
SerializeStruct!(exportnode, ex_dir, ex_groups);

/// Result of MOUNTPROC3_EXPORT.
pub type exports = List<exportnode>;

/// Procedure numbers for the `MOUNT` version 3 protocol
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum MountProgram {
    /// Null procedure for service availability testing
    MOUNTPROC3_NULL = 0,
    /// Mount a file system
    MOUNTPROC3_MNT = 1,
    /// Get list of mounted file systems
    MOUNTPROC3_DUMP = 2,
    /// Unmount a file system
    MOUNTPROC3_UMNT = 3,
    /// Unmount all file systems
    MOUNTPROC3_UMNTALL = 4,
    /// Get list of exported file systems
    MOUNTPROC3_EXPORT = 5,
}

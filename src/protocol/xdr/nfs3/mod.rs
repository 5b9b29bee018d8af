//! The module defines XDR data types and constants for Network File System (NFS)
//! version 3, as defined in RFC 1813.
//!
//! NFS version 3 is a stateless distributed file system protocol
//! that provides transparent remote access to shared file systems over a network.
//! Only the types a client needs to encode calls and decode replies for the
//! supported procedure set live here.

// Preserve original RFC naming conventions for consistency with the RFCs
#![allow(non_camel_case_types)]

use std::fmt;
use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::{deserialize, utils, Deserialize, Serialize};
use crate::{DeserializeEnum, DeserializeStruct, SerializeEnum, SerializeStruct};

// Modules for different operation types
pub mod dir;
pub mod file;
pub mod fs;

// Section 2.2 Constants
/// The RPC program number for NFS version 3 service.
pub const PROGRAM: u32 = 100003;
/// The version number for NFS version 3 protocol.
pub const VERSION: u32 = 3;

// Section 2.4 Sizes
//
/// The maximum size in bytes of the opaque file handle.
pub const NFS3_FHSIZE: u32 = 64;

/// The size in bytes of the opaque cookie verifier passed by
/// READDIR and READDIRPLUS.
pub const NFS3_COOKIEVERFSIZE: u32 = 8;

/// The size in bytes of the opaque verifier used for
/// exclusive CREATE.
pub const NFS3_CREATEVERFSIZE: u32 = 8;

/// The size in bytes of the opaque verifier used for
/// asynchronous WRITE.
pub const NFS3_WRITEVERFSIZE: u32 = 8;

// Section 2.5 Basic Data Types
/// A string type used in NFS for filenames and paths.
///
/// Servers are not required to hand out UTF-8, so names stay raw bytes.
#[derive(Default, Clone, PartialEq, Eq, Hash)]
pub struct nfsstring(pub Vec<u8>);

impl nfsstring {
    /// Returns the length of the string in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the string is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for nfsstring {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for nfsstring {
    fn from(value: &[u8]) -> Self {
        Self(value.into())
    }
}

impl From<&str> for nfsstring {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl AsRef<[u8]> for nfsstring {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::ops::Deref for nfsstring {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Debug for nfsstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for nfsstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl Serialize for nfsstring {
    fn serialize<R: Write>(&self, dest: &mut R) -> std::io::Result<()> {
        self.0.serialize(dest)
    }
}

impl Deserialize for nfsstring {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.0.deserialize(src)
    }
}

/// Procedure numbers for NFS version 3 protocol.
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum NFSProgram {
    /// Do nothing - used primarily for performance measurement
    NFSPROC3_NULL = 0,
    /// Get file attributes
    NFSPROC3_GETATTR = 1,
    /// Set file attributes
    NFSPROC3_SETATTR = 2,
    /// Look up filename
    NFSPROC3_LOOKUP = 3,
    /// Check file access permission
    NFSPROC3_ACCESS = 4,
    /// Read from symbolic link
    NFSPROC3_READLINK = 5,
    /// Read from file
    NFSPROC3_READ = 6,
    /// Write to file
    NFSPROC3_WRITE = 7,
    /// Create file
    NFSPROC3_CREATE = 8,
    /// Create directory
    NFSPROC3_MKDIR = 9,
    /// Create symbolic link
    NFSPROC3_SYMLINK = 10,
    /// Create special device
    NFSPROC3_MKNOD = 11,
    /// Remove file
    NFSPROC3_REMOVE = 12,
    /// Remove directory
    NFSPROC3_RMDIR = 13,
    /// Rename file or directory
    NFSPROC3_RENAME = 14,
    /// Create hard link
    NFSPROC3_LINK = 15,
    /// Read directory
    NFSPROC3_READDIR = 16,
    /// Extended read directory
    NFSPROC3_READDIRPLUS = 17,
    /// Get file system statistics
    NFSPROC3_FSSTAT = 18,
    /// Get file system information
    NFSPROC3_FSINFO = 19,
    /// Get path configuration
    NFSPROC3_PATHCONF = 20,
    /// Commit cached data
    NFSPROC3_COMMIT = 21,
}

impl fmt::Display for NFSProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = format!("{self:?}");
        f.write_str(name.trim_start_matches("NFSPROC3_"))
    }
}

/// Filename type as defined in RFC 1813 section 2.5
/// String used for a component of a pathname
pub type filename3 = nfsstring;
/// Path type as defined in RFC 1813 section 2.5
/// String used for a pathname or a symbolic link contents
pub type nfspath3 = nfsstring;
/// File identifier as defined in RFC 1813 section 2.5
/// A unique number that identifies a file within a filesystem
pub type fileid3 = u64;
/// Directory entry position cookie as defined in RFC 1813 section 2.5
/// Used in READDIR and READDIRPLUS operations for iteration
pub type cookie3 = u64;
/// Cookie verifier for directory operations as defined in RFC 1813 section 2.5
/// Used to detect when a directory being read has changed
pub type cookieverf3 = [u8; NFS3_COOKIEVERFSIZE as usize];
/// Create verifier for exclusive file creation as defined in RFC 1813 section 2.5
pub type createverf3 = [u8; NFS3_CREATEVERFSIZE as usize];
/// Write verifier for asynchronous writes as defined in RFC 1813 section 2.5
/// Used to detect server reboots between asynchronous WRITE and COMMIT operations
pub type writeverf3 = [u8; NFS3_WRITEVERFSIZE as usize];
/// User ID as defined in RFC 1813 section 2.5
pub type uid3 = u32;
/// Group ID as defined in RFC 1813 section 2.5
pub type gid3 = u32;
/// File size in bytes as defined in RFC 1813 section 2.5
pub type size3 = u64;
/// File offset in bytes as defined in RFC 1813 section 2.5
pub type offset3 = u64;
/// File mode bits as defined in RFC 1813 section 2.5
pub type mode3 = u32;
/// Count of bytes or entries as defined in RFC 1813 section 2.5
pub type count3 = u32;

/// Status codes returned by NFS version 3 operations
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum nfsstat3 {
    /// Indicates the call completed successfully.
    NFS3_OK = 0,
    /// Not owner. The operation was not allowed because the
    /// caller is either not a privileged user (root) or not the
    /// owner of the target of the operation.
    NFS3ERR_PERM = 1,
    /// No such file or directory. The file or directory name
    /// specified does not exist.
    NFS3ERR_NOENT = 2,
    /// I/O error. A hard error (for example, a disk error)
    /// occurred while processing the requested operation.
    NFS3ERR_IO = 5,
    /// I/O error. No such device or address.
    NFS3ERR_NXIO = 6,
    /// Permission denied. The caller does not have the correct
    /// permission to perform the requested operation. Contrast
    /// this with NFS3ERR_PERM, which restricts itself to owner
    /// or privileged user permission failures.
    NFS3ERR_ACCES = 13,
    /// File exists. The file specified already exists.
    NFS3ERR_EXIST = 17,
    /// Attempt to do a cross-device hard link.
    NFS3ERR_XDEV = 18,
    /// No such device.
    NFS3ERR_NODEV = 19,
    /// Not a directory. The caller specified a non-directory in
    /// a directory operation.
    NFS3ERR_NOTDIR = 20,
    /// Is a directory. The caller specified a directory in a
    /// non-directory operation.
    NFS3ERR_ISDIR = 21,
    /// Invalid argument or unsupported argument for an
    /// operation. Two examples are attempting a READLINK on an
    /// object other than a symbolic link or attempting to
    /// SETATTR a time field on a server that does not support
    /// this operation.
    NFS3ERR_INVAL = 22,
    /// File too large. The operation would have caused a file to
    /// grow beyond the server's limit.
    NFS3ERR_FBIG = 27,
    /// No space left on device. The operation would have caused
    /// the server's file system to exceed its limit.
    NFS3ERR_NOSPC = 28,
    /// Read-only file system. A modifying operation was
    /// attempted on a read-only file system.
    NFS3ERR_ROFS = 30,
    /// Too many hard links.
    NFS3ERR_MLINK = 31,
    /// The filename in an operation was too long.
    NFS3ERR_NAMETOOLONG = 63,
    /// An attempt was made to remove a directory that was not empty.
    NFS3ERR_NOTEMPTY = 66,
    /// Resource (quota) hard limit exceeded. The user's resource
    /// limit on the server has been exceeded.
    NFS3ERR_DQUOT = 69,
    /// Invalid file handle. The file handle given in the
    /// arguments was invalid. The file referred to by that file
    /// handle no longer exists or access to it has been
    /// revoked.
    NFS3ERR_STALE = 70,
    /// Too many levels of remote in path. The file handle given
    /// in the arguments referred to a file on a non-local file
    /// system on the server.
    NFS3ERR_REMOTE = 71,
    /// Illegal NFS file handle. The file handle failed internal
    /// consistency checks.
    NFS3ERR_BADHANDLE = 10001,
    /// Update synchronization mismatch was detected during a
    /// SETATTR operation.
    NFS3ERR_NOT_SYNC = 10002,
    /// READDIR or READDIRPLUS cookie is stale
    NFS3ERR_BAD_COOKIE = 10003,
    /// Operation is not supported.
    NFS3ERR_NOTSUPP = 10004,
    /// Buffer or request is too small.
    NFS3ERR_TOOSMALL = 10005,
    /// An error occurred on the server which does not map to any
    /// of the legal NFS version 3 protocol error values.  The
    /// client should translate this into an appropriate error.
    /// UNIX clients may choose to translate this to EIO.
    #[default]
    NFS3ERR_SERVERFAULT = 10006,
    /// An attempt was made to create an object of a type not
    /// supported by the server.
    NFS3ERR_BADTYPE = 10007,
    /// The server initiated the request, but was not able to
    /// complete it in a timely fashion. The client should wait
    /// and then try the request with a new RPC transaction ID.
    /// For example, this error should be returned from a server
    /// that supports hierarchical storage and receives a request
    /// to process a file that has been migrated. In this case,
    /// the server should start the immigration process and
    /// respond to client with this error.
    NFS3ERR_JUKEBOX = 10008,
}
SerializeEnum!(nfsstat3);
DeserializeEnum!(nfsstat3);

/// File type enumeration as defined in RFC 1813 section 2.3.5
/// Determines the type of a file system object
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum ftype3 {
    /// Regular File
    #[default]
    NF3REG = 1,
    /// Directory
    NF3DIR = 2,
    /// Block Special Device
    NF3BLK = 3,
    /// Character Special Device
    NF3CHR = 4,
    /// Symbolic Link
    NF3LNK = 5,
    /// Socket
    NF3SOCK = 6,
    /// Named Pipe
    NF3FIFO = 7,
}
SerializeEnum!(ftype3);
DeserializeEnum!(ftype3);

/// Special device information for character and block special devices
/// Contains the major and minor device numbers
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct specdata3 {
    /// Major device number
    pub specdata1: u32,
    /// Minor device number
    pub specdata2: u32,
}
DeserializeStruct!(specdata3, specdata1, specdata2);
SerializeStruct!(specdata3, specdata1, specdata2);

/// The NFS version 3 file handle.
///
/// The server is responsible for the internal format and interpretation of
/// the file handle; the client carries it around byte for byte.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct nfs_fh3 {
    /// Raw file handle data (up to NFS3_FHSIZE bytes)
    pub data: Vec<u8>,
}
SerializeStruct!(nfs_fh3, data);

impl Deserialize for nfs_fh3 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.data.deserialize(src)?;
        if self.data.len() > NFS3_FHSIZE as usize {
            let len = self.data.len();
            self.data.clear();
            return Err(utils::invalid_data(&format!(
                "file handle of {len} bytes exceeds NFS3_FHSIZE"
            )));
        }
        Ok(())
    }
}

/// NFS version 3 time structure
/// Used for file timestamps (access, modify, change)
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct nfstime3 {
    /// Seconds since Unix epoch (January 1, 1970)
    pub seconds: u32,
    /// Nanoseconds (0-999999999)
    pub nseconds: u32,
}
DeserializeStruct!(nfstime3, seconds, nseconds);
SerializeStruct!(nfstime3, seconds, nseconds);

impl From<nfstime3> for filetime::FileTime {
    fn from(time: nfstime3) -> Self {
        filetime::FileTime::from_unix_time(time.seconds as i64, time.nseconds)
    }
}

impl From<filetime::FileTime> for nfstime3 {
    fn from(time: filetime::FileTime) -> Self {
        // NFSv3 time is unsigned 32-bit seconds; clamp what does not fit.
        let seconds = time.unix_seconds().clamp(0, u32::MAX as i64) as u32;
        nfstime3 { seconds, nseconds: time.nanoseconds() }
    }
}

/// File attributes in NFS version 3 as defined in RFC 1813 section 2.3.5
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct fattr3 {
    /// Type of file (regular, directory, symbolic link, etc.)
    pub ftype: ftype3,
    /// File access mode bits
    pub mode: mode3,
    /// Number of hard links to the file
    pub nlink: u32,
    /// User ID of the file owner
    pub uid: uid3,
    /// Group ID of the file's group
    pub gid: gid3,
    /// File size in bytes
    pub size: size3,
    /// Size in bytes actually allocated to the file on the server's file system
    pub used: size3,
    /// Device ID information for character or block special files
    pub rdev: specdata3,
    /// File system identifier
    pub fsid: u64,
    /// File identifier (inode number)
    pub fileid: fileid3,
    /// Time of last access to the file data
    pub atime: nfstime3,
    /// Time of last modification to the file data
    pub mtime: nfstime3,
    /// Time of last status change
    pub ctime: nfstime3,
}
DeserializeStruct!(
    fattr3, ftype, mode, nlink, uid, gid, size, used, rdev, fsid, fileid, atime, mtime, ctime
);
SerializeStruct!(
    fattr3, ftype, mode, nlink, uid, gid, size, used, rdev, fsid, fileid, atime, mtime, ctime
);

/// Attributes used in weak cache consistency checking as defined in RFC 1813 section 2.3.8
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct wcc_attr {
    /// File size in bytes
    pub size: size3,
    /// Last modification time of the file
    pub mtime: nfstime3,
    /// Last status change time of the file
    pub ctime: nfstime3,
}
DeserializeStruct!(wcc_attr, size, mtime, ctime);
SerializeStruct!(wcc_attr, size, mtime, ctime);

/// Pre-operation attributes, an XDR optional `wcc_attr`.
pub type pre_op_attr = Option<wcc_attr>;

/// Post-operation attributes, an XDR optional `fattr3`.
pub type post_op_attr = Option<fattr3>;

/// Optional file handle returned by CREATE, MKDIR and READDIRPLUS.
pub type post_op_fh3 = Option<nfs_fh3>;

/// Weak cache consistency data as defined in RFC 1813 section 2.3.8
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct wcc_data {
    /// File attributes before operation
    pub before: pre_op_attr,
    /// File attributes after operation
    pub after: post_op_attr,
}
DeserializeStruct!(wcc_data, before, after);
SerializeStruct!(wcc_data, before, after);

/// Optional file mode for SETATTR-style attribute sets
pub type set_mode3 = Option<mode3>;
/// Optional user ID
pub type set_uid3 = Option<uid3>;
/// Optional group ID
pub type set_gid3 = Option<gid3>;
/// Optional file size
pub type set_size3 = Option<size3>;

/// Specifies how to modify a timestamp in an attribute set.
///
/// The discriminant value follows the time_how enumeration from RFC 1813
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum set_time {
    /// Keep the current time unchanged
    #[default]
    DONT_CHANGE,
    /// Update the time to the server's current time
    SET_TO_SERVER_TIME,
    /// Set the time to a specific timestamp provided by the client
    SET_TO_CLIENT_TIME(nfstime3),
}

impl Serialize for set_time {
    fn serialize<R: Write>(&self, dest: &mut R) -> std::io::Result<()> {
        match self {
            set_time::DONT_CHANGE => 0_u32.serialize(dest),
            set_time::SET_TO_SERVER_TIME => 1_u32.serialize(dest),
            set_time::SET_TO_CLIENT_TIME(v) => {
                2_u32.serialize(dest)?;
                v.serialize(dest)
            }
        }
    }
}

impl Deserialize for set_time {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = set_time::DONT_CHANGE,
            1 => *self = set_time::SET_TO_SERVER_TIME,
            2 => *self = set_time::SET_TO_CLIENT_TIME(deserialize(src)?),
            c => return Err(super::unknown_discriminant("time_how", c)),
        }

        Ok(())
    }
}

/// Last access time setting
pub type set_atime = set_time;
/// Last modification time setting
pub type set_mtime = set_time;

/// Set of file attributes to apply on CREATE or MKDIR
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct sattr3 {
    /// File mode (permissions)
    pub mode: set_mode3,
    /// User ID of owner
    pub uid: set_uid3,
    /// Group ID of owner
    pub gid: set_gid3,
    /// File size
    pub size: set_size3,
    /// Last access time
    pub atime: set_atime,
    /// Last modification time
    pub mtime: set_mtime,
}
DeserializeStruct!(sattr3, mode, uid, gid, size, atime, mtime);
SerializeStruct!(sattr3, mode, uid, gid, size, atime, mtime);

/// Arguments for directory operations (specifying directory handle and name)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct diropargs3 {
    /// Directory file handle
    pub dir: nfs_fh3,
    /// Name within the directory
    pub name: filename3,
}
DeserializeStruct!(diropargs3, dir, name);
SerializeStruct!(diropargs3, dir, name);

/// Result of an NFS version 3 procedure: every reply starts with an
/// [`nfsstat3`], followed by the `resok` arm on `NFS3_OK` and the `resfail`
/// arm otherwise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Res3<OK, FAIL> {
    Ok(OK),
    Fail(nfsstat3, FAIL),
}

impl<OK, FAIL: Default> Default for Res3<OK, FAIL> {
    fn default() -> Self {
        Res3::Fail(nfsstat3::default(), FAIL::default())
    }
}

impl<OK, FAIL> Res3<OK, FAIL> {
    /// Splits the result into the success arm or the failing status.
    pub fn into_result(self) -> Result<OK, nfsstat3> {
        match self {
            Res3::Ok(ok) => Ok(ok),
            Res3::Fail(stat, _) => Err(stat),
        }
    }
}

impl<OK: Serialize, FAIL: Serialize> Serialize for Res3<OK, FAIL> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            Res3::Ok(ok) => {
                nfsstat3::NFS3_OK.serialize(dest)?;
                ok.serialize(dest)
            }
            Res3::Fail(stat, fail) => {
                stat.serialize(dest)?;
                fail.serialize(dest)
            }
        }
    }
}

impl<OK, FAIL> Deserialize for Res3<OK, FAIL>
where
    OK: Deserialize + Default,
    FAIL: Deserialize + Default,
{
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<nfsstat3>(src)? {
            nfsstat3::NFS3_OK => *self = Res3::Ok(deserialize(src)?),
            stat => *self = Res3::Fail(stat, deserialize(src)?),
        }
        Ok(())
    }
}

/// GETATTR result: attributes on success, nothing on failure.
pub type GETATTR3res = Res3<fattr3, ()>;

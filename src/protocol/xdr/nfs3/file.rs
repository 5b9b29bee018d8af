//! Module contains XDR data structures related to file operations for NFS version 3 protocol
//! as defined in RFC 1813.
//!
//! This module includes data structures for the following operations:
//! - READ: Read data from a file (procedure 6)
//! - WRITE: Write data to a file (procedure 7)
//! - CREATE: Create a regular file (procedure 8)
//! - COMMIT: Commit asynchronously written data to stable storage (procedure 21)

// Preserve original RFC naming conventions (e.g. READ3args, COMMIT3resok)
// for consistency with RFC 1813
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::dir::diropres3ok;
use super::*;

/// Arguments for the READ procedure (procedure 6) as defined in RFC 1813 section 3.3.6
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct READ3args {
    /// File handle for the file to be read
    pub file: nfs_fh3,
    /// Position within the file to begin reading
    pub offset: offset3,
    /// Number of bytes of data to read
    pub count: count3,
}
DeserializeStruct!(READ3args, file, offset, count);
SerializeStruct!(READ3args, file, offset, count);

/// Successful response for the READ procedure as defined in RFC 1813 section 3.3.6
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct READ3resok {
    /// File attributes after the operation
    pub file_attributes: post_op_attr,
    /// Number of bytes actually read
    pub count: count3,
    /// True if the end of file was reached
    pub eof: bool,
    /// The data read from the file
    pub data: Vec<u8>,
}
DeserializeStruct!(READ3resok, file_attributes, count, eof, data);
SerializeStruct!(READ3resok, file_attributes, count, eof, data);

pub type READ3res = Res3<READ3resok, post_op_attr>;

/// Enumeration specifying how data should be written to storage
/// as defined in RFC 1813 section 3.3.7
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum stable_how {
    /// The server may reply before the data reaches stable storage
    #[default]
    UNSTABLE = 0,
    /// The data, but not necessarily the metadata, is on stable storage
    DATA_SYNC = 1,
    /// Data and metadata are on stable storage
    FILE_SYNC = 2,
}
SerializeEnum!(stable_how);
DeserializeEnum!(stable_how);

/// Arguments for the WRITE procedure (procedure 7) as defined in RFC 1813 section 3.3.7
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WRITE3args {
    /// File handle for the file to write
    pub file: nfs_fh3,
    /// Position within the file to begin writing
    pub offset: offset3,
    /// Number of bytes of data to write
    pub count: count3,
    /// How to commit the data to storage
    pub stable: stable_how,
    /// The data to be written
    pub data: Vec<u8>,
}
DeserializeStruct!(WRITE3args, file, offset, count, stable, data);
SerializeStruct!(WRITE3args, file, offset, count, stable, data);

/// Successful response for the WRITE procedure as defined in RFC 1813 section 3.3.7
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WRITE3resok {
    /// File attributes before and after the operation
    pub file_wcc: wcc_data,
    /// Number of bytes actually written
    pub count: count3,
    /// How the data was committed to stable storage
    pub committed: stable_how,
    /// Write verifier to detect server restarts
    pub verf: writeverf3,
}
DeserializeStruct!(WRITE3resok, file_wcc, count, committed, verf);
SerializeStruct!(WRITE3resok, file_wcc, count, committed, verf);

pub type WRITE3res = Res3<WRITE3resok, wcc_data>;

/// File creation modes for CREATE operations
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum createmode3 {
    /// Normal file creation - doesn't error if file exists
    #[default]
    UNCHECKED = 0,
    /// Return error if file exists
    GUARDED = 1,
    /// Use exclusive create mechanism (with verifier)
    EXCLUSIVE = 2,
}
SerializeEnum!(createmode3);
DeserializeEnum!(createmode3);

/// How CREATE should behave, discriminated by [`createmode3`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum createhow3 {
    UNCHECKED(sattr3),
    GUARDED(sattr3),
    EXCLUSIVE(createverf3),
}

impl Default for createhow3 {
    fn default() -> Self {
        createhow3::UNCHECKED(sattr3::default())
    }
}

impl Serialize for createhow3 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            createhow3::UNCHECKED(attr) => {
                createmode3::UNCHECKED.serialize(dest)?;
                attr.serialize(dest)
            }
            createhow3::GUARDED(attr) => {
                createmode3::GUARDED.serialize(dest)?;
                attr.serialize(dest)
            }
            createhow3::EXCLUSIVE(verf) => {
                createmode3::EXCLUSIVE.serialize(dest)?;
                verf.serialize(dest)
            }
        }
    }
}

impl Deserialize for createhow3 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = match deserialize::<createmode3>(src)? {
            createmode3::UNCHECKED => createhow3::UNCHECKED(deserialize(src)?),
            createmode3::GUARDED => createhow3::GUARDED(deserialize(src)?),
            createmode3::EXCLUSIVE => createhow3::EXCLUSIVE(deserialize(src)?),
        };
        Ok(())
    }
}

/// Arguments for the CREATE procedure (procedure 8) as defined in RFC 1813 section 3.3.8
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CREATE3args {
    /// Directory and name of the new file
    pub dirops: diropargs3,
    /// Creation mode and initial attributes
    pub how: createhow3,
}
DeserializeStruct!(CREATE3args, dirops, how);
SerializeStruct!(CREATE3args, dirops, how);

pub type CREATE3res = Res3<diropres3ok, wcc_data>;

/// Arguments for the COMMIT procedure (procedure 21) as defined in RFC 1813 section 3.3.21
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct COMMIT3args {
    /// File handle for the file to commit
    pub file: nfs_fh3,
    /// Position within the file to start committing
    pub offset: offset3,
    /// Number of bytes to commit; zero means to the end of the file
    pub count: count3,
}
DeserializeStruct!(COMMIT3args, file, offset, count);
SerializeStruct!(COMMIT3args, file, offset, count);

/// Successful response for the COMMIT procedure as defined in RFC 1813 section 3.3.21
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct COMMIT3resok {
    /// File attributes before and after the operation
    pub file_wcc: wcc_data,
    /// Write verifier to detect server restarts
    pub verf: writeverf3,
}
DeserializeStruct!(COMMIT3resok, file_wcc, verf);
SerializeStruct!(COMMIT3resok, file_wcc, verf);

pub type COMMIT3res = Res3<COMMIT3resok, wcc_data>;

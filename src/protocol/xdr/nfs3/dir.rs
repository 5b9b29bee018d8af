//! Module contains XDR data structures related to directories for NFS version 3 protocol
//! as defined in RFC 1813.
//!
//! This module includes data structures for the following directory operations:
//! - LOOKUP: Look up a name in a directory (procedure 3)
//! - MKDIR: Create a directory (procedure 9)
//! - REMOVE / RMDIR: Remove a file or an empty directory (procedures 12 and 13)
//! - READDIRPLUS: Extended read from a directory (procedure 17)

// Preserve original RFC naming conventions (e.g. READDIRPLUS3args, MKDIR3args)
// for consistency with RFC 1813
#![allow(non_camel_case_types)]

use super::*;
use crate::xdr::List;

/// Successful response for the LOOKUP procedure as defined in RFC 1813 section 3.3.3
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LOOKUP3resok {
    /// File handle of the object that was looked up
    pub object: nfs_fh3,
    /// Attributes of the object
    pub obj_attributes: post_op_attr,
    /// Attributes of the containing directory
    pub dir_attributes: post_op_attr,
}
DeserializeStruct!(LOOKUP3resok, object, obj_attributes, dir_attributes);
SerializeStruct!(LOOKUP3resok, object, obj_attributes, dir_attributes);

pub type LOOKUP3res = Res3<LOOKUP3resok, post_op_attr>;

/// Successful result shared by CREATE and MKDIR.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct diropres3ok {
    /// Handle of the new object, when the server chose to return one
    pub obj: post_op_fh3,
    /// Attributes of the new object
    pub obj_attributes: post_op_attr,
    /// Weak cache consistency data of the parent directory
    pub dir_wcc: wcc_data,
}
DeserializeStruct!(diropres3ok, obj, obj_attributes, dir_wcc);
SerializeStruct!(diropres3ok, obj, obj_attributes, dir_wcc);

/// Arguments for the MKDIR procedure (procedure 9)
/// as defined in RFC 1813 section 3.3.9
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MKDIR3args {
    /// Directory where new directory should be created and its name
    pub dirops: diropargs3,
    /// Initial attributes for the new directory
    pub attributes: sattr3,
}
DeserializeStruct!(MKDIR3args, dirops, attributes);
SerializeStruct!(MKDIR3args, dirops, attributes);

pub type MKDIR3res = Res3<diropres3ok, wcc_data>;

/// REMOVE and RMDIR both answer with the parent's wcc data either way.
pub type REMOVE3res = Res3<wcc_data, wcc_data>;
pub type RMDIR3res = Res3<wcc_data, wcc_data>;

/// Arguments for the READDIRPLUS procedure (procedure 17)
/// as defined in RFC 1813 section 3.3.17
/// READDIRPLUS returns directory entries along with their attributes and file handles.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct READDIRPLUS3args {
    /// Directory file handle
    pub dir: nfs_fh3,
    /// Cookie from previous READDIRPLUS - where to start reading
    pub cookie: cookie3,
    /// Cookie verifier to detect changed directories
    pub cookieverf: cookieverf3,
    /// Maximum number of bytes of directory information to return
    pub dircount: count3,
    /// Maximum number of bytes of attribute information to return
    pub maxcount: count3,
}
DeserializeStruct!(READDIRPLUS3args, dir, cookie, cookieverf, dircount, maxcount);
SerializeStruct!(READDIRPLUS3args, dir, cookie, cookieverf, dircount, maxcount);

/// Directory entry with additional attributes for READDIRPLUS operation
/// as defined in RFC 1813 section 3.3.17
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct entryplus3 {
    /// File identifier (inode number) uniquely identifying the file within the filesystem
    pub fileid: fileid3,
    /// Name of the directory entry (filename)
    pub name: filename3,
    /// Cookie value that can be used in subsequent READDIRPLUS calls to resume listing
    pub cookie: cookie3,
    /// File attributes for this directory entry
    pub name_attributes: post_op_attr,
    /// File handle for this directory entry
    pub name_handle: post_op_fh3,
}
DeserializeStruct!(entryplus3, fileid, name, cookie, name_attributes, name_handle);
SerializeStruct!(entryplus3, fileid, name, cookie, name_attributes, name_handle);

/// One page of a READDIRPLUS listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct dirlistplus3 {
    /// Entries in this page, in server order
    pub entries: List<entryplus3>,
    /// True if this page ends the listing
    pub eof: bool,
}
DeserializeStruct!(dirlistplus3, entries, eof);
SerializeStruct!(dirlistplus3, entries, eof);

/// Successful response for the READDIRPLUS procedure
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct READDIRPLUS3resok {
    /// Attributes of the directory
    pub dir_attributes: post_op_attr,
    /// Verifier to echo back on the next page
    pub cookieverf: cookieverf3,
    /// The page itself
    pub reply: dirlistplus3,
}
DeserializeStruct!(READDIRPLUS3resok, dir_attributes, cookieverf, reply);
SerializeStruct!(READDIRPLUS3resok, dir_attributes, cookieverf, reply);

pub type READDIRPLUS3res = Res3<READDIRPLUS3resok, post_op_attr>;

//! This module implements file system operation types defined in RFC 1813 (NFS Version 3 Protocol)
//! for operations related to file system information and statistics.
//!
//! The client only issues FSINFO (procedure 19), which tells it how large its
//! READ and WRITE requests may be.

// Preserve original RFC naming conventions for consistency with the RFCs
#![allow(non_camel_case_types)]

use super::*;

// Section 3.3.19. Procedure 19: FSINFO - Get static file system Information
// The following constants are used in fsinfo to construct the bitmask 'properties',
// which represents the file system properties.

/// If this bit is 1 (TRUE), the file system supports hard links.
/// As defined in RFC 1813 section 3.3.19.
pub const FSF_LINK: u32 = 0x0001;

/// If this bit is 1 (TRUE), the file system supports symbolic links.
/// As defined in RFC 1813 section 3.3.19.
pub const FSF_SYMLINK: u32 = 0x0002;

/// If this bit is 1 (TRUE), the information returned by
/// PATHCONF is identical for every file and directory
/// in the file system. If it is 0 (FALSE), the client
/// should retrieve PATHCONF information for each file
/// and directory as required.
/// As defined in RFC 1813 section 3.3.19.
pub const FSF_HOMOGENEOUS: u32 = 0x0008;

/// If this bit is 1 (TRUE), the server will set the
/// times for a file via SETATTR if requested (to the
/// accuracy indicated by time_delta). If it is 0
/// (FALSE), the server cannot set times as requested.
/// As defined in RFC 1813 section 3.3.19.
pub const FSF_CANSETTIME: u32 = 0x0010;

/// File system information structure returned by FSINFO procedure
/// as defined in RFC 1813 section 3.3.19
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct fsinfo3 {
    /// File system attributes
    pub obj_attributes: post_op_attr,
    /// Maximum read request supported by server (bytes)
    pub rtmax: u32,
    /// Preferred read request size (bytes)
    pub rtpref: u32,
    /// Suggested read request multiple (bytes)
    /// Requests should be a multiple of this value
    pub rtmult: u32,
    /// Maximum write request supported by server (bytes)
    pub wtmax: u32,
    /// Preferred write request size (bytes)
    pub wtpref: u32,
    /// Suggested write request multiple (bytes)
    /// Requests should be a multiple of this value
    pub wtmult: u32,
    /// Preferred directory read request size (bytes)
    pub dtpref: u32,
    /// Maximum file size supported (bytes)
    pub maxfilesize: size3,
    /// Server time granularity (resolution of time values)
    pub time_delta: nfstime3,
    /// Bit mask of file system properties (FSF_* constants)
    pub properties: u32,
}
DeserializeStruct!(
    fsinfo3,
    obj_attributes,
    rtmax,
    rtpref,
    rtmult,
    wtmax,
    wtpref,
    wtmult,
    dtpref,
    maxfilesize,
    time_delta,
    properties
);
SerializeStruct!(
    fsinfo3,
    obj_attributes,
    rtmax,
    rtpref,
    rtmult,
    wtmax,
    wtpref,
    wtmult,
    dtpref,
    maxfilesize,
    time_delta,
    properties
);

pub type FSINFO3res = Res3<fsinfo3, post_op_attr>;

//! Opaque file handles.

use std::fmt;
use std::sync::Arc;

use crate::protocol::xdr::nfs3::{nfs_fh3, NFS3_FHSIZE};
use crate::{Error, Result};

/// A server-assigned handle for one file system object.
///
/// The bytes are never interpreted; they are copied off the wire once and
/// sent back verbatim. Cloning shares the bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FileHandle(Arc<[u8]>);

impl FileHandle {
    /// Wraps raw handle bytes, rejecting anything longer than an NFSv3 handle.
    pub fn new(bytes: &[u8]) -> Result<FileHandle> {
        if bytes.len() > NFS3_FHSIZE as usize {
            return Err(Error::MalformedReply(format!(
                "file handle of {} bytes exceeds NFS3_FHSIZE",
                bytes.len()
            )));
        }
        Ok(FileHandle(Arc::from(bytes)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The wire form used in procedure arguments.
    pub fn to_nfs(&self) -> nfs_fh3 {
        nfs_fh3 { data: self.0.to_vec() }
    }
}

impl From<&nfs_fh3> for FileHandle {
    fn from(fh: &nfs_fh3) -> Self {
        // nfs_fh3 already enforces NFS3_FHSIZE when decoded.
        FileHandle(Arc::from(fh.data.as_slice()))
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FileHandle(")?;
        for b in self.0.iter() {
            write!(f, "{b:02x}")?;
        }
        f.write_str(")")
    }
}

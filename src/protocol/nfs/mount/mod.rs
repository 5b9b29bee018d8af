//! MOUNT protocol client for NFS version 3 as specified in RFC 1813 section 5.0.
//! https://datatracker.ietf.org/doc/html/rfc1813#section-5.0
//!
//! MOUNTPROC3_DUMP and MOUNTPROC3_UMNTALL are not issued: neither is needed
//! to obtain or release a root handle.

mod export;
mod mnt;
mod null;
mod umnt;

pub use export::mountproc3_export;
pub use mnt::mountproc3_mnt;
pub use null::mountproc3_null;
pub use umnt::mountproc3_umnt;

use crate::protocol::xdr::mount::MNTPATHLEN;
use crate::{Error, Result};

/// Rejects export paths the server would refuse to decode.
fn check_path(path: &str) -> Result<()> {
    if path.len() > MNTPATHLEN as usize {
        return Err(Error::InvalidArgument(format!(
            "export path of {} bytes exceeds MNTPATHLEN",
            path.len()
        )));
    }
    Ok(())
}

//! NFSv3 (Network File System version 3) client procedures as specified in RFC 1813.
//!
//! This module issues the subset of the 21 NFSv3 procedures a file client needs:
//!
//! 1. NULL - Do nothing (ping the server)
//! 2. GETATTR - Get file attributes
//! 3. LOOKUP - Look up file name
//! 4. READ - Read from file
//! 5. WRITE - Write to file
//! 6. CREATE - Create a file
//! 7. MKDIR - Create a directory
//! 8. REMOVE - Remove a file
//! 9. RMDIR - Remove a directory
//! 10. READDIRPLUS - Extended read from directory
//! 11. FSINFO - Get file system information
//! 12. COMMIT - Commit cached data
//!
//! Each procedure lives in its own module. A reply whose status is not
//! `NFS3_OK` becomes [`Error::Nfs`] carrying the procedure and the status,
//! so callers can tell a stale handle from a missing name.

use tracing::debug;

use crate::protocol::xdr::nfs3::{NFSProgram, Res3};
use crate::{Error, Result};

mod commit;
mod create;
mod fsinfo;
mod getattr;
mod lookup;
mod mkdir;
mod null;
mod read;
mod readdirplus;
mod remove;
mod rmdir;
mod write;

pub use commit::nfsproc3_commit;
pub use create::nfsproc3_create;
pub use fsinfo::nfsproc3_fsinfo;
pub use getattr::nfsproc3_getattr;
pub use lookup::nfsproc3_lookup;
pub use mkdir::nfsproc3_mkdir;
pub use null::nfsproc3_null;
pub use read::nfsproc3_read;
pub use readdirplus::nfsproc3_readdirplus;
pub use remove::nfsproc3_remove;
pub use rmdir::nfsproc3_rmdir;
pub use write::nfsproc3_write;

/// Splits an NFS result into its `resok` arm or an [`Error::Nfs`].
fn check<OK, FAIL>(proc: NFSProgram, res: Res3<OK, FAIL>) -> Result<OK> {
    res.into_result().map_err(|status| {
        debug!("{} failed: {:?}", proc, status);
        Error::nfs(proc, status)
    })
}

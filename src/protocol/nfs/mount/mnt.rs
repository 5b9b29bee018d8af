//! Implementation of the MNT procedure (procedure 1) for MOUNT version 3 protocol
//! as defined in RFC 1813 Appendix I section I.4.2.
//!
//! MNT takes a directory path as input and returns a file handle for that
//! path and a list of acceptable authentication flavors if the mount is successful.

use tracing::debug;

use super::check_path;
use crate::protocol::rpc::{Auth, RpcClient};
use crate::protocol::xdr::mount::{self, mountres3, mountres3_ok};
use crate::{Error, Result};

/// Asks the server for the root handle of the export `path`.
///
/// A non-OK status becomes [`Error::Mount`]; `MNT3ERR_NOENT` and
/// `MNT3ERR_ACCES` classify as not-found and access-denied respectively.
pub async fn mountproc3_mnt(client: &RpcClient, auth: &Auth, path: &str) -> Result<mountres3_ok> {
    check_path(path)?;
    debug!("mountproc3_mnt({:?})", path);
    let res: mountres3 = client
        .call(
            mount::PROGRAM,
            mount::VERSION,
            mount::MountProgram::MOUNTPROC3_MNT as u32,
            auth,
            path.as_bytes(),
        )
        .await?;
    match res {
        mountres3::Ok(ok) => {
            debug!(
                "{:?} --> {} byte handle, flavors {:?}",
                path,
                ok.fhandle.len(),
                ok.auth_flavors
            );
            Ok(ok)
        }
        mountres3::Err(stat) => {
            debug!("{:?} --> {:?}", path, stat);
            Err(Error::Mount(stat))
        }
    }
}

//! Implementation of the GETATTR procedure (procedure 1) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.1.

use tracing::debug;

use super::check;
use crate::protocol::rpc::{Auth, RpcClient};
use crate::protocol::xdr::nfs3::{self, NFSProgram};
use crate::Result;

/// Fetches the attributes of the object `object` refers to.
pub async fn nfsproc3_getattr(
    client: &RpcClient,
    auth: &Auth,
    object: &nfs3::nfs_fh3,
) -> Result<nfs3::fattr3> {
    debug!("nfsproc3_getattr({:?})", object);
    let proc = NFSProgram::NFSPROC3_GETATTR;
    let res: nfs3::GETATTR3res =
        client.call(nfs3::PROGRAM, nfs3::VERSION, proc as u32, auth, object).await?;
    check(proc, res)
}

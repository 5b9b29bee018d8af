//! Implementation of the REMOVE procedure (procedure 12) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.12.
//!
//! REMOVE deletes a non-directory entry. Handles other clients hold for the
//! removed object go stale once the server drops it.

use tracing::debug;

use super::check;
use crate::protocol::rpc::{Auth, RpcClient};
use crate::protocol::xdr::nfs3::{self, dir, NFSProgram};
use crate::Result;

/// Removes `args.name` from `args.dir` and returns the directory's wcc data.
pub async fn nfsproc3_remove(
    client: &RpcClient,
    auth: &Auth,
    args: &nfs3::diropargs3,
) -> Result<nfs3::wcc_data> {
    debug!("nfsproc3_remove({:?}, {:?})", args.dir, args.name);
    let proc = NFSProgram::NFSPROC3_REMOVE;
    let res: dir::REMOVE3res =
        client.call(nfs3::PROGRAM, nfs3::VERSION, proc as u32, auth, args).await?;
    check(proc, res)
}

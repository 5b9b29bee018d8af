//! Implementation of the RMDIR procedure (procedure 13) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.13.

use tracing::debug;

use super::check;
use crate::protocol::rpc::{Auth, RpcClient};
use crate::protocol::xdr::nfs3::{self, dir, NFSProgram};
use crate::Result;

/// Removes the empty directory `args.name` from `args.dir`.
pub async fn nfsproc3_rmdir(
    client: &RpcClient,
    auth: &Auth,
    args: &nfs3::diropargs3,
) -> Result<nfs3::wcc_data> {
    debug!("nfsproc3_rmdir({:?}, {:?})", args.dir, args.name);
    let proc = NFSProgram::NFSPROC3_RMDIR;
    let res: dir::RMDIR3res =
        client.call(nfs3::PROGRAM, nfs3::VERSION, proc as u32, auth, args).await?;
    check(proc, res)
}

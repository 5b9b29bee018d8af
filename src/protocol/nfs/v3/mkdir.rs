//! Implementation of the MKDIR procedure (procedure 9) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.9.

use tracing::debug;

use super::check;
use crate::protocol::rpc::{Auth, RpcClient};
use crate::protocol::xdr::nfs3::{self, dir, NFSProgram};
use crate::Result;

/// Creates the directory `args.dirops.name` inside `args.dirops.dir`.
pub async fn nfsproc3_mkdir(
    client: &RpcClient,
    auth: &Auth,
    args: &dir::MKDIR3args,
) -> Result<dir::diropres3ok> {
    debug!("nfsproc3_mkdir({:?}, {:?})", args.dirops.dir, args.dirops.name);
    let proc = NFSProgram::NFSPROC3_MKDIR;
    let res: dir::MKDIR3res =
        client.call(nfs3::PROGRAM, nfs3::VERSION, proc as u32, auth, args).await?;
    check(proc, res)
}

//! Implementation of the CREATE procedure (procedure 8) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.8.
//!
//! CREATE makes a regular file in a directory. In UNCHECKED mode an existing
//! file is left as it is, GUARDED mode fails with NFS3ERR_EXIST instead, and
//! EXCLUSIVE mode relies on a verifier.

use tracing::debug;

use super::check;
use crate::protocol::rpc::{Auth, RpcClient};
use crate::protocol::xdr::nfs3::{self, dir::diropres3ok, file, NFSProgram};
use crate::Result;

pub async fn nfsproc3_create(
    client: &RpcClient,
    auth: &Auth,
    args: &file::CREATE3args,
) -> Result<diropres3ok> {
    debug!("nfsproc3_create({:?}, {:?}, {:?})", args.dirops.dir, args.dirops.name, args.how);
    let proc = NFSProgram::NFSPROC3_CREATE;
    let res: file::CREATE3res =
        client.call(nfs3::PROGRAM, nfs3::VERSION, proc as u32, auth, args).await?;
    check(proc, res)
}

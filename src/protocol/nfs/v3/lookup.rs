//! Implementation of the LOOKUP procedure (procedure 3) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.3.
//!
//! LOOKUP resolves one name inside one directory. Walking a multi-component
//! path is the caller's job: the protocol never parses slashes.

use tracing::debug;

use super::check;
use crate::protocol::rpc::{Auth, RpcClient};
use crate::protocol::xdr::nfs3::{self, dir::LOOKUP3resok, NFSProgram};
use crate::Result;

/// Looks `args.name` up in the directory `args.dir`.
pub async fn nfsproc3_lookup(
    client: &RpcClient,
    auth: &Auth,
    args: &nfs3::diropargs3,
) -> Result<LOOKUP3resok> {
    debug!("nfsproc3_lookup({:?}, {:?})", args.dir, args.name);
    let proc = NFSProgram::NFSPROC3_LOOKUP;
    let res: nfs3::dir::LOOKUP3res =
        client.call(nfs3::PROGRAM, nfs3::VERSION, proc as u32, auth, args).await?;
    check(proc, res)
}

//! Implementation of the FSINFO procedure (procedure 19) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.19.
//!
//! FSINFO reports static properties of the file system, most importantly the
//! largest and preferred sizes of READ and WRITE requests.

use tracing::debug;

use super::check;
use crate::protocol::rpc::{Auth, RpcClient};
use crate::protocol::xdr::nfs3::{self, fs, NFSProgram};
use crate::Result;

pub async fn nfsproc3_fsinfo(
    client: &RpcClient,
    auth: &Auth,
    root: &nfs3::nfs_fh3,
) -> Result<fs::fsinfo3> {
    debug!("nfsproc3_fsinfo({:?})", root);
    let proc = NFSProgram::NFSPROC3_FSINFO;
    let res: fs::FSINFO3res =
        client.call(nfs3::PROGRAM, nfs3::VERSION, proc as u32, auth, root).await?;
    check(proc, res)
}

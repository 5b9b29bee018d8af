//! Implementation of the COMMIT procedure (procedure 21) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.21.
//!
//! COMMIT forces data previously written with `UNSTABLE` or `DATA_SYNC` onto
//! stable storage. If the returned verifier differs from the one the WRITEs
//! returned, the server restarted in between and the data must be written again.

use tracing::debug;

use super::check;
use crate::protocol::rpc::{Auth, RpcClient};
use crate::protocol::xdr::nfs3::{self, file, NFSProgram};
use crate::Result;

pub async fn nfsproc3_commit(
    client: &RpcClient,
    auth: &Auth,
    args: &file::COMMIT3args,
) -> Result<file::COMMIT3resok> {
    debug!("nfsproc3_commit({:?}, offset {}, count {})", args.file, args.offset, args.count);
    let proc = NFSProgram::NFSPROC3_COMMIT;
    let res: file::COMMIT3res =
        client.call(nfs3::PROGRAM, nfs3::VERSION, proc as u32, auth, args).await?;
    check(proc, res)
}

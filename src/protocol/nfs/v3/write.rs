//! Implementation of the WRITE procedure (procedure 7) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.7.
//!
//! The server may accept fewer bytes than were sent; `count` in the reply
//! says how many. `committed` says how durable the accepted bytes are, and
//! anything weaker than `FILE_SYNC` needs a later COMMIT.

use tracing::debug;

use super::check;
use crate::protocol::rpc::{Auth, RpcClient};
use crate::protocol::xdr::nfs3::{self, file, NFSProgram};
use crate::Result;

/// Writes `args.data` at `args.offset`.
pub async fn nfsproc3_write(
    client: &RpcClient,
    auth: &Auth,
    args: &file::WRITE3args,
) -> Result<file::WRITE3resok> {
    debug!(
        "nfsproc3_write({:?}, offset {}, count {}, {:?})",
        args.file, args.offset, args.count, args.stable
    );
    let proc = NFSProgram::NFSPROC3_WRITE;
    let res: file::WRITE3res =
        client.call(nfs3::PROGRAM, nfs3::VERSION, proc as u32, auth, args).await?;
    check(proc, res)
}

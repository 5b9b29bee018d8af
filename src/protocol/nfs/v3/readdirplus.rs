//! Implementation of the READDIRPLUS procedure (procedure 17) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.17.
//!
//! READDIRPLUS returns one page of a directory: names, file ids, cookies, and
//! where the server is willing, attributes and file handles. A listing is
//! walked by echoing the last cookie and the cookie verifier of the previous
//! page until a page arrives with `eof` set. A page may be short or even
//! empty without being the last.

use tracing::debug;

use super::check;
use crate::protocol::rpc::{Auth, RpcClient};
use crate::protocol::xdr::nfs3::{self, dir, NFSProgram};
use crate::Result;

/// Fetches the page of `args.dir` that follows `args.cookie`.
pub async fn nfsproc3_readdirplus(
    client: &RpcClient,
    auth: &Auth,
    args: &dir::READDIRPLUS3args,
) -> Result<dir::READDIRPLUS3resok> {
    debug!(
        "nfsproc3_readdirplus({:?}, cookie {}, dircount {}, maxcount {})",
        args.dir, args.cookie, args.dircount, args.maxcount
    );
    let proc = NFSProgram::NFSPROC3_READDIRPLUS;
    let res: dir::READDIRPLUS3res =
        client.call(nfs3::PROGRAM, nfs3::VERSION, proc as u32, auth, args).await?;
    let ok = check(proc, res)?;
    debug!("  --> {} entries, eof {}", ok.reply.entries.0.len(), ok.reply.eof);
    Ok(ok)
}

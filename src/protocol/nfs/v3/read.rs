//! Implementation of the READ procedure (procedure 6) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.6.
//!
//! The READ procedure retrieves data from a regular file. It may be used to read
//! whole or partial files at any offset. The client specifies:
//! - The file handle of the file to read
//! - The offset in the file to start reading
//! - The amount of data to read
//!
//! On successful return, the server provides:
//! - The file attributes after the read
//! - The actual number of bytes read
//! - An EOF flag indicating whether the read reached the end of file
//! - The data read from the file

use tracing::debug;

use super::check;
use crate::protocol::rpc::{Auth, RpcClient};
use crate::protocol::xdr::nfs3::{self, file, NFSProgram};
use crate::{Error, Result};

/// Reads up to `args.count` bytes at `args.offset`.
///
/// The reply may carry fewer bytes than requested without being at the end
/// of the file; only `eof` says the end was reached.
pub async fn nfsproc3_read(
    client: &RpcClient,
    auth: &Auth,
    args: &file::READ3args,
) -> Result<file::READ3resok> {
    debug!("nfsproc3_read({:?}, offset {}, count {})", args.file, args.offset, args.count);
    let proc = NFSProgram::NFSPROC3_READ;
    let res: file::READ3res =
        client.call(nfs3::PROGRAM, nfs3::VERSION, proc as u32, auth, args).await?;
    let ok = check(proc, res)?;
    if ok.data.len() != ok.count as usize {
        return Err(Error::MalformedReply(format!(
            "READ reported {} bytes but carried {}",
            ok.count,
            ok.data.len()
        )));
    }
    Ok(ok)
}

//! Implementation of the UMNT procedure (procedure 3) for MOUNT version 3 protocol
//! as defined in RFC 1813 section 5.2.3
//! https://datatracker.ietf.org/doc/html/rfc1813#section-5.2.3
//!
//! UMNT only removes the entry from the server's mount list. Handles obtained
//! from the mount keep working for as long as the server honors them.

use tracing::debug;

use super::check_path;
use crate::protocol::rpc::{Auth, RpcClient};
use crate::protocol::xdr::mount;
use crate::Result;

pub async fn mountproc3_umnt(client: &RpcClient, auth: &Auth, path: &str) -> Result<()> {
    check_path(path)?;
    debug!("mountproc3_umnt({:?})", path);
    client
        .call(
            mount::PROGRAM,
            mount::VERSION,
            mount::MountProgram::MOUNTPROC3_UMNT as u32,
            auth,
            path.as_bytes(),
        )
        .await
}

//! Implementation of the NULL procedure (procedure 0) for MOUNT version 3 protocol
//! as defined in RFC 1813 section 5.2.0.
//! https://datatracker.ietf.org/doc/html/rfc1813#section-5.2.0

use tracing::debug;

use crate::protocol::rpc::{Auth, RpcClient};
use crate::protocol::xdr::mount;
use crate::Result;

pub async fn mountproc3_null(client: &RpcClient) -> Result<()> {
    debug!("mountproc3_null({})", client.peer_addr());
    client
        .call(
            mount::PROGRAM,
            mount::VERSION,
            mount::MountProgram::MOUNTPROC3_NULL as u32,
            &Auth::none(),
            &(),
        )
        .await
}

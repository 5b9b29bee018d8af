//! Implementation of the NULL procedure (procedure 0) for port mapper protocol
//! as defined in RFC 1057 A.2 section.
//! https://datatracker.ietf.org/doc/rfc1057/

use tracing::debug;

use crate::protocol::rpc::{Auth, RpcClient};
use crate::protocol::xdr::portmap;
use crate::Result;

/// Checks that the portmapper answers at all.
pub async fn pmapproc_null(client: &RpcClient) -> Result<()> {
    debug!("pmapproc_null({})", client.peer_addr());
    client
        .call(
            portmap::PROGRAM,
            portmap::VERSION,
            portmap::PortmapProgram::PMAPPROC_NULL as u32,
            &Auth::none(),
            &(),
        )
        .await
}

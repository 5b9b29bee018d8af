//! Implementation of the EXPORT procedure (procedure 5) for `MOUNT` version 3 protocol
//! as defined in RFC 1813 section 5.2.5.
//! <https://datatracker.ietf.org/doc/html/rfc1813#section-5.2.5>.

use tracing::debug;

use crate::protocol::rpc::{Auth, RpcClient};
use crate::protocol::xdr::mount::{self, exportnode, exports};
use crate::Result;

/// Returns every exported file system and the groups allowed to mount it,
/// flattened from the reply's linked list in server order.
pub async fn mountproc3_export(client: &RpcClient, auth: &Auth) -> Result<Vec<exportnode>> {
    debug!("mountproc3_export({})", client.peer_addr());
    let res: exports = client
        .call(
            mount::PROGRAM,
            mount::VERSION,
            mount::MountProgram::MOUNTPROC3_EXPORT as u32,
            auth,
            &(),
        )
        .await?;
    debug!("  --> {} exports", res.0.len());
    Ok(res.0)
}

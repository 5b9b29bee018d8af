//! Implementation of the NULL procedure (procedure 0) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.0.
//!
//! The NULL procedure does no work and is typically used to:
//! - Check if the server is responding (ping)
//! - Measure basic RPC round-trip time
//! - Validate RPC credentials

use tracing::debug;

use crate::protocol::rpc::{Auth, RpcClient};
use crate::protocol::xdr::nfs3;
use crate::Result;

/// Pings the NFS service with `auth`, which also checks that the server
/// accepts the credential.
pub async fn nfsproc3_null(client: &RpcClient, auth: &Auth) -> Result<()> {
    debug!("nfsproc3_null()");
    client
        .call(nfs3::PROGRAM, nfs3::VERSION, nfs3::NFSProgram::NFSPROC3_NULL as u32, auth, &())
        .await
}

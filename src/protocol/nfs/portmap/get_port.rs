//! Implementation of the GETPORT procedure (procedure 3) for port mapper protocol
//! as defined in RFC 1057 A.2 section.
//! https://datatracker.ietf.org/doc/rfc1057/

use tracing::debug;

use crate::protocol::rpc::{Auth, RpcClient};
use crate::protocol::xdr::portmap::{self, mapping, IPPROTO_TCP, IPPROTO_UDP};
use crate::transport::DialOptions;
use crate::{Error, Result};

/// Issues PMAPPROC_GETPORT.
///
/// The `port` field of the request is ignored by the server. A reply of port
/// zero means the program is not registered and is returned as
/// [`Error::NotRegistered`].
pub async fn pmapproc_getport(client: &RpcClient, request: &mapping) -> Result<u16> {
    debug!("pmapproc_getport({:?})", request);
    let port: u32 = client
        .call(
            portmap::PROGRAM,
            portmap::VERSION,
            portmap::PortmapProgram::PMAPPROC_GETPORT as u32,
            &Auth::none(),
            request,
        )
        .await?;
    debug!("\t{:?} --> {:?}", request, port);
    match port {
        0 => Err(Error::NotRegistered { prog: request.prog, vers: request.vers }),
        port => u16::try_from(port)
            .map_err(|_| Error::MalformedReply(format!("portmapper returned port {port}"))),
    }
}

/// Dials the portmapper on `host:pmap_port`, asks it where `prog`/`vers`
/// listens over the transport `opts` selects, and hangs up again.
pub async fn resolve_port(
    host: &str,
    pmap_port: u16,
    prog: u32,
    vers: u32,
    opts: &DialOptions,
) -> Result<u16> {
    let pmap = RpcClient::dial_with(host, pmap_port, opts).await?;
    let request = mapping {
        prog,
        vers,
        prot: if opts.datagram { IPPROTO_UDP } else { IPPROTO_TCP },
        port: 0,
    };
    let res = pmapproc_getport(&pmap, &request).await;
    pmap.close().await?;
    res
}


//! PORTMAP protocol client as specified in RFC 1057 A.1 and A.2 sections.
//! https://datatracker.ietf.org/doc/rfc1057/
//!
//! Only the calls a client needs are issued: NULL to ping the portmapper and
//! GETPORT to resolve a program and version to a port.

mod get_port;
mod null;

pub use get_port::{pmapproc_getport, resolve_port};
pub use null::pmapproc_null;

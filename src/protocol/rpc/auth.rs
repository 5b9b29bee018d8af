//! Credentials carried by RPC calls (RFC 5531 section 8 and appendix A).
//!
//! Building a credential never touches the network. The verifier sent with
//! every call is AUTH_NONE; AUTH_UNIX has no verifier of its own.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::protocol::xdr::rpc::{auth_flavor, auth_unix, opaque_auth};
use crate::protocol::xdr::Serialize;
use crate::{Error, Result};

/// Upper bound on the encoded body of an `opaque_auth`.
pub const MAX_AUTH_BYTES: usize = 400;
/// Upper bound on the machine name of an AUTH_UNIX credential.
pub const MAX_MACHINE_NAME_LEN: usize = 255;
/// Upper bound on the auxiliary groups of an AUTH_UNIX credential.
pub const MAX_GIDS: usize = 16;

/// Identity presented to the server.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Auth {
    /// AUTH_NONE: no identity at all.
    #[default]
    Null,
    /// AUTH_UNIX: uid, gid, auxiliary groups and machine name.
    Unix(auth_unix),
}

impl Auth {
    pub fn none() -> Self {
        Auth::Null
    }

    /// AUTH_UNIX credential with no auxiliary groups.
    pub fn unix(machine_name: impl Into<String>, uid: u32, gid: u32) -> Self {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default();
        Auth::Unix(auth_unix {
            stamp,
            machinename: machine_name.into().into_bytes(),
            uid,
            gid,
            gids: Vec::new(),
        })
    }

    /// Replaces the auxiliary group list. Has no effect on AUTH_NONE.
    pub fn with_gids(mut self, gids: impl IntoIterator<Item = u32>) -> Self {
        if let Auth::Unix(cred) = &mut self {
            cred.gids = gids.into_iter().collect();
        }
        self
    }

    pub fn flavor(&self) -> auth_flavor {
        match self {
            Auth::Null => auth_flavor::AUTH_NULL,
            Auth::Unix(_) => auth_flavor::AUTH_UNIX,
        }
    }

    /// Encodes the credential and verifier placed in a call header.
    pub fn encode(&self) -> Result<(opaque_auth, opaque_auth)> {
        let cred = match self {
            Auth::Null => opaque_auth::default(),
            Auth::Unix(unix) => {
                if unix.machinename.len() > MAX_MACHINE_NAME_LEN {
                    return Err(Error::InvalidArgument(format!(
                        "machine name of {} bytes exceeds {MAX_MACHINE_NAME_LEN}",
                        unix.machinename.len()
                    )));
                }
                if unix.gids.len() > MAX_GIDS {
                    return Err(Error::InvalidArgument(format!(
                        "{} auxiliary groups exceed {MAX_GIDS}",
                        unix.gids.len()
                    )));
                }
                let mut body = Vec::new();
                unix.serialize(&mut body).map_err(Error::Xdr)?;
                if body.len() > MAX_AUTH_BYTES {
                    return Err(Error::InvalidArgument(format!(
                        "credential body of {} bytes exceeds {MAX_AUTH_BYTES}",
                        body.len()
                    )));
                }
                opaque_auth { flavor: auth_flavor::AUTH_UNIX, body }
            }
        };
        Ok((cred, opaque_auth::default()))
    }
}

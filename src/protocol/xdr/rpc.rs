//! This module provides data structures for the Remote Procedure Call (RPC) protocol
//! as defined in RFC 5531 (previously RFC 1057). These structures handle serialization
//! of outbound calls and deserialization of the replies a server sends back.

// Keep original RFC naming conventions for consistency with the RFCs
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::*;

/// RPC protocol version carried in every call.
pub const RPC_VERSION: u32 = 2;

/// Message type discriminant of a call.
const CALL: u32 = 0;
/// Message type discriminant of a reply.
const REPLY: u32 = 1;

/// Authentication status codes indicating why authentication failed
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum auth_stat {
    /// Success
    AUTH_OK = 0,
    /// Invalid credentials provided by client (checksum/signature verification failed)
    #[default]
    AUTH_BADCRED = 1,
    /// Credentials rejected - client needs to establish a new session
    AUTH_REJECTEDCRED = 2,
    /// Invalid verifier provided by client (checksum/signature verification failed)
    AUTH_BADVERF = 3,
    /// Verifier rejected due to expiration or replay attempt
    AUTH_REJECTEDVERF = 4,
    /// Authentication mechanism too weak for requested operation
    AUTH_TOOWEAK = 5,
    /// Bogus response verifier
    AUTH_INVALIDRESP = 6,
    /// Reason unknown
    AUTH_FAILED = 7,
}
SerializeEnum!(auth_stat);
DeserializeEnum!(auth_stat);

/// Authentication flavor (mechanism) identifiers for RPC
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum auth_flavor {
    /// No authentication
    #[default]
    AUTH_NULL = 0,
    /// UNIX-style authentication (uid/gid)
    AUTH_UNIX = 1,
    /// Short-form authentication
    AUTH_SHORT = 2,
    /// DES authentication
    AUTH_DES = 3,
    /// RPCSEC_GSS, RFC 2203
    RPCSEC_GSS = 6,
}
SerializeEnum!(auth_flavor);
DeserializeEnum!(auth_flavor);

/// UNIX-style credentials used for authentication
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct auth_unix {
    /// Arbitrary id the caller may generate
    pub stamp: u32,
    /// The name of the client machine
    pub machinename: Vec<u8>,
    /// The effective user ID of the caller
    pub uid: u32,
    /// The effective group ID of the caller
    pub gid: u32,
    /// A list of additional group IDs for the caller
    pub gids: Vec<u32>,
}
DeserializeStruct!(auth_unix, stamp, machinename, uid, gid, gids);
SerializeStruct!(auth_unix, stamp, machinename, uid, gid, gids);

/// Authentication data structure used in RPC protocol for both client and server authentication.
///
/// The RPC protocol provides bidirectional authentication between caller and service:
/// - Call messages contain two auth fields: credentials and verifier
/// - Reply messages contain one auth field: response verifier
///
/// Each auth field is represented as an `opaque_auth` structure containing:
/// - An `auth_flavor` enum identifying the authentication mechanism
/// - Opaque bytes containing the auth data, interpreted based on the mechanism
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct opaque_auth {
    /// The authentication mechanism being used
    pub flavor: auth_flavor,
    /// The opaque authentication data associated with that mechanism
    pub body: Vec<u8>,
}
DeserializeStruct!(opaque_auth, flavor, body);
SerializeStruct!(opaque_auth, flavor, body);

/// RPC message structure as defined in RFC 5531 (previously RFC 1057).
///
/// Each RPC message begins with a transaction identifier (xid) followed by a
/// discriminated union containing either a CALL or REPLY message body.
///
/// The xid is not a sequence number. It is only used to match a REPLY with
/// the CALL that caused it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct rpc_msg {
    /// Transaction identifier used to match calls and replies
    pub xid: u32,
    /// The body of the RPC message (call or reply)
    pub body: rpc_body,
}
DeserializeStruct!(rpc_msg, xid, body);
SerializeStruct!(rpc_msg, xid, body);

impl rpc_msg {
    /// Builds the header of an outbound call. Procedure arguments follow it on the wire.
    pub fn call(
        xid: u32,
        prog: u32,
        vers: u32,
        proc: u32,
        cred: opaque_auth,
        verf: opaque_auth,
    ) -> rpc_msg {
        rpc_msg {
            xid,
            body: rpc_body::CALL(call_body { rpcvers: RPC_VERSION, prog, vers, proc, cred, verf }),
        }
    }

    /// Builds the header of an accepted reply carrying `reply_data`.
    pub fn accepted(xid: u32, reply_data: accept_body) -> rpc_msg {
        let reply = reply_body::MSG_ACCEPTED(accepted_reply {
            verf: opaque_auth::default(),
            reply_data,
        });
        rpc_msg { xid, body: rpc_body::REPLY(reply) }
    }

    /// Builds a denied reply.
    pub fn denied(xid: u32, rejection: rejected_reply) -> rpc_msg {
        rpc_msg { xid, body: rpc_body::REPLY(reply_body::MSG_DENIED(rejection)) }
    }
}

/// The body of an RPC message, which can be either a call or a reply
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum rpc_body {
    /// A call to a remote procedure
    CALL(call_body),
    /// A reply from a remote procedure
    REPLY(reply_body),
}

impl Default for rpc_body {
    fn default() -> rpc_body {
        rpc_body::CALL(call_body::default())
    }
}

impl Serialize for rpc_body {
    fn serialize<R: Write>(&self, dest: &mut R) -> std::io::Result<()> {
        match self {
            rpc_body::CALL(v) => {
                CALL.serialize(dest)?;
                v.serialize(dest)?;
            }
            rpc_body::REPLY(v) => {
                REPLY.serialize(dest)?;
                v.serialize(dest)?;
            }
        }
        Ok(())
    }
}

impl Deserialize for rpc_body {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            CALL => *self = rpc_body::CALL(deserialize(src)?),
            REPLY => *self = rpc_body::REPLY(deserialize(src)?),
            msg_type => return Err(unknown_discriminant("msg_type", msg_type)),
        }

        Ok(())
    }
}

/// The body of an RPC call, containing all information needed for a remote procedure call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct call_body {
    /// RPC version, must be 2
    pub rpcvers: u32,
    /// The program to call
    pub prog: u32,
    /// The version of the program
    pub vers: u32,
    /// The procedure within the program to call
    pub proc: u32,
    /// Authentication credentials for the caller
    pub cred: opaque_auth,
    /// Authentication verifier for the caller
    pub verf: opaque_auth,
    /* procedure specific parameters start here */
}
DeserializeStruct!(call_body, rpcvers, prog, vers, proc, cred, verf);
SerializeStruct!(call_body, rpcvers, prog, vers, proc, cred, verf);

/// The body of an RPC reply, indicating whether the call was accepted or denied
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum reply_body {
    /// The call was accepted
    MSG_ACCEPTED(accepted_reply),
    /// The call was denied
    MSG_DENIED(rejected_reply),
}

impl Default for reply_body {
    fn default() -> reply_body {
        reply_body::MSG_ACCEPTED(accepted_reply::default())
    }
}

impl Serialize for reply_body {
    fn serialize<R: Write>(&self, dest: &mut R) -> std::io::Result<()> {
        match self {
            reply_body::MSG_ACCEPTED(v) => {
                0_u32.serialize(dest)?;
                v.serialize(dest)?;
            }
            reply_body::MSG_DENIED(v) => {
                1_u32.serialize(dest)?;
                v.serialize(dest)?;
            }
        }
        Ok(())
    }
}

impl Deserialize for reply_body {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = reply_body::MSG_ACCEPTED(deserialize(src)?),
            1 => *self = reply_body::MSG_DENIED(deserialize(src)?),
            reply_stat => return Err(unknown_discriminant("reply_stat", reply_stat)),
        }

        Ok(())
    }
}

/// Range of versions supported by the server
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct mismatch_info {
    /// Lowest version supported
    pub low: u32,
    /// Highest version supported
    pub high: u32,
}
DeserializeStruct!(mismatch_info, low, high);
SerializeStruct!(mismatch_info, low, high);

/// Reply to an RPC call that was accepted by the server.
///
/// Even though the call was accepted, there could still be an error in processing it.
/// On SUCCESS the procedure results follow this header on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct accepted_reply {
    /// Authentication verifier from server
    pub verf: opaque_auth,
    /// Reply data union discriminated by accept_stat
    pub reply_data: accept_body,
}
DeserializeStruct!(accepted_reply, verf, reply_data);
SerializeStruct!(accepted_reply, verf, reply_data);

/// Response data for an accepted RPC call, discriminated by accept_stat.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum accept_body {
    /// Call completed successfully
    #[default]
    SUCCESS,
    /// Program is not available on this server
    PROG_UNAVAIL,
    /// Program version mismatch, includes supported version range
    PROG_MISMATCH(mismatch_info),
    /// Requested procedure is not available
    PROC_UNAVAIL,
    /// Server could not decode the call arguments
    GARBAGE_ARGS,
    /// Memory allocation failure or similar on the server
    SYSTEM_ERR,
}

impl Serialize for accept_body {
    fn serialize<R: Write>(&self, dest: &mut R) -> std::io::Result<()> {
        match self {
            accept_body::SUCCESS => 0_u32.serialize(dest),
            accept_body::PROG_UNAVAIL => 1_u32.serialize(dest),
            accept_body::PROG_MISMATCH(v) => {
                2_u32.serialize(dest)?;
                v.serialize(dest)
            }
            accept_body::PROC_UNAVAIL => 3_u32.serialize(dest),
            accept_body::GARBAGE_ARGS => 4_u32.serialize(dest),
            accept_body::SYSTEM_ERR => 5_u32.serialize(dest),
        }
    }
}

impl Deserialize for accept_body {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = accept_body::SUCCESS,
            1 => *self = accept_body::PROG_UNAVAIL,
            2 => *self = accept_body::PROG_MISMATCH(deserialize(src)?),
            3 => *self = accept_body::PROC_UNAVAIL,
            4 => *self = accept_body::GARBAGE_ARGS,
            5 => *self = accept_body::SYSTEM_ERR,
            accept_stat => return Err(unknown_discriminant("accept_stat", accept_stat)),
        }

        Ok(())
    }
}

/// Reply sent when an RPC call is rejected by the server.
///
/// The call can be rejected for two reasons:
/// 1. RPC Version Mismatch (RPC_MISMATCH): the server returns the lowest and
///    highest RPC versions it supports.
/// 2. Authentication Error (AUTH_ERROR): the server refuses to authenticate
///    the caller and says why.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum rejected_reply {
    /// RPC version mismatch - includes supported version range
    RPC_MISMATCH(mismatch_info),
    /// Authentication failed - includes specific error code
    AUTH_ERROR(auth_stat),
}

impl Default for rejected_reply {
    fn default() -> rejected_reply {
        rejected_reply::AUTH_ERROR(auth_stat::default())
    }
}

impl Serialize for rejected_reply {
    fn serialize<R: Write>(&self, dest: &mut R) -> std::io::Result<()> {
        match self {
            rejected_reply::RPC_MISMATCH(v) => {
                0_u32.serialize(dest)?;
                v.serialize(dest)?;
            }
            rejected_reply::AUTH_ERROR(v) => {
                1_u32.serialize(dest)?;
                v.serialize(dest)?;
            }
        }

        Ok(())
    }
}

impl Deserialize for rejected_reply {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = rejected_reply::RPC_MISMATCH(deserialize(src)?),
            1 => *self = rejected_reply::AUTH_ERROR(deserialize(src)?),
            stat => return Err(unknown_discriminant("reject_stat", stat)),
        }

        Ok(())
    }
}

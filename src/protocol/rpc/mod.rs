//! RPC (Remote Procedure Call) protocol implementation as specified in RFC 5531
//! (previously RFC 1057).
//!
//! The RPC protocol enables programs to call procedures on remote systems as if
//! they were local calls. It forms the foundation for all NFS operations by
//! providing a standard mechanism for client-server communication.
//!
//! This module implements the calling side of RPC version 2:
//!
//! 1. Message framing for TCP using the Record Marking Standard
//! 2. Transaction tracking: every call gets an XID and a waiter in a table,
//!    and a reader task hands each reply to the waiter with the same XID
//! 3. Authentication (AUTH_NONE, AUTH_UNIX)
//! 4. Decoding of accept/reject status into [`crate::RpcError`]
//!
//! Many callers may share one [`RpcClient`]. Writes of whole records are
//! serialized by a lock; replies are demultiplexed by XID, so a slow call
//! does not hold up a fast one.

mod auth;
mod client;
mod transaction_tracker;
mod wire;

pub use auth::{Auth, MAX_AUTH_BYTES, MAX_GIDS, MAX_MACHINE_NAME_LEN};
pub use client::RpcClient;
pub use transaction_tracker::TransactionTracker;
pub use wire::{read_fragment, read_record, write_fragment};

/// Largest RPC record the client will accept or send.
pub const MAX_RPC_RECORD_LENGTH: usize = 32 * 1024 * 1024;

/// Largest payload of one UDP datagram.
pub const MAX_DATAGRAM_LENGTH: usize = 65_507;

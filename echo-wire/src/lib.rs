//! Wire format for the echo RPC protocol.
//!
//! This crate provides the shared definitions both ends of a connection
//! agree on: frame preamble layout, header serialization in either codec,
//! message kinds, and protocol constants. It carries no I/O policy beyond
//! reading and writing single frames over `std::io` streams.

pub mod constants;
pub mod frame;
pub mod message;

pub use frame::{read_frame, write_frame, Frame, WireError, PREAMBLE_LEN};
pub use message::{CallHeader, Codec, MessageKind};

//! Client library for the echo RPC protocol.
//!
//! Exposes connection establishment with per-call timeout and retry, a
//! fan-out composition that unifies several connections behind one dispatch
//! facade, and a stub type supporting synchronous unary calls as well as
//! pull (server-paced) and push (client-paced) streams. All I/O is blocking;
//! a channel multiplexes any number of concurrent callers over one TCP
//! connection.

pub mod channel;
pub mod error;
pub mod options;
pub mod parallel;
pub mod stream;
pub mod stub;

pub use channel::Channel;
pub use error::{Result, RpcError};
pub use options::{ChannelOptions, LbPolicy, Protocol};
pub use parallel::ParallelChannel;
pub use stream::{PullStream, PushStream};
pub use stub::{EchoReply, EchoStub, Placement};

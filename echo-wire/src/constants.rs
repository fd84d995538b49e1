/// Magic number used to identify valid echo frames.
pub const ECHO_MAGIC: u32 = 0xecb0_cafe;

/// TCP port the echo server conventionally listens on.
pub const ECHO_TCP_PORT: u16 = 8002;

/// Largest request or chunk payload the protocol carries, in bytes.
pub const MAX_PAYLOAD_LEN: u32 = 1 << 30;

/// Upper bound on an encoded call header, in bytes.
///
/// Headers can embed a full payload in their body field, so the cap is the
/// payload cap plus room for the fixed fields and codec framing.
pub const MAX_HEADER_LEN: u32 = MAX_PAYLOAD_LEN + 4096;

/// Upper bound on a frame attachment, in bytes.
pub const MAX_ATTACHMENT_LEN: u32 = MAX_PAYLOAD_LEN;

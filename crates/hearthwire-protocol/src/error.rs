//! Error types for the protocol layer.
//!
//! A `FrameError` always means "these bytes are not a packet we can
//! read". Whether that kills the connection or is shrugged off is the
//! dispatcher's call, not ours.

/// Errors raised while decoding packet bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The buffer ended before the field being read.
    ///
    /// `needed` is how many bytes the read wanted, `remaining` how many
    /// were left.
    #[error("truncated packet: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// The opcode byte does not name any packet we understand.
    #[error("unknown opcode 0x{0:02X}")]
    UnknownOpcode(u8),

    /// A text field that must be a decimal number wasn't.
    #[error("invalid numeric field {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}

//! Protocol limits.
//!
//! Hard caps enforced at validation boundaries. These bound memory use on
//! both sides of the wire; an envelope or message exceeding them is
//! rejected, never truncated.

/// Maximum message text length in characters.
pub const MAX_TEXT_LEN: usize = 4096;

/// Maximum number of embeds attached to a single message.
pub const MAX_EMBEDS: usize = 8;

/// Maximum ciphertext length in bytes accepted at ingress.
///
/// UTF-8 text up to [`MAX_TEXT_LEN`] chars (4 bytes/char worst case) plus
/// the serialized payload framing and the 16-byte AEAD tag, rounded up.
pub const MAX_CIPHERTEXT_LEN: usize = 32 * 1024;

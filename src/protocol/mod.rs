//! Client Protocol
//!
//! Binary request/response protocol spoken over the daemon's Unix socket.
//! All integers are little-endian.
//!
//! # Requests
//!
//! | Opcode | Name     | Operand  |
//! |--------|----------|----------|
//! | `0x00` | `NOTIFY` | -        |
//! | `0x01` | `LIST`   | -        |
//! | `0x02` | `SELECT` | `id:u64` |
//! | `0x03` | `CLEAR`  | -        |
//! | `0x04` | `GET`    | `id:u64` |
//! | `0x05` | `DELETE` | `id:u64` |
//!
//! # Responses
//!
//! ```text
//! ┌──────────┬──────────┬─────────────────┐
//! │ status:u8│ len:u32  │ body (len bytes)│
//! └──────────┴──────────┴─────────────────┘
//! ```
//!
//! Status is `0` OK, `1` NOT_FOUND or `2` ERROR. Bodies:
//!
//! - `LIST`: `count:u32`, then per row `id:u64 type:u8 size:u64
//!   captured_at:u64 preview_len:u16 preview`
//! - `GET`: `id:u64 type:u8 captured_at:u64 payload`
//! - `CLEAR`: `removed:u32`
//! - ERROR: UTF-8 message
//!
//! A connection carries any number of requests, answered in order.

pub mod codec;
pub mod messages;

pub use codec::{ClientCodec, ServerCodec};
pub use messages::{Request, Response, ResponseFrame, Status};

use thiserror::Error;

/// Default maximum frame size (64 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Smallest usable frame limit; ERROR messages must always fit
pub const MIN_FRAME_SIZE: usize = 4096;

/// Largest frame limit the `u32` length field can express
pub const MAX_FRAME_SIZE_LIMIT: usize = u32::MAX as usize;

/// Response header: status byte plus body length
pub const RESPONSE_HEADER_LEN: usize = 5;

/// Wire protocol errors
///
/// Any of these terminates the connection it occurred on.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Request opcode not recognized
    #[error("Unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),

    /// Response status not recognized
    #[error("Unknown response status {0}")]
    UnknownStatus(u8),

    /// Frame body larger than the configured limit
    #[error("Frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge {
        /// Announced body size
        size: usize,
        /// Configured limit
        max: usize,
    },

    /// Stream ended inside a frame
    #[error("Connection closed mid-frame ({0} bytes pending)")]
    Truncated(usize),

    /// Body does not match the expected layout
    #[error("Malformed message body: {0}")]
    Malformed(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Returns true if the peer simply went away
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

//! Frame codecs for `tokio_util::codec::Framed`
//!
//! [`ServerCodec`] decodes requests and encodes responses; [`ClientCodec`]
//! is its mirror image.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::messages::{Request, Response, ResponseFrame, Status};
use super::{ProtocolError, DEFAULT_MAX_FRAME_SIZE, RESPONSE_HEADER_LEN};

/// Daemon side of a connection
#[derive(Debug, Clone, Copy)]
pub struct ServerCodec {
    max_frame_size: usize,
}

impl ServerCodec {
    /// Create a codec that refuses to send bodies above `max_frame_size`
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for ServerCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for ServerCodec {
    type Item = Request;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Request>, ProtocolError> {
        let Some(&opcode) = src.first() else {
            return Ok(None);
        };

        let operand_len =
            Request::operand_len(opcode).ok_or(ProtocolError::UnknownOpcode(opcode))?;

        if src.len() < 1 + operand_len {
            src.reserve(1 + operand_len - src.len());
            return Ok(None);
        }

        src.advance(1);
        let operand = src.split_to(operand_len);
        Request::parse(opcode, &operand).map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Request>, ProtocolError> {
        match self.decode(src)? {
            Some(request) => Ok(Some(request)),
            None if src.is_empty() => Ok(None),
            None => Err(ProtocolError::Truncated(src.len())),
        }
    }
}

impl Encoder<Response> for ServerCodec {
    type Error = ProtocolError;

    fn encode(&mut self, response: Response, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let body_len = response.body_len();
        if body_len > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: body_len,
                max: self.max_frame_size,
            });
        }

        dst.reserve(RESPONSE_HEADER_LEN + body_len);
        dst.put_u8(response.status() as u8);
        dst.put_u32_le(body_len as u32);
        response.encode_body(dst);
        Ok(())
    }
}

/// Client side of a connection
#[derive(Debug, Clone, Copy)]
pub struct ClientCodec {
    max_frame_size: usize,
}

impl ClientCodec {
    /// Create a codec that rejects bodies above `max_frame_size`
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for ClientCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for ClientCodec {
    type Item = ResponseFrame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ResponseFrame>, ProtocolError> {
        if src.len() < RESPONSE_HEADER_LEN {
            return Ok(None);
        }

        let status = Status::from_u8(src[0]).ok_or(ProtocolError::UnknownStatus(src[0]))?;
        let body_len = u32::from_le_bytes([src[1], src[2], src[3], src[4]]) as usize;

        if body_len > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: body_len,
                max: self.max_frame_size,
            });
        }

        let frame_len = RESPONSE_HEADER_LEN + body_len;
        if src.len() < frame_len {
            // Length prefix lets the whole body be allocated once
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(RESPONSE_HEADER_LEN);
        let body = src.split_to(body_len).freeze();
        Ok(Some(ResponseFrame { status, body }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<ResponseFrame>, ProtocolError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(ProtocolError::Truncated(src.len())),
        }
    }
}

impl Encoder<Request> for ClientCodec {
    type Error = ProtocolError;

    fn encode(&mut self, request: Request, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        request.encode(dst);
        Ok(())
    }
}

//! Protocol messages and body layouts

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::ProtocolError;
use crate::history::{ContentType, Entry, EntrySummary};

/// Request opcodes
pub mod opcode {
    /// Clipboard changed; capture it
    pub const NOTIFY: u8 = 0x00;
    /// Fetch the manifest
    pub const LIST: u8 = 0x01;
    /// Publish an entry as the clipboard content
    pub const SELECT: u8 = 0x02;
    /// Remove every entry
    pub const CLEAR: u8 = 0x03;
    /// Fetch one entry with its payload
    pub const GET: u8 = 0x04;
    /// Remove one entry
    pub const DELETE: u8 = 0x05;
}

/// Size of an entry id operand
pub const ID_LEN: usize = 8;

/// Fixed part of a manifest row
const LIST_ROW_HEADER_LEN: usize = 8 + 1 + 8 + 8 + 2;

/// Fixed part of a GET body
pub const ENTRY_HEADER_LEN: usize = 8 + 1 + 8;

/// Client request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Clipboard changed
    Notify,
    /// Fetch the manifest
    List,
    /// Publish entry `id`
    Select(u64),
    /// Remove every entry
    Clear,
    /// Fetch entry `id`
    Get(u64),
    /// Remove entry `id`
    Delete(u64),
}

impl Request {
    /// Wire opcode
    pub fn opcode(&self) -> u8 {
        match self {
            Self::Notify => opcode::NOTIFY,
            Self::List => opcode::LIST,
            Self::Select(_) => opcode::SELECT,
            Self::Clear => opcode::CLEAR,
            Self::Get(_) => opcode::GET,
            Self::Delete(_) => opcode::DELETE,
        }
    }

    /// Operand length following `opcode`, or `None` if the opcode is unknown
    pub fn operand_len(opcode: u8) -> Option<usize> {
        match opcode {
            opcode::NOTIFY | opcode::LIST | opcode::CLEAR => Some(0),
            opcode::SELECT | opcode::GET | opcode::DELETE => Some(ID_LEN),
            _ => None,
        }
    }

    /// Build a request from its opcode and a complete operand
    pub fn parse(opcode: u8, mut operand: &[u8]) -> Result<Self, ProtocolError> {
        let mut id = || {
            if operand.remaining() < ID_LEN {
                return Err(ProtocolError::Malformed("short id operand".to_string()));
            }
            Ok(operand.get_u64_le())
        };

        match opcode {
            opcode::NOTIFY => Ok(Self::Notify),
            opcode::LIST => Ok(Self::List),
            opcode::SELECT => Ok(Self::Select(id()?)),
            opcode::CLEAR => Ok(Self::Clear),
            opcode::GET => Ok(Self::Get(id()?)),
            opcode::DELETE => Ok(Self::Delete(id()?)),
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }

    /// Append the wire form to `dst`
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.opcode());
        match self {
            Self::Select(id) | Self::Get(id) | Self::Delete(id) => dst.put_u64_le(*id),
            Self::Notify | Self::List | Self::Clear => {}
        }
    }

    /// Human-readable name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Notify => "NOTIFY",
            Self::List => "LIST",
            Self::Select(_) => "SELECT",
            Self::Clear => "CLEAR",
            Self::Get(_) => "GET",
            Self::Delete(_) => "DELETE",
        }
    }
}

/// Response status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    /// Request succeeded
    Ok = 0,
    /// Referenced entry does not exist
    NotFound = 1,
    /// Request failed; body carries a message
    Error = 2,
}

impl Status {
    /// Parse a status byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            1 => Some(Self::NotFound),
            2 => Some(Self::Error),
            _ => None,
        }
    }
}

/// Server response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Success with empty body
    Ok,
    /// Referenced entry does not exist
    NotFound,
    /// Failure with message
    Error(String),
    /// Manifest, newest first
    List(Vec<EntrySummary>),
    /// One full entry
    Entry(Entry),
    /// Number of entries removed by `CLEAR`
    Cleared(u32),
}

impl Response {
    /// Status byte for this response
    pub fn status(&self) -> Status {
        match self {
            Self::NotFound => Status::NotFound,
            Self::Error(_) => Status::Error,
            Self::Ok | Self::List(_) | Self::Entry(_) | Self::Cleared(_) => Status::Ok,
        }
    }

    /// Encoded body length
    pub fn body_len(&self) -> usize {
        match self {
            Self::Ok | Self::NotFound => 0,
            Self::Error(message) => message.len(),
            Self::List(rows) => {
                4 + rows
                    .iter()
                    .map(|row| LIST_ROW_HEADER_LEN + preview_bytes(&row.preview).len())
                    .sum::<usize>()
            }
            Self::Entry(entry) => ENTRY_HEADER_LEN + entry.payload.len(),
            Self::Cleared(_) => 4,
        }
    }

    /// Append the body to `dst`
    pub fn encode_body(&self, dst: &mut BytesMut) {
        match self {
            Self::Ok | Self::NotFound => {}
            Self::Error(message) => dst.put_slice(message.as_bytes()),
            Self::List(rows) => {
                dst.put_u32_le(rows.len() as u32);
                for row in rows {
                    let preview = preview_bytes(&row.preview);
                    dst.put_u64_le(row.id);
                    dst.put_u8(row.content_type.as_u8());
                    dst.put_u64_le(row.size);
                    dst.put_u64_le(row.captured_at);
                    dst.put_u16_le(preview.len() as u16);
                    dst.put_slice(preview);
                }
            }
            Self::Entry(entry) => {
                dst.put_u64_le(entry.id);
                dst.put_u8(entry.content_type.as_u8());
                dst.put_u64_le(entry.captured_at);
                dst.put_slice(&entry.payload);
            }
            Self::Cleared(removed) => dst.put_u32_le(*removed),
        }
    }
}

/// Preview bytes, cut on a char boundary to fit the u16 length field
fn preview_bytes(preview: &str) -> &[u8] {
    let max = u16::MAX as usize;
    if preview.len() <= max {
        return preview.as_bytes();
    }
    let mut end = max;
    while !preview.is_char_boundary(end) {
        end -= 1;
    }
    &preview.as_bytes()[..end]
}

/// Response as received by a client, body not yet interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    /// Status byte
    pub status: Status,
    /// Raw body
    pub body: Bytes,
}

impl ResponseFrame {
    /// Interpret as a `LIST` body
    pub fn into_list(self) -> Result<Vec<EntrySummary>, ProtocolError> {
        let mut body = self.body;
        let count = take_u32(&mut body)? as usize;
        // Cap the up-front allocation by what the body can actually hold
        let mut rows = Vec::with_capacity(count.min(body.len() / LIST_ROW_HEADER_LEN));

        for _ in 0..count {
            if body.remaining() < LIST_ROW_HEADER_LEN {
                return Err(ProtocolError::Malformed("truncated manifest row".to_string()));
            }
            let id = body.get_u64_le();
            let content_type = content_type(body.get_u8())?;
            let size = body.get_u64_le();
            let captured_at = body.get_u64_le();
            let preview_len = body.get_u16_le() as usize;
            if body.remaining() < preview_len {
                return Err(ProtocolError::Malformed("truncated preview".to_string()));
            }
            let preview = String::from_utf8(body.split_to(preview_len).to_vec())
                .map_err(|_| ProtocolError::Malformed("preview is not UTF-8".to_string()))?;

            rows.push(EntrySummary {
                id,
                content_type,
                size,
                captured_at,
                preview,
            });
        }

        if body.has_remaining() {
            return Err(ProtocolError::Malformed(format!(
                "{} trailing bytes after manifest",
                body.remaining()
            )));
        }

        Ok(rows)
    }

    /// Interpret as a `GET` body
    pub fn into_entry(self) -> Result<Entry, ProtocolError> {
        let mut body = self.body;
        if body.remaining() < ENTRY_HEADER_LEN {
            return Err(ProtocolError::Malformed("truncated entry header".to_string()));
        }
        let id = body.get_u64_le();
        let content_type = content_type(body.get_u8())?;
        let captured_at = body.get_u64_le();

        Ok(Entry {
            id,
            content_type,
            payload: body,
            captured_at,
        })
    }

    /// Interpret as a `CLEAR` body
    pub fn into_cleared(self) -> Result<u32, ProtocolError> {
        let mut body = self.body;
        take_u32(&mut body)
    }

    /// Interpret as an ERROR message
    pub fn error_message(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn take_u32(body: &mut Bytes) -> Result<u32, ProtocolError> {
    if body.remaining() < 4 {
        return Err(ProtocolError::Malformed("missing u32 field".to_string()));
    }
    Ok(body.get_u32_le())
}

fn content_type(tag: u8) -> Result<ContentType, ProtocolError> {
    ContentType::from_u8(tag)
        .ok_or_else(|| ProtocolError::Malformed(format!("unknown content type tag {}", tag)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(response: &Response) -> ResponseFrame {
        let mut body = BytesMut::new();
        response.encode_body(&mut body);
        assert_eq!(body.len(), response.body_len());
        ResponseFrame {
            status: response.status(),
            body: body.freeze(),
        }
    }

    #[test]
    fn test_request_wire_form() {
        let mut buf = BytesMut::new();
        Request::Select(0x0102).encode(&mut buf);
        assert_eq!(&buf[..], &[0x02, 0x02, 0x01, 0, 0, 0, 0, 0, 0]);

        let mut buf = BytesMut::new();
        Request::List.encode(&mut buf);
        assert_eq!(&buf[..], &[0x01]);

        assert_eq!(Request::parse(0x05, &7u64.to_le_bytes()).unwrap(), Request::Delete(7));
        assert!(matches!(
            Request::parse(0x09, &[]),
            Err(ProtocolError::UnknownOpcode(0x09))
        ));
        assert_eq!(Request::operand_len(0x04), Some(8));
        assert_eq!(Request::operand_len(0xff), None);
    }

    #[test]
    fn test_list_body_layout() {
        let rows = vec![EntrySummary {
            id: 3,
            content_type: ContentType::Text,
            size: 5,
            captured_at: 9,
            preview: "hello".to_string(),
        }];
        let frame = frame(&Response::List(rows.clone()));

        assert_eq!(frame.status, Status::Ok);
        assert_eq!(&frame.body[..4], &1u32.to_le_bytes());
        assert_eq!(frame.body[12], 0);
        assert_eq!(frame.into_list().unwrap(), rows);
    }

    #[test]
    fn test_entry_body_layout() {
        let entry = Entry {
            id: 11,
            content_type: ContentType::Jpeg,
            payload: Bytes::from_static(&[0xff, 0xd8, 0xff]),
            captured_at: 1_700_000_000_000,
        };
        let frame = frame(&Response::Entry(entry.clone()));
        assert_eq!(frame.body.len(), ENTRY_HEADER_LEN + 3);
        assert_eq!(frame.into_entry().unwrap(), entry);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(Response::NotFound.status(), Status::NotFound);
        assert_eq!(Response::Error("x".into()).status(), Status::Error);
        assert_eq!(Response::Cleared(2).status(), Status::Ok);
        assert_eq!(frame(&Response::Cleared(2)).into_cleared().unwrap(), 2);
        assert_eq!(Status::from_u8(3), None);
    }

    #[test]
    fn test_malformed_bodies() {
        let short = ResponseFrame {
            status: Status::Ok,
            body: Bytes::from_static(&[1, 0, 0, 0, 9]),
        };
        assert!(matches!(short.into_list(), Err(ProtocolError::Malformed(_))));

        let bad_tag = ResponseFrame {
            status: Status::Ok,
            body: Bytes::from(vec![0u8, 0, 0, 0, 0, 0, 0, 0, 7, 0, 0, 0, 0, 0, 0, 0, 0]),
        };
        assert!(matches!(bad_tag.into_entry(), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_long_preview_is_cut_on_char_boundary() {
        let preview = "é".repeat(40_000);
        let bytes = preview_bytes(&preview);
        assert!(bytes.len() <= u16::MAX as usize);
        assert!(std::str::from_utf8(bytes).is_ok());
    }
}

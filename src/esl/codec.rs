//! Event-socket wire framing
//!
//! A frame is a block of `Key: Value` header lines terminated by a blank
//! line; a `Content-Length` header announces exactly that many body bytes.
//! Event frames carry their fields in the body as another flat `key: value`
//! block with percent-encoded values.
//!
//! Framing errors are connection-fatal: the caller closes the socket and
//! reconnects, it never resynchronizes mid-stream.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::BillingError;

/// A decoded wire frame
///
/// Headers keep arrival order; lookups are case-sensitive like the switch's
/// own header names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EslFrame {
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<(String, String)>>,
}

impl EslFrame {
    /// First header with the given name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First body field with the given name
    pub fn body_field(&self, name: &str) -> Option<&str> {
        self.body
            .as_ref()?
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// Serialize back to wire format
    ///
    /// Body values are percent-encoded the way the switch emits them;
    /// `Content-Length` is computed from the encoded body, replacing any
    /// stale value in `headers`.
    pub fn to_bytes(&self) -> BytesMut {
        let body_block = self.body.as_ref().map(|fields| {
            let mut block = String::new();
            for (key, value) in fields {
                block.push_str(key);
                block.push_str(": ");
                block.push_str(&urlencoding::encode(value));
                block.push('\n');
            }
            block
        });

        let mut buf = BytesMut::new();
        for (key, value) in &self.headers {
            if key == "Content-Length" {
                continue;
            }
            buf.put_slice(key.as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_u8(b'\n');
        }
        if let Some(block) = &body_block {
            buf.put_slice(format!("Content-Length: {}\n", block.len()).as_bytes());
        }
        buf.put_u8(b'\n');
        if let Some(block) = &body_block {
            buf.put_slice(block.as_bytes());
        }
        buf
    }
}

/// Outbound commands sent to the switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Reply to the authentication challenge with the shared secret
    Auth(String),
    /// Subscribe to the named event kinds
    Events(Vec<String>),
    /// Raw api command line (e.g. `uuid_kill <uuid> CALL_REJECTED`)
    Api(String),
}

impl Command {
    fn as_line(&self) -> String {
        match self {
            Command::Auth(password) => format!("auth {}", password),
            Command::Events(kinds) => format!("event plain {}", kinds.join(" ")),
            Command::Api(line) => format!("api {}", line),
        }
    }
}

/// Codec for the event-socket stream
#[derive(Debug, Default)]
pub struct EslCodec;

/// Locate the blank line terminating the header block.
///
/// Returns (end of header bytes, start of body bytes). Tolerates `\r\n`
/// line endings.
fn find_header_end(src: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i < src.len() {
        if src[i] == b'\n' {
            if i + 1 < src.len() && src[i + 1] == b'\n' {
                return Some((i, i + 2));
            }
            if i + 2 < src.len() && src[i + 1] == b'\r' && src[i + 2] == b'\n' {
                return Some((i, i + 3));
            }
        }
        i += 1;
    }
    None
}

/// Parse a flat `key: value` block, first colon splits, both sides trimmed
fn parse_kv_block(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            line.split_once(':')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        })
        .collect()
}

/// Percent-decode body values that contain an escape; leave anything the
/// decoder rejects untouched.
fn decode_body_values(fields: Vec<(String, String)>) -> Vec<(String, String)> {
    fields
        .into_iter()
        .map(|(k, v)| {
            if v.contains('%') {
                let decoded = urlencoding::decode(&v)
                    .map(|c| c.into_owned())
                    .unwrap_or(v);
                (k, decoded)
            } else {
                (k, v)
            }
        })
        .collect()
}

impl Decoder for EslCodec {
    type Item = EslFrame;
    type Error = BillingError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<EslFrame>, Self::Error> {
        let Some((header_len, body_start)) = find_header_end(src) else {
            // header block not terminated yet, wait for more bytes
            return Ok(None);
        };

        let header_text = String::from_utf8_lossy(&src[..header_len]).into_owned();
        let headers = parse_kv_block(&header_text);

        let content_length = match headers
            .iter()
            .find(|(k, _)| k == "Content-Length")
            .map(|(_, v)| v.as_str())
        {
            Some(v) => Some(v.parse::<usize>().map_err(|_| {
                BillingError::Protocol(format!("invalid Content-Length: {:?}", v))
            })?),
            None => None,
        };

        let body = match content_length {
            Some(len) => {
                if src.len() < body_start + len {
                    // body shorter than declared so far, wait for more bytes
                    return Ok(None);
                }
                let body_text =
                    String::from_utf8_lossy(&src[body_start..body_start + len]).into_owned();
                src.advance(body_start + len);
                Some(decode_body_values(parse_kv_block(&body_text)))
            }
            None => {
                src.advance(body_start);
                None
            }
        };

        Ok(Some(EslFrame { headers, body }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<EslFrame>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(BillingError::Protocol(
                "stream closed inside a frame".to_string(),
            )),
        }
    }
}

impl Encoder<Command> for EslCodec {
    type Error = BillingError;

    fn encode(&mut self, cmd: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.put_slice(cmd.as_line().as_bytes());
        dst.put_slice(b"\n\n");
        Ok(())
    }
}

// ── JSON-RPC framing ──
//
// OVSDB has no length prefix or delimiter: messages are concatenated JSON
// texts on the stream. The decoder tracks bracket depth and string state
// across reads so each byte is scanned once, then hands the complete text
// to serde_json.

use bytes::{Buf, BufMut, BytesMut};
use serde_json::Value;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::Error;

/// Largest single message accepted before the stream is declared corrupt.
const DEFAULT_MAX_FRAME: usize = 64 * 1024 * 1024;

/// Where the scanner stopped inside a partially received message.
#[derive(Debug, Clone, Copy, Default)]
struct ScanState {
    /// Bytes of the current message already examined.
    offset: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl ScanState {
    /// Advance over `bytes[self.offset..]`; the length of the message once
    /// its closing bracket is seen.
    fn scan(&mut self, bytes: &[u8]) -> Option<usize> {
        while self.offset < bytes.len() {
            let b = bytes[self.offset];
            self.offset += 1;
            if self.in_string {
                match b {
                    _ if self.escaped => self.escaped = false,
                    b'\\' => self.escaped = true,
                    b'"' => self.in_string = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        return Some(self.offset);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

#[derive(Debug, Clone)]
pub struct JsonRpcCodec {
    max_frame: usize,
    scan: ScanState,
}

impl Default for JsonRpcCodec {
    fn default() -> Self {
        Self::with_max_frame(DEFAULT_MAX_FRAME)
    }
}

impl JsonRpcCodec {
    pub fn with_max_frame(max_frame: usize) -> Self {
        Self {
            max_frame,
            scan: ScanState::default(),
        }
    }
}

impl Decoder for JsonRpcCodec {
    type Item = Value;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Value>, Error> {
        if self.scan.offset == 0 {
            let leading = src
                .iter()
                .take_while(|b| b.is_ascii_whitespace())
                .count();
            src.advance(leading);
            match src.first() {
                None => return Ok(None),
                Some(b'{' | b'[') => {}
                // Not an object or array: no JSON-RPC message starts this way.
                Some(_) => {
                    return Err(match serde_json::from_slice::<Value>(&src[..]) {
                        Err(e) => Error::Json(e),
                        Ok(_) => Error::Protocol("expected a JSON object or array".into()),
                    });
                }
            }
        }

        let Some(len) = self.scan.scan(&src[..]) else {
            if src.len() > self.max_frame {
                return Err(Error::Protocol(format!(
                    "message exceeds {} bytes",
                    self.max_frame
                )));
            }
            return Ok(None);
        };

        self.scan = ScanState::default();
        let frame = src.split_to(len);
        Ok(Some(serde_json::from_slice(&frame)?))
    }
}

impl Encoder<Value> for JsonRpcCodec {
    type Error = Error;

    fn encode(&mut self, item: Value, dst: &mut BytesMut) -> Result<(), Error> {
        let bytes = serde_json::to_vec(&item)?;
        dst.reserve(bytes.len());
        dst.put_slice(&bytes);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_back_to_back_messages() {
        let mut codec = JsonRpcCodec::default();
        let mut buf = BytesMut::from(&br#"{"id":1,"result":[]} {"id":2,"result":["x"]}"#[..]);

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first, json!({"id": 1, "result": []}));
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(second, json!({"id": 2, "result": ["x"]}));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn waits_for_partial_message() {
        let mut codec = JsonRpcCodec::default();
        let mut buf = BytesMut::from(&br#"{"id":1,"res"#[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(br#"ult":null,"error":null}"#);
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg["id"], json!(1));
        assert!(buf.is_empty());
    }

    #[test]
    fn rejects_garbage() {
        let mut codec = JsonRpcCodec::default();
        let mut buf = BytesMut::from(&b"}{"[..]);
        assert!(matches!(codec.decode(&mut buf), Err(Error::Json(_))));
    }

    #[test]
    fn brackets_inside_strings_do_not_end_a_message() {
        let mut codec = JsonRpcCodec::default();
        let mut buf = BytesMut::from(&br#"{"id":1,"result":"}]\"{"}"#[..]);
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg["result"], json!("}]\"{"));
    }

    #[test]
    fn large_message_fed_in_small_chunks() {
        let rows: Vec<Value> = (0..2000)
            .map(|i| json!({"name": format!("vlab-ls{i}"), "other_config": {"subnet": "10.0.0.0/24"}}))
            .collect();
        let text = json!({"id": 7, "result": [{"rows": rows}], "error": null}).to_string();

        let mut codec = JsonRpcCodec::default();
        let mut buf = BytesMut::new();
        let mut decoded = None;
        for chunk in text.as_bytes().chunks(64) {
            assert!(decoded.is_none(), "decoded before the last chunk");
            buf.extend_from_slice(chunk);
            decoded = codec.decode(&mut buf).unwrap();
            // Only the unscanned tail is examined on the next read.
            if decoded.is_none() {
                assert_eq!(codec.scan.offset, buf.len());
            }
        }
        let msg = decoded.unwrap();
        assert_eq!(msg["id"], json!(7));
        assert_eq!(msg["result"][0]["rows"].as_array().unwrap().len(), 2000);
        assert!(buf.is_empty());
    }

    #[test]
    fn oversized_partial_frame_is_an_error() {
        let mut codec = JsonRpcCodec::with_max_frame(8);
        let mut buf = BytesMut::from(&br#"{"id":1,"result":"#[..]);
        assert!(matches!(codec.decode(&mut buf), Err(Error::Protocol(_))));
    }

    #[test]
    fn encodes_compact_json() {
        let mut codec = JsonRpcCodec::default();
        let mut buf = BytesMut::new();
        codec
            .encode(json!({"method": "echo", "params": [], "id": 0}), &mut buf)
            .unwrap();
        let round: Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(round["method"], json!("echo"));
    }
}

//! Line decoding and frame encoding.
//!
//! ```text
//! request     = METHOD [ ":" PARAMS ] CRLF
//! response    = LEN ":" JSON CRLF
//! stream      = "STREAM:" LEN ":" JSON CRLF
//! stream-end  = "STREAM_END:" LEN ":" JSON CRLF
//! ```
//!
//! `LEN` is the byte length of `JSON`.  Readers may delimit frames either by
//! the length prefix or by the line terminator.

use serde_json::Value;

use crate::error::RpcError;
use crate::response::Response;

/// Terminator appended to every outgoing frame.
pub const LINE_TERMINATOR: &str = "\r\n";

const STREAM_PREFIX: &str = "STREAM:";
const STREAM_END_PREFIX: &str = "STREAM_END:";

/// One decoded request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Everything after the first `:`, or empty.
    pub params: String,
}

/// Decode one request line.
///
/// Surrounding whitespace is trimmed, then the first `:` splits method from
/// params.  A line without a `:` (or starting with one) is all method.
/// Returns `None` for blank lines, which get no response.
pub fn decode_line(line: &str) -> Option<Request> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (method, params) = match line.find(':') {
        Some(idx) if idx > 0 => (&line[..idx], &line[idx + 1..]),
        _ => (line, ""),
    };
    Some(Request {
        method: method.to_string(),
        params: params.to_string(),
    })
}

/// Kind of an outgoing frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Answer to a request.
    Response,
    /// In-progress stream frame.
    Stream,
    /// Final frame of a stream session.
    StreamEnd,
}

impl FrameKind {
    fn prefix(self) -> &'static str {
        match self {
            FrameKind::Response => "",
            FrameKind::Stream => STREAM_PREFIX,
            FrameKind::StreamEnd => STREAM_END_PREFIX,
        }
    }
}

/// Encode `body` as a terminated frame of the given kind.
pub fn encode_frame(kind: FrameKind, body: &str) -> String {
    format!("{}{}:{}{}", kind.prefix(), body.len(), body, LINE_TERMINATOR)
}

/// Encode a request response.
pub fn encode_response(response: &Response) -> String {
    encode_frame(FrameKind::Response, &response.to_json())
}

/// Encode a stream frame carrying `document`.
pub fn encode_stream(document: &Response, last: bool) -> String {
    let kind = if last {
        FrameKind::StreamEnd
    } else {
        FrameKind::Stream
    };
    encode_frame(kind, &document.to_json())
}

/// A frame as seen by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub body: String,
}

impl Frame {
    /// Parse the JSON body.
    pub fn json(&self) -> Result<Value, RpcError> {
        serde_json::from_str(&self.body)
            .map_err(|e| RpcError::protocol(format!("frame body is not JSON: {e}")))
    }
}

/// Decode one received frame line, checking the length prefix.
///
/// # Errors
///
/// Returns [`RpcError::Protocol`] when the prefix is missing, not a number,
/// or disagrees with the body length.
pub fn decode_frame(line: &str) -> Result<Frame, RpcError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (kind, rest) = if let Some(rest) = line.strip_prefix(STREAM_END_PREFIX) {
        (FrameKind::StreamEnd, rest)
    } else if let Some(rest) = line.strip_prefix(STREAM_PREFIX) {
        (FrameKind::Stream, rest)
    } else {
        (FrameKind::Response, line)
    };

    let (len, body) = rest
        .split_once(':')
        .ok_or_else(|| RpcError::protocol("missing length prefix"))?;
    let len: usize = len
        .parse()
        .map_err(|_| RpcError::protocol(format!("invalid length prefix '{len}'")))?;
    if len != body.len() {
        return Err(RpcError::protocol(format!(
            "length prefix {len} does not match body length {}",
            body.len()
        )));
    }
    Ok(Frame {
        kind,
        body: body.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_without_params() {
        let req = decode_line("GetAllImuData\r\n").unwrap();
        assert_eq!(req.method, "GetAllImuData");
        assert_eq!(req.params, "");
    }

    #[test]
    fn first_colon_splits_params() {
        let req = decode_line(r#"SendJoystickData:{"left_x":1,"note":"a:b"}"#).unwrap();
        assert_eq!(req.method, "SendJoystickData");
        assert_eq!(req.params, r#"{"left_x":1,"note":"a:b"}"#);
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let req = decode_line("  GetSpecificImuData:accx \n").unwrap();
        assert_eq!(req.method, "GetSpecificImuData");
        assert_eq!(req.params, "accx");
    }

    #[test]
    fn blank_line_is_skipped() {
        assert!(decode_line("").is_none());
        assert!(decode_line(" \r\n").is_none());
    }

    #[test]
    fn leading_colon_keeps_whole_line_as_method() {
        let req = decode_line(":acc").unwrap();
        assert_eq!(req.method, ":acc");
        assert_eq!(req.params, "");
    }

    #[test]
    fn trailing_colon_gives_empty_params() {
        let req = decode_line("SendJoystickData:").unwrap();
        assert_eq!(req.method, "SendJoystickData");
        assert_eq!(req.params, "");
    }

    #[test]
    fn response_frame_has_byte_length_prefix() {
        let frame = encode_frame(FrameKind::Response, r#"{"t":"°C"}"#);
        // "°" is two bytes in UTF-8.
        assert_eq!(frame, "11:{\"t\":\"°C\"}\r\n");
    }

    #[test]
    fn stream_frames_carry_marker() {
        let doc = Response::ok();
        assert_eq!(encode_stream(&doc, false), "STREAM:16:{\"success\":true}\r\n");
        assert_eq!(encode_stream(&doc, true), "STREAM_END:16:{\"success\":true}\r\n");
        assert_eq!(encode_response(&doc), "16:{\"success\":true}\r\n");
    }

    #[test]
    fn decode_frame_recognises_each_kind() {
        let doc = Response::ok().message("x");
        for (line, kind) in [
            (encode_response(&doc), FrameKind::Response),
            (encode_stream(&doc, false), FrameKind::Stream),
            (encode_stream(&doc, true), FrameKind::StreamEnd),
        ] {
            let frame = decode_frame(&line).unwrap();
            assert_eq!(frame.kind, kind);
            assert_eq!(frame.json().unwrap()["message"], "x");
        }
    }

    #[test]
    fn decode_frame_rejects_length_mismatch() {
        let err = decode_frame("5:{\"success\":true}").unwrap_err();
        assert!(matches!(err, RpcError::Protocol { .. }));
    }

    #[test]
    fn decode_frame_rejects_missing_prefix() {
        assert!(decode_frame("{\"success\":true}").is_err());
        assert!(decode_frame("STREAM:abc:{}").is_err());
    }
}

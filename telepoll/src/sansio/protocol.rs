//! Pure protocol framing and parsing functions.
//!
//! Everything here operates on byte buffers and never performs I/O.

use serde_json::Value;

use super::types::{ParseResult, Transmit};
use crate::Result;

/// Blank line terminating the HTTP headers.
pub const HEADER_SEPARATOR: &[u8] = b"\r\n\r\n";

pub const BOUNDARY: &str = "----WebKitFormBoundary7MA4YWxkTrZu0gW";

/// Closing delimiter of a multipart body.
pub const END_BOUNDARY: &str = "\r\n------WebKitFormBoundary7MA4YWxkTrZu0gW--\r\n";

/// File name announced for every binary upload.
pub const UPLOAD_FILENAME: &str = "image.jpg";

/// Serialize a JSON command into a complete HTTP request.
///
/// HTTP/1.0 is used on purpose: the server then never answers with chunked
/// transfer encoding, so the body can be read as-is.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use telepoll::sansio::protocol::serialize_request;
///
/// let t = serialize_request("api.telegram.org", "123:abc", "getMe", &json!({})).unwrap();
/// let s = String::from_utf8(t.payload).unwrap();
/// assert!(s.starts_with("POST /bot123:abc/getMe HTTP/1.0\r\n"));
/// assert!(s.ends_with("Content-Length: 2\r\n\r\n{}"));
/// ```
pub fn serialize_request(host: &str, token: &str, command: &str, body: &Value) -> Result<Transmit> {
    let body = serde_json::to_vec(body)?;

    let mut payload = format!(
        "POST /bot{token}/{command} HTTP/1.0\r\n\
         Host: {host}\r\n\
         Connection: keep-alive\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    payload.extend_from_slice(&body);

    Ok(Transmit::new(payload))
}

/// Scan `buf` for the end of the HTTP headers.
pub fn parse_message(buf: &[u8]) -> ParseResult {
    match buf
        .windows(HEADER_SEPARATOR.len())
        .position(|w| w == HEADER_SEPARATOR)
    {
        Some(pos) => ParseResult::Complete {
            body_offset: pos + HEADER_SEPARATOR.len(),
        },
        None => ParseResult::Incomplete,
    }
}

/// Value of the `Content-Length` header, if the headers in `head` carry one.
pub fn content_length(head: &[u8]) -> Option<usize> {
    String::from_utf8_lossy(head).split("\r\n").find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

/// The body part of a drained response.
///
/// Without a header separator the whole buffer counts as headers and the body
/// is empty.
pub fn body(buf: &[u8]) -> &[u8] {
    match parse_message(buf) {
        ParseResult::Complete { body_offset } => &buf[body_offset..],
        ParseResult::Incomplete => &[],
    }
}

/// Decode the first JSON value of a reply body.
///
/// Trailing bytes after that value are ignored, so a second response that
/// arrived in the same read does not spoil the first one.
pub fn parse_reply(body: &[u8]) -> Result<Value> {
    let mut values = serde_json::Deserializer::from_slice(body).into_iter::<Value>();
    match values.next() {
        Some(value) => Ok(value?),
        None => Err(<serde_json::Error as serde::de::Error>::custom("empty reply body").into()),
    }
}

/// Form-data framing of a binary upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Multipart {
    preamble: String,
}

impl Multipart {
    /// Build the form preamble: the `chat_id` field followed by the header of
    /// the binary field `field` with the given content type.
    pub fn new(chat_id: i64, field: &str, content_type: &str) -> Self {
        let preamble = format!(
            "--{BOUNDARY}\r\n\
             Content-disposition: form-data; name=\"chat_id\"\r\n\r\n\
             {chat_id}\r\n\
             --{BOUNDARY}\r\n\
             Content-disposition: form-data; name=\"{field}\"; filename=\"{UPLOAD_FILENAME}\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        );
        Multipart { preamble }
    }

    pub fn preamble(&self) -> &[u8] {
        self.preamble.as_bytes()
    }

    /// Total body length for a binary part of `size` bytes.
    pub fn content_length(&self, size: u64) -> u64 {
        size.saturating_add(self.preamble.len() as u64 + END_BOUNDARY.len() as u64)
    }

    /// Request line and headers, up to and including the blank line.
    pub fn serialize_head(&self, host: &str, token: &str, command: &str, size: u64) -> Transmit {
        Transmit::new(
            format!(
                "POST /bot{token}/{command} HTTP/1.1\r\n\
                 Host: {host}\r\n\
                 Content-Length: {}\r\n\
                 Content-Type: multipart/form-data; boundary={BOUNDARY}\r\n\r\n",
                self.content_length(size)
            )
            .into_bytes(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_request() {
        let t = serialize_request(
            "api.telegram.org",
            "1:tok",
            "sendMessage",
            &json!({"chat_id": 7, "text": "hi"}),
        )
        .unwrap();
        let s = String::from_utf8(t.payload).unwrap();
        let (head, body) = s.split_once("\r\n\r\n").unwrap();

        let mut lines = head.split("\r\n");
        assert_eq!(lines.next(), Some("POST /bot1:tok/sendMessage HTTP/1.0"));
        assert_eq!(lines.next(), Some("Host: api.telegram.org"));
        assert_eq!(lines.next(), Some("Connection: keep-alive"));
        assert_eq!(lines.next(), Some("Content-Type: application/json"));
        assert_eq!(
            lines.next(),
            Some(format!("Content-Length: {}", body.len()).as_str())
        );
        assert_eq!(lines.next(), None);

        let v: Value = serde_json::from_str(body).unwrap();
        assert_eq!(v, json!({"chat_id": 7, "text": "hi"}));
    }

    #[test]
    fn test_parse_complete_message() {
        let buf = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n{}";
        assert_eq!(
            parse_message(buf),
            ParseResult::Complete {
                body_offset: buf.len() - 2
            }
        );
        assert_eq!(body(buf), b"{}");
    }

    #[test]
    fn test_parse_incomplete_message() {
        let buf = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n";
        assert_eq!(parse_message(buf), ParseResult::Incomplete);
        assert!(body(buf).is_empty());
    }

    #[test]
    fn test_content_length() {
        assert_eq!(
            content_length(b"HTTP/1.1 200 OK\r\ncontent-length: 17\r\n\r\n"),
            Some(17)
        );
        assert_eq!(content_length(b"HTTP/1.1 200 OK\r\nServer: x\r\n\r\n"), None);
        assert_eq!(content_length(b"HTTP/1.1 200 OK\r\nContent-Length: x\r\n"), None);
    }

    #[test]
    fn test_parse_reply_ignores_trailing_response() {
        let buf = b"{\"ok\":true,\"result\":[]}HTTP/1.1 200 OK\r\n\r\n{\"ok\":true}";
        let v = parse_reply(buf).unwrap();
        assert_eq!(v, json!({"ok": true, "result": []}));
    }

    #[test]
    fn test_parse_reply_empty_and_garbage() {
        assert!(parse_reply(b"").is_err());
        assert!(parse_reply(b"   ").is_err());
        assert!(parse_reply(b"<html>bad gateway</html>").is_err());
        assert!(parse_reply(b"{\"ok\":tr").is_err());
    }

    #[test]
    fn test_multipart_framing() {
        let form = Multipart::new(42, "photo", "image/jpeg");
        let preamble = String::from_utf8(form.preamble().to_vec()).unwrap();
        assert!(preamble.starts_with(&format!("--{BOUNDARY}\r\n")));
        assert!(preamble.contains("name=\"chat_id\"\r\n\r\n42\r\n"));
        assert!(preamble.contains("name=\"photo\"; filename=\"image.jpg\""));
        assert!(preamble.ends_with("Content-Type: image/jpeg\r\n\r\n"));

        assert_eq!(END_BOUNDARY, format!("\r\n--{BOUNDARY}--\r\n"));
        assert_eq!(
            form.content_length(1000),
            1000 + preamble.len() as u64 + END_BOUNDARY.len() as u64
        );

        let head = String::from_utf8(
            form.serialize_head("api.telegram.org", "1:tok", "sendPhoto", 1000)
                .payload,
        )
        .unwrap();
        assert!(head.starts_with("POST /bot1:tok/sendPhoto HTTP/1.1\r\n"));
        assert!(head.contains(&format!("Content-Length: {}\r\n", form.content_length(1000))));
        assert!(head.ends_with(&format!(
            "Content-Type: multipart/form-data; boundary={BOUNDARY}\r\n\r\n"
        )));
    }
}

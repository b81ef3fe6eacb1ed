//! HTTP/1.0 request-line parsing. One request per connection; the body (if
//! any) is never read — none of this server's endpoints accept one.

use crate::error::RequestError;
use std::io::Read;

const MAX_HEAD_BYTES: usize = 0x1000;
const MAX_METHOD_LEN: usize = 7;
const MAX_URI_LEN: usize = 127;

pub struct ParsedRequest {
    pub method: String,
    pub path: String,
    pub query: String,
}

/// Reads from `reader` until `\r\n\r\n` is seen or the head grows past
/// [`MAX_HEAD_BYTES`], mirroring the fixed `buf[0x1000]` the original
/// daemon reads each request into.
pub fn read_request_head<R: Read>(reader: &mut R) -> Result<Vec<u8>, RequestError> {
    let mut buf = Vec::with_capacity(512);
    let mut byte = [0u8; 1];
    loop {
        if buf.len() >= MAX_HEAD_BYTES {
            return Err(RequestError::BadRequest);
        }
        match reader.read(&mut byte) {
            Ok(0) => return Err(RequestError::BadRequest),
            Ok(_) => {
                buf.push(byte[0]);
                if buf.len() >= 4 && &buf[buf.len() - 4..] == b"\r\n\r\n" {
                    return Ok(buf);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => return Err(RequestError::BadRequest),
        }
    }
}

/// Parses the request line (`METHOD URI HTTP/major.minor`) out of the head
/// bytes read by [`read_request_head`], then splits the URI into path and
/// query exactly as `uri?a=1&b=2` — query parsing of individual tokens is
/// each endpoint's own job.
pub fn parse_request_line(head: &[u8]) -> Result<ParsedRequest, RequestError> {
    let line_end = head
        .windows(2)
        .position(|w| w == b"\r\n")
        .ok_or(RequestError::BadRequest)?;
    let line = std::str::from_utf8(&head[..line_end]).map_err(|_| RequestError::BadRequest)?;

    let mut parts = line.split(' ').filter(|s| !s.is_empty());
    let method = parts.next().ok_or(RequestError::BadRequest)?;
    let uri = parts.next().ok_or(RequestError::BadRequest)?;
    let version = parts.next().ok_or(RequestError::BadRequest)?;

    if method.len() > MAX_METHOD_LEN || uri.len() > MAX_URI_LEN {
        return Err(RequestError::BadRequest);
    }
    if !version.starts_with("HTTP/") {
        return Err(RequestError::BadRequest);
    }
    let version_digits = &version["HTTP/".len()..];
    if !version_digits
        .split_once('.')
        .is_some_and(|(maj, min)| !maj.is_empty() && !min.is_empty() && maj.chars().all(|c| c.is_ascii_digit()) && min.chars().all(|c| c.is_ascii_digit()))
    {
        return Err(RequestError::BadRequest);
    }

    let (path, query) = match uri.split_once('?') {
        Some((p, q)) => (p, q),
        None => (uri, ""),
    };

    Ok(ParsedRequest {
        method: method.to_string(),
        path: path.to_string(),
        query: query.to_string(),
    })
}

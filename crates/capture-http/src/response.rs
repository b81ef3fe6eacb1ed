//! Response writing: status line, a single content-appropriate header, a
//! blank line, then body — per §6's header table. Stream endpoints never
//! send `Content-Length`; the response ends when the pump returns.

use crate::error::RequestError;
use std::io::{self, Write};

pub fn write_control<W: Write>(out: &mut W, content_type: &str, body: &[u8]) -> io::Result<()> {
    write!(out, "HTTP/1.0 200 OK\r\nContent-Type: {content_type}\r\n\r\n")?;
    out.write_all(body)
}

pub fn write_stream_header<W: Write>(out: &mut W) -> io::Result<()> {
    write!(out, "HTTP/1.0 200 OK\r\nContent-Disposition: attachment\r\n\r\n")
}

pub fn write_error<W: Write>(out: &mut W, err: RequestError) -> io::Result<()> {
    write!(out, "{}\r\n\r\n", err.status_line())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_response_has_status_header_blank_body() {
        let mut buf = Vec::new();
        write_control(&mut buf, "text/json", b"{}").unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "HTTP/1.0 200 OK\r\nContent-Type: text/json\r\n\r\n{}"
        );
    }

    #[test]
    fn stream_header_has_no_content_length() {
        let mut buf = Vec::new();
        write_stream_header(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(!text.contains("Content-Length"));
        assert!(text.contains("Content-Disposition: attachment"));
    }
}

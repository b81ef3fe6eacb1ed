//! Listener abstraction over a TCP port or a Unix-domain socket path,
//! matching §6: each accepted connection gets its own detached thread
//! running [`serve_connection`], same shape as the original accept loop
//! just generalised over the two socket families.

use crate::request::{self, ParsedRequest};
use crate::router;
use capture_core::CaptureController;
use std::io::{BufReader, Write};
use std::net::TcpListener;
use std::os::unix::net::UnixListener;
use std::sync::Arc;

pub enum Listener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

impl Listener {
    pub fn bind_tcp(port: u16) -> std::io::Result<Self> {
        TcpListener::bind(("0.0.0.0", port)).map(Listener::Tcp)
    }

    pub fn bind_unix(path: &str) -> std::io::Result<Self> {
        let _ = std::fs::remove_file(path);
        UnixListener::bind(path).map(Listener::Unix)
    }

    /// Accepts connections forever, spawning one detached worker thread per
    /// connection. Never returns under normal operation; a transient accept
    /// failure is logged and the loop continues, matching the original
    /// daemon's `accept` retry behaviour.
    pub fn serve_forever(self, controller: Arc<CaptureController>, version: Arc<str>) -> ! {
        loop {
            match &self {
                Listener::Tcp(listener) => match listener.accept() {
                    Ok((stream, _addr)) => {
                        let controller = Arc::clone(&controller);
                        let version = Arc::clone(&version);
                        std::thread::spawn(move || serve_connection(stream, &controller, &version));
                    }
                    Err(e) => log::warn!("accept failed: {e}"),
                },
                Listener::Unix(listener) => match listener.accept() {
                    Ok((stream, _addr)) => {
                        let controller = Arc::clone(&controller);
                        let version = Arc::clone(&version);
                        std::thread::spawn(move || serve_connection(stream, &controller, &version));
                    }
                    Err(e) => log::warn!("accept failed: {e}"),
                },
            }
        }
    }
}

/// Services exactly one request on `stream`, matching `http_thread`: read
/// the request head, parse it, route it, then drop the connection.
fn serve_connection<S>(stream: S, controller: &CaptureController, version: &str)
where
    S: std::io::Read + Write,
{
    let mut writer = stream;
    let mut reader = BufReader::new(&mut writer);
    let head = match request::read_request_head(&mut reader) {
        Ok(head) => head,
        Err(e) => {
            let _ = crate::response::write_error(&mut writer, e);
            return;
        }
    };
    drop(reader);

    let parsed: ParsedRequest = match request::parse_request_line(&head) {
        Ok(p) => p,
        Err(e) => {
            let _ = crate::response::write_error(&mut writer, e);
            return;
        }
    };

    router::serve(&parsed, controller, version, &mut writer);
}

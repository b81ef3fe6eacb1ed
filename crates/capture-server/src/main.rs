//! CLI entry point: `version`, a bare TCP port, or `unix:<path>`. Binds the
//! listener, wires a `CaptureController` with the production device
//! backends, ignores `SIGPIPE` process-wide (a client disconnecting mid
//! stream must surface as a socket write error, not a signal), and serves
//! forever.

use capture_core::{CaptureController, DefaultLinearDeviceFactory, DefaultRawDeviceOpener};
use capture_http::Listener;
use std::sync::Arc;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn usage(program: &str) -> ! {
    eprintln!("usage: {program} version");
    eprintln!("       {program} <port>");
    eprintln!("       {program} unix:<path>");
    std::process::exit(1);
}

fn ignore_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    ignore_sigpipe();

    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "capture-server".to_string());
    let Some(arg) = args.next() else {
        usage(&program);
    };

    if arg == "version" {
        println!("{VERSION}");
        return Ok(());
    }

    let listener = if let Some(path) = arg.strip_prefix("unix:") {
        if path.is_empty() || path.len() > 107 {
            usage(&program);
        }
        Listener::bind_unix(path)?
    } else {
        match arg.parse::<u16>() {
            Ok(port) if port > 0 => Listener::bind_tcp(port)?,
            _ => usage(&program),
        }
    };

    log::info!("capture-server {VERSION} listening");

    let controller = Arc::new(CaptureController::new(
        Box::new(DefaultRawDeviceOpener),
        Box::new(DefaultLinearDeviceFactory),
    ));

    listener.serve_forever(controller, Arc::from(VERSION));
}

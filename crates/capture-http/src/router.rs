//! HTTP endpoint router (C8): dispatches a parsed request to one of the
//! seven served paths, mirroring the original daemon's linear path table
//! plus the `GET`-only / 404 / 400 fallbacks from `http_serve`.

use crate::error::RequestError;
use crate::request::ParsedRequest;
use crate::{pump, response};
use capture_core::CaptureController;
use std::io::Write;

const MAX_RAW_SOURCE_INDEX: u32 = 256;

/// Serves one already-parsed request on `out`, writing a full HTTP
/// response (status line through body) before returning.
pub fn serve<W: Write>(req: &ParsedRequest, controller: &CaptureController, version: &str, out: &mut W) {
    if req.method != "GET" {
        let _ = response::write_error(out, RequestError::MethodNotAllowed);
        return;
    }

    let result = match req.path.as_str() {
        "/" => response::write_control(out, "text/html", b"Hello World"),
        "/version" => {
            let body = format!("{version}\n");
            response::write_control(out, "text/plain", body.as_bytes())
        }
        "/start" => {
            let body = controller.start(&req.query);
            response::write_control(out, "text/json", body.to_string().as_bytes())
        }
        "/stop" => {
            let body = controller.stop();
            response::write_control(out, "text/json", body.to_string().as_bytes())
        }
        "/stats" => {
            let body = controller.stats();
            response::write_control(out, "text/json", body.to_string().as_bytes())
        }
        "/cxadc" => {
            response::write_stream_header(out).and_then(|()| {
                if let Ok(index) = req.query.trim().parse::<u32>() {
                    if index < MAX_RAW_SOURCE_INDEX {
                        if let Some(source) = controller.session().raw_source(index) {
                            pump::run(controller.session(), &source, out);
                        }
                    }
                }
                Ok(())
            })
        }
        "/linear" => response::write_stream_header(out).and_then(|()| {
            if let Some(source) = controller.session().linear_source() {
                pump::run(controller.session(), &source, out);
            }
            Ok(())
        }),
        _ => response::write_error(out, RequestError::NotFound),
    };

    if let Err(e) = result {
        log::debug!("response write failed: {e}");
    }
}

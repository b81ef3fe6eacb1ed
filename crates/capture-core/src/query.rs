//! Parses the `/start` query-string tokens into typed start parameters.
//!
//! The router hands each `key` or `key=value` token to us verbatim after
//! splitting on `?` then `&`; we do the `sscanf`-style per-token parsing
//! the original daemon did inline in its request handler.

use crate::error::ConfigError;

pub const MAX_RAW_SOURCES: usize = 256;
const MIN_LINEAR_RATE: u32 = 22_050;
const MAX_LINEAR_RATE: u32 = 384_000;
const MIN_LINEAR_CHANNELS: u8 = 1;
const MAX_LINEAR_CHANNELS: u8 = 16;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartParams {
    pub raw_sources: Vec<u32>,
    pub lname: Option<String>,
    pub lformat: Option<String>,
    pub lrate: Option<u32>,
    pub lchannels: Option<u8>,
}

/// Parses a full query string (already split off the `?`) into
/// [`StartParams`].
pub fn parse_start_query(query: &str) -> Result<StartParams, ConfigError> {
    let mut params = StartParams::default();

    for token in query.split('&').filter(|t| !t.is_empty()) {
        match token.split_once('=') {
            None => parse_bare_token(token, &mut params)?,
            Some((key, value)) => parse_keyed_token(key, value, &mut params)?,
        }
    }

    Ok(params)
}

fn parse_bare_token(token: &str, params: &mut StartParams) -> Result<(), ConfigError> {
    let Some(digits) = token.strip_prefix("cxadc") else {
        log::debug!("ignoring unrecognized query token {token:?}");
        return Ok(());
    };
    let index: u32 = digits
        .parse()
        .map_err(|_| ConfigError::MalformedToken(token.to_string()))?;
    if index >= MAX_RAW_SOURCES as u32 {
        return Err(ConfigError::RawSourceOutOfRange(index));
    }
    if params.raw_sources.len() >= MAX_RAW_SOURCES {
        return Err(ConfigError::TooManyRawSources);
    }
    params.raw_sources.push(index);
    Ok(())
}

fn parse_keyed_token(key: &str, value: &str, params: &mut StartParams) -> Result<(), ConfigError> {
    match key {
        "lname" => params.lname = Some(percent_decode(value)?),
        "lformat" => params.lformat = Some(value.to_string()),
        "lrate" => {
            if let Ok(rate) = value.parse::<u32>() {
                if (MIN_LINEAR_RATE..=MAX_LINEAR_RATE).contains(&rate) {
                    params.lrate = Some(rate);
                } else {
                    log::debug!("ignoring out-of-range lrate={rate}");
                }
            }
        }
        "lchannels" => {
            if let Ok(channels) = value.parse::<u8>() {
                if (MIN_LINEAR_CHANNELS..=MAX_LINEAR_CHANNELS).contains(&channels) {
                    params.lchannels = Some(channels);
                } else {
                    log::debug!("ignoring out-of-range lchannels={channels}");
                }
            }
        }
        _ => log::debug!("ignoring unrecognized query key {key:?}"),
    }
    Ok(())
}

/// Decodes `%HH` escapes and `+` (as a literal space), the encoding a
/// browser-submitted device name arrives in.
pub fn percent_decode(s: &str) -> Result<String, ConfigError> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .ok_or_else(|| ConfigError::MalformedPercentEncoding(s.to_string()))?;
                let hex_str = std::str::from_utf8(hex)
                    .map_err(|_| ConfigError::MalformedPercentEncoding(s.to_string()))?;
                let byte = u8::from_str_radix(hex_str, 16)
                    .map_err(|_| ConfigError::MalformedPercentEncoding(s.to_string()))?;
                out.push(byte);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|_| ConfigError::MalformedPercentEncoding(s.to_string()))
}

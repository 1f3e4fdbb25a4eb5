//! Encoding of endpoint arguments for the `Dropbox-API-Arg` header.
//!
//! HTTP header values must be ASCII, so the API expects every character at
//! or above 0x7F to be written as a JSON `\uXXXX` escape (UTF-16 units,
//! surrogate pairs for astral characters).

use std::fmt::Write;

use serde::Serialize;

/// Serializes `arg` to JSON that is safe to place in an HTTP header.
pub fn to_header_json<T: Serialize>(arg: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(arg)?;
    Ok(escape_non_ascii(&json))
}

fn escape_non_ascii(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut units = [0u16; 2];
    for c in json.chars() {
        if (c as u32) < 0x7F {
            out.push(c);
            continue;
        }
        for unit in c.encode_utf16(&mut units) {
            let _ = write!(out, "\\u{unit:04x}");
        }
    }
    out
}

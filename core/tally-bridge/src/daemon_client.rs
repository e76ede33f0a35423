//! Client helper for sending requests to the tally daemon.
//!
//! The daemon is the only writer of accounting state; this module only
//! frames requests over the Unix socket and reads one response back.

use std::env;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;

use rand::RngCore;
use serde_json::Value;
use tally_core::StorageConfig;
use tally_daemon_protocol::{Method, Request, Response, MAX_REQUEST_BYTES, PROTOCOL_VERSION};

const SOCKET_ENV: &str = "TALLY_DAEMON_SOCKET";
const READ_TIMEOUT_MS: u64 = 600;
const WRITE_TIMEOUT_MS: u64 = 600;
const RETRY_DELAY_MS: u64 = 50;

pub fn send_request(method: Method, params: Option<Value>) -> Result<Response, String> {
    let request = Request {
        protocol_version: PROTOCOL_VERSION,
        method,
        id: Some(make_request_id()),
        params,
    };

    let payload = serde_json::to_vec(&request)
        .map_err(|err| format!("Failed to serialize request: {}", err))?;
    if payload.len() > MAX_REQUEST_BYTES {
        return Err("Request exceeds maximum size".to_string());
    }

    // One retry: the daemon may be mid-restart when the upstream fires.
    match send_once(&payload) {
        Ok(response) => Ok(response),
        Err(first_err) => {
            sleep(Duration::from_millis(RETRY_DELAY_MS));
            send_once(&payload).map_err(|retry_err| {
                format!("{} (retry failed: {})", first_err, retry_err)
            })
        }
    }
}

pub fn make_event_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("evt-{}-{}", std::process::id(), hex(&bytes))
}

fn make_request_id() -> String {
    let mut bytes = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("req-{}", hex(&bytes))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn socket_path() -> PathBuf {
    if let Ok(path) = env::var(SOCKET_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    StorageConfig::default().socket_file()
}

fn send_once(payload: &[u8]) -> Result<Response, String> {
    let path = socket_path();
    let mut stream = UnixStream::connect(&path)
        .map_err(|err| format!("Failed to connect to {}: {}", path.display(), err))?;
    let _ = stream.set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS)));
    let _ = stream.set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)));

    stream
        .write_all(payload)
        .and_then(|_| stream.write_all(b"\n"))
        .and_then(|_| stream.flush())
        .map_err(|err| format!("Failed to write request: {}", err))?;

    read_response(&mut stream)
}

fn read_response(stream: &mut UnixStream) -> Result<Response, String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err) => return Err(format!("Failed to read response: {}", err)),
        }
    }

    let newline_index = buffer.iter().position(|b| *b == b'\n');
    let response_bytes = match newline_index {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    serde_json::from_slice(response_bytes)
        .map_err(|err| format!("Response was not valid JSON: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ids_are_unique() {
        assert_ne!(make_event_id(), make_event_id());
    }

    #[test]
    fn event_ids_fit_protocol_limits() {
        let id = make_event_id();
        assert!(id.starts_with("evt-"));
        assert!(id.len() <= 128);
    }
}

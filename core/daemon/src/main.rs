//! Tally daemon entrypoint.
//!
//! This is a small, single-writer service that owns presence accounting.
//! A socket listener with strict request validation feeds one mutex-guarded
//! engine: transitions and syncs mutate it, report requests read it.

use fs_err as fs;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use chrono::Utc;
use tally_core::{DurationStore, Engine, GuildId, MemberId, StorageConfig, TallyError};
use tally_daemon_protocol::{
    parse_directory_sync, parse_event, parse_leaderboard, parse_member_report,
    parse_presence_sync, ErrorInfo, Method, Request, Response, MAX_REQUEST_BYTES,
    PROTOCOL_VERSION,
};

mod config;
mod directory;
mod state;

use state::SharedState;

const READ_TIMEOUT_SECS: u64 = 2;
const READ_CHUNK_SIZE: usize = 4096;

fn main() {
    init_logging();

    let storage = StorageConfig::default();

    let config = match config::load_config(None, &storage) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Failed to load daemon config");
            std::process::exit(1);
        }
    };
    if config.monitored_guilds.is_empty() {
        warn!(
            config = %storage.config_file().display(),
            "No monitored guilds configured; all presence events will be dropped"
        );
    }

    let socket_path = storage.socket_file();
    if let Err(err) = prepare_socket_dir(&socket_path) {
        error!(error = %err, "Failed to prepare daemon socket directory");
        std::process::exit(1);
    }

    if let Err(err) = remove_existing_socket(&socket_path) {
        error!(error = %err, path = %socket_path.display(), "Failed to remove existing socket");
        std::process::exit(1);
    }

    let listener = match UnixListener::bind(&socket_path) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, path = %socket_path.display(), "Failed to bind daemon socket");
            std::process::exit(1);
        }
    };

    let durations_path = config.durations_path(&storage);
    let engine = Engine::new(config.guild_ids(), DurationStore::new(&durations_path));
    let shared_state = Arc::new(SharedState::new(engine));

    info!(
        path = %socket_path.display(),
        durations = %durations_path.display(),
        monitored_guilds = config.monitored_guilds.len(),
        "Tally daemon started"
    );

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let state = Arc::clone(&shared_state);
                thread::spawn(|| handle_connection(stream, state));
            }
            Err(err) => {
                warn!(error = %err, "Failed to accept daemon connection");
            }
        }
    }
}

fn init_logging() {
    let debug_enabled = env::var("TALLY_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn prepare_socket_dir(socket_path: &Path) -> Result<(), String> {
    let parent = socket_path
        .parent()
        .ok_or_else(|| "Socket path has no parent".to_string())?;
    fs::create_dir_all(parent).map_err(|err| format!("Failed to create socket directory: {}", err))
}

fn remove_existing_socket(socket_path: &Path) -> Result<(), String> {
    if socket_path.exists() {
        fs::remove_file(socket_path)
            .map_err(|err| format!("Failed to remove existing socket: {}", err))?;
    }
    Ok(())
}

fn handle_connection(mut stream: UnixStream, state: Arc<SharedState>) {
    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(err) => {
            warn!(code = %err.code, message = %err.message, "Failed to read request");
            let response = Response::error_with_info(None, err);
            let _ = write_response(&mut stream, response);
            return;
        }
    };

    tracing::debug!(method = ?request.method, id = ?request.id, "Daemon request received");
    let response = handle_request(request, state);
    let _ = write_response(&mut stream, response);
}

fn read_request(stream: &mut UnixStream) -> Result<Request, ErrorInfo> {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(READ_TIMEOUT_SECS)));

    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err(ErrorInfo::new(
                        "request_too_large",
                        "request exceeded maximum size",
                    ));
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                return Err(ErrorInfo::new("read_timeout", "request timed out"));
            }
            Err(err) => {
                return Err(ErrorInfo::new(
                    "read_error",
                    format!("failed to read request: {}", err),
                ));
            }
        }
    }

    if buffer.is_empty() {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    let newline_index = buffer.iter().position(|b| *b == b'\n');
    let request_bytes = match newline_index {
        Some(index) => {
            if buffer.len() > index + 1 {
                let trailing = &buffer[index + 1..];
                if trailing.iter().any(|b| !b.is_ascii_whitespace()) {
                    warn!("Extra bytes detected after newline; ignoring trailing data");
                }
            }
            &buffer[..index]
        }
        None => buffer.as_slice(),
    };

    if request_bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    serde_json::from_slice(request_bytes).map_err(|err| {
        ErrorInfo::new(
            "invalid_json",
            format!("request was not valid JSON: {}", err),
        )
    })
}

fn handle_request(request: Request, state: Arc<SharedState>) -> Response {
    if request.protocol_version != PROTOCOL_VERSION {
        return Response::error(
            request.id,
            "protocol_mismatch",
            "unsupported protocol version",
        );
    }

    match request.method {
        Method::GetHealth => {
            let mut data = serde_json::json!({
                "status": "ok",
                "pid": std::process::id(),
                "version": env!("CARGO_PKG_VERSION"),
                "protocol_version": PROTOCOL_VERSION,
            });
            if let Ok(value) = serde_json::to_value(state.health()) {
                data["state"] = value;
            }
            Response::ok(request.id, data)
        }
        Method::Event => {
            let params = match request.params {
                Some(params) => params,
                None => {
                    return Response::error(request.id, "invalid_params", "event payload is required")
                }
            };
            let event = match parse_event(params) {
                Ok(event) => event,
                Err(err) => return Response::error_with_info(request.id, err),
            };

            info!(
                event_id = %event.event_id,
                guild_id = event.guild_id,
                member_id = event.member_id,
                before = ?event.before_channel_id,
                after = ?event.after_channel_id,
                "Received presence event"
            );
            state.handle_event(&event);
            Response::ok(request.id, serde_json::json!({"accepted": true}))
        }
        Method::SyncPresence => {
            let params = match request.params {
                Some(params) => params,
                None => {
                    return Response::error(request.id, "invalid_params", "sync payload is required")
                }
            };
            let payload = match parse_presence_sync(params) {
                Ok(payload) => payload,
                Err(err) => return Response::error_with_info(request.id, err),
            };

            let outcome = state.sync_presence(&payload, Utc::now());
            match serde_json::to_value(outcome) {
                Ok(value) => Response::ok(request.id, value),
                Err(err) => Response::error(
                    request.id,
                    "serialization_error",
                    format!("Failed to serialize sync outcome: {}", err),
                ),
            }
        }
        Method::SyncDirectory => {
            let params = match request.params {
                Some(params) => params,
                None => {
                    return Response::error(request.id, "invalid_params", "sync payload is required")
                }
            };
            let payload = match parse_directory_sync(params) {
                Ok(payload) => payload,
                Err(err) => return Response::error_with_info(request.id, err),
            };

            let counts = state.sync_directory(&payload);
            match serde_json::to_value(counts) {
                Ok(value) => Response::ok(request.id, value),
                Err(err) => Response::error(
                    request.id,
                    "serialization_error",
                    format!("Failed to serialize directory counts: {}", err),
                ),
            }
        }
        Method::GetMemberReport => {
            let params = match request.params {
                Some(params) => params,
                None => {
                    return Response::error(request.id, "invalid_params", "report params are required")
                }
            };
            let params = match parse_member_report(params) {
                Ok(params) => params,
                Err(err) => return Response::error_with_info(request.id, err),
            };

            match state.member_report(GuildId(params.guild_id), MemberId(params.member_id)) {
                Ok(summary) => match serde_json::to_value(summary) {
                    Ok(value) => Response::ok(request.id, value),
                    Err(err) => Response::error(
                        request.id,
                        "serialization_error",
                        format!("Failed to serialize member report: {}", err),
                    ),
                },
                Err(err) => report_error_response(request.id, err),
            }
        }
        Method::GetLeaderboard => {
            let params = match request.params {
                Some(params) => params,
                None => {
                    return Response::error(request.id, "invalid_params", "report params are required")
                }
            };
            let params = match parse_leaderboard(params) {
                Ok(params) => params,
                Err(err) => return Response::error_with_info(request.id, err),
            };

            match state.leaderboard(GuildId(params.guild_id)) {
                Ok(board) => match serde_json::to_value(board) {
                    Ok(value) => Response::ok(request.id, value),
                    Err(err) => Response::error(
                        request.id,
                        "serialization_error",
                        format!("Failed to serialize leaderboard: {}", err),
                    ),
                },
                Err(err) => report_error_response(request.id, err),
            }
        }
    }
}

fn report_error_response(id: Option<String>, err: TallyError) -> Response {
    match err {
        TallyError::GuildNotFound(guild) => {
            Response::error(id, "guild_not_found", format!("Guild not found: {}", guild))
        }
        other => Response::error(
            id,
            "report_error",
            format!("Failed to build report: {}", other),
        ),
    }
}

fn write_response(stream: &mut UnixStream, response: Response) -> std::io::Result<()> {
    serde_json::to_writer(&mut *stream, &response)?;
    stream.write_all(b"\n")?;
    stream.flush()?;
    Ok(())
}

//! IPC protocol types and validation for tally-daemon.
//!
//! This crate is shared by the daemon and its clients to prevent schema drift.
//! The daemon remains the authority on validation, but clients can reuse the
//! same types to construct valid requests.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024; // 1MB

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    Event,
    SyncPresence,
    SyncDirectory,
    GetMemberReport,
    GetLeaderboard,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }

    pub fn error_with_info(id: Option<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(error),
        }
    }
}

/// A presence transition delivered by the upstream event source.
///
/// `before_channel_id`/`after_channel_id` are both optional: equal values
/// (including both absent) mean no channel change and the daemon treats the
/// event as a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresenceEventEnvelope {
    pub event_id: String,
    pub recorded_at: String,
    pub guild_id: u64,
    pub member_id: u64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub before_channel_id: Option<u64>,
    #[serde(default)]
    pub after_channel_id: Option<u64>,
}

impl PresenceEventEnvelope {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.event_id.trim().is_empty() {
            return Err(ErrorInfo::new("invalid_event_id", "event_id is required"));
        }
        if self.event_id.len() > 128 {
            return Err(ErrorInfo::new(
                "invalid_event_id",
                "event_id must be 128 characters or fewer",
            ));
        }

        if DateTime::parse_from_rfc3339(&self.recorded_at).is_err() {
            return Err(ErrorInfo::new(
                "invalid_timestamp",
                "recorded_at must be RFC3339",
            ));
        }

        require_snowflake(self.guild_id, "guild_id")?;
        require_snowflake(self.member_id, "member_id")?;
        if let Some(channel_id) = self.before_channel_id {
            require_snowflake(channel_id, "before_channel_id")?;
        }
        if let Some(channel_id) = self.after_channel_id {
            require_snowflake(channel_id, "after_channel_id")?;
        }

        Ok(())
    }
}

/// Current presence, sent once by the bridge after the daemon starts so that
/// sessions already in progress are seeded rather than lost.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresenceSyncPayload {
    pub guilds: Vec<GuildPresencePayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuildPresencePayload {
    pub guild_id: u64,
    pub channels: Vec<ChannelPresencePayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelPresencePayload {
    pub channel_id: u64,
    pub members: Vec<PresentMemberPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresentMemberPayload {
    pub member_id: u64,
    #[serde(default)]
    pub is_bot: bool,
}

impl PresenceSyncPayload {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        for guild in &self.guilds {
            require_snowflake(guild.guild_id, "guild_id")?;
            for channel in &guild.channels {
                require_snowflake(channel.channel_id, "channel_id")?;
                for member in &channel.members {
                    require_snowflake(member.member_id, "member_id")?;
                }
            }
        }
        Ok(())
    }
}

/// Entity metadata pushed by the bridge: guild rosters plus display tokens
/// for channels and members. Consumed for report presentation and guild
/// membership only, never for accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectorySyncPayload {
    pub guilds: Vec<GuildDirectoryPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuildDirectoryPayload {
    pub guild_id: u64,
    #[serde(default)]
    pub name: Option<String>,
    pub channels: Vec<ChannelRecordPayload>,
    pub members: Vec<MemberRecordPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelRecordPayload {
    pub channel_id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemberRecordPayload {
    pub member_id: u64,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl DirectorySyncPayload {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        for guild in &self.guilds {
            require_snowflake(guild.guild_id, "guild_id")?;
            for channel in &guild.channels {
                require_snowflake(channel.channel_id, "channel_id")?;
                if channel.name.trim().is_empty() {
                    return Err(ErrorInfo::new("missing_field", "channel name is required"));
                }
            }
            for member in &guild.members {
                require_snowflake(member.member_id, "member_id")?;
                if member.display_name.trim().is_empty() {
                    return Err(ErrorInfo::new("missing_field", "display_name is required"));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemberReportParams {
    pub guild_id: u64,
    pub member_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeaderboardParams {
    pub guild_id: u64,
}

pub fn parse_event(params: Value) -> Result<PresenceEventEnvelope, ErrorInfo> {
    let envelope: PresenceEventEnvelope = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("event payload is invalid JSON: {}", err),
        )
    })?;
    envelope.validate()?;
    Ok(envelope)
}

pub fn parse_presence_sync(params: Value) -> Result<PresenceSyncPayload, ErrorInfo> {
    let payload: PresenceSyncPayload = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("presence sync payload is invalid JSON: {}", err),
        )
    })?;
    payload.validate()?;
    Ok(payload)
}

pub fn parse_directory_sync(params: Value) -> Result<DirectorySyncPayload, ErrorInfo> {
    let payload: DirectorySyncPayload = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("directory sync payload is invalid JSON: {}", err),
        )
    })?;
    payload.validate()?;
    Ok(payload)
}

pub fn parse_member_report(params: Value) -> Result<MemberReportParams, ErrorInfo> {
    let params: MemberReportParams = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("member report params are invalid: {}", err),
        )
    })?;
    require_snowflake(params.guild_id, "guild_id")?;
    require_snowflake(params.member_id, "member_id")?;
    Ok(params)
}

pub fn parse_leaderboard(params: Value) -> Result<LeaderboardParams, ErrorInfo> {
    let params: LeaderboardParams = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("leaderboard params are invalid: {}", err),
        )
    })?;
    require_snowflake(params.guild_id, "guild_id")?;
    Ok(params)
}

fn require_snowflake(value: u64, field: &str) -> Result<(), ErrorInfo> {
    if value == 0 {
        return Err(ErrorInfo::new(
            "invalid_id",
            format!("{} must be a non-zero snowflake", field),
        ));
    }
    Ok(())
}

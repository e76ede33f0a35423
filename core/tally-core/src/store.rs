//! File-backed accumulation of presence durations.
//!
//! The store maps `(member, channel)` to cumulative elapsed seconds and is
//! the only durable state in the system. Values are created lazily on first
//! accounting, updated by addition, never overwritten or decreased, and
//! never deleted automatically.
//!
//! # File Format
//!
//! ```json
//! {
//!   "926441829157716019": {
//!     "1096322887725334600": 3661.25
//!   }
//! }
//! ```
//!
//! Keys are the decimal string form of the snowflake ids (JSON object keys
//! must be strings). The file may be hand-edited between writes, so every
//! operation re-reads it rather than trusting an in-memory copy.
//!
//! # Defensive Design
//!
//! - Missing file: initialized to `{}` (idempotent, not an error)
//! - Corrupt JSON: treated as empty for the read, logged, never propagated
//! - Invalid keys or negative/non-finite values: dropped with a warning
//!
//! # Atomic Writes
//!
//! Uses temp file + rename so a crash mid-write never leaves a partial file.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use fs_err as fs;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{Result, TallyError};
use crate::types::{ChannelId, MemberId};

/// Seconds accumulated per channel for one member.
pub type ChannelSeconds = BTreeMap<ChannelId, f64>;

/// The full durable mapping, keyed by member then channel.
pub type DurationMap = BTreeMap<MemberId, ChannelSeconds>;

/// Durable accumulator for presence durations.
///
/// Holds only the backing path; the file itself is the source of truth.
/// Serialization of concurrent `add` calls is the caller's responsibility
/// (the daemon routes all mutations through one mutex).
pub struct DurationStore {
    path: PathBuf,
}

impl DurationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DurationStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the entire durable mapping.
    ///
    /// Never fails: an absent file is created empty, and unparseable content
    /// is logged and treated as empty for this read.
    pub fn read(&self) -> DurationMap {
        if !self.path.exists() {
            if let Err(err) = self.write_raw("{}") {
                debug!(error = %err, path = %self.path.display(), "Failed to initialize empty duration store");
            }
            return DurationMap::new();
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) => {
                warn!(error = %err, path = %self.path.display(), "Failed to read duration store, treating as empty");
                return DurationMap::new();
            }
        };

        if content.trim().is_empty() {
            return DurationMap::new();
        }

        let raw: BTreeMap<String, BTreeMap<String, f64>> = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, path = %self.path.display(), "Failed to parse duration store, treating as empty");
                return DurationMap::new();
            }
        };

        decode(raw)
    }

    /// Adds `delta_seconds` to the accumulated total for `(member, channel)`.
    ///
    /// Read-modify-write: loads the current mapping (default 0.0 for a new
    /// key), adds the delta, and writes the full mapping back atomically.
    /// The caller guarantees `delta_seconds >= 0`.
    pub fn add(&self, member: MemberId, channel: ChannelId, delta_seconds: f64) -> Result<()> {
        debug_assert!(delta_seconds >= 0.0, "negative delta passed to DurationStore::add");
        if !delta_seconds.is_finite() || delta_seconds < 0.0 {
            warn!(
                member = %member,
                channel = %channel,
                delta_seconds,
                "Refusing to accumulate invalid duration"
            );
            return Ok(());
        }

        let mut durations = self.read();
        let entry = durations
            .entry(member)
            .or_default()
            .entry(channel)
            .or_insert(0.0);
        *entry += delta_seconds;

        self.persist(&durations)
    }

    fn persist(&self, durations: &DurationMap) -> Result<()> {
        let content =
            serde_json::to_string_pretty(&encode(durations)).map_err(|err| TallyError::Json {
                context: "serializing duration store".to_string(),
                source: err,
            })?;
        self.write_raw(&content)
    }

    fn write_raw(&self, content: &str) -> Result<()> {
        let parent = self.path.parent().ok_or_else(|| TallyError::PersistFailed {
            path: self.path.clone(),
            details: "store path has no parent directory".to_string(),
        })?;
        fs::create_dir_all(parent).map_err(|err| TallyError::Io {
            context: format!("creating store directory {}", parent.display()),
            source: err.into(),
        })?;

        let mut temp_file = NamedTempFile::new_in(parent).map_err(|err| TallyError::Io {
            context: "creating temp store file".to_string(),
            source: err,
        })?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|err| TallyError::Io {
                context: "writing temp store file".to_string(),
                source: err,
            })?;
        temp_file.flush().map_err(|err| TallyError::Io {
            context: "flushing temp store file".to_string(),
            source: err,
        })?;
        temp_file
            .persist(&self.path)
            .map_err(|err| TallyError::PersistFailed {
                path: self.path.clone(),
                details: err.error.to_string(),
            })?;

        Ok(())
    }
}

fn decode(raw: BTreeMap<String, BTreeMap<String, f64>>) -> DurationMap {
    let mut durations = DurationMap::new();
    for (member_key, channels) in raw {
        let member: MemberId = match member_key.parse() {
            Ok(member) => member,
            Err(_) => {
                warn!(key = %member_key, "Dropping duration entry with non-snowflake member key");
                continue;
            }
        };
        let mut decoded = ChannelSeconds::new();
        for (channel_key, seconds) in channels {
            let channel: ChannelId = match channel_key.parse() {
                Ok(channel) => channel,
                Err(_) => {
                    warn!(key = %channel_key, "Dropping duration entry with non-snowflake channel key");
                    continue;
                }
            };
            if !seconds.is_finite() || seconds < 0.0 {
                warn!(
                    member = %member,
                    channel = %channel,
                    seconds,
                    "Dropping duration entry with invalid value"
                );
                continue;
            }
            decoded.insert(channel, seconds);
        }
        durations.insert(member, decoded);
    }
    durations
}

fn encode(durations: &DurationMap) -> BTreeMap<String, BTreeMap<String, f64>> {
    durations
        .iter()
        .map(|(member, channels)| {
            (
                member.to_string(),
                channels
                    .iter()
                    .map(|(channel, seconds)| (channel.to_string(), *seconds))
                    .collect(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> DurationStore {
        DurationStore::new(dir.join("durations.json"))
    }

    #[test]
    fn read_missing_file_initializes_empty() {
        let temp = tempdir().unwrap();
        let store = store_in(temp.path());

        assert!(store.read().is_empty());
        // The read is idempotent and leaves a valid empty mapping behind.
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "{}");
        assert!(store.read().is_empty());
    }

    #[test]
    fn add_then_read_yields_accumulated_value() {
        let temp = tempdir().unwrap();
        let store = store_in(temp.path());

        store.add(MemberId(1), ChannelId(10), 30.5).unwrap();
        store.add(MemberId(1), ChannelId(10), 10.25).unwrap();

        let durations = store.read();
        assert_eq!(durations[&MemberId(1)][&ChannelId(10)], 40.75);
    }

    #[test]
    fn add_leaves_other_keys_unchanged() {
        let temp = tempdir().unwrap();
        let store = store_in(temp.path());

        store.add(MemberId(1), ChannelId(10), 100.0).unwrap();
        store.add(MemberId(2), ChannelId(20), 50.0).unwrap();
        store.add(MemberId(1), ChannelId(11), 7.0).unwrap();

        let durations = store.read();
        assert_eq!(durations[&MemberId(1)][&ChannelId(10)], 100.0);
        assert_eq!(durations[&MemberId(1)][&ChannelId(11)], 7.0);
        assert_eq!(durations[&MemberId(2)][&ChannelId(20)], 50.0);
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let temp = tempdir().unwrap();
        let store = store_in(temp.path());
        fs::write(store.path(), "{invalid json}").unwrap();

        assert!(store.read().is_empty());
    }

    #[test]
    fn add_recovers_from_corrupt_file() {
        let temp = tempdir().unwrap();
        let store = store_in(temp.path());
        fs::write(store.path(), "not json at all").unwrap();

        store.add(MemberId(1), ChannelId(10), 5.0).unwrap();

        let durations = store.read();
        assert_eq!(durations[&MemberId(1)][&ChannelId(10)], 5.0);
    }

    #[test]
    fn hand_edited_file_survives_round_trip() {
        let temp = tempdir().unwrap();
        let store = store_in(temp.path());
        fs::write(
            store.path(),
            r#"{
                "2": { "20": 12.5 },
                "1": { "10": 3.0, "11": 4.0 }
            }"#,
        )
        .unwrap();

        store.add(MemberId(1), ChannelId(10), 1.0).unwrap();

        let durations = store.read();
        assert_eq!(durations[&MemberId(1)][&ChannelId(10)], 4.0);
        assert_eq!(durations[&MemberId(1)][&ChannelId(11)], 4.0);
        assert_eq!(durations[&MemberId(2)][&ChannelId(20)], 12.5);
    }

    #[test]
    fn invalid_keys_and_values_are_dropped() {
        let temp = tempdir().unwrap();
        let store = store_in(temp.path());
        fs::write(
            store.path(),
            r#"{
                "not-a-snowflake": { "10": 3.0 },
                "1": { "bad-channel": 3.0, "10": -5.0, "11": 4.0 }
            }"#,
        )
        .unwrap();

        let durations = store.read();
        assert_eq!(durations.len(), 1);
        let channels = &durations[&MemberId(1)];
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[&ChannelId(11)], 4.0);
    }

    #[test]
    fn negative_delta_is_refused_without_error() {
        let temp = tempdir().unwrap();
        let store = store_in(temp.path());

        store.add(MemberId(1), ChannelId(10), 10.0).unwrap();
        // Release builds skip the debug_assert; the value must still be refused.
        if cfg!(not(debug_assertions)) {
            store.add(MemberId(1), ChannelId(10), -3.0).unwrap();
            assert_eq!(store.read()[&MemberId(1)][&ChannelId(10)], 10.0);
        }
    }

    #[test]
    fn values_keep_subsecond_precision() {
        let temp = tempdir().unwrap();
        let store = store_in(temp.path());

        store.add(MemberId(1), ChannelId(10), 0.125).unwrap();

        let durations = store.read();
        assert_eq!(durations[&MemberId(1)][&ChannelId(10)], 0.125);
    }
}

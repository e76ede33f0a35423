//! # tally-core
//!
//! Core library for Tally, providing the presence-time accounting engine
//! shared by the daemon and any future clients.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Hosts can wrap with async
//!   if needed.
//! - **Not thread-safe**: Hosts provide their own synchronization (the
//!   daemon routes everything through one `Mutex`).
//! - **Graceful degradation**: A missing or corrupt store reads as empty, a
//!   deleted channel drops out of reports, an untracked disconnect is
//!   logged and skipped. Per-item problems never fail a whole operation.
//! - **Explicit ownership**: The engine is a plain value constructed by the
//!   host, not ambient global state, so tests build it fresh.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tally_core::{DurationStore, Engine, GuildId};
//!
//! let store = DurationStore::new("/var/lib/tally/durations.json");
//! let mut engine = Engine::new([GuildId(926441829157716019)], store);
//! engine.reconcile(&snapshot, Utc::now());
//! engine.handle_transition(&transition);
//! ```

// Public modules
pub mod directory;
pub mod engine;
pub mod error;
pub mod report;
pub mod storage;
pub mod store;
pub mod tracker;
pub mod transition;
pub mod types;

// Re-export commonly used items at crate root
pub use directory::{ChannelInfo, EntityDirectory, MemberInfo};
pub use engine::Engine;
pub use error::{Result, TallyError};
pub use report::{
    format_duration, leaderboard, member_summary, ChannelUsage, Leaderboard, LeaderboardEntry,
    MemberSummary, TopChannel, MAX_REPORT_ENTRIES,
};
pub use storage::StorageConfig;
pub use store::{ChannelSeconds, DurationMap, DurationStore};
pub use tracker::SessionTracker;
pub use transition::{classify, TransitionKind};
pub use types::*;

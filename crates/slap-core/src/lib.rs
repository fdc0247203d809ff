//! Core type aliases, identity types, and constants for the SlapHard backend.
//!
//! This crate provides the foundational types and configuration parameters
//! used throughout the slaphard workspace.

// ============================================================================
// TYPE ALIASES
// ============================================================================
/// Seat index around the table (dense prefix 0..n).
pub type Seat = usize;
/// Server timestamps and durations in milliseconds since the Unix epoch.
pub type Millis = u64;
/// Monotone state version, bumped on every broadcast mutation.
pub type Version = u64;

// ============================================================================
// TRAITS
// ============================================================================
/// Unique identifier trait for domain entities.
pub trait Unique<T = Self> {
    fn id(&self) -> ID<T>;
}

// ============================================================================
// IDENTITY TYPES
// ============================================================================
use std::cmp::Ordering;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::hash::Hash;
use std::hash::Hasher;
use std::marker::PhantomData;

/// Generic ID wrapper providing compile-time type safety over uuid::Uuid.
///
/// Room ids, user ids, socket ids, and match ids all share the same UUID
/// representation on the wire but must never be confused in code.
pub struct ID<T> {
    inner: uuid::Uuid,
    marker: PhantomData<T>,
}

impl<T> ID<T> {
    pub fn inner(&self) -> uuid::Uuid {
        self.inner
    }
    /// Cast ID<T> to ID<U> while preserving the underlying UUID.
    pub fn cast<U>(self) -> ID<U> {
        ID {
            inner: self.inner,
            marker: PhantomData,
        }
    }
    /// Parse from the canonical hyphenated text form.
    pub fn parse(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s).ok().map(Self::from)
    }
}

impl<T> From<ID<T>> for uuid::Uuid {
    fn from(id: ID<T>) -> Self {
        id.inner()
    }
}
impl<T> From<uuid::Uuid> for ID<T> {
    fn from(inner: uuid::Uuid) -> Self {
        Self {
            inner,
            marker: PhantomData,
        }
    }
}

impl<T> Default for ID<T> {
    fn default() -> Self {
        Self {
            inner: uuid::Uuid::now_v7(),
            marker: PhantomData,
        }
    }
}

impl<T> Copy for ID<T> {}
impl<T> Clone for ID<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Eq for ID<T> {}
impl<T> PartialEq for ID<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T> Ord for ID<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.cmp(&other.inner)
    }
}
impl<T> PartialOrd for ID<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Hash for ID<T> {
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        self.inner.hash(state);
    }
}

impl<T> Debug for ID<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ID").field(&self.inner).finish()
    }
}
impl<T> Display for ID<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

impl<T> serde::Serialize for ID<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.inner.serialize(serializer)
    }
}
impl<'de, T> serde::Deserialize<'de> for ID<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        uuid::Uuid::deserialize(deserializer).map(Self::from)
    }
}

// ============================================================================
// TABLE PARAMETERS
// ============================================================================
/// Minimum players required to start a match.
pub const MIN_PLAYERS: usize = 2;
/// Maximum players a room will seat.
pub const MAX_PLAYERS: usize = 8;
/// Length of the chant cycle (one word per normal card).
pub const CHANT_CYCLE: usize = 5;

// ============================================================================
// TIMING PARAMETERS
// All wall-clock knobs reach the engine through GameConfig; these are the
// defaults the orchestrator injects.
// ============================================================================
/// Time a seated player has to flip before the turn times out.
pub const DEFAULT_TURN_TIMEOUT_MS: Millis = 5_000;
/// Slap window length for MATCH and SAME_CARD reveals.
pub const DEFAULT_MATCH_WINDOW_MS: Millis = 2_000;
/// Slap window length for ACTION reveals (gesture takes longer).
pub const DEFAULT_ACTION_WINDOW_MS: Millis = 3_200;
/// Floor on estimated reaction time; sub-human estimates clamp up to this.
pub const MIN_REACTION_MS: Millis = 60;
/// Slack past the window deadline before reaction estimates are capped.
pub const REACTION_CAP_SLACK_MS: Millis = 2_000;
/// ACTION windows with at least this many players resolve only by slap count.
pub const ACTION_ALL_SLAP_THRESHOLD: usize = 5;
/// Minimum gap between gameplay inputs from one connection.
pub const GAMEPLAY_RATE_LIMIT_MS: Millis = 40;
/// How long a resolved slap window keeps absorbing late duplicate slaps.
pub const SLAP_DEDUP_GRACE_MS: Millis = 250;

// ============================================================================
// ROOM PARAMETERS
// ============================================================================
/// Store TTL for room entries and their indexes.
pub const ROOM_TTL_SECS: u64 = 3_600;
/// Length of a join code.
pub const ROOM_CODE_LEN: usize = 6;
/// Join-code alphabet: A-Z0-9 minus the visually ambiguous I, O, 1, 0.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
/// Collision retries before code generation gives up.
pub const ROOM_CODE_ATTEMPTS: usize = 20;
/// Display name length bounds (after trimming).
pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 24;

// ============================================================================
// RUNTIME UTILITIES
// ============================================================================
/// Initialize dual logging (terminal + file) with timestamped log files.
/// Creates `logs/` directory and writes DEBUG level to file, INFO to terminal.
#[cfg(feature = "server")]
pub fn log() {
    std::fs::create_dir_all("logs").expect("create logs directory");
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let time = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves slow")
        .as_secs();
    let file = simplelog::WriteLogger::new(
        log::LevelFilter::Debug,
        config.clone(),
        std::fs::File::create(format!("logs/{}.log", time)).expect("create log file"),
    );
    let term = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config.clone(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term, file]).expect("initialize logger");
}

/// Register Ctrl+C handler for immediate (non-graceful) termination.
#[cfg(feature = "server")]
pub fn kys() {
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.unwrap();
        println!();
        log::warn!("violent interrupt received, exiting immediately");
        std::process::exit(0);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    struct Marker;
    #[test]
    fn id_roundtrips_through_uuid() {
        let id = ID::<Marker>::default();
        assert_eq!(ID::<Marker>::from(id.inner()), id);
    }
    #[test]
    fn id_parses_own_display() {
        let id = ID::<Marker>::default();
        assert_eq!(ID::<Marker>::parse(&id.to_string()), Some(id));
        assert_eq!(ID::<Marker>::parse("not-a-uuid"), None);
    }
    #[test]
    fn code_alphabet_excludes_ambiguous() {
        assert_eq!(ROOM_CODE_ALPHABET.len(), 32);
        for c in [b'I', b'O', b'1', b'0'] {
            assert!(!ROOM_CODE_ALPHABET.contains(&c));
        }
    }
}

//! Durable persistence for room history and match journals.
//!
//! The gameplay path talks to the [`slap_room::GameJournal`] trait; this
//! crate provides the PostgreSQL implementation plus connectivity and
//! migration helpers. Nothing here is latency-critical: every caller goes
//! through the retry-once-then-swallow wrapper in `slap-room`.
//!
//! ## Connectivity
//!
//! - [`db()`] — Establishes a database connection from `DATABASE_URL`
//!
//! ## Components
//!
//! - [`migrate`] — Idempotent DDL for the four journal tables
//! - [`PgJournal`] — [`slap_room::GameJournal`] over `Arc<Client>`
mod journal;
mod schema;

pub use journal::*;
pub use schema::*;

use std::sync::Arc;
use tokio_postgres::Client;

/// Establishes a database connection from `DATABASE_URL`.
///
/// Returns an `Arc<Client>` suitable for sharing across async tasks.
/// The connection task is spawned onto the runtime; a broken connection
/// surfaces as errors on subsequent queries, which the journal wrapper
/// logs and swallows.
pub async fn db() -> anyhow::Result<Arc<Client>> {
    log::info!("connecting to database");
    let url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set when persistence is enabled"))?;
    let (client, connection) = tokio_postgres::connect(&url, tokio_postgres::tls::NoTls).await?;
    tokio::spawn(connection);
    Ok(Arc::new(client))
}

/// PostgreSQL error type alias.
pub type PgErr = tokio_postgres::Error;

/// Table for room metadata and lifecycle timestamps.
#[rustfmt::skip]
pub const ROOMS:          &str = "rooms";
/// Table for append-only room transition snapshots.
#[rustfmt::skip]
pub const ROOM_SNAPSHOTS: &str = "room_snapshots";
/// Table for matches and their outcomes.
#[rustfmt::skip]
pub const MATCHES:        &str = "matches";
/// Table for the append-only in-match event journal.
#[rustfmt::skip]
pub const MATCH_EVENTS:   &str = "match_events";

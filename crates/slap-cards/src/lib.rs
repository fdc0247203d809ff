//! Card taxonomy, deck composition, and the contractual seeded shuffle.
//!
//! ## Types
//!
//! - [`Card`] — the eight-member closed card set (five normal, three action)
//! - [`Deck`] — deck construction, validation, and round-robin dealing
//! - [`ShuffleRng`] — fixed 32-bit PRNG whose exact constants are part of the
//!   cross-implementation contract: identical seeds yield identical shuffles
mod card;
mod deck;
mod rng;

pub use card::*;
pub use deck::*;
pub use rng::*;

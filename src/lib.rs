//! Bulls-vs-Bears match simulation engine.
//!
//! A real-time multiplayer trading game: players join a match, pick
//! avatars and strategies during a pre-match countdown, then trade a fixed
//! asset catalog across five news-driven rounds at one tick per second.
//! All state lives in a single [`engine::state::MatchState`] mutated only
//! through the [`engine::reducer`], which makes seeded runs replayable.

pub mod analysis;
pub mod catalog;
pub mod engine;
pub mod ledger;
pub mod logging;
pub mod pricing;
pub mod results;
pub mod sentiment;
pub mod valuation;

//! Application layer: balances, the interactive pay/charge flows and the
//! host-facing service that ties them together.
//!
//! Every component owns its state behind per-key locks and is shared through
//! `Arc`, so the free-text context and the command context can call in
//! concurrently.

pub mod executor;
pub mod ledger;
pub mod pending;
pub mod service;
pub mod sessions;

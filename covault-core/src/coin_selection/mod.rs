//! Funding-coin selection and reservation
//!
//! This module decides which of the wallet's coins fund an in-progress
//! draft and keeps the advisory reservation bookkeeping that stops two
//! concurrently started drafts from selecting the same coin.
//!
//! # Overview
//!
//! - [`types`]: the [`SharedUtxo`](types::SharedUtxo) and
//!   [`FundingSet`](types::FundingSet) structures
//! - [`selector`]: the [`CoinSelector`](selector::CoinSelector)
//!   implementation
//!
//! Reservations are process-local and advisory: the final protection
//! against a conflicting spend is the pending pool's and chain's own
//! conflict detection at submission time.

pub mod selector;
pub mod types;

pub use selector::CoinSelector;
pub use types::{FundingSet, SharedUtxo};

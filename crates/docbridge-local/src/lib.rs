//! Local JSON-lines store for docbridge tasks.
//!
//! Provides a [`LocalFactory`] whose resources are `.jsonl` files under one
//! root directory. Scroll queries support match-all and single-term matches
//! (see [`TermQuery`]).

#![warn(clippy::pedantic)]

pub mod query;
pub mod store;

pub use query::TermQuery;
pub use store::{LocalCursor, LocalFactory, LocalRepository};

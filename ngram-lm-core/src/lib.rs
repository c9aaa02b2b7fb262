//! Statistical n-gram language modelling library.
//!
//! This crate provides a word-level (or any token-level) n-gram system including:
//! - A multi-length n-gram counting store
//! - Maximum likelihood, add-delta and Good-Turing probability estimation
//! - Weighted sentence generation terminated by an end-of-sequence token
//! - Corpus loading, snapshot caching and parallel multi-document construction

/// Error type shared by every fallible operation of the crate.
pub mod error;

/// Core n-gram store, probability models and generation logic.
///
/// The store owns the counts; every probability model borrows one store
/// and the sampler borrows one model for the duration of a generation.
pub mod model;

/// I/O utilities (corpus tokenizing, snapshot cache, folder helpers).
pub mod io;

pub use error::{NgramError, Result};

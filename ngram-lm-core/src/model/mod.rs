//! Top-level module for the n-gram language modelling system.
//!
//! This module provides:
//! - Token types with an end-of-sequence sentinel (`Token`, `EndOfSequence`)
//! - A multi-length n-gram counting store (`NgramStore`)
//! - A capability trait implemented by each smoothing strategy (`LanguageModel`)
//! - Three strategies (`MaximumLikelihood`, `AddDelta`, `GoodTuring`)
//! - Strategy selection from configuration (`Smoothing`)
//! - Weighted sentence generation (`SentenceSampler`, `GenerationInput`)

/// Tokens of the modelled language and the end-of-sequence sentinel.
pub mod token;

/// Display helpers for n-grams (space-joined tokens).
pub mod ngram;

/// Exact counting of contiguous token windows, for several lengths at once.
///
/// Handles lazy table materialization, lookups and cross-store comparison.
pub mod store;

/// Capability interface shared by every probability model.
pub mod language_model;

/// Maximum likelihood (relative frequency) estimation.
pub mod maximum_likelihood;

/// Add-delta (Laplace family) smoothing.
pub mod add_delta;

/// Good-Turing smoothing with a count threshold.
pub mod good_turing;

/// Runtime selection of a smoothing strategy from configuration values.
pub mod smoothing;

/// Weighted random generation of token sequences.
pub mod sampler;

/// Generation parameters (context length, prefix mode, seed, limits).
pub mod generation_input;

pub use add_delta::AddDelta;
pub use generation_input::GenerationInput;
pub use good_turing::GoodTuring;
pub use language_model::LanguageModel;
pub use maximum_likelihood::MaximumLikelihood;
pub use sampler::SentenceSampler;
pub use smoothing::Smoothing;
pub use store::{LengthSpec, NgramStore};
pub use token::{EndOfSequence, Token};

use std::hash::Hash;

use rand::rngs::StdRng;

use crate::error::{NgramError, Result};
use crate::model::language_model::LanguageModel;
use crate::model::sampler::SentenceSampler;
use crate::model::store::NgramStore;
use crate::model::token::EndOfSequence;

/// Input parameters for generating sentences.
///
/// # Responsibilities
/// - Track generation parameters (context length, prefix mode, seed, limit)
/// - Build a sampler matching those parameters
///
/// # Invariants
/// - `context_length` is always >= 1
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationInput {
	/// N-gram length used for generation (context of `context_length - 1` tokens).
	context_length: usize,

	/// Whether the first token must be one that starts a sentence in the corpus.
	pub proper_prefix: bool,

	/// Seed of the random source; `None` seeds from the thread-local source.
	pub seed: Option<u64>,

	/// Maximum number of generated tokens; `None` for unbounded.
	pub max_length: Option<usize>,
}

impl Default for GenerationInput {
	fn default() -> Self {
		Self {
			context_length: 2,
			proper_prefix: true,
			seed: None,
			max_length: None,
		}
	}
}

impl GenerationInput {
	/// Creates generation parameters for n-grams of `context_length`.
	///
	/// # Errors
	/// Returns `InvalidLength` if `context_length` is 0.
	pub fn new(context_length: usize) -> Result<Self> {
		let mut input = Self::default();
		input.set_context_length(context_length)?;
		Ok(input)
	}

	/// Returns the n-gram length used for generation.
	pub fn context_length(&self) -> usize {
		self.context_length
	}

	/// Sets the n-gram length used for generation.
	///
	/// # Errors
	/// Returns `InvalidLength` if the value is 0.
	pub fn set_context_length(&mut self, context_length: usize) -> Result<()> {
		if context_length == 0 {
			return Err(NgramError::InvalidLength { length: 0 });
		}
		self.context_length = context_length;
		Ok(())
	}

	/// Builds a sampler for these parameters.
	pub fn sampler(&self) -> SentenceSampler<StdRng> {
		let sampler = match self.seed {
			Some(seed) => SentenceSampler::seeded(seed),
			None => SentenceSampler::from_thread_rng(),
		};
		match self.max_length {
			Some(max_length) => sampler.with_max_length(max_length),
			None => sampler,
		}
	}

	/// Materializes the lengths generation needs in `store`.
	pub fn prepare<T: Clone + Eq + Hash>(&self, store: &mut NgramStore<T>) -> Result<()> {
		SentenceSampler::<StdRng>::prepare(store, self.context_length, self.proper_prefix)
	}

	/// N-gram lengths the sampler reads from the model.
	pub fn lengths(&self) -> Vec<usize> {
		let longest = if self.proper_prefix {
			self.context_length.max(2)
		} else {
			self.context_length
		};
		(1..=longest).collect()
	}

	/// Generates `count` sentences from `model` with a single sampler.
	pub fn generate<T, M>(&self, model: &M, count: usize) -> Result<Vec<Vec<T>>>
	where
		T: Clone + Eq + Hash + Ord + EndOfSequence,
		M: LanguageModel<T> + ?Sized,
	{
		let mut sampler = self.sampler();
		(0..count)
			.map(|_| sampler.generate(model, self.context_length, self.proper_prefix))
			.collect()
	}
}

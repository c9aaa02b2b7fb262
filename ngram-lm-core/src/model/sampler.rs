use std::hash::Hash;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{NgramError, Result};
use crate::model::language_model::{LanguageModel, join};
use crate::model::store::NgramStore;
use crate::model::token::EndOfSequence;

/// A weighted set of candidate tokens.
///
/// Candidates are kept in a deterministic order (sorted vocabulary), so a
/// seeded random source always reproduces the same draws.
#[derive(Clone, Debug, PartialEq)]
pub struct Distribution<T> {
	choices: Vec<T>,
	weights: Vec<f64>,
}

impl<T> Default for Distribution<T> {
	fn default() -> Self {
		Self {
			choices: Vec::new(),
			weights: Vec::new(),
		}
	}
}

impl<T: Clone + Eq + Hash + Ord> Distribution<T> {
	/// Unconditional distribution over every unigram of the model's store.
	///
	/// # Errors
	/// Returns an error if length 1 is not materialized or a probability
	/// cannot be computed.
	pub fn unigrams<M: LanguageModel<T> + ?Sized>(model: &M) -> Result<Self> {
		let mut words: Vec<&Vec<T>> = model.store().table(1)?.keys().collect();
		words.sort();

		let mut distribution = Self::default();
		for word in words {
			let probability = model.ngram_probability(word)?;
			distribution.choices.push(word[0].clone());
			distribution.weights.push(probability);
		}
		Ok(distribution)
	}

	/// Distribution of the tokens of `vocabulary` that were observed after
	/// `context`, weighted by their probability given `context`.
	///
	/// # Errors
	/// Returns an error if the length `context.len() + 1` is not
	/// materialized or a probability cannot be computed.
	pub fn continuations<M: LanguageModel<T> + ?Sized>(model: &M, vocabulary: &[T], context: &[T]) -> Result<Self> {
		let mut distribution = Self::default();
		for word in vocabulary {
			let next = std::slice::from_ref(word);
			if model.store().checked_count(&join(context, next))? > 0 {
				distribution.choices.push(word.clone());
				distribution.weights.push(model.probability_given(context, next)?);
			}
		}
		Ok(distribution)
	}
}

impl<T> Distribution<T> {
	pub fn choices(&self) -> &[T] {
		&self.choices
	}

	pub fn weights(&self) -> &[f64] {
		&self.weights
	}

	pub fn len(&self) -> usize {
		self.choices.len()
	}

	pub fn is_empty(&self) -> bool {
		self.choices.is_empty()
	}

	/// Draws one candidate.
	///
	/// # Errors
	/// Returns `EmptyDistribution` if there is nothing to draw from (no
	/// candidate, or no positive weight).
	pub fn sample<R: Rng>(&self, rng: &mut R, context_length: usize) -> Result<&T> {
		weighted_index(&self.weights, rng)
			.map(|index| &self.choices[index])
			.ok_or(NgramError::EmptyDistribution { context_length })
	}
}

/// Selects an index with probability proportional to its weight.
///
/// A uniform value in `[0, total)` is drawn and weights are accumulated in
/// list order; the first index whose cumulative weight exceeds the draw is
/// returned. If rounding leaves the draw unmatched, the last index is used.
///
/// Returns `None` if `weights` is empty or does not sum to a positive,
/// finite total.
pub fn weighted_index<R: Rng>(weights: &[f64], rng: &mut R) -> Option<usize> {
	let total: f64 = weights.iter().sum();
	if weights.is_empty() || !total.is_finite() || total <= 0.0 {
		return None;
	}

	let draw = rng.random::<f64>() * total;
	let mut accumulator = 0.0;
	for (index, weight) in weights.iter().enumerate() {
		accumulator += weight;
		if accumulator > draw {
			return Some(index);
		}
	}
	Some(weights.len() - 1)
}

/// Generates token sequences from a language model.
///
/// The sampler owns its random source across calls; it is never reseeded
/// between generations.
///
/// # Algorithm
/// 1. The first token is drawn from the unigram distribution or, in proper
///    prefix mode, from the tokens observed right after an end-of-sequence.
///    The end-of-sequence only selects the first token; it is not part of
///    the context of the following ones.
/// 2. With `length == 1`, tokens are drawn independently from the unigram
///    distribution until end-of-sequence is drawn.
/// 3. Otherwise each token is drawn among the tokens observed after the
///    trailing context (at most `length - 1` tokens), weighted by their
///    conditional probability, until end-of-sequence is drawn.
#[derive(Debug)]
pub struct SentenceSampler<R> {
	rng: R,

	/// Maximum number of generated tokens, `None` for unbounded.
	max_length: Option<usize>,
}

impl SentenceSampler<StdRng> {
	/// Creates a sampler with a reproducible random source.
	pub fn seeded(seed: u64) -> Self {
		Self::new(StdRng::seed_from_u64(seed))
	}

	/// Creates a sampler seeded from the thread-local random source.
	pub fn from_thread_rng() -> Self {
		Self::new(StdRng::from_rng(&mut rand::rng()))
	}
}

impl<R: Rng> SentenceSampler<R> {
	/// Creates an unbounded sampler using `rng`.
	pub fn new(rng: R) -> Self {
		Self { rng, max_length: None }
	}

	/// Limits generated sentences to `max_length` tokens.
	pub fn with_max_length(mut self, max_length: usize) -> Self {
		self.max_length = Some(max_length);
		self
	}

	pub fn max_length(&self) -> Option<usize> {
		self.max_length
	}

	/// Materializes the lengths that [`generate`](Self::generate) needs:
	/// `1..=length`, plus 2 in proper prefix mode.
	///
	/// # Errors
	/// Returns `InvalidLength` if `length` is 0.
	pub fn prepare<T: Clone + Eq + Hash>(store: &mut NgramStore<T>, length: usize, proper_prefix: bool) -> Result<()> {
		store.materialize_up_to(length)?;
		if proper_prefix {
			store.materialize(&[2])?;
		}
		Ok(())
	}

	/// Generates one sentence; its last token is the end-of-sequence token.
	///
	/// # Errors
	/// - `InvalidLength` if `length` is 0.
	/// - `UnmaterializedLength` if a needed length is missing (see
	///   [`prepare`](Self::prepare)).
	/// - `EmptyDistribution` if no token ever followed the current context.
	/// - `GenerationLimit` if the configured maximum length is reached.
	pub fn generate<T, M>(&mut self, model: &M, length: usize, proper_prefix: bool) -> Result<Vec<T>>
	where
		T: Clone + Eq + Hash + Ord + EndOfSequence,
		M: LanguageModel<T> + ?Sized,
	{
		if length == 0 {
			return Err(NgramError::InvalidLength { length });
		}

		let unigrams = Distribution::unigrams(model)?;
		debug!(
			"generating with {} (length {}, proper prefix {}), {} candidate words",
			model.name(),
			length,
			proper_prefix,
			unigrams.len()
		);

		let first = if proper_prefix {
			let starts = Distribution::continuations(model, unigrams.choices(), &[T::eos()])?;
			starts.sample(&mut self.rng, 1)?.clone()
		} else {
			unigrams.sample(&mut self.rng, 0)?.clone()
		};
		let mut sentence = vec![first];

		// Without context every token is drawn independently
		if length == 1 {
			while !Self::is_finished(&sentence) {
				self.check_limit(sentence.len())?;
				sentence.push(unigrams.sample(&mut self.rng, 0)?.clone());
			}
			return Ok(sentence);
		}

		let mut context: Vec<T> = Vec::with_capacity(length);
		context.push(sentence[0].clone());
		while !Self::is_finished(&sentence) {
			self.check_limit(sentence.len())?;
			if context.len() >= length {
				context.drain(..context.len() + 1 - length);
			}

			let options = Distribution::continuations(model, unigrams.choices(), &context)?;
			debug!("{} continuations for a context of {} tokens", options.len(), context.len());
			let token = options.sample(&mut self.rng, context.len())?.clone();

			context.push(token.clone());
			sentence.push(token);
		}
		Ok(sentence)
	}

	fn is_finished<T: EndOfSequence>(sentence: &[T]) -> bool {
		sentence.last().is_some_and(EndOfSequence::is_eos)
	}

	fn check_limit(&self, generated: usize) -> Result<()> {
		match self.max_length {
			Some(limit) if generated >= limit => Err(NgramError::GenerationLimit { limit }),
			_ => Ok(()),
		}
	}
}

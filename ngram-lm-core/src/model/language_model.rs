use crate::error::{NgramError, Result};
use crate::model::store::NgramStore;

/// Capability interface of a statistical language model.
///
/// Each smoothing strategy borrows one [`NgramStore`] and implements the
/// per-n-gram estimators; sentence scoring is shared and accumulates the
/// conditional probability of each token given a trailing context of at
/// most `length - 1` tokens. The context grows token by token until it
/// reaches `length - 1`, then slides.
///
/// # Materialization
/// Models never extend the store. A query needing a length that was not
/// materialized fails with `UnmaterializedLength`.
pub trait LanguageModel<T> {
	/// Short identifier of the strategy (used in logs and responses).
	fn name(&self) -> &'static str;

	/// The store the model reads counts from.
	fn store(&self) -> &NgramStore<T>;

	/// Probability of `ngram` under this strategy.
	fn ngram_probability(&self, ngram: &[T]) -> Result<f64>;

	/// Probability of `next` following `given`.
	///
	/// An empty `given` means no context: the unconditional probability of
	/// `next` is returned.
	fn probability_given(&self, given: &[T], next: &[T]) -> Result<f64>;

	/// Probability of `sentence` using contexts of at most `length - 1` tokens.
	///
	/// An empty sentence has probability 1.
	///
	/// # Errors
	/// Returns `InvalidLength` if `length` is 0, and any estimator error.
	fn sentence_probability(&self, length: usize, sentence: &[T]) -> Result<f64> {
		let mut result = 1.0;
		for (context, token) in sliding_contexts(length, sentence)? {
			result *= self.probability_given(context, std::slice::from_ref(token))?;
		}
		Ok(result)
	}

	/// Natural log of [`sentence_probability`](Self::sentence_probability),
	/// computed as a sum of logs.
	///
	/// # Errors
	/// Returns `LogOfNonPositive` as soon as one token has zero probability.
	fn log_sentence_probability(&self, length: usize, sentence: &[T]) -> Result<f64> {
		let mut result = 0.0;
		for (context, token) in sliding_contexts(length, sentence)? {
			result += checked_ln(self.probability_given(context, std::slice::from_ref(token))?)?;
		}
		Ok(result)
	}
}

/// Yields every token of `sentence` with its trailing context.
///
/// The context of token `i` is `sentence[i - (length - 1)..i]`, clamped at
/// the start of the sentence.
///
/// # Errors
/// Returns `InvalidLength` if `length` is 0.
pub(crate) fn sliding_contexts<T>(
	length: usize,
	sentence: &[T],
) -> Result<impl Iterator<Item = (&[T], &T)>> {
	if length == 0 {
		return Err(NgramError::InvalidLength { length });
	}
	Ok(sentence
		.iter()
		.enumerate()
		.map(move |(i, token)| (&sentence[i.saturating_sub(length - 1)..i], token)))
}

/// Natural log that refuses zero, negative and NaN probabilities.
pub(crate) fn checked_ln(probability: f64) -> Result<f64> {
	if probability > 0.0 {
		Ok(probability.ln())
	} else {
		Err(NgramError::LogOfNonPositive { probability })
	}
}

/// Concatenates `given` and `next` into the full n-gram.
pub(crate) fn join<T: Clone>(given: &[T], next: &[T]) -> Vec<T> {
	let mut full = Vec::with_capacity(given.len() + next.len());
	full.extend_from_slice(given);
	full.extend_from_slice(next);
	full
}

/// Number of unigram windows as a denominator.
///
/// # Errors
/// Returns `ZeroContext` for an empty token sequence.
pub(crate) fn unigram_total<T: Clone + Eq + std::hash::Hash>(store: &NgramStore<T>) -> Result<f64> {
	match store.num_windows(1) {
		0 => Err(NgramError::ZeroContext { length: 0 }),
		total => Ok(total as f64),
	}
}

use std::hash::Hash;

use crate::error::{NgramError, Result};
use crate::model::language_model::{LanguageModel, checked_ln, join, sliding_contexts};
use crate::model::store::NgramStore;

/// Add-delta (Laplace family) smoothed language model.
///
/// `P(ngram) = (count(ngram) + δ) / (denominator + δ · V^k)` where `k` is
/// the n-gram length, `denominator` is the count of the n-gram without its
/// last token (or `num_windows(1)` for unigrams) and `V` the vocabulary size.
///
/// Every n-gram, seen or unseen, receives a strictly positive probability.
///
/// # Vocabulary
/// When no vocabulary size is supplied, `V` defaults to the number of
/// distinct n-grams of the queried length (of the context length for the
/// log sentence probability).
#[derive(Clone, Copy, Debug)]
pub struct AddDelta<'a, T> {
	store: &'a NgramStore<T>,

	/// Pseudocount added to every n-gram, strictly positive.
	delta: f64,
}

impl<'a, T: Clone + Eq + Hash> AddDelta<'a, T> {
	/// Creates a model reading counts from `store`.
	///
	/// # Errors
	/// Returns `InvalidParameter` if `delta` is not a positive finite number.
	pub fn new(store: &'a NgramStore<T>, delta: f64) -> Result<Self> {
		validate_delta(delta)?;
		Ok(Self { store, delta })
	}

	/// Returns the pseudocount.
	pub fn delta(&self) -> f64 {
		self.delta
	}

	/// Sets the pseudocount.
	///
	/// # Errors
	/// Returns `InvalidParameter` if `delta` is not a positive finite number.
	pub fn set_delta(&mut self, delta: f64) -> Result<()> {
		validate_delta(delta)?;
		self.delta = delta;
		Ok(())
	}

	/// Probability of `ngram` with an explicit vocabulary size.
	///
	/// # Errors
	/// - `InvalidLength` for an empty n-gram.
	/// - `UnmaterializedLength` if the n-gram or its prefix length is missing.
	/// - `ZeroContext` if the denominator is zero (empty prefix count and
	///   zero vocabulary).
	pub fn ngram_probability_with_vocabulary(&self, ngram: &[T], vocabulary: usize) -> Result<f64> {
		let k = ngram.len();
		if k == 0 {
			return Err(NgramError::InvalidLength { length: 0 });
		}

		let numerator = self.store.checked_count(ngram)? as f64 + self.delta;
		let observed = if k > 1 {
			self.store.checked_count(&ngram[..k - 1])?
		} else {
			self.store.num_windows(1)
		};
		let denominator = observed as f64 + self.delta * (vocabulary as f64).powi(k as i32);
		if denominator <= 0.0 {
			return Err(NgramError::ZeroContext { length: k - 1 });
		}
		Ok(numerator / denominator)
	}

	/// Sentence probability with an explicit vocabulary size for every n-gram.
	pub fn sentence_probability_with_vocabulary(
		&self,
		length: usize,
		sentence: &[T],
		vocabulary: usize,
	) -> Result<f64> {
		let mut result = 1.0;
		for (context, token) in sliding_contexts(length, sentence)? {
			let ngram = join(context, std::slice::from_ref(token));
			result *= self.ngram_probability_with_vocabulary(&ngram, vocabulary)?;
		}
		Ok(result)
	}

	/// Log sentence probability with an explicit vocabulary size for every n-gram.
	pub fn log_sentence_probability_with_vocabulary(
		&self,
		length: usize,
		sentence: &[T],
		vocabulary: usize,
	) -> Result<f64> {
		let mut result = 0.0;
		for (context, token) in sliding_contexts(length, sentence)? {
			let ngram = join(context, std::slice::from_ref(token));
			result += checked_ln(self.ngram_probability_with_vocabulary(&ngram, vocabulary)?)?;
		}
		Ok(result)
	}
}

impl<'a, T: Clone + Eq + Hash> LanguageModel<T> for AddDelta<'a, T> {
	fn name(&self) -> &'static str {
		"add-delta"
	}

	fn store(&self) -> &NgramStore<T> {
		self.store
	}

	fn ngram_probability(&self, ngram: &[T]) -> Result<f64> {
		if ngram.is_empty() {
			return Err(NgramError::InvalidLength { length: 0 });
		}
		let vocabulary = self.store.num_distinct(ngram.len())?;
		self.ngram_probability_with_vocabulary(ngram, vocabulary)
	}

	/// The smoothed estimate already conditions on everything before the
	/// last token, so this is the probability of the joined n-gram.
	fn probability_given(&self, given: &[T], next: &[T]) -> Result<f64> {
		self.ngram_probability(&join(given, next))
	}

	fn log_sentence_probability(&self, length: usize, sentence: &[T]) -> Result<f64> {
		if length == 0 {
			return Err(NgramError::InvalidLength { length });
		}
		let vocabulary = self.store.num_distinct(length)?;
		self.log_sentence_probability_with_vocabulary(length, sentence, vocabulary)
	}
}

fn validate_delta(delta: f64) -> Result<()> {
	if !delta.is_finite() || delta <= 0.0 {
		return Err(NgramError::invalid_parameter(
			"delta",
			format!("must be a positive finite number, got {delta}"),
		));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::store::LengthSpec;
	use crate::model::token::Token;

	fn store() -> NgramStore<Token<String>> {
		NgramStore::new(Token::parse_all("the cat sat <END> the dog sat <END>"), &LengthSpec::UpTo(2)).unwrap()
	}

	#[test]
	fn rejects_non_positive_delta() {
		let store = store();
		assert!(AddDelta::new(&store, 0.0).is_err());
		assert!(AddDelta::new(&store, -1.0).is_err());
		assert!(AddDelta::new(&store, f64::NAN).is_err());
		let mut model = AddDelta::new(&store, 1.0).unwrap();
		assert!(model.set_delta(f64::INFINITY).is_err());
		model.set_delta(0.5).unwrap();
		assert_eq!(model.delta(), 0.5);
	}

	#[test]
	fn unigram_formula() {
		let store = store();
		let model = AddDelta::new(&store, 1.0).unwrap();
		// (2 + 1) / (8 + 1 * 5)
		let p = model.ngram_probability(&Token::parse_all("the")).unwrap();
		assert!((p - 3.0 / 13.0).abs() < 1e-12);
	}

	#[test]
	fn bigram_formula_uses_prefix_count() {
		let store = store();
		let model = AddDelta::new(&store, 0.5).unwrap();
		// (1 + 0.5) / (count(the) = 2 + 0.5 * 6^2)
		let p = model.ngram_probability(&Token::parse_all("the cat")).unwrap();
		assert!((p - 1.5 / 20.0).abs() < 1e-12);
		// explicit vocabulary override: (1 + 0.5) / (2 + 0.5 * 10^2)
		let p = model
			.ngram_probability_with_vocabulary(&Token::parse_all("the cat"), 10)
			.unwrap();
		assert!((p - 1.5 / 52.0).abs() < 1e-12);
	}

	#[test]
	fn unseen_ngrams_are_positive() {
		let store = store();
		let model = AddDelta::new(&store, 0.1).unwrap();
		assert!(model.ngram_probability(&Token::parse_all("bird")).unwrap() > 0.0);
		assert!(model.ngram_probability(&Token::parse_all("bird flew")).unwrap() > 0.0);
		assert!(model.log_sentence_probability(2, &Token::parse_all("the bird flew")).unwrap() < 0.0);
	}

	#[test]
	fn unigram_mass_sums_to_one() {
		let store = store();
		let model = AddDelta::new(&store, 0.7).unwrap();
		let total: f64 = store
			.table(1)
			.unwrap()
			.keys()
			.map(|w| model.ngram_probability(w).unwrap())
			.sum();
		assert!((total - 1.0).abs() < 1e-9);
	}

	#[test]
	fn sentence_probability_multiplies_smoothed_ngrams() {
		let store = store();
		let model = AddDelta::new(&store, 1.0).unwrap();
		let sentence = Token::parse_all("the cat");
		let expected = model.ngram_probability(&Token::parse_all("the")).unwrap()
			* model.ngram_probability(&Token::parse_all("the cat")).unwrap();
		assert!((model.sentence_probability(2, &sentence).unwrap() - expected).abs() < 1e-12);
	}

	#[test]
	fn log_sentence_uses_context_length_vocabulary() {
		let store = store();
		let model = AddDelta::new(&store, 1.0).unwrap();
		let sentence = Token::parse_all("the cat sat");
		let vocabulary = store.num_distinct(2).unwrap();
		let expected = model
			.log_sentence_probability_with_vocabulary(2, &sentence, vocabulary)
			.unwrap();
		assert_eq!(model.log_sentence_probability(2, &sentence).unwrap(), expected);
		let product = model.sentence_probability_with_vocabulary(2, &sentence, vocabulary).unwrap();
		assert!((product.ln() - expected).abs() < 1e-12);
	}

	#[test]
	fn zero_vocabulary_with_unseen_prefix_is_reported() {
		let store = store();
		let model = AddDelta::new(&store, 1.0).unwrap();
		assert!(matches!(
			model.ngram_probability_with_vocabulary(&Token::parse_all("bird flew"), 0),
			Err(NgramError::ZeroContext { length: 1 })
		));
	}
}

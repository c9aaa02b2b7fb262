use std::hash::Hash;

use rand::Rng;

use crate::error::Result;
use crate::model::language_model::{LanguageModel, join, unigram_total};
use crate::model::sampler::SentenceSampler;
use crate::model::store::NgramStore;
use crate::model::token::EndOfSequence;

/// Maximum likelihood (relative frequency) language model.
///
/// - Unconditional: `P(w) = count(w) / num_windows(1)`
/// - Conditional: `P(w | context) = count(context ++ w) / count(context)`,
///   defined as 0 when the context was never seen.
#[derive(Clone, Copy, Debug)]
pub struct MaximumLikelihood<'a, T> {
	store: &'a NgramStore<T>,
}

impl<'a, T: Clone + Eq + Hash> MaximumLikelihood<'a, T> {
	/// Creates a model reading counts from `store`.
	pub fn new(store: &'a NgramStore<T>) -> Self {
		Self { store }
	}
}

impl<'a, T: Clone + Eq + Hash + Ord + EndOfSequence> MaximumLikelihood<'a, T> {
	/// Generates a sentence ending with the end-of-sequence token.
	///
	/// See [`SentenceSampler::generate`]. Lengths `1..=length` (and 2 when
	/// `proper_prefix` is set) must be materialized, for instance with
	/// [`SentenceSampler::prepare`].
	pub fn generate_sentence<R: Rng>(
		&self,
		sampler: &mut SentenceSampler<R>,
		length: usize,
		proper_prefix: bool,
	) -> Result<Vec<T>> {
		sampler.generate(self, length, proper_prefix)
	}
}

impl<'a, T: Clone + Eq + Hash> LanguageModel<T> for MaximumLikelihood<'a, T> {
	fn name(&self) -> &'static str {
		"maximum-likelihood"
	}

	fn store(&self) -> &NgramStore<T> {
		self.store
	}

	fn ngram_probability(&self, ngram: &[T]) -> Result<f64> {
		let count = self.store.checked_count(ngram)?;
		Ok(count as f64 / unigram_total(self.store)?)
	}

	fn probability_given(&self, given: &[T], next: &[T]) -> Result<f64> {
		if given.is_empty() {
			return self.ngram_probability(next);
		}

		let full_count = self.store.checked_count(&join(given, next))?;
		let given_count = self.store.checked_count(given)?;
		// Unseen sentence or unseen context: probability 0
		if full_count == 0 || given_count == 0 {
			return Ok(0.0);
		}
		Ok(full_count as f64 / given_count as f64)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::NgramError;
	use crate::model::store::LengthSpec;
	use crate::model::token::Token;

	fn store() -> NgramStore<Token<String>> {
		NgramStore::new(Token::parse_all("the cat sat <END> the dog sat <END>"), &LengthSpec::UpTo(2)).unwrap()
	}

	#[test]
	fn unigram_is_relative_frequency() {
		let store = store();
		let model = MaximumLikelihood::new(&store);
		assert_eq!(model.ngram_probability(&Token::parse_all("the")).unwrap(), 2.0 / 8.0);
		assert_eq!(model.ngram_probability(&Token::parse_all("bird")).unwrap(), 0.0);
	}

	#[test]
	fn bigram_scenario() {
		let store = store();
		let model = MaximumLikelihood::new(&store);
		assert_eq!(model.ngram_probability(&Token::parse_all("sat <END>")).unwrap(), 0.25);
	}

	#[test]
	fn conditional_probability() {
		let store = store();
		let model = MaximumLikelihood::new(&store);
		let the = Token::parse_all("the");
		assert_eq!(model.probability_given(&the, &Token::parse_all("cat")).unwrap(), 0.5);
		assert_eq!(model.probability_given(&the, &Token::parse_all("sat")).unwrap(), 0.0);
		// Unseen context is a defined zero, not an error
		assert_eq!(model.probability_given(&Token::parse_all("bird"), &the).unwrap(), 0.0);
	}

	#[test]
	fn sentence_probability_chains_conditionals() {
		let store = store();
		let model = MaximumLikelihood::new(&store);
		let sentence = Token::parse_all("the cat sat <END>");
		// P(the) * P(cat|the) * P(sat|cat) * P(<END>|sat)
		let expected: f64 = 0.25 * 0.5 * 1.0 * 1.0;
		assert!((model.sentence_probability(2, &sentence).unwrap() - expected).abs() < 1e-12);
		let log = model.log_sentence_probability(2, &sentence).unwrap();
		assert!((log - expected.ln()).abs() < 1e-12);
	}

	#[test]
	fn unigram_sentence_scores_tokens_independently() {
		let store = store();
		let model = MaximumLikelihood::new(&store);
		let sentence = Token::parse_all("cat dog");
		let expected: f64 = (1.0 / 8.0) * (1.0 / 8.0);
		assert!((model.sentence_probability(1, &sentence).unwrap() - expected).abs() < 1e-12);
	}

	#[test]
	fn log_of_impossible_sentence_is_reported() {
		let store = store();
		let model = MaximumLikelihood::new(&store);
		let sentence = Token::parse_all("the sat");
		assert_eq!(model.sentence_probability(2, &sentence).unwrap(), 0.0);
		assert!(matches!(
			model.log_sentence_probability(2, &sentence),
			Err(NgramError::LogOfNonPositive { .. })
		));
	}

	#[test]
	fn unmaterialized_context_length_is_reported() {
		let store = store();
		let model = MaximumLikelihood::new(&store);
		let sentence = Token::parse_all("the cat sat");
		assert!(matches!(
			model.sentence_probability(3, &sentence),
			Err(NgramError::UnmaterializedLength { length: 3 })
		));
		assert!(model.sentence_probability(0, &sentence).is_err());
	}

	#[test]
	fn empty_sentence_has_probability_one() {
		let store = store();
		let model = MaximumLikelihood::new(&store);
		assert_eq!(model.sentence_probability(2, &[]).unwrap(), 1.0);
		assert_eq!(model.log_sentence_probability(2, &[]).unwrap(), 0.0);
	}

	#[test]
	fn empty_corpus_has_no_denominator() {
		let store = NgramStore::<Token<String>>::new(Vec::new(), &LengthSpec::UpTo(1)).unwrap();
		let model = MaximumLikelihood::new(&store);
		assert!(matches!(
			model.ngram_probability(&Token::parse_all("the")),
			Err(NgramError::ZeroContext { .. })
		));
	}
}

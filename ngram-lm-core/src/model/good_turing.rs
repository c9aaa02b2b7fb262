use std::collections::BTreeMap;
use std::hash::Hash;

use log::debug;

use crate::error::{NgramError, Result};
use crate::model::language_model::{LanguageModel, join, unigram_total};
use crate::model::store::NgramStore;

/// Frequency of frequencies for one n-gram length.
///
/// Maps an occurrence count `c` to `N_c`, the number of distinct n-grams
/// that occur exactly `c` times.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrequencyDistribution {
	buckets: BTreeMap<usize, usize>,
}

impl FrequencyDistribution {
	/// Tallies the given occurrence counts.
	pub fn from_counts<I: IntoIterator<Item = usize>>(counts: I) -> Self {
		let mut buckets = BTreeMap::new();
		for count in counts {
			*buckets.entry(count).or_insert(0) += 1;
		}
		Self { buckets }
	}

	/// `N_c`, or `None` if no n-gram occurs exactly `count` times.
	pub fn get(&self, count: usize) -> Option<usize> {
		self.buckets.get(&count).copied()
	}

	/// Iterates `(c, N_c)` pairs by increasing `c`.
	pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
		self.buckets.iter().map(|(c, n)| (*c, *n))
	}
}

/// Smoothed probability per occurrence count, for counts below the threshold.
///
/// Entry 0 holds the mass of an unseen n-gram.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SmoothedTable {
	probabilities: BTreeMap<usize, f64>,
}

impl SmoothedTable {
	/// Smoothed probability of an n-gram seen `count` times.
	pub fn get(&self, count: usize) -> Option<f64> {
		self.probabilities.get(&count).copied()
	}

	/// Iterates `(c, P[c])` pairs by increasing `c`.
	pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
		self.probabilities.iter().map(|(c, p)| (*c, *p))
	}

	/// Returns `true` when no smoothing is applied (threshold 0).
	pub fn is_empty(&self) -> bool {
		self.probabilities.is_empty()
	}
}

/// Good-Turing language model.
///
/// Two regimes, keyed by the raw count `c` of an n-gram:
/// - `c >= threshold`: maximum likelihood, `c / num_windows(1)`
/// - `c < threshold`: the precomputed smoothed probability `P[c]`
///
/// # Lifecycle
/// Frequency distributions are built for every materialized length on
/// construction. Smoothed tables must be built with
/// [`build_smoothed_table`](Self::build_smoothed_table) before a length
/// is queried; changing the threshold discards them.
#[derive(Clone, Debug)]
pub struct GoodTuring<'a, T> {
	store: &'a NgramStore<T>,

	/// Counts strictly below this value use the smoothed table.
	threshold: usize,

	/// Vocabulary size used to spread unseen mass over possible n-grams.
	vocabulary_size: usize,

	/// Length -> frequency of frequencies.
	frequencies: BTreeMap<usize, FrequencyDistribution>,

	/// Length -> smoothed probabilities.
	smoothed: BTreeMap<usize, SmoothedTable>,
}

impl<'a, T: Clone + Eq + Hash> GoodTuring<'a, T> {
	/// Creates a model and builds the frequency distribution of every
	/// length materialized in `store`.
	pub fn new(store: &'a NgramStore<T>, threshold: usize, vocabulary_size: usize) -> Self {
		let frequencies = store
			.lengths()
			.filter_map(|length| store.table(length).ok().map(|table| (length, table)))
			.map(|(length, table)| (length, FrequencyDistribution::from_counts(table.values().copied())))
			.collect();
		Self {
			store,
			threshold,
			vocabulary_size,
			frequencies,
			smoothed: BTreeMap::new(),
		}
	}

	/// Creates a model and builds the smoothed table of every materialized length.
	///
	/// # Errors
	/// See [`build_smoothed_table`](Self::build_smoothed_table).
	pub fn with_smoothed_tables(store: &'a NgramStore<T>, threshold: usize, vocabulary_size: usize) -> Result<Self> {
		let mut model = Self::new(store, threshold, vocabulary_size);
		model.build_smoothed_tables()?;
		Ok(model)
	}

	pub fn threshold(&self) -> usize {
		self.threshold
	}

	/// Sets the threshold and discards every smoothed table.
	pub fn set_threshold(&mut self, threshold: usize) {
		self.threshold = threshold;
		self.smoothed.clear();
	}

	pub fn vocabulary_size(&self) -> usize {
		self.vocabulary_size
	}

	pub fn set_vocabulary_size(&mut self, vocabulary_size: usize) {
		self.vocabulary_size = vocabulary_size;
	}

	/// Frequency of frequencies of `length`, if built.
	pub fn frequency_distribution(&self, length: usize) -> Option<&FrequencyDistribution> {
		self.frequencies.get(&length)
	}

	/// Smoothed table of `length`, if built.
	pub fn smoothed_table(&self, length: usize) -> Option<&SmoothedTable> {
		self.smoothed.get(&length)
	}

	/// Builds the smoothed table of every materialized length.
	///
	/// # Errors
	/// Stops at the first length whose table cannot be built.
	pub fn build_smoothed_tables(&mut self) -> Result<()> {
		let lengths: Vec<usize> = self.store.lengths().collect();
		for length in lengths {
			self.build_smoothed_table(length)?;
		}
		Ok(())
	}

	/// Builds the smoothed probabilities of `length`.
	///
	/// - `P[0] = N_1 / num_windows(1)`
	/// - `P[c] = (1 - P[0]) · (c + 1) · N_{c+1} / (num_windows(1) · N_c)`
	///   for `1 <= c < threshold`
	///
	/// With a threshold of 0 the table is empty and every query falls
	/// through to maximum likelihood.
	///
	/// # Errors
	/// - `UnmaterializedLength` if `length` is not in the store.
	/// - `UndefinedSmoothing` if `N_1` or any `N_c` for `c` in
	///   `1..=threshold` is missing.
	pub fn build_smoothed_table(&mut self, length: usize) -> Result<()> {
		let table = self.store.table(length)?;
		let distribution = self
			.frequencies
			.entry(length)
			.or_insert_with(|| FrequencyDistribution::from_counts(table.values().copied()));

		let mut probabilities = BTreeMap::new();
		if self.threshold == 0 {
			self.smoothed.insert(length, SmoothedTable { probabilities });
			return Ok(());
		}

		let bucket = |count: usize| {
			distribution
				.get(count)
				.map(|n| n as f64)
				.ok_or(NgramError::UndefinedSmoothing { length, bucket: count })
		};

		let n1 = bucket(1)?;
		let total = unigram_total(self.store)?;
		let unseen = n1 / total;
		let normalization = 1.0 - unseen;
		probabilities.insert(0, unseen);

		for count in 1..self.threshold {
			let current = bucket(count)?;
			let next = bucket(count + 1)?;
			let probability = ((count + 1) as f64 * next) / (total * current);
			probabilities.insert(count, probability * normalization);
		}

		debug!(
			"good-turing table for length {} built: threshold {}, unseen mass {}",
			length, self.threshold, unseen
		);
		self.smoothed.insert(length, SmoothedTable { probabilities });
		Ok(())
	}

	/// Share of the unseen mass given to each possible unseen n-gram of
	/// `length`: `P[0] / max(1, V^k - distinct)`.
	///
	/// When `V^k` does not exceed the number of distinct n-grams (for
	/// instance `V` left to the observed vocabulary with `length == 1`),
	/// no n-gram is left unseen and the whole `P[0]` is returned. Pass the
	/// size of the full vocabulary to get a per-n-gram share.
	///
	/// # Errors
	/// Returns `MissingSmoothedTable` if the table of `length` was not built.
	pub fn unseen_ngram_probability(&self, length: usize) -> Result<f64> {
		let table = self
			.smoothed
			.get(&length)
			.ok_or(NgramError::MissingSmoothedTable { length })?;
		let unseen_mass = table.get(0).unwrap_or(0.0);
		let possible = (self.vocabulary_size as f64).powi(length as i32);
		let unseen = (possible - self.store.num_distinct(length)? as f64).max(1.0);
		Ok(unseen_mass / unseen)
	}
}

impl<'a, T: Clone + Eq + Hash> LanguageModel<T> for GoodTuring<'a, T> {
	fn name(&self) -> &'static str {
		"good-turing"
	}

	fn store(&self) -> &NgramStore<T> {
		self.store
	}

	fn ngram_probability(&self, ngram: &[T]) -> Result<f64> {
		let count = self.store.checked_count(ngram)?;
		if count >= self.threshold {
			return Ok(count as f64 / unigram_total(self.store)?);
		}

		let length = ngram.len();
		self.smoothed
			.get(&length)
			.and_then(|table| table.get(count))
			.ok_or(NgramError::MissingSmoothedTable { length })
	}

	fn probability_given(&self, given: &[T], next: &[T]) -> Result<f64> {
		if given.is_empty() {
			return self.ngram_probability(next);
		}

		let full = join(given, next);
		let full_count = self.store.checked_count(&full)?;

		if full_count < self.threshold {
			let given_probability = self.ngram_probability(given)?;
			if given_probability <= 0.0 {
				return Err(NgramError::ZeroContext { length: given.len() });
			}
			return Ok(self.ngram_probability(&full)? / given_probability);
		}

		match self.store.checked_count(given)? {
			0 => Err(NgramError::ZeroContext { length: given.len() }),
			given_count => Ok(full_count as f64 / given_count as f64),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::store::LengthSpec;
	use crate::model::token::Token;

	// unigrams: a=3 b=2 c=1 d=1 -> N1=2 N2=1 N3=1
	// bigrams: ab=2 ba=1 ac=1 ca=1 bd=1 -> N1=4 N2=1
	fn store() -> NgramStore<Token<String>> {
		NgramStore::new(Token::parse_all("a b a c a b d"), &LengthSpec::UpTo(2)).unwrap()
	}

	fn close(a: f64, b: f64) -> bool {
		(a - b).abs() < 1e-12
	}

	#[test]
	fn frequency_distribution_counts_buckets() {
		let store = store();
		let model = GoodTuring::new(&store, 3, 4);
		let unigrams = model.frequency_distribution(1).unwrap();
		assert_eq!(unigrams.iter().collect::<Vec<_>>(), vec![(1, 2), (2, 1), (3, 1)]);
		let bigrams = model.frequency_distribution(2).unwrap();
		assert_eq!(bigrams.get(1), Some(4));
		assert_eq!(bigrams.get(3), None);
	}

	#[test]
	fn smoothed_table_values() {
		let store = store();
		let mut model = GoodTuring::new(&store, 3, 4);
		model.build_smoothed_table(1).unwrap();
		let table = model.smoothed_table(1).unwrap();
		assert!(close(table.get(0).unwrap(), 2.0 / 7.0));
		assert!(close(table.get(1).unwrap(), 5.0 / 49.0));
		assert!(close(table.get(2).unwrap(), 15.0 / 49.0));
		assert_eq!(table.get(3), None);
	}

	#[test]
	fn two_regimes() {
		let store = store();
		let model = GoodTuring::with_smoothed_tables(&store, 2, 4).unwrap();
		// a occurs 3 times: maximum likelihood
		assert!(close(model.ngram_probability(&Token::parse_all("a")).unwrap(), 3.0 / 7.0));
		// c occurs once: smoothed
		assert!(close(model.ngram_probability(&Token::parse_all("c")).unwrap(), 5.0 / 49.0));
		// unseen: P[0]
		assert!(close(model.ngram_probability(&Token::parse_all("z")).unwrap(), 2.0 / 7.0));
		assert!(close(model.ngram_probability(&Token::parse_all("c a")).unwrap(), 3.0 / 98.0));
	}

	#[test]
	fn mass_is_conserved_below_threshold() {
		let store = store();
		let model = GoodTuring::with_smoothed_tables(&store, 2, 4).unwrap();
		for length in 1..=2 {
			let distribution = model.frequency_distribution(length).unwrap();
			let table = model.smoothed_table(length).unwrap();
			let unseen = table.get(0).unwrap();
			assert!(unseen > 0.0 && unseen < 1.0);
			let mass: f64 = unseen
				+ table
					.iter()
					.filter(|(c, _)| *c > 0)
					.map(|(c, p)| distribution.get(c).unwrap() as f64 * p)
					.sum::<f64>();
			assert!(mass <= 1.0 + 1e-12);
		}
	}

	#[test]
	fn missing_bucket_is_reported() {
		let store = store();
		let mut model = GoodTuring::new(&store, 4, 4);
		assert!(matches!(
			model.build_smoothed_table(1),
			Err(NgramError::UndefinedSmoothing { length: 1, bucket: 4 })
		));
		model.set_threshold(3);
		assert!(matches!(
			model.build_smoothed_tables(),
			Err(NgramError::UndefinedSmoothing { length: 2, bucket: 3 })
		));
	}

	#[test]
	fn missing_singletons_are_reported() {
		let store = NgramStore::new(Token::parse_all("a a b b"), &LengthSpec::UpTo(1)).unwrap();
		let mut model = GoodTuring::new(&store, 1, 2);
		assert!(matches!(
			model.build_smoothed_table(1),
			Err(NgramError::UndefinedSmoothing { length: 1, bucket: 1 })
		));
	}

	#[test]
	fn zero_threshold_is_maximum_likelihood() {
		let store = NgramStore::new(Token::parse_all("a a b b"), &LengthSpec::UpTo(2)).unwrap();
		let model = GoodTuring::with_smoothed_tables(&store, 0, 2).unwrap();
		assert!(model.smoothed_table(1).unwrap().is_empty());
		assert!(close(model.ngram_probability(&Token::parse_all("a")).unwrap(), 0.5));
		assert!(close(model.probability_given(&Token::parse_all("a"), &Token::parse_all("b")).unwrap(), 0.5));
		assert!(matches!(
			model.probability_given(&Token::parse_all("z"), &Token::parse_all("a")),
			Err(NgramError::ZeroContext { length: 1 })
		));
	}

	#[test]
	fn unbuilt_table_is_reported() {
		let store = store();
		let model = GoodTuring::new(&store, 2, 4);
		assert!(matches!(
			model.ngram_probability(&Token::parse_all("c")),
			Err(NgramError::MissingSmoothedTable { length: 1 })
		));
		// At or above the threshold no table is needed
		assert!(model.ngram_probability(&Token::parse_all("a")).is_ok());
	}

	#[test]
	fn threshold_change_discards_tables() {
		let store = store();
		let mut model = GoodTuring::with_smoothed_tables(&store, 2, 4).unwrap();
		model.set_threshold(3);
		assert!(model.smoothed_table(1).is_none());
	}

	#[test]
	fn given_probability_regimes() {
		let store = store();
		let model = GoodTuring::with_smoothed_tables(&store, 2, 4).unwrap();
		let a = Token::parse_all("a");
		// "a b" seen twice: count ratio
		assert!(close(model.probability_given(&a, &Token::parse_all("b")).unwrap(), 2.0 / 3.0));
		// "a c" seen once: P(a c) / P(a)
		assert!(close(
			model.probability_given(&a, &Token::parse_all("c")).unwrap(),
			(3.0 / 98.0) / (3.0 / 7.0)
		));
	}

	#[test]
	fn sentence_probability_first_token_unconditional() {
		let store = store();
		let model = GoodTuring::with_smoothed_tables(&store, 2, 4).unwrap();
		let sentence = Token::parse_all("a b");
		let expected: f64 = (3.0 / 7.0) * (2.0 / 3.0);
		assert!(close(model.sentence_probability(2, &sentence).unwrap(), expected));
		assert!(close(model.log_sentence_probability(2, &sentence).unwrap(), expected.ln()));
	}

	#[test]
	fn length_one_scores_independently() {
		let store = store();
		let model = GoodTuring::with_smoothed_tables(&store, 2, 4).unwrap();
		let sentence = Token::parse_all("a c");
		let expected: f64 = (3.0 / 7.0) * (5.0 / 49.0);
		assert!(close(model.log_sentence_probability(1, &sentence).unwrap(), expected.ln()));
		assert!(close(model.sentence_probability(1, &sentence).unwrap(), expected));
	}

	#[test]
	fn unseen_mass_is_spread_over_vocabulary() {
		let store = store();
		let model = GoodTuring::with_smoothed_tables(&store, 2, 4).unwrap();
		// 4^2 possible bigrams, 5 seen
		assert!(close(model.unseen_ngram_probability(2).unwrap(), (4.0 / 7.0) / 11.0));
		assert!(model.unseen_ngram_probability(3).is_err());
	}

	#[test]
	fn observed_vocabulary_leaves_no_unseen_unigram() {
		let store = store();
		let unseen_mass = 2.0 / 7.0;

		let observed = GoodTuring::with_smoothed_tables(&store, 2, 4).unwrap();
		assert!(close(observed.unseen_ngram_probability(1).unwrap(), unseen_mass));

		let full = GoodTuring::with_smoothed_tables(&store, 2, 1000).unwrap();
		assert!(close(full.unseen_ngram_probability(1).unwrap(), unseen_mass / 996.0));
	}
}

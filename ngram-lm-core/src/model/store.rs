use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{NgramError, Result};

/// The set of n-gram lengths to materialize.
///
/// # Variants
/// - `UpTo(n)`: every length from 1 to `n` inclusive.
/// - `Range { low, high }`: every length from `low` to `high` inclusive.
/// - `Set(lengths)`: exactly the given lengths.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum LengthSpec {
	UpTo(usize),
	Range { low: usize, high: usize },
	Set(Vec<usize>),
}

impl LengthSpec {
	/// Returns the requested lengths, sorted and deduplicated.
	///
	/// # Errors
	/// - `InvalidLength` if any requested length is 0.
	/// - `InvalidParameter` if a range has `low > high`.
	pub fn lengths(&self) -> Result<Vec<usize>> {
		let mut lengths = match self {
			LengthSpec::UpTo(n) => {
				if *n == 0 {
					return Err(NgramError::InvalidLength { length: 0 });
				}
				(1..=*n).collect::<Vec<_>>()
			}
			LengthSpec::Range { low, high } => {
				if *low == 0 {
					return Err(NgramError::InvalidLength { length: 0 });
				}
				if low > high {
					return Err(NgramError::invalid_parameter(
						"range",
						format!("low bound {low} is greater than high bound {high}"),
					));
				}
				(*low..=*high).collect()
			}
			LengthSpec::Set(lengths) => lengths.clone(),
		};
		if let Some(&length) = lengths.iter().find(|&&l| l == 0) {
			return Err(NgramError::InvalidLength { length });
		}
		lengths.sort_unstable();
		lengths.dedup();
		Ok(lengths)
	}
}

/// Exact counts of every contiguous token window, for a set of lengths.
///
/// # Responsibilities
/// - Own the token sequence the counts were built from
/// - Materialize one count table per requested length, lazily and idempotently
/// - Answer count, presence and cross-store comparison queries
///
/// # Invariants
/// - `tokens` never changes after construction
/// - For every materialized length `L`, `tables[L]` holds every window of
///   length `L` of `tokens` with its number of occurrences, and the counts
///   sum to `num_windows(L)`
/// - Length 0 is never materialized
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(bound(
	serialize = "T: Serialize",
	deserialize = "T: Deserialize<'de> + Eq + Hash"
))]
pub struct NgramStore<T> {
	/// The sequence the store was built from.
	tokens: Vec<T>,

	/// Length -> (n-gram -> occurrences). Only requested lengths are present.
	tables: BTreeMap<usize, HashMap<Vec<T>, usize>>,
}

impl<T: Clone + Eq + Hash> NgramStore<T> {
	/// Creates a store over `tokens` and materializes the lengths of `spec`.
	///
	/// # Errors
	/// Returns an error if `spec` is invalid (see [`LengthSpec::lengths`]).
	pub fn new(tokens: Vec<T>, spec: &LengthSpec) -> Result<Self> {
		let lengths = spec.lengths()?;
		let mut store = Self { tokens, tables: BTreeMap::new() };
		store.materialize(&lengths)?;
		Ok(store)
	}

	/// Materializes the count tables of `lengths`.
	///
	/// Lengths that are already materialized are skipped. All new lengths
	/// are counted together in a single scan of the token sequence; windows
	/// running past the end of the sequence are ignored (no padding).
	///
	/// # Errors
	/// Returns `InvalidLength` if any length is 0. In that case no table is
	/// created.
	pub fn materialize(&mut self, lengths: &[usize]) -> Result<()> {
		if let Some(&length) = lengths.iter().find(|&&l| l == 0) {
			return Err(NgramError::InvalidLength { length });
		}

		let mut pending: Vec<usize> = lengths
			.iter()
			.copied()
			.filter(|l| !self.tables.contains_key(l))
			.collect();
		pending.sort_unstable();
		pending.dedup();
		if pending.is_empty() {
			return Ok(());
		}

		debug!("materializing n-gram lengths {:?} over {} tokens", pending, self.tokens.len());

		let mut fresh: Vec<(usize, HashMap<Vec<T>, usize>)> =
			pending.iter().map(|&length| (length, HashMap::new())).collect();

		let num_tokens = self.tokens.len();
		for start in 0..num_tokens {
			// Lengths are sorted, so the first one out of bounds ends this position
			for (length, table) in fresh.iter_mut() {
				let end = start + *length;
				if end > num_tokens {
					break;
				}
				let window = &self.tokens[start..end];
				match table.get_mut(window) {
					Some(count) => *count += 1,
					None => {
						table.insert(window.to_vec(), 1);
					}
				}
			}
		}

		for (length, table) in fresh {
			debug!("length {} materialized with {} distinct n-grams", length, table.len());
			self.tables.insert(length, table);
		}
		Ok(())
	}

	/// Materializes every length from 1 to `n` inclusive.
	///
	/// # Errors
	/// Returns `InvalidLength` if `n` is 0.
	pub fn materialize_up_to(&mut self, n: usize) -> Result<()> {
		if n == 0 {
			return Err(NgramError::InvalidLength { length: 0 });
		}
		let lengths: Vec<usize> = (1..=n).collect();
		self.materialize(&lengths)
	}

	/// Returns `true` if the table of `length` has been materialized.
	///
	/// # Errors
	/// Returns `InvalidLength` if `length` is 0.
	pub fn is_materialized(&self, length: usize) -> Result<bool> {
		if length == 0 {
			return Err(NgramError::InvalidLength { length });
		}
		Ok(self.tables.contains_key(&length))
	}

	/// Returns the count table of `length`.
	///
	/// # Errors
	/// - `InvalidLength` if `length` is 0.
	/// - `UnmaterializedLength` if the table was never materialized.
	pub fn table(&self, length: usize) -> Result<&HashMap<Vec<T>, usize>> {
		if length == 0 {
			return Err(NgramError::InvalidLength { length });
		}
		self.tables.get(&length).ok_or(NgramError::UnmaterializedLength { length })
	}

	/// Returns the occurrences of `ngram`.
	///
	/// Returns 0 if the n-gram is absent, empty, or if its length was never
	/// materialized. No materialization happens here.
	pub fn count(&self, ngram: &[T]) -> usize {
		self.tables
			.get(&ngram.len())
			.and_then(|table| table.get(ngram))
			.copied()
			.unwrap_or(0)
	}

	/// Returns the occurrences of `ngram`, refusing lengths it cannot answer.
	///
	/// # Errors
	/// - `InvalidLength` if `ngram` is empty.
	/// - `UnmaterializedLength` if its length was never materialized.
	pub fn checked_count(&self, ngram: &[T]) -> Result<usize> {
		Ok(self.table(ngram.len())?.get(ngram).copied().unwrap_or(0))
	}

	/// Returns `true` if `ngram` occurs at least once.
	pub fn contains(&self, ngram: &[T]) -> bool {
		self.count(ngram) > 0
	}

	/// Number of windows of `length` in the token sequence, counting
	/// repetitions: `max(0, num_tokens - length + 1)`.
	///
	/// This does not depend on materialization. Length 0 has no windows.
	pub fn num_windows(&self, length: usize) -> usize {
		if length == 0 {
			return 0;
		}
		(self.tokens.len() + 1).saturating_sub(length)
	}

	/// Number of distinct n-grams of `length`.
	///
	/// # Errors
	/// - `InvalidLength` if `length` is 0.
	/// - `UnmaterializedLength` if the table was never materialized.
	pub fn num_distinct(&self, length: usize) -> Result<usize> {
		Ok(self.table(length)?.len())
	}

	/// Number of distinct n-grams of `length` that also occur in `other`.
	///
	/// # Errors
	/// Returns an error if `length` is not materialized in both stores.
	pub fn num_common(&self, length: usize, other: &Self) -> Result<usize> {
		let table = self.table(length)?;
		other.table(length)?;
		Ok(table.keys().filter(|ngram| other.contains(ngram)).count())
	}

	/// Returns the distinct n-grams of `length` that also occur in `other`.
	///
	/// Keys are compared by content only; counts may differ between stores.
	/// The order of the returned n-grams is unspecified.
	///
	/// # Errors
	/// Returns an error if `length` is not materialized in both stores.
	pub fn find_common(&self, length: usize, other: &Self) -> Result<Vec<&[T]>> {
		let table = self.table(length)?;
		other.table(length)?;
		Ok(table
			.keys()
			.filter(|ngram| other.contains(ngram))
			.map(|ngram| ngram.as_slice())
			.collect())
	}

	/// Checks whether every trailing window of `sequence` occurs in the store.
	///
	/// For each position `i`, the window ending at `i` has length
	/// `min(i + 1, length)`. Returns `false` at the first missing window.
	/// An empty sequence is trivially contained.
	///
	/// # Errors
	/// - `InvalidLength` if `length` is 0.
	/// - `UnmaterializedLength` if a window length that must be checked
	///   was never materialized.
	pub fn contains_sequence(&self, length: usize, sequence: &[T]) -> Result<bool> {
		if length == 0 {
			return Err(NgramError::InvalidLength { length });
		}
		for end in 1..=sequence.len() {
			let window = &sequence[end.saturating_sub(length)..end];
			if !self.table(window.len())?.contains_key(window) {
				return Ok(false);
			}
		}
		Ok(true)
	}

	/// The tokens the store was built from.
	pub fn tokens(&self) -> &[T] {
		&self.tokens
	}

	/// Number of tokens the store was built from.
	pub fn num_tokens(&self) -> usize {
		self.tokens.len()
	}

	/// Materialized lengths, in increasing order.
	pub fn lengths(&self) -> impl Iterator<Item = usize> + '_ {
		self.tables.keys().copied()
	}

	/// Number of materialized lengths.
	pub fn num_lengths(&self) -> usize {
		self.tables.len()
	}
}

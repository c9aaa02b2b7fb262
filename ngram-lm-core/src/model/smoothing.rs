use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::error::{NgramError, Result};
use crate::model::add_delta::AddDelta;
use crate::model::good_turing::GoodTuring;
use crate::model::language_model::LanguageModel;
use crate::model::maximum_likelihood::MaximumLikelihood;
use crate::model::store::NgramStore;

/// Pseudocount used when add-delta is requested without one (Laplace).
pub const DEFAULT_DELTA: f64 = 1.0;

/// Good-Turing threshold used when none is given.
pub const DEFAULT_THRESHOLD: usize = 5;

/// Smoothing strategy and its parameters.
///
/// # Variants
/// - `MaximumLikelihood`: raw relative frequencies.
/// - `AddDelta { delta }`: add-delta smoothing, `delta > 0`.
/// - `GoodTuring { threshold, vocabulary_size }`: Good-Turing below
///   `threshold`; a `vocabulary_size` of 0 means "number of distinct words".
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum Smoothing {
	#[default]
	MaximumLikelihood,
	AddDelta { delta: f64 },
	GoodTuring { threshold: usize, vocabulary_size: usize },
}

impl Smoothing {
	/// Builds a strategy from its name and optional parameters.
	///
	/// Accepted names: `ml` / `maximum-likelihood`, `ad` / `add-delta`,
	/// `gt` / `good-turing` (case-insensitive). Missing parameters use
	/// [`DEFAULT_DELTA`] and [`DEFAULT_THRESHOLD`].
	///
	/// # Errors
	/// Returns `InvalidParameter` for an unknown name or an invalid value.
	pub fn from_parts(
		name: &str,
		delta: Option<f64>,
		threshold: Option<usize>,
		vocabulary_size: Option<usize>,
	) -> Result<Self> {
		let smoothing = match name.trim().to_lowercase().as_str() {
			"ml" | "maximum-likelihood" => Smoothing::MaximumLikelihood,
			"ad" | "add-delta" => Smoothing::AddDelta {
				delta: delta.unwrap_or(DEFAULT_DELTA),
			},
			"gt" | "good-turing" => Smoothing::GoodTuring {
				threshold: threshold.unwrap_or(DEFAULT_THRESHOLD),
				vocabulary_size: vocabulary_size.unwrap_or(0),
			},
			other => {
				return Err(NgramError::invalid_parameter(
					"smoothing",
					format!("unknown strategy '{other}', expected ml, ad or gt"),
				));
			}
		};
		smoothing.validate()?;
		Ok(smoothing)
	}

	/// Checks the parameters without building anything.
	pub fn validate(&self) -> Result<()> {
		match self {
			Smoothing::AddDelta { delta } if !delta.is_finite() || *delta <= 0.0 => Err(
				NgramError::invalid_parameter("delta", format!("must be a positive finite number, got {delta}")),
			),
			_ => Ok(()),
		}
	}

	/// Builds the model over `store`.
	///
	/// Good-Turing smoothed tables are built for every materialized length.
	///
	/// # Errors
	/// Returns any parameter or smoothing error.
	pub fn build<'a, T>(&self, store: &'a NgramStore<T>) -> Result<Box<dyn LanguageModel<T> + 'a>>
	where
		T: Clone + Eq + Hash + 'a,
	{
		let lengths: Vec<usize> = store.lengths().collect();
		self.build_for(store, &lengths)
	}

	/// Builds the model over `store` for queries on `lengths` only.
	///
	/// Good-Turing smoothed tables are built for `lengths` alone, so a
	/// length whose counts cannot be smoothed does not block the others.
	/// The other strategies ignore `lengths`.
	///
	/// # Errors
	/// Returns any parameter or smoothing error.
	pub fn build_for<'a, T>(&self, store: &'a NgramStore<T>, lengths: &[usize]) -> Result<Box<dyn LanguageModel<T> + 'a>>
	where
		T: Clone + Eq + Hash + 'a,
	{
		Ok(match self {
			Smoothing::MaximumLikelihood => Box::new(MaximumLikelihood::new(store)),
			Smoothing::AddDelta { delta } => Box::new(AddDelta::new(store, *delta)?),
			Smoothing::GoodTuring { threshold, vocabulary_size } => {
				let vocabulary_size = match vocabulary_size {
					0 => store.num_distinct(1).unwrap_or(0),
					v => *v,
				};
				let mut model = GoodTuring::new(store, *threshold, vocabulary_size);
				for &length in lengths {
					model.build_smoothed_table(length)?;
				}
				Box::new(model)
			}
		})
	}
}

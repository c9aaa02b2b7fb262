//! Error types for n-gram counting, estimation and generation.
//!
//! Every failure is reported as a typed value: nothing is coerced to 0, NaN
//! or an arbitrary index. The only zero results produced without an error
//! are the defined fallbacks (maximum likelihood on an unseen context).

use thiserror::Error;

/// Result type alias for n-gram operations.
pub type Result<T> = std::result::Result<T, NgramError>;

/// Errors that can occur while counting, estimating or sampling n-grams.
#[derive(Debug, Error)]
pub enum NgramError {
	/// An n-gram length of zero was requested.
	#[error("invalid n-gram length: {length} (must be >= 1)")]
	InvalidLength { length: usize },

	/// The operation needs a length table that was never materialized.
	#[error("n-gram length {length} has not been materialized")]
	UnmaterializedLength { length: usize },

	/// Good-Turing needs a frequency-of-frequency bucket that was never observed.
	#[error("good-turing smoothing undefined for length {length}: no n-gram occurs exactly {bucket} time(s)")]
	UndefinedSmoothing { length: usize, bucket: usize },

	/// Good-Turing was queried at a length whose smoothed table was not built.
	#[error("no smoothed probability table built for length {length}")]
	MissingSmoothedTable { length: usize },

	/// A conditional probability has a zero denominator.
	#[error("context of length {length} has zero probability")]
	ZeroContext { length: usize },

	/// No token can follow the current context.
	#[error("empty distribution: no continuation for a context of length {context_length}")]
	EmptyDistribution { context_length: usize },

	/// A logarithm was requested for a zero or negative probability.
	#[error("cannot take the log of non-positive probability {probability}")]
	LogOfNonPositive { probability: f64 },

	/// A configuration value is outside its valid range.
	#[error("invalid parameter {name}: {reason}")]
	InvalidParameter { name: &'static str, reason: String },

	/// Generation produced more tokens than the configured limit.
	#[error("generation exceeded {limit} tokens without reaching end of sequence")]
	GenerationLimit { limit: usize },

	/// I/O error during corpus or snapshot access.
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	/// Snapshot encoding or decoding failed.
	#[error("serialization error: {0}")]
	Serialization(String),
}

impl NgramError {
	/// Create a new invalid parameter error.
	#[must_use]
	pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
		Self::InvalidParameter {
			name,
			reason: reason.into(),
		}
	}

	/// Returns `true` when the error was caused by caller input rather than
	/// by the state of the data (used to pick an HTTP status).
	pub fn is_caller_error(&self) -> bool {
		matches!(
			self,
			Self::InvalidLength { .. } | Self::UnmaterializedLength { .. } | Self::InvalidParameter { .. }
		)
	}

	/// Returns `true` when a well-formed query has no answer for this corpus
	/// (impossible sentence, unsmoothable counts, dead-end generation).
	pub fn is_data_error(&self) -> bool {
		matches!(
			self,
			Self::UndefinedSmoothing { .. }
				| Self::MissingSmoothedTable { .. }
				| Self::ZeroContext { .. }
				| Self::EmptyDistribution { .. }
				| Self::LogOfNonPositive { .. }
				| Self::GenerationLimit { .. }
		)
	}
}

impl From<postcard::Error> for NgramError {
	fn from(err: postcard::Error) -> Self {
		Self::Serialization(err.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_error_display_invalid_length() {
		let err = NgramError::InvalidLength { length: 0 };
		assert_eq!(err.to_string(), "invalid n-gram length: 0 (must be >= 1)");
	}

	#[test]
	fn test_error_display_undefined_smoothing() {
		let err = NgramError::UndefinedSmoothing { length: 2, bucket: 3 };
		assert_eq!(
			err.to_string(),
			"good-turing smoothing undefined for length 2: no n-gram occurs exactly 3 time(s)"
		);
	}

	#[test]
	fn test_error_display_invalid_parameter() {
		let err = NgramError::invalid_parameter("delta", "must be positive");
		assert_eq!(err.to_string(), "invalid parameter delta: must be positive");
	}

	#[test]
	fn test_caller_error_classification() {
		assert!(NgramError::InvalidLength { length: 0 }.is_caller_error());
		assert!(NgramError::invalid_parameter("threshold", "x").is_caller_error());
		assert!(!NgramError::ZeroContext { length: 1 }.is_caller_error());
		assert!(!NgramError::EmptyDistribution { context_length: 1 }.is_caller_error());
	}

	#[test]
	fn test_data_error_classification() {
		assert!(NgramError::LogOfNonPositive { probability: 0.0 }.is_data_error());
		assert!(NgramError::ZeroContext { length: 1 }.is_data_error());
		assert!(NgramError::EmptyDistribution { context_length: 2 }.is_data_error());
		assert!(NgramError::UndefinedSmoothing { length: 3, bucket: 2 }.is_data_error());
		assert!(!NgramError::InvalidLength { length: 0 }.is_data_error());
		assert!(!NgramError::Serialization("bad".into()).is_data_error());
		let io_err = std::io::Error::other("disk");
		assert!(!NgramError::from(io_err).is_data_error());
	}

	#[test]
	fn test_io_error_conversion() {
		let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
		let err: NgramError = io_err.into();
		assert!(err.to_string().contains("io error"));
	}
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// Textual spelling of the end-of-sequence sentinel.
pub const EOS_MARKER: &str = "<END>";

/// Token types that carry an end-of-sequence sentinel.
///
/// The sentinel is counted like any other token (so sentence boundaries are
/// learnable) and terminates generation.
pub trait EndOfSequence: Sized {
	/// Returns the end-of-sequence sentinel.
	fn eos() -> Self;

	/// Returns `true` if this token is the end-of-sequence sentinel.
	fn is_eos(&self) -> bool;
}

/// A unit of the modelled language.
///
/// `Eos` is a distinct variant, so it can never collide with a word of the
/// vocabulary, whatever the word type is.
///
/// # Ordering
/// Words sort before `Eos`; words compare with the ordering of `W`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Token<W> {
	Word(W),
	Eos,
}

impl<W> Token<W> {
	/// Returns the word, or `None` for the sentinel.
	pub fn word(&self) -> Option<&W> {
		match self {
			Token::Word(w) => Some(w),
			Token::Eos => None,
		}
	}
}

impl Token<String> {
	/// Parses a single textual token; `<END>` denotes the sentinel.
	pub fn parse(s: &str) -> Self {
		if s == EOS_MARKER {
			Token::Eos
		} else {
			Token::Word(s.to_owned())
		}
	}

	/// Parses whitespace-separated textual tokens.
	pub fn parse_all(s: &str) -> Vec<Self> {
		s.split_whitespace().map(Token::parse).collect()
	}
}

impl<W> EndOfSequence for Token<W> {
	fn eos() -> Self {
		Token::Eos
	}

	fn is_eos(&self) -> bool {
		matches!(self, Token::Eos)
	}
}

impl<W: fmt::Display> fmt::Display for Token<W> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Token::Word(w) => w.fmt(f),
			Token::Eos => f.write_str(EOS_MARKER),
		}
	}
}

impl From<&str> for Token<String> {
	fn from(s: &str) -> Self {
		Token::Word(s.to_owned())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn eos_is_distinct_from_its_spelling() {
		let literal: Token<String> = Token::Word(EOS_MARKER.to_owned());
		assert!(!literal.is_eos());
		assert!(Token::<String>::eos().is_eos());
		assert_ne!(literal, Token::Eos);
	}

	#[test]
	fn parse_recognizes_marker() {
		let tokens = Token::parse_all("the cat <END>");
		assert_eq!(tokens, vec![Token::from("the"), Token::from("cat"), Token::Eos]);
	}

	#[test]
	fn display_round_trips_through_parse() {
		let token = Token::<String>::Eos;
		assert_eq!(Token::parse(&token.to_string()), token);
		assert_eq!(Token::from("dog").to_string(), "dog");
	}

	#[test]
	fn words_sort_before_eos() {
		let mut tokens = vec![Token::Eos, Token::from("b"), Token::from("a")];
		tokens.sort();
		assert_eq!(tokens, vec![Token::from("a"), Token::from("b"), Token::Eos]);
	}
}

use std::fmt;

/// Displays an n-gram as its tokens joined by a single space.
///
/// Borrowing wrapper, so it can be used directly in log and format macros
/// without building an intermediate `String`.
pub struct NgramDisplay<'a, T>(pub &'a [T]);

impl<T: fmt::Display> fmt::Display for NgramDisplay<'_, T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut tokens = self.0.iter();
		if let Some(first) = tokens.next() {
			first.fmt(f)?;
			for token in tokens {
				f.write_str(" ")?;
				token.fmt(f)?;
			}
		}
		Ok(())
	}
}

/// Formats an n-gram as a space-separated string.
pub fn format_ngram<T: fmt::Display>(ngram: &[T]) -> String {
	NgramDisplay(ngram).to_string()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::token::Token;

	#[test]
	fn joins_with_single_space() {
		let ngram = vec![Token::from("sat"), Token::Eos];
		assert_eq!(format_ngram(&ngram), "sat <END>");
	}

	#[test]
	fn empty_ngram_is_empty_string() {
		let ngram: Vec<Token<String>> = Vec::new();
		assert_eq!(format_ngram(&ngram), "");
	}
}

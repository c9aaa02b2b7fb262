use ngram_lm_core::model::{LengthSpec, NgramStore};
use proptest::prelude::*;

fn corpus() -> impl Strategy<Value = Vec<u8>> {
	prop::collection::vec(0u8..4, 0..40)
}

proptest! {
	#[test]
	fn counts_sum_to_window_count(tokens in corpus(), n in 1usize..5) {
		let store = NgramStore::new(tokens.clone(), &LengthSpec::UpTo(n)).unwrap();
		for length in 1..=n {
			let total: usize = store.table(length).unwrap().values().sum();
			prop_assert_eq!(total, store.num_windows(length));
			prop_assert_eq!(store.num_windows(length), (tokens.len() + 1).saturating_sub(length));
		}
	}

	#[test]
	fn every_window_is_counted(tokens in corpus(), length in 1usize..4) {
		let store = NgramStore::new(tokens.clone(), &LengthSpec::UpTo(length)).unwrap();
		for window in tokens.windows(length) {
			let expected = tokens.windows(length).filter(|w| *w == window).count();
			prop_assert_eq!(store.count(window), expected);
		}
		prop_assert!(store.contains_sequence(length, &tokens).unwrap());
	}

	#[test]
	fn materialize_is_idempotent(tokens in corpus(), first in 1usize..4, second in 1usize..4) {
		let mut lazy = NgramStore::new(tokens.clone(), &LengthSpec::Set(vec![first])).unwrap();
		lazy.materialize(&[second]).unwrap();
		lazy.materialize(&[first, second]).unwrap();
		let eager = NgramStore::new(tokens, &LengthSpec::Set(vec![first, second])).unwrap();

		for length in [first, second] {
			prop_assert_eq!(lazy.table(length).unwrap(), eager.table(length).unwrap());
		}
		prop_assert_eq!(lazy.num_lengths(), eager.num_lengths());
	}

	#[test]
	fn common_ngrams_are_symmetric(left in corpus(), right in corpus(), length in 1usize..3) {
		let a = NgramStore::new(left, &LengthSpec::UpTo(length)).unwrap();
		let b = NgramStore::new(right, &LengthSpec::UpTo(length)).unwrap();
		let common = a.num_common(length, &b).unwrap();
		prop_assert_eq!(common, b.num_common(length, &a).unwrap());
		prop_assert_eq!(common, a.find_common(length, &b).unwrap().len());
		prop_assert!(common <= a.num_distinct(length).unwrap().min(b.num_distinct(length).unwrap()));
	}
}

//! Property tests for the text splitter and the fallback embedding.

use docvault_core::chunk::TextSplitter;
use docvault_core::embedding::{fallback_embedding, Embedder};
use proptest::prelude::*;

/// A splitter with `overlap < size`.
fn arb_splitter() -> impl Strategy<Value = TextSplitter> {
    (10usize..120)
        .prop_flat_map(|size| (Just(size), 0..size))
        .prop_map(|(size, overlap)| {
            TextSplitter::builder()
                .chunk_size(size)
                .chunk_overlap(overlap)
                .build()
                .unwrap()
        })
}

/// Sentence-ish text with every separator in the cascade.
fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Zé .\n]{0,600}"
}

/// Distinct tokens joined by separators drawn from the cascade. No token
/// is a substring of another.
fn arb_token_text() -> impl Strategy<Value = (Vec<String>, String)> {
    prop::collection::vec(prop::sample::select(vec!["\n\n", "\n", ". ", " "]), 1..120).prop_map(
        |seps| {
            let tokens: Vec<String> = (0..=seps.len()).map(|i| format!("t{:03}x", i)).collect();
            let mut text = tokens[0].clone();
            for (sep, token) in seps.iter().zip(&tokens[1..]) {
                text.push_str(sep);
                text.push_str(token);
            }
            (tokens, text)
        },
    )
}

mod prop_splitter {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn split_is_deterministic(splitter in arb_splitter(), text in arb_text()) {
            prop_assert_eq!(splitter.split(&text), splitter.split(&text));
        }

        #[test]
        fn chunks_are_bounded_substrings(splitter in arb_splitter(), text in arb_text()) {
            for chunk in splitter.split(&text) {
                prop_assert!(chunk.chars().count() <= splitter.chunk_size());
                prop_assert!(text.contains(chunk.as_str()));
                prop_assert!(!chunk.trim().is_empty());
            }
        }

        #[test]
        fn every_token_survives_splitting(
            splitter in arb_splitter(),
            (tokens, text) in arb_token_text(),
        ) {
            let chunks = splitter.split(&text);
            for token in &tokens {
                prop_assert!(
                    chunks.iter().any(|c| c.contains(token.as_str())),
                    "token {} lost", token
                );
            }
        }

        #[test]
        fn non_blank_text_yields_chunks(splitter in arb_splitter(), text in arb_text()) {
            let chunks = splitter.split(&text);
            prop_assert_eq!(chunks.is_empty(), text.trim().is_empty());
        }
    }
}

mod prop_fallback {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn fallback_is_deterministic_with_fixed_dims(text in ".{0,200}", dims in 1usize..512) {
            let a = fallback_embedding(&text, dims);
            let b = fallback_embedding(&text, dims);
            prop_assert_eq!(a.len(), dims);
            prop_assert_eq!(&a, &b);
            prop_assert!(a.iter().all(|x| x.is_finite() && x.abs() < 1.0));
        }

        #[test]
        fn embed_never_fails_with_fallback(text in ".{0,200}") {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let embedding = rt.block_on(Embedder::new(384).embed(&text)).unwrap();
            prop_assert_eq!(embedding.vector.len(), 384);
            prop_assert!(embedding.fallback);
        }
    }
}

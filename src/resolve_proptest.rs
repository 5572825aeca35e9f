//! Property-based tests for repository name resolution.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::resolve::{resolve, sanitize};
    use proptest::prelude::*;

    proptest! {
        /// Property: sanitize never produces characters outside [A-Za-z0-9_-]
        #[test]
        fn sanitize_output_alphabet_is_safe(input in ".*") {
            let result = sanitize(&input);
            for ch in result.chars() {
                prop_assert!(
                    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-',
                    "sanitize produced unsafe character '{}' from input '{}'",
                    ch,
                    input
                );
            }
        }

        /// Property: sanitize is deterministic (same input = same output)
        #[test]
        fn sanitize_is_deterministic(input in ".*") {
            let result1 = sanitize(&input);
            let result2 = sanitize(&input);
            prop_assert_eq!(result1, result2);
        }

        /// Property: sanitize is idempotent (sanitizing its own output is a no-op)
        #[test]
        fn sanitize_is_idempotent(input in ".*") {
            let once = sanitize(&input);
            let twice = sanitize(&once);
            prop_assert_eq!(once, twice);
        }

        /// Property: sanitize preserves character count (1:1 replacement)
        #[test]
        fn sanitize_preserves_char_count(input in ".*") {
            let result = sanitize(&input);
            prop_assert_eq!(result.chars().count(), input.chars().count());
        }

        /// Property: sanitize preserves already-safe input unchanged
        #[test]
        fn sanitize_preserves_safe_input(input in "[a-zA-Z0-9_-]*") {
            let result = sanitize(&input);
            prop_assert_eq!(result, input);
        }

        /// Property: the sanitized suffix of a resolved identifier is stable
        /// under re-resolution
        #[test]
        fn resolve_suffix_is_stable_under_reapplication(
            slug in "[a-zA-Z0-9_]{1,16}",
            input in ".*",
        ) {
            let once = resolve(&slug, &input);
            let suffix = &once[slug.len() + 1..];
            prop_assert_eq!(sanitize(suffix), suffix);
            // Feeding the suffix back through resolve yields the same identifier.
            prop_assert_eq!(resolve(&slug, suffix), once.clone());
        }
    }
}

//! Similarity scorer: normalized Levenshtein distance between canonical texts
//!
//! Distances are counted over Unicode scalar values with unit cost for
//! insertion, deletion and substitution. The score divides by the longer
//! length, so it always lies in `[0, 1]`; `0.0` means identical text.

use crate::normalizer::canonicalize;
use crate::Result;

/// Levenshtein edit distance between two strings
///
/// O(|a|·|b|) time, O(min(|a|, |b|)) memory.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    distance(&a, &b)
}

/// Edit distance divided by the length of the longer string
///
/// Two empty strings score `0.0`.
pub fn normalized_distance(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 0.0;
    }
    distance(&a, &b) as f64 / longest as f64
}

/// Canonicalize two Python sources and score them
///
/// # Errors
/// Only non-syntax failures propagate; unparsable sources are compared
/// as raw text.
pub fn compare_sources(a: &str, b: &str) -> Result<f64> {
    let left = canonicalize(a)?;
    let right = canonicalize(b)?;
    Ok(normalized_distance(&left, &right))
}

fn distance(a: &[char], b: &[char]) -> usize {
    // The shorter sequence is the inner dimension
    let (outer, inner) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    if inner.is_empty() {
        return outer.len();
    }

    let mut previous: Vec<usize> = (0..=inner.len()).collect();
    let mut current = vec![0usize; inner.len() + 1];

    for (i, outer_char) in outer.iter().enumerate() {
        current[0] = i + 1;
        for (j, inner_char) in inner.iter().enumerate() {
            let substitution = previous[j] + usize::from(outer_char != inner_char);
            let deletion = previous[j + 1] + 1;
            let insertion = current[j] + 1;
            current[j + 1] = substitution.min(deletion).min(insertion);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[inner.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_levenshtein_known_distances() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("flaw", "lawn"), 2);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_levenshtein_counts_characters_not_bytes() {
        assert_eq!(levenshtein("é", "e"), 1);
        assert_eq!(levenshtein("日本", "日本語"), 1);
    }

    #[test]
    fn test_normalized_distance_divides_by_longer() {
        assert!((normalized_distance("kitten", "sitting") - 3.0 / 7.0).abs() < 1e-12);
        assert_eq!(normalized_distance("abc", "xyz"), 1.0);
        assert_eq!(normalized_distance("", "abc"), 1.0);
    }

    #[test]
    fn test_normalized_distance_both_empty() {
        assert_eq!(normalized_distance("", ""), 0.0);
    }

    #[test]
    fn test_compare_identical_sources() {
        let source = "def f(x):\n    return x * 2\n";
        assert_eq!(compare_sources(source, source).unwrap(), 0.0);
    }

    #[test]
    fn test_compare_reordered_functions() {
        let a = "def add(a, b):\n    return a + b\n\ndef sub(a, b):\n    return a - b\n";
        let b = "def sub(a, b):\n    return a - b\n\ndef add(a, b):\n    return a + b\n";
        assert!(compare_sources(a, b).unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_compare_docstring_and_rename() {
        let a = "def foo():\n    \"\"\"doc\"\"\"\n    x = 1\n";
        let renamed = "def fib():\n    xs = 1\n";
        assert_eq!(compare_sources(a, renamed).unwrap(), 0.0);
    }

    #[test]
    fn test_compare_different_initials_scores_name_edits() {
        // foo/bar and x/y differ only in their compressed initials
        let a = "def foo():\n    \"\"\"doc\"\"\"\n    x = 1\n";
        let b = "def bar():\n    y = 1\n";
        let canonical = canonicalize(b).unwrap();
        let expected = 2.0 / canonical.chars().count() as f64;
        assert!((compare_sources(a, b).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_compare_syntax_error_uses_raw_text() {
        let broken = "def (:\n";
        assert_eq!(compare_sources(broken, broken).unwrap(), 0.0);
        let score = compare_sources(broken, "x = 1\n").unwrap();
        assert!(score > 0.0 && score <= 1.0);
    }

    #[test]
    fn test_compare_two_empty_files() {
        assert_eq!(compare_sources("", "").unwrap(), 0.0);
    }

    proptest! {
        #[test]
        fn prop_symmetric(a in "\\PC{0,40}", b in "\\PC{0,40}") {
            prop_assert_eq!(normalized_distance(&a, &b), normalized_distance(&b, &a));
        }

        #[test]
        fn prop_bounded(a in "\\PC{0,40}", b in "\\PC{0,40}") {
            let score = normalized_distance(&a, &b);
            prop_assert!((0.0..=1.0).contains(&score));
        }

        #[test]
        fn prop_identity(a in "\\PC{0,60}") {
            prop_assert_eq!(normalized_distance(&a, &a), 0.0);
        }

        #[test]
        fn prop_triangle_inequality(a in "[a-d]{0,12}", b in "[a-d]{0,12}", c in "[a-d]{0,12}") {
            prop_assert!(levenshtein(&a, &c) <= levenshtein(&a, &b) + levenshtein(&b, &c));
        }
    }
}

//! Structural guards applied to every candidate before it is
//! accepted into the tree.

pub mod circular;
pub mod correlation;

pub use circular::CircularGuard;
pub use correlation::{CorrelationGuard, RiskLevel};

/// Bag-of-words TF-IDF-style cosine similarity between two question texts,
/// used by both the non-correlation and semantic-cycle checks.
///
/// Grounded in the vector cosine-similarity helper used for memory retrieval
/// in the broader example pack; adapted here to a simple term-frequency
/// vector since the pipeline has no embedding backend available.
pub fn cosine_similarity(a: &str, b: &str) -> f64 {
    use std::collections::HashMap;

    let freq = |text: &str| -> HashMap<String, f64> {
        let mut map = HashMap::new();
        for token in text.to_lowercase().split_whitespace() {
            let cleaned: String = token.chars().filter(|c| c.is_alphanumeric()).collect();
            if cleaned.is_empty() {
                continue;
            }
            *map.entry(cleaned).or_insert(0.0) += 1.0;
        }
        map
    };

    let vec_a = freq(a);
    let vec_b = freq(b);

    let dot: f64 = vec_a.iter().map(|(term, weight)| weight * vec_b.get(term).unwrap_or(&0.0)).sum();
    let mag_a: f64 = vec_a.values().map(|w| w * w).sum::<f64>().sqrt();
    let mag_b: f64 = vec_b.values().map(|w| w * w).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

/// Normalized Levenshtein edit distance in `[0, 1]`, used by `CircularGuard`
/// to detect near-duplicate question text.
pub fn normalized_edit_distance(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 0.0;
    }
    levenshtein(&a, &b) as f64 / max_len as f64
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical_text() {
        let sim = cosine_similarity("what year was sputnik launched", "what year was sputnik launched");
        assert!((sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_disjoint_text() {
        let sim = cosine_similarity("cats and dogs", "quantum physics lecture");
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_normalized_edit_distance_identical() {
        assert_eq!(normalized_edit_distance("hello world", "hello world"), 0.0);
    }

    #[test]
    fn test_normalized_edit_distance_bounded() {
        let d = normalized_edit_distance("what year", "completely different text here");
        assert!((0.0..=1.0).contains(&d));
    }
}

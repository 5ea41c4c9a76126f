//! Similarity scoring for indexed chunks.

/// Cosine similarity in [-1, 1]. Returns 0.0 for empty, mismatched or
/// zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Lowercased query terms worth matching (three or more characters).
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect()
}

/// Term occurrences normalised by text length, per 100 bytes.
pub fn keyword_score(text: &str, terms: &[String]) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let lowered = text.to_lowercase();
    let occurrences: usize = terms.iter().map(|t| lowered.matches(t.as_str()).count()).sum();
    occurrences as f32 / (text.len() as f32 / 100.0).max(1.0)
}

/// Indices of the `limit` highest scores, descending. Ties keep input order.
pub fn top_indices(scores: &[f32], limit: usize) -> Vec<usize> {
    let mut ranked: Vec<usize> = (0..scores.len()).collect();
    ranked.sort_by(|a, b| {
        scores[*b]
            .partial_cmp(&scores[*a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn cosine_known_value() {
        let sim = cosine_similarity(&[1.0, 1.0], &[1.0, 0.0]);
        assert!((sim - 0.7071).abs() < 0.001);
    }

    #[test]
    fn terms_drop_short_words_and_punctuation() {
        assert_eq!(
            query_terms("¿Qué es la TCEA de un préstamo?"),
            vec!["qué", "tcea", "préstamo"]
        );
    }

    #[test]
    fn keyword_score_counts_matches() {
        let terms = query_terms("plazo fijo");
        assert!(keyword_score("El plazo fijo paga una TREA fija", &terms) > 0.0);
        assert_eq!(keyword_score("Tarjeta de crédito clásica", &terms), 0.0);
        assert_eq!(keyword_score("cualquier texto", &[]), 0.0);
    }

    #[test]
    fn top_indices_ranks_descending() {
        assert_eq!(top_indices(&[0.1, 0.9, 0.5, 0.9], 3), vec![1, 3, 2]);
        assert!(top_indices(&[], 4).is_empty());
    }
}

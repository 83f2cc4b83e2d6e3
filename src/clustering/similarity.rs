use std::collections::HashMap;

use crate::article::Article;
use crate::tokens::ValuableTokens;

/// The best TF-IDF neighbor of an article.
#[derive(Debug, Clone, Copy)]
pub struct TfIdfMatch<'a> {
    pub article: &'a Article,
    pub score: f64,
}

/// Smoothed inverse document frequency of every token across the documents.
fn inverse_document_frequencies<'a>(
    documents: impl Iterator<Item = &'a ValuableTokens>,
) -> HashMap<&'a str, f64> {
    let mut frequencies: HashMap<&str, usize> = HashMap::new();
    let mut total = 0usize;
    for tokens in documents {
        total += 1;
        for token in tokens {
            *frequencies.entry(token.as_str()).or_default() += 1;
        }
    }
    frequencies
        .into_iter()
        .map(|(token, frequency)| {
            let idf = ((1 + total) as f64 / (1 + frequency) as f64).ln() + 1.0;
            (token, idf)
        })
        .collect()
}

/// Cosine similarity of two token sets weighted by `idf`.
fn weighted_cosine(a: &ValuableTokens, b: &ValuableTokens, idf: &HashMap<&str, f64>) -> f64 {
    let weight = |token: &String| idf.get(token.as_str()).copied().unwrap_or(1.0);
    let norm = |tokens: &ValuableTokens| tokens.iter().map(|t| weight(t).powi(2)).sum::<f64>().sqrt();

    let (norm_a, norm_b) = (norm(a), norm(b));
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f64 = a.intersection(b).map(|t| weight(t).powi(2)).sum();
    dot / (norm_a * norm_b)
}

/// Scores `tokens` against every neighbor and returns the best one.
///
/// Ties go to the most recently retrieved neighbor. Returns `None` for an
/// empty pool or an empty token set.
pub fn best_match<'a>(tokens: &ValuableTokens, neighbors: &'a [Article]) -> Option<TfIdfMatch<'a>> {
    if tokens.is_empty() || neighbors.is_empty() {
        return None;
    }
    let idf = inverse_document_frequencies(
        std::iter::once(tokens).chain(neighbors.iter().map(|article| &article.valuable_tokens)),
    );

    let mut best: Option<TfIdfMatch<'a>> = None;
    for neighbor in neighbors {
        let score = weighted_cosine(tokens, &neighbor.valuable_tokens, &idf);
        let better = match best {
            None => true,
            Some(current) => {
                score > current.score
                    || (score == current.score
                        && neighbor.retrieved_date > current.article.retrieved_date)
            }
        };
        if better {
            best = Some(TfIdfMatch {
                article: neighbor,
                score,
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::{Article, NewArticle};
    use chrono::{Duration, Utc};

    fn tokens(words: &[&str]) -> ValuableTokens {
        words.iter().map(|word| word.to_string()).collect()
    }

    fn article(id: i64, words: &[&str], age_minutes: i64) -> Article {
        let now = Utc::now() - Duration::minutes(age_minutes);
        Article::from_new(
            id,
            1,
            1,
            NewArticle {
                feed_id: Some(1),
                user_id: Some(1),
                category_id: None,
                entry_id: id.to_string(),
                link: None,
                title: None,
                content: None,
                comments: None,
                lang: None,
                date: now,
                retrieved_date: now,
                readability_parsed: false,
                tags: vec![],
                valuable_tokens: tokens(words),
            },
        )
    }

    #[test]
    fn test_identical_sets_score_one() {
        let pool = vec![article(1, &["rocket", "launch", "moon"], 0)];
        let found = best_match(&tokens(&["rocket", "launch", "moon"]), &pool).unwrap();
        assert_eq!(found.article.id, 1);
        assert!((found.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_sets_score_zero() {
        let pool = vec![article(1, &["election", "vote"], 0)];
        let found = best_match(&tokens(&["rocket", "launch"]), &pool).unwrap();
        assert_eq!(found.score, 0.0);
    }

    #[test]
    fn test_closest_neighbor_wins() {
        let pool = vec![
            article(1, &["rocket", "weather"], 0),
            article(2, &["rocket", "launch", "moon", "nasa"], 0),
            article(3, &["election", "vote"], 0),
        ];
        let found = best_match(&tokens(&["rocket", "launch", "moon"]), &pool).unwrap();
        assert_eq!(found.article.id, 2);
        assert!(found.score > 0.75);
    }

    #[test]
    fn test_rare_tokens_weigh_more() {
        // "weather" is shared by more documents than "artemis"
        let pool = vec![
            article(1, &["rocket", "weather"], 0),
            article(2, &["rocket", "artemis"], 0),
            article(3, &["weather", "budget"], 0),
        ];
        let found = best_match(&tokens(&["rocket", "artemis", "weather"]), &pool).unwrap();
        assert_eq!(found.article.id, 2);
    }

    #[test]
    fn test_ties_go_to_most_recent() {
        let pool = vec![
            article(1, &["rocket", "launch"], 30),
            article(2, &["rocket", "launch"], 5),
            article(3, &["rocket", "launch"], 60),
        ];
        let found = best_match(&tokens(&["rocket", "launch"]), &pool).unwrap();
        assert_eq!(found.article.id, 2);
    }

    #[test]
    fn test_empty_inputs() {
        let pool = vec![article(1, &["rocket"], 0)];
        assert!(best_match(&ValuableTokens::new(), &pool).is_none());
        assert!(best_match(&tokens(&["rocket"]), &[]).is_none());
    }
}

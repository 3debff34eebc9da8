use crate::error::{Result, RetrievalError};
use apidocs_embeddings::cosine_similarity;

/// A fused document ready for diversification
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub embedding: Vec<f32>,
    pub content: String,
}

/// Maximum Marginal Relevance selection.
///
/// Greedily picks up to `top_n` candidates maximizing
/// `lambda * sim(query, c) - (1 - lambda) * max(sim(c, selected))`.
/// Returns indices into `candidates` in selection order; ties go to the
/// earliest candidate.
pub fn diversify(
    query_embedding: &[f32],
    candidates: &[Candidate],
    top_n: usize,
    lambda: f32,
) -> Result<Vec<usize>> {
    if !(0.0..=1.0).contains(&lambda) {
        return Err(RetrievalError::InvalidArgument(format!(
            "lambda must be in [0.0, 1.0], got {lambda}"
        )));
    }

    let relevance: Vec<f32> = candidates
        .iter()
        .map(|c| cosine_similarity(query_embedding, &c.embedding))
        .collect();

    // Max similarity of each candidate to anything selected so far
    let mut redundancy = vec![0.0_f32; candidates.len()];
    let mut picked = vec![false; candidates.len()];
    let mut selected = Vec::with_capacity(top_n.min(candidates.len()));

    while selected.len() < top_n {
        let mut best: Option<(usize, f32)> = None;
        for (i, candidate_relevance) in relevance.iter().enumerate() {
            if picked[i] {
                continue;
            }
            let score = lambda * candidate_relevance - (1.0 - lambda) * redundancy[i];
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((i, score));
            }
        }

        let Some((choice, _)) = best else {
            break;
        };
        picked[choice] = true;
        selected.push(choice);

        let chosen = &candidates[choice].embedding;
        for (i, candidate) in candidates.iter().enumerate() {
            if !picked[i] {
                let sim = cosine_similarity(&candidate.embedding, chosen);
                redundancy[i] = redundancy[i].max(sim);
            }
        }
    }

    Ok(selected)
}

use indexmap::IndexMap;
use log::debug;

/// A fused document id with its accumulated RRF score
#[derive(Debug, Clone, PartialEq)]
pub struct FusedId {
    pub id: String,
    pub score: f32,
}

/// Reciprocal Rank Fusion over any number of ranked id lists.
///
/// Each appearance of a document at 0-based `rank` in a list adds
/// `1 / (k + rank + 1)` to its score. Scores from different lists sum.
#[derive(Debug, Clone)]
pub struct FusionEngine {
    k: f32,
}

impl FusionEngine {
    pub fn new(k: f32) -> Self {
        Self { k }
    }

    /// Start an empty score table
    pub fn table(&self) -> FusionTable {
        FusionTable {
            k: self.k,
            scores: IndexMap::new(),
        }
    }

    /// Fuse `lists` and keep the `limit` best ids
    pub fn fuse<I, L, S>(&self, lists: I, limit: usize) -> Vec<FusedId>
    where
        I: IntoIterator<Item = L>,
        L: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = self.table();
        for list in lists {
            table.add_ranked(list);
        }
        table.top(limit)
    }
}

/// Per-search accumulation of fused scores, keyed by document id in first-seen order
#[derive(Debug, Clone)]
pub struct FusionTable {
    k: f32,
    scores: IndexMap<String, f32>,
}

impl FusionTable {
    /// Add one ranked list (best first)
    pub fn add_ranked<L, S>(&mut self, list: L)
    where
        L: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for (rank, id) in list.into_iter().enumerate() {
            let contribution = 1.0 / (self.k + rank as f32 + 1.0);
            *self.scores.entry(id.as_ref().to_string()).or_insert(0.0) += contribution;
        }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Ids by descending score; ties keep first-seen order
    pub fn top(self, limit: usize) -> Vec<FusedId> {
        let total = self.scores.len();
        let mut fused: Vec<FusedId> = self
            .scores
            .into_iter()
            .map(|(id, score)| FusedId { id, score })
            .collect();

        fused.sort_by(|a, b| b.score.total_cmp(&a.score));
        fused.truncate(limit);

        debug!("RRF kept {} of {total} fused ids", fused.len());
        fused
    }
}

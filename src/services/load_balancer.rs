//! Load Balancer - Usage-Weighted Deterministic Selection
//!
//! Picks among scored candidates by weighting quality against prior
//! usage, so repeated selections spread across sources of comparable
//! quality instead of piling onto the single top scorer. Selection is
//! deterministic: given the same scores and usage counts, the same
//! source comes back.

use crate::services::statistics_tracker::StatisticsTracker;
use crate::utils::logger::Logger;

/// A routing candidate with its criteria-blended score
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub source_id: String,
    pub score: f64,
}

#[derive(Clone)]
pub struct LoadBalancer {
    logger: Logger,
    stats: StatisticsTracker,
}

impl LoadBalancer {
    pub fn new(logger: Logger, stats: StatisticsTracker) -> Self {
        Self { logger, stats }
    }

    /// Pick the candidate with the highest `score / (usage + 1)` weight.
    /// Ties break on source id so the outcome is stable across calls.
    pub fn pick<'a>(&self, candidates: &'a [ScoredCandidate]) -> Option<&'a ScoredCandidate> {
        let mut best: Option<(&ScoredCandidate, f64)> = None;
        for candidate in candidates {
            let usage = self.stats.usage_count(&candidate.source_id);
            let weight = candidate.score / (usage as f64 + 1.0);
            match best {
                None => best = Some((candidate, weight)),
                Some((current, current_weight)) => {
                    if weight > current_weight
                        || (weight == current_weight && candidate.source_id < current.source_id)
                    {
                        best = Some((candidate, weight));
                    }
                }
            }
        }
        if let Some((picked, weight)) = best {
            self.logger.debug(&format!(
                "Balanced pick {} (score {:.3}, weight {:.3})",
                picked.source_id, picked.score, weight
            ));
        }
        best.map(|(candidate, _)| candidate)
    }
}

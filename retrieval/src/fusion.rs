use crate::config::{FusionParams, FusionStrategy};
use crate::result::HybridSearchResult;
use log::debug;
use quarry_vector_store::{CodeDocument, ScoredPoint};
use std::collections::HashMap;

/// One document's accumulated observations across channels
struct Candidate {
    document: CodeDocument,
    /// `per_channel[i]` is `Some((rank, raw_score))` if channel `i`
    /// returned the document
    per_channel: Vec<Option<(usize, f32)>>,
}

/// Fuse per-channel ranked result lists into a single ordered ranking.
///
/// Documents are keyed by their payload id, falling back to the backend
/// point id when the payload carries none. The output is sorted by
/// descending fused score with ties broken by first-observation order, then
/// truncated to `limit`. Pure function: deterministic given the input
/// lists.
pub fn fuse(
    channels: &[Vec<ScoredPoint>],
    strategy: FusionStrategy,
    params: &FusionParams,
    limit: usize,
) -> Vec<HybridSearchResult> {
    let n_channels = channels.len();
    if n_channels == 0 {
        return Vec::new();
    }

    // Accumulate per-document rows, preserving first-observation order so
    // score ties stay deterministic.
    let mut order: Vec<String> = Vec::new();
    let mut candidates: HashMap<String, Candidate> = HashMap::new();

    for (channel, results) in channels.iter().enumerate() {
        for (rank, point) in results.iter().enumerate() {
            let key = if point.document.id.is_empty() {
                point.point_id.clone()
            } else {
                point.document.id.clone()
            };

            let candidate = candidates.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                Candidate {
                    document: point.document.clone(),
                    per_channel: vec![None; n_channels],
                }
            });
            // A duplicate id within one channel keeps its best rank
            if candidate.per_channel[channel].is_none() {
                candidate.per_channel[channel] = Some((rank, point.score));
            }
        }
    }

    let mut fused: Vec<HybridSearchResult> = order
        .into_iter()
        .map(|key| {
            let candidate = candidates.remove(&key).expect("accumulated above");
            let score = fused_score(&candidate.per_channel, strategy, params, n_channels);
            let contributing = candidate
                .per_channel
                .iter()
                .enumerate()
                .filter_map(|(channel, entry)| entry.map(|_| channel))
                .collect();
            HybridSearchResult {
                document: candidate.document,
                score,
                channels: contributing,
            }
        })
        .collect();

    // Stable sort keeps first-observation order on equal scores
    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    fused.truncate(limit);

    debug!(
        "fused {n_channels} channels into {} results ({strategy:?})",
        fused.len()
    );
    fused
}

fn fused_score(
    per_channel: &[Option<(usize, f32)>],
    strategy: FusionStrategy,
    params: &FusionParams,
    n_channels: usize,
) -> f32 {
    match strategy {
        FusionStrategy::Rrf => per_channel
            .iter()
            .flatten()
            .map(|(rank, _)| 1.0 / (params.k + *rank as f32 + 1.0))
            .sum(),
        FusionStrategy::Weighted => {
            let uniform = 1.0 / n_channels as f32;
            per_channel
                .iter()
                .enumerate()
                .filter_map(|(channel, entry)| entry.map(|(_, score)| (channel, score)))
                .map(|(channel, score)| {
                    let weight = params
                        .weights
                        .as_ref()
                        .and_then(|weights| weights.get(channel))
                        .copied()
                        .unwrap_or(uniform);
                    weight * score
                })
                .sum()
        }
        FusionStrategy::Average => {
            let scores: Vec<f32> = per_channel
                .iter()
                .flatten()
                .map(|(_, score)| *score)
                .collect();
            if scores.is_empty() {
                0.0
            } else {
                scores.iter().sum::<f32>() / scores.len() as f32
            }
        }
    }
}

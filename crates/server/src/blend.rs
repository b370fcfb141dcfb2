//! Hybrid blending of clustering and similarity recommendations.
//!
//! ## Algorithm
//! 1. Split the requested count roughly in half and move the split by a
//!    random offset in `-split_jitter..=split_jitter` (each half at least 1)
//! 2. Ask each engine for an oversized pool: `target * pool_multiplier`,
//!    capped at `pool_cap`
//! 3. Shuffle each pool and take a prefix of the half's target size
//! 4. Pick at random which method's picks go first
//! 5. Append both, skipping ids already seen (the anchor is seen from the start)
//! 6. Still short: fill from the shuffled leftovers of both pools
//! 7. Shuffle the combined list and truncate to the requested count
//!
//! All randomness comes from the caller's `Rng`, so a fixed seed gives a
//! fixed blend.

use crate::config::BlendConfig;
use catalog::{Game, GameId};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use tracing::debug;

/// Target and pool sizes for one hybrid request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendPlan {
    pub clustering_target: usize,
    pub similarity_target: usize,
    pub clustering_pool: usize,
    pub similarity_pool: usize,
}

impl BlendPlan {
    pub fn new<R: Rng + ?Sized>(count: usize, config: &BlendConfig, rng: &mut R) -> Self {
        let half = count / 2;
        let offset = if config.split_jitter > 0 {
            rng.random_range(-config.split_jitter..=config.split_jitter)
        } else {
            0
        };
        let shift = usize::try_from(offset.unsigned_abs()).unwrap_or(usize::MAX);

        // Any count up to usize::MAX plans without overflow
        let (clustering_target, similarity_target) = if offset >= 0 {
            (half.saturating_add(shift), (count - half).saturating_sub(shift))
        } else {
            (half.saturating_sub(shift), (count - half).saturating_add(shift))
        };
        let clustering_target = clustering_target.max(1);
        let similarity_target = similarity_target.max(1);
        let pool = |target: usize| {
            target
                .saturating_mul(config.pool_multiplier)
                .min(config.pool_cap)
        };

        Self {
            clustering_target,
            similarity_target,
            clustering_pool: pool(clustering_target),
            similarity_pool: pool(similarity_target),
        }
    }
}

/// Blend two candidate pools into at most `count` distinct games.
///
/// Never returns the anchor or the same id twice. Returns exactly `count`
/// games whenever the pools together hold that many distinct non-anchor ids.
pub fn blend_pools<R: Rng + ?Sized>(
    anchor: GameId,
    count: usize,
    plan: &BlendPlan,
    mut clustering_pool: Vec<Game>,
    mut similarity_pool: Vec<Game>,
    rng: &mut R,
) -> Vec<Game> {
    if count == 0 {
        return Vec::new();
    }

    clustering_pool.shuffle(rng);
    similarity_pool.shuffle(rng);

    let clustering_rest =
        clustering_pool.split_off(plan.clustering_target.min(clustering_pool.len()));
    let similarity_rest =
        similarity_pool.split_off(plan.similarity_target.min(similarity_pool.len()));

    let (first, second) = if rng.random_bool(0.5) {
        (clustering_pool, similarity_pool)
    } else {
        (similarity_pool, clustering_pool)
    };

    let mut seen: HashSet<GameId> = HashSet::from([anchor]);
    let mut blended: Vec<Game> = Vec::with_capacity(
        count.min(first.len() + second.len() + clustering_rest.len() + similarity_rest.len()),
    );
    for game in first.into_iter().chain(second) {
        if seen.insert(game.id) {
            blended.push(game);
        }
    }
    let picked = blended.len();

    if blended.len() < count {
        let mut remainder: Vec<Game> = clustering_rest
            .into_iter()
            .chain(similarity_rest)
            .filter(|g| !seen.contains(&g.id))
            .collect();
        remainder.shuffle(rng);

        for game in remainder {
            if blended.len() >= count {
                break;
            }
            if seen.insert(game.id) {
                blended.push(game);
            }
        }
    }
    debug!(
        picked,
        filled = blended.len() - picked,
        requested = count,
        "Hybrid blend assembled"
    );

    blended.shuffle(rng);
    blended.truncate(count);
    blended
}

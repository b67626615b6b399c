//! Latency-budget allocation
//!
//! Turns the slack of a path into per-channel budgets. A channel shared by
//! several paths keeps the smallest budget any of them grants it.

use crate::graph::ChannelKey;
use rand::Rng;
use std::collections::HashMap;

/// Policy splitting a total slack among `count` channels
pub trait BudgetAllocator {
    fn allocate(&mut self, total: f64, count: usize) -> Vec<f64>;
}

/// Equal shares
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformAllocator;

impl BudgetAllocator for UniformAllocator {
    fn allocate(&mut self, total: f64, count: usize) -> Vec<f64> {
        if count == 0 {
            return Vec::new();
        }
        vec![total / count as f64; count]
    }
}

/// Shares perturbed by up to `±spread` around the uniform share, then
/// renormalized to the total
#[derive(Debug, Clone)]
pub struct RandomAllocator<R: Rng> {
    rng: R,
    spread: f64,
}

impl<R: Rng> RandomAllocator<R> {
    pub fn new(rng: R, spread: f64) -> Self {
        Self { rng, spread }
    }
}

impl<R: Rng> BudgetAllocator for RandomAllocator<R> {
    fn allocate(&mut self, total: f64, count: usize) -> Vec<f64> {
        let spread = self.spread;
        let perturbations: Vec<f64> = (0..count)
            .map(|_| self.rng.gen_range(-spread..=spread))
            .collect();
        allocate_with_perturbations(total, &perturbations)
    }
}

/// Split `total` in proportion to `1 + perturbation` of every channel
///
/// Perturbations must lie in `(-1, 1)`, so every share stays positive.
pub fn allocate_with_perturbations(total: f64, perturbations: &[f64]) -> Vec<f64> {
    let shares: Vec<f64> = perturbations.iter().map(|p| 1.0 + p).collect();
    let sum: f64 = shares.iter().sum();
    if sum <= 0.0 {
        return vec![0.0; shares.len()];
    }
    shares.iter().map(|share| total * share / sum).collect()
}

/// Fold `shares` into `budgets`, keeping the minimum per channel
pub fn tighten(budgets: &mut HashMap<ChannelKey, f64>, channels: &[ChannelKey], shares: &[f64]) {
    for (&channel, &share) in channels.iter().zip(shares) {
        budgets
            .entry(channel)
            .and_modify(|budget| *budget = budget.min(share))
            .or_insert(share);
    }
}

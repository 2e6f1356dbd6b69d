//! Feature importance aggregation
//!
//! Raw per-column importances are folded into a handful of named groups,
//! normalized to 100 %, capped so no single group dominates the display, and
//! cut to the top N.

use crate::config::{ImportanceConfig, ImportanceGroup};
use crate::types::ImportanceEntry;

#[derive(Debug, Clone)]
pub struct ImportanceAggregator {
    groups: Vec<ImportanceGroup>,
    ceiling_percent: f64,
    top_n: usize,
}

impl ImportanceAggregator {
    pub fn new(config: &ImportanceConfig) -> Self {
        Self {
            groups: config.groups.clone(),
            ceiling_percent: config.ceiling_percent,
            top_n: config.top_n,
        }
    }

    /// Group shares in percent, in declaration order, before any capping.
    ///
    /// Each feature counts toward one group: the first whose prefix matches,
    /// else the first whose substring matches. Unmatched features are dropped. Negative or non-finite scores count as 0. If
    /// nothing matched, every group is 0.
    pub fn group_percentages<'a, I>(&self, features: I) -> Vec<(String, f64)>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut sums = vec![0.0; self.groups.len()];
        for (name, score) in features {
            let score = if score.is_finite() { score.max(0.0) } else { 0.0 };
            let group = self
                .groups
                .iter()
                .position(|g| g.matches_prefix(name))
                .or_else(|| self.groups.iter().position(|g| g.matches_substring(name)));
            if let Some(g) = group {
                sums[g] += score;
            }
        }

        let total: f64 = sums.iter().sum();
        let total = if total > 0.0 { total } else { 1.0 };
        self.groups
            .iter()
            .zip(sums)
            .map(|(g, s)| (g.name.clone(), s / total * 100.0))
            .collect()
    }

    /// Presentable importances: capped, ranked descending (ties keep
    /// declaration order), top N, rounded to one decimal.
    pub fn aggregate<'a, I>(&self, features: I) -> Vec<ImportanceEntry>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut shares = self.group_percentages(features);
        self.redistribute(&mut shares);

        let mut ranked: Vec<(String, f64)> = shares;
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
            .into_iter()
            .take(self.top_n)
            .map(|(name, percent)| ImportanceEntry {
                name,
                percent: (percent * 10.0).round() / 10.0,
            })
            .collect()
    }

    /// Clip every group above the ceiling and spread its excess evenly over
    /// all other groups. Single pass: a recipient may end above the ceiling.
    fn redistribute(&self, shares: &mut [(String, f64)]) {
        if shares.len() < 2 {
            for s in shares.iter_mut() {
                s.1 = s.1.min(self.ceiling_percent);
            }
            return;
        }
        let excess: Vec<f64> = shares
            .iter()
            .map(|(_, p)| (p - self.ceiling_percent).max(0.0))
            .collect();
        let others = (shares.len() - 1) as f64;
        let received: Vec<f64> = (0..shares.len())
            .map(|i| {
                excess
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, e)| e / others)
                    .sum()
            })
            .collect();
        for ((share, e), r) in shares.iter_mut().zip(&excess).zip(received) {
            share.1 = share.1 - e + r;
        }
    }
}

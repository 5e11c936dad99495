//! Borda count over rank tables (no RNG).
//!
//! score(C) = Σ rank × mass(C, rank). Rank 1 carries the smallest weight, so
//! the **lowest** positive score wins. Channels scoring 0 received no mass at
//! all and are excluded; equal minima go to the earliest channel in registry
//! order.

use sv_core::{Distribution, RankTable};
use tracing::debug;

use crate::CountryOutcome;

pub fn borda_scores(tables: &[RankTable]) -> Vec<f64> {
    tables.iter().map(RankTable::weighted_sum).collect()
}

pub fn borda_winner(scores: &[f64]) -> CountryOutcome {
    let mut best: Option<(usize, f64)> = None;
    for (ch, &s) in scores.iter().enumerate() {
        if !(s > 0.0) {
            continue;
        }
        match best {
            Some((_, b)) if s >= b => {}
            _ => best = Some((ch, s)),
        }
    }
    best.map_or(CountryOutcome::NoWinner, |(ch, _)| CountryOutcome::Winner(ch))
}

pub fn tabulate_borda(dist: &Distribution) -> Vec<CountryOutcome> {
    (0..dist.n_countries())
        .map(|co| {
            let scores = borda_scores(&dist.country_rank_tables(co));
            let outcome = borda_winner(&scores);
            debug!(target: "sv_algo::borda", country = %dist.country_ids()[co], ?scores, ?outcome, "country decided");
            outcome
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(m: &[f64]) -> RankTable {
        RankTable::from_masses(m.to_vec())
    }

    #[test]
    fn minimum_score_wins() {
        let tables = [t(&[10.0, 0.0]), t(&[0.0, 10.0])];
        let scores = borda_scores(&tables);
        assert_eq!(scores, vec![10.0, 20.0]);
        assert_eq!(borda_winner(&scores), CountryOutcome::Winner(0));
    }

    #[test]
    fn zero_scores_are_excluded() {
        assert_eq!(borda_winner(&[0.0, 30.0, 25.0]), CountryOutcome::Winner(2));
        assert_eq!(borda_winner(&[0.0, 0.0]), CountryOutcome::NoWinner);
    }

    #[test]
    fn ties_go_to_registry_order() {
        assert_eq!(borda_winner(&[12.0, 7.0, 7.0]), CountryOutcome::Winner(1));
    }
}

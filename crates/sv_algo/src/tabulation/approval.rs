//! crates/sv_algo/src/tabulation/approval.rs
//! Approval voting simulated as noise around the plurality counts.
//!
//! Each channel's approvals are `count + uniform(-d, d)` with
//! `d = voting_population - count`, so a channel can at most be approved by
//! every voter of the country. Only channels with a positive count contend;
//! the highest perturbed total among them wins, whatever its sign, and equal
//! maxima go to the earliest channel in registry order. A country has no
//! winner only when every count is zero.

use sv_core::{Distribution, SimRng};
use tracing::debug;

use crate::CountryOutcome;

/// `voting_population[co]` is the plurality vote total of country `co`.
pub fn tabulate_approval(
    dist: &Distribution,
    voting_population: &[f64],
    rng: &mut SimRng,
) -> Vec<CountryOutcome> {
    (0..dist.n_countries())
        .map(|co| {
            let voters = voting_population.get(co).copied().unwrap_or(0.0);
            let counts: Vec<f64> = (0..dist.n_channels()).map(|ch| dist.count(ch, co)).collect();
            let outcome = approval_winner(&counts, voters, rng);
            debug!(target: "sv_algo::approval", country = %dist.country_ids()[co], ?outcome, "country decided");
            outcome
        })
        .collect()
}

pub fn approval_winner(counts: &[f64], voters: f64, rng: &mut SimRng) -> CountryOutcome {
    let mut best: Option<(usize, f64)> = None;
    for (ch, &base) in counts.iter().enumerate().filter(|&(_, &c)| c > 0.0) {
        let d = (voters - base).max(0.0);
        let approvals = base + rng.uniform(-d, d);
        if best.map_or(true, |(_, b)| approvals > b) {
            best = Some((ch, approvals));
        }
    }
    best.map_or(CountryOutcome::NoWinner, |(ch, _)| CountryOutcome::Winner(ch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_channel_gets_exactly_its_votes() {
        // d = 0: no noise, no RNG draw
        let mut rng = SimRng::from_seed_u64(5);
        assert_eq!(approval_winner(&[9.0], 9.0, &mut rng), CountryOutcome::Winner(0));
        assert_eq!(rng.words_consumed(), 0);
    }

    #[test]
    fn empty_country_has_no_winner() {
        let mut rng = SimRng::from_seed_u64(5);
        assert_eq!(approval_winner(&[0.0, 0.0], 0.0, &mut rng), CountryOutcome::NoWinner);
    }

    #[test]
    fn positive_counts_always_elect_someone() {
        // d = 80 per channel: every perturbed total can fall below zero
        for seed in 0..2000 {
            let mut rng = SimRng::from_seed_u64(seed);
            let outcome = approval_winner(&[20.0; 5], 100.0, &mut rng);
            assert!(outcome.winner().is_some(), "seed {seed}");
        }
    }

    #[test]
    fn zero_count_channels_never_win() {
        for seed in 0..200 {
            let mut rng = SimRng::from_seed_u64(seed);
            assert_eq!(approval_winner(&[0.0, 3.0, 0.0], 50.0, &mut rng), CountryOutcome::Winner(1));
        }
    }

    #[test]
    fn same_seed_same_winners() {
        let counts = [40.0, 35.0, 25.0];
        let run = |seed| {
            let mut rng = SimRng::from_seed_u64(seed);
            (0..20).map(|_| approval_winner(&counts, 100.0, &mut rng)).collect::<Vec<_>>()
        };
        assert_eq!(run(11), run(11));
        assert!(run(11).iter().all(|o| o.winner().map_or(true, |w| w < 3)));
    }
}

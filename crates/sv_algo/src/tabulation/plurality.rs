//! crates/sv_algo/src/tabulation/plurality.rs
//! First past the post over the per-country counts.
//!
//! Only channels with a positive count contend. Equal maxima are broken by a
//! uniform draw from the shared run RNG; the draw is kept as a `DrawCrumb`.
//! The per-country vote total (voting population) is returned alongside so
//! approval voting can reuse it.

use sv_core::rng::DrawCrumb;
use sv_core::{Distribution, SimRng};
use tracing::debug;

use crate::CountryOutcome;

#[derive(Clone, Debug, PartialEq)]
pub struct PluralityTally {
    pub outcomes: Vec<CountryOutcome>,
    /// Σ counts per country.
    pub voting_population: Vec<f64>,
    pub tie_breaks: Vec<DrawCrumb>,
}

pub fn tabulate_plurality(dist: &Distribution, rng: &mut SimRng) -> PluralityTally {
    let mut outcomes = Vec::with_capacity(dist.n_countries());
    let mut tie_breaks = Vec::new();

    for co in 0..dist.n_countries() {
        let counts: Vec<f64> = (0..dist.n_channels()).map(|ch| dist.count(ch, co)).collect();

        let ctx = format!("fptp:{}", dist.country_ids()[co]);
        let (outcome, crumb) = plurality_winner(&counts, rng, &ctx);
        tie_breaks.extend(crumb);
        debug!(target: "sv_algo::fptp", country = %dist.country_ids()[co], ?outcome, "country decided");
        outcomes.push(outcome);
    }

    PluralityTally { outcomes, voting_population: voting_population(dist), tie_breaks }
}

/// Votes cast per country in a plurality pass (Σ counts). Needs no draws, so
/// approval can take it when FPTP was not run.
pub fn voting_population(dist: &Distribution) -> Vec<f64> {
    (0..dist.n_countries())
        .map(|co| (0..dist.n_channels()).map(|ch| dist.count(ch, co)).sum())
        .collect()
}

/// Highest positive count wins; ties go to a random draw among the leaders.
pub fn plurality_winner(
    counts: &[f64],
    rng: &mut SimRng,
    ctx: &str,
) -> (CountryOutcome, Option<DrawCrumb>) {
    let max = counts.iter().copied().fold(0.0_f64, f64::max);
    if !(max > 0.0) {
        return (CountryOutcome::NoWinner, None);
    }
    let leaders: Vec<usize> = (0..counts.len()).filter(|&i| counts[i] == max).collect();
    if leaders.len() == 1 {
        return (CountryOutcome::Winner(leaders[0]), None);
    }
    match rng.pick_index_with_crumb(ctx, leaders.len() as u64) {
        Some((pick, crumb)) => (CountryOutcome::Winner(leaders[pick]), Some(crumb)),
        None => (CountryOutcome::NoWinner, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_count_wins() {
        let mut rng = SimRng::from_seed_u64(1);
        let (o, crumb) = plurality_winner(&[3.0, 7.5, 2.0], &mut rng, "t");
        assert_eq!(o, CountryOutcome::Winner(1));
        assert!(crumb.is_none());
        assert_eq!(rng.words_consumed(), 0);
    }

    #[test]
    fn clear_leader_wins_for_any_seed() {
        for seed in 0..256 {
            let mut rng = SimRng::from_seed_u64(seed);
            let (o, crumb) = plurality_winner(&[10.0, 5.0, 2.0], &mut rng, "t");
            assert_eq!(o, CountryOutcome::Winner(0));
            assert!(crumb.is_none());
            assert_eq!(rng.words_consumed(), 0);
        }
    }

    #[test]
    fn all_zero_is_no_winner() {
        let mut rng = SimRng::from_seed_u64(1);
        assert_eq!(plurality_winner(&[0.0, 0.0], &mut rng, "t").0, CountryOutcome::NoWinner);
        assert_eq!(plurality_winner(&[], &mut rng, "t").0, CountryOutcome::NoWinner);
    }

    #[test]
    fn ties_draw_among_leaders_only() {
        let mut seen = [false; 3];
        for seed in 0..64 {
            let mut rng = SimRng::from_seed_u64(seed);
            let (o, crumb) = plurality_winner(&[5.0, 1.0, 5.0], &mut rng, "fptp:X");
            let w = o.winner().unwrap();
            assert!(w == 0 || w == 2);
            seen[w] = true;
            assert_eq!(crumb.unwrap().ctx.as_str(), "fptp:X");
        }
        assert!(seen[0] && seen[2]);
    }

    #[test]
    fn tally_reports_voting_population() {
        let mut d = Distribution::from_ids(
            vec!["a".parse().unwrap(), "b".parse().unwrap()],
            vec!["X".parse().unwrap(), "Y".parse().unwrap()],
        );
        d.set_count(0, 0, 4.0);
        d.set_count(1, 0, 6.0);
        let mut rng = SimRng::from_seed_u64(3);
        let t = tabulate_plurality(&d, &mut rng);
        assert_eq!(t.outcomes, vec![CountryOutcome::Winner(1), CountryOutcome::NoWinner]);
        assert_eq!(t.voting_population, vec![10.0, 0.0]);
        assert_eq!(voting_population(&d), t.voting_population);
        assert!(t.tie_breaks.is_empty());
    }
}

//! AGGREGATE stage: fold per-country outcomes into seat totals.
//!
//! Every country holds one seat. A country without a winner adds to
//! `no_winner`, so `Σ seats + no_winner == #countries` for every method.
//! The government is the channel with the most seats; ties go to the
//! earliest channel in registry order and are flagged.

use sv_algo::CountryOutcome;
use sv_core::Method;
use tracing::info;

use crate::tabulate::MethodRun;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElectionResult {
    pub method: Method,
    /// Seats per channel, registry order.
    pub seats: Vec<u32>,
    pub no_winner: u32,
    /// Registry index of the governing channel; `None` when nobody won a seat.
    pub government: Option<usize>,
    pub government_tied: bool,
    /// Winner per country, registry order.
    pub winners: Vec<Option<usize>>,
}

impl ElectionResult {
    pub fn seats_total(&self) -> u32 {
        self.seats.iter().sum::<u32>() + self.no_winner
    }

    /// Channel indices by seats descending; equal seats keep registry order.
    pub fn standings(&self) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..self.seats.len()).collect();
        idx.sort_by(|&a, &b| self.seats[b].cmp(&self.seats[a]));
        idx
    }
}

pub fn aggregate(method: Method, outcomes: &[CountryOutcome], n_channels: usize) -> ElectionResult {
    let mut seats = vec![0u32; n_channels];
    let mut no_winner = 0u32;
    let mut winners = Vec::with_capacity(outcomes.len());

    for o in outcomes {
        match o.winner() {
            Some(ch) if ch < n_channels => {
                seats[ch] += 1;
                winners.push(Some(ch));
            }
            _ => {
                no_winner += 1;
                winners.push(None);
            }
        }
    }

    let (government, government_tied) = pick_government(&seats);
    ElectionResult { method, seats, no_winner, government, government_tied, winners }
}

pub fn aggregate_runs(runs: &[MethodRun], n_channels: usize) -> Vec<ElectionResult> {
    runs.iter()
        .map(|r| {
            let res = aggregate(r.method, &r.outcomes, n_channels);
            info!(
                target: "sv_pipeline::aggregate",
                method = r.method.as_str(),
                seats = ?res.seats,
                no_winner = res.no_winner,
                government = ?res.government,
                tied = res.government_tied,
                "seats aggregated"
            );
            res
        })
        .collect()
}

fn pick_government(seats: &[u32]) -> (Option<usize>, bool) {
    let max = seats.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return (None, false);
    }
    let mut leaders = seats.iter().enumerate().filter(|(_, &s)| s == max).map(|(i, _)| i);
    let first = leaders.next();
    (first, leaders.next().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use CountryOutcome::{NoWinner, Winner};

    #[test]
    fn seats_plus_no_winner_cover_every_country() {
        let r = aggregate(Method::Fptp, &[Winner(0), Winner(1), NoWinner, Winner(0)], 3);
        assert_eq!(r.seats, vec![2, 1, 0]);
        assert_eq!(r.no_winner, 1);
        assert_eq!(r.seats_total(), 4);
        assert_eq!(r.government, Some(0));
        assert!(!r.government_tied);
        assert_eq!(r.winners, vec![Some(0), Some(1), None, Some(0)]);
    }

    #[test]
    fn tied_government_goes_to_earliest() {
        let r = aggregate(Method::Borda, &[Winner(2), Winner(1)], 3);
        assert_eq!(r.government, Some(1));
        assert!(r.government_tied);
        assert_eq!(r.standings(), vec![1, 2, 0]);
    }

    #[test]
    fn no_seats_no_government() {
        let r = aggregate(Method::Condorcet, &[NoWinner, NoWinner], 2);
        assert_eq!(r.government, None);
        assert!(!r.government_tied);
        assert_eq!(r.no_winner, 2);
    }
}

//! Ranked Condorcet over fractional rank tables (deterministic, no RNG).
//!
//! Pairwise credit: walking ranks from best to worst, A's mass at rank r is
//! matched against B's mass at ranks worse than r. Matched mass is credited
//! to "A over B" and removed from both sides so it is never counted twice.
//! B's lower ranks are consumed largest first, first among the ranks where A
//! also holds mass, then among all lower ranks.
//!
//! Determinism:
//! - credit(A over B) and credit(B over A) are each computed on fresh copies
//!   of the two tables, so a pair's tally does not depend on argument order;
//! - loops run over registry indices; sort ties keep rank order.
//!
//! Country winner: strictly the most pairwise wins, and at least one.
//! Otherwise the country has no winner.

use sv_core::numeric::MASS_EPS;
use sv_core::{Distribution, RankTable};
use tracing::debug;

use crate::CountryOutcome;

/// Head-to-head tally for channels `a < b` (registry indices).
#[derive(Clone, Debug, PartialEq)]
pub struct Pairwise {
    pub a: usize,
    pub b: usize,
    pub votes_a: f64,
    pub votes_b: f64,
}

impl Pairwise {
    /// Pair winner; `None` on equal credit.
    pub fn winner(&self) -> Option<usize> {
        if self.votes_a > self.votes_b {
            Some(self.a)
        } else if self.votes_b > self.votes_a {
            Some(self.b)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CondorcetLog {
    pub country: usize,
    pub pairs: Vec<Pairwise>,
    /// Pairwise wins per channel (registry order).
    pub wins: Vec<u32>,
    /// Pairs that ended level.
    pub ties: u32,
    pub winner: Option<usize>,
}

pub fn tabulate_condorcet(dist: &Distribution) -> (Vec<CountryOutcome>, Vec<CondorcetLog>) {
    let mut outcomes = Vec::with_capacity(dist.n_countries());
    let mut logs = Vec::with_capacity(dist.n_countries());
    for co in 0..dist.n_countries() {
        let log = run_condorcet_country(co, &dist.country_rank_tables(co));
        debug!(
            target: "sv_algo::condorcet",
            country = %dist.country_ids()[co],
            wins = ?log.wins,
            ties = log.ties,
            winner = ?log.winner,
            "country decided"
        );
        outcomes.push(log.winner.map_or(CountryOutcome::NoWinner, CountryOutcome::Winner));
        logs.push(log);
    }
    (outcomes, logs)
}

pub fn run_condorcet_country(country: usize, tables: &[RankTable]) -> CondorcetLog {
    let n = tables.len();
    let mut pairs = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    let mut wins = vec![0u32; n];
    let mut ties = 0u32;

    for a in 0..n {
        for b in (a + 1)..n {
            let (votes_a, votes_b) = pairwise_tally(&tables[a], &tables[b]);
            let pair = Pairwise { a, b, votes_a, votes_b };
            match pair.winner() {
                Some(w) => wins[w] += 1,
                None => ties += 1,
            }
            pairs.push(pair);
        }
    }

    let top = wins.iter().copied().max().unwrap_or(0);
    let leaders: Vec<usize> = (0..n).filter(|&c| wins[c] == top).collect();
    let winner = if top > 0 && leaders.len() == 1 { Some(leaders[0]) } else { None };

    CondorcetLog { country, pairs, wins, ties, winner }
}

/// `(credit(A over B), credit(B over A))`, each on fresh copies.
pub fn pairwise_tally(a: &RankTable, b: &RankTable) -> (f64, f64) {
    (credited_votes(a, b), credited_votes(b, a))
}

/// Mass of voters ranking `a` strictly above `b`.
pub fn credited_votes(a: &RankTable, b: &RankTable) -> f64 {
    let mut mine = a.clone();
    let mut theirs = b.clone();
    let mut credited = 0.0;

    for r in 1..=mine.len() {
        let mut here = mine.get(r);
        if here <= 0.0 {
            continue;
        }
        let lower: Vec<usize> = mine.lower_ranks(r).collect();

        let shared: Vec<usize> = lower.iter().copied().filter(|&lr| mine.get(lr) != 0.0).collect();
        credited += match_ranks(&mut mine, &mut theirs, r, &mut here, shared);
        if here > MASS_EPS {
            credited += match_ranks(&mut mine, &mut theirs, r, &mut here, lower);
        }
    }
    credited
}

/// Consume `theirs` at `candidates` (largest first) against `mine[r]`.
fn match_ranks(
    mine: &mut RankTable,
    theirs: &mut RankTable,
    r: usize,
    here: &mut f64,
    mut candidates: Vec<usize>,
) -> f64 {
    candidates.sort_by(|&x, &y| theirs.get(y).total_cmp(&theirs.get(x)));
    let mut matched = 0.0;
    for lr in candidates {
        if *here <= 0.0 {
            break;
        }
        let take = here.min(theirs.get(lr));
        if take <= 0.0 {
            continue;
        }
        matched += take;
        *here -= take;
        mine.set(r, mine.get(r) - take);
        theirs.set(lr, theirs.get(lr) - take);
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(m: &[f64]) -> RankTable {
        RankTable::from_masses(m.to_vec())
    }

    #[test]
    fn first_choice_beats_second_choice() {
        let a = t(&[10.0, 0.0]);
        let b = t(&[0.0, 10.0]);
        assert_eq!(pairwise_tally(&a, &b), (10.0, 0.0));
        let log = run_condorcet_country(0, &[a, b]);
        assert_eq!(log.winner, Some(0));
        assert_eq!(log.wins, vec![1, 0]);
    }

    #[test]
    fn tally_is_order_independent() {
        let tables = [
            t(&[1.0, 4.0, 2.0, 0.0]),
            t(&[3.0, 0.0, 0.0, 4.0]),
            t(&[1.0, 2.0, 2.0, 2.0]),
            t(&[2.0, 1.0, 3.0, 1.0]),
        ];
        for i in 0..tables.len() {
            for j in 0..tables.len() {
                let (x, y) = pairwise_tally(&tables[i], &tables[j]);
                let (y2, x2) = pairwise_tally(&tables[j], &tables[i]);
                assert_eq!(x, x2);
                assert_eq!(y, y2);
            }
        }
    }

    #[test]
    fn inputs_are_not_mutated() {
        let a = t(&[5.0, 5.0]);
        let b = t(&[5.0, 5.0]);
        let _ = pairwise_tally(&a, &b);
        assert_eq!(a.as_slice(), &[5.0, 5.0]);
    }

    #[test]
    fn level_pair_is_a_tie() {
        let a = t(&[5.0, 5.0]);
        let b = t(&[5.0, 5.0]);
        let log = run_condorcet_country(0, &[a, b]);
        assert_eq!(log.ties, 1);
        assert_eq!(log.winner, None);
    }

    #[test]
    fn shared_top_wins_yields_no_winner() {
        // cycle: 0 > 1, 1 > 2, 2 > 0
        let tables = [t(&[6.0, 0.0, 3.0]), t(&[3.0, 6.0, 0.0]), t(&[0.0, 3.0, 6.0])];
        let log = run_condorcet_country(0, &tables);
        assert_eq!(log.pairs.len(), 3);
        if log.wins.iter().filter(|&&w| w == *log.wins.iter().max().unwrap()).count() > 1 {
            assert_eq!(log.winner, None);
        } else {
            assert!(log.winner.is_some());
        }
    }

    #[test]
    fn all_zero_has_no_winner() {
        let tables = [t(&[0.0, 0.0]), t(&[0.0, 0.0])];
        let log = run_condorcet_country(3, &tables);
        assert_eq!(log.country, 3);
        assert_eq!(log.winner, None);
    }
}

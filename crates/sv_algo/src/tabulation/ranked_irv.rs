// crates/sv_algo/src/tabulation/ranked_irv.rs
//
// Instant-runoff over fractional rank tables.
//
// Each country runs on a private copy of its rank tables:
// - contenders are the channels with nonzero rank-1 mass;
// - a contender whose rank-1 mass exceeds half the country's useful
//   population wins; a lone remaining contender wins;
// - otherwise the contender with the smallest rank-1 mass is eliminated
//   (ties: earliest in registry order) and its rank-1 mass is handed to the
//   survivors in random pieces.
//
// A survivor absorbing mass moves the same amount out of its own lower ranks
// into rank 1, so its total table mass never changes. Mass no survivor can
// absorb is reported as `unplaced` on the round.

use sv_core::numeric::MASS_EPS;
use sv_core::{Distribution, RankTable, SimRng};
use tracing::{debug, warn};

use crate::CountryOutcome;

/// Shuffled passes over the lower ranks before the deterministic sweep.
const SHAVE_PASSES: usize = 4;

#[derive(Clone, Debug, PartialEq)]
pub struct IrvRound {
    /// Registry index of the eliminated channel.
    pub eliminated: usize,
    /// Its rank-1 mass at elimination.
    pub transferred: f64,
    /// Part of `transferred` no survivor could absorb.
    pub unplaced: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IrvLog {
    pub country: usize,
    pub quota: f64,
    pub rounds: Vec<IrvRound>,
    pub winner: Option<usize>,
}

/// `useful_population[co]` is the reshaped population of country `co`.
pub fn tabulate_irv(
    dist: &Distribution,
    useful_population: &[f64],
    rng: &mut SimRng,
) -> (Vec<CountryOutcome>, Vec<IrvLog>) {
    let mut outcomes = Vec::with_capacity(dist.n_countries());
    let mut logs = Vec::with_capacity(dist.n_countries());
    for co in 0..dist.n_countries() {
        let quota = useful_population.get(co).copied().unwrap_or(0.0);
        let log = run_irv_country(co, dist.country_rank_tables(co), quota, rng);
        let unplaced: f64 = log.rounds.iter().map(|r| r.unplaced).sum();
        if unplaced > MASS_EPS {
            warn!(
                target: "sv_algo::irv",
                country = %dist.country_ids()[co],
                unplaced,
                "eliminated mass could not be fully transferred"
            );
        }
        debug!(
            target: "sv_algo::irv",
            country = %dist.country_ids()[co],
            rounds = log.rounds.len(),
            winner = ?log.winner,
            "country decided"
        );
        outcomes.push(log.winner.map_or(CountryOutcome::NoWinner, CountryOutcome::Winner));
        logs.push(log);
    }
    (outcomes, logs)
}

/// Run IRV for one country on owned tables.
pub fn run_irv_country(
    country: usize,
    mut tables: Vec<RankTable>,
    quota: f64,
    rng: &mut SimRng,
) -> IrvLog {
    let half = quota / 2.0;
    let mut active: Vec<usize> = (0..tables.len()).filter(|&c| tables[c].get(1) != 0.0).collect();
    let mut rounds = Vec::new();

    let winner = loop {
        if active.is_empty() {
            break None;
        }
        if let Some(w) = check_majority(&tables, &active, half) {
            break Some(w);
        }
        if active.len() == 1 {
            break Some(active[0]);
        }
        let Some(lowest) = pick_lowest_to_eliminate(&tables, &active) else {
            break None;
        };
        active.retain(|&c| c != lowest);
        let transferred = tables[lowest].get(1);
        let unplaced = redistribute(&mut tables, transferred, &active, rng);
        rounds.push(IrvRound { eliminated: lowest, transferred, unplaced });
    };

    IrvLog { country, quota, rounds, winner }
}

/// First contender (registry order) whose rank-1 mass is strictly above `half`.
pub fn check_majority(tables: &[RankTable], active: &[usize], half: f64) -> Option<usize> {
    active.iter().copied().find(|&c| tables[c].get(1) > half)
}

/// Smallest rank-1 mass; equal masses resolve to the earliest channel.
pub fn pick_lowest_to_eliminate(tables: &[RankTable], active: &[usize]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for &c in active {
        let m = tables[c].get(1);
        match best {
            Some((_, b)) if m >= b => {}
            _ => best = Some((c, m)),
        }
    }
    best.map(|(c, _)| c)
}

/// Hand `mass` to randomly ordered survivors. Returns what was left over.
fn redistribute(tables: &mut [RankTable], mass: f64, survivors: &[usize], rng: &mut SimRng) -> f64 {
    let mut pending = survivors.to_vec();
    let mut remaining = mass;
    while remaining > MASS_EPS && !pending.is_empty() {
        let last = pending.len() == 1;
        let Some(pick) = rng.choose_index(pending.len()) else {
            break;
        };
        let c = pending.remove(pick);
        let offer = if last { remaining } else { rng.uniform(0.0, remaining) };
        let capacity = tables[c].total() - tables[c].get(1);
        let absorbed = offer.min(capacity).max(0.0);
        if absorbed > 0.0 {
            tables[c].add(1, absorbed);
            shave_lower_ranks(&mut tables[c], absorbed, rng);
            remaining -= absorbed;
        }
    }
    remaining.max(0.0)
}

/// Remove `amount` from ranks 2..=N. Caller guarantees the lower ranks hold
/// at least `amount`.
fn shave_lower_ranks(table: &mut RankTable, amount: f64, rng: &mut SimRng) {
    let mut left = amount;
    let mut ranks: Vec<usize> = table.lower_ranks(1).collect();

    for _ in 0..SHAVE_PASSES {
        if left <= MASS_EPS {
            return;
        }
        rng.shuffle_in_place(&mut ranks);
        for (i, &r) in ranks.iter().enumerate() {
            if left <= MASS_EPS {
                break;
            }
            let have = table.get(r);
            if have <= 0.0 {
                continue;
            }
            let want = if i + 1 == ranks.len() { left } else { rng.uniform(0.0, left) };
            let take = want.min(have);
            table.set(r, have - take);
            left -= take;
        }
    }

    // Whatever is still owed comes off the worst ranks first.
    for r in table.lower_ranks(1).rev() {
        if left <= 0.0 {
            break;
        }
        let have = table.get(r);
        let take = left.min(have.max(0.0));
        table.set(r, have - take);
        left -= take;
    }
}

//! Rank allocation: fill every channel's rank table in every country.
//!
//! For channel C with count n in a country:
//! 1. rank 1 of C receives n;
//! 2. the same-language competitors of C share ranks 2..=1+k (k of them);
//! 3. the other-language competitors share the ranks after that.
//!
//! Within a pass, each target rank starts with a pool of n. Competitors are
//! visited in registry order; each non-last competitor takes exactly n spread
//! over the pass's ranks (bounded by what is left in each pool), the last
//! takes the remaining pools. Consequently every rank column sums to the
//! country total and every channel's table sums to the country total.
//!
//! Each country is allocated on scratch tables. If the bounded split fails
//! the country's ranks are left at zero and a `RankFault` is returned; the
//! other countries are unaffected.

use sv_core::numeric::CONSERVATION_TOL;
use sv_core::{Channel, Distribution, ModelError, RankTable};
use tracing::{debug, warn};

use super::bounded::BoundedAllocator;

/// A country whose rank tables could not be filled.
#[derive(Clone, Debug, PartialEq)]
pub struct RankFault {
    pub country: usize,
    pub error: ModelError,
}

/// Which conservation identity failed, with the values compared.
#[derive(Clone, Debug, PartialEq)]
pub enum ConservationIssue {
    /// rank 1 ≠ the channel's count.
    FirstRank { country: usize, channel: usize, expected: f64, actual: f64 },
    /// Σ over a rank column ≠ country total.
    RankColumn { country: usize, rank: usize, expected: f64, actual: f64 },
    /// Σ over one channel's table ≠ country total.
    ChannelRow { country: usize, channel: usize, expected: f64, actual: f64 },
}

pub fn allocate_ranks(
    dist: &mut Distribution,
    channels: &[Channel],
    solver: &dyn BoundedAllocator,
) -> Vec<RankFault> {
    let mut faults = Vec::new();
    for co in 0..dist.n_countries() {
        let counts: Vec<f64> = (0..dist.n_channels()).map(|ch| dist.count(ch, co)).collect();
        let mut tables = dist.country_rank_tables(co);
        tables.iter_mut().for_each(RankTable::clear);

        match allocate_country(&mut tables, &counts, channels, solver) {
            Ok(()) => {
                for (ch, t) in tables.into_iter().enumerate() {
                    *dist.ranks_mut(ch, co) = t;
                }
            }
            Err(error) => {
                warn!(
                    target: "sv_algo::allocation",
                    country = %dist.country_ids()[co],
                    solver = solver.name(),
                    %error,
                    "rank allocation failed; country ranks zeroed"
                );
                dist.clear_country_ranks(co);
                faults.push(RankFault { country: co, error });
            }
        }
    }
    debug!(
        target: "sv_algo::allocation",
        solver = solver.name(),
        countries = dist.n_countries(),
        faults = faults.len(),
        "rank tables allocated"
    );
    faults
}

fn allocate_country(
    tables: &mut [RankTable],
    counts: &[f64],
    channels: &[Channel],
    solver: &dyn BoundedAllocator,
) -> Result<(), ModelError> {
    for (ch, &count) in counts.iter().enumerate() {
        tables[ch].add(1, count);

        let language = &channels[ch].language;
        let same: Vec<usize> = (0..counts.len())
            .filter(|&o| o != ch && channels[o].language == *language)
            .collect();
        let others: Vec<usize> = (0..counts.len())
            .filter(|&o| channels[o].language != *language)
            .collect();

        transfer_pass(tables, 2, &same, count, solver)?;
        transfer_pass(tables, 2 + same.len(), &others, count, solver)?;
    }
    Ok(())
}

/// Spread `count` to each competitor over ranks `first_rank..first_rank+k`.
fn transfer_pass(
    tables: &mut [RankTable],
    first_rank: usize,
    competitors: &[usize],
    count: f64,
    solver: &dyn BoundedAllocator,
) -> Result<(), ModelError> {
    let k = competitors.len();
    if k == 0 {
        return Ok(());
    }
    let mut pool = vec![count; k];
    for (pos, &comp) in competitors.iter().enumerate() {
        let got = if pos + 1 == k { pool.clone() } else { solver.allocate(count, &pool)? };
        for (j, g) in got.into_iter().enumerate() {
            tables[comp].add(first_rank + j, g);
            pool[j] = (pool[j] - g).max(0.0);
        }
    }
    Ok(())
}

/// Check the three conservation identities in every country that has no fault.
pub fn conservation_report(dist: &Distribution, faults: &[RankFault]) -> Vec<ConservationIssue> {
    let mut issues = Vec::new();
    let n = dist.n_channels();
    for co in 0..dist.n_countries() {
        if faults.iter().any(|f| f.country == co) {
            continue;
        }
        let expected = dist.country_total(co);
        for ch in 0..n {
            let t = dist.ranks(ch, co);
            let first = t.get(1);
            if (first - dist.count(ch, co)).abs() > CONSERVATION_TOL {
                issues.push(ConservationIssue::FirstRank {
                    country: co,
                    channel: ch,
                    expected: dist.count(ch, co),
                    actual: first,
                });
            }
            let row = t.total();
            if (row - expected).abs() > CONSERVATION_TOL {
                issues.push(ConservationIssue::ChannelRow { country: co, channel: ch, expected, actual: row });
            }
        }
        for rank in 1..=n {
            let column: f64 = (0..n).map(|ch| dist.ranks(ch, co).get(rank)).sum();
            if (column - expected).abs() > CONSERVATION_TOL {
                issues.push(ConservationIssue::RankColumn { country: co, rank, expected, actual: column });
            }
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::bounded::{ProportionalToBounds, WaterFill};
    use crate::testkit::channel;
    use proptest::prelude::*;
    use sv_core::{ChannelId, CountryId};

    fn registry(langs: &[&str]) -> (Vec<Channel>, Distribution) {
        let channels: Vec<Channel> = langs
            .iter()
            .enumerate()
            .map(|(i, l)| channel(&format!("c{i}"), "X", l, 1.0))
            .collect();
        let ids: Vec<ChannelId> = channels.iter().map(|c| c.id.clone()).collect();
        let countries: Vec<CountryId> = vec!["X".parse().unwrap(), "Y".parse().unwrap()];
        (channels, Distribution::from_ids(ids, countries))
    }

    #[test]
    fn two_channels_swap_ranks() {
        let (channels, mut d) = registry(&["EN", "EN"]);
        d.set_count(0, 0, 30.0);
        d.set_count(1, 0, 10.0);
        let faults = allocate_ranks(&mut d, &channels, &WaterFill);
        assert!(faults.is_empty());
        assert_eq!(d.ranks(0, 0).as_slice(), &[30.0, 10.0]);
        assert_eq!(d.ranks(1, 0).as_slice(), &[10.0, 30.0]);
        // empty country stays empty
        assert_eq!(d.ranks(0, 1).total(), 0.0);
    }

    #[test]
    fn same_language_competitors_take_the_better_ranks() {
        let (channels, mut d) = registry(&["EN", "HI", "EN"]);
        d.set_count(0, 0, 12.0);
        let faults = allocate_ranks(&mut d, &channels, &WaterFill);
        assert!(faults.is_empty());
        // c0's 12 votes: c2 (EN) sits at rank 2, c1 (HI) at rank 3
        assert_eq!(d.ranks(2, 0).get(2), 12.0);
        assert_eq!(d.ranks(1, 0).get(3), 12.0);
        assert_eq!(d.ranks(0, 0).get(1), 12.0);
    }

    #[test]
    fn conservation_holds_for_both_solvers() {
        for solver in [&WaterFill as &dyn BoundedAllocator, &ProportionalToBounds] {
            let (channels, mut d) = registry(&["EN", "HI", "EN", "PR", "EN"]);
            for (ch, v) in [80.0, 79.2, 46.2, 45.1, 42.7].iter().enumerate() {
                d.set_count(ch, 0, *v);
                d.set_count(ch, 1, v / 3.0);
            }
            let faults = allocate_ranks(&mut d, &channels, solver);
            assert!(faults.is_empty());
            assert!(conservation_report(&d, &faults).is_empty(), "{}", solver.name());
        }
    }

    #[test]
    fn failing_solver_zeroes_only_that_country() {
        struct Refuse;
        impl BoundedAllocator for Refuse {
            fn name(&self) -> &'static str {
                "refuse"
            }
            fn allocate(&self, total: f64, _bounds: &[f64]) -> Result<Vec<f64>, ModelError> {
                if total > 5.0 {
                    Err(ModelError::AllocationInfeasible { total, capacity: 0.0 })
                } else {
                    WaterFill.allocate(total, _bounds)
                }
            }
        }

        let (channels, mut d) = registry(&["EN", "EN", "EN"]);
        for ch in 0..3 {
            d.set_count(ch, 0, 10.0);
            d.set_count(ch, 1, 1.0);
        }
        let faults = allocate_ranks(&mut d, &channels, &Refuse);
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].country, 0);
        assert_eq!(d.ranks(0, 0).total(), 0.0);
        assert_eq!(d.count(0, 0), 10.0);
        assert!((d.ranks(0, 1).total() - 3.0).abs() < 1e-9);
        assert!(conservation_report(&d, &faults).is_empty());
    }

    proptest! {
        #[test]
        fn rank_tables_conserve_mass(
            cells in prop::collection::vec((0usize..3, 0.0f64..500.0), 1..7),
            proportional in any::<bool>(),
        ) {
            let langs: Vec<&str> = cells.iter().map(|(l, _)| ["EN", "HI", "PR"][*l]).collect();
            let (channels, mut d) = registry(&langs);
            for (ch, (_, v)) in cells.iter().enumerate() {
                d.set_count(ch, 0, *v);
            }
            let solver: &dyn BoundedAllocator =
                if proportional { &ProportionalToBounds } else { &WaterFill };
            let faults = allocate_ranks(&mut d, &channels, solver);
            prop_assert!(faults.is_empty());
            prop_assert!(conservation_report(&d, &faults).is_empty());
        }
    }
}

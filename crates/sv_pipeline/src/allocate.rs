//! ALLOCATE stage: population reshaping, both vote distributions and the
//! rank tables.
//!
//! Input: validated countries/channels and a `Params` snapshot (exclusive
//! shares, rank solver). Output: an `AllocationStage` that every method reads
//! from. No RNG here; the same inputs always give the same tables.
//!
//! The proportional distribution carries the rank tables (ranked methods);
//! the exclusive distribution only carries counts (FPTP and approval).

use sv_algo::allocation::{allocate_ranks, conservation_report, solver_for, ConservationIssue, RankFault};
use sv_algo::distribution::{distribute_exclusive, distribute_proportional, DistributionNotice};
use sv_algo::{reshape_population, total_support};
use sv_core::{Channel, Country, Distribution, ModelError, Params, PopulationProfile};
use tracing::{info, warn};

/// Everything the methods need, built once per run.
#[derive(Debug, Clone)]
pub struct AllocationStage {
    pub profiles: Vec<PopulationProfile>,
    /// Proportional counts plus rank tables.
    pub proportional: Distribution,
    /// Exclusive counts (2 dp); rank tables stay empty.
    pub exclusive: Distribution,
    pub notices: Vec<DistributionNotice>,
    pub faults: Vec<RankFault>,
}

impl AllocationStage {
    /// Useful population per country (registry order).
    pub fn useful_population(&self) -> Vec<f64> {
        self.profiles.iter().map(|p| p.useful_population).collect()
    }
}

/// Setup failures: data errors abort the run; a conservation breach means the
/// rank allocator itself is broken.
#[derive(Debug, Clone, PartialEq)]
pub enum AllocateError {
    Model(ModelError),
    Conservation(Vec<ConservationIssue>),
}

impl From<ModelError> for AllocateError {
    fn from(e: ModelError) -> Self {
        AllocateError::Model(e)
    }
}

pub fn allocate_all(
    countries: &[Country],
    channels: &[Channel],
    params: &Params,
) -> Result<AllocationStage, AllocateError> {
    let target = total_support(channels);
    let profiles = reshape_population(countries, target)?;
    info!(
        target: "sv_pipeline::allocate",
        countries = countries.len(),
        world_support = target,
        "population reshaped"
    );

    let mut proportional = distribute_proportional(channels, countries, &profiles)?;
    let exclusive = distribute_exclusive(channels, countries, &params.exclusive)?;
    info!(
        target: "sv_pipeline::allocate",
        proportional_total = proportional.total(),
        exclusive_total = exclusive.distribution.total(),
        notices = exclusive.notices.len(),
        "votes distributed"
    );

    let solver = solver_for(params.rank_solver);
    let faults = allocate_ranks(&mut proportional, channels, solver);
    for f in &faults {
        warn!(
            target: "sv_pipeline::allocate",
            country = %proportional.country_ids()[f.country],
            error = %f.error,
            "rank tables zeroed"
        );
    }

    let issues = conservation_report(&proportional, &faults);
    if !issues.is_empty() {
        return Err(AllocateError::Conservation(issues));
    }
    info!(
        target: "sv_pipeline::allocate",
        solver = solver.name(),
        faults = faults.len(),
        "ranks allocated"
    );

    Ok(AllocationStage {
        profiles,
        proportional,
        exclusive: exclusive.distribution,
        notices: exclusive.notices,
        faults,
    })
}

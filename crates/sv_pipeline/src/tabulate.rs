//! crates/sv_pipeline/src/tabulate.rs
//! TABULATE stage: run the selected methods, in the order given, against the
//! allocation stage. One `SimRng` is threaded through all of them, so the
//! method order is part of what a seed reproduces.
//!
//! FPTP and approval read the exclusive counts; IRV, Borda and Condorcet read
//! the proportional rank tables.

use sv_algo::tabulation::{
    tabulate_approval, tabulate_borda, tabulate_condorcet, tabulate_irv, tabulate_plurality, voting_population,
};
use sv_algo::{CondorcetLog, CountryOutcome, IrvLog};
use sv_core::rng::DrawCrumb;
use sv_core::{Method, SimRng};
use tracing::info;

use crate::allocate::AllocationStage;

// ----- Per-method output -----------------------------------------------------------------------

/// Method-specific audit trail kept next to the outcomes.
#[derive(Clone, Debug, PartialEq)]
pub enum MethodDetail {
    None,
    Plurality { tie_breaks: Vec<DrawCrumb> },
    Irv(Vec<IrvLog>),
    Condorcet(Vec<CondorcetLog>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodRun {
    pub method: Method,
    /// One entry per country, registry order.
    pub outcomes: Vec<CountryOutcome>,
    pub detail: MethodDetail,
}

// ----- Dispatch --------------------------------------------------------------------------------

pub fn tabulate_methods(methods: &[Method], stage: &AllocationStage, rng: &mut SimRng) -> Vec<MethodRun> {
    // Plurality vote totals, kept from the FPTP run for approval.
    let mut voters: Option<Vec<f64>> = None;
    methods.iter().map(|&m| tabulate_one(m, stage, rng, &mut voters)).collect()
}

fn tabulate_one(
    method: Method,
    stage: &AllocationStage,
    rng: &mut SimRng,
    voters: &mut Option<Vec<f64>>,
) -> MethodRun {
    let before = rng.words_consumed();
    let (outcomes, detail) = match method {
        Method::Fptp => {
            let tally = tabulate_plurality(&stage.exclusive, rng);
            *voters = Some(tally.voting_population);
            (tally.outcomes, MethodDetail::Plurality { tie_breaks: tally.tie_breaks })
        }
        Method::Approval => {
            let voters = voters.get_or_insert_with(|| voting_population(&stage.exclusive));
            (tabulate_approval(&stage.exclusive, voters, rng), MethodDetail::None)
        }
        Method::Irv => {
            let (outcomes, logs) = tabulate_irv(&stage.proportional, &stage.useful_population(), rng);
            (outcomes, MethodDetail::Irv(logs))
        }
        Method::Borda => (tabulate_borda(&stage.proportional), MethodDetail::None),
        Method::Condorcet => {
            let (outcomes, logs) = tabulate_condorcet(&stage.proportional);
            (outcomes, MethodDetail::Condorcet(logs))
        }
    };

    info!(
        target: "sv_pipeline::tabulate",
        method = method.as_str(),
        decided = outcomes.iter().filter(|o| o.winner().is_some()).count(),
        countries = outcomes.len(),
        rng_words = (rng.words_consumed() - before) as u64,
        "method tabulated"
    );
    MethodRun { method, outcomes, detail }
}

// crates/sv_algo/src/lib.rs
//! Algorithm layer. Control flow of a run:
//!
//! reshape → distribute (proportional | exclusive) → allocate ranks → tabulate.
//!
//! Every function here is pure over its inputs except for the `SimRng` it is
//! handed; methods that need to mutate rank tables work on private copies.
#![forbid(unsafe_code)]

pub use sv_core::{Channel, ChannelId, Country, CountryId, Distribution, ModelError, SimRng};

// ----------------------------- Per-country outcome -----------------------------

/// What one country contributes to a method's seat tally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountryOutcome {
    /// Registry index of the winning channel.
    Winner(usize),
    /// A legitimate terminal state (all-zero votes, Borda all-zero, Condorcet tie).
    NoWinner,
}

impl CountryOutcome {
    pub fn winner(self) -> Option<usize> {
        match self {
            CountryOutcome::Winner(c) => Some(c),
            CountryOutcome::NoWinner => None,
        }
    }
}

// ----------------------------- Stages -----------------------------

pub mod reshape;

pub mod distribution {
    pub mod exclusive;
    pub mod proportional;

    pub use exclusive::{distribute_exclusive, DistributionNotice, ExclusiveOutcome};
    pub use proportional::distribute_proportional;
}

pub mod allocation {
    pub mod bounded;
    pub mod ranks;

    pub use bounded::{solver_for, BoundedAllocator, ProportionalToBounds, WaterFill};
    pub use ranks::{allocate_ranks, conservation_report, ConservationIssue, RankFault};
}

// ----------------------------- Tabulation (public surface) ---------------------------

pub mod tabulation {
    pub mod approval;
    pub mod borda;
    pub mod plurality;
    pub mod ranked_condorcet;
    pub mod ranked_irv;

    pub use approval::tabulate_approval;
    pub use borda::{borda_scores, tabulate_borda};
    pub use plurality::{tabulate_plurality, voting_population, PluralityTally};
    pub use ranked_condorcet::{tabulate_condorcet, CondorcetLog, Pairwise};
    pub use ranked_irv::{tabulate_irv, IrvLog, IrvRound};
}

pub use reshape::{reshape_population, total_support};
pub use tabulation::{CondorcetLog, IrvLog, IrvRound, Pairwise, PluralityTally};

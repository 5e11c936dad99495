//! build_result.rs
//! Assemble the canonical result artifact.
//!
//! The payload is everything except the id. `id = "RES:" + sha256(canonical
//! payload)`, and the returned digest covers the complete document as it is
//! written to disk (id included). Floats are rounded before hashing so the
//! bytes do not depend on last-bit noise: counts to 2 dp, IRV masses to 4 dp.

use serde::{Deserialize, Serialize};
use sv_algo::distribution::DistributionNotice;
use sv_core::numeric::{round2, round_dp};
use sv_core::variables::ExclusiveShares;
use sv_core::{Channel, ChannelId, Country, CountryId, LanguageCode, Method, RankSolver};
use sv_io::{canonical_json, hasher};

use crate::aggregate::ElectionResult;
use crate::allocate::AllocationStage;
use crate::tabulate::{MethodDetail, MethodRun};
use crate::PipelineError;

// ---------- Document shape ----------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDoc {
    /// "RES:<hex64>"
    pub id: String,
    #[serde(flatten)]
    pub body: ResultBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<String>,
    pub seed: u64,
    pub exclusive: ExclusiveShares,
    pub rank_solver: RankSolver,
    pub countries: Vec<CountryRow>,
    pub channels: Vec<ChannelRow>,
    pub methods: Vec<MethodResultDoc>,
    pub distributions: DistributionsDoc,
    pub rank_faults: Vec<RankFaultDoc>,
    pub notices: Vec<NoticeDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRow {
    pub id: CountryId,
    pub name: String,
    pub useful_population: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRow {
    pub id: ChannelId,
    pub name: String,
    pub country: CountryId,
    pub language: LanguageCode,
    pub support: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResultDoc {
    pub method: Method,
    /// Registry order.
    pub seats: Vec<SeatRow>,
    pub no_winner: u32,
    pub government: Option<ChannelId>,
    pub government_tied: bool,
    pub winners: Vec<WinnerRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tie_breaks: Vec<TieBreakDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub irv: Vec<IrvCountryDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub condorcet: Vec<CondorcetCountryDoc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatRow {
    pub channel: ChannelId,
    pub seats: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerRow {
    pub country: CountryId,
    pub winner: Option<ChannelId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieBreakDoc {
    pub ctx: String,
    pub pick: usize,
    pub word_index: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrvCountryDoc {
    pub country: CountryId,
    pub quota: f64,
    pub rounds: Vec<IrvRoundDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrvRoundDoc {
    pub eliminated: ChannelId,
    pub transferred: f64,
    pub unplaced: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CondorcetCountryDoc {
    pub country: CountryId,
    /// Pairwise wins per channel, registry order.
    pub wins: Vec<u32>,
    pub ties: u32,
}

/// Count tables `[channel][country]`, 2 dp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionsDoc {
    pub proportional: Vec<Vec<f64>>,
    pub exclusive: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankFaultDoc {
    pub country: CountryId,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoticeDoc {
    pub channel: ChannelId,
    pub kind: String,
    pub mass: f64,
}

// ---------- Inputs ----------

pub struct ResultInputs<'a> {
    pub scenario_id: Option<&'a str>,
    pub seed: u64,
    pub exclusive: ExclusiveShares,
    pub rank_solver: RankSolver,
    pub countries: &'a [Country],
    pub channels: &'a [Channel],
    pub stage: &'a AllocationStage,
    pub runs: &'a [MethodRun],
    pub results: &'a [ElectionResult],
}

/// Returns the document and the sha256 of its canonical bytes.
pub fn build_result(inp: &ResultInputs<'_>) -> Result<(ResultDoc, String), PipelineError> {
    if inp.runs.len() != inp.results.len() {
        return Err(PipelineError::Build(format!(
            "{} method runs but {} aggregated results",
            inp.runs.len(),
            inp.results.len()
        )));
    }

    let body = ResultBody {
        scenario_id: inp.scenario_id.map(str::to_string),
        seed: inp.seed,
        exclusive: inp.exclusive,
        rank_solver: inp.rank_solver,
        countries: inp
            .countries
            .iter()
            .zip(&inp.stage.profiles)
            .map(|(c, p)| CountryRow {
                id: c.id.clone(),
                name: c.display_name().to_string(),
                useful_population: round_dp(p.useful_population, 4),
            })
            .collect(),
        channels: inp
            .channels
            .iter()
            .map(|c| ChannelRow {
                id: c.id.clone(),
                name: c.display_name().to_string(),
                country: c.country.clone(),
                language: c.language.clone(),
                support: round_dp(c.support, 6),
            })
            .collect(),
        methods: inp
            .runs
            .iter()
            .zip(inp.results)
            .map(|(run, res)| method_doc(run, res, inp.channels, inp.countries))
            .collect(),
        distributions: DistributionsDoc {
            proportional: inp.stage.proportional.count_matrix(2),
            exclusive: inp.stage.exclusive.count_matrix(2),
        },
        rank_faults: inp
            .stage
            .faults
            .iter()
            .map(|f| RankFaultDoc {
                country: inp.countries[f.country].id.clone(),
                error: f.error.to_string(),
            })
            .collect(),
        notices: inp.stage.notices.iter().map(notice_doc).collect(),
    };

    let id = hasher::res_id_from_canonical(&body).map_err(|e| PipelineError::Build(e.to_string()))?;
    let doc = ResultDoc { id, body };
    let bytes = canonical_json::to_canonical_bytes_of(&doc).map_err(PipelineError::from)?;
    Ok((doc, hasher::sha256_hex(&bytes)))
}

// ---------- Helpers ----------

fn method_doc(run: &MethodRun, res: &ElectionResult, channels: &[Channel], countries: &[Country]) -> MethodResultDoc {
    let ch_id = |i: usize| channels[i].id.clone();

    let mut doc = MethodResultDoc {
        method: res.method,
        seats: res
            .seats
            .iter()
            .enumerate()
            .map(|(i, &seats)| SeatRow { channel: ch_id(i), seats })
            .collect(),
        no_winner: res.no_winner,
        government: res.government.map(ch_id),
        government_tied: res.government_tied,
        winners: res
            .winners
            .iter()
            .zip(countries)
            .map(|(w, c)| WinnerRow { country: c.id.clone(), winner: w.map(ch_id) })
            .collect(),
        tie_breaks: Vec::new(),
        irv: Vec::new(),
        condorcet: Vec::new(),
    };

    match &run.detail {
        MethodDetail::None => {}
        MethodDetail::Plurality { tie_breaks } => {
            doc.tie_breaks = tie_breaks
                .iter()
                .map(|c| TieBreakDoc {
                    ctx: c.ctx.to_string(),
                    pick: c.pick,
                    word_index: u64::try_from(c.word_index).unwrap_or(u64::MAX),
                })
                .collect();
        }
        MethodDetail::Irv(logs) => {
            doc.irv = logs
                .iter()
                .filter(|l| !l.rounds.is_empty())
                .map(|l| IrvCountryDoc {
                    country: countries[l.country].id.clone(),
                    quota: round_dp(l.quota, 4),
                    rounds: l
                        .rounds
                        .iter()
                        .map(|r| IrvRoundDoc {
                            eliminated: ch_id(r.eliminated),
                            transferred: round_dp(r.transferred, 4),
                            unplaced: round_dp(r.unplaced, 4),
                        })
                        .collect(),
                })
                .collect();
        }
        MethodDetail::Condorcet(logs) => {
            doc.condorcet = logs
                .iter()
                .map(|l| CondorcetCountryDoc {
                    country: countries[l.country].id.clone(),
                    wins: l.wins.clone(),
                    ties: l.ties,
                })
                .collect();
        }
    }
    doc
}

fn notice_doc(n: &DistributionNotice) -> NoticeDoc {
    NoticeDoc { channel: n.channel().clone(), kind: n.kind().to_string(), mass: round2(n.mass()) }
}

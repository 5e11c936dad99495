// crates/sv_pipeline/src/build_run_record.rs
//
// Run record: provenance of one execution.
//
// - Engine meta is recorded verbatim (vendor/name/version/build).
// - Input digests are echoed from loading; `params_sha256` covers the
//   *effective* parameters (file values plus CLI overrides), so two runs with
//   equal effective parameters agree on it whatever their source.
// - The seed and the number of RNG words consumed make the run replayable.
// - `id = "RUN:<ts>:<sha256>"` where the digest covers the canonical record
//   without its id.

use serde::{Deserialize, Serialize};
use sv_core::{Method, Params, RankSolver};
use sv_io::hasher;
use sv_io::loader::InputDigests;

use crate::{EngineMeta, PipelineError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecordDoc {
    /// "RUN:<ts>:<hex64>"
    pub id: String,
    #[serde(flatten)]
    pub body: RunRecordBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecordBody {
    /// RFC3339 UTC, seconds precision.
    pub timestamp_utc: String,
    pub engine: EngineMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<String>,
    pub inputs: RunInputs,
    pub determinism: Determinism,
    pub outputs: RunOutputs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInputs {
    pub dataset_sha256: String,
    /// Absent when the run used default parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params_file_sha256: Option<String>,
    /// Canonical digest of the parameters actually used.
    pub params_sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Determinism {
    pub seed: u64,
    pub rng_words_consumed: u64,
    pub methods: Vec<Method>,
    pub rank_solver: RankSolver,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutputs {
    pub result_id: String,
    pub result_sha256: String,
}

pub struct RunInputsRef<'a> {
    pub timestamp_utc: &'a str,
    pub engine: &'a EngineMeta,
    pub scenario_id: Option<&'a str>,
    pub digests: &'a InputDigests,
    pub params: &'a Params,
    pub seed: u64,
    pub rng_words_consumed: u128,
    pub result_id: &'a str,
    pub result_sha256: &'a str,
}

pub fn build_run_record(inp: &RunInputsRef<'_>) -> Result<RunRecordDoc, PipelineError> {
    let build_err = |e: hasher::HashError| PipelineError::Build(e.to_string());

    let timestamp_utc = hasher::normalize_utc_timestamp(inp.timestamp_utc).map_err(build_err)?;

    // The seed is recorded under `determinism`, not hashed twice.
    let effective = Params { seed: None, ..inp.params.clone() };
    let params_sha256 = hasher::sha256_canonical(&effective).map_err(build_err)?;

    let body = RunRecordBody {
        timestamp_utc,
        engine: inp.engine.clone(),
        scenario_id: inp.scenario_id.map(str::to_string),
        inputs: RunInputs {
            dataset_sha256: inp.digests.dataset_sha256.clone(),
            params_file_sha256: inp.digests.params_sha256.clone(),
            params_sha256,
        },
        determinism: Determinism {
            seed: inp.seed,
            rng_words_consumed: u64::try_from(inp.rng_words_consumed).unwrap_or(u64::MAX),
            methods: inp.params.methods.clone(),
            rank_solver: inp.params.rank_solver,
        },
        outputs: RunOutputs {
            result_id: inp.result_id.to_string(),
            result_sha256: inp.result_sha256.to_string(),
        },
    };

    let id = hasher::run_id_from_canonical(&body.timestamp_utc, &body).map_err(build_err)?;
    Ok(RunRecordDoc { id, body })
}

//! sv_pipeline: deterministic run surface (validate → allocate → tabulate → aggregate → build).
//! This crate stays I/O-free apart from the manifest convenience entry; JSON,
//! schemas and hashing go through `sv_io`, the math through `sv_algo`.

#![forbid(unsafe_code)]

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sv_core::SimRng;
use sv_io::loader::{self, LoadedScenario};
use sv_io::manifest::ManifestError;
use sv_io::{hasher, IoError};
use tracing::{info, warn};

pub mod aggregate;
pub mod allocate;
pub mod build_result;
pub mod build_run_record;
pub mod tabulate;
pub mod validate;

pub use aggregate::ElectionResult;
pub use build_result::ResultDoc;
pub use build_run_record::RunRecordDoc;
pub use validate::ValidationReport;

use allocate::AllocateError;
use build_result::ResultInputs;
use build_run_record::RunInputsRef;

/// Engine identifiers, echoed in every run record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineMeta {
    pub vendor: String,
    pub name: String,
    pub version: String,
    pub build: String,
}

/// Pipeline context: inputs are already loaded and schema-checked by `sv_io`.
#[derive(Debug, Clone)]
pub struct PipelineCtx {
    pub scenario: LoadedScenario,
    pub engine_meta: EngineMeta,
    /// Effective run seed (flag, params file or entropy, resolved by the caller).
    pub seed: u64,
    /// Fixed RFC3339 UTC stamp for the run record; `None` reads the clock.
    pub timestamp_utc: Option<String>,
}

/// Top-level pipeline outputs.
#[derive(Debug, Clone)]
pub struct PipelineOutputs {
    pub result: ResultDoc,
    /// sha256 of the canonical `result.json` bytes.
    pub result_sha256: String,
    pub run_record: RunRecordDoc,
    pub results: Vec<ElectionResult>,
    pub validation: ValidationReport,
}

/// Single error surface for the pipeline orchestration.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    Io(String),
    Schema(String),
    /// Data errors; nothing was computed.
    Validate(String),
    /// Manifest digests or expectations did not match.
    Verify(String),
    Allocate(String),
    Build(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use PipelineError::*;
        match self {
            Io(m) => write!(f, "io: {m}"),
            Schema(m) => write!(f, "schema: {m}"),
            Validate(m) => write!(f, "validation failed: {m}"),
            Verify(m) => write!(f, "verification failed: {m}"),
            Allocate(m) => write!(f, "allocation failed: {m}"),
            Build(m) => write!(f, "build failed: {m}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<IoError> for PipelineError {
    fn from(e: IoError) -> Self {
        use PipelineError::*;
        match e {
            IoError::Path(m) => Io(format!("path: {m}")),
            IoError::Limit(m) => Io(format!("limit: {m}")),
            IoError::Json { pointer, msg } => Schema(format!("json {pointer}: {msg}")),
            IoError::Schema(m) => Schema(m),
            IoError::Hash(m) => Build(format!("hash: {m}")),
            IoError::Invalid(m) => Validate(m),
            IoError::Manifest(m) if m.is_verification_failure() => Verify(m.to_string()),
            IoError::Manifest(m @ (ManifestError::Io(..) | ManifestError::NotAFile(..))) => {
                Io(format!("manifest: {m}"))
            }
            IoError::Manifest(m) => Validate(format!("manifest: {m}")),
        }
    }
}

impl From<AllocateError> for PipelineError {
    fn from(e: AllocateError) -> Self {
        match e {
            AllocateError::Model(m) if m.is_data_error() => PipelineError::Validate(m.to_string()),
            AllocateError::Model(m) => PipelineError::Allocate(m.to_string()),
            AllocateError::Conservation(issues) => PipelineError::Allocate(format!(
                "{} conservation breaches, first: {:?}",
                issues.len(),
                issues.first()
            )),
        }
    }
}

// -------------------------------------- Public API --------------------------------------

/// Validate a loaded scenario without running anything. Warnings are logged.
pub fn validate_scenario(scenario: &LoadedScenario) -> ValidationReport {
    let report = validate::validate(&scenario.dataset.countries, &scenario.dataset.channels, &scenario.params);
    for w in report.warnings() {
        warn!(target: "sv_pipeline::validate", code = w.code, "{}", w.message);
    }
    report
}

/// Run the whole pipeline on a preloaded context.
pub fn run_with_ctx(ctx: PipelineCtx) -> Result<PipelineOutputs, PipelineError> {
    let PipelineCtx { scenario, engine_meta, seed, timestamp_utc } = ctx;
    let countries = &scenario.dataset.countries;
    let channels = &scenario.dataset.channels;
    let params = &scenario.params;

    // --- VALIDATE ---
    let validation = validate_scenario(&scenario);
    if !validation.pass {
        return Err(PipelineError::Validate(validation.error_summary()));
    }
    info!(
        target: "sv_pipeline",
        countries = countries.len(),
        channels = channels.len(),
        warnings = validation.warnings().count(),
        "inputs validated"
    );

    // --- ALLOCATE (reshape, distributions, ranks) ---
    let stage = allocate::allocate_all(countries, channels, params)?;

    // --- TABULATE ---
    let mut rng = SimRng::from_seed_u64(seed);
    let runs = tabulate::tabulate_methods(&params.methods, &stage, &mut rng);

    // --- AGGREGATE ---
    let results = aggregate::aggregate_runs(&runs, channels.len());
    if let Some(bad) = results.iter().find(|r| r.seats_total() as usize != countries.len()) {
        return Err(PipelineError::Build(format!(
            "{} assigned {} seats for {} countries",
            bad.method,
            bad.seats_total(),
            countries.len()
        )));
    }

    // --- BUILD_RESULT ---
    let (result, result_sha256) = build_result::build_result(&ResultInputs {
        scenario_id: scenario.scenario_id.as_deref(),
        seed,
        exclusive: params.exclusive,
        rank_solver: params.rank_solver,
        countries,
        channels,
        stage: &stage,
        runs: &runs,
        results: &results,
    })?;

    // --- BUILD_RUN_RECORD ---
    let timestamp = timestamp_utc.unwrap_or_else(hasher::now_utc_timestamp);
    let run_record = build_run_record::build_run_record(&RunInputsRef {
        timestamp_utc: &timestamp,
        engine: &engine_meta,
        scenario_id: scenario.scenario_id.as_deref(),
        digests: &scenario.digests,
        params,
        seed,
        rng_words_consumed: rng.words_consumed(),
        result_id: &result.id,
        result_sha256: &result_sha256,
    })?;

    info!(target: "sv_pipeline", result_id = %result.id, run_id = %run_record.id, "run complete");
    Ok(PipelineOutputs { result, result_sha256, run_record, results, validation })
}

/// Convenience entry: load and verify a manifest, then run with the seed from
/// the parameter set.
pub fn run_from_manifest_path<P: AsRef<Path>>(path: P) -> Result<PipelineOutputs, PipelineError> {
    let engine_meta = engine_identifiers();
    let scenario = loader::load_scenario_from_manifest(path.as_ref(), &engine_meta.version)?;
    let seed = scenario
        .params
        .seed
        .ok_or_else(|| PipelineError::Validate("parameter set carries no seed".to_string()))?;
    run_with_ctx(PipelineCtx { scenario, engine_meta, seed, timestamp_utc: None })
}

/// Engine identifiers for the run record and manifest `expect` checks.
pub fn engine_identifiers() -> EngineMeta {
    EngineMeta {
        vendor: "svsim".to_string(),
        name: "sv_engine".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: option_env!("SV_BUILD").unwrap_or("dev").to_string(),
    }
}

#[cfg(test)]
pub(crate) mod testkit {
    use std::collections::BTreeMap;

    use sv_core::{Channel, Country, LanguageCode};

    pub fn country(id: &str, population: f64, langs: &[(&str, f64)]) -> Country {
        Country {
            id: id.parse().unwrap(),
            name: None,
            population,
            languages: langs
                .iter()
                .map(|(l, p)| (l.parse::<LanguageCode>().unwrap(), *p))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    pub fn channel(id: &str, home: &str, lang: &str, support: f64) -> Channel {
        Channel {
            id: id.parse().unwrap(),
            name: None,
            country: home.parse().unwrap(),
            language: lang.parse().unwrap(),
            support,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{channel, country};
    use sv_core::{Method, Params};
    use sv_io::loader::{Dataset, InputDigests};

    fn ctx(seed: u64) -> PipelineCtx {
        PipelineCtx {
            scenario: LoadedScenario {
                scenario_id: Some("unit".into()),
                dataset: Dataset {
                    id: None,
                    population_unit: 1e6,
                    countries: vec![
                        country("US", 160.0, &[("EN", 80.0), ("ES", 12.0)]),
                        country("MX", 30.0, &[("ES", 90.0), ("EN", 10.0)]),
                        country("JP", 45.0, &[("EN", 2.0)]),
                    ],
                    channels: vec![
                        channel("a", "US", "EN", 50.0),
                        channel("b", "MX", "ES", 20.0),
                        channel("c", "US", "EN", 15.0),
                    ],
                },
                params: Params::default(),
                digests: InputDigests { dataset_sha256: "0".repeat(64), params_sha256: None },
            },
            engine_meta: engine_identifiers(),
            seed,
            timestamp_utc: Some("2026-10-16T09:30:00Z".into()),
        }
    }

    #[test]
    fn every_method_fills_every_seat() {
        let out = run_with_ctx(ctx(11)).unwrap();
        assert_eq!(out.results.len(), Method::ALL.len());
        for r in &out.results {
            assert_eq!(r.seats_total(), 3, "{}", r.method);
        }
        assert!(out.result.id.starts_with("RES:"));
        assert_eq!(out.run_record.body.outputs.result_id, out.result.id);
        assert_eq!(out.run_record.body.determinism.seed, 11);
    }

    #[test]
    fn same_seed_same_ids() {
        let a = run_with_ctx(ctx(5)).unwrap();
        let b = run_with_ctx(ctx(5)).unwrap();
        assert_eq!(a.result, b.result);
        assert_eq!(a.result_sha256, b.result_sha256);
        assert_eq!(a.run_record.id, b.run_record.id);
    }

    #[test]
    fn data_errors_abort_before_tabulation() {
        let mut c = ctx(1);
        c.scenario.dataset.countries[0].languages.insert("FR".parse().unwrap(), 30.0);
        match run_with_ctx(c) {
            Err(PipelineError::Validate(m)) => assert!(m.contains("US"), "{m}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn io_errors_map_to_buckets() {
        assert!(matches!(PipelineError::from(IoError::Limit("x".into())), PipelineError::Io(_)));
        assert!(matches!(PipelineError::from(IoError::Schema("x".into())), PipelineError::Schema(_)));
        let m = ManifestError::DigestMismatch("dataset_path", "x".into());
        assert!(matches!(PipelineError::from(IoError::Manifest(m)), PipelineError::Verify(_)));
    }
}

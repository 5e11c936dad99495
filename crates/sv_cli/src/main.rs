// crates/sv_cli/src/main.rs
//
// svsim: load → overrides → seed → pipeline → artifacts → optional text report.
// Logging goes to stderr; stdout carries only the summary.

mod args;
mod render;

mod exitcodes {
    pub const OK: u8 = 0;
    pub const VALIDATION: u8 = 2;
    pub const SELF_VERIFY: u8 = 3;
    pub const IO: u8 = 4;
    pub const INTERNAL: u8 = 5;
}

use std::path::Path;
use std::process::ExitCode;

use rand_core::{OsRng, RngCore};
use sv_io::canonical_json::{write_atomic, write_canonical_file};
use sv_io::loader::{self, LoadedScenario};
use sv_pipeline::{engine_identifiers, run_with_ctx, EngineMeta, PipelineCtx, PipelineError, PipelineOutputs};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use args::{parse_and_validate as parse_cli, Args};

/// Central error type for CLI → exit-code mapping.
#[derive(Debug)]
enum MainError {
    /// Schema, JSON shape, manifest shape and data-domain failures.
    Validation(String),
    /// Manifest digest or engine expectation mismatch.
    SelfVerify(String),
    /// Read/write/path/limit failures.
    Io(String),
    /// Model failures that are not the input's fault.
    Internal(String),
}

impl MainError {
    fn exit_code(&self) -> u8 {
        match self {
            MainError::Validation(_) => exitcodes::VALIDATION,
            MainError::SelfVerify(_) => exitcodes::SELF_VERIFY,
            MainError::Io(_) => exitcodes::IO,
            MainError::Internal(_) => exitcodes::INTERNAL,
        }
    }
}

impl std::fmt::Display for MainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MainError::Validation(m) => write!(f, "validation: {m}"),
            MainError::SelfVerify(m) => write!(f, "self-verify: {m}"),
            MainError::Io(m) => write!(f, "io: {m}"),
            MainError::Internal(m) => write!(f, "internal: {m}"),
        }
    }
}

impl From<PipelineError> for MainError {
    fn from(e: PipelineError) -> Self {
        use PipelineError::*;
        match e {
            Schema(m) | Validate(m) => MainError::Validation(m),
            Verify(m) => MainError::SelfVerify(m),
            Io(m) => MainError::Io(m),
            Allocate(m) | Build(m) => MainError::Internal(m),
        }
    }
}

impl From<sv_io::IoError> for MainError {
    fn from(e: sv_io::IoError) -> Self {
        MainError::from(PipelineError::from(e))
    }
}

fn main() -> ExitCode {
    let args = match parse_cli() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("svsim: error: {e}");
            return ExitCode::from(match e {
                args::CliError::NotFound(_) => exitcodes::IO,
                _ => exitcodes::VALIDATION,
            });
        }
    };
    init_logging(&args);

    let outcome = if args.validate_only { validate_only(&args) } else { run_once(&args) };
    match outcome {
        Ok(()) => ExitCode::from(exitcodes::OK),
        Err(e) => {
            error!("{e}");
            eprintln!("svsim: error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

/// `RUST_LOG` wins; otherwise info, warn with --quiet, debug with --verbose.
fn init_logging(args: &Args) {
    let default = if args.quiet {
        "warn"
    } else if args.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}

/// Load, apply overrides and run the semantic checks; no methods, no artifacts.
fn validate_only(args: &Args) -> Result<(), MainError> {
    let engine = engine_identifiers();
    let scenario = load(args, &engine)?;
    let report = sv_pipeline::validate_scenario(&scenario);
    if !report.pass {
        return Err(MainError::Validation(report.error_summary()));
    }
    info!(
        countries = scenario.dataset.countries.len(),
        channels = scenario.dataset.channels.len(),
        warnings = report.warnings().count(),
        "validate-only: inputs OK"
    );
    Ok(())
}

fn run_once(args: &Args) -> Result<(), MainError> {
    let engine_meta = engine_identifiers();
    let scenario = load(args, &engine_meta)?;

    let seed = match args.seed.or(scenario.params.seed) {
        Some(s) => s,
        None => {
            let s = fresh_seed()?;
            info!(seed = s, "no seed given; drew one from OS entropy");
            s
        }
    };

    let outs = run_with_ctx(PipelineCtx { scenario, engine_meta, seed, timestamp_utc: None })?;
    write_artifacts(&args.out, &outs)?;

    let summary = render::render_text(&outs.result).map_err(|e| MainError::Internal(format!("render: {e}")))?;
    if args.render.as_deref() == Some("text") {
        write_atomic(&args.out.join("report.txt"), summary.as_bytes())?;
    }
    if !args.quiet {
        print!("{summary}");
    }
    info!(out = %args.out.display(), result_id = %outs.result.id, seed, "artifacts written");
    Ok(())
}

/// Manifest or explicit paths, then CLI overrides.
fn load(args: &Args, engine: &EngineMeta) -> Result<LoadedScenario, MainError> {
    let mut scenario = match (&args.manifest, &args.dataset) {
        (Some(m), _) => loader::load_scenario_from_manifest(m, &engine.version)?,
        (None, Some(d)) => loader::load_scenario_from_paths(d, args.params.as_deref())?,
        (None, None) => return Err(MainError::Validation("no inputs given".into())),
    };

    if let Some(seed) = args.seed {
        scenario.params.seed = Some(seed);
    }
    if let Some(methods) = &args.methods {
        scenario.params.methods = methods.0.clone();
    }
    if let Some(solver) = args.rank_solver {
        scenario.params.rank_solver = solver;
    }
    Ok(scenario)
}

fn fresh_seed() -> Result<u64, MainError> {
    let mut bytes = [0u8; 8];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| MainError::Io(format!("entropy: {e}")))?;
    Ok(u64::from_le_bytes(bytes))
}

fn write_artifacts(out_dir: &Path, outs: &PipelineOutputs) -> Result<(), MainError> {
    std::fs::create_dir_all(out_dir).map_err(|e| MainError::Io(format!("mkdir {}: {e}", out_dir.display())))?;
    write_canonical_file(&out_dir.join("result.json"), &outs.result)?;
    write_canonical_file(&out_dir.join("run_record.json"), &outs.run_record)?;
    Ok(())
}

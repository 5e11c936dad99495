// crates/sv_cli/src/args.rs
//
// Offline CLI argument surface: flag types, parsing helpers and mode checks.
//
// Rules:
// - No networked paths (reject any scheme:// like http/https/file)
// - Exactly one of: --manifest  XOR  --dataset (with optional --params)
// - Output: --out dir, --render text
// - Seed override: u64 decimal or 0x-hex up to 16 nybbles
// - --validate-only loads and validates inputs without running the methods

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use sv_core::variables::parse_method_list;
use sv_core::{Method, RankSolver};

/// Parsed CLI arguments.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "svsim",
    version,
    disable_help_subcommand = true,
    about = "Simulate channel elections over a country dataset"
)]
pub struct Args {
    // --- Mode selection ---
    /// Scenario manifest JSON (mutually exclusive with --dataset/--params).
    #[arg(long, conflicts_with_all = ["dataset", "params"])]
    pub manifest: Option<PathBuf>,

    /// Dataset JSON (countries and channels).
    #[arg(long)]
    pub dataset: Option<PathBuf>,
    /// Parameter set JSON; defaults apply when omitted.
    #[arg(long, requires = "dataset")]
    pub params: Option<PathBuf>,

    // --- Output & rendering ---
    /// Output directory for result.json and run_record.json.
    #[arg(long, default_value = ".")]
    pub out: PathBuf,
    /// Also write a plain-text report (report.txt).
    #[arg(long, value_parser = ["text"])]
    pub render: Option<String>,

    // --- Overrides ---
    /// Run seed. Accepts decimal u64 or 0x-hex (≤16 hex digits).
    #[arg(long, value_parser = parse_seed)]
    pub seed: Option<u64>,
    /// Comma-separated methods to run, in order (fptp,approval,irv,borda,condorcet).
    #[arg(long, value_parser = parse_methods)]
    pub methods: Option<MethodList>,
    /// Bounded split used by rank allocation (water_fill | proportional).
    #[arg(long, value_parser = parse_rank_solver)]
    pub rank_solver: Option<RankSolver>,

    // --- Control ---
    /// Load and validate inputs only; do not run the methods.
    #[arg(long)]
    pub validate_only: bool,
    /// Only warnings and errors on stderr; no summary on stdout.
    #[arg(long, conflicts_with = "verbose")]
    pub quiet: bool,
    /// Debug-level logging (per-country decisions).
    #[arg(long)]
    pub verbose: bool,
}

/// `--methods` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodList(pub Vec<Method>);

/// Errors surfaced by argument validation. Short and stable for scripts.
#[derive(Debug)]
pub enum CliError {
    Missing(&'static str),
    NonLocalPath(String),
    NotFound(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use CliError::*;
        match self {
            Missing(s) => write!(f, "missing required flag: {s}"),
            NonLocalPath(p) => write!(f, "path must be local file (no scheme): {p}"),
            NotFound(p) => write!(f, "file not found: {p}"),
        }
    }
}
impl std::error::Error for CliError {}

/// Decimal u64 or 0x-hex (1..=16 nybbles).
pub fn parse_seed(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty seed".into());
    }
    if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if rest.is_empty() || rest.len() > 16 || !rest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err("hex seed must be 1..16 hex digits".into());
        }
        u64::from_str_radix(rest, 16).map_err(|_| "hex seed out of range".into())
    } else {
        s.parse::<u64>().map_err(|_| "decimal seed must be a valid u64".into())
    }
}

pub fn parse_methods(s: &str) -> Result<MethodList, String> {
    let methods = parse_method_list(s).map_err(|e| e.to_string())?;
    if methods.is_empty() {
        return Err("at least one method is required".into());
    }
    Ok(MethodList(methods))
}

pub fn parse_rank_solver(s: &str) -> Result<RankSolver, String> {
    s.parse::<RankSolver>().map_err(|e| e.to_string())
}

#[inline]
fn has_scheme(s: &str) -> bool {
    let lower = s.trim().to_ascii_lowercase();
    lower.contains("://") || lower.starts_with("http:") || lower.starts_with("https:") || lower.starts_with("file:")
}

#[inline]
fn ensure_local_path(p: &Path) -> Result<(), CliError> {
    if let Some(s) = p.to_str() {
        if has_scheme(s) {
            return Err(CliError::NonLocalPath(s.to_string()));
        }
    }
    Ok(())
}

fn iter_all_paths(args: &Args) -> impl Iterator<Item = &Path> {
    [
        args.manifest.as_deref(),
        args.dataset.as_deref(),
        args.params.as_deref(),
        Some(args.out.as_path()),
    ]
    .into_iter()
    .flatten()
}

/// Entry point used by main.rs.
pub fn parse_and_validate() -> Result<Args, CliError> {
    validate(Args::parse())
}

/// Scheme checks, mode checks, existence, then path normalization.
pub fn validate(mut args: Args) -> Result<Args, CliError> {
    for p in iter_all_paths(&args) {
        ensure_local_path(p)?;
    }

    if let Some(m) = &args.manifest {
        ensure_local_exists(m, "--manifest")?;
        args.manifest = args.manifest.take().map(|p| normalize_path(&p));
    } else {
        let dataset = args.dataset.as_ref().ok_or(CliError::Missing("--manifest or --dataset"))?;
        ensure_local_exists(dataset, "--dataset")?;
        if let Some(p) = &args.params {
            ensure_local_exists(p, "--params")?;
        }
        args.dataset = args.dataset.take().map(|p| normalize_path(&p));
        args.params = args.params.take().map(|p| normalize_path(&p));
    }

    args.out = normalize_path(&args.out);
    Ok(args)
}

fn ensure_local_exists(p: &Path, label: &'static str) -> Result<(), CliError> {
    let meta = fs::metadata(p).map_err(|_| CliError::NotFound(format!("{label} {}", p.display())))?;
    if !meta.is_file() {
        return Err(CliError::NotFound(format!("{label} {}", p.display())));
    }
    Ok(())
}

/// Best-effort absolute path; falls back to CWD-relative when the path does
/// not exist yet.
fn normalize_path(p: &Path) -> PathBuf {
    fs::canonicalize(p).unwrap_or_else(|_| {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join(p)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_parser_decimal_and_hex() {
        assert_eq!(parse_seed("42").unwrap(), 42u64);
        assert_eq!(parse_seed("0x2A").unwrap(), 42u64);
        assert!(parse_seed("0x").is_err());
        assert!(parse_seed("0xFFFFFFFFFFFFFFFFF").is_err()); // 17 nybbles
        assert!(parse_seed("-1").is_err());
    }

    #[test]
    fn method_list_keeps_order() {
        assert_eq!(parse_methods("irv,fptp").unwrap(), MethodList(vec![Method::Irv, Method::Fptp]));
        assert!(parse_methods("stv").is_err());
        assert!(parse_methods(",").is_err());
        assert_eq!(parse_rank_solver("proportional").unwrap(), RankSolver::Proportional);
    }

    #[test]
    fn modes_are_exclusive() {
        assert!(Args::try_parse_from(["svsim", "--manifest", "m.json", "--dataset", "d.json"]).is_err());
        assert!(Args::try_parse_from(["svsim", "--params", "p.json"]).is_err());
        assert!(Args::try_parse_from(["svsim", "--quiet", "--verbose"]).is_err());
        let a = Args::try_parse_from(["svsim", "--dataset", "d.json", "--seed", "0x10"]).unwrap();
        assert_eq!(a.seed, Some(16));
    }

    #[test]
    fn missing_inputs_and_schemes_are_rejected() {
        let a = Args::try_parse_from(["svsim"]).unwrap();
        assert!(matches!(validate(a), Err(CliError::Missing(_))));
        let a = Args::try_parse_from(["svsim", "--dataset", "https://x/d.json"]).unwrap();
        assert!(matches!(validate(a), Err(CliError::NonLocalPath(_))));
        let a = Args::try_parse_from(["svsim", "--dataset", "/definitely/not/here.json"]).unwrap();
        assert!(matches!(validate(a), Err(CliError::NotFound(_))));
    }

    #[test]
    fn normalize_path_returns_absolute() {
        let abs = normalize_path(&PathBuf::from("does/not/exist.txt"));
        assert!(abs.is_absolute());
    }
}

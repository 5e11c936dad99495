// crates/sv_io/src/manifest.rs
//
// Scenario manifest: names the dataset and parameter-set files of one run.
//
// • Paths are resolved against the manifest's directory and must be UTF-8.
// • Offline only: any path with a scheme ("://", "http:", "https:") is rejected.
// • Referenced inputs must exist and be regular files.
// • Optional digests are lowercase 64-hex over the *canonical* JSON bytes of
//   the referenced file, and may only name inputs the manifest declares.
// • Optional expectations (engine version) are enforced by the caller.

use std::fs;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical_json::to_canonical_bytes;
use crate::hasher::{is_sha256_hex, sha256_hex};
use crate::loader::read_limited;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Free-form scenario label; not part of any digest.
    #[serde(default)]
    pub id: Option<String>,
    pub dataset_path: String,
    pub params_path: String,
    #[serde(default)]
    pub inputs_sha256: Option<InputDigests>,
    #[serde(default)]
    pub expect: Option<Expectations>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputDigests {
    #[serde(default)]
    pub dataset_path: Option<String>,
    #[serde(default)]
    pub params_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Expectations {
    /// Exact engine version string.
    #[serde(default)]
    pub engine_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedManifest {
    pub id: Option<String>,
    pub dataset_path: Utf8PathBuf,
    pub params_path: Utf8PathBuf,
    pub digests: Option<InputDigests>,
    pub expect: Option<Expectations>,
}

#[derive(Debug)]
pub enum ManifestError {
    Empty(&'static str),
    UrlPath(&'static str, String),
    NonUtf8Path(String),
    Io(&'static str, String),
    NotAFile(&'static str, String),
    Parse(String),
    DigestShape(&'static str, String),
    DigestMismatch(&'static str, String),
    ExpectationMismatch(&'static str, String),
}

impl ManifestError {
    /// Digest or expectation mismatch (the run must not proceed on these inputs).
    pub fn is_verification_failure(&self) -> bool {
        matches!(self, ManifestError::DigestMismatch(..) | ManifestError::ExpectationMismatch(..))
    }
}

impl std::fmt::Display for ManifestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ManifestError::*;
        match self {
            Empty(k) => write!(f, "field must not be empty: {k}"),
            UrlPath(k, v) => write!(f, "path must be local (no scheme) for {k}: {v}"),
            NonUtf8Path(v) => write!(f, "path is not valid UTF-8: {v}"),
            Io(k, v) => write!(f, "cannot access {k}: {v}"),
            NotAFile(k, v) => write!(f, "path is not a file for {k}: {v}"),
            Parse(v) => write!(f, "manifest parse error: {v}"),
            DigestShape(k, v) => write!(f, "invalid sha256 format for {k}: {v}"),
            DigestMismatch(k, v) => write!(f, "sha256 mismatch for {k}: {v}"),
            ExpectationMismatch(k, v) => write!(f, "expectation mismatch for {k}: {v}"),
        }
    }
}

impl std::error::Error for ManifestError {}

// ---------- helpers ----------

/// True if `s` carries a URL scheme.
pub fn has_scheme(s: &str) -> bool {
    let s = s.trim();
    s.contains("://") || s.starts_with("http:") || s.starts_with("https:")
}

fn join_under(base: &Utf8Path, rel: &str) -> Utf8PathBuf {
    let p = Utf8Path::new(rel);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

fn must_exist_file(label: &'static str, p: &Utf8Path) -> Result<(), ManifestError> {
    let md = fs::metadata(p).map_err(|e| ManifestError::Io(label, format!("{p} ({e})")))?;
    if !md.is_file() {
        return Err(ManifestError::NotAFile(label, p.to_string()));
    }
    Ok(())
}

// ---------- validation & resolution ----------

/// Shape and offline checks; no I/O.
pub fn validate_manifest(man: &Manifest) -> Result<(), ManifestError> {
    for (label, value) in [("dataset_path", &man.dataset_path), ("params_path", &man.params_path)] {
        if value.trim().is_empty() {
            return Err(ManifestError::Empty(label));
        }
        if has_scheme(value) {
            return Err(ManifestError::UrlPath(label, value.clone()));
        }
    }
    if let Some(d) = &man.inputs_sha256 {
        for (label, hex) in [("dataset_path", &d.dataset_path), ("params_path", &d.params_path)] {
            if let Some(h) = hex {
                if !is_sha256_hex(h) {
                    return Err(ManifestError::DigestShape(label, h.clone()));
                }
            }
        }
    }
    Ok(())
}

/// Join the manifest paths under `base_dir` and check they are files.
pub fn resolve_paths(base_dir: &Utf8Path, man: &Manifest) -> Result<ResolvedManifest, ManifestError> {
    let dataset = join_under(base_dir, &man.dataset_path);
    let params = join_under(base_dir, &man.params_path);
    must_exist_file("dataset_path", &dataset)?;
    must_exist_file("params_path", &params)?;
    Ok(ResolvedManifest {
        id: man.id.clone(),
        dataset_path: dataset,
        params_path: params,
        digests: man.inputs_sha256.clone(),
        expect: man.expect.clone(),
    })
}

/// sha256 over the canonical JSON bytes of a file.
pub fn canonical_file_digest(path: &Utf8Path) -> Result<String, ManifestError> {
    let bytes = read_limited(path.as_std_path())
        .map_err(|e| ManifestError::Io("read", format!("{path} ({e})")))?;
    let v: Value = serde_json::from_slice(&bytes)
        .map_err(|e| ManifestError::Parse(format!("{path} ({e})")))?;
    let canon = to_canonical_bytes(&v).map_err(|e| ManifestError::Parse(e.to_string()))?;
    Ok(sha256_hex(&canon))
}

/// Verify any provided digests. `Ok(())` when none were provided.
pub fn verify_digests(resolved: &ResolvedManifest) -> Result<(), ManifestError> {
    let Some(d) = &resolved.digests else {
        return Ok(());
    };
    let checks = [
        ("dataset_path", &resolved.dataset_path, &d.dataset_path),
        ("params_path", &resolved.params_path, &d.params_path),
    ];
    for (label, path, expected) in checks {
        let Some(expected) = expected else { continue };
        let got = canonical_file_digest(path)?;
        if &got != expected {
            return Err(ManifestError::DigestMismatch(label, format!("expected={expected} got={got}")));
        }
    }
    Ok(())
}

pub fn enforce_expectations(resolved: &ResolvedManifest, engine_version: &str) -> Result<(), ManifestError> {
    let Some(want) = resolved.expect.as_ref().and_then(|e| e.engine_version.as_ref()) else {
        return Ok(());
    };
    if want != engine_version {
        return Err(ManifestError::ExpectationMismatch(
            "engine_version",
            format!("expected={want} got={engine_version}"),
        ));
    }
    Ok(())
}

/// Read → validate → resolve under the manifest's own directory.
pub fn load_and_resolve_manifest(manifest_path: &Path) -> Result<ResolvedManifest, ManifestError> {
    let manifest_path = Utf8Path::from_path(manifest_path)
        .ok_or_else(|| ManifestError::NonUtf8Path(manifest_path.display().to_string()))?;
    if has_scheme(manifest_path.as_str()) {
        return Err(ManifestError::UrlPath("manifest", manifest_path.to_string()));
    }
    let bytes = read_limited(manifest_path.as_std_path())
        .map_err(|e| ManifestError::Io("manifest", format!("{manifest_path} ({e})")))?;
    let man: Manifest = serde_json::from_slice(&bytes)
        .map_err(|e| ManifestError::Parse(format!("{manifest_path} ({e})")))?;
    validate_manifest(&man)?;

    let base = match manifest_path.parent() {
        Some(p) if !p.as_str().is_empty() => p.to_path_buf(),
        _ => Utf8PathBuf::from("."),
    };
    resolve_paths(&base, &man)
}

/// Full load: resolve, verify digests, enforce expectations.
pub fn load_verify_manifest(
    manifest_path: &Path,
    engine_version: &str,
) -> Result<ResolvedManifest, ManifestError> {
    let resolved = load_and_resolve_manifest(manifest_path)?;
    verify_digests(&resolved)?;
    enforce_expectations(&resolved, engine_version)?;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("dataset.json"), br#"{"countries":[],"channels":[]}"#).unwrap();
        fs::write(dir.path().join("params.json"), br#"{ "seed": 1 }"#).unwrap();
        dir
    }

    fn write_manifest(dir: &Path, body: &str) -> std::path::PathBuf {
        let p = dir.join("manifest.json");
        fs::write(&p, body).unwrap();
        p
    }

    #[test]
    fn resolves_relative_to_manifest_dir() {
        let dir = scenario();
        let m = write_manifest(
            dir.path(),
            r#"{"id":"t","dataset_path":"dataset.json","params_path":"params.json"}"#,
        );
        let r = load_verify_manifest(&m, "0.1.0").unwrap();
        assert!(r.dataset_path.as_std_path().starts_with(dir.path()));
        assert_eq!(r.id.as_deref(), Some("t"));
    }

    #[test]
    fn url_paths_rejected() {
        let man = Manifest {
            id: None,
            dataset_path: "https://example.org/d.json".into(),
            params_path: "params.json".into(),
            inputs_sha256: None,
            expect: None,
        };
        assert!(matches!(validate_manifest(&man), Err(ManifestError::UrlPath("dataset_path", _))));
    }

    #[test]
    fn unknown_fields_rejected() {
        let dir = scenario();
        let m = write_manifest(
            dir.path(),
            r#"{"dataset_path":"dataset.json","params_path":"params.json","ballots":"x"}"#,
        );
        assert!(matches!(load_and_resolve_manifest(&m), Err(ManifestError::Parse(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = scenario();
        let m = write_manifest(dir.path(), r#"{"dataset_path":"nope.json","params_path":"params.json"}"#);
        assert!(matches!(load_and_resolve_manifest(&m), Err(ManifestError::Io("dataset_path", _))));
    }

    #[test]
    fn digests_verified_over_canonical_bytes() {
        let dir = scenario();
        // whitespace in params.json does not change the canonical digest
        let want = sha256_hex(br#"{"seed":1}"#);
        let m = write_manifest(
            dir.path(),
            &format!(
                r#"{{"dataset_path":"dataset.json","params_path":"params.json","inputs_sha256":{{"params_path":"{want}"}}}}"#
            ),
        );
        assert!(load_verify_manifest(&m, "0.1.0").is_ok());

        let bad = "0".repeat(64);
        let m = write_manifest(
            dir.path(),
            &format!(
                r#"{{"dataset_path":"dataset.json","params_path":"params.json","inputs_sha256":{{"dataset_path":"{bad}"}}}}"#
            ),
        );
        let err = load_verify_manifest(&m, "0.1.0").unwrap_err();
        assert!(err.is_verification_failure());
    }

    #[test]
    fn bad_digest_shape_and_engine_expectation() {
        let dir = scenario();
        let m = write_manifest(
            dir.path(),
            r#"{"dataset_path":"dataset.json","params_path":"params.json","inputs_sha256":{"params_path":"ABC"}}"#,
        );
        assert!(matches!(load_and_resolve_manifest(&m), Err(ManifestError::DigestShape(..))));

        let m = write_manifest(
            dir.path(),
            r#"{"dataset_path":"dataset.json","params_path":"params.json","expect":{"engine_version":"9.9.9"}}"#,
        );
        let err = load_verify_manifest(&m, "0.1.0").unwrap_err();
        assert!(matches!(err, ManifestError::ExpectationMismatch("engine_version", _)));
    }
}

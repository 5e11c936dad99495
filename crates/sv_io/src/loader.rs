//! Loader: read local JSON inputs (manifest → dataset → params), validate
//! them against the embedded schemas, decode into `sv_core` types and record
//! the canonical digests of what was read. No network I/O.
//!
//! Subscriber counts are converted to population units here
//! (`support = subscribers / population_unit`), so everything downstream
//! works in a single unit.

#![forbid(unsafe_code)]

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sv_core::{Channel, ChannelId, Country, CountryId, LanguageCode, Params};

use crate::canonical_json::to_canonical_bytes;
use crate::hasher::sha256_hex;
use crate::manifest::{self, has_scheme};
use crate::schema::{self, SchemaKind};
use crate::{IoError, IoResult};

/// Hard cap on any input document.
pub const MAX_INPUT_BYTES: u64 = 16 * 1024 * 1024;

/// Raw subscribers per population unit when the dataset does not say.
pub const DEFAULT_POPULATION_UNIT: f64 = 1_000_000.0;

// ----------------------------- Wire types -----------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct DatasetDoc {
    #[serde(default)]
    id: Option<String>,
    #[serde(default = "default_population_unit")]
    population_unit: f64,
    countries: Vec<Country>,
    channels: Vec<ChannelDoc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChannelDoc {
    id: ChannelId,
    #[serde(default)]
    name: Option<String>,
    country: CountryId,
    language: LanguageCode,
    subscribers: f64,
}

fn default_population_unit() -> f64 {
    DEFAULT_POPULATION_UNIT
}

// ----------------------------- Loaded types -----------------------------

/// Countries and channels in registry (file) order.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub id: Option<String>,
    pub population_unit: f64,
    pub countries: Vec<Country>,
    pub channels: Vec<Channel>,
}

/// Canonical sha256 of each input as read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputDigests {
    pub dataset_sha256: String,
    /// `None` when the run used default parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params_sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedScenario {
    pub scenario_id: Option<String>,
    pub dataset: Dataset,
    pub params: Params,
    pub digests: InputDigests,
}

// ----------------------------- Orchestration -----------------------------

/// Manifest → verified digests/expectations → dataset → params.
pub fn load_scenario_from_manifest(path: &Path, engine_version: &str) -> IoResult<LoadedScenario> {
    let resolved = manifest::load_verify_manifest(path, engine_version)?;
    let (dataset, dataset_sha256) = load_dataset(resolved.dataset_path.as_std_path())?;
    let (params, params_sha256) = load_params(resolved.params_path.as_std_path())?;
    Ok(LoadedScenario {
        scenario_id: resolved.id.or_else(|| dataset.id.clone()),
        dataset,
        params,
        digests: InputDigests { dataset_sha256, params_sha256: Some(params_sha256) },
    })
}

/// Direct paths; absent params mean `Params::default()`.
pub fn load_scenario_from_paths(dataset: &Path, params: Option<&Path>) -> IoResult<LoadedScenario> {
    let (dataset, dataset_sha256) = load_dataset(dataset)?;
    let (params, params_sha256) = match params {
        Some(p) => {
            let (params, sha) = load_params(p)?;
            (params, Some(sha))
        }
        None => (Params::default(), None),
    };
    Ok(LoadedScenario {
        scenario_id: dataset.id.clone(),
        dataset,
        params,
        digests: InputDigests { dataset_sha256, params_sha256 },
    })
}

pub fn load_dataset(path: &Path) -> IoResult<(Dataset, String)> {
    let (value, sha) = read_validated(path, SchemaKind::Dataset)?;
    let doc: DatasetDoc = decode(value)?;
    if !(doc.population_unit > 0.0) || !doc.population_unit.is_finite() {
        return Err(IoError::Invalid(format!(
            "population_unit must be a positive number, got {}",
            doc.population_unit
        )));
    }
    let unit = doc.population_unit;
    let channels = doc
        .channels
        .into_iter()
        .map(|c| Channel {
            id: c.id,
            name: c.name,
            country: c.country,
            language: c.language,
            support: c.subscribers / unit,
        })
        .collect();
    Ok((
        Dataset { id: doc.id, population_unit: unit, countries: doc.countries, channels },
        sha,
    ))
}

pub fn load_params(path: &Path) -> IoResult<(Params, String)> {
    let (value, sha) = read_validated(path, SchemaKind::Params)?;
    Ok((decode(value)?, sha))
}

// ----------------------------- Helpers -----------------------------

/// Read a file, refusing anything over `MAX_INPUT_BYTES`.
pub fn read_limited(path: &Path) -> IoResult<Vec<u8>> {
    if has_scheme(&path.to_string_lossy()) {
        return Err(IoError::Invalid(format!("path must be local (no scheme): {}", path.display())));
    }
    let f = File::open(path).map_err(|e| IoError::Path(format!("{}: {e}", path.display())))?;
    let mut buf = Vec::new();
    f.take(MAX_INPUT_BYTES + 1)
        .read_to_end(&mut buf)
        .map_err(|e| IoError::Path(format!("{}: {e}", path.display())))?;
    if buf.len() as u64 > MAX_INPUT_BYTES {
        return Err(IoError::Limit(format!("{} exceeds {MAX_INPUT_BYTES} bytes", path.display())));
    }
    Ok(buf)
}

/// Parse, schema-check and digest one document.
fn read_validated(path: &Path, kind: SchemaKind) -> IoResult<(Value, String)> {
    let bytes = read_limited(path)?;
    let value: Value = serde_json::from_slice(&bytes).map_err(|e| IoError::Json {
        pointer: format!("{}:{}:{}", path.display(), e.line(), e.column()),
        msg: e.to_string(),
    })?;
    schema::validate(kind, &value)?;
    let sha = sha256_hex(&to_canonical_bytes(&value)?);
    Ok((value, sha))
}

fn decode<T: for<'de> Deserialize<'de>>(value: Value) -> IoResult<T> {
    serde_json::from_value(value).map_err(|e| IoError::Json { pointer: "/".into(), msg: e.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const DATASET: &str = r#"{
        "population_unit": 1000000,
        "countries": [
            { "id": "US", "name": "United States", "population": 167.4, "languages": { "EN": 75.8 } },
            { "id": "Japan", "population": 46.8, "languages": { "EN": 0 } }
        ],
        "channels": [
            { "id": "pewdiepie", "name": "PewDiePie", "country": "US", "language": "EN", "subscribers": 80035336 }
        ]
    }"#;

    #[test]
    fn dataset_converts_subscribers_to_units() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("dataset.json");
        fs::write(&p, DATASET).unwrap();
        let (ds, sha) = load_dataset(&p).unwrap();
        assert_eq!(ds.countries.len(), 2);
        assert_eq!(ds.countries[1].id.as_str(), "Japan");
        assert!((ds.channels[0].support - 80.035336).abs() < 1e-9);
        assert_eq!(ds.channels[0].display_name(), "PewDiePie");
        assert_eq!(sha.len(), 64);
    }

    #[test]
    fn missing_params_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("dataset.json");
        fs::write(&p, DATASET).unwrap();
        let s = load_scenario_from_paths(&p, None).unwrap();
        assert_eq!(s.params, Params::default());
        assert!(s.digests.params_sha256.is_none());
    }

    #[test]
    fn schema_violation_is_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("params.json");
        fs::write(&p, r#"{"rank_solver":"simplex"}"#).unwrap();
        assert!(matches!(load_params(&p), Err(IoError::Schema(_))));
    }

    #[test]
    fn malformed_json_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("params.json");
        fs::write(&p, "{\n  \"seed\": ").unwrap();
        match load_params(&p) {
            Err(IoError::Json { pointer, .. }) => assert!(pointer.contains(":2:")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_population_unit_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("dataset.json");
        fs::write(&p, r#"{"population_unit": 0, "countries": [], "channels": []}"#).unwrap();
        assert!(load_dataset(&p).is_err());
    }

    #[test]
    fn oversized_input_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("big.json");
        let f = fs::File::create(&p).unwrap();
        f.set_len(MAX_INPUT_BYTES + 1).unwrap();
        assert!(matches!(read_limited(&p), Err(IoError::Limit(_))));
        assert!(matches!(read_limited(Path::new("http://x/y.json")), Err(IoError::Invalid(_))));
    }
}

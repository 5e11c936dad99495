//! Embedded JSON Schemas (Draft 7) for the two input documents.
//!
//! Schemas check structure and token syntax only. Numeric domains (negative
//! populations, percentage sums) are data errors reported by the pipeline's
//! validation stage.

use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

use crate::{IoError, IoResult};

pub const DATASET_SCHEMA: &str = r##"{
  "$schema": "http://json-schema.org/draft-07/schema#",
  "title": "dataset",
  "type": "object",
  "additionalProperties": false,
  "required": ["countries", "channels"],
  "properties": {
    "id": { "type": "string" },
    "population_unit": { "type": "number", "exclusiveMinimum": 0 },
    "countries": {
      "type": "array",
      "items": {
        "type": "object",
        "additionalProperties": false,
        "required": ["id", "population"],
        "properties": {
          "id": { "$ref": "#/definitions/token" },
          "name": { "type": "string" },
          "population": { "type": "number" },
          "languages": {
            "type": "object",
            "propertyNames": { "$ref": "#/definitions/token" },
            "additionalProperties": { "type": "number" }
          }
        }
      }
    },
    "channels": {
      "type": "array",
      "items": {
        "type": "object",
        "additionalProperties": false,
        "required": ["id", "country", "language", "subscribers"],
        "properties": {
          "id": { "$ref": "#/definitions/token" },
          "name": { "type": "string" },
          "country": { "$ref": "#/definitions/token" },
          "language": { "$ref": "#/definitions/token" },
          "subscribers": { "type": "number" }
        }
      }
    }
  },
  "definitions": {
    "token": { "type": "string", "pattern": "^[A-Za-z0-9_.:-]{1,64}$" }
  }
}"##;

pub const PARAMS_SCHEMA: &str = r##"{
  "$schema": "http://json-schema.org/draft-07/schema#",
  "title": "params",
  "type": "object",
  "additionalProperties": false,
  "properties": {
    "exclusive": {
      "type": "object",
      "additionalProperties": false,
      "properties": {
        "home_country_pct": { "type": "number", "minimum": 0, "maximum": 100 },
        "home_language_pct": { "type": "number", "minimum": 0, "maximum": 100 }
      }
    },
    "methods": {
      "type": "array",
      "items": { "enum": ["fptp", "approval", "irv", "borda", "condorcet"] }
    },
    "rank_solver": { "enum": ["water_fill", "proportional"] },
    "seed": { "type": "integer", "minimum": 0 }
  }
}"##;

/// Which embedded schema to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Dataset,
    Params,
}

impl SchemaKind {
    fn source(self) -> &'static str {
        match self {
            SchemaKind::Dataset => DATASET_SCHEMA,
            SchemaKind::Params => PARAMS_SCHEMA,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SchemaKind::Dataset => "dataset",
            SchemaKind::Params => "params",
        }
    }
}

/// Validate `instance`; all violations are reported, one per line, with
/// their JSON pointer.
pub fn validate(kind: SchemaKind, instance: &Value) -> IoResult<()> {
    let schema: Value = serde_json::from_str(kind.source())
        .map_err(|e| IoError::Schema(format!("{} schema: {e}", kind.name())))?;
    let compiled = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&schema)
        .map_err(|e| IoError::Schema(format!("{} schema: {e}", kind.name())))?;

    if let Err(errors) = compiled.validate(instance) {
        let lines: Vec<String> = errors
            .map(|e| {
                let at = e.instance_path.to_string();
                format!("{}: {e}", if at.is_empty() { "/".to_string() } else { at })
            })
            .collect();
        return Err(IoError::Schema(format!("{}: {}", kind.name(), lines.join("\n"))));
    }
    Ok(())
}

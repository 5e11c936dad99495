//! crates/sv_pipeline/src/validate.rs
//! Semantic validation of a loaded scenario before any computation.
//! Schemas already checked the document shapes; this stage checks the
//! numeric domains and cross references. No RNG; issue order is stable.
//!
//! Errors abort the run. Warnings are logged and the run proceeds.

use std::collections::BTreeSet;

use sv_core::numeric::CONSERVATION_TOL;
use sv_core::variables::{validate_domains, VarError};
use sv_core::{Channel, Country, ModelError, Params};

/// Issue severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

/// Where the issue occurred.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntityRef {
    Root,
    Country(String),
    Channel(String),
    Param(&'static str),
}

/// One validation finding.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    pub where_: EntityRef,
}

/// pass = no `Error` issue.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationReport {
    pub pass: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// Error messages joined one per line.
    pub fn error_summary(&self) -> String {
        self.errors().map(|i| i.message.as_str()).collect::<Vec<_>>().join("\n")
    }
}

/// Top-level entry point.
pub fn validate(countries: &[Country], channels: &[Channel], params: &Params) -> ValidationReport {
    let mut issues = Vec::new();

    issues.extend(check_countries(countries));
    issues.extend(check_channels(channels, countries));
    issues.extend(check_params(params));

    sort_issues_stably(&mut issues);
    ValidationReport {
        pass: !issues.iter().any(|i| i.severity == Severity::Error),
        issues,
    }
}

// ------------------------------------------------------------------------------------------------
// Checks
// ------------------------------------------------------------------------------------------------

fn check_countries(countries: &[Country]) -> Vec<ValidationIssue> {
    let mut out = Vec::new();
    if countries.is_empty() {
        out.push(model_error(EntityRef::Root, "countries.empty", ModelError::EmptyCountries));
        return out;
    }

    let mut seen = BTreeSet::new();
    let mut any_speakers = false;
    for c in countries {
        let at = EntityRef::Country(c.id.to_string());
        if !seen.insert(c.id.as_str()) {
            out.push(model_error(
                at.clone(),
                "country.duplicate_id",
                ModelError::DuplicateId { kind: "country", id: c.id.to_string() },
            ));
        }
        if !c.population.is_finite() {
            out.push(model_error(
                at.clone(),
                "country.population_non_finite",
                ModelError::NonFinite { field: "population", id: c.id.to_string() },
            ));
        } else if c.population < 0.0 {
            out.push(model_error(
                at.clone(),
                "country.population_negative",
                ModelError::NegativePopulation { country: c.id.to_string(), value: c.population },
            ));
        }

        let mut sum = 0.0;
        for (lang, &pct) in &c.languages {
            if !pct.is_finite() {
                out.push(model_error(
                    at.clone(),
                    "country.language_non_finite",
                    ModelError::NonFinite { field: "language percentage", id: format!("{}/{lang}", c.id) },
                ));
                continue;
            }
            if pct < 0.0 {
                out.push(model_error(
                    at.clone(),
                    "country.language_negative",
                    ModelError::NegativePercentage {
                        country: c.id.to_string(),
                        language: lang.to_string(),
                        value: pct,
                    },
                ));
            }
            sum += pct;
        }
        if sum > 100.0 + CONSERVATION_TOL {
            out.push(model_error(
                at.clone(),
                "country.languages_exceed_100",
                ModelError::PercentagesExceed100 { country: c.id.to_string(), sum },
            ));
        }
        if sum > 0.0 && c.population > 0.0 {
            any_speakers = true;
        } else {
            out.push(warning(at, "country.no_speakers", format!("{} has no modeled speakers", c.id)));
        }
    }

    if !any_speakers && out.iter().all(|i| i.severity == Severity::Warning) {
        out.push(model_error(EntityRef::Root, "countries.no_useful_population", ModelError::NoUsefulPopulation));
    }
    out
}

fn check_channels(channels: &[Channel], countries: &[Country]) -> Vec<ValidationIssue> {
    let mut out = Vec::new();
    if channels.is_empty() {
        out.push(model_error(EntityRef::Root, "channels.empty", ModelError::EmptyChannels));
        return out;
    }

    let mut seen = BTreeSet::new();
    for ch in channels {
        let at = EntityRef::Channel(ch.id.to_string());
        if !seen.insert(ch.id.as_str()) {
            out.push(model_error(
                at.clone(),
                "channel.duplicate_id",
                ModelError::DuplicateId { kind: "channel", id: ch.id.to_string() },
            ));
        }
        if !ch.support.is_finite() {
            out.push(model_error(
                at.clone(),
                "channel.support_non_finite",
                ModelError::NonFinite { field: "support", id: ch.id.to_string() },
            ));
        } else if ch.support < 0.0 {
            out.push(model_error(
                at.clone(),
                "channel.support_negative",
                ModelError::NegativeSupport { channel: ch.id.to_string(), value: ch.support },
            ));
        }

        if !countries.iter().any(|c| c.id == ch.country) {
            out.push(warning(
                at.clone(),
                "channel.home_not_modeled",
                format!("home country {} of {} is not modeled", ch.country, ch.id),
            ));
        }
        if !countries.iter().any(|c| c.language_pct(&ch.language) > 0.0) {
            out.push(warning(
                at,
                "channel.language_unspoken",
                format!("no modeled country speaks {} (language of {})", ch.language, ch.id),
            ));
        }
    }
    out
}

fn check_params(params: &Params) -> Vec<ValidationIssue> {
    match validate_domains(params) {
        Ok(()) => Vec::new(),
        Err(VarError::SharesExceed100 { x, y }) => vec![model_error(
            EntityRef::Param("exclusive"),
            "params.exclusive_exceed_100",
            ModelError::ExclusiveSharesExceed100 { home_country_pct: x, home_language_pct: y },
        )],
        Err(e) => vec![ValidationIssue {
            severity: Severity::Error,
            code: "params.domain",
            message: format!("data error: {e}"),
            where_: EntityRef::Param("methods"),
        }],
    }
}

// ------------------------------------------------------------------------------------------------
// Helpers
// ------------------------------------------------------------------------------------------------

fn model_error(where_: EntityRef, code: &'static str, e: ModelError) -> ValidationIssue {
    ValidationIssue { severity: Severity::Error, code, message: e.to_string(), where_ }
}

fn warning(where_: EntityRef, code: &'static str, message: String) -> ValidationIssue {
    ValidationIssue { severity: Severity::Warning, code, message, where_ }
}

/// Errors first, then by code; registry order is kept within a tie.
fn sort_issues_stably(issues: &mut [ValidationIssue]) {
    issues.sort_by(|a, b| a.severity.cmp(&b.severity).then_with(|| a.code.cmp(b.code)));
}

// ------------------------------------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn country(id: &str, population: f64, langs: &[(&str, f64)]) -> Country {
        Country {
            id: id.parse().unwrap(),
            name: None,
            population,
            languages: langs.iter().map(|(l, p)| (l.parse().unwrap(), *p)).collect::<BTreeMap<_, _>>(),
        }
    }

    fn channel(id: &str, home: &str, lang: &str, support: f64) -> Channel {
        Channel {
            id: id.parse().unwrap(),
            name: None,
            country: home.parse().unwrap(),
            language: lang.parse().unwrap(),
            support,
        }
    }

    #[test]
    fn clean_scenario_passes() {
        let r = validate(
            &[country("US", 100.0, &[("EN", 80.0)])],
            &[channel("a", "US", "EN", 10.0)],
            &Params::default(),
        );
        assert!(r.pass, "{:?}", r.issues);
        assert_eq!(r.errors().count(), 0);
    }

    #[test]
    fn percentages_over_100_is_error() {
        let r = validate(
            &[country("US", 100.0, &[("EN", 80.0), ("ES", 30.0)])],
            &[channel("a", "US", "EN", 10.0)],
            &Params::default(),
        );
        assert!(!r.pass);
        assert_eq!(r.issues[0].code, "country.languages_exceed_100");
    }

    #[test]
    fn sum_within_tolerance_is_accepted() {
        let r = validate(
            &[country("US", 100.0, &[("EN", 60.0), ("ES", 40.005)])],
            &[channel("a", "US", "EN", 10.0)],
            &Params::default(),
        );
        assert!(r.pass);
    }

    #[test]
    fn duplicates_and_negatives_are_reported() {
        let r = validate(
            &[country("US", -1.0, &[("EN", 10.0)]), country("US", 5.0, &[("EN", 10.0)])],
            &[channel("a", "US", "EN", -2.0)],
            &Params::default(),
        );
        let codes: Vec<_> = r.errors().map(|i| i.code).collect();
        assert!(codes.contains(&"country.duplicate_id"));
        assert!(codes.contains(&"country.population_negative"));
        assert!(codes.contains(&"channel.support_negative"));
    }

    #[test]
    fn empty_registries_fail() {
        let r = validate(&[], &[], &Params::default());
        let codes: Vec<_> = r.errors().map(|i| i.code).collect();
        assert_eq!(codes, vec!["channels.empty", "countries.empty"]);
    }

    #[test]
    fn nobody_speaking_anything_fails() {
        let r = validate(
            &[country("JP", 10.0, &[]), country("TR", 5.0, &[("EN", 0.0)])],
            &[channel("a", "JP", "EN", 1.0)],
            &Params::default(),
        );
        assert!(r.errors().any(|i| i.code == "countries.no_useful_population"));
    }

    #[test]
    fn unmodeled_home_and_unspoken_language_warn_only() {
        let r = validate(
            &[country("US", 100.0, &[("EN", 80.0)])],
            &[channel("a", "CA", "FR", 10.0)],
            &Params::default(),
        );
        assert!(r.pass);
        let codes: Vec<_> = r.warnings().map(|i| i.code).collect();
        assert_eq!(codes, vec!["channel.home_not_modeled", "channel.language_unspoken"]);
    }

    #[test]
    fn param_domain_errors_surface() {
        let mut p = Params::default();
        p.methods.clear();
        let r = validate(&[country("US", 1.0, &[("EN", 1.0)])], &[channel("a", "US", "EN", 1.0)], &p);
        assert!(!r.pass);
        assert!(r.error_summary().contains("no election methods"));
    }
}

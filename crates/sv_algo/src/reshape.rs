//! Population reshaping: restrict each country to the speakers of modeled
//! languages and rescale so the world total equals the total channel support.
//!
//! Output is one `PopulationProfile` per country in registry order. Language
//! shares are expressed against the useful population, so rescaling leaves
//! them unchanged and running the reshape again on its own output is a no-op.

use std::collections::BTreeMap;

use sv_core::{Channel, Country, ModelError, PopulationProfile};
use tracing::debug;

/// Σ channel support (the reshape target).
pub fn total_support(channels: &[Channel]) -> f64 {
    channels.iter().map(|c| c.support).sum()
}

/// Reshape every country so that Σ useful population == `target_total`.
///
/// Errors:
/// - `NegativePopulation` / `NegativePercentage` for bad inputs,
/// - `NonFinite` if the target is not a finite non-negative number,
/// - `NoUsefulPopulation` when no country has any speakers (division by zero).
pub fn reshape_population(
    countries: &[Country],
    target_total: f64,
) -> Result<Vec<PopulationProfile>, ModelError> {
    if !target_total.is_finite() || target_total < 0.0 {
        return Err(ModelError::NonFinite { field: "target_total", id: "channels".into() });
    }

    let mut useful = Vec::with_capacity(countries.len());
    for c in countries {
        if c.population < 0.0 {
            return Err(ModelError::NegativePopulation {
                country: c.id.to_string(),
                value: c.population,
            });
        }
        let mut u = 0.0;
        for (lang, &pct) in &c.languages {
            if pct < 0.0 {
                return Err(ModelError::NegativePercentage {
                    country: c.id.to_string(),
                    language: lang.to_string(),
                    value: pct,
                });
            }
            u += c.population * pct / 100.0;
        }
        useful.push(u);
    }

    let world: f64 = useful.iter().sum();
    if !(world > 0.0) {
        return Err(ModelError::NoUsefulPopulation);
    }
    let factor = target_total / world;

    let profiles = countries
        .iter()
        .zip(&useful)
        .map(|(c, &u)| {
            let language_share: BTreeMap<_, _> = if u > 0.0 {
                c.languages
                    .keys()
                    .map(|lang| (lang.clone(), c.language_population(lang) / u * 100.0))
                    .collect()
            } else {
                BTreeMap::new()
            };
            PopulationProfile {
                country: c.id.clone(),
                useful_population: u * factor,
                language_share,
            }
        })
        .collect();

    debug!(target: "sv_algo::reshape", world, target_total, factor, "population reshaped");
    Ok(profiles)
}

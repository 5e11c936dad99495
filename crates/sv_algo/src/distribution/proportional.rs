//! Proportional strategy: each language's speakers in a country are shared
//! among the channels of that language in proportion to their support.
//!
//! count(ch, co) = speakers(co, L) × support(ch) / S(L), where S(L) is the
//! summed support of every channel speaking L. A language with S(L) = 0 puts
//! zero into every cell of its channels.

use sv_core::{Channel, Country, Distribution, ModelError, PopulationProfile};
use tracing::debug;

pub fn distribute_proportional(
    channels: &[Channel],
    countries: &[Country],
    profiles: &[PopulationProfile],
) -> Result<Distribution, ModelError> {
    if profiles.len() != countries.len() {
        return Err(ModelError::ProfileMismatch {
            countries: countries.len(),
            profiles: profiles.len(),
        });
    }

    let mut dist = Distribution::new(channels, countries);
    for (ch, channel) in channels.iter().enumerate() {
        let language_support: f64 = channels
            .iter()
            .filter(|o| o.language == channel.language)
            .map(|o| o.support)
            .sum();
        if !(language_support > 0.0) {
            continue;
        }
        let weight = channel.support / language_support;
        for (co, profile) in profiles.iter().enumerate() {
            dist.set_count(ch, co, profile.language_population(&channel.language) * weight);
        }
    }

    debug!(
        target: "sv_algo::distribution",
        strategy = "proportional",
        total = dist.total(),
        "distribution built"
    );
    Ok(dist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reshape::{reshape_population, total_support};
    use crate::testkit::{channel, country};
    use sv_core::numeric::approx_eq;

    #[test]
    fn splits_speakers_by_support_within_language() {
        let countries = vec![country("A", 100.0, &[("EN", 100.0)])];
        let channels = vec![
            channel("p", "A", "EN", 30.0),
            channel("q", "A", "EN", 10.0),
        ];
        let profiles = reshape_population(&countries, total_support(&channels)).unwrap();
        let d = distribute_proportional(&channels, &countries, &profiles).unwrap();
        // useful 40 EN speakers split 3:1
        assert!(approx_eq(d.count(0, 0), 30.0, 1e-9));
        assert!(approx_eq(d.count(1, 0), 10.0, 1e-9));
    }

    #[test]
    fn totals_match_reshaped_language_population() {
        let countries = vec![
            country("A", 100.0, &[("EN", 50.0), ("HI", 20.0)]),
            country("B", 50.0, &[("EN", 10.0)]),
        ];
        let channels = vec![
            channel("e1", "A", "EN", 20.0),
            channel("e2", "B", "EN", 5.0),
            channel("h1", "A", "HI", 10.0),
        ];
        let profiles = reshape_population(&countries, total_support(&channels)).unwrap();
        let d = distribute_proportional(&channels, &countries, &profiles).unwrap();
        let en = "EN".parse().unwrap();
        for (co, p) in profiles.iter().enumerate() {
            let en_total = d.count(0, co) + d.count(1, co);
            assert!(approx_eq(en_total, p.language_population(&en), 1e-9));
        }
        assert!(approx_eq(d.total(), 35.0, 1e-9));
    }

    #[test]
    fn zero_language_support_yields_zero_cells() {
        let countries = vec![country("A", 10.0, &[("EN", 50.0), ("FR", 50.0)])];
        let channels = vec![channel("e", "A", "EN", 4.0), channel("f", "A", "FR", 0.0)];
        let profiles = reshape_population(&countries, total_support(&channels)).unwrap();
        let d = distribute_proportional(&channels, &countries, &profiles).unwrap();
        assert_eq!(d.count(1, 0), 0.0);
        assert!(approx_eq(d.count(0, 0), 2.0, 1e-9));
    }
}

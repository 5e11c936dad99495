//! Exclusive strategy: a channel's support is split into three buckets.
//!
//! - x% goes to its home country.
//! - y% goes to the other countries where its language is spoken, by raw
//!   language population.
//! - The rest goes to the remaining ("uncovered") countries, by raw population.
//!
//! Counts are rounded to 2 dp. When a bucket has nowhere to go it is folded
//! into the next one and a `DistributionNotice` is emitted; the channel's
//! total is always placed somewhere.

use sv_core::numeric::round2;
use sv_core::variables::ExclusiveShares;
use sv_core::{Channel, ChannelId, Country, Distribution, LanguageCode, ModelError};
use tracing::{debug, warn};

/// Non-fatal reallocation performed while placing a channel's support.
#[derive(Clone, Debug, PartialEq)]
pub enum DistributionNotice {
    /// Home country is not modeled; its bucket joined the rest bucket.
    HomeCountryNotModeled { channel: ChannelId, mass: f64 },
    /// Nobody abroad speaks the channel's language; the y bucket joined the rest bucket.
    LanguageBucketUnplaced { channel: ChannelId, language: LanguageCode, mass: f64 },
    /// No uncovered country with population; the rest went to every non-home country.
    RestSpreadOverNonHome { channel: ChannelId, mass: f64 },
    /// No non-home country with population either; the rest went home.
    RestSentHome { channel: ChannelId, mass: f64 },
    /// Nothing modeled has population; the rest was split evenly.
    RestSplitEvenly { channel: ChannelId, mass: f64 },
}

impl DistributionNotice {
    pub fn channel(&self) -> &ChannelId {
        match self {
            DistributionNotice::HomeCountryNotModeled { channel, .. }
            | DistributionNotice::LanguageBucketUnplaced { channel, .. }
            | DistributionNotice::RestSpreadOverNonHome { channel, .. }
            | DistributionNotice::RestSentHome { channel, .. }
            | DistributionNotice::RestSplitEvenly { channel, .. } => channel,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DistributionNotice::HomeCountryNotModeled { .. } => "home_country_not_modeled",
            DistributionNotice::LanguageBucketUnplaced { .. } => "language_bucket_unplaced",
            DistributionNotice::RestSpreadOverNonHome { .. } => "rest_spread_over_non_home",
            DistributionNotice::RestSentHome { .. } => "rest_sent_home",
            DistributionNotice::RestSplitEvenly { .. } => "rest_split_evenly",
        }
    }

    pub fn mass(&self) -> f64 {
        match self {
            DistributionNotice::HomeCountryNotModeled { mass, .. }
            | DistributionNotice::LanguageBucketUnplaced { mass, .. }
            | DistributionNotice::RestSpreadOverNonHome { mass, .. }
            | DistributionNotice::RestSentHome { mass, .. }
            | DistributionNotice::RestSplitEvenly { mass, .. } => *mass,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExclusiveOutcome {
    pub distribution: Distribution,
    pub notices: Vec<DistributionNotice>,
}

pub fn distribute_exclusive(
    channels: &[Channel],
    countries: &[Country],
    shares: &ExclusiveShares,
) -> Result<ExclusiveOutcome, ModelError> {
    if shares.rest_pct() < 0.0 {
        return Err(ModelError::ExclusiveSharesExceed100 {
            home_country_pct: shares.home_country_pct.get(),
            home_language_pct: shares.home_language_pct.get(),
        });
    }
    if countries.is_empty() {
        return Err(ModelError::EmptyCountries);
    }

    let mut dist = Distribution::new(channels, countries);
    let mut notices = Vec::new();

    for (ch, channel) in channels.iter().enumerate() {
        let mut row = vec![0.0; countries.len()];
        place_channel(channel, countries, shares, &mut row, &mut notices);
        for (co, v) in row.into_iter().enumerate() {
            dist.set_count(ch, co, round2(v));
        }
    }

    for n in &notices {
        warn!(
            target: "sv_algo::distribution",
            channel = %n.channel(),
            kind = n.kind(),
            mass = n.mass(),
            "degenerate distribution: bucket reallocated"
        );
    }
    debug!(
        target: "sv_algo::distribution",
        strategy = "exclusive",
        total = dist.total(),
        notices = notices.len(),
        "distribution built"
    );
    Ok(ExclusiveOutcome { distribution: dist, notices })
}

// ----------------------------- Bucket placement -----------------------------

fn place_channel(
    channel: &Channel,
    countries: &[Country],
    shares: &ExclusiveShares,
    row: &mut [f64],
    notices: &mut Vec<DistributionNotice>,
) {
    let support = channel.support;
    let home_mass = support * shares.home_country_pct.fraction();
    let language_mass = support * shares.home_language_pct.fraction();
    let mut rest = (support - home_mass - language_mass).max(0.0);

    let home = countries.iter().position(|c| c.id == channel.country);
    match home {
        Some(h) => row[h] += home_mass,
        None => {
            if home_mass > 0.0 {
                notices.push(DistributionNotice::HomeCountryNotModeled {
                    channel: channel.id.clone(),
                    mass: home_mass,
                });
            }
            rest += home_mass;
        }
    }

    // Covered = received part of the language bucket.
    let mut covered = vec![false; countries.len()];
    let speakers: Vec<f64> = countries
        .iter()
        .enumerate()
        .map(|(i, c)| if Some(i) == home { 0.0 } else { c.language_population(&channel.language) })
        .collect();
    let speakers_abroad: f64 = speakers.iter().sum();
    if speakers_abroad > 0.0 {
        for (i, &s) in speakers.iter().enumerate() {
            let part = language_mass * s / speakers_abroad;
            if part > 0.0 {
                row[i] += part;
                covered[i] = true;
            }
        }
    } else {
        if language_mass > 0.0 {
            notices.push(DistributionNotice::LanguageBucketUnplaced {
                channel: channel.id.clone(),
                language: channel.language.clone(),
                mass: language_mass,
            });
        }
        rest += language_mass;
    }

    if !(rest > 0.0) {
        return;
    }

    let uncovered = |i: usize| Some(i) != home && !covered[i];
    if spread_by_population(countries, rest, row, uncovered) {
        return;
    }
    if spread_by_population(countries, rest, row, |i| Some(i) != home) {
        notices.push(DistributionNotice::RestSpreadOverNonHome { channel: channel.id.clone(), mass: rest });
        return;
    }
    if let Some(h) = home {
        row[h] += rest;
        notices.push(DistributionNotice::RestSentHome { channel: channel.id.clone(), mass: rest });
        return;
    }
    let each = rest / countries.len() as f64;
    row.iter_mut().for_each(|v| *v += each);
    notices.push(DistributionNotice::RestSplitEvenly { channel: channel.id.clone(), mass: rest });
}

/// Add `mass` to the selected countries by raw population. False (nothing
/// written) when the selection has no population.
fn spread_by_population(
    countries: &[Country],
    mass: f64,
    row: &mut [f64],
    select: impl Fn(usize) -> bool,
) -> bool {
    let pop: f64 = countries
        .iter()
        .enumerate()
        .filter(|(i, _)| select(*i))
        .map(|(_, c)| c.population)
        .sum();
    if !(pop > 0.0) {
        return false;
    }
    for (i, c) in countries.iter().enumerate() {
        if select(i) {
            row[i] += mass * c.population / pop;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{channel, country};
    use sv_core::numeric::approx_eq;

    fn shares(x: f64, y: f64) -> ExclusiveShares {
        ExclusiveShares::new(x, y).unwrap()
    }

    #[test]
    fn three_buckets_split_as_documented() {
        let countries = vec![
            country("H", 100.0, &[("L", 100.0)]),
            country("P", 100.0, &[("L", 10.0)]),
            country("Q", 100.0, &[("L", 20.0)]),
            country("R", 100.0, &[]),
        ];
        let channels = vec![channel("c", "H", "L", 100.0)];
        let out = distribute_exclusive(&channels, &countries, &shares(20.0, 50.0)).unwrap();
        let d = &out.distribution;
        assert_eq!(d.count(0, 0), 20.0);
        assert_eq!(d.count(0, 1), 16.67);
        assert_eq!(d.count(0, 2), 33.33);
        assert_eq!(d.count(0, 3), 30.0);
        assert!(out.notices.is_empty());
        assert!(approx_eq(d.channel_total(0), 100.0, 0.01));
    }

    #[test]
    fn home_not_modeled_joins_rest() {
        let countries = vec![country("P", 100.0, &[("L", 50.0)]), country("R", 300.0, &[])];
        let channels = vec![channel("c", "ZZ", "L", 10.0)];
        let out = distribute_exclusive(&channels, &countries, &shares(20.0, 50.0)).unwrap();
        // y (5) → P; x + rest (5) → R, the only uncovered country
        assert_eq!(out.distribution.count(0, 0), 5.0);
        assert_eq!(out.distribution.count(0, 1), 5.0);
        assert!(matches!(out.notices[0], DistributionNotice::HomeCountryNotModeled { .. }));
    }

    #[test]
    fn no_speakers_abroad_folds_language_bucket() {
        let countries = vec![
            country("H", 10.0, &[("L", 100.0)]),
            country("A", 30.0, &[]),
            country("B", 10.0, &[]),
        ];
        let channels = vec![channel("c", "H", "L", 100.0)];
        let out = distribute_exclusive(&channels, &countries, &shares(20.0, 50.0)).unwrap();
        let d = &out.distribution;
        assert_eq!(d.count(0, 0), 20.0);
        assert_eq!(d.count(0, 1), 60.0);
        assert_eq!(d.count(0, 2), 20.0);
        assert_eq!(out.notices.len(), 1);
        assert_eq!(out.notices[0].kind(), "language_bucket_unplaced");
    }

    #[test]
    fn fully_covered_world_spreads_rest_over_non_home() {
        let countries = vec![
            country("H", 10.0, &[("L", 100.0)]),
            country("A", 10.0, &[("L", 50.0)]),
            country("B", 30.0, &[("L", 50.0)]),
        ];
        let channels = vec![channel("c", "H", "L", 100.0)];
        let out = distribute_exclusive(&channels, &countries, &shares(20.0, 40.0)).unwrap();
        let d = &out.distribution;
        // y = 40 split 1:3, rest = 40 split 1:3
        assert_eq!(d.count(0, 1), 20.0);
        assert_eq!(d.count(0, 2), 60.0);
        assert_eq!(out.notices[0].kind(), "rest_spread_over_non_home");
    }

    #[test]
    fn lone_country_keeps_everything() {
        let countries = vec![country("H", 10.0, &[("L", 100.0)])];
        let channels = vec![channel("c", "H", "L", 42.0)];
        let out = distribute_exclusive(&channels, &countries, &shares(20.0, 50.0)).unwrap();
        assert_eq!(out.distribution.count(0, 0), 42.0);
        let kinds: Vec<_> = out.notices.iter().map(|n| n.kind()).collect();
        assert_eq!(kinds, vec!["language_bucket_unplaced", "rest_sent_home"]);
    }

    #[test]
    fn zero_support_places_nothing() {
        let countries = vec![country("H", 10.0, &[("L", 100.0)]), country("A", 5.0, &[])];
        let channels = vec![channel("c", "H", "L", 0.0)];
        let out = distribute_exclusive(&channels, &countries, &shares(20.0, 50.0)).unwrap();
        assert_eq!(out.distribution.total(), 0.0);
        assert!(out.notices.is_empty());
    }
}

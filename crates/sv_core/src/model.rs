//! Data model: countries, channels, derived population profiles and the
//! per-(channel, country) `Distribution` aggregate.
//!
//! Contract:
//! - `Country` and `Channel` are input facts; they are never mutated after load.
//! - Derived population data lives in `PopulationProfile` (one per country, in
//!   registry order) instead of mutable fields on `Country`.
//! - `Distribution` owns one `Cell` per (channel, country). Strategies return a
//!   fresh `Distribution`; election methods only read it and clone the rank
//!   tables they need to mutate.
//! - Rank tables are fixed-size, indexed 1..=N where N = number of channels.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tokens::{ChannelId, CountryId, LanguageCode};

// ----------------------------- Inputs -----------------------------

/// A modeled country: raw population and the percentage of it speaking each language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub id: CountryId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Raw population, in population units (millions in the bundled dataset).
    pub population: f64,
    /// Language → percentage of `population` (0..=100).
    #[serde(default)]
    pub languages: BTreeMap<LanguageCode, f64>,
}

impl Country {
    /// Percentage of the population speaking `lang` (0 when not listed).
    pub fn language_pct(&self, lang: &LanguageCode) -> f64 {
        self.languages.get(lang).copied().unwrap_or(0.0)
    }

    /// Raw number of `lang` speakers.
    pub fn language_population(&self, lang: &LanguageCode) -> f64 {
        self.population * self.language_pct(lang) / 100.0
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

/// A candidate channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Home country (may be absent from the modeled set).
    pub country: CountryId,
    /// Home language.
    pub language: LanguageCode,
    /// Total support, in population units.
    pub support: f64,
}

impl Channel {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

// ----------------------------- Derived -----------------------------

/// Language-relevant ("useful") population of one country after reshaping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationProfile {
    pub country: CountryId,
    /// Rescaled so that the cross-country sum equals the total channel support.
    pub useful_population: f64,
    /// Language → percentage of `useful_population`. Scale-invariant.
    pub language_share: BTreeMap<LanguageCode, f64>,
}

impl PopulationProfile {
    /// Share-weighted `lang` speakers within the useful population.
    pub fn language_population(&self, lang: &LanguageCode) -> f64 {
        let share = self.language_share.get(lang).copied().unwrap_or(0.0);
        self.useful_population * share / 100.0
    }
}

// ----------------------------- Rank tables -----------------------------

/// Vote mass per preference rank, ranks 1..=N stored at index r-1.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankTable(Vec<f64>);

impl RankTable {
    pub fn zeros(n_ranks: usize) -> Self {
        Self(vec![0.0; n_ranks])
    }

    pub fn from_masses(masses: Vec<f64>) -> Self {
        Self(masses)
    }

    /// Number of rank positions (N).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Mass at `rank` (1-based). Out-of-range ranks read as 0.
    #[inline]
    pub fn get(&self, rank: usize) -> f64 {
        rank.checked_sub(1)
            .and_then(|i| self.0.get(i))
            .copied()
            .unwrap_or(0.0)
    }

    /// Set mass at `rank` (1-based). Out-of-range ranks are ignored.
    #[inline]
    pub fn set(&mut self, rank: usize, mass: f64) {
        if let Some(slot) = rank.checked_sub(1).and_then(|i| self.0.get_mut(i)) {
            *slot = mass;
        }
    }

    #[inline]
    pub fn add(&mut self, rank: usize, mass: f64) {
        let cur = self.get(rank);
        self.set(rank, cur + mass);
    }

    /// Total mass across all ranks.
    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Σ r × mass[r]; rank 1 carries the lowest weight.
    pub fn weighted_sum(&self) -> f64 {
        self.iter().map(|(r, m)| r as f64 * m).sum()
    }

    /// `(rank, mass)` pairs, best rank first.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.0.iter().enumerate().map(|(i, &m)| (i + 1, m))
    }

    /// Ranks strictly worse than `rank`.
    pub fn lower_ranks(&self, rank: usize) -> core::ops::RangeInclusive<usize> {
        (rank + 1)..=self.0.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn clear(&mut self) {
        self.0.iter_mut().for_each(|m| *m = 0.0);
    }
}

// ----------------------------- Distribution -----------------------------

/// One (channel, country) record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Support attributed to the country (≥ 0).
    pub count: f64,
    /// Preference mass by rank in that country.
    pub ranks: RankTable,
}

/// Aggregate of all (channel, country) cells, row-major by channel.
///
/// Channel and country indices are registry positions; the id lists are
/// kept so results can be reported by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    channels: Vec<ChannelId>,
    countries: Vec<CountryId>,
    cells: Vec<Cell>,
}

impl Distribution {
    /// Empty distribution (all counts and ranks zero) for the given registry.
    pub fn new(channels: &[Channel], countries: &[Country]) -> Self {
        Self::from_ids(
            channels.iter().map(|c| c.id.clone()).collect(),
            countries.iter().map(|c| c.id.clone()).collect(),
        )
    }

    pub fn from_ids(channels: Vec<ChannelId>, countries: Vec<CountryId>) -> Self {
        let n_ranks = channels.len();
        let cells = (0..channels.len() * countries.len())
            .map(|_| Cell { count: 0.0, ranks: RankTable::zeros(n_ranks) })
            .collect();
        Self { channels, countries, cells }
    }

    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn n_countries(&self) -> usize {
        self.countries.len()
    }

    pub fn channel_ids(&self) -> &[ChannelId] {
        &self.channels
    }

    pub fn country_ids(&self) -> &[CountryId] {
        &self.countries
    }

    pub fn channel_index(&self, id: &ChannelId) -> Option<usize> {
        self.channels.iter().position(|c| c == id)
    }

    pub fn country_index(&self, id: &CountryId) -> Option<usize> {
        self.countries.iter().position(|c| c == id)
    }

    #[inline]
    fn slot(&self, channel: usize, country: usize) -> usize {
        debug_assert!(channel < self.channels.len() && country < self.countries.len());
        channel * self.countries.len() + country
    }

    pub fn cell(&self, channel: usize, country: usize) -> &Cell {
        &self.cells[self.slot(channel, country)]
    }

    pub fn cell_mut(&mut self, channel: usize, country: usize) -> &mut Cell {
        let i = self.slot(channel, country);
        &mut self.cells[i]
    }

    #[inline]
    pub fn count(&self, channel: usize, country: usize) -> f64 {
        self.cell(channel, country).count
    }

    pub fn set_count(&mut self, channel: usize, country: usize, count: f64) {
        self.cell_mut(channel, country).count = count;
    }

    pub fn add_count(&mut self, channel: usize, country: usize, count: f64) {
        self.cell_mut(channel, country).count += count;
    }

    pub fn ranks(&self, channel: usize, country: usize) -> &RankTable {
        &self.cell(channel, country).ranks
    }

    pub fn ranks_mut(&mut self, channel: usize, country: usize) -> &mut RankTable {
        &mut self.cell_mut(channel, country).ranks
    }

    /// Σ over channels of `count` in one country.
    pub fn country_total(&self, country: usize) -> f64 {
        (0..self.n_channels()).map(|ch| self.count(ch, country)).sum()
    }

    /// Σ over countries of one channel's `count`.
    pub fn channel_total(&self, channel: usize) -> f64 {
        (0..self.n_countries()).map(|co| self.count(channel, co)).sum()
    }

    /// Σ of every count.
    pub fn total(&self) -> f64 {
        self.cells.iter().map(|c| c.count).sum()
    }

    /// Owned copy of every channel's rank table in one country (registry order).
    pub fn country_rank_tables(&self, country: usize) -> Vec<RankTable> {
        (0..self.n_channels())
            .map(|ch| self.ranks(ch, country).clone())
            .collect()
    }

    /// Zero every rank table in one country (counts are kept).
    pub fn clear_country_ranks(&mut self, country: usize) {
        for ch in 0..self.n_channels() {
            self.ranks_mut(ch, country).clear();
        }
    }

    /// Count matrix `[channel][country]` rounded to `dp` places (reports).
    pub fn count_matrix(&self, dp: u32) -> Vec<Vec<f64>> {
        (0..self.n_channels())
            .map(|ch| {
                (0..self.n_countries())
                    .map(|co| crate::numeric::round_dp(self.count(ch, co), dp))
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids<T: core::str::FromStr>(xs: &[&str]) -> Vec<T>
    where
        T::Err: core::fmt::Debug,
    {
        xs.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn rank_table_is_one_based() {
        let mut t = RankTable::zeros(3);
        t.add(1, 10.0);
        t.add(3, 2.0);
        t.add(4, 99.0); // ignored
        t.add(0, 99.0); // ignored
        assert_eq!(t.get(1), 10.0);
        assert_eq!(t.get(2), 0.0);
        assert_eq!(t.total(), 12.0);
        assert_eq!(t.weighted_sum(), 10.0 + 6.0);
        assert_eq!(t.lower_ranks(1).collect::<Vec<_>>(), vec![2, 3]);
        assert!(t.lower_ranks(3).next().is_none());
    }

    #[test]
    fn distribution_cells_are_independent() {
        let mut d = Distribution::from_ids(ids(&["a", "b"]), ids(&["X", "Y", "Z"]));
        assert_eq!(d.n_channels(), 2);
        assert_eq!(d.n_countries(), 3);
        assert_eq!(d.ranks(0, 0).len(), 2);

        d.set_count(0, 1, 4.0);
        d.add_count(1, 1, 6.0);
        d.set_count(1, 2, 1.5);
        assert_eq!(d.country_total(1), 10.0);
        assert_eq!(d.channel_total(1), 7.5);
        assert_eq!(d.total(), 11.5);
        assert_eq!(d.count(0, 0), 0.0);

        d.ranks_mut(1, 1).add(1, 6.0);
        d.clear_country_ranks(1);
        assert_eq!(d.ranks(1, 1).total(), 0.0);
        assert_eq!(d.count(1, 1), 6.0);
    }

    #[test]
    fn index_lookup_by_id() {
        let d = Distribution::from_ids(ids(&["a", "b"]), ids(&["X", "Y"]));
        assert_eq!(d.channel_index(&"b".parse().unwrap()), Some(1));
        assert_eq!(d.country_index(&"Q".parse().unwrap()), None);
    }

    #[test]
    fn profile_language_population() {
        let p = PopulationProfile {
            country: "US".parse().unwrap(),
            useful_population: 200.0,
            language_share: [("EN".parse().unwrap(), 75.0)].into_iter().collect(),
        };
        assert_eq!(p.language_population(&"EN".parse().unwrap()), 150.0);
        assert_eq!(p.language_population(&"HI".parse().unwrap()), 0.0);
    }
}

//! sv_core: Core types, data model, error taxonomy, run parameters and seedable RNG.
//!
//! This crate is **I/O-free**. It defines stable types/APIs used across the
//! engine (`sv_io`, `sv_algo`, `sv_pipeline`, `sv_cli`).
//!
//! - Registry tokens: `CountryId`, `ChannelId`, `LanguageCode`
//! - Data model: `Country`, `Channel`, `PopulationProfile`, `Distribution`
//! - Error taxonomy: `CoreError` (tokens), `ModelError` (data / allocation)
//! - Run parameters: `Params` (exclusive shares, methods, rank solver, seed)
//! - Seedable RNG (ChaCha20) for every random decision of a run
//!
//! Collections keep **registry order** (the order of the input dataset); all
//! per-country loops walk countries in that order and all tie-breaks that are
//! not random fall back to it.

#![forbid(unsafe_code)]

pub mod errors {
    use core::fmt;

    /// Minimal error set for token parsing and domain checks.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub enum CoreError {
        InvalidToken,
        DomainOutOfRange(&'static str),
        EmptyChoiceSet,
    }

    impl fmt::Display for CoreError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                CoreError::InvalidToken => write!(f, "invalid token"),
                CoreError::DomainOutOfRange(k) => write!(f, "domain out of range: {k}"),
                CoreError::EmptyChoiceSet => write!(f, "empty choice set"),
            }
        }
    }

    impl std::error::Error for CoreError {}

    /// Model failures. Everything except `AllocationInfeasible` is a *data*
    /// error: invalid or inconsistent input detected before any method runs.
    #[derive(Clone, Debug, PartialEq)]
    pub enum ModelError {
        EmptyCountries,
        EmptyChannels,
        DuplicateId { kind: &'static str, id: String },
        NegativePopulation { country: String, value: f64 },
        NegativePercentage { country: String, language: String, value: f64 },
        PercentagesExceed100 { country: String, sum: f64 },
        NegativeSupport { channel: String, value: f64 },
        NonFinite { field: &'static str, id: String },
        ExclusiveSharesExceed100 { home_country_pct: f64, home_language_pct: f64 },
        /// No country speaks any modeled language (reshaping divides by zero).
        NoUsefulPopulation,
        /// Population profiles do not line up with the country registry.
        ProfileMismatch { countries: usize, profiles: usize },
        /// The bounded rank split could not place `total` under `capacity`.
        AllocationInfeasible { total: f64, capacity: f64 },
    }

    impl ModelError {
        /// True for input problems (abort the whole run at setup time).
        pub fn is_data_error(&self) -> bool {
            !matches!(self, ModelError::AllocationInfeasible { .. })
        }
    }

    impl fmt::Display for ModelError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            use ModelError::*;
            match self {
                EmptyCountries => write!(f, "data error: no countries"),
                EmptyChannels => write!(f, "data error: no channels"),
                DuplicateId { kind, id } => write!(f, "data error: duplicate {kind} id {id}"),
                NegativePopulation { country, value } => {
                    write!(f, "data error: negative population {value} for {country}")
                }
                NegativePercentage { country, language, value } => {
                    write!(f, "data error: negative percentage {value} for {language} in {country}")
                }
                PercentagesExceed100 { country, sum } => {
                    write!(f, "data error: language percentages of {country} sum to {sum} (> 100)")
                }
                NegativeSupport { channel, value } => {
                    write!(f, "data error: negative support {value} for {channel}")
                }
                NonFinite { field, id } => write!(f, "data error: non-finite {field} for {id}"),
                ExclusiveSharesExceed100 { home_country_pct, home_language_pct } => write!(
                    f,
                    "data error: exclusive shares x={home_country_pct} + y={home_language_pct} exceed 100"
                ),
                NoUsefulPopulation => {
                    write!(f, "data error: no country speaks any modeled language")
                }
                ProfileMismatch { countries, profiles } => write!(
                    f,
                    "data error: {profiles} population profiles for {countries} countries"
                ),
                AllocationInfeasible { total, capacity } => write!(
                    f,
                    "allocation infeasible: cannot place {total} under capacity {capacity}"
                ),
            }
        }
    }

    impl std::error::Error for ModelError {}
}

pub mod tokens {
    //! Registry token types with strict charset.

    use crate::errors::CoreError;
    use core::fmt;
    use core::str::FromStr;
    use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

    fn is_token(s: &str) -> bool {
        let len = s.len();
        if !(1..=64).contains(&len) {
            return false;
        }
        s.bytes().all(|b| matches!(b,
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' |
            b'_' | b'-' | b':' | b'.'
        ))
    }

    macro_rules! def_token {
        ($name:ident) => {
            #[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
            #[serde(transparent)]
            pub struct $name(String);

            impl $name {
                pub fn as_str(&self) -> &str { &self.0 }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
            }

            impl FromStr for $name {
                type Err = CoreError;
                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    if is_token(s) { Ok(Self(s.to_string())) } else { Err(CoreError::InvalidToken) }
                }
            }

            impl<'de> Deserialize<'de> for $name {
                fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                    let s = String::deserialize(d)?;
                    s.parse().map_err(|_| {
                        D::Error::custom(format!("invalid token {s:?}: expected [A-Za-z0-9_.:-], len 1..=64"))
                    })
                }
            }
        };
    }

    def_token!(CountryId);
    def_token!(ChannelId);
    def_token!(LanguageCode);

}

pub mod numeric {
    //! Float helpers shared by the algorithms and the reports.

    /// Absolute tolerance for mass conservation checks (vote units).
    pub const CONSERVATION_TOL: f64 = 0.01;

    /// Below this, a residual mass is treated as zero.
    pub const MASS_EPS: f64 = 1e-9;

    /// Round half away from zero to `dp` decimal places.
    #[inline]
    pub fn round_dp(x: f64, dp: u32) -> f64 {
        let k = 10f64.powi(dp as i32);
        (x * k).round() / k
    }

    /// Two-decimal rounding used for counts in reports and the exclusive split.
    #[inline]
    pub fn round2(x: f64) -> f64 {
        round_dp(x, 2)
    }

    #[inline]
    pub fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

}

pub mod model;
pub mod rng;
pub mod variables;

pub use errors::{CoreError, ModelError};
pub use model::{Cell, Channel, Country, Distribution, PopulationProfile, RankTable};
pub use rng::SimRng;
pub use tokens::{ChannelId, CountryId, LanguageCode};
pub use variables::{Method, Params, RankSolver};

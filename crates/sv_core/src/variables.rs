//! variables.rs: Run parameters with safe defaults and domain validation.
//!
//! Every field of the parameter-set document is optional; missing fields take
//! the defaults below (x = 20, y = 50, all five methods, water-filling rank
//! solver, no fixed seed).

use core::fmt;
use core::str::FromStr;

use serde::de::{Error as DeError, Unexpected};
use serde::{Deserialize, Deserializer, Serialize};

/// ------------ Macros ------------

/// Define a serde'd enum with explicit wire tokens plus `as_str`/`FromStr`
/// over the same tokens (CLI flags reuse them).
macro_rules! serde_enum {
    ($name:ident => { $($variant:ident = $token:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $token)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $token,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = VarError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($token => Ok($name::$variant),)+
                    other => Err(VarError::UnknownToken(other.to_string())),
                }
            }
        }
    };
}

/// ------------ Newtypes with invariants (validated on deserialize) ------------

/// A finite percentage in 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Pct(f64);

impl Pct {
    pub fn new(v: f64) -> Result<Self, VarError> {
        if v.is_finite() && (0.0..=100.0).contains(&v) {
            Ok(Self(v))
        } else {
            Err(VarError::PctOutOfRange(v))
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }

    /// Fraction in 0..=1.
    pub fn fraction(self) -> f64 {
        self.0 / 100.0
    }
}

impl<'de> Deserialize<'de> for Pct {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let v = f64::deserialize(d)?;
        Pct::new(v).map_err(|_| D::Error::invalid_value(Unexpected::Float(v), &"0..=100"))
    }
}

/// ------------ Canonical enums (wire tokens explicit) ------------

serde_enum!(Method => {
    Fptp      = "fptp",
    Approval  = "approval",
    Irv       = "irv",
    Borda     = "borda",
    Condorcet = "condorcet"
});

serde_enum!(RankSolver => {
    WaterFill    = "water_fill",
    Proportional = "proportional"
});

impl Method {
    /// Methods that read the rank tables.
    pub fn is_ranked(self) -> bool {
        matches!(self, Method::Irv | Method::Borda | Method::Condorcet)
    }
}

/// ------------ Shapes ------------

/// Exclusive-strategy split: x% home country, y% home-language countries
/// abroad, the rest (z = 100 − x − y) over the remaining countries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExclusiveShares {
    #[serde(default = "default_home_country_pct")]
    pub home_country_pct: Pct,
    #[serde(default = "default_home_language_pct")]
    pub home_language_pct: Pct,
}

fn default_home_country_pct() -> Pct {
    Pct(20.0)
}

fn default_home_language_pct() -> Pct {
    Pct(50.0)
}

impl Default for ExclusiveShares {
    fn default() -> Self {
        Self {
            home_country_pct: default_home_country_pct(),
            home_language_pct: default_home_language_pct(),
        }
    }
}

impl ExclusiveShares {
    pub fn new(x: f64, y: f64) -> Result<Self, VarError> {
        let s = Self { home_country_pct: Pct::new(x)?, home_language_pct: Pct::new(y)? };
        s.check()?;
        Ok(s)
    }

    /// z = 100 − x − y.
    pub fn rest_pct(&self) -> f64 {
        100.0 - self.home_country_pct.get() - self.home_language_pct.get()
    }

    pub fn check(&self) -> Result<(), VarError> {
        if self.rest_pct() < 0.0 {
            return Err(VarError::SharesExceed100 {
                x: self.home_country_pct.get(),
                y: self.home_language_pct.get(),
            });
        }
        Ok(())
    }
}

/// ------------ Params ------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    #[serde(default)]
    pub exclusive: ExclusiveShares,
    /// Methods to run, in this order.
    #[serde(default = "default_methods")]
    pub methods: Vec<Method>,
    #[serde(default = "default_rank_solver")]
    pub rank_solver: RankSolver,
    /// Run seed; the CLI fills it from entropy when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_methods() -> Vec<Method> {
    Method::ALL.to_vec()
}

fn default_rank_solver() -> RankSolver {
    RankSolver::WaterFill
}

impl Default for Params {
    fn default() -> Self {
        Self {
            exclusive: ExclusiveShares::default(),
            methods: default_methods(),
            rank_solver: default_rank_solver(),
            seed: None,
        }
    }
}

/// ------------ Validation ------------

#[derive(Debug, Clone, PartialEq)]
pub enum VarError {
    PctOutOfRange(f64),
    SharesExceed100 { x: f64, y: f64 },
    NoMethods,
    DuplicateMethod(Method),
    UnknownToken(String),
}

impl fmt::Display for VarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarError::PctOutOfRange(v) => write!(f, "percentage out of range: {v}"),
            VarError::SharesExceed100 { x, y } => {
                write!(f, "exclusive shares exceed 100: x={x} + y={y}")
            }
            VarError::NoMethods => write!(f, "no election methods selected"),
            VarError::DuplicateMethod(m) => write!(f, "method listed twice: {m}"),
            VarError::UnknownToken(s) => write!(f, "unknown token: {s}"),
        }
    }
}

impl std::error::Error for VarError {}

/// Domain checks that cannot be expressed by the types alone.
pub fn validate_domains(p: &Params) -> Result<(), VarError> {
    p.exclusive.check()?;
    if p.methods.is_empty() {
        return Err(VarError::NoMethods);
    }
    let mut seen = Vec::with_capacity(p.methods.len());
    for &m in &p.methods {
        if seen.contains(&m) {
            return Err(VarError::DuplicateMethod(m));
        }
        seen.push(m);
    }
    Ok(())
}

/// Parse a comma-separated method list (`"fptp,irv"`).
pub fn parse_method_list(s: &str) -> Result<Vec<Method>, VarError> {
    s.split(',')
        .filter(|t| !t.trim().is_empty())
        .map(Method::from_str)
        .collect()
}

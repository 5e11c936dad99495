// crates/sv_core/src/rng.rs
//
// Seedable RNG for every random decision in a run: plurality tie-breaks,
// approval noise and IRV redistribution.
//
// • A run owns exactly one `SimRng`, threaded by `&mut` through the methods in
//   a fixed order, so the same seed reproduces the same result.
// • Integer ranges are unbiased (rejection sampling). Reals use the top 53 bits
//   of one 64-bit word.
// • Cross-platform determinism: explicit seeding and word-index accounting.

use smol_str::SmolStr;

use serde::{Deserialize, Serialize};

use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};

/// A single logged random pick, including context and the RNG word index.
///
/// `word_index` is **1-based**: the first 64-bit RNG word consumed by this
/// `SimRng` has index 1. For range generation using rejection sampling,
/// `word_index` refers to the **accepted** word that decided the pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawCrumb {
    /// Stable, human-readable context (e.g., "fptp:US/tie").
    pub ctx: SmolStr,
    /// Chosen index in the contender set (0-based).
    pub pick: usize,
    /// 1-based index of the deciding RNG 64-bit word (saturates at u128::MAX).
    pub word_index: u128,
}

/// Deterministic RNG for a run.
///
/// Internally uses ChaCha20 with an explicit 32-byte seed derived from the
/// 64-bit run seed (little-endian bytes in the first 8 positions; the rest 0).
#[derive(Debug, Clone)]
pub struct SimRng {
    rng: ChaCha20Rng,
    seed: u64,
    words_consumed: u128,
}

impl SimRng {
    /// Construct from a 64-bit seed. `seed.to_le_bytes()` fills the first
    /// 8 bytes of the ChaCha20 seed; the remaining 24 bytes are zero.
    #[inline]
    pub fn from_seed_u64(seed: u64) -> Self {
        let mut seed32 = [0u8; 32];
        seed32[..8].copy_from_slice(&seed.to_le_bytes());
        Self {
            rng: ChaCha20Rng::from_seed(seed32),
            seed,
            words_consumed: 0,
        }
    }

    /// The seed this generator was built from.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Total number of 64-bit words consumed so far (saturating).
    #[inline]
    pub fn words_consumed(&self) -> u128 {
        self.words_consumed
    }

    /// Only place where the counter is advanced.
    #[inline]
    fn next_u64(&mut self) -> u64 {
        self.words_consumed = self.words_consumed.saturating_add(1);
        self.rng.next_u64()
    }

    /// Unbiased integer in [0, n); `None` if `n == 0`.
    ///
    /// `threshold = 2^64 mod n` (via `wrapping_neg() % n`); accept `x >= threshold`.
    #[inline]
    pub fn gen_range(&mut self, n: u64) -> Option<u64> {
        self.gen_range_with_index(n).map(|(v, _idx)| v)
    }

    /// Same as `gen_range`, also returning the 1-based deciding word index.
    #[inline]
    pub fn gen_range_with_index(&mut self, n: u64) -> Option<(u64, u128)> {
        if n == 0 {
            return None;
        }
        let threshold = n.wrapping_neg() % n;
        loop {
            let x = self.next_u64();
            if x >= threshold {
                return Some((x % n, self.words_consumed));
            }
        }
    }

    /// Pick an index in `[0, n)` and return a `DrawCrumb` for it.
    #[inline]
    pub fn pick_index_with_crumb(&mut self, ctx: &str, n: u64) -> Option<(usize, DrawCrumb)> {
        let (v, word_index) = self.gen_range_with_index(n)?;
        let idx = v as usize;
        let crumb = DrawCrumb {
            ctx: SmolStr::new(ctx),
            pick: idx,
            word_index,
        };
        Some((idx, crumb))
    }

    /// Uniform real in [0, 1).
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        // 53 significant bits → exact multiples of 2^-53.
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform real in [lo, hi]. Returns `lo` when the interval is empty or
    /// degenerate (no word is consumed).
    #[inline]
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        if !(hi > lo) {
            return lo;
        }
        let v = lo + (hi - lo) * self.next_f64();
        v.min(hi)
    }

    /// Deterministic in-place Fisher–Yates shuffle.
    #[inline]
    pub fn shuffle_in_place<T>(&mut self, slice: &mut [T]) {
        let len = slice.len();
        if len <= 1 {
            return;
        }
        for i in (1..len).rev() {
            if let Some(j) = self.gen_range((i as u64) + 1) {
                slice.swap(i, j as usize);
            }
        }
    }

    /// Choose a single index in `[0, n)`; `None` if `n == 0`.
    #[inline]
    pub fn choose_index(&mut self, n: usize) -> Option<usize> {
        self.gen_range(n as u64).map(|v| v as usize)
    }
}

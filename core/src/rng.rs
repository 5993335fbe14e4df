//! Deterministic random number generation for portfolio seeding.
//!
//! RULE: the assessment engines never draw random numbers. Only the
//! portfolio seeder does, and only through PortfolioRng streams
//! derived from one master seed.
//!
//! Each seeding stream is seeded from (master_seed XOR stream_index),
//! so adding a stream never changes the values drawn by existing ones.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG for one seeding stream.
pub struct PortfolioRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl PortfolioRng {
    pub fn new(master_seed: u64, stream: SeedStream) -> Self {
        let derived_seed = master_seed ^ (stream as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self {
            name: stream.name(),
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n). `n` must be positive.
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        debug_assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n.max(1)
    }

    /// Uniform float in [lo, hi).
    pub fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Pick one element of a non-empty slice.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        items.get(self.next_u64_below(items.len() as u64) as usize)
    }
}

/// Stable stream assignments.
/// NEVER reorder or remove entries. Only append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum SeedStream {
    Borrowers = 0,
    Loans = 1,
    Kpis = 2,
    Covenants = 3,
    Verifications = 4,
}

impl SeedStream {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Borrowers => "borrowers",
            Self::Loans => "loans",
            Self::Kpis => "kpis",
            Self::Covenants => "covenants",
            Self::Verifications => "verifications",
        }
    }
}

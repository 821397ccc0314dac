// Deterministic, portable pseudo-random number generator for the swarm.
//
// Implements xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64 seeding.
// Hand-rolled so that a given seed reproduces the same construction run on
// every platform, independent of any external RNG crate's version policy.
//
// The swarm owns one master `SwarmRng`; every agent owns its own generator
// forked from the master at creation time (`fork()`). Because each agent
// only ever draws from its own stream, the decide phase can run agents in
// parallel without changing the outcome.
//
// Geometric samplers (`random_unit_vector`, `random_horizontal_unit`) return
// plain `[f64; 3]` arrays so this crate stays free of any linear-algebra
// dependency; `scaffold_sim` converts them into its vector type.
//
// **Critical constraint: determinism.** The integer core must produce
// identical output given the same prior state, regardless of platform,
// compiler version, or optimization level.

use serde::{Deserialize, Serialize};

/// Xoshiro256++ PRNG, the swarm's sole source of randomness.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwarmRng {
    s: [u64; 4],
}

impl SwarmRng {
    /// Create a new PRNG seeded from a `u64`.
    ///
    /// Uses SplitMix64 to expand the seed into the 256-bit internal state.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Derive an independent child generator (one per agent).
    pub fn fork(&mut self) -> Self {
        Self::new(self.next_u64())
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Generate a uniform `f64` in [0, 1) from the upper 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Generate a uniform value in `[low, high)`.
    ///
    /// Panics if `low >= high`.
    pub fn range_f64(&mut self, low: f64, high: f64) -> f64 {
        assert!(low < high, "range_f64: low must be less than high");
        low + self.next_f64() * (high - low)
    }

    /// Generate a uniform random integer in `[low, high)`.
    ///
    /// Uses rejection sampling to avoid modulo bias.
    /// Panics if `low >= high`.
    pub fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        assert!(low < high, "range_u64: low must be less than high");
        let range = high - low;
        if range.is_power_of_two() {
            return low + (self.next_u64() & (range - 1));
        }
        let threshold = range.wrapping_neg() % range;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + (r % range);
            }
        }
    }

    /// Pick a uniform index into a collection of length `len`.
    ///
    /// Returns `None` for an empty collection.
    pub fn choose_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            None
        } else {
            Some(self.range_u64(0, len as u64) as usize)
        }
    }

    /// Return `true` with probability `p`.
    ///
    /// `p <= 0.0` always returns false, `p >= 1.0` always returns true.
    pub fn random_bool(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// A direction drawn uniformly from the unit sphere.
    ///
    /// Uses the z-cylinder projection (Archimedes): z uniform in [-1, 1),
    /// azimuth uniform in [0, 2π).
    pub fn random_unit_vector(&mut self) -> [f64; 3] {
        let z = self.range_f64(-1.0, 1.0);
        let theta = self.range_f64(0.0, std::f64::consts::TAU);
        let r = (1.0 - z * z).max(0.0).sqrt();
        [r * theta.cos(), r * theta.sin(), z]
    }

    /// A direction drawn uniformly from the unit circle in the ground plane.
    pub fn random_horizontal_unit(&mut self) -> [f64; 3] {
        let theta = self.range_f64(0.0, std::f64::consts::TAU);
        [theta.cos(), theta.sin(), 0.0]
    }
}

/// SplitMix64, used only for seeding xoshiro256++ from a single `u64`.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

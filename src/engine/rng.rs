//! Seeded linear congruential generator shared by every chance roll in a game.
//!
//! One `SeededRandom` is created per simulated game and passed by `&mut` into
//! the AI, the combat resolver and deck shuffles, so a seed fully determines
//! the game.

use rand::{RngCore, SeedableRng};

const LCG_MULTIPLIER: u64 = 1_664_525;
const LCG_INCREMENT: u64 = 1_013_904_223;
const LCG_MODULUS: u64 = 1 << 32;

/// Advance the generator state once. Returns the output in `[0, 1)` and the
/// new state.
pub fn lcg_step(state: u64) -> (f64, u64) {
    let next = (state % LCG_MODULUS * LCG_MULTIPLIER + LCG_INCREMENT) % LCG_MODULUS;
    (next as f64 / LCG_MODULUS as f64, next)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeededRandom {
    state: u64,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed % LCG_MODULUS,
        }
    }

    pub fn state(&self) -> u64 {
        self.state
    }

    /// Next float in `[0, 1)`.
    pub fn next(&mut self) -> f64 {
        let (value, state) = lcg_step(self.state);
        self.state = state;
        value
    }

    /// Next integer in `[0, max)`. Returns 0 when `max` is 0.
    pub fn next_int(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        ((self.next() * max as f64).floor() as usize).min(max - 1)
    }

    /// `true` with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next() < p
    }

    /// Fisher-Yates from the top of the slice down.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_int(i + 1);
            items.swap(i, j);
        }
    }
}

impl RngCore for SeededRandom {
    fn next_u32(&mut self) -> u32 {
        let (_, state) = lcg_step(self.state);
        self.state = state;
        state as u32
    }

    fn next_u64(&mut self) -> u64 {
        let hi = self.next_u32() as u64;
        let lo = self.next_u32() as u64;
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for SeededRandom {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u64::from_le_bytes(seed))
    }

    // The default impl scrambles the seed; game seeds are used as-is.
    fn seed_from_u64(state: u64) -> Self {
        Self::new(state)
    }
}

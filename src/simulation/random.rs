use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Source of uniform draws in `[0, 1)` that gates every random branch.
pub trait RandomSource: Send {
    fn draw_uniform(&mut self) -> f64;
}

/// ChaCha8-backed source, seeded for reproducible runs or from OS entropy.
pub struct ChaChaSource {
    rng: ChaCha8Rng,
    seed: Option<u64>,
}

impl ChaChaSource {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed: Some(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
            seed: None,
        }
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}

impl RandomSource for ChaChaSource {
    fn draw_uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Replays a fixed list of draws, then keeps returning the fallback value.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    draws: VecDeque<f64>,
    fallback: f64,
}

impl ScriptedSource {
    pub fn new(draws: Vec<f64>) -> Self {
        Self::with_fallback(draws, 0.99)
    }

    pub fn with_fallback(draws: Vec<f64>, fallback: f64) -> Self {
        Self {
            draws: draws.into(),
            fallback,
        }
    }

    pub fn remaining(&self) -> usize {
        self.draws.len()
    }
}

impl RandomSource for ScriptedSource {
    fn draw_uniform(&mut self) -> f64 {
        self.draws.pop_front().unwrap_or(self.fallback)
    }
}

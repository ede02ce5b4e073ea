use rand::{Rng, SeedableRng, rngs::StdRng};

/// The host's built-in pseudo-random generator, used whenever true random
/// values are unavailable or disabled.
#[derive(Debug, Clone)]
pub struct Roller {
    rng: StdRng,
}

impl Roller {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let rng = StdRng::from_os_rng();
        Roller { rng }
    }

    pub fn from_seed(seed: u64) -> Self {
        let rng = StdRng::seed_from_u64(seed);
        Roller { rng }
    }

    pub fn uniform(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    pub fn into_fallback(mut self) -> Box<dyn FnMut() -> f64 + Send> {
        Box::new(move || self.uniform())
    }

    #[cfg(test)]
    pub fn test_rng() -> Self {
        Self::from_seed(42)
    }
}

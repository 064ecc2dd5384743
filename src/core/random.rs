use rand::distributions::{Distribution, Standard};
use rand::rngs::ThreadRng;

/// Source of uniform draws in `[0, 1)`.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;

    /// Uniform draw in `[-1, 1)`.
    fn next_signed_unit(&mut self) -> f64 {
        self.next_unit() * 2.0 - 1.0
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn next_unit(&mut self) -> f64 {
        (**self).next_unit()
    }
}

/// Production source backed by the calling thread's generator, so concurrent
/// evaluations never share a stream.
pub struct SystemRandom {
    inner: ThreadRng,
}

impl SystemRandom {
    pub fn new() -> Self {
        Self {
            inner: rand::thread_rng(),
        }
    }
}

impl Default for SystemRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for SystemRandom {
    fn next_unit(&mut self) -> f64 {
        Standard.sample(&mut self.inner)
    }
}

/// Seeded xorshift generator. Output depends only on the seed, on every platform.
#[derive(Debug, Clone)]
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        let state = match splitmix64(seed) {
            0 => 0xA5A5_A5A5_A5A5_A5A5,
            mixed => mixed,
        };
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }
}

impl RandomSource for SeededRng {
    fn next_unit(&mut self) -> f64 {
        const DENOM: f64 = (1_u64 << 53) as f64;
        (self.next_u64() >> 11) as f64 / DENOM
    }
}

/// Derives an independent stream seed, e.g. one per solver run or per repeated evaluation.
pub fn derive_seed(base_seed: u64, stream: u64) -> u64 {
    splitmix64(base_seed ^ stream.rotate_left(32))
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

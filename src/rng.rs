//! # Deterministic PRNG
//!
//! One stateful PRNG per compilation, built on `rand`'s `StdRng` the same
//! way the teacher's auth/session code seeds its generators — except here
//! the seed is a first-class, caller-supplied contract (spec §4.1) rather
//! than an incidental detail. `Seed::None` draws from platform entropy;
//! `Seed::Value(0)` is a perfectly valid, reproducible seed.
//!
//! The derived distributions (`gaussian`, `exponential`, `lognormal`,
//! `poisson`, `beta`) are hand-rolled rather than pulled from `rand_distr`:
//! the teacher's dependency stack doesn't carry that crate, and every one of
//! these needs optional min/max clamping the library versions don't expose
//! directly.

use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng};

/// The seed a compilation was started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seed {
    /// Non-reproducible: seeded from platform entropy.
    None,
    /// Reproducible: `compile(S, seed=k) == compile(S, seed=k)`.
    Value(u64),
}

/// The single source of nondeterminism for one compilation.
#[derive(Clone)]
pub struct Rng {
    inner: StdRng,
}

impl Rng {
    pub fn new(seed: Seed) -> Self {
        let inner = match seed {
            Seed::Value(s) => StdRng::seed_from_u64(s),
            Seed::None => StdRng::from_entropy(),
        };
        Rng { inner }
    }

    /// Capture state for backtracking. Not required by the external
    /// contract, but cheap enough to offer since `StdRng` is `Clone`.
    pub fn clone_state(&self) -> Rng {
        self.clone()
    }

    /// Exposes the underlying `rand::Rng` so callers that only need the
    /// standard `rand::Rng` surface (e.g. `fake`'s `fake_with_rng`) can draw
    /// from the same seeded stream instead of holding their own generator.
    pub fn inner_mut(&mut self) -> &mut StdRng {
        &mut self.inner
    }

    pub fn uniform01(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    /// Inclusive integer range `[lo, hi]`.
    pub fn int_range(&mut self, lo: i64, hi: i64) -> i64 {
        if lo >= hi {
            return lo;
        }
        self.inner.gen_range(lo..=hi)
    }

    /// Inclusive (up to floating rounding) float range `[lo, hi]`.
    pub fn float_range(&mut self, lo: f64, hi: f64) -> f64 {
        if lo >= hi {
            return lo;
        }
        self.inner.gen_range(lo..=hi)
    }

    pub fn bool(&mut self, p: f64) -> bool {
        self.uniform01() < p.clamp(0.0, 1.0)
    }

    /// Uniform choice over a non-empty slice.
    pub fn choice<'a, T>(&mut self, seq: &'a [T]) -> Option<&'a T> {
        if seq.is_empty() {
            return None;
        }
        let idx = self.inner.gen_range(0..seq.len());
        seq.get(idx)
    }

    /// Weighted choice: `weights` and `seq` are parallel slices.
    pub fn weighted_choice<'a, T>(&mut self, seq: &'a [T], weights: &[f64]) -> Option<&'a T> {
        let total: f64 = weights.iter().sum();
        if seq.is_empty() || total <= 0.0 {
            return self.choice(seq);
        }
        let mut target = self.uniform01() * total;
        for (item, w) in seq.iter().zip(weights) {
            if target < *w {
                return Some(item);
            }
            target -= w;
        }
        seq.last()
    }

    /// Box-Muller normal sample, rejection-clamped into `[min, max]` if
    /// given (i.e. resampled a bounded number of times, then hard-clamped).
    pub fn gaussian(&mut self, mu: f64, sigma: f64, min: Option<f64>, max: Option<f64>) -> f64 {
        self.bounded(min, max, |rng| {
            let u1 = rng.uniform01().max(f64::MIN_POSITIVE);
            let u2 = rng.uniform01();
            let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
            mu + sigma * z
        })
    }

    pub fn exponential(&mut self, rate: f64, min: Option<f64>, max: Option<f64>) -> f64 {
        self.bounded(min, max, |rng| {
            let u = rng.uniform01().max(f64::MIN_POSITIVE);
            -u.ln() / rate
        })
    }

    pub fn lognormal(&mut self, mu: f64, sigma: f64, min: Option<f64>, max: Option<f64>) -> f64 {
        self.bounded(min, max, |rng| rng.gaussian(mu, sigma, None, None).exp())
    }

    /// Knuth's algorithm for small `lambda`; normal approximation above the
    /// threshold where the Knuth product would underflow too often.
    pub fn poisson(&mut self, lambda: f64) -> i64 {
        if lambda <= 0.0 {
            return 0;
        }
        if lambda < 30.0 {
            let l = (-lambda).exp();
            let mut k = 0i64;
            let mut p = 1.0;
            loop {
                k += 1;
                p *= self.uniform01();
                if p <= l {
                    break;
                }
            }
            k - 1
        } else {
            let sample = self.gaussian(lambda, lambda.sqrt(), Some(0.0), None);
            sample.round() as i64
        }
    }

    /// Beta(alpha, beta) via the ratio of two Gamma variates.
    pub fn beta(&mut self, alpha: f64, beta: f64) -> f64 {
        let x = self.gamma(alpha);
        let y = self.gamma(beta);
        if x + y == 0.0 {
            0.0
        } else {
            x / (x + y)
        }
    }

    /// Marsaglia-Tsang Gamma(shape, 1) sampler, boosted for shape < 1.
    fn gamma(&mut self, shape: f64) -> f64 {
        if shape < 1.0 {
            let u = self.uniform01().max(f64::MIN_POSITIVE);
            return self.gamma(shape + 1.0) * u.powf(1.0 / shape);
        }
        let d = shape - 1.0 / 3.0;
        let c = 1.0 / (9.0 * d).sqrt();
        loop {
            let mut x;
            let mut v;
            loop {
                x = self.gaussian(0.0, 1.0, None, None);
                v = 1.0 + c * x;
                if v > 0.0 {
                    break;
                }
            }
            v = v * v * v;
            let u = self.uniform01();
            if u < 1.0 - 0.0331 * x * x * x * x {
                return d * v;
            }
            if u.ln() < 0.5 * x * x + d * (1.0 - v + v.ln()) {
                return d * v;
            }
        }
    }

    fn bounded(&mut self, min: Option<f64>, max: Option<f64>, mut sample: impl FnMut(&mut Self) -> f64) -> f64 {
        const MAX_REJECTIONS: u32 = 64;
        let mut value = sample(self);
        if min.is_none() && max.is_none() {
            return value;
        }
        for _ in 0..MAX_REJECTIONS {
            let in_bounds = min.map_or(true, |m| value >= m) && max.map_or(true, |m| value <= m);
            if in_bounds {
                return value;
            }
            value = sample(self);
        }
        // Give up rejecting and hard-clamp, per spec's "rejection-clamped".
        if let Some(m) = min {
            value = value.max(m);
        }
        if let Some(m) = max {
            value = value.min(m);
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = Rng::new(Seed::Value(42));
        let mut b = Rng::new(Seed::Value(42));
        for _ in 0..50 {
            assert_eq!(a.int_range(0, 1_000_000), b.int_range(0, 1_000_000));
        }
    }

    #[test]
    fn int_range_is_inclusive_and_bounded() {
        let mut rng = Rng::new(Seed::Value(7));
        for _ in 0..500 {
            let v = rng.int_range(1, 10);
            assert!((1..=10).contains(&v));
        }
    }

    #[test]
    fn gaussian_respects_bounds() {
        let mut rng = Rng::new(Seed::Value(1));
        for _ in 0..200 {
            let v = rng.gaussian(0.0, 100.0, Some(-1.0), Some(1.0));
            assert!((-1.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn beta_is_in_unit_interval() {
        let mut rng = Rng::new(Seed::Value(3));
        for _ in 0..200 {
            let v = rng.beta(2.0, 5.0);
            assert!((0.0..=1.0).contains(&v));
        }
    }
}

pub mod sample {
    use rand::{Rng, distributions::Uniform, prelude::Distribution};
    use crate::Modulus;

    pub const NOISE_STANDARD_DEVIATION: f64 = 3.2;
    pub const NOISE_DISTRIBUTION_WITH_MULTIPLIER: f64 = 6.0;
    pub const NOISE_MAX_DEVIATION: f64 = NOISE_STANDARD_DEVIATION * NOISE_DISTRIBUTION_WITH_MULTIPLIER;

    #[derive(Clone, Copy)]
    struct ClippedNormal {
        normal: rand_distr::Normal<f64>,
        max_deviation: f64,
    }

    impl Distribution<f64> for ClippedNormal {
        fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
            let mean = self.normal.mean();
            loop {
                let sample = self.normal.sample(rng);
                if (sample - mean).abs() <= self.max_deviation {
                    break sample;
                }
            }
        }
    }

    impl ClippedNormal {
        fn noise() -> Self {
            Self {
                // Constant positive deviation, construction cannot fail.
                normal: rand_distr::Normal::new(0.0, NOISE_STANDARD_DEVIATION)
                    .unwrap_or_else(|_| unreachable!()),
                max_deviation: NOISE_MAX_DEVIATION,
            }
        }
    }

    /// Coefficients uniform in {-1, 0, 1}.
    pub fn ternary<T: Rng>(rng: &mut T, modulus: &Modulus, destination: &mut [u64]) {
        let distribution = Uniform::new_inclusive(-1i64, 1);
        for x in destination.iter_mut() {
            *x = modulus.from_i64(rng.sample(distribution));
        }
    }

    /// Rounded Gaussian noise clipped at six standard deviations.
    pub fn normal<T: Rng>(rng: &mut T, modulus: &Modulus, destination: &mut [u64]) {
        let distribution = ClippedNormal::noise();
        for x in destination.iter_mut() {
            *x = modulus.from_i64(rng.sample(distribution).round() as i64);
        }
    }

    /// Coefficients uniform in [0, q).
    pub fn uniform<T: Rng>(rng: &mut T, modulus: &Modulus, destination: &mut [u64]) {
        let distribution = Uniform::new(0, modulus.value());
        for x in destination.iter_mut() {
            *x = rng.sample(distribution);
        }
    }

}

//! Tolerance sampling - per-cell placement and diameter noise
//!
//! Each bandolier draws one X offset, one Y offset and one diameter per cell
//! from the normal distributions configured in [`ModelConfig`]. Sampling is
//! driven by an explicit RNG so a trial can be replayed from its seed.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::core::config::ModelConfig;
use crate::core::error::ModelError;

/// Sampled manufacturing deviation of a single cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellTolerance {
    pub x_offset: f64,
    pub y_offset: f64,
    pub diameter: f64,
}

/// Draws cell tolerances from the configured normal distributions
#[derive(Debug, Clone, Copy)]
pub struct ToleranceSampler {
    x: Normal<f64>,
    y: Normal<f64>,
    diameter: Normal<f64>,
    diameter_nominal: f64,
}

impl ToleranceSampler {
    pub fn new(config: &ModelConfig) -> Result<Self, ModelError> {
        let normal = |name: &str, mu: f64, sigma: f64| {
            Normal::new(mu, sigma).map_err(|e| {
                ModelError::InvalidConfig(format!("{} distribution N({}, {}): {}", name, mu, sigma, e))
            })
        };

        Ok(Self {
            x: normal("x offset", config.offset_mu_x, config.offset_sigma_x)?,
            y: normal("y offset", config.offset_mu_y, config.offset_sigma_y)?,
            diameter: normal("diameter", config.diameter_mu, config.diameter_sigma)?,
            diameter_nominal: config.diameter_nominal,
        })
    }

    /// Sample one cell
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> CellTolerance {
        CellTolerance {
            x_offset: self.x.sample(rng),
            y_offset: self.y.sample(rng),
            diameter: self.diameter_nominal + self.diameter.sample(rng),
        }
    }

    /// Sample a whole bandolier, rejecting non-positive diameters
    pub fn sample_bandolier<R: Rng + ?Sized>(
        &self,
        bandolier: usize,
        cell_count: usize,
        rng: &mut R,
    ) -> Result<Vec<CellTolerance>, ModelError> {
        let mut cells = Vec::with_capacity(cell_count);
        for cell in 0..cell_count {
            let tolerance = self.sample(rng);
            if !(tolerance.diameter.is_finite() && tolerance.diameter > 0.0) {
                return Err(ModelError::NegativeDiameter {
                    bandolier,
                    cell,
                    diameter: tolerance.diameter,
                });
            }
            cells.push(tolerance);
        }
        Ok(cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_zero_sigma_is_deterministic() {
        let config = ModelConfig {
            offset_mu_x: 0.25,
            offset_sigma_x: 0.0,
            offset_mu_y: -0.5,
            offset_sigma_y: 0.0,
            diameter_mu: 0.1,
            diameter_sigma: 0.0,
            ..Default::default()
        };
        let sampler = ToleranceSampler::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let cell = sampler.sample(&mut rng);
        assert_eq!(cell.x_offset, 0.25);
        assert_eq!(cell.y_offset, -0.5);
        assert!((cell.diameter - 18.1).abs() < 1e-12);
    }

    #[test]
    fn test_same_seed_same_samples() {
        let config = ModelConfig::default();
        let sampler = ToleranceSampler::new(&config).unwrap();

        let a = sampler
            .sample_bandolier(0, 10, &mut StdRng::seed_from_u64(42))
            .unwrap();
        let b = sampler
            .sample_bandolier(0, 10, &mut StdRng::seed_from_u64(42))
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 10);
    }

    #[test]
    fn test_sample_statistics() {
        let config = ModelConfig {
            offset_sigma_x: 0.2,
            offset_sigma_y: 0.3,
            ..Default::default()
        };
        let sampler = ToleranceSampler::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(1234);

        let samples: Vec<CellTolerance> = (0..20_000).map(|_| sampler.sample(&mut rng)).collect();
        let n = samples.len() as f64;
        let mean_x = samples.iter().map(|c| c.x_offset).sum::<f64>() / n;
        let var_y = samples.iter().map(|c| c.y_offset.powi(2)).sum::<f64>() / n;

        assert!(mean_x.abs() < 0.01, "mean x = {}", mean_x);
        assert!((var_y.sqrt() - 0.3).abs() < 0.01, "sigma y = {}", var_y.sqrt());
    }

    #[test]
    fn test_non_positive_diameter_rejected() {
        let config = ModelConfig {
            diameter_nominal: 1.0,
            diameter_mu: -2.0,
            diameter_sigma: 0.0,
            ..Default::default()
        };
        let sampler = ToleranceSampler::new(&config).unwrap();
        let err = sampler
            .sample_bandolier(2, 4, &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        match err {
            ModelError::NegativeDiameter { bandolier, cell, .. } => {
                assert_eq!(bandolier, 2);
                assert_eq!(cell, 0);
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}

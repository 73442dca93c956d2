//! Strip-geometry sweeps.
//!
//! A sweep enumerates every combination of coated strip count `N` and coated
//! width `d` on a surface of height `L`; the uncoated width follows from
//! `N·d + (N+1)·d2 = L`.

use biofilm_core::SimError;
use serde::{Deserialize, Serialize};

/// One strip geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StripSpec {
    /// Number of coated strips (N)
    pub coated_strips: usize,

    /// Width of each coated strip (d)
    pub coated_width: f64,

    /// Width of each uncoated strip (d2)
    pub uncoated_width: f64,
}

impl StripSpec {
    pub fn new(coated_strips: usize, coated_width: f64, height: f64) -> Self {
        let n = coated_strips as f64;
        Self {
            coated_strips,
            coated_width,
            uncoated_width: (height - n * coated_width) / (n + 1.0),
        }
    }
}

impl std::fmt::Display for StripSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "N={} d={:.3} d2={:.3}",
            self.coated_strips, self.coated_width, self.uncoated_width
        )
    }
}

/// Grid of strip geometries to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StripSweep {
    /// Largest coated strip count; counts run from 1
    pub max_coated_strips: usize,

    /// Number of coated widths per count
    pub width_steps: usize,

    /// Surface height the strips fill
    pub height: f64,
}

impl StripSweep {
    pub fn new(max_coated_strips: usize, width_steps: usize, height: f64) -> Result<Self, SimError> {
        if max_coated_strips == 0 || width_steps == 0 {
            return Err(SimError::config("a sweep needs at least one strip count and one width"));
        }
        if !height.is_finite() || height <= 0.0 {
            return Err(SimError::config(format!("sweep height must be positive, got {height}")));
        }
        Ok(Self {
            max_coated_strips,
            width_steps,
            height,
        })
    }

    /// Coated width increment: the widest strips of the largest count fill the height.
    pub fn increment(&self) -> f64 {
        self.height / (self.max_coated_strips * self.width_steps) as f64
    }

    /// Every geometry, count-major.
    pub fn specs(&self) -> Vec<StripSpec> {
        let increment = self.increment();
        (1..=self.max_coated_strips)
            .flat_map(|n| (1..=self.width_steps).map(move |k| StripSpec::new(n, increment * k as f64, self.height)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.max_coated_strips * self.width_steps
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use biofilm_core::StripLayout;
    use proptest::prelude::*;

    #[test]
    fn test_sweep_enumeration() {
        let sweep = StripSweep::new(2, 5, 10.0).unwrap();
        let specs = sweep.specs();

        assert_eq!(specs.len(), sweep.len());
        assert_relative_eq!(sweep.increment(), 1.0);

        assert_eq!(specs[0].coated_strips, 1);
        assert_relative_eq!(specs[0].coated_width, 1.0);
        assert_relative_eq!(specs[0].uncoated_width, 4.5);

        let last = specs[specs.len() - 1];
        assert_eq!(last.coated_strips, 2);
        assert_relative_eq!(last.coated_width, 5.0);
        assert_relative_eq!(last.uncoated_width, 0.0);
    }

    #[test]
    fn test_spec_layout_matches_widths() {
        let spec = StripSpec::new(2, 2.0, 10.0);
        let layout = StripLayout::alternating(spec.coated_strips, spec.coated_width, 10.0).unwrap();

        assert_relative_eq!(spec.uncoated_width, 2.0);
        assert_eq!(layout.boundaries().len(), 6);
        assert_relative_eq!(layout.boundaries()[1], 2.0);
        assert_relative_eq!(layout.boundaries()[2], 4.0);
    }

    #[test]
    fn test_empty_sweep_rejected() {
        assert!(StripSweep::new(0, 3, 10.0).is_err());
        assert!(StripSweep::new(3, 0, 10.0).is_err());
        assert!(StripSweep::new(3, 3, -1.0).is_err());
    }

    proptest! {
        #[test]
        fn prop_every_spec_fits(max in 1usize..6, steps in 1usize..6, height in 1.0..50.0f64) {
            let sweep = StripSweep::new(max, steps, height).unwrap();
            for spec in sweep.specs() {
                let n = spec.coated_strips as f64;
                prop_assert!(spec.uncoated_width > -1e-9);
                prop_assert!((n * spec.coated_width + (n + 1.0) * spec.uncoated_width - height).abs() < 1e-9 * height.max(1.0));
                prop_assert!(StripLayout::alternating(spec.coated_strips, spec.coated_width, height).is_ok());
            }
        }
    }
}

//! Simulated link conditions for unreliable deliveries.

/// Loss and duplication applied to `Unreliable` remote deliveries.
///
/// Reliable sends and local echo are never affected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkConditions {
    /// Probability (0.0 - 1.0) that a delivery is dropped.
    pub loss_rate: f64,
    /// Probability (0.0 - 1.0) that a delivered envelope arrives twice.
    pub duplicate_rate: f64,
    /// Seed for the hub's random source.
    pub seed: u64,
}

impl Default for LinkConditions {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            seed: 42,
        }
    }
}

impl LinkConditions {
    /// A perfect link.
    #[must_use]
    pub fn perfect() -> Self {
        Self::default()
    }

    /// Set the loss rate, clamped to `0.0..=1.0`.
    #[must_use]
    pub fn with_loss(mut self, rate: f64) -> Self {
        self.loss_rate = clamp_rate(rate);
        self
    }

    /// Set the duplication rate, clamped to `0.0..=1.0`.
    #[must_use]
    pub fn with_duplication(mut self, rate: f64) -> Self {
        self.duplicate_rate = clamp_rate(rate);
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Both rates forced into `0.0..=1.0`. Fields are public, so the hub
    /// normalizes whatever it is handed.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            loss_rate: clamp_rate(self.loss_rate),
            duplicate_rate: clamp_rate(self.duplicate_rate),
            seed: self.seed,
        }
    }
}

fn clamp_rate(rate: f64) -> f64 {
    if rate.is_nan() {
        0.0
    } else {
        rate.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_are_clamped() {
        let c = LinkConditions::perfect().with_loss(1.5).with_duplication(-0.2);
        assert_eq!(c.loss_rate, 1.0);
        assert_eq!(c.duplicate_rate, 0.0);
        assert_eq!(LinkConditions::perfect().with_loss(f64::NAN).loss_rate, 0.0);
    }

    #[test]
    fn literal_out_of_range_rates_are_clamped() {
        let raw = LinkConditions {
            loss_rate: 7.0,
            duplicate_rate: f64::NAN,
            seed: 9,
        };
        let c = raw.clamped();
        assert_eq!(c.loss_rate, 1.0);
        assert_eq!(c.duplicate_rate, 0.0);
        assert_eq!(c.seed, 9);
    }
}

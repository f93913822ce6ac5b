pub struct Statistics;

impl Statistics {
    pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
        let first = *values.first()?;
        let mut min = first;
        let mut max = first;
        for &v in values.iter().skip(1) {
            min = min.min(v);
            max = max.max(v);
        }
        Some((min, max))
    }

    /// Linear rescale into `[0, 1]`; a degenerate range maps to `0.5`.
    pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
        if max <= min {
            return 0.5;
        }
        ((value - min) / (max - min)).clamp(0.0, 1.0)
    }

    /// Normalize every present value against the min/max of the present
    /// values. Missing values are excluded from the range and map to `0`.
    pub fn normalize_all(values: &[Option<f64>]) -> Vec<f64> {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        let Some((min, max)) = Self::min_max(&present) else {
            return vec![0.0; values.len()];
        };
        values
            .iter()
            .map(|v| v.map_or(0.0, |v| Self::normalize(v, min, max)))
            .collect()
    }
}

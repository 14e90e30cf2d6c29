//! Summary Statistics of a Series

/// Moments and order statistics shared by many calculators
#[derive(Debug, Clone)]
pub struct SeriesSummary {
    /// Number of observations
    pub len: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// Population variance
    pub variance: f64,
    /// Population standard deviation
    pub std_dev: f64,
    /// Bias-corrected skewness (NaN below 3 observations)
    pub skewness: f64,
    /// Bias-corrected excess kurtosis (NaN below 4 observations)
    pub kurtosis: f64,
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
    /// Values in ascending order
    pub sorted: Vec<f64>,
}

/// Variances below this are treated as a constant series
const FLAT_VARIANCE: f64 = 1e-14;

impl SeriesSummary {
    /// Compute the summary of a slice of values
    pub fn compute(values: &[f64]) -> Self {
        let len = values.len();
        if len == 0 {
            return Self {
                len,
                mean: f64::NAN,
                variance: f64::NAN,
                std_dev: f64::NAN,
                skewness: f64::NAN,
                kurtosis: f64::NAN,
                min: f64::NAN,
                max: f64::NAN,
                sorted: Vec::new(),
            };
        }

        let n = len as f64;
        let mean = values.iter().sum::<f64>() / n;

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let min = sorted[0];
        let max = sorted[len - 1];

        let mut m2 = 0.0;
        let mut m3 = 0.0;
        let mut m4 = 0.0;
        for &v in values {
            let d = v - mean;
            m2 += d * d;
            m3 += d * d * d;
            m4 += d * d * d * d;
        }

        let variance = m2 / n;
        let std_dev = variance.sqrt();
        let flat = variance < FLAT_VARIANCE;

        let skewness = if len < 3 {
            f64::NAN
        } else if flat {
            0.0
        } else {
            let g1 = (m3 / n) / variance.powf(1.5);
            g1 * (n * (n - 1.0)).sqrt() / (n - 2.0)
        };

        let kurtosis = if len < 4 {
            f64::NAN
        } else if flat {
            0.0
        } else {
            let scale = (n + 1.0) * n * (n - 1.0) / ((n - 2.0) * (n - 3.0));
            let correction = 3.0 * (n - 1.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0));
            scale * m4 / (m2 * m2) - correction
        };

        Self {
            len,
            mean,
            variance,
            std_dev,
            skewness,
            kurtosis,
            min,
            max,
            sorted,
        }
    }

    /// Quantile with linear interpolation between order statistics
    pub fn quantile(&self, q: f64) -> f64 {
        if self.len == 0 {
            return f64::NAN;
        }
        let pos = q.clamp(0.0, 1.0) * (self.len - 1) as f64;
        let lo = pos.floor() as usize;
        let hi = pos.ceil() as usize;
        let frac = pos - lo as f64;
        self.sorted[lo] + (self.sorted[hi] - self.sorted[lo]) * frac
    }

    pub fn median(&self) -> f64 {
        self.quantile(0.5)
    }

    /// Distinct values with their multiplicities, ascending
    pub fn value_counts(&self) -> Vec<(f64, usize)> {
        let mut counts: Vec<(f64, usize)> = Vec::new();
        for &v in &self.sorted {
            match counts.last_mut() {
                Some((last, count)) if *last == v => *count += 1,
                _ => counts.push((v, 1)),
            }
        }
        counts
    }

    /// Whether the series has no spread
    pub fn is_flat(&self) -> bool {
        self.variance < FLAT_VARIANCE
    }
}

//! FFT-based Spectral Features

use rustfft::{num_complex::Complex, FftPlanner};

/// Component of a Fourier coefficient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FftAttr {
    Real,
    Imag,
    Abs,
    Angle,
}

impl FftAttr {
    pub const ALL: [FftAttr; 4] = [FftAttr::Real, FftAttr::Imag, FftAttr::Abs, FftAttr::Angle];

    pub fn as_str(&self) -> &'static str {
        match self {
            FftAttr::Real => "real",
            FftAttr::Imag => "imag",
            FftAttr::Abs => "abs",
            FftAttr::Angle => "angle",
        }
    }
}

/// Aggregate of the amplitude spectrum seen as a distribution over bins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectralAggregate {
    Centroid,
    Variance,
    Skew,
    Kurtosis,
}

impl SpectralAggregate {
    pub const ALL: [SpectralAggregate; 4] = [
        SpectralAggregate::Centroid,
        SpectralAggregate::Variance,
        SpectralAggregate::Skew,
        SpectralAggregate::Kurtosis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpectralAggregate::Centroid => "centroid",
            SpectralAggregate::Variance => "variance",
            SpectralAggregate::Skew => "skew",
            SpectralAggregate::Kurtosis => "kurtosis",
        }
    }
}

/// Spread below which skew and kurtosis of the spectrum are undefined
const MIN_SPECTRAL_VARIANCE: f64 = 0.5;

/// One-sided discrete Fourier transform of a real series
#[derive(Debug, Clone)]
pub struct Spectrum {
    /// Coefficients 0..=n/2
    coefficients: Vec<Complex<f64>>,
}

impl Spectrum {
    /// Transform a real-valued signal
    pub fn compute(signal: &[f64]) -> Self {
        let n = signal.len();
        if n == 0 {
            return Self {
                coefficients: Vec::new(),
            };
        }

        let mut buffer: Vec<Complex<f64>> = signal.iter().map(|&v| Complex::new(v, 0.0)).collect();
        let fft = FftPlanner::new().plan_fft_forward(n);
        fft.process(&mut buffer);
        buffer.truncate(n / 2 + 1);

        Self {
            coefficients: buffer,
        }
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    /// Component of coefficient `k`, NaN when the series is too short
    pub fn coefficient(&self, k: usize, attr: FftAttr) -> f64 {
        let Some(c) = self.coefficients.get(k) else {
            return f64::NAN;
        };
        match attr {
            FftAttr::Real => c.re,
            FftAttr::Imag => c.im,
            FftAttr::Abs => c.norm(),
            FftAttr::Angle => c.arg().to_degrees(),
        }
    }

    /// Moments of the amplitude spectrum over bin indices
    pub fn aggregate(&self, aggregate: SpectralAggregate) -> f64 {
        let amplitudes: Vec<f64> = self.coefficients.iter().map(|c| c.norm()).collect();
        let total: f64 = amplitudes.iter().sum();
        if total == 0.0 || !total.is_finite() {
            return f64::NAN;
        }

        let moment = |order: i32| {
            amplitudes
                .iter()
                .enumerate()
                .map(|(i, a)| (i as f64).powi(order) * a)
                .sum::<f64>()
                / total
        };

        let m1 = moment(1);
        let m2 = moment(2);
        let variance = m2 - m1 * m1;

        match aggregate {
            SpectralAggregate::Centroid => m1,
            SpectralAggregate::Variance => variance,
            SpectralAggregate::Skew if variance < MIN_SPECTRAL_VARIANCE => f64::NAN,
            SpectralAggregate::Kurtosis if variance < MIN_SPECTRAL_VARIANCE => f64::NAN,
            SpectralAggregate::Skew => {
                let m3 = moment(3);
                (m3 - 3.0 * m1 * variance - m1.powi(3)) / variance.powf(1.5)
            }
            SpectralAggregate::Kurtosis => {
                let m3 = moment(3);
                let m4 = moment(4);
                (m4 - 4.0 * m1 * m3 + 6.0 * m1 * m1 * m2 - 3.0 * m1.powi(4)) / (variance * variance)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dc_component_is_sum() {
        let spectrum = Spectrum::compute(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(spectrum.len(), 3);
        assert!((spectrum.coefficient(0, FftAttr::Real) - 10.0).abs() < 1e-9);
        assert!(spectrum.coefficient(0, FftAttr::Imag).abs() < 1e-9);
        // X_1 = -2 + 2i for [1, 2, 3, 4]
        assert!((spectrum.coefficient(1, FftAttr::Real) + 2.0).abs() < 1e-9);
        assert!((spectrum.coefficient(1, FftAttr::Imag) - 2.0).abs() < 1e-9);
        assert!((spectrum.coefficient(1, FftAttr::Angle) - 135.0).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_coefficient() {
        let spectrum = Spectrum::compute(&[1.0]);
        assert!((spectrum.coefficient(0, FftAttr::Abs) - 1.0).abs() < 1e-12);
        assert!(spectrum.coefficient(1, FftAttr::Abs).is_nan());
    }

    #[test]
    fn test_sine_wave_centroid() {
        // 4 cycles over 64 samples puts all energy into bin 4
        let signal: Vec<f64> = (0..64)
            .map(|i| (2.0 * std::f64::consts::PI * 4.0 * i as f64 / 64.0).sin())
            .collect();
        let spectrum = Spectrum::compute(&signal);
        assert!((spectrum.aggregate(SpectralAggregate::Centroid) - 4.0).abs() < 1e-6);
        assert!(spectrum.aggregate(SpectralAggregate::Variance).abs() < 1e-6);
        assert!(spectrum.aggregate(SpectralAggregate::Skew).is_nan());
    }

    #[test]
    fn test_empty_signal() {
        let spectrum = Spectrum::compute(&[]);
        assert!(spectrum.is_empty());
        assert!(spectrum.aggregate(SpectralAggregate::Centroid).is_nan());
    }
}

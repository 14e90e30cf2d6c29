//! Extraction Presets

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::calculators::{Calculator, TrendAttr};
use crate::fft::{FftAttr, SpectralAggregate};
use crate::PresetError;

/// Number of Fourier coefficients reported per component
const FFT_COEFFICIENTS: usize = 100;

/// Named calculator bundle trading coverage against cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Every calculator with every parameter variant
    Comprehensive,
    /// Comprehensive without the quadratic-cost calculators
    Efficient,
    /// Basic location and spread statistics only
    Minimal,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Comprehensive => "comprehensive",
            Preset::Efficient => "efficient",
            Preset::Minimal => "minimal",
        }
    }

    /// Concrete calculator directives for this preset
    pub fn directives(self) -> ExtractionDirectives {
        let calculators = match self {
            Preset::Comprehensive => comprehensive(),
            Preset::Efficient => comprehensive()
                .into_iter()
                .filter(|c| !c.is_high_cost())
                .collect(),
            Preset::Minimal => minimal(),
        };
        ExtractionDirectives {
            preset: self,
            calculators,
        }
    }
}

impl FromStr for Preset {
    type Err = PresetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "comprehensive" => Ok(Preset::Comprehensive),
            "efficient" => Ok(Preset::Efficient),
            "minimal" => Ok(Preset::Minimal),
            other => Err(PresetError::Unknown(other.to_string())),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved, immutable calculator set handed to the engine
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionDirectives {
    pub preset: Preset,
    pub calculators: Vec<Calculator>,
}

/// Look up a preset by name
pub fn resolve(name: &str) -> Result<ExtractionDirectives, PresetError> {
    Ok(name.parse::<Preset>()?.directives())
}

fn minimal() -> Vec<Calculator> {
    vec![
        Calculator::SumValues,
        Calculator::Median,
        Calculator::Mean,
        Calculator::Length,
        Calculator::StandardDeviation,
        Calculator::Variance,
        Calculator::RootMeanSquare,
        Calculator::Maximum,
        Calculator::AbsoluteMaximum,
        Calculator::Minimum,
    ]
}

fn comprehensive() -> Vec<Calculator> {
    use Calculator::*;

    let mut calculators = minimal();
    calculators.extend([
        AbsEnergy,
        MeanAbsChange,
        MeanChange,
        MeanSecondDerivativeCentral,
        Skewness,
        Kurtosis,
        CountAboveMean,
        CountBelowMean,
        FirstLocationOfMaximum,
        LastLocationOfMaximum,
        FirstLocationOfMinimum,
        LastLocationOfMinimum,
        HasDuplicate,
        HasDuplicateMax,
        HasDuplicateMin,
        VarianceLargerThanStandardDeviation,
        LongestStrikeAboveMean,
        LongestStrikeBelowMean,
        SumOfReoccurringValues,
        SumOfReoccurringDataPoints,
        PercentageOfReoccurringDatapoints,
        PercentageOfReoccurringValues,
        AbsoluteSumOfChanges,
        VariationCoefficient,
        SampleEntropy,
    ]);

    let deciles = [0.1, 0.2, 0.3, 0.4, 0.6, 0.7, 0.8, 0.9];
    calculators.extend(deciles.iter().map(|&q| Quantile { q }));
    calculators.extend(deciles.iter().map(|&q| IndexMassQuantile { q }));
    calculators.extend((0..10).map(|lag| Autocorrelation { lag }));

    for coeff in 0..FFT_COEFFICIENTS {
        calculators.extend(FftAttr::ALL.iter().map(|&attr| FftCoefficient { coeff, attr }));
    }
    calculators.extend(
        SpectralAggregate::ALL
            .iter()
            .map(|&aggtype| FftAggregated { aggtype }),
    );
    calculators.extend(TrendAttr::ALL.iter().map(|&attr| LinearTrend { attr }));

    calculators.extend([-1, 0, 1].map(|m| NumberCrossingM { m }));
    calculators.extend(
        [0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 5.0, 6.0, 7.0, 10.0].map(|r| RatioBeyondRSigma { r }),
    );
    calculators.extend((1..20).map(|i| LargeStandardDeviation { r: i as f64 / 20.0 }));
    calculators.extend((0..20).map(|i| SymmetryLooking { r: i as f64 / 20.0 }));
    calculators.extend([1, 3, 5, 10, 50].map(|n| NumberPeaks { n }));
    calculators.extend([true, false].map(|normalize| CidCe { normalize }));
    calculators.extend((1..=3).map(|lag| C3 { lag }));
    calculators.extend((1..=3).map(|lag| TimeReversalAsymmetryStatistic { lag }));
    calculators.push(BinnedEntropy { max_bins: 10 });
    calculators.extend([0, 1, -1].map(|value| ValueCount { value }));
    calculators.push(RangeCount { min: -1, max: 1 });
    calculators.push(CountAbove { t: 0 });
    calculators.push(CountBelow { t: 0 });
    calculators.extend([3, 5, 7].map(|number_of_maxima| MeanNAbsoluteMax { number_of_maxima }));
    calculators.extend([0.1, 0.3, 0.5, 0.7, 0.9].map(|r| ApproximateEntropy { m: 2, r }));

    calculators
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_resolve_known_presets() {
        assert_eq!(resolve("minimal").unwrap().calculators.len(), 10);
        assert!(resolve("comprehensive").unwrap().calculators.len() > 100);
        assert_eq!(resolve("efficient").unwrap().preset, Preset::Efficient);
    }

    #[test]
    fn test_unknown_preset_names_value() {
        let err = resolve("everything").unwrap_err();
        assert_eq!(err, PresetError::Unknown("everything".to_string()));
        assert!(err.to_string().contains("everything"));
    }

    #[test]
    fn test_efficient_drops_only_high_cost() {
        let comprehensive = Preset::Comprehensive.directives().calculators;
        let efficient = Preset::Efficient.directives().calculators;
        assert!(efficient.len() < comprehensive.len());
        assert!(efficient.iter().all(|c| !c.is_high_cost()));
        assert_eq!(
            comprehensive.len() - efficient.len(),
            comprehensive.iter().filter(|c| c.is_high_cost()).count()
        );
    }

    #[test]
    fn test_minimal_is_subset_of_efficient() {
        let efficient = Preset::Efficient.directives().calculators;
        for calculator in Preset::Minimal.directives().calculators {
            assert!(efficient.contains(&calculator));
        }
    }

    #[test]
    fn test_feature_names_unique() {
        let calculators = Preset::Comprehensive.directives().calculators;
        let names: HashSet<String> = calculators.iter().map(|c| c.feature_name("v")).collect();
        assert_eq!(names.len(), calculators.len());
    }
}

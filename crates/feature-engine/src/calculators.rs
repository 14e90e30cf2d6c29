//! Feature Calculators
//!
//! Every calculator maps one time series to one scalar. Feature names follow
//! the `<kind>__<calculator>[__<param>_<value>]` convention, with parameters
//! in alphabetical order, so outputs line up with other tsfresh-style tools.

use std::cell::OnceCell;

use crate::fft::{FftAttr, SpectralAggregate, Spectrum};
use crate::statistics::SeriesSummary;

/// Coefficient of a least-squares line fitted against the sample index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendAttr {
    Slope,
    Intercept,
    RValue,
    StdErr,
}

impl TrendAttr {
    pub const ALL: [TrendAttr; 4] = [
        TrendAttr::RValue,
        TrendAttr::Intercept,
        TrendAttr::Slope,
        TrendAttr::StdErr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendAttr::Slope => "slope",
            TrendAttr::Intercept => "intercept",
            TrendAttr::RValue => "rvalue",
            TrendAttr::StdErr => "stderr",
        }
    }
}

/// A single feature calculator with its parameters
#[derive(Debug, Clone, PartialEq)]
pub enum Calculator {
    SumValues,
    Median,
    Mean,
    Length,
    StandardDeviation,
    Variance,
    RootMeanSquare,
    Maximum,
    AbsoluteMaximum,
    Minimum,
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
    Quantile { q: f64 },
    Autocorrelation { lag: usize },
    FftCoefficient { coeff: usize, attr: FftAttr },
    FftAggregated { aggtype: SpectralAggregate },
    NumberCrossingM { m: i64 },
    RatioBeyondRSigma { r: f64 },
    LargeStandardDeviation { r: f64 },
    SymmetryLooking { r: f64 },
    NumberPeaks { n: usize },
    CidCe { normalize: bool },
    LinearTrend { attr: TrendAttr },
    C3 { lag: usize },
    TimeReversalAsymmetryStatistic { lag: usize },
    IndexMassQuantile { q: f64 },
    BinnedEntropy { max_bins: usize },
    ValueCount { value: i64 },
    RangeCount { min: i64, max: i64 },
    CountAbove { t: i64 },
    CountBelow { t: i64 },
    MeanNAbsoluteMax { number_of_maxima: usize },
    ApproximateEntropy { m: usize, r: f64 },
    SampleEntropy,
}

impl Calculator {
    /// Calculator name without parameters
    pub fn base_name(&self) -> &'static str {
        use Calculator::*;
        match self {
            SumValues => "sum_values",
            Median => "median",
            Mean => "mean",
            Length => "length",
            StandardDeviation => "standard_deviation",
            Variance => "variance",
            RootMeanSquare => "root_mean_square",
            Maximum => "maximum",
            AbsoluteMaximum => "absolute_maximum",
            Minimum => "minimum",
            AbsEnergy => "abs_energy",
            MeanAbsChange => "mean_abs_change",
            MeanChange => "mean_change",
            MeanSecondDerivativeCentral => "mean_second_derivative_central",
            Skewness => "skewness",
            Kurtosis => "kurtosis",
            CountAboveMean => "count_above_mean",
            CountBelowMean => "count_below_mean",
            FirstLocationOfMaximum => "first_location_of_maximum",
            LastLocationOfMaximum => "last_location_of_maximum",
            FirstLocationOfMinimum => "first_location_of_minimum",
            LastLocationOfMinimum => "last_location_of_minimum",
            HasDuplicate => "has_duplicate",
            HasDuplicateMax => "has_duplicate_max",
            HasDuplicateMin => "has_duplicate_min",
            VarianceLargerThanStandardDeviation => "variance_larger_than_standard_deviation",
            LongestStrikeAboveMean => "longest_strike_above_mean",
            LongestStrikeBelowMean => "longest_strike_below_mean",
            SumOfReoccurringValues => "sum_of_reoccurring_values",
            SumOfReoccurringDataPoints => "sum_of_reoccurring_data_points",
            PercentageOfReoccurringDatapoints => {
                "percentage_of_reoccurring_datapoints_to_all_datapoints"
            }
            PercentageOfReoccurringValues => "percentage_of_reoccurring_values_to_all_values",
            AbsoluteSumOfChanges => "absolute_sum_of_changes",
            VariationCoefficient => "variation_coefficient",
            Quantile { .. } => "quantile",
            Autocorrelation { .. } => "autocorrelation",
            FftCoefficient { .. } => "fft_coefficient",
            FftAggregated { .. } => "fft_aggregated",
            NumberCrossingM { .. } => "number_crossing_m",
            RatioBeyondRSigma { .. } => "ratio_beyond_r_sigma",
            LargeStandardDeviation { .. } => "large_standard_deviation",
            SymmetryLooking { .. } => "symmetry_looking",
            NumberPeaks { .. } => "number_peaks",
            CidCe { .. } => "cid_ce",
            LinearTrend { .. } => "linear_trend",
            C3 { .. } => "c3",
            TimeReversalAsymmetryStatistic { .. } => "time_reversal_asymmetry_statistic",
            IndexMassQuantile { .. } => "index_mass_quantile",
            BinnedEntropy { .. } => "binned_entropy",
            ValueCount { .. } => "value_count",
            RangeCount { .. } => "range_count",
            CountAbove { .. } => "count_above",
            CountBelow { .. } => "count_below",
            MeanNAbsoluteMax { .. } => "mean_n_absolute_max",
            ApproximateEntropy { .. } => "approximate_entropy",
            SampleEntropy => "sample_entropy",
        }
    }

    /// Parameters as (name, rendered value), alphabetically by name
    pub fn params(&self) -> Vec<(&'static str, String)> {
        use Calculator::*;
        match self {
            Quantile { q } | IndexMassQuantile { q } => vec![("q", render_float(*q))],
            Autocorrelation { lag } | C3 { lag } | TimeReversalAsymmetryStatistic { lag } => {
                vec![("lag", lag.to_string())]
            }
            FftCoefficient { coeff, attr } => vec![
                ("attr", quoted(attr.as_str())),
                ("coeff", coeff.to_string()),
            ],
            FftAggregated { aggtype } => vec![("aggtype", quoted(aggtype.as_str()))],
            NumberCrossingM { m } => vec![("m", m.to_string())],
            RatioBeyondRSigma { r } | LargeStandardDeviation { r } | SymmetryLooking { r } => {
                vec![("r", render_float(*r))]
            }
            NumberPeaks { n } => vec![("n", n.to_string())],
            CidCe { normalize } => vec![(
                "normalize",
                if *normalize { "True" } else { "False" }.to_string(),
            )],
            LinearTrend { attr } => vec![("attr", quoted(attr.as_str()))],
            BinnedEntropy { max_bins } => vec![("max_bins", max_bins.to_string())],
            ValueCount { value } => vec![("value", value.to_string())],
            RangeCount { min, max } => vec![("max", max.to_string()), ("min", min.to_string())],
            CountAbove { t } | CountBelow { t } => vec![("t", t.to_string())],
            MeanNAbsoluteMax { number_of_maxima } => {
                vec![("number_of_maxima", number_of_maxima.to_string())]
            }
            ApproximateEntropy { m, r } => vec![("m", m.to_string()), ("r", render_float(*r))],
            _ => Vec::new(),
        }
    }

    /// Full output column name for a series kind
    pub fn feature_name(&self, kind: &str) -> String {
        let mut name = format!("{}__{}", kind, self.base_name());
        for (param, value) in self.params() {
            name.push_str("__");
            name.push_str(param);
            name.push('_');
            name.push_str(&value);
        }
        name
    }

    /// Calculators whose cost grows quadratically with series length
    pub fn is_high_cost(&self) -> bool {
        matches!(
            self,
            Calculator::ApproximateEntropy { .. } | Calculator::SampleEntropy
        )
    }

    /// Evaluate the calculator on a prepared series
    pub fn compute(&self, series: &Series<'_>) -> f64 {
        use Calculator::*;
        let x = series.values;
        let s = &series.summary;
        let n = x.len();
        if n == 0 {
            return f64::NAN;
        }
        let nf = n as f64;

        match self {
            SumValues => x.iter().sum(),
            Median => s.median(),
            Mean => s.mean,
            Length => nf,
            StandardDeviation => s.std_dev,
            Variance => s.variance,
            RootMeanSquare => (x.iter().map(|v| v * v).sum::<f64>() / nf).sqrt(),
            Maximum => s.max,
            AbsoluteMaximum => s.max.abs().max(s.min.abs()),
            Minimum => s.min,
            AbsEnergy => x.iter().map(|v| v * v).sum(),
            MeanAbsChange => mean_or_nan(diffs(x).map(f64::abs)),
            MeanChange if n < 2 => f64::NAN,
            MeanChange => (x[n - 1] - x[0]) / (nf - 1.0),
            MeanSecondDerivativeCentral if n < 3 => f64::NAN,
            MeanSecondDerivativeCentral => {
                (x[n - 1] - x[n - 2] - x[1] + x[0]) / (2.0 * (nf - 2.0))
            }
            Skewness => s.skewness,
            Kurtosis => s.kurtosis,
            CountAboveMean => x.iter().filter(|&&v| v > s.mean).count() as f64,
            CountBelowMean => x.iter().filter(|&&v| v < s.mean).count() as f64,
            FirstLocationOfMaximum => first_position(x, s.max) / nf,
            LastLocationOfMaximum => (last_position(x, s.max) + 1.0) / nf,
            FirstLocationOfMinimum => first_position(x, s.min) / nf,
            LastLocationOfMinimum => (last_position(x, s.min) + 1.0) / nf,
            HasDuplicate => flag(s.value_counts().len() != n),
            HasDuplicateMax => flag(x.iter().filter(|&&v| v == s.max).count() > 1),
            HasDuplicateMin => flag(x.iter().filter(|&&v| v == s.min).count() > 1),
            VarianceLargerThanStandardDeviation => flag(s.variance > s.std_dev),
            LongestStrikeAboveMean => longest_run(x, |v| v > s.mean) as f64,
            LongestStrikeBelowMean => longest_run(x, |v| v < s.mean) as f64,
            SumOfReoccurringValues => reoccurring(s).map(|(v, _)| v).sum(),
            SumOfReoccurringDataPoints => reoccurring(s).map(|(v, c)| v * c as f64).sum(),
            PercentageOfReoccurringDatapoints => {
                reoccurring(s).map(|(_, c)| c).sum::<usize>() as f64 / nf
            }
            PercentageOfReoccurringValues => {
                reoccurring(s).count() as f64 / s.value_counts().len() as f64
            }
            AbsoluteSumOfChanges => diffs(x).map(f64::abs).sum(),
            VariationCoefficient if s.mean == 0.0 => f64::NAN,
            VariationCoefficient => s.std_dev / s.mean,
            Quantile { q } => s.quantile(*q),
            Autocorrelation { lag } => autocorrelation(x, s, *lag),
            FftCoefficient { coeff, attr } => series.spectrum().coefficient(*coeff, *attr),
            FftAggregated { aggtype } => series.spectrum().aggregate(*aggtype),
            NumberCrossingM { m } => {
                let m = *m as f64;
                x.windows(2).filter(|w| (w[0] > m) != (w[1] > m)).count() as f64
            }
            RatioBeyondRSigma { r } => {
                x.iter().filter(|&&v| (v - s.mean).abs() > r * s.std_dev).count() as f64 / nf
            }
            LargeStandardDeviation { r } => flag(s.std_dev > r * (s.max - s.min)),
            SymmetryLooking { r } => flag((s.mean - s.median()).abs() < r * (s.max - s.min)),
            NumberPeaks { n: support } => number_peaks(x, *support) as f64,
            CidCe { normalize } => cid_ce(x, s, *normalize),
            LinearTrend { attr } => linear_trend(x, s, *attr),
            C3 { lag } => lagged_mean(x, *lag, |a, b, c| c * b * a),
            TimeReversalAsymmetryStatistic { lag } => {
                lagged_mean(x, *lag, |a, b, c| c * c * b - b * a * a)
            }
            IndexMassQuantile { q } => index_mass_quantile(x, *q),
            BinnedEntropy { max_bins } => binned_entropy(x, s, *max_bins),
            ValueCount { value } => x.iter().filter(|&&v| v == *value as f64).count() as f64,
            RangeCount { min, max } => x
                .iter()
                .filter(|&&v| v >= *min as f64 && v < *max as f64)
                .count() as f64,
            CountAbove { t } => x.iter().filter(|&&v| v > *t as f64).count() as f64 / nf,
            CountBelow { t } => x.iter().filter(|&&v| v < *t as f64).count() as f64 / nf,
            MeanNAbsoluteMax { number_of_maxima: k } => mean_n_absolute_max(x, *k),
            ApproximateEntropy { m, r } => approximate_entropy(x, *m, r * s.std_dev),
            SampleEntropy => sample_entropy(x, 2, 0.2 * s.std_dev),
        }
    }
}

/// A series prepared for evaluation, sharing summary and spectrum across calculators
pub struct Series<'a> {
    values: &'a [f64],
    summary: SeriesSummary,
    spectrum: OnceCell<Spectrum>,
}

impl<'a> Series<'a> {
    pub fn new(values: &'a [f64]) -> Self {
        Self {
            values,
            summary: SeriesSummary::compute(values),
            spectrum: OnceCell::new(),
        }
    }

    pub fn summary(&self) -> &SeriesSummary {
        &self.summary
    }

    fn spectrum(&self) -> &Spectrum {
        self.spectrum.get_or_init(|| Spectrum::compute(self.values))
    }
}

/// Evaluate every calculator on one series, in order
pub fn compute_all(values: &[f64], calculators: &[Calculator]) -> Vec<f64> {
    let series = Series::new(values);
    calculators.iter().map(|c| c.compute(&series)).collect()
}

fn render_float(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", value)
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn diffs(x: &[f64]) -> impl Iterator<Item = f64> + '_ {
    x.windows(2).map(|w| w[1] - w[0])
}

fn mean_or_nan(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

fn first_position(x: &[f64], target: f64) -> f64 {
    x.iter().position(|&v| v == target).unwrap_or(0) as f64
}

fn last_position(x: &[f64], target: f64) -> f64 {
    x.iter().rposition(|&v| v == target).unwrap_or(0) as f64
}

fn longest_run(x: &[f64], predicate: impl Fn(f64) -> bool) -> usize {
    let mut best = 0;
    let mut current = 0;
    for &v in x {
        if predicate(v) {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

fn reoccurring(s: &SeriesSummary) -> impl Iterator<Item = (f64, usize)> {
    s.value_counts().into_iter().filter(|&(_, c)| c > 1)
}

fn autocorrelation(x: &[f64], s: &SeriesSummary, lag: usize) -> f64 {
    let n = x.len();
    if lag >= n || s.is_flat() {
        return f64::NAN;
    }
    let sum: f64 = x[..n - lag]
        .iter()
        .zip(&x[lag..])
        .map(|(a, b)| (a - s.mean) * (b - s.mean))
        .sum();
    sum / ((n - lag) as f64 * s.variance)
}

fn number_peaks(x: &[f64], support: usize) -> usize {
    if support == 0 || x.len() < 2 * support + 1 {
        return 0;
    }
    (support..x.len() - support)
        .filter(|&i| (1..=support).all(|k| x[i] > x[i - k] && x[i] > x[i + k]))
        .count()
}

fn cid_ce(x: &[f64], s: &SeriesSummary, normalize: bool) -> f64 {
    if normalize && s.is_flat() {
        return 0.0;
    }
    let scale = |v: f64| if normalize { (v - s.mean) / s.std_dev } else { v };
    x.windows(2)
        .map(|w| {
            let d = scale(w[1]) - scale(w[0]);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

fn linear_trend(x: &[f64], s: &SeriesSummary, attr: TrendAttr) -> f64 {
    let n = x.len();
    if n < 2 {
        return f64::NAN;
    }
    let t_mean = (n - 1) as f64 / 2.0;
    let (mut ss_t, mut ss_y, mut ss_ty) = (0.0, 0.0, 0.0);
    for (i, &y) in x.iter().enumerate() {
        let dt = i as f64 - t_mean;
        let dy = y - s.mean;
        ss_t += dt * dt;
        ss_y += dy * dy;
        ss_ty += dt * dy;
    }

    let slope = ss_ty / ss_t;
    let r = if ss_y == 0.0 {
        0.0
    } else {
        (ss_ty / (ss_t * ss_y).sqrt()).clamp(-1.0, 1.0)
    };

    match attr {
        TrendAttr::Slope => slope,
        TrendAttr::Intercept => s.mean - slope * t_mean,
        TrendAttr::RValue => r,
        TrendAttr::StdErr if n == 2 => 0.0,
        TrendAttr::StdErr => ((1.0 - r * r) * ss_y / ss_t / (n - 2) as f64).sqrt(),
    }
}

/// Mean of `f(x[i], x[i + lag], x[i + 2 * lag])`, 0 for too short series
fn lagged_mean(x: &[f64], lag: usize, f: impl Fn(f64, f64, f64) -> f64) -> f64 {
    let n = x.len();
    if 2 * lag >= n {
        return 0.0;
    }
    let count = n - 2 * lag;
    (0..count)
        .map(|i| f(x[i], x[i + lag], x[i + 2 * lag]))
        .sum::<f64>()
        / count as f64
}

fn index_mass_quantile(x: &[f64], q: f64) -> f64 {
    let total: f64 = x.iter().map(|v| v.abs()).sum();
    if total == 0.0 {
        return f64::NAN;
    }
    let mut cumulative = 0.0;
    for (i, v) in x.iter().enumerate() {
        cumulative += v.abs();
        if cumulative / total >= q {
            return (i + 1) as f64 / x.len() as f64;
        }
    }
    1.0
}

fn binned_entropy(x: &[f64], s: &SeriesSummary, max_bins: usize) -> f64 {
    if max_bins == 0 {
        return f64::NAN;
    }
    let range = s.max - s.min;
    if range == 0.0 {
        return 0.0;
    }
    let mut bins = vec![0usize; max_bins];
    for &v in x {
        let idx = (((v - s.min) / range) * max_bins as f64) as usize;
        bins[idx.min(max_bins - 1)] += 1;
    }
    let n = x.len() as f64;
    -bins
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            p * p.ln()
        })
        .sum::<f64>()
}

fn mean_n_absolute_max(x: &[f64], k: usize) -> f64 {
    if k == 0 || x.len() < k {
        return f64::NAN;
    }
    let mut magnitudes: Vec<f64> = x.iter().map(|v| v.abs()).collect();
    magnitudes.sort_by(|a, b| b.total_cmp(a));
    magnitudes[..k].iter().sum::<f64>() / k as f64
}

/// Whether two windows of length `m` stay within `tolerance` everywhere
fn within(x: &[f64], i: usize, j: usize, m: usize, tolerance: f64) -> bool {
    (0..m).all(|k| (x[i + k] - x[j + k]).abs() <= tolerance)
}

fn approximate_entropy(x: &[f64], m: usize, tolerance: f64) -> f64 {
    let n = x.len();
    if n <= m + 1 {
        return 0.0;
    }
    let phi = |m: usize| {
        let windows = n - m + 1;
        (0..windows)
            .map(|i| {
                let matches = (0..windows).filter(|&j| within(x, i, j, m, tolerance)).count();
                (matches as f64 / windows as f64).ln()
            })
            .sum::<f64>()
            / windows as f64
    };
    (phi(m) - phi(m + 1)).abs()
}

fn sample_entropy(x: &[f64], m: usize, tolerance: f64) -> f64 {
    let n = x.len();
    if n <= m + 1 {
        return f64::NAN;
    }
    let templates = n - m;
    let (mut shorter, mut longer) = (0usize, 0usize);
    for i in 0..templates {
        for j in (i + 1)..templates {
            if within(x, i, j, m, tolerance) {
                shorter += 1;
                if (x[i + m] - x[j + m]).abs() <= tolerance {
                    longer += 1;
                }
            }
        }
    }
    if shorter == 0 || longer == 0 {
        return f64::NAN;
    }
    -(longer as f64 / shorter as f64).ln()
}

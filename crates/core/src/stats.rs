//! Statistical primitives for two-sample experiment analysis.
//!
//! Provides descriptive statistics, quantiles, Student's t confidence
//! intervals and independent two-sample t-tests. Everything here works on
//! full-precision `f64` samples; rounding belongs to presentation code.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use thiserror::Error;

/// Minimum number of observations for an interval or a t-test.
pub const MIN_SAMPLE_SIZE: usize = 2;

/// Errors raised by the statistical primitives.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    /// Too few observations to estimate a standard error.
    #[error("insufficient sample: need at least {required} observations, got {actual}")]
    InsufficientSample { required: usize, actual: usize },

    /// Confidence level outside the open interval (0, 1).
    #[error("confidence level must lie strictly between 0 and 1, got {0}")]
    InvalidConfidenceLevel(f64),

    /// The t distribution could not be constructed.
    #[error("t distribution error: {0}")]
    Distribution(String),
}

/// Variance convention used by the two-sample t-test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceAssumption {
    /// Student's test with a pooled variance estimate (df = n1 + n2 - 2).
    #[default]
    Pooled,
    /// Welch's unequal-variance test with Welch-Satterthwaite df.
    Welch,
}

/// Arithmetic mean, or `None` for an empty sample.
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Unbiased sample variance (n - 1 denominator).
///
/// Returns `None` when fewer than two observations are available.
#[must_use]
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < MIN_SAMPLE_SIZE {
        return None;
    }
    let m = mean(values)?;
    let sum_sq = values.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    Some(sum_sq / (values.len() - 1) as f64)
}

/// Sample standard deviation (n - 1 denominator).
#[must_use]
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(f64::sqrt)
}

/// Median of the sample, averaging the two middle values for even `n`.
#[must_use]
pub fn median(values: &[f64]) -> Option<f64> {
    let sorted = sorted_copy(values);
    quantile_sorted(&sorted, 0.5)
}

/// Quantile of an already sorted sample using linear interpolation
/// between closest ranks (position `q * (n - 1)`).
///
/// # Examples
/// ```
/// use abtest_core::stats::quantile_sorted;
///
/// let sorted = [10.0, 11.0, 12.0, 13.0, 1000.0];
/// assert_eq!(quantile_sorted(&sorted, 0.25), Some(11.0));
/// assert_eq!(quantile_sorted(&sorted, 0.75), Some(13.0));
/// ```
#[must_use]
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }

    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// First and third quartiles of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quartiles {
    pub q1: f64,
    pub q3: f64,
}

impl Quartiles {
    /// Computes both quartiles with linear interpolation.
    #[must_use]
    pub fn from_sample(values: &[f64]) -> Option<Self> {
        let sorted = sorted_copy(values);
        Some(Self {
            q1: quantile_sorted(&sorted, 0.25)?,
            q3: quantile_sorted(&sorted, 0.75)?,
        })
    }

    /// Interquartile range, Q3 - Q1.
    #[must_use]
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }

    /// Tukey-style upper fence, `Q3 + multiplier * IQR`.
    #[must_use]
    pub fn upper_fence(&self, multiplier: f64) -> f64 {
        self.q3 + multiplier * self.iqr()
    }
}

/// Two-sided confidence interval for a sample mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
    pub sample_size: usize,
    pub confidence_level: f64,
}

impl ConfidenceInterval {
    /// Width of the interval.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Returns true if `value` lies inside the closed interval.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// Builds a two-sided Student's t confidence interval for the mean.
///
/// Uses `n - 1` degrees of freedom and the standard error
/// `std_dev / sqrt(n)`.
///
/// # Arguments
/// * `sample` - Observations (full precision)
/// * `confidence_level` - Coverage probability, e.g. 0.95
///
/// # Errors
/// Returns `InsufficientSample` when `n < 2` and `InvalidConfidenceLevel`
/// when the level is not strictly between 0 and 1.
///
/// # Examples
/// ```
/// use abtest_core::stats::t_confidence_interval;
///
/// let ci = t_confidence_interval(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.95).unwrap();
/// assert!(ci.contains(3.0));
/// assert!(ci.lower > 1.0 && ci.upper < 5.0);
/// ```
pub fn t_confidence_interval(
    sample: &[f64],
    confidence_level: f64,
) -> Result<ConfidenceInterval, StatsError> {
    check_confidence_level(confidence_level)?;
    let n = sample.len();
    let std_dev = sample_std_dev(sample).ok_or(StatsError::InsufficientSample {
        required: MIN_SAMPLE_SIZE,
        actual: n,
    })?;
    let m = mean(sample).ok_or(StatsError::InsufficientSample {
        required: MIN_SAMPLE_SIZE,
        actual: n,
    })?;

    let std_error = std_dev / (n as f64).sqrt();
    let t_critical = students_t((n - 1) as f64)?.inverse_cdf(0.5 + confidence_level / 2.0);
    let margin = t_critical * std_error;

    Ok(ConfidenceInterval {
        mean: m,
        lower: m - margin,
        upper: m + margin,
        sample_size: n,
        confidence_level,
    })
}

/// Outcome of an independent two-sample t-test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TTestOutcome {
    /// t statistic for `mean(a) - mean(b)`
    pub statistic: f64,
    /// Degrees of freedom of the reference distribution
    pub degrees_of_freedom: f64,
    /// Two-tailed p-value
    pub p_value: f64,
}

/// Independent two-sample t-test of H0: mean(a) = mean(b).
///
/// When both samples have zero variance the statistic is 0 with p = 1 if
/// the means agree, and infinite with p = 0 otherwise.
///
/// # Errors
/// Returns `InsufficientSample` when either sample has fewer than two
/// observations.
pub fn two_sample_t_test(
    a: &[f64],
    b: &[f64],
    variance: VarianceAssumption,
) -> Result<TTestOutcome, StatsError> {
    for sample in [a, b] {
        if sample.len() < MIN_SAMPLE_SIZE {
            return Err(StatsError::InsufficientSample {
                required: MIN_SAMPLE_SIZE,
                actual: sample.len(),
            });
        }
    }

    let (n_a, n_b) = (a.len() as f64, b.len() as f64);
    let (mean_a, mean_b) = (mean(a).unwrap_or(0.0), mean(b).unwrap_or(0.0));
    let (var_a, var_b) = (
        sample_variance(a).unwrap_or(0.0),
        sample_variance(b).unwrap_or(0.0),
    );
    let diff = mean_a - mean_b;

    let (std_error, df) = match variance {
        VarianceAssumption::Pooled => {
            let df = n_a + n_b - 2.0;
            let pooled = ((n_a - 1.0) * var_a + (n_b - 1.0) * var_b) / df;
            ((pooled * (1.0 / n_a + 1.0 / n_b)).sqrt(), df)
        }
        VarianceAssumption::Welch => {
            let se_a = var_a / n_a;
            let se_b = var_b / n_b;
            let denominator = se_a.powi(2) / (n_a - 1.0) + se_b.powi(2) / (n_b - 1.0);
            let df = if denominator > 0.0 {
                (se_a + se_b).powi(2) / denominator
            } else {
                n_a + n_b - 2.0
            };
            ((se_a + se_b).sqrt(), df)
        }
    };

    if std_error <= 0.0 {
        let (statistic, p_value) = if diff == 0.0 {
            (0.0, 1.0)
        } else {
            (f64::INFINITY.copysign(diff), 0.0)
        };
        return Ok(TTestOutcome {
            statistic,
            degrees_of_freedom: df,
            p_value,
        });
    }

    let statistic = diff / std_error;
    let p_value = (2.0 * students_t(df)?.sf(statistic.abs())).clamp(0.0, 1.0);

    Ok(TTestOutcome {
        statistic,
        degrees_of_freedom: df,
        p_value,
    })
}

fn students_t(df: f64) -> Result<StudentsT, StatsError> {
    StudentsT::new(0.0, 1.0, df).map_err(|e| StatsError::Distribution(e.to_string()))
}

fn check_confidence_level(level: f64) -> Result<(), StatsError> {
    if level.is_finite() && level > 0.0 && level < 1.0 {
        Ok(())
    } else {
        Err(StatsError::InvalidConfidenceLevel(level))
    }
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

//! Per-window value computation for event metrics.

use crate::core::config::CoercionPolicy;
use crate::core::{Result, TelemetryError};
use crate::metrics::columns::ValueColumn;
use crate::metrics::sample::{Sample, SampleValue};
use crate::metrics::types::Trend;
use std::sync::Arc;

/// Sum and item count carried between windows for running trends
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningState {
    pub sum: f64,
    pub count: u64,
}

/// Resolved trend column: the column plus its locked index
#[derive(Debug, Clone, Copy)]
pub(crate) struct TrendTarget<'a> {
    pub column: &'a ValueColumn,
    pub index: usize,
}

/// Numeric contribution of one column value.
///
/// Durations count as milliseconds and timestamps as a single occurrence.
/// Text is read culture-invariant: an optional sign, integer digits with
/// optional `,` thousands groups, an optional `.` fraction and an optional
/// exponent, surrounded by optional whitespace. `inf` and `NaN` spellings
/// and results that overflow are rejected.
pub fn effective_value(value: &SampleValue) -> Option<f64> {
    match value {
        SampleValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        SampleValue::Int(v) => Some(*v as f64),
        SampleValue::UInt(v) => Some(*v as f64),
        SampleValue::Float(v) => Some(*v),
        SampleValue::Duration(d) => Some(
            d.num_microseconds()
                .map_or(d.num_milliseconds() as f64, |us| us as f64 / 1_000.0),
        ),
        SampleValue::DateTime(_) => Some(1.0),
        SampleValue::Text(s) => parse_invariant(s),
    }
}

fn parse_invariant(text: &str) -> Option<f64> {
    let text = text.trim();
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (mantissa, exponent) = match unsigned.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => (mantissa, Some(exponent)),
        None => (unsigned, None),
    };
    let (integer, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));

    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    let integer_ok = if integer.contains(',') {
        let mut groups = integer.split(',');
        let leading = groups.next().unwrap_or_default();
        (1..=3).contains(&leading.len())
            && all_digits(leading)
            && groups.all(|group| group.len() == 3 && all_digits(group))
    } else {
        all_digits(integer)
    };
    if !integer_ok || !all_digits(fraction) || (integer.is_empty() && fraction.is_empty()) {
        return None;
    }
    if let Some(exponent) = exponent {
        let digits = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
        if digits.is_empty() || !all_digits(digits) {
            return None;
        }
    }

    text.replace(',', "").parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Accumulates window values and coercion diagnostics across one series
pub(crate) struct TrendCalculator<'a> {
    target: Option<TrendTarget<'a>>,
    policy: CoercionPolicy,
    carried: RunningState,
    coercion_failures: usize,
}

impl<'a> TrendCalculator<'a> {
    pub(crate) fn new(target: Option<TrendTarget<'a>>, policy: CoercionPolicy) -> Self {
        Self {
            target,
            policy,
            carried: RunningState::default(),
            coercion_failures: 0,
        }
    }

    pub(crate) fn coercion_failures(&self) -> usize {
        self.coercion_failures
    }

    /// One output value for the samples of a window
    pub(crate) fn compute_window_value(&mut self, samples: &[Arc<Sample>]) -> Result<f64> {
        let Some(target) = self.target else {
            return Ok(samples.len() as f64);
        };

        let trend = target.column.default_trend();
        if !target.column.is_trendable() || trend == Trend::Count {
            let present = samples.iter().filter(|s| s.value(target.index).is_some()).count();
            return Ok(present as f64);
        }

        let mut state = if trend.is_running() {
            self.carried
        } else {
            RunningState::default()
        };

        for sample in samples {
            state.sum += self.sample_value(target, sample)?;
            state.count += 1;
        }

        if trend.is_running() {
            self.carried = state;
        }

        if trend.is_average() && state.count > 1 {
            Ok(state.sum / state.count as f64)
        } else {
            Ok(state.sum)
        }
    }

    fn sample_value(&mut self, target: TrendTarget<'_>, sample: &Sample) -> Result<f64> {
        let Some(value) = sample.value(target.index) else {
            return Ok(0.0);
        };

        match effective_value(value) {
            Some(number) => Ok(number),
            None => match self.policy {
                CoercionPolicy::SubstituteZero => {
                    self.coercion_failures += 1;
                    Ok(0.0)
                },
                CoercionPolicy::Fail => Err(TelemetryError::CoercionFailure {
                    column: target.column.name().to_owned(),
                    value: value.to_string(),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::columns::{ColumnOptions, ValueColumnSet};
    use crate::metrics::sample::SamplePayload;
    use crate::metrics::types::ValueType;
    use chrono::{Duration, Utc};
    use smallvec::smallvec;

    fn column(value_type: ValueType, trend: Trend) -> Arc<ValueColumn> {
        let set = ValueColumnSet::new("test~trend~column");
        let column = set.add("v", value_type, ColumnOptions::new().trend(trend)).unwrap();
        set.lock();
        column
    }

    fn samples(values: Vec<Option<SampleValue>>) -> Vec<Arc<Sample>> {
        values
            .into_iter()
            .enumerate()
            .map(|(i, v)| Arc::new(Sample::new(i as u64 + 1, Utc::now(), SamplePayload::Event(smallvec![v]))))
            .collect()
    }

    fn calculator(column: &ValueColumn) -> TrendCalculator<'_> {
        TrendCalculator::new(Some(TrendTarget { column, index: 0 }), CoercionPolicy::SubstituteZero)
    }

    #[test]
    fn test_effective_values() {
        assert_eq!(effective_value(&SampleValue::Duration(Duration::milliseconds(1500))), Some(1500.0));
        assert_eq!(effective_value(&SampleValue::Duration(Duration::microseconds(2500))), Some(2.5));
        assert_eq!(effective_value(&SampleValue::DateTime(Utc::now())), Some(1.0));
        assert_eq!(effective_value(&SampleValue::Text(" 4.25 ".into())), Some(4.25));
        assert_eq!(effective_value(&SampleValue::Text("4,25".into())), None);
        assert_eq!(effective_value(&SampleValue::Bool(true)), Some(1.0));
        assert_eq!(effective_value(&SampleValue::UInt(7)), Some(7.0));
    }

    #[test]
    fn test_text_values_are_culture_invariant() {
        let text = |s: &str| effective_value(&SampleValue::Text(s.into()));
        assert_eq!(text("1,000"), Some(1000.0));
        assert_eq!(text("-12,345.5"), Some(-12345.5));
        assert_eq!(text("+1,234,567"), Some(1234567.0));
        assert_eq!(text(".5"), Some(0.5));
        assert_eq!(text("2."), Some(2.0));
        assert_eq!(text("1.5e3"), Some(1500.0));

        for rejected in ["1,00", ",100", "1,0000", "1.000,5", "inf", "-infinity", "NaN", "", ".", "1e", "1e999", "0x10"] {
            assert_eq!(text(rejected), None, "{:?}", rejected);
        }
    }

    #[test]
    fn test_no_column_counts_samples() {
        let mut calc = TrendCalculator::new(None, CoercionPolicy::SubstituteZero);
        let window = samples(vec![None, None, Some(SampleValue::Int(1))]);
        assert_eq!(calc.compute_window_value(&window).unwrap(), 3.0);
        assert_eq!(calc.compute_window_value(&[]).unwrap(), 0.0);
    }

    #[test]
    fn test_count_trend_counts_present_values() {
        let col = column(ValueType::Int, Trend::Count);
        let mut calc = calculator(&col);
        let window = samples(vec![Some(SampleValue::Int(5)), None, Some(SampleValue::Int(1))]);
        assert_eq!(calc.compute_window_value(&window).unwrap(), 2.0);
    }

    #[test]
    fn test_untrendable_column_counts() {
        let col = column(ValueType::Text, Trend::Sum);
        assert!(!col.is_trendable());
        let mut calc = calculator(&col);
        let window = samples(vec![Some(SampleValue::Text("a".into())), None]);
        assert_eq!(calc.compute_window_value(&window).unwrap(), 1.0);
    }

    #[test]
    fn test_sum_and_average_reset_each_window() {
        let sum_col = column(ValueType::Float, Trend::Sum);
        let mut sum = calculator(&sum_col);
        let window = samples(vec![Some(SampleValue::Float(2.0)), Some(SampleValue::Float(4.0))]);
        assert_eq!(sum.compute_window_value(&window).unwrap(), 6.0);
        assert_eq!(sum.compute_window_value(&window).unwrap(), 6.0);
        assert_eq!(sum.compute_window_value(&[]).unwrap(), 0.0);

        let avg_col = column(ValueType::Float, Trend::Average);
        let mut avg = calculator(&avg_col);
        assert_eq!(avg.compute_window_value(&window).unwrap(), 3.0);
    }

    #[test]
    fn test_absent_values_count_as_zero_items() {
        let col = column(ValueType::Float, Trend::Average);
        let mut calc = calculator(&col);
        let window = samples(vec![Some(SampleValue::Float(6.0)), None]);
        assert_eq!(calc.compute_window_value(&window).unwrap(), 3.0);
    }

    #[test]
    fn test_running_trends_carry_over() {
        let col = column(ValueType::Int, Trend::RunningSum);
        let mut calc = calculator(&col);
        let window = samples(vec![Some(SampleValue::Int(1)), Some(SampleValue::Int(1))]);
        assert_eq!(calc.compute_window_value(&window).unwrap(), 2.0);
        assert_eq!(calc.compute_window_value(&[]).unwrap(), 2.0);
        assert_eq!(calc.compute_window_value(&window).unwrap(), 4.0);

        let col = column(ValueType::Int, Trend::RunningAverage);
        let mut calc = calculator(&col);
        let first = samples(vec![Some(SampleValue::Int(2)), Some(SampleValue::Int(4))]);
        let second = samples(vec![Some(SampleValue::Int(9))]);
        assert_eq!(calc.compute_window_value(&first).unwrap(), 3.0);
        assert_eq!(calc.compute_window_value(&second).unwrap(), 5.0);
    }

    #[test]
    fn test_single_item_average_is_the_sum() {
        let col = column(ValueType::Float, Trend::Average);
        let mut calc = calculator(&col);
        let window = samples(vec![Some(SampleValue::Float(8.0))]);
        assert_eq!(calc.compute_window_value(&window).unwrap(), 8.0);
    }

    #[test]
    fn test_coercion_substitutes_and_counts() {
        let col = column(ValueType::Float, Trend::Sum);
        let mut calc = calculator(&col);
        let window = samples(vec![
            Some(SampleValue::Text("3".into())),
            Some(SampleValue::Text("three".into())),
        ]);
        assert_eq!(calc.compute_window_value(&window).unwrap(), 3.0);
        assert_eq!(calc.coercion_failures(), 1);
    }

    #[test]
    fn test_coercion_fail_policy() {
        let col = column(ValueType::Float, Trend::Sum);
        let mut calc = TrendCalculator::new(Some(TrendTarget { column: &col, index: 0 }), CoercionPolicy::Fail);
        let window = samples(vec![Some(SampleValue::Text("n/a".into()))]);
        let err = calc.compute_window_value(&window).unwrap_err();
        assert!(matches!(err, TelemetryError::CoercionFailure { .. }));
        assert!(err.is_recoverable());
    }
}

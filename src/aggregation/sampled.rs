//! Window values for counter-sampled metrics.

use crate::metrics::sample::Sample;
use crate::metrics::types::SamplingType;
use std::sync::Arc;

/// Reading carried between windows of one series
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SampledState {
    /// Last reading seen before the current window
    pub last_raw: Option<f64>,
    pub last_base: Option<f64>,
    /// Last computed value; repeated by raw types for empty windows
    pub last_value: f64,
}

fn ratio(numerator: f64, denominator: Option<f64>) -> f64 {
    match denominator {
        Some(d) if d != 0.0 => numerator / d,
        _ => 0.0,
    }
}

fn raw_value(sampling_type: SamplingType, raw: f64, base: Option<f64>) -> f64 {
    if sampling_type.is_fraction() {
        ratio(raw, base)
    } else {
        raw
    }
}

impl SampledState {
    /// Feed a reading that falls before the window being computed
    pub fn observe_baseline(&mut self, sampling_type: SamplingType, sample: &Sample) {
        if let Some((raw, base)) = sample.raw() {
            self.last_raw = Some(raw);
            self.last_base = base;
            if matches!(sampling_type, SamplingType::RawCount | SamplingType::RawFraction) {
                self.last_value = raw_value(sampling_type, raw, base);
            }
        }
    }
}

/// One output value for the readings of a window.
///
/// Total types subtract the reading before the window; with no earlier
/// reading the first one in the window is the baseline.
pub fn compute_sampled_window(sampling_type: SamplingType, samples: &[Arc<Sample>], state: &mut SampledState) -> f64 {
    let readings: Vec<(f64, Option<f64>)> = samples.iter().filter_map(|s| s.raw()).collect();

    let Some(&(last_raw, last_base)) = readings.last() else {
        return match sampling_type {
            SamplingType::RawCount | SamplingType::RawFraction => state.last_value,
            _ => 0.0,
        };
    };

    let value = match sampling_type {
        SamplingType::RawCount | SamplingType::RawFraction => raw_value(sampling_type, last_raw, last_base),
        SamplingType::IncrementalCount => readings.iter().map(|(raw, _)| raw).sum(),
        SamplingType::IncrementalFraction => {
            let raw: f64 = readings.iter().map(|(raw, _)| raw).sum();
            let base: f64 = readings.iter().filter_map(|(_, base)| *base).sum();
            ratio(raw, Some(base))
        },
        SamplingType::TotalCount | SamplingType::TotalFraction => {
            let (first_raw, first_base) = match state.last_raw {
                Some(raw) => (raw, state.last_base),
                None => readings[0],
            };
            let delta_raw = last_raw - first_raw;
            if sampling_type.is_fraction() {
                let delta_base = match (last_base, first_base) {
                    (Some(last), Some(first)) => Some(last - first),
                    _ => None,
                };
                ratio(delta_raw, delta_base)
            } else {
                delta_raw
            }
        },
    };

    state.last_raw = Some(last_raw);
    state.last_base = last_base;
    state.last_value = value;
    value
}

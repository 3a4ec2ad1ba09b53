//! Discrete trading signals and the rules that derive them from indicator values.
//!
//! Every rule returns one signal per input index. An index whose inputs are
//! undefined repeats the previous signal (`Flat` before the first defined
//! value).

use chrono::NaiveDateTime;
use serde::Serialize;

/// Tolerance under which two series are considered equal.
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Signal {
    Long,
    Short,
    Flat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalPoint {
    pub timestamp: NaiveDateTime,
    pub signal: Signal,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignalSeries {
    pub points: Vec<SignalPoint>,
}

impl SignalSeries {
    pub fn new(timestamps: &[NaiveDateTime], signals: Vec<Signal>) -> Self {
        debug_assert_eq!(timestamps.len(), signals.len());
        let points = timestamps
            .iter()
            .zip(signals)
            .map(|(&timestamp, signal)| SignalPoint { timestamp, signal })
            .collect();
        SignalSeries { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.points.iter().map(|p| p.signal).collect()
    }

    /// Number of consecutive pairs going `from` → `to`.
    pub fn count_transitions(&self, from: Signal, to: Signal) -> usize {
        self.points
            .windows(2)
            .filter(|w| w[0].signal == from && w[1].signal == to)
            .count()
    }
}

fn sign(diff: f64) -> i8 {
    if diff > EPSILON {
        1
    } else if diff < -EPSILON {
        -1
    } else {
        0
    }
}

fn downside(allow_short: bool) -> Signal {
    if allow_short { Signal::Short } else { Signal::Flat }
}

/// Crossover of `fast` over `slow`.
///
/// A cross fires when the sign of `fast - slow` is non-zero and differs from
/// the last non-zero sign. Equality never fires; the first non-zero sign only
/// sets the reference.
pub fn crossover_signals(
    fast: &[Option<f64>],
    slow: &[Option<f64>],
    allow_short: bool,
) -> Vec<Signal> {
    let mut state = Signal::Flat;
    let mut last_sign: Option<i8> = None;

    fast.iter()
        .zip(slow)
        .map(|(f, s)| {
            if let (Some(f), Some(s)) = (f, s) {
                let current = sign(f - s);
                if current != 0 {
                    if last_sign.is_some_and(|prev| prev != current) {
                        state = if current > 0 {
                            Signal::Long
                        } else {
                            downside(allow_short)
                        };
                    }
                    last_sign = Some(current);
                }
            }
            state
        })
        .collect()
}

/// Band levels consumed by [`band_reversion_signals`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Mean reversion against a band.
///
/// Flat: close crossing below the lower band goes Long; with `allow_short`,
/// close crossing above the upper band goes Short. Long exits once the close
/// reaches the middle band, Short once it falls back to it.
pub fn band_reversion_signals(
    closes: &[Option<f64>],
    bands: &[Option<Bands>],
    allow_short: bool,
) -> Vec<Signal> {
    let mut state = Signal::Flat;
    let mut out = Vec::with_capacity(closes.len());

    for i in 0..closes.len() {
        let (Some(close), Some(band)) = (closes[i], bands[i]) else {
            out.push(state);
            continue;
        };
        let prev = if i > 0 {
            closes[i - 1].zip(bands[i - 1])
        } else {
            None
        };

        state = match state {
            Signal::Flat => match prev {
                Some((pc, pb)) if pc >= pb.lower && close < band.lower => Signal::Long,
                Some((pc, pb)) if allow_short && pc <= pb.upper && close > band.upper => {
                    Signal::Short
                }
                _ => Signal::Flat,
            },
            Signal::Long if close >= band.middle => Signal::Flat,
            Signal::Short if close <= band.middle => Signal::Flat,
            held => held,
        };
        out.push(state);
    }

    out
}

/// Oscillator threshold crossings.
///
/// Rising through `oversold` goes Long; falling through `overbought` goes
/// Flat (Short with `allow_short`).
pub fn threshold_signals(
    oscillator: &[Option<f64>],
    oversold: f64,
    overbought: f64,
    allow_short: bool,
) -> Vec<Signal> {
    let mut state = Signal::Flat;
    let mut out = Vec::with_capacity(oscillator.len());

    for i in 0..oscillator.len() {
        if i > 0 {
            if let (Some(prev), Some(curr)) = (oscillator[i - 1], oscillator[i]) {
                if prev <= oversold && curr > oversold {
                    state = Signal::Long;
                } else if prev >= overbought && curr < overbought {
                    state = downside(allow_short);
                }
            }
        }
        out.push(state);
    }

    out
}

/// Channel breakout: close above the upper level goes Long, below the lower
/// level goes Flat (Short with `allow_short`).
pub fn breakout_signals(
    closes: &[Option<f64>],
    channel: &[Option<(f64, f64)>],
    allow_short: bool,
) -> Vec<Signal> {
    let mut state = Signal::Flat;

    closes
        .iter()
        .zip(channel)
        .map(|(close, levels)| {
            if let (Some(close), Some((upper, lower))) = (close, levels) {
                if *close > *upper {
                    state = Signal::Long;
                } else if *close < *lower {
                    state = downside(allow_short);
                }
            }
            state
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn crossover_fires_on_sign_change() {
        let fast = some(&[1.0, 2.0, 4.0, 3.0, 1.0]);
        let slow = some(&[3.0, 3.0, 3.0, 3.0, 3.0]);
        let signals = crossover_signals(&fast, &slow, false);
        assert_eq!(
            signals,
            vec![
                Signal::Flat,
                Signal::Flat,
                Signal::Long,
                Signal::Long,
                Signal::Flat
            ]
        );
    }

    #[test]
    fn crossover_first_sign_does_not_fire() {
        let fast = some(&[5.0, 6.0, 7.0]);
        let slow = some(&[1.0, 1.0, 1.0]);
        let signals = crossover_signals(&fast, &slow, false);
        assert!(signals.iter().all(|s| *s == Signal::Flat));
    }

    #[test]
    fn crossover_equality_is_not_a_cross() {
        // below, touch, below again: no cross
        let fast = some(&[1.0, 3.0, 1.0]);
        let slow = some(&[3.0, 3.0, 3.0]);
        let signals = crossover_signals(&fast, &slow, false);
        assert!(signals.iter().all(|s| *s == Signal::Flat));
    }

    #[test]
    fn crossover_through_equality_fires_once() {
        // below, touch, above: one cross up on the bar that goes above
        let fast = some(&[1.0, 3.0, 5.0, 6.0]);
        let slow = some(&[3.0, 3.0, 3.0, 3.0]);
        let signals = crossover_signals(&fast, &slow, false);
        assert_eq!(signals[1], Signal::Flat);
        assert_eq!(signals[2], Signal::Long);
        assert_eq!(signals[3], Signal::Long);
    }

    #[test]
    fn crossover_within_tolerance_is_equal() {
        let fast = some(&[1.0, 3.0 + 1e-12, 1.0]);
        let slow = some(&[3.0, 3.0, 3.0]);
        let signals = crossover_signals(&fast, &slow, false);
        assert!(signals.iter().all(|s| *s == Signal::Flat));
    }

    #[test]
    fn crossover_short_when_allowed() {
        let fast = some(&[1.0, 4.0, 1.0]);
        let slow = some(&[3.0, 3.0, 3.0]);
        let signals = crossover_signals(&fast, &slow, true);
        assert_eq!(signals, vec![Signal::Flat, Signal::Long, Signal::Short]);
    }

    #[test]
    fn crossover_undefined_holds_state() {
        let fast = vec![Some(1.0), Some(4.0), None, Some(5.0)];
        let slow = vec![Some(3.0), Some(3.0), Some(3.0), None];
        let signals = crossover_signals(&fast, &slow, false);
        assert_eq!(
            signals,
            vec![Signal::Flat, Signal::Long, Signal::Long, Signal::Long]
        );
    }

    fn flat_band(level: f64) -> Option<Bands> {
        Some(Bands {
            upper: level + 2.0,
            middle: level,
            lower: level - 2.0,
        })
    }

    #[test]
    fn band_reversion_long_then_exit_at_middle() {
        let closes = some(&[100.0, 97.0, 99.0, 100.5, 100.0]);
        let bands = vec![flat_band(100.0); 5];
        let signals = band_reversion_signals(&closes, &bands, false);
        assert_eq!(
            signals,
            vec![
                Signal::Flat,
                Signal::Long,
                Signal::Long,
                Signal::Flat,
                Signal::Flat
            ]
        );
    }

    #[test]
    fn band_reversion_needs_a_cross() {
        // already below the band on the first defined bar
        let closes = some(&[95.0, 95.0, 95.0]);
        let bands = vec![flat_band(100.0); 3];
        let signals = band_reversion_signals(&closes, &bands, false);
        assert!(signals.iter().all(|s| *s == Signal::Flat));
    }

    #[test]
    fn band_reversion_short_side() {
        let closes = some(&[100.0, 103.0, 101.0, 99.5]);
        let bands = vec![flat_band(100.0); 4];
        assert!(
            band_reversion_signals(&closes, &bands, false)
                .iter()
                .all(|s| *s == Signal::Flat)
        );
        let signals = band_reversion_signals(&closes, &bands, true);
        assert_eq!(
            signals,
            vec![Signal::Flat, Signal::Short, Signal::Short, Signal::Flat]
        );
    }

    #[test]
    fn threshold_crossings() {
        let k = vec![None, Some(15.0), Some(25.0), Some(85.0), Some(75.0)];
        let signals = threshold_signals(&k, 20.0, 80.0, false);
        assert_eq!(
            signals,
            vec![
                Signal::Flat,
                Signal::Flat,
                Signal::Long,
                Signal::Long,
                Signal::Flat
            ]
        );
        let signals = threshold_signals(&k, 20.0, 80.0, true);
        assert_eq!(signals[4], Signal::Short);
    }

    #[test]
    fn threshold_touching_level_does_not_fire() {
        let k = some(&[10.0, 20.0, 15.0]);
        let signals = threshold_signals(&k, 20.0, 80.0, false);
        assert!(signals.iter().all(|s| *s == Signal::Flat));
    }

    #[test]
    fn breakout_levels() {
        let closes = some(&[100.0, 111.0, 105.0, 89.0]);
        let channel = vec![None, Some((110.0, 90.0)), Some((111.0, 90.0)), Some((111.0, 90.0))];
        let signals = breakout_signals(&closes, &channel, false);
        assert_eq!(
            signals,
            vec![Signal::Flat, Signal::Long, Signal::Long, Signal::Flat]
        );
    }

    #[test]
    fn series_transition_counts() {
        let ts = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let timestamps: Vec<NaiveDateTime> = (0..4)
            .map(|i| ts + chrono::Duration::days(i))
            .collect();
        let series = SignalSeries::new(
            &timestamps,
            vec![Signal::Flat, Signal::Long, Signal::Flat, Signal::Long],
        );
        assert_eq!(series.count_transitions(Signal::Flat, Signal::Long), 2);
        assert_eq!(series.count_transitions(Signal::Long, Signal::Flat), 1);
    }
}

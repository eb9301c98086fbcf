//! Technical indicator providers
//!
//! Each provider wraps a price provider and emits an indicator table
//! (value columns plus a signal column where the indicator has one).
//! Warm-up rows are dropped, so downstream joins only ever see fully
//! defined indicator rows.

use crate::data::frame::TimeFrame;
use crate::error::{GraphError, Result};
use crate::provider::{DataCache, Provider, ProviderHandle};

/// Rolling mean with NaN warm-up.
fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    if values.len() < period {
        return vec![f64::NAN; values.len()];
    }
    let mut result = vec![f64::NAN; period - 1];
    for i in (period - 1)..values.len() {
        let sum: f64 = values[(i + 1 - period)..=i].iter().sum();
        result.push(sum / period as f64);
    }
    result
}

/// Rolling population standard deviation with NaN warm-up.
fn rolling_std(values: &[f64], period: usize) -> Vec<f64> {
    if values.len() < period {
        return vec![f64::NAN; values.len()];
    }
    let mut result = vec![f64::NAN; period - 1];
    for i in (period - 1)..values.len() {
        let window = &values[(i + 1 - period)..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
        result.push(variance.sqrt());
    }
    result
}

/// Exponential moving average with NaN warm-up; the first value is the
/// simple mean of the first `period` samples.
fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if values.len() < period {
        return vec![f64::NAN; values.len()];
    }
    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut result = vec![f64::NAN; values.len()];
    result[period - 1] = values[..period].iter().sum::<f64>() / period as f64;
    for i in period..values.len() {
        result[i] = (values[i] - result[i - 1]) * multiplier + result[i - 1];
    }
    result
}

fn check_period(period: usize) -> Result<()> {
    if period == 0 {
        return Err(GraphError::InvalidArgument(
            "indicator period must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Simple moving average with a trend signal
///
/// `sma_signal` is `1.0` while the average sits at or below the price
/// (up trend) and `-1.0` while it sits above (down trend).
pub struct SmaProvider {
    prices: ProviderHandle,
    column: String,
    period: usize,
    cache: DataCache,
}

impl SmaProvider {
    pub fn new(prices: ProviderHandle, period: usize) -> Self {
        Self {
            prices,
            column: "close".to_string(),
            period,
            cache: DataCache::new(),
        }
    }

    /// Use a different source column (e.g. `adj_close`).
    pub fn with_column(mut self, column: &str) -> Self {
        self.column = column.to_string();
        self
    }
}

impl Provider for SmaProvider {
    fn fetch(&self) -> Result<TimeFrame> {
        check_period(self.period)?;
        let frame = self.prices.get_data(None, None)?;
        let prices = frame.column(&self.column)?;
        let closes = prices.values().to_vec();

        let sma = rolling_mean(&closes, self.period);
        let signal = sma
            .iter()
            .zip(closes.iter())
            .map(|(&average, &price)| {
                if average.is_nan() || price.is_nan() {
                    f64::NAN
                } else if average <= price {
                    1.0
                } else {
                    -1.0
                }
            })
            .collect();

        Ok(TimeFrame::from_columns(
            frame.index().to_vec(),
            vec![("sma".to_string(), sma), ("sma_signal".to_string(), signal)],
        )?
        .drop_undefined())
    }

    fn cache(&self) -> &DataCache {
        &self.cache
    }
}

/// Relative strength index with overbought/oversold signal
pub struct RsiProvider {
    prices: ProviderHandle,
    column: String,
    period: usize,
    upper_threshold: f64,
    lower_threshold: f64,
    cache: DataCache,
}

impl RsiProvider {
    pub fn new(prices: ProviderHandle, period: usize) -> Self {
        Self {
            prices,
            column: "close".to_string(),
            period,
            upper_threshold: 70.0,
            lower_threshold: 30.0,
            cache: DataCache::new(),
        }
    }

    pub fn with_column(mut self, column: &str) -> Self {
        self.column = column.to_string();
        self
    }

    pub fn with_thresholds(mut self, lower: f64, upper: f64) -> Self {
        self.lower_threshold = lower;
        self.upper_threshold = upper;
        self
    }
}

fn rsi_values(closes: &[f64], period: usize) -> Vec<f64> {
    if closes.len() < period + 1 {
        return vec![f64::NAN; closes.len()];
    }

    let mut gains = vec![0.0; closes.len()];
    let mut losses = vec![0.0; closes.len()];
    for i in 1..closes.len() {
        let change = closes[i] - closes[i - 1];
        if change > 0.0 {
            gains[i] = change;
        } else {
            losses[i] = -change;
        }
    }

    let mut result = vec![f64::NAN; closes.len()];
    let mut avg_gain: f64 = gains[1..=period].iter().sum::<f64>() / period as f64;
    let mut avg_loss: f64 = losses[1..=period].iter().sum::<f64>() / period as f64;

    let rsi_at = |gain: f64, loss: f64| {
        if loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + gain / loss)
        }
    };

    result[period] = rsi_at(avg_gain, avg_loss);
    for i in (period + 1)..closes.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        result[i] = rsi_at(avg_gain, avg_loss);
    }

    result
}

impl Provider for RsiProvider {
    fn fetch(&self) -> Result<TimeFrame> {
        check_period(self.period)?;
        let frame = self.prices.get_data(None, None)?;
        let closes = frame.column(&self.column)?.values().to_vec();

        let rsi = rsi_values(&closes, self.period);
        let signal = rsi
            .iter()
            .map(|&value| {
                if value.is_nan() {
                    f64::NAN
                } else if value >= self.upper_threshold {
                    1.0
                } else if value <= self.lower_threshold {
                    -1.0
                } else {
                    0.0
                }
            })
            .collect();

        Ok(TimeFrame::from_columns(
            frame.index().to_vec(),
            vec![("rsi".to_string(), rsi), ("rsi_signal".to_string(), signal)],
        )?
        .drop_undefined())
    }

    fn cache(&self) -> &DataCache {
        &self.cache
    }
}

/// Moving average convergence/divergence
pub struct MacdProvider {
    prices: ProviderHandle,
    column: String,
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
    cache: DataCache,
}

impl MacdProvider {
    pub fn new(prices: ProviderHandle) -> Self {
        Self {
            prices,
            column: "close".to_string(),
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
            cache: DataCache::new(),
        }
    }

    pub fn with_column(mut self, column: &str) -> Self {
        self.column = column.to_string();
        self
    }

    pub fn with_periods(mut self, fast: usize, slow: usize, signal: usize) -> Self {
        self.fast_period = fast;
        self.slow_period = slow;
        self.signal_period = signal;
        self
    }
}

impl Provider for MacdProvider {
    fn fetch(&self) -> Result<TimeFrame> {
        check_period(self.fast_period)?;
        check_period(self.slow_period)?;
        check_period(self.signal_period)?;

        let frame = self.prices.get_data(None, None)?;
        let closes = frame.column(&self.column)?.values().to_vec();

        let ema_fast = ema(&closes, self.fast_period);
        let ema_slow = ema(&closes, self.slow_period);
        let macd: Vec<f64> = ema_fast
            .iter()
            .zip(ema_slow.iter())
            .map(|(&fast, &slow)| {
                if fast.is_nan() || slow.is_nan() {
                    f64::NAN
                } else {
                    fast - slow
                }
            })
            .collect();

        // Signal line is an EMA over the defined region of the MACD line.
        let first_defined = macd.iter().position(|v| !v.is_nan()).unwrap_or(macd.len());
        let mut signal = vec![f64::NAN; macd.len()];
        let defined_ema = ema(&macd[first_defined..], self.signal_period);
        for (i, value) in defined_ema.into_iter().enumerate() {
            signal[first_defined + i] = value;
        }

        let diff: Vec<f64> = macd
            .iter()
            .zip(signal.iter())
            .map(|(&line, &sig)| {
                if line.is_nan() || sig.is_nan() {
                    f64::NAN
                } else {
                    line - sig
                }
            })
            .collect();

        Ok(TimeFrame::from_columns(
            frame.index().to_vec(),
            vec![
                ("macd".to_string(), macd),
                ("macd_sig".to_string(), signal),
                ("macd_diff".to_string(), diff),
            ],
        )?
        .drop_undefined())
    }

    fn cache(&self) -> &DataCache {
        &self.cache
    }
}

/// Bollinger bands
pub struct BollingerProvider {
    prices: ProviderHandle,
    column: String,
    period: usize,
    n_dev: f64,
    cache: DataCache,
}

impl BollingerProvider {
    pub fn new(prices: ProviderHandle, period: usize) -> Self {
        Self {
            prices,
            column: "close".to_string(),
            period,
            n_dev: 2.0,
            cache: DataCache::new(),
        }
    }

    pub fn with_column(mut self, column: &str) -> Self {
        self.column = column.to_string();
        self
    }

    pub fn with_deviations(mut self, n_dev: f64) -> Self {
        self.n_dev = n_dev;
        self
    }
}

impl Provider for BollingerProvider {
    fn fetch(&self) -> Result<TimeFrame> {
        check_period(self.period)?;
        let frame = self.prices.get_data(None, None)?;
        let closes = frame.column(&self.column)?.values().to_vec();

        let mavg = rolling_mean(&closes, self.period);
        let std = rolling_std(&closes, self.period);

        let n = closes.len();
        let mut hband = vec![f64::NAN; n];
        let mut lband = vec![f64::NAN; n];
        let mut pband = vec![f64::NAN; n];
        let mut wband = vec![f64::NAN; n];
        for i in 0..n {
            if mavg[i].is_nan() || std[i].is_nan() {
                continue;
            }
            hband[i] = mavg[i] + self.n_dev * std[i];
            lband[i] = mavg[i] - self.n_dev * std[i];
            let width = hband[i] - lband[i];
            pband[i] = if width == 0.0 {
                f64::NAN
            } else {
                (closes[i] - lband[i]) / width
            };
            wband[i] = if mavg[i] == 0.0 {
                f64::NAN
            } else {
                width / mavg[i]
            };
        }

        Ok(TimeFrame::from_columns(
            frame.index().to_vec(),
            vec![
                ("bollinger_hband".to_string(), hband),
                ("bollinger_lband".to_string(), lband),
                ("bollinger_mavg".to_string(), mavg),
                ("bollinger_pband".to_string(), pband),
                ("bollinger_wband".to_string(), wband),
            ],
        )?
        .drop_undefined())
    }

    fn cache(&self) -> &DataCache {
        &self.cache
    }
}

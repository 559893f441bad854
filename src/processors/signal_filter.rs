//! Moving-average smoothing and threshold peak detection.
//!
//! Both operations are pure: they borrow the input signal and return new
//! values, leaving the input untouched.

use crate::config::SignalParams;

/// Indices of detected peaks, ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeakSet {
    indices: Vec<usize>,
}

impl PeakSet {
    /// Build a peak set from indices in any order.
    pub fn from_indices(mut indices: Vec<usize>) -> Self {
        indices.sort_unstable();
        indices.dedup();
        Self { indices }
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.indices.binary_search(&index).is_ok()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

/// Half-width of a centred window. Zero and negative sizes collapse to the
/// centre sample.
#[inline]
fn half_width(window_size: i32) -> usize {
    (window_size / 2).max(0) as usize
}

/// Centred moving average with shrinking windows at the boundaries.
///
/// For index `i` the window covers `[i - w/2, i + w/2]` clamped to the valid
/// index range, so samples near either end are averaged over fewer points
/// rather than padded.
///
/// # Arguments
///
/// * `signal` - Input samples
/// * `window_size` - Window size `w`; values below 2 reproduce the input
///
/// # Returns
///
/// A new vector with the same length as `signal`.
pub fn moving_average(signal: &[f64], window_size: i32) -> Vec<f64> {
    let n = signal.len();
    let half = half_width(window_size);
    let mut result = Vec::with_capacity(n);

    for i in 0..n {
        let start = i.saturating_sub(half);
        let end = (i + half).min(n - 1);
        let window = &signal[start..=end];
        result.push(window.iter().sum::<f64>() / window.len() as f64);
    }

    result
}

/// Find strict local maxima above a threshold.
///
/// Index `i` is a peak when `1 <= i <= n - 2`, `signal[i]` is strictly greater
/// than both neighbours, and strictly greater than `threshold`. Signals shorter
/// than three samples have no peaks.
pub fn find_peaks(signal: &[f64], threshold: f64) -> PeakSet {
    let indices = signal
        .windows(3)
        .enumerate()
        .filter(|(_, w)| w[1] > w[0] && w[1] > w[2] && w[1] > threshold)
        .map(|(i, _)| i + 1)
        .collect();

    PeakSet { indices }
}

/// Result of filtering one signal.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterResult {
    pub filtered: Vec<f64>,
    pub peaks: PeakSet,
}

/// Moving average followed by peak detection on the smoothed signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalFilter {
    pub window_size: i32,
    pub threshold: f64,
}

impl SignalFilter {
    pub fn new(window_size: i32, threshold: f64) -> Self {
        Self {
            window_size,
            threshold,
        }
    }

    pub fn apply(&self, signal: &[f64]) -> FilterResult {
        let filtered = moving_average(signal, self.window_size);
        let peaks = find_peaks(&filtered, self.threshold);
        FilterResult { filtered, peaks }
    }
}

impl From<&SignalParams> for SignalFilter {
    fn from(params: &SignalParams) -> Self {
        Self::new(params.window_size, params.threshold)
    }
}

//! Signal-quality metrics attached to inbound packets and their display format.

/// Per-packet link measurements reported by the radio. Either reading is absent when
/// the transport could not measure it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SignalMetrics {
    pub rssi: Option<f64>,
    pub snr: Option<f64>,
}

impl SignalMetrics {
    pub fn new(rssi: Option<f64>, snr: Option<f64>) -> Self {
        Self { rssi, snr }
    }

    pub fn rssi_msg(&self) -> String {
        format_metric(MetricKind::Rssi, self.rssi)
    }

    pub fn snr_msg(&self) -> String {
        format_metric(MetricKind::Snr, self.snr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Received signal strength, dBm
    Rssi,
    /// Signal-to-noise ratio, dB
    Snr,
}

impl MetricKind {
    pub fn unit(self) -> &'static str {
        match self {
            MetricKind::Rssi => "dBm",
            MetricKind::Snr => "dB",
        }
    }
}

/// Render a reading rounded to two decimals, e.g. `12.35 dBm` or `-9.0 dB`.
/// Absent and non-finite readings render as `--.-- <unit>`.
pub fn format_metric(kind: MetricKind, value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => format!("{} {}", display_rounded(v), kind.unit()),
        None => format!("--.-- {}", kind.unit()),
    }
}

/// Round half-to-even on the exact binary value, then print the shortest
/// representation with at least one fractional digit (`5.0`, `12.35`).
fn display_rounded(value: f64) -> String {
    // `{:.2}` performs exact decimal rounding, ties to even
    let rounded: f64 = format!("{:.2}", value).parse().unwrap_or(value);
    if rounded.fract() == 0.0 {
        format!("{:.1}", rounded)
    } else {
        format!("{}", rounded)
    }
}

//! Per-process traffic counters, logged at shutdown and by `status`.
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct BeaconMetrics {
    packets_received: AtomicU64,
    text_messages: AtomicU64,
    replies_sent: AtomicU64,
    send_failures: AtomicU64,
    malformed_packets: AtomicU64,
    ignored_packets: AtomicU64,
}

impl BeaconMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_packets_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_text_messages(&self) {
        self.text_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_replies_sent(&self) {
        self.replies_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_send_failures(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_malformed_packets(&self) {
        self.malformed_packets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ignored_packets(&self) {
        self.ignored_packets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            text_messages: self.text_messages.load(Ordering::Relaxed),
            replies_sent: self.replies_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            malformed_packets: self.malformed_packets.load(Ordering::Relaxed),
            ignored_packets: self.ignored_packets.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Snapshot {
    pub packets_received: u64,
    pub text_messages: u64,
    pub replies_sent: u64,
    pub send_failures: u64,
    pub malformed_packets: u64,
    pub ignored_packets: u64,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "packets={} text={} replies={} send_failures={} malformed={} ignored={}",
            self.packets_received,
            self.text_messages,
            self.replies_sent,
            self.send_failures,
            self.malformed_packets,
            self.ignored_packets
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently() {
        let metrics = BeaconMetrics::new();
        metrics.inc_packets_received();
        metrics.inc_packets_received();
        metrics.inc_text_messages();
        metrics.inc_replies_sent();
        metrics.inc_ignored_packets();

        let snap = metrics.snapshot();
        assert_eq!(snap.packets_received, 2);
        assert_eq!(snap.text_messages, 1);
        assert_eq!(snap.replies_sent, 1);
        assert_eq!(snap.send_failures, 0);
        assert_eq!(snap.malformed_packets, 0);
        assert_eq!(snap.ignored_packets, 1);
    }

    #[test]
    fn snapshot_display_is_one_line() {
        let snap = Snapshot {
            packets_received: 3,
            replies_sent: 1,
            ..Default::default()
        };
        assert_eq!(
            snap.to_string(),
            "packets=3 text=0 replies=1 send_failures=0 malformed=0 ignored=0"
        );
    }
}

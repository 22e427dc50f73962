//! Out-of-band progress reporting.

use std::sync::Arc;

use tokio::sync::Notify;

/// Handle that asks a running engine to log a progress report.
///
/// Firing is cheap and never blocks; repeated firings before the report is
/// written collapse into one report.
#[derive(Debug, Clone, Default)]
pub struct ProgressTrigger {
    notify: Arc<Notify>,
}

impl ProgressTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        self.notify.notify_one();
    }

    pub(crate) async fn fired(&self) {
        self.notify.notified().await;
    }
}

/// Format a byte count with binary units.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{:.2} {}", value, unit)
}

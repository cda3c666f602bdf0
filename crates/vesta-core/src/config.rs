// ── Runtime connection configuration ──
//
// These types describe *how* to reach a panel and how to poll it. They
// carry credentials but never touch disk: the host (CLI, config crate)
// constructs a `PanelConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;

use crate::retry::RetryPolicy;

/// Polling, retry and convergence tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// Normal interval between ticks.
    pub poll_interval: Duration,
    /// Interval used after a tick where every source failed.
    pub degraded_interval: Duration,
    /// Consecutive full failures before the panel is reported offline.
    pub offline_after: u32,
    /// Hard bound on the fetch phase of one tick.
    pub tick_deadline: Duration,
    /// Per-source retry policy within a tick.
    pub retry: RetryPolicy,
    /// Rolling window size per event scope.
    pub event_capacity: usize,
    /// `max_count` sent to the event log endpoint.
    pub event_fetch_count: u32,
    /// Ticks a command may take to show up in the polled status.
    pub convergence_ticks: u32,
    /// Panel area addressed by arm commands.
    pub area: u8,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            degraded_interval: Duration::from_secs(30),
            offline_after: 3,
            tick_deadline: Duration::from_secs(4),
            retry: RetryPolicy::default(),
            event_capacity: 50,
            event_fetch_count: 50,
            convergence_ticks: 3,
            area: 1,
        }
    }
}

impl PollSettings {
    /// Wall-clock bound on waiting for command convergence.
    pub fn convergence_deadline(&self) -> Duration {
        self.poll_interval * self.convergence_ticks + self.tick_deadline
    }

    /// Longest per-request timeout that lets every retry attempt and its
    /// backoff finish inside `tick_deadline`. Zero when the backoff alone
    /// overruns the deadline.
    pub fn request_timeout_budget(&self) -> Duration {
        let attempts = self.retry.max_attempts.max(1);
        let backoff: Duration = (1..attempts).map(|n| self.retry.delay_after(n)).sum();
        self.tick_deadline.saturating_sub(backoff) / attempts
    }
}

/// Configuration for one panel.
///
/// Built by the host, passed to `Coordinator::from_config`.
#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// Host name or IP, optionally with `:port`.
    pub host: String,
    pub use_https: bool,
    pub username: String,
    pub password: SecretString,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Accept self-signed certificates over HTTPS.
    pub accept_invalid_certs: bool,
    pub poll: PollSettings,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.1".into(),
            use_https: false,
            username: "admin".into(),
            password: SecretString::from(String::new()),
            timeout: PollSettings::default().request_timeout_budget(),
            accept_invalid_certs: true,
            poll: PollSettings::default(),
        }
    }
}

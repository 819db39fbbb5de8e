//! Session client configuration.

use std::time::Duration;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

/// Default backend WebSocket base URL.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8000";

/// Interval between liveness pings while the session is open.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(25);

/// Seconds on the clock for each question.
pub const DEFAULT_ROUND_SECONDS: u32 = 30;

/// How long an item notification stays visible.
pub const DEFAULT_NOTIFICATION_WINDOW: Duration = Duration::from_secs(5);

const DEFAULT_EVENT_CAPACITY: usize = 256;
const DEFAULT_CHAT_HISTORY: usize = 100;
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for a [`SessionChannel`](crate::client::SessionChannel).
///
/// ```
/// use std::time::Duration;
/// use quizzler_client::SessionConfig;
///
/// let config = SessionConfig::new("wss://quiz.example.com")
///     .with_round_seconds(20)
///     .with_ping_interval(Duration::from_secs(10));
/// assert_eq!(config.round_seconds, 20);
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base WebSocket URL of the backend, without the session path.
    pub server_url: String,
    /// Interval between liveness pings.
    pub ping_interval: Duration,
    /// Round countdown length in seconds.
    pub round_seconds: u32,
    /// Display window for item notifications.
    pub notification_window: Duration,
    /// Capacity of the outward event channel. Values below 1 are clamped to 1.
    pub event_capacity: usize,
    /// Number of chat lines kept in the store.
    pub chat_history: usize,
    /// How long `disconnect` waits for the session task before aborting it.
    pub shutdown_timeout: Duration,
}

impl SessionConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ping_interval: DEFAULT_PING_INTERVAL,
            round_seconds: DEFAULT_ROUND_SECONDS,
            notification_window: DEFAULT_NOTIFICATION_WINDOW,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            chat_history: DEFAULT_CHAT_HISTORY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    #[must_use]
    pub fn with_round_seconds(mut self, seconds: u32) -> Self {
        self.round_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_notification_window(mut self, window: Duration) -> Self {
        self.notification_window = window;
        self
    }

    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_chat_history(mut self, lines: usize) -> Self {
        self.chat_history = lines;
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Socket address for one session and player.
    pub fn endpoint(&self, session_code: &str, player_name: &str) -> Endpoint {
        let base = self.server_url.trim_end_matches('/');
        let code = utf8_percent_encode(session_code, NON_ALPHANUMERIC);
        let name = utf8_percent_encode(player_name, NON_ALPHANUMERIC);
        Endpoint {
            url: format!("{base}/ws/session/{code}/?username={name}"),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_URL)
    }
}

/// Fully-resolved session socket URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
}

impl Endpoint {
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

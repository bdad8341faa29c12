use std::fmt;

use boop_protocol::ConnectionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorColor {
    Red,
    Yellow,
    Green,
}

impl IndicatorColor {
    fn ansi(self) -> &'static str {
        match self {
            IndicatorColor::Red => "\x1b[31m",
            IndicatorColor::Yellow => "\x1b[33m",
            IndicatorColor::Green => "\x1b[32m",
        }
    }
}

/// Connection status light, mirroring the last status the backend sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusIndicator {
    status: ConnectionStatus,
}

impl Default for StatusIndicator {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
        }
    }
}

impl StatusIndicator {
    /// Records `status`. Returns `true` if it differs from the previous one.
    pub fn update(&mut self, status: ConnectionStatus) -> bool {
        std::mem::replace(&mut self.status, status) != status
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn color(&self) -> IndicatorColor {
        match self.status {
            ConnectionStatus::Disconnected => IndicatorColor::Red,
            ConnectionStatus::Connecting => IndicatorColor::Yellow,
            ConnectionStatus::Connected => IndicatorColor::Green,
        }
    }

    pub fn label(&self) -> &'static str {
        match self.status {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
        }
    }
}

impl fmt::Display for StatusIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\u{25cf}\x1b[0m {}", self.color().ansi(), self.label())
    }
}

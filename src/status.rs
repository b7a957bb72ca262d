/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// No transport; either never connected or disconnected after a failure.
    Disconnected,
    /// Transport up, connect round-trip completed.
    Connected,
    /// A reconnect strategy is actively retrying.
    Reconnecting,
    /// Terminal. No further operations will succeed.
    Closed,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Closed)
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Disconnected
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Disconnected => "disconnected",
            Status::Connected => "connected",
            Status::Reconnecting => "reconnecting",
            Status::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// How much the server logs about its own traffic.
///
/// The levels are cumulative, each one includes everything below it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Startup, shutdown and errors only.
    Minimal,
    /// Connection lifecycle events.
    Connections,
    /// One line per call with outcome and duration.
    #[default]
    Rpc,
    /// Full request and response payloads.
    Payload,
}

impl Verbosity {
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Self::Minimal,
            1 => Self::Connections,
            2 => Self::Rpc,
            _ => Self::Payload,
        }
    }
}

use std::error::Error;
use std::fmt;

/// Fatal configuration errors.
///
/// There is no retry path anywhere: the binary reports these to standard
/// error and exits non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The team size is below 2 or above [`crate::constants::MAX_TEAM_SIZE`].
    UnsupportedTeamSize { members: usize },
    /// A source or placement thread index is not inside the team.
    SourceOutOfRange { source: usize, members: usize },
    /// The caller-provided sink slice cannot hold one entry per configuration.
    SinkTooSmall { needed: usize, got: usize },
    /// A measurement buffer does not sit on a cache-line boundary.
    MisalignedBuffer,
    /// A measurement buffer could not be allocated.
    AllocationFailed { what: &'static str },
    /// The experiment selector on the command line was not recognized.
    UnknownSelector(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnsupportedTeamSize { members } => {
                write!(f, "unsupported team size {members}, need 2..={}", crate::constants::MAX_TEAM_SIZE)
            }
            ConfigError::SourceOutOfRange { source, members } => {
                write!(f, "thread index {source} is outside the team of {members}")
            }
            ConfigError::SinkTooSmall { needed, got } => {
                write!(f, "statistics sink holds {got} entries, {needed} required")
            }
            ConfigError::MisalignedBuffer => {
                write!(f, "measurement buffer is not aligned as required")
            }
            ConfigError::AllocationFailed { what } => {
                write!(f, "cannot allocate {what}")
            }
            ConfigError::UnknownSelector(selector) => {
                write!(f, "unknown experiment selector {selector:?}")
            }
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::ConfigError;

    #[test]
    fn test_display_messages() {
        let message = ConfigError::UnsupportedTeamSize { members: 1 }.to_string();
        assert!(message.contains("team size 1"));

        let message = ConfigError::SinkTooSmall { needed: 8, got: 4 }.to_string();
        assert!(message.contains('8'));
        assert!(message.contains('4'));
    }
}

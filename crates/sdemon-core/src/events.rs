//! Event definitions shared between the process, build and app layers

use crate::compilation::BuildStats;
use crate::types::Generation;

/// Control-plane events from the managed server process.
///
/// Log output does not travel through these events; it is streamed straight
/// through the log pipeline. Only what the supervisor must react to ends up
/// here.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildEvent {
    /// The child sent a message ("ready to be replaced"). Payload is not
    /// inspected.
    Message { generation: Generation },

    /// The child process has exited and been reaped by the OS
    Exited {
        generation: Generation,
        code: Option<i32>,
    },
}

impl ChildEvent {
    pub fn generation(&self) -> Generation {
        match self {
            ChildEvent::Message { generation } | ChildEvent::Exited { generation, .. } => {
                *generation
            }
        }
    }
}

/// Notifications from a build engine running in watch mode
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    /// A (re)build has started
    WatchRunStarted,

    /// A build has finished
    Done(BuildStats),
}

/// Which child stream a chunk of log output came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_event_generation() {
        assert_eq!(ChildEvent::Message { generation: 3 }.generation(), 3);
        assert_eq!(
            ChildEvent::Exited {
                generation: 7,
                code: Some(1)
            }
            .generation(),
            7
        );
    }

    #[test]
    fn test_stream_kind_display() {
        assert_eq!(StreamKind::Stdout.to_string(), "stdout");
        assert_eq!(StreamKind::Stderr.to_string(), "stderr");
    }
}

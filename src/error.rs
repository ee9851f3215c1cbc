pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("executor error: {0}")]
    Executor(String),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }
}

/// Reason a submission was refused. Nothing is mutated when this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejected {
    #[error("queue is draining")]
    Draining,

    #[error("queue full: {pending} pending + {requested} requested must stay below {max}")]
    Full {
        pending: usize,
        requested: usize,
        max: usize,
    },

    /// A respawn during `drain_and_wait` failed; drain again to recover.
    #[error("queue lost workers in a failed respawn")]
    WorkersLost,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_display() {
        let full = Rejected::Full {
            pending: 1,
            requested: 2,
            max: 3,
        };
        assert_eq!(
            full.to_string(),
            "queue full: 1 pending + 2 requested must stay below 3"
        );
        assert_eq!(Rejected::Draining.to_string(), "queue is draining");
        assert_eq!(
            Rejected::WorkersLost.to_string(),
            "queue lost workers in a failed respawn"
        );
    }

    #[test]
    fn test_error_constructors() {
        assert!(matches!(Error::config("x"), Error::Config(m) if m == "x"));
        assert!(matches!(Error::executor("y"), Error::Executor(m) if m == "y"));
    }
}

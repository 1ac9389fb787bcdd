use core::time::Duration;

/// Aggregate outcome of a failed [`ActorGroup::run`](super::ActorGroup::run).
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The actor that triggered the shutdown failed.
    #[error("actor {actor} failed: {source:#}")]
    ActorFailed {
        actor: String,
        #[source]
        source: anyhow::Error,
    },

    /// The triggering actor returned cleanly, but another actor failed while
    /// the group was unwinding.
    #[error("abnormal shutdown, actor {actor} failed: {source:#}")]
    AbnormalShutdown {
        actor: String,
        #[source]
        source: anyhow::Error,
    },

    /// Some actors did not return within the configured shutdown timeout and
    /// were aborted.
    #[error("shutdown timeout {timeout:?} exceeded; stuck: {stuck:?}")]
    ShutdownTimeout { timeout: Duration, stuck: Vec<String> },
}

impl Error {
    /// Name of the actor the error is attributed to, if any.
    pub fn actor(&self) -> Option<&str> {
        match self {
            Error::ActorFailed { actor, .. } | Error::AbnormalShutdown { actor, .. } => {
                Some(actor)
            }
            Error::ShutdownTimeout { .. } => None,
        }
    }

    /// The underlying actor error, if any.
    pub fn actor_error(&self) -> Option<&anyhow::Error> {
        match self {
            Error::ActorFailed { source, .. } | Error::AbnormalShutdown { source, .. } => {
                Some(source)
            }
            Error::ShutdownTimeout { .. } => None,
        }
    }
}

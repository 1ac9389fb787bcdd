use core::fmt;

/// A long-running unit managed by an [`ActorGroup`](super::ActorGroup).
///
/// `run` blocks (asynchronously) until the actor is done, either because its
/// work finished, it failed, or it was interrupted. `interrupt` asks a running
/// `run` to return promptly.
///
/// # Contract
///
/// - `interrupt` must not block for long; it should only flip state (cancel a
///   token, close a channel) that `run` observes.
/// - `interrupt` must be idempotent and safe to call after `run` returned.
/// - After `interrupt`, `run` must eventually return. An actor that ignores
///   interrupts hangs the whole group unless the group was given a shutdown
///   timeout.
///
/// Actors own whatever handle they need to stop themselves, so the group only
/// ever deals with `&self`.
#[tonic::async_trait]
pub trait Actor: Send + Sync + 'static {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Runs the actor to completion.
    async fn run(&self) -> anyhow::Result<()>;

    /// Requests that `run` return. See the trait docs for the contract.
    fn interrupt(&self, cause: &Cause<'_>);
}

/// The exit that triggered a group shutdown.
#[derive(Clone, Copy)]
pub struct Cause<'a> {
    /// Name of the actor whose `run` returned first.
    pub actor: &'a str,
    /// The error it returned, if it failed.
    pub error: Option<&'a anyhow::Error>,
}

impl Cause<'_> {
    /// Whether the triggering actor returned successfully.
    pub fn is_clean(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Debug for Cause<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cause")
            .field("actor", &self.actor)
            .field("error", &self.error.map(ToString::to_string))
            .finish()
    }
}

impl fmt::Display for Cause<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error {
            None => write!(f, "{} exited", self.actor),
            Some(err) => write!(f, "{} failed: {err:#}", self.actor),
        }
    }
}

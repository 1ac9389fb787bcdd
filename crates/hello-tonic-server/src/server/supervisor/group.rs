use super::{Actor, Cause, Error, panic_message};
use core::time::Duration;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Exit of a single actor, tagged with its registration index.
type Exit = (usize, anyhow::Result<()>);

/// An insertion-ordered set of [`Actor`]s run as a unit.
///
/// Actors are registered with [`add`](Self::add) during setup. [`run`](Self::run)
/// consumes the group, so nothing can be registered once it has started.
#[derive(Default)]
pub struct ActorGroup {
    actors: Vec<Arc<dyn Actor>>,
    shutdown_timeout: Option<Duration>,
}

impl ActorGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an actor. Actors are started in registration order.
    pub fn add<A: Actor>(&mut self, actor: A) -> &mut Self {
        self.actors.push(Arc::new(actor));
        self
    }

    /// Bounds how long [`run`](Self::run) waits for actors to return after
    /// they were interrupted. Actors still running at the deadline are
    /// aborted.
    ///
    /// Without a timeout, `run` waits for every actor indefinitely.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Runs every registered actor concurrently until the first one returns,
    /// then interrupts all of them and waits for every `run` to finish.
    ///
    /// Each actor's `interrupt` is called exactly once, including on the actor
    /// that triggered the shutdown. A panic inside `run` counts as a failure
    /// of that actor.
    ///
    /// # Errors
    ///
    /// - [`Error::ActorFailed`] if the first actor to return failed.
    /// - [`Error::AbnormalShutdown`] if the first actor returned cleanly but
    ///   another one failed while unwinding (the earliest such failure).
    /// - [`Error::ShutdownTimeout`] if a shutdown timeout was configured and
    ///   some actors did not return in time.
    pub async fn run(self) -> Result<(), Error> {
        if self.actors.is_empty() {
            return Ok(());
        }

        let mut set = JoinSet::new();
        for (idx, actor) in self.actors.iter().enumerate() {
            let actor = Arc::clone(actor);
            tracing::debug!(actor = actor.name(), "Starting actor");
            set.spawn(async move {
                let res = match AssertUnwindSafe(actor.run()).catch_unwind().await {
                    Ok(res) => res,
                    Err(payload) => Err(anyhow::anyhow!(
                        "panicked: {}",
                        panic_message(payload.as_ref())
                    )),
                };
                (idx, res)
            });
        }

        let mut running = vec![true; self.actors.len()];

        let (first_idx, first_res) = match next_exit(&mut set).await {
            Some(exit) => exit,
            // Only reachable if every task was cancelled by the runtime.
            None => return Ok(()),
        };
        running[first_idx] = false;

        let trigger = self.actors[first_idx].name();
        let cause = Cause {
            actor: trigger,
            error: first_res.as_ref().err(),
        };
        log_exit(trigger, &first_res, true);

        tracing::info!(cause = %cause, "Interrupting {} actor(s)", self.actors.len());
        for actor in &self.actors {
            actor.interrupt(&cause);
        }

        let mut unwind_failure: Option<(usize, anyhow::Error)> = None;
        let timed_out = {
            let drain = async {
                while let Some((idx, res)) = next_exit(&mut set).await {
                    running[idx] = false;
                    log_exit(self.actors[idx].name(), &res, false);
                    if let Err(err) = res {
                        if unwind_failure.is_none() {
                            unwind_failure = Some((idx, err));
                        }
                    }
                }
            };
            match self.shutdown_timeout {
                Some(timeout) => tokio::time::timeout(timeout, drain).await.is_err(),
                None => {
                    drain.await;
                    false
                }
            }
        };

        if timed_out {
            set.abort_all();
            while set.join_next().await.is_some() {}
        }

        if let Err(source) = first_res {
            return Err(Error::ActorFailed {
                actor: trigger.to_string(),
                source,
            });
        }

        if timed_out {
            let stuck: Vec<String> = running
                .iter()
                .zip(&self.actors)
                .filter(|(running, _)| **running)
                .map(|(_, actor)| actor.name().to_string())
                .collect();
            let timeout = self.shutdown_timeout.unwrap_or_default();
            tracing::error!(?stuck, "Shutdown timeout {timeout:?} exceeded");
            return Err(Error::ShutdownTimeout { timeout, stuck });
        }

        match unwind_failure {
            Some((idx, source)) => Err(Error::AbnormalShutdown {
                actor: self.actors[idx].name().to_string(),
                source,
            }),
            None => {
                tracing::info!("All actors stopped");
                Ok(())
            }
        }
    }
}

/// Waits for the next actor to return.
///
/// Panics are caught inside each task, so a join error only means the task
/// was aborted; those are skipped.
async fn next_exit(set: &mut JoinSet<Exit>) -> Option<Exit> {
    loop {
        match set.join_next().await? {
            Ok(exit) => return Some(exit),
            Err(err) => {
                tracing::warn!("Actor task did not complete: {err}");
            }
        }
    }
}

fn log_exit(actor: &str, res: &anyhow::Result<()>, first: bool) {
    match res {
        Ok(()) => tracing::info!(actor, first, "Actor stopped"),
        Err(err) => tracing::error!(actor, first, "Actor failed: {err:#}"),
    }
}

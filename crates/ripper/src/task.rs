use std::future::Future;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    #[default]
    Pending,
    Running,
    Finished,
}

impl TaskState {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

/// A cancellable unit of work with a `Pending -> Running -> Finished` lifecycle.
///
/// Cancellation is cooperative: [AsyncTask::cancel] only flips the token, the
/// body passed to [AsyncTask::run] is expected to watch it at its own safe points.
/// A task cancelled before it was started goes straight to `Finished` and its
/// body never runs.
///
/// The state lives inside a [watch] channel, so every transition is made under
/// the channel lock and observers can await [AsyncTask::finished] instead of
/// polling.
#[derive(Debug)]
pub struct AsyncTask {
    state: watch::Sender<TaskState>,
    token: CancellationToken,
}

impl AsyncTask {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    pub fn with_token(token: CancellationToken) -> Self {
        let (state, _) = watch::channel(TaskState::Pending);
        Self { state, token }
    }

    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Move a pending task to `Running`.
    ///
    /// Returns `false` when the body must not run: either the task was already
    /// cancelled (it is now `Finished`) or it has left `Pending` before.
    pub fn start(&self) -> bool {
        let mut started = false;
        self.state.send_if_modified(|state| match state {
            TaskState::Pending if self.token.is_cancelled() => {
                *state = TaskState::Finished;
                true
            }
            TaskState::Pending => {
                *state = TaskState::Running;
                started = true;
                true
            }
            _ => false,
        });
        started
    }

    /// Completion signal of a running task. Only the first call has an effect.
    pub fn finish(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == TaskState::Running {
                *state = TaskState::Finished;
                true
            } else {
                false
            }
        })
    }

    /// Resolves once the task reached `Finished`.
    pub async fn finished(&self) {
        let mut rx = self.state.subscribe();
        // the sender is borrowed by `self`, so the channel can not be closed here
        let _ = rx.wait_for(TaskState::is_finished).await;
    }

    /// Start the task, drive `body` to completion and signal `Finished`.
    ///
    /// Returns `None` without polling `body` if the task could not be started.
    pub async fn run<F, Fut, T>(&self, body: F) -> Option<T>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T>,
    {
        if !self.start() {
            return None;
        }

        let output = body(self.token.clone()).await;
        self.finish();
        Some(output)
    }
}

impl Default for AsyncTask {
    fn default() -> Self {
        Self::new()
    }
}

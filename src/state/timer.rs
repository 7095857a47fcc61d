use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::sleep};

/// Callback fired when a question's answering window (limit + grace) elapses.
///
/// Receives the session PIN and the index of the question the timer was armed for.
pub type TimeoutHook = Arc<dyn Fn(String, usize) + Send + Sync>;

/// Owns at most one pending deferred callback for a session.
#[derive(Debug, Default)]
pub struct QuestionTimer {
    handle: Option<JoinHandle<()>>,
}

impl QuestionTimer {
    /// Schedule `hook(pin, question_index)` after `delay`, replacing any pending callback.
    pub fn arm(&mut self, delay: Duration, pin: String, question_index: usize, hook: TimeoutHook) {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            sleep(delay).await;
            hook(pin, question_index);
        }));
    }

    /// Cancel the pending callback. Returns whether one was still pending.
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }

    /// Whether a callback is scheduled and has not fired yet.
    pub fn is_armed(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for QuestionTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

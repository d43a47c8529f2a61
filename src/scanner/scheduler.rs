use std::collections::HashMap;
use std::future::Future;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The timer classes the scanner owns. At most one task of each kind runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskKind {
    /// Periodic frame sampling.
    DecodeTick,
    /// Once-per-second cooldown countdown.
    CooldownTick,
    /// One-shot delay between releasing and reopening the camera.
    SwitchSettle,
    /// One-shot re-arm attempt after a successful decode.
    PostDecodePause,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::DecodeTick,
        TaskKind::CooldownTick,
        TaskKind::SwitchSettle,
        TaskKind::PostDecodePause,
    ];
}

struct ScheduledTask {
    token: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }
}

/// Cancellable tokio tasks keyed by [`TaskKind`].
///
/// Cancellation is cooperative: the task is dropped at its next await point.
/// Callers that need a hard guarantee also check the task's `token` against
/// their own state when the task reports back.
#[derive(Default)]
pub struct Scheduler {
    tasks: HashMap<TaskKind, ScheduledTask>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` as the single instance of `kind`, cancelling any previous one.
    pub fn schedule<F>(&mut self, kind: TaskKind, token: u64, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel(kind);

        let cancel = CancellationToken::new();
        let cancelled = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {}
                _ = task => {}
            }
        });

        self.tasks.insert(
            kind,
            ScheduledTask {
                token,
                cancel,
                handle,
            },
        );
    }

    /// Cancel the task of `kind`. Returns `true` if one was still running.
    pub fn cancel(&mut self, kind: TaskKind) -> bool {
        match self.tasks.remove(&kind) {
            Some(task) => {
                let was_live = task.is_live();
                task.cancel.cancel();
                was_live
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for kind in TaskKind::ALL {
            self.cancel(kind);
        }
    }

    pub fn is_pending(&self, kind: TaskKind) -> bool {
        self.tasks.get(&kind).map_or(false, ScheduledTask::is_live)
    }

    /// Token of the live task of `kind`.
    pub fn token(&self, kind: TaskKind) -> Option<u64> {
        self.tasks
            .get(&kind)
            .filter(|task| task.is_live())
            .map(|task| task.token)
    }

    pub fn pending(&self) -> Vec<TaskKind> {
        TaskKind::ALL
            .into_iter()
            .filter(|kind| self.is_pending(*kind))
            .collect()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

use crate::workspace::WorkspaceCoordinator;
use launchpad_core::remote::{ChangeFilter, ChangeKind, Table};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Keeps a workspace's session cache in step with remote changes.
///
/// Every change to the user's `sessions` rows, whether made by this
/// workspace or another one, triggers a full refresh. The listener stops when
/// the handle is dropped.
pub struct SessionSync {
    task: JoinHandle<()>,
}

impl SessionSync {
    /// Subscribes to `user_id`'s session changes and starts the listener.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(workspace: Arc<WorkspaceCoordinator>, user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        let mut feed = workspace
            .remote()
            .subscribe(ChangeFilter::table(Table::Sessions).for_user(user_id.clone()));

        let task = tokio::spawn(async move {
            while let Some(event) = feed.next().await {
                if event.kind == ChangeKind::Resync {
                    tracing::info!(user_id = %user_id, "change feed lagged, resyncing sessions");
                } else {
                    tracing::debug!(
                        user_id = %user_id,
                        row_id = %event.row_id,
                        kind = ?event.kind,
                        "remote session change"
                    );
                }
                // Failures are published as notices by the repository.
                if let Err(err) = workspace.refresh_sessions().await {
                    tracing::debug!(user_id = %user_id, error = %err, "session resync failed");
                }
            }
            tracing::debug!(user_id = %user_id, "session change feed closed");
        });

        Self { task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for SessionSync {
    fn drop(&mut self) {
        self.task.abort();
    }
}

//! Completion invocations with an `agent_runs` audit trail.

use crate::workspace_store::{Notice, WorkspaceStore};
use async_trait::async_trait;
use launchpad_core::completion::{CompletionRequest, CompletionResponse, CompletionService};
use launchpad_core::error::Result;
use launchpad_core::remote::RemoteStore;
use launchpad_core::run::NewAgentRun;
use serde_json::json;
use std::sync::Arc;

/// Wraps a [`CompletionService`] and appends one `agent_runs` row per
/// successful invocation.
///
/// The audit write never fails the turn: a rejected insert is logged and
/// published as a notice.
pub struct AuditedCompletion {
    inner: Arc<dyn CompletionService>,
    remote: Arc<dyn RemoteStore>,
    store: Arc<WorkspaceStore>,
}

impl AuditedCompletion {
    pub fn new(
        inner: Arc<dyn CompletionService>,
        remote: Arc<dyn RemoteStore>,
        store: Arc<WorkspaceStore>,
    ) -> Self {
        Self {
            inner,
            remote,
            store,
        }
    }
}

#[async_trait]
impl CompletionService for AuditedCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let response = match self.inner.complete(request.clone()).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(
                    session_id = %request.session_id,
                    agent_id = %request.agent_id,
                    error = %err,
                    "completion failed"
                );
                self.store.notify(Notice::from_error("complete", &err));
                return Err(err);
            }
        };

        let run = NewAgentRun {
            session_id: request.session_id,
            agent_id: request.agent_id,
            user_id: request.user_id,
            input: request.input,
            output: json!({ "response": response.response }),
            tokens_used: response.tokens,
            cost_estimate: response.cost,
        };
        match self.remote.insert_agent_run(run).await {
            Ok(stored) => {
                tracing::debug!(run_id = %stored.id, tokens = stored.run.tokens_used, "recorded agent run");
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to record agent run");
                self.store.notify(Notice::from_error("record_agent_run", &err));
            }
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchpad_core::error::LaunchpadError;
    use launchpad_infrastructure::InMemoryRemoteStore;

    struct Fixed(Result<CompletionResponse>);

    #[async_trait]
    impl CompletionService for Fixed {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
            self.0.clone()
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            agent_id: "a1".into(),
            session_id: "s1".into(),
            user_id: "u1".into(),
            input: json!("hello"),
            history: Vec::new(),
        }
    }

    fn ok_response() -> Result<CompletionResponse> {
        Ok(CompletionResponse {
            response: "hi there".into(),
            tokens: 120,
            cost: 0.00024,
        })
    }

    #[tokio::test]
    async fn test_successful_turn_is_audited() {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let audited = AuditedCompletion::new(
            Arc::new(Fixed(ok_response())),
            remote.clone(),
            Arc::new(WorkspaceStore::default()),
        );

        let response = audited.complete(request()).await.unwrap();
        assert_eq!(response.response, "hi there");

        let runs = remote.agent_runs().await;
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run.session_id, "s1");
        assert_eq!(runs[0].run.output, json!({ "response": "hi there" }));
        assert_eq!(runs[0].run.tokens_used, 120);
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_fail_turn() {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let store = Arc::new(WorkspaceStore::default());
        let audited =
            AuditedCompletion::new(Arc::new(Fixed(ok_response())), remote.clone(), store.clone());

        remote.set_online(false);
        assert!(audited.complete(request()).await.is_ok());
        let notices = store.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].operation, "record_agent_run");
    }

    #[tokio::test]
    async fn test_failed_turn_is_not_audited() {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let audited = AuditedCompletion::new(
            Arc::new(Fixed(Err(LaunchpadError::completion("upstream 500")))),
            remote.clone(),
            Arc::new(WorkspaceStore::default()),
        );

        let err = audited.complete(request()).await.unwrap_err();
        assert!(matches!(err, LaunchpadError::Completion(_)));
        assert!(remote.agent_runs().await.is_empty());
    }
}

//! Scripted walkthrough of the session layer.
//!
//! Seeds an in-memory store with one agent per view kind, launches each agent
//! (twice at once, to show that launches converge on one session), drives the
//! mounted view with a canned input and prints what happened.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use launchpad_application::view::{AgentViewDispatcher, PluginRegistry, ViewResolution};
use launchpad_application::{AuditedCompletion, SessionSync, WorkspaceCoordinator};
use launchpad_core::agent::{Agent, AgentType};
use launchpad_core::completion::{CompletionRequest, CompletionResponse, CompletionService};
use launchpad_core::config::RootConfig;
use launchpad_core::user::StaticIdentity;
use launchpad_infrastructure::{ConfigService, HttpCompletionClient, InMemoryRemoteStore};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;

/// Per-token price used by the local completion stand-in.
const COST_PER_TOKEN: f64 = 0.000002;

/// Answers locally when no completion endpoint is configured.
struct LocalEcho;

#[async_trait]
impl CompletionService for LocalEcho {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> launchpad_core::Result<CompletionResponse> {
        let text = match &request.input {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let tokens = text.split_whitespace().count() as u64;
        Ok(CompletionResponse {
            response: format!("You said: {text}"),
            tokens,
            cost: tokens as f64 * COST_PER_TOKEN,
        })
    }
}

fn load_config(path: Option<PathBuf>) -> Result<RootConfig> {
    let service = match path {
        Some(path) => ConfigService::at(path),
        None => ConfigService::new().context("Failed to locate configuration")?,
    };
    service
        .get_config()
        .with_context(|| format!("Failed to load {}", service.path().display()))
}

fn demo_catalog() -> Vec<Agent> {
    vec![
        Agent::new("assistant", "Assistant", AgentType::Chat)
            .with_description("General purpose chat agent"),
        Agent::new("intake", "Intake Form", AgentType::Form).with_config(json!({
            "fields": [
                {"name": "email", "label": "Email", "type": "text", "required": true},
                {"name": "topic", "label": "Topic", "type": "textarea",
                 "placeholder": "What do you need help with?"}
            ],
            "submitLabel": "Send request"
        })),
        Agent::new("pipeline", "Pipeline", AgentType::Workflow),
        Agent::new("weather", "Weather", AgentType::Custom)
            .with_config(json!({"component": "weather-visualizer"})),
        Agent::new("analyzer", "Text Analyzer", AgentType::Custom)
            .with_config(json!({"component": "text-analyzer"})),
        Agent::new("prototype", "Prototype", AgentType::Custom),
    ]
}

fn scripted_inputs(resolution: &ViewResolution) -> &'static [&'static str] {
    match resolution {
        ViewResolution::Chat => &["Hello there"],
        ViewResolution::Form => &["email=demo@example.com", "topic=Access to the beta", "submit"],
        ViewResolution::Workflow => &["add", "rename llm-1 Summarize"],
        ViewResolution::Custom(key) if key == "weather-visualizer" => &["refresh"],
        ViewResolution::Custom(_) => &["What a wonderful day! Is it sunny?"],
        ViewResolution::Unsupported { .. } => &[],
    }
}

pub async fn run(config: Option<PathBuf>, user: String, completion_url: Option<String>) -> Result<()> {
    let mut config = load_config(config)?;
    if let Some(url) = completion_url {
        config.completion.endpoint = Some(url);
    }

    let remote = Arc::new(InMemoryRemoteStore::with_capacity(
        config.workspace.change_feed_capacity,
    ));
    for agent in demo_catalog() {
        remote.seed_agent(agent).await;
    }

    let workspace = Arc::new(WorkspaceCoordinator::new(
        remote.clone(),
        Arc::new(StaticIdentity::signed_in(user.clone())),
        config.workspace.clone(),
    ));
    workspace.initialize().await?;
    let sync = SessionSync::spawn(workspace.clone(), user.clone());

    let completion: Arc<dyn CompletionService> =
        match HttpCompletionClient::from_settings(&config.completion)? {
            Some(client) => {
                tracing::info!(endpoint = %client.endpoint(), "using remote completion endpoint");
                Arc::new(client)
            }
            None => Arc::new(LocalEcho),
        };
    let completion = Arc::new(AuditedCompletion::new(
        completion,
        remote.clone(),
        workspace.store().clone(),
    ));
    let dispatcher = AgentViewDispatcher::new(
        Arc::new(PluginRegistry::with_builtin_plugins()),
        &workspace,
    )
    .with_completion(completion);

    println!("Signed in as {user}\n");
    for agent in workspace.store().agents() {
        let launches = join_all([
            workspace.ensure_session_for_agent(&agent),
            workspace.ensure_session_for_agent(&agent),
        ])
        .await;
        let mut ids = Vec::new();
        for launch in launches {
            ids.push(launch?.id);
        }
        ids.dedup();
        let session = workspace
            .store()
            .active_session()
            .context("launched session is not active")?;

        let mut mounted = dispatcher.mount(&session).await;
        println!(
            "== {} ({}) -> session {} [{} distinct id(s) from 2 launches]",
            agent.name,
            agent.agent_type,
            session.id,
            ids.len()
        );
        for input in scripted_inputs(&mounted.resolution) {
            match mounted.view.handle_input(input).await {
                Ok(reply) => println!("> {input}\n{reply}"),
                Err(err) => println!("> {input}\n(error) {err}"),
            }
        }
        println!("{}\n", mounted.view.render());
        workspace.state().save().await?;
    }

    workspace.clear_active_session().await?;
    let snapshot = workspace.snapshot();
    println!("Sessions:");
    for session in snapshot.sessions() {
        println!(
            "  {} {:<24} v{} keys={}",
            session.last_active_at.format("%H:%M:%S%.3f"),
            session.title,
            session.version,
            session.state.len()
        );
    }
    println!("Agent runs recorded: {}", remote.agent_runs().await.len());

    let notices = workspace.store().take_notices();
    if !notices.is_empty() {
        println!("Notices:");
        for notice in notices {
            println!("  [{:?}] {}: {}", notice.level, notice.operation, notice.message);
        }
    }

    sync.stop();
    Ok(())
}

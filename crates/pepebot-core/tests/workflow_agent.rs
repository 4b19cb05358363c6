//! Integration: workflow steps delegating to a real agent manager.
//!
//! Wires a `WorkflowExecutor` to the tool registry and the agent
//! manager through the narrow adapter traits, then runs a workflow
//! whose agent step flows through the full agent loop against a
//! scripted provider.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use pepebot_core::agent::manager::AgentManager;
use pepebot_core::session::SessionStore;
use pepebot_core::agent::skills::SkillsLoader;
use pepebot_core::tools::{Tool, ToolContext, ToolError, ToolRegistry};
use pepebot_core::workflow::{
    WorkflowAgentProcessor, WorkflowExecutor, WorkflowSkillProvider, WorkflowToolExecutor,
};
use pepebot_llm::types::{ChatRequest, ChatResponse, StreamChunk};
use pepebot_llm::{Provider, ProviderError};
use pepebot_types::config::Config;
use pepebot_types::event::InboundMessage;
use pepebot_types::workflow::WorkflowDefinition;

/// Provider that echoes the last user message back, prefixed.
struct EchoProvider;

#[async_trait]
impl Provider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_text())
            .unwrap_or_default();
        let body = serde_json::json!({
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": format!("echo: {last_user}")},
                "finish_reason": "stop"
            }]
        });
        Ok(serde_json::from_value(body).expect("static response shape"))
    }

    async fn chat_stream(
        &self,
        _request: &ChatRequest,
        _tx: tokio::sync::mpsc::Sender<StreamChunk>,
    ) -> Result<(), ProviderError> {
        Err(ProviderError::RequestFailed("no streaming in this test".into()))
    }
}

/// Doubling tool used by the workflow's tool step.
struct DoubleTool;

#[async_trait]
impl Tool for DoubleTool {
    fn name(&self) -> &str {
        "double"
    }
    fn description(&self) -> &str {
        "Double a number"
    }
    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {"n": {"type": "number"}},
            "required": ["n"]
        })
    }
    async fn execute(
        &self,
        _ctx: &ToolContext,
        args: serde_json::Value,
    ) -> Result<String, ToolError> {
        let n = args
            .get("n")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| ToolError::InvalidArgs("n must be a number".into()))?;
        Ok(format!("{}", n * 2.0))
    }
}

/// Adapter: tool registry → workflow executor.
struct RegistryAdapter {
    tools: Arc<ToolRegistry>,
}

#[async_trait]
impl WorkflowToolExecutor for RegistryAdapter {
    fn get_schema(&self, name: &str) -> Option<serde_json::Value> {
        self.tools.get_schema(name)
    }

    async fn execute(&self, name: &str, args: serde_json::Value) -> Result<String, String> {
        let ctx = ToolContext::default();
        self.tools
            .execute(&ctx, name, args)
            .await
            .map_err(|e| e.to_string())
    }
}

/// Adapter: skills loader → workflow executor.
struct SkillsAdapter {
    skills: Arc<SkillsLoader>,
}

#[async_trait]
impl WorkflowSkillProvider for SkillsAdapter {
    async fn load_skill(&self, name: &str) -> Option<String> {
        self.skills.get(name).await.map(|s| s.content)
    }
}

/// Adapter: agent manager → workflow executor. Each agent step is one
/// inbound envelope on the `workflow` channel.
struct ManagerAdapter {
    manager: Arc<AgentManager>,
}

#[async_trait]
impl WorkflowAgentProcessor for ManagerAdapter {
    async fn process(
        &self,
        goal: &str,
        session_key: &str,
        agent: &str,
    ) -> Result<String, String> {
        let mut msg = InboundMessage::new("workflow", "workflow", session_key, goal);
        msg.session_key = Some(session_key.to_string());
        msg.metadata.insert("agent".into(), agent.into());
        self.manager
            .process_message(&msg)
            .await
            .map_err(|e| e.to_string())
    }
}

async fn make_manager(
    dir: &tempfile::TempDir,
    tools: Arc<ToolRegistry>,
    sessions: Arc<SessionStore>,
) -> Arc<AgentManager> {
    let mut config = Config::default();
    config.agents.workspace = dir.path().join("workspace").display().to_string();

    let skills = Arc::new(SkillsLoader::with_dir(dir.path().join("skills")));
    let manager = AgentManager::new(
        config,
        sessions,
        tools,
        skills,
        CancellationToken::new(),
    )
    .await
    .with_provider(Arc::new(EchoProvider));
    Arc::new(manager)
}

#[tokio::test]
async fn workflow_delegates_through_agent_loop() {
    let dir = tempfile::tempdir().unwrap();
    let tools = Arc::new(ToolRegistry::new());
    tools.register(Arc::new(DoubleTool));
    let sessions = Arc::new(SessionStore::new(dir.path().join("sessions")));

    let manager = make_manager(&dir, tools.clone(), sessions.clone()).await;

    let skills = Arc::new(SkillsLoader::with_dir(dir.path().join("skills")));
    let executor = WorkflowExecutor::new()
        .with_tools(Arc::new(RegistryAdapter { tools }))
        .with_skills(Arc::new(SkillsAdapter { skills }))
        .with_agents(Arc::new(ManagerAdapter {
            manager: manager.clone(),
        }));

    let workflow: WorkflowDefinition = serde_json::from_str(
        r#"{
            "name": "math",
            "description": "double then report",
            "variables": {"n": "21"},
            "steps": [
                {"name": "dbl", "tool": "double", "args": {"n": "{{n}}"}},
                {"name": "report", "agent": "default", "goal": "the result is {{dbl_output}}"}
            ]
        }"#,
    )
    .unwrap();

    let report = executor.execute(&workflow, HashMap::new()).await.unwrap();

    // The tool step coerced "21" to a number and doubled it.
    assert_eq!(report.variables["dbl_output"], "42");
    // The agent step went through the full loop and echoed the goal.
    assert_eq!(
        report.variables["report_output"],
        "echo: the result is 42"
    );

    // The agent step persisted under its workflow-scoped session key.
    let history = sessions.get_history("workflow:math:report").await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, "user");
    assert_eq!(history[1].content.as_text(), "echo: the result is 42");
}

#[tokio::test]
async fn workflow_failure_does_not_reach_later_steps() {
    let dir = tempfile::tempdir().unwrap();
    let tools = Arc::new(ToolRegistry::new());
    tools.register(Arc::new(DoubleTool));
    let sessions = Arc::new(SessionStore::new(dir.path().join("sessions")));
    let manager = make_manager(&dir, tools.clone(), sessions.clone()).await;

    let executor = WorkflowExecutor::new()
        .with_tools(Arc::new(RegistryAdapter { tools }))
        .with_agents(Arc::new(ManagerAdapter { manager }));

    let workflow: WorkflowDefinition = serde_json::from_str(
        r#"{
            "name": "broken",
            "steps": [
                {"name": "bad", "tool": "double", "args": {"n": "NaN-ish"}},
                {"name": "after", "agent": "default", "goal": "never runs"}
            ]
        }"#,
    )
    .unwrap();

    let err = executor
        .execute(&workflow, HashMap::new())
        .await
        .unwrap_err();
    assert_eq!(err.step, "bad");

    // The agent step never ran, so no session was created for it.
    let history = sessions.get_history("workflow:broken:after").await;
    assert!(history.is_empty());
}

//! Declarative workflow execution.
//!
//! Sequentially executes a [`WorkflowDefinition`] over the same
//! tool/skill/agent primitives the agent loop uses. The executor
//! consumes three narrow injected traits so the workflow layer never
//! holds the tool registry, skills loader, or agent manager
//! structurally — the embedding process wires concrete implementations
//! at construction and the `workflow → agent → tool → workflow` cycle
//! stays behind interfaces.
//!
//! Variable scope is one mutable map seeded with the workflow defaults
//! and overridden by caller-supplied values. `{{key}}` substrings are
//! interpolated into string tool args (recursively) and goals; each
//! step's output lands back in the map under `{step}_output`
//! (`{step}_goal` for goal steps).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use pepebot_types::workflow::{StepKind, WorkflowDefinition, WorkflowStep};

/// Tool surface the executor consumes.
#[async_trait]
pub trait WorkflowToolExecutor: Send + Sync {
    /// Parameter schema for a tool, when it exists.
    fn get_schema(&self, name: &str) -> Option<serde_json::Value>;

    /// Execute a tool with already-coerced arguments.
    async fn execute(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<String, String>;
}

/// Skill surface the executor consumes.
#[async_trait]
pub trait WorkflowSkillProvider: Send + Sync {
    /// Full skill content by name.
    async fn load_skill(&self, name: &str) -> Option<String>;
}

/// Agent surface the executor consumes.
#[async_trait]
pub trait WorkflowAgentProcessor: Send + Sync {
    /// Run a goal through an agent and return its final response.
    async fn process(
        &self,
        goal: &str,
        session_key: &str,
        agent: &str,
    ) -> Result<String, String>;
}

/// Workflow failure: the step that failed, why, and the log up to it.
#[derive(Debug, thiserror::Error)]
#[error("workflow failed at step '{step}': {message}")]
pub struct WorkflowError {
    /// The failing step's name (`"<validate>"` for validation errors).
    pub step: String,
    /// What went wrong.
    pub message: String,
    /// Log lines accumulated before the failure.
    pub log: Vec<String>,
}

/// Successful workflow run: the log and the final variable scope.
#[derive(Debug, Clone)]
pub struct WorkflowReport {
    /// One line per executed step.
    pub log: Vec<String>,
    /// Final variable scope, including step outputs.
    pub variables: HashMap<String, String>,
}

/// Load a workflow definition from `{workflows_dir}/{name}.json`.
///
/// The file is parsed but not validated; validation happens in
/// [`WorkflowExecutor::validate`] (and again on execute), where the
/// attached tool executor can check tool existence.
pub async fn load_workflow(
    workflows_dir: &std::path::Path,
    name: &str,
) -> Result<WorkflowDefinition, WorkflowError> {
    let path = workflows_dir.join(format!("{name}.json"));
    let content = tokio::fs::read_to_string(&path).await.map_err(|e| WorkflowError {
        step: "<load>".into(),
        message: format!("{}: {e}", path.display()),
        log: Vec::new(),
    })?;
    serde_json::from_str(&content).map_err(|e| WorkflowError {
        step: "<load>".into(),
        message: format!("{}: {e}", path.display()),
        log: Vec::new(),
    })
}

/// List the workflow names available in a directory.
pub async fn list_workflows(workflows_dir: &std::path::Path) -> Vec<String> {
    let mut names = Vec::new();
    let Ok(mut dir) = tokio::fs::read_dir(workflows_dir).await else {
        return names;
    };
    while let Ok(Some(dirent)) = dir.next_entry().await {
        let file_name = dirent.file_name().to_string_lossy().into_owned();
        if let Some(stem) = file_name.strip_suffix(".json") {
            names.push(stem.to_string());
        }
    }
    names.sort();
    names
}

/// Executes workflow definitions.
pub struct WorkflowExecutor {
    tools: Option<Arc<dyn WorkflowToolExecutor>>,
    skills: Option<Arc<dyn WorkflowSkillProvider>>,
    agents: Option<Arc<dyn WorkflowAgentProcessor>>,
}

impl WorkflowExecutor {
    /// An executor with no capabilities; only goal steps can run.
    pub fn new() -> Self {
        Self {
            tools: None,
            skills: None,
            agents: None,
        }
    }

    /// Attach a tool executor.
    pub fn with_tools(mut self, tools: Arc<dyn WorkflowToolExecutor>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Attach a skill provider.
    pub fn with_skills(mut self, skills: Arc<dyn WorkflowSkillProvider>) -> Self {
        self.skills = Some(skills);
        self
    }

    /// Attach an agent processor.
    pub fn with_agents(mut self, agents: Arc<dyn WorkflowAgentProcessor>) -> Self {
        self.agents = Some(agents);
        self
    }

    /// Validate a workflow definition.
    ///
    /// Checks: non-empty name, at least one step, each step has
    /// exactly one shape, skill/agent steps carry goals, tool steps
    /// carry args. When a tool executor is attached, the tool must
    /// exist and its required params must be present in the args (a
    /// `{{var}}` placeholder value counts as present).
    pub fn validate(&self, workflow: &WorkflowDefinition) -> Result<(), WorkflowError> {
        let fail = |message: String| WorkflowError {
            step: "<validate>".into(),
            message,
            log: Vec::new(),
        };

        if workflow.name.trim().is_empty() {
            return Err(fail("workflow name must not be empty".into()));
        }
        if workflow.steps.is_empty() {
            return Err(fail("workflow must have at least one step".into()));
        }

        for step in &workflow.steps {
            if step.name.trim().is_empty() {
                return Err(fail("step name must not be empty".into()));
            }
            let kind = step
                .kind()
                .map_err(|e| fail(format!("step '{}': {e}", step.name)))?;

            if kind == StepKind::Tool {
                let tool_name = step.tool.as_deref().unwrap_or_default();
                if let (Some(tools), Some(args)) = (self.tools.as_ref(), step.args.as_ref()) {
                    let schema = tools.get_schema(tool_name).ok_or_else(|| {
                        fail(format!("step '{}': tool not found: {tool_name}", step.name))
                    })?;
                    for required in required_params(&schema) {
                        if !args.contains_key(&required) {
                            return Err(fail(format!(
                                "step '{}': missing required param '{required}' for tool {tool_name}",
                                step.name
                            )));
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Execute a workflow with caller-supplied variable overrides.
    ///
    /// Steps run in order; the first failure terminates execution with
    /// the accumulated log. No rollback — side effects of earlier
    /// steps remain.
    pub async fn execute(
        &self,
        workflow: &WorkflowDefinition,
        overrides: HashMap<String, String>,
    ) -> Result<WorkflowReport, WorkflowError> {
        self.validate(workflow)?;

        let mut variables = workflow.variables.clone();
        variables.extend(overrides);

        let mut log: Vec<String> = Vec::new();
        debug!(workflow = %workflow.name, steps = workflow.steps.len(), "executing workflow");

        for step in &workflow.steps {
            let result = self.execute_step(workflow, step, &variables).await;
            match result {
                Ok((output_key, output, line)) => {
                    log.push(line);
                    variables.insert(output_key, output);
                }
                Err(message) => {
                    return Err(WorkflowError {
                        step: step.name.clone(),
                        message,
                        log,
                    });
                }
            }
        }

        Ok(WorkflowReport { log, variables })
    }

    /// Run one step: returns `(output_key, output, log_line)`.
    async fn execute_step(
        &self,
        workflow: &WorkflowDefinition,
        step: &WorkflowStep,
        variables: &HashMap<String, String>,
    ) -> Result<(String, String, String), String> {
        let kind = step.kind()?;
        match kind {
            StepKind::Tool => {
                let tool_name = step.tool.as_deref().unwrap_or_default();
                let tools = self
                    .tools
                    .as_ref()
                    .ok_or_else(|| "no tool executor available".to_string())?;

                let args = step.args.clone().unwrap_or_default();
                let mut object = serde_json::Map::new();
                let schema = tools.get_schema(tool_name);
                for (key, value) in args {
                    let interpolated = interpolate_value(value, variables);
                    let coerced = match schema
                        .as_ref()
                        .and_then(|s| declared_type(s, &key))
                    {
                        Some(ty) => coerce(interpolated, &ty)
                            .map_err(|e| format!("arg '{key}': {e}"))?,
                        None => interpolated,
                    };
                    object.insert(key, coerced);
                }

                let output = tools
                    .execute(tool_name, serde_json::Value::Object(object))
                    .await?;
                let line = format!("step '{}': tool {tool_name} ok", step.name);
                Ok((format!("{}_output", step.name), output, line))
            }
            StepKind::Skill => {
                let skill_name = step.skill.as_deref().unwrap_or_default();
                let skills = self
                    .skills
                    .as_ref()
                    .ok_or_else(|| "no skill provider available".to_string())?;
                let skill = skills
                    .load_skill(skill_name)
                    .await
                    .ok_or_else(|| format!("skill not found: {skill_name}"))?;

                let goal = interpolate(step.goal.as_deref().unwrap_or_default(), variables);
                let output =
                    format!("Using skill '{skill_name}':\n\n{skill}\n\nGoal: {goal}");
                let line = format!("step '{}': skill {skill_name} loaded", step.name);
                Ok((format!("{}_output", step.name), output, line))
            }
            StepKind::Agent => {
                let agent_name = step.agent.as_deref().unwrap_or_default();
                let agents = self
                    .agents
                    .as_ref()
                    .ok_or_else(|| "no agent processor available".to_string())?;

                let goal = interpolate(step.goal.as_deref().unwrap_or_default(), variables);
                let session_key = format!("workflow:{}:{}", workflow.name, step.name);
                let output = agents.process(&goal, &session_key, agent_name).await?;
                let line = format!("step '{}': agent {agent_name} ok", step.name);
                Ok((format!("{}_output", step.name), output, line))
            }
            StepKind::Goal => {
                let goal = interpolate(step.goal.as_deref().unwrap_or_default(), variables);
                let line = format!("step '{}': goal noted", step.name);
                Ok((format!("{}_goal", step.name), goal, line))
            }
        }
    }
}

impl Default for WorkflowExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace every `{{key}}` with its variable value.
fn interpolate(template: &str, variables: &HashMap<String, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in variables {
        let needle = format!("{{{{{key}}}}}");
        if result.contains(&needle) {
            result = result.replace(&needle, value);
        }
    }
    result
}

/// Interpolate recursively through a JSON value: strings are
/// substituted, arrays and objects descend, other scalars pass
/// through.
fn interpolate_value(
    value: serde_json::Value,
    variables: &HashMap<String, String>,
) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => serde_json::Value::String(interpolate(&s, variables)),
        serde_json::Value::Array(items) => serde_json::Value::Array(
            items
                .into_iter()
                .map(|v| interpolate_value(v, variables))
                .collect(),
        ),
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, interpolate_value(v, variables)))
                .collect(),
        ),
        other => other,
    }
}

/// The declared type of one property in a tool parameter schema.
fn declared_type(schema: &serde_json::Value, property: &str) -> Option<String> {
    schema
        .get("properties")?
        .get(property)?
        .get("type")?
        .as_str()
        .map(String::from)
}

/// The required property names of a tool parameter schema.
fn required_params(schema: &serde_json::Value) -> Vec<String> {
    schema
        .get("required")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Coerce a string arg to the schema-declared type. Variable values
/// are always strings, while many tool schemas demand numerics — this
/// is where `"540"` becomes `540.0`.
fn coerce(value: serde_json::Value, declared: &str) -> Result<serde_json::Value, String> {
    let serde_json::Value::String(s) = value else {
        // Already typed (literal numbers in the workflow JSON).
        return Ok(value);
    };
    match declared {
        "number" => s
            .trim()
            .parse::<f64>()
            .map(|n| serde_json::json!(n))
            .map_err(|_| format!("cannot coerce '{s}' to number")),
        "integer" => s
            .trim()
            .parse::<i64>()
            .map(|n| serde_json::json!(n))
            .map_err(|_| format!("cannot coerce '{s}' to integer")),
        "boolean" => match s.trim() {
            "true" => Ok(serde_json::json!(true)),
            "false" => Ok(serde_json::json!(false)),
            other => Err(format!("cannot coerce '{other}' to boolean")),
        },
        _ => Ok(serde_json::Value::String(s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Tool executor that records calls and replies per tool.
    struct RecordingTools {
        schemas: HashMap<String, serde_json::Value>,
        calls: StdMutex<Vec<(String, serde_json::Value)>>,
        fail_tool: Option<String>,
    }

    impl RecordingTools {
        fn new() -> Self {
            let mut schemas = HashMap::new();
            schemas.insert(
                "tap".to_string(),
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "x": {"type": "number"},
                        "y": {"type": "number"}
                    },
                    "required": ["x", "y"]
                }),
            );
            schemas.insert(
                "shell".to_string(),
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "command": {"type": "string"},
                        "verbose": {"type": "boolean"},
                        "count": {"type": "integer"}
                    },
                    "required": ["command"]
                }),
            );
            Self {
                schemas,
                calls: StdMutex::new(Vec::new()),
                fail_tool: None,
            }
        }
    }

    #[async_trait]
    impl WorkflowToolExecutor for RecordingTools {
        fn get_schema(&self, name: &str) -> Option<serde_json::Value> {
            self.schemas.get(name).cloned()
        }

        async fn execute(
            &self,
            name: &str,
            args: serde_json::Value,
        ) -> Result<String, String> {
            if self.fail_tool.as_deref() == Some(name) {
                return Err(format!("tool {name} exploded"));
            }
            self.calls.lock().unwrap().push((name.to_string(), args));
            Ok(format!("{name} done"))
        }
    }

    struct MapSkills;

    #[async_trait]
    impl WorkflowSkillProvider for MapSkills {
        async fn load_skill(&self, name: &str) -> Option<String> {
            (name == "review").then(|| "Review checklist content".to_string())
        }
    }

    struct EchoAgents {
        sessions: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl WorkflowAgentProcessor for EchoAgents {
        async fn process(
            &self,
            goal: &str,
            session_key: &str,
            agent: &str,
        ) -> Result<String, String> {
            self.sessions.lock().unwrap().push(session_key.to_string());
            Ok(format!("[{agent}] {goal}"))
        }
    }

    fn workflow(json: &str) -> WorkflowDefinition {
        serde_json::from_str(json).unwrap()
    }

    /// S6: string vars coerce to the schema-declared numeric types.
    #[tokio::test]
    async fn s6_coercion_to_number() {
        let tools = Arc::new(RecordingTools::new());
        let executor = WorkflowExecutor::new().with_tools(tools.clone());

        let wf = workflow(
            r#"{
                "name": "tap-flow",
                "variables": {"X": "540", "Y": "1100"},
                "steps": [
                    {"name": "tap1", "tool": "tap", "args": {"x": "{{X}}", "y": "{{Y}}"}}
                ]
            }"#,
        );

        let report = executor.execute(&wf, HashMap::new()).await.unwrap();
        assert_eq!(report.variables["tap1_output"], "tap done");

        let calls = tools.calls.lock().unwrap();
        let (_, args) = &calls[0];
        assert_eq!(args["x"], serde_json::json!(540.0));
        assert_eq!(args["y"], serde_json::json!(1100.0));
        assert!(args["x"].is_f64());
    }

    #[tokio::test]
    async fn integer_and_boolean_coercion() {
        let tools = Arc::new(RecordingTools::new());
        let executor = WorkflowExecutor::new().with_tools(tools.clone());

        let wf = workflow(
            r#"{
                "name": "shell-flow",
                "variables": {"V": "true", "N": "3"},
                "steps": [
                    {"name": "run", "tool": "shell",
                     "args": {"command": "ls", "verbose": "{{V}}", "count": "{{N}}"}}
                ]
            }"#,
        );

        executor.execute(&wf, HashMap::new()).await.unwrap();
        let calls = tools.calls.lock().unwrap();
        let (_, args) = &calls[0];
        assert_eq!(args["verbose"], serde_json::json!(true));
        assert_eq!(args["count"], serde_json::json!(3));
        assert!(args["count"].is_i64());
    }

    #[tokio::test]
    async fn uncoercible_value_fails_step() {
        let tools = Arc::new(RecordingTools::new());
        let executor = WorkflowExecutor::new().with_tools(tools);

        let wf = workflow(
            r#"{
                "name": "bad",
                "steps": [
                    {"name": "tap1", "tool": "tap", "args": {"x": "not-a-number", "y": "2"}}
                ]
            }"#,
        );

        let err = executor.execute(&wf, HashMap::new()).await.unwrap_err();
        assert_eq!(err.step, "tap1");
        assert!(err.message.contains("coerce"));
    }

    #[tokio::test]
    async fn outputs_feed_later_steps() {
        let tools = Arc::new(RecordingTools::new());
        let agents = Arc::new(EchoAgents {
            sessions: StdMutex::new(Vec::new()),
        });
        let executor = WorkflowExecutor::new()
            .with_tools(tools)
            .with_agents(agents.clone());

        let wf = workflow(
            r#"{
                "name": "chained",
                "steps": [
                    {"name": "probe", "tool": "shell", "args": {"command": "uname"}},
                    {"name": "digest", "agent": "default", "goal": "explain: {{probe_output}}"}
                ]
            }"#,
        );

        let report = executor.execute(&wf, HashMap::new()).await.unwrap();
        assert_eq!(report.variables["digest_output"], "[default] explain: shell done");
        assert_eq!(report.log.len(), 2);

        // Agent steps run under a workflow-scoped session key.
        let sessions = agents.sessions.lock().unwrap();
        assert_eq!(sessions[0], "workflow:chained:digest");
    }

    #[tokio::test]
    async fn skill_step_composes_prompt() {
        let executor = WorkflowExecutor::new().with_skills(Arc::new(MapSkills));

        let wf = workflow(
            r##"{
                "name": "reviewing",
                "variables": {"pr": "#42"},
                "steps": [
                    {"name": "prep", "skill": "review", "goal": "review {{pr}}"}
                ]
            }"##,
        );

        let report = executor.execute(&wf, HashMap::new()).await.unwrap();
        let output = &report.variables["prep_output"];
        assert!(output.starts_with("Using skill 'review':"));
        assert!(output.contains("Review checklist content"));
        assert!(output.ends_with("Goal: review #42"));
    }

    #[tokio::test]
    async fn goal_step_stores_goal_key() {
        let executor = WorkflowExecutor::new();

        let wf = workflow(
            r#"{
                "name": "notes",
                "variables": {"city": "Berlin"},
                "steps": [
                    {"name": "context", "goal": "weather for {{city}}"}
                ]
            }"#,
        );

        let report = executor.execute(&wf, HashMap::new()).await.unwrap();
        assert_eq!(report.variables["context_goal"], "weather for Berlin");
    }

    #[tokio::test]
    async fn overrides_beat_defaults() {
        let executor = WorkflowExecutor::new();
        let wf = workflow(
            r#"{
                "name": "n",
                "variables": {"city": "Berlin"},
                "steps": [{"name": "g", "goal": "{{city}}"}]
            }"#,
        );

        let mut overrides = HashMap::new();
        overrides.insert("city".to_string(), "Tokyo".to_string());
        let report = executor.execute(&wf, overrides).await.unwrap();
        assert_eq!(report.variables["g_goal"], "Tokyo");
    }

    #[tokio::test]
    async fn step_failure_carries_log_and_step_name() {
        let mut tools = RecordingTools::new();
        tools.fail_tool = Some("tap".into());
        let executor = WorkflowExecutor::new().with_tools(Arc::new(tools));

        let wf = workflow(
            r#"{
                "name": "partial",
                "steps": [
                    {"name": "ok", "tool": "shell", "args": {"command": "ls"}},
                    {"name": "boom", "tool": "tap", "args": {"x": "1", "y": "2"}},
                    {"name": "never", "tool": "shell", "args": {"command": "ls"}}
                ]
            }"#,
        );

        let err = executor.execute(&wf, HashMap::new()).await.unwrap_err();
        assert_eq!(err.step, "boom");
        assert!(err.message.contains("exploded"));
        assert_eq!(err.log.len(), 1);
        assert!(err.log[0].contains("'ok'"));
    }

    #[tokio::test]
    async fn validate_rejects_missing_tool() {
        let executor = WorkflowExecutor::new().with_tools(Arc::new(RecordingTools::new()));
        let wf = workflow(
            r#"{"name": "n", "steps": [{"name": "s", "tool": "ghost", "args": {}}]}"#,
        );
        let err = executor.validate(&wf).unwrap_err();
        assert!(err.message.contains("tool not found"));
    }

    #[tokio::test]
    async fn validate_requires_required_params() {
        let executor = WorkflowExecutor::new().with_tools(Arc::new(RecordingTools::new()));
        let wf = workflow(
            r#"{"name": "n", "steps": [{"name": "s", "tool": "tap", "args": {"x": "1"}}]}"#,
        );
        let err = executor.validate(&wf).unwrap_err();
        assert!(err.message.contains("missing required param 'y'"));
    }

    #[tokio::test]
    async fn placeholder_counts_as_present() {
        let executor = WorkflowExecutor::new().with_tools(Arc::new(RecordingTools::new()));
        let wf = workflow(
            r#"{
                "name": "n",
                "variables": {"X": "1", "Y": "2"},
                "steps": [{"name": "s", "tool": "tap", "args": {"x": "{{X}}", "y": "{{Y}}"}}]
            }"#,
        );
        executor.validate(&wf).unwrap();
    }

    #[tokio::test]
    async fn validate_rejects_empty_workflow() {
        let executor = WorkflowExecutor::new();
        assert!(executor
            .validate(&workflow(r#"{"name": "", "steps": [{"name": "g", "goal": "x"}]}"#))
            .is_err());
        assert!(executor
            .validate(&workflow(r#"{"name": "n", "steps": []}"#))
            .is_err());
    }

    #[tokio::test]
    async fn validate_rejects_ambiguous_step() {
        let executor = WorkflowExecutor::new();
        let wf = workflow(
            r#"{"name": "n", "steps": [{"name": "s", "tool": "t", "args": {}, "skill": "k", "goal": "g"}]}"#,
        );
        assert!(executor.validate(&wf).is_err());
    }

    #[tokio::test]
    async fn load_and_list_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let workflows_dir = dir.path().join("workflows");
        tokio::fs::create_dir_all(&workflows_dir).await.unwrap();
        tokio::fs::write(
            workflows_dir.join("morning.json"),
            r#"{"name": "morning", "steps": [{"name": "g", "goal": "start the day"}]}"#,
        )
        .await
        .unwrap();
        tokio::fs::write(workflows_dir.join("notes.txt"), "not a workflow")
            .await
            .unwrap();

        assert_eq!(list_workflows(&workflows_dir).await, vec!["morning"]);

        let wf = load_workflow(&workflows_dir, "morning").await.unwrap();
        assert_eq!(wf.name, "morning");
        assert_eq!(wf.steps.len(), 1);

        let err = load_workflow(&workflows_dir, "ghost").await.unwrap_err();
        assert_eq!(err.step, "<load>");
    }

    #[tokio::test]
    async fn load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("bad.json"), "{broken")
            .await
            .unwrap();
        let err = load_workflow(dir.path(), "bad").await.unwrap_err();
        assert!(err.message.contains("bad.json"));
    }

    /// Interpolation is literal text substitution, nothing else.
    #[test]
    fn interpolate_unknown_keys_left_alone() {
        let mut vars = HashMap::new();
        vars.insert("a".to_string(), "1".to_string());
        assert_eq!(interpolate("{{a}} and {{b}}", &vars), "1 and {{b}}");
    }

    #[test]
    fn interpolate_nested_values() {
        let mut vars = HashMap::new();
        vars.insert("who".to_string(), "world".to_string());
        let value = serde_json::json!({
            "greeting": "hello {{who}}",
            "list": ["{{who}}", 42],
            "nested": {"inner": "{{who}}!"}
        });
        let result = interpolate_value(value, &vars);
        assert_eq!(result["greeting"], "hello world");
        assert_eq!(result["list"][0], "world");
        assert_eq!(result["list"][1], 42);
        assert_eq!(result["nested"]["inner"], "world!");
    }

    #[test]
    fn coerce_leaves_typed_values() {
        assert_eq!(
            coerce(serde_json::json!(7), "number").unwrap(),
            serde_json::json!(7)
        );
        assert_eq!(
            coerce(serde_json::json!("free text"), "string").unwrap(),
            serde_json::json!("free text")
        );
    }
}

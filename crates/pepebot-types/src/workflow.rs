//! Declarative workflow types.
//!
//! A workflow is an ordered list of steps executed over the same
//! tool/skill/agent primitives the agent loop uses, with a single
//! mutable variable scope. Each step is exactly one of four shapes:
//! a tool call, a skill prompt, an agent delegation, or a bare goal.
//! The exclusivity is validated at load time, not encoded in the serde
//! shape, so workflow JSON stays flat and hand-editable.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A declarative workflow definition, persisted as
/// `workflows/{name}.json`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkflowDefinition {
    /// Workflow identifier.
    pub name: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Default variable values, overridable by the caller.
    #[serde(default)]
    pub variables: HashMap<String, String>,

    /// Ordered steps.
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

/// A single workflow step. Exactly one of `tool`, `skill`, `agent`,
/// or bare `goal` applies; see [`WorkflowStep::kind`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkflowStep {
    /// Step name; the step's output is stored under `{name}_output`
    /// (`{name}_goal` for goal steps).
    pub name: String,

    /// Tool to invoke.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    /// Tool arguments. Must be present (even if empty) for tool steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<HashMap<String, serde_json::Value>>,

    /// Skill to load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,

    /// Agent to delegate to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,

    /// Goal text. Required for skill and agent steps; standing alone it
    /// makes an informational goal step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
}

/// The resolved shape of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// `tool` + `args`.
    Tool,
    /// `skill` + `goal`.
    Skill,
    /// `agent` + `goal`.
    Agent,
    /// `goal` alone.
    Goal,
}

impl WorkflowStep {
    /// Classify this step, or report why it is ambiguous/incomplete.
    pub fn kind(&self) -> Result<StepKind, String> {
        let discriminators =
            [self.tool.is_some(), self.skill.is_some(), self.agent.is_some()];
        let set = discriminators.iter().filter(|d| **d).count();
        if set > 1 {
            return Err("step must set at most one of tool, skill, agent".into());
        }
        if self.tool.is_some() {
            if self.args.is_none() {
                return Err("tool step requires args (may be empty)".into());
            }
            return Ok(StepKind::Tool);
        }
        if self.skill.is_some() {
            if self.goal.is_none() {
                return Err("skill step requires a goal".into());
            }
            return Ok(StepKind::Skill);
        }
        if self.agent.is_some() {
            if self.goal.is_none() {
                return Err("agent step requires a goal".into());
            }
            return Ok(StepKind::Agent);
        }
        if self.goal.is_some() {
            return Ok(StepKind::Goal);
        }
        Err("step must set one of tool, skill, agent, or goal".into())
    }
}

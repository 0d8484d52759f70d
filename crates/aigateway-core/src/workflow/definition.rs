//! Workflow definitions: flat ordered step lists built with a fluent
//! builder (SPEC_FULL.md §3, "Workflow definition"; §4.6, "the builder").
//!
//! Replaces the reference codebase's YAML/DAG `WorkflowDefinition` --
//! `depends_on` edges, conditional/loop step configs, `serde_yaml_ng`
//! parsing, and filesystem discovery all assumed a dependency graph this
//! gateway doesn't have. Steps here run strictly in the order they were
//! added; `input` and `skip_if` are typed closures rather than YAML-parsed
//! expressions, matching the "tagged Category enum, transformers are
//! typed functions" design.

use serde_json::Value;

use aigateway_types::llm::Category;

use super::context::WorkflowContext;

/// A literal value or a function of `(workflowInput, context)`. Boxed so a
/// `Step` can hold either shape uniformly.
pub type StepInput = Box<dyn Fn(&Value, &WorkflowContext) -> Result<Value, aigateway_types::error::GatewayError> + Send + Sync>;

/// `(context) -> bool`; when it returns `true` the step is skipped.
pub type SkipIf = Box<dyn Fn(&WorkflowContext) -> bool + Send + Sync>;

/// One step in a [`WorkflowDefinition`]. Dispatch is by `category`: the
/// driver resolves `input`, then calls the failover executor built for
/// that category with the resolved value.
pub struct Step {
    pub name: String,
    pub category: Category,
    pub input: StepInput,
    pub timeout_ms: Option<u64>,
    pub skip_if: Option<SkipIf>,
}

impl Step {
    /// A step whose input is the same literal value on every run.
    pub fn literal(name: impl Into<String>, category: Category, input: Value) -> Self {
        Self {
            name: name.into(),
            category,
            input: Box::new(move |_workflow_input, _ctx| Ok(input.clone())),
            timeout_ms: None,
            skip_if: None,
        }
    }

    /// A step whose input is computed from the workflow input and context
    /// at dispatch time (a transformer, see `crate::transformers`).
    pub fn transform(
        name: impl Into<String>,
        category: Category,
        input: impl Fn(&Value, &WorkflowContext) -> Result<Value, aigateway_types::error::GatewayError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            input: Box::new(input),
            timeout_ms: None,
            skip_if: None,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_skip_if(mut self, skip_if: impl Fn(&WorkflowContext) -> bool + Send + Sync + 'static) -> Self {
        self.skip_if = Some(Box::new(skip_if));
        self
    }
}

/// `{name, description?, steps[], totalTimeoutMs?, defaultStepTimeoutMs?}`
/// (SPEC_FULL.md §3). Not serializable: steps carry closures, so a
/// definition is constructed once in Rust via [`WorkflowDefinitionBuilder`]
/// and held in memory for the life of the process, not round-tripped
/// through a file format.
pub struct WorkflowDefinition {
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<Step>,
    pub total_timeout_ms: Option<u64>,
    pub default_step_timeout_ms: Option<u64>,
}

/// Errors raised while assembling a [`WorkflowDefinition`].
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("workflow '{0}' has no steps")]
    NoSteps(String),
}

/// Fluent assembler producing a [`WorkflowDefinition`]. Enforces at least
/// one step; otherwise mechanical (SPEC_FULL.md §4.6).
pub struct WorkflowDefinitionBuilder {
    name: String,
    description: Option<String>,
    steps: Vec<Step>,
    total_timeout_ms: Option<u64>,
    default_step_timeout_ms: Option<u64>,
}

impl WorkflowDefinitionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            steps: Vec::new(),
            total_timeout_ms: None,
            default_step_timeout_ms: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn total_timeout_ms(mut self, ms: u64) -> Self {
        self.total_timeout_ms = Some(ms);
        self
    }

    pub fn default_step_timeout_ms(mut self, ms: u64) -> Self {
        self.default_step_timeout_ms = Some(ms);
        self
    }

    pub fn build(self) -> Result<WorkflowDefinition, DefinitionError> {
        if self.steps.is_empty() {
            return Err(DefinitionError::NoSteps(self.name));
        }
        Ok(WorkflowDefinition {
            name: self.name,
            description: self.description,
            steps: self.steps,
            total_timeout_ms: self.total_timeout_ms,
            default_step_timeout_ms: self.default_step_timeout_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_rejects_zero_steps() {
        let err = WorkflowDefinitionBuilder::new("empty").build().unwrap_err();
        assert!(matches!(err, DefinitionError::NoSteps(name) if name == "empty"));
    }

    #[test]
    fn builder_accepts_a_single_literal_step() {
        let def = WorkflowDefinitionBuilder::new("single")
            .step(Step::literal("draft", Category::Text, json!("a prompt")))
            .build()
            .unwrap();
        assert_eq!(def.steps.len(), 1);
        assert_eq!(def.steps[0].name, "draft");
    }

    #[test]
    fn step_literal_input_ignores_workflow_input_and_context() {
        let step = Step::literal("draft", Category::Text, json!({"prompt": "fixed"}));
        let ctx = WorkflowContext::new(uuid::Uuid::now_v7(), "wf".to_string(), Value::Null);
        let resolved = (step.input)(&json!("ignored"), &ctx).unwrap();
        assert_eq!(resolved, json!({"prompt": "fixed"}));
    }

    #[test]
    fn step_skip_if_defaults_to_none() {
        let step = Step::literal("draft", Category::Text, json!("x"));
        assert!(step.skip_if.is_none());
    }

    #[test]
    fn step_with_skip_if_evaluates_against_context() {
        let step = Step::literal("draft", Category::Text, json!("x")).with_skip_if(|ctx| ctx.current_step > 0);
        let mut ctx = WorkflowContext::new(uuid::Uuid::now_v7(), "wf".to_string(), Value::Null);
        assert!(!(step.skip_if.as_ref().unwrap())(&ctx));
        ctx.current_step = 1;
        assert!((step.skip_if.as_ref().unwrap())(&ctx));
    }
}

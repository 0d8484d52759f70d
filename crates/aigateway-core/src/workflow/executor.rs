//! Workflow executor: FIFO admission queue, bounded-concurrency driver pool,
//! strictly-sequential per-workflow step evaluation (SPEC_FULL.md §4.5).
//!
//! Replaces the reference codebase's `DagExecutor` -- wave-parallel steps
//! via `JoinSet`, per-workflow-name semaphores, checkpoint/resume/cancel,
//! approval gates -- none of which this gateway's workflows have. Steps
//! within one workflow run in the order they were declared; concurrency is
//! bounded across workflows (`maxConcurrent` simultaneous drivers), not
//! within one.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use aigateway_types::error::{ErrorCode, GatewayError};
use aigateway_types::event::Event;
use aigateway_types::workflow::{StepStatus, WorkflowError as PersistedWorkflowError, WorkflowState, WorkflowStatus};
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::llm::fallback::{FailoverExecutor, RetryConfig};
use crate::llm::registry::Registry;
use crate::state::StateManager;

use super::context::WorkflowContext;
use super::definition::WorkflowDefinition;

/// `{maxConcurrent, stepTimeoutMs, totalTimeoutMs}` defaults, overridable
/// per-definition and per-step (SPEC_FULL.md §4.5, §6.4).
#[derive(Debug, Clone)]
pub struct WorkflowExecutorConfig {
    pub max_concurrent: usize,
    pub step_timeout_ms: u64,
    pub total_timeout_ms: u64,
    pub retry: RetryConfig,
}

impl From<&aigateway_types::config::GatewayConfig> for WorkflowExecutorConfig {
    fn from(config: &aigateway_types::config::GatewayConfig) -> Self {
        Self {
            max_concurrent: config.workflow_max_concurrent,
            step_timeout_ms: config.workflow_step_timeout_ms,
            total_timeout_ms: config.workflow_total_timeout_ms,
            retry: RetryConfig::default(),
        }
    }
}

struct QueuedWorkflow {
    id: Uuid,
    definition: Arc<WorkflowDefinition>,
    input: Value,
}

/// Snapshot used by `GET /workflow` to report queue depth and in-flight count.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub running: usize,
    pub queued: usize,
}

/// Owns the admission queue and driver pool for one process. Generic over
/// the state backend so the same executor works against the in-memory and
/// external key-value `StateManager` implementations.
pub struct WorkflowExecutor<S: StateManager + 'static> {
    state: Arc<S>,
    registry: Arc<Registry>,
    config: WorkflowExecutorConfig,
    queue: Mutex<VecDeque<QueuedWorkflow>>,
    running: AtomicUsize,
}

impl<S: StateManager + 'static> WorkflowExecutor<S> {
    pub fn new(state: Arc<S>, registry: Arc<Registry>, config: WorkflowExecutorConfig) -> Arc<Self> {
        Arc::new(Self {
            state,
            registry,
            config,
            queue: Mutex::new(VecDeque::new()),
            running: AtomicUsize::new(0),
        })
    }

    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            running: self.running.load(Ordering::Relaxed),
            queued: 0, // filled in by callers holding the queue lock; see `queue_depth`
        }
    }

    pub async fn queue_depth(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// The backing state manager, for handlers that need to read or
    /// subscribe to run status directly (history, status, stream).
    pub fn state(&self) -> &Arc<S> {
        &self.state
    }

    /// Generate a new workflow id, persist its initial `pending` record,
    /// then either admit it immediately or append it to the FIFO queue.
    /// Returns the id immediately; the run (or its queueing) continues in
    /// the background.
    pub async fn submit(self: &Arc<Self>, definition: Arc<WorkflowDefinition>, input: Value) -> Result<Uuid, GatewayError> {
        let id = Uuid::now_v7();
        let steps: Vec<StepStatus> = definition
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| StepStatus::pending(i, step.name.clone(), step.category.to_string()))
            .collect();
        let status = WorkflowStatus::new(id, definition.name.clone(), input.clone(), steps);
        self.state
            .create(status)
            .await
            .map_err(|e| GatewayError::StateBackend(e.to_string()))?;

        let mut queue = self.queue.lock().await;
        if self.running.load(Ordering::Relaxed) < self.config.max_concurrent {
            self.running.fetch_add(1, Ordering::Relaxed);
            drop(queue);
            self.admit(id, definition, input).await;
        } else {
            let position = queue.len() + 1;
            queue.push_back(QueuedWorkflow { id, definition: definition.clone(), input });
            drop(queue);
            self.state
                .update(id, Box::new(|status| status.status = WorkflowState::Queued))
                .await;
            self.state
                .emit(Event::WorkflowQueued {
                    workflow_id: id,
                    timestamp: Utc::now(),
                    name: definition.name.clone(),
                    position,
                })
                .await;
        }
        Ok(id)
    }

    /// Transition a run to `running`, emit `workflow:started`, and spawn
    /// its driver task. Assumes the caller has already reserved a running
    /// slot (incremented `self.running`).
    async fn admit(self: &Arc<Self>, id: Uuid, definition: Arc<WorkflowDefinition>, input: Value) {
        let total_steps = definition.steps.len();
        self.state
            .update(id, Box::new(|status| status.status = WorkflowState::Running))
            .await;
        self.state
            .emit(Event::WorkflowStarted {
                workflow_id: id,
                timestamp: Utc::now(),
                name: definition.name.clone(),
                total_steps,
            })
            .await;

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.drive(id, definition, input).await;
            this.running.fetch_sub(1, Ordering::Relaxed);
            this.process_queue().await;
        });
    }

    /// Drain the head of the queue while there is capacity, admitting each
    /// job in FIFO order (SPEC_FULL.md §4.5, "Queue processing").
    async fn process_queue(self: &Arc<Self>) {
        loop {
            let next = {
                let mut queue = self.queue.lock().await;
                if self.running.load(Ordering::Relaxed) >= self.config.max_concurrent {
                    None
                } else {
                    let job = queue.pop_front();
                    if job.is_some() {
                        self.running.fetch_add(1, Ordering::Relaxed);
                    }
                    job
                }
            };
            match next {
                Some(job) => {
                    self.admit(job.id, job.definition, job.input).await;
                }
                None => break,
            }
        }
    }

    /// Run one workflow's steps in order, persisting and emitting as it
    /// goes. Never returns an error to the caller -- failures are
    /// recorded on the `WorkflowStatus` and via `workflow:failed` instead.
    async fn drive(&self, id: Uuid, definition: Arc<WorkflowDefinition>, input: Value) {
        let start = Instant::now();
        let total_timeout_ms = definition.total_timeout_ms.unwrap_or(self.config.total_timeout_ms);

        let outcome = tokio::time::timeout(
            Duration::from_millis(total_timeout_ms),
            self.run_steps(id, &definition, input),
        )
        .await;

        let duration_ms = start.elapsed().as_millis() as u64;
        match outcome {
            Ok(Ok(result)) => {
                self.state
                    .update(
                        id,
                        Box::new(move |status| {
                            status.status = WorkflowState::Completed;
                            status.result = Some(result.clone());
                            status.completed_at = Some(Utc::now());
                        }),
                    )
                    .await;
                let result_for_event = self.state.get(id).await.and_then(|s| s.result).unwrap_or(Value::Null);
                self.state
                    .emit(Event::WorkflowComplete {
                        workflow_id: id,
                        timestamp: Utc::now(),
                        result: result_for_event,
                        duration_ms,
                    })
                    .await;
            }
            Ok(Err((current_step, error))) => {
                self.fail(id, current_step, error, duration_ms).await;
            }
            Err(_elapsed) => {
                let current_step = self.state.get(id).await.map(|s| s.current_step).unwrap_or(0);
                // The step in flight when the total timeout fired is left
                // `running` under a now-terminal workflow unless we close it
                // out here too (SPEC_FULL.md §8, "total timeout fires
                // mid-step").
                let message = format!("workflow timed out ({})", ErrorCode::Timeout.as_str());
                self.state
                    .update(
                        id,
                        Box::new(move |status| {
                            if let Some(step) = status.steps.get_mut(current_step) {
                                if !matches!(
                                    step.status,
                                    aigateway_types::workflow::StepState::Completed
                                        | aigateway_types::workflow::StepState::Failed
                                        | aigateway_types::workflow::StepState::Skipped
                                ) {
                                    step.status = aigateway_types::workflow::StepState::Failed;
                                    step.error = Some(message);
                                }
                            }
                        }),
                    )
                    .await;
                self.fail(id, current_step, GatewayError::Timeout, duration_ms).await;
            }
        }
    }

    async fn fail(&self, id: Uuid, step: usize, error: GatewayError, duration_ms: u64) {
        let message = error.to_string();
        let code = error.error_code().map(|c| c.as_str().to_string());
        let service = error.service().map(str::to_string);
        self.state
            .update(
                id,
                Box::new(move |status| {
                    status.status = WorkflowState::Failed;
                    status.error = Some(PersistedWorkflowError {
                        message: message.clone(),
                        code,
                        step,
                        service,
                    });
                    status.completed_at = Some(Utc::now());
                }),
            )
            .await;
        self.state
            .emit(Event::WorkflowFailed {
                workflow_id: id,
                timestamp: Utc::now(),
                error: error.to_string(),
                duration_ms,
            })
            .await;
    }

    /// Evaluate every step of `definition` in order against a fresh
    /// context. Returns the last step's result on success, or the failing
    /// step index plus error on failure.
    async fn run_steps(&self, id: Uuid, definition: &WorkflowDefinition, input: Value) -> Result<Value, (usize, GatewayError)> {
        let mut context = WorkflowContext::new(id, definition.name.clone(), input.clone());
        let mut last_result = Value::Null;

        for (i, step) in definition.steps.iter().enumerate() {
            context.current_step = i;
            self.state.update(id, Box::new(move |status| status.current_step = i)).await;

            if let Some(skip_if) = &step.skip_if {
                if skip_if(&context) {
                    let name = step.name.clone();
                    self.state
                        .update(
                            id,
                            Box::new(move |status| {
                                status.steps[i].status = aigateway_types::workflow::StepState::Skipped;
                            }),
                        )
                        .await;
                    self.state
                        .emit(Event::StepSkipped {
                            workflow_id: id,
                            timestamp: Utc::now(),
                            index: i,
                            name,
                            reason: "skipIf".to_string(),
                        })
                        .await;
                    continue;
                }
            }

            let step_name = step.name.clone();
            self.state
                .update(
                    id,
                    Box::new(move |status| {
                        status.steps[i].status = aigateway_types::workflow::StepState::Running;
                        status.steps[i].started_at = Some(Utc::now());
                    }),
                )
                .await;
            self.state
                .emit(Event::StepStarted {
                    workflow_id: id,
                    timestamp: Utc::now(),
                    index: i,
                    name: step_name.clone(),
                })
                .await;

            let step_start = Instant::now();
            let resolved_input = match (step.input)(&input, &context) {
                Ok(value) => value,
                Err(e) => {
                    self.fail_step(id, i, &step_name, &e).await;
                    return Err((i, e));
                }
            };

            let executor = FailoverExecutor::new(Arc::clone(&self.registry_arc()), step.category, self.config.retry);
            let step_timeout_ms = step.timeout_ms.unwrap_or(definition.default_step_timeout_ms.unwrap_or(self.config.step_timeout_ms));

            let attempt = tokio::time::timeout(Duration::from_millis(step_timeout_ms), executor.execute(resolved_input)).await;

            let (value, service) = match attempt {
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => {
                    self.fail_step(id, i, &step_name, &e).await;
                    return Err((i, e));
                }
                Err(_elapsed) => {
                    let e = GatewayError::StepFailed {
                        step: i,
                        message: format!("step '{step_name}' timed out after {step_timeout_ms}ms"),
                        code: Some(ErrorCode::Timeout),
                        service: None,
                    };
                    self.fail_step(id, i, &step_name, &e).await;
                    return Err((i, e));
                }
            };

            context.set_result(i, Some(&step_name), value.clone());
            last_result = value.clone();
            let duration_ms = step_start.elapsed().as_millis() as u64;
            let service_for_status = service.clone();
            self.state
                .update(
                    id,
                    Box::new(move |status| {
                        status.steps[i].status = aigateway_types::workflow::StepState::Completed;
                        status.steps[i].service = Some(service_for_status);
                        status.steps[i].result = Some(value);
                        status.steps[i].completed_at = Some(Utc::now());
                        status.steps[i].duration_ms = Some(duration_ms);
                    }),
                )
                .await;
            self.state
                .emit(Event::StepComplete {
                    workflow_id: id,
                    timestamp: Utc::now(),
                    index: i,
                    name: step_name,
                    service,
                    duration_ms,
                })
                .await;
        }

        Ok(last_result)
    }

    async fn fail_step(&self, id: Uuid, index: usize, name: &str, error: &GatewayError) {
        let message = error.to_string();
        self.state
            .update(
                id,
                Box::new(move |status| {
                    status.steps[index].status = aigateway_types::workflow::StepState::Failed;
                    status.steps[index].error = Some(message);
                }),
            )
            .await;
        self.state
            .emit(Event::StepFailed {
                workflow_id: id,
                timestamp: Utc::now(),
                index,
                name: name.to_string(),
                error: error.to_string(),
            })
            .await;
    }

    fn registry_arc(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::box_provider::{BoxChatProvider, BoxImageProvider};
    use crate::llm::provider::{ChatProvider, ChatStream, ImageProvider, ProviderError};
    use crate::state::InMemoryStateManager;
    use crate::transformers;
    use crate::workflow::definition::{Step, WorkflowDefinitionBuilder};
    use aigateway_types::llm::{Category, CompletionRequest, ImageRequest, ImageResult, StreamEvent};
    use async_stream::stream;
    use serde_json::json;

    struct EchoChat;
    impl ChatProvider for EchoChat {
        fn name(&self) -> &str {
            "echo"
        }
        async fn complete(&self, request: CompletionRequest) -> Result<ChatStream, ProviderError> {
            let text = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            let s = stream! {
                yield Ok(StreamEvent::TextDelta { text });
                yield Ok(StreamEvent::Done);
            };
            Ok(Box::pin(s))
        }
    }

    struct StubImage;
    impl ImageProvider for StubImage {
        fn name(&self) -> &str {
            "stub-image"
        }
        async fn generate(&self, _request: ImageRequest) -> Result<ImageResult, ProviderError> {
            Ok(ImageResult {
                urls: vec!["https://example.com/out.png".to_string()],
                revised_prompt: None,
                metadata: None,
            })
        }
    }

    async fn wait_for_terminal<S: StateManager + 'static>(executor: &Arc<WorkflowExecutor<S>>, id: Uuid) -> WorkflowStatus {
        for _ in 0..200 {
            if let Some(status) = executor.state.get(id).await {
                if status.status.is_terminal() {
                    return status;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("workflow {id} never reached a terminal state");
    }

    fn config(max_concurrent: usize) -> WorkflowExecutorConfig {
        WorkflowExecutorConfig {
            max_concurrent,
            step_timeout_ms: 5_000,
            total_timeout_ms: 10_000,
            retry: RetryConfig {
                max_retries: 1,
                base_delay_ms: 1,
                max_delay_ms: 2,
            },
        }
    }

    #[tokio::test]
    async fn single_step_workflow_completes() {
        let registry = Arc::new(Registry::new());
        registry.register(Category::Text, crate::llm::box_provider::BoxProvider::Chat(BoxChatProvider::new(EchoChat)));
        let state = Arc::new(InMemoryStateManager::new(3600));
        let executor = WorkflowExecutor::new(state, registry, config(5));

        let definition = Arc::new(
            WorkflowDefinitionBuilder::new("greet")
                .step(Step::transform("say", Category::Text, transformers::input_to_chat_messages))
                .build()
                .unwrap(),
        );

        let id = executor.submit(definition, json!("hello")).await.unwrap();
        let status = wait_for_terminal(&executor, id).await;
        assert_eq!(status.status, WorkflowState::Completed);
        assert_eq!(status.result, Some(json!("hello")));
        assert_eq!(status.steps[0].service.as_deref(), Some("echo"));
    }

    #[tokio::test]
    async fn chained_text_then_image_threads_previous_result() {
        let registry = Arc::new(Registry::new());
        registry.register(Category::Text, crate::llm::box_provider::BoxProvider::Chat(BoxChatProvider::new(EchoChat)));
        registry.register(Category::Image, crate::llm::box_provider::BoxProvider::Image(BoxImageProvider::new(StubImage)));
        let state = Arc::new(InMemoryStateManager::new(3600));
        let executor = WorkflowExecutor::new(state, registry, config(5));

        let definition = Arc::new(
            WorkflowDefinitionBuilder::new("describe-then-draw")
                .step(Step::transform("describe", Category::Text, transformers::input_to_chat_messages))
                .step(Step::transform("draw", Category::Image, transformers::previous_text_to_image_input))
                .build()
                .unwrap(),
        );

        let id = executor.submit(definition, json!("a sunset")).await.unwrap();
        let status = wait_for_terminal(&executor, id).await;
        assert_eq!(status.status, WorkflowState::Completed);
        assert_eq!(status.steps[1].service.as_deref(), Some("stub-image"));
    }

    #[tokio::test]
    async fn job_past_capacity_is_queued_then_drained() {
        let registry = Arc::new(Registry::new());
        registry.register(Category::Text, crate::llm::box_provider::BoxProvider::Chat(BoxChatProvider::new(EchoChat)));
        let state = Arc::new(InMemoryStateManager::new(3600));
        let executor = WorkflowExecutor::new(state, registry, config(1));

        let definition = Arc::new(
            WorkflowDefinitionBuilder::new("greet")
                .step(Step::transform("say", Category::Text, transformers::input_to_chat_messages))
                .build()
                .unwrap(),
        );

        let first = executor.submit(definition.clone(), json!("one")).await.unwrap();
        let second = executor.submit(definition, json!("two")).await.unwrap();

        let first_status = wait_for_terminal(&executor, first).await;
        let second_status = wait_for_terminal(&executor, second).await;
        assert_eq!(first_status.status, WorkflowState::Completed);
        assert_eq!(second_status.status, WorkflowState::Completed);
    }

    #[tokio::test]
    async fn empty_category_fails_the_workflow() {
        let registry = Arc::new(Registry::new());
        let state = Arc::new(InMemoryStateManager::new(3600));
        let executor = WorkflowExecutor::new(state, registry, config(5));

        let definition = Arc::new(
            WorkflowDefinitionBuilder::new("no-providers")
                .step(Step::transform("say", Category::Text, transformers::input_to_chat_messages))
                .build()
                .unwrap(),
        );

        let id = executor.submit(definition, json!("hello")).await.unwrap();
        let status = wait_for_terminal(&executor, id).await;
        assert_eq!(status.status, WorkflowState::Failed);
        assert_eq!(status.error.as_ref().unwrap().step, 0);
    }

    #[tokio::test]
    async fn skip_if_marks_step_skipped_and_continues() {
        let registry = Arc::new(Registry::new());
        registry.register(Category::Text, crate::llm::box_provider::BoxProvider::Chat(BoxChatProvider::new(EchoChat)));
        let state = Arc::new(InMemoryStateManager::new(3600));
        let executor = WorkflowExecutor::new(state, registry, config(5));

        let definition = Arc::new(
            WorkflowDefinitionBuilder::new("conditional")
                .step(Step::transform("say", Category::Text, transformers::input_to_chat_messages).with_skip_if(|_ctx| true))
                .build()
                .unwrap(),
        );

        let id = executor.submit(definition, json!("hello")).await.unwrap();
        let status = wait_for_terminal(&executor, id).await;
        assert_eq!(status.status, WorkflowState::Completed);
        assert_eq!(status.steps[0].status, aigateway_types::workflow::StepState::Skipped);
    }
}

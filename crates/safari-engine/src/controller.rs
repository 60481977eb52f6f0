//! The Capture → Reason → Act turn cycle for one mission.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use safari_core::capture::{CaptureService, ViewportImage};
use safari_core::dataset::DatasetSink;
use safari_core::events::{AgentStatus, ChatRole, DebugPhase, EventSink, LogType, SessionEvent};
use safari_core::ids::SessionId;
use safari_core::provider::{ReasoningRequest, ReasoningResponse};
use safari_core::tools::{ToolCall, ToolDefinition};
use safari_llm::{ModelEntry, ModelRegistry};
use safari_settings::AgentSettings;

use crate::dataset::{DatasetRecorder, RecordedTurn};
use crate::prompt::{build_context, SYSTEM_PROMPT};
use crate::session::{AgentRunGuard, SessionState};
use crate::tools::{tool_definitions, DispatcherConfig, ToolDispatcher, TurnMemory};

pub const STOPPED_BY_USER: &str = "stopped by user";
pub const CAPTURE_FAILED: &str = "capture failed";
pub const MAX_STEPS_REACHED: &str = "max steps reached";
pub const MODEL_ERROR: &str = "model error";

/// Collaborators shared by every run on the server.
pub struct AgentDeps {
    pub models: Arc<ModelRegistry>,
    pub capture: Arc<dyn CaptureService>,
    pub dataset: Option<Arc<dyn DatasetSink>>,
    pub settings: AgentSettings,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOutcome {
    pub reason: String,
    pub steps: u32,
    pub notepad: String,
    pub found_targets: Vec<String>,
}

enum Phase {
    Capture,
    Reason,
    Act,
    Terminal(String),
}

/// Model exchange waiting for its tool calls to run.
struct PendingTurn {
    context: String,
    request_payload: Value,
    response: ReasoningResponse,
}

struct TurnState {
    mission: String,
    step: u32,
    max_steps: u32,
    image: ViewportImage,
    memory: TurnMemory,
    pending: Option<PendingTurn>,
    last_result: Value,
}

impl TurnState {
    fn turn_label(&self) -> String {
        format!("[turn {}]", self.step + 1)
    }
}

pub struct AgentController {
    deps: Arc<AgentDeps>,
    session_id: SessionId,
    session: Arc<SessionState>,
    events: Arc<dyn EventSink>,
    dispatcher: ToolDispatcher,
    tools: Vec<ToolDefinition>,
}

impl AgentController {
    pub fn new(
        deps: Arc<AgentDeps>,
        session_id: SessionId,
        session: Arc<SessionState>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let dispatcher = ToolDispatcher::new(DispatcherConfig::from(&deps.settings));
        let tools = tool_definitions(deps.settings.max_move_actions, deps.settings.notepad_limit);
        Self {
            deps,
            session_id,
            session,
            events,
            dispatcher,
            tools,
        }
    }

    fn emit(&self, event: SessionEvent) {
        self.events.emit(event);
    }

    fn log(&self, msg: impl Into<String>, log_type: LogType) {
        self.emit(SessionEvent::log(msg, log_type));
    }

    /// Run one mission to completion. The caller holds the agent slot.
    ///
    /// Returns `None` when the run never started (unknown model).
    #[instrument(skip_all, fields(session_id = %self.session_id, model = model_id))]
    pub async fn run(&self, guard: &AgentRunGuard, model_id: &str, mission: &str) -> Option<RunOutcome> {
        let cancel = guard.token();
        self.emit(SessionEvent::status(AgentStatus::Running));
        self.emit(SessionEvent::chat(ChatRole::Human, mission));

        let Some(model) = self.deps.models.get(model_id).cloned() else {
            warn!(model = model_id, "unknown model requested");
            self.emit(SessionEvent::error(format!("unknown model: {model_id}")));
            self.emit(SessionEvent::status(AgentStatus::Stopped));
            return None;
        };
        self.log(format!("model: {}", model.label), LogType::System);

        let recorder = match (&self.deps.dataset, model.collect_data) {
            (Some(sink), true) => {
                let recorder = DatasetRecorder::start(Arc::clone(sink), mission);
                self.log(
                    format!("[Dataset] episode {} started", recorder.episode_id()),
                    LogType::System,
                );
                Some(recorder)
            }
            _ => None,
        };

        info!(mission, "agent start");
        self.log(format!("agent start: {mission}"), LogType::System);
        self.emit(SessionEvent::chat(ChatRole::System, SYSTEM_PROMPT));

        let mut turn = TurnState {
            mission: mission.to_string(),
            step: 0,
            max_steps: self.deps.settings.max_steps,
            image: ViewportImage::png(Vec::new()),
            memory: TurnMemory {
                notepad: self.session.notepad(),
                found_targets: Vec::new(),
            },
            pending: None,
            last_result: Value::Null,
        };

        let mut phase = Phase::Capture;
        let reason = loop {
            phase = match phase {
                Phase::Capture => self.capture(&cancel, &mut turn).await,
                Phase::Reason => self.reason(&cancel, &model, &mut turn).await,
                Phase::Act => self.act(&cancel, recorder.as_ref(), &mut turn).await,
                Phase::Terminal(reason) => break reason,
            };
        };

        self.session.set_notepad(turn.memory.notepad.clone());
        info!(reason = %reason, steps = turn.step, last_result = %turn.last_result, "agent finished");
        self.log(format!("agent finished: {reason}"), LogType::System);
        self.emit(SessionEvent::status(AgentStatus::Done));

        Some(RunOutcome {
            reason,
            steps: turn.step,
            notepad: turn.memory.notepad,
            found_targets: turn.memory.found_targets,
        })
    }

    async fn capture(&self, cancel: &CancellationToken, turn: &mut TurnState) -> Phase {
        if cancel.is_cancelled() {
            return Phase::Terminal(STOPPED_BY_USER.into());
        }
        tokio::time::sleep(Duration::from_millis(self.deps.settings.settle_delay_ms)).await;

        match self.deps.capture.capture(&self.session_id).await {
            Ok(image) if !image.is_empty() => {
                self.log(format!("{} capture done", turn.turn_label()), LogType::System);
                self.emit(SessionEvent::chat_image(
                    ChatRole::Human,
                    "current 10x10 view",
                    image.to_data_url(),
                ));
                turn.image = image;
                Phase::Reason
            }
            Ok(_) => {
                warn!(step = turn.step, "capture returned an empty image");
                self.emit(SessionEvent::error(format!("{} capture failed: empty image", turn.turn_label())));
                Phase::Terminal(CAPTURE_FAILED.into())
            }
            Err(e) => {
                warn!(step = turn.step, error = %e, "capture failed");
                self.emit(SessionEvent::error(format!("{} capture failed: {e}", turn.turn_label())));
                Phase::Terminal(CAPTURE_FAILED.into())
            }
        }
    }

    async fn reason(&self, cancel: &CancellationToken, model: &ModelEntry, turn: &mut TurnState) -> Phase {
        if cancel.is_cancelled() {
            return Phase::Terminal(STOPPED_BY_USER.into());
        }
        if turn.step >= turn.max_steps {
            return Phase::Terminal(MAX_STEPS_REACHED.into());
        }

        let position = self.session.world().lock().player();
        let context = build_context(
            &turn.mission,
            turn.step,
            turn.max_steps,
            position,
            &turn.memory.found_targets,
            &turn.memory.notepad,
        );
        self.emit(SessionEvent::chat(ChatRole::Human, context.clone()));
        self.emit(SessionEvent::debug(DebugPhase::Request, json!({"step": turn.step + 1})));

        let request = ReasoningRequest {
            system: SYSTEM_PROMPT.to_string(),
            context: context.clone(),
            image: turn.image.clone(),
            tools: self.tools.clone(),
        };
        let request_payload = request.debug_payload();
        self.emit(SessionEvent::debug(DebugPhase::RequestPayload, request_payload.clone()));

        let label = turn.turn_label();
        self.log(format!("{label} waiting for model response"), LogType::System);
        let started = Instant::now();
        let result = model.service.invoke(&request).await;
        let elapsed = started.elapsed();

        let mut response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(step = turn.step, error = %e, kind = e.error_kind(), "model call failed");
                self.emit(SessionEvent::error(format!(
                    "{label} model call failed ({:.1}s): {e}",
                    elapsed.as_secs_f64()
                )));
                return Phase::Terminal(MODEL_ERROR.into());
            }
        };
        response.duration_ms = elapsed.as_millis() as u64;

        self.emit(SessionEvent::debug(DebugPhase::ResponsePayload, response.debug_payload()));
        self.log(
            format!("{label} response received ({:.1}s)", elapsed.as_secs_f64()),
            LogType::System,
        );
        for (tool, repair) in &response.repairs {
            self.log(format!("{label} {tool}: {repair}"), LogType::System);
        }
        self.log_decision(&label, &response);
        debug!(step = turn.step, tool_calls = response.tool_calls.len(), "model decided");

        turn.pending = Some(PendingTurn {
            context,
            request_payload,
            response,
        });
        Phase::Act
    }

    fn log_decision(&self, label: &str, response: &ReasoningResponse) {
        let calls = &response.tool_calls;
        if calls.is_empty() {
            let text = response.text.trim();
            let msg = format!("{label} decision: none");
            if text.is_empty() {
                self.log(msg, LogType::Response);
                self.emit(SessionEvent::chat(ChatRole::Ai, "(no tool call)"));
            } else {
                self.emit(SessionEvent::log_detail(msg, LogType::Response, text));
                self.emit(SessionEvent::chat(ChatRole::Ai, text));
            }
            return;
        }

        let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
        let detail: Vec<String> = calls.iter().map(ToolCall::render).collect();
        self.emit(SessionEvent::log_detail(
            format!("{label} decision: {}", names.join(" + ")),
            LogType::Response,
            detail.join("\n"),
        ));
        let chat: Vec<String> = detail.iter().map(|d| format!("🔧 {d}")).collect();
        self.emit(SessionEvent::chat(ChatRole::Ai, chat.join("\n")));
    }

    async fn act(
        &self,
        cancel: &CancellationToken,
        recorder: Option<&DatasetRecorder>,
        turn: &mut TurnState,
    ) -> Phase {
        let Some(pending) = turn.pending.take() else {
            return Phase::Capture;
        };
        let calls = &pending.response.tool_calls;

        if calls.is_empty() {
            turn.last_result = json!({"status": "no_tool_call"});
            turn.step += 1;
            return self.route(cancel, None);
        }

        let batch = self
            .dispatcher
            .execute_batch(calls, self.session.world(), self.events.as_ref(), &mut turn.memory)
            .await;
        self.emit(SessionEvent::debug(
            DebugPhase::ToolResults,
            json!({"results": batch.results}),
        ));

        if let Some(recorder) = recorder {
            let record = RecordedTurn {
                turn: turn.step,
                context: &pending.context,
                image: &turn.image,
                tool_calls: calls,
                tool_results: &batch.results,
                request_payload: pending.request_payload.clone(),
                response: &pending.response,
            };
            if let Err(e) = recorder.record_turn(record).await {
                warn!(step = turn.step, error = %e, "dataset turn not saved");
                self.emit(SessionEvent::error(format!("[Dataset] turn save failed: {e}")));
            }
        }

        turn.last_result = batch.last_result;
        turn.step += 1;
        self.route(cancel, batch.terminal)
    }

    fn route(&self, cancel: &CancellationToken, terminal: Option<String>) -> Phase {
        match terminal {
            Some(reason) => Phase::Terminal(reason),
            None if cancel.is_cancelled() => Phase::Terminal(STOPPED_BY_USER.into()),
            None => Phase::Capture,
        }
    }
}

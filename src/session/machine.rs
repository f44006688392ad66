//! Session state machine: pure `(session, event) -> session` transitions.
//!
//! Every transition works on a copy of the session and returns it only once
//! all provider calls have succeeded. The caller replaces its state with the
//! returned value, so a failed transition leaves nothing behind.

use tracing::{info, warn};

use crate::error::{ConfigError, Error, SessionError};
use crate::llm::{GenerationRequest, LlmProvider};
use crate::scenario::prompts::{opening_prompt, parse_customer_reply, turn_prompt};
use crate::scenario::{Campaign, Mood, ScenarioGenerator};

use super::state::{Emotion, Message, Session, Stage};

/// Something the trainee did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Call the next customer in.
    CallCustomer { campaign: Campaign, mood: Mood },
    /// Begin serving the loaded customer.
    StartServing,
    /// Say a line to the customer.
    Respond { text: String },
    /// Throw the session away.
    Reset,
}

impl SessionEvent {
    /// Human-readable action name for errors and logs.
    pub fn action(&self) -> &'static str {
        match self {
            Self::CallCustomer { .. } => "call a customer",
            Self::StartServing => "start serving",
            Self::Respond { .. } => "respond",
            Self::Reset => "reset",
        }
    }

    fn needs_backend(&self) -> bool {
        !matches!(self, Self::Reset)
    }
}

/// The generation service and model a transition should use.
#[derive(Clone, Copy)]
pub struct Backend<'a> {
    pub llm: &'a dyn LlmProvider,
    pub model: &'a str,
}

/// Applies events to sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionMachine {
    generator: ScenarioGenerator,
}

impl SessionMachine {
    pub fn new(generator: ScenarioGenerator) -> Self {
        Self { generator }
    }

    /// Apply `event` to `session`, returning the next session state.
    ///
    /// `backend` may be `None` when no credential is configured; only
    /// [`SessionEvent::Reset`] works without one.
    pub async fn apply(
        &self,
        session: &Session,
        event: SessionEvent,
        backend: Option<Backend<'_>>,
    ) -> Result<Session, Error> {
        if !event.needs_backend() {
            return Ok(reset(session));
        }
        let Some(backend) = backend else {
            return Err(ConfigError::MissingRequired {
                key: "api_key".to_string(),
                hint: format!("Enter a Gemini API key to {}.", event.action()),
            }
            .into());
        };

        match event {
            SessionEvent::CallCustomer { campaign, mood } => {
                self.call_customer(session, backend, campaign, mood).await
            }
            SessionEvent::StartServing => self.start_serving(session, backend).await,
            SessionEvent::Respond { text } => self.respond(session, backend, text).await,
            SessionEvent::Reset => Ok(reset(session)),
        }
    }

    /// Waiting → ProfileReady.
    async fn call_customer(
        &self,
        session: &Session,
        backend: Backend<'_>,
        campaign: Campaign,
        mood: Mood,
    ) -> Result<Session, Error> {
        ensure_transition(session.stage, Stage::ProfileReady, "call a customer")?;

        let customer = self
            .generator
            .generate_profile(backend.llm, backend.model, campaign, mood)
            .await
            .inspect_err(|e| warn!(error = %e, "Customer generation failed"))?;

        info!(campaign = campaign.id(), "Customer loaded");
        Ok(Session {
            stage: Stage::ProfileReady,
            campaign: Some(campaign),
            profile: customer.profile,
            emotion: Emotion::Neutral,
            messages: Vec::new(),
            avatar: Some(customer.avatar),
        })
    }

    /// ProfileReady → Conversing, with the customer's opening line.
    async fn start_serving(
        &self,
        session: &Session,
        backend: Backend<'_>,
    ) -> Result<Session, Error> {
        ensure_transition(session.stage, Stage::Conversing, "start serving")?;

        let request = GenerationRequest::new(opening_prompt(&session.profile))
            .with_temperature(self.generator.config().temperature);
        let opening = backend
            .llm
            .generate(backend.model, request)
            .await
            .inspect_err(|e| warn!(error = %e, "Opening line failed"))?;

        let mut next = session.clone();
        next.stage = Stage::Conversing;
        next.messages.push(Message::customer(opening));
        info!("Serving started");
        Ok(next)
    }

    /// Conversing self-loop: one representative line, one customer reply.
    async fn respond(
        &self,
        session: &Session,
        backend: Backend<'_>,
        text: String,
    ) -> Result<Session, Error> {
        if session.stage != Stage::Conversing {
            return Err(SessionError::InvalidTransition {
                stage: session.stage,
                action: "respond".to_string(),
            }
            .into());
        }
        if text.trim().is_empty() {
            return Err(SessionError::EmptyUtterance.into());
        }

        // Earlier turns only; the new line travels inside the turn prompt.
        let history = session.history();
        let campaign = session.campaign.unwrap_or_default();
        let request = GenerationRequest::new(turn_prompt(&session.profile, campaign, &text))
            .with_history(history)
            .with_temperature(self.generator.config().temperature);

        let raw = backend
            .llm
            .generate(backend.model, request)
            .await
            .inspect_err(|e| {
                warn!(error = %e, turns = session.messages.len(), "Customer turn failed")
            })?;
        let reply = parse_customer_reply(&raw);

        let mut next = session.clone();
        next.messages.push(Message::representative(text));
        next.emotion = reply.emotion;
        next.messages.push(Message::customer(reply.text));
        info!(emotion = %next.emotion, turns = next.messages.len(), "Customer replied");
        Ok(next)
    }
}

/// Any stage → Waiting with everything cleared.
pub fn reset(session: &Session) -> Session {
    if session.stage != Stage::Waiting {
        info!(from = %session.stage, "Session reset");
    }
    Session::new()
}

fn ensure_transition(from: Stage, to: Stage, action: &str) -> Result<(), SessionError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(SessionError::InvalidTransition {
            stage: from,
            action: action.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::{ChatMessage, Role};

    /// Replays scripted replies and records every request.
    struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<&str, &str>>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| {
                            r.map(str::to_string).map_err(|reason| LlmError::RequestFailed {
                                provider: "scripted".into(),
                                reason: reason.into(),
                            })
                        })
                        .collect(),
                ),
                requests: Mutex::new(vec![]),
            }
        }

        fn last_request(&self) -> GenerationRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            _model: &str,
            request: GenerationRequest,
        ) -> Result<String, LlmError> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }

        async fn list_models(&self) -> Result<Vec<String>, LlmError> {
            Ok(vec!["scripted".into()])
        }
    }

    fn backend(llm: &ScriptedLlm) -> Option<Backend<'_>> {
        Some(Backend { llm, model: "scripted" })
    }

    fn call() -> SessionEvent {
        SessionEvent::CallCustomer {
            campaign: Campaign::PortIn,
            mood: Mood::Random,
        }
    }

    fn say(text: &str) -> SessionEvent {
        SessionEvent::Respond { text: text.into() }
    }

    const PROFILE: &str = "名前：山田太郎\n年代：30代\n性格：せっかち\n来店目的：料金支払い";

    async fn conversing(machine: &SessionMachine, llm: &ScriptedLlm) -> Session {
        let s = machine.apply(&Session::new(), call(), backend(llm)).await.unwrap();
        machine.apply(&s, SessionEvent::StartServing, backend(llm)).await.unwrap()
    }

    #[tokio::test]
    async fn full_flow_advances_stages() {
        let llm = ScriptedLlm::new(vec![
            Ok(PROFILE),
            Ok("支払いに来たんだけど"),
            Ok("助かります<emo>happy</emo>"),
        ]);
        let machine = SessionMachine::default();

        let s1 = machine.apply(&Session::new(), call(), backend(&llm)).await.unwrap();
        assert_eq!(s1.stage, Stage::ProfileReady);
        assert_eq!(s1.profile.name(), "山田太郎");
        assert_eq!(s1.campaign, Some(Campaign::PortIn));
        assert!(s1.avatar.is_some());
        assert!(s1.messages.is_empty());
        assert!(s1.is_consistent());

        let s2 = machine.apply(&s1, SessionEvent::StartServing, backend(&llm)).await.unwrap();
        assert_eq!(s2.stage, Stage::Conversing);
        assert_eq!(s2.messages.len(), 1);
        assert_eq!(s2.messages[0].speaker, crate::session::Speaker::Customer);
        assert_eq!(s2.messages[0].text, "支払いに来たんだけど");
        assert!(llm.last_request().prompt.contains("'名前': '山田太郎'"));
        assert!(llm.last_request().prompt.contains("料金支払い"));

        let s3 = machine
            .apply(&s2, say("お支払いですね、承ります"), backend(&llm))
            .await
            .unwrap();
        assert_eq!(s3.stage, Stage::Conversing);
        assert_eq!(s3.emotion, Emotion::Happy);
        assert_eq!(s3.messages.len(), 3);
        assert_eq!(s3.messages[1].text, "お支払いですね、承ります");
        assert_eq!(s3.messages[2].text, "助かります");
        assert!(s3.is_consistent());
    }

    #[tokio::test]
    async fn turn_sends_prior_history_and_prompt() {
        let llm = ScriptedLlm::new(vec![
            Ok(PROFILE),
            Ok("opening"),
            Ok("r1<emo>neutral</emo>"),
            Ok("r2"),
        ]);
        let machine = SessionMachine::default();
        let s = conversing(&machine, &llm).await;

        let s = machine.apply(&s, say("first"), backend(&llm)).await.unwrap();
        let first = llm.last_request();
        assert_eq!(first.history, vec![ChatMessage::model("opening")]);
        assert!(first.prompt.contains("直前の店員の言葉：first"));
        assert!(first.prompt.contains("目標：MNP成約"));

        machine.apply(&s, say("second"), backend(&llm)).await.unwrap();
        let second = llm.last_request();
        let roles: Vec<Role> = second.history.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Model, Role::User, Role::Model]);
        assert_eq!(second.history[1].content, "first");
        assert_eq!(second.history[2].content, "r1");
    }

    #[tokio::test]
    async fn angry_marker_sets_emotion() {
        let llm = ScriptedLlm::new(vec![
            Ok(PROFILE),
            Ok("hi"),
            Ok("先に支払いさせて<emo>angry</emo>"),
        ]);
        let machine = SessionMachine::default();
        let s = conversing(&machine, &llm).await;
        let s = machine.apply(&s, say("光回線いかがですか"), backend(&llm)).await.unwrap();
        assert_eq!(s.emotion, Emotion::Angry);
        assert_eq!(s.messages.last().unwrap().text, "先に支払いさせて");
    }

    #[tokio::test]
    async fn failed_call_reports_service_error() {
        let llm = ScriptedLlm::new(vec![Err("quota")]);
        let machine = SessionMachine::default();
        let err = machine.apply(&Session::new(), call(), backend(&llm)).await.unwrap_err();
        assert_eq!(err.kind(), "external_service");
        assert!(err.user_hint().is_some());
    }

    #[tokio::test]
    async fn failed_opening_reports_service_error() {
        let llm = ScriptedLlm::new(vec![Ok(PROFILE), Err("network")]);
        let machine = SessionMachine::default();
        let s1 = machine.apply(&Session::new(), call(), backend(&llm)).await.unwrap();
        let err = machine
            .apply(&s1, SessionEvent::StartServing, backend(&llm))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "external_service");
    }

    #[tokio::test]
    async fn retry_after_failed_turn_sends_same_history() {
        let llm = ScriptedLlm::new(vec![
            Ok(PROFILE),
            Ok("hi"),
            Ok("ふむ<emo>happy</emo>"),
            Err("timeout"),
            Ok("はい<emo>neutral</emo>"),
        ]);
        let machine = SessionMachine::default();
        let s = conversing(&machine, &llm).await;
        let s = machine.apply(&s, say("one"), backend(&llm)).await.unwrap();

        let err = machine.apply(&s, say("again"), backend(&llm)).await.unwrap_err();
        assert_eq!(err.kind(), "external_service");
        let failed = llm.last_request();

        let next = machine.apply(&s, say("again"), backend(&llm)).await.unwrap();
        assert_eq!(llm.last_request().history, failed.history);
        assert_eq!(failed.history.len(), 3);
        assert_eq!(next.messages.len(), 5);
        assert_eq!(llm.requests.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn out_of_order_events_are_rejected() {
        let llm = ScriptedLlm::new(vec![Ok(PROFILE), Ok("hi")]);
        let machine = SessionMachine::default();

        let waiting = Session::new();
        for event in [SessionEvent::StartServing, say("hello")] {
            let err = machine.apply(&waiting, event, backend(&llm)).await.unwrap_err();
            assert!(matches!(err, Error::Session(SessionError::InvalidTransition { .. })));
        }

        let ready = machine.apply(&waiting, call(), backend(&llm)).await.unwrap();
        assert!(machine.apply(&ready, call(), backend(&llm)).await.is_err());
        assert!(machine.apply(&ready, say("hello"), backend(&llm)).await.is_err());

        let talking = machine
            .apply(&ready, SessionEvent::StartServing, backend(&llm))
            .await
            .unwrap();
        assert!(machine.apply(&talking, call(), backend(&llm)).await.is_err());
        assert!(machine.apply(&talking, SessionEvent::StartServing, backend(&llm)).await.is_err());
        // No provider calls were made for rejected events.
        assert_eq!(llm.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_utterance_is_rejected() {
        let llm = ScriptedLlm::new(vec![Ok(PROFILE), Ok("hi")]);
        let machine = SessionMachine::default();
        let s = conversing(&machine, &llm).await;
        let err = machine.apply(&s, say("   "), backend(&llm)).await.unwrap_err();
        assert!(matches!(err, Error::Session(SessionError::EmptyUtterance)));
    }

    #[tokio::test]
    async fn missing_backend_is_a_configuration_error() {
        let machine = SessionMachine::default();
        let err = machine.apply(&Session::new(), call(), None).await.unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }

    #[tokio::test]
    async fn reset_from_every_stage() {
        let llm = ScriptedLlm::new(vec![Ok(PROFILE), Ok("hi"), Ok("x<emo>angry</emo>")]);
        let machine = SessionMachine::default();
        let s1 = machine.apply(&Session::new(), call(), backend(&llm)).await.unwrap();
        let s2 = machine.apply(&s1, SessionEvent::StartServing, backend(&llm)).await.unwrap();
        let s3 = machine.apply(&s2, say("y"), backend(&llm)).await.unwrap();

        for s in [Session::new(), s1, s2, s3] {
            // Reset needs no credential.
            let r = machine.apply(&s, SessionEvent::Reset, None).await.unwrap();
            assert_eq!(r.stage, Stage::Waiting);
            assert!(r.messages.is_empty());
            assert_eq!(r.emotion, Emotion::Neutral);
            assert!(r.profile.is_empty());
            assert!(r.avatar.is_none());
            assert_eq!(r, Session::new());
        }
    }
}

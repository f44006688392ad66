//! Training sessions.
//!
//! A session moves through three stages: waiting for a customer, customer
//! loaded, and conversing. Each client connection owns one [`SessionDriver`],
//! which holds the client's [`Session`] and [`Controls`] and commits state
//! only after a transition succeeds.

pub mod controls;
pub mod machine;
pub mod state;
pub mod view;

pub use controls::Controls;
pub use machine::{Backend, SessionEvent, SessionMachine};
pub use state::{Emotion, Message, Session, Speaker, Stage};
pub use view::SessionView;

use std::sync::Arc;

use secrecy::SecretString;
use tracing::debug;
use uuid::Uuid;

use crate::error::Error;
use crate::llm::Connector;
use crate::scenario::{Campaign, Mood};

/// A front-end action, before it is mapped onto the state machine.
#[derive(Debug)]
pub enum Command {
    Configure {
        api_key: Option<SecretString>,
        model: Option<String>,
    },
    SelectCampaign(Campaign),
    SelectMood(Mood),
    CallCustomer,
    StartServing,
    Say(String),
    Reset,
}

impl Command {
    /// Busy notice to show while the command waits on the model.
    pub fn busy_message(&self) -> Option<&'static str> {
        match self {
            Self::Configure { api_key: Some(_), .. } => Some("モデル一覧を取得中..."),
            Self::CallCustomer => Some("お客様来店中..."),
            Self::StartServing => Some("お客様が話し始めています..."),
            Self::Say(_) => Some("お客様が考えています..."),
            _ => None,
        }
    }
}

/// Owns one client's session and selections.
pub struct SessionDriver {
    id: Uuid,
    machine: Arc<SessionMachine>,
    connector: Arc<dyn Connector>,
    session: Session,
    controls: Controls,
}

impl SessionDriver {
    pub fn new(
        machine: Arc<SessionMachine>,
        connector: Arc<dyn Connector>,
        controls: Controls,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            machine,
            connector,
            session: Session::new(),
            controls,
        }
    }

    /// Identifies this session in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn view(&self) -> SessionView {
        SessionView::project(&self.session, &self.controls)
    }

    /// Handle one command. A failed transition leaves the session unchanged.
    pub async fn handle(&mut self, command: Command) -> Result<(), Error> {
        debug!(session = %self.id, stage = %self.session.stage, ?command, "Handling command");
        let event = match command {
            Command::Configure { api_key, model } => {
                return self
                    .controls
                    .configure(self.connector.as_ref(), api_key, model)
                    .await;
            }
            Command::SelectCampaign(campaign) => {
                self.controls.campaign = campaign;
                return Ok(());
            }
            Command::SelectMood(mood) => {
                self.controls.mood = mood;
                return Ok(());
            }
            Command::CallCustomer => SessionEvent::CallCustomer {
                campaign: self.controls.campaign,
                mood: self.controls.mood,
            },
            Command::StartServing => SessionEvent::StartServing,
            Command::Say(text) => SessionEvent::Respond { text },
            Command::Reset => SessionEvent::Reset,
        };

        let next = self
            .machine
            .apply(&self.session, event, self.controls.backend())
            .await?;
        self.session = next;
        Ok(())
    }
}

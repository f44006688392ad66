//! Session state: stage, customer, emotion, and transcript for one trainee.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::ChatMessage;
use crate::scenario::{Avatar, Campaign, CustomerProfile};

/// Where the session is in the training flow.
///
/// Progresses linearly: Waiting → ProfileReady → Conversing. Only a reset
/// goes back to Waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Waiting,
    ProfileReady,
    Conversing,
}

impl Stage {
    /// Numeric stage (0, 1, 2).
    pub fn index(&self) -> u8 {
        match self {
            Self::Waiting => 0,
            Self::ProfileReady => 1,
            Self::Conversing => 2,
        }
    }

    /// Check if a forward transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: Stage) -> bool {
        use Stage::*;
        matches!(
            (self, target),
            (Waiting, ProfileReady) | (ProfileReady, Conversing)
        )
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Waiting => "waiting",
            Self::ProfileReady => "profile_ready",
            Self::Conversing => "conversing",
        };
        write!(f, "{s}")
    }
}

/// The simulated customer's disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    #[default]
    Neutral,
    Angry,
    Happy,
}

impl Emotion {
    /// Badge shown next to the avatar.
    pub fn badge(&self) -> &'static str {
        match self {
            Self::Neutral => "😐 普通",
            Self::Angry => "💢 不機嫌",
            Self::Happy => "🥰 満足",
        }
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Neutral => "neutral",
            Self::Angry => "angry",
            Self::Happy => "happy",
        };
        write!(f, "{s}")
    }
}

/// Who said a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Customer,
    Representative,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Representative => "representative",
        }
    }

    /// Transcript label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Customer => "お客様",
            Self::Representative => "あなた",
        }
    }
}

/// One line of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub speaker: Speaker,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

impl Message {
    pub fn customer(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Customer,
            text: text.into(),
            sent_at: Utc::now(),
        }
    }

    pub fn representative(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Representative,
            text: text.into(),
            sent_at: Utc::now(),
        }
    }

    /// The same turn as seen by the model: the representative is the user.
    pub fn to_chat(&self) -> ChatMessage {
        match self.speaker {
            Speaker::Representative => ChatMessage::user(self.text.clone()),
            Speaker::Customer => ChatMessage::model(self.text.clone()),
        }
    }
}

/// All state for one training session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub stage: Stage,
    /// Campaign the current customer was generated for.
    pub campaign: Option<Campaign>,
    pub profile: CustomerProfile,
    pub emotion: Emotion,
    pub messages: Vec<Message>,
    pub avatar: Option<Avatar>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Conversation history in model roles, oldest first.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.messages.iter().map(Message::to_chat).collect()
    }

    /// Whether the session satisfies its stage invariants.
    pub fn is_consistent(&self) -> bool {
        match self.stage {
            Stage::Waiting => self.messages.is_empty() && self.campaign.is_none(),
            Stage::ProfileReady => self.messages.is_empty() && self.campaign.is_some(),
            Stage::Conversing => self.campaign.is_some(),
        }
    }
}

//! Read-only projection of a session for front ends.

use serde::Serialize;

use crate::scenario::profile::{fields, placeholders};
use crate::scenario::{Campaign, CustomerProfile, Mood};

use super::controls::Controls;
use super::state::{Emotion, Session, Stage};

/// Banner naming the active campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissionBar {
    pub text: String,
    pub color: String,
}

impl MissionBar {
    pub fn for_campaign(campaign: Campaign) -> Self {
        let mut text = format!("{} MISSION: {} 成約を目指せ！", campaign.icon(), campaign.label());
        if !campaign.goal().is_empty() {
            text.push_str(&format!(" ({})", campaign.goal()));
        }
        Self {
            text,
            color: campaign.color().to_string(),
        }
    }
}

/// Customer header line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerHeader {
    pub name: String,
    pub age: String,
    pub gender: String,
    pub visit_reason: String,
}

/// One of the four summary cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfoCard {
    pub title: String,
    pub lines: Vec<String>,
    /// Set when the card matches the campaign focus.
    pub highlight: bool,
}

/// A rendered transcript line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptLine {
    pub speaker: String,
    pub label: String,
    pub text: String,
}

/// Everything a front end needs to draw the customer panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerPanel {
    pub header: CustomerHeader,
    pub cards: Vec<InfoCard>,
    pub personality: String,
    pub avatar_url: Option<String>,
    pub emotion: Emotion,
    pub emotion_badge: String,
}

/// Actions the trainee may take right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllowedActions {
    pub call_customer: bool,
    pub start_serving: bool,
    pub say: bool,
    pub reset: bool,
}

/// Full projection of one client's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub stage: Stage,
    pub stage_index: u8,
    pub configured: bool,
    pub model: Option<String>,
    pub campaign: Campaign,
    pub mood: Mood,
    pub mission: MissionBar,
    /// Title shown while waiting for a customer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerPanel>,
    pub transcript: Vec<TranscriptLine>,
    pub actions: AllowedActions,
}

impl SessionView {
    /// Project `session` and `controls` into a view. Pure; no side effects.
    pub fn project(session: &Session, controls: &Controls) -> Self {
        // A loaded customer keeps the campaign it was generated for.
        let campaign = session.campaign.unwrap_or(controls.campaign);
        let configured = controls.backend().is_some();

        let customer = (session.stage != Stage::Waiting).then(|| customer_panel(session, campaign));
        let title = (session.stage == Stage::Waiting).then(|| "🧬 NEXUS TRAINING".to_string());

        let transcript = session
            .messages
            .iter()
            .map(|m| TranscriptLine {
                speaker: m.speaker.as_str().to_string(),
                label: m.speaker.label().to_string(),
                text: m.text.clone(),
            })
            .collect();

        Self {
            stage: session.stage,
            stage_index: session.stage.index(),
            configured,
            model: controls.model().map(str::to_string),
            campaign,
            mood: controls.mood,
            mission: MissionBar::for_campaign(campaign),
            title,
            customer,
            transcript,
            actions: AllowedActions {
                call_customer: configured && session.stage == Stage::Waiting,
                start_serving: configured && session.stage == Stage::ProfileReady,
                say: configured && session.stage == Stage::Conversing,
                reset: true,
            },
        }
    }

    /// Plain-text rendering for terminals.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}\n", self.mission.text));
        out.push_str(&format!(
            "モデル: {}  お客様タイプ: {}\n",
            self.model.as_deref().unwrap_or("-"),
            self.mood.label()
        ));

        if let Some(title) = &self.title {
            out.push_str(&format!("\n{title}\n"));
        }

        if let Some(panel) = &self.customer {
            let h = &panel.header;
            out.push_str(&format!("\n👤 {} ({} {})\n", h.name, h.age, h.gender));
            out.push_str(&format!("🚩 来店目的：{}\n", h.visit_reason));
            for card in &panel.cards {
                let marker = if card.highlight { " ★" } else { "" };
                out.push_str(&format!("  [{}{}] {}\n", card.title, marker, card.lines.join(" / ")));
            }
            out.push_str(&format!("性格: {}\n", panel.personality));
            out.push_str(&format!("感情: {}\n", panel.emotion_badge));
            if let Some(url) = &panel.avatar_url {
                out.push_str(&format!("🖼  {url}\n"));
            }
        }

        if !self.transcript.is_empty() {
            out.push('\n');
            for line in &self.transcript {
                out.push_str(&format!("{}: {}\n", line.label, line.text.trim_end()));
            }
        }
        out
    }
}

fn customer_panel(session: &Session, campaign: Campaign) -> CustomerPanel {
    let p = &session.profile;
    CustomerPanel {
        header: CustomerHeader {
            name: p.name().to_string(),
            age: p.get_or(fields::AGE, placeholders::BLANK).to_string(),
            gender: p.get_or(fields::GENDER, placeholders::BLANK).to_string(),
            visit_reason: p.visit_reason().to_string(),
        },
        cards: info_cards(p, campaign),
        personality: p.personality().to_string(),
        avatar_url: session.avatar.as_ref().map(|a| a.url.clone()),
        emotion: session.emotion,
        emotion_badge: session.emotion.badge().to_string(),
    }
}

fn info_cards(p: &CustomerProfile, campaign: Campaign) -> Vec<InfoCard> {
    let dash = |key: &str| p.get_or(key, placeholders::DASH).to_string();
    vec![
        InfoCard {
            title: "📱 端末/プラン".to_string(),
            lines: vec![dash(fields::DEVICE), dash(fields::PLAN)],
            highlight: false,
        },
        InfoCard {
            title: "💳 dカード".to_string(),
            lines: vec![dash(fields::CARD_RANK), dash(fields::CARD_SPEND)],
            highlight: false,
        },
        InfoCard {
            title: "🏠 ネット/TV".to_string(),
            lines: vec![
                dash(fields::WIFI),
                format!("TV:{} TEL:{}", dash(fields::TV), dash(fields::PHONE_LINE)),
            ],
            highlight: false,
        },
        InfoCard {
            title: "⚡ 電気・ガス".to_string(),
            lines: vec![dash(fields::UTILITIES)],
            highlight: campaign == Campaign::Utilities,
        },
    ]
}

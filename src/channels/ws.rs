//! WebSocket server + REST endpoints for training sessions.
//!
//! Every connection owns its own [`SessionDriver`]. Messages from one client
//! are handled in order, so at most one model call per session is in flight.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::llm::{Connector, LlmProvider, ModelListing, list_available_models};
use crate::scenario::{Campaign, Mood};
use crate::session::{Command, Controls, SessionDriver, SessionMachine, SessionView};

// ── JSON Protocol ───────────────────────────────────────────────────────

/// Message from client → server.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Configure {
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    SelectCampaign {
        campaign: String,
    },
    SelectMood {
        mood: String,
    },
    CallCustomer,
    StartServing,
    Say {
        text: String,
    },
    Reset,
}

/// Message from server → client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    Models {
        models: Vec<String>,
        fetched: bool,
    },
    State {
        view: SessionView,
    },
    Busy {
        message: String,
    },
    Error {
        kind: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        hint: Option<String>,
    },
}

impl ServerMessage {
    fn models(listing: &ModelListing) -> Self {
        Self::Models {
            models: listing.models.clone(),
            fetched: listing.fetched,
        }
    }

    fn from_error(e: &Error) -> Self {
        Self::Error {
            kind: e.kind().to_string(),
            message: e.to_string(),
            hint: e.user_hint().map(str::to_string),
        }
    }

    fn invalid_request(message: impl Into<String>) -> Self {
        Self::Error {
            kind: "invalid_request".to_string(),
            message: message.into(),
            hint: None,
        }
    }
}

impl ClientMessage {
    /// Map onto a session command. Unknown selector values are rejected here.
    fn into_command(self) -> Result<Command, String> {
        Ok(match self {
            Self::Configure { api_key, model } => Command::Configure {
                api_key: api_key
                    .filter(|k| !k.trim().is_empty())
                    .map(SecretString::from),
                model: model.filter(|m| !m.trim().is_empty()),
            },
            Self::SelectCampaign { campaign } => Command::SelectCampaign(
                Campaign::parse(&campaign).ok_or_else(|| format!("Unknown campaign: {campaign}"))?,
            ),
            Self::SelectMood { mood } => Command::SelectMood(
                Mood::parse(&mood).ok_or_else(|| format!("Unknown mood: {mood}"))?,
            ),
            Self::CallCustomer => Command::CallCustomer,
            Self::StartServing => Command::StartServing,
            Self::Say { text } => Command::Say(text),
            Self::Reset => Command::Reset,
        })
    }
}

// ── Shared State ────────────────────────────────────────────────────────

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub machine: Arc<SessionMachine>,
    /// Builds providers from client-supplied credentials.
    pub connector: Arc<dyn Connector>,
    /// Provider bound to the server credential, if one is configured.
    pub server_provider: Option<Arc<dyn LlmProvider>>,
    pub preferred_model: Option<String>,
}

impl AppState {
    /// Fresh controls for a new client, pre-bound to the server credential.
    pub async fn new_controls(&self) -> Controls {
        let mut controls = Controls::new(self.preferred_model.clone());
        if let Some(provider) = &self.server_provider {
            controls.attach(Arc::clone(provider)).await;
        }
        controls
    }
}

/// Build the Axum router with the session WebSocket and REST routes.
pub fn session_routes(state: AppState) -> Router {
    Router::new()
        .route("/ws/session", get(ws_handler))
        .route("/health", get(health))
        .route("/api/campaigns", get(list_campaigns))
        .route("/api/moods", get(list_moods))
        .route("/api/models", get(list_models))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── REST ────────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "nexus-trainer"
    }))
}

async fn list_campaigns() -> impl IntoResponse {
    let campaigns: Vec<_> = Campaign::ALL
        .iter()
        .map(|c| {
            serde_json::json!({
                "id": c.id(),
                "number": c.number(),
                "label": c.label(),
                "icon": c.icon(),
                "color": c.color(),
                "goal": c.goal(),
            })
        })
        .collect();
    Json(campaigns)
}

async fn list_moods() -> impl IntoResponse {
    let moods: Vec<_> = Mood::ALL
        .iter()
        .map(|m| {
            serde_json::json!({
                "id": m.id(),
                "number": m.number(),
                "label": m.label(),
            })
        })
        .collect();
    Json(moods)
}

async fn list_models(State(state): State<AppState>) -> impl IntoResponse {
    Json(list_available_models(state.server_provider.as_deref()).await)
}

// ── WebSocket ───────────────────────────────────────────────────────────

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("Session client connecting");
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let controls = state.new_controls().await;
    let mut driver = SessionDriver::new(
        Arc::clone(&state.machine),
        Arc::clone(&state.connector),
        controls,
    );
    info!(
        session = %driver.id(),
        configured = driver.controls().has_credential(),
        "Session client connected"
    );

    let greeting = [
        ServerMessage::models(driver.controls().listing()),
        ServerMessage::State { view: driver.view() },
    ];
    for msg in &greeting {
        if send(&mut socket, msg).await.is_err() {
            warn!("Failed to send initial state, client disconnected");
            return;
        }
    }

    loop {
        match socket.recv().await {
            Some(Ok(Message::Text(text))) => {
                if handle_client_message(&mut socket, &mut driver, &text).await.is_err() {
                    debug!("Client disconnected during send");
                    break;
                }
            }
            Some(Ok(Message::Ping(data))) => {
                if socket.send(Message::Pong(data)).await.is_err() {
                    break;
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                info!("Session client disconnected");
                break;
            }
            Some(Err(e)) => {
                warn!(error = %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    info!(session = %driver.id(), stage = %driver.session().stage, "Session connection closed");
}

/// Handle one client frame. Errors only when the socket is gone.
async fn handle_client_message(
    socket: &mut WebSocket,
    driver: &mut SessionDriver,
    text: &str,
) -> Result<(), axum::Error> {
    let command = match serde_json::from_str::<ClientMessage>(text)
        .map_err(|e| format!("Unrecognized message: {e}"))
        .and_then(ClientMessage::into_command)
    {
        Ok(command) => command,
        Err(message) => {
            debug!(error = %message, "Rejected client message");
            return send(socket, &ServerMessage::invalid_request(message)).await;
        }
    };

    let refreshes_models = matches!(command, Command::Configure { api_key: Some(_), .. });
    if let Some(busy) = command.busy_message() {
        send(
            socket,
            &ServerMessage::Busy {
                message: busy.to_string(),
            },
        )
        .await?;
    }

    match driver.handle(command).await {
        Ok(()) => {
            if refreshes_models {
                send(socket, &ServerMessage::models(driver.controls().listing())).await?;
            }
        }
        Err(e) => {
            warn!(session = %driver.id(), kind = e.kind(), error = %e, "Command failed");
            send(socket, &ServerMessage::from_error(&e)).await?;
        }
    }
    send(socket, &ServerMessage::State { view: driver.view() }).await
}

async fn send(socket: &mut WebSocket, msg: &ServerMessage) -> Result<(), axum::Error> {
    match serde_json::to_string(msg) {
        Ok(json) => socket.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!(error = %e, "Failed to serialize server message");
            Ok(())
        }
    }
}

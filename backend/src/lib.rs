use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use missions_core::{
    agent_sheet, end_round, register, resolve_login, start_round, toggle_mission, view_round,
    AgentView, Catalog, Codename, Identity, MissionStatus, RoundOptions, RoundView,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub mod config;
pub mod error;
pub mod pages;
pub mod store;

pub use error::AppError;
use store::{RoundStore, StoreError};

/// What a round is played with: the catalog, who the admin is and how many
/// codenames to deal.
#[derive(Debug, Clone)]
pub struct GameSettings {
    pub catalog: Catalog,
    pub admin_agent: String,
    pub roster_size: Option<usize>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            catalog: Catalog::builtin(),
            admin_agent: config::DEFAULT_ADMIN_AGENT.to_string(),
            roster_size: None,
        }
    }
}

#[derive(Clone, Default)]
pub struct AppState {
    store: Arc<RoundStore>,
    settings: Arc<GameSettings>,
}

impl AppState {
    pub fn new(settings: GameSettings) -> Self {
        Self {
            store: Arc::new(RoundStore::default()),
            settings: Arc::new(settings),
        }
    }

    pub async fn with_persistence(
        settings: GameSettings,
        path: impl Into<PathBuf>,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            store: Arc::new(RoundStore::open(path).await?),
            settings: Arc::new(settings),
        })
    }

    pub fn store(&self) -> &RoundStore {
        &self.store
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn is_admin(&self, input: &str) -> bool {
        missions_core::is_admin(&self.settings.admin_agent, input)
    }

    pub async fn start(&self, seed: Option<u64>) -> Result<StartResponse, AppError> {
        let mut rng = seed
            .map(ChaCha8Rng::seed_from_u64)
            .unwrap_or_else(ChaCha8Rng::from_entropy);
        let round_id = Uuid::new_v4().to_string();
        let options = RoundOptions {
            id: round_id.clone(),
            started_at: now_millis(),
            roster_size: self.settings.roster_size,
        };

        let roster = self
            .store
            .update(|round| start_round(round, &self.settings.catalog, options, &mut rng))
            .await?;
        info!(round_id = %round_id, roster = roster.len(), seeded = seed.is_some(), "round started");

        Ok(StartResponse { round_id, roster })
    }

    pub async fn end(&self) -> Result<(), AppError> {
        self.store
            .update(|round| {
                end_round(round);
                Ok(())
            })
            .await?;
        info!("round ended");
        Ok(())
    }

    pub async fn register(&self, name: &str) -> Result<Codename, AppError> {
        let mut rng = ChaCha8Rng::from_entropy();
        let agent = self
            .store
            .update(|round| register(round, name, now_millis(), &mut rng))
            .await?;
        info!(player = %name.trim(), agent = %agent, "player registered");
        Ok(agent)
    }

    pub async fn login(&self, input: &str) -> Result<Identity, AppError> {
        let identity = self
            .store
            .read(|round| resolve_login(round, &self.settings.admin_agent, input))
            .await?;
        Ok(identity)
    }

    pub async fn toggle(&self, agent: &str, index: usize) -> Result<MissionStatus, AppError> {
        let status = self
            .store
            .update(|round| toggle_mission(round, agent, index))
            .await?;
        debug!(agent = %agent, index, status = status.as_str(), "mission toggled");
        Ok(status)
    }

    pub async fn sheet(&self, agent: &str) -> Result<AgentView, AppError> {
        Ok(self.store.read(|round| agent_sheet(round, agent)).await?)
    }

    pub async fn view(&self) -> RoundView {
        self.store.read(view_round).await
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/api/round", get(get_round))
        .route("/api/round/start", post(start_handler))
        .route("/api/round/end", post(end_handler))
        .route("/api/register", post(register_handler))
        .route("/api/login", post(login_handler))
        .route("/api/agents/:agent", get(sheet_handler))
        .route("/api/agents/:agent/missions/:index/toggle", post(toggle_handler))
        .merge(pages::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

const ADMIN_HEADER: &str = "x-admin-agent";

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let provided = headers
        .get(ADMIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if state.is_admin(provided) {
        Ok(())
    } else {
        warn!("rejected admin request");
        Err(AppError::Unauthorized)
    }
}

#[derive(Deserialize)]
struct StartParams {
    seed: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub round_id: String,
    pub roster: Vec<Codename>,
}

#[derive(Deserialize)]
struct RegisterRequest {
    name: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    agent: Codename,
}

#[derive(Deserialize)]
struct LoginRequest {
    agent: String,
}

#[derive(Serialize)]
struct ToggleResponse {
    index: usize,
    status: MissionStatus,
}

async fn get_round(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RoundView>, AppError> {
    require_admin(&state, &headers)?;
    Ok(Json(state.view().await))
}

async fn start_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<StartParams>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&state, &headers)?;
    let started = state.start(params.seed).await?;
    Ok((StatusCode::CREATED, Json(started)))
}

async fn end_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    require_admin(&state, &headers)?;
    state.end().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn register_handler(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, AppError> {
    let agent = state.register(&payload.name).await?;
    Ok(Json(RegisterResponse { agent }))
}

async fn login_handler(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Identity>, AppError> {
    Ok(Json(state.login(&payload.agent).await?))
}

async fn sheet_handler(
    State(state): State<AppState>,
    Path(agent): Path<String>,
) -> Result<Json<AgentView>, AppError> {
    Ok(Json(state.sheet(&agent).await?))
}

async fn toggle_handler(
    State(state): State<AppState>,
    Path((agent, index)): Path<(String, usize)>,
) -> Result<Json<ToggleResponse>, AppError> {
    let status = state.toggle(&agent, index).await?;
    Ok(Json(ToggleResponse { index, status }))
}

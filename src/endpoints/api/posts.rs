use axum::{extract::State, Json};
use hyper::StatusCode;
use serde::Deserialize;
use tower_sessions::{session::Id, Session};
use tracing::{error, info, warn};

use crate::{
    errors::{internal_error, GenerationError},
    generation::{GenerationRequest, SourceImage},
    prompt::{build_prompt, JobDetails, PromptSource},
    response::PostResponse,
    InFlight, SharedState
};

/// Session key marking that this session has submitted something.
pub const SUBMITTED_KEY: &str = "submitted";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    #[default]
    Form,
    Prompt
}

/// What the form sends. Images arrive as data URLs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PostSubmission {
    pub mode: InputMode,
    pub details: JobDetails,
    pub prompt: String,
    pub logo: Option<String>,
    pub reference_image: Option<String>
}

impl PostSubmission {
    pub fn prompt_text(&self) -> String {
        match self.mode {
            InputMode::Form => build_prompt(PromptSource::Structured(&self.details)),
            InputMode::Prompt => build_prompt(PromptSource::FreeText(&self.prompt)),
        }
    }

    pub fn to_request(&self) -> Result<GenerationRequest, GenerationError> {
        Ok(GenerationRequest {
            prompt: self.prompt_text(),
            reference_image: decode_image(self.reference_image.as_deref())?,
            logo: decode_image(self.logo.as_deref())?,
            aspect_ratio: self.details.aspect_ratio
        })
    }
}

fn decode_image(data_url: Option<&str>) -> Result<Option<SourceImage>, GenerationError> {
    data_url
        .filter(|data_url| !data_url.is_empty())
        .map(SourceImage::from_data_url)
        .transpose()
}

pub async fn create(
    session: Session,
    State(state): State<SharedState>,
    Json(submission): Json<PostSubmission>
) -> Result<Json<PostResponse>, (StatusCode, String)> {
    let session_id = session_id(&session).await?;
    info!("[{}] Recieved POST request on /api/posts ({:?} mode)", session_id, submission.mode);

    let slot = claim(&state, session_id)?;
    let request = submission.to_request().map_err(|err| failed(session_id, err))?;

    // The session itself only carries a marker.
    let request = state.submissions().insert(session_id, request);
    session.insert(SUBMITTED_KEY, true)
        .await
        .map_err(session_error)?;

    run(&state, slot, session_id, &request).await
}

pub async fn regenerate(
    session: Session,
    State(state): State<SharedState>
) -> Result<Json<PostResponse>, (StatusCode, String)> {
    let nothing = || (StatusCode::NOT_FOUND, "Nothing to regenerate yet.".to_string());

    let Some(session_id) = session.id() else {
        info!("Recieved POST request on /api/posts/regenerate without a session");
        return Err(nothing())
    };
    info!("[{}] Recieved POST request on /api/posts/regenerate", session_id);

    let Some(request) = state.submissions().get(session_id) else {
        info!("[{}] Nothing to regenerate...", session_id);
        return Err(nothing())
    };

    let slot = claim(&state, session_id)?;
    run(&state, slot, session_id, &request).await
}

/// Start over: the next regenerate has nothing to replay.
pub async fn reset(
    session: Session,
    State(state): State<SharedState>
) -> Result<StatusCode, (StatusCode, String)> {
    if let Some(session_id) = session.id() {
        if state.submissions().remove(session_id) {
            info!("[{}] Forgot stored submission", session_id);
        }
    }

    session.remove::<bool>(SUBMITTED_KEY)
        .await
        .map_err(session_error)?;

    Ok(StatusCode::NO_CONTENT)
}

async fn run(
    state: &SharedState,
    _slot: InFlight<'_>,
    session_id: Id,
    request: &GenerationRequest
) -> Result<Json<PostResponse>, (StatusCode, String)> {
    let result = state.generator()
        .generate(request)
        .await
        .map_err(|err| failed(session_id, err))?;

    Ok(Json(PostResponse::from(result)))
}

fn failed(session_id: Id, err: GenerationError) -> (StatusCode, String) {
    error!("[{}] {}", session_id, err);
    internal_error(&err)
}

fn claim(state: &SharedState, session_id: Id) -> Result<InFlight<'_>, (StatusCode, String)> {
    state.begin_generation(session_id).ok_or_else(|| {
        warn!("[{}] Generation already in progress!", session_id);
        (StatusCode::CONFLICT, "A hiring post is already being generated.".to_string())
    })
}

async fn session_id(session: &Session) -> Result<Id, (StatusCode, String)> {
    // Loading drops the id of a cookie whose record is gone.
    session.get::<bool>(SUBMITTED_KEY)
        .await
        .map_err(session_error)?;

    if session.id().is_none() {
        session.save().await.map_err(session_error)?;
    }

    session.id().ok_or_else(|| (StatusCode::INTERNAL_SERVER_ERROR, "Session unavailable.".to_string()))
}

fn session_error(err: tower_sessions::session::Error) -> (StatusCode, String) {
    error!("Session store error: {}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, "Session unavailable.".to_string())
}

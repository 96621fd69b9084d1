//! HTTP route handlers for the UI API.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use serde::{Deserialize, Serialize};
use studio::core::artifact::Artifact;
use studio::core::files::FileTree;
use studio::core::types::{AgentOptions, ImagePayload, Target};
use studio::error::ValidationFailure;
use studio::io::persistence::Theme;
use studio::router::SubmitRequest;
use studio::session::{HistoryPosition, SaveStatus, SessionStore, SessionView};
use tracing::{debug, warn};

use crate::state::AppState;

/// Build the API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/session", get(get_session))
        .route("/requests", post(submit_request))
        .route("/input", put(put_input))
        .route("/undo", post(undo))
        .route("/redo", post(redo))
        .route("/files", get(get_files))
        .route("/files/select", post(select_file))
        .route(
            "/artifact",
            get(get_artifact).put(put_artifact).delete(close_artifact),
        )
        .route("/save", post(save))
        .route("/theme", get(get_theme).put(put_theme))
}

/// Error body returned for rejected API calls.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn internal(err: &anyhow::Error) -> Self {
        warn!(error = %format!("{err:#}"), "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
    }
}

impl From<ValidationFailure> for ApiError {
    fn from(err: ValidationFailure) -> Self {
        let status = match err {
            ValidationFailure::EmptyRequest => StatusCode::BAD_REQUEST,
            ValidationFailure::Busy => StatusCode::CONFLICT,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

async fn health() -> &'static str {
    "ok"
}

/// GET /api/session - the whole session as the UI renders it.
async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.store().snapshot())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody {
    #[serde(default)]
    text: String,
    #[serde(default)]
    target: Target,
    #[serde(default)]
    use_search: bool,
    #[serde(default)]
    use_thinking: bool,
    /// `data:` URL as produced by a browser file reader.
    #[serde(default)]
    image: Option<String>,
}

impl SubmitBody {
    fn into_request(self) -> Result<SubmitRequest, ApiError> {
        let image = match self.image.as_deref() {
            Some(url) => Some(ImagePayload::from_data_url(url).ok_or_else(|| {
                ApiError::new(StatusCode::BAD_REQUEST, "image is not a valid data URL")
            })?),
            None => None,
        };
        let options = AgentOptions {
            use_search: self.use_search,
            use_thinking: self.use_thinking,
            image,
        };
        Ok(SubmitRequest::new(self.text, self.target).with_options(options))
    }
}

#[derive(Debug, Serialize)]
struct AcceptedView {
    target: Target,
}

/// POST /api/requests - validate, then run the pipeline in the background.
///
/// Progress is reported through `/events`; the response only says whether the
/// request was accepted.
async fn submit_request(
    State(state): State<AppState>,
    Json(body): Json<SubmitBody>,
) -> Result<(StatusCode, Json<AcceptedView>), ApiError> {
    let accepted = state.router().accept(body.into_request()?)?;
    let target = accepted.request().target;
    let router = state.router().clone();
    tokio::spawn(async move {
        let outcome = router.dispatch(accepted).await;
        debug!(?outcome, "request settled");
    });
    Ok((StatusCode::ACCEPTED, Json(AcceptedView { target })))
}

#[derive(Debug, Deserialize)]
struct InputBody {
    text: String,
}

/// PUT /api/input - keep the unsent input box contents with the session.
async fn put_input(State(state): State<AppState>, Json(body): Json<InputBody>) -> StatusCode {
    state.store().set_pending_input(body.text);
    StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactView {
    artifact: Option<Artifact>,
    history: HistoryPosition,
}

impl ArtifactView {
    fn of(store: &SessionStore) -> Self {
        Self {
            artifact: store.active_artifact(),
            history: store.history_position(),
        }
    }
}

/// POST /api/undo - step back; a no-op at the oldest snapshot.
async fn undo(State(state): State<AppState>) -> Json<ArtifactView> {
    state.store().undo();
    Json(ArtifactView::of(state.store()))
}

/// POST /api/redo - step forward; a no-op at the newest snapshot.
async fn redo(State(state): State<AppState>) -> Json<ArtifactView> {
    state.store().redo();
    Json(ArtifactView::of(state.store()))
}

async fn get_files(State(state): State<AppState>) -> Json<FileTree> {
    Json(state.store().files())
}

#[derive(Debug, Deserialize)]
struct SelectBody {
    name: String,
}

/// POST /api/files/select - make a saved file the active artifact.
async fn select_file(
    State(state): State<AppState>,
    Json(body): Json<SelectBody>,
) -> Result<Json<ArtifactView>, ApiError> {
    state.store().select_file(&body.name).ok_or_else(|| {
        ApiError::new(StatusCode::NOT_FOUND, format!("no file named {}", body.name))
    })?;
    Ok(Json(ArtifactView::of(state.store())))
}

async fn get_artifact(State(state): State<AppState>) -> Json<ArtifactView> {
    Json(ArtifactView::of(state.store()))
}

#[derive(Debug, Deserialize)]
struct EditBody {
    content: String,
}

/// PUT /api/artifact - record a manual edit of the active artifact.
async fn put_artifact(
    State(state): State<AppState>,
    Json(body): Json<EditBody>,
) -> Result<Json<ArtifactView>, ApiError> {
    if !state.store().edit_artifact(&body.content) {
        return Err(ApiError::new(StatusCode::CONFLICT, "no active artifact"));
    }
    Ok(Json(ArtifactView::of(state.store())))
}

/// DELETE /api/artifact - deselect the active artifact.
async fn close_artifact(State(state): State<AppState>) -> StatusCode {
    state.store().close_artifact();
    StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize)]
struct SaveView {
    status: SaveStatus,
}

/// POST /api/save - write the file tree now instead of waiting for autosave.
async fn save(State(state): State<AppState>) -> Result<Json<SaveView>, ApiError> {
    state.studio.save().map_err(|err| ApiError::internal(&err))?;
    Ok(Json(SaveView {
        status: state.store().save_status(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
struct ThemeView {
    theme: Theme,
}

async fn get_theme(State(state): State<AppState>) -> Json<ThemeView> {
    Json(ThemeView {
        theme: state.studio.theme(),
    })
}

async fn put_theme(
    State(state): State<AppState>,
    Json(body): Json<ThemeView>,
) -> Result<Json<ThemeView>, ApiError> {
    state
        .studio
        .set_theme(body.theme)
        .map_err(|err| ApiError::internal(&err))?;
    Ok(Json(body))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use studio::app::Studio;
    use studio::core::types::AgentRole;
    use studio::io::config::StudioConfig;
    use studio::session::SessionEvent;
    use studio::test_support::{Reply, ScriptedService};
    use tempfile::TempDir;
    use tokio::sync::broadcast;

    use super::*;

    fn app(service: ScriptedService) -> (TempDir, AppState) {
        let temp = tempfile::tempdir().expect("tempdir");
        let studio = Studio::with_service(temp.path(), StudioConfig::default(), Arc::new(service))
            .expect("open studio");
        (temp, AppState::new(studio))
    }

    fn body(text: &str, target: Target) -> SubmitBody {
        SubmitBody {
            text: text.to_string(),
            target,
            use_search: false,
            use_thinking: false,
            image: None,
        }
    }

    async fn settled(rx: &mut broadcast::Receiver<SessionEvent>) {
        let wait = async {
            loop {
                if let SessionEvent::Processing { active: false } = rx.recv().await.expect("event") {
                    return;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("pipeline settled");
    }

    #[tokio::test]
    async fn blank_request_is_bad_request() {
        let (_temp, state) = app(ScriptedService::new());
        let err = submit_request(State(state.clone()), Json(body("  ", Target::Team)))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(state.store().messages().is_empty());
    }

    #[tokio::test]
    async fn invalid_image_is_rejected_before_accepting() {
        let (_temp, state) = app(ScriptedService::new());
        let mut request = body("clone this", Target::Architect);
        request.image = Some("data:image/png;base64,".to_string());
        let err = submit_request(State(state.clone()), Json(request))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(!state.store().is_processing());
    }

    #[tokio::test]
    async fn accepted_request_runs_in_background() {
        let (_temp, state) = app(ScriptedService::new().reply(AgentRole::Qa, Reply::text("ok")));
        let mut rx = state.store().subscribe();
        let (status, Json(view)) =
            submit_request(State(state.clone()), Json(body("build a todo app", Target::Team)))
                .await
                .map_err(|err| err.message)
                .expect("accepted");
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(view.target, Target::Team);

        settled(&mut rx).await;
        let Json(session) = get_session(State(state.clone())).await;
        assert!(!session.processing);
        assert_eq!(
            session.active_artifact.map(|a| a.name),
            Some("TodoList.tsx".to_string())
        );
        // The architect had no scripted reply and failed; the rest completed.
        assert_eq!(session.progress_percent, 67);
    }

    #[tokio::test]
    async fn request_during_run_conflicts() {
        let (_temp, state) = app(ScriptedService::new());
        let held = state
            .router()
            .accept(SubmitRequest::new("first", Target::Qa))
            .expect("accepted");
        let err = submit_request(State(state.clone()), Json(body("second", Target::Team)))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
        drop(held);
        assert!(!state.store().is_processing());
    }

    #[tokio::test]
    async fn selecting_and_editing_files() {
        let (_temp, state) = app(ScriptedService::new());
        let err = select_file(
            State(state.clone()),
            Json(SelectBody {
                name: "Missing.tsx".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = put_artifact(
            State(state.clone()),
            Json(EditBody {
                content: "x".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);

        let Json(selected) = select_file(
            State(state.clone()),
            Json(SelectBody {
                name: "Component.tsx".to_string(),
            }),
        )
        .await
        .map_err(|err| err.message)
        .expect("select");
        let original = selected.artifact.expect("active").content;

        let Json(edited) = put_artifact(
            State(state.clone()),
            Json(EditBody {
                content: "export default () => null;".to_string(),
            }),
        )
        .await
        .map_err(|err| err.message)
        .expect("edit");
        assert_eq!(edited.history.len, 2);
        assert!(edited.history.can_undo);

        let Json(undone) = undo(State(state.clone())).await;
        assert_eq!(undone.artifact.map(|a| a.content), Some(original));
        let Json(redone) = redo(State(state.clone())).await;
        assert_eq!(
            redone.artifact.map(|a| a.content),
            Some("export default () => null;".to_string())
        );

        assert_eq!(close_artifact(State(state.clone())).await, StatusCode::NO_CONTENT);
        let Json(closed) = get_artifact(State(state)).await;
        assert!(closed.artifact.is_none());
    }

    #[tokio::test]
    async fn save_clears_unsaved_status() {
        let (_temp, state) = app(ScriptedService::new());
        state.store().select_file("Component.tsx").expect("select");
        state.store().edit_artifact("edited");
        assert_eq!(state.store().save_status(), SaveStatus::Saving);
        let Json(view) = save(State(state.clone()))
            .await
            .map_err(|err| err.message)
            .expect("save");
        assert_eq!(view.status, SaveStatus::Saved);
    }

    #[tokio::test]
    async fn theme_round_trips_through_store() {
        let (_temp, state) = app(ScriptedService::new());
        let Json(initial) = get_theme(State(state.clone())).await;
        assert_eq!(initial.theme, Theme::Dark);
        put_theme(State(state.clone()), Json(ThemeView { theme: Theme::Light }))
            .await
            .map_err(|err| err.message)
            .expect("put theme");
        let Json(current) = get_theme(State(state)).await;
        assert_eq!(current.theme, Theme::Light);
    }

    #[tokio::test]
    async fn pending_input_is_stored() {
        let (_temp, state) = app(ScriptedService::new());
        let status = put_input(
            State(state.clone()),
            Json(InputBody {
                text: "half a thought".to_string(),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.store().pending_input(), "half a thought");
    }
}

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::Form;
use handlebars::Handlebars;
use serde::Deserialize;
use serde_json::json;
use std::path::Path as FsPath;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::{JoinError, spawn_blocking};
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::division::Division;
use crate::entry::{EntryUpdate, LineItem, Submission, non_blank, parse_form_date};
use crate::error::ReportError;
use crate::store::WorkbookStore;
use crate::week::WeekKey;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Shared state of the web application.
///
/// The store sits behind a mutex so that two requests never interleave
/// their read-modify-write cycles on the workbook file.
pub struct AppState {
    store: Mutex<WorkbookStore>,
    templates: Handlebars<'static>,
}

impl AppState {
    pub fn new(store: WorkbookStore) -> Result<Self, WebError> {
        let mut templates = Handlebars::new();
        templates.register_template_string("form", include_str!("./static/form.hbs"))?;
        templates.register_template_string("submissions", include_str!("./static/submissions.hbs"))?;
        templates.register_template_string("edit", include_str!("./static/edit.hbs"))?;

        Ok(AppState {
            store: Mutex::new(store),
            templates,
        })
    }

    fn store(&self) -> MutexGuard<'_, WorkbookStore> {
        // The store keeps no in-memory state, so a poisoned lock is safe to reuse.
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run a store operation on the blocking pool while holding the lock.
    ///
    /// Every operation loads and rewrites the whole file, which must not
    /// happen on a runtime worker.
    async fn with_store<T, F>(self: &Arc<Self>, op: F) -> Result<T, WebError>
    where
        T: Send + 'static,
        F: FnOnce(&WorkbookStore) -> Result<T, ReportError> + Send + 'static,
    {
        let state = Arc::clone(self);
        let result = spawn_blocking(move || {
            let store = state.store();
            op(&*store)
        })
        .await?;
        Ok(result?)
    }

    fn render(&self, name: &str, data: &serde_json::Value) -> Result<Html<String>, WebError> {
        Ok(Html(self.templates.render(name, data)?))
    }
}

/// Failures of a request, mapped onto HTTP responses.
#[derive(Debug, Error)]
pub enum WebError {
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("template error: {0}")]
    Template(#[from] handlebars::TemplateError),
    #[error("render error: {0}")]
    Render(#[from] handlebars::RenderError),
    #[error("store task failed: {0}")]
    Join(#[from] JoinError),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebError::Report(ReportError::EntryNotFound(_)) => {
                return (StatusCode::NOT_FOUND, "Entry not found.").into_response();
            }
            WebError::Report(ReportError::CapacityExceeded { .. }) => StatusCode::CONFLICT,
            WebError::Report(
                ReportError::UnknownDivision(_) | ReportError::InvalidSubmission(_),
            ) => StatusCode::BAD_REQUEST,
            WebError::Report(ReportError::StoreIo { .. } | ReportError::MalformedRow { .. })
            | WebError::Template(_)
            | WebError::Render(_)
            | WebError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            log::error!("request failed: {}", self);
        } else {
            log::warn!("request rejected: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}

/// Multi-line submission form. Line-item fields arrive as repeated keys.
#[derive(Debug, Deserialize)]
pub struct SubmissionForm {
    pub name: String,
    pub division: String,
    #[serde(default)]
    pub comment: String,
    #[serde(rename = "Activity[]", default)]
    pub activity: Vec<String>,
    #[serde(rename = "work_done[]", default)]
    pub work_done: Vec<String>,
    #[serde(rename = "date[]", default)]
    pub date: Vec<String>,
    #[serde(rename = "status[]", default)]
    pub status: Vec<String>,
    #[serde(rename = "recommendation[]", default)]
    pub recommendation: Vec<String>,
}

impl SubmissionForm {
    /// One line item per `work_done[]` value; every other repeated field
    /// must have the same number of values.
    pub fn into_submission(self) -> Result<Submission, ReportError> {
        let division: Division = self.division.parse()?;
        let count = self.work_done.len();

        let lengths = [
            ("Activity[]", self.activity.len()),
            ("date[]", self.date.len()),
            ("status[]", self.status.len()),
            ("recommendation[]", self.recommendation.len()),
        ];
        if let Some((field, len)) = lengths.iter().find(|(_, len)| *len != count) {
            return Err(ReportError::InvalidSubmission(format!(
                "{} has {} values but work_done[] has {}",
                field, len, count
            )));
        }

        let items = self
            .activity
            .into_iter()
            .zip(self.work_done)
            .zip(self.date)
            .zip(self.status)
            .zip(self.recommendation)
            .map(|((((activity, work_done), date), status), recommendation)| {
                Ok(LineItem {
                    activity,
                    work_done,
                    start_date: parse_form_date(&date)?,
                    status,
                    recommendation,
                })
            })
            .collect::<Result<Vec<_>, ReportError>>()?;

        Ok(Submission {
            name: self.name,
            division,
            approval: non_blank(self.comment),
            items,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct EditForm {
    #[serde(rename = "Activity")]
    pub activity: String,
    pub date: String,
    pub work_done: String,
    pub status: String,
    pub recommendation: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub last_update: Option<String>,
}

/// Browsers send textarea line breaks as `\r\n`; cells keep bare `\n`.
fn normalize_newlines(text: String) -> String {
    if text.contains('\r') {
        text.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        text
    }
}

impl EditForm {
    /// A blank `last_update` keeps the stored date.
    pub fn into_update(self) -> Result<EntryUpdate, ReportError> {
        let last_update = match self.last_update.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(parse_form_date(raw)?),
            _ => None,
        };

        Ok(EntryUpdate {
            activity: normalize_newlines(self.activity),
            start_date: parse_form_date(&self.date)?,
            work_done: normalize_newlines(self.work_done),
            status: normalize_newlines(self.status),
            recommendation: normalize_newlines(self.recommendation),
            approval: non_blank(normalize_newlines(self.comment)),
            last_update,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

pub fn router(state: Arc<AppState>, static_dir: impl AsRef<FsPath>) -> Router {
    Router::new()
        .route("/", get(serve_form).post(handle_submit))
        .route("/submissions", get(serve_submissions))
        .route("/download", get(download))
        .route("/edit/:id", get(serve_edit).post(handle_edit))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = WorkbookStore::new(&config.workbook_path);
    store.init()?;
    log::info!("using workbook {}", store.path().display());

    let state = Arc::new(AppState::new(store)?);
    let app = router(state, &config.static_dir);

    let listener = TcpListener::bind(config.bind_addr.as_str()).await?;
    log::info!("Listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_form(State(state): State<Arc<AppState>>) -> Result<Html<String>, WebError> {
    state.with_store(|store| store.init()).await?;

    let divisions: Vec<&str> = Division::ALL.iter().map(|d| d.title()).collect();
    state.render(
        "form",
        &json!({
            "divisions": divisions,
            "week": WeekKey::current().to_string(),
        }),
    )
}

async fn handle_submit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SubmissionForm>,
) -> Result<Redirect, WebError> {
    let submission = form.into_submission()?;
    let name = submission.name.clone();

    let entries = state
        .with_store(move |store| {
            store.init()?;
            store.submit(submission)
        })
        .await?;
    log::info!("stored {} line item(s) from {}", entries.len(), name);

    Ok(Redirect::to("/submissions"))
}

async fn serve_submissions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Result<Html<String>, WebError> {
    let query = params.q.clone();
    let entries = state
        .with_store(move |store| {
            store.init()?;
            store.search(&query)
        })
        .await?;

    state.render(
        "submissions",
        &json!({
            "entries": entries,
            "query": params.q.trim(),
        }),
    )
}

async fn download(State(state): State<Arc<AppState>>) -> Result<Response, WebError> {
    let exported = state
        .with_store(|store| {
            if store.exists() {
                store.export().map(Some)
            } else {
                Ok(None)
            }
        })
        .await?;
    let Some(bytes) = exported else {
        return Ok((
            StatusCode::NOT_FOUND,
            "Report file not found. Please submit some data first.",
        )
            .into_response());
    };

    let filename = format!("DRMD_Weekly_Report_{}.xlsx", WeekKey::current());
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn serve_edit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> Result<Html<String>, WebError> {
    let entry = state
        .with_store(move |store| {
            store.init()?;
            store.get(id)
        })
        .await?;

    state.render("edit", &json!({ "entry": entry }))
}

async fn handle_edit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
    Form(form): Form<EditForm>,
) -> Result<Redirect, WebError> {
    let update = form.into_update()?;
    let found = state
        .with_store(move |store| store.update(id, &update))
        .await?;
    if !found {
        return Err(ReportError::EntryNotFound(id).into());
    }

    Ok(Redirect::to("/submissions"))
}

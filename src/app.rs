#![cfg(feature = "web")]
use crate::aggregate::{ALL, Aggregates, Filter};
use crate::chart::{self, ChartStyle};
use crate::config::Config;
use crate::error::DashboardError;
use crate::gate::{Gatekeeper, Session, SessionStore};
use crate::loader::{self, DataSource};
use crate::record::{Record, RecordTable};
use anyhow::Context;
use axum::{
    Form, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use handlebars::Handlebars;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;

const SESSION_COOKIE: &str = "session";
const PAGE_TITLE: &str = "Road Traffic Injuries Dashboard";
const FOOTER: &str = "Data: reported road traffic deaths and injuries per 100k population.";
const PREVIEW_ROWS: usize = 5;

/// Shared state handed to every request
pub struct AppState {
    pub gate: Gatekeeper,
    pub sessions: SessionStore,
    pub source: DataSource,
    pub style: ChartStyle,
    client: reqwest::Client,
    templates: Handlebars<'static>,
}

impl AppState {
    pub fn new(
        gate: Gatekeeper,
        source: DataSource,
        style: ChartStyle,
    ) -> Result<Self, DashboardError> {
        let mut templates = Handlebars::new();
        templates
            .register_template_string("login", include_str!("./static/login.html"))
            .map_err(|e| DashboardError::Render(e.to_string()))?;
        templates
            .register_template_string("dashboard", include_str!("./static/dashboard.html"))
            .map_err(|e| DashboardError::Render(e.to_string()))?;

        Ok(AppState {
            gate,
            sessions: SessionStore::new(),
            source,
            style,
            client: reqwest::Client::new(),
            templates,
        })
    }

    fn render<T: Serialize>(&self, name: &str, context: &T) -> Response {
        match self.templates.render(name, context) {
            Ok(html) => Html(html).into_response(),
            Err(e) => {
                error!("template {} failed: {}", name, e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }

    fn login_page(&self, message: Option<&str>) -> Response {
        self.render("login", &serde_json::json!({ "message": message }))
    }

    fn dashboard_page(&self, status: StatusCode, page: &DashboardPage) -> Response {
        let mut response = self.render("dashboard", page);
        if response.status() == StatusCode::OK {
            *response.status_mut() = status;
        }
        response
    }

    /// The live session named by the request's cookie
    fn current_session(&self, jar: &CookieJar) -> Option<(String, Session)> {
        let id = jar.get(SESSION_COOKIE)?.value().to_string();
        let session = self.sessions.get(&id)?;
        Some((id, session))
    }

    /// Run the loader for this request
    ///
    /// Remote and file sources are read fresh on every call; upload mode uses
    /// whatever the session uploaded.
    async fn load(&self, session: &Session) -> Result<Arc<RecordTable>, DashboardError> {
        match &self.source {
            DataSource::Remote(url) => Ok(Arc::new(loader::fetch_remote(&self.client, url).await?)),
            DataSource::File(path) => Ok(Arc::new(loader::from_csv(path)?)),
            DataSource::Upload => session.dataset.clone().ok_or(DashboardError::NoUpload),
        }
    }
}

/// Login form data; the field is a masked password input
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub password: String,
}

/// Raw dropdown selections from the query string
#[derive(Debug, Default, Deserialize)]
pub struct FilterQuery {
    pub gender: Option<String>,
    pub year: Option<String>,
}

impl FilterQuery {
    fn filter(&self) -> Filter {
        Filter::from_selection(self.gender.as_deref(), self.year.as_deref())
    }
}

#[derive(Debug, Serialize)]
struct Notice {
    level: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct Choice {
    value: String,
    selected: bool,
}

fn choices(values: impl IntoIterator<Item = String>, current: Option<&str>) -> Vec<Choice> {
    std::iter::once(ALL.to_string())
        .chain(values)
        .map(|value| {
            let selected = match current {
                Some(c) => c == value,
                None => value == ALL,
            };
            Choice { value, selected }
        })
        .collect()
}

/// Handlebars context for the dashboard template
#[derive(Debug, Serialize)]
struct DashboardPage {
    title: &'static str,
    footer: &'static str,
    show_upload: bool,
    show_filters: bool,
    genders: Vec<Choice>,
    years: Vec<Choice>,
    notice: Option<Notice>,
    chart: Option<String>,
    row_count: usize,
    preview: Vec<Record>,
}

impl DashboardPage {
    fn new(source: &DataSource) -> Self {
        DashboardPage {
            title: PAGE_TITLE,
            footer: FOOTER,
            show_upload: *source == DataSource::Upload,
            show_filters: false,
            genders: Vec::new(),
            years: Vec::new(),
            notice: None,
            chart: None,
            row_count: 0,
            preview: Vec::new(),
        }
    }

    fn with_filters(mut self, table: &RecordTable, filter: &Filter) -> Self {
        let year = filter.year.as_ref().map(|y| y.to_string());
        self.show_filters = true;
        self.genders = choices(table.genders(), filter.gender.as_deref());
        self.years = choices(
            table.years().into_iter().map(|y| y.to_string()),
            year.as_deref(),
        );
        self
    }

    /// First rows of the filtered table, shown above the charts
    fn with_preview(mut self, table: &RecordTable, filter: &Filter) -> Self {
        self.preview = filter
            .apply(table)
            .into_iter()
            .take(PREVIEW_ROWS)
            .cloned()
            .collect();
        self
    }

    fn with_error(mut self, err: &DashboardError) -> Self {
        let level = if err.is_user_facing() { "warning" } else { "error" };
        self.notice = Some(Notice {
            level,
            message: err.to_string(),
        });
        self
    }
}

/// HTTP status for a failure that ends the run
fn status_for(err: &DashboardError) -> StatusCode {
    match err {
        DashboardError::Rejected => StatusCode::UNAUTHORIZED,
        DashboardError::NoUpload | DashboardError::EmptySelection => StatusCode::OK,
        DashboardError::Upload(_) => StatusCode::BAD_REQUEST,
        DashboardError::MissingColumns(_)
        | DashboardError::MalformedRow { .. }
        | DashboardError::Csv(_)
        | DashboardError::EmptyInput => StatusCode::UNPROCESSABLE_ENTITY,
        DashboardError::Fetch(_) => StatusCode::BAD_GATEWAY,
        DashboardError::Gate(_) | DashboardError::Render(_) | DashboardError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn log_failure(context: &str, err: &DashboardError) {
    if err.is_user_facing() {
        warn!("{}: {}", context, err);
    } else {
        error!("{}: {}", context, err);
    }
}

/// Build the application router
///
/// The upload route only exists when the data source is `Upload`.
pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    let mut app = Router::new()
        .route("/", get(serve_root))
        .route("/login", get(serve_login_page).post(handle_login))
        .route("/logout", post(handle_logout))
        .route("/dashboard", get(serve_dashboard))
        .route("/api/aggregates", get(get_aggregates));

    if state.source == DataSource::Upload {
        app = app.route("/upload", post(handle_upload));
    }

    app.layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Start the server and block until it stops
pub async fn run(config: Config) -> anyhow::Result<()> {
    let gate = Gatekeeper::new(&config.password).context("configuring password gate")?;
    let source = config.data_source();
    info!("data source: {:?}", source);

    let state = Arc::new(AppState::new(gate, source, config.chart_style())?);
    let app = router(state, config.max_upload_bytes);

    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!("Listening on http://{}", config.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_root(State(state): State<Arc<AppState>>, jar: CookieJar) -> Redirect {
    if state.current_session(&jar).is_some() {
        Redirect::to("/dashboard")
    } else {
        Redirect::to("/login")
    }
}

async fn serve_login_page(State(state): State<Arc<AppState>>) -> Response {
    state.login_page(None)
}

/// Check the password; nothing past the gate runs on a mismatch
async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    // Argon2 verification is CPU-bound; keep it off the async workers
    let gate_state = Arc::clone(&state);
    let checked = tokio::task::spawn_blocking(move || gate_state.gate.check(&form.password))
        .await
        .unwrap_or_else(|e| Err(DashboardError::Gate(e.to_string())));

    match checked {
        Ok(()) => {
            let session_id = state.sessions.create();
            let cookie = Cookie::build((SESSION_COOKIE, session_id))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax);
            (jar.add(cookie), Redirect::to("/dashboard")).into_response()
        }
        Err(e @ DashboardError::Rejected) => {
            let mut response = state.login_page(Some(&e.to_string()));
            *response.status_mut() = StatusCode::UNAUTHORIZED;
            response
        }
        Err(e) => {
            log_failure("login", &e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error").into_response()
        }
    }
}

async fn handle_logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(cookie.value());
    }
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Redirect::to("/login"),
    )
}

/// Loader, filter, aggregation and rendering for one page view
async fn serve_dashboard(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<FilterQuery>,
) -> Response {
    let Some((_, session)) = state.current_session(&jar) else {
        return Redirect::to("/login").into_response();
    };

    let page = DashboardPage::new(&state.source);
    let table = match state.load(&session).await {
        Ok(table) => table,
        Err(e) => {
            log_failure("loading data", &e);
            return state.dashboard_page(status_for(&e), &page.with_error(&e));
        }
    };

    let filter = query.filter();
    let page = page
        .with_filters(&table, &filter)
        .with_preview(&table, &filter);

    let aggregates = match Aggregates::compute(&table, &filter) {
        Ok(aggregates) => aggregates,
        Err(e) => {
            log_failure("aggregating", &e);
            return state.dashboard_page(status_for(&e), &page.with_error(&e));
        }
    };

    let started = Instant::now();
    match chart::render_dashboard(&aggregates, &state.style) {
        Ok(png) => {
            info!(
                "rendered {} of {} records in {:?}",
                aggregates.row_count,
                table.len(),
                started.elapsed()
            );
            let page = DashboardPage {
                chart: Some(format!("data:image/png;base64,{}", STANDARD.encode(png))),
                row_count: aggregates.row_count,
                ..page
            };
            state.dashboard_page(StatusCode::OK, &page)
        }
        Err(e) => {
            log_failure("rendering", &e);
            state.dashboard_page(status_for(&e), &page.with_error(&e))
        }
    }
}

/// Accept a CSV through the `dataset` form field and keep it in the session
async fn handle_upload(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Response {
    let Some((session_id, _)) = state.current_session(&jar) else {
        return Redirect::to("/login").into_response();
    };

    let mut file_data = Vec::new();
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("dataset") {
                    continue;
                }
                match field.bytes().await {
                    Ok(bytes) => file_data = bytes.to_vec(),
                    Err(e) => {
                        let e = DashboardError::Upload(e.body_text());
                        log_failure("upload", &e);
                        let page = DashboardPage::new(&state.source).with_error(&e);
                        return state.dashboard_page(status_for(&e), &page);
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                let e = DashboardError::Upload(e.body_text());
                log_failure("upload", &e);
                let page = DashboardPage::new(&state.source).with_error(&e);
                return state.dashboard_page(status_for(&e), &page);
            }
        }
    }

    match loader::from_upload(&file_data) {
        Ok(table) => {
            info!("session dataset replaced ({} records)", table.len());
            if state.sessions.attach_dataset(&session_id, table) {
                Redirect::to("/dashboard").into_response()
            } else {
                Redirect::to("/login").into_response()
            }
        }
        Err(e) => {
            log_failure("upload", &e);
            let page = DashboardPage::new(&state.source).with_error(&e);
            let status = match e {
                DashboardError::NoUpload => StatusCode::BAD_REQUEST,
                _ => status_for(&e),
            };
            state.dashboard_page(status, &page)
        }
    }
}

/// The four derived tables as JSON, behind the same gate as the page
async fn get_aggregates(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<FilterQuery>,
) -> Response {
    let Some((_, session)) = state.current_session(&jar) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "not signed in" })),
        )
            .into_response();
    };

    let result = match state.load(&session).await {
        Ok(table) => Aggregates::compute(&table, &query.filter()),
        Err(e) => Err(e),
    };

    match result {
        Ok(aggregates) => Json(aggregates).into_response(),
        Err(e) => {
            log_failure("aggregates api", &e);
            let status = match e {
                DashboardError::NoUpload | DashboardError::EmptySelection => StatusCode::NOT_FOUND,
                _ => status_for(&e),
            };
            (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use std::path::PathBuf;
    use tower::ServiceExt;

    const CSV: &str = "\
Gender,Year,Age_Group,Vehicle_Type,Death_Rate_per_100k,Injury_Rate_per_100k
Male,2020,18-25,Car,10,50
Female,2020,18-25,Bike,4,30
";

    const BOUNDARY: &str = "dashboard-test-boundary";

    fn app(source: DataSource) -> Router {
        let gate = Gatekeeper::new("msba").unwrap();
        let state = AppState::new(gate, source, ChartStyle::default()).unwrap();
        router(Arc::new(state), 1024 * 1024)
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn login_request(password: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("password={}", password)))
            .unwrap()
    }

    /// Sign in and return the `session=<id>` cookie pair
    async fn sign_in(app: &Router) -> String {
        let response = app.clone().oneshot(login_request("msba")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("session cookie")
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    fn get(uri: &str, cookie: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    fn upload_request(cookie: &str, contents: &str) -> Request<Body> {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"dataset\"; filename=\"data.csv\"\r\n\
             Content-Type: text/csv\r\n\r\n{contents}\r\n--{b}--\r\n",
            b = BOUNDARY,
            contents = contents
        );
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(header::COOKIE, cookie)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn wrong_password_is_rejected_without_a_session() {
        let app = app(DataSource::File(PathBuf::from("does-not-exist.csv")));
        let response = app.clone().oneshot(login_request("MSBA")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let body = body_text(response).await;
        assert!(body.contains("Incorrect password"));
        assert!(!body.contains("<img"));
        assert!(!body.contains("I/O error"));
    }

    #[tokio::test]
    async fn dashboard_redirects_to_login_without_a_session() {
        let app = app(DataSource::Upload);
        let response = app
            .oneshot(get("/dashboard", "session=forged"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn root_sends_visitors_to_the_right_place() {
        let app = app(DataSource::Upload);
        let response = app.clone().oneshot(get("/", "")).await.unwrap();
        assert_eq!(response.headers()[header::LOCATION], "/login");

        let cookie = sign_in(&app).await;
        let response = app.oneshot(get("/", &cookie)).await.unwrap();
        assert_eq!(response.headers()[header::LOCATION], "/dashboard");
    }

    #[tokio::test]
    async fn login_page_has_a_masked_field() {
        let app = app(DataSource::Upload);
        let response = app.oneshot(get("/login", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("type=\"password\""));
        assert!(!body.contains("Incorrect password"));
    }

    #[tokio::test]
    async fn upload_mode_prompts_for_a_file() {
        let app = app(DataSource::Upload);
        let cookie = sign_in(&app).await;

        let response = app.oneshot(get("/dashboard", &cookie)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Please upload a CSV file"));
        assert!(body.contains("name=\"dataset\""));
        assert!(!body.contains("<img"));
    }

    #[tokio::test]
    async fn uploaded_data_feeds_the_aggregates_api() {
        let app = app(DataSource::Upload);
        let cookie = sign_in(&app).await;

        let response = app
            .clone()
            .oneshot(upload_request(&cookie, CSV))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/dashboard");

        let response = app
            .clone()
            .oneshot(get("/api/aggregates", &cookie))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value =
            serde_json::from_str(&body_text(response).await).unwrap();

        assert_eq!(json["row_count"], 2);
        assert_eq!(json["gender"]["Male"]["death"], 10.0);
        assert_eq!(json["gender"]["Male"]["injury"], 50.0);
        assert_eq!(json["gender"]["Female"]["death"], 4.0);
        assert_eq!(json["gender"]["Female"]["injury"], 30.0);
        assert_eq!(json["yearly"]["2020"]["death"], 7.0);
        assert_eq!(json["yearly"]["2020"]["injury"], 40.0);
        assert_eq!(json["vehicles"]["entries"].as_array().unwrap().len(), 2);

        let response = app
            .oneshot(get("/api/aggregates?gender=Female&year=All", &cookie))
            .await
            .unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["row_count"], 1);
        assert_eq!(json["vehicles"]["entries"][0]["vehicle_type"], "Bike");
    }

    #[tokio::test]
    async fn uploaded_data_renders_charts_and_a_preview() {
        let app = app(DataSource::Upload);
        let cookie = sign_in(&app).await;
        let rows: String = (0..7)
            .map(|i| format!("Male,{},18-25,Van{},1,2\n", 2015 + i, i))
            .collect();
        let csv = format!("{}{}", CSV, rows);
        app.clone()
            .oneshot(upload_request(&cookie, &csv))
            .await
            .unwrap();

        let response = app.oneshot(get("/dashboard", &cookie)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("<img src=\"data:image/png;base64,iVBORw0KGgo"));
        assert!(body.contains("9 records in view"));
        assert!(body.contains("<td>Female</td>"));
        assert!(body.contains("<td>Van2</td>"));
        assert!(!body.contains("<td>Van3</td>"));
    }

    #[tokio::test]
    async fn preview_follows_the_filters() {
        let app = app(DataSource::Upload);
        let cookie = sign_in(&app).await;
        app.clone()
            .oneshot(upload_request(&cookie, CSV))
            .await
            .unwrap();

        let response = app
            .oneshot(get("/dashboard?gender=Female&year=All", &cookie))
            .await
            .unwrap();
        let body = body_text(response).await;
        assert!(body.contains("<td>Bike</td>"));
        assert!(!body.contains("<td>Car</td>"));
    }

    #[tokio::test]
    async fn unreachable_remote_source_shows_the_fetch_error() {
        let app = app(DataSource::Remote("http://127.0.0.1:1/x.csv".to_string()));
        let cookie = sign_in(&app).await;

        let response = app.oneshot(get("/dashboard", &cookie)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_text(response).await;
        assert!(body.contains("Error loading data:"));
        assert!(!body.contains("<img"));
        assert!(!body.contains("<table"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn concurrent_sign_ins_each_get_a_session() {
        let app = app(DataSource::Upload);
        let (first, second) = tokio::join!(sign_in(&app), sign_in(&app));
        assert_ne!(first, second);

        let rejected = app.oneshot(login_request("wrong")).await.unwrap();
        assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn uploads_are_private_to_their_session() {
        let app = app(DataSource::Upload);
        let first = sign_in(&app).await;
        let second = sign_in(&app).await;

        app.clone()
            .oneshot(upload_request(&first, CSV))
            .await
            .unwrap();

        let response = app
            .oneshot(get("/api/aggregates", &second))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_missing_columns_is_reported_once() {
        let app = app(DataSource::Upload);
        let cookie = sign_in(&app).await;

        let response = app
            .oneshot(upload_request(&cookie, "Gender,Year\nMale,2020\n"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_text(response).await;
        assert!(body.contains("missing column(s) Age_Group, Vehicle_Type"));
    }

    #[tokio::test]
    async fn empty_selection_shows_a_warning_instead_of_charts() {
        let app = app(DataSource::Upload);
        let cookie = sign_in(&app).await;
        app.clone()
            .oneshot(upload_request(&cookie, CSV))
            .await
            .unwrap();

        let response = app
            .oneshot(get("/dashboard?gender=Male&year=1999", &cookie))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("No records match the selected filters"));
        assert!(body.contains("<option value=\"Male\" selected>"));
        assert!(!body.contains("<img"));
    }

    #[tokio::test]
    async fn unreadable_file_source_shows_the_error() {
        let app = app(DataSource::File(PathBuf::from("/nonexistent/road.csv")));
        let cookie = sign_in(&app).await;

        let response = app.oneshot(get("/dashboard", &cookie)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_text(response).await;
        assert!(body.contains("I/O error"));
        assert!(!body.contains("name=\"dataset\""));
    }

    #[tokio::test]
    async fn upload_route_only_exists_in_upload_mode() {
        let app = app(DataSource::File(PathBuf::from("road.csv")));
        let cookie = sign_in(&app).await;
        let response = app.oneshot(upload_request(&cookie, CSV)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn api_requires_a_session() {
        let app = app(DataSource::Upload);
        let response = app.oneshot(get("/api/aggregates", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_ends_the_session() {
        let app = app(DataSource::Upload);
        let cookie = sign_in(&app).await;

        let logout = Request::builder()
            .method("POST")
            .uri("/logout")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(logout).await.unwrap();
        assert_eq!(response.headers()[header::LOCATION], "/login");

        let response = app.oneshot(get("/dashboard", &cookie)).await.unwrap();
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }
}

//! A small local web dashboard for reviewing the batch output.
//!
//! The data file is reloaded on every request, so rerunning `extract` in
//! another terminal shows up on the next page load.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path as UrlPath, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use handlebars::Handlebars;
use tokio::net::TcpListener;

use crate::prelude::*;

use self::view::{LoadedData, PageView, parse_selection};

pub mod export;
pub mod stats;
pub mod view;

/// Shared state for our handlers.
#[derive(Clone)]
pub struct DashboardState {
    /// The batch output file we display.
    data_path: Arc<PathBuf>,
    /// Our compiled page template.
    templates: Arc<Handlebars<'static>>,
}

impl DashboardState {
    /// Create state for displaying `data_path`.
    pub fn new(data_path: PathBuf) -> Result<Self> {
        let mut templates = Handlebars::new();
        templates
            .register_template_string("page", include_str!("page.hbs"))
            .context("failed to compile dashboard template")?;
        Ok(Self {
            data_path: Arc::new(data_path),
            templates: Arc::new(templates),
        })
    }

    async fn load(&self) -> LoadedData {
        LoadedData::load(&self.data_path).await
    }
}

/// Build our router.
pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/export/product/:index", get(export_product))
        .route("/export/all.json", get(export_all_json))
        .route("/export/all.csv", get(export_all_csv))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Serve the dashboard on `bind` until interrupted.
#[instrument(level = "debug", skip(data_path))]
pub async fn serve(bind: &str, data_path: PathBuf) -> Result<()> {
    let state = DashboardState::new(data_path)?;
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    let addr = listener
        .local_addr()
        .context("failed to get listening address")?;
    info!("Dashboard listening on http://{addr}/ (press Ctrl-C to stop)");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("dashboard server failed")
}

/// Wait for Ctrl-C.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down dashboard"),
        Err(err) => {
            warn!("Could not listen for Ctrl-C: {err}");
            std::future::pending::<()>().await
        }
    }
}

/// Query parameters for the main page.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// 1-based index of the selected product. Kept as a string so that junk
    /// means "nothing selected" instead of a 400.
    selected: Option<String>,
}

async fn healthz() -> &'static str {
    "ok"
}

/// The main page.
async fn index(State(state): State<DashboardState>, Query(query): Query<PageQuery>) -> Response {
    let data = state.load().await;
    let selected = parse_selection(query.selected.as_deref());
    debug!(selected, "Rendering dashboard");
    let page = PageView::build(&data, selected, &state.data_path);
    match state.templates.render("page", &page) {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            error!("Could not render dashboard: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Could not render dashboard: {err}"),
            )
                .into_response()
        }
    }
}

/// Download a single product as JSON.
async fn export_product(
    State(state): State<DashboardState>,
    UrlPath(index): UrlPath<String>,
) -> Response {
    let data = state.load().await;
    let records = match data.records_or_guidance(&state.data_path) {
        Ok(records) => records,
        Err(guidance) => return unavailable(guidance),
    };
    let found = index
        .parse::<usize>()
        .ok()
        .and_then(|n| Some((n, records.get(n.checked_sub(1)?)?)));
    let Some((n, record)) = found else {
        return (
            StatusCode::NOT_FOUND,
            format!("No product {index}; there are {} products.", records.len()),
        )
            .into_response();
    };
    attachment(
        export::record_json(record),
        "application/json",
        &format!("product_{n}.json"),
    )
}

/// Download all products as JSON.
async fn export_all_json(State(state): State<DashboardState>) -> Response {
    let data = state.load().await;
    match data.records_or_guidance(&state.data_path) {
        Ok(records) => attachment(
            export::records_json(records),
            "application/json",
            "all_products.json",
        ),
        Err(guidance) => unavailable(guidance),
    }
}

/// Download all products as CSV.
async fn export_all_csv(State(state): State<DashboardState>) -> Response {
    let data = state.load().await;
    match data.records_or_guidance(&state.data_path) {
        Ok(records) => attachment(export::records_csv(records), "text/csv", "products.csv"),
        Err(guidance) => unavailable(guidance),
    }
}

/// Serve `body` as a download named `filename`.
fn attachment(body: Result<String>, content_type: &'static str, filename: &str) -> Response {
    match body {
        Ok(body) => (
            [
                (header::CONTENT_TYPE, content_type.to_owned()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{filename}\""),
                ),
            ],
            body,
        )
            .into_response(),
        Err(err) => {
            error!("Could not export {filename}: {err:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Could not export {filename}: {err:#}"),
            )
                .into_response()
        }
    }
}

/// Explain why there is nothing to export.
fn unavailable(guidance: view::Guidance) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        format!("{}\n{}\n", guidance.message, guidance.next_step),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;
    use crate::product::{ProductRecord, tests::record, write_batch_output};

    async fn state_with(records: Option<&[ProductRecord]>) -> (tempfile::TempDir, DashboardState) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        if let Some(records) = records {
            write_batch_output(&path, records).await.unwrap();
        }
        let state = DashboardState::new(path).unwrap();
        (dir, state)
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn query(selected: Option<&str>) -> Query<PageQuery> {
        Query(PageQuery {
            selected: selected.map(str::to_owned),
        })
    }

    #[tokio::test]
    async fn index_shows_table_and_selected_detail() {
        let records = [
            record("Aussie Asparagus", "$2.50"),
            record("Fish & <Chips>", "$5.00"),
        ];
        let (_dir, state) = state_with(Some(records.as_slice())).await;

        let response = index(State(state), query(Some("2"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Aussie Asparagus"));
        assert!(html.contains("Fish &amp; &lt;Chips&gt;"));
        assert!(!html.contains("<Chips>"));
        assert!(html.contains("<option value=\"2\" selected>"));
        assert!(html.contains("/export/product/2"));
        assert!(html.contains("Total Products"));
        assert!(html.contains("$3.75"));
    }

    #[tokio::test]
    async fn index_without_data_shows_guidance() {
        let (_dir, state) = state_with(None).await;
        let response = index(State(state), query(None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("not found"));
        assert!(html.contains("leaflet-extractor extract"));
        assert!(!html.contains("<table>"));
    }

    #[tokio::test]
    async fn index_ignores_junk_selection() {
        let (_dir, state) = state_with(Some(&[record("A", "$1")][..])).await;
        let html = body_text(index(State(state), query(Some("banana"))).await).await;
        assert!(html.contains("<option value=\"0\" selected>"));
        assert!(!html.contains("Raw JSON"));
    }

    #[tokio::test]
    async fn export_product_uses_one_based_index() {
        let records = [record("A", "$1"), record("B", "$2")];
        let (_dir, state) = state_with(Some(records.as_slice())).await;

        let response = export_product(State(state.clone()), UrlPath("2".to_owned())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"product_2.json\""
        );
        let parsed: ProductRecord = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(parsed, record("B", "$2"));

        for bad in ["0", "3", "x"] {
            let response = export_product(State(state.clone()), UrlPath(bad.to_owned())).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "index {bad}");
        }
    }

    #[tokio::test]
    async fn export_all_formats() {
        let records = [record("A", "$1"), record("B", "$2")];
        let (_dir, state) = state_with(Some(records.as_slice())).await;

        let response = export_all_json(State(state.clone())).await;
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"all_products.json\""
        );
        let parsed: Vec<ProductRecord> = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(parsed, records);

        let response = export_all_csv(State(state)).await;
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"products.csv\""
        );
        let csv = body_text(response).await;
        assert!(csv.starts_with("product_name,weight_volume,price,price_per_unit,description\n"));
        assert!(csv.contains("B,,$2,,\n"));
    }

    #[tokio::test]
    async fn exports_without_data_are_unavailable() {
        let (_dir, state) = state_with(Some(&[] as &[ProductRecord])).await;
        let response = export_all_csv(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_text(response).await.contains("No products found"));

        let (_dir, state) = state_with(None).await;
        let response = export_all_json(State(state)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn healthz_answers_ok() {
        assert_eq!(healthz().await, "ok");
    }

    #[tokio::test]
    async fn data_is_reloaded_on_each_request() {
        let (dir, state) = state_with(Some(&[record("Old", "$1")][..])).await;
        write_batch_output(&dir.path().join("data.json"), &[record("New", "$2")])
            .await
            .unwrap();
        let html = body_text(index(State(state), query(None)).await).await;
        assert!(html.contains("New"));
        assert!(!html.contains("Old"));
    }
}

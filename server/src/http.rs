use crate::{
    config::ServerConfig,
    envelope::{EnvelopeError, ResultEnvelope},
    results::ResultLog,
};
use axum::{
    extract::{rejection::FormRejection, ConnectInfo, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Form, Router,
};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub results: Arc<ResultLog>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(&state.config.dataset.route, get(serve_dataset))
        .route("/dcp-results", post(receive_results))
        .route("/health", get(health))
        .with_state(state)
}

fn plain(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

/// serve the expression table verbatim, read at request time so a file
/// deleted after startup turns into a 404 instead of stale data
async fn serve_dataset(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    let path = &state.config.dataset.path;

    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            info!(client_ip = %addr.ip(), method = "GET", path = %state.config.dataset.route, "Serving dataset");

            plain(StatusCode::OK, content)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            error!(client_ip = %addr.ip(), "File not found at request time: {}", path.display());

            plain(
                StatusCode::NOT_FOUND,
                format!("File not found: {}", path.display()),
            )
        }
        Err(e) => {
            error!(client_ip = %addr.ip(), error = ?e, "Unhandled error while serving file");

            plain(
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from("Internal server error"),
            )
        }
    }
}

/// accept one worker result envelope and append its decoded content to
/// the result log
async fn receive_results(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    form: Result<Form<Vec<(String, String)>>, FormRejection>,
) -> Response {
    let Ok(Form(fields)) = form else {
        return plain(
            StatusCode::BAD_REQUEST,
            String::from("Invalid or missing payload"),
        );
    };

    let envelope = match ResultEnvelope::decode(&fields) {
        Ok(envelope) => envelope,
        Err(EnvelopeError::EmptyForm) => {
            return plain(
                StatusCode::BAD_REQUEST,
                String::from("Invalid or missing payload"),
            );
        }
        Err(e) => {
            error!(client_ip = %addr.ip(), error = %e, "Rejected result envelope");

            return plain(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    if let Err(e) = state.results.append(&envelope.content).await {
        error!(client_ip = %addr.ip(), error = ?e, "Unhandled error while processing DCP result");

        return plain(
            StatusCode::INTERNAL_SERVER_ERROR,
            String::from("Internal server error"),
        );
    }

    info!(
        client_ip = %addr.ip(),
        element = envelope.element.as_deref().unwrap_or("-"),
        "Received result"
    );

    plain(StatusCode::OK, String::from("Result received"))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let path = &state.config.dataset.path;

    Json(json!({
        "file_exists": path.is_file(),
        "file_path": path.display().to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        extract::connect_info::MockConnectInfo,
        http::Request,
    };
    use chrono::NaiveDate;
    use serde_json::Value;
    use std::{fs, path::Path};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const FORM_TYPE: &str = "application/x-www-form-urlencoded";

    fn test_state(dir: &TempDir) -> AppState {
        let dataset = dir.path().join("GSE57383_ps_psa.txt");
        fs::write(&dataset, "phenotype\t202_at\nPsoriatic Arthritis\t8.1\n").unwrap();

        let mut config = ServerConfig::default();
        config.dataset.path = dataset;
        config.results.dir = dir.path().to_path_buf();

        let started = NaiveDate::from_ymd_opt(2012, 1, 26)
            .unwrap()
            .and_hms_opt(21, 20, 32)
            .unwrap();
        let results = ResultLog::new(&config.results.dir, &config.results.prefix, started);

        AppState {
            config: Arc::new(config),
            results: Arc::new(results),
        }
    }

    fn test_router(state: AppState) -> Router {
        build_router(state).layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 41000))))
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn post_form(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/dcp-results")
            .header(header::CONTENT_TYPE, FORM_TYPE)
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn dataset_route_serves_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(test_state(&dir));

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/GSE57383_ps_psa")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(
            body_string(response).await,
            "phenotype\t202_at\nPsoriatic Arthritis\t8.1\n"
        );
    }

    #[tokio::test]
    async fn dataset_deleted_after_startup_is_a_404() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        fs::remove_file(&state.config.dataset.path).unwrap();

        let response = test_router(state)
            .oneshot(
                Request::builder()
                    .uri("/GSE57383_ps_psa")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_string(response).await.starts_with("File not found:"));
    }

    #[tokio::test]
    async fn json_envelope_appends_the_parsed_value() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let log_path = state.results.path().to_path_buf();

        let response = test_router(state)
            .oneshot(post_form(
                "elementType=results&contentType=application%2Fjson\
                 &element=2&content=%7B%22auc%22%3A0.91%7D",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "Result received");

        let line = fs::read_to_string(log_path).unwrap();
        // the parsed JSON value is logged, not the raw form string
        assert_eq!(
            serde_json::from_str::<Value>(line.trim()).unwrap(),
            json!({"auc": 0.91})
        );
    }

    #[tokio::test]
    async fn plain_text_envelope_appends_the_unquoted_string() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let log_path = state.results.path().to_path_buf();

        let response = test_router(state)
            .oneshot(post_form(
                "contentType=text%2Fplain&content=%270.857%5CtLR%5Cn%27",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            serde_json::from_str::<Value>(fs::read_to_string(log_path).unwrap().trim()).unwrap(),
            json!("0.857\tLR\n")
        );
    }

    #[tokio::test]
    async fn empty_form_is_a_400() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(test_state(&dir));

        let response = router.oneshot(post_form("")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "Invalid or missing payload");
    }

    #[tokio::test]
    async fn missing_content_field_is_a_400() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(test_state(&dir));

        let response = router.oneshot(post_form("elementType=results")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_reports_the_dataset_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let dataset = state.config.dataset.path.clone();

        let response = test_router(state)
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let health: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(health["file_exists"], json!(true));
        assert_eq!(
            Path::new(health["file_path"].as_str().unwrap()),
            dataset.as_path()
        );
    }
}

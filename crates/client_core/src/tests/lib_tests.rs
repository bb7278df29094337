use super::*;
use crate::{
    countdown::RefreshCountdown,
    submission::InputFile,
    test_support::{analysis_id, FakeApi},
};
use axum::{
    extract::{Multipart, Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Json, Router,
};
use shared::{domain::AnalysisStatus, error::ErrorCode};
use base64::Engine as _;
use std::sync::Arc;
use tokio::{net::TcpListener, sync::Mutex};

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake";

#[derive(Clone, Default)]
struct ServerState {
    seen_auth: Arc<Mutex<Vec<String>>>,
    form_fields: Arc<Mutex<Vec<(String, String)>>>,
}

async fn handle_analysis(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Some(auth) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        state.seen_auth.lock().await.push(auth.to_string());
    }
    if id == "locked" {
        return Json(serde_json::json!({
            "status": 1,
            "message": "Problem with authentication token"
        }));
    }
    Json(serde_json::json!({
        "id": id,
        "status": 2,
        "newick": "(a,(b,c));",
        "tbenormtree": "(a,(b,c)0.9);",
        "startpending": "Tue, 03 Jan 2017 10:00:00 GMT",
        "end": "Tue, 03 Jan 2017 10:05:00 GMT"
    }))
}

async fn handle_collapsed(Path((id, collapse)): Path<(String, u8)>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "id": id,
        "status": 5,
        "newick": "(a,(b,c));",
        "collapsed": format!("collapsed-at-{collapse}"),
        "message": "timed out"
    }))
}

async fn handle_image(
    Path((_id, _collapse, _layout, _algorithm, format)): Path<(String, u8, String, String, String)>,
) -> String {
    match format.as_str() {
        "png" => {
            let encoded = STANDARD.encode(PNG_BYTES);
            // The server streams base64 in chunks; line breaks must be tolerated.
            format!("{}\n{}", &encoded[..4], &encoded[4..])
        }
        _ => "<svg xmlns=\"http://www.w3.org/2000/svg\"></svg>".to_string(),
    }
}

async fn handle_stats() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "days": ["2017-01-01", "2017-01-02"],
        "distdays": [1000, 3000],
        "months": ["2017-01"],
        "distmonths": [4000],
        "years": ["2017"],
        "distyears": [4000]
    }))
}

async fn handle_run(State(state): State<ServerState>, mut multipart: Multipart) -> Redirect {
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let value = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_default();
        let text = if value.is_empty() {
            field.text().await.unwrap_or_default()
        } else {
            value
        };
        state.form_fields.lock().await.push((name, text));
    }
    Redirect::to("/view/new-analysis-42")
}

async fn spawn_booster_server() -> anyhow::Result<(String, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route("/api/analysis/:id", get(handle_analysis))
        .route("/api/analysis/:id/:collapse", get(handle_collapsed))
        .route(
            "/api/image/:id/:collapse/:layout/:algorithm/:format",
            get(handle_image),
        )
        .route("/api/stat/json", get(handle_stats))
        .route("/api/randrunname", get(|| async { "  brave-newt-17\n" }))
        .route("/api/status", get(|| async { Json(serde_json::json!({"Status": "OK"})) }))
        .route(
            "/view/:id",
            get(|| async {
                r#"<html><head><meta http-equiv="refresh" content="20"></head></html>"#
            }),
        )
        .route(
            "/broken",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable") }),
        )
        .route("/run/", post(handle_run))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

#[test]
fn base_url_keeps_path_prefix() {
    let client = BoosterClient::new("https://booster.example.org/booster/").expect("client");
    assert_eq!(
        client.url("/api/status").expect("url").as_str(),
        "https://booster.example.org/booster/api/status"
    );
    assert_eq!(
        client.itol_url(&analysis_id(), true, false).expect("url").as_str(),
        "https://booster.example.org/booster/itol/abc/true/false"
    );
}

#[test]
fn collapsed_path_carries_threshold() {
    assert_eq!(
        collapsed_analysis_path(&analysis_id(), CollapseThreshold::new(35)),
        "/api/analysis/abc/35"
    );
}

#[test]
fn generic_payload_only_matches_status_and_message() {
    let full_error_analysis = serde_json::json!({"status": 3, "message": "x", "id": "abc"});
    assert!(as_generic_failure(&full_error_analysis).is_none());
    let ok = serde_json::json!({"status": 0, "message": ""});
    assert!(as_generic_failure(&ok).is_none());
    let rejected = serde_json::json!({"status": 1, "message": "Wrong Credentials"});
    assert!(as_generic_failure(&rejected).is_some());
}

#[tokio::test]
async fn fetches_analysis_with_bearer_token() {
    let (server_url, state) = spawn_booster_server().await.expect("spawn server");
    let client = BoosterClient::from_settings(&ClientSettings {
        server_url,
        api_token: Some("tok-123".into()),
        ..ClientSettings::default()
    })
    .expect("client");

    let analysis = client.analysis(&analysis_id()).await.expect("analysis");

    assert_eq!(analysis.status(), AnalysisStatus::Finished);
    assert_eq!(analysis.newick, "(a,(b,c));");
    assert_eq!(analysis.run_time(chrono::Utc::now()), "5m0s");
    assert_eq!(*state.seen_auth.lock().await, vec!["Bearer tok-123".to_string()]);
}

#[tokio::test]
async fn rejected_token_surfaces_as_unauthorized() {
    let (server_url, _state) = spawn_booster_server().await.expect("spawn server");
    let client = BoosterClient::new(&server_url).expect("client");

    let err = client
        .analysis(&AnalysisId::parse("locked").expect("id"))
        .await
        .expect_err("must fail");

    let api_error = match err {
        ClientError::Api(api_error) => api_error,
        other => panic!("expected api error, got {other:?}"),
    };
    assert_eq!(api_error.code, ErrorCode::Unauthorized);
}

#[tokio::test]
async fn fetches_collapsed_analysis() {
    let (server_url, _state) = spawn_booster_server().await.expect("spawn server");
    let client = BoosterClient::new(&server_url).expect("client");

    let analysis = client
        .collapsed_analysis(&analysis_id(), CollapseThreshold::new(42))
        .await
        .expect("analysis");

    assert!(analysis.status().is_completed());
    assert_eq!(analysis.collapsed, "collapsed-at-42");
}

#[tokio::test]
async fn fetches_svg_and_decodes_png_images() {
    let (server_url, _state) = spawn_booster_server().await.expect("spawn server");
    let client = BoosterClient::new(&server_url).expect("client");
    let mut request = ImageRequest {
        id: analysis_id(),
        collapse: CollapseThreshold::default(),
        layout: TreeLayout::Radial,
        algorithm: SupportAlgorithm::Fbp,
        format: ImageFormat::Svg,
    };

    let svg = client.tree_image(&request).await.expect("svg");
    assert!(matches!(&svg, TreeImage::Svg(text) if text.starts_with("<svg")));

    request.format = ImageFormat::Png;
    let png = client.tree_image(&request).await.expect("png");
    assert_eq!(png, TreeImage::Png(PNG_BYTES.to_vec()));
    assert_eq!(png.format(), ImageFormat::Png);
}

#[tokio::test]
async fn fetches_stats_run_name_status_and_view_page() {
    let (server_url, _state) = spawn_booster_server().await.expect("spawn server");
    let client = BoosterClient::new(&server_url).expect("client");

    let stats = client.usage_stats().await.expect("stats");
    assert_eq!(stats.distdays, vec![1000.0, 3000.0]);

    assert_eq!(client.random_run_name().await.expect("name"), "brave-newt-17");
    assert!(client.service_status().await.expect("status").is_ok());

    let page = client.view_page(&analysis_id()).await.expect("page");
    assert_eq!(
        RefreshCountdown::from_html(&page).map(|c| c.remaining()),
        Some(20)
    );
}

#[tokio::test]
async fn non_success_status_keeps_body() {
    let (server_url, _state) = spawn_booster_server().await.expect("spawn server");
    let client = BoosterClient::new(&server_url).expect("client");

    let err = client.get_text("/broken").await.expect_err("must fail");

    let (status, body) = match err {
        ClientError::Status { status, body, .. } => (status, body),
        other => panic!("expected status error, got {other:?}"),
    };
    assert_eq!(status, reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "database unavailable");
}

#[tokio::test]
async fn submit_posts_form_and_reads_redirect() {
    let (server_url, state) = spawn_booster_server().await.expect("spawn server");
    let client = BoosterClient::new(&server_url).expect("client");

    let mut form = SubmissionForm::new();
    form.select_reference_tree(InputFile::Bytes {
        filename: "ref.nw".into(),
        content: b"(a,b,c);".to_vec(),
    });
    form.select_bootstrap_trees(InputFile::Bytes {
        filename: "boot.nw".into(),
        content: b"(a,b,c);\n(b,a,c);".to_vec(),
    });
    form.run_name = "my-run".into();
    form.set_nboot(2000);

    let id = client.submit(form).await.expect("submit");

    assert_eq!(id.as_str(), "new-analysis-42");
    let fields = state.form_fields.lock().await.clone();
    assert!(fields.contains(&("runname".to_string(), "my-run".to_string())));
    assert!(fields.contains(&("nboot".to_string(), "1000".to_string())));
    assert!(fields.contains(&("reftree".to_string(), "ref.nw".to_string())));
    assert!(fields.contains(&("boottrees".to_string(), "boot.nw".to_string())));
    assert!(!fields.iter().any(|(name, _)| name == "refalign"));
}

#[tokio::test]
async fn invalid_form_is_rejected_before_sending() {
    let (server_url, state) = spawn_booster_server().await.expect("spawn server");
    let client = BoosterClient::new(&server_url).expect("client");

    let err = client
        .submit(SubmissionForm::new())
        .await
        .expect_err("missing trees");

    assert!(matches!(err, ClientError::Invalid(_)));
    assert!(state.form_fields.lock().await.is_empty());
}

#[tokio::test]
async fn run_name_button_fills_form_and_keeps_it_on_failure() {
    let api = FakeApi {
        run_name: Some("quiet-otter-3".into()),
        ..FakeApi::default()
    };
    let mut form = SubmissionForm::new();
    assert_eq!(
        form.request_run_name(&api).await.expect("name"),
        "quiet-otter-3"
    );

    let failing = FakeApi::default();
    assert!(form.request_run_name(&failing).await.is_err());
    assert_eq!(form.run_name, "quiet-otter-3");
}

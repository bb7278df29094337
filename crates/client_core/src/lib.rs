use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header, redirect, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{AnalysisId, CollapseThreshold, ImageFormat, SupportAlgorithm, TreeLayout},
    error::{ApiError, GenericResponse},
    protocol::{Analysis, ServiceStatus, UsageStats},
};
use tracing::{info, warn};
use url::Url;

pub mod config;
pub mod countdown;
pub mod error;
pub mod histogram;
pub mod poller;
pub mod submission;
pub mod tree_view;

pub use config::{load_settings, ClientSettings};
pub use error::{ClientError, Result};
pub use poller::AnalysisPoller;
pub use submission::SubmissionForm;
pub use tree_view::TreeView;

const USER_AGENT: &str = concat!("booster-viewer/", env!("CARGO_PKG_VERSION"));

pub fn analysis_path(id: &AnalysisId) -> String {
    format!("/api/analysis/{id}")
}

pub fn collapsed_analysis_path(id: &AnalysisId, collapse: CollapseThreshold) -> String {
    format!("/api/analysis/{id}/{collapse}")
}

pub fn view_path(id: &AnalysisId) -> String {
    format!("/view/{id}")
}

/// `raw` selects the tree with raw transfer distances instead of normalized
/// supports, `fbp` the Felsenstein tree. The server answers with a redirect to
/// the uploaded iTOL tree.
pub fn itol_path(id: &AnalysisId, raw: bool, fbp: bool) -> String {
    format!("/itol/{id}/{raw}/{fbp}")
}

pub const STATS_PATH: &str = "/api/stat/json";
pub const RUN_NAME_PATH: &str = "/api/randrunname";
pub const STATUS_PATH: &str = "/api/status";
pub const RUN_PATH: &str = "/run/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub id: AnalysisId,
    pub collapse: CollapseThreshold,
    pub layout: TreeLayout,
    pub algorithm: SupportAlgorithm,
    pub format: ImageFormat,
}

impl ImageRequest {
    pub fn path(&self) -> String {
        format!(
            "/api/image/{}/{}/{}/{}/{}",
            self.id,
            self.collapse,
            self.layout.segment(),
            self.algorithm.segment(),
            self.format.segment()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeImage {
    Svg(String),
    Png(Vec<u8>),
}

impl TreeImage {
    pub fn format(&self) -> ImageFormat {
        match self {
            Self::Svg(_) => ImageFormat::Svg,
            Self::Png(_) => ImageFormat::Png,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Svg(text) => text.as_bytes(),
            Self::Png(bytes) => bytes,
        }
    }
}

#[async_trait]
pub trait BoosterApi: Send + Sync {
    async fn analysis(&self, id: &AnalysisId) -> Result<Analysis>;
    async fn collapsed_analysis(
        &self,
        id: &AnalysisId,
        collapse: CollapseThreshold,
    ) -> Result<Analysis>;
    async fn tree_image(&self, request: &ImageRequest) -> Result<TreeImage>;
    async fn usage_stats(&self) -> Result<UsageStats>;
    async fn random_run_name(&self) -> Result<String>;
    async fn service_status(&self) -> Result<ServiceStatus>;
    async fn view_page(&self, id: &AnalysisId) -> Result<String>;
    async fn submit(&self, form: SubmissionForm) -> Result<AnalysisId>;
}

pub struct BoosterClient {
    http: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl BoosterClient {
    pub fn new(server_url: &str) -> Result<Self> {
        Self::from_settings(&ClientSettings {
            server_url: server_url.to_string(),
            ..ClientSettings::default()
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.request_timeout())
            .connect_timeout(Duration::from_secs(10))
            // `/run/` answers with a redirect carrying the new analysis id.
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self {
            http,
            base_url: parse_base_url(&settings.server_url)?,
            api_token: settings.api_token.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    pub fn itol_url(&self, id: &AnalysisId, raw: bool, fbp: bool) -> Result<Url> {
        self.url(&itol_path(id, raw, fbp))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get(&self, path: &str) -> Result<Response> {
        let url = self.url(path)?;
        let response = self.authorize(self.http.get(url.clone())).send().await?;
        ensure_success(response, &url).await
    }

    async fn get_text(&self, path: &str) -> Result<String> {
        Ok(self.get(path).await?.text().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.get_text(path).await?;
        decode_payload(&body)
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let normalized = config::normalize_server_url(raw);
    // A trailing slash keeps a path prefix such as `/booster` when joining.
    Ok(Url::parse(&format!("{normalized}/"))?)
}

async fn ensure_success(response: Response, url: &Url) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status,
        url: url.to_string(),
        body: body.trim().to_string(),
    })
}

/// Decodes an expected payload. With authentication turned on the server
/// answers `{status, message}` instead, which is surfaced as an API error.
fn decode_payload<T: DeserializeOwned>(body: &str) -> Result<T> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    if let Some(generic) = as_generic_failure(&value) {
        warn!(message = %generic.message, "api returned a failure response");
        return Err(ClientError::Api(ApiError::from_generic(&generic)));
    }
    Ok(serde_json::from_value(value)?)
}

fn as_generic_failure(value: &serde_json::Value) -> Option<GenericResponse> {
    let object = value.as_object()?;
    if !object.contains_key("status")
        || object.keys().any(|key| key != "status" && key != "message")
    {
        return None;
    }
    let generic: GenericResponse = serde_json::from_value(value.clone()).ok()?;
    generic.is_failure().then_some(generic)
}

fn decode_image(format: ImageFormat, body: String) -> Result<TreeImage> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) {
        if let Some(generic) = as_generic_failure(&value) {
            warn!(message = %generic.message, "image request rejected");
            return Err(ClientError::Api(ApiError::from_generic(&generic)));
        }
    }
    match format {
        ImageFormat::Svg => Ok(TreeImage::Svg(body)),
        ImageFormat::Png => {
            let compact: String = body.split_whitespace().collect();
            Ok(TreeImage::Png(STANDARD.decode(compact)?))
        }
    }
}

#[async_trait]
impl BoosterApi for BoosterClient {
    async fn analysis(&self, id: &AnalysisId) -> Result<Analysis> {
        self.get_json(&analysis_path(id)).await
    }

    async fn collapsed_analysis(
        &self,
        id: &AnalysisId,
        collapse: CollapseThreshold,
    ) -> Result<Analysis> {
        self.get_json(&collapsed_analysis_path(id, collapse)).await
    }

    async fn tree_image(&self, request: &ImageRequest) -> Result<TreeImage> {
        let body = self.get_text(&request.path()).await?;
        decode_image(request.format, body)
    }

    async fn usage_stats(&self) -> Result<UsageStats> {
        self.get_json(STATS_PATH).await
    }

    async fn random_run_name(&self) -> Result<String> {
        Ok(self.get_text(RUN_NAME_PATH).await?.trim().to_string())
    }

    async fn service_status(&self) -> Result<ServiceStatus> {
        self.get_json(STATUS_PATH).await
    }

    async fn view_page(&self, id: &AnalysisId) -> Result<String> {
        self.get_text(&view_path(id)).await
    }

    async fn submit(&self, form: SubmissionForm) -> Result<AnalysisId> {
        let url = self.url(RUN_PATH)?;
        let multipart = form.into_multipart().await?;
        let response = self
            .authorize(self.http.post(url.clone()))
            .multipart(multipart)
            .send()
            .await?;

        let status = response.status();
        if !status.is_redirection() {
            ensure_success(response, &url).await?;
            warn!(%status, "analysis submission was not accepted");
            return Err(ClientError::MissingRedirect);
        }

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ClientError::MissingRedirect)?;
        let id = submission::analysis_id_from_location(location)?;
        info!(analysis_id = %id, "analysis submitted");
        Ok(id)
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

use std::collections::VecDeque;

use async_trait::async_trait;
use reqwest::StatusCode;
use shared::{
    domain::{AnalysisId, AnalysisStatus, CollapseThreshold},
    protocol::{Analysis, ServiceStatus, UsageStats},
};
use tokio::sync::Mutex;

use crate::{
    error::{ClientError, Result},
    BoosterApi, ImageRequest, SubmissionForm, TreeImage,
};

pub(crate) enum Scripted {
    Ok(Analysis),
    Fail(&'static str),
}

fn server_error(message: &str) -> ClientError {
    ClientError::Status {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        url: "http://fake".into(),
        body: message.to_string(),
    }
}

/// In-memory `BoosterApi` answering analysis calls from a script and
/// recording every request path.
#[derive(Default)]
pub(crate) struct FakeApi {
    pub(crate) script: Mutex<VecDeque<Scripted>>,
    pub(crate) requests: Mutex<Vec<String>>,
    pub(crate) run_name: Option<String>,
}

impl FakeApi {
    pub(crate) fn scripted(responses: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().collect()),
            ..Self::default()
        }
    }

    pub(crate) async fn paths(&self) -> Vec<String> {
        self.requests.lock().await.clone()
    }

    async fn next(&self, path: String) -> Result<Analysis> {
        self.requests.lock().await.push(path);
        match self.script.lock().await.pop_front() {
            Some(Scripted::Ok(analysis)) => Ok(analysis),
            Some(Scripted::Fail(message)) => Err(server_error(message)),
            None => Err(server_error("script exhausted")),
        }
    }
}

pub(crate) fn analysis(status: AnalysisStatus, newick: &str, collapsed: &str) -> Analysis {
    Analysis {
        id: "abc".into(),
        status: status.code(),
        newick: newick.into(),
        collapsed: collapsed.into(),
        ..Analysis::default()
    }
}

pub(crate) fn analysis_id() -> AnalysisId {
    AnalysisId::parse("abc").expect("id")
}

#[async_trait]
impl BoosterApi for FakeApi {
    async fn analysis(&self, id: &AnalysisId) -> Result<Analysis> {
        self.next(crate::analysis_path(id)).await
    }

    async fn collapsed_analysis(
        &self,
        id: &AnalysisId,
        collapse: CollapseThreshold,
    ) -> Result<Analysis> {
        self.next(crate::collapsed_analysis_path(id, collapse)).await
    }

    async fn tree_image(&self, request: &ImageRequest) -> Result<TreeImage> {
        self.requests.lock().await.push(request.path());
        Ok(TreeImage::Svg("<svg/>".into()))
    }

    async fn usage_stats(&self) -> Result<UsageStats> {
        Ok(UsageStats::default())
    }

    async fn random_run_name(&self) -> Result<String> {
        self.requests.lock().await.push(crate::RUN_NAME_PATH.into());
        self.run_name
            .clone()
            .ok_or_else(|| server_error("no run name configured"))
    }

    async fn service_status(&self) -> Result<ServiceStatus> {
        Ok(ServiceStatus {
            status: "OK".into(),
        })
    }

    async fn view_page(&self, _id: &AnalysisId) -> Result<String> {
        Ok(String::new())
    }

    async fn submit(&self, _form: SubmissionForm) -> Result<AnalysisId> {
        Err(ClientError::MissingRedirect)
    }
}

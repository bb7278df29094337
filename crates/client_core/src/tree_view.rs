use std::path::{Path, PathBuf};

use shared::{
    domain::{
        AnalysisId, AnalysisStatus, CollapseThreshold, ImageFormat, SupportAlgorithm, TreeLayout,
    },
    protocol::Analysis,
};
use tracing::{error, info};

use crate::{
    error::{ClientError, Result},
    BoosterApi, ImageRequest, TreeImage,
};

pub const TREE_FILE_NAME: &str = "bootstrap.nh";

/// View state of one analysis page: the slider, the layout and algorithm
/// selectors, the tree currently drawn and the Newick kept for download.
///
/// Every request that fails is logged and leaves the state as it was.
#[derive(Debug, Clone)]
pub struct TreeView {
    id: AnalysisId,
    collapse: CollapseThreshold,
    slider_label: String,
    layout: TreeLayout,
    algorithm: SupportAlgorithm,
    newick: String,
    displayed: Option<String>,
    status: Option<AnalysisStatus>,
}

impl TreeView {
    pub fn new(id: AnalysisId) -> Self {
        let collapse = CollapseThreshold::default();
        Self {
            id,
            collapse,
            slider_label: collapse.to_string(),
            layout: TreeLayout::default(),
            algorithm: SupportAlgorithm::default(),
            newick: String::new(),
            displayed: None,
            status: None,
        }
    }

    pub fn id(&self) -> &AnalysisId {
        &self.id
    }

    pub fn collapse(&self) -> CollapseThreshold {
        self.collapse
    }

    pub fn slider_label(&self) -> &str {
        &self.slider_label
    }

    pub fn layout(&self) -> TreeLayout {
        self.layout
    }

    pub fn algorithm(&self) -> SupportAlgorithm {
        self.algorithm
    }

    /// Newick of the full result tree, empty until a response arrived.
    pub fn newick(&self) -> &str {
        &self.newick
    }

    /// Tree currently drawn, if the analysis had a result.
    pub fn displayed_tree(&self) -> Option<&str> {
        self.displayed.as_deref()
    }

    pub fn status(&self) -> Option<AnalysisStatus> {
        self.status
    }

    /// Loads the uncollapsed result through `/api/analysis/{id}`.
    pub async fn load(&mut self, api: &dyn BoosterApi) -> Result<AnalysisStatus> {
        let analysis = match api.analysis(&self.id).await {
            Ok(analysis) => analysis,
            Err(err) => {
                error!(analysis_id = %self.id, error = %err, "failed to load analysis");
                return Err(err);
            }
        };
        let status = analysis.status();
        if status.is_completed() {
            self.displayed = Some(analysis.newick.clone());
        }
        self.newick = analysis.newick;
        self.status = Some(status);
        Ok(status)
    }

    /// Slider released: reloads the tree collapsed at `value` percent.
    pub async fn set_collapse(
        &mut self,
        api: &dyn BoosterApi,
        value: i64,
    ) -> Result<AnalysisStatus> {
        let collapse = CollapseThreshold::new(value);
        let analysis = match api.collapsed_analysis(&self.id, collapse).await {
            Ok(analysis) => analysis,
            Err(err) => {
                error!(
                    analysis_id = %self.id,
                    collapse = collapse.value(),
                    error = %err,
                    "failed to load collapsed tree"
                );
                return Err(err);
            }
        };
        self.collapse = collapse;
        self.slider_label = collapse.to_string();
        Ok(self.apply_collapsed(analysis))
    }

    fn apply_collapsed(&mut self, analysis: Analysis) -> AnalysisStatus {
        let status = analysis.status();
        if status.is_completed() {
            self.displayed = Some(analysis.collapsed);
        }
        self.newick = analysis.newick;
        self.status = Some(status);
        status
    }

    /// Slider dragged: only the label follows, no request is made.
    pub fn slide(&mut self, value: i64) -> &str {
        self.slider_label = CollapseThreshold::new(value).to_string();
        &self.slider_label
    }

    pub fn select_layout(&mut self, layout: TreeLayout) -> ImageRequest {
        self.layout = layout;
        self.image_request(ImageFormat::Svg)
    }

    pub fn select_algorithm(&mut self, algorithm: SupportAlgorithm) -> ImageRequest {
        self.algorithm = algorithm;
        self.image_request(ImageFormat::Svg)
    }

    pub fn image_request(&self, format: ImageFormat) -> ImageRequest {
        ImageRequest {
            id: self.id.clone(),
            collapse: self.collapse,
            layout: self.layout,
            algorithm: self.algorithm,
            format,
        }
    }

    /// iTOL export of the tree drawn with the selected support algorithm.
    pub fn itol_path(&self, raw: bool) -> String {
        crate::itol_path(&self.id, raw, self.algorithm == SupportAlgorithm::Fbp)
    }

    pub async fn fetch_image(
        &self,
        api: &dyn BoosterApi,
        format: ImageFormat,
    ) -> Result<TreeImage> {
        // The server only draws finished analyses.
        if let Some(status) = self.status.filter(|s| *s != AnalysisStatus::Finished) {
            return Err(ClientError::NotReady {
                id: self.id.to_string(),
                status,
            });
        }
        let request = self.image_request(format);
        api.tree_image(&request).await.map_err(|err| {
            error!(path = %request.path(), error = %err, "failed to fetch tree image");
            err
        })
    }

    /// Writes the cached Newick to `dir/bootstrap.nh`. Nothing is written while
    /// no tree has been received.
    pub async fn download_tree(&self, dir: &Path) -> Result<Option<PathBuf>> {
        if self.newick.is_empty() {
            return Ok(None);
        }
        let path = dir.join(TREE_FILE_NAME);
        tokio::fs::write(&path, self.newick.as_bytes()).await?;
        info!(path = %path.display(), bytes = self.newick.len(), "tree downloaded");
        Ok(Some(path))
    }
}

#[cfg(test)]
#[path = "tests/tree_view_tests.rs"]
mod tests;

//! Input form of a new analysis: either a sequence alignment, or a reference
//! tree together with its bootstrap trees.

use std::path::{Path, PathBuf};

use reqwest::multipart::{Form, Part};
use shared::domain::{AnalysisId, Workflow};
use tracing::{error, info};

use crate::{
    error::{ClientError, Result},
    BoosterApi,
};

/// The server silently caps larger replicate counts.
pub const MAX_BOOTSTRAP_REPLICATES: u32 = 1000;
pub const DEFAULT_BOOTSTRAP_REPLICATES: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputFile {
    Path(PathBuf),
    Bytes { filename: String, content: Vec<u8> },
}

impl InputFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn filename(&self) -> String {
        match self {
            Self::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string()),
            Self::Bytes { filename, .. } => filename.clone(),
        }
    }

    async fn into_part(self) -> Result<Part> {
        let filename = self.filename();
        let content = match self {
            Self::Path(path) => read_input(&path).await?,
            Self::Bytes { content, .. } => content,
        };
        if content.is_empty() {
            return Err(ClientError::Invalid(format!("input file '{filename}' is empty")));
        }
        Ok(Part::bytes(content).file_name(filename))
    }
}

async fn read_input(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|err| {
        ClientError::Invalid(format!("cannot read '{}': {err}", path.display()))
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionForm {
    alignment: Option<InputFile>,
    reference_tree: Option<InputFile>,
    bootstrap_trees: Option<InputFile>,
    pub run_name: String,
    pub email: String,
    pub workflow: Workflow,
    nboot: u32,
}

impl Default for SubmissionForm {
    fn default() -> Self {
        Self {
            alignment: None,
            reference_tree: None,
            bootstrap_trees: None,
            run_name: String::new(),
            email: String::new(),
            workflow: Workflow::PhymlSms,
            nboot: DEFAULT_BOOTSTRAP_REPLICATES,
        }
    }
}

impl SubmissionForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Choosing an alignment discards both tree inputs.
    pub fn select_alignment(&mut self, file: InputFile) {
        self.alignment = Some(file);
        self.reference_tree = None;
        self.bootstrap_trees = None;
    }

    /// Choosing a tree input discards the alignment.
    pub fn select_reference_tree(&mut self, file: InputFile) {
        self.reference_tree = Some(file);
        self.alignment = None;
    }

    pub fn select_bootstrap_trees(&mut self, file: InputFile) {
        self.bootstrap_trees = Some(file);
        self.alignment = None;
    }

    pub fn alignment(&self) -> Option<&InputFile> {
        self.alignment.as_ref()
    }

    pub fn reference_tree(&self) -> Option<&InputFile> {
        self.reference_tree.as_ref()
    }

    pub fn bootstrap_trees(&self) -> Option<&InputFile> {
        self.bootstrap_trees.as_ref()
    }

    /// Sets the replicate count and returns the label shown next to the slider.
    pub fn set_nboot(&mut self, value: u32) -> String {
        self.nboot = value.clamp(1, MAX_BOOTSTRAP_REPLICATES);
        self.nboot_label()
    }

    pub fn nboot(&self) -> u32 {
        self.nboot
    }

    pub fn nboot_label(&self) -> String {
        self.nboot.to_string()
    }

    /// Fills the run name with a server-generated one. On failure the current
    /// name is kept.
    pub async fn request_run_name(&mut self, api: &dyn BoosterApi) -> Result<&str> {
        match api.random_run_name().await {
            Ok(name) if !name.is_empty() => {
                self.run_name = name;
                Ok(self.run_name.as_str())
            }
            Ok(_) => Ok(self.run_name.as_str()),
            Err(err) => {
                error!(error = %err, "failed to fetch a random run name");
                Err(err)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.alignment.is_some() {
            return match self.workflow {
                Workflow::PhymlSms | Workflow::FastTree => Ok(()),
                other => Err(ClientError::Invalid(format!(
                    "workflow '{other}' cannot build trees from an alignment"
                ))),
            };
        }
        if self.reference_tree.is_none() {
            return Err(ClientError::Invalid(
                "No reference tree file given (nor sequence file)".into(),
            ));
        }
        if self.bootstrap_trees.is_none() {
            return Err(ClientError::Invalid(
                "No bootstrap tree file given (nor sequence file)".into(),
            ));
        }
        Ok(())
    }

    pub async fn into_multipart(self) -> Result<Form> {
        self.validate()?;
        let mut form = Form::new()
            .text("email", self.email.trim().to_string())
            .text("runname", self.run_name.trim().to_string())
            .text("workflow", self.workflow.label().to_string())
            .text("nboot", self.nboot.to_string());

        if let Some(alignment) = self.alignment {
            info!(file = %alignment.filename(), "attaching sequence alignment");
            form = form.part("refalign", alignment.into_part().await?);
        }
        if let Some(tree) = self.reference_tree {
            form = form.part("reftree", tree.into_part().await?);
        }
        if let Some(trees) = self.bootstrap_trees {
            form = form.part("boottrees", trees.into_part().await?);
        }
        Ok(form)
    }
}

/// Extracts the analysis id from the `Location` of the `/run/` redirect,
/// e.g. `/view/4f2a` or `https://host/view/4f2a?x=1`.
pub fn analysis_id_from_location(location: &str) -> Result<AnalysisId> {
    let path = location
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');
    let (_, id) = path
        .rsplit_once("/view/")
        .ok_or_else(|| ClientError::Invalid(format!("unexpected redirect location {location:?}")))?;
    Ok(AnalysisId::parse(id)?)
}

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::stats::DocumentStatistics;
use crate::entity::Entity;
use crate::relation::Triple;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub text: String,
}

impl Document {
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }

    /// Reads a UTF-8 file; the document id is its file name.
    pub async fn load(path: &Path) -> crate::Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        Ok(Self::new(document_id(path), text))
    }
}

#[must_use]
pub fn document_id(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentResult {
    pub entities: Vec<Entity>,
    pub relations: Vec<Triple>,
    pub statistics: DocumentStatistics,
}

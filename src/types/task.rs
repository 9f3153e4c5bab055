use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::viewport::NamedViewport;

/// One (page, viewport) cell of the capture matrix. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureTask {
    pub page_id: String,
    pub url: String,
    pub viewport: NamedViewport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<PathBuf>,
}

/// Identity of a task; results are keyed and ordered by it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskKey {
    pub page_id: String,
    pub viewport_name: String,
}

impl CaptureTask {
    pub fn key(&self) -> TaskKey {
        TaskKey {
            page_id: self.page_id.clone(),
            viewport_name: self.viewport.name.clone(),
        }
    }

    /// `{pageId}-{viewportName}`, the stem shared by every file this task produces.
    /// `RunConfig::validate` keeps both parts file-name safe and the stems unique.
    pub fn file_stem(&self) -> String {
        format!("{}-{}", self.page_id, self.viewport.name)
    }
}

impl fmt::Display for CaptureTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.page_id, self.viewport.name)
    }
}

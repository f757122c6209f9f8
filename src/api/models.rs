use serde::{Deserialize, Serialize};

use crate::document::DocumentRequest;
use crate::service::SaveMode;

#[derive(Debug, Deserialize)]
pub struct CaptureRequest {
    #[serde(default)]
    pub mode: SaveMode,
    pub document: DocumentRequest,
}

#[derive(Debug, Deserialize)]
pub struct ScraperQuery {
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub cleared: bool,
}

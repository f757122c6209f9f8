pub mod api;
pub mod captures;
pub mod cleanup;
pub mod config;
pub mod document;
pub mod download;
pub mod error;
pub mod export;
pub mod extract;
pub mod registry;
pub mod scrapers;
pub mod service;
pub mod storage;

use std::sync::Arc;
use config::Config;
use service::CaptureService;

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub service: Arc<CaptureService>,
}

// src/lib.rs
use std::sync::Arc;
use std::time::Duration;

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;

use crate::services::RestorationPipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RestorationPipeline>,
    pub max_upload_bytes: usize,
    pub temp_retention: Duration,
}

// src/main.rs
use actix_web::{App, HttpServer, middleware, web};
use anyhow::Context;
use log::info;
use std::sync::Arc;
use std::time::Duration;

use photo_restoration::AppState;
use photo_restoration::config::Config;
use photo_restoration::handlers;
use photo_restoration::services::{
    GeminiService, GenerationSettings, ImageProcessor, RestorationPipeline, TempImageStore,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting photo restoration service...");

    let config = Config::from_env().context("invalid configuration")?;

    // Initialize services
    let gateway = Arc::new(
        GeminiService::new(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            config.gemini_api_base.clone(),
            config.model_timeout,
        )
        .context("failed to build model client")?,
    );
    let store = Arc::new(
        TempImageStore::open(&config.upload_dir)
            .await
            .context("failed to prepare upload directory")?,
    );
    let pipeline = Arc::new(RestorationPipeline::new(
        gateway,
        store.clone(),
        ImageProcessor::new(config.max_image_dimension),
        GenerationSettings {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            timeout: config.model_timeout,
        },
    ));

    spawn_sweeper(store, config.temp_retention, config.cleanup_interval);

    let app_state = AppState {
        pipeline,
        max_upload_bytes: config.max_upload_bytes,
        temp_retention: config.temp_retention,
    };
    let static_dir = config.static_dir.clone();

    info!(
        "Using model {}; uploads in {}",
        config.gemini_model,
        config.upload_dir.display()
    );
    info!("Starting HTTP server on {}:{}", config.host, config.port);

    HttpServer::new(move || {
        let static_dir = static_dir.clone();
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(handlers::routes)
            .configure(move |cfg| {
                if let Some(dir) = static_dir {
                    cfg.service(actix_files::Files::new("/", dir).index_file("index.html"));
                }
            })
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}

/// Periodically removes temp files older than `retention`.
fn spawn_sweeper(store: Arc<TempImageStore>, retention: Duration, interval: Duration) {
    actix_web::rt::spawn(async move {
        let mut ticker = actix_web::rt::time::interval(interval.max(Duration::from_secs(1)));
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            store.cleanup(retention).await;
        }
    });
}

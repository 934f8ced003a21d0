mod api;
mod app;
mod compare;
mod config;
mod gallery;
mod selection;
mod textures;
mod viewer;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};

use api::{CameraRecord, HttpImageSource, ImageRecord, ImageSource, InMemoryImageSource};
use app::SitelapseApp;
use config::AppConfig;

/// Picks the image source: HTTP-backed when a base URL is configured,
/// otherwise a seeded in-memory source so the app runs offline.
fn build_source(config: &AppConfig) -> Arc<dyn ImageSource> {
    match config.api_base_url.as_deref() {
        Some(base_url) if !base_url.is_empty() => {
            tracing::info!(base_url, "using HTTP image source");
            Arc::new(HttpImageSource::new(base_url, config.api_token.clone()))
        }
        _ => {
            tracing::info!("no api_base_url configured; using offline demo source");
            Arc::new(demo_source(
                config.company_id.as_deref().unwrap_or("demo-company"),
                config.project_id.as_deref().unwrap_or("demo-project"),
            ))
        }
    }
}

fn demo_source(company_id: &str, project_id: &str) -> InMemoryImageSource {
    let camera_names = ["North gate", "Tower crane", "Foundation pit"];
    let mut cameras = Vec::new();
    let mut images = HashMap::new();
    let start = Utc::now() - Duration::days(30);

    for (c, name) in camera_names.iter().enumerate() {
        let camera_id = format!("demo-cam-{}", c + 1);
        cameras.push(CameraRecord {
            id: camera_id.clone(),
            name: (*name).to_string(),
            project_id: project_id.to_string(),
            is_active: true,
        });
        // Hourly captures over a month: enough to exercise paging.
        let records: Vec<ImageRecord> = (0..120)
            .map(|i| ImageRecord {
                id: format!("{}-img-{:03}", camera_id, i),
                source_url: format!("https://demo.invalid/{}/{}.jpg", camera_id, i),
                camera_id: camera_id.clone(),
                company_id: company_id.to_string(),
                project_id: project_id.to_string(),
                captured_at: start + Duration::hours(i * 6),
                is_active: true,
                is_deleted: false,
            })
            .collect();
        images.insert(camera_id, records);
    }

    InMemoryImageSource::new(cameras, images)
}

fn main() -> eframe::Result {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load();
    let source = build_source(&config);

    let width = config.window_width.unwrap_or(1280.0);
    let height = config.window_height.unwrap_or(840.0);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Sitelapse")
            .with_app_id("sitelapse")
            .with_inner_size([width, height]),
        ..Default::default()
    };

    eframe::run_native(
        "sitelapse",
        native_options,
        Box::new(|cc| {
            let mut app = SitelapseApp::new(config, source);
            app.fetch_cameras(&cc.egui_ctx);
            Ok(Box::new(app))
        }),
    )
}

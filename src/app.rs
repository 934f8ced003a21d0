use std::sync::{Arc, mpsc};
use std::time::Instant;

use crate::api::{ApiError, CameraRecord, ImageRecord, ImageSource};
use crate::compare::CompareView;
use crate::config::AppConfig;
use crate::gallery::Gallery;
use crate::selection::{ImageRef, SelectionPair};
use crate::textures::{TextureCache, TextureState};
use crate::viewer::Viewer;

const THUMB_CELL: f32 = 150.0;

/// Scroll position past this fraction of the sidebar content triggers the
/// next page fetch.
const LOAD_MORE_SCROLL_RATIO: f32 = 0.8;

fn scroll_ratio(offset_y: f32, viewport_h: f32, content_h: f32) -> f32 {
    if content_h <= 0.0 {
        return 1.0;
    }
    ((offset_y + viewport_h) / content_h).clamp(0.0, 1.0)
}

pub struct SitelapseApp {
    config: AppConfig,
    source: Arc<dyn ImageSource>,
    project_id: String,

    cameras: Vec<CameraRecord>,
    cameras_loading: bool,
    camera_error: Option<String>,
    /// Camera to activate once the camera list arrives.
    pending_camera: Option<String>,
    camera_tx: mpsc::SyncSender<Result<Vec<CameraRecord>, ApiError>>,
    camera_rx: mpsc::Receiver<Result<Vec<CameraRecord>, ApiError>>,

    gallery: Gallery,
    selection: SelectionPair,
    compare: CompareView,
    viewer: Viewer,
    textures: TextureCache,
}

impl SitelapseApp {
    pub fn new(config: AppConfig, source: Arc<dyn ImageSource>) -> Self {
        let company_id = config.company_id.clone().unwrap_or_default();
        let project_id = config.project_id.clone().unwrap_or_default();
        let pending_camera = config.last_camera_id.clone();
        let (camera_tx, camera_rx) = mpsc::sync_channel(1);
        let gallery = Gallery::new(Arc::clone(&source), company_id, project_id.clone());
        let textures = TextureCache::new(Arc::clone(&source));
        Self {
            config,
            source,
            project_id,
            cameras: Vec::new(),
            cameras_loading: false,
            camera_error: None,
            pending_camera,
            camera_tx,
            camera_rx,
            gallery,
            selection: SelectionPair::default(),
            compare: CompareView::default(),
            viewer: Viewer::new(),
            textures,
        }
    }

    pub fn fetch_cameras(&mut self, ctx: &egui::Context) {
        if self.cameras_loading {
            return;
        }
        self.cameras_loading = true;
        self.camera_error = None;
        let project_id = self.project_id.clone();
        let source = Arc::clone(&self.source);
        let tx = self.camera_tx.clone();
        let ctx2 = ctx.clone();
        std::thread::spawn(move || {
            let _ = tx.send(source.list_cameras(&project_id));
            ctx2.request_repaint();
        });
    }

    /// Camera switch cascade: gallery reset and page-0 fetch, selection back
    /// to placeholders, slider back to centre, viewer back to index 0,
    /// texture cache dropped.
    fn change_camera(&mut self, camera_id: String, ctx: &egui::Context) {
        self.gallery.change_camera(camera_id.clone(), ctx);
        self.selection.reset();
        self.compare.reset();
        self.viewer.reset();
        self.textures.clear();
        self.config.last_camera_id = Some(camera_id);
    }

    fn poll(&mut self, ctx: &egui::Context) {
        while let Ok(result) = self.camera_rx.try_recv() {
            self.cameras_loading = false;
            match result {
                Ok(cameras) => {
                    self.cameras = cameras;
                    // Restore the previous session's camera, else the first.
                    let restore = self
                        .pending_camera
                        .take()
                        .filter(|id| self.cameras.iter().any(|c| c.id == *id))
                        .or_else(|| self.cameras.first().map(|c| c.id.clone()));
                    if let Some(id) = restore {
                        self.change_camera(id, ctx);
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "camera list fetch failed");
                    self.camera_error = Some(err.to_string());
                }
            }
        }
        self.gallery.drain();
        self.textures.drain(ctx);
        self.viewer.cursor.set_total(self.gallery.images.len());
    }

    fn slot_texture(&mut self, slot: ImageRef, ctx: &egui::Context) -> Option<egui::TextureHandle> {
        let record = slot.record()?;
        self.textures.request(&record.id, &record.source_url, ctx);
        self.textures.texture(&record.id).cloned()
    }

    fn show_top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new("Sitelapse").strong());
                ui.separator();

                let selected_name = self
                    .gallery
                    .camera_id()
                    .and_then(|id| self.cameras.iter().find(|c| c.id == id))
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| "Select camera".to_string());
                let mut switch_to: Option<String> = None;
                egui::ComboBox::from_id_salt("camera_selector")
                    .selected_text(selected_name)
                    .show_ui(ui, |ui| {
                        for camera in &self.cameras {
                            let active = self.gallery.camera_id() == Some(camera.id.as_str());
                            if ui.selectable_label(active, &camera.name).clicked() && !active {
                                switch_to = Some(camera.id.clone());
                            }
                        }
                    });
                if let Some(id) = switch_to {
                    self.change_camera(id, ctx);
                }

                if self.cameras_loading {
                    ui.spinner();
                } else if ui.small_button("⟳").on_hover_text("Reload cameras").clicked() {
                    self.fetch_cameras(ctx);
                }

                ui.separator();
                if ui.button("Reset slider").clicked() {
                    self.compare.reset();
                }
                if ui.button("Clear selection").clicked() {
                    self.selection.reset();
                }
                if ui
                    .add_enabled(
                        !self.gallery.images.is_empty(),
                        egui::Button::new("Open viewer"),
                    )
                    .clicked()
                {
                    self.viewer.open = true;
                }

                if let Some(err) = self
                    .camera_error
                    .as_deref()
                    .or(self.gallery.last_error.as_deref())
                {
                    ui.separator();
                    ui.colored_label(egui::Color32::LIGHT_RED, err);
                }
            });
        });
    }

    fn show_sidebar(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("image_sidebar")
            .min_width(THUMB_CELL + 40.0)
            .show(ctx, |ui| {
                if self.gallery.camera_id().is_none() {
                    ui.centered_and_justified(|ui| {
                        ui.label("Select a camera");
                    });
                    return;
                }
                let mut clicked: Option<ImageRecord> = None;
                let mut open_at: Option<usize> = None;
                let mut retry = false;
                let output = egui::ScrollArea::vertical()
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        for (i, record) in self.gallery.images.iter().enumerate() {
                            self.textures.request(&record.id, &record.source_url, ui.ctx());
                            let slot_tag = if !self.selection.is_selected(&record.id) {
                                None
                            } else if self.selection.before.id() == Some(record.id.as_str()) {
                                Some("Before")
                            } else {
                                Some("After")
                            };
                            let resp = draw_thumb_cell(
                                ui,
                                record,
                                self.textures.get(&record.id),
                                slot_tag,
                            );
                            if resp.clicked() {
                                clicked = Some(record.clone());
                            }
                            if resp.double_clicked() {
                                open_at = Some(i);
                            }
                        }
                        if self.gallery.is_loading() || self.gallery.is_loading_more() {
                            ui.horizontal(|ui| {
                                ui.spinner();
                                ui.weak("Loading...");
                            });
                        } else if let Some(err) = self.gallery.last_error.as_deref() {
                            // Failed pages (page 0 included) retry in place.
                            ui.colored_label(egui::Color32::LIGHT_RED, err);
                            if ui.button("Retry").clicked() {
                                retry = true;
                            }
                        } else if self.gallery.images.is_empty() {
                            ui.label("No photos for this camera");
                        } else if !self.gallery.cursor.has_more {
                            ui.weak(format!("{} photos", self.gallery.images.len()));
                        }
                    });

                let ratio = scroll_ratio(
                    output.state.offset.y,
                    output.inner_rect.height(),
                    output.content_size.y,
                );
                if retry || ratio > LOAD_MORE_SCROLL_RATIO {
                    self.gallery.load_more(ctx);
                }

                if let Some(record) = clicked {
                    self.selection.select(&record);
                }
                if let Some(index) = open_at {
                    self.viewer.cursor.select(index);
                    self.viewer.open = true;
                }
            });
    }

    fn show_compare(&mut self, ctx: &egui::Context) {
        let before = self.slot_texture(self.selection.before.clone(), ctx);
        let after = self.slot_texture(self.selection.after.clone(), ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            self.compare.show(ui, before.as_ref(), after.as_ref());
        });
    }
}

fn draw_thumb_cell(
    ui: &mut egui::Ui,
    record: &ImageRecord,
    state: Option<&TextureState>,
    slot_tag: Option<&str>,
) -> egui::Response {
    let (resp, painter) = ui.allocate_painter(
        egui::vec2(ui.available_width().max(THUMB_CELL), THUMB_CELL * 0.75 + 20.0),
        egui::Sense::click(),
    );
    let rect = resp.rect;

    if slot_tag.is_some() {
        painter.rect_filled(rect, 4.0, ui.visuals().selection.bg_fill);
    } else if resp.hovered() {
        painter.rect_filled(rect, 4.0, ui.visuals().widgets.hovered.bg_fill);
    }

    let img_rect = egui::Rect::from_min_size(
        rect.min,
        egui::vec2(rect.width(), THUMB_CELL * 0.75),
    );
    match state {
        Some(TextureState::Ready(tex)) => {
            let tex_size = tex.size_vec2();
            let scale = (img_rect.width() / tex_size.x).min(img_rect.height() / tex_size.y);
            let display = tex_size * scale;
            let offset = (img_rect.size() - display) * 0.5;
            let draw_rect = egui::Rect::from_min_size(img_rect.min + offset, display);
            painter.image(
                tex.id(),
                draw_rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }
        Some(TextureState::Failed) => {
            painter.rect_filled(img_rect, 4.0, egui::Color32::from_gray(40));
            painter.text(
                img_rect.center(),
                egui::Align2::CENTER_CENTER,
                "⚠",
                egui::FontId::proportional(18.0),
                egui::Color32::GRAY,
            );
        }
        _ => {
            painter.rect_filled(img_rect, 4.0, egui::Color32::from_gray(40));
        }
    }

    if let Some(tag) = slot_tag {
        painter.text(
            img_rect.left_top() + egui::vec2(6.0, 6.0),
            egui::Align2::LEFT_TOP,
            tag,
            egui::FontId::proportional(11.0),
            egui::Color32::WHITE,
        );
    }

    painter.text(
        egui::pos2(rect.center().x, img_rect.max.y + 10.0),
        egui::Align2::CENTER_CENTER,
        record.captured_at.format("%Y-%m-%d %H:%M").to_string(),
        egui::FontId::proportional(11.0),
        ui.visuals().text_color(),
    );

    resp
}

impl eframe::App for SitelapseApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        if let Some(rect) = ctx.input(|i| i.viewport().inner_rect) {
            self.config.window_width = Some(rect.width());
            self.config.window_height = Some(rect.height());
        }

        self.poll(ctx);
        self.viewer.handle_keys(ctx, now);
        if self.viewer.advance(now, ctx) {
            self.gallery.load_more(ctx);
        }

        self.show_top_bar(ctx);
        self.show_sidebar(ctx);
        self.show_compare(ctx);

        let record = self.gallery.images.get(self.viewer.cursor.index).cloned();
        if let Some(ref record) = record {
            self.textures.request(&record.id, &record.source_url, ctx);
        }
        let texture = record
            .as_ref()
            .and_then(|r| self.textures.texture(&r.id))
            .cloned();
        self.viewer
            .show(ctx, record.as_ref(), texture.as_ref(), &self.source);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.config.save();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::api::{InMemoryImageSource, test_record};
    use crate::compare::DEFAULT_SPLIT;

    fn app() -> SitelapseApp {
        let source = Arc::new(InMemoryImageSource::new(
            Vec::new(),
            HashMap::from([(
                "cam-1".to_string(),
                vec![test_record("a", "cam-1"), test_record("b", "cam-1")],
            )]),
        ));
        let config = AppConfig {
            company_id: Some("co1".to_string()),
            project_id: Some("pr1".to_string()),
            ..Default::default()
        };
        SitelapseApp::new(config, source)
    }

    #[test]
    fn scroll_ratio_saturates_at_the_ends() {
        assert_eq!(scroll_ratio(0.0, 100.0, 0.0), 1.0);
        assert_eq!(scroll_ratio(0.0, 200.0, 100.0), 1.0);
        assert_eq!(scroll_ratio(0.0, 80.0, 1000.0), 0.08);
    }

    #[test]
    fn scroll_past_four_fifths_triggers_load_more() {
        // 80px viewport over 1000px content, scrolled to 740px.
        let ratio = scroll_ratio(740.0, 80.0, 1000.0);
        assert!(ratio > LOAD_MORE_SCROLL_RATIO);
        let ratio = scroll_ratio(600.0, 80.0, 1000.0);
        assert!(ratio <= LOAD_MORE_SCROLL_RATIO);
    }

    #[test]
    fn camera_switch_resets_every_view() {
        let ctx = egui::Context::default();
        let mut app = app();

        app.selection.select(&test_record("x", "cam-0"));
        app.compare.pointer_down(200.0);
        app.compare.pointer_move(100.0, 0.0, 400.0);
        app.viewer.cursor = crate::viewer::ViewerCursor { index: 7, total: 9 };

        app.change_camera("cam-1".to_string(), &ctx);
        assert!(app.gallery.images.is_empty());
        assert_eq!(app.gallery.cursor.skip, 0);
        assert!(app.gallery.cursor.has_more);
        assert!(app.selection.before.is_placeholder());
        assert!(app.selection.after.is_placeholder());
        assert_eq!(app.compare.split_percent(), DEFAULT_SPLIT);
        assert_eq!(app.viewer.cursor.index, 0);
        assert_eq!(app.config.last_camera_id.as_deref(), Some("cam-1"));
    }
}

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use crate::api::{ImageRecord, ImageSource};

pub const AUTOPLAY_INTERVAL: Duration = Duration::from_secs(2);

/// Start fetching the next page once navigation comes within this many
/// images of the end of the loaded list.
const LOAD_AHEAD: usize = 5;

/// Index-based navigation over the accumulated image list. Wraps modulo
/// `total` in both directions; `total == 0` is inert rather than a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewerCursor {
    pub index: usize,
    pub total: usize,
}

impl ViewerCursor {
    pub fn next(&mut self) {
        if self.total == 0 {
            return;
        }
        self.index = (self.index + 1) % self.total;
    }

    pub fn prev(&mut self) {
        if self.total == 0 {
            return;
        }
        self.index = (self.index + self.total - 1) % self.total;
    }

    pub fn select(&mut self, index: usize) {
        if index < self.total {
            self.index = index;
        }
    }

    /// Grows (or shrinks) with the accumulated list without moving the
    /// current position unless it fell off the end.
    pub fn set_total(&mut self, total: usize) {
        self.total = total;
        if total == 0 {
            self.index = 0;
        } else if self.index >= total {
            self.index = total - 1;
        }
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }
}

/// Slideshow timer. One deadline at a time: toggling on arms it, each tick
/// re-arms it, toggling off or tearing the view down clears it.
#[derive(Debug, Default)]
pub struct Autoplay {
    next_tick: Option<Instant>,
}

impl Autoplay {
    pub fn is_playing(&self) -> bool {
        self.next_tick.is_some()
    }

    pub fn toggle(&mut self, now: Instant) {
        self.next_tick = match self.next_tick {
            Some(_) => None,
            None => Some(now + AUTOPLAY_INTERVAL),
        };
    }

    pub fn stop(&mut self) {
        self.next_tick = None;
    }

    /// Returns true when the deadline elapsed, re-arming for the next one.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.next_tick {
            Some(deadline) if now >= deadline => {
                self.next_tick = Some(now + AUTOPLAY_INTERVAL);
                true
            }
            _ => false,
        }
    }
}

enum DownloadResult {
    Saved(PathBuf),
    Failed(String),
}

fn download_photo(source: &dyn ImageSource, url: &str, path: &Path) -> anyhow::Result<PathBuf> {
    let bytes = source.fetch_photo_bytes(url)?;
    std::fs::write(path, bytes)?;
    Ok(path.to_path_buf())
}

/// Fullscreen-capable gallery viewer: cursor navigation, keyboard bindings,
/// autoplay, and side actions (download, favorite, fullscreen) that never
/// touch either cursor.
pub struct Viewer {
    pub open: bool,
    pub cursor: ViewerCursor,
    pub autoplay: Autoplay,
    fullscreen: bool,
    favorites: HashSet<String>,
    status: Option<String>,
    tx: mpsc::SyncSender<DownloadResult>,
    rx: mpsc::Receiver<DownloadResult>,
}

impl Viewer {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::sync_channel(4);
        Self {
            open: false,
            cursor: ViewerCursor::default(),
            autoplay: Autoplay::default(),
            fullscreen: false,
            favorites: HashSet::new(),
            status: None,
            tx,
            rx,
        }
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.favorites.contains(id)
    }

    pub fn toggle_favorite(&mut self, id: &str) {
        if !self.favorites.remove(id) {
            self.favorites.insert(id.to_string());
        }
    }

    /// Resets navigation for a new camera session and tears the timer down.
    pub fn reset(&mut self) {
        self.cursor = ViewerCursor::default();
        self.autoplay.stop();
        self.status = None;
    }

    /// Close the viewer, tearing down autoplay and leaving fullscreen.
    pub fn close(&mut self, ctx: &egui::Context) {
        self.open = false;
        self.autoplay.stop();
        if self.fullscreen {
            self.set_fullscreen(false, ctx);
        }
    }

    fn set_fullscreen(&mut self, on: bool, ctx: &egui::Context) {
        self.fullscreen = on;
        ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(on));
    }

    /// Global key bindings while the viewer is mounted.
    pub fn handle_keys(&mut self, ctx: &egui::Context, now: Instant) {
        if !self.open {
            return;
        }
        if ctx.input(|i| i.key_pressed(egui::Key::ArrowLeft)) {
            self.cursor.prev();
        }
        if ctx.input(|i| i.key_pressed(egui::Key::ArrowRight)) {
            self.cursor.next();
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Space)) {
            self.autoplay.toggle(now);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) && self.fullscreen {
            self.set_fullscreen(false, ctx);
        }
    }

    /// Advances the slideshow and reports whether more data should be
    /// requested because navigation is near the end of the loaded list.
    pub fn advance(&mut self, now: Instant, ctx: &egui::Context) -> bool {
        if self.autoplay.tick(now) {
            self.cursor.next();
        }
        if self.autoplay.is_playing() {
            ctx.request_repaint_after(AUTOPLAY_INTERVAL);
        }
        self.cursor.total > 0 && self.cursor.index + LOAD_AHEAD >= self.cursor.total
    }

    fn start_download(&mut self, record: &ImageRecord, source: Arc<dyn ImageSource>) {
        let url = record.source_url.clone();
        let dir = dirs::download_dir().unwrap_or_else(|| PathBuf::from("."));
        let path = dir.join(format!("{}.jpg", record.id));
        let tx = self.tx.clone();
        std::thread::spawn(move || {
            let _ = tx.send(match download_photo(source.as_ref(), &url, &path) {
                Ok(path) => DownloadResult::Saved(path),
                Err(err) => DownloadResult::Failed(err.to_string()),
            });
        });
        self.status = Some("Downloading...".to_string());
    }

    fn drain(&mut self) {
        while let Ok(result) = self.rx.try_recv() {
            self.status = Some(match result {
                DownloadResult::Saved(path) => format!("Saved {}", path.display()),
                DownloadResult::Failed(err) => {
                    tracing::warn!(error = %err, "photo download failed");
                    format!("Download failed: {}", err)
                }
            });
        }
    }

    /// Draws the viewer window. `record` and `texture` describe the image at
    /// the current cursor; both may lag while a page or texture loads.
    pub fn show(
        &mut self,
        ctx: &egui::Context,
        record: Option<&ImageRecord>,
        texture: Option<&egui::TextureHandle>,
        source: &Arc<dyn ImageSource>,
    ) {
        self.drain();
        if !self.open {
            return;
        }

        let mut open = self.open;
        egui::Window::new("Viewer")
            .open(&mut open)
            .default_size([900.0, 640.0])
            .show(ctx, |ui| {
                let image_h = (ui.available_height() - 40.0).max(120.0);
                ui.allocate_ui(egui::vec2(ui.available_width(), image_h), |ui| {
                    ui.centered_and_justified(|ui| match texture {
                        Some(tex) => {
                            let tex_size = tex.size_vec2();
                            let avail = ui.available_size();
                            let scale =
                                (avail.x / tex_size.x).min(avail.y / tex_size.y).min(1.0);
                            ui.image((tex.id(), tex_size * scale));
                        }
                        None => {
                            ui.spinner();
                        }
                    });
                });

                ui.horizontal(|ui| {
                    if ui.button("◀").clicked() {
                        self.cursor.prev();
                    }
                    if ui.button("▶").clicked() {
                        self.cursor.next();
                    }
                    let play_label = if self.autoplay.is_playing() { "⏸" } else { "▶ Play" };
                    if ui.button(play_label).clicked() {
                        self.autoplay.toggle(Instant::now());
                    }
                    if self.cursor.total > 0 {
                        ui.label(format!("{} / {}", self.cursor.index + 1, self.cursor.total));
                    }

                    ui.separator();
                    if let Some(record) = record {
                        let fav = self.is_favorite(&record.id);
                        if ui.selectable_label(fav, "★").on_hover_text("Favorite").clicked() {
                            self.toggle_favorite(&record.id);
                        }
                        if ui.button("⬇").on_hover_text("Download").clicked() {
                            self.start_download(record, Arc::clone(source));
                        }
                        ui.weak(record.captured_at.format("%Y-%m-%d %H:%M").to_string());
                    }
                    let fs_label = if self.fullscreen { "🗗" } else { "⛶" };
                    if ui.button(fs_label).on_hover_text("Fullscreen").clicked() {
                        let on = !self.fullscreen;
                        self.set_fullscreen(on, ui.ctx());
                    }
                    if let Some(ref status) = self.status {
                        ui.weak(status);
                    }
                });
            });

        if self.open && !open {
            self.close(ctx);
        } else {
            self.open = open;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_wraps_past_the_last_image() {
        let mut cursor = ViewerCursor { index: 4, total: 5 };
        cursor.next();
        assert_eq!(cursor.index, 0);
    }

    #[test]
    fn prev_wraps_before_the_first_image() {
        let mut cursor = ViewerCursor { index: 0, total: 5 };
        cursor.prev();
        assert_eq!(cursor.index, 4);
    }

    #[test]
    fn navigation_is_inert_with_no_images() {
        let mut cursor = ViewerCursor::default();
        cursor.next();
        cursor.prev();
        cursor.select(3);
        assert_eq!(cursor.index, 0);
        assert_eq!(cursor.total, 0);
    }

    #[test]
    fn select_ignores_out_of_bounds_indices() {
        let mut cursor = ViewerCursor { index: 1, total: 5 };
        cursor.select(9);
        assert_eq!(cursor.index, 1);
        cursor.select(4);
        assert_eq!(cursor.index, 4);
    }

    #[test]
    fn growing_total_keeps_the_position() {
        let mut cursor = ViewerCursor { index: 48, total: 50 };
        cursor.set_total(62);
        assert_eq!(cursor.index, 48);
    }

    #[test]
    fn shrinking_total_clamps_the_position() {
        let mut cursor = ViewerCursor { index: 48, total: 50 };
        cursor.set_total(10);
        assert_eq!(cursor.index, 9);
        cursor.set_total(0);
        assert_eq!(cursor.index, 0);
    }

    #[test]
    fn autoplay_ticks_once_per_interval() {
        let mut autoplay = Autoplay::default();
        let start = Instant::now();
        autoplay.toggle(start);
        assert!(autoplay.is_playing());

        assert!(!autoplay.tick(start + Duration::from_millis(500)));
        assert!(autoplay.tick(start + AUTOPLAY_INTERVAL));
        // Re-armed: the very next instant does not tick again.
        assert!(!autoplay.tick(start + AUTOPLAY_INTERVAL));
        assert!(autoplay.tick(start + AUTOPLAY_INTERVAL * 2));
    }

    #[test]
    fn toggling_off_stops_the_timer() {
        let mut autoplay = Autoplay::default();
        let start = Instant::now();
        autoplay.toggle(start);
        autoplay.toggle(start + Duration::from_millis(100));
        assert!(!autoplay.is_playing());
        assert!(!autoplay.tick(start + AUTOPLAY_INTERVAL * 3));
    }

    #[test]
    fn favorite_toggle_never_moves_the_cursor() {
        let mut viewer = Viewer::new();
        viewer.cursor = ViewerCursor { index: 3, total: 10 };
        viewer.toggle_favorite("img-1");
        assert!(viewer.is_favorite("img-1"));
        viewer.toggle_favorite("img-1");
        assert!(!viewer.is_favorite("img-1"));
        assert_eq!(viewer.cursor, ViewerCursor { index: 3, total: 10 });
    }

    #[test]
    fn download_writes_the_photo_to_disk() {
        let source = crate::api::InMemoryImageSource::default();
        let path = std::env::temp_dir().join("sitelapse-download-test.png");
        let _ = std::fs::remove_file(&path);

        let saved = download_photo(&source, "https://img.example/a.jpg", &path)
            .expect("in-memory photo should download");
        assert_eq!(saved, path);
        assert!(std::fs::metadata(&path).expect("file should exist").len() > 0);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn download_surfaces_fetch_failures_without_writing() {
        use crate::api::{ApiError, CameraRecord, ImagePage, ImageQuery};

        struct FailingSource;
        impl ImageSource for FailingSource {
            fn fetch_page(&self, _: &ImageQuery) -> Result<ImagePage, ApiError> {
                Err(ApiError::Status(500))
            }
            fn list_cameras(&self, _: &str) -> Result<Vec<CameraRecord>, ApiError> {
                Err(ApiError::Status(500))
            }
            fn fetch_photo_bytes(&self, _: &str) -> Result<Vec<u8>, ApiError> {
                Err(ApiError::Status(500))
            }
        }

        let path = std::env::temp_dir().join("sitelapse-download-fail.png");
        let _ = std::fs::remove_file(&path);
        let result = download_photo(&FailingSource, "https://img.example/a.jpg", &path);
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn reset_tears_the_slideshow_down() {
        let mut viewer = Viewer::new();
        viewer.cursor = ViewerCursor { index: 7, total: 20 };
        viewer.autoplay.toggle(Instant::now());
        viewer.reset();
        assert_eq!(viewer.cursor.index, 0);
        assert!(!viewer.autoplay.is_playing());
    }
}

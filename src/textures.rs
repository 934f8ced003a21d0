use std::{
    collections::HashMap,
    sync::{Arc, mpsc},
};

use crate::api::ImageSource;

/// Downscale decoded photos to this longest-edge size before upload.
const TEXTURE_MAX: u32 = 1600;

pub enum TextureState {
    Loading,
    Ready(egui::TextureHandle),
    Failed,
}

struct Decoded {
    id: String,
    rgba: Option<(Vec<u8>, usize, usize)>,
}

/// Per-image-id cache of decoded photo textures. Bytes are fetched and
/// decoded on background threads; results land on a channel drained each
/// frame. Cleared wholesale on camera change.
pub struct TextureCache {
    source: Arc<dyn ImageSource>,
    states: HashMap<String, TextureState>,
    tx: mpsc::SyncSender<Decoded>,
    rx: mpsc::Receiver<Decoded>,
}

fn decode_rgba(bytes: &[u8]) -> Option<(Vec<u8>, usize, usize)> {
    let img = image::load_from_memory(bytes).ok()?;
    let img = if img.width() > TEXTURE_MAX || img.height() > TEXTURE_MAX {
        img.thumbnail(TEXTURE_MAX, TEXTURE_MAX)
    } else {
        img
    };
    let rgba = img.to_rgba8();
    let w = rgba.width() as usize;
    let h = rgba.height() as usize;
    Some((rgba.into_raw(), w, h))
}

impl TextureCache {
    pub fn new(source: Arc<dyn ImageSource>) -> Self {
        let (tx, rx) = mpsc::sync_channel(64);
        Self {
            source,
            states: HashMap::new(),
            tx,
            rx,
        }
    }

    /// Kicks off a fetch+decode for `id` unless one already ran or is running.
    pub fn request(&mut self, id: &str, url: &str, ctx: &egui::Context) {
        if self.states.contains_key(id) {
            return;
        }
        self.states.insert(id.to_string(), TextureState::Loading);

        let id = id.to_string();
        let url = url.to_string();
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let ctx2 = ctx.clone();
        std::thread::spawn(move || {
            let rgba = match source.fetch_photo_bytes(&url) {
                Ok(bytes) => decode_rgba(&bytes),
                Err(err) => {
                    tracing::warn!(error = %err, url, "photo fetch failed");
                    None
                }
            };
            let _ = tx.send(Decoded { id, rgba });
            ctx2.request_repaint();
        });
    }

    pub fn drain(&mut self, ctx: &egui::Context) {
        while let Ok(Decoded { id, rgba }) = self.rx.try_recv() {
            let state = match rgba {
                Some((data, w, h)) => {
                    let img = egui::ColorImage::from_rgba_unmultiplied([w, h], &data);
                    let tex = ctx.load_texture(&id, img, egui::TextureOptions::LINEAR);
                    TextureState::Ready(tex)
                }
                None => TextureState::Failed,
            };
            self.states.insert(id, state);
        }
    }

    pub fn get(&self, id: &str) -> Option<&TextureState> {
        self.states.get(id)
    }

    pub fn texture(&self, id: &str) -> Option<&egui::TextureHandle> {
        match self.states.get(id) {
            Some(TextureState::Ready(tex)) => Some(tex),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}

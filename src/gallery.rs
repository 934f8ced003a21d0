use std::sync::{Arc, mpsc};

use crate::api::{ApiError, ImagePage, ImageQuery, ImageRecord, ImageSource};

/// Fixed page size for both the gallery grid and the compare sidebar.
pub const PAGE_LIMIT: usize = 50;

/// Skip/limit bookkeeping for one camera session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub skip: usize,
    pub limit: usize,
    pub has_more: bool,
}

impl PageCursor {
    pub fn new(limit: usize) -> Self {
        Self {
            skip: 0,
            limit,
            has_more: true,
        }
    }

    /// Advances past a successfully applied page.
    ///
    /// Termination prefers the server-reported total when present; the
    /// short-page heuristic (`returned < limit`) is only the fallback, since
    /// it mis-signals when the final page is exactly `limit` long.
    pub fn advance(&mut self, returned: usize, accumulated: usize, total_count: Option<u64>) {
        self.skip += returned;
        self.has_more = match total_count {
            Some(total) => (accumulated as u64) < total,
            None => returned == self.limit,
        };
    }
}

struct FetchedPage {
    generation: u64,
    result: Result<ImagePage, ApiError>,
}

/// Accumulating paginator over one camera's photos.
///
/// Fetches run on background threads and report back over a channel drained
/// each frame. Every dispatch carries the generation current at that moment;
/// a camera change bumps the generation, so results from a superseded camera
/// are discarded on arrival instead of being merged into the wrong session.
pub struct Gallery {
    source: Arc<dyn ImageSource>,
    company_id: String,
    project_id: String,
    camera_id: Option<String>,
    pub images: Vec<ImageRecord>,
    pub cursor: PageCursor,
    loading: bool,
    loading_more: bool,
    generation: u64,
    pub last_error: Option<String>,
    tx: mpsc::SyncSender<FetchedPage>,
    rx: mpsc::Receiver<FetchedPage>,
}

impl Gallery {
    pub fn new(source: Arc<dyn ImageSource>, company_id: String, project_id: String) -> Self {
        let (tx, rx) = mpsc::sync_channel(8);
        Self {
            source,
            company_id,
            project_id,
            camera_id: None,
            images: Vec::new(),
            cursor: PageCursor::new(PAGE_LIMIT),
            loading: false,
            loading_more: false,
            generation: 0,
            last_error: None,
            tx,
            rx,
        }
    }

    pub fn camera_id(&self) -> Option<&str> {
        self.camera_id.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_loading_more(&self) -> bool {
        self.loading_more
    }

    /// Switches the active camera: clears the accumulated list, resets the
    /// cursor, invalidates in-flight fetches, and requests page 0.
    pub fn change_camera(&mut self, camera_id: String, ctx: &egui::Context) {
        self.camera_id = Some(camera_id);
        self.images.clear();
        self.cursor = PageCursor::new(PAGE_LIMIT);
        self.last_error = None;
        self.generation += 1;
        self.loading = true;
        self.loading_more = false;
        self.spawn_fetch(ctx);
    }

    /// Requests the next page. A request made while one is already in flight
    /// is dropped, not queued.
    pub fn load_more(&mut self, ctx: &egui::Context) {
        if self.camera_id.is_none()
            || self.loading
            || self.loading_more
            || !self.cursor.has_more
        {
            return;
        }
        self.loading_more = true;
        self.spawn_fetch(ctx);
    }

    fn spawn_fetch(&self, ctx: &egui::Context) {
        let Some(camera_id) = self.camera_id.clone() else { return };
        let query = ImageQuery {
            company_id: self.company_id.clone(),
            project_id: self.project_id.clone(),
            camera_id,
            from_date: None,
            to_date: None,
            limit: self.cursor.limit,
            skip: self.cursor.skip,
        };
        let generation = self.generation;
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let ctx2 = ctx.clone();
        std::thread::spawn(move || {
            let result = source.fetch_page(&query);
            let _ = tx.send(FetchedPage { generation, result });
            ctx2.request_repaint();
        });
    }

    /// Applies any completed fetches. Called once per frame.
    pub fn drain(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            self.on_fetched(msg);
        }
    }

    fn on_fetched(&mut self, msg: FetchedPage) {
        if msg.generation != self.generation {
            // Stale result from a superseded camera session.
            return;
        }
        self.loading = false;
        self.loading_more = false;
        match msg.result {
            Ok(page) => self.apply_page(page),
            Err(err) => {
                tracing::warn!(error = %err, "image page fetch failed");
                self.last_error = Some(err.to_string());
            }
        }
    }

    fn apply_page(&mut self, page: ImagePage) {
        let returned = page.records.len();
        self.images.extend(page.records);
        self.cursor
            .advance(returned, self.images.len(), page.total_count);
        self.last_error = None;
        tracing::debug!(
            returned,
            accumulated = self.images.len(),
            skip = self.cursor.skip,
            has_more = self.cursor.has_more,
            "applied image page"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::api::{InMemoryImageSource, test_record};

    fn page(ids: &[&str], total: Option<u64>) -> ImagePage {
        ImagePage {
            records: ids.iter().map(|id| test_record(id, "cam-1")).collect(),
            total_count: total,
        }
    }

    fn records(n: usize) -> Vec<ImageRecord> {
        (0..n).map(|i| test_record(&format!("i{}", i), "cam-1")).collect()
    }

    fn gallery() -> Gallery {
        let source = Arc::new(InMemoryImageSource::default());
        Gallery::new(source, "co1".to_string(), "pr1".to_string())
    }

    #[test]
    fn cursor_heuristic_full_then_short_page() {
        let mut cursor = PageCursor::new(50);
        cursor.advance(50, 50, None);
        assert_eq!(cursor.skip, 50);
        assert!(cursor.has_more);
        cursor.advance(12, 62, None);
        assert_eq!(cursor.skip, 62);
        assert!(!cursor.has_more);
    }

    #[test]
    fn cursor_prefers_total_count_over_short_page_heuristic() {
        // Final page exactly `limit` long: the heuristic alone would keep
        // has_more true, the reported total terminates exactly.
        let mut cursor = PageCursor::new(50);
        cursor.advance(50, 50, Some(50));
        assert!(!cursor.has_more);
    }

    #[test]
    fn cursor_total_count_keeps_paging_until_reached() {
        let mut cursor = PageCursor::new(50);
        cursor.advance(50, 50, Some(62));
        assert!(cursor.has_more);
        cursor.advance(12, 62, Some(62));
        assert!(!cursor.has_more);
        assert_eq!(cursor.skip, 62);
    }

    #[test]
    fn pages_accumulate_monotonically() {
        let mut g = gallery();
        g.camera_id = Some("cam-1".to_string());
        g.generation = 1;
        g.on_fetched(FetchedPage {
            generation: 1,
            result: Ok(ImagePage {
                records: records(50),
                total_count: Some(62),
            }),
        });
        assert_eq!(g.images.len(), 50);
        g.on_fetched(FetchedPage {
            generation: 1,
            result: Ok(page(&["a", "b"], Some(62))),
        });
        assert_eq!(g.images.len(), 52);
        assert_eq!(g.cursor.skip, 52);
    }

    #[test]
    fn camera_change_resets_everything() {
        let ctx = egui::Context::default();
        let mut g = gallery();
        g.images = records(30);
        g.cursor = PageCursor {
            skip: 30,
            limit: PAGE_LIMIT,
            has_more: false,
        };
        g.last_error = Some("old failure".to_string());

        g.change_camera("cam-2".to_string(), &ctx);
        assert!(g.images.is_empty());
        assert_eq!(g.cursor.skip, 0);
        assert!(g.cursor.has_more);
        assert!(g.last_error.is_none());
        assert!(g.is_loading());
        assert_eq!(g.camera_id(), Some("cam-2"));
    }

    #[test]
    fn stale_generation_results_are_discarded() {
        let ctx = egui::Context::default();
        let mut g = gallery();
        g.change_camera("cam-1".to_string(), &ctx);
        let old_generation = g.generation;
        g.change_camera("cam-2".to_string(), &ctx);

        g.on_fetched(FetchedPage {
            generation: old_generation,
            result: Ok(page(&["stale"], Some(1))),
        });
        assert!(g.images.is_empty());
        // The superseding fetch is still pending.
        assert!(g.is_loading());
    }

    #[test]
    fn failed_fetch_leaves_pagination_unchanged() {
        let mut g = gallery();
        g.camera_id = Some("cam-1".to_string());
        g.on_fetched(FetchedPage {
            generation: 0,
            result: Ok(ImagePage {
                records: records(50),
                total_count: None,
            }),
        });
        let before_skip = g.cursor.skip;

        g.loading_more = true;
        g.on_fetched(FetchedPage {
            generation: 0,
            result: Err(ApiError::Status(502)),
        });
        assert_eq!(g.images.len(), 50);
        assert_eq!(g.cursor.skip, before_skip);
        assert!(g.cursor.has_more);
        assert!(g.last_error.is_some());
        // A retry is allowed once the failure is reported.
        assert!(!g.is_loading_more());
    }

    #[test]
    fn failed_first_page_can_be_retried_in_place() {
        let ctx = egui::Context::default();
        let mut g = gallery();
        g.change_camera("cam-1".to_string(), &ctx);
        g.on_fetched(FetchedPage {
            generation: g.generation,
            result: Err(ApiError::Status(500)),
        });
        assert!(g.last_error.is_some());
        assert_eq!(g.cursor.skip, 0);

        // The failure cleared the in-flight flags, so a retry dispatches
        // page 0 again without a camera switch.
        g.load_more(&ctx);
        assert!(g.is_loading_more());
    }

    #[test]
    fn overlapping_load_more_is_dropped() {
        let ctx = egui::Context::default();
        let mut g = gallery();
        g.change_camera("cam-1".to_string(), &ctx);
        assert!(g.is_loading());
        g.load_more(&ctx);
        assert!(!g.is_loading_more());
    }

    #[test]
    fn load_more_stops_at_end_of_data() {
        let ctx = egui::Context::default();
        let mut g = gallery();
        g.camera_id = Some("cam-1".to_string());
        g.cursor.has_more = false;
        g.load_more(&ctx);
        assert!(!g.is_loading_more());
    }

    #[test]
    fn empty_camera_is_a_terminal_state_not_an_error() {
        let source = Arc::new(InMemoryImageSource::new(Vec::new(), HashMap::new()));
        let mut g = Gallery::new(source, "co1".to_string(), "pr1".to_string());
        g.camera_id = Some("cam-empty".to_string());
        g.on_fetched(FetchedPage {
            generation: 0,
            result: Ok(ImagePage {
                records: Vec::new(),
                total_count: Some(0),
            }),
        });
        assert!(g.images.is_empty());
        assert!(!g.cursor.has_more);
        assert!(g.last_error.is_none());
    }
}

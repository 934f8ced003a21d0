pub const DEFAULT_SPLIT: f32 = 50.0;

/// Horizontal movement below this is treated as a click on the handle, not a
/// drag, and leaves the split untouched.
const DRAG_THRESHOLD_PX: f32 = 3.0;

struct DragState {
    origin_x: f32,
    engaged: bool,
}

/// Draggable before/after divider. Pure pointer geometry: the split is a
/// percentage of the container width, clamped to [0, 100], with no inertia or
/// snapping. Independent of any network state.
pub struct CompareView {
    split_percent: f32,
    drag: Option<DragState>,
}

impl Default for CompareView {
    fn default() -> Self {
        Self {
            split_percent: DEFAULT_SPLIT,
            drag: None,
        }
    }
}

/// Maps a pointer X to a split percent of the container, clamped to [0, 100].
fn split_from_pointer(pointer_x: f32, container_left: f32, container_width: f32) -> f32 {
    if container_width <= 0.0 {
        return DEFAULT_SPLIT;
    }
    ((pointer_x - container_left) / container_width * 100.0).clamp(0.0, 100.0)
}

impl CompareView {
    pub fn split_percent(&self) -> f32 {
        self.split_percent
    }

    pub fn reset(&mut self) {
        self.split_percent = DEFAULT_SPLIT;
        self.drag = None;
    }

    pub fn pointer_down(&mut self, pointer_x: f32) {
        self.drag = Some(DragState {
            origin_x: pointer_x,
            engaged: false,
        });
    }

    pub fn pointer_move(&mut self, pointer_x: f32, container_left: f32, container_width: f32) {
        let Some(drag) = &mut self.drag else { return };
        if !drag.engaged {
            if (pointer_x - drag.origin_x).abs() < DRAG_THRESHOLD_PX {
                return;
            }
            drag.engaged = true;
        }
        self.split_percent = split_from_pointer(pointer_x, container_left, container_width);
    }

    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    /// X coordinate of the divider inside `rect`.
    fn divider_x(&self, rect: egui::Rect) -> f32 {
        rect.left() + rect.width() * self.split_percent / 100.0
    }

    /// Draws the comparison: the before layer fills the container, the after
    /// layer is painted only right of the divider, revealing before on the
    /// left in proportion to the split.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        before: Option<&egui::TextureHandle>,
        after: Option<&egui::TextureHandle>,
    ) {
        let avail = ui.available_size();
        let (rect, _) = ui.allocate_exact_size(avail, egui::Sense::hover());
        if rect.width() < 1.0 || rect.height() < 1.0 {
            return;
        }
        let painter = ui.painter_at(rect);
        let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));

        match before {
            Some(tex) => {
                painter.image(tex.id(), rect, uv, egui::Color32::WHITE);
            }
            None => {
                painter.rect_filled(rect, 0.0, egui::Color32::BLACK);
            }
        }

        let divider_x = self.divider_x(rect);
        let after_rect =
            egui::Rect::from_min_max(egui::pos2(divider_x, rect.top()), rect.max);
        let clipped = painter.with_clip_rect(after_rect);
        match after {
            Some(tex) => {
                clipped.image(tex.id(), rect, uv, egui::Color32::WHITE);
            }
            None => {
                clipped.rect_filled(rect, 0.0, egui::Color32::WHITE);
            }
        }

        // Divider line and grab handle.
        painter.line_segment(
            [
                egui::pos2(divider_x, rect.top()),
                egui::pos2(divider_x, rect.bottom()),
            ],
            egui::Stroke::new(2.0, egui::Color32::from_gray(230)),
        );
        let handle_rect = egui::Rect::from_center_size(
            egui::pos2(divider_x, rect.center().y),
            egui::vec2(16.0, 48.0),
        );
        painter.rect_filled(handle_rect, 6.0, egui::Color32::from_black_alpha(140));

        let grab_rect = handle_rect.expand2(egui::vec2(6.0, 0.0));
        let resp = ui.interact(
            grab_rect,
            ui.id().with("compare_divider"),
            egui::Sense::drag(),
        );
        if resp.drag_started() {
            if let Some(pos) = resp.interact_pointer_pos() {
                self.pointer_down(pos.x);
            }
        }
        if resp.dragged() {
            if let Some(pos) = resp.interact_pointer_pos() {
                self.pointer_move(pos.x, rect.left(), rect.width());
            }
        }
        if resp.drag_stopped() {
            self.pointer_up();
        }
    }
}

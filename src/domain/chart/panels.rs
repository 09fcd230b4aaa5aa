//! Stacked indicator panels below the main price area.

pub const MIN_PANEL_HEIGHT: f64 = 50.0;
pub const MAX_PANEL_HEIGHT: f64 = 300.0;
pub const DEFAULT_PANEL_HEIGHT: f64 = 120.0;
/// Header strip kept visible when a panel is collapsed.
pub const COLLAPSED_HEIGHT: f64 = 24.0;
/// Minimum height preserved for the price area.
pub const MIN_MAIN_HEIGHT: f64 = 80.0;
/// Hit-test tolerance around a panel's top edge for the resize handle.
pub const HANDLE_GRACE_PX: f64 = 4.0;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPanel {
    pub id: String,
    pub height: f64,
    pub collapsed: bool,
}

impl IndicatorPanel {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            height: DEFAULT_PANEL_HEIGHT,
            collapsed: false,
        }
    }

    pub fn effective_height(&self) -> f64 {
        if self.collapsed {
            COLLAPSED_HEIGHT
        } else {
            self.height
        }
    }
}

/// A panel's resolved position in the canvas, top-down pixel space.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelRegion {
    pub id: String,
    pub top: f64,
    pub height: f64,
    pub collapsed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PanelLayout {
    panels: Vec<IndicatorPanel>,
}

impl PanelLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn panels(&self) -> &[IndicatorPanel] {
        &self.panels
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    /// Keeps exactly the panels with the given ids, adding new ones at
    /// the bottom and preserving heights of survivors.
    pub fn sync_ids(&mut self, ids: &[String]) {
        self.panels.retain(|p| ids.contains(&p.id));
        for id in ids {
            if !self.panels.iter().any(|p| &p.id == id) {
                self.panels.push(IndicatorPanel::new(id));
            }
        }
    }

    pub fn toggle_collapsed(&mut self, id: &str) -> Option<bool> {
        let panel = self.panels.iter_mut().find(|p| p.id == id)?;
        panel.collapsed = !panel.collapsed;
        Some(panel.collapsed)
    }

    /// Sets a panel's expanded height, clamped to the legal band.
    /// Ignored for collapsed panels.
    pub fn set_height(&mut self, id: &str, height: f64) -> bool {
        match self.panels.iter_mut().find(|p| p.id == id) {
            Some(panel) if !panel.collapsed => {
                panel.height = height.clamp(MIN_PANEL_HEIGHT, MAX_PANEL_HEIGHT);
                true
            }
            _ => false,
        }
    }

    pub fn height_of(&self, id: &str) -> Option<f64> {
        self.panels.iter().find(|p| p.id == id).map(|p| p.height)
    }

    pub fn total_height(&self) -> f64 {
        self.panels.iter().map(|p| p.effective_height()).sum()
    }

    /// Height left for the price area after the panel stack.
    pub fn main_area_height(&self, canvas_height: f64) -> f64 {
        (canvas_height - self.total_height()).max(MIN_MAIN_HEIGHT)
    }

    /// Panel rectangles stacked from the bottom of the price area down.
    pub fn regions(&self, canvas_height: f64) -> Vec<PanelRegion> {
        let mut top = self.main_area_height(canvas_height);
        self.panels
            .iter()
            .map(|panel| {
                let region = PanelRegion {
                    id: panel.id.clone(),
                    top,
                    height: panel.effective_height(),
                    collapsed: panel.collapsed,
                };
                top += panel.effective_height();
                region
            })
            .collect()
    }

    /// Returns the id of the panel whose resize handle (top edge) sits
    /// under `y`. Collapsed panels have no handle.
    pub fn handle_at(&self, y: f64, canvas_height: f64) -> Option<String> {
        self.regions(canvas_height)
            .into_iter()
            .find(|r| !r.collapsed && (y - r.top).abs() <= HANDLE_GRACE_PX)
            .map(|r| r.id)
    }

    /// Drag on a panel's top handle: moving up (`delta_y < 0`) grows
    /// the panel. The result stays clamped.
    pub fn drag_resize(&mut self, id: &str, delta_y: f64) -> bool {
        match self.panels.iter_mut().find(|p| p.id == id) {
            Some(panel) if !panel.collapsed => {
                panel.height = (panel.height - delta_y).clamp(MIN_PANEL_HEIGHT, MAX_PANEL_HEIGHT);
                true
            }
            _ => false,
        }
    }

    /// Signature of structure-affecting panel state, for detecting when
    /// render resources must be rebuilt.
    pub fn structure_signature(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for panel in &self.panels {
            panel.id.hash(&mut hasher);
            panel.collapsed.hash(&mut hasher);
            (panel.height as u64).hash(&mut hasher);
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout_with(ids: &[&str]) -> PanelLayout {
        let mut layout = PanelLayout::new();
        layout.sync_ids(&ids.iter().map(|s| s.to_string()).collect::<Vec<_>>());
        layout
    }

    #[test]
    fn height_clamps_to_band() {
        let mut layout = layout_with(&["rsi14"]);
        layout.set_height("rsi14", 10.0);
        assert_eq!(layout.height_of("rsi14"), Some(MIN_PANEL_HEIGHT));
        layout.set_height("rsi14", 900.0);
        assert_eq!(layout.height_of("rsi14"), Some(MAX_PANEL_HEIGHT));
    }

    #[test]
    fn collapse_preserves_height_for_restore() {
        let mut layout = layout_with(&["rsi14"]);
        layout.set_height("rsi14", 200.0);
        assert_eq!(layout.toggle_collapsed("rsi14"), Some(true));
        assert_eq!(layout.total_height(), COLLAPSED_HEIGHT);
        assert_eq!(layout.toggle_collapsed("rsi14"), Some(false));
        assert_eq!(layout.height_of("rsi14"), Some(200.0));
    }

    #[test]
    fn regions_stack_below_main_area() {
        let mut layout = layout_with(&["a", "b"]);
        layout.set_height("a", 100.0);
        layout.set_height("b", 60.0);
        let regions = layout.regions(600.0);
        assert_eq!(regions[0].top, 440.0);
        assert_eq!(regions[1].top, 540.0);
    }

    #[test]
    fn main_area_never_collapses() {
        let mut layout = layout_with(&["a", "b", "c"]);
        for id in ["a", "b", "c"] {
            layout.set_height(id, MAX_PANEL_HEIGHT);
        }
        assert_eq!(layout.main_area_height(400.0), MIN_MAIN_HEIGHT);
    }

    #[test]
    fn handle_hit_test_within_grace() {
        let mut layout = layout_with(&["a"]);
        layout.set_height("a", 100.0);
        assert_eq!(layout.handle_at(501.0, 600.0), Some("a".to_string()));
        assert_eq!(layout.handle_at(510.0, 600.0), None);
        layout.toggle_collapsed("a");
        assert_eq!(layout.handle_at(577.0, 600.0), None);
    }

    #[test]
    fn drag_up_grows_panel() {
        let mut layout = layout_with(&["a"]);
        layout.drag_resize("a", -30.0);
        assert_eq!(layout.height_of("a"), Some(DEFAULT_PANEL_HEIGHT + 30.0));
    }

    #[test]
    fn sync_ids_drops_and_adds() {
        let mut layout = layout_with(&["a", "b"]);
        layout.set_height("a", 250.0);
        layout.sync_ids(&["a".to_string(), "c".to_string()]);
        assert_eq!(layout.height_of("a"), Some(250.0));
        assert!(layout.height_of("b").is_none());
        assert_eq!(layout.height_of("c"), Some(DEFAULT_PANEL_HEIGHT));
    }
}

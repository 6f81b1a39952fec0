//! Floating toolbar placement next to the active selection.

use crate::config::ToolbarConfig;
use canvas_core::{CanvasEngine, ElementId, Viewport};
use kurbo::{Point, Rect};

/// Where the toolbar sits relative to the selection box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolbarSide {
    Above,
    Below,
    /// Neither above nor below fits; aligned with the box top.
    Flush,
}

impl ToolbarSide {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolbarSide::Above => "above",
            ToolbarSide::Below => "below",
            ToolbarSide::Flush => "flush",
        }
    }
}

/// Toolbar position in viewport coordinates (top-left corner).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolbarPlacement {
    pub anchor: Point,
    pub side: ToolbarSide,
    pub visible: bool,
}

impl ToolbarPlacement {
    pub fn hidden() -> Self {
        Self {
            anchor: Point::ORIGIN,
            side: ToolbarSide::Flush,
            visible: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolbarCoordinator {
    config: ToolbarConfig,
    current: ToolbarPlacement,
}

impl ToolbarCoordinator {
    pub fn new(config: ToolbarConfig) -> Self {
        Self {
            config,
            current: ToolbarPlacement::hidden(),
        }
    }

    pub fn current(&self) -> ToolbarPlacement {
        self.current
    }

    /// Place the toolbar for a selection box given in scene coordinates.
    pub fn place(&self, selection_box: Rect, viewport: &Viewport) -> ToolbarPlacement {
        let cfg = &self.config;
        let bbox = viewport.transform().transform_rect_bbox(selection_box);
        let pad = cfg.edge_padding;

        let max_x = (viewport.width - cfg.width - pad).max(pad);
        let x = (bbox.x1 + cfg.margin).clamp(pad, max_x);

        let max_y = (viewport.height - cfg.height - pad).max(pad);
        let above = bbox.y0 - cfg.height - cfg.margin;
        let below = bbox.y1 + cfg.margin;
        let (y, side) = if above >= pad {
            (above, ToolbarSide::Above)
        } else if below + cfg.height <= viewport.height - pad {
            (below, ToolbarSide::Below)
        } else {
            (bbox.y0.clamp(pad, max_y), ToolbarSide::Flush)
        };

        ToolbarPlacement {
            anchor: Point::new(x, y),
            side,
            visible: true,
        }
    }

    /// Recompute for the given selection. Hidden when nothing in it has
    /// a bounding box.
    pub fn on_selection<E: CanvasEngine + ?Sized>(
        &mut self,
        engine: &E,
        ids: &[ElementId],
    ) -> ToolbarPlacement {
        let union = ids
            .iter()
            .filter_map(|&id| engine.bounding_box(id))
            .reduce(|acc, b| acc.union(b));
        self.current = match union {
            Some(selection_box) => self.place(selection_box, &engine.viewport()),
            None => ToolbarPlacement::hidden(),
        };
        self.current
    }

    pub fn hide(&mut self) -> ToolbarPlacement {
        self.current = ToolbarPlacement::hidden();
        self.current
    }
}

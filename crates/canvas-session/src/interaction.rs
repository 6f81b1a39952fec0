//! Input routing: keyboard shortcuts, double-click, and text-edit state.

use crate::config::SessionConfig;
use crate::shortcuts::{ShortcutAction, ShortcutMap};
use canvas_core::{CanvasEngine, Element, ElementId, ElementKind};
use kurbo::Vec2;

/// Tracks whether a text element is being edited and routes input
/// accordingly.
#[derive(Debug, Clone, Default)]
pub struct Interaction {
    editing: Option<ElementId>,
}

impl Interaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// The text element currently being edited.
    pub fn editing(&self) -> Option<ElementId> {
        self.editing
    }

    pub fn set_editing(&mut self, id: Option<ElementId>) {
        self.editing = id;
    }

    /// Resolve a key event. While editing text only Escape is routed.
    pub fn route_key(
        &self,
        key: &str,
        ctrl: bool,
        shift: bool,
        alt: bool,
        meta: bool,
    ) -> Option<ShortcutAction> {
        if self.editing.is_some() {
            ShortcutMap::resolve_editing(key)
        } else {
            ShortcutMap::resolve(key, ctrl, shift, alt, meta)
        }
    }

    /// The element a double-click should open for editing, if any.
    pub fn double_click_target<E: CanvasEngine + ?Sized>(
        &self,
        engine: &E,
        target: Option<ElementId>,
    ) -> Option<ElementId> {
        let id = target?;
        if self.editing == Some(id) {
            return None;
        }
        engine.element(id).filter(Element::is_text).map(|el| el.id)
    }
}

/// Scene-space displacement for a nudge action.
pub fn nudge_delta(dx: i8, dy: i8, large: bool, config: &SessionConfig) -> Vec2 {
    let step = if large {
        config.nudge_step_large
    } else {
        config.nudge_step
    };
    Vec2::new(f64::from(dx) * step, f64::from(dy) * step)
}

/// A copy of `element` offset by `offset`, with fresh ids throughout.
pub fn duplicate(element: &Element, offset: f64) -> Element {
    let mut copy = fresh_ids(element);
    copy.geometry.left += offset;
    copy.geometry.top += offset;
    copy
}

fn fresh_ids(element: &Element) -> Element {
    let mut copy = element.clone();
    copy.id = ElementId::with_prefix(&element.kind.type_name().replace('-', ""));
    if let ElementKind::Group { objects } = &mut copy.kind {
        *objects = objects.iter().map(fresh_ids).collect();
    }
    copy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editing_swallows_shortcuts() {
        let mut interaction = Interaction::new();
        assert_eq!(
            interaction.route_key("Delete", false, false, false, false),
            Some(ShortcutAction::Delete)
        );
        interaction.set_editing(Some(ElementId::intern("ix-text")));
        assert_eq!(interaction.route_key("Delete", false, false, false, false), None);
        assert_eq!(interaction.route_key("z", true, false, false, false), None);
        assert_eq!(
            interaction.route_key("Escape", false, false, false, false),
            Some(ShortcutAction::ExitTextEditing)
        );
    }

    #[test]
    fn nudge_steps() {
        let config = SessionConfig::default();
        assert_eq!(nudge_delta(-1, 0, false, &config), Vec2::new(-1.0, 0.0));
        assert_eq!(nudge_delta(0, 1, true, &config), Vec2::new(0.0, 10.0));
    }

    #[test]
    fn duplicate_renames_whole_subtree() {
        let group = Element::group(
            "ix-g",
            10.0,
            10.0,
            vec![Element::rect("ix-r", 0.0, 0.0, 5.0, 5.0)],
        );
        let copy = duplicate(&group, 20.0);
        assert_ne!(copy.id, group.id);
        assert_ne!(copy.children()[0].id, group.children()[0].id);
        assert!(copy.id.as_str().starts_with("group_"));
        assert_eq!((copy.geometry.left, copy.geometry.top), (30.0, 30.0));
        assert_eq!(copy.children()[0].geometry, group.children()[0].geometry);
    }
}

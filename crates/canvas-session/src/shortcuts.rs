//! Key bindings for the canvas.
//!
//! Turns `KeyboardEvent.key` plus modifier flags into a [`ShortcutAction`].
//! The session decides whether an action applies; this module only names
//! it.

/// What a bound key asks the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    // history and structure
    Undo,
    Redo,
    Delete,
    SelectAll,
    Duplicate,

    // geometry
    /// Arrow-key nudge. `dx`/`dy` are -1, 0 or 1; `large` when Shift is held.
    Nudge { dx: i8, dy: i8, large: bool },

    // stacking
    SendBackward,
    BringForward,
    SendToBack,
    BringToFront,

    // selection and text
    Deselect,
    ExitTextEditing,
}

/// The binding table. `ctrl` and `meta` are interchangeable so ⌘ on macOS
/// and Ctrl elsewhere resolve alike.
pub struct ShortcutMap;

impl ShortcutMap {
    /// Binding for a key press outside text editing, if any.
    pub fn resolve(
        key: &str,
        ctrl: bool,
        shift: bool,
        _alt: bool,
        meta: bool,
    ) -> Option<ShortcutAction> {
        let cmd = ctrl || meta;

        // command+shift before plain command, so redo wins over undo
        if cmd && shift {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Redo),
                "[" | "{" => Some(ShortcutAction::SendToBack),
                "]" | "}" => Some(ShortcutAction::BringToFront),
                _ => None,
            };
        }

        if cmd {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Undo),
                "y" | "Y" => Some(ShortcutAction::Redo),
                "a" | "A" => Some(ShortcutAction::SelectAll),
                "d" | "D" => Some(ShortcutAction::Duplicate),
                "[" => Some(ShortcutAction::SendBackward),
                "]" => Some(ShortcutAction::BringForward),
                _ => None,
            };
        }

        if let Some((dx, dy)) = arrow(key) {
            return Some(ShortcutAction::Nudge {
                dx,
                dy,
                large: shift,
            });
        }

        if shift {
            return None;
        }

        match key {
            "Delete" | "Backspace" => Some(ShortcutAction::Delete),
            "Escape" => Some(ShortcutAction::Deselect),
            _ => None,
        }
    }

    /// Resolve while a text element is being edited. Keys belong to the
    /// text editor; only Escape is taken, to leave editing.
    pub fn resolve_editing(key: &str) -> Option<ShortcutAction> {
        (key == "Escape").then_some(ShortcutAction::ExitTextEditing)
    }
}

fn arrow(key: &str) -> Option<(i8, i8)> {
    match key {
        "ArrowLeft" => Some((-1, 0)),
        "ArrowRight" => Some((1, 0)),
        "ArrowUp" => Some((0, -1)),
        "ArrowDown" => Some((0, 1)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_redo() {
        assert_eq!(
            ShortcutMap::resolve("z", true, false, false, false),
            Some(ShortcutAction::Undo)
        );
        assert_eq!(
            ShortcutMap::resolve("z", false, false, false, true),
            Some(ShortcutAction::Undo)
        );
        assert_eq!(
            ShortcutMap::resolve("Z", false, true, false, true),
            Some(ShortcutAction::Redo)
        );
        assert_eq!(
            ShortcutMap::resolve("y", true, false, false, false),
            Some(ShortcutAction::Redo)
        );
    }

    #[test]
    fn delete_keys() {
        assert_eq!(
            ShortcutMap::resolve("Delete", false, false, false, false),
            Some(ShortcutAction::Delete)
        );
        assert_eq!(
            ShortcutMap::resolve("Backspace", false, false, false, false),
            Some(ShortcutAction::Delete)
        );
    }

    #[test]
    fn arrows_nudge() {
        assert_eq!(
            ShortcutMap::resolve("ArrowLeft", false, false, false, false),
            Some(ShortcutAction::Nudge {
                dx: -1,
                dy: 0,
                large: false
            })
        );
        assert_eq!(
            ShortcutMap::resolve("ArrowDown", false, true, false, false),
            Some(ShortcutAction::Nudge {
                dx: 0,
                dy: 1,
                large: true
            })
        );
    }

    #[test]
    fn z_order() {
        assert_eq!(
            ShortcutMap::resolve("[", true, false, false, false),
            Some(ShortcutAction::SendBackward)
        );
        assert_eq!(
            ShortcutMap::resolve("}", false, true, false, true),
            Some(ShortcutAction::BringToFront)
        );
    }

    #[test]
    fn editing_only_takes_escape() {
        assert_eq!(ShortcutMap::resolve_editing("Backspace"), None);
        assert_eq!(
            ShortcutMap::resolve_editing("Escape"),
            Some(ShortcutAction::ExitTextEditing)
        );
    }

    #[test]
    fn unbound_keys() {
        assert_eq!(ShortcutMap::resolve("q", false, false, false, false), None);
        assert_eq!(ShortcutMap::resolve("Delete", false, true, false, false), None);
    }
}

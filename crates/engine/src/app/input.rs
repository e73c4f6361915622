#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    ScrollLeft,
    ScrollRight,
    ScrollUp,
    ScrollDown,
    TogglePaintMode,
    BrushGrow,
    BrushShrink,
    Pause,
    FastForward,
    Nuke,
    ReleaseFaster,
    ReleaseSlower,
    ToggleRegions,
    QuickSave,
    QuickLoad,
    Restart,
    Quit,
    /// Tool slot 0..=7, bound to the number keys 1..=8.
    SelectTool(u8),
}

pub const TOOL_SLOT_COUNT: u8 = 8;
const FIXED_ACTION_COUNT: usize = 17;
const ACTION_COUNT: usize = FIXED_ACTION_COUNT + TOOL_SLOT_COUNT as usize;

/// Held state plus a press edge that survives until the next tick snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
    pressed: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        let index = action.index();
        if is_down && !self.down[index] {
            self.pressed[index] = true;
        }
        self.down[index] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }

    pub(crate) fn was_pressed(&self, action: InputAction) -> bool {
        self.pressed[action.index()]
    }

    pub(crate) fn clear_edges(&mut self) {
        self.pressed = [false; ACTION_COUNT];
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::ScrollLeft => 0,
            InputAction::ScrollRight => 1,
            InputAction::ScrollUp => 2,
            InputAction::ScrollDown => 3,
            InputAction::TogglePaintMode => 4,
            InputAction::BrushGrow => 5,
            InputAction::BrushShrink => 6,
            InputAction::Pause => 7,
            InputAction::FastForward => 8,
            InputAction::Nuke => 9,
            InputAction::ReleaseFaster => 10,
            InputAction::ReleaseSlower => 11,
            InputAction::ToggleRegions => 12,
            InputAction::QuickSave => 13,
            InputAction::QuickLoad => 14,
            InputAction::Restart => 15,
            InputAction::Quit => 16,
            InputAction::SelectTool(slot) => {
                let slot = if slot < TOOL_SLOT_COUNT {
                    slot
                } else {
                    TOOL_SLOT_COUNT - 1
                };
                FIXED_ACTION_COUNT + slot as usize
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_edge_fires_once_per_press() {
        let mut states = ActionStates::default();
        states.set(InputAction::Nuke, true);
        assert!(states.was_pressed(InputAction::Nuke));
        states.clear_edges();

        states.set(InputAction::Nuke, true);
        assert!(!states.was_pressed(InputAction::Nuke));
        assert!(states.is_down(InputAction::Nuke));

        states.set(InputAction::Nuke, false);
        states.set(InputAction::Nuke, true);
        assert!(states.was_pressed(InputAction::Nuke));
    }

    #[test]
    fn tool_slots_do_not_alias_fixed_actions() {
        let mut states = ActionStates::default();
        states.set(InputAction::SelectTool(0), true);
        assert!(!states.is_down(InputAction::Quit));
        assert!(states.is_down(InputAction::SelectTool(0)));
        assert!(!states.is_down(InputAction::SelectTool(7)));
    }
}

use std::collections::HashSet;

use glam::Vec2;

/// Logical actions the avatar and the interaction layer respond to.
///
/// Physical keys are mapped onto these by the host (see the client's
/// `bindings.yaml` handling); the frame logic never sees raw key codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    MoveForward,
    MoveBackward,
    StrafeLeft,
    StrafeRight,
    Sprint,
    Jump,
    Interact,
    Cancel,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::MoveForward,
        Action::MoveBackward,
        Action::StrafeLeft,
        Action::StrafeRight,
        Action::Sprint,
        Action::Jump,
        Action::Interact,
        Action::Cancel,
    ];

    /// Binding-file name for this action.
    pub fn name(self) -> &'static str {
        match self {
            Action::MoveForward => "move_forward",
            Action::MoveBackward => "move_backward",
            Action::StrafeLeft => "move_left",
            Action::StrafeRight => "move_right",
            Action::Sprint => "sprint",
            Action::Jump => "jump",
            Action::Interact => "interact",
            Action::Cancel => "cancel",
        }
    }

    pub fn from_name(name: &str) -> Option<Action> {
        Action::ALL.into_iter().find(|a| a.name() == name)
    }
}

/// Last-known state of every logical action plus pointer motion gathered
/// since the previous frame.
///
/// Event handlers write into this between frames; the frame tick reads it
/// once. An event that lands after the tick has sampled a value is only seen
/// on the following frame. There is no queue: a press and release that both
/// happen between two ticks leave no trace in `is_pressed`.
#[derive(Debug, Default, Clone)]
pub struct InputState {
    held: HashSet<Action>,
    just_pressed: HashSet<Action>,
    just_released: HashSet<Action>,
    pointer_delta: Vec2,
    scroll_delta: f32,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a press or release. Repeated presses of a held action are
    /// idempotent and do not produce a second edge.
    pub fn on_key_change(&mut self, action: Action, pressed: bool) {
        if pressed {
            if self.held.insert(action) {
                self.just_pressed.insert(action);
            }
        } else if self.held.remove(&action) {
            self.just_released.insert(action);
        }
    }

    /// Accumulate raw pointer motion (pixels).
    pub fn on_pointer_delta(&mut self, dx: f32, dy: f32) {
        self.pointer_delta.x += dx;
        self.pointer_delta.y += dy;
    }

    /// Accumulate scroll in wheel units where positive means "zoom out".
    pub fn on_scroll(&mut self, delta_y: f32) {
        self.scroll_delta += delta_y;
    }

    pub fn is_pressed(&self, action: Action) -> bool {
        self.held.contains(&action)
    }

    /// True if the action went from released to pressed since the last
    /// `end_frame`.
    pub fn just_pressed(&self, action: Action) -> bool {
        self.just_pressed.contains(&action)
    }

    pub fn just_released(&self, action: Action) -> bool {
        self.just_released.contains(&action)
    }

    pub fn any_just_pressed(&self) -> bool {
        !self.just_pressed.is_empty()
    }

    pub fn pointer_delta(&self) -> Vec2 {
        self.pointer_delta
    }

    pub fn scroll_delta(&self) -> f32 {
        self.scroll_delta
    }

    /// Clear edges and accumulated motion once a frame has consumed them.
    /// Held state carries over.
    pub fn end_frame(&mut self) {
        self.just_pressed.clear();
        self.just_released.clear();
        self.pointer_delta = Vec2::ZERO;
        self.scroll_delta = 0.0;
    }

    /// Drop everything, including held actions (focus loss).
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_press_is_idempotent() {
        let mut state = InputState::new();
        state.on_key_change(Action::Jump, true);
        state.end_frame();
        state.on_key_change(Action::Jump, true);
        assert!(state.is_pressed(Action::Jump));
        assert!(!state.just_pressed(Action::Jump));
    }

    #[test]
    fn test_press_release_between_frames_is_missed() {
        let mut state = InputState::new();
        state.on_key_change(Action::MoveForward, true);
        state.on_key_change(Action::MoveForward, false);
        assert!(!state.is_pressed(Action::MoveForward));
    }

    #[test]
    fn test_end_frame_keeps_held_clears_motion() {
        let mut state = InputState::new();
        state.on_key_change(Action::Sprint, true);
        state.on_pointer_delta(4.0, -2.0);
        state.on_scroll(1.5);
        assert!(state.just_pressed(Action::Sprint));

        state.end_frame();
        assert!(state.is_pressed(Action::Sprint));
        assert!(!state.just_pressed(Action::Sprint));
        assert_eq!(state.pointer_delta(), Vec2::ZERO);
        assert_eq!(state.scroll_delta(), 0.0);
    }

    #[test]
    fn test_action_names_round_trip() {
        for action in Action::ALL {
            assert_eq!(Action::from_name(action.name()), Some(action));
        }
        assert_eq!(Action::from_name("attack"), None);
    }
}

use std::collections::{HashMap, HashSet};
use std::path::Path;

use citywalk_core::input::{Action, InputState};
use serde::{Deserialize, Serialize};
use winit::event::{DeviceEvent, ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Browser-style wheel units per scroll line.
const PIXELS_PER_LINE: f32 = 100.0;

/// Action names mapped to physical inputs via input/bindings.yaml.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputBindings {
    #[serde(default)]
    pub actions: HashMap<String, Vec<String>>,
}

impl Default for InputBindings {
    fn default() -> Self {
        let mut actions = HashMap::new();
        let mut bind = |action: Action, keys: &[&str]| {
            actions.insert(
                action.name().to_string(),
                keys.iter().map(|k| k.to_string()).collect(),
            );
        };
        bind(Action::MoveForward, &["W", "ArrowUp"]);
        bind(Action::MoveBackward, &["S", "ArrowDown"]);
        bind(Action::StrafeLeft, &["A", "ArrowLeft"]);
        bind(Action::StrafeRight, &["D", "ArrowRight"]);
        bind(Action::Sprint, &["ShiftLeft", "ShiftRight"]);
        bind(Action::Jump, &["Space"]);
        bind(Action::Interact, &["E"]);
        bind(Action::Cancel, &["Escape"]);
        Self { actions }
    }
}

/// Load input bindings from a YAML file, with defaults as fallback.
pub fn load_bindings(project_root: &Path) -> InputBindings {
    let path = project_root.join("input/bindings.yaml");
    if path.exists() {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(bindings) => {
                    tracing::info!("Loaded input bindings from {:?}", path);
                    return bindings;
                }
                Err(e) => tracing::warn!("Failed to parse bindings.yaml: {}", e),
            },
            Err(e) => tracing::warn!("Failed to read bindings.yaml: {}", e),
        }
    }
    tracing::info!("Using default input bindings");
    InputBindings::default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Trigger {
    Key(KeyCode),
    Mouse(MouseButton),
}

/// Maps key name strings to winit KeyCode.
pub fn key_name_to_code(name: &str) -> Option<KeyCode> {
    match name {
        "A" => Some(KeyCode::KeyA),
        "B" => Some(KeyCode::KeyB),
        "C" => Some(KeyCode::KeyC),
        "D" => Some(KeyCode::KeyD),
        "E" => Some(KeyCode::KeyE),
        "F" => Some(KeyCode::KeyF),
        "G" => Some(KeyCode::KeyG),
        "H" => Some(KeyCode::KeyH),
        "I" => Some(KeyCode::KeyI),
        "J" => Some(KeyCode::KeyJ),
        "K" => Some(KeyCode::KeyK),
        "L" => Some(KeyCode::KeyL),
        "M" => Some(KeyCode::KeyM),
        "N" => Some(KeyCode::KeyN),
        "O" => Some(KeyCode::KeyO),
        "P" => Some(KeyCode::KeyP),
        "Q" => Some(KeyCode::KeyQ),
        "R" => Some(KeyCode::KeyR),
        "S" => Some(KeyCode::KeyS),
        "T" => Some(KeyCode::KeyT),
        "U" => Some(KeyCode::KeyU),
        "V" => Some(KeyCode::KeyV),
        "W" => Some(KeyCode::KeyW),
        "X" => Some(KeyCode::KeyX),
        "Y" => Some(KeyCode::KeyY),
        "Z" => Some(KeyCode::KeyZ),
        "Space" => Some(KeyCode::Space),
        "ShiftLeft" => Some(KeyCode::ShiftLeft),
        "ShiftRight" => Some(KeyCode::ShiftRight),
        "ControlLeft" => Some(KeyCode::ControlLeft),
        "ControlRight" => Some(KeyCode::ControlRight),
        "Escape" => Some(KeyCode::Escape),
        "Enter" => Some(KeyCode::Enter),
        "Tab" => Some(KeyCode::Tab),
        "ArrowUp" => Some(KeyCode::ArrowUp),
        "ArrowDown" => Some(KeyCode::ArrowDown),
        "ArrowLeft" => Some(KeyCode::ArrowLeft),
        "ArrowRight" => Some(KeyCode::ArrowRight),
        _ => None,
    }
}

fn trigger_from_name(name: &str) -> Option<Trigger> {
    match name {
        "MouseLeft" => Some(Trigger::Mouse(MouseButton::Left)),
        "MouseRight" => Some(Trigger::Mouse(MouseButton::Right)),
        "MouseMiddle" => Some(Trigger::Mouse(MouseButton::Middle)),
        _ => key_name_to_code(name).map(Trigger::Key),
    }
}

/// Translates window-system events into action state.
///
/// An action counts as held while any of its bound inputs is held, so
/// pressing W and ArrowUp together and releasing one keeps moving forward.
pub struct InputTranslator {
    bindings: HashMap<Action, Vec<Trigger>>,
    held: HashSet<Trigger>,
}

impl InputTranslator {
    pub fn new(bindings: &InputBindings) -> Self {
        let mut resolved: HashMap<Action, Vec<Trigger>> = HashMap::new();
        for (name, inputs) in &bindings.actions {
            let Some(action) = Action::from_name(name) else {
                tracing::warn!("Unknown action '{}' in bindings", name);
                continue;
            };
            for input in inputs {
                match trigger_from_name(input) {
                    Some(trigger) => resolved.entry(action).or_default().push(trigger),
                    None => tracing::warn!("Unknown input '{}' bound to '{}'", input, name),
                }
            }
        }
        Self {
            bindings: resolved,
            held: HashSet::new(),
        }
    }

    /// Swap bindings (hot reload). Held inputs carry over.
    pub fn rebind(&mut self, bindings: &InputBindings, state: &mut InputState) {
        let held = std::mem::take(&mut self.held);
        *self = Self::new(bindings);
        self.held = held;
        self.refresh(state);
    }

    pub fn apply_key(&mut self, code: KeyCode, pressed: bool, state: &mut InputState) {
        self.apply(Trigger::Key(code), pressed, state);
    }

    pub fn apply_mouse(&mut self, button: MouseButton, pressed: bool, state: &mut InputState) {
        self.apply(Trigger::Mouse(button), pressed, state);
    }

    /// Apply a key by binding name. Returns false for unknown names.
    pub fn apply_key_name(&mut self, name: &str, pressed: bool, state: &mut InputState) -> bool {
        match trigger_from_name(name) {
            Some(trigger) => {
                self.apply(trigger, pressed, state);
                true
            }
            None => false,
        }
    }

    fn apply(&mut self, trigger: Trigger, pressed: bool, state: &mut InputState) {
        if pressed {
            self.held.insert(trigger);
        } else {
            self.held.remove(&trigger);
        }
        for (action, triggers) in &self.bindings {
            if triggers.contains(&trigger) {
                let held = triggers.iter().any(|t| self.held.contains(t));
                state.on_key_change(*action, held);
            }
        }
    }

    fn refresh(&self, state: &mut InputState) {
        for action in Action::ALL {
            let held = self
                .bindings
                .get(&action)
                .map_or(false, |triggers| triggers.iter().any(|t| self.held.contains(t)));
            state.on_key_change(action, held);
        }
    }

    /// Release everything (window focus lost).
    pub fn release_all(&mut self, state: &mut InputState) {
        self.held.clear();
        self.refresh(state);
    }

    /// Process a winit WindowEvent.
    pub fn handle_window_event(&mut self, event: &WindowEvent, state: &mut InputState) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    self.apply_key(code, event.state == ElementState::Pressed, state);
                }
            }
            WindowEvent::MouseInput {
                state: button_state,
                button,
                ..
            } => {
                self.apply_mouse(*button, *button_state == ElementState::Pressed, state);
            }
            WindowEvent::MouseWheel { delta, .. } => match delta {
                // Wheel up is negative here, matching a browser's deltaY.
                MouseScrollDelta::LineDelta(_, y) => state.on_scroll(-y * PIXELS_PER_LINE),
                MouseScrollDelta::PixelDelta(pos) => state.on_scroll(-pos.y as f32),
            },
            WindowEvent::Focused(false) => self.release_all(state),
            _ => {}
        }
    }

    /// Process a winit DeviceEvent (for raw mouse motion).
    pub fn handle_device_event(&mut self, event: &DeviceEvent, state: &mut InputState) {
        if let DeviceEvent::MouseMotion { delta } = event {
            state.on_pointer_delta(delta.0 as f32, delta.1 as f32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings_cover_every_action() {
        let bindings = InputBindings::default();
        for action in Action::ALL {
            assert!(bindings.actions.contains_key(action.name()), "{}", action.name());
        }
    }

    #[test]
    fn test_key_name_mapping() {
        assert_eq!(key_name_to_code("W"), Some(KeyCode::KeyW));
        assert_eq!(key_name_to_code("Space"), Some(KeyCode::Space));
        assert_eq!(key_name_to_code("ShiftLeft"), Some(KeyCode::ShiftLeft));
        assert_eq!(key_name_to_code("Invalid"), None);
    }

    #[test]
    fn test_alternate_keys_share_action() {
        let mut translator = InputTranslator::new(&InputBindings::default());
        let mut state = InputState::new();

        translator.apply_key(KeyCode::KeyW, true, &mut state);
        translator.apply_key(KeyCode::ArrowUp, true, &mut state);
        assert!(state.is_pressed(Action::MoveForward));

        translator.apply_key(KeyCode::KeyW, false, &mut state);
        assert!(state.is_pressed(Action::MoveForward));
        assert!(!state.just_released(Action::MoveForward));

        translator.apply_key(KeyCode::ArrowUp, false, &mut state);
        assert!(!state.is_pressed(Action::MoveForward));
        assert!(state.just_released(Action::MoveForward));
    }

    #[test]
    fn test_key_repeat_is_one_edge() {
        let mut translator = InputTranslator::new(&InputBindings::default());
        let mut state = InputState::new();
        translator.apply_key(KeyCode::KeyE, true, &mut state);
        state.end_frame();
        translator.apply_key(KeyCode::KeyE, true, &mut state);
        assert!(state.is_pressed(Action::Interact));
        assert!(!state.just_pressed(Action::Interact));
    }

    #[test]
    fn test_yaml_bindings_override() {
        let yaml = "actions:\n  jump: [\"J\"]\n  interact: [\"MouseRight\", \"F\"]\n";
        let bindings: InputBindings = serde_yaml::from_str(yaml).unwrap();
        let mut translator = InputTranslator::new(&bindings);
        let mut state = InputState::new();

        translator.apply_key(KeyCode::Space, true, &mut state);
        assert!(!state.is_pressed(Action::Jump));
        translator.apply_key(KeyCode::KeyJ, true, &mut state);
        assert!(state.is_pressed(Action::Jump));
        translator.apply_mouse(MouseButton::Right, true, &mut state);
        assert!(state.just_pressed(Action::Interact));
    }

    #[test]
    fn test_release_all_clears_held() {
        let mut translator = InputTranslator::new(&InputBindings::default());
        let mut state = InputState::new();
        translator.apply_key(KeyCode::KeyD, true, &mut state);
        translator.release_all(&mut state);
        assert!(!state.is_pressed(Action::StrafeRight));
    }
}

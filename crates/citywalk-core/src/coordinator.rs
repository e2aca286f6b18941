use glam::Vec3;

use crate::animation::AnimationClipRegistry;
use crate::camera::OrbitCamera;
use crate::events::{names, EventBus};
use crate::input::{Action, InputState};
use crate::locomotion::{CollisionHost, LocomotionController, LocomotionReport};
use crate::proximity::{PromptChange, ProximityGate, ProximitySample};

/// The chat panel as seen from the frame loop.
pub trait ChatCollaborator {
    fn is_open(&self) -> bool;
    fn open(&mut self);
    fn close(&mut self);
}

/// Per-frame inputs from the host.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub input: &'a InputState,
    pub dt: f32,
    pub npc_position: Vec3,
}

#[derive(Debug, Clone, Copy)]
pub struct FrameReport {
    pub locomotion: LocomotionReport,
    pub proximity: ProximitySample,
    pub chat_opened: bool,
    pub chat_closed: bool,
    /// The host should release pointer capture (chat took focus).
    pub release_capture: bool,
}

/// Orders one frame of camera, locomotion, proximity and chat gating.
///
/// Input events that arrive while a frame is running are not seen until the
/// next frame: `tick` reads the `InputState` it is handed and nothing else.
pub struct GameLoop {
    pub camera: OrbitCamera,
    pub locomotion: LocomotionController,
    pub proximity: ProximityGate,
}

impl GameLoop {
    pub fn new(camera: OrbitCamera, locomotion: LocomotionController, proximity: ProximityGate) -> Self {
        Self {
            camera,
            locomotion,
            proximity,
        }
    }

    pub fn tick(
        &mut self,
        frame: FrameInput<'_>,
        clips: &mut AnimationClipRegistry,
        host: &mut dyn CollisionHost,
        chat: &mut dyn ChatCollaborator,
        events: &mut EventBus,
    ) -> FrameReport {
        let input = frame.input;

        let delta = input.pointer_delta();
        self.camera.apply_pointer_delta(delta.x, delta.y);
        self.camera.apply_scroll(input.scroll_delta());

        clips.advance(frame.dt);

        // Chat may have been closed by the host (close button) between frames.
        self.locomotion.set_locked(chat.is_open(), clips);

        let locomotion = self
            .locomotion
            .update(input, self.camera.yaw(), frame.dt, clips, host);
        if locomotion.jumped {
            events.emit_simple(names::JUMP_START);
        }
        if locomotion.landed {
            events.emit_simple(names::JUMP_LAND);
        }
        if locomotion.state_changed() {
            events.emit_with(
                names::MOTION_CHANGED,
                "state",
                serde_json::json!(locomotion.state.as_str()),
            );
        }

        let proximity = self
            .proximity
            .update(self.locomotion.position(), frame.npc_position);
        match proximity.change {
            Some(PromptChange::Show) => events.emit_simple(names::PROMPT_SHOW),
            Some(PromptChange::Hide) => events.emit_simple(names::PROMPT_HIDE),
            None => {}
        }

        let mut report = FrameReport {
            locomotion,
            proximity,
            chat_opened: false,
            chat_closed: false,
            release_capture: false,
        };

        if input.just_pressed(Action::Interact) && !chat.is_open() && self.proximity.is_near() {
            if self.proximity.prompt_visible() {
                events.emit_simple(names::PROMPT_HIDE);
            }
            self.proximity.force_hide();
            chat.open();
            self.locomotion.set_locked(true, clips);
            self.camera.set_captured(false);
            events.emit_simple(names::CHAT_OPEN);
            tracing::info!("Chat opened");
            report.chat_opened = true;
            report.release_capture = true;
        } else if input.just_pressed(Action::Cancel) && chat.is_open() {
            chat.close();
            self.locomotion.set_locked(false, clips);
            events.emit_simple(names::CHAT_CLOSE);
            tracing::info!("Chat closed");
            report.chat_closed = true;
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CameraConfig, LocomotionConfig};
    use crate::locomotion::{MotionState, OpenGround};
    use glam::Quat;

    #[derive(Default)]
    struct Panel {
        open: bool,
        opened: usize,
    }

    impl ChatCollaborator for Panel {
        fn is_open(&self) -> bool {
            self.open
        }
        fn open(&mut self) {
            self.open = true;
            self.opened += 1;
        }
        fn close(&mut self) {
            self.open = false;
        }
    }

    struct Rig {
        game: GameLoop,
        clips: AnimationClipRegistry,
        chat: Panel,
        events: EventBus,
        input: InputState,
    }

    impl Rig {
        fn new(start: Vec3) -> Self {
            let mut camera = OrbitCamera::new(&CameraConfig::default());
            camera.set_captured(true);
            let locomotion =
                LocomotionController::new(start, Quat::IDENTITY, LocomotionConfig::default()).unwrap();
            Self {
                game: GameLoop::new(camera, locomotion, ProximityGate::new(3.5)),
                clips: AnimationClipRegistry::default(),
                chat: Panel::default(),
                events: EventBus::new(64),
                input: InputState::new(),
            }
        }

        fn frame(&mut self, dt: f32) -> FrameReport {
            let report = self.game.tick(
                FrameInput {
                    input: &self.input,
                    dt,
                    npc_position: Vec3::ZERO,
                },
                &mut self.clips,
                &mut OpenGround,
                &mut self.chat,
                &mut self.events,
            );
            self.events.flush();
            self.input.end_frame();
            report
        }

        fn tap(&mut self, action: Action) -> FrameReport {
            self.input.on_key_change(action, true);
            let report = self.frame(0.016);
            self.input.on_key_change(action, false);
            report
        }
    }

    #[test]
    fn test_interact_far_away_does_nothing() {
        let mut rig = Rig::new(Vec3::new(0.0, 0.0, 20.0));
        let report = rig.tap(Action::Interact);
        assert!(!report.chat_opened);
        assert!(!rig.chat.is_open());
    }

    #[test]
    fn test_interact_cancel_flow() {
        let mut rig = Rig::new(Vec3::new(0.0, 0.0, 2.0));
        let first = rig.frame(0.016);
        assert_eq!(first.proximity.change, Some(PromptChange::Show));

        let report = rig.tap(Action::Interact);
        assert!(report.chat_opened);
        assert!(report.release_capture);
        assert!(rig.chat.is_open());
        assert!(!rig.game.proximity.prompt_visible());
        assert!(rig.game.locomotion.is_locked());
        assert!(!rig.game.camera.is_captured());

        // Interact again while open is ignored.
        rig.tap(Action::Interact);
        assert_eq!(rig.chat.opened, 1);

        let report = rig.tap(Action::Cancel);
        assert!(report.chat_closed);
        assert!(!rig.chat.is_open());
        assert!(!rig.game.locomotion.is_locked());
        // Still in range, but the prompt stays hidden until a fresh approach.
        assert!(!rig.game.proximity.prompt_visible());

        assert_eq!(rig.events.count(names::CHAT_OPEN), 1);
        assert_eq!(rig.events.count(names::CHAT_CLOSE), 1);
        assert_eq!(rig.events.count(names::PROMPT_SHOW), 1);
        assert_eq!(rig.events.count(names::PROMPT_HIDE), 1);
    }

    #[test]
    fn test_chat_open_freezes_avatar() {
        let mut rig = Rig::new(Vec3::new(0.0, 0.0, 2.0));
        rig.frame(0.016);
        rig.tap(Action::Interact);
        let before = rig.game.locomotion.transform();

        rig.input.on_key_change(Action::MoveForward, true);
        rig.input.on_key_change(Action::Jump, true);
        for _ in 0..20 {
            let report = rig.frame(0.05);
            assert!(report.locomotion.skipped);
        }
        assert_eq!(rig.game.locomotion.transform(), before);
        assert_eq!(rig.game.locomotion.state(), MotionState::Idle);
    }

    #[test]
    fn test_chat_closed_externally_unlocks() {
        let mut rig = Rig::new(Vec3::new(0.0, 0.0, 2.0));
        rig.frame(0.016);
        rig.tap(Action::Interact);
        rig.chat.close();

        rig.input.on_key_change(Action::MoveForward, true);
        let report = rig.frame(0.1);
        assert!(!report.locomotion.skipped);
        assert_eq!(rig.game.locomotion.state(), MotionState::Walk);
    }

    #[test]
    fn test_cancel_without_chat_is_noop() {
        let mut rig = Rig::new(Vec3::ZERO);
        let report = rig.tap(Action::Cancel);
        assert!(!report.chat_closed);
        assert_eq!(rig.events.count(names::CHAT_CLOSE), 0);
    }

    #[test]
    fn test_motion_events_emitted() {
        let mut rig = Rig::new(Vec3::new(0.0, 0.0, 50.0));
        rig.input.on_key_change(Action::MoveForward, true);
        rig.frame(0.016);
        rig.tap(Action::Jump);
        for _ in 0..120 {
            rig.frame(0.016);
        }
        assert_eq!(rig.events.count(names::JUMP_START), 1);
        assert_eq!(rig.events.count(names::JUMP_LAND), 1);
        assert!(rig.events.count(names::MOTION_CHANGED) >= 3);
    }
}

//! A running game without a window: scene, physics, chat and the frame loop
//! wired together. The window host and the script runner both drive this.

use std::path::{Path, PathBuf};

use citywalk_core::animation::AnimationClipRegistry;
use citywalk_core::camera::OrbitCamera;
use citywalk_core::config::{ConfigError as TuningError, TuningConfig};
use citywalk_core::coordinator::{ChatCollaborator, FrameInput, FrameReport, GameLoop};
use citywalk_core::events::EventBus;
use citywalk_core::input::InputState;
use citywalk_core::locomotion::{ControllerError, LocomotionController};
use citywalk_core::proximity::ProximityGate;
use glam::{Quat, Vec3};

use crate::assets;
use crate::chat::{ChatPanel, ChatService, NpcConfig};
use crate::input::{self, InputBindings, InputTranslator};
use crate::physics::PhysicsWorld;
use crate::project_config::{self, CitywalkConfig};
use crate::world::{self, CityWorld};

#[derive(Debug)]
pub enum SessionError {
    MissingAvatar,
    MissingNpc,
    Controller(ControllerError),
    Tuning(TuningError),
    Config(project_config::ConfigError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::MissingAvatar => write!(f, "scene has no avatar"),
            SessionError::MissingNpc => write!(f, "scene has no NPC"),
            SessionError::Controller(e) => write!(f, "locomotion setup failed: {}", e),
            SessionError::Tuning(e) => write!(f, "{}", e),
            SessionError::Config(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<ControllerError> for SessionError {
    fn from(e: ControllerError) -> Self {
        SessionError::Controller(e)
    }
}

impl From<TuningError> for SessionError {
    fn from(e: TuningError) -> Self {
        SessionError::Tuning(e)
    }
}

impl From<project_config::ConfigError> for SessionError {
    fn from(e: project_config::ConfigError) -> Self {
        SessionError::Config(e)
    }
}

/// Everything a session is built from. `load` fills this from disk; tests
/// build it by hand.
pub struct SessionParts {
    pub project_root: PathBuf,
    pub config: CitywalkConfig,
    pub city: CityWorld,
    pub physics: PhysicsWorld,
    pub clips: AnimationClipRegistry,
    pub chat: ChatPanel,
    pub bindings: InputBindings,
}

pub struct GameSession {
    pub project_root: PathBuf,
    pub config: CitywalkConfig,
    pub city: CityWorld,
    pub physics: PhysicsWorld,
    pub clips: AnimationClipRegistry,
    pub game: GameLoop,
    pub chat: ChatPanel,
    pub events: EventBus,
    pub input: InputState,
    pub translator: InputTranslator,
    pub frame_count: u64,
    pub total_time: f32,
}

impl GameSession {
    /// Load models, place the city and characters, and build the session.
    pub fn load(project_root: &Path, config: CitywalkConfig) -> Result<Self, SessionError> {
        config.tuning.validate()?;

        let mut city = CityWorld::new();
        let mut physics = PhysicsWorld::new();

        if config.assets.city_layout {
            city.spawn_city(project_root, &world::perimeter_layout(), &mut physics);
        }

        let player_model = assets::load_model_or_fallback(project_root, &config.assets.player_model);
        let avatar = city.spawn_avatar(&player_model, Vec3::ZERO);
        let avatar_position = city.position_of(avatar).ok_or(SessionError::MissingAvatar)?;
        physics.add_character_body(avatar, avatar_position);
        let clips = AnimationClipRegistry::from_sources(&player_model.clips);
        if clips.is_empty() {
            tracing::warn!("Player model has no recognised clips; animation is disabled");
        }

        let npc_config = NpcConfig::load_or_default(&project_root.join(&config.assets.npc_config));
        let npc_model = assets::load_model_or_fallback(project_root, &config.assets.npc_model);
        city.spawn_npc(&npc_config.npc_name, &npc_model, config.npc.spawn_position());

        let bindings = input::load_bindings(project_root);

        Self::assemble(SessionParts {
            project_root: project_root.to_path_buf(),
            config,
            city,
            physics,
            clips,
            chat: ChatPanel::new(ChatService::new(npc_config)),
            bindings,
        })
    }

    /// Build from parts. The avatar and NPC must already be spawned.
    pub fn assemble(parts: SessionParts) -> Result<Self, SessionError> {
        let avatar = parts.city.avatar.ok_or(SessionError::MissingAvatar)?;
        parts.city.npc.ok_or(SessionError::MissingNpc)?;
        let (position, rotation) = {
            let transform = parts
                .city
                .world
                .get::<&citywalk_core::components::Transform>(avatar)
                .map_err(|_| SessionError::MissingAvatar)?;
            (transform.position, transform.rotation)
        };

        let tuning = &parts.config.tuning;
        let locomotion = LocomotionController::new(position, rotation, tuning.locomotion.clone())?;
        let camera = OrbitCamera::new(&tuning.camera);
        let proximity = ProximityGate::new(tuning.interaction.radius);

        Ok(Self {
            project_root: parts.project_root,
            translator: InputTranslator::new(&parts.bindings),
            config: parts.config,
            city: parts.city,
            physics: parts.physics,
            clips: parts.clips,
            game: GameLoop::new(camera, locomotion, proximity),
            chat: parts.chat,
            events: EventBus::new(1000),
            input: InputState::new(),
            frame_count: 0,
            total_time: 0.0,
        })
    }

    /// Clamp a host frame delta to something the integrator accepts.
    pub fn clamp_dt(&self, dt: f32) -> f32 {
        if !dt.is_finite() || dt <= 0.0 {
            return 0.0;
        }
        dt.min(self.config.tuning.frame.max_dt)
    }

    /// Run one frame on the input gathered since the last one.
    pub fn frame(&mut self, dt: f32) -> FrameReport {
        let dt = self.clamp_dt(dt);
        self.chat.poll();

        let npc_position = self.city.npc_position().unwrap_or(Vec3::ZERO);
        let report = self.game.tick(
            FrameInput {
                input: &self.input,
                dt,
                npc_position,
            },
            &mut self.clips,
            &mut self.physics,
            &mut self.chat,
            &mut self.events,
        );

        let locomotion = &self.game.locomotion;
        self.city.sync_avatar(locomotion.position(), locomotion.rotation());
        self.city.advance_idle_clips(dt);

        self.events.tick(dt as f64);
        self.events.flush();
        self.input.end_frame();
        self.frame_count += 1;
        self.total_time += dt;
        report
    }

    pub fn avatar_position(&self) -> Vec3 {
        self.game.locomotion.position()
    }

    pub fn avatar_rotation(&self) -> Quat {
        self.game.locomotion.rotation()
    }

    /// Where the orbit camera's eye sits this frame.
    pub fn camera_eye(&self) -> Vec3 {
        self.game.camera.eye_position(self.avatar_position())
    }

    /// Engage pointer capture so the orbit camera follows the mouse.
    pub fn capture_pointer(&mut self) {
        if !self.chat.is_open() {
            self.game.camera.set_captured(true);
        }
    }

    pub fn release_pointer(&mut self) {
        self.game.camera.set_captured(false);
    }

    /// Swap tunables without moving anything or touching the ground level.
    pub fn apply_tuning(&mut self, tuning: TuningConfig) -> Result<(), SessionError> {
        tuning.validate()?;
        self.game.locomotion.retune(tuning.locomotion.clone())?;
        self.game.camera.retune(&tuning.camera);
        self.game.proximity.set_radius(tuning.interaction.radius);
        self.config.tuning = tuning;
        tracing::info!("Tuning applied");
        Ok(())
    }

    /// Re-read citywalk.yaml and apply its tuning section.
    pub fn reload_config(&mut self) -> Result<(), SessionError> {
        let path = self.project_root.join(project_config::CONFIG_FILE);
        let config = project_config::load_config(&path)?;
        self.apply_tuning(config.tuning)
    }

    /// Write every emitted game event to `path` as JSON lines.
    pub fn log_events_to(&mut self, path: PathBuf) {
        self.events.enable_file_logging(path);
    }

    pub fn reload_bindings(&mut self) {
        let bindings = input::load_bindings(&self.project_root);
        self.translator.rebind(&bindings, &mut self.input);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::assets::ModelAsset;
    use citywalk_core::input::Action;
    use citywalk_core::locomotion::MotionState;

    pub(crate) fn test_session(npc_at: Vec3) -> GameSession {
        let mut city = CityWorld::new();
        let mut physics = PhysicsWorld::new();
        let model = ModelAsset::fallback_capsule("player.glb");
        let avatar = city.spawn_avatar(&model, Vec3::ZERO);
        physics.add_character_body(avatar, city.position_of(avatar).unwrap());
        city.spawn_npc("Sage", &ModelAsset::fallback_capsule("npc.glb"), npc_at);

        let npc = NpcConfig {
            npc_name: "Sage".into(),
            api_key: "YOUR_API_KEY_HERE".into(),
            ..NpcConfig::default()
        };
        GameSession::assemble(SessionParts {
            project_root: std::env::temp_dir(),
            config: CitywalkConfig::default(),
            city,
            physics,
            clips: AnimationClipRegistry::default(),
            chat: ChatPanel::new(ChatService::new(npc)),
            bindings: InputBindings::default(),
        })
        .unwrap()
    }

    #[test]
    fn test_missing_avatar_is_fatal() {
        let mut city = CityWorld::new();
        city.spawn_npc("Sage", &ModelAsset::fallback_capsule("npc.glb"), Vec3::ZERO);
        let result = GameSession::assemble(SessionParts {
            project_root: PathBuf::new(),
            config: CitywalkConfig::default(),
            city,
            physics: PhysicsWorld::new(),
            clips: AnimationClipRegistry::default(),
            chat: ChatPanel::new(ChatService::new(NpcConfig::default())),
            bindings: InputBindings::default(),
        });
        assert!(matches!(result, Err(SessionError::MissingAvatar)));
    }

    #[test]
    fn test_missing_npc_is_fatal() {
        let mut city = CityWorld::new();
        city.spawn_avatar(&ModelAsset::fallback_capsule("player.glb"), Vec3::ZERO);
        let result = GameSession::assemble(SessionParts {
            project_root: PathBuf::new(),
            config: CitywalkConfig::default(),
            city,
            physics: PhysicsWorld::new(),
            clips: AnimationClipRegistry::default(),
            chat: ChatPanel::new(ChatService::new(NpcConfig::default())),
            bindings: InputBindings::default(),
        });
        assert!(matches!(result, Err(SessionError::MissingNpc)));
    }

    #[test]
    fn test_ground_level_from_model_offset() {
        let session = test_session(Vec3::new(50.0, 0.0, 50.0));
        assert!((session.game.locomotion.ground_level() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_large_dt_is_clamped() {
        let mut session = test_session(Vec3::new(50.0, 0.0, 50.0));
        session.input.on_key_change(Action::MoveForward, true);
        let report = session.frame(5.0);
        // max_dt 0.1 at walk speed 3
        assert!((report.locomotion.displacement.length() - 0.3).abs() < 1e-5);
        assert_eq!(session.game.locomotion.state(), MotionState::Walk);
    }

    #[test]
    fn test_walk_to_npc_and_chat() {
        // Default camera yaw looks down +X.
        let mut session = test_session(Vec3::new(6.0, 0.0, 0.0));
        session.input.on_key_change(Action::MoveForward, true);
        let mut shown = false;
        for _ in 0..60 {
            let report = session.frame(1.0 / 30.0);
            shown |= report.proximity.change.is_some();
        }
        session.input.on_key_change(Action::MoveForward, false);
        assert!(shown);
        assert!(session.game.proximity.is_near());

        session.input.on_key_change(Action::Interact, true);
        let report = session.frame(1.0 / 30.0);
        assert!(report.chat_opened);
        assert!(session.chat.is_open());
        assert_eq!(session.chat.transcript().len(), 1);
    }

    #[test]
    fn test_apply_tuning_keeps_ground_and_position() {
        let mut session = test_session(Vec3::new(50.0, 0.0, 50.0));
        session.input.on_key_change(Action::MoveForward, true);
        session.frame(0.1);
        let before = session.avatar_position();

        let mut tuning = TuningConfig::default();
        tuning.locomotion.walk_speed = 5.0;
        tuning.interaction.radius = 10.0;
        session.apply_tuning(tuning).unwrap();
        assert_eq!(session.avatar_position(), before);
        assert!((session.game.locomotion.ground_level() - 0.9).abs() < 1e-6);
        assert_eq!(session.game.proximity.radius(), 10.0);

        let report = session.frame(0.1);
        assert!((report.locomotion.displacement.length() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_event_log_records_frame_events() {
        let path = std::env::temp_dir().join(format!("citywalk_session_{}.jsonl", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let mut session = test_session(Vec3::new(50.0, 0.0, 50.0));
        session.log_events_to(path.clone());

        session.input.on_key_change(Action::Jump, true);
        session.frame(1.0 / 60.0);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.lines().any(|line| line.contains("jump.start")));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_camera_eye_trails_walking_avatar() {
        let mut session = test_session(Vec3::new(50.0, 0.0, 50.0));
        session.input.on_key_change(Action::MoveForward, true);
        for _ in 0..10 {
            session.frame(0.1);
        }
        let avatar = session.avatar_position();
        let eye = session.camera_eye();
        // Walking down +X with the eye behind and above.
        assert!(eye.x < avatar.x);
        assert!(eye.y > avatar.y);
        assert!((eye - avatar).length() > 4.0);
    }
}

use glam::{Quat, Vec2, Vec3};

use crate::animation::{AnimationClipRegistry, ClipName};
use crate::camera::forward_from_yaw;
use crate::config::{ConfigError, LocomotionConfig};
use crate::input::{Action, InputState};

/// Avatar locomotion/animation mode. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MotionState {
    #[default]
    Idle,
    Walk,
    Sprint,
    Jump,
    Dance,
}

impl MotionState {
    /// Clip played while in this state.
    pub fn clip(self) -> ClipName {
        match self {
            MotionState::Idle => ClipName::Idle,
            MotionState::Walk => ClipName::Walk,
            MotionState::Sprint => ClipName::Sprint,
            MotionState::Jump => ClipName::JumpLoop,
            MotionState::Dance => ClipName::Dance,
        }
    }

    /// Clip playback speed for this state.
    pub fn playback_speed(self, config: &LocomotionConfig) -> f32 {
        match self {
            MotionState::Sprint => config.sprint_anim_speed,
            _ => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MotionState::Idle => "idle",
            MotionState::Walk => "walk",
            MotionState::Sprint => "sprint",
            MotionState::Jump => "jump",
            MotionState::Dance => "dance",
        }
    }

    pub fn from_name(name: &str) -> Option<MotionState> {
        match name {
            "idle" => Some(MotionState::Idle),
            "walk" => Some(MotionState::Walk),
            "sprint" => Some(MotionState::Sprint),
            "jump" => Some(MotionState::Jump),
            "dance" => Some(MotionState::Dance),
            _ => None,
        }
    }
}

impl std::fmt::Display for MotionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vertical jump integration state. `velocity` is zero whenever `active` is
/// false.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JumpState {
    pub active: bool,
    pub velocity: f32,
}

/// A transition waiting on a one-shot clip to play out, polled each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransition {
    pub on_clip: ClipName,
    pub next: MotionState,
}

/// Avatar position and orientation, owned by the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvatarTransform {
    pub position: Vec3,
    pub rotation: Quat,
}

/// Resolves horizontal movement against world geometry.
pub trait CollisionHost {
    /// Slide `displacement` from `position` and return where the avatar ends
    /// up.
    fn move_with_collision(&mut self, position: Vec3, displacement: Vec3) -> Vec3;
}

/// A host with nothing to collide with.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenGround;

impl CollisionHost for OpenGround {
    fn move_with_collision(&mut self, position: Vec3, displacement: Vec3) -> Vec3 {
        position + displacement
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerError {
    NonFinitePlacement(Vec3),
    Config(ConfigError),
}

impl std::fmt::Display for ControllerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerError::NonFinitePlacement(p) => {
                write!(f, "avatar placed at non-finite position {}", p)
            }
            ControllerError::Config(e) => write!(f, "invalid locomotion tuning: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(e: ConfigError) -> Self {
        ControllerError::Config(e)
    }
}

/// What one `update` call did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocomotionReport {
    /// True when the controller was locked and nothing ran.
    pub skipped: bool,
    /// Horizontal displacement requested from the collision host.
    pub displacement: Vec3,
    pub previous_state: MotionState,
    pub state: MotionState,
    pub jumped: bool,
    pub landed: bool,
}

impl LocomotionReport {
    fn idle_frame(state: MotionState, skipped: bool) -> Self {
        Self {
            skipped,
            displacement: Vec3::ZERO,
            previous_state: state,
            state,
            jumped: false,
            landed: false,
        }
    }

    pub fn state_changed(&self) -> bool {
        self.previous_state != self.state
    }
}

/// Camera-relative movement intent on the ground plane as (x, z).
///
/// Forward follows the camera's horizontal view direction and strafe is that
/// direction turned a quarter turn clockwise seen from above. The sum is
/// normalised so diagonals are no faster than cardinals; with no keys held,
/// or opposing keys cancelling out, the intent is zero.
pub fn movement_intent(input: &InputState, camera_yaw: f32) -> Vec2 {
    let forward = forward_from_yaw(camera_yaw);
    let right = Vec2::new(-forward.y, forward.x);

    let mut intent = Vec2::ZERO;
    if input.is_pressed(Action::MoveForward) {
        intent += forward;
    }
    if input.is_pressed(Action::MoveBackward) {
        intent -= forward;
    }
    if input.is_pressed(Action::StrafeRight) {
        intent += right;
    }
    if input.is_pressed(Action::StrafeLeft) {
        intent -= right;
    }

    if intent.length_squared() > 1e-6 {
        intent.normalize()
    } else {
        Vec2::ZERO
    }
}

/// Target state for the ground phase from intent and sprint.
pub fn target_state(intent: Vec2, sprinting: bool) -> MotionState {
    if intent == Vec2::ZERO {
        MotionState::Idle
    } else if sprinting {
        MotionState::Sprint
    } else {
        MotionState::Walk
    }
}

fn sanitize_dt(dt: f32) -> f32 {
    if dt.is_finite() && dt > 0.0 {
        dt
    } else {
        0.0
    }
}

/// Turns input, camera yaw and frame time into avatar motion and clip
/// selection.
#[derive(Debug, Clone)]
pub struct LocomotionController {
    config: LocomotionConfig,
    transform: AvatarTransform,
    ground_level: f32,
    state: MotionState,
    jump: JumpState,
    pending: Option<PendingTransition>,
    locked: bool,
}

impl LocomotionController {
    /// Build a controller for an avatar already placed by the asset pipeline.
    /// Its current height becomes the ground level for the controller's
    /// lifetime.
    pub fn new(
        position: Vec3,
        rotation: Quat,
        config: LocomotionConfig,
    ) -> Result<Self, ControllerError> {
        if !position.is_finite() {
            return Err(ControllerError::NonFinitePlacement(position));
        }
        config.validate()?;
        let rotation = if rotation.is_finite() && rotation.length_squared() > 0.0 {
            rotation.normalize()
        } else {
            Quat::IDENTITY
        };
        tracing::debug!("Locomotion ground level captured at {:.3}", position.y);
        Ok(Self {
            config,
            transform: AvatarTransform { position, rotation },
            ground_level: position.y,
            state: MotionState::Idle,
            jump: JumpState::default(),
            pending: None,
            locked: false,
        })
    }

    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    pub fn rotation(&self) -> Quat {
        self.transform.rotation
    }

    pub fn transform(&self) -> AvatarTransform {
        self.transform
    }

    pub fn ground_level(&self) -> f32 {
        self.ground_level
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn jump(&self) -> JumpState {
        self.jump
    }

    pub fn pending(&self) -> Option<PendingTransition> {
        self.pending
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn config(&self) -> &LocomotionConfig {
        &self.config
    }

    /// Replace tunables. Ground level and the current pose are untouched.
    pub fn retune(&mut self, config: LocomotionConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// True from jump start until the landing clip has played out.
    pub fn in_air_phase(&self) -> bool {
        self.jump.active || self.pending.is_some()
    }

    /// Lock or unlock the controller. Locking forces Idle and freezes every
    /// other transition until unlocked. An avatar locked mid-air resumes its
    /// jump on unlock.
    pub fn set_locked(&mut self, locked: bool, clips: &mut AnimationClipRegistry) {
        if self.locked == locked {
            return;
        }
        self.locked = locked;
        if locked {
            if let Some(pending) = self.pending.take() {
                clips.stop(pending.on_clip);
            }
            self.switch_state(MotionState::Idle, clips);
        } else if self.jump.active {
            self.switch_state(MotionState::Jump, clips);
        }
        tracing::debug!("Locomotion {}", if locked { "locked" } else { "unlocked" });
    }

    /// Advance one frame.
    pub fn update(
        &mut self,
        input: &InputState,
        camera_yaw: f32,
        dt: f32,
        clips: &mut AnimationClipRegistry,
        host: &mut dyn CollisionHost,
    ) -> LocomotionReport {
        if self.locked {
            return LocomotionReport::idle_frame(self.state, true);
        }

        let dt = sanitize_dt(dt);
        let mut report = LocomotionReport::idle_frame(self.state, false);

        self.poll_pending(clips);

        if input.is_pressed(Action::Jump) && !self.jump.active {
            self.begin_jump(clips);
            report.jumped = true;
        }

        if self.jump.active && dt > 0.0 {
            self.jump.velocity += self.config.gravity * dt;
            self.transform.position.y += self.jump.velocity * dt;
            if self.transform.position.y <= self.ground_level {
                self.land(clips);
                report.landed = true;
            }
        }

        let yaw = if camera_yaw.is_finite() { camera_yaw } else { 0.0 };
        let intent = movement_intent(input, yaw);
        let target = target_state(intent, input.is_pressed(Action::Sprint));

        if !self.in_air_phase() {
            self.switch_state(target, clips);
        }

        let speed = match target {
            MotionState::Sprint => self.config.sprint_speed,
            MotionState::Walk => self.config.walk_speed,
            _ => 0.0,
        };
        let displacement = Vec3::new(intent.x, 0.0, intent.y) * speed * dt;
        if displacement != Vec3::ZERO {
            let resolved = host.move_with_collision(self.transform.position, displacement);
            if resolved.is_finite() {
                self.transform.position.x = resolved.x;
                self.transform.position.z = resolved.z;
            }
        }
        report.displacement = displacement;

        if intent != Vec2::ZERO {
            let heading = intent.x.atan2(intent.y) + self.config.facing_offset;
            let target_rotation = Quat::from_rotation_y(heading);
            let factor = self.config.rotation_lerp.clamp(0.0, 1.0);
            self.transform.rotation = self.transform.rotation.slerp(target_rotation, factor);
        }

        if self.transform.position.y < self.ground_level {
            self.transform.position.y = self.ground_level;
        }

        report.state = self.state;
        report
    }

    fn poll_pending(&mut self, clips: &mut AnimationClipRegistry) {
        let Some(pending) = self.pending else {
            return;
        };
        if !clips.is_finished(pending.on_clip) {
            return;
        }
        self.pending = None;
        match pending.next {
            MotionState::Jump => {
                if self.jump.active {
                    clips.play(ClipName::JumpLoop, true, 1.0);
                }
            }
            next => {
                clips.stop(pending.on_clip);
                self.switch_state(next, clips);
            }
        }
    }

    fn begin_jump(&mut self, clips: &mut AnimationClipRegistry) {
        self.jump = JumpState {
            active: true,
            velocity: self.config.jump_force,
        };
        clips.stop(self.state.clip());
        if let Some(pending) = self.pending.take() {
            clips.stop(pending.on_clip);
        }
        if clips.play(ClipName::JumpStart, false, 1.0) {
            self.pending = Some(PendingTransition {
                on_clip: ClipName::JumpStart,
                next: MotionState::Jump,
            });
        } else {
            clips.play(ClipName::JumpLoop, true, 1.0);
        }
        tracing::debug!("Jump started from {}", self.state);
        self.state = MotionState::Jump;
    }

    fn land(&mut self, clips: &mut AnimationClipRegistry) {
        self.transform.position.y = self.ground_level;
        self.jump = JumpState::default();
        clips.stop(ClipName::JumpLoop);
        if let Some(pending) = self.pending.take() {
            clips.stop(pending.on_clip);
        }
        tracing::debug!("Landed at ground level {:.3}", self.ground_level);
        if clips.play(ClipName::JumpLand, false, 1.0) {
            self.pending = Some(PendingTransition {
                on_clip: ClipName::JumpLand,
                next: MotionState::Idle,
            });
        } else {
            self.switch_state(MotionState::Idle, clips);
        }
    }

    fn switch_state(&mut self, next: MotionState, clips: &mut AnimationClipRegistry) -> bool {
        if self.state == next {
            return false;
        }
        clips.stop(self.state.clip());
        clips.play(next.clip(), true, next.playback_speed(&self.config));
        tracing::debug!("Motion state {} -> {}", self.state, next);
        self.state = next;
        true
    }
}

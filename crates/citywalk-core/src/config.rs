//! Tunable constants for the avatar, camera and interaction layer.
//!
//! Every value has a serde default so a project file only needs to list what
//! it overrides.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TuningConfig {
    #[serde(default)]
    pub locomotion: LocomotionConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub interaction: InteractionConfig,
    #[serde(default)]
    pub frame: FrameConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LocomotionConfig {
    #[serde(default = "default_walk_speed")]
    pub walk_speed: f32,
    #[serde(default = "default_sprint_speed")]
    pub sprint_speed: f32,
    /// Upward launch speed when a jump starts.
    #[serde(default = "default_jump_force")]
    pub jump_force: f32,
    /// Vertical acceleration while airborne. Negative.
    #[serde(default = "default_gravity")]
    pub gravity: f32,
    /// Per-frame slerp factor toward the movement heading.
    #[serde(default = "default_rotation_lerp")]
    pub rotation_lerp: f32,
    /// Playback speed of the sprint clip relative to the others.
    #[serde(default = "default_sprint_anim_speed")]
    pub sprint_anim_speed: f32,
    /// Added to the heading so models authored facing another axis line up.
    #[serde(default)]
    pub facing_offset: f32,
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            walk_speed: default_walk_speed(),
            sprint_speed: default_sprint_speed(),
            jump_force: default_jump_force(),
            gravity: default_gravity(),
            rotation_lerp: default_rotation_lerp(),
            sprint_anim_speed: default_sprint_anim_speed(),
            facing_offset: 0.0,
        }
    }
}

fn default_walk_speed() -> f32 {
    3.0
}
fn default_sprint_speed() -> f32 {
    7.0
}
fn default_jump_force() -> f32 {
    6.0
}
fn default_gravity() -> f32 {
    -15.0
}
fn default_rotation_lerp() -> f32 {
    0.55
}
fn default_sprint_anim_speed() -> f32 {
    1.2
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CameraConfig {
    /// Radians per pixel of pointer motion.
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f32,
    /// Radius units per scroll unit.
    #[serde(default = "default_scroll_sensitivity")]
    pub scroll_sensitivity: f32,
    /// Polar angle limits, measured down from straight overhead.
    #[serde(default = "default_pitch_limits")]
    pub pitch_limits: [f32; 2],
    #[serde(default = "default_radius_limits")]
    pub radius_limits: [f32; 2],
    #[serde(default = "default_initial_yaw")]
    pub initial_yaw: f32,
    #[serde(default = "default_initial_pitch")]
    pub initial_pitch: f32,
    #[serde(default = "default_initial_radius")]
    pub initial_radius: f32,
    /// Height above the avatar root the camera orbits around.
    #[serde(default = "default_target_height")]
    pub target_height: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            sensitivity: default_sensitivity(),
            scroll_sensitivity: default_scroll_sensitivity(),
            pitch_limits: default_pitch_limits(),
            radius_limits: default_radius_limits(),
            initial_yaw: default_initial_yaw(),
            initial_pitch: default_initial_pitch(),
            initial_radius: default_initial_radius(),
            target_height: default_target_height(),
        }
    }
}

fn default_sensitivity() -> f32 {
    0.003
}
fn default_scroll_sensitivity() -> f32 {
    0.01
}
fn default_pitch_limits() -> [f32; 2] {
    [0.3, std::f32::consts::PI / 2.2]
}
fn default_radius_limits() -> [f32; 2] {
    [4.0, 20.0]
}
fn default_initial_yaw() -> f32 {
    -std::f32::consts::FRAC_PI_2
}
fn default_initial_pitch() -> f32 {
    std::f32::consts::FRAC_PI_3
}
fn default_initial_radius() -> f32 {
    10.0
}
fn default_target_height() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InteractionConfig {
    /// Avatar–NPC distance at or below which the avatar counts as near.
    #[serde(default = "default_interaction_radius")]
    pub radius: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            radius: default_interaction_radius(),
        }
    }
}

fn default_interaction_radius() -> f32 {
    3.5
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FrameConfig {
    /// Longest frame step fed to the simulation, in seconds.
    #[serde(default = "default_max_dt")]
    pub max_dt: f32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_dt: default_max_dt(),
        }
    }
}

fn default_max_dt() -> f32 {
    0.1
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    NotFinite(&'static str),
    NotPositive(&'static str),
    InvertedRange(&'static str),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFinite(field) => write!(f, "tuning value '{}' is not finite", field),
            ConfigError::NotPositive(field) => write!(f, "tuning value '{}' must be positive", field),
            ConfigError::InvertedRange(field) => {
                write!(f, "tuning range '{}' has min greater than max", field)
            }
            ConfigError::Parse(e) => write!(f, "failed to parse tuning: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

fn finite(field: &'static str, v: f32) -> Result<f32, ConfigError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(ConfigError::NotFinite(field))
    }
}

fn positive(field: &'static str, v: f32) -> Result<f32, ConfigError> {
    if finite(field, v)? > 0.0 {
        Ok(v)
    } else {
        Err(ConfigError::NotPositive(field))
    }
}

fn range(field: &'static str, r: [f32; 2]) -> Result<(), ConfigError> {
    finite(field, r[0])?;
    finite(field, r[1])?;
    if r[0] > r[1] {
        return Err(ConfigError::InvertedRange(field));
    }
    Ok(())
}

impl LocomotionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("locomotion.walk_speed", self.walk_speed)?;
        positive("locomotion.sprint_speed", self.sprint_speed)?;
        finite("locomotion.jump_force", self.jump_force)?;
        if finite("locomotion.gravity", self.gravity)? >= 0.0 {
            // A non-negative gravity would never bring the avatar back down.
            return Err(ConfigError::NotPositive("locomotion.gravity (magnitude)"));
        }
        positive("locomotion.rotation_lerp", self.rotation_lerp)?;
        positive("locomotion.sprint_anim_speed", self.sprint_anim_speed)?;
        finite("locomotion.facing_offset", self.facing_offset)?;
        Ok(())
    }
}

impl CameraConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        finite("camera.sensitivity", self.sensitivity)?;
        finite("camera.scroll_sensitivity", self.scroll_sensitivity)?;
        range("camera.pitch_limits", self.pitch_limits)?;
        range("camera.radius_limits", self.radius_limits)?;
        positive("camera.radius_limits", self.radius_limits[0])?;
        finite("camera.initial_yaw", self.initial_yaw)?;
        finite("camera.initial_pitch", self.initial_pitch)?;
        finite("camera.initial_radius", self.initial_radius)?;
        finite("camera.target_height", self.target_height)?;
        Ok(())
    }
}

impl TuningConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.locomotion.validate()?;
        self.camera.validate()?;
        positive("interaction.radius", self.interaction.radius)?;
        positive("frame.max_dt", self.frame.max_dt)?;
        Ok(())
    }

    /// Parse and validate a standalone tuning document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let tuning: TuningConfig =
            serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        tuning.validate()?;
        Ok(tuning)
    }
}

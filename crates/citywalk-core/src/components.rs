use glam::{Quat, Vec3};

/// Transform component. Present on every placed entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }
}

/// Marks the player-controlled avatar.
#[derive(Debug, Clone, Default)]
pub struct Avatar;

/// The conversational NPC.
#[derive(Debug, Clone)]
pub struct Npc {
    pub name: String,
}

/// Static city geometry.
#[derive(Debug, Clone)]
pub struct Building {
    pub model: String,
    pub scale: f32,
}

/// Where an entity's visual came from.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub source: String,
    /// True when the model failed to load and a primitive stands in.
    pub fallback: bool,
}

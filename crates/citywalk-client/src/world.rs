use std::collections::HashMap;
use std::path::Path;

use citywalk_core::animation::{AnimationClipRegistry, ClipName};
use citywalk_core::components::{Avatar, Building, ModelInfo, Npc, Transform};
use glam::{Quat, Vec3};
use hecs::{Entity, World};

use crate::assets::{self, ModelAsset};
use crate::physics::{PhysicsShape, PhysicsWorld};

/// Half-size of the square the perimeter encloses.
pub const CITY_EDGE: f32 = 90.0;
pub const CITY_SPACING: f32 = 12.0;
pub const BUILDING_SCALE: f32 = 8.0;
pub const SKYSCRAPER_SCALE: f32 = 14.0;

const CITY_MODEL_DIR: &str = "assets/models/city";

const REGULAR_MODELS: [&str; 14] = [
    "building-a.glb",
    "building-b.glb",
    "building-c.glb",
    "building-d.glb",
    "building-e.glb",
    "building-f.glb",
    "building-g.glb",
    "building-h.glb",
    "building-i.glb",
    "building-j.glb",
    "building-k.glb",
    "building-l.glb",
    "building-m.glb",
    "building-n.glb",
];

const SKYSCRAPER_MODELS: [&str; 5] = [
    "building-skyscraper-a.glb",
    "building-skyscraper-b.glb",
    "building-skyscraper-c.glb",
    "building-skyscraper-d.glb",
    "building-skyscraper-e.glb",
];

/// Where one perimeter building goes.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildingPlacement {
    pub id: String,
    pub model: String,
    pub position: Vec3,
    /// Rotation about Y so the facade faces the city centre.
    pub yaw: f32,
    pub scale: f32,
}

impl BuildingPlacement {
    pub fn is_skyscraper(&self) -> bool {
        self.scale == SKYSCRAPER_SCALE
    }
}

/// Buildings along all four edges, north and south first, then east and
/// west. Every fifth placement is a skyscraper.
pub fn perimeter_layout() -> Vec<BuildingPlacement> {
    let steps = (2.0 * CITY_EDGE / CITY_SPACING).floor() as usize + 1;
    let along = |i: usize| -CITY_EDGE + i as f32 * CITY_SPACING;
    let edges: [(&str, f32, Box<dyn Fn(f32) -> Vec3>); 4] = [
        ("north", std::f32::consts::PI, Box::new(|t| Vec3::new(t, 0.0, CITY_EDGE))),
        ("south", 0.0, Box::new(|t| Vec3::new(t, 0.0, -CITY_EDGE))),
        ("east", -std::f32::consts::FRAC_PI_2, Box::new(|t| Vec3::new(CITY_EDGE, 0.0, t))),
        ("west", std::f32::consts::FRAC_PI_2, Box::new(|t| Vec3::new(-CITY_EDGE, 0.0, t))),
    ];

    let mut placements = Vec::with_capacity(steps * edges.len());
    for (edge, yaw, place) in &edges {
        for step in 0..steps {
            let idx = placements.len();
            let (model, scale) = if idx % 5 == 0 {
                (SKYSCRAPER_MODELS[idx % SKYSCRAPER_MODELS.len()], SKYSCRAPER_SCALE)
            } else {
                (REGULAR_MODELS[idx % REGULAR_MODELS.len()], BUILDING_SCALE)
            };
            placements.push(BuildingPlacement {
                id: format!("{}_{}", edge, step),
                model: format!("{}/{}", CITY_MODEL_DIR, model),
                position: place(along(step)),
                yaw: *yaw,
                scale,
            });
        }
    }
    placements
}

/// Per-entity clip state for characters the player does not drive.
pub struct IdleClips(pub AnimationClipRegistry);

/// The scene: avatar, NPC and static city geometry in one hecs world.
pub struct CityWorld {
    pub world: World,
    /// Maps stable names to hecs Entity handles.
    pub entity_registry: HashMap<String, Entity>,
    pub avatar: Option<Entity>,
    pub npc: Option<Entity>,
}

impl Default for CityWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl CityWorld {
    pub fn new() -> Self {
        Self {
            world: World::new(),
            entity_registry: HashMap::new(),
            avatar: None,
            npc: None,
        }
    }

    /// Spawn the avatar at `spawn` (x/z), lifted so its feet rest on the
    /// ground.
    pub fn spawn_avatar(&mut self, model: &ModelAsset, spawn: Vec3) -> Entity {
        let position = Vec3::new(spawn.x, model.ground_offset(1.0), spawn.z);
        let entity = self.world.spawn((
            Transform::from_position(position),
            Avatar,
            ModelInfo {
                source: model.source.clone(),
                fallback: model.fallback,
            },
        ));
        self.entity_registry.insert("player".to_string(), entity);
        self.avatar = Some(entity);
        tracing::info!("Spawned avatar at {:?} (fallback: {})", position, model.fallback);
        entity
    }

    /// Spawn the NPC. Only x/z of `spawn` are used; height comes from the
    /// model's ground offset. The first clip whose name contains "idle"
    /// loops from the start.
    pub fn spawn_npc(&mut self, name: &str, model: &ModelAsset, spawn: Vec3) -> Entity {
        let position = Vec3::new(spawn.x, model.ground_offset(1.0), spawn.z);

        let mut clips = AnimationClipRegistry::default();
        if let Some(idle) = model
            .clips
            .iter()
            .find(|c| c.name.to_lowercase().contains("idle"))
        {
            clips.register(ClipName::Idle, idle.handle, idle.duration);
            clips.play(ClipName::Idle, true, 1.0);
        } else {
            tracing::debug!("NPC '{}' has no idle clip", name);
        }

        let entity = self.world.spawn((
            Transform::from_position(position),
            Npc {
                name: name.to_string(),
            },
            ModelInfo {
                source: model.source.clone(),
                fallback: model.fallback,
            },
            IdleClips(clips),
        ));
        self.entity_registry.insert("npc".to_string(), entity);
        self.npc = Some(entity);
        tracing::info!("Spawned NPC '{}' at {:?}", name, position);
        entity
    }

    /// Spawn every placement as a building with a static box collider sized
    /// from its model (unit box when the model is missing).
    pub fn spawn_city(
        &mut self,
        project_root: &Path,
        placements: &[BuildingPlacement],
        physics: &mut PhysicsWorld,
    ) -> usize {
        let mut bounds_cache: HashMap<String, (Vec3, Vec3)> = HashMap::new();
        for placement in placements {
            let (min, max) = *bounds_cache
                .entry(placement.model.clone())
                .or_insert_with(|| match assets::load_model(project_root, &placement.model) {
                    Ok(model) => (model.min, model.max),
                    Err(e) => {
                        tracing::warn!("{}; using unit footprint", e);
                        (Vec3::new(-0.5, 0.0, -0.5), Vec3::new(0.5, 1.0, 0.5))
                    }
                });

            let rotation = Quat::from_rotation_y(placement.yaw);
            let transform = Transform {
                position: placement.position,
                rotation,
                scale: Vec3::splat(placement.scale),
            };
            let entity = self.world.spawn((
                transform,
                Building {
                    model: placement.model.clone(),
                    scale: placement.scale,
                },
            ));
            self.entity_registry.insert(placement.id.clone(), entity);

            let half_extents = (max - min) * 0.5 * placement.scale;
            let centre = placement.position + rotation * ((min + max) * 0.5 * placement.scale);
            physics.add_static_body(
                entity,
                centre,
                rotation,
                PhysicsShape::Box { half_extents },
            );
        }
        tracing::info!("Placed {} perimeter buildings", placements.len());
        placements.len()
    }

    pub fn building_count(&self) -> usize {
        self.world.query::<&Building>().iter().count()
    }

    /// Copy the avatar pose into its Transform.
    pub fn sync_avatar(&mut self, position: Vec3, rotation: Quat) {
        let Some(entity) = self.avatar else {
            return;
        };
        if let Ok(mut transform) = self.world.get::<&mut Transform>(entity) {
            transform.position = position;
            transform.rotation = rotation;
        }
    }

    pub fn position_of(&self, entity: Entity) -> Option<Vec3> {
        self.world
            .get::<&Transform>(entity)
            .ok()
            .map(|t| t.position)
    }

    pub fn npc_position(&self) -> Option<Vec3> {
        self.npc.and_then(|e| self.position_of(e))
    }

    /// Advance every NPC's idle clip.
    pub fn advance_idle_clips(&mut self, dt: f32) {
        for (_entity, clips) in self.world.query_mut::<&mut IdleClips>() {
            clips.0.advance(dt);
        }
    }
}

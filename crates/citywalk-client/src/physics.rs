use std::collections::HashMap;

use citywalk_core::locomotion::CollisionHost;
use glam::{Quat, Vec3};
use rapier3d::control::KinematicCharacterController;
use rapier3d::prelude::*;

/// Character capsule: half-height of the cylinder part and radius.
pub const CHARACTER_HALF_HEIGHT: f32 = 0.4;
pub const CHARACTER_RADIUS: f32 = 0.5;

const STEP_DT: f32 = 1.0 / 60.0;

#[derive(Debug, Clone)]
pub enum PhysicsShape {
    Box { half_extents: Vec3 },
    Capsule { half_height: f32, radius: f32 },
}

/// Static city colliders plus a kinematic capsule for the avatar. Only the
/// horizontal plane is resolved here; height belongs to the locomotion
/// controller.
pub struct PhysicsWorld {
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub island_manager: IslandManager,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub query_pipeline: QueryPipeline,

    // Mapping from Rapier handles to ECS entities
    pub body_to_entity: HashMap<RigidBodyHandle, hecs::Entity>,
    pub collider_to_entity: HashMap<ColliderHandle, hecs::Entity>,

    pub character_controller: KinematicCharacterController,
    character: Option<CharacterBody>,
    /// Entities the avatar ran into during the last move.
    pub last_hits: Vec<hecs::Entity>,
    queries_dirty: bool,
}

#[derive(Debug, Clone, Copy)]
struct CharacterBody {
    body: RigidBodyHandle,
    collider: ColliderHandle,
    /// Capsule centre height above the avatar root.
    offset_y: f32,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        let mut character_controller = KinematicCharacterController::default();
        character_controller.autostep = None;
        character_controller.snap_to_ground = None;
        character_controller.max_slope_climb_angle = 45.0_f32.to_radians();

        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            island_manager: IslandManager::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            query_pipeline: QueryPipeline::new(),
            body_to_entity: HashMap::new(),
            collider_to_entity: HashMap::new(),
            character_controller,
            character: None,
            last_hits: Vec::new(),
            queries_dirty: false,
        }
    }

    /// Add a static rigid body + collider (a building footprint).
    pub fn add_static_body(
        &mut self,
        entity: hecs::Entity,
        position: Vec3,
        rotation: Quat,
        shape: PhysicsShape,
    ) -> (RigidBodyHandle, ColliderHandle) {
        let rb = RigidBodyBuilder::fixed()
            .translation(vector![position.x, position.y, position.z])
            .rotation(quat_to_angvector(rotation))
            .build();
        let rb_handle = self.rigid_body_set.insert(rb);

        let collider = shape_to_collider(&shape).build();
        let col_handle =
            self.collider_set
                .insert_with_parent(collider, rb_handle, &mut self.rigid_body_set);

        self.body_to_entity.insert(rb_handle, entity);
        self.collider_to_entity.insert(col_handle, entity);
        self.queries_dirty = true;

        (rb_handle, col_handle)
    }

    /// Add the avatar's kinematic capsule. `root` is the avatar's root
    /// position; the capsule is lifted so its bottom sits on y = 0.
    pub fn add_character_body(&mut self, entity: hecs::Entity, root: Vec3) {
        let centre_y = CHARACTER_HALF_HEIGHT + CHARACTER_RADIUS;
        let rb = RigidBodyBuilder::kinematic_position_based()
            .translation(vector![root.x, centre_y, root.z])
            .build();
        let rb_handle = self.rigid_body_set.insert(rb);

        let collider = ColliderBuilder::capsule_y(CHARACTER_HALF_HEIGHT, CHARACTER_RADIUS).build();
        let col_handle =
            self.collider_set
                .insert_with_parent(collider, rb_handle, &mut self.rigid_body_set);

        self.body_to_entity.insert(rb_handle, entity);
        self.collider_to_entity.insert(col_handle, entity);
        self.character = Some(CharacterBody {
            body: rb_handle,
            collider: col_handle,
            offset_y: centre_y - root.y,
        });
        self.queries_dirty = true;
    }

    pub fn has_character(&self) -> bool {
        self.character.is_some()
    }

    fn refresh_queries(&mut self) {
        if self.queries_dirty {
            self.query_pipeline.update(&self.collider_set);
            self.queries_dirty = false;
        }
    }

    /// Slide the character capsule by a horizontal translation and return
    /// the effective translation.
    pub fn move_character(&mut self, root: Vec3, desired: Vec3) -> Vec3 {
        let Some(character) = self.character else {
            return desired;
        };
        self.refresh_queries();

        let Some(collider) = self.collider_set.get(character.collider) else {
            return desired;
        };
        let centre = Isometry::translation(root.x, root.y + character.offset_y, root.z);

        let mut hits = Vec::new();
        let movement = self.character_controller.move_shape(
            STEP_DT,
            &self.rigid_body_set,
            &self.collider_set,
            &self.query_pipeline,
            collider.shape(),
            &centre,
            vector![desired.x, 0.0, desired.z],
            QueryFilter::default().exclude_rigid_body(character.body),
            |collision| hits.push(collision.handle),
        );

        self.last_hits = hits
            .iter()
            .filter_map(|h| self.collider_to_entity.get(h).copied())
            .collect();

        let effective = Vec3::new(movement.translation.x, 0.0, movement.translation.z);
        if let Some(body) = self.rigid_body_set.get_mut(character.body) {
            let mut iso = centre;
            iso.translation.x += effective.x;
            iso.translation.z += effective.z;
            body.set_next_kinematic_position(iso);
            body.set_position(iso, false);
        }
        effective
    }
}

impl CollisionHost for PhysicsWorld {
    fn move_with_collision(&mut self, position: Vec3, displacement: Vec3) -> Vec3 {
        position + self.move_character(position, displacement)
    }
}

fn shape_to_collider(shape: &PhysicsShape) -> ColliderBuilder {
    match shape {
        PhysicsShape::Box { half_extents } => {
            ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
        }
        PhysicsShape::Capsule {
            half_height,
            radius,
        } => ColliderBuilder::capsule_y(*half_height, *radius),
    }
}

fn quat_to_angvector(q: Quat) -> rapier3d::na::Vector3<f32> {
    let (axis, angle) = q.to_axis_angle();
    vector![axis.x * angle, axis.y * angle, axis.z * angle]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall_world() -> (hecs::World, PhysicsWorld, hecs::Entity) {
        let mut world = hecs::World::new();
        let wall = world.spawn(());
        let avatar = world.spawn(());
        let mut pw = PhysicsWorld::new();
        pw.add_static_body(
            wall,
            Vec3::new(3.0, 5.0, 0.0),
            Quat::IDENTITY,
            PhysicsShape::Box {
                half_extents: Vec3::new(0.5, 5.0, 10.0),
            },
        );
        pw.add_character_body(avatar, Vec3::ZERO);
        (world, pw, wall)
    }

    #[test]
    fn test_physics_world_creation() {
        let pw = PhysicsWorld::new();
        assert_eq!(pw.rigid_body_set.len(), 0);
        assert!(!pw.has_character());
    }

    #[test]
    fn test_open_space_moves_freely() {
        let (_world, mut pw, _) = wall_world();
        let end = pw.move_with_collision(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.5));
        assert!((end - Vec3::new(0.0, 0.0, -1.5)).length() < 0.05);
        assert!(pw.last_hits.is_empty());
    }

    #[test]
    fn test_wall_blocks_movement() {
        let (_world, mut pw, wall) = wall_world();
        let end = pw.move_with_collision(Vec3::ZERO, Vec3::new(6.0, 0.0, 0.0));
        // Wall face at x = 2.5.
        assert!(end.x < 2.5 - CHARACTER_RADIUS + 0.05);
        assert!(end.x > 1.5);
        assert_eq!(end.y, 0.0);
        assert!(pw.last_hits.contains(&wall));
    }

    #[test]
    fn test_no_character_passes_through() {
        let mut pw = PhysicsWorld::new();
        let end = pw.move_with_collision(Vec3::ONE, Vec3::X);
        assert_eq!(end, Vec3::new(2.0, 1.0, 1.0));
    }
}

// sim.rs — backend-agnostic rigid-body vocabulary.
//
// The rig assembler, environments and drag controller speak only this trait,
// so a 2D solver could back the same core; world3d.rs is the rapier3d
// realization used by the app.

use glam::{Quat, Vec3};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JointId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BodyShape {
    Sphere { radius: f32 },
    /// Half-extents, cannon/rapier convention.
    Box { half: Vec3 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Motion {
    Dynamic,
    Static,
    /// Position-driven from outside the solver (grinder gears, pointer body).
    Kinematic,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub friction: f32,
    pub restitution: f32,
}

impl Default for Material {
    fn default() -> Self { Self { friction: 0.5, restitution: 0.2 } }
}

/// Collision filter. Every part of the ragdoll shares `Ragdoll`, so limbs
/// overlapping at their joint anchors never collide with each other; picking
/// rays also test only this group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollisionTag {
    Ragdoll,
    Scenery,
}

#[derive(Clone, Copy, Debug)]
pub struct BodySpec {
    pub shape: BodyShape,
    pub mass: f32,
    pub position: Vec3,
    pub motion: Motion,
    pub material: Material,
    pub tag: CollisionTag,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JointKind {
    /// Free rotation about the shared anchor.
    Point,
    /// Swing away from the body-local +Y reference axis capped at
    /// `half_angle` radians; twist is left free.
    Cone { half_angle: f32 },
    Hinge { axis: Vec3 },
}

#[derive(Clone, Copy, Debug)]
pub struct JointSpec {
    pub kind: JointKind,
    pub body_a: BodyId,
    pub body_b: BodyId,
    /// Local anchors relative to each body's own center.
    pub anchor_a: Vec3,
    pub anchor_b: Vec3,
}

/// The slice of a rigid-body solver this sandbox needs. Anything fancier
/// (islands, CCD, solver tuning) stays behind the backend.
pub trait RigidBodySim {
    fn add_body(&mut self, spec: &BodySpec) -> BodyId;
    fn remove_body(&mut self, id: BodyId);

    fn add_joint(&mut self, spec: &JointSpec) -> JointId;
    fn remove_joint(&mut self, id: JointId);

    fn set_gravity(&mut self, g: Vec3);
    fn step(&mut self, dt: f32);

    fn body_transform(&self, id: BodyId) -> (Vec3, Quat);
    fn body_velocity(&self, id: BodyId) -> Vec3;
    fn world_to_local(&self, id: BodyId, world: Vec3) -> Vec3;
    fn set_kinematic_rotation(&mut self, id: BodyId, rot: Quat);

    /// Nearest ragdoll-tagged body along the ray, with the world hit point.
    /// A miss is normal control flow, not an error.
    fn pick(&mut self, origin: Vec3, dir: Vec3) -> Option<(BodyId, Vec3)>;

    /// Transient pointer constraint: a point joint between `body` (anchored
    /// at `local_pivot`) and an invisible kinematic body that follows the
    /// pointer. At most one exists; `attach` while one is live replaces
    /// nothing and is a backend contract violation (the drag controller
    /// guarantees exclusion). `detach` with none live is a no-op.
    fn attach_pointer(&mut self, body: BodyId, local_pivot: Vec3, target: Vec3);
    fn move_pointer(&mut self, target: Vec3);
    fn detach_pointer(&mut self);
    fn has_pointer(&self) -> bool;

    /// Registered totals, used by teardown tests to prove nothing leaks.
    fn body_count(&self) -> usize;
    fn joint_count(&self) -> usize;
}

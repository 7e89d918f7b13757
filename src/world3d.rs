// world3d.rs — rapier3d realization of the RigidBodySim trait.
//
// Struct-of-sets layout follows rapier's pipeline: one set per concern, all
// fed to PhysicsPipeline::step. The query pipeline is refreshed by step()
// and on demand before a pick, since picks can happen before the first step.

use std::collections::HashMap;

use glam::{Quat, Vec3};
use rapier3d::prelude::*;

use crate::sim::{
    BodyId, BodyShape, BodySpec, CollisionTag, JointId, JointKind, JointSpec, Motion, RigidBodySim,
};

const RAGDOLL_GROUP: Group = Group::GROUP_1;
const SCENERY_GROUP: Group = Group::GROUP_2;

fn to_na(v: Vec3) -> Vector<Real> { vector![v.x, v.y, v.z] }
fn to_pt(v: Vec3) -> Point<Real> { point![v.x, v.y, v.z] }
fn from_na(v: Vector<Real>) -> Vec3 { Vec3::new(v.x, v.y, v.z) }

struct PointerDrag {
    grabbed: RigidBodyHandle,
    pointer: RigidBodyHandle,
    joint: ImpulseJointHandle,
}

pub struct World3d {
    gravity: Vector<Real>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    query: QueryPipeline,

    handles: HashMap<BodyId, RigidBodyHandle>,
    owners: HashMap<RigidBodyHandle, BodyId>,
    joints: HashMap<JointId, ImpulseJointHandle>,
    next_body: u64,
    next_joint: u64,
    drag: Option<PointerDrag>,
}

impl World3d {
    pub fn new() -> Self {
        Self {
            gravity: vector![0.0, -9.82, 0.0],
            params: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query: QueryPipeline::new(),
            handles: HashMap::new(),
            owners: HashMap::new(),
            joints: HashMap::new(),
            next_body: 0,
            next_joint: 0,
            drag: None,
        }
    }

    fn handle(&self, id: BodyId) -> RigidBodyHandle {
        *self.handles.get(&id).expect("body handle for a removed or foreign BodyId")
    }

    fn groups(tag: CollisionTag) -> InteractionGroups {
        match tag {
            // Members of the ragdoll group filter their own group out, so the
            // rig's overlapping limbs never self-collide.
            CollisionTag::Ragdoll => InteractionGroups::new(RAGDOLL_GROUP, !RAGDOLL_GROUP),
            CollisionTag::Scenery => InteractionGroups::new(SCENERY_GROUP, Group::ALL),
        }
    }
}

impl RigidBodySim for World3d {
    fn add_body(&mut self, spec: &BodySpec) -> BodyId {
        let builder = match spec.motion {
            Motion::Dynamic => RigidBodyBuilder::dynamic(),
            Motion::Static => RigidBodyBuilder::fixed(),
            Motion::Kinematic => RigidBodyBuilder::kinematic_position_based(),
        };
        let rb = builder.translation(to_na(spec.position)).build();
        let handle = self.bodies.insert(rb);

        let shape = match spec.shape {
            BodyShape::Sphere { radius } => SharedShape::ball(radius),
            BodyShape::Box { half } => SharedShape::cuboid(half.x, half.y, half.z),
        };
        let mut collider = ColliderBuilder::new(shape)
            .friction(spec.material.friction)
            .restitution(spec.material.restitution)
            .collision_groups(Self::groups(spec.tag));
        if spec.motion == Motion::Dynamic {
            collider = collider.mass(spec.mass);
        }
        self.colliders
            .insert_with_parent(collider.build(), handle, &mut self.bodies);

        let id = BodyId(self.next_body);
        self.next_body += 1;
        self.handles.insert(id, handle);
        self.owners.insert(handle, id);
        id
    }

    fn remove_body(&mut self, id: BodyId) {
        if let Some(handle) = self.handles.remove(&id) {
            self.owners.remove(&handle);
            self.bodies.remove(
                handle,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            );
        }
    }

    fn add_joint(&mut self, spec: &JointSpec) -> JointId {
        let a = self.handle(spec.body_a);
        let b = self.handle(spec.body_b);
        let joint: GenericJoint = match spec.kind {
            JointKind::Point => SphericalJointBuilder::new()
                .local_anchor1(to_pt(spec.anchor_a))
                .local_anchor2(to_pt(spec.anchor_b))
                .build()
                .into(),
            JointKind::Cone { half_angle } => SphericalJointBuilder::new()
                .local_anchor1(to_pt(spec.anchor_a))
                .local_anchor2(to_pt(spec.anchor_b))
                // Swing about the local +Y reference axis is the X/Z angular
                // freedom; twist (AngY) stays free.
                .limits(JointAxis::AngX, [-half_angle, half_angle])
                .limits(JointAxis::AngZ, [-half_angle, half_angle])
                .build()
                .into(),
            JointKind::Hinge { axis } => {
                let axis = UnitVector::new_normalize(to_na(axis));
                RevoluteJointBuilder::new(axis)
                    .local_anchor1(to_pt(spec.anchor_a))
                    .local_anchor2(to_pt(spec.anchor_b))
                    .build()
                    .into()
            }
        };
        let handle = self.impulse_joints.insert(a, b, joint, true);
        let id = JointId(self.next_joint);
        self.next_joint += 1;
        self.joints.insert(id, handle);
        id
    }

    fn remove_joint(&mut self, id: JointId) {
        if let Some(handle) = self.joints.remove(&id) {
            self.impulse_joints.remove(handle, true);
        }
    }

    fn set_gravity(&mut self, g: Vec3) {
        self.gravity = to_na(g);
    }

    fn step(&mut self, dt: f32) {
        self.params.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query),
            &(),
            &(),
        );
    }

    fn body_transform(&self, id: BodyId) -> (Vec3, Quat) {
        let iso = self.bodies[self.handle(id)].position();
        let q = iso.rotation;
        (
            from_na(iso.translation.vector),
            Quat::from_xyzw(q.i, q.j, q.k, q.w),
        )
    }

    fn body_velocity(&self, id: BodyId) -> Vec3 {
        from_na(*self.bodies[self.handle(id)].linvel())
    }

    fn world_to_local(&self, id: BodyId, world: Vec3) -> Vec3 {
        let iso = self.bodies[self.handle(id)].position();
        let local = iso.inverse_transform_point(&to_pt(world));
        Vec3::new(local.x, local.y, local.z)
    }

    fn set_kinematic_rotation(&mut self, id: BodyId, rot: Quat) {
        let handle = self.handle(id);
        if let Some(rb) = self.bodies.get_mut(handle) {
            let q = Rotation::from_quaternion(rapier3d::na::Quaternion::new(
                rot.w, rot.x, rot.y, rot.z,
            ));
            rb.set_next_kinematic_rotation(q);
        }
    }

    fn pick(&mut self, origin: Vec3, dir: Vec3) -> Option<(BodyId, Vec3)> {
        self.query.update(&self.colliders);
        let ray = Ray::new(to_pt(origin), to_na(dir));
        let filter =
            QueryFilter::new().groups(InteractionGroups::new(Group::ALL, RAGDOLL_GROUP));
        let (collider, toi) =
            self.query
                .cast_ray(&self.bodies, &self.colliders, &ray, 1.0e3, true, filter)?;
        let parent = self.colliders[collider].parent()?;
        let id = *self.owners.get(&parent)?;
        Some((id, from_na(ray.point_at(toi).coords)))
    }

    fn attach_pointer(&mut self, body: BodyId, local_pivot: Vec3, target: Vec3) {
        debug_assert!(self.drag.is_none(), "pointer constraint already live");
        let grabbed = self.handle(body);
        let pointer = self.bodies.insert(
            RigidBodyBuilder::kinematic_position_based()
                .translation(to_na(target))
                .build(),
        );
        let joint = SphericalJointBuilder::new()
            .local_anchor1(to_pt(local_pivot))
            .local_anchor2(point![0.0, 0.0, 0.0])
            .build();
        let joint = self.impulse_joints.insert(grabbed, pointer, joint, true);
        self.drag = Some(PointerDrag { grabbed, pointer, joint });
    }

    fn move_pointer(&mut self, target: Vec3) {
        let Some(drag) = &self.drag else { return };
        if let Some(rb) = self.bodies.get_mut(drag.pointer) {
            rb.set_next_kinematic_translation(to_na(target));
        }
        if let Some(rb) = self.bodies.get_mut(drag.grabbed) {
            rb.wake_up(true);
        }
    }

    fn detach_pointer(&mut self) {
        let Some(drag) = self.drag.take() else { return };
        self.impulse_joints.remove(drag.joint, true);
        self.bodies.remove(
            drag.pointer,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        if let Some(rb) = self.bodies.get_mut(drag.grabbed) {
            rb.wake_up(true);
        }
    }

    fn has_pointer(&self) -> bool {
        self.drag.is_some()
    }

    fn body_count(&self) -> usize {
        self.bodies.iter().count()
    }

    fn joint_count(&self) -> usize {
        self.impulse_joints.iter().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Material;

    fn dynamic_ball(pos: Vec3) -> BodySpec {
        BodySpec {
            shape: BodyShape::Sphere { radius: 0.5 },
            mass: 1.0,
            position: pos,
            motion: Motion::Dynamic,
            material: Material::default(),
            tag: CollisionTag::Ragdoll,
        }
    }

    #[test]
    fn add_remove_leaves_nothing() {
        let mut w = World3d::new();
        let a = w.add_body(&dynamic_ball(Vec3::ZERO));
        let b = w.add_body(&dynamic_ball(Vec3::Y));
        let j = w.add_joint(&JointSpec {
            kind: JointKind::Point,
            body_a: a,
            body_b: b,
            anchor_a: Vec3::new(0.0, 0.5, 0.0),
            anchor_b: Vec3::new(0.0, -0.5, 0.0),
        });
        assert_eq!(w.body_count(), 2);
        assert_eq!(w.joint_count(), 1);
        w.remove_joint(j);
        w.remove_body(a);
        w.remove_body(b);
        assert_eq!(w.body_count(), 0);
        assert_eq!(w.joint_count(), 0);
    }

    #[test]
    fn pick_hits_ragdoll_bodies_only() {
        let mut w = World3d::new();
        let target = w.add_body(&dynamic_ball(Vec3::ZERO));
        let mut scenery = dynamic_ball(Vec3::new(0.0, 0.0, 2.0));
        scenery.tag = CollisionTag::Scenery;
        w.add_body(&scenery);

        // Ray passes through the scenery ball first but must report the rig.
        let hit = w.pick(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        let (id, point) = hit.expect("ray through both bodies");
        assert_eq!(id, target);
        assert!((point.z - 0.5).abs() < 1.0e-4);
    }

    #[test]
    fn pick_miss_is_none() {
        let mut w = World3d::new();
        w.add_body(&dynamic_ball(Vec3::ZERO));
        assert!(w.pick(Vec3::new(10.0, 10.0, 5.0), Vec3::new(0.0, 0.0, -1.0)).is_none());
    }

    #[test]
    fn gravity_accelerates_dynamic_bodies() {
        let mut w = World3d::new();
        let ball = w.add_body(&dynamic_ball(Vec3::new(0.0, 5.0, 0.0)));
        for _ in 0..30 {
            w.step(1.0 / 60.0);
        }
        assert!(w.body_velocity(ball).y < -1.0);
    }

    #[test]
    fn inverted_gravity_lifts() {
        let mut w = World3d::new();
        let ball = w.add_body(&dynamic_ball(Vec3::new(0.0, 5.0, 0.0)));
        w.set_gravity(Vec3::new(0.0, 3.3, 0.0));
        for _ in 0..30 {
            w.step(1.0 / 60.0);
        }
        assert!(w.body_velocity(ball).y > 0.5);
    }

    #[test]
    fn detach_without_attach_is_noop() {
        let mut w = World3d::new();
        w.add_body(&dynamic_ball(Vec3::ZERO));
        let before = (w.body_count(), w.joint_count());
        w.detach_pointer();
        assert_eq!((w.body_count(), w.joint_count()), before);
    }
}

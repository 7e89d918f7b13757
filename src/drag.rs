// drag.rs — pointer grab. Press picks a ragdoll part under the cursor and
// attaches the pointer constraint at the exact hit point; move slides the
// constraint target along a drag plane; release always lets go.

use glam::Vec3;

use crate::sim::{BodyId, RigidBodySim};

#[derive(Clone, Copy, Debug)]
pub struct PointerRay {
    pub origin: Vec3,
    pub dir: Vec3,
}

/// How pointer motion maps back into the world while a grab is live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragPlane {
    /// Plane through the grab point, facing the camera at grab time.
    CameraFacing,
    /// Keep the grab point's distance along the pointer ray constant.
    FixedDepth,
}

struct ActiveDrag {
    body: BodyId,
    grab_point: Vec3,
    normal: Vec3,
    depth: f32,
}

/// Owns the at-most-one-grab invariant. All pointer constraint traffic to
/// the solver goes through here.
pub struct DragController {
    pub plane: DragPlane,
    active: Option<ActiveDrag>,
}

impl DragController {
    pub fn new(plane: DragPlane) -> Self {
        Self { plane, active: None }
    }

    pub fn grabbed(&self) -> Option<BodyId> {
        self.active.as_ref().map(|d| d.body)
    }

    /// Try to start a grab. A second press while one is live is ignored, as
    /// is a press over empty space or scenery.
    pub fn on_press(&mut self, sim: &mut impl RigidBodySim, ray: PointerRay) -> Option<BodyId> {
        if self.active.is_some() {
            return None;
        }
        let (body, hit) = sim.pick(ray.origin, ray.dir)?;
        let pivot = sim.world_to_local(body, hit);
        sim.attach_pointer(body, pivot, hit);
        self.active = Some(ActiveDrag {
            body,
            grab_point: hit,
            normal: ray.dir.normalize_or_zero(),
            depth: (hit - ray.origin).dot(ray.dir.normalize_or_zero()),
        });
        Some(body)
    }

    /// Retarget the live constraint under the new pointer ray. No grab, no
    /// effect.
    pub fn on_move(&mut self, sim: &mut impl RigidBodySim, ray: PointerRay) {
        let Some(drag) = &self.active else { return };
        let dir = ray.dir.normalize_or_zero();
        let target = match self.plane {
            DragPlane::CameraFacing => {
                let denom = dir.dot(drag.normal);
                if denom.abs() < 1.0e-6 {
                    return; // ray parallel to the plane, keep the old target
                }
                let t = (drag.grab_point - ray.origin).dot(drag.normal) / denom;
                if t < 0.0 {
                    return;
                }
                ray.origin + dir * t
            }
            DragPlane::FixedDepth => ray.origin + dir * drag.depth,
        };
        sim.move_pointer(target);
    }

    /// Always ends the grab; releasing with none live is a no-op.
    pub fn on_release(&mut self, sim: &mut impl RigidBodySim) {
        if self.active.take().is_some() {
            sim.detach_pointer();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::Ragdoll;
    use crate::world3d::World3d;

    const DT: f32 = 1.0 / 60.0;

    fn torso_ray() -> PointerRay {
        PointerRay { origin: Vec3::new(0.0, 0.75, 5.0), dir: Vec3::new(0.0, 0.0, -1.0) }
    }

    #[test]
    fn press_on_torso_attaches_one_constraint() {
        let mut w = World3d::new();
        let rig = Ragdoll::build(&mut w, Vec3::ZERO, 1.0);
        let mut drag = DragController::new(DragPlane::CameraFacing);

        let grabbed = drag.on_press(&mut w, torso_ray());
        assert_eq!(grabbed, Some(rig.parts[1].body));
        assert!(w.has_pointer());
        assert_eq!(w.joint_count(), 11); // 10 rig joints + the pointer joint
    }

    #[test]
    fn second_press_while_dragging_is_ignored() {
        let mut w = World3d::new();
        let _rig = Ragdoll::build(&mut w, Vec3::ZERO, 1.0);
        let mut drag = DragController::new(DragPlane::CameraFacing);

        assert!(drag.on_press(&mut w, torso_ray()).is_some());
        let head_ray =
            PointerRay { origin: Vec3::new(0.0, 1.2, 5.0), dir: Vec3::new(0.0, 0.0, -1.0) };
        assert!(drag.on_press(&mut w, head_ray).is_none());
        assert_eq!(w.joint_count(), 11);
    }

    #[test]
    fn release_without_grab_is_noop() {
        let mut w = World3d::new();
        let _rig = Ragdoll::build(&mut w, Vec3::ZERO, 1.0);
        let mut drag = DragController::new(DragPlane::CameraFacing);
        drag.on_release(&mut w);
        assert!(!w.has_pointer());
        assert_eq!(w.joint_count(), 10);
    }

    #[test]
    fn press_on_empty_space_grabs_nothing() {
        let mut w = World3d::new();
        let _rig = Ragdoll::build(&mut w, Vec3::ZERO, 1.0);
        let mut drag = DragController::new(DragPlane::CameraFacing);
        let miss =
            PointerRay { origin: Vec3::new(10.0, 10.0, 5.0), dir: Vec3::new(0.0, 0.0, -1.0) };
        assert!(drag.on_press(&mut w, miss).is_none());
        assert!(!w.has_pointer());
    }

    #[test]
    fn dragging_torso_pulls_it_along() {
        let mut w = World3d::new();
        let rig = Ragdoll::build(&mut w, Vec3::ZERO, 1.0);
        let mut drag = DragController::new(DragPlane::CameraFacing);

        let grabbed = drag.on_press(&mut w, torso_ray()).unwrap();
        assert_eq!(grabbed, rig.parts[1].body);
        let start = w.body_transform(grabbed).0;

        // Slide the pointer 2m along +X over half a second of simulation.
        for i in 0..30 {
            let x = (i + 1) as f32 * 2.0 / 30.0;
            let ray =
                PointerRay { origin: Vec3::new(x, 0.75, 5.0), dir: Vec3::new(0.0, 0.0, -1.0) };
            drag.on_move(&mut w, ray);
            w.step(DT);
        }
        drag.on_release(&mut w);

        let end = w.body_transform(grabbed).0;
        let displacement = end - start;
        assert!(displacement.x > 0.2, "torso did not follow the pointer: {displacement:?}");
        let velocity = w.body_velocity(grabbed);
        assert!(velocity.dot(Vec3::X) > 0.0, "released with no carry-through");
    }

    #[test]
    fn fixed_depth_keeps_ray_distance() {
        let mut w = World3d::new();
        let _rig = Ragdoll::build(&mut w, Vec3::ZERO, 1.0);
        let mut drag = DragController::new(DragPlane::FixedDepth);
        drag.on_press(&mut w, torso_ray()).unwrap();
        // Hit the torso front face at z = 0.1, so depth is 4.9 from z = 5.
        let depth = drag.active.as_ref().unwrap().depth;
        assert!((depth - 4.9).abs() < 0.05, "depth {depth}");
    }
}

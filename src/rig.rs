// rig.rs — ragdoll assembly. The anatomical topology (11 parts, 10 joints)
// is a declarative table in assets/rig.json, loaded once via OnceLock and
// consumed by one generic builder; the 2D and 3D backends share it.

use std::sync::OnceLock;

use glam::Vec3;
use serde::Deserialize;

use crate::canvas::VisualProxy;
use crate::sim::{
    BodyId, BodyShape, BodySpec, CollisionTag, JointId, JointKind, JointSpec, Material, Motion,
    RigidBodySim,
};

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaterialTag {
    Skin,
    Cloth,
}

impl MaterialTag {
    // Rendering only; no physical effect.
    pub fn color(self) -> egui::Color32 {
        match self {
            MaterialTag::Skin => egui::Color32::from_rgb(255, 219, 172),
            MaterialTag::Cloth => egui::Color32::from_rgb(51, 65, 85),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ShapeDef {
    Sphere { radius: f32 },
    Box { half: [f32; 3] },
}

impl ShapeDef {
    fn scaled(self, scale: f32) -> BodyShape {
        match self {
            ShapeDef::Sphere { radius } => BodyShape::Sphere { radius: radius * scale },
            ShapeDef::Box { half } => BodyShape::Box { half: Vec3::from(half) * scale },
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum KindDef {
    Point,
    Cone { half_angle_deg: f32 },
    Hinge { axis: [f32; 3] },
}

impl KindDef {
    fn kind(self) -> JointKind {
        match self {
            KindDef::Point => JointKind::Point,
            KindDef::Cone { half_angle_deg } => {
                JointKind::Cone { half_angle: half_angle_deg.to_radians() }
            }
            KindDef::Hinge { axis } => JointKind::Hinge { axis: Vec3::from(axis) },
        }
    }
}

#[derive(Debug, Deserialize)]
struct PartDef {
    name: String,
    shape: ShapeDef,
    mass: f32,
    offset: [f32; 3],
    material: MaterialTag,
}

#[derive(Debug, Deserialize)]
struct JointDef {
    name: String,
    a: usize,
    b: usize,
    anchor_a: [f32; 3],
    anchor_b: [f32; 3],
    kind: KindDef,
}

#[derive(Debug, Deserialize)]
struct RigTable {
    parts: Vec<PartDef>,
    joints: Vec<JointDef>,
}

static RIG: OnceLock<RigTable> = OnceLock::new();

fn table() -> &'static RigTable {
    RIG.get_or_init(|| {
        let table: RigTable = serde_json::from_str(include_str!("../assets/rig.json"))
            .expect("rig.json missing or malformed");
        assert_eq!(table.parts.len(), 11, "rig must have 11 body parts");
        assert_eq!(table.joints.len(), 10, "rig must have 10 joints");
        for joint in &table.joints {
            assert!(joint.a < table.parts.len() && joint.b < table.parts.len(),
                "joint '{}' references a part outside the rig", joint.name);
            let finite = joint.anchor_a.iter().chain(&joint.anchor_b).all(|v| v.is_finite());
            assert!(finite, "joint '{}' has a non-finite anchor", joint.name);
        }
        table
    })
}

pub struct BodyPart {
    pub body: BodyId,
    pub proxy: VisualProxy,
}

pub struct RigJoint {
    pub id: JointId,
    pub name: &'static str,
    pub a: usize,
    pub b: usize,
    pub kind: JointKind,
}

/// One assembled ragdoll: the parts, their joints, nothing else. Built and
/// torn down as a unit; every body belongs to exactly this rig.
pub struct Ragdoll {
    pub parts: Vec<BodyPart>,
    pub joints: Vec<RigJoint>,
}

const LIMB_FRICTION: f32 = 0.5;
const LIMB_RESTITUTION: f32 = 0.3;

impl Ragdoll {
    /// Lays the 11 parts out around `spawn` (scaled uniformly) and wires the
    /// 10 joints. The caller owns registering the result with its renderer.
    pub fn build(sim: &mut impl RigidBodySim, spawn: Vec3, scale: f32) -> Self {
        debug_assert!(spawn.is_finite(), "non-finite spawn position");
        debug_assert!(scale.is_finite() && scale > 0.0, "bad rig scale");
        let table = table();

        let parts: Vec<BodyPart> = table.parts.iter().map(|def| {
            let shape = def.shape.scaled(scale);
            let body = sim.add_body(&BodySpec {
                shape,
                mass: def.mass,
                position: spawn + Vec3::from(def.offset) * scale,
                motion: Motion::Dynamic,
                material: Material { friction: LIMB_FRICTION, restitution: LIMB_RESTITUTION },
                tag: CollisionTag::Ragdoll,
            });
            BodyPart { body, proxy: VisualProxy::new(shape, def.material.color()) }
        }).collect();

        let joints = table.joints.iter().map(|def| {
            let id = sim.add_joint(&JointSpec {
                kind: def.kind.kind(),
                body_a: parts[def.a].body,
                body_b: parts[def.b].body,
                anchor_a: Vec3::from(def.anchor_a) * scale,
                anchor_b: Vec3::from(def.anchor_b) * scale,
            });
            RigJoint { id, name: def.name.as_str(), a: def.a, b: def.b, kind: def.kind.kind() }
        }).collect();

        Self { parts, joints }
    }

    /// Copy authoritative body transforms onto the visual proxies.
    pub fn sync(&mut self, sim: &impl RigidBodySim) {
        for part in &mut self.parts {
            let (position, rotation) = sim.body_transform(part.body);
            part.proxy.position = position;
            part.proxy.rotation = rotation;
        }
    }

    /// Deregister joints, then bodies. Drains the rig; the ids are dead.
    pub fn teardown(&mut self, sim: &mut impl RigidBodySim) {
        for joint in self.joints.drain(..) {
            sim.remove_joint(joint.id);
        }
        for part in self.parts.drain(..) {
            sim.remove_body(part.body);
        }
    }

    pub fn contains(&self, body: BodyId) -> bool {
        self.parts.iter().any(|p| p.body == body)
    }

    /// Human label for the narrator ("left arm", "torso", ...).
    pub fn limb_label(&self, body: BodyId) -> &'static str {
        let Some(idx) = self.parts.iter().position(|p| p.body == body) else {
            return "anatomy";
        };
        match table().parts[idx].name.as_str() {
            "head" => "head",
            "torso" => "torso",
            "pelvis" => "pelvis",
            "l_upper_arm" | "l_lower_arm" => "left arm",
            "r_upper_arm" | "r_lower_arm" => "right arm",
            "l_upper_leg" | "l_lower_leg" => "left leg",
            "r_upper_leg" | "r_lower_leg" => "right leg",
            _ => "anatomy",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world3d::World3d;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn eleven_parts_ten_joints() {
        let mut w = World3d::new();
        let rig = Ragdoll::build(&mut w, Vec3::ZERO, 1.0);
        assert_eq!(rig.parts.len(), 11);
        assert_eq!(rig.joints.len(), 10);
        // Graph membership: every joint endpoint indexes this rig's part set.
        for joint in &rig.joints {
            assert!(joint.a < rig.parts.len());
            assert!(joint.b < rig.parts.len());
            assert!(rig.contains(rig.parts[joint.a].body));
            assert!(rig.contains(rig.parts[joint.b].body));
        }
    }

    #[test]
    fn cone_limits_match_anatomy() {
        let mut w = World3d::new();
        let rig = Ragdoll::build(&mut w, Vec3::ZERO, 1.0);
        for joint in &rig.joints {
            let expected = match joint.name {
                "neck" | "l_hip" | "r_hip" => Some(45.0_f32.to_radians()),
                "l_shoulder" | "r_shoulder" => Some(60.0_f32.to_radians()),
                _ => None,
            };
            match (expected, joint.kind) {
                (Some(angle), JointKind::Cone { half_angle }) => {
                    assert!((half_angle - angle).abs() < 1.0e-6, "{}", joint.name);
                }
                (None, JointKind::Point) => {}
                _ => panic!("joint '{}' has the wrong kind", joint.name),
            }
        }
    }

    #[test]
    fn head_spawns_at_offset_with_radius() {
        let mut w = World3d::new();
        let rig = Ragdoll::build(&mut w, Vec3::ZERO, 1.0);
        let head = &rig.parts[0];
        assert_eq!(head.proxy.shape, BodyShape::Sphere { radius: 0.15 });
        let (pos, _) = w.body_transform(head.body);
        assert!((pos - Vec3::new(0.0, 1.2, 0.0)).length() < 1.0e-5);
    }

    #[test]
    fn scale_applies_to_offsets_and_shapes() {
        let mut w = World3d::new();
        let spawn = Vec3::new(1.0, 0.0, -2.0);
        let rig = Ragdoll::build(&mut w, spawn, 2.0);
        let (pos, _) = w.body_transform(rig.parts[0].body);
        assert!((pos - (spawn + Vec3::new(0.0, 2.4, 0.0))).length() < 1.0e-5);
        assert_eq!(rig.parts[0].proxy.shape, BodyShape::Sphere { radius: 0.3 });
    }

    #[test]
    fn teardown_leaves_empty_world() {
        let mut w = World3d::new();
        let mut rig = Ragdoll::build(&mut w, Vec3::ZERO, 1.0);
        assert_eq!(w.body_count(), 11);
        assert_eq!(w.joint_count(), 10);
        rig.teardown(&mut w);
        assert_eq!(w.body_count(), 0);
        assert_eq!(w.joint_count(), 0);
    }

    #[test]
    fn rig_holds_together_under_gravity() {
        let mut w = World3d::new();
        let mut rig = Ragdoll::build(&mut w, Vec3::new(0.0, 2.0, 0.0), 1.0);
        for _ in 0..60 {
            w.step(DT);
        }
        rig.sync(&w);
        // Free fall, no ground: joints keep the head near the torso.
        let head = rig.parts[0].proxy.position;
        let torso = rig.parts[1].proxy.position;
        assert!((head - torso).length() < 1.5);
    }
}

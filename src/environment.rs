// environment.rs — the five playable scenes. Each preset is a recipe of
// scenery bodies plus an optional kinematic drive; switching presets tears
// the old recipe down body-for-body and builds the new one.

use glam::{Quat, Vec3};
use rand::Rng;

use crate::canvas::VisualProxy;
use crate::sim::{BodyId, BodyShape, BodySpec, CollisionTag, Material, Motion, RigidBodySim};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    Playground,
    BouncyCastle,
    PinMachine,
    GravityWell,
    Grinder,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::Playground,
        Preset::BouncyCastle,
        Preset::PinMachine,
        Preset::GravityWell,
        Preset::Grinder,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Playground   => "Playground",
            Preset::BouncyCastle => "Bouncy Castle",
            Preset::PinMachine   => "Pin Machine",
            Preset::GravityWell  => "Gravity Well",
            Preset::Grinder      => "The Grinder",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Preset::Playground   => "Flat ground, a ledge and one very bouncy ball.",
            Preset::BouncyCastle => "Everything bounces. The floor most of all.",
            Preset::PinMachine   => "A wall of pegs between the subject and the floor.",
            Preset::GravityWell  => "Gravity points the wrong way. Hold on.",
            Preset::Grinder      => "Two counter-rotating gears. Keep limbs clear.",
        }
    }

    /// World gravity while this preset is active.
    pub fn gravity(self) -> Vec3 {
        match self {
            Preset::GravityWell => Vec3::new(0.0, 3.3, 0.0),
            _                   => Vec3::new(0.0, -9.82, 0.0),
        }
    }
}

/// Kinematic animation applied every frame. Only the grinder uses it today.
#[derive(Clone, Copy, Debug)]
enum Drive {
    /// Constant spin about world Z; `angle` accumulates so the pose is
    /// position-driven, not velocity-driven.
    Spin { rate: f32, angle: f32 },
}

struct Element {
    body: BodyId,
    proxy: VisualProxy,
    drive: Option<Drive>,
}

/// Scenery for the active preset. Owns every body it registered and nothing
/// else; the ragdoll never passes through here.
pub struct Environment {
    preset: Preset,
    elements: Vec<Element>,
}

const GROUND_HALF: Vec3 = Vec3::new(12.5, 0.05, 12.5);
const GEAR_RATE: f32 = 2.0;

fn slate() -> egui::Color32 { egui::Color32::from_rgb(100, 116, 139) }

impl Environment {
    pub fn build(sim: &mut impl RigidBodySim, preset: Preset) -> Self {
        let mut env = Self { preset, elements: Vec::new() };
        match preset {
            Preset::Playground | Preset::GravityWell => env.build_playground(sim),
            Preset::BouncyCastle => env.build_bouncy_castle(sim),
            Preset::PinMachine => env.build_pin_machine(sim),
            Preset::Grinder => env.build_grinder(sim),
        }
        env
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    fn add(
        &mut self,
        sim: &mut impl RigidBodySim,
        spec: BodySpec,
        color: egui::Color32,
        drive: Option<Drive>,
    ) {
        let body = sim.add_body(&spec);
        let mut proxy = VisualProxy::new(spec.shape, color);
        proxy.position = spec.position;
        self.elements.push(Element { body, proxy, drive });
    }

    fn ground(&mut self, sim: &mut impl RigidBodySim, restitution: f32, color: egui::Color32) {
        self.add(
            sim,
            BodySpec {
                shape: BodyShape::Box { half: GROUND_HALF },
                mass: 0.0,
                position: Vec3::new(0.0, -GROUND_HALF.y, 0.0),
                motion: Motion::Static,
                material: Material { friction: 0.6, restitution },
                tag: CollisionTag::Scenery,
            },
            color,
            None,
        );
    }

    fn build_playground(&mut self, sim: &mut impl RigidBodySim) {
        self.ground(sim, 0.2, slate());
        // Raised platform to drape the subject over.
        self.add(
            sim,
            BodySpec {
                shape: BodyShape::Box { half: Vec3::new(1.0, 0.1, 1.0) },
                mass: 0.0,
                position: Vec3::new(2.0, 1.0, 0.0),
                motion: Motion::Static,
                material: Material::default(),
                tag: CollisionTag::Scenery,
            },
            egui::Color32::from_rgb(148, 163, 184),
            None,
        );
        self.add(
            sim,
            BodySpec {
                shape: BodyShape::Sphere { radius: 0.5 },
                mass: 5.0,
                position: Vec3::new(-2.0, 5.0, 0.0),
                motion: Motion::Dynamic,
                material: Material { friction: 0.4, restitution: 0.9 },
                tag: CollisionTag::Scenery,
            },
            egui::Color32::from_rgb(249, 115, 22),
            None,
        );
    }

    fn build_bouncy_castle(&mut self, sim: &mut impl RigidBodySim) {
        // Restitution above 1 injects energy on every floor contact.
        self.ground(sim, 1.5, egui::Color32::from_rgb(244, 114, 182));
        let mut rng = rand::thread_rng();
        for _ in 0..5 {
            let x = rng.gen_range(-2.0..2.0);
            let z = rng.gen_range(-2.0..2.0);
            self.add(
                sim,
                BodySpec {
                    shape: BodyShape::Sphere { radius: 0.3 },
                    mass: 1.0,
                    position: Vec3::new(x, 4.0, z),
                    motion: Motion::Dynamic,
                    material: Material { friction: 0.3, restitution: 1.2 },
                    tag: CollisionTag::Scenery,
                },
                egui::Color32::from_rgb(236, 72, 153),
                None,
            );
        }
    }

    fn build_pin_machine(&mut self, sim: &mut impl RigidBodySim) {
        self.ground(sim, 0.2, slate());
        // Staggered peg wall in the XY plane the camera faces by default.
        for row in 0..6 {
            let stagger = if row % 2 == 1 { 0.2 } else { 0.0 };
            for col in 0..12 {
                let x = -2.2 + col as f32 * 0.4 + stagger;
                let y = 0.6 + row as f32 * 0.5;
                self.add(
                    sim,
                    BodySpec {
                        shape: BodyShape::Sphere { radius: 0.08 },
                        mass: 0.0,
                        position: Vec3::new(x, y, 0.0),
                        motion: Motion::Static,
                        material: Material { friction: 0.2, restitution: 0.6 },
                        tag: CollisionTag::Scenery,
                    },
                    egui::Color32::from_rgb(148, 163, 184),
                    None,
                );
            }
        }
    }

    fn build_grinder(&mut self, sim: &mut impl RigidBodySim) {
        self.ground(sim, 0.2, slate());
        for (x, dir) in [(-1.0, 1.0_f32), (1.0, -1.0)] {
            self.add(
                sim,
                BodySpec {
                    shape: BodyShape::Box { half: Vec3::new(0.8, 0.8, 0.2) },
                    mass: 0.0,
                    position: Vec3::new(x, 1.0, 0.0),
                    motion: Motion::Kinematic,
                    material: Material { friction: 0.8, restitution: 0.1 },
                    tag: CollisionTag::Scenery,
                },
                egui::Color32::from_rgb(190, 18, 60),
                Some(Drive::Spin { rate: GEAR_RATE * dir, angle: 0.0 }),
            );
        }
    }

    /// Advance kinematic drives. Call once per physics step, before it.
    pub fn drive(&mut self, sim: &mut impl RigidBodySim, dt: f32) {
        for element in &mut self.elements {
            if let Some(Drive::Spin { rate, angle }) = &mut element.drive {
                *angle += *rate * dt;
                sim.set_kinematic_rotation(element.body, Quat::from_rotation_z(*angle));
            }
        }
    }

    /// Copy solver transforms onto the proxies (the dynamic ball and the
    /// gears move; statics are cheap to refresh anyway).
    pub fn sync(&mut self, sim: &impl RigidBodySim) {
        for element in &mut self.elements {
            let (position, rotation) = sim.body_transform(element.body);
            element.proxy.position = position;
            element.proxy.rotation = rotation;
        }
    }

    pub fn proxies(&self) -> impl Iterator<Item = &VisualProxy> {
        self.elements.iter().map(|e| &e.proxy)
    }

    pub fn teardown(&mut self, sim: &mut impl RigidBodySim) {
        for element in self.elements.drain(..) {
            sim.remove_body(element.body);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world3d::World3d;

    #[test]
    fn every_preset_tears_down_clean() {
        for preset in Preset::ALL {
            let mut w = World3d::new();
            let mut env = Environment::build(&mut w, preset);
            assert!(w.body_count() > 0, "{} built nothing", preset.name());
            env.teardown(&mut w);
            assert_eq!(w.body_count(), 0, "{} leaked bodies", preset.name());
            assert_eq!(w.joint_count(), 0, "{} leaked joints", preset.name());
        }
    }

    #[test]
    fn grinder_spins_two_gears_in_opposition() {
        let mut w = World3d::new();
        let env = Environment::build(&mut w, Preset::Grinder);
        let rates: Vec<f32> = env
            .elements
            .iter()
            .filter_map(|e| match e.drive {
                Some(Drive::Spin { rate, .. }) => Some(rate),
                None => None,
            })
            .collect();
        assert_eq!(rates.len(), 2);
        assert!(rates[0] * rates[1] < 0.0, "gears must counter-rotate");
    }

    #[test]
    fn gear_pose_accumulates_over_time() {
        let mut w = World3d::new();
        let mut env = Environment::build(&mut w, Preset::Grinder);
        for _ in 0..30 {
            env.drive(&mut w, 1.0 / 60.0);
            w.step(1.0 / 60.0);
        }
        env.sync(&w);
        let gear = env.elements.iter().find(|e| e.drive.is_some()).unwrap();
        let (axis, angle) = gear.proxy.rotation.to_axis_angle();
        assert!(angle.abs() > 0.3, "gear never turned");
        assert!(axis.z.abs() > 0.99, "gear must spin about Z");
    }

    #[test]
    fn gravity_well_pulls_up() {
        assert!(Preset::GravityWell.gravity().y > 0.0);
        for preset in Preset::ALL {
            if preset != Preset::GravityWell {
                assert!(preset.gravity().y < 0.0, "{}", preset.name());
            }
        }
    }

    #[test]
    fn bouncy_castle_drops_five_balls() {
        let mut w = World3d::new();
        let env = Environment::build(&mut w, Preset::BouncyCastle);
        let balls = env
            .elements
            .iter()
            .filter(|e| matches!(e.proxy.shape, BodyShape::Sphere { radius } if radius < 0.4))
            .count();
        assert_eq!(balls, 5);
    }
}

use egui::{CentralPanel, Color32, Context, RichText, TopBottomPanel};
use glam::Vec3;

use crate::canvas::{self, Camera};
use crate::drag::{DragController, DragPlane};
use crate::environment::{Environment, Preset};
use crate::narrator::{Narrator, NarratorComment};
use crate::rig::Ragdoll;
use crate::sim::RigidBodySim;
use crate::world3d::World3d;

const DT: f32 = 1.0 / 60.0;
const SPAWN: Vec3 = Vec3::new(0.0, 2.0, 0.0);
const RIG_SCALE: f32 = 1.0;

pub struct RagdollApp {
    world: World3d,
    ragdoll: Ragdoll,
    env: Environment,
    preset: Preset,
    drag: DragController,
    camera: Camera,
    narrator: Narrator,
    comment: NarratorComment,
    accumulator: f32,
    status_message: String,
    status_timer: f32,
}

impl RagdollApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        cc.egui_ctx.set_theme(egui::Theme::Dark);
        let preset = Preset::Playground;
        let mut world = World3d::new();
        world.set_gravity(preset.gravity());
        let env = Environment::build(&mut world, preset);
        let ragdoll = Ragdoll::build(&mut world, SPAWN, RIG_SCALE);
        Self {
            world,
            ragdoll,
            env,
            preset,
            drag: DragController::new(DragPlane::CameraFacing),
            camera: Camera::default(),
            narrator: Narrator::new(),
            comment: NarratorComment::default(),
            accumulator: 0.0,
            status_message: String::new(),
            status_timer: 0.0,
        }
    }

    fn set_status(&mut self, msg: &str, dur: f32) {
        self.status_message = msg.to_string();
        self.status_timer = dur;
    }

    /// Swap scenery and gravity; the subject stays where it landed.
    fn switch_preset(&mut self, preset: Preset) {
        if preset == self.preset {
            return;
        }
        self.drag.on_release(&mut self.world);
        self.env.teardown(&mut self.world);
        self.world.set_gravity(preset.gravity());
        self.env = Environment::build(&mut self.world, preset);
        self.preset = preset;
        self.set_status(&format!("Environment: {}", preset.name()), 2.0);
        self.narrator.request(
            &format!("The player switched the environment to {}.", preset.name()),
            preset.name(),
        );
    }

    /// Full rebuild: fresh scenery and a fresh subject at the spawn pose.
    fn reset(&mut self) {
        self.drag.on_release(&mut self.world);
        self.ragdoll.teardown(&mut self.world);
        self.env.teardown(&mut self.world);
        self.world.set_gravity(self.preset.gravity());
        self.env = Environment::build(&mut self.world, self.preset);
        self.ragdoll = Ragdoll::build(&mut self.world, SPAWN, RIG_SCALE);
        self.set_status("Experiment reset", 2.0);
        self.narrator.request("The player reset the experiment.", self.preset.name());
    }

    fn observer_panel(&mut self, ctx: &Context) {
        TopBottomPanel::top("observer").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                ui.add_space(8.0);
                let color = self.comment.mood.color();
                let icon_color = if self.narrator.in_flight() {
                    // Pulse while a request is out.
                    let t = ctx.input(|i| i.time);
                    let a = 0.35 + 0.65 * (0.5 + 0.5 * (t * 5.0).sin()) as f32;
                    color.gamma_multiply(a)
                } else {
                    color
                };
                ui.label(RichText::new("🧠").size(22.0).color(icon_color));
                ui.add_space(6.0);
                ui.vertical(|ui| {
                    ui.label(
                        RichText::new("DIMENSIONAL OBSERVER")
                            .size(10.0)
                            .strong()
                            .color(Color32::from_gray(140)),
                    );
                    ui.label(
                        RichText::new(format!("\"{}\"", self.comment.text))
                            .size(14.0)
                            .italics()
                            .color(color),
                    );
                });
            });
            ui.add_space(6.0);
        });
    }

    fn preset_panel(&mut self, ctx: &Context) {
        let mut clicked: Option<Preset> = None;
        let mut do_reset = false;
        TopBottomPanel::bottom("presets").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                ui.add_space(8.0);
                for preset in Preset::ALL {
                    let active = preset == self.preset;
                    let resp = ui
                        .selectable_label(active, preset.name())
                        .on_hover_text(preset.description());
                    if resp.clicked() && !active {
                        clicked = Some(preset);
                    }
                }
                ui.separator();
                if ui.button("🔄 Reset").clicked() {
                    do_reset = true;
                }
                if self.status_timer > 0.0 && !self.status_message.is_empty() {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.add_space(8.0);
                        ui.label(
                            RichText::new(&self.status_message)
                                .size(12.0)
                                .color(Color32::from_gray(170)),
                        );
                    });
                }
            });
            ui.add_space(6.0);
        });
        if let Some(preset) = clicked {
            self.switch_preset(preset);
        }
        if do_reset {
            self.reset();
        }
    }

    fn canvas(&mut self, ctx: &Context) {
        CentralPanel::default().show(ctx, |ui| {
            let size = ui.available_size();
            let dragging = self.drag.grabbed().is_some();
            let proxies = self.ragdoll.parts.iter().map(|p| &p.proxy).chain(self.env.proxies());
            let resp = canvas::draw_world(ui, &self.camera, proxies, size, dragging);

            // Grab on raw press, before egui's drag threshold displaces the
            // pointer and small limbs are missed.
            let just_pressed = resp.hovered() && ui.input(|i| i.pointer.primary_pressed());
            if just_pressed {
                if let Some(pos) = ui.input(|i| i.pointer.interact_pos()) {
                    let ray = self.camera.pointer_ray(pos, resp.rect);
                    if let Some(body) = self.drag.on_press(&mut self.world, ray) {
                        let limb = self.ragdoll.limb_label(body);
                        self.narrator.request(
                            &format!(
                                "The player grabbed the test subject's {limb} and is \
                                 flinging it around."
                            ),
                            self.preset.name(),
                        );
                    }
                }
            }
            if resp.dragged() {
                if let Some(pos) = resp.interact_pointer_pos() {
                    if self.drag.grabbed().is_some() {
                        let ray = self.camera.pointer_ray(pos, resp.rect);
                        self.drag.on_move(&mut self.world, ray);
                    } else {
                        self.camera.orbit(resp.drag_delta());
                    }
                }
            }
            if ui.input(|i| i.pointer.primary_released()) {
                self.drag.on_release(&mut self.world);
            }
            if resp.hovered() {
                self.camera.zoom(ui.input(|i| i.smooth_scroll_delta.y));
            }
        });
    }
}

impl eframe::App for RagdollApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        if let Some(comment) = self.narrator.poll() {
            self.comment = comment;
        }

        // Fixed-step simulation: drives first, then the solver, then the
        // proxies. Clamp the frame delta so a stall never explodes the sim.
        let frame_dt = ctx.input(|i| i.stable_dt).min(0.1);
        self.accumulator += frame_dt;
        while self.accumulator >= DT {
            self.env.drive(&mut self.world, DT);
            self.world.step(DT);
            self.accumulator -= DT;
        }
        self.ragdoll.sync(&self.world);
        self.env.sync(&self.world);

        self.observer_panel(ctx);
        self.preset_panel(ctx);
        self.canvas(ctx);

        if self.status_timer > 0.0 {
            self.status_timer -= frame_dt;
            if self.status_timer <= 0.0 {
                self.status_message.clear();
            }
        }
        ctx.request_repaint();
    }
}

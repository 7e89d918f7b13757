// canvas.rs — orthographic orbit camera plus the egui painter renderer.
// Physics is Y-up, screens are Y-down; project() owns that flip.

use egui::{Color32, Pos2, Rect, Response, Sense, Shape, Stroke, Ui, Vec2};
use glam::{Quat, Vec3};

use crate::drag::PointerRay;
use crate::sim::BodyShape;

#[derive(Clone, Debug)]
pub struct Camera {
    pub focus: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub radius: f32,
    /// Pixels per world meter.
    pub scale: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self { focus: Vec3::new(0.0, 1.0, 0.0), yaw: 0.0, pitch: 0.35, radius: 8.0, scale: 120.0 }
    }
}

impl Camera {
    fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        let fwd = -Vec3::new(cp * sy, sp, cp * cy);
        let right = fwd.cross(Vec3::Y).normalize();
        let up = right.cross(fwd);
        (fwd, right, up)
    }

    pub fn eye(&self) -> Vec3 {
        let (fwd, _, _) = self.basis();
        self.focus - fwd * self.radius
    }

    /// World point to screen position plus view depth. Points behind the
    /// eye are culled.
    pub fn project(&self, p: Vec3, rect: Rect) -> Option<(Pos2, f32)> {
        let (fwd, right, up) = self.basis();
        let d = p - self.eye();
        let z = d.dot(fwd);
        if z < 0.01 {
            return None;
        }
        // Orthographic: direct scale, no perspective division.
        let x = d.dot(right);
        let y = d.dot(up);
        Some((Pos2::new(rect.center().x + x * self.scale, rect.center().y - y * self.scale), z))
    }

    /// Ray through a screen position. Orthographic, so the direction is the
    /// view direction and only the origin shifts.
    pub fn pointer_ray(&self, pos: Pos2, rect: Rect) -> PointerRay {
        let (fwd, right, up) = self.basis();
        let x = (pos.x - rect.center().x) / self.scale;
        let y = (rect.center().y - pos.y) / self.scale;
        PointerRay { origin: self.eye() + right * x + up * y, dir: fwd }
    }

    pub fn orbit(&mut self, delta: Vec2) {
        self.yaw -= delta.x * 0.008;
        self.pitch = (self.pitch + delta.y * 0.008).clamp(-1.2, 1.2);
    }

    pub fn zoom(&mut self, scroll: f32) {
        if scroll != 0.0 {
            self.scale = (self.scale * (1.0 + scroll * 0.001)).clamp(20.0, 600.0);
        }
    }
}

/// What the renderer knows about a body: shape, color and the transform the
/// solver last reported.
#[derive(Clone, Debug)]
pub struct VisualProxy {
    pub shape: BodyShape,
    pub color: Color32,
    pub position: Vec3,
    pub rotation: Quat,
}

impl VisualProxy {
    pub fn new(shape: BodyShape, color: Color32) -> Self {
        Self { shape, color, position: Vec3::ZERO, rotation: Quat::IDENTITY }
    }
}

enum Primitive {
    Circle { center: Pos2, radius: f32 },
    Polygon { points: Vec<Pos2> },
}

struct DrawItem {
    prim: Primitive,
    depth: f32,
    color: Color32,
}

/// Andrew's monotone chain. Eight box corners at most, so no need to be
/// clever about allocation.
fn convex_hull(mut pts: Vec<Pos2>) -> Vec<Pos2> {
    pts.sort_by(|a, b| (a.x, a.y).partial_cmp(&(b.x, b.y)).unwrap_or(std::cmp::Ordering::Equal));
    pts.dedup_by(|a, b| (a.x - b.x).abs() < 0.01 && (a.y - b.y).abs() < 0.01);
    if pts.len() < 3 {
        return pts;
    }
    let cross = |o: Pos2, a: Pos2, b: Pos2| (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x);
    let mut lower: Vec<Pos2> = Vec::with_capacity(pts.len());
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<Pos2> = Vec::with_capacity(pts.len());
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

const BOX_CORNERS: [[f32; 3]; 8] = [
    [-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [1.0, 1.0, -1.0],
    [-1.0, -1.0,  1.0], [1.0, -1.0,  1.0], [-1.0, 1.0,  1.0], [1.0, 1.0,  1.0],
];

fn push_proxy(items: &mut Vec<DrawItem>, cam: &Camera, rect: Rect, proxy: &VisualProxy) {
    match proxy.shape {
        BodyShape::Sphere { radius } => {
            if let Some((center, depth)) = cam.project(proxy.position, rect) {
                items.push(DrawItem {
                    prim: Primitive::Circle { center, radius: radius * cam.scale },
                    depth,
                    color: proxy.color,
                });
            }
        }
        BodyShape::Box { half } => {
            let mut pts = Vec::with_capacity(8);
            let mut depth = 0.0;
            for c in BOX_CORNERS {
                let corner = proxy.position + proxy.rotation * (Vec3::from(c) * half);
                let Some((p, z)) = cam.project(corner, rect) else { return };
                pts.push(p);
                depth += z / 8.0;
            }
            let hull = convex_hull(pts);
            if hull.len() >= 3 {
                items.push(DrawItem {
                    prim: Primitive::Polygon { points: hull },
                    depth,
                    color: proxy.color,
                });
            }
        }
    }
}

fn draw_grid(p: &egui::Painter, cam: &Camera, rect: Rect, dark: bool) {
    let grid_color = if dark { Color32::from_gray(50) } else { Color32::from_gray(110) };
    let size = 12.0;
    let step = 1.0;
    let cx = cam.focus.x.round();
    let cz = cam.focus.z.round();
    let mut x = cx - size;
    while x <= cx + size {
        let a = cam.project(Vec3::new(x, 0.0, cz - size), rect);
        let b = cam.project(Vec3::new(x, 0.0, cz + size), rect);
        if let (Some((a, _)), Some((b, _))) = (a, b) {
            p.line_segment([a, b], Stroke::new(1.0, grid_color));
        }
        x += step;
    }
    let mut z = cz - size;
    while z <= cz + size {
        let a = cam.project(Vec3::new(cx - size, 0.0, z), rect);
        let b = cam.project(Vec3::new(cx + size, 0.0, z), rect);
        if let (Some((a, _)), Some((b, _))) = (a, b) {
            p.line_segment([a, b], Stroke::new(1.0, grid_color));
        }
        z += step;
    }
}

/// Paint the whole scene and return the interaction response; the caller
/// decides what presses and drags mean.
pub fn draw_world<'a>(
    ui: &mut Ui,
    cam: &Camera,
    proxies: impl Iterator<Item = &'a VisualProxy>,
    size: Vec2,
    dragging: bool,
) -> Response {
    let (resp, p) = ui.allocate_painter(size, Sense::click_and_drag());
    let dark = ui.visuals().dark_mode;
    p.rect_filled(resp.rect, 0.0, if dark { Color32::from_gray(15) } else { Color32::from_gray(85) });

    draw_grid(&p, cam, resp.rect, dark);

    let mut items: Vec<DrawItem> = Vec::new();
    for proxy in proxies {
        push_proxy(&mut items, cam, resp.rect, proxy);
    }
    // Painter's algorithm: far to near.
    items.sort_by(|a, b| b.depth.partial_cmp(&a.depth).unwrap_or(std::cmp::Ordering::Equal));
    for item in items {
        let rim = Stroke::new(1.5, Color32::from_rgba_premultiplied(255, 255, 255, 60));
        match item.prim {
            Primitive::Circle { center, radius } => {
                p.circle_filled(center + Vec2::new(1.5, 2.0), radius, Color32::from_black_alpha(50));
                p.circle_filled(center, radius, item.color);
                p.circle_stroke(center, radius, rim);
            }
            Primitive::Polygon { points } => {
                p.add(Shape::convex_polygon(points, item.color, rim));
            }
        }
    }

    p.text(
        resp.rect.min + Vec2::new(8.0, 6.0),
        egui::Align2::LEFT_TOP,
        if dragging {
            "Dragging limb..."
        } else {
            "Drag limb: grab   Drag empty: orbit   Scroll: zoom"
        },
        egui::FontId::proportional(11.0),
        Color32::from_rgba_premultiplied(200, 200, 200, 120),
    );
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> Rect {
        Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0))
    }

    #[test]
    fn focus_projects_to_center() {
        let cam = Camera::default();
        let (pos, depth) = cam.project(cam.focus, rect()).unwrap();
        assert!((pos.x - 400.0).abs() < 0.01);
        assert!((pos.y - 300.0).abs() < 0.01);
        assert!((depth - cam.radius).abs() < 0.01);
    }

    #[test]
    fn screen_y_is_flipped() {
        let cam = Camera { pitch: 0.0, ..Camera::default() };
        let above = cam.project(cam.focus + Vec3::Y, rect()).unwrap().0;
        let at = cam.project(cam.focus, rect()).unwrap().0;
        assert!(above.y < at.y, "higher world points must be higher on screen");
    }

    #[test]
    fn pointer_ray_passes_through_projected_point() {
        let cam = Camera { yaw: 0.7, pitch: 0.4, ..Camera::default() };
        let world = Vec3::new(0.3, 1.4, -0.2);
        let (screen, _) = cam.project(world, rect()).unwrap();
        let ray = cam.pointer_ray(screen, rect());
        // Distance from `world` to the ray must be ~0.
        let to_point = world - ray.origin;
        let along = to_point.dot(ray.dir);
        let closest = ray.origin + ray.dir * along;
        assert!((world - closest).length() < 1.0e-3);
    }

    #[test]
    fn behind_camera_is_culled() {
        let cam = Camera { pitch: 0.0, ..Camera::default() };
        // The eye looks along -Z at yaw 0; +Z from the eye is behind it.
        let behind = cam.eye() + Vec3::new(0.0, 0.0, 20.0);
        assert!(cam.project(behind, rect()).is_none());
    }

    #[test]
    fn hull_of_a_square_has_four_corners() {
        let pts = vec![
            Pos2::new(0.0, 0.0),
            Pos2::new(10.0, 0.0),
            Pos2::new(10.0, 10.0),
            Pos2::new(0.0, 10.0),
            Pos2::new(5.0, 5.0), // interior
        ];
        assert_eq!(convex_hull(pts).len(), 4);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut cam = Camera::default();
        for _ in 0..1000 {
            cam.zoom(500.0);
        }
        assert!(cam.scale <= 600.0);
        for _ in 0..1000 {
            cam.zoom(-500.0);
        }
        assert!(cam.scale >= 20.0);
    }
}

use glam::{Vec2, Vec3};

use crate::config::CameraConfig;

/// Horizontal view direction for a yaw as (x, z). Yaw 0 looks down -Z.
pub fn forward_from_yaw(yaw: f32) -> Vec2 {
    Vec2::new(-yaw.sin(), -yaw.cos())
}

/// Third-person orbit rig. Yaw, pitch and radius are driven only by pointer
/// and scroll input; the avatar's own rotation never feeds back into them.
///
/// `pitch` is the polar angle down from straight overhead, so larger values
/// bring the eye closer to the horizon. `yaw` is unbounded.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    yaw: f32,
    pitch: f32,
    radius: f32,
    sensitivity: f32,
    scroll_sensitivity: f32,
    pitch_limits: [f32; 2],
    radius_limits: [f32; 2],
    target_height: f32,
    captured: bool,
}

impl OrbitCamera {
    pub fn new(config: &CameraConfig) -> Self {
        let mut camera = Self {
            yaw: config.initial_yaw,
            pitch: config.initial_pitch,
            radius: config.initial_radius,
            sensitivity: config.sensitivity,
            scroll_sensitivity: config.scroll_sensitivity,
            pitch_limits: config.pitch_limits,
            radius_limits: config.radius_limits,
            target_height: config.target_height,
            captured: false,
        };
        camera.pitch = camera.clamp_pitch(camera.pitch);
        camera.radius = camera.clamp_radius(camera.radius);
        camera
    }

    /// Swap in new limits and sensitivities, keeping the current view.
    pub fn retune(&mut self, config: &CameraConfig) {
        self.sensitivity = config.sensitivity;
        self.scroll_sensitivity = config.scroll_sensitivity;
        self.pitch_limits = config.pitch_limits;
        self.radius_limits = config.radius_limits;
        self.target_height = config.target_height;
        self.pitch = self.clamp_pitch(self.pitch);
        self.radius = self.clamp_radius(self.radius);
    }

    pub fn set_captured(&mut self, captured: bool) {
        if self.captured != captured {
            tracing::debug!("Pointer capture {}", if captured { "engaged" } else { "released" });
        }
        self.captured = captured;
    }

    pub fn is_captured(&self) -> bool {
        self.captured
    }

    /// Rotate from raw pointer motion. Ignored while the pointer is not
    /// captured; nothing is stored for later.
    pub fn apply_pointer_delta(&mut self, dx: f32, dy: f32) {
        if !self.captured || !dx.is_finite() || !dy.is_finite() {
            return;
        }
        self.yaw -= dx * self.sensitivity;
        self.pitch = self.clamp_pitch(self.pitch - dy * self.sensitivity);
    }

    /// Zoom from scroll input. Ignored while the pointer is not captured.
    pub fn apply_scroll(&mut self, delta_y: f32) {
        if !self.captured || !delta_y.is_finite() {
            return;
        }
        self.radius = self.clamp_radius(self.radius + delta_y * self.scroll_sensitivity);
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Eye position orbiting `target` (the avatar root).
    pub fn eye_position(&self, target: Vec3) -> Vec3 {
        let focus = self.focus(target);
        let horizontal = self.pitch.sin() * self.radius;
        focus
            + Vec3::new(
                self.yaw.sin() * horizontal,
                self.pitch.cos() * self.radius,
                self.yaw.cos() * horizontal,
            )
    }

    fn focus(&self, target: Vec3) -> Vec3 {
        target + Vec3::new(0.0, self.target_height, 0.0)
    }

    fn clamp_pitch(&self, pitch: f32) -> f32 {
        pitch.clamp(self.pitch_limits[0], self.pitch_limits[1])
    }

    fn clamp_radius(&self, radius: f32) -> f32 {
        radius.clamp(self.radius_limits[0], self.radius_limits[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captured_camera() -> OrbitCamera {
        let mut camera = OrbitCamera::new(&CameraConfig::default());
        camera.set_captured(true);
        camera
    }

    #[test]
    fn test_pitch_clamped_after_every_delta() {
        let mut camera = captured_camera();
        camera.apply_pointer_delta(0.0, -100_000.0);
        assert!((camera.pitch() - std::f32::consts::PI / 2.2).abs() < 1e-6);
        camera.apply_pointer_delta(0.0, 100_000.0);
        assert!((camera.pitch() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_yaw_is_unbounded() {
        let mut camera = captured_camera();
        let start = camera.yaw();
        camera.apply_pointer_delta(10_000.0, 0.0);
        assert!((camera.yaw() - (start - 30.0)).abs() < 1e-3);
    }

    #[test]
    fn test_scroll_clamps_radius() {
        let mut camera = captured_camera();
        camera.apply_scroll(5000.0);
        assert_eq!(camera.radius(), 20.0);
        camera.apply_scroll(-5000.0);
        assert_eq!(camera.radius(), 4.0);
    }

    #[test]
    fn test_deltas_ignored_without_capture() {
        let mut camera = OrbitCamera::new(&CameraConfig::default());
        let (yaw, pitch, radius) = (camera.yaw(), camera.pitch(), camera.radius());
        camera.apply_pointer_delta(50.0, 50.0);
        camera.apply_scroll(300.0);
        camera.set_captured(true);
        assert_eq!(camera.yaw(), yaw);
        assert_eq!(camera.pitch(), pitch);
        assert_eq!(camera.radius(), radius);
    }

    #[test]
    fn test_forward_opposes_eye_offset() {
        let camera = OrbitCamera::new(&CameraConfig::default());
        let eye = camera.eye_position(Vec3::ZERO);
        let offset = Vec2::new(eye.x, eye.z).normalize();
        assert!((offset + forward_from_yaw(camera.yaw())).length() < 1e-5);
    }

    #[test]
    fn test_default_yaw_looks_down_positive_x() {
        let camera = OrbitCamera::new(&CameraConfig::default());
        let forward = forward_from_yaw(camera.yaw());
        assert!((forward - Vec2::X).length() < 1e-6);
    }
}

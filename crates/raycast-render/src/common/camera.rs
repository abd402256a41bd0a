use crate::control::{
    keyboard::Keyboard,
    mouse::Mouse,
    Control,
};
use nalgebra_glm::{
    Mat4,
    Vec2,
    Vec3,
    Vec4,
};
use raycast_volume::bbox::BoundingBox;
use std::time::Duration;
use winit::{
    dpi::PhysicalPosition,
    event::MouseButton,
    keyboard::KeyCode,
};

const LOOK_AT: Vec4 = Vec4::new(0.0, 0.0, 1.0, 0.0);
const CAM_RIGHT: Vec4 = Vec4::new(1.0, 0.0, 0.0, 0.0);
const CAM_UP: Vec4 = Vec4::new(0.0, 1.0, 0.0, 0.0);
const FOV_DEGREES: f32 = 60.0;

fn apply_rotation(rotation: &Vec2, look_at: &mut Vec4, cam_right: &mut Vec4, cam_up: &mut Vec4) {
    let pitch_mat = nalgebra_glm::rotate(&Mat4::identity(), rotation.y, &Vec3::new(1.0, 0.0, 0.0));
    let yaw_mat = nalgebra_glm::rotate(&Mat4::identity(), rotation.x, &Vec3::new(0.0, 1.0, 0.0));
    let rotation_mat = yaw_mat * pitch_mat;

    *look_at = nalgebra_glm::normalize(&(rotation_mat * LOOK_AT));
    *cam_right = rotation_mat * CAM_RIGHT;

    let cam_up_vec3 = nalgebra_glm::cross(&look_at.xyz(), &cam_right.xyz());
    *cam_up = Vec4::new(cam_up_vec3.x, cam_up_vec3.y, cam_up_vec3.z, 0.0);
}

/// Matrices handed to the draw strategy each frame.
#[derive(Clone, Copy, Debug)]
pub struct TransformParams {
    pub view: Mat4,
    pub proj: Mat4,
    pub view_proj: Mat4,
    pub view_inv: Mat4,
    pub proj_inv: Mat4,
    pub position: Vec3,
}

impl TransformParams {
    pub fn view_proj_inv(&self) -> Mat4 {
        self.view_inv * self.proj_inv
    }
}

/// FPS style camera: right mouse toggles look mode, WASD/QE move.
#[derive(Clone, Debug)]
pub struct Camera {
    position: Vec3,
    rotation: Vec2,
    look_at: Vec4,
    cam_right: Vec4,
    cam_up: Vec4,
    width: u32,
    height: u32,
    near_z: f32,
    far_z: f32,
    mouse_sens: f32,
    move_speed: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        let rotation = Vec2::new(std::f32::consts::PI, 0.0);
        let mut look_at = LOOK_AT;
        let mut cam_right = CAM_RIGHT;
        let mut cam_up = CAM_UP;
        apply_rotation(&rotation, &mut look_at, &mut cam_right, &mut cam_up);

        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            rotation,
            look_at,
            cam_right,
            cam_up,
            width: width.max(1),
            height: height.max(1),
            near_z: 0.01,
            far_z: 100.0,
            mouse_sens: 0.1,
            move_speed: 1.0,
        }
    }

    /// Looks down -z at `bounding_box` from a distance where the whole box is visible and
    /// scales clipping planes and movement speed to its size.
    pub fn frame_bounding_box(&mut self, bounding_box: &BoundingBox) {
        let radius = (0.5 * bounding_box.diagonal()).max(1e-3);
        let half_fov = 0.5 * FOV_DEGREES.to_radians();
        let aspect = self.width as f32 / self.height as f32;
        let half_fov_x = (half_fov.tan() * aspect).atan();
        let distance = radius / half_fov.min(half_fov_x).sin();

        self.rotation = Vec2::new(std::f32::consts::PI, 0.0);
        let rotation = self.rotation;
        apply_rotation(
            &rotation,
            &mut self.look_at,
            &mut self.cam_right,
            &mut self.cam_up,
        );
        self.position = bounding_box.center() - self.look_at.xyz() * distance;
        self.near_z = (radius * 1e-2).max(1e-4);
        self.far_z = distance + radius * 10.0;
        self.move_speed = radius;
    }

    pub fn set_extent(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    fn input_mouse(
        &mut self,
        mouse: &Mouse,
        window_center: PhysicalPosition<f32>,
        elapsed: Duration,
    ) {
        if !mouse.is_toggled(&MouseButton::Right) {
            return;
        }
        let mouse_position = mouse.position_from_center(window_center);

        const SENS_PER_SEC: f32 = 0.1;
        let sens_ratio = elapsed.as_secs_f32() * SENS_PER_SEC;
        self.rotation.x -= mouse_position.x * self.mouse_sens * sens_ratio;
        self.rotation.y += mouse_position.y * self.mouse_sens * sens_ratio;

        const EPSILON: f32 = 1e-6;
        self.rotation.y = self.rotation.y.clamp(
            -std::f32::consts::FRAC_PI_2 + EPSILON,
            std::f32::consts::FRAC_PI_2 - EPSILON,
        );

        let rotation = self.rotation;
        apply_rotation(
            &rotation,
            &mut self.look_at,
            &mut self.cam_right,
            &mut self.cam_up,
        );
    }

    fn input_keyboard(&mut self, keyboard: &Keyboard, elapsed: Duration) {
        let pressed = |key: KeyCode| keyboard.is_pressed(&key) as i32;
        let move_forward = pressed(KeyCode::KeyW) - pressed(KeyCode::KeyS);
        let move_right = pressed(KeyCode::KeyD) - pressed(KeyCode::KeyA);
        let move_up = pressed(KeyCode::KeyE) - pressed(KeyCode::KeyQ);

        let mut distance = elapsed.as_secs_f32() * self.move_speed;
        if keyboard.is_pressed(&KeyCode::AltLeft) {
            distance *= 0.25;
        }
        self.position += self.look_at.xyz() * move_forward as f32 * distance;
        self.position -= self.cam_right.xyz() * move_right as f32 * distance;
        self.position += self.cam_up.xyz() * move_up as f32 * distance;
    }

    pub fn input_control(
        &mut self,
        control: &Control,
        window_center: PhysicalPosition<f32>,
        elapsed: Duration,
    ) {
        self.input_mouse(control.mouse(), window_center, elapsed);
        self.input_keyboard(control.keyboard(), elapsed);
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_move_speed(&mut self, move_speed: f32) {
        self.move_speed = move_speed;
    }

    pub fn move_speed(&self) -> f32 {
        self.move_speed
    }

    pub fn set_mouse_sens(&mut self, mouse_sens: f32) {
        self.mouse_sens = mouse_sens;
    }

    pub fn mouse_sens(&self) -> f32 {
        self.mouse_sens
    }

    pub fn create_view_matrix(&self) -> Mat4 {
        nalgebra_glm::look_at(
            &self.position,
            &(self.position + self.look_at.xyz()),
            &self.cam_up.xyz(),
        )
    }

    /// Vulkan style projection: depth in [0, 1], y pointing down.
    pub fn create_projection_matrix(&self) -> Mat4 {
        let mut proj = nalgebra_glm::perspective_fov_rh_zo(
            FOV_DEGREES.to_radians(),
            self.width as f32,
            self.height as f32,
            self.near_z,
            self.far_z,
        );
        proj[(1, 1)] *= -1.0;
        proj
    }

    pub fn create_transform_params(&self) -> TransformParams {
        let view = self.create_view_matrix();
        let proj = self.create_projection_matrix();
        TransformParams {
            view,
            proj,
            view_proj: proj * view,
            view_inv: nalgebra_glm::inverse(&view),
            proj_inv: nalgebra_glm::inverse(&proj),
            position: self.position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(view_proj: &Mat4, point: &Vec3) -> Vec3 {
        let clip = view_proj * Vec4::new(point.x, point.y, point.z, 1.0);
        clip.xyz() / clip.w
    }

    #[test]
    fn test_framed_box_is_visible() {
        let bounding_box = BoundingBox::new(Vec3::new(-1.0, 0.0, 2.0), Vec3::new(3.0, 1.0, 4.0));
        let mut camera = Camera::new(1280, 720);
        camera.frame_bounding_box(&bounding_box);
        let transform = camera.create_transform_params();

        let center = project(&transform.view_proj, &bounding_box.center());
        assert!(center.x.abs() < 1e-4 && center.y.abs() < 1e-4);

        for corner in bounding_box.edges() {
            let ndc = project(&transform.view_proj, &Vec3::from_row_slice(&corner));
            assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0, "{:?}", ndc);
            assert!(ndc.z > 0.0 && ndc.z < 1.0, "{:?}", ndc);
        }
    }

    #[test]
    fn test_inverse_round_trip() {
        let mut camera = Camera::new(640, 480);
        camera.frame_bounding_box(&BoundingBox::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0)));
        let transform = camera.create_transform_params();
        let point = Vec3::new(0.25, 0.5, 0.75);
        let ndc = project(&transform.view_proj, &point);
        let back = project(&transform.view_proj_inv(), &ndc);
        assert!((back - point).norm() < 1e-3);
    }

    #[test]
    fn test_projection_flips_y() {
        let camera = Camera::new(100, 100);
        let transform = camera.create_transform_params();
        // a point above the camera's view axis lands in the upper half, which is negative y
        let above = camera.position() + Vec3::new(0.0, 0.5, -2.0);
        assert!(project(&transform.view_proj, &above).y < 0.0);
    }
}

use glam::{Mat4, Vec3};

/// Tunables edited live from the UI and read by the pipeline every frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneParams {
    pub clear_color: Vec3,
    pub light_position: Vec3,
    pub light_color: Vec3,
    pub light_intensity: f32,
    pub exposure: f32,
    pub bloom_intensity: f32,
    pub blur_spread: f32,
    pub bloom_enabled: bool,
    pub shadows_enabled: bool,
}

pub const DEFAULT_LIGHT_POSITION: Vec3 = Vec3::new(250.0, 505.0, 100.0);

impl Default for SceneParams {
    fn default() -> Self {
        Self {
            clear_color: Vec3::new(0.1, 0.6, 0.8),
            light_position: DEFAULT_LIGHT_POSITION,
            light_color: Vec3::new(1.0, 0.9, 0.9),
            light_intensity: 1.0,
            exposure: 1.0,
            bloom_intensity: 1.0,
            blur_spread: 1.0,
            bloom_enabled: true,
            shadows_enabled: true,
        }
    }
}

/// Placement of a whole model: uniform scale about the origin, then translation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObjectTransform {
    pub translation: Vec3,
    pub scale: f32,
}

impl Default for ObjectTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            scale: 1.0,
        }
    }
}

impl ObjectTransform {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_translation(self.translation) * Mat4::from_scale(Vec3::splat(self.scale))
    }
}

/// Orthographic light view looking from `position` at the origin. A light at the
/// origin (or a non-finite position) has no view direction, so the default light
/// position is used instead.
pub fn light_space_matrix(position: Vec3, extent: f32, near: f32, far: f32) -> Mat4 {
    let position = if position.is_finite() && position.length_squared() > f32::EPSILON {
        position
    } else {
        DEFAULT_LIGHT_POSITION
    };
    let direction = (-position).normalize();
    let up = if direction.dot(Vec3::Y).abs() > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let projection = Mat4::orthographic_rh(-extent, extent, -extent, extent, near, far);
    projection * Mat4::look_at_rh(position, Vec3::ZERO, up)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn scale_applies_before_translation() {
        let transform = ObjectTransform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            scale: 2.0,
        };
        let p = transform.matrix().transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::new(3.0, 2.0, 3.0), EPSILON));
    }

    #[test]
    fn origin_lands_in_the_middle_of_the_shadow_map() {
        let position = SceneParams::default().light_position;
        let clip = light_space_matrix(position, 500.0, 0.1, 10_000.0) * Vec3::ZERO.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < EPSILON && ndc.y.abs() < EPSILON);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn light_at_the_origin_uses_the_default_position() {
        let fallback = light_space_matrix(Vec3::ZERO, 500.0, 0.1, 10_000.0);
        assert!(fallback.is_finite());
        let default = light_space_matrix(DEFAULT_LIGHT_POSITION, 500.0, 0.1, 10_000.0);
        assert!(fallback.abs_diff_eq(default, EPSILON));

        let nan = light_space_matrix(Vec3::splat(f32::NAN), 500.0, 0.1, 10_000.0);
        assert!(nan.is_finite());
    }

    #[test]
    fn overhead_light_still_builds_a_view() {
        let matrix = light_space_matrix(Vec3::new(0.0, 100.0, 0.0), 10.0, 0.1, 500.0);
        assert!(matrix.is_finite());
    }
}

use crate::asset::Model;
use crate::scene::camera::Camera;
use crate::scene::params::{ObjectTransform, SceneParams};

/// A loaded model placed in the world.
#[derive(Debug)]
pub struct SceneObject {
    pub name: String,
    pub model: Model,
    pub transform: ObjectTransform,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, model: Model, transform: ObjectTransform) -> Self {
        Self {
            name: name.into(),
            model,
            transform,
        }
    }
}

/// Everything one frame reads, built by the application and handed to the renderer.
#[derive(Clone, Copy, Debug)]
pub struct FrameContext<'a> {
    pub camera: &'a Camera,
    pub params: &'a SceneParams,
    pub objects: &'a [SceneObject],
    pub aspect: f32,
}

impl<'a> FrameContext<'a> {
    pub fn new(
        camera: &'a Camera,
        params: &'a SceneParams,
        objects: &'a [SceneObject],
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            camera,
            params,
            objects,
            aspect: width.max(1) as f32 / height.max(1) as f32,
        }
    }
}

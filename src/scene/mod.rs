pub mod camera;
pub mod frame;
pub mod params;

pub use camera::{Camera, Direction};
pub use frame::{FrameContext, SceneObject};
pub use params::{light_space_matrix, ObjectTransform, SceneParams, DEFAULT_LIGHT_POSITION};

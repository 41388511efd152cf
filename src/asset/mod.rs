pub mod cache;
pub mod handle;
pub mod import;
pub mod model;

pub use cache::AssetCache;
pub use handle::Handle;
pub use import::{DefaultImporter, ImportError, PostProcessSteps, SceneImporter};
pub use model::Model;

pub mod context;
pub mod mesh;
pub mod passes;
pub mod pipeline_builder;
pub mod program;
#[allow(clippy::module_inception)]
pub mod renderer;
pub mod target;
pub mod texture;
pub mod vertex;

pub use context::RenderContext;
pub use mesh::{sampler_uniform_names, Mesh, TextureBinding};
pub use passes::{FramePlan, PassDesc, PassKind, PlanOptions};
pub use program::{Program, ProgramDesc};
pub use renderer::{Overlay, OverlayTarget, PassStats, Renderer, RendererStats};
pub use target::{check_completeness, IncompleteTarget, OffscreenTarget, TargetDesc};
pub use texture::{MipGenerator, Texture, TextureKind};
pub use vertex::{QuadVertex, Vertex};

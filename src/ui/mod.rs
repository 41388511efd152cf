mod egui_integration;
mod scene_window;

use std::sync::Arc;

use winit::event::WindowEvent;
use winit::window::Window;

use crate::renderer::{Overlay, OverlayTarget, RendererStats};
use crate::scene::{SceneObject, SceneParams};

pub use egui;
pub use egui_integration::EguiContext;
pub use scene_window::SceneWindow;

/// egui drawn as the last pass of the frame.
///
/// [`EguiOverlay::prepare`] runs the UI against the current scene state before the
/// frame is rendered; the renderer then calls [`Overlay::record`] after the
/// composite to paint the tessellated output onto the surface.
pub struct EguiOverlay {
    window: Arc<Window>,
    context: EguiContext,
    scene_window: SceneWindow,
    pending: Option<egui::FullOutput>,
}

impl EguiOverlay {
    pub fn new(device: &wgpu::Device, output_format: wgpu::TextureFormat, window: Arc<Window>) -> Self {
        let context = EguiContext::new(device, output_format, &window);
        Self {
            window,
            context,
            scene_window: SceneWindow::default(),
            pending: None,
        }
    }

    pub fn handle_event(&mut self, event: &WindowEvent) -> bool {
        self.context.handle_event(&self.window, event)
    }

    pub fn wants_pointer(&self) -> bool {
        self.context.wants_pointer()
    }

    pub fn toggle_scene_window(&mut self) {
        self.scene_window.toggle();
    }

    pub fn prepare(
        &mut self,
        params: &mut SceneParams,
        objects: &mut [SceneObject],
        stats: &RendererStats,
    ) {
        self.context.begin_frame(&self.window);
        self.scene_window
            .show(self.context.context(), params, objects, stats);
        self.pending = Some(self.context.end_frame(&self.window));
    }
}

impl Overlay for EguiOverlay {
    fn record(&mut self, target: OverlayTarget<'_>) {
        if let Some(output) = self.pending.take() {
            let pixels_per_point = self.window.scale_factor() as f32;
            self.context.render(target, output, pixels_per_point);
        }
    }
}

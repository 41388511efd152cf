use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    error::EventLoopError,
    event::*,
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::asset::{DefaultImporter, Model};
use crate::input::InputState;
use crate::renderer::{Overlay, RenderContext, Renderer};
use crate::scene::{Camera, FrameContext, ObjectTransform, SceneObject, SceneParams};
use crate::settings::{ModelEntry, RenderSettings};
#[cfg(feature = "egui")]
use crate::ui::EguiOverlay;

const WINDOW_TITLE: &str = "wgpu-bloom";
/// Pixels of touchpad scroll per line of wheel scroll.
const PIXELS_PER_LINE: f32 = 20.0;

#[derive(Debug)]
pub enum AppError {
    EventLoop(EventLoopError),
    Init(String),
    Surface(wgpu::SurfaceError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::EventLoop(err) => write!(f, "event loop error: {}", err),
            AppError::Init(msg) => write!(f, "initialization failed: {}", msg),
            AppError::Surface(err) => write!(f, "surface error: {}", err),
        }
    }
}

impl std::error::Error for AppError {}

impl From<EventLoopError> for AppError {
    fn from(err: EventLoopError) -> Self {
        AppError::EventLoop(err)
    }
}

pub struct App {
    settings: RenderSettings,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    camera: Camera,
    params: SceneParams,
    objects: Vec<SceneObject>,
    input: InputState,
    last_frame: Option<Instant>,
    error: Option<AppError>,
    #[cfg(feature = "egui")]
    ui: Option<EguiOverlay>,
}

impl App {
    pub fn new(settings: RenderSettings) -> Self {
        let params = SceneParams {
            bloom_enabled: settings.bloom.enabled,
            shadows_enabled: settings.shadows.enabled,
            ..SceneParams::default()
        };
        Self {
            settings,
            window: None,
            renderer: None,
            camera: Camera::default(),
            params,
            objects: Vec::new(),
            input: InputState::default(),
            last_frame: None,
            error: None,
            #[cfg(feature = "egui")]
            ui: None,
        }
    }

    /// The error that stopped the event loop, if any.
    pub fn take_error(&mut self) -> Option<AppError> {
        self.error.take()
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: AppError) {
        log::error!("{}", err);
        self.error = Some(err);
        event_loop.exit();
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<(), AppError> {
        let resolution = &self.settings.resolution;
        let attributes = Window::default_attributes()
            .with_title(WINDOW_TITLE)
            .with_inner_size(PhysicalSize::new(resolution.width, resolution.height));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| AppError::Init(format!("Failed to create window: {}", err)))?,
        );

        let context = pollster::block_on(RenderContext::new(window.clone(), &self.settings))
            .map_err(AppError::Init)?;
        let renderer = Renderer::new(context, self.settings.clone());

        self.objects = self
            .settings
            .models
            .iter()
            .map(|entry| load_object(&renderer, entry))
            .collect();

        #[cfg(feature = "egui")]
        {
            self.ui = Some(EguiOverlay::new(
                renderer.device(),
                renderer.surface_format(),
                window.clone(),
            ));
        }

        window.request_redraw();
        self.window = Some(window);
        self.renderer = Some(renderer);
        Ok(())
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, code: KeyCode, state: ElementState) {
        let pressed = state == ElementState::Pressed;
        match code {
            KeyCode::Escape if pressed => event_loop.exit(),
            KeyCode::KeyF if pressed => {
                log::info!("Mouse look disabled");
                self.input.mouse.set_enabled(false);
            }
            KeyCode::KeyR if pressed => {
                log::info!("Mouse look enabled");
                self.input.mouse.set_enabled(true);
            }
            #[cfg(feature = "egui")]
            KeyCode::F1 if pressed => {
                if let Some(ui) = self.ui.as_mut() {
                    ui.toggle_scene_window();
                }
            }
            _ => self.input.key(code, pressed),
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let dt = self
            .last_frame
            .map(|last| (now - last).as_secs_f32())
            .unwrap_or(0.0);
        self.last_frame = Some(now);

        self.input.apply_movement(&mut self.camera, dt);

        let Self {
            renderer,
            camera,
            params,
            objects,
            #[cfg(feature = "egui")]
            ui,
            ..
        } = self;
        let Some(renderer) = renderer.as_mut() else {
            return;
        };

        #[cfg(feature = "egui")]
        let overlay: Option<&mut dyn Overlay> = match ui.as_mut() {
            Some(ui) => {
                ui.prepare(params, objects, renderer.stats());
                Some(ui)
            }
            None => None,
        };
        #[cfg(not(feature = "egui"))]
        let overlay: Option<&mut dyn Overlay> = None;

        let size = renderer.size();
        let frame = FrameContext::new(camera, params, objects, size.width, size.height);
        let result = renderer.render(&frame, overlay).map(|_| ());

        match result {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost or outdated; reconfiguring");
                renderer.reconfigure();
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface timeout; skipping frame");
            }
            Err(err @ wgpu::SurfaceError::OutOfMemory) => {
                self.fail(event_loop, AppError::Surface(err));
                return;
            }
            Err(err) => {
                log::warn!("Surface error: {}", err);
            }
        }

        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn load_object(renderer: &Renderer, entry: &ModelEntry) -> SceneObject {
    let model = Model::load(
        renderer.device(),
        renderer.queue(),
        &DefaultImporter,
        &entry.path,
    );
    let name = entry
        .path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| entry.path.display().to_string());
    SceneObject::new(
        name,
        model,
        ObjectTransform {
            translation: Vec3::from(entry.translation),
            scale: entry.scale,
        },
    )
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        if self.window.as_ref().map(|w| w.id()) != Some(id) {
            return;
        }

        #[cfg(feature = "egui")]
        if let Some(ui) = self.ui.as_mut() {
            if !matches!(event, WindowEvent::RedrawRequested) && ui.handle_event(&event) {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size);
                }
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                if let (Some(window), Some(renderer)) = (&self.window, self.renderer.as_mut()) {
                    renderer.resize(window.inner_size());
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        repeat: false,
                        ..
                    },
                ..
            } => self.handle_key(event_loop, code, state),
            WindowEvent::CursorMoved { position, .. } => {
                #[cfg(feature = "egui")]
                if self.ui.as_ref().is_some_and(|ui| ui.wants_pointer()) {
                    return;
                }
                if let Some((dx, dy)) = self.input.mouse.on_cursor(position.x, position.y) {
                    self.camera.process_look(dx, dy);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(position) => position.y as f32 / PIXELS_PER_LINE,
                };
                self.camera.process_zoom(y);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

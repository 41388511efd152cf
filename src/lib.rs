pub mod app;
pub mod asset;
pub mod input;
pub mod io;
pub mod renderer;
pub mod scene;
pub mod settings;
#[cfg(feature = "egui")]
pub mod ui;

use winit::event_loop::EventLoop;

pub use app::{App, AppError};
use settings::RenderSettings;

pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

pub fn run() -> Result<(), AppError> {
    init_logging();

    log::info!("Starting wgpu-bloom");

    let settings = RenderSettings::load();
    let event_loop = EventLoop::new()?;
    let mut app = App::new(settings);

    event_loop.run_app(&mut app)?;

    if let Some(err) = app.take_error() {
        return Err(err);
    }

    log::info!("Application shutdown complete");
    Ok(())
}

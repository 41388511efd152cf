use std::path::PathBuf;

use log::{info, warn};
use serde::{Deserialize, Serialize};

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub present_mode: PresentModeSetting,
    #[serde(default)]
    pub shadows: ShadowSettings,
    #[serde(default)]
    pub bloom: BloomSettings,
    #[serde(default = "RenderSettings::default_shader_dir")]
    pub shader_dir: PathBuf,
    #[serde(default = "RenderSettings::default_models")]
    pub models: Vec<ModelEntry>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            present_mode: PresentModeSetting::default(),
            shadows: ShadowSettings::default(),
            bloom: BloomSettings::default(),
            shader_dir: Self::default_shader_dir(),
            models: Self::default_models(),
        }
    }
}

impl RenderSettings {
    pub fn load() -> Self {
        Self::load_from_path(SETTINGS_FILE)
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|err| {
                warn!(
                    "Failed to parse {:?} ({}). Falling back to default render settings.",
                    path, err
                );
                RenderSettings::default()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Render settings file {:?} not found. Using default settings.",
                    path
                );
                RenderSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default render settings.",
                    path, err
                );
                RenderSettings::default()
            }
        }
    }

    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        let settings = serde_json::from_str::<RenderSettings>(contents)?;
        info!("Loaded render settings");
        Ok(settings.validate())
    }

    fn validate(mut self) -> Self {
        if self.resolution.width == 0 || self.resolution.height == 0 {
            warn!("Resolution must be greater than zero. Using default resolution.");
            self.resolution = Resolution::default();
        }

        if self.shadows.map_size == 0 {
            warn!("Shadow map size must be greater than zero. Using default value.");
            self.shadows.map_size = ShadowSettings::default().map_size;
        }

        if !self.shadows.extent.is_finite() || self.shadows.extent <= 0.0 {
            warn!("Shadow extent must be positive. Using default value.");
            self.shadows.extent = ShadowSettings::default().extent;
        }

        let (near, far) = (self.shadows.near, self.shadows.far);
        if !near.is_finite() || !far.is_finite() || near <= 0.0 || far <= near {
            warn!("Shadow depth range is empty. Using default near/far planes.");
            let defaults = ShadowSettings::default();
            self.shadows.near = defaults.near;
            self.shadows.far = defaults.far;
        }

        if self.bloom.blur_iterations == 0 && self.bloom.enabled {
            warn!("Bloom needs at least one blur iteration. Using default value.");
            self.bloom.blur_iterations = BloomSettings::default().blur_iterations;
        }

        if !self.bloom.threshold.is_finite() || self.bloom.threshold <= 0.0 {
            warn!("Bloom threshold must be positive. Using default value.");
            self.bloom.threshold = BloomSettings::default().threshold;
        }

        self
    }

    pub fn present_mode(&self, available: &[wgpu::PresentMode]) -> wgpu::PresentMode {
        let desired = self.present_mode.to_wgpu();
        if available.contains(&desired) {
            return desired;
        }

        warn!(
            "Requested present mode {:?} is not supported. Falling back to FIFO.",
            desired
        );

        if available.contains(&wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            available
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo)
        }
    }

    fn default_shader_dir() -> PathBuf {
        PathBuf::from("shaders")
    }

    fn default_models() -> Vec<ModelEntry> {
        vec![
            ModelEntry {
                path: PathBuf::from("assets/sponza/Sponza.gltf"),
                scale: 0.5,
                translation: [0.0, 0.0, 0.0],
            },
            ModelEntry {
                path: PathBuf::from("assets/cube/cube.obj"),
                scale: 10.0,
                translation: [0.0, 40.0, 0.0],
            },
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowSettings {
    pub enabled: bool,
    pub map_size: u32,
    /// Half-width of the light's orthographic box, in world units.
    pub extent: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            map_size: 2048,
            extent: 500.0,
            near: 0.1,
            far: 10_000.0,
        }
    }
}

/// Where bright pixels are isolated for bloom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrightPassMode {
    /// Second color output of the lit program.
    SceneOutput,
    /// Dedicated full-screen pass over the scene color.
    ExtractPass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomSettings {
    pub enabled: bool,
    pub bright_pass: BrightPassMode,
    pub blur_iterations: u32,
    pub threshold: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bright_pass: BrightPassMode::SceneOutput,
            blur_iterations: 10,
            threshold: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub path: PathBuf,
    #[serde(default = "ModelEntry::default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub translation: [f32; 3],
}

impl ModelEntry {
    const fn default_scale() -> f32 {
        1.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeSetting {
    Fifo,
    FifoRelaxed,
    Immediate,
    Mailbox,
    AutoVsync,
    AutoNoVsync,
}

impl PresentModeSetting {
    fn to_wgpu(&self) -> wgpu::PresentMode {
        match self {
            PresentModeSetting::Fifo => wgpu::PresentMode::Fifo,
            PresentModeSetting::FifoRelaxed => wgpu::PresentMode::FifoRelaxed,
            PresentModeSetting::Immediate => wgpu::PresentMode::Immediate,
            PresentModeSetting::Mailbox => wgpu::PresentMode::Mailbox,
            PresentModeSetting::AutoVsync => wgpu::PresentMode::AutoVsync,
            PresentModeSetting::AutoNoVsync => wgpu::PresentMode::AutoNoVsync,
        }
    }
}

impl Default for PresentModeSetting {
    fn default() -> Self {
        PresentModeSetting::Fifo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let settings = RenderSettings::from_json("{}").unwrap();
        assert_eq!(settings, RenderSettings::default());
        assert_eq!(settings.models.len(), 2);
        assert_eq!(settings.bloom.blur_iterations, 10);
        assert_eq!(settings.shadows.map_size, 2048);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let settings = RenderSettings::from_json(
            r#"{ "bloom": { "bright_pass": "extract_pass" }, "shadows": { "enabled": false } }"#,
        )
        .unwrap();
        assert_eq!(settings.bloom.bright_pass, BrightPassMode::ExtractPass);
        assert!(settings.bloom.enabled);
        assert!(!settings.shadows.enabled);
        assert_eq!(settings.shadows.extent, 500.0);
    }

    #[test]
    fn model_entries_default_scale_and_translation() {
        let settings =
            RenderSettings::from_json(r#"{ "models": [ { "path": "a.obj" } ] }"#).unwrap();
        assert_eq!(
            settings.models,
            [ModelEntry {
                path: PathBuf::from("a.obj"),
                scale: 1.0,
                translation: [0.0; 3],
            }]
        );
    }

    #[test]
    fn validate_replaces_invalid_values_with_defaults() {
        let mut invalid = RenderSettings::default();
        invalid.resolution = Resolution {
            width: 0,
            height: 0,
        };
        invalid.shadows.map_size = 0;
        invalid.shadows.near = 5.0;
        invalid.shadows.far = 1.0;
        invalid.bloom.blur_iterations = 0;
        invalid.bloom.threshold = -1.0;

        let validated = invalid.validate();
        let defaults = RenderSettings::default();

        assert_eq!(validated.resolution, defaults.resolution);
        assert_eq!(validated.shadows, defaults.shadows);
        assert_eq!(validated.bloom, defaults.bloom);
    }

    #[test]
    fn non_finite_values_fall_back_to_defaults() {
        let mut invalid = RenderSettings::default();
        invalid.shadows.extent = f32::NAN;
        invalid.shadows.near = f32::NAN;
        invalid.bloom.threshold = f32::INFINITY;
        let validated = invalid.validate();
        assert_eq!(validated.shadows, ShadowSettings::default());
        assert_eq!(validated.bloom.threshold, BloomSettings::default().threshold);

        let mut far_nan = RenderSettings::default();
        far_nan.shadows.far = f32::NAN;
        assert_eq!(far_nan.validate().shadows.far, ShadowSettings::default().far);
    }

    #[test]
    fn zero_iterations_allowed_when_bloom_is_off() {
        let mut settings = RenderSettings::default();
        settings.bloom.enabled = false;
        settings.bloom.blur_iterations = 0;
        assert_eq!(settings.validate().bloom.blur_iterations, 0);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(RenderSettings::from_json("{ resolution: ").is_err());
    }

    #[test]
    fn present_mode_returns_desired_when_available() {
        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let available = [
            wgpu::PresentMode::Fifo,
            wgpu::PresentMode::Mailbox,
            wgpu::PresentMode::Immediate,
        ];

        assert_eq!(
            settings.present_mode(&available),
            wgpu::PresentMode::Mailbox
        );
    }

    #[test]
    fn present_mode_falls_back_to_fifo_when_desired_missing() {
        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let available = [wgpu::PresentMode::Fifo, wgpu::PresentMode::Immediate];

        assert_eq!(settings.present_mode(&available), wgpu::PresentMode::Fifo);
    }

    #[test]
    fn present_mode_uses_first_available_when_fifo_missing() {
        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let available = [wgpu::PresentMode::Immediate];

        assert_eq!(
            settings.present_mode(&available),
            wgpu::PresentMode::Immediate
        );
    }
}

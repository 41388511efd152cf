use glam::{Mat4, Vec3};
use winit::dpi::PhysicalSize;

use crate::renderer::context::RenderContext;
use crate::renderer::passes::{
    Attachment, DrawSet, FramePlan, ImageRef, PassDesc, PassKind, PlanOptions, ProgramId, TargetId,
};
use crate::renderer::program::{
    ColorTarget, DepthState, FallbackTextures, Program, ProgramDesc, VertexInput,
};
use crate::renderer::target::{FullscreenQuad, OffscreenTarget, TargetDesc};
use crate::renderer::texture::Texture;
use crate::scene::{light_space_matrix, FrameContext};
use crate::settings::{BrightPassMode, RenderSettings};

pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 10_000.0;

const SCENE_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;
const SHADOW_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const SHADOW_BIAS: (i32, f32) = (2, 2.0);

/// Draw calls one pass issued.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassStats {
    pub label: String,
    pub draw_calls: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RendererStats {
    pub frame_index: u64,
    pub passes: Vec<PassStats>,
}

impl RendererStats {
    pub fn draw_calls(&self) -> u32 {
        self.passes.iter().map(|pass| pass.draw_calls).sum()
    }
}

/// Surface-bound resources handed to a UI overlay after the composite.
pub struct OverlayTarget<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub view: &'a wgpu::TextureView,
    pub size: PhysicalSize<u32>,
}

/// Records draw commands on top of the finished frame.
pub trait Overlay {
    fn record(&mut self, target: OverlayTarget<'_>);
}

struct Programs {
    depth: Program,
    lit: Program,
    extract: Program,
    blur: Program,
    composite: Program,
}

impl Programs {
    fn new(
        device: &wgpu::Device,
        settings: &RenderSettings,
        formats: &TargetFormats,
        surface_format: wgpu::TextureFormat,
        fallbacks: &FallbackTextures,
    ) -> Self {
        let dir = &settings.shader_dir;
        let fullscreen_vs = dir.join("fullscreen.vert.wgsl");

        let depth = ProgramDesc {
            label: "Depth Program".into(),
            vertex_path: dir.join("shadow.vert.wgsl"),
            fragment_path: dir.join("shadow.frag.wgsl"),
            vertex_input: VertexInput::Mesh,
            color_targets: Vec::new(),
            depth: Some(DepthState {
                format: SHADOW_FORMAT,
                write: true,
                compare: wgpu::CompareFunction::LessEqual,
                bias: Some(SHADOW_BIAS),
            }),
            cull_mode: Some(wgpu::Face::Back),
        };

        let lit_output = Some(ColorTarget {
            format: formats.hdr,
            blend: formats.hdr_blend,
        });
        let lit = ProgramDesc {
            label: "Lit Program".into(),
            vertex_path: dir.join("lit.vert.wgsl"),
            fragment_path: dir.join("lit.frag.wgsl"),
            vertex_input: VertexInput::Mesh,
            color_targets: match settings.bloom.bright_pass {
                BrightPassMode::SceneOutput => vec![lit_output, lit_output],
                BrightPassMode::ExtractPass => vec![lit_output, None],
            },
            depth: Some(DepthState {
                format: SCENE_DEPTH_FORMAT,
                write: true,
                compare: wgpu::CompareFunction::LessEqual,
                bias: None,
            }),
            cull_mode: Some(wgpu::Face::Back),
        };

        let fullscreen = |label: &str, fragment: &str, format: wgpu::TextureFormat| ProgramDesc {
            label: label.into(),
            vertex_path: fullscreen_vs.clone(),
            fragment_path: dir.join(fragment),
            vertex_input: VertexInput::Quad,
            color_targets: vec![Some(ColorTarget {
                format,
                blend: None,
            })],
            depth: None,
            cull_mode: None,
        };
        Self {
            depth: Program::new(device, &depth, fallbacks),
            lit: Program::new(device, &lit, fallbacks),
            extract: Program::new(
                device,
                &fullscreen("Extract Program", "extract.frag.wgsl", formats.hdr),
                fallbacks,
            ),
            blur: Program::new(
                device,
                &fullscreen("Blur Program", "blur.frag.wgsl", formats.hdr),
                fallbacks,
            ),
            composite: Program::new(
                device,
                &fullscreen("Composite Program", "composite.frag.wgsl", surface_format),
                fallbacks,
            ),
        }
    }

    fn get_mut(&mut self, id: ProgramId) -> &mut Program {
        match id {
            ProgramId::Depth => &mut self.depth,
            ProgramId::Lit => &mut self.lit,
            ProgramId::Extract => &mut self.extract,
            ProgramId::Blur => &mut self.blur,
            ProgramId::Composite => &mut self.composite,
        }
    }

    fn all_mut(&mut self) -> [&mut Program; 5] {
        [
            &mut self.depth,
            &mut self.lit,
            &mut self.extract,
            &mut self.blur,
            &mut self.composite,
        ]
    }

    fn all_linked(&self) -> bool {
        [
            &self.depth,
            &self.lit,
            &self.extract,
            &self.blur,
            &self.composite,
        ]
        .iter()
        .all(|program| program.is_linked())
    }
}

struct TargetFormats {
    hdr: wgpu::TextureFormat,
    hdr_blend: Option<wgpu::BlendState>,
    scene_colors: usize,
}

impl TargetFormats {
    fn new(device: &wgpu::Device, settings: &RenderSettings, float32_filterable: bool) -> Self {
        let hdr = if !settings.bloom.enabled {
            wgpu::TextureFormat::Rgba8Unorm
        } else if float32_filterable {
            wgpu::TextureFormat::Rgba32Float
        } else {
            wgpu::TextureFormat::Rgba16Float
        };
        let blendable = hdr
            .guaranteed_format_features(device.features())
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::BLENDABLE);
        if !blendable {
            log::warn!("{:?} targets are not blendable; scene pass draws without alpha blending", hdr);
        }
        Self {
            hdr,
            hdr_blend: blendable.then_some(wgpu::BlendState::ALPHA_BLENDING),
            scene_colors: match settings.bloom.bright_pass {
                BrightPassMode::SceneOutput => 2,
                BrightPassMode::ExtractPass => 1,
            },
        }
    }
}

struct Targets {
    shadow: Option<OffscreenTarget>,
    scene: OffscreenTarget,
    bright: OffscreenTarget,
    ping_pong: [OffscreenTarget; 2],
    quad: FullscreenQuad,
}

impl Targets {
    fn new(
        device: &wgpu::Device,
        settings: &RenderSettings,
        formats: &TargetFormats,
        size: PhysicalSize<u32>,
        shadow: Option<OffscreenTarget>,
    ) -> Self {
        let (width, height) = (size.width.max(1), size.height.max(1));
        let color = |label: &str, count: usize, depth: Option<(wgpu::TextureFormat, bool)>| {
            OffscreenTarget::new(
                device,
                TargetDesc {
                    label: label.into(),
                    width,
                    height,
                    colors: vec![formats.hdr; count],
                    depth,
                },
            )
        };

        Self {
            shadow,
            scene: color("Scene Target", formats.scene_colors, Some((SCENE_DEPTH_FORMAT, false))),
            bright: color("Bright Target", 1, None),
            ping_pong: [color("Ping-Pong 0", 1, None), color("Ping-Pong 1", 1, None)],
            quad: FullscreenQuad::new(device),
        }
    }

    /// The shadow map does not follow the window size, so it is built separately.
    fn shadow_map(device: &wgpu::Device, settings: &RenderSettings) -> Option<OffscreenTarget> {
        settings.shadows.enabled.then(|| {
            OffscreenTarget::new(
                device,
                TargetDesc {
                    label: "Shadow Map".into(),
                    width: settings.shadows.map_size,
                    height: settings.shadows.map_size,
                    colors: Vec::new(),
                    depth: Some((SHADOW_FORMAT, true)),
                },
            )
        })
    }

    fn target(&self, id: TargetId) -> Option<&OffscreenTarget> {
        match id {
            TargetId::ShadowMap => self.shadow.as_ref(),
            TargetId::Scene => Some(&self.scene),
            TargetId::BrightPass => Some(&self.bright),
            TargetId::PingPong(index) => self.ping_pong.get(index),
            TargetId::Surface => None,
        }
    }

    fn image(&self, image: ImageRef) -> Option<&Texture> {
        let target = self.target(image.target)?;
        match image.attachment {
            Attachment::Color(slot) => target.color(slot),
            Attachment::Depth => target.depth(),
        }
    }
}

/// Matrices and constants shared by every pass of one frame.
struct FrameUniforms {
    view: Mat4,
    projection: Mat4,
    light_space: Mat4,
    camera_position: Vec3,
    threshold: f32,
    gamma: f32,
}

/// Owns the device, programs and offscreen targets, and runs the frame plan.
pub struct Renderer {
    context: RenderContext,
    settings: RenderSettings,
    formats: TargetFormats,
    programs: Programs,
    targets: Targets,
    plan: FramePlan,
    stats: RendererStats,
}

impl Renderer {
    pub fn new(context: RenderContext, settings: RenderSettings) -> Self {
        let device = &context.device;
        let fallbacks = FallbackTextures::new(device, &context.queue);
        let formats = TargetFormats::new(device, &settings, context.float32_filterable);
        let programs = Programs::new(
            device,
            &settings,
            &formats,
            context.surface_format(),
            &fallbacks,
        );
        if !programs.all_linked() {
            log::error!("One or more programs failed to build; output will be undefined");
        }
        let shadow = Targets::shadow_map(device, &settings);
        let targets = Targets::new(device, &settings, &formats, context.size, shadow);
        let plan = FramePlan::build(PlanOptions {
            shadows: targets.shadow.is_some(),
            bloom: settings.bloom.enabled,
            bright_pass: settings.bloom.bright_pass,
            blur_iterations: settings.bloom.blur_iterations,
            overlay: false,
        });

        log::info!(
            "Renderer ready: {}x{}, HDR {:?}, surface {:?}",
            context.size.width,
            context.size.height,
            formats.hdr,
            context.surface_format()
        );

        Self {
            context,
            settings,
            formats,
            programs,
            targets,
            plan,
            stats: RendererStats::default(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.context.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.context.queue
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.context.surface_format()
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn stats(&self) -> &RendererStats {
        &self.stats
    }

    pub fn plan(&self) -> &FramePlan {
        &self.plan
    }

    /// Resize the surface and recreate every screen-sized target.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if !self.context.resize(new_size) {
            return;
        }
        for program in self.programs.all_mut() {
            program.clear_bind_groups();
        }
        let shadow = self.targets.shadow.take();
        self.targets = Targets::new(
            &self.context.device,
            &self.settings,
            &self.formats,
            new_size,
            shadow,
        );
        log::info!("Resized render targets to {}x{}", new_size.width, new_size.height);
    }

    pub fn reconfigure(&self) {
        self.context.reconfigure();
    }

    fn plan_options(&self, frame: &FrameContext<'_>, overlay: bool) -> PlanOptions {
        PlanOptions {
            shadows: self.targets.shadow.is_some() && frame.params.shadows_enabled,
            bloom: self.settings.bloom.enabled && frame.params.bloom_enabled,
            bright_pass: self.settings.bloom.bright_pass,
            blur_iterations: self.settings.bloom.blur_iterations,
            overlay,
        }
    }

    /// Run every pass of the plan into the next surface image and present it.
    pub fn render(
        &mut self,
        frame: &FrameContext<'_>,
        overlay: Option<&mut dyn Overlay>,
    ) -> Result<&RendererStats, wgpu::SurfaceError> {
        let Some(surface) = self.context.surface.as_ref() else {
            log::error!("Renderer has no surface to present to");
            return Err(wgpu::SurfaceError::Lost);
        };
        let output = surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.render_to_view(frame, &view, overlay);
        output.present();
        Ok(&self.stats)
    }

    /// Run every pass of the plan, writing the final image into `output`, which must
    /// match [`Renderer::surface_format`] and [`Renderer::size`].
    pub fn render_to_view(
        &mut self,
        frame: &FrameContext<'_>,
        output: &wgpu::TextureView,
        mut overlay: Option<&mut dyn Overlay>,
    ) -> &RendererStats {
        let options = self.plan_options(frame, overlay.is_some());
        if options != self.plan.options() {
            log::debug!("Rebuilding frame plan: {:?}", options);
            self.plan = FramePlan::build(options);
        }

        let Self {
            context,
            settings,
            programs,
            targets,
            plan,
            stats,
            ..
        } = self;
        let device = &context.device;
        let queue = &context.queue;

        let uniforms = FrameUniforms {
            view: frame.camera.view_matrix(),
            projection: frame.camera.projection_matrix(frame.aspect, NEAR_PLANE, FAR_PLANE),
            light_space: light_space_matrix(
                frame.params.light_position,
                settings.shadows.extent,
                settings.shadows.near,
                settings.shadows.far,
            ),
            camera_position: frame.camera.position,
            threshold: settings.bloom.threshold,
            gamma: if context.surface_format().is_srgb() {
                1.0
            } else {
                2.2
            },
        };

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });
        for program in programs.all_mut() {
            program.begin_frame();
        }

        let recorder = PassRecorder {
            device,
            queue,
            targets,
            output,
            frame,
            uniforms: &uniforms,
        };

        stats.frame_index += 1;
        stats.passes.clear();
        for pass in plan.passes() {
            let draw_calls = match pass.draws {
                DrawSet::Overlay => {
                    if let Some(overlay) = overlay.as_deref_mut() {
                        overlay.record(OverlayTarget {
                            device,
                            queue,
                            encoder: &mut encoder,
                            view: output,
                            size: context.size,
                        });
                    }
                    0
                }
                _ => recorder.record(&mut encoder, pass, programs),
            };
            stats.passes.push(PassStats {
                label: pass.label.clone(),
                draw_calls,
            });
        }

        queue.submit(std::iter::once(encoder.finish()));
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            log::error!("Frame {} failed validation: {}", stats.frame_index, err);
        }
        stats
    }
}

/// Records one pass of the plan. Holds everything that is read-only for the frame.
struct PassRecorder<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    targets: &'a Targets,
    output: &'a wgpu::TextureView,
    frame: &'a FrameContext<'a>,
    uniforms: &'a FrameUniforms,
}

impl PassRecorder<'_> {
    fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pass: &PassDesc,
        programs: &mut Programs,
    ) -> u32 {
        let Some(program_id) = pass.program else {
            return 0;
        };
        let program = programs.get_mut(program_id);
        self.set_uniforms(pass, program);

        for input in &pass.inputs {
            match self.targets.image(input.image) {
                Some(texture) => program.set_texture(input.name, texture),
                None => log::warn!("{} reads {:?}, which does not exist", pass.label, input.image),
            }
        }

        let clear = pass.clear.then(|| match pass.kind {
            PassKind::Scene => {
                let c = self.frame.params.clear_color;
                wgpu::Color {
                    r: f64::from(c.x),
                    g: f64::from(c.y),
                    b: f64::from(c.z),
                    a: 1.0,
                }
            }
            _ => wgpu::Color::BLACK,
        });

        let (colors, depth, viewport) = match pass.target {
            TargetId::Surface => (
                vec![Some(wgpu::RenderPassColorAttachment {
                    view: self.output,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: clear.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                None,
                None,
            ),
            id => {
                let Some(target) = self.targets.target(id) else {
                    log::warn!("{} writes {:?}, which does not exist", pass.label, id);
                    return 0;
                };
                (
                    target.color_attachments(clear, program.color_slots()),
                    target.depth_stencil_attachment(),
                    Some(target.size()),
                )
            }
        };

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&pass.label),
            color_attachments: &colors,
            depth_stencil_attachment: depth,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        if let (PassKind::Shadow, Some((width, height))) = (pass.kind, viewport) {
            rpass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
        }
        program.activate(&mut rpass);

        let draw_calls = match pass.draws {
            DrawSet::SceneUnits => {
                let mut draw_calls = 0;
                for object in self.frame.objects {
                    program.set_mat4("model_mat", &object.transform.matrix());
                    draw_calls += object
                        .model
                        .draw(self.device, self.queue, &mut rpass, program);
                }
                draw_calls
            }
            DrawSet::FullscreenQuad => {
                program.apply(self.device, self.queue, &mut rpass);
                self.targets.quad.draw(&mut rpass);
                1
            }
            DrawSet::Overlay => 0,
        };
        drop(rpass);

        for input in &pass.inputs {
            program.unbind_texture(input.name);
        }
        draw_calls
    }

    fn set_uniforms(&self, pass: &PassDesc, program: &mut Program) {
        let params = self.frame.params;
        let uniforms = self.uniforms;
        match pass.kind {
            PassKind::Shadow => {
                program.set_mat4("light_space_matrix", &uniforms.light_space);
            }
            PassKind::Scene => {
                program.set_mat4("view_mat", &uniforms.view);
                program.set_mat4("projection_mat", &uniforms.projection);
                program.set_mat4("light_space_matrix", &uniforms.light_space);
                program.set_vec3("camera_position", uniforms.camera_position);
                program.set_vec3("light_position", params.light_position);
                program.set_vec3("light_color", params.light_color);
                program.set_float("light_intensity", params.light_intensity);
                program.set_float("bloom_threshold", uniforms.threshold);
                program.set_bool("shadows_enabled", pass.reads(TargetId::ShadowMap));
            }
            PassKind::BrightExtract => {
                program.set_float("threshold", uniforms.threshold);
            }
            PassKind::Blur { horizontal, .. } => {
                program.set_bool("horizontal", horizontal);
                program.set_float("spread", params.blur_spread);
            }
            PassKind::Composite => {
                let bloom = pass.inputs.iter().any(|input| input.name == "bloom_blur");
                program.set_float("exposure", params.exposure);
                program.set_float("bloom_intensity", params.bloom_intensity);
                program.set_bool("bloom_enabled", bloom);
                program.set_float("gamma", uniforms.gamma);
            }
            PassKind::Overlay => {}
        }
    }
}

//! The frame as data: an ordered list of pass descriptors.
//!
//! [`FramePlan::build`] decides which passes run and what each one reads and
//! writes. The renderer walks the list in order; nothing about pass ordering lives
//! in its control flow.

use crate::settings::BrightPassMode;

/// Render destinations a pass can write or sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetId {
    ShadowMap,
    Scene,
    BrightPass,
    PingPong(usize),
    Surface,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Attachment {
    Color(usize),
    Depth,
}

/// One image of a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageRef {
    pub target: TargetId,
    pub attachment: Attachment,
}

impl ImageRef {
    pub const fn color(target: TargetId, slot: usize) -> Self {
        Self {
            target,
            attachment: Attachment::Color(slot),
        }
    }

    pub const fn depth(target: TargetId) -> Self {
        Self {
            target,
            attachment: Attachment::Depth,
        }
    }
}

/// Where the bright-pass image lives for a given mode.
pub fn bright_image(mode: BrightPassMode) -> ImageRef {
    match mode {
        BrightPassMode::SceneOutput => ImageRef::color(TargetId::Scene, 1),
        BrightPassMode::ExtractPass => ImageRef::color(TargetId::BrightPass, 0),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProgramId {
    Depth,
    Lit,
    Extract,
    Blur,
    Composite,
}

/// A texture uniform and the image bound to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputBinding {
    pub name: &'static str,
    pub image: ImageRef,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawSet {
    /// Every draw unit of every scene object.
    SceneUnits,
    FullscreenQuad,
    /// Whatever the UI overlay records.
    Overlay,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassKind {
    Shadow,
    Scene,
    BrightExtract,
    Blur { iteration: u32, horizontal: bool },
    Composite,
    Overlay,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PassDesc {
    pub label: String,
    pub kind: PassKind,
    pub target: TargetId,
    /// `None` for passes that bring their own pipeline (the overlay).
    pub program: Option<ProgramId>,
    pub inputs: Vec<InputBinding>,
    pub draws: DrawSet,
    pub clear: bool,
}

impl PassDesc {
    pub fn reads(&self, target: TargetId) -> bool {
        self.inputs.iter().any(|input| input.image.target == target)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlanOptions {
    pub shadows: bool,
    pub bloom: bool,
    pub bright_pass: BrightPassMode,
    pub blur_iterations: u32,
    pub overlay: bool,
}

/// Read/write assignment of the ping-pong targets across blur iterations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlurSchedule {
    pub iterations: u32,
    pub source: ImageRef,
}

impl BlurSchedule {
    pub fn new(iterations: u32, source: ImageRef) -> Self {
        Self { iterations, source }
    }

    pub fn writes(&self, iteration: u32) -> TargetId {
        TargetId::PingPong(iteration as usize % 2)
    }

    /// The first iteration reads the bright-pass image, each later one the image the
    /// previous iteration wrote.
    pub fn reads(&self, iteration: u32) -> ImageRef {
        if iteration == 0 {
            self.source
        } else {
            ImageRef::color(self.writes(iteration - 1), 0)
        }
    }

    pub fn horizontal(&self, iteration: u32) -> bool {
        iteration % 2 == 0
    }

    /// Image the composite samples as bloom: the last blur output, or the untouched
    /// bright-pass image when there are no iterations.
    pub fn result(&self) -> ImageRef {
        match self.iterations {
            0 => self.source,
            n => ImageRef::color(self.writes(n - 1), 0),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FramePlan {
    options: PlanOptions,
    passes: Vec<PassDesc>,
}

impl FramePlan {
    pub fn build(options: PlanOptions) -> Self {
        let mut passes = Vec::new();

        if options.shadows {
            passes.push(PassDesc {
                label: "Shadow Pass".into(),
                kind: PassKind::Shadow,
                target: TargetId::ShadowMap,
                program: Some(ProgramId::Depth),
                inputs: Vec::new(),
                draws: DrawSet::SceneUnits,
                clear: true,
            });
        }

        passes.push(PassDesc {
            label: "Scene Pass".into(),
            kind: PassKind::Scene,
            target: TargetId::Scene,
            program: Some(ProgramId::Lit),
            inputs: if options.shadows {
                vec![InputBinding {
                    name: "depth_map",
                    image: ImageRef::depth(TargetId::ShadowMap),
                }]
            } else {
                Vec::new()
            },
            draws: DrawSet::SceneUnits,
            clear: true,
        });

        let mut composite_inputs = vec![InputBinding {
            name: "scene",
            image: ImageRef::color(TargetId::Scene, 0),
        }];

        if options.bloom {
            let bright = bright_image(options.bright_pass);
            if options.bright_pass == BrightPassMode::ExtractPass {
                passes.push(PassDesc {
                    label: "Bright Pass".into(),
                    kind: PassKind::BrightExtract,
                    target: TargetId::BrightPass,
                    program: Some(ProgramId::Extract),
                    inputs: vec![InputBinding {
                        name: "scene",
                        image: ImageRef::color(TargetId::Scene, 0),
                    }],
                    draws: DrawSet::FullscreenQuad,
                    clear: true,
                });
            }

            let schedule = BlurSchedule::new(options.blur_iterations, bright);
            for iteration in 0..schedule.iterations {
                let horizontal = schedule.horizontal(iteration);
                passes.push(PassDesc {
                    label: format!("Blur Pass {}", iteration),
                    kind: PassKind::Blur {
                        iteration,
                        horizontal,
                    },
                    target: schedule.writes(iteration),
                    program: Some(ProgramId::Blur),
                    inputs: vec![InputBinding {
                        name: "image",
                        image: schedule.reads(iteration),
                    }],
                    draws: DrawSet::FullscreenQuad,
                    clear: true,
                });
            }

            composite_inputs.push(InputBinding {
                name: "bloom_blur",
                image: schedule.result(),
            });
        }

        passes.push(PassDesc {
            label: "Composite Pass".into(),
            kind: PassKind::Composite,
            target: TargetId::Surface,
            program: Some(ProgramId::Composite),
            inputs: composite_inputs,
            draws: DrawSet::FullscreenQuad,
            clear: true,
        });

        if options.overlay {
            passes.push(PassDesc {
                label: "Overlay Pass".into(),
                kind: PassKind::Overlay,
                target: TargetId::Surface,
                program: None,
                inputs: Vec::new(),
                draws: DrawSet::Overlay,
                clear: false,
            });
        }

        Self { options, passes }
    }

    pub fn options(&self) -> PlanOptions {
        self.options
    }

    pub fn passes(&self) -> &[PassDesc] {
        &self.passes
    }
}

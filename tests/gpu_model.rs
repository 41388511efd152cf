//! Tests that need a GPU adapter. Run with `cargo test -- --ignored`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use wgpu_bloom::asset::import::{
    ImportedMaterial, ImportedMesh, ImportedNode, ImportedScene, ImportedTexture,
};
use wgpu_bloom::asset::Model;
use wgpu_bloom::renderer::texture::DecodedImage;
use wgpu_bloom::renderer::{MipGenerator, RenderContext, Renderer, Texture, TextureKind};
use wgpu_bloom::scene::{Camera, FrameContext, ObjectTransform, SceneObject, SceneParams};
use wgpu_bloom::settings::RenderSettings;
use winit::dpi::PhysicalSize;

const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

fn headless(width: u32, height: u32) -> RenderContext {
    pollster::block_on(RenderContext::headless(
        PhysicalSize::new(width, height),
        OUTPUT_FORMAT,
    ))
    .expect("headless adapter")
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("wgpu-bloom-gpu-{}-{}", name, std::process::id()));
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

fn quad_mesh(name: &str, material: Option<usize>) -> ImportedMesh {
    ImportedMesh {
        name: name.into(),
        positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
        normals: vec![[0.0, 0.0, 1.0]; 4],
        tex_coords: vec![vec![[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]],
        tangents: vec![[1.0, 0.0, 0.0]; 4],
        bitangents: vec![[0.0, 1.0, 0.0]; 4],
        faces: vec![vec![0, 1, 2], vec![0, 2, 3]],
        material,
    }
}

fn diffuse(path: &str) -> ImportedMaterial {
    ImportedMaterial {
        name: path.into(),
        textures: vec![(TextureKind::Diffuse, ImportedTexture::file(path))],
    }
}

fn scene(meshes: Vec<ImportedMesh>, materials: Vec<ImportedMaterial>) -> ImportedScene {
    ImportedScene {
        root: Some(ImportedNode {
            name: "root".into(),
            meshes: (0..meshes.len()).collect(),
            children: Vec::new(),
        }),
        meshes,
        materials,
        incomplete: false,
    }
}

/// Copy mip level 0 of an RGBA8 texture back to the CPU, rows unpadded.
fn read_rgba8(device: &wgpu::Device, queue: &wgpu::Queue, texture: &wgpu::Texture) -> Vec<u8> {
    let (width, height) = (texture.width(), texture.height());
    let unpadded = width * 4;
    let padded = unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
        * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback"),
        size: u64::from(padded * height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        texture.size(),
    );
    queue.submit(Some(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device
        .poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        })
        .expect("poll");
    rx.recv().expect("map callback").expect("map buffer");

    let data = slice.get_mapped_range();
    let pixels = data
        .chunks(padded as usize)
        .flat_map(|row| &row[..unpadded as usize])
        .copied()
        .collect();
    drop(data);
    buffer.unmap();
    pixels
}

fn write_png(path: &Path, color: [u8; 4]) {
    image::RgbaImage::from_pixel(4, 4, image::Rgba(color))
        .save(path)
        .expect("write png");
}

#[test]
#[ignore = "requires a GPU adapter"]
fn shared_texture_path_is_uploaded_once() {
    let context = headless(8, 8);
    let dir = scratch_dir("shared");
    write_png(&dir.join("shared.png"), [200, 40, 40, 255]);

    let imported = scene(
        vec![quad_mesh("a", Some(0)), quad_mesh("b", Some(1))],
        vec![diffuse("shared.png"), diffuse("shared.png")],
    );
    let model = Model::from_scene(
        &context.device,
        &context.queue,
        &dir.join("quads.gltf"),
        &imported,
    );

    assert_eq!(model.textures().len(), 1);
    let meshes = model.meshes();
    assert_eq!(meshes.len(), 2);
    assert_eq!(meshes[0].index_count(), 6);
    assert_eq!(meshes[1].index_count(), 6);
    assert_eq!(meshes[0].textures()[0].texture, meshes[1].textures()[0].texture);
    assert_eq!(meshes[0].sampler_names(), ["material.texture_diffuse1"]);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn missing_texture_is_bound_to_black() {
    let context = headless(8, 8);
    let dir = scratch_dir("missing");
    let imported = scene(vec![quad_mesh("a", Some(0))], vec![diffuse("does_not_exist.png")]);
    let model = Model::from_scene(
        &context.device,
        &context.queue,
        &dir.join("quad.gltf"),
        &imported,
    );

    assert_eq!(model.meshes().len(), 1);
    let binding = &model.meshes()[0].textures()[0];
    assert_eq!(binding.path, "does_not_exist.png");
    let texture = model.textures().get(binding.texture).expect("resident texture");
    assert_eq!(texture.texture.width(), 1);
    assert_eq!(
        read_rgba8(&context.device, &context.queue, &texture.texture),
        [0, 0, 0, 255]
    );
}

#[test]
#[ignore = "requires a GPU adapter"]
fn mip_pipelines_are_built_once_per_format() {
    let context = headless(8, 8);
    let (device, queue) = (&context.device, &context.queue);
    let mut mips = MipGenerator::new();

    let rgba = DecodedImage {
        data: vec![255; 8 * 8 * 4],
        width: 8,
        height: 8,
        format: wgpu::TextureFormat::Rgba8Unorm,
    };
    Texture::from_decoded(device, queue, &mut mips, &rgba, Some("a"));
    Texture::from_decoded(device, queue, &mut mips, &rgba, Some("b"));
    assert_eq!(mips.pipeline_count(), 1);

    let luma = DecodedImage {
        data: vec![255; 8 * 8],
        width: 8,
        height: 8,
        format: wgpu::TextureFormat::R8Unorm,
    };
    let texture = Texture::from_decoded(device, queue, &mut mips, &luma, Some("c"));
    assert_eq!(mips.pipeline_count(), 2);
    assert_eq!(texture.texture.mip_level_count(), 4);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn repeated_frames_produce_identical_output() {
    let (width, height) = (64, 64);
    let context = headless(width, height);
    let mut settings = RenderSettings::default();
    settings.shadows.map_size = 256;
    settings.bloom.blur_iterations = 4;

    let quad = Model::from_scene(
        &context.device,
        &context.queue,
        Path::new("quad.gltf"),
        &scene(vec![quad_mesh("quad", None)], Vec::new()),
    );
    let objects = [SceneObject::new("quad", quad, ObjectTransform::default())];
    let camera = Camera::default();
    let params = SceneParams {
        light_intensity: 4.0,
        ..SceneParams::default()
    };

    let mut renderer = Renderer::new(context, settings);
    let output = renderer.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("Frame Output"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: renderer.surface_format(),
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = output.create_view(&wgpu::TextureViewDescriptor::default());

    let mut frame_bytes = Vec::new();
    for _ in 0..2 {
        let frame = FrameContext::new(&camera, &params, &objects, width, height);
        let stats = renderer.render_to_view(&frame, &view, None).clone();
        assert_eq!(stats.passes.first().map(|pass| pass.draw_calls), Some(1));
        assert_eq!(
            stats.passes.last().map(|pass| pass.label.as_str()),
            Some("Composite Pass")
        );
        frame_bytes.push(read_rgba8(renderer.device(), renderer.queue(), &output));
    }

    assert_eq!(renderer.stats().frame_index, 2);
    assert_eq!(frame_bytes[0].len(), (width * height * 4) as usize);
    assert!(frame_bytes[0] == frame_bytes[1], "frames differ");
}

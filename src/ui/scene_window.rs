use egui::{RichText, Ui};
use glam::Vec3;

use crate::renderer::RendererStats;
use crate::scene::{ObjectTransform, SceneObject, SceneParams};

/// Live editor for the scene tunables, object placement and last-frame stats.
pub struct SceneWindow {
    title: String,
    open: bool,
}

impl Default for SceneWindow {
    fn default() -> Self {
        Self {
            title: "Scene".to_string(),
            open: true,
        }
    }
}

impl SceneWindow {
    pub fn toggle(&mut self) {
        self.open = !self.open;
    }

    pub fn show(
        &mut self,
        ctx: &egui::Context,
        params: &mut SceneParams,
        objects: &mut [SceneObject],
        stats: &RendererStats,
    ) {
        let mut open = self.open;
        egui::Window::new(&self.title)
            .default_width(280.0)
            .open(&mut open)
            .show(ctx, |ui| {
                egui::CollapsingHeader::new("Lighting")
                    .default_open(true)
                    .show(ui, |ui| draw_lighting(ui, params));
                egui::CollapsingHeader::new("Post-processing")
                    .default_open(true)
                    .show(ui, |ui| draw_post(ui, params));
                egui::CollapsingHeader::new("Objects").show(ui, |ui| {
                    for object in objects.iter_mut() {
                        ui.label(RichText::new(&object.name).strong());
                        draw_transform(ui, &mut object.transform);
                        ui.separator();
                    }
                });
                egui::CollapsingHeader::new("Frame").show(ui, |ui| draw_stats(ui, stats));
            });
        self.open = open;
    }
}

fn color_row(ui: &mut Ui, label: &str, value: &mut Vec3) {
    ui.horizontal(|ui| {
        let mut rgb = value.to_array();
        if ui.color_edit_button_rgb(&mut rgb).changed() {
            *value = Vec3::from(rgb);
        }
        ui.label(label);
    });
}

fn vec3_row(ui: &mut Ui, label: &str, value: &mut Vec3, speed: f64) {
    ui.horizontal(|ui| {
        ui.add(egui::DragValue::new(&mut value.x).speed(speed).prefix("x: "));
        ui.add(egui::DragValue::new(&mut value.y).speed(speed).prefix("y: "));
        ui.add(egui::DragValue::new(&mut value.z).speed(speed).prefix("z: "));
        ui.label(label);
    });
}

fn draw_lighting(ui: &mut Ui, params: &mut SceneParams) {
    color_row(ui, "Background", &mut params.clear_color);
    color_row(ui, "Light color", &mut params.light_color);
    vec3_row(ui, "Light position", &mut params.light_position, 1.0);
    ui.add(egui::Slider::new(&mut params.light_intensity, 0.0..=20.0).text("Intensity"));
    ui.checkbox(&mut params.shadows_enabled, "Shadows");
}

fn draw_post(ui: &mut Ui, params: &mut SceneParams) {
    ui.add(egui::Slider::new(&mut params.exposure, 0.05..=10.0).text("Exposure"));
    ui.checkbox(&mut params.bloom_enabled, "Bloom");
    ui.add_enabled_ui(params.bloom_enabled, |ui| {
        ui.add(egui::Slider::new(&mut params.bloom_intensity, 0.0..=5.0).text("Bloom intensity"));
        ui.add(egui::Slider::new(&mut params.blur_spread, 0.0..=4.0).text("Blur spread"));
    });
}

fn draw_transform(ui: &mut Ui, transform: &mut ObjectTransform) {
    vec3_row(ui, "Translation", &mut transform.translation, 0.5);
    ui.add(
        egui::DragValue::new(&mut transform.scale)
            .speed(0.01)
            .range(0.001..=1000.0)
            .prefix("scale: "),
    );
}

fn draw_stats(ui: &mut Ui, stats: &RendererStats) {
    ui.label(format!("Frame {}", stats.frame_index));
    ui.label(format!("Draw calls: {}", stats.draw_calls()));
    egui::Grid::new("pass_stats").striped(true).show(ui, |ui| {
        for pass in &stats.passes {
            ui.label(&pass.label);
            ui.label(pass.draw_calls.to_string());
            ui.end_row();
        }
    });
}

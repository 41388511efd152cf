use wgpu_bloom::renderer::passes::{FramePlan, PassKind, PlanOptions, TargetId};
use wgpu_bloom::settings::{BrightPassMode, RenderSettings};

fn plan_for(settings: &RenderSettings, overlay: bool) -> FramePlan {
    FramePlan::build(PlanOptions {
        shadows: settings.shadows.enabled,
        bloom: settings.bloom.enabled,
        bright_pass: settings.bloom.bright_pass,
        blur_iterations: settings.bloom.blur_iterations,
        overlay,
    })
}

#[test]
fn default_settings_plan_ten_blur_passes_over_the_scene_bright_output() {
    let plan = plan_for(&RenderSettings::default(), false);
    let blurs: Vec<_> = plan
        .passes()
        .iter()
        .filter(|pass| matches!(pass.kind, PassKind::Blur { .. }))
        .collect();
    assert_eq!(blurs.len(), 10);
    assert_eq!(blurs[0].inputs[0].image.target, TargetId::Scene);

    let last = plan.passes().last().expect("composite");
    assert_eq!(last.kind, PassKind::Composite);
    assert_eq!(last.target, TargetId::Surface);
    assert_eq!(last.inputs[1].image.target, TargetId::PingPong(1));
}

#[test]
fn extract_mode_from_json_inserts_a_bright_pass() {
    let settings = RenderSettings::from_json(
        r#"{ "bloom": { "bright_pass": "extract_pass", "blur_iterations": 3 } }"#,
    )
    .expect("settings");
    assert_eq!(settings.bloom.bright_pass, BrightPassMode::ExtractPass);

    let plan = plan_for(&settings, true);
    let labels: Vec<_> = plan.passes().iter().map(|pass| pass.label.as_str()).collect();
    assert_eq!(
        labels,
        [
            "Shadow Pass",
            "Scene Pass",
            "Bright Pass",
            "Blur Pass 0",
            "Blur Pass 1",
            "Blur Pass 2",
            "Composite Pass",
            "Overlay Pass",
        ]
    );

    let overlay = plan.passes().last().expect("overlay");
    assert!(!overlay.clear);
    assert!(overlay.program.is_none());
}

#[test]
fn blur_direction_alternates_starting_horizontal() {
    let plan = plan_for(&RenderSettings::default(), false);
    let directions: Vec<_> = plan
        .passes()
        .iter()
        .filter_map(|pass| match pass.kind {
            PassKind::Blur { horizontal, .. } => Some(horizontal),
            _ => None,
        })
        .collect();
    for (iteration, horizontal) in directions.iter().enumerate() {
        assert_eq!(*horizontal, iteration % 2 == 0);
    }
}

#[test]
fn disabled_shadows_leave_the_scene_pass_without_a_depth_input() {
    let settings =
        RenderSettings::from_json(r#"{ "shadows": { "enabled": false } }"#).expect("settings");
    let plan = plan_for(&settings, false);
    assert_eq!(plan.passes()[0].kind, PassKind::Scene);
    assert!(plan.passes()[0].inputs.is_empty());
}

use crate::{
    common::camera::Camera,
    utils::time::Playback,
};
use imgui::{
    TreeNodeFlags,
    Ui,
};
use nalgebra_glm::Vec3;
use raycast_volume::{
    params::{
        RaycastMode,
        RaycastParams,
    },
    probe::ProbeResult,
    range::ValueRange,
    transfer::Preset,
};

/// Values shown in the stats window for one frame.
pub struct Stats {
    pub fps: f32,
    pub frame: u32,
    pub frame_count: u32,
    pub playing: bool,
    pub camera_position: Vec3,
    pub value_range: Option<ValueRange>,
    pub feedback_range: Option<ValueRange>,
    pub probe: Option<ProbeResult>,
}

/// What the user changed in the control window.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PanelResponse {
    pub params_changed: bool,
    pub preset_changed: bool,
    pub reload_requested: bool,
}

fn range_text(range: Option<ValueRange>) -> String {
    match range {
        Some(range) => format!("[{:.4}, {:.4}]", range.min, range.max),
        None => "-".to_string(),
    }
}

pub fn stats_window(ui: &Ui, stats: &Stats) {
    ui.window("Stats").build(|| {
        ui.text(format!("FPS: {:.2}", stats.fps));
        ui.text(format!(
            "frame: {} / {}{}",
            stats.frame,
            stats.frame_count,
            if stats.playing { " (playing)" } else { "" }
        ));
        ui.text(format!(
            "camera position: ({:.2}, {:.2}, {:.2})",
            stats.camera_position.x, stats.camera_position.y, stats.camera_position.z
        ));
        ui.text(format!("value range: {}", range_text(stats.value_range)));
        ui.text(format!("feedback range: {}", range_text(stats.feedback_range)));

        ui.separator();
        match &stats.probe {
            Some(probe) => {
                ui.text(format!("probe samples: {}", probe.samples));
                ui.text(format!("probe max value: {:.4}", probe.max_value));
                ui.text(format!(
                    "probe color: ({:.2}, {:.2}, {:.2}, {:.2})",
                    probe.color[0], probe.color[1], probe.color[2], probe.color[3]
                ));
                if let Some(hit) = &probe.iso_hit {
                    ui.text(format!(
                        "iso hit: ({:.2}, {:.2}, {:.2})",
                        hit.position.x, hit.position.y, hit.position.z
                    ));
                }
            }
            None => ui.text("probe: miss"),
        }
    });
}

fn lighting_controls(ui: &Ui, params: &mut RaycastParams) -> bool {
    let lighting = &mut params.lighting;
    let mut changed = ui.checkbox("lighting", &mut lighting.use_lighting);
    if !lighting.use_lighting {
        return changed;
    }
    changed |= ui.slider("ka", 0.0, 1.0, &mut lighting.ka);
    changed |= ui.slider("kd", 0.0, 1.0, &mut lighting.kd);
    changed |= ui.slider("ks", 0.0, 1.0, &mut lighting.ks);
    changed |= ui.slider("shininess", 1.0, 128.0, &mut lighting.shininess);
    changed |= ui.color_edit3("ambient color", &mut lighting.ambient_color);
    changed |= ui.color_edit3("specular color", &mut lighting.specular_color);
    changed |= ui.color_edit3("light color", &mut lighting.light_color);
    if params.mode == RaycastMode::Isosurface {
        changed |= ui.color_edit3("material color", &mut lighting.material_color);
    }
    changed |= ui.checkbox("headlight", &mut lighting.headlight);
    if !lighting.headlight {
        changed |= ui
            .input_float3("light direction", &mut lighting.light_position)
            .build();
    }
    changed
}

pub fn control_window(
    ui: &Ui,
    params: &mut RaycastParams,
    preset: &mut Preset,
    playback: &mut Playback,
    camera: &mut Camera,
) -> PanelResponse {
    let mut response = PanelResponse::default();
    ui.window("Control").build(|| {
        let mut mode_index = RaycastMode::ALL
            .iter()
            .position(|mode| *mode == params.mode)
            .unwrap_or(0);
        let mode_names = RaycastMode::ALL.map(|mode| mode.name());
        if ui.combo_simple_string("mode", &mut mode_index, &mode_names) {
            params.mode = RaycastMode::ALL[mode_index];
            response.params_changed = true;
        }

        let mut changed = ui.slider("ray step ratio", 0.1, 8.0, &mut params.ray_step_ratio);
        if params.mode.shows_opacity_threshold() {
            changed |= ui.slider("opacity threshold", 0.01, 1.0, &mut params.opacity_threshold);
        }
        if params.mode.shows_iso_controls() {
            changed |= ui.slider("iso value", 0.0, 1.0, &mut params.iso_value);
            changed |= ui.slider("opacity", 0.0, 1.0, &mut params.opacity);
        }
        if params.mode.uses_transfer_function() {
            let mut preset_index = Preset::ALL
                .iter()
                .position(|p| p == preset)
                .unwrap_or(0);
            let preset_names = Preset::ALL.map(|p| p.name());
            if ui.combo_simple_string("transfer function", &mut preset_index, &preset_names) {
                *preset = Preset::ALL[preset_index];
                response.preset_changed = true;
            }
        }
        if params.mode != RaycastMode::Aggregate
            && ui.collapsing_header("Lighting", TreeNodeFlags::DEFAULT_OPEN)
        {
            changed |= lighting_controls(ui, params);
        }
        if ui.collapsing_header("Value range", TreeNodeFlags::empty()) {
            let range_override = &mut params.range_override;
            changed |= ui.checkbox("override", &mut range_override.enabled);
            if range_override.enabled {
                changed |= ui.input_float("min", &mut range_override.min).build();
                changed |= ui.input_float("max", &mut range_override.max).build();
            }
        }
        changed |= ui.color_edit4("background", &mut params.background);
        response.params_changed |= changed;

        ui.separator();
        response.reload_requested = ui.button("reload volume");
        let mut frame = playback.frame();
        if playback.frame_count() > 1
            && ui.slider("frame", 0, playback.frame_count() - 1, &mut frame)
        {
            playback.set_frame(frame);
        }
        let mut frames_per_second = playback.frames_per_second();
        if ui.slider("playback fps", 0.5, 60.0, &mut frames_per_second) {
            playback.set_frames_per_second(frames_per_second);
        }

        ui.separator();
        let mut mouse_sens = camera.mouse_sens();
        ui.slider("mouse sens", 0.0, 1.0, &mut mouse_sens);
        camera.set_mouse_sens(mouse_sens);

        let mut move_speed = camera.move_speed();
        ui.slider("move speed", 0.0, 1.0, &mut move_speed);
        camera.set_move_speed(move_speed);
    });
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_text() {
        assert_eq!(range_text(None), "-");
        assert_eq!(
            range_text(Some(ValueRange::new(0.0, 2.5))),
            "[0.0000, 2.5000]"
        );
    }
}

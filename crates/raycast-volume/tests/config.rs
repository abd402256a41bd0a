use nalgebra_glm::Vec3;
use raycast_volume::{
    params::RaycastMode,
    probe::{
        Ray,
        VolumeSampler,
    },
    scene::{
        Scene,
        VolumeDescriptor,
    },
    source::request_frame,
    transfer::TransferFunctionSource,
};
use std::path::PathBuf;

fn config_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config")
}

fn shipped_scenes() -> Vec<Scene> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(config_root())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();
    paths
        .iter()
        .map(|path| Scene::from_path(path).unwrap())
        .collect()
}

#[test]
fn shipped_scenes_parse_and_validate() {
    let scenes = shipped_scenes();
    assert!(scenes.len() >= 4);
    let mut names: Vec<&str> = scenes.iter().map(|scene| scene.name.as_str()).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), scenes.len(), "scene names must be unique");
    for scene in &scenes {
        scene.params.validate().unwrap();
        scene.create_transfer_function().unwrap();
    }
}

#[test]
fn procedural_scenes_render_on_the_cpu() {
    for scene in shipped_scenes() {
        if !matches!(scene.volume, VolumeDescriptor::Procedural { .. }) {
            continue;
        }
        let mut source = scene.create_volume_source_in(&config_root()).unwrap();
        let extents = source.extents(0).unwrap();
        let mut transfer_function = scene.create_transfer_function().unwrap();
        let transfer_function = transfer_function.request().unwrap().clone();

        let last = extents.frame_count - 1;
        let frame = request_frame(source.as_mut(), last).unwrap();
        assert_eq!(frame.frame_id, last);
        let range = scene.params.effective_value_range(frame.metadata);
        let sampler = VolumeSampler::new(&frame).unwrap();

        let center = extents.bounding_box.center();
        let hit = [0.0, 0.3, 0.55].iter().any(|&offset| {
            let origin = center + Vec3::new(offset, 0.0, 5.0);
            let ray = Ray::new(origin, Vec3::new(0.0, 0.0, -1.0));
            let result = sampler
                .probe(&ray, &scene.params, &range, &transfer_function)
                .unwrap();
            assert!(result.samples > 0, "{}", scene.name);
            match scene.params.mode {
                RaycastMode::Integration => result.opacity > 0.0,
                RaycastMode::Isosurface => result.iso_hit.is_some(),
                RaycastMode::Aggregate => result.max_value > range.min,
            }
        });
        assert!(hit, "no probe ray saw anything in {}", scene.name);
    }
}

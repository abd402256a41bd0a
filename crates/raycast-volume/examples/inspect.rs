use anyhow::{
    Context,
    Result,
};
use nalgebra_glm::Vec3;
use raycast_volume::{
    probe::{
        Ray,
        VolumeSampler,
    },
    scene::Scene,
    source::request_frame,
    transfer::TransferFunctionSource,
};

fn main() -> Result<()> {
    std::env::set_var("RUST_LOG", "debug");
    env_logger::init();

    let scene_name = std::env::args().nth(1).unwrap_or_else(|| "marschner_lobb".to_string());
    let scene = Scene::from_scene_name(&scene_name)?;
    log::info!("{:#?}", scene);

    let mut source = scene.create_volume_source()?;
    let extents = source.extents(0)?;
    log::info!("{:?}", extents);

    let mut transfer_function = scene.create_transfer_function()?;
    let transfer_function = transfer_function
        .request()
        .context("transfer function request failed")?
        .clone();

    for frame_id in 0..extents.frame_count {
        let frame = request_frame(source.as_mut(), frame_id)?;
        let range = scene.params.effective_value_range(frame.metadata);
        let sampler = VolumeSampler::new(&frame)?;

        // straight through the center along -z
        let center = extents.bounding_box.center();
        let origin = center + Vec3::new(0.0, 0.0, extents.bounding_box.diagonal());
        let ray = Ray::new(origin, Vec3::new(0.0, 0.0, -1.0));
        let probe = sampler.probe(&ray, &scene.params, &range, &transfer_function);
        log::info!(
            "frame {}: hash {:016x}, range {:?}, probe {:?}",
            frame.frame_id,
            frame.data_hash,
            range,
            probe
        );
    }
    Ok(())
}

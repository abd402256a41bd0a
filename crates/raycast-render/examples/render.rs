use raycast_base::path::get_project_root;
use raycast_render::app::app::App;
use raycast_volume::scene::Scene;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Configs {
    scene: String,
    width: u32,
    height: u32,
    #[serde(default)]
    validation: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Parsing arguments");
    let config_path = get_project_root()?.join("crates/raycast-render/configs/render.json");
    let configs: Configs = serde_json::from_str(&std::fs::read_to_string(config_path)?)?;
    let scene_name = std::env::args().nth(1).unwrap_or(configs.scene);

    log::info!("Building assets");
    raycast_volume::asset::init()?;

    log::info!("Compiling shaders");
    raycast_shader::command::compile_all()?;

    log::info!("Starting Raycast Render");
    let event_loop = winit::event_loop::EventLoop::builder().build()?;
    let mut app = App::new(Scene::from_scene_name(&scene_name)?);
    app.set_window_size(winit::dpi::PhysicalSize::new(configs.width, configs.height));
    app.set_validation(configs.validation);
    event_loop.run_app(&mut app)?;
    Ok(())
}

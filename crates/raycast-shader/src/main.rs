use anyhow::Result;
use raycast_shader::command::compile_all;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    compile_all()?;
    Ok(())
}

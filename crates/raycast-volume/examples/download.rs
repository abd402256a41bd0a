//! Fetches the raw volume data sets referenced by the shipped scenes into the asset directory.
use anyhow::Result;
use env_logger::Env;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    raycast_volume::asset::init()?;
    log::info!("assets are in {:?}", raycast_base::path::get_asset_root()?);
    Ok(())
}

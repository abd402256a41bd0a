pub mod texture;
pub mod texture_sampler;
pub mod transfer;
pub mod volume;

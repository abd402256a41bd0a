pub mod buffer;
pub mod camera;
pub mod command_buffer;
pub mod consts;
pub mod debug;
pub mod descriptor;
pub mod device;
pub mod extension;
pub mod image_buffer;
pub mod instance;
pub mod layer;
pub mod memory;
pub mod pipeline;
pub mod render_pass;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod uniform_buffer;
pub mod vertex;

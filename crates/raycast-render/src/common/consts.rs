pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Work group edge of the ray casting compute shaders.
pub const RAYCAST_LOCAL_SIZE: u32 = 8;

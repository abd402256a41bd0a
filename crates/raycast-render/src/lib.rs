pub mod app;
mod common;
mod control;
mod draw;
mod shader;
mod texture;
mod utils;

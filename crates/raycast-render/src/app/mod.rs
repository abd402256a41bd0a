pub mod app;
mod gui;
mod renderer;

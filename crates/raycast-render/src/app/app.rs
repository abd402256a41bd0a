use super::renderer::Renderer;
use crate::control::Control;
use anyhow::Result;
use imgui_winit_support::WinitPlatform;
use raycast_volume::scene::Scene;
use winit::{
    application::ApplicationHandler,
    dpi::{
        PhysicalPosition,
        PhysicalSize,
    },
    event::{
        Event,
        WindowEvent,
    },
    event_loop::ActiveEventLoop,
    keyboard::KeyCode,
    window::{
        Window,
        WindowAttributes,
        WindowId,
    },
};

/// Windowed viewer for a single scene. The renderer is declared before the window it draws to.
pub struct App {
    renderer: Option<Renderer>,
    imgui_platform: Option<WinitPlatform>,
    imgui_context: Option<imgui::Context>,
    window: Option<Window>,
    window_size: PhysicalSize<u32>,
    validation: bool,
    control: Control,
    scene: Scene,
}

impl App {
    pub fn new(scene: Scene) -> Self {
        Self {
            renderer: None,
            imgui_platform: None,
            imgui_context: None,
            window: None,
            window_size: PhysicalSize::new(1280, 720),
            validation: false,
            control: Control::default(),
            scene,
        }
    }

    pub fn set_window_size(&mut self, size: PhysicalSize<u32>) {
        self.window_size = size;
    }

    pub fn set_validation(&mut self, validation: bool) {
        self.validation = validation;
    }

    fn setup(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        // setup window
        let window_attributes = WindowAttributes::default()
            .with_title(format!("Raycast - {}", self.scene.name))
            .with_inner_size(self.window_size);
        let window = event_loop.create_window(window_attributes)?;
        self.window_size = window.inner_size();

        // setup imgui
        let mut imgui_context = imgui::Context::create();
        imgui_context.set_ini_filename(None);
        let mut imgui_platform = WinitPlatform::new(&mut imgui_context);

        // setup renderer
        let renderer = Renderer::new(
            &window,
            self.window_size,
            self.validation,
            &self.scene,
            &mut imgui_platform,
            &mut imgui_context,
        )?;

        self.renderer = Some(renderer);
        self.imgui_platform = Some(imgui_platform);
        self.imgui_context = Some(imgui_context);
        self.window = Some(window);
        self.control = Control::default();
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }
        if let Err(error) = self.setup(event_loop) {
            log::error!("failed to set up the renderer: {:?}", error);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        window_event: WindowEvent,
    ) {
        let (Some(renderer), Some(window), Some(imgui_platform), Some(imgui_context)) = (
            self.renderer.as_mut(),
            self.window.as_ref(),
            self.imgui_platform.as_mut(),
            self.imgui_context.as_mut(),
        ) else {
            return;
        };

        let generic_event: Event<()> = Event::WindowEvent {
            window_id,
            event: window_event.clone(),
        };
        imgui_platform.handle_event(imgui_context.io_mut(), window, &generic_event);

        match window_event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                if let Err(error) = renderer.device_wait_idle() {
                    log::error!("failed to wait for the device: {}", error);
                }
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                self.window_size = size;
                renderer.request_resize();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.control.keyboard_mut().input_event(&event);
                if self.control.keyboard().is_pressed(&KeyCode::Escape) {
                    event_loop.exit();
                }
                renderer.input_playback(self.control.keyboard_mut());
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.control
                    .mouse_mut()
                    .set_position(PhysicalPosition::<f32>::new(
                        position.x as f32,
                        position.y as f32,
                    ));

                // moving the cursor to the center fires another `CursorMoved`
                window.request_redraw();
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.control.mouse_mut().set_input(state, button);
            }
            WindowEvent::RedrawRequested => {
                if self.control.is_looking() {
                    let center = PhysicalPosition::new(
                        self.window_size.width as f64 / 2.0,
                        self.window_size.height as f64 / 2.0,
                    );
                    if let Err(error) = window.set_cursor_position(center) {
                        log::warn!("failed to center the cursor: {}", error);
                    }
                    window.set_cursor_visible(false);
                } else {
                    window.set_cursor_visible(true);
                }
                if let Err(error) =
                    renderer.draw_frame(window, imgui_platform, imgui_context, &self.control)
                {
                    log::error!("failed to draw frame: {:?}", error);
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        } else {
            event_loop.exit();
        }
    }
}

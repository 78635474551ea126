//! Frame renderer viewer.
//!
//! Opens a window, builds the default scene and renders until closed.
//!
//! Controls:
//! - W/A/S/D move, hold the right mouse button to look around
//! - 1/2/3 select the background effect
//! - `=` and `-` raise and lower the render scale
//!
//! The first argument, if any, is the config file path (default
//! `frame.toml`).

mod scene;

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::WindowId;

use frame_core::{RendererConfig, Timer};
use frame_platform::{InputState, KeyCode, MouseButton, Window};
use frame_renderer::{NoOverlay, Renderer};
use frame_scene::CameraKey;

const DEFAULT_CONFIG_PATH: &str = "frame.toml";
const STATS_INTERVAL: Duration = Duration::from_secs(2);
const RENDER_SCALE_STEP: f32 = 0.1;

fn camera_key(key: KeyCode) -> Option<CameraKey> {
    match key {
        KeyCode::KeyW => Some(CameraKey::Forward),
        KeyCode::KeyS => Some(CameraKey::Backward),
        KeyCode::KeyA => Some(CameraKey::Left),
        KeyCode::KeyD => Some(CameraKey::Right),
        _ => None,
    }
}

fn effect_key(key: KeyCode) -> Option<usize> {
    match key {
        KeyCode::Digit1 => Some(0),
        KeyCode::Digit2 => Some(1),
        KeyCode::Digit3 => Some(2),
        _ => None,
    }
}

struct App {
    config: RendererConfig,
    window: Option<Window>,
    renderer: Option<Renderer>,
    input: InputState,
    stats_timer: Timer,
    /// First fatal error; ends the event loop.
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(config: RendererConfig) -> Self {
        Self {
            config,
            window: None,
            renderer: None,
            input: InputState::new(),
            stats_timer: Timer::new(),
            fatal: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{:#}", err);
        self.fatal.get_or_insert(err);
        event_loop.exit();
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_config = &self.config.window;
        let window = Window::new(
            event_loop,
            window_config.width,
            window_config.height,
            &window_config.title,
        )
        .context("failed to create window")?;

        let mut renderer =
            Renderer::new(&window, &self.config).context("failed to create renderer")?;
        let graph = scene::build_default_scene(&mut renderer)
            .context("failed to build the default scene")?;
        renderer.add_scene("default", graph);

        info!("Initialization complete, entering main loop");
        self.renderer = Some(renderer);
        self.window = Some(window);
        Ok(())
    }

    fn on_key(&mut self, key: KeyCode, state: ElementState) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        if let Some(camera_key) = camera_key(key) {
            renderer
                .camera_mut()
                .process_key(camera_key, state.is_pressed());
            return;
        }

        if !self.input.is_key_just_pressed(key) {
            return;
        }

        if let Some(index) = effect_key(key) {
            renderer.select_background_effect(index);
            let name = renderer.effects().params(index).map(|p| p.name);
            info!("Background effect: {}", name.unwrap_or("none"));
        }

        let step = match key {
            KeyCode::Equal => RENDER_SCALE_STEP,
            KeyCode::Minus => -RENDER_SCALE_STEP,
            _ => return,
        };
        let settings = renderer.settings_mut();
        settings.set_render_scale(settings.render_scale() + step);
        info!("Render scale: {:.1}", settings.render_scale());
    }

    fn redraw(&mut self) -> Result<()> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };

        renderer
            .camera_mut()
            .set_looking(self.input.is_mouse_pressed(MouseButton::Right));
        let (dx, dy) = self.input.cursor_delta();
        renderer.camera_mut().process_mouse_motion(dx, dy);
        if let Some((x, y)) = self.input.cursor_position() {
            renderer.set_mouse_position(x, y);
        }

        renderer.draw_frame(&mut NoOverlay)?;

        if self.stats_timer.elapsed() >= STATS_INTERVAL {
            self.stats_timer.reset();
            let stats = renderer.stats();
            debug!(
                "frame {:.2} ms, scene {:.2} ms, draw {:.2} ms, {} draws, {} triangles",
                stats.frame_time,
                stats.scene_update_time,
                stats.mesh_draw_time,
                stats.draw_call_count,
                stats.triangle_count
            );
        }

        self.input.begin_frame();
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none()
            && let Err(e) = self.init(event_loop)
        {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        self.input.handle_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(window) = self.window.as_mut() {
                    window.resize(size.width, size.height);
                }
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key
                    && !event.repeat
                {
                    self.on_key(key, event.state);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    self.fail(event_loop, e.context("frame failed"));
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref()
            && !window.is_minimized()
        {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // The renderer must go before the window its surface belongs to.
        if let Some(mut renderer) = self.renderer.take() {
            renderer.shutdown();
        }
        self.window = None;
    }
}

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let file_config = RendererConfig::read(&config_path)
        .with_context(|| format!("failed to load config from {config_path}"))?;
    let from_file = file_config.is_some();
    let config = file_config.unwrap_or_default();

    frame_core::init_logging_with(&config.logging.filter);
    info!("Starting frame viewer");
    if from_file {
        info!("Loaded config from {}", config_path);
    } else {
        info!("No config at {}, using defaults", config_path);
    }

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wasd_maps_to_camera_keys() {
        assert_eq!(camera_key(KeyCode::KeyW), Some(CameraKey::Forward));
        assert_eq!(camera_key(KeyCode::KeyS), Some(CameraKey::Backward));
        assert_eq!(camera_key(KeyCode::KeyA), Some(CameraKey::Left));
        assert_eq!(camera_key(KeyCode::KeyD), Some(CameraKey::Right));
        assert_eq!(camera_key(KeyCode::KeyQ), None);
    }

    #[test]
    fn test_digits_select_effects() {
        assert_eq!(effect_key(KeyCode::Digit1), Some(0));
        assert_eq!(effect_key(KeyCode::Digit3), Some(2));
        assert_eq!(effect_key(KeyCode::Digit4), None);
    }
}

//! Textured quad demo application
//!
//! Opens a window and renders a rotating textured quad. The scroll wheel
//! zooms the camera and the R key reloads the texture from disk.

use glfw::{Action, Key, WindowEvent};
use quad_engine::{Renderer, RendererConfig, Window};

const CONFIG_PATH: &str = "quad_app.toml";

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = RendererConfig::load_or_default(CONFIG_PATH)?;
    log::info!("Starting {} ({}x{})", config.application_name, config.window_width, config.window_height);

    let mut window = Window::new(&config)?;
    let mut renderer = Renderer::new(&mut window, &config)?;

    while !window.should_close() {
        window.poll_events();

        let events: Vec<(f64, WindowEvent)> = window.flush_events().collect();
        for (_, event) in events {
            match event {
                WindowEvent::Key(Key::Escape, _, Action::Press, _) => {
                    window.set_should_close(true);
                }
                WindowEvent::Key(Key::R, _, Action::Press, _) => {
                    if let Err(err) = renderer.reload_texture(None) {
                        log::error!("Texture reload failed: {err}");
                    }
                }
                WindowEvent::Scroll(_, yoffset) => {
                    renderer.on_scroll(yoffset as f32);
                    log::debug!("Zoom level: {:.2}", renderer.zoom_level());
                }
                WindowEvent::FramebufferSize(_, _) => {
                    renderer.flag_resized();
                }
                WindowEvent::Close => {
                    window.set_should_close(true);
                }
                _ => {}
            }
        }

        if window.should_close() {
            break;
        }

        renderer.draw_frame(&mut window)?;
    }

    renderer.wait_idle()?;
    log::info!("Shutting down");
    Ok(())
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    if let Err(err) = run() {
        log::error!("Fatal error: {err}");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

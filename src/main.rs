use std::any::Any;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use log::{debug, info, warn};
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{CursorGrabMode, Window, WindowId};

use cube_viewer::texture::load_texture;
use cube_viewer::{
    FrameClock, InputState, KeyCode, MoveKeys, NamedKey, Renderer, Stage, Viewer, ViewerConfig,
};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let mut config = match options.config.as_ref() {
        Some(path) => ViewerConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ViewerConfig::default(),
    };
    if let Some(stage) = options.stage {
        config.stage = stage;
    }
    info!("starting stage {}", config.stage);

    let viewer = Viewer::new(config);
    println!(
        "Stage: {} ({} objects)",
        viewer.config().stage,
        viewer.scene().objects.len()
    );
    for object in &viewer.scene().objects {
        println!(" - {} ({})", object.name, object.kind.name());
    }

    if options.headless {
        return run_headless(viewer, &options);
    }

    let fallback = Viewer::new(viewer.config().clone());
    match run_interactive(viewer) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Falling back to --headless mode \
                     (set DISPLAY or WAYLAND_DISPLAY to enable rendering)."
                );
                run_headless(fallback, &options)
            } else {
                Err(err)
            }
        }
    }
}

/// Steps the viewer with a fixed time step and scripted input, then prints
/// where the camera ended up.
fn run_headless(mut viewer: Viewer, options: &CliOptions) -> Result<()> {
    let textures = viewer.config().textures.clone();
    for (slot, source) in [&textures.primary, &textures.secondary]
        .into_iter()
        .enumerate()
    {
        let image = load_texture(source, slot)
            .with_context(|| format!("failed to prepare texture slot {slot}"))?;
        println!(" - texture {slot}: {}x{}", image.width, image.height);
    }

    let bindings = viewer.config().bindings;
    let window = viewer.config().window.clone();
    let input = viewer.input_mut();
    for (held, key) in [
        (options.hold.forward, bindings.forward),
        (options.hold.backward, bindings.backward),
        (options.hold.left, bindings.left),
        (options.hold.right, bindings.right),
    ] {
        if held {
            input.set_key_down(key);
        }
    }
    let mut cursor = Vec2::new(window.width as f32, window.height as f32) / 2.0;
    input.set_cursor_position(cursor);
    input.end_frame();

    for _ in 0..options.frames {
        cursor += options.mouse;
        viewer.input_mut().set_cursor_position(cursor);
        viewer.update(options.delta_time);
    }

    println!("Simulated {} frame(s)", viewer.frames());
    println!("Final camera state:");
    println!("{}", viewer.camera_summary());
    Ok(())
}

fn run_interactive(viewer: Viewer) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ViewerApp {
        viewer,
        renderer: None,
        clock: FrameClock::new(),
        last_error: None,
    };
    event_loop
        .run_app(&mut app)
        .context("event loop terminated abnormally")?;

    if let Some(err) = app.last_error {
        return Err(err);
    }

    println!("Final camera state:");
    println!("{}", app.viewer.camera_summary());
    Ok(())
}

struct ViewerApp {
    viewer: Viewer,
    renderer: Option<Renderer>,
    clock: FrameClock,
    last_error: Option<anyhow::Error>,
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }
        if let Err(err) = self.create_renderer(event_loop) {
            self.last_error = Some(err);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(renderer) = self.renderer.as_ref() else {
            return;
        };
        if window_id != renderer.window_id() {
            return;
        }
        if let Err(err) = self.process_event(event_loop, event) {
            self.last_error = Some(err);
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(renderer) = self.renderer.as_ref() {
            renderer.window().request_redraw();
        }
    }
}

impl ViewerApp {
    fn create_renderer(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let settings = &self.viewer.config().window;
        let attributes = Window::default_attributes()
            .with_title(settings.title.clone())
            .with_inner_size(LogicalSize::new(settings.width, settings.height));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );

        let renderer = block_on(Renderer::new(Arc::clone(&window), self.viewer.config()))
            .context("failed to initialize renderer")?;
        let size = renderer.size();
        self.viewer.resize(size.width, size.height);
        if self.viewer.config().stage.camera_enabled() {
            capture_cursor(&window);
        }
        window.request_redraw();
        self.clock = FrameClock::new();
        self.renderer = Some(renderer);
        Ok(())
    }

    fn process_event(&mut self, event_loop: &ActiveEventLoop, event: WindowEvent) -> Result<()> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                renderer.resize(size);
                self.viewer.resize(size.width, size.height);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if is_escape(&event) {
                    event_loop.exit();
                } else {
                    handle_keyboard(self.viewer.input_mut(), &event);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let position = Vec2::new(position.x as f32, position.y as f32);
                self.viewer.input_mut().set_cursor_position(position);
            }
            WindowEvent::CursorLeft { .. } => self.viewer.input_mut().reset_cursor(),
            WindowEvent::Focused(false) => {
                let input = self.viewer.input_mut();
                input.release_all();
                input.reset_cursor();
            }
            WindowEvent::RedrawRequested => {
                let delta_time = self.clock.tick();
                let frame = self.viewer.update(delta_time);
                renderer.update_globals(&frame.camera);
                match renderer.render(&frame.draws) {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = renderer.window().inner_size();
                        renderer.resize(size);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        return Err(anyhow!("GPU is out of memory"));
                    }
                    Err(wgpu::SurfaceError::Timeout) => {
                        debug!("surface timeout; retrying next frame");
                    }
                    Err(err) => warn!("failed to acquire surface texture: {err}"),
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn handle_keyboard(input: &mut InputState, event: &KeyEvent) {
    let PhysicalKey::Code(code) = event.physical_key else {
        return;
    };
    let Some(key) = map_keycode(code) else {
        return;
    };
    match event.state {
        ElementState::Pressed => input.set_key_down(key),
        ElementState::Released => input.set_key_up(key),
    }
}

fn is_escape(event: &KeyEvent) -> bool {
    event.state == ElementState::Pressed
        && event.physical_key == PhysicalKey::Code(winit::keyboard::KeyCode::Escape)
}

fn capture_cursor(window: &Window) {
    let grabbed = window
        .set_cursor_grab(CursorGrabMode::Confined)
        .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked));
    if let Err(err) = grabbed {
        warn!("could not capture the cursor: {err}");
    }
    window.set_cursor_visible(false);
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

fn map_keycode(code: winit::keyboard::KeyCode) -> Option<KeyCode> {
    use winit::keyboard::KeyCode as Key;
    Some(match code {
        Key::Space => KeyCode::Named(NamedKey::Space),
        Key::Enter => KeyCode::Named(NamedKey::Enter),
        Key::Tab => KeyCode::Named(NamedKey::Tab),
        Key::ArrowLeft => KeyCode::Named(NamedKey::Left),
        Key::ArrowRight => KeyCode::Named(NamedKey::Right),
        Key::ArrowUp => KeyCode::Named(NamedKey::Up),
        Key::ArrowDown => KeyCode::Named(NamedKey::Down),
        Key::Escape => KeyCode::Named(NamedKey::Escape),
        Key::ShiftLeft => KeyCode::Named(NamedKey::LeftShift),
        Key::ShiftRight => KeyCode::Named(NamedKey::RightShift),
        Key::ControlLeft => KeyCode::Named(NamedKey::LeftCtrl),
        Key::ControlRight => KeyCode::Named(NamedKey::RightCtrl),
        Key::Digit0 => KeyCode::Digit(0),
        Key::Digit1 => KeyCode::Digit(1),
        Key::Digit2 => KeyCode::Digit(2),
        Key::Digit3 => KeyCode::Digit(3),
        Key::Digit4 => KeyCode::Digit(4),
        Key::Digit5 => KeyCode::Digit(5),
        Key::Digit6 => KeyCode::Digit(6),
        Key::Digit7 => KeyCode::Digit(7),
        Key::Digit8 => KeyCode::Digit(8),
        Key::Digit9 => KeyCode::Digit(9),
        Key::KeyA => KeyCode::Character('A'),
        Key::KeyB => KeyCode::Character('B'),
        Key::KeyC => KeyCode::Character('C'),
        Key::KeyD => KeyCode::Character('D'),
        Key::KeyE => KeyCode::Character('E'),
        Key::KeyF => KeyCode::Character('F'),
        Key::KeyG => KeyCode::Character('G'),
        Key::KeyH => KeyCode::Character('H'),
        Key::KeyI => KeyCode::Character('I'),
        Key::KeyJ => KeyCode::Character('J'),
        Key::KeyK => KeyCode::Character('K'),
        Key::KeyL => KeyCode::Character('L'),
        Key::KeyM => KeyCode::Character('M'),
        Key::KeyN => KeyCode::Character('N'),
        Key::KeyO => KeyCode::Character('O'),
        Key::KeyP => KeyCode::Character('P'),
        Key::KeyQ => KeyCode::Character('Q'),
        Key::KeyR => KeyCode::Character('R'),
        Key::KeyS => KeyCode::Character('S'),
        Key::KeyT => KeyCode::Character('T'),
        Key::KeyU => KeyCode::Character('U'),
        Key::KeyV => KeyCode::Character('V'),
        Key::KeyW => KeyCode::Character('W'),
        Key::KeyX => KeyCode::Character('X'),
        Key::KeyY => KeyCode::Character('Y'),
        Key::KeyZ => KeyCode::Character('Z'),
        Key::F1 => KeyCode::Function(1),
        Key::F2 => KeyCode::Function(2),
        Key::F3 => KeyCode::Function(3),
        Key::F4 => KeyCode::Function(4),
        Key::F5 => KeyCode::Function(5),
        Key::F6 => KeyCode::Function(6),
        Key::F7 => KeyCode::Function(7),
        Key::F8 => KeyCode::Function(8),
        Key::F9 => KeyCode::Function(9),
        Key::F10 => KeyCode::Function(10),
        Key::F11 => KeyCode::Function(11),
        Key::F12 => KeyCode::Function(12),
        _ => return None,
    })
}

const USAGE: &str = "Usage: cube-viewer [config.xml] [--stage transform|perspective|fly-camera] \
[--headless] [--frames N] [--dt SECONDS] [--hold forward,backward,left,right] [--mouse DX,DY]";

struct CliOptions {
    config: Option<PathBuf>,
    stage: Option<Stage>,
    headless: bool,
    frames: u32,
    delta_time: f32,
    hold: MoveKeys,
    mouse: Vec2,
}

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Self {
            config: None,
            stage: None,
            headless: false,
            frames: 60,
            delta_time: 1.0 / 60.0,
            hold: MoveKeys::default(),
            mouse: Vec2::ZERO,
        };
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--headless" => options.headless = true,
                "--stage" => {
                    let value = flag_value(&mut args, "--stage")?;
                    options.stage = Some(value.parse().map_err(|err: String| anyhow!(err))?);
                }
                "--frames" => {
                    let value = flag_value(&mut args, "--frames")?;
                    options.frames = value
                        .parse()
                        .with_context(|| format!("invalid frame count `{value}`"))?;
                }
                "--dt" => {
                    let value = flag_value(&mut args, "--dt")?;
                    options.delta_time = value
                        .parse::<f32>()
                        .ok()
                        .filter(|dt| dt.is_finite() && *dt >= 0.0)
                        .ok_or_else(|| anyhow!("invalid time step `{value}`"))?;
                }
                "--hold" => {
                    let value = flag_value(&mut args, "--hold")?;
                    options.hold = parse_directions(&value)?;
                }
                "--mouse" => {
                    let value = flag_value(&mut args, "--mouse")?;
                    options.mouse = parse_pair(&value)?;
                }
                "-h" | "--help" => return Err(anyhow!(USAGE)),
                other if other.starts_with("--") => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
                path => {
                    if options.config.is_some() {
                        return Err(anyhow!("Unexpected extra argument: {path}. {USAGE}"));
                    }
                    options.config = Some(PathBuf::from(path));
                }
            }
        }
        Ok(options)
    }
}

fn flag_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next()
        .ok_or_else(|| anyhow!("{flag} expects a value. {USAGE}"))
}

fn parse_directions(value: &str) -> Result<MoveKeys> {
    let mut keys = MoveKeys::default();
    for direction in value.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        match direction {
            "forward" => keys.forward = true,
            "backward" => keys.backward = true,
            "left" => keys.left = true,
            "right" => keys.right = true,
            other => return Err(anyhow!("unknown direction `{other}`")),
        }
    }
    Ok(keys)
}

fn parse_pair(value: &str) -> Result<Vec2> {
    let parsed = value
        .split(',')
        .map(|component| component.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .ok();
    match parsed.as_deref() {
        Some([x, y]) if x.is_finite() && y.is_finite() => Ok(Vec2::new(*x, *y)),
        _ => Err(anyhow!("expected DX,DY but got `{value}`")),
    }
}

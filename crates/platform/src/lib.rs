//! Platform layer: window, event loop and input routing.
//! Loads assets before the loop starts, then forwards pointer and key input
//! to [`SceneState`] and redraws on demand (no continuous redraw).

pub mod assets;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

use corelib::camera::CameraMove;
use corelib::scene::SceneState;
use corelib::{UVec2, Vec2};
use renderer::{GpuState, ObjectGeometry};

use crate::assets::{LoadedObject, load_scene_objects};

/// Everything the viewer needs from the command line.
#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub cube_path: PathBuf,
    pub piggy_path: PathBuf,
    /// Replaces the piggy bank material's `map_Kd` when set.
    pub piggy_texture: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub backends: wgpu::Backends,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            cube_path: PathBuf::from("./cube.obj"),
            piggy_path: PathBuf::from("./PiggyBank.obj"),
            piggy_texture: Some(PathBuf::from("./PiggyBankUVTex.png")),
            width: 480,
            height: 480,
            backends: wgpu::Backends::all(),
        }
    }
}

/// Camera key bindings.
pub fn camera_move_for_key(key: KeyCode) -> Option<CameraMove> {
    match key {
        KeyCode::KeyW => Some(CameraMove::Forward),
        KeyCode::KeyS => Some(CameraMove::Backward),
        KeyCode::KeyA => Some(CameraMove::Left),
        KeyCode::KeyD => Some(CameraMove::Right),
        KeyCode::KeyQ => Some(CameraMove::Up),
        KeyCode::KeyE => Some(CameraMove::Down),
        _ => None,
    }
}

/// Start a drag at the last known cursor position. A press that arrives
/// before any cursor motion has no position to pick at and is ignored.
fn press(scene: &mut SceneState, cursor: Option<Vec2>, screen: UVec2) -> bool {
    let Some(cursor) = cursor else {
        log::debug!("Press before any cursor position; ignored");
        return false;
    };
    scene.pointer_down(cursor, screen);
    true
}

struct Viewer {
    config: ViewerConfig,
    objects: [Option<LoadedObject>; 2],
    scene: SceneState,
    /// `None` until the first `CursorMoved`.
    cursor: Option<Vec2>,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    /// Initialisation failure to report once the loop returns.
    fatal: Option<anyhow::Error>,
}

impl Viewer {
    fn new(config: ViewerConfig) -> Self {
        let objects = load_scene_objects(&config);
        let mut scene = SceneState::default();
        for obj in objects.iter().flatten() {
            scene.set_bounds(obj.id, obj.bounds);
        }
        Self {
            config,
            objects,
            scene,
            cursor: None,
            window: None,
            gpu: None,
            fatal: None,
        }
    }

    fn init_gpu(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = WindowAttributes::default()
            .with_title("PickView")
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("Failed to create window")?,
        );
        log::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        let mut gpu = pollster::block_on(GpuState::new(window.clone(), self.config.backends))
            .context("GPU initialisation failed")?;

        for obj in self.objects.iter().flatten() {
            gpu.upload_object(&ObjectGeometry {
                id: obj.id,
                mesh: &obj.mesh,
                color: obj.color,
                texture: obj.texture.as_ref(),
                wireframe: &obj.wireframe,
            });
        }

        window.request_redraw();
        self.window = Some(window);
        self.gpu = Some(gpu);
        Ok(())
    }

    fn screen_size(&self) -> UVec2 {
        self.window
            .as_ref()
            .map(|w| {
                let size = w.inner_size();
                UVec2::new(size.width, size.height)
            })
            .unwrap_or(UVec2::new(self.config.width, self.config.height))
    }

    fn request_redraw(&self) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        match gpu.render(&self.scene) {
            Ok(()) => {}
            Err(e) if GpuState::is_surface_lost(&e) => {
                log::warn!("Surface lost/outdated: {e:?}. Recreating.");
                gpu.recreate_surface();
                self.request_redraw();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of GPU memory. Exiting.");
                event_loop.exit();
            }
            Err(e) => log::warn!("Frame skipped: {e:?}"),
        }
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init_gpu(event_loop) {
            self.fatal = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                event_loop.exit();
            }
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                log::debug!("Resized: {}x{}", width, height);
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.resize(width, height);
                }
                self.request_redraw();
            }
            WindowEvent::CursorMoved {
                position: PhysicalPosition { x, y },
                ..
            } => {
                let cursor = Vec2::new(x as f32, y as f32);
                self.cursor = Some(cursor);
                if self.scene.is_dragging() {
                    self.scene.pointer_move(cursor);
                    self.request_redraw();
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => {
                    let screen = self.screen_size();
                    press(&mut self.scene, self.cursor, screen);
                }
                ElementState::Released => self.scene.pointer_up(),
            },
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                if code == KeyCode::Escape {
                    log::info!("Escape pressed. Exiting event loop.");
                    event_loop.exit();
                } else if let Some(mv) = camera_move_for_key(code) {
                    self.scene.key(mv);
                    log::debug!("Camera position: {:?}", self.scene.camera.position);
                    self.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }
}

/// Open the viewer window and run until it is closed.
pub fn run(config: ViewerConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut viewer = Viewer::new(config);
    event_loop
        .run_app(&mut viewer)
        .map_err(|e| anyhow::anyhow!("Event loop error: {e:?}"))?;

    match viewer.fatal.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

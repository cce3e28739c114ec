use std::{sync::Arc, time::Instant};

use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy},
    keyboard::PhysicalKey,
    window::{Window, WindowAttributes, WindowId},
};

use crate::{
    animation::{AnimationDriver, DriverState, HostLoop},
    config::ViewerConfig,
    controls::ViewerCommand,
    gfx::{
        device::{DeviceInitError, WgpuDevice},
        environment::{AssetLoadError, DecodedImage, EnvironmentMap, FileImageSource},
        geometry::{fitting, GeometryStore},
        rendering::{FrameRenderer, FrameStats},
        scene::SceneState,
        shading::ShadingModelRegistry,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("event loop failed: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create the window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Device(#[from] DeviceInitError),
}

/// Events delivered to the event loop from other threads
#[derive(Debug)]
pub enum ViewerEvent {
    EnvironmentLoaded(Result<Vec<DecodedImage>, AssetLoadError>),
}

pub struct ViewerApp {
    event_loop: EventLoop<ViewerEvent>,
    app_state: AppState,
}

struct AppState {
    config: ViewerConfig,
    proxy: EventLoopProxy<ViewerEvent>,
    viewer: Option<Viewer>,
    host: WinitHost,
    driver: AnimationDriver,
    stats: FrameStats,
    failure: Option<AppError>,
}

/// Everything that exists once the window and device are up
struct Viewer {
    window: Arc<Window>,
    device: WgpuDevice,
    registry: ShadingModelRegistry,
    geometry: GeometryStore,
    environment: EnvironmentMap,
    renderer: FrameRenderer,
    scene: SceneState,
}

/// Host loop on top of winit redraw requests
///
/// A scheduled tick is a pending flag plus a redraw request; redraws that
/// arrive without a pending tick (exposure, resize) do not advance the loop.
struct WinitHost {
    window: Option<Arc<Window>>,
    pending: bool,
    epoch: Instant,
}

impl WinitHost {
    fn take_pending(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}

impl HostLoop for WinitHost {
    fn schedule_next(&mut self) {
        self.pending = true;
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn now_ms(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }
}

impl ViewerApp {
    pub fn new(config: ViewerConfig) -> Result<Self, AppError> {
        let event_loop = EventLoop::<ViewerEvent>::with_user_event().build()?;
        let proxy = event_loop.create_proxy();
        let policy = config.render.on_frame_error;

        Ok(Self {
            event_loop,
            app_state: AppState {
                config,
                proxy,
                viewer: None,
                host: WinitHost {
                    window: None,
                    pending: false,
                    epoch: Instant::now(),
                },
                driver: AnimationDriver::new(policy),
                stats: FrameStats::new(),
                failure: None,
            },
        })
    }

    /// Runs until the window closes (consumes self)
    pub fn run(mut self) -> Result<(), AppError> {
        // Frames are paced by redraw requests and vsync
        self.event_loop.set_control_flow(ControlFlow::Wait);
        self.event_loop.run_app(&mut self.app_state)?;

        match self.app_state.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl AppState {
    fn create_viewer(&mut self, event_loop: &ActiveEventLoop) -> Result<(), AppError> {
        let window_config = &self.config.window;
        let window = Arc::new(
            event_loop.create_window(
                WindowAttributes::default()
                    .with_title(window_config.title.clone())
                    .with_inner_size(LogicalSize::new(window_config.width, window_config.height)),
            )?,
        );
        let (width, height) = window.inner_size().into();
        let mut device = pollster::block_on(WgpuDevice::new(window.clone(), width, height))?;

        let registry =
            ShadingModelRegistry::initialize(&mut device, &self.config.constant_overrides());

        let mut geometry = GeometryStore::new();
        for mesh in self.config.meshes() {
            let loaded = mesh.source.load().and_then(|data| {
                geometry.add_mesh(&mut device, &mesh.name, &data, fitting::compose(&mesh.fitting))
            });
            if let Err(err) = loaded {
                log::error!("Skipping mesh '{}': {}", mesh.name, err);
            }
        }

        let mut scene = SceneState::new(&self.config.scene);
        validate_selection(&mut scene, &geometry, &registry);

        let environment = EnvironmentMap::new(&mut device);
        let renderer = FrameRenderer::new(&mut device, self.config.render.settings.clone());

        self.host.window = Some(window.clone());
        self.viewer = Some(Viewer {
            window,
            device,
            registry,
            geometry,
            environment,
            renderer,
            scene,
        });

        self.load_environment();
        Ok(())
    }

    /// Starts decoding the sky faces; the loop starts once they are settled
    fn load_environment(&mut self) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };
        let Some(environment) = self.config.environment.clone() else {
            log::info!("No environment configured; reflections disabled");
            viewer.environment.disable();
            self.driver.start(&mut self.host);
            return;
        };

        let proxy = self.proxy.clone();
        let spawned = std::thread::Builder::new()
            .name("environment-loader".to_owned())
            .spawn(move || {
                let source = FileImageSource::new(environment.root);
                let faces =
                    pollster::block_on(EnvironmentMap::load_faces(&source, &environment.faces));
                if proxy
                    .send_event(ViewerEvent::EnvironmentLoaded(faces))
                    .is_err()
                {
                    log::debug!("Viewer closed before the environment finished loading");
                }
            });

        if let Err(err) = spawned {
            log::error!("Could not start the environment loader: {}", err);
            viewer.environment.disable();
            self.driver.start(&mut self.host);
        }
    }

    fn redraw(&mut self) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };
        if !self.host.take_pending() {
            return;
        }

        let Viewer {
            device,
            registry,
            geometry,
            environment,
            renderer,
            scene,
            ..
        } = viewer;
        let mut failed = false;
        let rendered = self.driver.tick(&mut self.host, scene, |scene| {
            let result = renderer.render_frame(device, scene, geometry, registry, environment);
            failed = result.is_err();
            result
        });

        if rendered {
            self.stats
                .record_frame(self.host.now_ms(), renderer.draw_calls(), failed);
        }
        if self.driver.state() == DriverState::Stopped && failed {
            log::warn!("Rendering halted; close the window to exit");
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        let Some(command) = ViewerCommand::from_key(code) else {
            return;
        };

        if command == ViewerCommand::Exit {
            self.driver.stop();
            event_loop.exit();
            return;
        }
        if let Some(viewer) = self.viewer.as_mut() {
            if let Err(err) = command.apply(&mut viewer.scene, &viewer.geometry, &viewer.registry) {
                log::warn!("Ignoring {:?}: {}", command, err);
            }
        }
    }
}

/// Falls back to the first mesh and first usable model when the configured
/// selection is not available
fn validate_selection(
    scene: &mut SceneState,
    geometry: &GeometryStore,
    registry: &ShadingModelRegistry,
) {
    if let Err(err) = scene.select_mesh(scene.mesh(), geometry) {
        log::warn!("{}; showing the first mesh", err);
        if let Err(err) = scene.select_mesh(0, geometry) {
            log::error!("Nothing to draw: {}", err);
        }
    }
    if let Err(err) = scene.select_model(scene.model(), registry) {
        let fallback =
            (0..registry.selectable_count()).find(|index| registry.is_selectable(*index));
        let Some(index) = fallback else {
            log::error!("No shading model is available");
            return;
        };
        log::warn!("{}; using model {}", err, index);
        if let Err(err) = scene.select_model(index, registry) {
            log::error!("{}", err);
        }
    }
}

impl ApplicationHandler<ViewerEvent> for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_some() {
            return;
        }
        if let Err(err) = self.create_viewer(event_loop) {
            log::error!("Startup failed: {}", err);
            self.failure = Some(err);
            event_loop.exit();
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            // The loop starts once the load settles, even when it failed;
            // the scene then renders without the background.
            ViewerEvent::EnvironmentLoaded(faces) => {
                let Some(viewer) = self.viewer.as_mut() else {
                    return;
                };
                if let Err(err) = viewer.environment.complete_load(&mut viewer.device, faces) {
                    log::warn!("Continuing without background reflections: {}", err);
                }
                self.driver.start(&mut self.host);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event_loop, &event),
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.device.resize(width, height);
                    viewer.window.request_redraw();
                }
            }
            WindowEvent::CloseRequested => {
                self.driver.stop();
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => (),
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        log::info!("Rendered {} frames", self.stats.total_frames());
    }
}

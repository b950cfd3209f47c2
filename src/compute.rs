use std::time::{Duration, Instant};

use image::RgbaImage;
use log::{debug, info};
use meshtracer_shader::ProgramComposer;
use meshtracer_shared::{RaytracerConfig, RenderOptions, TileHelper};

use crate::binder::{BinderState, ResourceBinder};
use crate::device::ComputeDevice;
use crate::error::TracerError;
use crate::scene::Scene;
use crate::surface::SharedSurface;

/// Timing of one rendered frame
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameStats {
    pub frame: u64,
    pub time: f32, // scene time in seconds
    pub duration: Duration,
}

/// Performance tracking
struct PerformanceState {
    start_time: Instant,
    last_frame_time: Duration,
    frame_count: u64,
}

/// Per-frame orchestration: animate, upload, acquire, dispatch, release, wait
pub struct FrameDriver<D: ComputeDevice> {
    device: D,
    binder: ResourceBinder<D>,
    performance: PerformanceState,
    clock: Instant,
}

impl PerformanceState {
    fn new() -> Self {
        Self {
            start_time: Instant::now(),
            last_frame_time: Duration::ZERO,
            frame_count: 0,
        }
    }

    fn record_frame(&mut self, duration: Duration) -> u64 {
        self.frame_count += 1;
        self.last_frame_time = duration;

        if self.frame_count % RaytracerConfig::PERFORMANCE_STATS_INTERVAL == 0 {
            let elapsed = self.start_time.elapsed().as_secs_f32();
            let fps = self.frame_count as f32 / elapsed;
            info!(
                "FPS: {:.1}, Last frame: {:.2}ms",
                fps,
                self.last_frame_time.as_secs_f32() * RaytracerConfig::MILLISECONDS_PER_SECOND
            );
        }
        self.frame_count
    }
}

impl<D: ComputeDevice> FrameDriver<D> {
    /// Driver over `device` using the built-in program text
    pub fn new(device: D, options: RenderOptions) -> Result<Self, TracerError> {
        Ok(Self::with_composer(device, ProgramComposer::new()?, options))
    }

    /// Tiles are square with side floor(sqrt(max group size))
    pub fn with_composer(device: D, composer: ProgramComposer, options: RenderOptions) -> Self {
        let group_side = TileHelper::group_side(device.max_group_size());
        info!(
            "Frame driver on {}: max group size {}, tile side {}",
            device.name(),
            device.max_group_size(),
            group_side
        );

        Self {
            device,
            binder: ResourceBinder::new(composer, options, group_side),
            performance: PerformanceState::new(),
            clock: Instant::now(),
        }
    }

    pub fn state(&self) -> BinderState {
        self.binder.state()
    }

    pub fn options(&self) -> RenderOptions {
        self.binder.options()
    }

    pub fn group_side(&self) -> u32 {
        self.binder.group_side()
    }

    pub fn rebuild_count(&self) -> u64 {
        self.binder.rebuild_count()
    }

    pub fn frame_count(&self) -> u64 {
        self.performance.frame_count
    }

    pub fn load_scene(&mut self, scene: &mut Scene) -> Result<(), TracerError> {
        self.binder.load_scene(&mut self.device, scene)
    }

    /// See `ResourceBinder::set_options`
    pub fn set_options(&mut self, options: RenderOptions) -> Result<bool, TracerError> {
        self.binder.set_options(&mut self.device, options)
    }

    /// Output surface for a display collaborator
    pub fn create_surface(&mut self, width: u32, height: u32) -> Result<SharedSurface<D::Target>, TracerError> {
        let target = self.device.create_target(width, height)?;
        Ok(SharedSurface::new(target, width, height))
    }

    /// Render with the scene clock measured from driver creation
    pub fn render_frame(
        &mut self,
        scene: &mut Scene,
        surface: &mut SharedSurface<D::Target>,
    ) -> Result<FrameStats, TracerError> {
        let time = self.clock.elapsed().as_secs_f32();
        self.render_frame_at(scene, surface, time)
    }

    /// Render the scene as it is at `time` seconds. Returns once the image is complete.
    pub fn render_frame_at(
        &mut self,
        scene: &mut Scene,
        surface: &mut SharedSurface<D::Target>,
        time: f32,
    ) -> Result<FrameStats, TracerError> {
        let frame_start = Instant::now();

        scene.update(time);
        self.binder.sync_dynamic(&mut self.device, scene)?;

        let uniforms = scene.uniforms(surface.width(), surface.height());
        {
            let mut guard = surface.acquire()?;
            self.binder.dispatch(&mut self.device, &uniforms, guard.target_mut())?;
            guard.release();
        }
        self.device.finish()?;

        let duration = frame_start.elapsed();
        let frame = self.performance.record_frame(duration);
        debug!("Frame {} at {:.3}s took {:?}", frame, time, duration);

        Ok(FrameStats { frame, time, duration })
    }

    /// Copy the displayed image back to host memory
    pub fn read_surface(&mut self, surface: &SharedSurface<D::Target>) -> Result<RgbaImage, TracerError> {
        let target = surface.display()?;
        self.device.read_target(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::cornell_box;
    use crate::software::CpuDevice;
    use meshtracer_shared::DisplayMode;

    fn driver(max_group_size: u32) -> FrameDriver<CpuDevice> {
        FrameDriver::new(CpuDevice::with_max_group_size(max_group_size), RenderOptions::default()).expect("driver")
    }

    #[test]
    fn test_tile_side_from_group_size() {
        assert_eq!(driver(256).group_side(), 16);
        assert_eq!(driver(1000).group_side(), 31);
        assert_eq!(driver(1).group_side(), 1);
    }

    #[test]
    fn test_frame_requires_bound_scene() {
        let mut driver = driver(64);
        let (description, mut assets) = cornell_box();
        let mut scene = Scene::load(&description, &mut assets).expect("demo scene");
        let mut surface = driver.create_surface(8, 8).expect("surface");

        assert!(matches!(
            driver.render_frame_at(&mut scene, &mut surface, 0.0),
            Err(TracerError::Unbound)
        ));
        assert_eq!(driver.frame_count(), 0);
    }

    #[test]
    fn test_frames_release_the_surface() {
        let mut driver = driver(64);
        let (description, mut assets) = cornell_box();
        let mut scene = Scene::load(&description, &mut assets).expect("demo scene");
        driver.load_scene(&mut scene).expect("scene binds");
        let mut surface = driver.create_surface(16, 8).expect("surface");

        let first = driver.render_frame_at(&mut scene, &mut surface, 0.0).expect("first frame");
        let second = driver.render_frame_at(&mut scene, &mut surface, 0.5).expect("second frame");
        assert_eq!((first.frame, second.frame), (1, 2));
        assert_eq!(second.time, 0.5);
        assert!(!scene.dirty().any());

        let image = driver.read_surface(&surface).expect("readback");
        assert_eq!(image.dimensions(), (16, 8));
    }

    #[test]
    fn test_option_change_between_frames() {
        let mut driver = driver(64);
        let (description, mut assets) = cornell_box();
        let mut scene = Scene::load(&description, &mut assets).expect("demo scene");
        driver.load_scene(&mut scene).expect("scene binds");
        let mut surface = driver.create_surface(8, 8).expect("surface");

        driver.render_frame_at(&mut scene, &mut surface, 0.0).expect("shaded frame");
        assert!(driver.set_options(RenderOptions::new(DisplayMode::Depth, false)).expect("depth"));
        driver.render_frame_at(&mut scene, &mut surface, 0.0).expect("depth frame");
        assert_eq!(driver.rebuild_count(), 1);
        assert_eq!(driver.options().display, DisplayMode::Depth);
    }
}

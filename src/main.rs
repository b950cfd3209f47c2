use log::{error, info, warn};
use meshtracer::demo::cornell_box;
use meshtracer::{Backend, ComputeDevice, CpuDevice, FrameDriver, GpuDevice, Scene, TracerConfig, TracerError};
use meshtracer_shared::RaytracerConfig;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        error!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), TracerError> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading config from {path}");
            TracerConfig::load(path)?
        }
        None => TracerConfig::default(),
    };

    let (description, mut assets) = cornell_box();
    let mut scene = Scene::load(&description, &mut assets)?;
    let power_preference = config.device.power_preference.into();

    match config.device.backend {
        Backend::Cpu => render(CpuDevice::new(), &config, &mut scene),
        Backend::Gpu => render(pollster::block_on(GpuDevice::new(power_preference))?, &config, &mut scene),
        Backend::Auto => match pollster::block_on(GpuDevice::new(power_preference)) {
            Ok(gpu) => render(gpu, &config, &mut scene),
            Err(err) => {
                warn!("No GPU available ({err}), rendering on the CPU");
                render(CpuDevice::new(), &config, &mut scene)
            }
        },
    }
}

fn render<D: ComputeDevice>(device: D, config: &TracerConfig, scene: &mut Scene) -> Result<(), TracerError> {
    let mut driver = FrameDriver::new(device, config.render)?;
    driver.load_scene(scene)?;
    let mut surface = driver.create_surface(config.output.width, config.output.height)?;

    for index in 0..config.frames.max(1) {
        let stats = driver.render_frame_at(scene, &mut surface, index as f32 * config.frame_time)?;
        info!(
            "Frame {} ({:.2}s scene time) rendered in {:.2}ms",
            stats.frame,
            stats.time,
            stats.duration.as_secs_f32() * RaytracerConfig::MILLISECONDS_PER_SECOND
        );
    }

    let image = driver.read_surface(&surface)?;
    image.save(&config.output.path)?;
    info!("Wrote {}x{} image to {}", image.width(), image.height(), config.output.path.display());
    Ok(())
}

use crate::config::Config;
use crate::controller::{ControllerError, FrameController, QaSummary, TickOutcome, WINDOW_TITLE};
use crate::display::{DisplayError, DisplaySurface, HeadlessSurface, WindowSurface};
use crate::enums::{KeyOutcome, Processor};
use crate::gpu_renderer::{Gpu, GpuRenderer};
use crate::renderer::{CpuRenderer, RenderError, Renderer};
use crate::verifier::{FrameVerifier, ReferenceVerifier};
use crate::volume_loader::{VolumeLoader, VolumeLoaderError};

use log::info;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Volume(#[from] VolumeLoaderError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Display(#[from] DisplayError),

    #[error(transparent)]
    Controller(#[from] ControllerError),
}

/// Why the event loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    /// The user asked to quit.
    Quit,
    /// The window was closed.
    Closed,
    /// An automated run completed.
    Finished(QaSummary),
}

/// Pumps input, resize and frame events into the controller until something
/// ends the run.
pub fn event_loop<R, V, S>(
    controller: &mut FrameController<R, V>,
    surface: &mut S,
) -> Result<LoopExit, ControllerError>
where
    R: Renderer,
    V: FrameVerifier,
    S: DisplaySurface + ?Sized,
{
    let mut size = surface.size();
    controller.on_resize(surface, size.0, size.1);

    while surface.is_open() {
        for key in surface.poll_keys() {
            if controller.on_key(key) == KeyOutcome::Quit {
                info!("Quit requested");
                return Ok(LoopExit::Quit);
            }
        }

        let current = surface.size();
        if current != size {
            size = current;
            controller.on_resize(surface, size.0, size.1);
        }

        if let TickOutcome::Finished(summary) = controller.on_tick(surface)? {
            return Ok(LoopExit::Finished(summary));
        }
    }

    Ok(LoopExit::Closed)
}

fn drive<R: Renderer>(renderer: R, config: &Config) -> Result<LoopExit, AppError> {
    let verifier = ReferenceVerifier::new(config.artifacts.clone(), config.tolerance);
    let mut controller = FrameController::new(
        renderer,
        verifier,
        config.mode,
        config.frame_size,
        config.frame_check,
        config.filtering,
    );

    let (width, height) = config.frame_size;
    let exit = if config.headless {
        let mut surface = HeadlessSurface::new(width, height);
        event_loop(&mut controller, &mut surface)?
    } else {
        let mut surface = WindowSurface::new(WINDOW_TITLE, width, height)?;
        event_loop(&mut controller, &mut surface)?
    };
    Ok(exit)
}

/// Loads the volume, sets up the renderer and surface, and runs until the
/// loop exits. Everything acquired here is released when this returns.
pub async fn run(config: &Config) -> Result<LoopExit, AppError> {
    info!("Starting in {:?} mode", config.mode);
    let volume = VolumeLoader::load_named(&config.volume, &config.data_dirs, config.volume_dim)?;

    match config.processor {
        Processor::GPU => {
            let gpu = Gpu::new(config.device).await?;
            let renderer = GpuRenderer::new(&volume, gpu, config.filtering)?;
            drive(renderer, config)
        }
        Processor::CPU => drive(CpuRenderer::new(volume, config.filtering), config),
    }
}

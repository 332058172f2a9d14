//! Per-frame state machine driving rendering, presentation and verification.
//!
//! Every tick runs `RENDER -> PRESENT -> MAYBE_VERIFY -> COUNT`. Frames are
//! grouped in sample windows of `limit` frames. In automated modes the frame
//! before the window fills arms a verification request, the next tick
//! consumes it, and the filled window ends the run with a [`QaSummary`]. In
//! interactive mode windows only refresh the frame rate in the title.

use crate::display::{DisplayError, DisplaySurface, KEY_ESCAPE, Viewport};
use crate::enums::{Filtering, KeyOutcome, RunMode, VerifyMode};
use crate::renderer::{FrameBuffer, RenderError, Renderer};
use crate::verifier::{FrameVerifier, VerifyError};

use log::{debug, info, warn};
use std::time::Duration;
use thiserror::Error;
use web_time::Instant;

pub const WINDOW_TITLE: &str = "Volume Slice 3D Textures";

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Display error: {0}")]
    Display(#[from] DisplayError),

    #[error("Verification error: {0}")]
    Verify(#[from] VerifyError),
}

/// Slice depth, kept as a whole number of steps from its origin so that
/// stepping forward and back lands on the same value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationCursor {
    pub origin: f32,
    pub step: f32,
    pub steps: i64,
    pub animate: bool,
}

impl Default for AnimationCursor {
    fn default() -> Self {
        Self {
            origin: 0.5,
            step: 0.01,
            steps: 0,
            animate: true,
        }
    }
}

impl AnimationCursor {
    pub fn value(&self) -> f32 {
        self.origin + self.steps as f32 * self.step
    }

    pub fn forward(&mut self) {
        self.steps += 1;
    }

    pub fn back(&mut self) {
        self.steps -= 1;
    }

    fn advance(&mut self) {
        if self.animate {
            self.forward();
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleWindow {
    pub count: u32,
    pub limit: u32,
}

/// Accumulates frame durations between resets.
#[derive(Debug, Default)]
struct FrameTimer {
    started: Option<Instant>,
    total: Duration,
    samples: u32,
}

impl FrameTimer {
    fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.total += started.elapsed();
            self.samples += 1;
        }
    }

    fn average(&self) -> Option<Duration> {
        (self.samples > 0).then(|| self.total / self.samples)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Result of an automated run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QaSummary {
    pub mode: RunMode,
    pub frames: u64,
    pub errors: u32,
}

impl QaSummary {
    pub fn passed(&self) -> bool {
        self.errors == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Finished(QaSummary),
}

pub struct FrameController<R, V> {
    renderer: R,
    verifier: V,
    mode: RunMode,
    frame: FrameBuffer,
    cursor: AnimationCursor,
    filtering: Filtering,
    frame_count: u64,
    window: SampleWindow,
    timer: FrameTimer,
    fps: f32,
    verify_armed: bool,
    error_tally: u32,
}

impl<R: Renderer, V: FrameVerifier> FrameController<R, V> {
    /// Creates a controller rendering `width` x `height` frames.
    ///
    /// `sample_limit` is the number of frames per sample window; it must be
    /// at least 2 for automated runs to reach their verification frame.
    pub fn new(
        mut renderer: R,
        verifier: V,
        mode: RunMode,
        (width, height): (usize, usize),
        sample_limit: u32,
        filtering: Filtering,
    ) -> Self {
        renderer.set_filtering(filtering);
        Self {
            renderer,
            verifier,
            mode,
            frame: FrameBuffer::new(width, height),
            cursor: AnimationCursor::default(),
            filtering,
            frame_count: 0,
            window: SampleWindow {
                count: 0,
                limit: sample_limit.max(1),
            },
            timer: FrameTimer::default(),
            fps: 0.0,
            verify_armed: false,
            error_tally: 0,
        }
    }

    /// Advances the state machine by one frame.
    pub fn on_tick<S: DisplaySurface + ?Sized>(
        &mut self,
        surface: &mut S,
    ) -> Result<TickOutcome, ControllerError> {
        self.timer.start();

        self.renderer.render(self.cursor.value(), &mut self.frame)?;
        surface.present(&self.frame)?;

        if self.verify_armed && self.mode.is_automated() {
            self.verify(surface)?;
        }

        self.timer.stop();
        Ok(self.count(surface))
    }

    fn verify<S: DisplaySurface + ?Sized>(&mut self, surface: &S) -> Result<(), ControllerError> {
        let passed = match self.mode {
            RunMode::GlVerify => {
                info!("(Frame {}) readback presented frame", self.frame_count);
                let presented = surface.read_back().ok_or(VerifyError::NothingPresented)?;
                self.verifier.verify(VerifyMode::Image, presented)?
            }
            _ => {
                info!("(Frame {}) readback output buffer", self.frame_count);
                self.verifier.verify(VerifyMode::Binary, &self.frame)?
            }
        };

        if !passed {
            self.error_tally += 1;
            warn!("(Frame {}) does not match the reference", self.frame_count);
        }
        self.verify_armed = false;
        Ok(())
    }

    fn count<S: DisplaySurface + ?Sized>(&mut self, surface: &mut S) -> TickOutcome {
        self.cursor.advance();
        self.frame_count += 1;
        self.window.count += 1;

        let automated = self.mode.is_automated();

        if automated && !self.verify_armed && self.window.count == self.window.limit - 1 {
            self.verify_armed = true;
        }

        if self.window.count < self.window.limit {
            return TickOutcome::Continue;
        }

        self.fps = self
            .timer
            .average()
            .map(|average| 1.0 / average.as_secs_f32().max(f32::EPSILON))
            .unwrap_or(0.0);
        let prefix = if automated { "AutoTest: " } else { "" };
        surface.set_title(&format!("{prefix}{WINDOW_TITLE}: {:3.1} fps", self.fps));
        self.window.count = 0;
        self.timer.reset();

        if !automated {
            self.window.limit = self.fps.max(1.0) as u32;
            return TickOutcome::Continue;
        }

        surface.set_title(&format!("AutoTest: {WINDOW_TITLE}"));
        TickOutcome::Finished(QaSummary {
            mode: self.mode,
            frames: self.frame_count,
            errors: self.error_tally,
        })
    }

    /// Handles one key given as a character code.
    pub fn on_key(&mut self, key: u8) -> KeyOutcome {
        match key {
            KEY_ESCAPE => return KeyOutcome::Quit,
            b'+' | b'=' => self.cursor.forward(),
            b'-' => self.cursor.back(),
            b'f' => {
                self.filtering = self.filtering.toggled();
                self.renderer.set_filtering(self.filtering);
            }
            b' ' => self.cursor.animate = !self.cursor.animate,
            _ => {}
        }
        debug!(
            "key {key}: cursor {:.2}, {:?}, animate {}",
            self.cursor.value(),
            self.filtering,
            self.cursor.animate
        );
        KeyOutcome::Redraw
    }

    /// Installs a unit-square orthographic viewport sized to the surface.
    pub fn on_resize<S: DisplaySurface + ?Sized>(
        &mut self,
        surface: &mut S,
        width: usize,
        height: usize,
    ) {
        surface.set_viewport(Viewport::unit_ortho(width, height));
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn cursor(&self) -> &AnimationCursor {
        &self.cursor
    }

    pub fn filtering(&self) -> Filtering {
        self.filtering
    }

    pub fn is_verify_armed(&self) -> bool {
        self.verify_armed
    }

    pub fn error_tally(&self) -> u32 {
        self.error_tally
    }

    pub fn sample_window(&self) -> SampleWindow {
        self.window
    }

    /// Frame rate measured over the last full sample window.
    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn verifier(&self) -> &V {
        &self.verifier
    }
}

use ndarray::Array3;
use std::fs;
use volume_slice::{
    CpuRenderer, Filtering, FrameBuffer, FrameController, KeyOutcome, Renderer, RunMode,
    TickOutcome, Volume, VerifyMode,
    app::{LoopExit, event_loop},
    display::{DisplayError, DisplaySurface, HeadlessSurface, Viewport},
    renderer::RenderError,
    verifier::{ArtifactPaths, FrameVerifier, ReferenceVerifier, Tolerance, VerifyError},
};

/// Renders a flat grey level and records every cursor it was asked for.
#[derive(Default)]
struct RecordingRenderer {
    cursors: Vec<f32>,
    filtering: Vec<Filtering>,
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, cursor: f32, output: &mut FrameBuffer) -> Result<(), RenderError> {
        self.cursors.push(cursor);
        output.pixels.fill(FrameBuffer::grey(40));
        Ok(())
    }

    fn set_filtering(&mut self, filtering: Filtering) {
        self.filtering.push(filtering);
    }
}

/// Answers every check with a fixed result and counts the calls.
struct ScriptedVerifier {
    pass: bool,
    checks: Vec<VerifyMode>,
}

impl ScriptedVerifier {
    fn passing() -> Self {
        Self {
            pass: true,
            checks: Vec::new(),
        }
    }

    fn failing() -> Self {
        Self {
            pass: false,
            checks: Vec::new(),
        }
    }
}

impl FrameVerifier for ScriptedVerifier {
    fn verify(&mut self, mode: VerifyMode, _: &FrameBuffer) -> Result<bool, VerifyError> {
        self.checks.push(mode);
        Ok(self.pass)
    }
}

/// Surface that replays a fixed list of key presses, one per poll.
struct ScriptedSurface {
    inner: HeadlessSurface,
    keys: Vec<Vec<u8>>,
    viewports: Vec<Viewport>,
    open_polls: Option<usize>,
}

impl ScriptedSurface {
    fn new(keys: Vec<Vec<u8>>) -> Self {
        Self {
            inner: HeadlessSurface::new(8, 8),
            keys,
            viewports: Vec::new(),
            open_polls: None,
        }
    }
}

impl DisplaySurface for ScriptedSurface {
    fn is_open(&self) -> bool {
        self.open_polls.is_none_or(|left| left > 0)
    }

    fn present(&mut self, frame: &FrameBuffer) -> Result<(), DisplayError> {
        if let Some(left) = self.open_polls.as_mut() {
            *left = left.saturating_sub(1);
        }
        self.inner.present(frame)
    }

    fn set_title(&mut self, title: &str) {
        self.inner.set_title(title);
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewports.push(viewport);
    }

    fn read_back(&self) -> Option<&FrameBuffer> {
        self.inner.read_back()
    }

    fn poll_keys(&mut self) -> Vec<u8> {
        if self.keys.is_empty() {
            Vec::new()
        } else {
            self.keys.remove(0)
        }
    }

    fn size(&self) -> (usize, usize) {
        self.inner.size()
    }
}

fn controller<V: FrameVerifier>(
    mode: RunMode,
    limit: u32,
    verifier: V,
) -> FrameController<RecordingRenderer, V> {
    FrameController::new(
        RecordingRenderer::default(),
        verifier,
        mode,
        (8, 8),
        limit,
        Filtering::Linear,
    )
}

#[test]
fn frame_counter_equals_ticks() {
    let mut controller = controller(RunMode::Interactive, 5, ScriptedVerifier::passing());
    let mut surface = HeadlessSurface::new(8, 8);

    for i in 1..=23u64 {
        assert_eq!(
            controller.on_tick(&mut surface).unwrap(),
            TickOutcome::Continue
        );
        assert_eq!(controller.frame_count(), i);
    }
    assert_eq!(surface.presented, 23);
}

#[test]
fn automated_run_with_four_frame_window() {
    let mut controller = controller(RunMode::QaReadback, 4, ScriptedVerifier::passing());
    let mut surface = HeadlessSurface::new(8, 8);
    assert_eq!(controller.mode(), RunMode::QaReadback);

    for _ in 0..2 {
        assert_eq!(
            controller.on_tick(&mut surface).unwrap(),
            TickOutcome::Continue
        );
        assert!(!controller.is_verify_armed());
    }

    assert_eq!(
        controller.on_tick(&mut surface).unwrap(),
        TickOutcome::Continue
    );
    assert!(controller.is_verify_armed());
    assert!(controller.verifier().checks.is_empty());

    let outcome = controller.on_tick(&mut surface).unwrap();
    let TickOutcome::Finished(summary) = outcome else {
        panic!("expected the run to finish, got {outcome:?}");
    };
    assert_eq!(summary.frames, 4);
    assert_eq!(summary.errors, 0);
    assert!(summary.passed());
    assert!(!controller.is_verify_armed());
    assert_eq!(controller.verifier().checks, vec![VerifyMode::Binary]);
    assert_eq!(surface.title, "AutoTest: Volume Slice 3D Textures");
}

#[test]
fn mismatch_is_tallied_not_fatal() {
    let mut controller = controller(RunMode::QaReadback, 4, ScriptedVerifier::failing());
    let mut surface = HeadlessSurface::new(8, 8);

    let mut outcome = TickOutcome::Continue;
    for _ in 0..4 {
        outcome = controller.on_tick(&mut surface).unwrap();
    }

    let TickOutcome::Finished(summary) = outcome else {
        panic!("expected the run to finish, got {outcome:?}");
    };
    assert_eq!(summary.errors, 1);
    assert!(!summary.passed());
    assert_eq!(controller.error_tally(), 1);
}

#[test]
fn interactive_mode_never_verifies_or_finishes() {
    let mut controller = controller(RunMode::Interactive, 3, ScriptedVerifier::failing());
    let mut surface = HeadlessSurface::new(8, 8);

    for _ in 0..50 {
        assert_eq!(
            controller.on_tick(&mut surface).unwrap(),
            TickOutcome::Continue
        );
        assert!(!controller.is_verify_armed());
    }
    assert!(controller.verifier().checks.is_empty());
    assert_eq!(controller.error_tally(), 0);
}

#[test]
fn plus_and_minus_step_the_cursor() {
    let mut controller = controller(RunMode::Interactive, 4, ScriptedVerifier::passing());
    let start = controller.cursor().value();

    for n in 1..=10 {
        assert_eq!(controller.on_key(b'+'), KeyOutcome::Redraw);
        let moved = controller.cursor().value() - start;
        assert!((moved - n as f32 * 0.01).abs() < 1e-5);
    }
    for _ in 0..10 {
        assert_eq!(controller.on_key(b'-'), KeyOutcome::Redraw);
    }
    assert_eq!(controller.cursor().value(), start);
}

#[test]
fn escape_quits_from_any_state() {
    let mut controller = controller(RunMode::QaReadback, 4, ScriptedVerifier::passing());
    let mut surface = HeadlessSurface::new(8, 8);
    assert_eq!(controller.on_key(27), KeyOutcome::Quit);

    for _ in 0..3 {
        controller.on_tick(&mut surface).unwrap();
    }
    assert!(controller.is_verify_armed());
    assert_eq!(controller.on_key(27), KeyOutcome::Quit);
}

#[test]
fn f_toggles_filtering_and_space_pauses_animation() {
    let mut controller = controller(RunMode::Interactive, 100, ScriptedVerifier::passing());
    let mut surface = HeadlessSurface::new(8, 8);

    controller.on_key(b'f');
    assert_eq!(controller.filtering(), Filtering::Nearest);
    controller.on_key(b'f');
    assert_eq!(controller.filtering(), Filtering::Linear);
    assert_eq!(
        controller.renderer().filtering,
        vec![Filtering::Linear, Filtering::Nearest, Filtering::Linear]
    );

    controller.on_key(b' ');
    assert!(!controller.cursor().animate);
    let before = controller.cursor().value();
    controller.on_tick(&mut surface).unwrap();
    controller.on_tick(&mut surface).unwrap();
    assert_eq!(controller.cursor().value(), before);
    assert_eq!(controller.renderer().cursors, vec![before, before]);

    assert_eq!(controller.on_key(b'x'), KeyOutcome::Redraw);
}

#[test]
fn resize_only_touches_the_viewport() {
    let mut controller = controller(RunMode::Interactive, 4, ScriptedVerifier::passing());
    let mut surface = ScriptedSurface::new(Vec::new());
    let cursor = *controller.cursor();

    controller.on_resize(&mut surface, 300, 200);

    assert_eq!(surface.viewports, vec![Viewport::unit_ortho(300, 200)]);
    assert_eq!(*controller.cursor(), cursor);
    assert_eq!(controller.frame_count(), 0);
    assert_eq!(controller.frame().width, 8);
}

#[test]
fn event_loop_quits_on_escape_with_clean_exit() {
    let mut controller = controller(RunMode::Interactive, 4, ScriptedVerifier::passing());
    let mut surface = ScriptedSurface::new(vec![vec![], vec![b'+'], vec![27]]);

    let exit = event_loop(&mut controller, &mut surface).unwrap();

    assert_eq!(exit, LoopExit::Quit);
    assert_eq!(controller.frame_count(), 2);
    // initial viewport from the loop start
    assert_eq!(surface.viewports.len(), 1);
}

#[test]
fn event_loop_reports_closed_window() {
    let mut controller = controller(RunMode::Interactive, 4, ScriptedVerifier::passing());
    let mut surface = ScriptedSurface::new(Vec::new());
    surface.open_polls = Some(3);

    assert_eq!(
        event_loop(&mut controller, &mut surface).unwrap(),
        LoopExit::Closed
    );
    assert_eq!(controller.frame_count(), 3);
}

#[test]
fn event_loop_finishes_automated_run() {
    let mut controller = controller(RunMode::GlVerify, 4, ScriptedVerifier::passing());
    let mut surface = ScriptedSurface::new(Vec::new());

    let exit = event_loop(&mut controller, &mut surface).unwrap();

    let LoopExit::Finished(summary) = exit else {
        panic!("expected a finished run, got {exit:?}");
    };
    assert_eq!(summary.mode, RunMode::GlVerify);
    assert_eq!(summary.frames, 4);
    assert_eq!(controller.verifier().checks, vec![VerifyMode::Image]);
}

fn bucky_like_volume() -> Volume {
    Volume::new(Array3::from_shape_fn((32, 32, 32), |(z, y, x)| {
        ((x * 7 + y * 3 + z * 5) % 256) as u8
    }))
}

fn run_against_reference(dir: &std::path::Path) -> volume_slice::QaSummary {
    let artifacts = ArtifactPaths {
        output_dir: dir.to_path_buf(),
        reference_dirs: vec![dir.join("refs")],
        ..ArtifactPaths::default()
    };
    let mut controller = FrameController::new(
        CpuRenderer::new(bucky_like_volume(), Filtering::Linear),
        ReferenceVerifier::new(artifacts, Tolerance::default()),
        RunMode::QaReadback,
        (32, 32),
        4,
        Filtering::Linear,
    );
    let mut surface = HeadlessSurface::new(32, 32);
    match event_loop(&mut controller, &mut surface).unwrap() {
        LoopExit::Finished(summary) => summary,
        other => panic!("expected a finished run, got {other:?}"),
    }
}

#[test]
fn reference_run_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("refs")).unwrap();

    // render the verified frame directly to build the reference: the fourth
    // frame samples at 0.5 + 3 * 0.01
    let mut renderer = CpuRenderer::new(bucky_like_volume(), Filtering::Linear);
    let mut expected = FrameBuffer::new(32, 32);
    renderer.render(0.5 + 3.0 * 0.01, &mut expected).unwrap();
    ReferenceVerifier::save_binary(
        &expected,
        &dir.path().join("refs").join("ref_texture3D.bin"),
    )
    .unwrap();

    let first = run_against_reference(dir.path());
    let second = run_against_reference(dir.path());

    assert!(first.passed());
    assert_eq!(first, second);
    assert_eq!(
        fs::read(dir.path().join("simpleTexture3D.bin")).unwrap().len(),
        32 * 32 * 4
    );
}

#[test]
fn missing_reference_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let artifacts = ArtifactPaths {
        output_dir: dir.path().to_path_buf(),
        binary_reference: "absent-reference-5d1e.bin".to_string(),
        ..ArtifactPaths::default()
    };
    let mut controller = FrameController::new(
        RecordingRenderer::default(),
        ReferenceVerifier::new(artifacts, Tolerance::default()),
        RunMode::QaReadback,
        (8, 8),
        4,
        Filtering::Linear,
    );
    let mut surface = HeadlessSurface::new(8, 8);

    let err = event_loop(&mut controller, &mut surface).unwrap_err();
    assert!(matches!(
        err,
        volume_slice::controller::ControllerError::Verify(VerifyError::MissingReference(_))
    ));
}

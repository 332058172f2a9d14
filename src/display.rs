use crate::renderer::FrameBuffer;

use log::debug;
use minifb::{Key, KeyRepeat, ScaleMode, Window, WindowOptions};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("Window init error: {0}")]
    WindowInit(String),

    #[error("Window update error: {0}")]
    WindowUpdate(String),
}

/// Viewport rectangle plus the projection mapping the unit square onto it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: usize,
    pub height: usize,
    /// Column-major 4x4 matrix.
    pub projection: [[f32; 4]; 4],
}

impl Viewport {
    /// Orthographic projection of `[0, 1]` on every axis.
    pub fn unit_ortho(width: usize, height: usize) -> Self {
        let (left, right, bottom, top, near, far) = (0.0f32, 1.0f32, 0.0f32, 1.0f32, 0.0f32, 1.0f32);
        let projection = [
            [2.0 / (right - left), 0.0, 0.0, 0.0],
            [0.0, 2.0 / (top - bottom), 0.0, 0.0],
            [0.0, 0.0, -2.0 / (far - near), 0.0],
            [
                -(right + left) / (right - left),
                -(top + bottom) / (top - bottom),
                -(far + near) / (far - near),
                1.0,
            ],
        ];
        Self {
            width,
            height,
            projection,
        }
    }

    /// Maps a point through the projection, returning clip-space x and y.
    pub fn project(&self, x: f32, y: f32) -> (f32, f32) {
        let m = &self.projection;
        (
            m[0][0] * x + m[1][0] * y + m[3][0],
            m[0][1] * x + m[1][1] * y + m[3][1],
        )
    }
}

/// Where frames end up and where input comes from.
pub trait DisplaySurface {
    /// False once the user closed the window.
    fn is_open(&self) -> bool;

    fn present(&mut self, frame: &FrameBuffer) -> Result<(), DisplayError>;

    fn set_title(&mut self, title: &str);

    fn set_viewport(&mut self, viewport: Viewport);

    /// The last presented frame, as the user saw it.
    fn read_back(&self) -> Option<&FrameBuffer>;

    /// Keys pressed since the last call, as character codes.
    fn poll_keys(&mut self) -> Vec<u8>;

    /// Current client size in pixels.
    fn size(&self) -> (usize, usize);
}

/// Escape key code.
pub const KEY_ESCAPE: u8 = 27;

fn key_code(key: Key) -> Option<u8> {
    match key {
        Key::Escape => Some(KEY_ESCAPE),
        Key::Equal | Key::NumPadPlus => Some(b'+'),
        Key::Minus | Key::NumPadMinus => Some(b'-'),
        Key::F => Some(b'f'),
        Key::Space => Some(b' '),
        _ => None,
    }
}

/// A resizable window that stretches each frame over its client area.
pub struct WindowSurface {
    window: Window,
    back_buffer: Option<FrameBuffer>,
}

impl WindowSurface {
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self, DisplayError> {
        let mut window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: true,
                scale_mode: ScaleMode::Stretch,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| DisplayError::WindowInit(e.to_string()))?;
        window.set_target_fps(60);

        Ok(Self {
            window,
            back_buffer: None,
        })
    }
}

impl DisplaySurface for WindowSurface {
    fn is_open(&self) -> bool {
        self.window.is_open()
    }

    fn present(&mut self, frame: &FrameBuffer) -> Result<(), DisplayError> {
        self.window
            .update_with_buffer(&frame.pixels, frame.width, frame.height)
            .map_err(|e| DisplayError::WindowUpdate(e.to_string()))?;
        match self.back_buffer.as_mut() {
            Some(back) => back.clone_from(frame),
            None => self.back_buffer = Some(frame.clone()),
        }
        Ok(())
    }

    fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        // minifb stretches the buffer over the client area
        debug!("Viewport now {}x{}", viewport.width, viewport.height);
    }

    fn read_back(&self) -> Option<&FrameBuffer> {
        self.back_buffer.as_ref()
    }

    fn poll_keys(&mut self) -> Vec<u8> {
        self.window
            .get_keys_pressed(KeyRepeat::Yes)
            .into_iter()
            .filter_map(key_code)
            .collect()
    }

    fn size(&self) -> (usize, usize) {
        self.window.get_size()
    }
}

/// Keeps presented frames in memory; used for runs without a display.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    pub title: String,
    pub viewport: Option<Viewport>,
    pub presented: usize,
    size: (usize, usize),
    back_buffer: Option<FrameBuffer>,
}

impl HeadlessSurface {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            size: (width, height),
            ..Self::default()
        }
    }
}

impl DisplaySurface for HeadlessSurface {
    fn is_open(&self) -> bool {
        true
    }

    fn present(&mut self, frame: &FrameBuffer) -> Result<(), DisplayError> {
        self.presented += 1;
        self.back_buffer = Some(frame.clone());
        Ok(())
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.size = (viewport.width, viewport.height);
        self.viewport = Some(viewport);
    }

    fn read_back(&self) -> Option<&FrameBuffer> {
        self.back_buffer.as_ref()
    }

    fn poll_keys(&mut self) -> Vec<u8> {
        Vec::new()
    }

    fn size(&self) -> (usize, usize) {
        self.size
    }
}

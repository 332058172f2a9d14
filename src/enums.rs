/// Texture sampling used when resampling the volume.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Filtering {
    #[default]
    Linear,
    Nearest,
}

impl Filtering {
    pub fn toggled(self) -> Self {
        match self {
            Filtering::Linear => Filtering::Nearest,
            Filtering::Nearest => Filtering::Linear,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Processor {
    CPU,
    #[default]
    GPU,
}

/// How a run is driven and whether frames are checked against references.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Window stays open until the user quits.
    Interactive,
    /// Reads the renderer's output buffer back and compares it word by word.
    QaReadback,
    /// Reads back what the display surface presented and compares it as an image.
    GlVerify,
}

impl RunMode {
    pub fn is_automated(self) -> bool {
        !matches!(self, RunMode::Interactive)
    }
}

/// Which capture path a verification request uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyMode {
    Binary,
    Image,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    Redraw,
    Quit,
}

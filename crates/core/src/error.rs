/// Result alias that carries the custom [`VisualiserError`] type.
pub type Result<T> = std::result::Result<T, VisualiserError>;

/// Failures while acquiring a capture device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// The user or the platform refused access to the capture device.
    #[error("permission to use the capture device was denied")]
    PermissionDenied,
    /// No usable device exists, or it could not be opened.
    #[error("capture device unavailable: {0}")]
    Unavailable(String),
}

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum VisualiserError {
    /// Free-form failure that does not warrant its own variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Capture permission denied or hardware unavailable. Never fatal: the
    /// session stays stopped and rendering continues with silence.
    #[error(transparent)]
    Device(#[from] DeviceError),
    /// An audio file could not be decoded. Playback does not start.
    #[error("could not decode audio: {0}")]
    Decode(String),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("unknown visual mode `{0}`")]
    UnknownMode(String),
    #[error("unknown theme `{0}`")]
    UnknownTheme(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("fft failed: {0}")]
    Fft(String),
}

impl VisualiserError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Whether the error belongs to the device class, which callers treat as
    /// a soft failure.
    pub fn is_device(&self) -> bool {
        matches!(self, Self::Device(_))
    }
}

impl From<&str> for VisualiserError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for VisualiserError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

/// Any failure to read an audio file, missing files included, is a decode
/// error: playback simply does not start.
impl From<hound::Error> for VisualiserError {
    fn from(value: hound::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

impl From<serde_json::Error> for VisualiserError {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<realfft::FftError> for VisualiserError {
    fn from(value: realfft::FftError) -> Self {
        Self::Fft(value.to_string())
    }
}

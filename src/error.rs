use thiserror::Error;

/// Errors surfaced by backend construction and teardown.
///
/// Per-frame operations never fail: out-of-range ports, unplugged pads and
/// unsupported capabilities all resolve to neutral values instead.
#[derive(Debug, Error)]
pub enum PadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sdl error: {0}")]
    Sdl(String),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("no joypad driver could be initialized (tried: {0})")]
    NoDriver(String),

    #[error("unknown joypad driver \"{0}\"")]
    UnknownDriver(String),
}

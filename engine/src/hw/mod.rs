#[cfg(target_os = "linux")]
pub mod alsa;
#[cfg(target_os = "linux")]
mod error_fmt;
pub mod traits;

use super::traits::StreamDirection;

pub fn open_error(direction: StreamDirection, device: &str, err: impl std::fmt::Display) -> String {
    format!("Failed to open ALSA {direction} '{device}': {err}")
}

pub fn param_error(direction: StreamDirection, param: &str, err: impl std::fmt::Display) -> String {
    format!("ALSA {direction} {param} failed: {err}")
}

pub fn poll_error(direction: StreamDirection, op: &str, err: impl std::fmt::Display) -> String {
    format!("ALSA {direction} {op} failed: {err}")
}

// Operating system detection. Install instructions and install commands
// branch on the normalized OS name produced here.

use crate::log_debug;

/// Normalized operating system families openframe knows how to talk about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    MacOs,
    Linux,
    Windows,
    Other,
}

/// Detects the OS the binary was compiled for.
pub fn detect_os() -> Os {
    normalize_os(std::env::consts::OS)
}

/// Maps the various spellings (`darwin`, `macOS`, `win64`...) onto [`Os`].
pub fn normalize_os(os: &str) -> Os {
    match os.to_lowercase().as_str() {
        "macos" | "darwin" | "apple-darwin" => Os::MacOs,
        "linux" => Os::Linux,
        "windows" | "win32" | "win64" => Os::Windows,
        other => {
            log_debug!("[Platform] unknown OS variant '{}'", other);
            Os::Other
        }
    }
}

/// Architecture name in the form release download URLs use (`amd64` / `arm64`).
pub fn download_arch() -> &'static str {
    match std::env::consts::ARCH {
        "aarch64" | "arm64" => "arm64",
        _ => "amd64",
    }
}

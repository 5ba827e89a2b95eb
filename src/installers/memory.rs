// Memory is not something we can install. The checker reports how much RAM
// the machine has against what the full OpenFrame stack wants, and the
// prerequisite flow turns a shortfall into a warning.

use std::sync::Arc;

use super::{InstallError, Installability, ToolChecker};
use crate::libs::executor::{CommandExecutor, ExecutorExt};
use crate::libs::utilities::platform::{Os, detect_os};
use crate::log_debug;

/// Recommended total system memory for the full stack, in MB.
pub const RECOMMENDED_MEMORY_MB: u64 = 24576;

pub struct MemoryChecker {
    executor: Arc<dyn CommandExecutor>,
    os: Os,
    recommended_mb: u64,
}

impl MemoryChecker {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            os: detect_os(),
            recommended_mb: RECOMMENDED_MEMORY_MB,
        }
    }

    /// Total memory in MB, `None` when it can't be determined.
    pub fn total_memory_mb(&self) -> Option<u64> {
        match self.os {
            Os::Linux => std::fs::read_to_string("/proc/meminfo")
                .ok()
                .and_then(|content| parse_meminfo_total_mb(&content)),
            Os::MacOs => self
                .executor
                .execute("sysctl", &["-n", "hw.memsize"])
                .ok()
                .and_then(|r| r.stdout.trim().parse::<u64>().ok())
                .map(|bytes| bytes / 1024 / 1024),
            Os::Windows => self
                .executor
                .execute("wmic", &["ComputerSystem", "get", "TotalPhysicalMemory"])
                .ok()
                .and_then(|r| {
                    r.stdout
                        .lines()
                        .find_map(|line| line.trim().parse::<u64>().ok())
                })
                .map(|bytes| bytes / 1024 / 1024),
            Os::Other => None,
        }
    }

    /// `(current_mb, recommended_mb, sufficient)`. Unknown memory counts as sufficient.
    pub fn memory_info(&self) -> (u64, u64, bool) {
        match self.total_memory_mb() {
            Some(current) => (current, self.recommended_mb, current >= self.recommended_mb),
            None => {
                log_debug!("[Memory] could not determine total memory, assuming enough");
                (0, self.recommended_mb, true)
            }
        }
    }
}

/// Reads `MemTotal: <n> kB` from `/proc/meminfo`.
pub fn parse_meminfo_total_mb(content: &str) -> Option<u64> {
    content
        .lines()
        .find(|line| line.starts_with("MemTotal:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb / 1024)
}

impl ToolChecker for MemoryChecker {
    fn name(&self) -> String {
        "Memory".to_string()
    }

    fn is_installed(&self) -> bool {
        self.memory_info().2
    }

    fn install_help(&self) -> String {
        let (current, recommended, _) = self.memory_info();
        format!(
            "Memory: {} MB available, {} MB recommended. Close other applications or raise Docker's memory limit",
            current, recommended
        )
    }

    fn install(&self) -> Result<(), InstallError> {
        Err(InstallError::ManualOnly {
            tool: self.name(),
            instructions: self.install_help(),
        })
    }

    fn installability(&self) -> Installability {
        Installability::WarningOnly
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_meminfo() {
        let content = "MemTotal:       32768000 kB\nMemFree:         1000 kB\n";
        assert_eq!(parse_meminfo_total_mb(content), Some(32000));
        assert_eq!(parse_meminfo_total_mb("garbage"), None);
    }
}

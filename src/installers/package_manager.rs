//! # Package Manager Steps
//!
//! Builders for the install commands the tool checkers compose into plans:
//! Homebrew formulae and casks on macOS, apt and direct binary downloads on
//! Linux, Chocolatey on Windows, and upstream install scripts.
//!
//! None of these run anything themselves; they only describe an
//! [`InstallStep`] that [`super::run_steps`] executes through the executor.

use super::InstallStep;

pub fn brew(formula: &str) -> InstallStep {
    InstallStep::new(
        &format!("brew install {}", formula),
        "brew",
        &["install", formula],
    )
}

pub fn brew_cask(cask: &str) -> InstallStep {
    InstallStep::new(
        &format!("brew install --cask {}", cask),
        "brew",
        &["install", "--cask", cask],
    )
}

pub fn apt(package: &str) -> InstallStep {
    InstallStep::shell(
        &format!("apt-get install {}", package),
        &format!(
            "sudo apt-get update -qq && sudo apt-get install -y {}",
            package
        ),
    )
}

pub fn choco(package: &str) -> InstallStep {
    InstallStep::new(
        &format!("choco install {}", package),
        "choco",
        &["install", package, "-y"],
    )
}

/// Pipes an upstream install script into bash.
pub fn script(description: &str, url: &str) -> InstallStep {
    InstallStep::shell(description, &format!("curl -fsSL {} | bash", url))
}

/// Downloads a single binary and installs it into `/usr/local/bin`.
pub fn binary_download(binary: &str, url: &str) -> InstallStep {
    let tmp = format!("/tmp/{}-download", binary);
    InstallStep::shell(
        &format!("download {}", binary),
        &format!(
            "curl -fsSL -o {tmp} \"{url}\" && sudo install -m 0755 {tmp} /usr/local/bin/{binary} && rm -f {tmp}"
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brew_step_passes_formula_as_argument() {
        let step = brew("k3d");
        assert_eq!(step.options.command, "brew");
        assert_eq!(step.options.args, vec!["install", "k3d"]);
    }

    #[test]
    fn binary_download_installs_into_usr_local_bin() {
        let step = binary_download("skaffold", "https://example.com/skaffold");
        assert_eq!(step.options.command, "sh");
        assert!(step.options.args[1].contains("/usr/local/bin/skaffold"));
        assert!(step.options.args[1].contains("\"https://example.com/skaffold\""));
    }
}

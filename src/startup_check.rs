//! Pre-flight startup check script.
//!
//! Grounded on the original's `system(startupcheck.c_str())` +
//! `WIFEXITED`/`WEXITSTATUS` pattern: run an external script before
//! opening any socket, and only proceed if it exits with status 0.

use std::process::Command;

/// Runs `path` as a shell command and returns whether it exited with
/// status 0. A signal-terminated or unspawnable process counts as
/// failure (`Ok(false)`), matching the original's treatment of any
/// non-`WIFEXITED`-zero outcome.
pub fn run_startup_check(path: &str) -> std::io::Result<bool> {
    let status = Command::new("sh").arg("-c").arg(path).status()?;
    Ok(status.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn succeeding_script_reports_true() {
        assert!(run_startup_check("exit 0").unwrap());
    }

    #[test]
    fn failing_script_reports_false() {
        assert!(!run_startup_check("exit 1").unwrap());
    }
}

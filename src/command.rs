//! Helpers for running external commands.

use std::process::Output;

use crate::prelude::*;

/// Report a command failure, including any error output.
///
/// Standard output and standard error are logged at `debug` level either way,
/// because engines like `tesseract` write progress chatter to standard error.
pub fn check_for_command_failure(command_name: &str, output: &Output) -> Result<()> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!(command_name, output = %stdout, "Standard output from command");
    debug!(command_name, output = %stderr, "Standard error from command");

    if output.status.success() {
        Ok(())
    } else if let Some(exit_code) = output.status.code() {
        Err(anyhow!(
            "{} failed with exit code {} and error output:\n{}",
            command_name,
            exit_code,
            stderr.trim_end(),
        ))
    } else {
        Err(anyhow!(
            "{} failed with error output:\n{}",
            command_name,
            stderr.trim_end(),
        ))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::process::ExitStatusExt as _;
    use std::process::ExitStatus;

    use super::*;

    fn output(code: i32, stderr: &str) -> Output {
        Output {
            status: ExitStatus::from_raw(code << 8),
            stdout: b"text".to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[test]
    fn success_ignores_stderr_chatter() {
        let output = output(0, "Estimating resolution as 300");
        assert!(check_for_command_failure("tesseract", &output).is_ok());
    }

    #[test]
    fn failure_includes_exit_code_and_stderr() {
        let output = output(1, "Error, cannot read input file\n");
        let err = check_for_command_failure("tesseract", &output)
            .unwrap_err()
            .to_string();
        assert!(err.contains("exit code 1"), "{err}");
        assert!(err.contains("cannot read input file"), "{err}");
    }
}

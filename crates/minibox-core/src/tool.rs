//! Invocation of host networking tools (`ip`, `iptables`).

use std::process::Command;

use minibox_common::error::{MiniboxError, Result};

/// Runs `program` with `args`, returning its standard output.
///
/// The program is resolved on the host `PATH`. A non-zero exit becomes
/// [`MiniboxError::Command`] carrying the trimmed standard error.
///
/// # Errors
///
/// Returns an error if the program cannot be found, cannot be spawned,
/// or exits unsuccessfully.
pub fn run(program: &str, args: &[&str]) -> Result<String> {
    let path = which::which(program).map_err(|_| MiniboxError::NotFound {
        kind: "program",
        id: program.to_owned(),
    })?;
    tracing::trace!(program, ?args, "running host tool");

    let output = Command::new(&path)
        .args(args)
        .output()
        .map_err(|e| MiniboxError::io(&path, e))?;

    if !output.status.success() {
        return Err(MiniboxError::Command {
            program: program.to_owned(),
            args: args.iter().map(ToString::to_string).collect(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

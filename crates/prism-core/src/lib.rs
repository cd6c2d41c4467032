// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::process::ExitCode;

use tracing::error;

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

/// Surfaces a fatal error and yields the exit code the process should end with.
///
/// Every layer of the context chain gets its own line so the root cause (a
/// missing asset, a `VkResult`, ...) is visible without `RUST_BACKTRACE`.
pub fn report_fatal(err: &anyhow::Error) -> ExitCode {
    error!("fatal: {err}");
    for cause in err.chain().skip(1) {
        error!("  caused by: {cause}");
    }
    ExitCode::FAILURE
}

/// Flattens an error chain into a single line, outermost context first.
pub fn describe_chain(err: &anyhow::Error) -> String {
    err.chain()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn chain_lists_outermost_context_first() {
        let err = Err::<(), _>(anyhow!("file not found"))
            .context("load texture")
            .unwrap_err();
        assert_eq!(describe_chain(&err), "load texture: file not found");
    }

    #[test]
    fn fatal_report_walks_the_whole_chain() {
        init_tracing();
        let err = Err::<(), _>(anyhow!("VK_ERROR_INITIALIZATION_FAILED"))
            .context("create_instance")
            .unwrap_err();
        let _ = report_fatal(&err);
        assert_eq!(err.chain().count(), 2);
    }
}

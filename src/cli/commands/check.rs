//! `check` command handler.

use tracing::{error, info, warn};

use crate::cli::args::CheckArgs;
use crate::config;
use crate::error::{ConfigError, QuizRoomError};

/// Validates configuration files without starting the server.
///
/// Every file is checked even when an earlier one fails; validation
/// issues are printed per file as they are found.
///
/// # Errors
///
/// Returns the first failure once all files have been checked, so the
/// process exits with the configuration error code.
pub fn run(args: &CheckArgs) -> Result<(), QuizRoomError> {
    let mut first_failure = None;

    for path in &args.files {
        info!(file = %path.display(), "checking configuration");
        match config::load(path) {
            Ok(loaded) => {
                for warning in &loaded.warnings {
                    warn!(file = %path.display(), "{warning}");
                }
                info!(
                    file = %path.display(),
                    questions = loaded.questions.len(),
                    "configuration valid"
                );
            }
            Err(e) => {
                if let ConfigError::ValidationError { errors, .. } = &e {
                    for issue in errors {
                        error!(file = %path.display(), "{issue}");
                    }
                } else {
                    error!(file = %path.display(), "{e}");
                }
                first_failure.get_or_insert(e);
            }
        }
    }

    first_failure.map_or(Ok(()), |e| Err(e.into()))
}

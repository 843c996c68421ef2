//! Shared helpers for command handlers.

use crate::error::CliError;

/// Map a dialoguer failure (no TTY, interrupted) into a CLI error.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(prompt_err)
}

/// Turn a 1-based position from `zones list` into an index.
pub fn zone_index(position: usize) -> Result<usize, CliError> {
    position.checked_sub(1).ok_or_else(|| CliError::Validation {
        field: "position".into(),
        reason: "positions start at 1 (see `powerplay zones list`)".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_positions_are_one_based() {
        assert_eq!(zone_index(1).ok(), Some(0));
        assert!(matches!(zone_index(0), Err(CliError::Validation { .. })));
    }

    #[test]
    fn yes_flag_skips_prompt() {
        assert!(matches!(confirm("really?", true), Ok(true)));
    }
}

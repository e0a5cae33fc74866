//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain    | Description                                  |
//! |---------|-----------|----------------------------------------------|
//! | 0       | Universal | Success                                      |
//! | 1       | Universal | General error (unspecified)                  |
//! | 2       | Universal | CLI usage error (bad args, missing file)     |
//! | 3-9     | notebook  | Notebook read/write and migration codes      |
//! | 20-29   | viewer    | Page parameters, provisioning, kernel start  |
//! | 30-39   | settings  | Settings file codes                          |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use nbdash_kernel_client::{ProvisionError, SessionError};
use nbdash_viewer::ViewerError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Notebook (3-9)
// =============================================================================

/// Notebook or output file could not be read or written.
pub const EXIT_NOTEBOOK_IO: u8 = 3;

/// Input is not a notebook document.
pub const EXIT_NOTEBOOK_PARSE: u8 = 4;

/// `migrate --check` found legacy dashboard metadata.
pub const EXIT_MIGRATION_NEEDED: u8 = 5;

// =============================================================================
// Viewer (20-29)
// =============================================================================

/// Neither `--base-url` nor `viewer.thebeUrl` names a server.
pub const EXIT_VIEWER_NO_SERVER: u8 = 20;

/// Provisioning server has no free containers.
pub const EXIT_VIEWER_FULL: u8 = 21;

/// Provisioning server unreachable or answered with an error.
pub const EXIT_VIEWER_PROVISION: u8 = 22;

/// Kernel could not be started on the notebook server.
pub const EXIT_VIEWER_KERNEL: u8 = 23;

/// Page parameters file is not valid.
pub const EXIT_PAGE_PARSE: u8 = 24;

// =============================================================================
// Settings (30-39)
// =============================================================================

/// Settings file could not be written.
pub const EXIT_SETTINGS_WRITE: u8 = 30;

/// Map a viewer connection error to its exit code.
pub fn viewer_exit_code(err: &ViewerError) -> u8 {
    match err {
        ViewerError::MissingBaseUrl => EXIT_VIEWER_NO_SERVER,
        ViewerError::Provision(ProvisionError::Full) => EXIT_VIEWER_FULL,
        ViewerError::Provision(_) => EXIT_VIEWER_PROVISION,
        ViewerError::Session(SessionError::Network(_))
        | ViewerError::Session(SessionError::Http(..))
        | ViewerError::Session(SessionError::Parse(_)) => EXIT_VIEWER_KERNEL,
    }
}

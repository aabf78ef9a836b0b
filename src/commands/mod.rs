pub mod add;
pub mod check;
pub mod info;
pub mod lifecycle;
pub mod list;
pub mod remove;
pub mod worker;

use std::io::ErrorKind;
use std::path::Path;

use crate::error::Result;

/// Delete a task side file; one that is already gone is fine.
pub(crate) fn remove_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

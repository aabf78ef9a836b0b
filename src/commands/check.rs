use std::path::Path;

use crate::error::Result;
use crate::output::{self, Format};
use crate::scanner;

/// Report the filesystem size of a single path, without walking it.
pub fn run(path: &Path, format: Format) -> Result<u64> {
    let size = scanner::entry_size(path)?;
    output::print_size(&path.display().to_string(), size, format)?;
    Ok(size)
}

use crate::config::Config;
use crate::error::Result;
use crate::model::TaskRecord;
use crate::output::{self, Format};
use crate::store::registry;

/// Print every tracked task in registry order.
pub fn run(config: &Config, format: Format) -> Result<Vec<TaskRecord>> {
    let records = registry::snapshot(&config.registry_path())?;
    output::print_records(&records, format)?;
    Ok(records)
}

use schemars::schema_for;

use crate::config::SquadConfig;

/// Print the JSON Schema for `clawe.toml` to stdout.
pub fn run_schema() -> anyhow::Result<()> {
    let schema = schema_for!(SquadConfig);
    super::print_json(&schema)
}

use schemars::schema::RootSchema;
use schemars::schema_for;

use crate::model::MaskingConfiguration;

/// Emit the JSON Schema for masking configuration files.
pub fn config_json_schema() -> RootSchema {
    schema_for!(MaskingConfiguration)
}

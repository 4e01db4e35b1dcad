//! The `schema` subcommand.

use clap::{Args, ValueEnum};
use schemars::schema_for;
use tokio::io::AsyncWriteExt as _;

use crate::{prelude::*, product::ProductRecord};

/// The different schema types we support.
///
/// We parse these as PascalCase, because they represent type names.
#[derive(Debug, Clone, Copy, ValueEnum)]
#[clap(rename_all = "PascalCase")]
pub enum SchemaType {
    /// A single product record.
    ProductRecord,
    /// The batch output file, an array of product records.
    BatchOutput,
}

/// Schema command line arguments.
#[derive(Debug, Args)]
pub struct SchemaOpts {
    /// The schema type to generate.
    #[clap(value_enum, value_name = "TYPE", default_value = "BatchOutput")]
    pub schema_type: SchemaType,

    /// The output path to write the schema to.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// Generate the JSON Schema for `schema_type`.
pub fn schema_json(schema_type: SchemaType) -> Result<String> {
    let schema = match schema_type {
        SchemaType::ProductRecord => schema_for!(ProductRecord),
        SchemaType::BatchOutput => schema_for!(Vec<ProductRecord>),
    };
    serde_json::to_string_pretty(&schema).context("failed to serialize schema")
}

/// The `schema` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_schema(schema_opts: &SchemaOpts) -> Result<()> {
    let mut schema_str = schema_json(schema_opts.schema_type)?;
    schema_str.push('\n');
    match &schema_opts.output_path {
        Some(path) => tokio::fs::write(path, schema_str)
            .await
            .with_context(|| format!("failed to write schema to {:?}", path))?,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(schema_str.as_bytes())
                .await
                .context("failed to write schema")?;
            stdout.flush().await.context("failed to flush schema")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_schema_lists_all_fields() {
        let schema: Value =
            serde_json::from_str(&schema_json(SchemaType::ProductRecord).unwrap()).unwrap();
        let properties = schema["properties"].as_object().unwrap();
        for field in crate::product::FIELD_NAMES {
            assert!(properties.contains_key(field), "missing {field}");
        }
    }

    #[test]
    fn batch_schema_is_an_array() {
        let schema: Value =
            serde_json::from_str(&schema_json(SchemaType::BatchOutput).unwrap()).unwrap();
        assert_eq!(schema["type"], "array");
    }
}

use anyhow::{Context, Result};
use tracing::info;

use crate::{error::AppError, storage::db::SurrealDbClient};

pub const FTS_ANALYZER_NAME: &str = "course_en_fts_analyzer";

#[derive(Clone, Copy)]
struct FtsIndexSpec {
    index_name: &'static str,
    table: &'static str,
    field: &'static str,
}

impl FtsIndexSpec {
    fn definition(&self) -> String {
        format!(
            "DEFINE INDEX IF NOT EXISTS {index} ON TABLE {table} FIELDS {field} \
             SEARCH ANALYZER {FTS_ANALYZER_NAME} BM25;",
            index = self.index_name,
            table = self.table,
            field = self.field,
        )
    }
}

#[derive(Clone, Copy)]
struct FieldIndexSpec {
    index_name: &'static str,
    table: &'static str,
    fields: &'static str,
    unique: bool,
}

impl FieldIndexSpec {
    fn definition(&self) -> String {
        let unique = if self.unique { " UNIQUE" } else { "" };
        format!(
            "DEFINE INDEX IF NOT EXISTS {index} ON TABLE {table} FIELDS {fields}{unique};",
            index = self.index_name,
            table = self.table,
            fields = self.fields,
        )
    }
}

const fn fts_index_specs() -> [FtsIndexSpec; 1] {
    [FtsIndexSpec {
        index_name: "chunk_text_fts_idx",
        table: "chunk",
        field: "text",
    }]
}

const fn field_index_specs() -> [FieldIndexSpec; 4] {
    [
        FieldIndexSpec {
            index_name: "chunk_course_idx",
            table: "chunk",
            fields: "course_id",
            unique: false,
        },
        FieldIndexSpec {
            index_name: "chunk_content_hash_idx",
            table: "chunk",
            fields: "course_id, document_id, content_hash",
            unique: false,
        },
        FieldIndexSpec {
            index_name: "document_course_idx",
            table: "document",
            fields: "course_id",
            unique: false,
        },
        FieldIndexSpec {
            index_name: "course_owner_name_idx",
            table: "course",
            fields: "owner_id, name",
            unique: true,
        },
    ]
}

/// Define the FTS analyzer and the lookup indexes used by chunk retrieval.
/// Idempotent: safe to call multiple times.
pub async fn ensure_runtime_indexes(db: &SurrealDbClient) -> Result<(), AppError> {
    ensure_runtime_indexes_inner(db)
        .await
        .map_err(|err| AppError::InternalError(err.to_string()))
}

async fn ensure_runtime_indexes_inner(db: &SurrealDbClient) -> Result<()> {
    create_fts_analyzer(db).await?;

    for spec in fts_index_specs() {
        define_index(db, spec.definition(), spec.index_name, spec.table).await?;
    }

    for spec in field_index_specs() {
        define_index(db, spec.definition(), spec.index_name, spec.table).await?;
    }

    Ok(())
}

async fn create_fts_analyzer(db: &SurrealDbClient) -> Result<()> {
    let analyzer_query = format!(
        "DEFINE ANALYZER IF NOT EXISTS {FTS_ANALYZER_NAME}
            TOKENIZERS class
            FILTERS lowercase, ascii, snowball(english);"
    );

    let res = db
        .client
        .query(analyzer_query)
        .await
        .context("creating FTS analyzer")?;

    res.check().context("failed to create FTS analyzer")?;
    Ok(())
}

async fn define_index(
    db: &SurrealDbClient,
    definition: String,
    index_name: &str,
    table: &str,
) -> Result<()> {
    let res = db
        .client
        .query(definition)
        .await
        .with_context(|| format!("creating index {index_name} on table {table}"))?;
    res.check()
        .with_context(|| format!("index definition failed for {index_name} on {table}"))?;

    info!(index = %index_name, table = %table, "Index defined");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fts_definition_uses_shared_analyzer() {
        let definition = fts_index_specs()[0].definition();
        assert!(definition.contains("SEARCH ANALYZER course_en_fts_analyzer BM25"));
        assert!(definition.starts_with("DEFINE INDEX IF NOT EXISTS chunk_text_fts_idx"));
    }

    #[test]
    fn unique_flag_renders_only_when_set() {
        let specs = field_index_specs();
        assert!(specs[3].definition().ends_with("UNIQUE;"));
        assert!(!specs[0].definition().contains("UNIQUE"));
    }
}

use sentinel_core::config::{WorkbookAuthConfig, WorkbookBinding};
use sentinel_core::projection::{fields_minus_excluded, project_fields};
use sentinel_core::types::{ProcessedMessage, Sheet};
use tracing::{info, warn};

use crate::error::{Result, WorkbookError};
use crate::session::WorkbookSession;
use crate::sheet::WorkbookSheet;

/// Appends processed-message rows to a country's remote workbook, one of
/// two named sheets per verdict (SPEC_FULL.md §4.8). Rows are projected
/// through the global schema minus that country's workbook-exclusion list.
pub struct WorkbookSink {
    session: WorkbookSession,
}

impl WorkbookSink {
    pub fn new(auth: WorkbookAuthConfig) -> Self {
        Self {
            session: WorkbookSession::new(auth),
        }
    }

    pub async fn append(
        &self,
        binding: &WorkbookBinding,
        sheet: Sheet,
        msg: &ProcessedMessage,
        schema_fields: &[String],
        excluded_fields: &[String],
    ) -> Result<()> {
        let projected_names: Vec<&str> = fields_minus_excluded(schema_fields, excluded_fields);
        let header: Vec<String> = projected_names.iter().map(|s| s.to_string()).collect();
        let row = project_fields(msg, &header).map_err(WorkbookError::SchemaMismatch)?;

        let target = WorkbookSheet::new(&self.session, binding, sheet);
        target.append_row(&header, &row).await?;

        info!(
            country = %msg.country,
            sheet = %sheet,
            filename = %binding.filename,
            "workbook row appended"
        );
        Ok(())
    }

    /// Deletes rows whose projected `processed_at` cell predates `cutoff`
    /// from both sheets (SPEC_FULL.md §4.7's `cleanup_sink_history`; CSV is
    /// append-only and untouched by this job). `processed_at_column` is the
    /// 0-indexed position of that field within the country's projected
    /// header, as determined by its `workbook_excluded_fields` list.
    ///
    /// Rows are deleted bottom-to-top so earlier row numbers stay valid as
    /// the sheet shifts upward after each delete.
    pub async fn prune_older_than(
        &self,
        binding: &WorkbookBinding,
        schema_fields: &[String],
        excluded_fields: &[String],
        cutoff: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64> {
        let projected: Vec<&str> = fields_minus_excluded(schema_fields, excluded_fields);
        let Some(processed_at_col) = projected.iter().position(|f| *f == "processed_at") else {
            warn!(filename = %binding.filename, "processed_at excluded from workbook schema, cannot prune by age");
            return Ok(0);
        };

        let mut deleted = 0u64;
        for sheet in [Sheet::Significant, Sheet::Trivial] {
            let target = WorkbookSheet::new(&self.session, binding, sheet);
            let rows = target.read_all_rows().await?;

            let mut stale_sheet_rows: Vec<i64> = Vec::new();
            for (idx, row) in rows.iter().enumerate().skip(1) {
                let Some(cell) = row.get(processed_at_col) else { continue };
                let Ok(ts) = chrono::DateTime::parse_from_rfc3339(cell) else { continue };
                if ts.with_timezone(&chrono::Utc) < cutoff {
                    stale_sheet_rows.push((idx + 1) as i64);
                }
            }

            for sheet_row in stale_sheet_rows.into_iter().rev() {
                target.delete_row(sheet_row).await?;
                deleted += 1;
            }
        }

        info!(filename = %binding.filename, deleted, "workbook retention sweep complete");
        Ok(deleted)
    }
}

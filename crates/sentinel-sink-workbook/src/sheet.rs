use std::time::Duration;

use sentinel_core::config::WorkbookBinding;
use sentinel_core::http::shared_client;
use sentinel_core::types::Sheet;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{Result, WorkbookError};
use crate::session::WorkbookSession;

const WORKBOOK_OP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct UsedRange {
    #[serde(rename = "rowCount")]
    row_count: i64,
}

#[derive(Deserialize)]
struct UsedRangeValues {
    #[serde(rename = "rowCount")]
    row_count: i64,
    values: Vec<Vec<serde_json::Value>>,
}

/// Converts a 1-indexed column number to its spreadsheet letter(s): 1 -> A,
/// 26 -> Z, 27 -> AA.
fn column_letters(mut n: u32) -> String {
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.into_iter().rev().collect()
}

fn sheet_name<'a>(binding: &'a WorkbookBinding, sheet: Sheet) -> &'a str {
    match sheet {
        Sheet::Significant => &binding.significant_sheet,
        Sheet::Trivial => &binding.trivial_sheet,
    }
}

/// One appendable worksheet resource, addressed via the site/folder/filename
/// binding and a named sheet within it (SPEC_FULL.md §4.8: "a cloud
/// spreadsheet ... a document and two named sheets within it").
pub struct WorkbookSheet<'a> {
    session: &'a WorkbookSession,
    binding: &'a WorkbookBinding,
    sheet: Sheet,
}

impl<'a> WorkbookSheet<'a> {
    pub fn new(session: &'a WorkbookSession, binding: &'a WorkbookBinding, sheet: Sheet) -> Self {
        Self { session, binding, sheet }
    }

    fn resource_url(&self) -> String {
        format!(
            "{}/sites/{}/drive/root:/{}/{}:/workbook/worksheets('{}')",
            self.session.api_base(),
            self.binding.site,
            self.binding.folder,
            self.binding.filename,
            sheet_name(self.binding, self.sheet),
        )
    }

    /// Appends a single row (already schema-projected and in schema order),
    /// bootstrapping the header row on first write, and retrying once from
    /// session acquisition on a 401 (SPEC_FULL.md §4.8 steps 1-5).
    pub async fn append_row(&self, header: &[String], row: &[String]) -> Result<()> {
        match self.append_row_once(header, row, false).await {
            Err(WorkbookError::Http(msg)) if msg.contains("401") => {
                self.session.invalidate().await;
                self.append_row_once(header, row, true).await
            }
            other => other,
        }
    }

    async fn append_row_once(&self, header: &[String], row: &[String], force_refresh: bool) -> Result<()> {
        let token = self.session.token(force_refresh).await?;
        let next_row = self.next_free_row(&token).await?;

        if next_row == 1 {
            self.write_range(&token, 1, header).await?;
            info!(sheet = %self.sheet, "workbook sheet was empty, wrote header row");
            self.write_range(&token, 2, row).await
        } else {
            self.write_range(&token, next_row, row).await
        }
    }

    /// Asks for the used range; an empty sheet (`rowCount <= 1`, i.e. at
    /// most the implicit single empty cell) means the next write is row 1.
    async fn next_free_row(&self, token: &str) -> Result<i64> {
        let url = format!("{}/usedRange(valuesOnly=true)?$select=rowCount", self.resource_url());
        let resp = shared_client()
            .get(&url)
            .bearer_auth(token)
            .timeout(WORKBOOK_OP_TIMEOUT)
            .send()
            .await
            .map_err(|e| WorkbookError::Http(e.to_string()))?;

        if resp.status().as_u16() == 401 {
            return Err(WorkbookError::Http("401 Unauthorized".to_string()));
        }
        if !resp.status().is_success() {
            return Err(WorkbookError::SheetLookup(format!("HTTP {}", resp.status())));
        }

        let used: UsedRange = resp
            .json()
            .await
            .map_err(|e| WorkbookError::SheetLookup(format!("malformed usedRange response: {e}")))?;

        debug!(sheet = %self.sheet, row_count = used.row_count, "used range lookup");

        if used.row_count <= 1 {
            Ok(1)
        } else {
            Ok(used.row_count + 1)
        }
    }

    /// Reads every row currently in the sheet (header included at index 0),
    /// cell values coerced to strings. Used by the retention job to find
    /// rows older than the cutoff (SPEC_FULL.md §4.7's `cleanup_sink_history`).
    pub async fn read_all_rows(&self) -> Result<Vec<Vec<String>>> {
        let token = self.session.token(false).await?;
        let url = format!("{}/usedRange(valuesOnly=true)?$select=rowCount,values", self.resource_url());
        let resp = shared_client()
            .get(&url)
            .bearer_auth(&token)
            .timeout(WORKBOOK_OP_TIMEOUT)
            .send()
            .await
            .map_err(|e| WorkbookError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(WorkbookError::SheetLookup(format!("HTTP {}", resp.status())));
        }

        let used: UsedRangeValues = resp
            .json()
            .await
            .map_err(|e| WorkbookError::SheetLookup(format!("malformed usedRange response: {e}")))?;

        if used.row_count <= 1 {
            return Ok(Vec::new());
        }

        Ok(used
            .values
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| cell.as_str().map(String::from).unwrap_or_else(|| cell.to_string()))
                    .collect()
            })
            .collect())
    }

    /// Deletes a single data row (1-indexed, header excluded from the
    /// caller's accounting — `sheet_row` is the absolute sheet row number)
    /// and shifts everything below it up.
    pub async fn delete_row(&self, sheet_row: i64) -> Result<()> {
        let token = self.session.token(false).await?;
        let address = format!("A{sheet_row}:Z{sheet_row}");
        let url = format!("{}/range(address='{address}')/delete", self.resource_url());

        let resp = shared_client()
            .post(&url)
            .bearer_auth(&token)
            .json(&json!({ "shift": "Up" }))
            .timeout(WORKBOOK_OP_TIMEOUT)
            .send()
            .await
            .map_err(|e| WorkbookError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(WorkbookError::Http(format!("HTTP {}", resp.status())));
        }
        Ok(())
    }

    async fn write_range(&self, token: &str, row: i64, values: &[String]) -> Result<()> {
        let last_col = column_letters(values.len() as u32);
        let address = format!("A{row}:{last_col}{row}");
        let url = format!("{}/range(address='{address}')", self.resource_url());

        let resp = shared_client()
            .patch(&url)
            .bearer_auth(token)
            .json(&json!({ "values": [values] }))
            .timeout(WORKBOOK_OP_TIMEOUT)
            .send()
            .await
            .map_err(|e| WorkbookError::Http(e.to_string()))?;

        if resp.status().as_u16() == 401 {
            return Err(WorkbookError::Http("401 Unauthorized".to_string()));
        }
        if !resp.status().is_success() {
            return Err(WorkbookError::Http(format!("HTTP {}", resp.status())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters_wrap_past_z() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_letters(52), "AZ");
    }
}

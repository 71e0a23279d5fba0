//! Google Sheets values API as a [`TableService`].
//!
//! Searches download the worksheet's formatted values and scan them locally.
//! Row inserts are one `batchUpdate` carrying `insertDimension` and
//! `updateCells`, so a retried insert never leaves an empty row behind. Cell
//! updates use `values:batchUpdate` with `USER_ENTERED` input.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use clinisync_core::settings::SheetSettings;
use clinisync_core::types::{CellUpdate, TableCoordinate};
use clinisync_sync::{TableError, TableService};

use crate::grid;

pub struct SheetsTable {
    agent: ureq::Agent,
    base_url: String,
    spreadsheet_key: String,
    worksheet: String,
    token: String,
    sheet_id: Option<i64>,
}

impl SheetsTable {
    pub fn new(settings: &SheetSettings) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(60))
                .build(),
            base_url: settings.base_url.trim_end_matches('/').to_owned(),
            spreadsheet_key: settings.spreadsheet_key.clone(),
            worksheet: settings.worksheet_name.clone(),
            token: settings.access_token.clone(),
            sheet_id: None,
        }
    }

    fn spreadsheet_url(&self) -> String {
        format!("{}/spreadsheets/{}", self.base_url, self.spreadsheet_key)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn values(&self) -> Result<Vec<Vec<String>>, TableError> {
        let url = format!("{}/values:batchGet", self.spreadsheet_url());
        let body: BatchGet = self
            .agent
            .get(&url)
            .set("Authorization", &self.bearer())
            .query("ranges", &grid::sheet_ref(&self.worksheet))
            .query("valueRenderOption", "FORMATTED_VALUE")
            .call()
            .map_err(table_err)?
            .into_json()
            .map_err(|e| TableError::Decode(e.to_string()))?;
        Ok(body
            .value_ranges
            .into_iter()
            .next()
            .map(|range| range.values)
            .unwrap_or_default())
    }

    fn post(&self, url: &str, body: Value) -> Result<(), TableError> {
        self.agent
            .post(url)
            .set("Authorization", &self.bearer())
            .send_json(body)
            .map_err(table_err)?;
        Ok(())
    }

    fn sheet_id(&mut self) -> Result<i64, TableError> {
        if let Some(id) = self.sheet_id {
            return Ok(id);
        }
        let url = self.spreadsheet_url();
        let meta: Spreadsheet = self
            .agent
            .get(&url)
            .set("Authorization", &self.bearer())
            .query("fields", "sheets.properties(sheetId,title)")
            .call()
            .map_err(table_err)?
            .into_json()
            .map_err(|e| TableError::Decode(e.to_string()))?;
        let id = meta
            .sheets
            .into_iter()
            .map(|s| s.properties)
            .find(|p| p.title == self.worksheet)
            .map(|p| p.sheet_id)
            .ok_or_else(|| TableError::Status {
                status: 404,
                message: format!("worksheet '{}' not found", self.worksheet),
            })?;
        self.sheet_id = Some(id);
        Ok(id)
    }
}

impl TableService for SheetsTable {
    fn find(
        &mut self,
        value: &str,
        column: Option<u32>,
    ) -> Result<Option<TableCoordinate>, TableError> {
        Ok(grid::find_first(&self.values()?, value, column))
    }

    fn find_last(&mut self, value: &str) -> Result<Option<TableCoordinate>, TableError> {
        Ok(grid::find_last(&self.values()?, value))
    }

    /// Position defaults to row 1.
    fn insert_row(&mut self, values: &[String], position: Option<u32>) -> Result<(), TableError> {
        let sheet_id = self.sheet_id()?;
        let start = position.unwrap_or(1).saturating_sub(1);
        let body = insert_row_request(sheet_id, start, values);
        self.post(&format!("{}:batchUpdate", self.spreadsheet_url()), body)
    }

    fn update_cells(&mut self, cells: &[CellUpdate]) -> Result<(), TableError> {
        let body = update_cells_request(&self.worksheet, cells);
        self.post(&format!("{}/values:batchUpdate", self.spreadsheet_url()), body)
    }
}

fn insert_row_request(sheet_id: i64, start: u32, values: &[String]) -> Value {
    let cells: Vec<Value> = values.iter().map(|v| cell_value(v)).collect();
    json!({
        "requests": [
            {
                "insertDimension": {
                    "range": {
                        "sheetId": sheet_id,
                        "dimension": "ROWS",
                        "startIndex": start,
                        "endIndex": start + 1
                    },
                    "inheritFromBefore": start > 0
                }
            },
            {
                "updateCells": {
                    "start": { "sheetId": sheet_id, "rowIndex": start, "columnIndex": 0 },
                    "rows": [ { "values": cells } ],
                    "fields": "userEnteredValue"
                }
            }
        ]
    })
}

fn update_cells_request(worksheet: &str, cells: &[CellUpdate]) -> Value {
    let data: Vec<Value> = cells
        .iter()
        .map(|cell| {
            json!({
                "range": grid::a1(worksheet, cell.coordinate()),
                "values": [[cell.value]]
            })
        })
        .collect();
    json!({ "valueInputOption": "USER_ENTERED", "data": data })
}

// Numbers are sent as numbers so sums in the sheet keep working. Text that
// would not read back identically, such as a code with leading zeros, stays text.
fn cell_value(raw: &str) -> Value {
    if raw.is_empty() {
        return json!({});
    }
    match raw.parse::<i64>() {
        Ok(n) if n.to_string() == raw => json!({ "userEnteredValue": { "numberValue": n } }),
        _ => json!({ "userEnteredValue": { "stringValue": raw } }),
    }
}

fn table_err(err: ureq::Error) -> TableError {
    match err {
        ureq::Error::Status(status, response) => TableError::Status {
            status,
            message: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => TableError::Transport(transport.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct BatchGet {
    #[serde(rename = "valueRanges", default)]
    value_ranges: Vec<ValueRange>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
struct Sheet {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    #[serde(rename = "sheetId")]
    sheet_id: i64,
    title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_request_places_row_before_position() {
        let body = insert_row_request(7, 7, &["".into(), "Petrov Ivan".into(), "12".into()]);
        let range = &body["requests"][0]["insertDimension"]["range"];
        assert_eq!(range["startIndex"], 7);
        assert_eq!(range["endIndex"], 8);
        assert_eq!(body["requests"][0]["insertDimension"]["inheritFromBefore"], true);

        let values = &body["requests"][1]["updateCells"]["rows"][0]["values"];
        assert_eq!(values[0], json!({}));
        assert_eq!(values[1]["userEnteredValue"]["stringValue"], "Petrov Ivan");
        assert_eq!(values[2]["userEnteredValue"]["numberValue"], 12);
    }

    #[test]
    fn codes_with_leading_zeros_stay_text() {
        assert_eq!(
            cell_value("007"),
            json!({ "userEnteredValue": { "stringValue": "007" } })
        );
        assert_eq!(
            cell_value("+5"),
            json!({ "userEnteredValue": { "stringValue": "+5" } })
        );
        assert_eq!(cell_value("-20"), json!({ "userEnteredValue": { "numberValue": -20 } }));
        assert_eq!(cell_value(""), json!({}));
    }

    #[test]
    fn first_row_insert_does_not_inherit() {
        let body = insert_row_request(0, 0, &[]);
        assert_eq!(body["requests"][0]["insertDimension"]["inheritFromBefore"], false);
    }

    #[test]
    fn update_request_uses_a1_ranges() {
        let body = update_cells_request("Отчёт", &[CellUpdate::new(8, 79, "150")]);
        assert_eq!(body["valueInputOption"], "USER_ENTERED");
        assert_eq!(body["data"][0]["range"], "'Отчёт'!CA8");
        assert_eq!(body["data"][0]["values"][0][0], "150");
    }

    #[test]
    fn batch_get_without_values_is_empty() {
        let parsed: BatchGet =
            serde_json::from_value(json!({"valueRanges": [{"range": "'S'!A1:Z9"}]})).unwrap();
        assert!(parsed.value_ranges[0].values.is_empty());
    }
}

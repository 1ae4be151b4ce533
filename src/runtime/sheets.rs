use async_trait::async_trait;
use anyhow::{Result, anyhow, bail};
use indexmap::IndexMap;
use reqwest::{Client, Url};
use serde_json::{Value, json};
use tracing::{info, warn};
use crate::error::StoreError;
use crate::runtime::storage::{Task, TaskStore, is_pending};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4";

/// Google Sheets (v4 REST) 任务表
pub struct SheetsStore {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    worksheet: String,
    token: String,
}

impl SheetsStore {
    /// Connects to the spreadsheet behind `sheet_url`; without a worksheet name the first tab is used.
    pub async fn connect(sheet_url: &str, worksheet: Option<String>, token: String) -> Result<Self> {
        Self::connect_with_base(SHEETS_API, sheet_url, worksheet, token).await
    }

    pub async fn connect_with_base(base_url: &str, sheet_url: &str, worksheet: Option<String>, token: String) -> Result<Self> {
        let spreadsheet_id = spreadsheet_id_from_url(sheet_url)
            .ok_or_else(|| anyhow!("Not a spreadsheet URL: {}", sheet_url))?;

        let mut store = Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id,
            worksheet: worksheet.clone().unwrap_or_default(),
            token,
        };

        let (title, tabs) = store.metadata().await?;
        match worksheet {
            Some(name) if !tabs.contains(&name) => bail!(StoreError::WorksheetNotFound(name)),
            Some(_) => {}
            None => {
                store.worksheet = tabs
                    .first()
                    .cloned()
                    .ok_or_else(|| anyhow!("Spreadsheet has no worksheets"))?;
            }
        }
        info!(spreadsheet = %title, worksheet = %store.worksheet, "Connected to sheet");
        Ok(store)
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| anyhow!("Invalid base URL: {}", self.base_url))?;
            path.push("spreadsheets").push(&self.spreadsheet_id);
            for s in segments {
                path.push(s);
            }
        }
        Ok(url)
    }

    async fn metadata(&self) -> Result<(String, Vec<String>)> {
        let mut url = self.url(&[])?;
        url.query_pairs_mut().append_pair("fields", "properties.title,sheets.properties.title");

        let resp = self.client.get(url).bearer_auth(&self.token).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            bail!("Error connecting to sheet: {} {}", status, text);
        }
        let body: Value = serde_json::from_str(&text)?;

        let title = body.pointer("/properties/title").and_then(|t| t.as_str()).unwrap_or("").to_string();
        let tabs = body
            .get("sheets")
            .and_then(|s| s.as_array())
            .map(|sheets| {
                sheets
                    .iter()
                    .filter_map(|s| s.pointer("/properties/title").and_then(|t| t.as_str()).map(|t| t.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        Ok((title, tabs))
    }

    /// All rows of a tab; `None` if the tab does not exist.
    async fn get_values(&self, tab: &str) -> Result<Option<Vec<Vec<String>>>> {
        let url = self.url(&["values", &quote_tab(tab)])?;
        let resp = self.client.get(url).bearer_auth(&self.token).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;

        let values = values_from_response(status, &body)?;
        if values.is_none() {
            warn!(tab = %tab, "Tab not found");
        }
        Ok(values)
    }

    async fn get_records(&self, tab: &str) -> Result<Option<Vec<IndexMap<String, String>>>> {
        Ok(self.get_values(tab).await?.map(|rows| records_from_rows(&rows)))
    }
}

#[async_trait]
impl TaskStore for SheetsStore {
    async fn list_pending(&self) -> Result<Vec<Task>> {
        let records = self
            .get_records(&self.worksheet)
            .await?
            .ok_or_else(|| StoreError::WorksheetNotFound(self.worksheet.clone()))?;

        Ok(records
            .iter()
            .enumerate()
            .map(|(i, record)| Task::from_record(i + 2, record))
            .filter(|task| is_pending(&task.status))
            .collect())
    }

    async fn get_key_values(&self, tab: &str) -> Result<Option<Vec<(String, String)>>> {
        let records = match self.get_records(tab).await? {
            Some(r) => r,
            None => return Ok(None),
        };
        Ok(Some(
            records
                .into_iter()
                .filter_map(|r| {
                    let key = r.get("Key").cloned().unwrap_or_default();
                    if key.is_empty() {
                        return None;
                    }
                    Some((key, r.get("Value").cloned().unwrap_or_default()))
                })
                .collect(),
        ))
    }

    async fn write_cell(&self, row: usize, column: usize, value: &str) -> Result<(), StoreError> {
        let fail = |reason: String| StoreError::Write { row, column, reason };

        let range = format!("{}!{}{}", quote_tab(&self.worksheet), column_letter(column), row);
        let mut url = self.url(&["values", &range]).map_err(|e| fail(e.to_string()))?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        let resp = self
            .client
            .put(url)
            .bearer_auth(&self.token)
            .json(&json!({ "range": range, "values": [[value]] }))
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(fail(format!("{} {}", status, text)));
        }
        Ok(())
    }
}

/// `https://docs.google.com/spreadsheets/d/<id>/edit#gid=0` -> `<id>`
pub fn spreadsheet_id_from_url(url: &str) -> Option<String> {
    let rest = url.split("/spreadsheets/d/").nth(1)?;
    let id: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if id.is_empty() { None } else { Some(id) }
}

/// 1 -> A, 12 -> L, 27 -> AA
pub fn column_letter(mut ordinal: usize) -> String {
    let mut letters = Vec::new();
    while ordinal > 0 {
        let rem = (ordinal - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        ordinal = (ordinal - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn quote_tab(tab: &str) -> String {
    format!("'{}'", tab.replace('\'', "''"))
}

/// Interprets a `values.get` response. 400 / 404 mean the tab does not exist,
/// whatever the body holds.
pub fn values_from_response(status: u16, body: &str) -> Result<Option<Vec<Vec<String>>>> {
    if status == 400 || status == 404 {
        return Ok(None);
    }
    if !(200..300).contains(&status) {
        bail!(StoreError::Request(format!("{} {}", status, body)));
    }
    let value: Value = serde_json::from_str(body)?;
    Ok(Some(parse_values(&value)))
}

fn parse_values(body: &Value) -> Vec<Vec<String>> {
    body.get("values")
        .and_then(|v| v.as_array())
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    row.as_array()
                        .map(|cells| cells.iter().map(cell_text).collect())
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default()
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// First row is the header; short rows are padded with empty cells.
pub fn records_from_rows(rows: &[Vec<String>]) -> Vec<IndexMap<String, String>> {
    let Some((header, body)) = rows.split_first() else {
        return Vec::new();
    };
    body.iter()
        .map(|row| {
            header
                .iter()
                .enumerate()
                .map(|(i, h)| (h.clone(), row.get(i).cloned().unwrap_or_default()))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spreadsheet_id_from_url() {
        assert_eq!(
            spreadsheet_id_from_url("https://docs.google.com/spreadsheets/d/1AbC-_x9/edit#gid=0"),
            Some("1AbC-_x9".to_string())
        );
        assert_eq!(spreadsheet_id_from_url("https://example.com/"), None);
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(12), "L");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
    }

    #[test]
    fn test_records_pad_short_rows() {
        let rows = vec![
            vec!["Status".to_string(), "MainKW".to_string(), "Slug".to_string()],
            vec!["".to_string(), "widgets".to_string()],
        ];
        let records = records_from_rows(&rows);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["MainKW"], "widgets");
        assert_eq!(records[0]["Slug"], "");
    }

    #[test]
    fn test_missing_tab_with_html_body() {
        let body = "<!DOCTYPE html><html><body>Not Found</body></html>";
        assert_eq!(values_from_response(404, body).unwrap(), None);
        assert_eq!(values_from_response(400, "").unwrap(), None);
    }

    #[test]
    fn test_values_response() {
        let body = r#"{"range": "'Default'!A1:B2", "values": [["Key", "Value"], ["Initial", 3]]}"#;
        let rows = values_from_response(200, body).unwrap().unwrap();
        assert_eq!(rows[1], vec!["Initial".to_string(), "3".to_string()]);

        assert!(values_from_response(503, "backend unavailable").is_err());
    }

    #[test]
    fn test_quote_tab_escapes_quotes() {
        assert_eq!(quote_tab("共通ルール"), "'共通ルール'");
        assert_eq!(quote_tab("it's"), "'it''s'");
    }
}

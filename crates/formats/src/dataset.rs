use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Encoding of a remote choropleth payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    Json,
    Csv,
}

impl std::str::FromStr for DataType {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(DataType::Json),
            "csv" => Ok(DataType::Csv),
            other => Err(DatasetError::UnknownDataType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DatasetError {
    UnknownDataType(String),
    InvalidJson(String),
    NotAnObject,
    MissingIdColumn,
    InvalidRow { line: usize, reason: String },
}

impl std::fmt::Display for DatasetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetError::UnknownDataType(t) => write!(f, "unknown data type: {t}"),
            DatasetError::InvalidJson(e) => write!(f, "invalid data JSON: {e}"),
            DatasetError::NotAnObject => write!(f, "expected an object keyed by region id"),
            DatasetError::MissingIdColumn => write!(f, "CSV header has no id column"),
            DatasetError::InvalidRow { line, reason } => {
                write!(f, "invalid CSV row at line {line}: {reason}")
            }
        }
    }
}

impl std::error::Error for DatasetError {}

/// Keyed choropleth data: region id to color string or datum object.
pub type KeyedData = Map<String, Value>;

/// Parses a payload into keyed data. JSON must be an object keyed by id;
/// CSV rows become objects keyed by their `id` column.
pub fn parse_payload(text: &str, data_type: DataType) -> Result<KeyedData, DatasetError> {
    match data_type {
        DataType::Json => {
            let value: Value =
                serde_json::from_str(text).map_err(|e| DatasetError::InvalidJson(e.to_string()))?;
            match value {
                Value::Object(map) => Ok(map),
                _ => Err(DatasetError::NotAnObject),
            }
        }
        DataType::Csv => parse_csv(text),
    }
}

/// Reads CSV with a header row into objects keyed by their `id` column.
/// All cell values stay strings.
pub fn parse_csv(text: &str) -> Result<KeyedData, DatasetError> {
    if text.trim().is_empty() {
        return Ok(KeyedData::new());
    }
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(text.as_bytes());
    let header: Vec<String> = reader
        .headers()
        .map_err(row_error)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    let id_col = header
        .iter()
        .position(|h| h == "id")
        .ok_or(DatasetError::MissingIdColumn)?;

    let mut out = KeyedData::new();
    for record in reader.records() {
        let record = record.map_err(row_error)?;
        let Some(id) = record.get(id_col) else {
            continue;
        };
        let row: Map<String, Value> = header
            .iter()
            .zip(record.iter())
            .map(|(name, value)| (name.clone(), Value::String(value.to_string())))
            .collect();
        out.insert(id.to_string(), Value::Object(row));
    }
    tracing::debug!(rows = out.len(), "parsed csv payload");
    Ok(out)
}

fn row_error(e: csv::Error) -> DatasetError {
    let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
    let reason = match e.kind() {
        csv::ErrorKind::UnequalLengths { expected_len, len, .. } => {
            format!("expected {expected_len} fields, found {len}")
        }
        _ => e.to_string(),
    };
    DatasetError::InvalidRow { line, reason }
}

#[cfg(test)]
mod tests {
    use super::{DataType, DatasetError, parse_payload};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn json_object_passes_through() {
        let data = parse_payload(r##"{"USA": {"fillKey": "A"}, "CAN": "#fff"}"##, DataType::Json).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data["CAN"], json!("#fff"));
        assert_eq!(
            parse_payload("[1, 2]", DataType::Json).unwrap_err(),
            DatasetError::NotAnObject
        );
    }

    #[test]
    fn csv_rows_keyed_by_id() {
        let text = "id,fillKey,label\r\nUSA,HIGH,\"United States, of America\"\nCAN,LOW,\"say \"\"eh\"\"\"\n";
        let data = parse_payload(text, DataType::Csv).unwrap();
        assert_eq!(
            serde_json::Value::Object(data),
            json!({
                "USA": {"id": "USA", "fillKey": "HIGH", "label": "United States, of America"},
                "CAN": {"id": "CAN", "fillKey": "LOW", "label": "say \"eh\""}
            })
        );
    }

    #[test]
    fn csv_header_may_start_with_bom() {
        let data = parse_payload("\u{feff}id,fillKey\nUSA,HIGH\n\nCAN,LOW\n", DataType::Csv).unwrap();
        assert_eq!(data["USA"], json!({"id": "USA", "fillKey": "HIGH"}));
        assert_eq!(data.len(), 2);
        assert!(parse_payload("  \n", DataType::Csv).unwrap().is_empty());
    }

    #[test]
    fn csv_errors() {
        assert_eq!(
            parse_payload("name,value\nx,1\n", DataType::Csv).unwrap_err(),
            DatasetError::MissingIdColumn
        );
        assert!(matches!(
            parse_payload("id,v\nA,1,2\n", DataType::Csv),
            Err(DatasetError::InvalidRow { line: 2, .. })
        ));
        assert_eq!("CSV".parse::<DataType>().unwrap(), DataType::Csv);
        assert!("xml".parse::<DataType>().is_err());
    }
}

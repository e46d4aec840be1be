use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("No statement result in response")]
    NoResult,
    #[error("Query failed: {message}")]
    QueryFailed { message: String },
    #[error("Malformed series in result: {series:?}")]
    MalformedSeries { series: Value },
}

/// One row of a query result, keyed by column name. Tags of the series the row belongs to are
/// included as columns.
pub type Row = Map<String, Value>;

/// Flatten the first statement result of an InfluxDB JSON response into rows.
///
/// A statement that matched nothing has no `series` and yields no rows.
pub(crate) fn load_rows(results: &[Value]) -> Result<Vec<Row>, LoadError> {
    let result = results.first().ok_or(LoadError::NoResult)?;

    if let Some(error) = result.get("error").and_then(Value::as_str) {
        return Err(LoadError::QueryFailed {
            message: error.to_string(),
        });
    }

    let Some(series) = result.get("series").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let mut rows = Vec::new();
    for s in series {
        let malformed = || LoadError::MalformedSeries { series: s.clone() };

        let columns = s
            .get("columns")
            .and_then(Value::as_array)
            .ok_or_else(malformed)?;
        let values = s
            .get("values")
            .and_then(Value::as_array)
            .ok_or_else(malformed)?;
        let tags = s.get("tags").and_then(Value::as_object);

        for value in values {
            let value = value.as_array().ok_or_else(malformed)?;

            let mut row = Row::new();
            if let Some(tags) = tags {
                row.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            for (column, value) in columns.iter().zip(value.iter()) {
                let column = column.as_str().ok_or_else(malformed)?;
                row.insert(column.to_string(), value.clone());
            }
            rows.push(row);
        }
    }

    Ok(rows)
}

pub(crate) fn row_f64(row: &Row, column: &str) -> Option<f64> {
    row.get(column).and_then(Value::as_f64)
}

pub(crate) fn row_u64(row: &Row, column: &str) -> Option<u64> {
    let value = row.get(column)?;
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
}

pub(crate) fn row_str<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column).and_then(Value::as_str)
}

//! Normalization of the two result encodings the embedded engine produces.
//!
//! Most platforms return a flat array of row objects. One native platform
//! returns a column-descriptor element first (a `columns` array) followed by
//! positional `values` arrays. Both are decoded here, immediately at the
//! adapter boundary; nothing past this module ever sees the second shape.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::AppError;

pub type JsonMap = Map<String, Value>;

#[derive(Debug, Error)]
pub enum ShapeError {
    #[error("column descriptor is not an array of strings")]
    BadDescriptor,
    #[error("result element {index} is not a row object")]
    BadRow { index: usize },
}

impl From<ShapeError> for AppError {
    fn from(err: ShapeError) -> Self {
        AppError::new("DB/RESULT_SHAPE", err.to_string())
    }
}

/// The two encodings a raw query result can arrive in.
#[derive(Debug, Clone, PartialEq)]
pub enum RawQueryResult {
    /// Flat array of row objects.
    Rows(Vec<JsonMap>),
    /// Column descriptor plus positional value arrays.
    Columnar {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
}

impl RawQueryResult {
    /// Detect the encoding of a raw result payload.
    ///
    /// The columnar shape is recognized by a `columns` marker on the first
    /// element; anything else must be a plain array of objects.
    pub fn from_values(values: Vec<Value>) -> Result<Self, ShapeError> {
        let is_columnar = values
            .first()
            .and_then(Value::as_object)
            .is_some_and(|obj| obj.contains_key("columns"));
        if is_columnar {
            Self::parse_columnar(values)
        } else {
            let mut rows = Vec::with_capacity(values.len());
            for (index, value) in values.into_iter().enumerate() {
                match value {
                    Value::Object(map) => rows.push(map),
                    _ => return Err(ShapeError::BadRow { index }),
                }
            }
            Ok(RawQueryResult::Rows(rows))
        }
    }

    fn parse_columnar(values: Vec<Value>) -> Result<Self, ShapeError> {
        let mut iter = values.into_iter();
        let descriptor = iter.next().expect("caller checked first element");
        let columns = descriptor
            .as_object()
            .and_then(|obj| obj.get("columns"))
            .and_then(Value::as_array)
            .ok_or(ShapeError::BadDescriptor)?
            .iter()
            .map(|v| v.as_str().map(str::to_owned).ok_or(ShapeError::BadDescriptor))
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = Vec::new();
        for (index, element) in iter.enumerate() {
            match element {
                // Positional values for the descriptor's columns.
                Value::Object(ref obj) if obj.contains_key("values") => {
                    let positional = obj
                        .get("values")
                        .and_then(Value::as_array)
                        .ok_or(ShapeError::BadRow { index: index + 1 })?;
                    rows.push(positional.clone());
                }
                // The platform occasionally mixes fully-formed row objects in.
                Value::Object(map) => {
                    let positional = columns
                        .iter()
                        .map(|c| map.get(c).cloned().unwrap_or(Value::Null))
                        .collect();
                    rows.push(positional);
                }
                _ => return Err(ShapeError::BadRow { index: index + 1 }),
            }
        }

        Ok(RawQueryResult::Columnar { columns, rows })
    }

    /// Collapse either encoding into a flat array of row objects.
    pub fn normalize(self) -> Vec<JsonMap> {
        match self {
            RawQueryResult::Rows(rows) => rows,
            RawQueryResult::Columnar { columns, rows } => rows
                .into_iter()
                .map(|values| {
                    let mut map = JsonMap::new();
                    for (column, value) in columns.iter().zip(values) {
                        map.insert(column.clone(), value);
                    }
                    // Values beyond the descriptor's width are dropped.
                    map
                })
                .collect(),
        }
    }
}

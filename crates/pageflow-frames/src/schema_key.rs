use std::fmt;

use crate::frame::{FieldType, Frame, Labels};

/// Shape of a single column as seen by [`SchemaKey`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColumnKey {
    pub name: String,
    pub field_type: FieldType,
    /// Empty label sets are stored as `None`.
    pub labels: Option<Labels>,
}

/// Structural fingerprint of a frame: ref id plus the name, type and labels
/// of every column, in order. Row values never contribute.
///
/// Equality is structural, so column names containing separator characters
/// cannot collide the way a concatenated string key could.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SchemaKey {
    ref_id: Option<String>,
    columns: Vec<ColumnKey>,
}

impl SchemaKey {
    pub fn of(frame: &Frame) -> Self {
        let columns = frame
            .fields
            .iter()
            .map(|field| ColumnKey {
                name: field.name.clone(),
                field_type: field.field_type,
                labels: field.labels.clone().filter(|labels| !labels.is_empty()),
            })
            .collect();
        Self {
            ref_id: frame.ref_id.clone(),
            columns,
        }
    }

    pub fn ref_id(&self) -> Option<&str> {
        self.ref_id.as_deref()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[ColumnKey] {
        &self.columns
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.ref_id.as_deref().unwrap_or("-"),
            self.columns.len()
        )?;
        for column in &self.columns {
            write!(f, " {}:{}", column.name, column.field_type.as_str())?;
            if let Some(labels) = &column.labels {
                let rendered: Vec<String> =
                    labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
                write!(f, "{{{}}}", rendered.join(","))?;
            }
        }
        Ok(())
    }
}

use libsql::Row;
use shared::{error::CommonError, primitives::WrappedChronoDateTime};

use crate::logic::{environment::Environment, value::Value};

fn timestamp_column(row: &Row, idx: i32) -> Result<WrappedChronoDateTime, CommonError> {
    let raw = row.get::<String>(idx)?;
    Ok(WrappedChronoDateTime::try_from(raw)?)
}

// Column order matches ENVIRONMENT_COLUMNS
impl TryFrom<Row> for Environment {
    type Error = CommonError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        Ok(Environment {
            id: row.get::<i64>(0)?,
            name: row.get::<String>(1)?,
            created_at: timestamp_column(&row, 2)?,
            updated_at: timestamp_column(&row, 3)?,
        })
    }
}

// Column order matches VALUE_COLUMNS
impl TryFrom<Row> for Value {
    type Error = CommonError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        Ok(Value {
            id: row.get::<i64>(0)?,
            environment_id: row.get::<i64>(1)?,
            key: row.get::<String>(2)?,
            value: row.get::<String>(3)?,
            created_at: timestamp_column(&row, 4)?,
            updated_at: timestamp_column(&row, 5)?,
        })
    }
}

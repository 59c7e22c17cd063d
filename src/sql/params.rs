//! Convert serde_json::Value to values that sqlx can bind.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::{Database, Type};

/// A value that can be bound to a PostgreSQL query. Converts from serde_json::Value.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Json(Value),
}

impl PgBindValue {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::Bool(b) => PgBindValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PgBindValue::I64(i),
                None => PgBindValue::F64(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => PgBindValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => PgBindValue::Json(v.clone()),
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            PgBindValue::Null => IsNull::Yes,
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::String(s) => <&str as Encode<Postgres>>::encode_by_ref(&s.as_str(), buf)?,
            PgBindValue::Json(v) => <Value as Encode<Postgres>>::encode_by_ref(v, buf)?,
        })
    }

    /// Declare each value with its own wire type; placeholders carry the column cast.
    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            PgBindValue::Null | PgBindValue::String(_) => <str as Type<Postgres>>::type_info(),
            PgBindValue::Bool(_) => <bool as Type<Postgres>>::type_info(),
            PgBindValue::I64(_) => <i64 as Type<Postgres>>::type_info(),
            PgBindValue::F64(_) => <f64 as Type<Postgres>>::type_info(),
            PgBindValue::Json(_) => <Value as Type<Postgres>>::type_info(),
        })
    }
}

impl Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        <str as Type<Postgres>>::type_info()
    }
}

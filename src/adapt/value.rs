// ABOUTME: FieldValue - the scalar value carried by raw and adapted records
// ABOUTME: Binds values as query parameters according to the target column type

use std::error::Error;
use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, BytesMut};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use tokio_postgres::types::{to_sql_checked, IsNull, Kind, ToSql, Type};

type BindResult = Result<IsNull, Box<dyn Error + Sync + Send>>;

/// A single field value produced by a source.
///
/// Sources only produce scalars; `Json` carries the nested arrays/objects a
/// cloud-store row may still contain so they reach json/jsonb columns intact.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Json(JsonValue),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<JsonValue> for FieldValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Self::Text(s),
            other => Self::Json(other),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        JsonValue::deserialize(deserializer).map(Self::from)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => write!(f, "'{}'", s),
            Self::Json(v) => write!(f, "{}", v),
        }
    }
}

// Values are not coerced before the write. Binding follows what the server
// would do with a literal of the value: text is parsed by the column type,
// and anything unrepresentable fails that record's statement.
impl ToSql for FieldValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> BindResult {
        if self.is_null() {
            return Ok(IsNull::Yes);
        }
        match ty.kind() {
            // A domain value travels in its base type's format
            Kind::Domain(base) => return self.to_sql(base, out),
            Kind::Array(_) => return bind_array(self, ty, out),
            _ => {}
        }

        match self {
            Self::Null => Ok(IsNull::Yes),
            Self::Bool(b) => bind_bool(*b, ty, out),
            Self::Integer(i) => bind_integer(*i, ty, out),
            Self::Float(x) => bind_float(*x, ty, out),
            Self::Text(s) => bind_text(s, ty, out),
            Self::Json(v) => bind_json(v, ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn is_text_type(ty: &Type) -> bool {
    <&str as ToSql>::accepts(ty)
}

fn mismatch(kind: &str, ty: &Type) -> Box<dyn Error + Sync + Send> {
    format!("cannot bind {} value to column of type {}", kind, ty).into()
}

fn bind_bool(value: bool, ty: &Type, out: &mut BytesMut) -> BindResult {
    match *ty {
        Type::BOOL => value.to_sql(ty, out),
        Type::JSON | Type::JSONB => JsonValue::Bool(value).to_sql(ty, out),
        _ if is_text_type(ty) => value.to_string().as_str().to_sql(ty, out),
        _ => Err(mismatch("boolean", ty)),
    }
}

fn bind_integer(value: i64, ty: &Type, out: &mut BytesMut) -> BindResult {
    match *ty {
        Type::INT2 => i16::try_from(value)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(value)?.to_sql(ty, out),
        Type::INT8 => value.to_sql(ty, out),
        Type::FLOAT4 => (value as f32).to_sql(ty, out),
        Type::FLOAT8 => (value as f64).to_sql(ty, out),
        Type::NUMERIC => Decimal::from(value).to_sql(ty, out),
        Type::JSON | Type::JSONB => JsonValue::from(value).to_sql(ty, out),
        _ if is_text_type(ty) => value.to_string().as_str().to_sql(ty, out),
        _ => Err(mismatch("integer", ty)),
    }
}

fn bind_float(value: f64, ty: &Type, out: &mut BytesMut) -> BindResult {
    match *ty {
        Type::FLOAT4 => (value as f32).to_sql(ty, out),
        Type::FLOAT8 => value.to_sql(ty, out),
        Type::NUMERIC => Decimal::try_from(value)?.to_sql(ty, out),
        Type::JSON | Type::JSONB => JsonValue::from(value).to_sql(ty, out),
        _ if is_text_type(ty) => value.to_string().as_str().to_sql(ty, out),
        _ => Err(mismatch("float", ty)),
    }
}

fn bind_text(value: &str, ty: &Type, out: &mut BytesMut) -> BindResult {
    if is_text_type(ty) {
        return value.to_sql(ty, out);
    }
    if let Kind::Enum(_) = ty.kind() {
        // Enum labels travel as their text in the binary protocol
        out.extend_from_slice(value.as_bytes());
        return Ok(IsNull::No);
    }

    let trimmed = value.trim();
    match *ty {
        Type::BOOL => parse_bool_literal(trimmed)
            .ok_or_else(|| format!("invalid input for type boolean: '{}'", value))?
            .to_sql(ty, out),
        Type::INT2 => trimmed.parse::<i16>()?.to_sql(ty, out),
        Type::INT4 => trimmed.parse::<i32>()?.to_sql(ty, out),
        Type::INT8 => trimmed.parse::<i64>()?.to_sql(ty, out),
        Type::FLOAT4 => trimmed.parse::<f32>()?.to_sql(ty, out),
        Type::FLOAT8 => trimmed.parse::<f64>()?.to_sql(ty, out),
        Type::NUMERIC => Decimal::from_str(trimmed)?.to_sql(ty, out),
        Type::UUID => uuid::Uuid::parse_str(trimmed)?.to_sql(ty, out),
        Type::DATE => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")?.to_sql(ty, out),
        Type::TIME => parse_time(trimmed)
            .ok_or_else(|| format!("invalid input for type time: '{}'", value))?
            .to_sql(ty, out),
        Type::TIMETZ => {
            let (time, offset_secs) = parse_timetz(trimmed)
                .ok_or_else(|| format!("invalid input for type time with time zone: '{}'", value))?;
            write_timetz(time, offset_secs, out);
            Ok(IsNull::No)
        }
        Type::TIMESTAMP => parse_naive_timestamp(trimmed)
            .ok_or_else(|| format!("invalid input for type timestamp: '{}'", value))?
            .to_sql(ty, out),
        Type::TIMESTAMPTZ => parse_timestamptz(trimmed)
            .ok_or_else(|| format!("invalid input for type timestamptz: '{}'", value))?
            .to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::from_str::<JsonValue>(value)
            .unwrap_or_else(|_| JsonValue::String(value.to_string()))
            .to_sql(ty, out),
        _ => Err(mismatch("text", ty)),
    }
}

fn bind_json(value: &JsonValue, ty: &Type, out: &mut BytesMut) -> BindResult {
    match *ty {
        Type::JSON | Type::JSONB => value.to_sql(ty, out),
        _ if is_text_type(ty) => value.to_string().as_str().to_sql(ty, out),
        _ => Err(mismatch("json", ty)),
    }
}

/// JSON arrays (or text holding one) bind element-wise to array columns.
fn bind_array(value: &FieldValue, ty: &Type, out: &mut BytesMut) -> BindResult {
    let items = match value {
        FieldValue::Json(JsonValue::Array(items)) => items.clone(),
        FieldValue::Text(text) => match serde_json::from_str::<JsonValue>(text) {
            Ok(JsonValue::Array(items)) => items,
            _ => return Err(format!("invalid input for type {}: '{}'", ty, text).into()),
        },
        _ => return Err(mismatch("scalar", ty)),
    };
    let elements: Vec<FieldValue> = items.into_iter().map(FieldValue::from).collect();
    elements.to_sql(ty, out)
}

/// Boolean literal spellings PostgreSQL accepts on input.
fn parse_bool_literal(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Some(true),
        "f" | "false" | "n" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    ["%H:%M:%S%.f", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(value, fmt).ok())
}

/// `10:15:00-03`, `10:15+05:30` -> time and UTC offset in seconds.
/// Without an offset the time is taken as UTC.
fn parse_timetz(value: &str) -> Option<(NaiveTime, i32)> {
    let Some(sign_at) = value.rfind(['+', '-']) else {
        return parse_time(value).map(|time| (time, 0));
    };
    let time = parse_time(value[..sign_at].trim())?;
    let sign = if value[sign_at..].starts_with('-') { -1 } else { 1 };

    let offset = &value[sign_at + 1..];
    let (hours, minutes) = match offset.split_once(':') {
        Some((h, m)) => (h, m),
        None if offset.len() == 4 => offset.split_at(2),
        None => (offset, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 15 || minutes > 59 {
        return None;
    }
    Some((time, sign * (hours * 3600 + minutes * 60)))
}

/// Binary timetz: microseconds since midnight, then the zone as seconds
/// west of UTC.
fn write_timetz(time: NaiveTime, offset_secs: i32, out: &mut BytesMut) {
    let micros = i64::from(time.num_seconds_from_midnight()) * 1_000_000
        + i64::from(time.nanosecond() / 1_000);
    out.put_i64(micros);
    out.put_i32(-offset_secs);
}

fn parse_naive_timestamp(value: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| parse_timestamptz(value).map(|dt| dt.naive_utc()))
}

fn parse_timestamptz(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    // Offset-less timestamps are taken as UTC
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

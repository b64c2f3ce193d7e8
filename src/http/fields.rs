//! Column descriptions shared by the resource handlers: required-field checks,
//! JSON to SQL binding, partial-update statements and row decoding.

use rusqlite::types::Value as SqlValue;
use serde_json::Value as JsonValue;

use crate::db::Record;
use crate::http::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Text,
    Integer,
    Real,
    /// Stored as 0/1, returned as a JSON boolean.
    Bool,
    /// JSON array stored as serialized text.
    List,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: Kind,
    pub required: bool,
}

pub const fn text(name: &'static str) -> Column {
    Column {
        name,
        kind: Kind::Text,
        required: false,
    }
}

pub const fn required(name: &'static str) -> Column {
    Column {
        name,
        kind: Kind::Text,
        required: true,
    }
}

pub const fn int(name: &'static str) -> Column {
    Column {
        name,
        kind: Kind::Integer,
        required: false,
    }
}

pub const fn real(name: &'static str) -> Column {
    Column {
        name,
        kind: Kind::Real,
        required: false,
    }
}

pub const fn flag(name: &'static str) -> Column {
    Column {
        name,
        kind: Kind::Bool,
        required: false,
    }
}

pub const fn list(name: &'static str) -> Column {
    Column {
        name,
        kind: Kind::List,
        required: false,
    }
}

fn is_blank(v: Option<&JsonValue>) -> bool {
    match v {
        None | Some(JsonValue::Null) => true,
        Some(JsonValue::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

/// Fails with every required column that is absent, null or blank.
pub fn check_required(body: &Record, columns: &[Column]) -> Result<(), ApiError> {
    let missing: Vec<String> = columns
        .iter()
        .filter(|c| c.required && is_blank(body.get(c.name)))
        .map(|c| c.name.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::MissingFields(missing))
    }
}

pub fn to_sql(column: &Column, v: &JsonValue) -> Result<SqlValue, ApiError> {
    let name = column.name;
    if column.required && is_blank(Some(v)) {
        return Err(ApiError::bad_request(format!("{name} must not be empty")));
    }
    if v.is_null() {
        return Ok(match column.kind {
            Kind::Bool => SqlValue::Integer(0),
            Kind::List => SqlValue::Text("[]".to_string()),
            _ => SqlValue::Null,
        });
    }
    match column.kind {
        Kind::Text => match v {
            JsonValue::String(s) => Ok(SqlValue::Text(s.trim().to_string())),
            _ => Err(ApiError::bad_request(format!("{name} must be a string"))),
        },
        Kind::Integer => {
            let n = match v {
                JsonValue::Number(n) => n.as_i64().or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                        .map(|f| f as i64)
                }),
                JsonValue::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            n.map(SqlValue::Integer)
                .ok_or_else(|| ApiError::bad_request(format!("{name} must be an integer")))
        }
        Kind::Real => {
            let f = match v {
                JsonValue::Number(n) => n.as_f64(),
                JsonValue::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            f.map(SqlValue::Real)
                .ok_or_else(|| ApiError::bad_request(format!("{name} must be a number")))
        }
        Kind::Bool => match v {
            JsonValue::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
            JsonValue::Number(n) if n.as_i64() == Some(0) || n.as_i64() == Some(1) => {
                Ok(SqlValue::Integer(n.as_i64().unwrap_or(0)))
            }
            _ => Err(ApiError::bad_request(format!("{name} must be a boolean"))),
        },
        Kind::List => match v {
            JsonValue::Array(_) => Ok(SqlValue::Text(v.to_string())),
            _ => Err(ApiError::bad_request(format!("{name} must be an array"))),
        },
    }
}

/// A client-supplied record id. Numbers are kept as their decimal text.
pub fn id_of(v: &JsonValue) -> Option<String> {
    match v {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Column/value pairs bound positionally into an INSERT or UPDATE.
#[derive(Debug, Default)]
pub struct Assignments {
    names: Vec<&'static str>,
    values: Vec<SqlValue>,
}

impl Assignments {
    /// Picks up only the columns present in `body`, explicit nulls included.
    pub fn from_body(body: &Record, columns: &[Column]) -> Result<Self, ApiError> {
        let mut out = Self::default();
        for column in columns {
            if let Some(v) = body.get(column.name) {
                out.set(column.name, to_sql(column, v)?);
            }
        }
        Ok(out)
    }

    pub fn set(&mut self, name: &'static str, value: SqlValue) {
        if let Some(i) = self.names.iter().position(|n| *n == name) {
            self.values[i] = value;
        } else {
            self.names.push(name);
            self.values.push(value);
        }
    }

    pub fn set_default(&mut self, name: &'static str, value: SqlValue) {
        if !self.contains(name) {
            self.set(name, value);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| *n == name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn insert_sql(&self, table: &str) -> String {
        let marks = vec!["?"; self.names.len()].join(", ");
        format!(
            "INSERT INTO {}({}) VALUES({})",
            table,
            self.names.join(", "),
            marks
        )
    }

    /// The key value is bound last.
    pub fn update_sql(&self, table: &str, key: &str) -> String {
        let sets: Vec<String> = self.names.iter().map(|n| format!("{n} = ?")).collect();
        format!("UPDATE {} SET {} WHERE {} = ?", table, sets.join(", "), key)
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }
}

/// Turns stored flags back into booleans and list text back into arrays.
/// Unparseable list text reads as an empty array.
pub fn decode_record(rec: &mut Record, columns: &[Column]) {
    for column in columns {
        let Some(v) = rec.get_mut(column.name) else {
            continue;
        };
        match column.kind {
            Kind::Bool => {
                if let Some(n) = v.as_i64() {
                    *v = JsonValue::Bool(n != 0);
                }
            }
            Kind::List => {
                let parsed = v
                    .as_str()
                    .and_then(|s| serde_json::from_str::<JsonValue>(s).ok())
                    .filter(JsonValue::is_array)
                    .unwrap_or_else(|| JsonValue::Array(Vec::new()));
                *v = parsed;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COLUMNS: &[Column] = &[
        required("name"),
        text("notes"),
        int("week_id"),
        flag("via_email"),
        list("tags"),
    ];

    fn body(v: JsonValue) -> Record {
        v.as_object().cloned().expect("object")
    }

    #[test]
    fn check_required_lists_absent_and_blank_fields() {
        let err = check_required(&body(json!({ "notes": "x" })), COLUMNS).unwrap_err();
        assert!(matches!(err, ApiError::MissingFields(ref f) if f == &vec!["name".to_string()]));
        let err = check_required(&body(json!({ "name": "   " })), COLUMNS).unwrap_err();
        assert!(matches!(err, ApiError::MissingFields(_)));
        assert!(check_required(&body(json!({ "name": "Ada" })), COLUMNS).is_ok());
    }

    #[test]
    fn assignments_only_include_present_fields() {
        let a = Assignments::from_body(
            &body(json!({ "notes": null, "week_id": "4", "ignored": 1 })),
            COLUMNS,
        )
        .expect("assignments");
        assert_eq!(a.update_sql("t", "id"), "UPDATE t SET notes = ?, week_id = ? WHERE id = ?");
        assert_eq!(a.into_values(), vec![SqlValue::Null, SqlValue::Integer(4)]);
    }

    #[test]
    fn empty_body_produces_no_assignments() {
        let a = Assignments::from_body(&Record::new(), COLUMNS).expect("assignments");
        assert!(a.is_empty());
    }

    #[test]
    fn type_mismatches_are_client_errors() {
        assert!(Assignments::from_body(&body(json!({ "week_id": "soon" })), COLUMNS).is_err());
        assert!(Assignments::from_body(&body(json!({ "via_email": "yes" })), COLUMNS).is_err());
        assert!(Assignments::from_body(&body(json!({ "tags": "a,b" })), COLUMNS).is_err());
        assert!(Assignments::from_body(&body(json!({ "name": "" })), COLUMNS).is_err());
    }

    #[test]
    fn integers_outside_i64_range_are_rejected() {
        let week = int("week_id");
        assert_eq!(to_sql(&week, &json!(3.0)).expect("whole float"), SqlValue::Integer(3));
        assert!(to_sql(&week, &json!(1e20)).is_err());
        assert!(to_sql(&week, &json!(-1e20)).is_err());
        assert!(to_sql(&week, &json!(u64::MAX)).is_err());
        assert!(to_sql(&week, &json!(2.5)).is_err());
    }

    #[test]
    fn decode_record_restores_flags_and_lists() {
        let mut rec = body(json!({ "via_email": 1, "tags": "[\"a\"]", "name": "x" }));
        decode_record(&mut rec, COLUMNS);
        assert_eq!(rec["via_email"], json!(true));
        assert_eq!(rec["tags"], json!(["a"]));

        let mut broken = body(json!({ "tags": "{oops" }));
        decode_record(&mut broken, COLUMNS);
        assert_eq!(broken["tags"], json!([]));
    }
}

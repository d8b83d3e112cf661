//! Column mapping evaluation and type coercion.
//!
//! A mapping is a script evaluated against the whole attribute map of an
//! entry. Its result is coerced to the column's declared [`ValueType`].

use rhai::{Array, Dynamic, Scope, AST};
use std::sync::Arc;

use crate::attributes::AttributeMap;
use crate::helpers::{bytes_to_string, to_string_list};
use crate::script::{attribute_to_dynamic, ScriptEngine, COLUMN_VAR, ENTRY_VAR, VALUE_VAR};
use crate::types::{TypedValue, ValueType};

/// Mapping used when a column does not configure one.
///
/// List columns flatten their source attribute, `sid` columns decode it and
/// every other column renders it as text.
pub fn default_mapping(declared_type: Option<&str>, value_type: ValueType) -> &'static str {
    if declared_type.is_some_and(|t| t.trim().eq_ignore_ascii_case("sid")) {
        return "decodeSID(value)";
    }
    if value_type.is_array() {
        "toStringList(value)"
    } else {
        "bytesToString(value)"
    }
}

/// A parsed mapping bound to its engine.
///
/// Stateless after construction: every evaluation builds its own scope, so
/// one compiled mapping can serve concurrent callers.
#[derive(Debug, Clone)]
pub struct CompiledMapping {
    source: String,
    ast: Arc<AST>,
    engine: ScriptEngine,
}

impl CompiledMapping {
    /// Parse a mapping script.
    pub fn compile(engine: &ScriptEngine, source: &str) -> Result<Self, String> {
        let ast = engine.compile_mapping(source).map_err(|e| e.to_string())?;
        Ok(Self {
            source: source.to_string(),
            ast: Arc::new(ast),
            engine: engine.clone(),
        })
    }

    /// The mapping source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Run the mapping against an entry.
    ///
    /// `column` and the column's source attribute are exposed to the script
    /// as `column` and `value`.
    pub fn evaluate(
        &self,
        entry: &AttributeMap,
        column: &str,
        source_attribute: &str,
    ) -> Result<Dynamic, String> {
        let value = entry
            .value(source_attribute)
            .map(attribute_to_dynamic)
            .unwrap_or(Dynamic::UNIT);

        let mut scope = Scope::new();
        scope.push(ENTRY_VAR, entry.clone());
        scope.push(COLUMN_VAR, column.to_string());
        scope.push(VALUE_VAR, value);

        self.engine.eval(&mut scope, &self.ast)
    }
}

/// Coerce a mapping result to the column type.
///
/// `()` becomes [`TypedValue::Null`]. Text that does not parse as the target
/// type is kept as a string rather than dropped.
pub fn coerce(value: Dynamic, value_type: ValueType) -> TypedValue {
    if value.is_unit() {
        return TypedValue::Null;
    }

    match value_type {
        ValueType::String => TypedValue::String(bytes_to_string(&value)),
        ValueType::StringArray => TypedValue::StringArray(to_string_list(&value)),
        ValueType::IntArray => {
            let items = to_string_list(&value);
            let parsed: Result<Vec<i64>, _> =
                items.iter().map(|s| s.trim().parse::<i64>()).collect();
            match parsed {
                Ok(ints) => TypedValue::IntArray(ints),
                Err(_) => TypedValue::StringArray(items),
            }
        }
        ValueType::Int => {
            if let Ok(i) = value.as_int() {
                return TypedValue::Int(i);
            }
            let text = bytes_to_string(&value);
            match text.trim().parse::<i64>() {
                Ok(i) => TypedValue::Int(i),
                Err(_) => TypedValue::String(text),
            }
        }
        ValueType::Bool => {
            if let Ok(b) = value.as_bool() {
                return TypedValue::Bool(b);
            }
            let text = bytes_to_string(&value);
            match text.trim().to_lowercase().as_str() {
                "true" => TypedValue::Bool(true),
                "false" => TypedValue::Bool(false),
                _ => TypedValue::String(text),
            }
        }
        ValueType::Json => coerce_json(value),
    }
}

fn coerce_json(value: Dynamic) -> TypedValue {
    if let Ok(i) = value.as_int() {
        return TypedValue::Json(serde_json::Value::from(i));
    }
    if let Ok(b) = value.as_bool() {
        return TypedValue::Json(serde_json::Value::Bool(b));
    }
    if value.is_map() || (value.is_array() && !contains_blob(&value)) {
        if let Ok(json) = rhai::serde::from_dynamic::<serde_json::Value>(&value) {
            return TypedValue::Json(json);
        }
    }
    if value.is_array() {
        let items = to_string_list(&value)
            .into_iter()
            .map(serde_json::Value::String)
            .collect();
        return TypedValue::Json(serde_json::Value::Array(items));
    }

    let text = bytes_to_string(&value);
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => TypedValue::Json(json),
        Err(_) => TypedValue::String(text),
    }
}

fn contains_blob(value: &Dynamic) -> bool {
    value
        .clone()
        .try_cast::<Array>()
        .is_some_and(|items| items.iter().any(|v| v.is_blob() || contains_blob(v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{normalize, RawEntry};

    fn entry() -> AttributeMap {
        normalize(
            RawEntry::new("cn=jdoe,ou=people,dc=example,dc=com")
                .with_value("givenName", "John")
                .with_value("sn", "Doe")
                .with_value("uidNumber", "1001")
                .with_value("accountEnabled", "TRUE")
                .with_values("memberOf", ["cn=admins", "cn=users"])
                .with_values("ports", ["22", "443"]),
        )
    }

    fn run(source: &str, column: &str, attribute: &str) -> Dynamic {
        let engine = ScriptEngine::default();
        let mapping = CompiledMapping::compile(&engine, source).unwrap();
        mapping.evaluate(&entry(), column, attribute).unwrap()
    }

    #[test]
    fn test_mapping_combines_attributes() {
        let out = run(
            "`${bytesToString(entry.givenName)} ${bytesToString(entry.sn)}`",
            "full_name",
            "full_name",
        );
        assert_eq!(coerce(out, ValueType::String).as_str(), Some("John Doe"));
    }

    #[test]
    fn test_mapping_case_insensitive_property() {
        let upper = run("bytesToString(entry.GivenName)", "n", "n");
        let lower = run("bytesToString(entry.givenname)", "n", "n");
        assert_eq!(upper.into_string().unwrap(), lower.into_string().unwrap());
    }

    #[test]
    fn test_value_and_column_in_scope() {
        let out = run("`${column}=${bytesToString(value)}`", "first", "GIVENNAME");
        assert_eq!(out.into_string().unwrap(), "first=John");

        let missing = run("value", "mail", "mail");
        assert!(missing.is_unit());
        assert_eq!(coerce(missing, ValueType::String), TypedValue::Null);
    }

    #[test]
    fn test_default_mappings() {
        assert_eq!(default_mapping(None, ValueType::String), "bytesToString(value)");
        assert_eq!(
            default_mapping(Some("[]string"), ValueType::StringArray),
            "toStringList(value)"
        );
        assert_eq!(default_mapping(Some("SID"), ValueType::String), "decodeSID(value)");

        let groups = run(default_mapping(None, ValueType::StringArray), "g", "memberOf");
        assert_eq!(
            coerce(groups, ValueType::StringArray),
            TypedValue::StringArray(vec!["cn=admins".into(), "cn=users".into()])
        );
    }

    #[test]
    fn test_coerce_scalars() {
        assert_eq!(
            coerce(run("bytesToString(entry.uidNumber)", "u", "u"), ValueType::Int),
            TypedValue::Int(1001)
        );
        assert_eq!(
            coerce(run("bytesToString(entry.accountEnabled)", "a", "a"), ValueType::Bool),
            TypedValue::Bool(true)
        );
        assert_eq!(coerce(Dynamic::from(7_i64), ValueType::Int), TypedValue::Int(7));
        assert_eq!(coerce(Dynamic::from(false), ValueType::Bool), TypedValue::Bool(false));
    }

    #[test]
    fn test_coerce_keeps_unparsable_text() {
        assert_eq!(
            coerce(Dynamic::from("abc".to_string()), ValueType::Int),
            TypedValue::String("abc".into())
        );
        assert_eq!(
            coerce(Dynamic::from("maybe".to_string()), ValueType::Bool),
            TypedValue::String("maybe".into())
        );
        assert_eq!(
            coerce(Dynamic::from("{not json".to_string()), ValueType::Json),
            TypedValue::String("{not json".into())
        );
    }

    #[test]
    fn test_coerce_arrays() {
        let ports = run("toStringList(entry.ports)", "p", "p");
        assert_eq!(coerce(ports, ValueType::IntArray), TypedValue::IntArray(vec![22, 443]));

        let groups = run("toStringList(entry.memberOf)", "g", "g");
        assert_eq!(
            coerce(groups, ValueType::IntArray),
            TypedValue::StringArray(vec!["cn=admins".into(), "cn=users".into()])
        );

        // A scalar becomes a one-element list.
        assert_eq!(
            coerce(Dynamic::from("solo".to_string()), ValueType::StringArray),
            TypedValue::StringArray(vec!["solo".into()])
        );
    }

    #[test]
    fn test_coerce_json() {
        let from_text = coerce(Dynamic::from(r#"{"a": 1}"#.to_string()), ValueType::Json);
        assert_eq!(from_text, TypedValue::Json(serde_json::json!({"a": 1})));

        let from_map = run(r#"#{ name: bytesToString(entry.sn), uid: 5 }"#, "j", "j");
        assert_eq!(
            coerce(from_map, ValueType::Json),
            TypedValue::Json(serde_json::json!({"name": "Doe", "uid": 5}))
        );

        let from_blobs = run("entry.memberOf", "j", "j");
        assert_eq!(
            coerce(from_blobs, ValueType::Json),
            TypedValue::Json(serde_json::json!(["cn=admins", "cn=users"]))
        );
    }

    #[test]
    fn test_runtime_error_is_reported() {
        let engine = ScriptEngine::default();
        let mapping = CompiledMapping::compile(&engine, r#"throw "boom""#).unwrap();
        let err = mapping.evaluate(&entry(), "c", "c").unwrap_err();
        assert!(err.contains("boom"));
    }

    #[test]
    fn test_parse_error_at_compile() {
        let engine = ScriptEngine::default();
        assert!(CompiledMapping::compile(&engine, "bytesToString(").is_err());
    }
}

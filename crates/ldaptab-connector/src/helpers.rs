//! Helper functions available to mapping and accept scripts.
//!
//! ## Domain helpers
//!
//! | Function | Description |
//! |----------|-------------|
//! | `bytesToString(v)` | Decode a byte value (or list of them) to text |
//! | `toStringList(v)` | Flatten bytes, strings and lists into a list of strings |
//! | `decodeSID(v)` | Decode a binary SID to `S-1-5-…` text |
//! | `sidRID(v)` | Relative identifier (last sub-authority) of a binary SID |
//!
//! `decodeSID` and `sidRID` return `()` for `()`, so a missing attribute
//! stays missing.
//!
//! ## Utility library
//!
//! Text arguments may be strings or byte values; byte values are decoded the
//! same way `bytesToString` does.
//!
//! | Function | Description |
//! |----------|-------------|
//! | `lowercase(v)` / `uppercase(v)` | Case conversion |
//! | `trim(v)` | Remove leading/trailing whitespace |
//! | `split(v, sep)` / `join(arr, sep)` | Split text into a list / join a list |
//! | `replace(v, from, to)` | Replace every occurrence |
//! | `starts_with(v, prefix)` / `ends_with(v, suffix)` | Prefix / suffix check |
//! | `contains_str(v, needle)` | Substring check |
//! | `default_str(v, fallback)` | `fallback` when `v` is `()` or empty |
//! | `coalesce2(a, b)` | `a` unless it is `()` or empty, else `b` |
//! | `array_first(arr)` / `array_last(arr)` | First / last element or `()` |
//! | `array_get(arr, idx)` | Element or `()` |
//! | `array_len(arr)` | Length |
//! | `array_contains(arr, v)` | Membership compared as text |
//! | `array_unique(arr)` | Drop duplicates compared as text, keep order |
//!
//! ## Logging
//!
//! `log(msg)`, `log_info(msg)`, `log_warn(msg)` and `log_debug(msg)` write to
//! the process log.

use rhai::{Array, Blob, Dynamic, Engine, EvalAltResult};
use tracing::{debug, info, warn};

use crate::sid::Sid;

/// Decode a script value to text.
///
/// Byte values are decoded as UTF-8 (lossy), strings pass through, lists are
/// converted element-wise and joined with `,`, and `()` becomes the empty
/// string.
pub fn bytes_to_string(value: &Dynamic) -> String {
    if value.is_unit() {
        return String::new();
    }
    if let Some(bytes) = value.clone().try_cast::<Blob>() {
        return String::from_utf8_lossy(&bytes).into_owned();
    }
    if let Some(array) = value.clone().try_cast::<Array>() {
        return array
            .iter()
            .map(bytes_to_string)
            .collect::<Vec<_>>()
            .join(",");
    }
    if let Ok(s) = value.clone().into_immutable_string() {
        return s.to_string();
    }
    value.to_string()
}

/// Flatten a script value into a list of strings.
///
/// Byte values and strings become one element each, nested lists are
/// flattened in order, other scalars use their display form, and `()`
/// produces no elements.
pub fn to_string_list(value: &Dynamic) -> Vec<String> {
    let mut out = Vec::new();
    flatten_into(value, &mut out);
    out
}

fn flatten_into(value: &Dynamic, out: &mut Vec<String>) {
    if value.is_unit() {
        return;
    }
    if let Some(array) = value.clone().try_cast::<Array>() {
        for item in &array {
            flatten_into(item, out);
        }
        return;
    }
    out.push(bytes_to_string(value));
}

fn sid_bytes(value: &Dynamic) -> Result<Blob, Box<EvalAltResult>> {
    if let Some(bytes) = value.clone().try_cast::<Blob>() {
        return Ok(bytes);
    }
    // A single-element list of byte values is accepted as well.
    if let Some(array) = value.clone().try_cast::<Array>() {
        if let [single] = array.as_slice() {
            if let Some(bytes) = single.clone().try_cast::<Blob>() {
                return Ok(bytes);
            }
        }
    }
    Err(format!("decodeSID expects a byte value, got {}", value.type_name()).into())
}

fn decode_sid_value(value: Dynamic) -> Result<Dynamic, Box<EvalAltResult>> {
    if value.is_unit() {
        return Ok(Dynamic::UNIT);
    }
    let bytes = sid_bytes(&value)?;
    Sid::from_bytes(&bytes)
        .map(|sid| Dynamic::from(sid.to_string()))
        .map_err(|e| e.to_string().into())
}

fn sid_rid_value(value: Dynamic) -> Result<Dynamic, Box<EvalAltResult>> {
    if value.is_unit() {
        return Ok(Dynamic::UNIT);
    }
    let bytes = sid_bytes(&value)?;
    let sid = Sid::from_bytes(&bytes).map_err(|e| e.to_string())?;
    sid.last_sub_authority()
        .map(|rid| Dynamic::from(i64::from(rid)))
        .ok_or_else(|| "SID has no sub-authorities".into())
}

/// `()`, an empty string, an empty byte value or an empty list.
fn is_empty_value(v: &Dynamic) -> bool {
    v.is_unit() || to_string_list(v).iter().all(String::is_empty)
}

fn strings_to_array(values: Vec<String>) -> Array {
    values.into_iter().map(Dynamic::from).collect()
}

/// Register the complete helper set on an engine.
pub fn register_helpers(engine: &mut Engine) {
    register_domain_helpers(engine);
    register_string_helpers(engine);
    register_array_helpers(engine);
    register_logging(engine);
}

fn register_domain_helpers(engine: &mut Engine) {
    engine.register_fn("bytesToString", |v: Dynamic| bytes_to_string(&v));
    engine.register_fn("toStringList", |v: Dynamic| -> Array {
        strings_to_array(to_string_list(&v))
    });
    engine.register_fn("decodeSID", decode_sid_value);
    engine.register_fn("sidRID", sid_rid_value);
}

fn register_string_helpers(engine: &mut Engine) {
    engine.register_fn("lowercase", |v: Dynamic| bytes_to_string(&v).to_lowercase());
    engine.register_fn("uppercase", |v: Dynamic| bytes_to_string(&v).to_uppercase());

    // Plain strings would otherwise reach rhai's in-place `trim`/`replace`,
    // which return `()`.
    engine.register_fn("trim", |s: &str| s.trim().to_string());
    engine.register_fn("trim", |v: Dynamic| bytes_to_string(&v).trim().to_string());
    engine.register_fn("replace", |s: &str, from: &str, to: &str| s.replace(from, to));
    engine.register_fn("replace", |v: Dynamic, from: &str, to: &str| {
        bytes_to_string(&v).replace(from, to)
    });

    engine.register_fn("split", |v: Dynamic, sep: &str| -> Array {
        bytes_to_string(&v)
            .split(sep)
            .map(|p| Dynamic::from(p.to_string()))
            .collect()
    });
    engine.register_fn("join", |arr: Array, sep: &str| -> String {
        arr.iter()
            .map(bytes_to_string)
            .collect::<Vec<_>>()
            .join(sep)
    });

    engine.register_fn("starts_with", |v: Dynamic, prefix: &str| {
        bytes_to_string(&v).starts_with(prefix)
    });
    engine.register_fn("ends_with", |v: Dynamic, suffix: &str| {
        bytes_to_string(&v).ends_with(suffix)
    });
    engine.register_fn("contains_str", |v: Dynamic, needle: &str| {
        bytes_to_string(&v).contains(needle)
    });

    engine.register_fn("default_str", |v: Dynamic, fallback: &str| -> String {
        let text = bytes_to_string(&v);
        if text.is_empty() {
            fallback.to_string()
        } else {
            text
        }
    });
    engine.register_fn("coalesce2", |a: Dynamic, b: Dynamic| -> Dynamic {
        if is_empty_value(&a) {
            b
        } else {
            a
        }
    });
}

fn register_array_helpers(engine: &mut Engine) {
    engine.register_fn("array_first", |arr: Array| -> Dynamic {
        arr.into_iter().next().unwrap_or(Dynamic::UNIT)
    });
    engine.register_fn("array_last", |arr: Array| -> Dynamic {
        arr.into_iter().last().unwrap_or(Dynamic::UNIT)
    });
    engine.register_fn("array_get", |arr: Array, idx: i64| -> Dynamic {
        usize::try_from(idx)
            .ok()
            .and_then(|idx| arr.get(idx).cloned())
            .unwrap_or(Dynamic::UNIT)
    });
    engine.register_fn("array_len", |arr: Array| -> i64 { arr.len() as i64 });
    engine.register_fn("array_contains", |arr: Array, val: Dynamic| -> bool {
        let needle = bytes_to_string(&val);
        arr.iter().any(|v| bytes_to_string(v) == needle)
    });
    engine.register_fn("array_unique", |arr: Array| -> Array {
        let mut seen = std::collections::HashSet::new();
        arr.into_iter()
            .filter(|v| seen.insert(bytes_to_string(v)))
            .collect()
    });
}

fn register_logging(engine: &mut Engine) {
    engine.register_fn("log", |msg: &str| {
        info!(script_log = %msg, "Script log");
    });
    engine.register_fn("log_info", |msg: &str| {
        info!(script_log = %msg, "Script log");
    });
    engine.register_fn("log_warn", |msg: &str| {
        warn!(script_log = %msg, "Script warning");
    });
    engine.register_fn("log_debug", |msg: &str| {
        debug!(script_log = %msg, "Script debug");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(s: &str) -> Dynamic {
        Dynamic::from(s.as_bytes().to_vec())
    }

    fn engine() -> Engine {
        let mut engine = Engine::new();
        register_helpers(&mut engine);
        engine
    }

    #[test]
    fn test_bytes_to_string() {
        assert_eq!(bytes_to_string(&blob("John")), "John");
        assert_eq!(bytes_to_string(&Dynamic::from("Jane".to_string())), "Jane");
        assert_eq!(bytes_to_string(&Dynamic::UNIT), "");
        assert_eq!(bytes_to_string(&Dynamic::from(42_i64)), "42");

        let list: Array = vec![blob("a"), blob("b")];
        assert_eq!(bytes_to_string(&Dynamic::from(list)), "a,b");
    }

    #[test]
    fn test_bytes_to_string_invalid_utf8() {
        let bad = Dynamic::from(vec![0x66_u8, 0x6f, 0xff]);
        assert_eq!(bytes_to_string(&bad), "fo\u{fffd}");
    }

    #[test]
    fn test_to_string_list_mixed() {
        let mixed: Array = vec![
            Dynamic::from("alpha".to_string()),
            blob("beta"),
            Dynamic::from("gamma".to_string()),
            blob("delta"),
        ];
        assert_eq!(
            to_string_list(&Dynamic::from(mixed)),
            vec!["alpha", "beta", "gamma", "delta"]
        );
    }

    #[test]
    fn test_to_string_list_flattens_nested() {
        let inner: Array = vec![blob("b"), blob("c")];
        let outer: Array = vec![blob("a"), Dynamic::from(inner), Dynamic::UNIT];
        assert_eq!(to_string_list(&Dynamic::from(outer)), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_to_string_list_scalars() {
        assert_eq!(to_string_list(&blob("only")), vec!["only"]);
        assert!(to_string_list(&Dynamic::UNIT).is_empty());
    }

    #[test]
    fn test_registered_string_helpers() {
        let engine = engine();
        assert_eq!(
            engine.eval::<String>(r#"uppercase("hello")"#).unwrap(),
            "HELLO"
        );
        assert_eq!(engine.eval::<String>(r#"trim("  x  ")"#).unwrap(), "x");
        assert_eq!(
            engine.eval::<String>(r#"replace("a-b-c", "-", ".")"#).unwrap(),
            "a.b.c"
        );
        assert_eq!(
            engine.eval::<String>(r#"default_str("", "N/A")"#).unwrap(),
            "N/A"
        );
        assert_eq!(
            engine.eval::<String>(r#"coalesce2((), "x")"#).unwrap(),
            "x"
        );
    }

    #[test]
    fn test_string_helpers_accept_byte_values() {
        let engine = engine();
        let mut scope = rhai::Scope::new();
        scope.push("mail", blob("  John.Doe@Example.com "));
        scope.push("empty", blob(""));

        let lower: String = engine
            .eval_with_scope(&mut scope, "lowercase(trim(mail))")
            .unwrap();
        assert_eq!(lower, "john.doe@example.com");
        assert!(engine
            .eval_with_scope::<bool>(&mut scope, r#"contains_str(mail, "@Example")"#)
            .unwrap());
        assert!(engine
            .eval_with_scope::<bool>(&mut scope, r#"ends_with(trim(mail), ".com")"#)
            .unwrap());
        assert_eq!(
            engine
                .eval_with_scope::<String>(&mut scope, r#"default_str(empty, "none")"#)
                .unwrap(),
            "none"
        );
        assert_eq!(
            engine
                .eval_with_scope::<Array>(&mut scope, r#"split(trim(mail), "@")"#)
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_registered_array_helpers() {
        let engine = engine();
        assert_eq!(
            engine
                .eval::<String>(r#"join(array_unique(split("a,b,a", ",")), "|")"#)
                .unwrap(),
            "a|b"
        );
        assert!(engine.eval::<Dynamic>("array_get([1, 2], 5)").unwrap().is_unit());
        assert_eq!(engine.eval::<i64>("array_len([1, 2, 3])").unwrap(), 3);
        assert!(engine
            .eval::<bool>(r#"array_contains(["x", "y"], "y")"#)
            .unwrap());
    }

    #[test]
    fn test_decode_sid_helper() {
        let engine = engine();
        let mut scope = rhai::Scope::new();
        let mut bytes = vec![0x01_u8, 0x02, 0, 0, 0, 0, 0, 0x05];
        bytes.extend_from_slice(&32_u32.to_le_bytes());
        bytes.extend_from_slice(&544_u32.to_le_bytes());
        scope.push("sid", Dynamic::from(bytes));

        let text: String = engine
            .eval_with_scope(&mut scope, "decodeSID(sid)")
            .unwrap();
        assert_eq!(text, "S-1-5-32-544");

        let rid: i64 = engine.eval_with_scope(&mut scope, "sidRID(sid)").unwrap();
        assert_eq!(rid, 544);
    }

    #[test]
    fn test_decode_sid_helper_passes_unit_through() {
        let engine = engine();
        assert!(engine.eval::<Dynamic>("decodeSID(())").unwrap().is_unit());
        assert!(engine.eval::<Dynamic>("sidRID(())").unwrap().is_unit());
    }

    #[test]
    fn test_decode_sid_helper_rejects_bad_input() {
        let engine = engine();
        assert!(engine.eval::<String>(r#"decodeSID("text")"#).is_err());

        let mut scope = rhai::Scope::new();
        scope.push("short", Dynamic::from(vec![0x01_u8, 0x01]));
        assert!(engine
            .eval_with_scope::<String>(&mut scope, "decodeSID(short)")
            .is_err());
    }
}

//! Sandboxed script engine shared by column mappings and accept predicates.
//!
//! One engine is built per table registration. It carries the resource
//! limits, the helper set and the `AttributeMap` custom type, and is shared
//! read-only by every compiled script of that table. Each evaluation uses a
//! fresh [`Scope`], so compiled scripts can run concurrently.

use rhai::{Array, Dynamic, Engine, ImmutableString, ParseError, Scope, AST};
use std::sync::Arc;

use crate::attributes::{AttributeMap, AttributeValue};
use crate::config::ScriptLimits;
use crate::helpers::register_helpers;

/// Scope variable holding the entry's attribute map.
pub const ENTRY_VAR: &str = "entry";
/// Scope variable holding the column name (mappings only).
pub const COLUMN_VAR: &str = "column";
/// Scope variable holding the column's source attribute (mappings only).
pub const VALUE_VAR: &str = "value";

/// Convert an attribute into its script form: a blob for a single value, an
/// array of blobs otherwise.
pub fn attribute_to_dynamic(value: AttributeValue) -> Dynamic {
    match value {
        AttributeValue::Single(bytes) => Dynamic::from_blob(bytes),
        AttributeValue::List(values) => {
            let array: Array = values.into_iter().map(Dynamic::from_blob).collect();
            Dynamic::from_array(array)
        }
    }
}

/// Sandboxed engine with the helper set registered.
#[derive(Clone)]
pub struct ScriptEngine {
    engine: Arc<Engine>,
}

impl ScriptEngine {
    /// Create an engine with the given limits.
    pub fn new(limits: &ScriptLimits) -> Self {
        let mut engine = Engine::new();

        engine.set_max_operations(limits.max_operations);
        engine.set_max_call_levels(limits.max_call_levels);
        engine.set_max_string_size(limits.max_string_size);
        engine.set_max_array_size(limits.max_array_size);
        engine.set_max_map_size(limits.max_map_size);
        engine.set_strict_variables(true);

        register_attribute_map(&mut engine);
        register_helpers(&mut engine);

        Self {
            engine: Arc::new(engine),
        }
    }

    /// Compile a column mapping against the mapping scope
    /// (`entry`, `column`, `value`).
    pub fn compile_mapping(&self, source: &str) -> Result<AST, ParseError> {
        let mut scope = Scope::new();
        scope.push(ENTRY_VAR, AttributeMap::default());
        scope.push(COLUMN_VAR, String::new());
        scope.push(VALUE_VAR, Dynamic::UNIT);
        self.engine.compile_with_scope(&scope, source)
    }

    /// Compile an accept predicate against the predicate scope (`entry`).
    pub fn compile_predicate(&self, source: &str) -> Result<AST, ParseError> {
        let mut scope = Scope::new();
        scope.push(ENTRY_VAR, AttributeMap::default());
        self.engine.compile_with_scope(&scope, source)
    }

    /// Evaluate a compiled script with the given scope.
    pub fn eval(&self, scope: &mut Scope, ast: &AST) -> Result<Dynamic, String> {
        self.engine
            .eval_ast_with_scope::<Dynamic>(scope, ast)
            .map_err(|e| e.to_string())
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new(&ScriptLimits::default())
    }
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine").finish_non_exhaustive()
    }
}

/// Expose `AttributeMap` to scripts.
///
/// `entry["GivenName"]`, `entry.givenName` and `entry.GIVENNAME` all resolve
/// the same attribute; missing attributes yield `()`.
fn register_attribute_map(engine: &mut Engine) {
    engine.register_type_with_name::<AttributeMap>("AttributeMap");

    engine.register_indexer_get(|map: &mut AttributeMap, name: ImmutableString| -> Dynamic {
        map.value(name.as_str())
            .map(attribute_to_dynamic)
            .unwrap_or(Dynamic::UNIT)
    });

    engine.register_fn("has", |map: &mut AttributeMap, name: &str| map.contains(name));
    engine.register_fn("dn", |map: &mut AttributeMap| map.dn());
    engine.register_fn("keys", |map: &mut AttributeMap| -> Array {
        let mut names: Vec<&str> = map.names().collect();
        names.sort_unstable();
        names
            .into_iter()
            .map(|n| Dynamic::from(n.to_string()))
            .collect()
    });
    engine.register_fn("strings", |map: &mut AttributeMap, name: &str| -> Array {
        map.get_strings(name)
            .into_iter()
            .map(Dynamic::from)
            .collect()
    });
    engine.register_fn("to_string", |map: &mut AttributeMap| map.to_json().to_string());
    engine.register_fn("to_debug", |map: &mut AttributeMap| map.to_json().to_string());
}

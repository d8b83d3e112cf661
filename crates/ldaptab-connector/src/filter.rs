//! Row acceptance predicates.

use rhai::{Scope, AST};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::attributes::AttributeMap;
use crate::error::{ConnectorError, ConnectorResult};
use crate::script::{ScriptEngine, ENTRY_VAR};

/// A compiled row-admission script.
///
/// The script sees the entry as `entry` and must evaluate to a boolean.
#[derive(Debug, Clone)]
pub struct AcceptPredicate {
    source: String,
    ast: Arc<AST>,
    engine: ScriptEngine,
}

impl AcceptPredicate {
    /// Compile a predicate script.
    pub fn compile(engine: &ScriptEngine, source: &str) -> Result<Self, String> {
        let ast = engine.compile_predicate(source).map_err(|e| e.to_string())?;
        Ok(Self {
            source: source.to_string(),
            ast: Arc::new(ast),
            engine: engine.clone(),
        })
    }

    /// The predicate source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate the predicate for an entry.
    ///
    /// Runtime errors and non-boolean results are reported as
    /// [`ConnectorError::FilterPredicate`].
    pub fn evaluate(&self, entry: &AttributeMap) -> ConnectorResult<bool> {
        let mut scope = Scope::new();
        scope.push(ENTRY_VAR, entry.clone());

        let result = self
            .engine
            .eval(&mut scope, &self.ast)
            .map_err(|message| ConnectorError::FilterPredicate {
                dn: entry.dn(),
                message,
            })?;

        result
            .as_bool()
            .map_err(|type_name| ConnectorError::FilterPredicate {
                dn: entry.dn(),
                message: format!("predicate returned {type_name}, expected bool"),
            })
    }
}

/// Outcome of the accept check for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The entry becomes a row.
    Accepted,
    /// The predicate returned false.
    Rejected,
    /// The predicate failed; the entry is dropped.
    Failed,
}

/// Run the accept check for an entry.
///
/// Without a predicate every entry is accepted. Rejections are logged at
/// debug level and failures at warn level.
pub fn verdict(predicate: Option<&AcceptPredicate>, entry: &AttributeMap) -> Verdict {
    let Some(predicate) = predicate else {
        return Verdict::Accepted;
    };

    match predicate.evaluate(entry) {
        Ok(true) => Verdict::Accepted,
        Ok(false) => {
            debug!(dn = %entry.dn(), "Entry rejected by accept predicate");
            Verdict::Rejected
        }
        Err(e) => {
            warn!(dn = %entry.dn(), error = %e, "Accept predicate failed, dropping entry");
            Verdict::Failed
        }
    }
}

/// Decide whether an entry becomes a row.
pub fn accept(predicate: Option<&AcceptPredicate>, entry: &AttributeMap) -> bool {
    verdict(predicate, entry) == Verdict::Accepted
}

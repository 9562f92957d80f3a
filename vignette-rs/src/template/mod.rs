//! The `{{ expr }}` template language.
//!
//! Scenario files parameterize requests and assertions with expressions
//! wrapped in double braces. Everything outside the braces is literal text;
//! inside, an expression reads from the data tree handed to
//! [`Template::execute`]:
//!
//! | Form                     | Meaning                        |
//! |--------------------------|--------------------------------|
//! | `{{name}}`               | top-level lookup               |
//! | `{{a.b.c}}`              | nested field access            |
//! | `{{a[0]}}`, `{{a["k"]}}` | sequence / map indexing        |
//! | `{{f(x, "y")}}`          | host function call             |
//! | `{{"v=" + x}}`           | addition / concatenation       |
//! | `{{}}`                   | empty parameter, renders as "" |
//!
//! A template that is exactly one parameter keeps the resolved value's
//! native type; any mix of literal text and parameters renders a string.
//!
//! ```
//! use vignette::{Template, Value};
//!
//! let t = Template::new("hello, {{name}}!").expect("parses");
//! let data = Value::from(serde_json::json!({"name": "scenario"}));
//! assert_eq!(
//!     t.execute(&data).expect("executes").to_string(),
//!     "hello, scenario!",
//! );
//! ```

use thiserror::Error;

use crate::value::Value;

pub mod ast;
pub mod eval;
mod lexer;
pub mod parser;
pub mod token;

pub use eval::{EvalError, Template};
pub use parser::{ParseError, ParseErrors, Parser};

// ── Errors ────────────────────────────────────────────────────────────────────

/// Any way templating can fail: syntax at parse time, lookup or type
/// problems at run time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseErrors),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

// ── Structural execution ──────────────────────────────────────────────────────

/// Render every templated string inside a data tree.
///
/// Strings run through [`Template`] when they contain `{{`; other strings
/// and non-string leaves pass through untouched. Map keys are never
/// templated. Sequences and maps come back rebuilt with each element
/// rendered against the same `data`.
///
/// A string that is exactly one parameter keeps its native type, which is
/// how `"retries": "{{vars.retries}}"` comes back as an integer.
///
/// ```
/// use vignette::{execute, Value};
///
/// let input = Value::from(serde_json::json!({
///     "url": "https://{{vars.host}}/health",
///     "retries": 3,
/// }));
/// let data = Value::from(serde_json::json!({"vars": {"host": "example.com"}}));
/// assert_eq!(
///     execute(&input, &data).expect("renders"),
///     Value::from(serde_json::json!({
///         "url": "https://example.com/health",
///         "retries": 3,
///     })),
/// );
/// ```
pub fn execute(input: &Value, data: &Value) -> Result<Value, Error> {
    match input {
        Value::String(s) => {
            if !s.contains("{{") {
                return Ok(input.clone());
            }
            Ok(Template::new(s)?.execute(data)?)
        }
        Value::Seq(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(execute(item, data)?);
            }
            Ok(Value::Seq(out))
        }
        Value::Map(entries) => {
            let mut out = std::collections::BTreeMap::new();
            for (k, v) in entries {
                out.insert(k.clone(), execute(v, data)?);
            }
            Ok(Value::Map(out))
        }
        other => Ok(other.clone()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

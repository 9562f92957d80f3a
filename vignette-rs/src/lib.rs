//! Templating for vignette scenario files.
//!
//! A scenario describes requests and assertions as plain data (decoded from
//! YAML or JSON); any string in that data can embed `{{ expr }}` parameters
//! that resolve against the variables and step history of the running
//! scenario. This crate is the template engine: a hand-written lexer and a
//! recursive-descent parser produce a positioned syntax tree, and an
//! immutable [`Template`] executes that tree against a [`Value`] data tree.
//!
//! ```
//! use vignette::{Template, Value};
//!
//! let t = Template::new("https://{{vars.host}}/users").expect("parses");
//! let data = Value::from(serde_json::json!({
//!     "vars": {"host": "api.example.com"},
//! }));
//! assert_eq!(
//!     t.execute(&data).expect("executes"),
//!     Value::from("https://api.example.com/users"),
//! );
//! ```
//!
//! Templates never mutate during execution: parse once, share the
//! [`Template`] across threads, execute with per-run data.

pub mod template;
pub mod value;

pub use template::{execute, Error, EvalError, ParseError, ParseErrors, Parser, Template};
pub use value::{Func, Record, Value};

// ── Tracing ───────────────────────────────────────────────────────────────────

// With the `tracing` feature off, these compile to nothing.

#[cfg(feature = "tracing")]
#[allow(unused_imports)]
pub(crate) use tracing::{debug, trace};

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! trace {
    ($($tt:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! debug {
    ($($tt:tt)*) => {};
}

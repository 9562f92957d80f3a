//! Template execution.
//!
//! [`Template`] pairs a parsed tree with its source. Execution walks the
//! tree against one data value and either produces a value or stops at the
//! first failure; nothing in the walk mutates the template, so a single
//! instance can serve any number of concurrent executions.
//!
//! Failure messages quote positions and access paths from the template
//! source, never values from the data tree: scenario data regularly carries
//! credentials.

use thiserror::Error;

use crate::value::Value;
use crate::{debug, trace};

use super::ast::{BinOp, Expr, IndexExpr, LitKind};
use super::parser::{ParseErrors, Parser};
use super::token::Pos;

// ── Errors ────────────────────────────────────────────────────────────────────

/// A runtime failure, located at a byte position in the template source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error(r#"position {pos}: "{path}" not found"#)]
    NotFound { pos: Pos, path: String },

    #[error("position {pos}: index {index} out of range (len {len})")]
    IndexOutOfRange { pos: Pos, index: i64, len: usize },

    #[error("position {pos}: sequence index must be an integer, not {got}")]
    SeqIndexType { pos: Pos, got: &'static str },

    #[error("position {pos}: key must be a string, not {got}")]
    KeyType { pos: Pos, got: &'static str },

    #[error("position {pos}: {got} is not indexable")]
    NotIndexable { pos: Pos, got: &'static str },

    #[error(r#"position {pos}: "{path}" is not callable"#)]
    NotCallable { pos: Pos, path: String },

    #[error("position {pos}: {name} expects {want} arguments, got {got}")]
    Arity {
        pos: Pos,
        name: String,
        want: usize,
        got: usize,
    },

    #[error("position {pos}: call to {name} failed: {message}")]
    CallFailed {
        pos: Pos,
        name: String,
        message: String,
    },

    #[error("position {pos}: cannot add {left} and {right}")]
    CannotAdd {
        pos: Pos,
        left: &'static str,
        right: &'static str,
    },

    #[error("position {pos}: integer addition overflowed")]
    Overflow { pos: Pos },

    #[error(r#"position {pos}: invalid integer literal "{lit}""#)]
    IntLiteral { pos: Pos, lit: String },
}

// ── Template ──────────────────────────────────────────────────────────────────

/// A parsed, reusable template.
#[derive(Debug, Clone)]
pub struct Template {
    src: String,
    root: Expr,
}

impl Template {
    /// Parse `source` into a template, reporting every syntax error at once.
    pub fn new(source: &str) -> Result<Template, ParseErrors> {
        match Parser::new(source).parse() {
            Ok(root) => {
                trace!(len = source.len(), "template parsed");
                Ok(Template {
                    src: source.to_owned(),
                    root,
                })
            }
            Err(errs) => {
                debug!(errors = errs.len(), "template parse failed");
                Err(errs)
            }
        }
    }

    /// The source the template was parsed from.
    pub fn source(&self) -> &str {
        &self.src
    }

    /// Evaluate against `data`, stopping at the first failure.
    ///
    /// A source that is exactly one parameter keeps the native type of
    /// whatever the parameter resolves to; any mix of literal text and
    /// parameters renders to a string.
    pub fn execute(&self, data: &Value) -> Result<Value, EvalError> {
        let result = eval(&self.root, data);
        trace!(ok = result.is_ok(), "template executed");
        result
    }
}

// ── Evaluation ────────────────────────────────────────────────────────────────

fn eval(expr: &Expr, data: &Value) -> Result<Value, EvalError> {
    match expr {
        Expr::BasicLit(lit) => match lit.kind {
            LitKind::String => Ok(Value::String(lit.value.clone())),
            LitKind::Int => {
                lit.value
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| EvalError::IntLiteral {
                        pos: lit.value_pos,
                        lit: lit.value.clone(),
                    })
            }
        },
        Expr::Ident(id) => data.member(&id.name).ok_or_else(|| EvalError::NotFound {
            pos: id.name_pos,
            path: id.name.clone(),
        }),
        Expr::Selector(sel) => {
            let x = eval(&sel.x, data)?;
            x.member(&sel.sel.name).ok_or_else(|| EvalError::NotFound {
                pos: sel.sel.name_pos,
                path: chain_path(expr),
            })
        }
        Expr::Index(idx) => eval_index(idx, expr, data),
        Expr::Call(call) => {
            let fun = eval(&call.fun, data)?;
            let Value::Func(func) = fun else {
                return Err(EvalError::NotCallable {
                    pos: call.fun.pos(),
                    path: chain_path(&call.fun),
                });
            };
            let mut args = Vec::with_capacity(call.args.len());
            for arg in &call.args {
                args.push(eval(arg, data)?);
            }
            if let Some(want) = func.arity() {
                if want != args.len() {
                    return Err(EvalError::Arity {
                        pos: call.lparen,
                        name: func.name().to_owned(),
                        want,
                        got: args.len(),
                    });
                }
            }
            func.call(&args).map_err(|message| EvalError::CallFailed {
                pos: call.lparen,
                name: func.name().to_owned(),
                message,
            })
        }
        Expr::Binary(bin) => {
            let x = eval(&bin.x, data)?;
            let y = eval(&bin.y, data)?;
            match bin.op {
                BinOp::Add => add(x, y, bin.op_pos),
            }
        }
        Expr::Parameter(param) => match &param.x {
            Some(x) => eval(x, data),
            None => Ok(Value::String(String::new())),
        },
    }
}

fn eval_index(idx: &IndexExpr, expr: &Expr, data: &Value) -> Result<Value, EvalError> {
    let x = eval(&idx.x, data)?;
    let index = eval(&idx.index, data)?;
    match &x {
        Value::Seq(items) => {
            let Value::Int(i) = &index else {
                return Err(EvalError::SeqIndexType {
                    pos: idx.index.pos(),
                    got: index.type_name(),
                });
            };
            usize::try_from(*i)
                .ok()
                .and_then(|n| items.get(n).cloned())
                .ok_or(EvalError::IndexOutOfRange {
                    pos: idx.index.pos(),
                    index: *i,
                    len: items.len(),
                })
        }
        Value::Map(entries) => {
            let Value::String(key) = &index else {
                return Err(EvalError::KeyType {
                    pos: idx.index.pos(),
                    got: index.type_name(),
                });
            };
            entries
                .get(key)
                .cloned()
                .ok_or_else(|| EvalError::NotFound {
                    pos: idx.lbrack,
                    path: chain_path(expr),
                })
        }
        Value::Record(rec) => {
            let Value::String(key) = &index else {
                return Err(EvalError::KeyType {
                    pos: idx.index.pos(),
                    got: index.type_name(),
                });
            };
            rec.field(key).ok_or_else(|| EvalError::NotFound {
                pos: idx.lbrack,
                path: chain_path(expr),
            })
        }
        other => Err(EvalError::NotIndexable {
            pos: idx.lbrack,
            got: other.type_name(),
        }),
    }
}

// Integers add numerically (checked), mixed int/float promotes to float,
// and any other scalar pair concatenates through Display. Containers,
// records, and functions refuse.
fn add(x: Value, y: Value, op_pos: Pos) -> Result<Value, EvalError> {
    match (&x, &y) {
        (Value::Int(a), Value::Int(b)) => a
            .checked_add(*b)
            .map(Value::Int)
            .ok_or(EvalError::Overflow { pos: op_pos }),
        (Value::Int(a), Value::Float(b)) => Ok(Value::Float(*a as f64 + *b)),
        (Value::Float(a), Value::Int(b)) => Ok(Value::Float(*a + *b as f64)),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(*a + *b)),
        _ => {
            if !x.is_scalar() || !y.is_scalar() {
                return Err(EvalError::CannotAdd {
                    pos: op_pos,
                    left: x.type_name(),
                    right: y.type_name(),
                });
            }
            Ok(Value::String(format!("{x}{y}")))
        }
    }
}

/// Rebuild the access path for a not-found or not-callable report,
/// e.g. `steps[0].response.id`.
fn chain_path(expr: &Expr) -> String {
    match expr {
        Expr::BasicLit(lit) => lit.value.clone(),
        Expr::Ident(id) => id.name.clone(),
        Expr::Selector(sel) => format!("{}.{}", chain_path(&sel.x), sel.sel.name),
        Expr::Index(idx) => match idx.index.as_ref() {
            Expr::BasicLit(lit) => format!("{}[{}]", chain_path(&idx.x), lit.value),
            _ => format!("{}[..]", chain_path(&idx.x)),
        },
        Expr::Call(call) => format!("{}()", chain_path(&call.fun)),
        Expr::Binary(bin) => chain_path(&bin.x),
        Expr::Parameter(param) => param.x.as_deref().map(chain_path).unwrap_or_default(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::value::Func;

    fn data(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    fn exec(src: &str, data: &Value) -> Result<Value, EvalError> {
        Template::new(src).expect("template parses").execute(data)
    }

    #[test]
    fn template_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Template>();
        assert_send_sync::<Value>();
    }

    #[test]
    fn literal_only_passes_through() {
        assert_eq!(
            exec("plain", &Value::Null),
            Ok(Value::String("plain".into())),
        );
    }

    #[test]
    fn empty_parameter_renders_empty_string() {
        assert_eq!(exec("{{}}", &Value::Null), Ok(Value::String(String::new())));
    }

    #[test]
    fn single_parameter_keeps_native_type() {
        assert_eq!(exec("{{1}}", &Value::Null), Ok(Value::Int(1)));
        let d = data(serde_json::json!({"flag": true}));
        assert_eq!(exec("{{flag}}", &d), Ok(Value::Bool(true)));
        assert_eq!(exec("{{ flag }}", &d), Ok(Value::Bool(true)));
    }

    #[test]
    fn mixed_template_stringifies() {
        assert_eq!(
            exec(" {{1}} ", &Value::Null),
            Ok(Value::String(" 1 ".into())),
        );
    }

    #[test]
    fn adjacent_parameters_add_natively() {
        assert_eq!(exec("{{1}}{{2}}", &Value::Null), Ok(Value::Int(3)));
    }

    #[test]
    fn int_addition_overflow() {
        let err = exec("{{ 9223372036854775807 + 1 }}", &Value::Null).unwrap_err();
        assert_eq!(err, EvalError::Overflow { pos: 24 });
    }

    #[test]
    fn int_float_promotion() {
        let d = data(serde_json::json!({"ratio": 0.5}));
        assert_eq!(exec("{{ ratio + 1 }}", &d), Ok(Value::Float(1.5)));
        assert_eq!(exec("{{ 1 + ratio }}", &d), Ok(Value::Float(1.5)));
    }

    #[test]
    fn scalar_concatenation_goes_through_display() {
        let d = data(serde_json::json!({"flag": true, "none": null}));
        assert_eq!(
            exec(r#"{{ "x=" + flag }}"#, &d),
            Ok(Value::String("x=true".into())),
        );
        assert_eq!(
            exec(r#"{{ "v:" + none }}"#, &d),
            Ok(Value::String("v:null".into())),
        );
        assert_eq!(
            exec(r#"{{ 1 + "s" }}"#, &Value::Null),
            Ok(Value::String("1s".into())),
        );
    }

    #[test]
    fn containers_do_not_add() {
        let d = data(serde_json::json!({"items": [1, 2]}));
        let err = exec(r#"{{ items + "x" }}"#, &d).unwrap_err();
        assert_eq!(
            err,
            EvalError::CannotAdd {
                pos: 10,
                left: "sequence",
                right: "string",
            },
        );
    }

    #[test]
    fn missing_name_reports_path() {
        let d = data(serde_json::json!({"a": {}}));
        let err = exec("{{ a.b }}", &d).unwrap_err();
        assert_eq!(
            err,
            EvalError::NotFound {
                pos: 6,
                path: "a.b".into(),
            },
        );
        assert_eq!(err.to_string(), r#"position 6: "a.b" not found"#);
    }

    #[test]
    fn evaluation_stops_at_first_error() {
        let d = data(serde_json::json!({}));
        let err = exec("{{missing1}}{{missing2}}", &d).unwrap_err();
        assert_eq!(
            err,
            EvalError::NotFound {
                pos: 3,
                path: "missing1".into(),
            },
        );
    }

    #[test]
    fn index_errors() {
        let d = data(serde_json::json!({"items": [10, 20], "m": {"k": 1}}));
        assert_eq!(exec("{{items[1]}}", &d), Ok(Value::Int(20)));
        assert_eq!(exec(r#"{{m["k"]}}"#, &d), Ok(Value::Int(1)));

        assert_eq!(
            exec("{{items[2]}}", &d).unwrap_err(),
            EvalError::IndexOutOfRange {
                pos: 9,
                index: 2,
                len: 2,
            },
        );
        let neg = data(serde_json::json!({"items": [10], "i": -1}));
        assert_eq!(
            exec("{{items[i]}}", &neg).unwrap_err(),
            EvalError::IndexOutOfRange {
                pos: 9,
                index: -1,
                len: 1,
            },
        );
        assert_eq!(
            exec(r#"{{items["k"]}}"#, &d).unwrap_err(),
            EvalError::SeqIndexType {
                pos: 9,
                got: "string",
            },
        );
        assert_eq!(
            exec("{{m[0]}}", &d).unwrap_err(),
            EvalError::KeyType { pos: 5, got: "int" },
        );
        assert_eq!(
            exec("{{m[0]}}", &data(serde_json::json!({"m": 3}))).unwrap_err(),
            EvalError::NotIndexable { pos: 4, got: "int" },
        );
    }

    #[test]
    fn map_miss_through_index_reports_path() {
        let d = data(serde_json::json!({"m": {}}));
        let err = exec(r#"{{m["k"]}}"#, &d).unwrap_err();
        assert_eq!(
            err,
            EvalError::NotFound {
                pos: 4,
                path: "m[k]".into(),
            },
        );
    }

    #[test]
    fn call_errors() {
        let mut entries = BTreeMap::new();
        entries.insert(
            "f".to_owned(),
            Value::from(Func::new("f", |args| Ok(args[0].clone())).with_arity(1)),
        );
        entries.insert("x".to_owned(), Value::Int(1));
        let d = Value::Map(entries);

        assert_eq!(exec("{{f(42)}}", &d), Ok(Value::Int(42)));
        assert_eq!(
            exec("{{x(1)}}", &d).unwrap_err(),
            EvalError::NotCallable {
                pos: 3,
                path: "x".into(),
            },
        );
        assert_eq!(
            exec("{{f(1,2)}}", &d).unwrap_err(),
            EvalError::Arity {
                pos: 4,
                name: "f".into(),
                want: 1,
                got: 2,
            },
        );
    }

    #[test]
    fn call_failure_carries_position_and_message() {
        let mut entries = BTreeMap::new();
        entries.insert(
            "boom".to_owned(),
            Value::from(Func::new("boom", |_| Err("told you".to_owned()))),
        );
        let d = Value::Map(entries);
        let err = exec("{{ boom() }}", &d).unwrap_err();
        assert_eq!(
            err,
            EvalError::CallFailed {
                pos: 8,
                name: "boom".into(),
                message: "told you".into(),
            },
        );
        assert_eq!(err.to_string(), "position 8: call to boom failed: told you");
    }

    #[test]
    fn huge_int_literal_fails_at_eval() {
        let err = exec("{{ 99999999999999999999 }}", &Value::Null).unwrap_err();
        assert_eq!(
            err,
            EvalError::IntLiteral {
                pos: 4,
                lit: "99999999999999999999".into(),
            },
        );
    }

    #[test]
    fn source_is_kept() {
        let t = Template::new("{{a}}").expect("parses");
        assert_eq!(t.source(), "{{a}}");
    }

    #[test]
    fn parse_failure_reports_all_errors() {
        let errs = Template::new("{{.a}} {{.b}}").expect_err("bad template");
        assert_eq!(errs.len(), 2);
    }
}

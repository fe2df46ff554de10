//! The standard library of the Sorrel query language.
//!
//! Every builtin is a *builder*: given its argument ASTs and the compile
//! context it compiles those arguments once, captures the resulting
//! sub-evaluators, and returns an evaluator of its own. Runtime dispatch is
//! therefore O(1) per call; no table lookups happen while a query runs.
//!
//! Runtime type errors are reserved for operations whose semantics cannot
//! reasonably default (`split` on a non-string, `map` on a non-array,
//! arithmetic on non-numbers). Property access never errors: an absent or
//! mistyped step yields null and the rest of the path stays null.

use indexmap::IndexMap;
use regex::RegexBuilder;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use std::cmp::Ordering;
use std::sync::Arc;

use crate::ast::Ast;
use crate::compile::{CompileCtx, CompileError, Evaluator, FunctionBuilder};
use crate::output;
use crate::value::Value;

/// Errors that can occur while an evaluator runs.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// An operation met a value whose type it cannot default over
    Type {
        op: &'static str,
        observed: &'static str,
    },
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::Type { op, observed } => {
                write!(f, "Type error in '{}': unexpected {}", op, observed)
            }
        }
    }
}

impl std::error::Error for EvalError {}

/// Dispatch a core function by name.
///
/// Returns `None` for names the standard library does not know, so the
/// compiler can report `UnknownFunction`. User builders are consulted
/// before this table and shadow it.
pub(crate) fn build_core(
    name: &str,
    args: &[Ast],
    ctx: &CompileCtx,
) -> Option<Result<Evaluator, CompileError>> {
    let result = match name {
        "pipe" => build_pipe(args, ctx),
        "object" => build_object_call(args, ctx),
        "array" => build_array(args, ctx),
        "get" => build_get(args),
        "map" => build_map(args, ctx),
        "filter" => build_filter(args, ctx),
        "sort" => build_sort(args, ctx),
        "reverse" => build_reverse(args),
        "pick" => build_pick(args),
        "groupBy" => build_group_by(args, ctx),
        "keyBy" => build_key_by(args, ctx),
        "flatten" => build_flatten(args),
        "join" => build_join(args),
        "uniq" => build_uniq(args),
        "uniqBy" => build_uniq_by(args, ctx),
        "limit" => build_limit(args),
        "size" => build_size(args),
        "keys" => build_keys(args),
        "values" => build_values(args),
        "sum" | "prod" | "average" | "min" | "max" => build_fold(fold_name(name), args),
        "split" => build_split(args, ctx),
        "substring" => build_substring(args, ctx),
        "add" => build_arithmetic("add", args, ctx, |a, b| a + b),
        "subtract" => build_arithmetic("subtract", args, ctx, |a, b| a - b),
        "multiply" => build_arithmetic("multiply", args, ctx, |a, b| a * b),
        "divide" => build_arithmetic("divide", args, ctx, |a, b| a / b),
        "pow" => build_arithmetic("pow", args, ctx, f64::powf),
        "mod" => build_arithmetic("mod", args, ctx, |a, b| a % b),
        "abs" => build_abs(args, ctx),
        "round" => build_round(args, ctx),
        "eq" => build_equality(args, ctx, false),
        "ne" => build_equality(args, ctx, true),
        "gt" | "gte" | "lt" | "lte" => build_comparison(cmp_name(name), args, ctx),
        "and" => build_logic("and", args, ctx),
        "or" => build_logic("or", args, ctx),
        "not" => build_not(args, ctx),
        "if" => build_if(args, ctx),
        "exists" => build_exists(args),
        "in" => build_in("in", args, ctx),
        "not in" => build_in("not in", args, ctx),
        "regex" => build_regex(args, ctx),
        "number" => build_number(args, ctx),
        "string" => build_string(args, ctx),
        _ => return None,
    };
    Some(result)
}

// `match` arms can't borrow the short-lived `name`, so folds and
// comparisons re-key onto 'static names here.
fn fold_name(name: &str) -> &'static str {
    match name {
        "sum" => "sum",
        "prod" => "prod",
        "average" => "average",
        "min" => "min",
        _ => "max",
    }
}

fn cmp_name(name: &str) -> &'static str {
    match name {
        "gt" => "gt",
        "gte" => "gte",
        "lt" => "lt",
        _ => "lte",
    }
}

/// Wrap a plain value-level function into a builder.
///
/// The returned builder compiles each argument AST and feeds the evaluated
/// argument values to `f` at runtime. This is the simplest way to register
/// a user function:
///
/// ```
/// use sorrel_lang::{build_function, query_with, Options, Value};
/// use serde_json::json;
///
/// let mut options = Options::default();
/// options.functions.insert(
///     "double".to_string(),
///     build_function(|args| match args {
///         [Value::Number(n)] => Ok(Value::Number(n * 2.0)),
///         _ => Ok(Value::Null),
///     }),
/// );
///
/// let data = Value::from_json(json!({"x": 21}));
/// let result = query_with(&data, "double(.x)", &options).unwrap();
/// assert_eq!(result, Value::Number(42.0));
/// ```
pub fn build_function<F>(f: F) -> FunctionBuilder
where
    F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Box::new(move |args, ctx| {
        let evals = compile_all(args, ctx)?;
        let f = Arc::clone(&f);
        Ok(Box::new(move |input| {
            let mut values = Vec::with_capacity(evals.len());
            for eval in &evals {
                values.push(eval(input)?);
            }
            f(&values)
        }))
    })
}

// ---------------------------------------------------------------------------
// Compile-time helpers

fn check_arity(
    name: &'static str,
    args: &[Ast],
    low: usize,
    high: usize,
    expected: &'static str,
) -> Result<(), CompileError> {
    if args.len() < low || args.len() > high {
        return Err(CompileError::Arity {
            name: name.to_string(),
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}

fn compile_all(args: &[Ast], ctx: &CompileCtx) -> Result<Vec<Evaluator>, CompileError> {
    args.iter().map(|arg| ctx.compile(arg)).collect()
}

fn literal_str(name: &'static str, arg: &Ast) -> Result<String, CompileError> {
    match arg {
        Ast::Literal(Value::String(s)) => Ok(s.clone()),
        _ => Err(CompileError::InvalidArgument {
            name: name.to_string(),
            message: "expected a literal string".to_string(),
        }),
    }
}

fn literal_number(name: &'static str, arg: &Ast) -> Result<f64, CompileError> {
    match arg {
        Ast::Literal(Value::Number(n)) => Ok(*n),
        _ => Err(CompileError::InvalidArgument {
            name: name.to_string(),
            message: "expected a literal number".to_string(),
        }),
    }
}

/// One step of a literal property path, pre-resolved for both container
/// kinds: `name` is the object key form, `index` the array index form (an
/// integer literal, or a string that spells one).
#[derive(Clone)]
struct PathKey {
    name: String,
    index: Option<i64>,
}

impl PathKey {
    fn from_literal(name: &'static str, arg: &Ast) -> Result<PathKey, CompileError> {
        match arg {
            Ast::Literal(Value::String(s)) => Ok(PathKey {
                index: s.parse::<i64>().ok(),
                name: s.clone(),
            }),
            Ast::Literal(Value::Number(n)) => Ok(PathKey {
                name: output::to_json(&Value::Number(*n)),
                index: (n.fract() == 0.0 && n.is_finite()).then(|| *n as i64),
            }),
            _ => Err(CompileError::InvalidArgument {
                name: name.to_string(),
                message: "path keys must be literal strings or numbers".to_string(),
            }),
        }
    }
}

/// Extract the literal key path of a `get(...)` argument, as used by
/// `pick` and `exists`.
fn get_path(name: &'static str, arg: &Ast) -> Result<Vec<PathKey>, CompileError> {
    match arg {
        Ast::Function(f, keys) if f == "get" => keys
            .iter()
            .map(|key| PathKey::from_literal(name, key))
            .collect(),
        _ => Err(CompileError::InvalidArgument {
            name: name.to_string(),
            message: "expected a property path".to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Runtime helpers

fn step<'v>(current: &'v Value, key: &PathKey) -> Option<&'v Value> {
    match current {
        Value::Object(map) => map.get(&key.name),
        Value::Array(arr) => {
            let index = key.index?;
            let index = if index < 0 {
                arr.len().checked_sub(index.unsigned_abs() as usize)?
            } else {
                index as usize
            };
            arr.get(index)
        }
        _ => None,
    }
}

fn walk<'v>(input: &'v Value, path: &[PathKey]) -> Option<&'v Value> {
    let mut current = input;
    for key in path {
        current = step(current, key)?;
    }
    Some(current)
}

fn expect_array<'v>(op: &'static str, value: &'v Value) -> Result<&'v [Value], EvalError> {
    match value {
        Value::Array(arr) => Ok(arr),
        other => Err(EvalError::Type {
            op,
            observed: other.type_name(),
        }),
    }
}

fn expect_number(op: &'static str, value: &Value) -> Result<f64, EvalError> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(EvalError::Type {
            op,
            observed: other.type_name(),
        }),
    }
}

fn expect_string<'v>(op: &'static str, value: &'v Value) -> Result<&'v str, EvalError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(EvalError::Type {
            op,
            observed: other.type_name(),
        }),
    }
}

/// The `string()` conversion, also used to key `groupBy`/`keyBy`/`uniqBy`
/// and to join non-string elements: strings pass through unquoted,
/// everything else takes its canonical JSON form.
fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => output::to_json(other),
    }
}

// ---------------------------------------------------------------------------
// Structural builders

pub(crate) fn build_pipe(parts: &[Ast], ctx: &CompileCtx) -> Result<Evaluator, CompileError> {
    let evals = compile_all(parts, ctx)?;
    Ok(Box::new(move |input| {
        let mut current: Option<Value> = None;
        for eval in &evals {
            let next = match &current {
                Some(value) => eval(value)?,
                None => eval(input)?,
            };
            current = Some(next);
        }
        // An empty pipe is the identity
        Ok(current.unwrap_or_else(|| input.clone()))
    }))
}

pub(crate) fn build_object(
    pairs: &[(String, Ast)],
    ctx: &CompileCtx,
) -> Result<Evaluator, CompileError> {
    let mut compiled = Vec::with_capacity(pairs.len());
    for (key, ast) in pairs {
        compiled.push((key.clone(), ctx.compile(ast)?));
    }
    Ok(Box::new(move |input| {
        let mut map = IndexMap::with_capacity(compiled.len());
        for (key, eval) in &compiled {
            map.insert(key.clone(), eval(input)?);
        }
        Ok(Value::Object(map))
    }))
}

// `object` in call position, as the structured form spells it:
// ["object", {...}]
fn build_object_call(args: &[Ast], ctx: &CompileCtx) -> Result<Evaluator, CompileError> {
    match args {
        [ast @ Ast::Object(_)] => ctx.compile(ast),
        _ => Err(CompileError::InvalidArgument {
            name: "object".to_string(),
            message: "expected a single object of sub-queries".to_string(),
        }),
    }
}

pub(crate) fn build_array(items: &[Ast], ctx: &CompileCtx) -> Result<Evaluator, CompileError> {
    let evals = compile_all(items, ctx)?;
    Ok(Box::new(move |input| {
        let mut result = Vec::with_capacity(evals.len());
        for eval in &evals {
            result.push(eval(input)?);
        }
        Ok(Value::Array(result))
    }))
}

fn build_get(args: &[Ast]) -> Result<Evaluator, CompileError> {
    let path = args
        .iter()
        .map(|arg| PathKey::from_literal("get", arg))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Box::new(move |input| {
        Ok(walk(input, &path).cloned().unwrap_or(Value::Null))
    }))
}

// ---------------------------------------------------------------------------
// Collection builders

fn build_map(args: &[Ast], ctx: &CompileCtx) -> Result<Evaluator, CompileError> {
    check_arity("map", args, 1, 1, "1")?;
    let callback = ctx.compile(&args[0])?;
    Ok(Box::new(move |input| {
        let arr = expect_array("map", input)?;
        let mut result = Vec::with_capacity(arr.len());
        for item in arr {
            result.push(callback(item)?);
        }
        Ok(Value::Array(result))
    }))
}

fn build_filter(args: &[Ast], ctx: &CompileCtx) -> Result<Evaluator, CompileError> {
    check_arity("filter", args, 1, 1, "1")?;
    let callback = ctx.compile(&args[0])?;
    Ok(Box::new(move |input| {
        let arr = expect_array("filter", input)?;
        let mut result = Vec::new();
        for item in arr {
            if callback(item)?.is_truthy() {
                result.push(item.clone());
            }
        }
        Ok(Value::Array(result))
    }))
}

fn build_sort(args: &[Ast], ctx: &CompileCtx) -> Result<Evaluator, CompileError> {
    check_arity("sort", args, 0, 2, "0-2")?;
    let key = match args.first() {
        Some(ast) => Some(ctx.compile(ast)?),
        None => None,
    };
    let descending = match args.get(1) {
        Some(arg) => match literal_str("sort", arg)?.as_str() {
            "asc" => false,
            "desc" => true,
            other => {
                return Err(CompileError::InvalidArgument {
                    name: "sort".to_string(),
                    message: format!("direction must be \"asc\" or \"desc\", got \"{}\"", other),
                });
            }
        },
        None => false,
    };
    Ok(Box::new(move |input| {
        let arr = expect_array("sort", input)?;
        let mut keyed = Vec::with_capacity(arr.len());
        for item in arr {
            let k = match &key {
                Some(eval) => eval(item)?,
                None => item.clone(),
            };
            keyed.push((k, item.clone()));
        }
        // Stable; incomparable pairs stay in input order
        keyed.sort_by(|a, b| {
            let ord = a.0.compare(&b.0).unwrap_or(Ordering::Equal);
            if descending { ord.reverse() } else { ord }
        });
        Ok(Value::Array(keyed.into_iter().map(|(_, item)| item).collect()))
    }))
}

fn build_reverse(args: &[Ast]) -> Result<Evaluator, CompileError> {
    check_arity("reverse", args, 0, 0, "0")?;
    Ok(Box::new(move |input| {
        let arr = expect_array("reverse", input)?;
        Ok(Value::Array(arr.iter().rev().cloned().collect()))
    }))
}

fn build_pick(args: &[Ast]) -> Result<Evaluator, CompileError> {
    check_arity("pick", args, 1, usize::MAX, "1 or more")?;
    let mut paths = Vec::with_capacity(args.len());
    for arg in args {
        let path = get_path("pick", arg)?;
        match path.last() {
            Some(last) => paths.push((last.name.clone(), path)),
            None => {
                return Err(CompileError::InvalidArgument {
                    name: "pick".to_string(),
                    message: "paths must have at least one key".to_string(),
                });
            }
        }
    }
    let pick_one = move |input: &Value, paths: &[(String, Vec<PathKey>)]| {
        let mut map = IndexMap::with_capacity(paths.len());
        for (last, path) in paths {
            let value = walk(input, path).cloned().unwrap_or(Value::Null);
            map.insert(last.clone(), value);
        }
        Value::Object(map)
    };
    Ok(Box::new(move |input| match input {
        Value::Array(arr) => Ok(Value::Array(
            arr.iter().map(|item| pick_one(item, &paths)).collect(),
        )),
        Value::Object(_) => Ok(pick_one(input, &paths)),
        _ => Ok(Value::Null),
    }))
}

fn build_group_by(args: &[Ast], ctx: &CompileCtx) -> Result<Evaluator, CompileError> {
    check_arity("groupBy", args, 1, 1, "1")?;
    let key = ctx.compile(&args[0])?;
    Ok(Box::new(move |input| {
        let arr = expect_array("groupBy", input)?;
        let mut groups: IndexMap<String, Vec<Value>> = IndexMap::new();
        for item in arr {
            let k = stringify_value(&key(item)?);
            groups.entry(k).or_default().push(item.clone());
        }
        Ok(Value::Object(
            groups.into_iter().map(|(k, v)| (k, Value::Array(v))).collect(),
        ))
    }))
}

fn build_key_by(args: &[Ast], ctx: &CompileCtx) -> Result<Evaluator, CompileError> {
    check_arity("keyBy", args, 1, 1, "1")?;
    let key = ctx.compile(&args[0])?;
    Ok(Box::new(move |input| {
        let arr = expect_array("keyBy", input)?;
        let mut map: IndexMap<String, Value> = IndexMap::new();
        for item in arr {
            let k = stringify_value(&key(item)?);
            // First occurrence wins; later collisions are ignored
            map.entry(k).or_insert_with(|| item.clone());
        }
        Ok(Value::Object(map))
    }))
}

fn build_flatten(args: &[Ast]) -> Result<Evaluator, CompileError> {
    check_arity("flatten", args, 0, 0, "0")?;
    Ok(Box::new(move |input| {
        let arr = expect_array("flatten", input)?;
        let mut result = Vec::with_capacity(arr.len());
        for item in arr {
            match item {
                Value::Array(inner) => result.extend(inner.iter().cloned()),
                other => result.push(other.clone()),
            }
        }
        Ok(Value::Array(result))
    }))
}

fn build_join(args: &[Ast]) -> Result<Evaluator, CompileError> {
    check_arity("join", args, 0, 1, "0-1")?;
    let separator = match args.first() {
        Some(arg) => literal_str("join", arg)?,
        None => String::new(),
    };
    Ok(Box::new(move |input| {
        let arr = expect_array("join", input)?;
        let parts: Vec<String> = arr.iter().map(stringify_value).collect();
        Ok(Value::String(parts.join(&separator)))
    }))
}

fn build_uniq(args: &[Ast]) -> Result<Evaluator, CompileError> {
    check_arity("uniq", args, 0, 0, "0")?;
    Ok(Box::new(move |input| {
        let arr = expect_array("uniq", input)?;
        let mut result: Vec<Value> = Vec::new();
        for item in arr {
            if !result.contains(item) {
                result.push(item.clone());
            }
        }
        Ok(Value::Array(result))
    }))
}

fn build_uniq_by(args: &[Ast], ctx: &CompileCtx) -> Result<Evaluator, CompileError> {
    check_arity("uniqBy", args, 1, 1, "1")?;
    let key = ctx.compile(&args[0])?;
    Ok(Box::new(move |input| {
        let arr = expect_array("uniqBy", input)?;
        let mut seen: Vec<String> = Vec::new();
        let mut result = Vec::new();
        for item in arr {
            let k = stringify_value(&key(item)?);
            if !seen.contains(&k) {
                seen.push(k);
                result.push(item.clone());
            }
        }
        Ok(Value::Array(result))
    }))
}

fn build_limit(args: &[Ast]) -> Result<Evaluator, CompileError> {
    check_arity("limit", args, 1, 1, "1")?;
    let n = literal_number("limit", &args[0])?;
    let count = if n.is_finite() && n > 0.0 { n as usize } else { 0 };
    Ok(Box::new(move |input| {
        let arr = expect_array("limit", input)?;
        Ok(Value::Array(arr.iter().take(count).cloned().collect()))
    }))
}

fn build_size(args: &[Ast]) -> Result<Evaluator, CompileError> {
    check_arity("size", args, 0, 0, "0")?;
    Ok(Box::new(move |input| match input {
        Value::Array(arr) => Ok(Value::Number(arr.len() as f64)),
        Value::Object(map) => Ok(Value::Number(map.len() as f64)),
        Value::String(s) => Ok(Value::Number(s.chars().count() as f64)),
        other => Err(EvalError::Type {
            op: "size",
            observed: other.type_name(),
        }),
    }))
}

fn build_keys(args: &[Ast]) -> Result<Evaluator, CompileError> {
    check_arity("keys", args, 0, 0, "0")?;
    Ok(Box::new(move |input| match input {
        Value::Object(map) => Ok(Value::Array(
            map.keys().map(|k| Value::String(k.clone())).collect(),
        )),
        other => Err(EvalError::Type {
            op: "keys",
            observed: other.type_name(),
        }),
    }))
}

fn build_values(args: &[Ast]) -> Result<Evaluator, CompileError> {
    check_arity("values", args, 0, 0, "0")?;
    Ok(Box::new(move |input| match input {
        Value::Object(map) => Ok(Value::Array(map.values().cloned().collect())),
        other => Err(EvalError::Type {
            op: "values",
            observed: other.type_name(),
        }),
    }))
}

fn build_fold(name: &'static str, args: &[Ast]) -> Result<Evaluator, CompileError> {
    check_arity(name, args, 0, 0, "0")?;
    Ok(Box::new(move |input| {
        let arr = expect_array(name, input)?;
        let mut numbers = Vec::with_capacity(arr.len());
        for item in arr {
            numbers.push(expect_number(name, item)?);
        }
        let result = match name {
            "sum" => Value::Number(numbers.iter().sum()),
            "prod" => Value::Number(numbers.iter().product()),
            "average" if numbers.is_empty() => Value::Null,
            "average" => Value::Number(numbers.iter().sum::<f64>() / numbers.len() as f64),
            "min" => numbers
                .iter()
                .copied()
                .reduce(f64::min)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            _ => numbers
                .iter()
                .copied()
                .reduce(f64::max)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        };
        Ok(result)
    }))
}

// ---------------------------------------------------------------------------
// String builders

fn build_split(args: &[Ast], ctx: &CompileCtx) -> Result<Evaluator, CompileError> {
    check_arity("split", args, 1, 2, "1-2")?;
    let text = ctx.compile(&args[0])?;
    let separator = match args.get(1) {
        Some(ast) => Some(ctx.compile(ast)?),
        None => None,
    };
    Ok(Box::new(move |input| {
        let value = text(input)?;
        let s = expect_string("split", &value)?;
        let parts: Vec<Value> = match &separator {
            None => s
                .split_whitespace()
                .map(|p| Value::String(p.to_string()))
                .collect(),
            Some(eval) => {
                let sep_value = eval(input)?;
                let sep = expect_string("split", &sep_value)?;
                if sep.is_empty() {
                    s.chars().map(|c| Value::String(c.to_string())).collect()
                } else {
                    s.split(sep).map(|p| Value::String(p.to_string())).collect()
                }
            }
        };
        Ok(Value::Array(parts))
    }))
}

fn build_substring(args: &[Ast], ctx: &CompileCtx) -> Result<Evaluator, CompileError> {
    check_arity("substring", args, 2, 3, "2-3")?;
    let text = ctx.compile(&args[0])?;
    let start = ctx.compile(&args[1])?;
    let end = match args.get(2) {
        Some(ast) => Some(ctx.compile(ast)?),
        None => None,
    };
    Ok(Box::new(move |input| {
        let value = text(input)?;
        let s = expect_string("substring", &value)?;
        let length = s.chars().count();
        // Negative bounds clamp to 0, oversized bounds to the length
        let clamp = |n: f64| -> usize {
            if !(n > 0.0) {
                0
            } else if n >= length as f64 {
                length
            } else {
                n as usize
            }
        };
        let mut from = clamp(expect_number("substring", &start(input)?)?);
        let mut to = match &end {
            Some(eval) => clamp(expect_number("substring", &eval(input)?)?),
            None => length,
        };
        if from > to {
            std::mem::swap(&mut from, &mut to);
        }
        Ok(Value::String(s.chars().skip(from).take(to - from).collect()))
    }))
}

// ---------------------------------------------------------------------------
// Arithmetic builders

fn build_arithmetic(
    name: &'static str,
    args: &[Ast],
    ctx: &CompileCtx,
    f: fn(f64, f64) -> f64,
) -> Result<Evaluator, CompileError> {
    check_arity(name, args, 2, 2, "2")?;
    let left = ctx.compile(&args[0])?;
    let right = ctx.compile(&args[1])?;
    Ok(Box::new(move |input| {
        let a = expect_number(name, &left(input)?)?;
        let b = expect_number(name, &right(input)?)?;
        Ok(Value::Number(f(a, b)))
    }))
}

fn build_abs(args: &[Ast], ctx: &CompileCtx) -> Result<Evaluator, CompileError> {
    check_arity("abs", args, 1, 1, "1")?;
    let value = ctx.compile(&args[0])?;
    Ok(Box::new(move |input| {
        let n = expect_number("abs", &value(input)?)?;
        Ok(Value::Number(n.abs()))
    }))
}

fn build_round(args: &[Ast], ctx: &CompileCtx) -> Result<Evaluator, CompileError> {
    check_arity("round", args, 1, 2, "1-2")?;
    let value = ctx.compile(&args[0])?;
    let digits = match args.get(1) {
        Some(ast) => Some(ctx.compile(ast)?),
        None => None,
    };
    Ok(Box::new(move |input| {
        let n = expect_number("round", &value(input)?)?;
        let d = match &digits {
            Some(eval) => expect_number("round", &eval(input)?)?,
            None => 0.0,
        };
        let d = if d.is_finite() && d > 0.0 { (d as u32).min(28) } else { 0 };
        Ok(Value::Number(round_half_away(n, d)))
    }))
}

/// Half-away-from-zero rounding at a decimal digit. Routed through
/// `Decimal` so that values like `1.005` round on their decimal reading
/// rather than their binary expansion.
fn round_half_away(value: f64, digits: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    match Decimal::from_f64(value) {
        Some(d) => d
            .round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero)
            .to_f64()
            .unwrap_or(value),
        None => {
            // Out of Decimal's range; f64::round is already away-from-zero
            let scale = 10f64.powi(digits as i32);
            (value * scale).round() / scale
        }
    }
}

// ---------------------------------------------------------------------------
// Comparison and logic builders

fn build_equality(args: &[Ast], ctx: &CompileCtx, negate: bool) -> Result<Evaluator, CompileError> {
    let name = if negate { "ne" } else { "eq" };
    check_arity(name, args, 2, 2, "2")?;
    let left = ctx.compile(&args[0])?;
    let right = ctx.compile(&args[1])?;
    Ok(Box::new(move |input| {
        let equal = left(input)? == right(input)?;
        Ok(Value::Bool(equal != negate))
    }))
}

fn build_comparison(
    name: &'static str,
    args: &[Ast],
    ctx: &CompileCtx,
) -> Result<Evaluator, CompileError> {
    check_arity(name, args, 2, 2, "2")?;
    let left = ctx.compile(&args[0])?;
    let right = ctx.compile(&args[1])?;
    Ok(Box::new(move |input| {
        let ord = left(input)?.compare(&right(input)?);
        // Incomparable pairs (mixed or composite types) are neither less
        // nor greater
        let result = match name {
            "gt" => ord == Some(Ordering::Greater),
            "gte" => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
            "lt" => ord == Some(Ordering::Less),
            _ => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
        };
        Ok(Value::Bool(result))
    }))
}

fn build_logic(
    name: &'static str,
    args: &[Ast],
    ctx: &CompileCtx,
) -> Result<Evaluator, CompileError> {
    check_arity(name, args, 2, 2, "2")?;
    let left = ctx.compile(&args[0])?;
    let right = ctx.compile(&args[1])?;
    let is_and = name == "and";
    Ok(Box::new(move |input| {
        // Eager on purpose: both sides always evaluate
        let a = left(input)?.is_truthy();
        let b = right(input)?.is_truthy();
        Ok(Value::Bool(if is_and { a && b } else { a || b }))
    }))
}

fn build_not(args: &[Ast], ctx: &CompileCtx) -> Result<Evaluator, CompileError> {
    check_arity("not", args, 1, 1, "1")?;
    let value = ctx.compile(&args[0])?;
    Ok(Box::new(move |input| {
        Ok(Value::Bool(!value(input)?.is_truthy()))
    }))
}

// ---------------------------------------------------------------------------
// Conditional, membership, regex, conversion

fn build_if(args: &[Ast], ctx: &CompileCtx) -> Result<Evaluator, CompileError> {
    check_arity("if", args, 3, 3, "3")?;
    let condition = ctx.compile(&args[0])?;
    let then_branch = ctx.compile(&args[1])?;
    let else_branch = ctx.compile(&args[2])?;
    Ok(Box::new(move |input| {
        if condition(input)?.is_truthy() {
            then_branch(input)
        } else {
            else_branch(input)
        }
    }))
}

fn build_exists(args: &[Ast]) -> Result<Evaluator, CompileError> {
    check_arity("exists", args, 1, 1, "1")?;
    let path = get_path("exists", &args[0])?;
    let Some((last, front)) = path.split_last() else {
        return Err(CompileError::InvalidArgument {
            name: "exists".to_string(),
            message: "path must have at least one key".to_string(),
        });
    };
    let last = last.name.clone();
    let front = front.to_vec();
    Ok(Box::new(move |input| {
        // True iff the final key is present on its parent object, even when
        // the stored value is null
        let present = match walk(input, &front) {
            Some(Value::Object(map)) => map.contains_key(&last),
            _ => false,
        };
        Ok(Value::Bool(present))
    }))
}

fn build_in(
    name: &'static str,
    args: &[Ast],
    ctx: &CompileCtx,
) -> Result<Evaluator, CompileError> {
    check_arity(name, args, 2, 2, "2")?;
    let needle = ctx.compile(&args[0])?;
    let haystack = ctx.compile(&args[1])?;
    let negate = name == "not in";
    Ok(Box::new(move |input| {
        let value = needle(input)?;
        let candidates = haystack(input)?;
        let arr = expect_array(name, &candidates)?;
        let found = arr.iter().any(|item| *item == value);
        Ok(Value::Bool(found != negate))
    }))
}

fn build_regex(args: &[Ast], ctx: &CompileCtx) -> Result<Evaluator, CompileError> {
    check_arity("regex", args, 2, 3, "2-3")?;
    let target = ctx.compile(&args[0])?;
    let pattern = literal_str("regex", &args[1])?;
    let flags = match args.get(2) {
        Some(arg) => literal_str("regex", arg)?,
        None => String::new(),
    };
    let mut builder = RegexBuilder::new(&pattern);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            // Patterns are always Unicode
            'u' => &mut builder,
            other => {
                return Err(CompileError::InvalidArgument {
                    name: "regex".to_string(),
                    message: format!("unsupported flag '{}'", other),
                });
            }
        };
    }
    let re = builder.build().map_err(|e| CompileError::InvalidArgument {
        name: "regex".to_string(),
        message: e.to_string(),
    })?;
    Ok(Box::new(move |input| {
        let value = target(input)?;
        // A non-string target (including an absent path) never matches
        let matched = value.as_str().is_some_and(|s| re.is_match(s));
        Ok(Value::Bool(matched))
    }))
}

fn build_number(args: &[Ast], ctx: &CompileCtx) -> Result<Evaluator, CompileError> {
    check_arity("number", args, 1, 1, "1")?;
    let value = ctx.compile(&args[0])?;
    Ok(Box::new(move |input| {
        let result = match value(input)? {
            n @ Value::Number(_) => n,
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Value::Number(n),
                _ => Value::Null,
            },
            _ => Value::Null,
        };
        Ok(result)
    }))
}

fn build_string(args: &[Ast], ctx: &CompileCtx) -> Result<Evaluator, CompileError> {
    check_arity("string", args, 1, 1, "1")?;
    let value = ctx.compile(&args[0])?;
    Ok(Box::new(move |input| {
        Ok(Value::String(stringify_value(&value(input)?)))
    }))
}

#[test]
fn test_round_is_half_away_from_zero() {
    assert_eq!(round_half_away(0.5, 0), 1.0);
    assert_eq!(round_half_away(-0.5, 0), -1.0);
    assert_eq!(round_half_away(2.5, 0), 3.0);
    assert!((round_half_away(1.005, 2) - 1.01).abs() < 1e-9);
}

#[test]
fn test_stringify_value_forms() {
    assert_eq!(stringify_value(&Value::Null), "null");
    assert_eq!(stringify_value(&Value::Bool(true)), "true");
    assert_eq!(stringify_value(&Value::Number(3.0)), "3");
    assert_eq!(stringify_value(&Value::String("x".into())), "x");
    assert_eq!(
        stringify_value(&Value::Array(vec![Value::Number(1.0)])),
        "[1]"
    );
}

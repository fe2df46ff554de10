//! Abstract syntax tree for the Sorrel query language.
//!
//! A query has two interchangeable source forms: the compact text syntax
//! (handled by [`crate::parser`]) and a structured form made of nested JSON
//! arrays/objects/primitives (handled by [`Ast::from_json`]). Both denote
//! the same tree and compile to the same evaluator.
//!
//! There are no dedicated operator nodes: infix operators parse into
//! [`Ast::Function`] nodes named after the operator's canonical function
//! (`+` becomes `add`, `and` stays `and`), and property access becomes
//! `Function("get", [Literal(k1), Literal(k2), ...])`.

use crate::value::Value;

/// Abstract Syntax Tree node representing a parsed query.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    /// A constant value
    ///
    /// # Example
    /// ```text
    /// 42
    /// ```
    Literal(Value),

    /// A function call by name
    ///
    /// # Examples
    /// ```text
    /// sort(.age)        // Function("sort", [get path])
    /// .name             // Function("get", [Literal("name")])
    /// .a + 2            // Function("add", [...])
    /// ```
    Function(String, Vec<Ast>),

    /// A pipeline: apply each part to the previous part's result
    ///
    /// # Example
    /// ```text
    /// .items | filter(.price > 10) | size()
    /// ```
    Pipe(Vec<Ast>),

    /// Object construction with literal keys and dynamic values,
    /// in declared order
    ///
    /// # Example
    /// ```text
    /// { name: .name, total: sum() }
    /// ```
    Object(Vec<(String, Ast)>),

    /// Array construction with dynamic elements
    ///
    /// # Example
    /// ```text
    /// [.first, .last]
    /// ```
    Array(Vec<Ast>),
}

impl Ast {
    /// Load the structured query form.
    ///
    /// The mapping is:
    /// - a JSON array whose first element is a string is a function call
    ///   (`["get", "name"]`); the names `"pipe"`, `"array"` and `"object"`
    ///   map onto the dedicated variants
    /// - a JSON object is object construction, each value parsed recursively
    /// - every other JSON value is a literal, including arrays that do not
    ///   start with a string
    ///
    /// # Examples
    ///
    /// ```
    /// use sorrel_lang::Ast;
    /// use serde_json::json;
    ///
    /// let ast = Ast::from_json(&json!(["get", "name"]));
    /// assert_eq!(ast, Ast::Function("get".into(), vec![Ast::Literal("name".into())]));
    ///
    /// // An array not starting with a string is a plain literal
    /// let ast = Ast::from_json(&json!([1, 2, 3]));
    /// assert!(matches!(ast, Ast::Literal(_)));
    /// ```
    pub fn from_json(v: &serde_json::Value) -> Ast {
        match v {
            serde_json::Value::Array(items) => match items.first() {
                Some(serde_json::Value::String(name)) => {
                    let args = &items[1..];
                    match name.as_str() {
                        "pipe" => Ast::Pipe(args.iter().map(Ast::from_json).collect()),
                        "array" => Ast::Array(args.iter().map(Ast::from_json).collect()),
                        "object" if args.len() == 1 && args[0].is_object() => {
                            Ast::from_json(&args[0])
                        }
                        _ => Ast::Function(
                            name.clone(),
                            args.iter().map(Ast::from_json).collect(),
                        ),
                    }
                }
                _ => Ast::Literal(Value::from_json(v.clone())),
            },
            serde_json::Value::Object(map) => Ast::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Ast::from_json(v)))
                    .collect(),
            ),
            _ => Ast::Literal(Value::from_json(v.clone())),
        }
    }
}

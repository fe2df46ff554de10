//! Sorrel: an embeddable query language for navigating and transforming
//! JSON documents.
//!
//! A query is either a compact text expression or a structured form made of
//! nested JSON values; both compile to the same reusable evaluator.
//!
//! ```
//! use serde_json::json;
//! use sorrel_lang::{query, Value};
//!
//! let data = Value::from_json(json!({
//!     "friends": [
//!         {"name": "Chris", "age": 23},
//!         {"name": "Emily", "age": 19},
//!         {"name": "Joe", "age": 32}
//!     ]
//! }));
//!
//! let names = query(&data, ".friends | filter(.age >= 21) | map(.name)").unwrap();
//! assert_eq!(names, Value::from_json(json!(["Chris", "Joe"])));
//! ```
//!
//! Parsing, compiling and stringification are also available as separate
//! stages, and every stage has a `_with` variant that threads an
//! [`Options`] carrying user-defined functions and operators.

pub mod ast;
pub mod compile;
pub mod functions;
pub mod output;
pub mod parser;
mod stringify;
pub mod value;

pub use ast::Ast;
pub use compile::{CompileCtx, CompileError, Evaluator, FunctionBuilder, Options};
pub use functions::{build_function, EvalError};
pub use output::{to_json, to_json_pretty};
pub use parser::{ParseError, Parser};
pub use value::Value;

/// Any error the façade can produce: parse, compile, or runtime.
#[derive(Debug)]
pub enum Error {
    /// Malformed text query
    Parse(ParseError),
    /// The AST could not be lowered to an evaluator
    Compile(CompileError),
    /// The evaluator hit an unrecoverable type mismatch
    Eval(EvalError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Parse(e) => write!(f, "{}", e),
            Error::Compile(e) => write!(f, "{}", e),
            Error::Eval(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Parse(e) => Some(e),
            Error::Compile(e) => Some(e),
            Error::Eval(e) => Some(e),
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<CompileError> for Error {
    fn from(e: CompileError) -> Self {
        Error::Compile(e)
    }
}

impl From<EvalError> for Error {
    fn from(e: EvalError) -> Self {
        Error::Eval(e)
    }
}

/// Parse a text query into its abstract form.
pub fn parse(source: &str) -> Result<Ast, ParseError> {
    parse_with(source, &Options::default())
}

/// Parse a text query, recognizing the operators registered in `options`.
pub fn parse_with(source: &str, options: &Options) -> Result<Ast, ParseError> {
    Parser::new(source, options).parse()
}

/// Compile an abstract form into a reusable evaluator.
pub fn compile(ast: &Ast) -> Result<Evaluator, CompileError> {
    compile_with(ast, &Options::default())
}

/// Compile with user functions and operators in scope. The extensions are
/// visible for this compile only, including from nested compiles performed
/// by builders.
pub fn compile_with(ast: &Ast, options: &Options) -> Result<Evaluator, CompileError> {
    CompileCtx::new(options).compile(ast)
}

/// Render an abstract form back into canonical text. Inverse of [`parse`]:
/// the result re-parses to the same AST.
pub fn stringify(ast: &Ast) -> String {
    stringify_with(ast, &Options::default())
}

/// Render with user operator symbols available for spelling.
pub fn stringify_with(ast: &Ast, options: &Options) -> String {
    stringify::Stringifier::new(options).stringify(ast)
}

/// Parse, compile, and run a text query against a document.
pub fn query(data: &Value, source: &str) -> Result<Value, Error> {
    query_with(data, source, &Options::default())
}

/// Like [`query`], with user functions and operators in scope.
pub fn query_with(data: &Value, source: &str, options: &Options) -> Result<Value, Error> {
    let ast = parse_with(source, options)?;
    let evaluator = compile_with(&ast, options)?;
    Ok(evaluator(data)?)
}

/// Compile and run a structured-form query against a document.
pub fn query_ast(data: &Value, ast: &Ast) -> Result<Value, Error> {
    query_ast_with(data, ast, &Options::default())
}

/// Like [`query_ast`], with user functions and operators in scope.
pub fn query_ast_with(data: &Value, ast: &Ast, options: &Options) -> Result<Value, Error> {
    let evaluator = compile_with(ast, options)?;
    Ok(evaluator(data)?)
}

//! Compiler from the abstract form to an executable evaluator.
//!
//! Compilation closes over its work: every builder compiles its argument
//! ASTs exactly once and captures the resulting sub-evaluators, so runtime
//! evaluation performs no name lookups. The compile context is an explicit,
//! borrow-scoped structure; builders that accept sub-queries (`map`,
//! `filter`, `pipe`, `if`, user builders) re-enter the compiler through
//! [`CompileCtx::compile`] and therefore see the same extension tables as
//! their parent compile.

use std::collections::HashMap;

use crate::ast::Ast;
use crate::functions::{self, EvalError};
use crate::value::Value;

/// A compiled query: a pure function from input value to output value.
///
/// Evaluators never mutate their input, hold no interior state, and may be
/// reused and shared across threads.
pub type Evaluator = Box<dyn Fn(&Value) -> Result<Value, EvalError> + Send + Sync>;

/// A function builder: given argument ASTs and the compile context,
/// produce an evaluator.
pub type FunctionBuilder =
    Box<dyn Fn(&[Ast], &CompileCtx) -> Result<Evaluator, CompileError> + Send + Sync>;

/// Per-compile extensions.
///
/// `functions` maps names to builders and shadows the core table.
/// `operators` maps new infix symbols to canonical function names; a symbol
/// whose canonical name already backs a core operator parses at that
/// operator's precedence tier, anything else parses at the comparison tier.
///
/// # Examples
///
/// ```
/// use sorrel_lang::{build_function, Options, Value};
///
/// let mut options = Options::default();
/// options.functions.insert(
///     "answer".to_string(),
///     build_function(|_args| Ok(Value::Number(42.0))),
/// );
/// ```
#[derive(Default)]
pub struct Options {
    /// User function builders, keyed by name. Shadow core names.
    pub functions: HashMap<String, FunctionBuilder>,

    /// New operator symbols, mapped to canonical function names.
    pub operators: HashMap<String, String>,
}

/// Errors produced while lowering an AST into an evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Function name not present in the user table or the core library
    UnknownFunction { name: String },

    /// A builder received an invalid number of arguments
    Arity {
        name: String,
        expected: &'static str,
        actual: usize,
    },

    /// An argument that must be a literal or a property path is not one
    InvalidArgument { name: String, message: String },
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::UnknownFunction { name } => {
                write!(f, "Unknown function '{}'", name)
            }
            CompileError::Arity {
                name,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Function '{}' expects {} argument(s), got {}",
                    name, expected, actual
                )
            }
            CompileError::InvalidArgument { name, message } => {
                write!(f, "Invalid argument to '{}': {}", name, message)
            }
        }
    }
}

impl std::error::Error for CompileError {}

/// The effective tables for one compile call.
///
/// Created at the entry of `compile` and passed by reference into every
/// builder; nested compiles transparently share it.
pub struct CompileCtx<'a> {
    options: &'a Options,
}

impl<'a> CompileCtx<'a> {
    pub(crate) fn new(options: &'a Options) -> Self {
        CompileCtx { options }
    }

    /// Compile a (sub-)query under this context.
    ///
    /// Dispatch by AST variant: literals become constant evaluators,
    /// function calls look up the user table first and the core library
    /// second, and the pipe/object/array variants go straight to their core
    /// builders.
    pub fn compile(&self, ast: &Ast) -> Result<Evaluator, CompileError> {
        match ast {
            Ast::Literal(value) => {
                let value = value.clone();
                Ok(Box::new(move |_input| Ok(value.clone())))
            }
            Ast::Function(name, args) => {
                if let Some(builder) = self.options.functions.get(name) {
                    return builder(args, self);
                }
                match functions::build_core(name, args, self) {
                    Some(result) => result,
                    None => Err(CompileError::UnknownFunction { name: name.clone() }),
                }
            }
            Ast::Pipe(parts) => functions::build_pipe(parts, self),
            Ast::Object(pairs) => functions::build_object(pairs, self),
            Ast::Array(items) => functions::build_array(items, self),
        }
    }
}

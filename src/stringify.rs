//! Canonical text form for ASTs, the inverse of the parser.
//!
//! Whitespace is minimized (word operators keep single spaces) and
//! parentheses appear only where precedence requires them. For every
//! parseable text `t`, `stringify(&parse(t)?)` re-parses to the same AST.

use std::collections::HashMap;

use crate::ast::Ast;
use crate::compile::Options;
use crate::output;
use crate::parser::{tier_for_name, OpTier, CORE_OPERATORS};
use crate::value::Value;

const PIPE_PRECEDENCE: u8 = 1;
const ATOM_PRECEDENCE: u8 = 9;

fn tier_precedence(tier: OpTier) -> u8 {
    match tier {
        OpTier::Or => 2,
        OpTier::And => 3,
        OpTier::Comparison => 4,
        OpTier::Additive => 5,
        OpTier::Multiplicative => 6,
        OpTier::Power => 7,
    }
}

pub(crate) struct Stringifier {
    // canonical function name -> operator symbol and tier
    operators: HashMap<String, (String, OpTier)>,
}

impl Stringifier {
    pub(crate) fn new(options: &Options) -> Self {
        let mut operators = HashMap::new();
        for (symbol, name, tier) in CORE_OPERATORS {
            operators.insert(name.to_string(), (symbol.to_string(), *tier));
        }
        // User symbols only name functions without a core spelling
        for (symbol, name) in &options.operators {
            operators
                .entry(name.clone())
                .or_insert_with(|| (symbol.clone(), tier_for_name(name)));
        }
        Stringifier { operators }
    }

    pub(crate) fn stringify(&self, ast: &Ast) -> String {
        let mut out = String::new();
        self.emit(ast, &mut out);
        out
    }

    fn precedence(&self, ast: &Ast) -> u8 {
        match ast {
            Ast::Pipe(_) => PIPE_PRECEDENCE,
            Ast::Function(name, args) if args.len() == 2 && name != "get" => self
                .operators
                .get(name)
                .map(|(_, tier)| tier_precedence(*tier))
                .unwrap_or(ATOM_PRECEDENCE),
            _ => ATOM_PRECEDENCE,
        }
    }

    fn emit(&self, ast: &Ast, out: &mut String) {
        match ast {
            Ast::Literal(value) => out.push_str(&output::to_json(value)),
            Ast::Function(name, args) => self.emit_function(name, args, out),
            Ast::Pipe(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        out.push('|');
                    }
                    // A nested pipe is the only part that needs grouping
                    self.emit_child(part, PIPE_PRECEDENCE + 1, out);
                }
            }
            Ast::Object(pairs) => {
                out.push('{');
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    if is_identifier(key) {
                        out.push_str(key);
                    } else {
                        out.push_str(&output::to_json(&Value::String(key.clone())));
                    }
                    out.push(':');
                    self.emit(value, out);
                }
                out.push('}');
            }
            Ast::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    self.emit(item, out);
                }
                out.push(']');
            }
        }
    }

    fn emit_function(&self, name: &str, args: &[Ast], out: &mut String) {
        if name == "get" {
            self.emit_get(args, out);
            return;
        }
        if args.len() == 2 {
            if let Some((symbol, tier)) = self.operators.get(name) {
                let precedence = tier_precedence(*tier);
                let right_assoc = *tier == OpTier::Power;
                // The looser-bound side of an associative chain needs
                // explicit grouping to re-parse identically
                let (left_min, right_min) = if right_assoc {
                    (precedence + 1, precedence)
                } else {
                    (precedence, precedence + 1)
                };
                self.emit_child(&args[0], left_min, out);
                if symbol.chars().all(|c| c.is_ascii_alphabetic() || c == ' ') {
                    out.push(' ');
                    out.push_str(symbol);
                    out.push(' ');
                } else {
                    out.push_str(symbol);
                }
                self.emit_child(&args[1], right_min, out);
                return;
            }
        }
        // Plain call form
        out.push_str(name);
        out.push('(');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            self.emit(arg, out);
        }
        out.push(')');
    }

    fn emit_child(&self, child: &Ast, min_precedence: u8, out: &mut String) {
        if self.precedence(child) < min_precedence {
            out.push('(');
            self.emit(child, out);
            out.push(')');
        } else {
            self.emit(child, out);
        }
    }

    /// Property paths print in dotted form when every key is a string;
    /// paths with numeric keys (only expressible in the structured form)
    /// fall back to an explicit `get(...)` call, as does the empty path.
    fn emit_get(&self, args: &[Ast], out: &mut String) {
        let all_strings = !args.is_empty()
            && args
                .iter()
                .all(|arg| matches!(arg, Ast::Literal(Value::String(_))));
        if all_strings {
            for arg in args {
                if let Ast::Literal(Value::String(key)) = arg {
                    out.push('.');
                    if is_identifier(key) {
                        out.push_str(key);
                    } else {
                        out.push_str(&output::to_json(&Value::String(key.clone())));
                    }
                }
            }
        } else {
            out.push_str("get(");
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                self.emit(arg, out);
            }
            out.push(')');
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

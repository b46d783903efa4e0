//! Static resolver pass.
//!
//! One pre-order walk over the statement tree that does three jobs:
//! 1. Build lexical scopes (stack of `HashMap<&str, bool>` tracking
//!    declared/defined) and record, for each variable occurrence, how many
//!    scopes up its binding lives, so the interpreter never falls back to a
//!    dynamic lookup that could see a later shadowing local.
//! 2. Report static errors: redeclaration in the same scope, reading a
//!    variable in its own initializer, `return`/`this`/`super`/`break` used
//!    where they mean nothing, a class inheriting from itself.
//! 3. Warn about locals that are declared but never read, when their scope
//!    closes.
//!
//! Findings accumulate in a [`Diagnostic`] batch rather than aborting the
//! walk, so one pass surfaces every independent mistake.  The driver checks
//! the batch and must not start execution if any error-severity record is
//! present.

use std::collections::HashMap;

use log::{debug, info};

use crate::error::Diagnostic;
use crate::interpreter::Interpreter;
use crate::parser::{Expr, ExprId, Stmt};
use crate::token::Token;

/// What kind of function body are we inside?  Validates `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Lambda,
    Method,
    Initializer,
}

/// What kind of class body are we inside?  Validates `this` / `super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances into the interpreter's side table.
pub struct Resolver<'a, 'interp> {
    interpreter: &'interp mut Interpreter<'a>,

    /// Innermost scope last; `false` = declared, `true` = defined.
    scopes: Vec<HashMap<&'a str, bool>>,

    /// Declared-but-never-read names, one list per scope *plus* a leading
    /// entry for the top level (which has no scope of its own).
    unused: Vec<Vec<&'a Token<'a>>>,

    current_function: FunctionType,
    current_class: ClassType,

    /// Number of `while` bodies enclosing the current node.
    loop_depth: usize,

    diagnostics: Vec<Diagnostic>,
}

impl<'a, 'interp> Resolver<'a, 'interp> {
    /// Create a new resolver bound to the given interpreter.
    pub fn new(interpreter: &'interp mut Interpreter<'a>) -> Self {
        info!("Resolver instantiated");

        Resolver {
            interpreter,
            scopes: Vec::new(),
            unused: vec![Vec::new()], // top-level variables
            current_function: FunctionType::None,
            current_class: ClassType::None,
            loop_depth: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Walk all top-level statements and return every finding.
    pub fn resolve(mut self, statements: &'a [Stmt<'a>]) -> Vec<Diagnostic> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        // The top-level scope never closes; flush its unused list here.
        if let Some(top_level) = self.unused.pop() {
            for variable in top_level {
                self.warn_unused(variable);
            }
        }

        self.diagnostics
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &'a Stmt<'a>) {
        debug!("Resolving stmt: {:?}", stmt);
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                for s in statements {
                    self.resolve_stmt(s);
                }
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define, so a
                // self-referential initializer still sees `false`.
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }
                self.define(name);

                if let Some(unused) = self.unused.last_mut() {
                    unused.push(*name);
                }
            }

            Stmt::Function { name, params, body } => {
                // The name is visible *inside* its own body (recursion).
                self.declare(name);
                self.define(name);
                self.resolve_function(params, body, FunctionType::Function);
            }

            Stmt::Lambda { params, body } => {
                self.resolve_function(params, body, FunctionType::Lambda);
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let enclosing_class = self.current_class;
                self.current_class = ClassType::Class;

                self.declare(name);
                self.define(name);

                if let Some(Expr::Variable {
                    name: super_name, ..
                }) = superclass
                {
                    if super_name.lexeme == name.lexeme {
                        self.error(super_name, "A class can't inherit from itself.");
                    }
                }

                if let Some(superclass_expr) = superclass {
                    self.current_class = ClassType::Subclass;
                    self.resolve_expr(superclass_expr);

                    // Synthetic scope holding `super` for the methods below.
                    self.begin_scope();
                    if let Some(scope) = self.scopes.last_mut() {
                        scope.insert("super", true);
                    }
                }

                // Synthetic scope holding `this`.
                self.begin_scope();
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert("this", true);
                }

                for method in methods {
                    if let Stmt::Function {
                        name: method_name,
                        params,
                        body,
                    } = method
                    {
                        let kind = if method_name.lexeme == "init" {
                            FunctionType::Initializer
                        } else {
                            FunctionType::Method
                        };

                        self.resolve_function(params, body, kind);
                    }
                }

                self.end_scope();

                if superclass.is_some() {
                    self.end_scope();
                }

                self.current_class = enclosing_class;
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);

                self.loop_depth += 1;
                self.resolve_stmt(body);
                self.loop_depth -= 1;
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "Can't return from top-level code.");
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword, "Can't return a value from an initializer.");
                    }

                    self.resolve_expr(expr);
                }
            }

            Stmt::Break { keyword } => {
                if self.loop_depth == 0 {
                    self.error(keyword, "Can't use 'break' outside of a loop.");
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &'a Expr<'a>) {
        debug!("Resolving expr: {:?}", expr);
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => {
                self.resolve_expr(inner);
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right);
            }

            Expr::Binary { left, right, .. }
            | Expr::Logical { left, right, .. }
            | Expr::Comma { left, right } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Ternary {
                condition,
                left,
                right,
            } => {
                self.resolve_expr(condition);
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable { name, id } => {
                // Reading a name whose own initializer is still running?
                let shadows_itself = self
                    .scopes
                    .last()
                    .is_some_and(|scope| scope.get(name.lexeme) == Some(&false));

                if shadows_itself {
                    self.error(name, "Can't read local variable in its own initializer.");
                }

                self.resolve_local(*id, name);
            }

            Expr::Assign { name, value, id } => {
                // First resolve RHS, then bind LHS.
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            Expr::Lambda { params, body } => {
                self.resolve_function(params, body, FunctionType::Lambda);
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }

            Expr::This { keyword, id } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Can't use 'this' outside of a class.");
                    return;
                }

                self.resolve_local(*id, keyword);
            }

            Expr::Super { keyword, id, .. } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Can't use 'super' outside of a class.");
                } else if self.current_class != ClassType::Subclass {
                    self.error(keyword, "Can't use 'super' in a class with no superclass.");
                }

                self.resolve_local(*id, keyword);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body.
    fn resolve_function(
        &mut self,
        params: &'a [&'a Token<'a>],
        body: &'a [Stmt<'a>],
        kind: FunctionType,
    ) {
        let enclosing = self.current_function;
        self.current_function = kind;

        // A `break` inside this body cannot reach a loop outside it.
        let enclosing_loops = self.loop_depth;
        self.loop_depth = 0;

        self.begin_scope();
        for param in params {
            self.declare(param);
            self.define(param);
        }
        for stmt in body {
            self.resolve_stmt(stmt);
        }
        self.end_scope();

        self.loop_depth = enclosing_loops;
        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
        self.unused.push(Vec::new());
    }

    /// Pop the innermost scope, warning about any name that was never read.
    fn end_scope(&mut self) {
        self.scopes.pop();

        if let Some(unused) = self.unused.pop() {
            for variable in unused {
                self.warn_unused(variable);
            }
        }
    }

    fn declare(&mut self, name: &'a Token<'a>) {
        if self.scopes.is_empty() {
            return; // top level: redeclaration is legal
        }

        let already_declared = self
            .scopes
            .last()
            .is_some_and(|scope| scope.contains_key(name.lexeme));

        if already_declared {
            self.error(name, "Already a variable with this name in this scope.");
        }

        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme, false);
        }
    }

    fn define(&mut self, name: &'a Token<'a>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme, true);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding-distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at some hop-count, or leave it for
    /// global-by-name lookup if no enclosing scope declares it.  Either way
    /// the declaring scope's unused list no longer mentions the name.
    fn resolve_local(&mut self, id: ExprId, name: &'a Token<'a>) {
        let mut found: Option<(usize, usize)> = None; // (scope index, depth)

        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name.lexeme) {
                found = Some((self.scopes.len() - 1 - depth, depth));
                break;
            }
        }

        match found {
            Some((scope_index, depth)) => {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);

                // unused[0] is the top level, so scope i maps to unused[i+1].
                self.unused[scope_index + 1].retain(|token| token.lexeme != name.lexeme);
                self.interpreter.note_local(id, depth);
            }

            None => {
                debug!("Resolved '{}' as global", name.lexeme);

                self.unused[0].retain(|token| token.lexeme != name.lexeme);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Diagnostics
    // ─────────────────────────────────────────────────────────────────────────

    fn error(&mut self, token: &Token<'_>, message: &str) {
        self.diagnostics.push(Diagnostic::error(token, message));
    }

    fn warn_unused(&mut self, token: &Token<'_>) {
        self.diagnostics
            .push(Diagnostic::warning(token, "Variable is never used."));
    }
}

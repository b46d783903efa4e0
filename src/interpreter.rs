use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};

use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::parser::{Expr, ExprId, LiteralValue, Stmt};
use crate::token::{Token, TokenType};
use crate::value::{LoxClass, LoxFunction, LoxInstance, LoxLambda, Value};

/// How a statement finished.
///
/// `Break` and `Return` are internal unwind signals, not errors: each one
/// travels up through block execution until the nearest enclosing loop
/// (for `Break`) or call frame (for `Return`) consumes it.  They are never
/// visible to the diagnostic system.
#[derive(Debug)]
pub enum Flow<'a> {
    Normal,
    Break,
    Return(Value<'a>),
}

/// Seconds since the Unix epoch, as a Lox number.
fn clock_native<'a>(_args: &[Value<'a>]) -> std::result::Result<Value<'a>, String> {
    Ok(Value::Number(Utc::now().timestamp_millis() as f64 / 1000.0))
}

pub struct Interpreter<'a> {
    globals: Rc<RefCell<Environment<'a>>>,
    environment: Rc<RefCell<Environment<'a>>>,

    /// Hop-counts recorded by the resolver, keyed by node identity.
    /// A missing entry means global-by-name lookup.
    locals: HashMap<ExprId, usize>,

    /// Where `print` writes.  Stdout normally; a capture sink in tests.
    output: Box<dyn Write>,
}

impl<'a> Interpreter<'a> {
    /// Creates a new Interpreter printing to stdout, with the native
    /// functions installed in the global environment.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Same, but `print` writes into the supplied sink.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));

        debug!("Defining native function 'clock'");

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction {
                name: "clock",
                arity: 0,
                func: clock_native,
            },
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            output,
        }
    }

    /// Record a resolved hop-count for a variable occurrence.  Called by the
    /// resolver only.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    /// Interprets a list of statements (a "program").
    ///
    /// A program that is exactly one expression statement additionally
    /// yields its value, so an interactive driver can echo it.  Any runtime
    /// error aborts the remainder of the run and is returned to the caller;
    /// output already produced stays produced.
    pub fn interpret(&mut self, statements: &'a [Stmt<'a>]) -> Result<Option<Value<'a>>> {
        debug!("Interpreting {} statements", statements.len());

        if let [Stmt::Expression(expr)] = statements {
            let value = self.evaluate(expr)?;
            info!("Single-expression program evaluated for echo");
            return Ok(Some(value));
        }

        for stmt in statements {
            match self.execute(stmt)? {
                Flow::Normal => {}
                // The resolver rejects top-level `return`/`break`, so a
                // signal here is a bug in this crate, not a user error.
                _ => unreachable!("control signal escaped the top level"),
            }
        }

        info!("Interpretation completed successfully");
        Ok(None)
    }

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &'a Stmt<'a>) -> Result<Flow<'a>> {
        match stmt {
            Stmt::Expression(expr) => {
                let _ = self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.output, "{}", value)?;
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                debug!("Defining variable '{}'", name.lexeme);

                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                self.environment.borrow_mut().define(name.lexeme, value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let environment = Environment::with_enclosing(Rc::clone(&self.environment));
                self.execute_block(statements, Rc::new(RefCell::new(environment)))
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond_value = self.evaluate(condition)?;

                if is_truthy(&cond_value) {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                debug!("Entering while loop");

                while is_truthy(&self.evaluate(condition)?) {
                    match self.execute(body)? {
                        Flow::Normal => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }

                Ok(Flow::Normal)
            }

            Stmt::Function { name, params, body } => {
                debug!("Defining function '{}'", name.lexeme);

                // The function closes over the environment it is declared
                // in, so recursion and later mutations stay visible.
                let function = LoxFunction {
                    name: *name,
                    params: params.as_slice(),
                    body: body.as_slice(),
                    closure: Rc::clone(&self.environment),
                    is_initializer: false,
                };

                self.environment
                    .borrow_mut()
                    .define(name.lexeme, Value::Function(Rc::new(function)));
                Ok(Flow::Normal)
            }

            Stmt::Lambda { .. } => {
                // An anonymous function at statement position binds nothing
                // and has no observable effect.
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Raising return signal with {}", value);
                Ok(Flow::Return(value))
            }

            Stmt::Break { .. } => Ok(Flow::Break),

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                debug!("Declaring class '{}'", name.lexeme);

                let superclass_value = match superclass {
                    Some(expr) => {
                        let token: &Token<'a> = match expr {
                            Expr::Variable {
                                name: super_name, ..
                            } => super_name,
                            _ => *name,
                        };

                        match self.evaluate(expr)? {
                            Value::Class(class) => Some(class),
                            _ => {
                                return Err(LoxError::runtime(
                                    token,
                                    "Superclass must be a class.",
                                ))
                            }
                        }
                    }
                    None => None,
                };

                // Two-step binding so methods can reference the class name.
                self.environment.borrow_mut().define(name.lexeme, Value::Nil);

                // Methods close over a synthetic scope holding `super` when
                // there is a superclass; otherwise over the declaring scope.
                let method_closure = match &superclass_value {
                    Some(superclass) => {
                        let mut environment =
                            Environment::with_enclosing(Rc::clone(&self.environment));
                        environment.define("super", Value::Class(Rc::clone(superclass)));
                        Rc::new(RefCell::new(environment))
                    }
                    None => Rc::clone(&self.environment),
                };

                let mut method_table: HashMap<&'a str, Rc<LoxFunction<'a>>> = HashMap::new();

                for method in methods {
                    if let Stmt::Function {
                        name: method_name,
                        params,
                        body,
                    } = method
                    {
                        let function = LoxFunction {
                            name: *method_name,
                            params: params.as_slice(),
                            body: body.as_slice(),
                            closure: Rc::clone(&method_closure),
                            is_initializer: method_name.lexeme == "init",
                        };

                        method_table.insert(method_name.lexeme, Rc::new(function));
                    }
                }

                let class = LoxClass {
                    name: *name,
                    superclass: superclass_value,
                    methods: method_table,
                };

                self.environment
                    .borrow_mut()
                    .assign(name, Value::Class(Rc::new(class)))?;
                Ok(Flow::Normal)
            }
        }
    }

    /// Execute `statements` against `environment`, restoring the previous
    /// environment on **every** exit path: normal completion, an unwinding
    /// signal, or a propagating runtime error.
    pub fn execute_block(
        &mut self,
        statements: &'a [Stmt<'a>],
        environment: Rc<RefCell<Environment<'a>>>,
    ) -> Result<Flow<'a>> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let mut flow = Flow::Normal;

        for stmt in statements {
            match self.execute(stmt) {
                Ok(Flow::Normal) => continue,

                Ok(signal) => {
                    flow = signal;
                    break;
                }

                Err(error) => {
                    self.environment = previous;
                    return Err(error);
                }
            }
        }

        self.environment = previous;
        Ok(flow)
    }

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &'a Expr<'a>) -> Result<Value<'a>> {
        let value = match expr {
            Expr::Literal(lit) => match lit {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            },

            Expr::Grouping(inner) => self.evaluate(inner)?,

            Expr::Unary { operator, right } => {
                let right_val = self.evaluate(right)?;

                match operator.token_type {
                    TokenType::MINUS => match right_val {
                        Value::Number(n) => Value::Number(-n),
                        _ => {
                            return Err(LoxError::runtime(operator, "Operand must be a number."))
                        }
                    },
                    TokenType::BANG => Value::Bool(!is_truthy(&right_val)),
                    _ => return Err(LoxError::runtime(operator, "Invalid unary operator.")),
                }
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left_val = self.evaluate(left)?;
                let right_val = self.evaluate(right)?;
                self.binary_op(operator, left_val, right_val)?
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                // Short-circuit: the result is the last operand actually
                // evaluated, not a coerced boolean.
                let left_val = self.evaluate(left)?;

                match operator.token_type {
                    TokenType::OR if is_truthy(&left_val) => left_val,
                    TokenType::AND if !is_truthy(&left_val) => left_val,
                    _ => self.evaluate(right)?,
                }
            }

            Expr::Ternary {
                condition,
                left,
                right,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.evaluate(left)?
                } else {
                    self.evaluate(right)?
                }
            }

            Expr::Comma { left, right } => {
                let _ = self.evaluate(left)?;
                self.evaluate(right)?
            }

            Expr::Variable { name, id } => self.look_up_variable(name, *id)?,

            Expr::Assign { name, value, id } => {
                let value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => {
                        Environment::assign_at(
                            &self.environment,
                            distance,
                            name.lexeme,
                            value.clone(),
                        );
                    }
                    None => {
                        self.globals.borrow_mut().assign(name, value.clone())?;
                    }
                }

                value
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val = self.evaluate(callee)?;

                let mut arg_values = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    arg_values.push(self.evaluate(arg)?);
                }

                self.invoke_callable(callee_val, paren, arg_values)?
            }

            Expr::Lambda { params, body } => Value::Lambda(Rc::new(LoxLambda {
                params: params.as_slice(),
                body: body.as_slice(),
                closure: Rc::clone(&self.environment),
            })),

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => LoxInstance::get(&instance, name)?,
                _ => return Err(LoxError::runtime(name, "Only instances have properties.")),
            },

            Expr::Set {
                object,
                name,
                value,
            } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    let value = self.evaluate(value)?;
                    instance.borrow_mut().set(name, value.clone());
                    value
                }
                _ => return Err(LoxError::runtime(name, "Only instances have fields.")),
            },

            Expr::This { keyword, id } => self.look_up_variable(keyword, *id)?,

            Expr::Super { keyword, method, id } => {
                let distance = match self.locals.get(id) {
                    Some(&distance) => distance,
                    None => {
                        return Err(LoxError::runtime(
                            keyword,
                            "Can't use 'super' outside of a class.",
                        ))
                    }
                };

                let superclass = Environment::get_at(&self.environment, distance, "super");
                // `this` lives one scope inside the `super` scope.
                let object = Environment::get_at(&self.environment, distance - 1, "this");

                match (superclass, object) {
                    (Value::Class(superclass), Value::Instance(instance)) => {
                        match superclass.find_method(method.lexeme) {
                            Some(found) => Value::Function(Rc::new(found.bind(instance))),
                            None => {
                                return Err(LoxError::runtime(
                                    method,
                                    format!("Undefined property '{}'.", method.lexeme),
                                ))
                            }
                        }
                    }
                    _ => unreachable!("'super' resolved to a non-class binding"),
                }
            }
        };

        debug!("Expression evaluated to: {}", value);
        Ok(value)
    }

    /// Arithmetic, comparison and equality over already-evaluated operands.
    fn binary_op(
        &self,
        operator: &Token<'a>,
        left: Value<'a>,
        right: Value<'a>,
    ) -> Result<Value<'a>> {
        match operator.token_type {
            TokenType::PLUS => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                _ => Err(LoxError::runtime(
                    operator,
                    "Operands must be two numbers or two strings.",
                )),
            },

            TokenType::MINUS => {
                let (a, b) = check_number_operands(operator, &left, &right)?;
                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = check_number_operands(operator, &left, &right)?;
                Ok(Value::Number(a * b))
            }

            TokenType::SLASH => {
                let (a, b) = check_number_operands(operator, &left, &right)?;
                // Division by zero follows IEEE-754: inf / nan, no error.
                Ok(Value::Number(a / b))
            }

            TokenType::GREATER => {
                let (a, b) = check_number_operands(operator, &left, &right)?;
                Ok(Value::Bool(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = check_number_operands(operator, &left, &right)?;
                Ok(Value::Bool(a >= b))
            }

            TokenType::LESS => {
                let (a, b) = check_number_operands(operator, &left, &right)?;
                Ok(Value::Bool(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = check_number_operands(operator, &left, &right)?;
                Ok(Value::Bool(a <= b))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(is_equal(&left, &right))),
            TokenType::BANG_EQUAL => Ok(Value::Bool(!is_equal(&left, &right))),

            _ => Err(LoxError::runtime(operator, "Invalid binary operator.")),
        }
    }

    /// Resolver-directed variable read: exact hop-count when the table has
    /// an entry, global-by-name otherwise.
    fn look_up_variable(&self, name: &Token<'a>, id: ExprId) -> Result<Value<'a>> {
        match self.locals.get(&id) {
            Some(&distance) => Ok(Environment::get_at(&self.environment, distance, name.lexeme)),
            None => self.globals.borrow().get(name),
        }
    }

    /// Invokes a callable value.  Arity gates the call before any body runs.
    fn invoke_callable(
        &mut self,
        callee: Value<'a>,
        paren: &Token<'a>,
        arguments: Vec<Value<'a>>,
    ) -> Result<Value<'a>> {
        let arity = match &callee {
            Value::NativeFunction { arity, .. } => *arity,
            Value::Function(function) => function.arity(),
            Value::Lambda(lambda) => lambda.arity(),
            Value::Class(class) => class.arity(),
            _ => {
                return Err(LoxError::runtime(
                    paren,
                    "Can only call functions and classes.",
                ))
            }
        };

        if arguments.len() != arity {
            return Err(LoxError::runtime(
                paren,
                format!("Expected {} arguments but got {}.", arity, arguments.len()),
            ));
        }

        match callee {
            Value::NativeFunction { name, func, .. } => {
                debug!("Calling native function '{}'", name);
                func(&arguments).map_err(|message| LoxError::Runtime {
                    message,
                    line: paren.line,
                })
            }

            Value::Function(function) => function.call(self, arguments),
            Value::Lambda(lambda) => lambda.call(self, arguments),
            Value::Class(class) => LoxClass::call(&class, self, arguments),

            _ => Err(LoxError::runtime(
                paren,
                "Can only call functions and classes.",
            )),
        }
    }
}

impl<'a> Default for Interpreter<'a> {
    fn default() -> Self {
        Self::new()
    }
}

/// `nil` and `false` are falsy; everything else (including `0` and `""`)
/// is truthy.
fn is_truthy(value: &Value<'_>) -> bool {
    match value {
        Value::Nil => false,
        Value::Bool(b) => *b,
        _ => true,
    }
}

/// Values of different kinds are never equal; numbers and strings compare
/// by value, callables and instances by identity.
fn is_equal<'a>(left: &Value<'a>, right: &Value<'a>) -> bool {
    match (left, right) {
        (Value::Nil, Value::Nil) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
        (Value::Lambda(a), Value::Lambda(b)) => Rc::ptr_eq(a, b),
        (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
        (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

fn check_number_operands(
    operator: &Token<'_>,
    left: &Value<'_>,
    right: &Value<'_>,
) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(LoxError::runtime(operator, "Operands must be numbers.")),
    }
}

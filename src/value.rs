//! Runtime values and the callable object model.
//!
//! Everything the interpreter can hold in a variable lives here: the
//! primitive values, plus the four callable shapes (native function, user
//! function, anonymous lambda, class) and class instances.  Callables all
//! answer `arity()` and `call(interpreter, arguments)`; dispatch over the
//! shapes happens by matching the [`Value`] variant, not by inheritance.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::interpreter::{Flow, Interpreter};
use crate::parser::Stmt;
use crate::token::Token;

/// Signature of a built-in function provided by the host.
pub type NativeFn<'a> = fn(&[Value<'a>]) -> std::result::Result<Value<'a>, String>;

/// A runtime value.  Cloning is cheap: composite variants are `Rc`-shared.
#[derive(Clone)]
pub enum Value<'a> {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    NativeFunction {
        name: &'static str,
        arity: usize,
        func: NativeFn<'a>,
    },
    Function(Rc<LoxFunction<'a>>),
    Lambda(Rc<LoxLambda<'a>>),
    Class(Rc<LoxClass<'a>>),
    Instance(Rc<RefCell<LoxInstance<'a>>>),
}

impl<'a> fmt::Display for Value<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),

            Value::Bool(b) => write!(f, "{}", b),

            Value::Number(n) => {
                if n.fract() == 0.0 {
                    write!(f, "{:.0}", n)
                } else {
                    write!(f, "{}", n)
                }
            }

            Value::String(s) => write!(f, "{}", s),

            Value::NativeFunction { name, .. } => write!(f, "<native fn {}>", name),

            Value::Function(function) => write!(f, "<fn {}>", function.name.lexeme),

            Value::Lambda(_) => write!(f, "<anonymous fn>"),

            Value::Class(class) => write!(f, "{}", class.name.lexeme),

            Value::Instance(instance) => {
                write!(f, "{} instance", instance.borrow().class.name.lexeme)
            }
        }
    }
}

// Closures alias the environments that hold them, so a derived Debug would
// chase the cycle.  Print the short rendered form instead.
impl<'a> fmt::Debug for Value<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other),
        }
    }
}

/// A named user function: declaration slices plus the captured closure.
pub struct LoxFunction<'a> {
    pub name: &'a Token<'a>,
    pub params: &'a [&'a Token<'a>],
    pub body: &'a [Stmt<'a>],
    pub closure: Rc<RefCell<Environment<'a>>>,
    pub is_initializer: bool,
}

impl<'a> LoxFunction<'a> {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Produce a per-instance callable: same declaration, fresh closure
    /// nesting `this` one level inside the original closure.
    pub fn bind(&self, instance: Rc<RefCell<LoxInstance<'a>>>) -> LoxFunction<'a> {
        let mut environment = Environment::with_enclosing(Rc::clone(&self.closure));
        environment.define("this", Value::Instance(instance));

        LoxFunction {
            name: self.name,
            params: self.params,
            body: self.body,
            closure: Rc::new(RefCell::new(environment)),
            is_initializer: self.is_initializer,
        }
    }

    /// Execute the body in a fresh frame parented by the closure.
    /// Parameters and body share that one frame.  The caller has already
    /// checked arity.
    pub fn call(
        &self,
        interpreter: &mut Interpreter<'a>,
        arguments: Vec<Value<'a>>,
    ) -> Result<Value<'a>> {
        debug!("Calling <fn {}>", self.name.lexeme);

        let mut environment = Environment::with_enclosing(Rc::clone(&self.closure));

        for (param, argument) in self.params.iter().zip(arguments) {
            environment.define(param.lexeme, argument);
        }

        let flow = interpreter.execute_block(self.body, Rc::new(RefCell::new(environment)))?;

        // Constructors always yield the instance, even on early `return;`.
        if self.is_initializer {
            return Ok(Environment::get_at(&self.closure, 0, "this"));
        }

        match flow {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Nil),
        }
    }
}

/// An anonymous function.  Same calling convention as [`LoxFunction`],
/// minus the name and the constructor special case.
pub struct LoxLambda<'a> {
    pub params: &'a [&'a Token<'a>],
    pub body: &'a [Stmt<'a>],
    pub closure: Rc<RefCell<Environment<'a>>>,
}

impl<'a> LoxLambda<'a> {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn call(
        &self,
        interpreter: &mut Interpreter<'a>,
        arguments: Vec<Value<'a>>,
    ) -> Result<Value<'a>> {
        debug!("Calling <anonymous fn>");

        let mut environment = Environment::with_enclosing(Rc::clone(&self.closure));

        for (param, argument) in self.params.iter().zip(arguments) {
            environment.define(param.lexeme, argument);
        }

        match interpreter.execute_block(self.body, Rc::new(RefCell::new(environment)))? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Nil),
        }
    }
}

/// A class: method table plus optional superclass.  Classes are themselves
/// callable; calling one allocates an instance and runs `init` if present.
pub struct LoxClass<'a> {
    pub name: &'a Token<'a>,
    pub superclass: Option<Rc<LoxClass<'a>>>,
    pub methods: HashMap<&'a str, Rc<LoxFunction<'a>>>,
}

impl<'a> LoxClass<'a> {
    /// Look up a method here or anywhere up the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction<'a>>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }

        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    /// A class's arity is its constructor's, or zero without one.
    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }

    /// Allocate an instance and run `init` bound to it, discarding the
    /// constructor's return value.
    pub fn call(
        class: &Rc<LoxClass<'a>>,
        interpreter: &mut Interpreter<'a>,
        arguments: Vec<Value<'a>>,
    ) -> Result<Value<'a>> {
        debug!("Instantiating class {}", class.name.lexeme);

        let instance = Rc::new(RefCell::new(LoxInstance {
            class: Rc::clone(class),
            fields: HashMap::new(),
        }));

        if let Some(initializer) = class.find_method("init") {
            initializer
                .bind(Rc::clone(&instance))
                .call(interpreter, arguments)?;
        }

        Ok(Value::Instance(instance))
    }
}

/// An object: a class reference plus fields populated lazily on first set.
pub struct LoxInstance<'a> {
    pub class: Rc<LoxClass<'a>>,
    fields: HashMap<&'a str, Value<'a>>,
}

impl<'a> LoxInstance<'a> {
    /// Property lookup: own fields shadow methods; methods come back bound
    /// to this instance.
    pub fn get(this: &Rc<RefCell<LoxInstance<'a>>>, name: &Token<'a>) -> Result<Value<'a>> {
        if let Some(value) = this.borrow().fields.get(name.lexeme) {
            return Ok(value.clone());
        }

        if let Some(method) = this.borrow().class.find_method(name.lexeme) {
            return Ok(Value::Function(Rc::new(method.bind(Rc::clone(this)))));
        }

        Err(LoxError::runtime(
            name,
            format!("Undefined property '{}'.", name.lexeme),
        ))
    }

    pub fn set(&mut self, name: &Token<'a>, value: Value<'a>) {
        self.fields.insert(name.lexeme, value);
    }
}

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;

/// One link in the chain of lexical scopes.
///
/// Environments are shared: every closure captured in a scope and every
/// active call frame holds an `Rc` to the same link, so all aliases observe
/// the same latest write.  The chain from any environment to the globals is
/// finite and acyclic; the global environment has no enclosing scope.
#[derive(Debug)]
pub struct Environment<'a> {
    values: HashMap<&'a str, Value<'a>>,
    pub enclosing: Option<Rc<RefCell<Environment<'a>>>>,
}

impl<'a> Environment<'a> {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment<'a>>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Insert or overwrite a binding in *this* environment only.
    /// Redefinition is legal (REPL redeclaration, parameter shadowing).
    pub fn define(&mut self, name: &'a str, value: Value<'a>) {
        self.values.insert(name, value);
    }

    /// Name-walking lookup: this scope first, then each enclosing scope.
    /// Used for globals and for anything the resolver left untable'd.
    pub fn get(&self, name: &Token<'a>) -> Result<Value<'a>> {
        if let Some(value) = self.values.get(name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(LoxError::runtime(
                name,
                format!("Undefined variable '{}'.", name.lexeme),
            ))
        }
    }

    /// Name-walking assignment with the same fallback strategy as [`get`].
    ///
    /// [`get`]: Environment::get
    pub fn assign(&mut self, name: &Token<'a>, value: Value<'a>) -> Result<()> {
        if self.values.contains_key(name.lexeme) {
            self.values.insert(name.lexeme, value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(LoxError::runtime(
                name,
                format!("Undefined variable '{}'.", name.lexeme),
            ))
        }
    }

    /// Read the binding exactly `distance` scopes up the chain.
    ///
    /// No name search happens along the way: the resolver already proved the
    /// binding lives there.  A miss here means the resolver and interpreter
    /// disagree about scope shape, which is a bug in this crate, so it
    /// panics rather than surfacing a user-facing error.
    pub fn get_at(this: &Rc<RefCell<Environment<'a>>>, distance: usize, name: &str) -> Value<'a> {
        let target = Self::ancestor(this, distance);
        let value = target
            .borrow()
            .values
            .get(name)
            .cloned()
            .unwrap_or_else(|| {
                panic!("resolver promised '{}' at distance {}", name, distance)
            });
        value
    }

    /// Write the binding exactly `distance` scopes up the chain.
    /// Same contract as [`get_at`]: a miss is a crate bug.
    ///
    /// [`get_at`]: Environment::get_at
    pub fn assign_at(
        this: &Rc<RefCell<Environment<'a>>>,
        distance: usize,
        name: &'a str,
        value: Value<'a>,
    ) {
        let target = Self::ancestor(this, distance);
        let mut target = target.borrow_mut();
        assert!(
            target.values.contains_key(name),
            "resolver promised '{}' at distance {}",
            name,
            distance
        );
        target.values.insert(name, value);
    }

    fn ancestor(
        this: &Rc<RefCell<Environment<'a>>>,
        distance: usize,
    ) -> Rc<RefCell<Environment<'a>>> {
        let mut environment = Rc::clone(this);

        for _ in 0..distance {
            let next = environment
                .borrow()
                .enclosing
                .as_ref()
                .map(Rc::clone)
                .unwrap_or_else(|| panic!("scope chain shorter than resolved distance"));
            environment = next;
        }

        environment
    }
}

impl<'a> Default for Environment<'a> {
    fn default() -> Self {
        Self::new()
    }
}

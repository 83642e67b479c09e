use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle to a scope. Blocks, calls and closures all hold one; a
/// binding written through any handle is seen through every other.
pub type EnvRef<'a> = Rc<RefCell<Environment<'a>>>;

/// One lexical scope: its own bindings plus a link to the scope it is nested in.
#[derive(Debug, Default)]
pub struct Environment<'a> {
    values: HashMap<String, Value<'a>>,
    enclosing: Option<EnvRef<'a>>,
}

impl<'a> Environment<'a> {
    /// A scope with no parent, i.e. the global scope.
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: EnvRef<'a>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Wraps `self` in a fresh shared handle.
    pub fn into_ref(self) -> EnvRef<'a> {
        Rc::new(RefCell::new(self))
    }

    /// The scope this one was opened inside, if any.
    pub fn enclosing(&self) -> Option<EnvRef<'a>> {
        self.enclosing.clone()
    }

    /// Introduces or overwrites `name` in this scope. Never fails.
    pub fn define(&mut self, name: &str, value: Value<'a>) {
        self.values.insert(name.to_string(), value);
    }

    /// Searches this scope, then each enclosing one.
    pub fn get(&self, name: &Token<'_>) -> Result<Value<'a>> {
        if let Some(value) = self.values.get(name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined(name))
        }
    }

    /// Overwrites the nearest existing binding of `name`; never creates one.
    pub fn assign(&mut self, name: &Token<'_>, value: Value<'a>) -> Result<()> {
        if let Some(slot) = self.values.get_mut(name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined(name))
        }
    }

    /// The scope exactly `distance` links out from `env` (0 = `env` itself).
    pub fn ancestor(env: &EnvRef<'a>, distance: usize) -> Option<EnvRef<'a>> {
        let mut current = Rc::clone(env);

        for _ in 0..distance {
            let next = current.borrow().enclosing()?;
            current = next;
        }

        Some(current)
    }

    /// Reads `name` directly from the scope `distance` links out; no search.
    pub fn get_named_at(env: &EnvRef<'a>, distance: usize, name: &str) -> Option<Value<'a>> {
        let scope = Self::ancestor(env, distance)?;
        let value = scope.borrow().values.get(name).cloned();
        value
    }

    pub fn get_at(env: &EnvRef<'a>, distance: usize, name: &Token<'_>) -> Result<Value<'a>> {
        debug!("Reading '{}' at distance {}", name.lexeme, distance);

        Self::get_named_at(env, distance, name.lexeme).ok_or_else(|| undefined(name))
    }

    /// Writes `name` directly into the scope `distance` links out.
    pub fn assign_at(
        env: &EnvRef<'a>,
        distance: usize,
        name: &Token<'_>,
        value: Value<'a>,
    ) -> Result<()> {
        debug!("Writing '{}' at distance {}", name.lexeme, distance);

        let scope = Self::ancestor(env, distance).ok_or_else(|| undefined(name))?;
        scope.borrow_mut().define(name.lexeme, value);

        Ok(())
    }
}

fn undefined(name: &Token<'_>) -> LoxError {
    LoxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
}

//! The object model: everything a call expression can target, plus instances.
//!
//! - [`NativeFunction`]: host code, only `clock` today.
//! - [`LoxFunction`]: a declaration paired with the scope it closed over.
//! - [`LoxClass`]: a method table and an optional superclass; calling one
//!   builds a [`LoxInstance`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::FunctionDecl;
use crate::environment::{EnvRef, Environment};
use crate::error::{LoxError, Result};
use crate::interpreter::{Flow, Interpreter};
use crate::token::Token;
use crate::value::Value;

/// Name of the method run by a class call.
pub const INITIALIZER: &str = "init";

/// Anything with a fixed arity that can be applied to evaluated arguments.
///
/// The interpreter checks the argument count against [`Callable::arity`]
/// before calling, so implementations may index `arguments` freely.
pub trait Callable<'a> {
    fn arity(&self) -> usize;

    fn call(&self, interpreter: &mut Interpreter<'a>, arguments: Vec<Value<'a>>)
        -> Result<Value<'a>>;
}

// ───────────────────────────── native functions ─────────────────────────────

pub struct NativeFunction<'a> {
    pub name: &'static str,
    pub arity: usize,
    pub func: fn(&[Value<'a>]) -> Value<'a>,
}

impl<'a> NativeFunction<'a> {
    /// `clock()`: seconds since the Unix epoch, millisecond resolution.
    pub fn clock() -> Self {
        NativeFunction {
            name: "clock",
            arity: 0,
            func: |_args| {
                let millis = chrono::Utc::now().timestamp_millis();
                debug!("Native 'clock' read {} ms", millis);
                Value::Number(millis as f64 / 1000.0)
            },
        }
    }
}

impl<'a> Callable<'a> for NativeFunction<'a> {
    fn arity(&self) -> usize {
        self.arity
    }

    fn call(&self, _interpreter: &mut Interpreter<'a>, arguments: Vec<Value<'a>>) -> Result<Value<'a>> {
        debug!("Calling native function '{}'", self.name);
        Ok((self.func)(&arguments))
    }
}

impl<'a> fmt::Debug for NativeFunction<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

// ───────────────────────────── user functions ───────────────────────────────

pub struct LoxFunction<'a> {
    declaration: &'a FunctionDecl<'a>,
    closure: EnvRef<'a>,
    is_initializer: bool,
}

impl<'a> LoxFunction<'a> {
    pub fn new(declaration: &'a FunctionDecl<'a>, closure: EnvRef<'a>, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &'a str {
        self.declaration.name.lexeme
    }

    /// A copy of this method whose closure has `this` bound to `instance`.
    /// The original function is left untouched.
    pub fn bind(&self, instance: Rc<LoxInstance<'a>>) -> LoxFunction<'a> {
        let mut scope = Environment::with_enclosing(Rc::clone(&self.closure));
        scope.define("this", Value::Instance(instance));

        LoxFunction {
            declaration: self.declaration,
            closure: scope.into_ref(),
            is_initializer: self.is_initializer,
        }
    }

    /// `this` from the binding scope; initializers always yield it.
    fn bound_this(&self) -> Value<'a> {
        Environment::get_named_at(&self.closure, 0, "this").unwrap_or(Value::Nil)
    }
}

impl<'a> Callable<'a> for LoxFunction<'a> {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call(&self, interpreter: &mut Interpreter<'a>, arguments: Vec<Value<'a>>) -> Result<Value<'a>> {
        debug!("Calling user-defined function '{}'", self.name());

        let mut activation = Environment::with_enclosing(Rc::clone(&self.closure));
        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            activation.define(param.lexeme, argument);
        }

        let flow = interpreter.execute_block(&self.declaration.body, activation.into_ref())?;

        if self.is_initializer {
            return Ok(self.bound_this());
        }

        Ok(match flow {
            Flow::Return(value) => value,
            Flow::Normal => Value::Nil,
        })
    }
}

impl<'a> fmt::Debug for LoxFunction<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

// ───────────────────────────── classes ──────────────────────────────────────

/// Immutable once built. Subclasses share their superclass through `Rc`.
pub struct LoxClass<'a> {
    name: &'a str,
    superclass: Option<Rc<LoxClass<'a>>>,
    methods: HashMap<&'a str, Rc<LoxFunction<'a>>>,
}

impl<'a> LoxClass<'a> {
    pub fn new(
        name: &'a str,
        superclass: Option<Rc<LoxClass<'a>>>,
        methods: HashMap<&'a str, Rc<LoxFunction<'a>>>,
    ) -> Self {
        info!(
            "Class '{}' built with {} method(s), superclass {:?}",
            name,
            methods.len(),
            superclass.as_ref().map(|s| s.name)
        );

        Self {
            name,
            superclass,
            methods,
        }
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Own methods first, then each superclass in turn.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction<'a>>> {
        let mut class = self;

        loop {
            if let Some(method) = class.methods.get(name) {
                return Some(Rc::clone(method));
            }

            class = class.superclass.as_deref()?;
        }
    }
}

/// Calling a class constructs an instance and runs `init` on it, if any.
impl<'a> Callable<'a> for Rc<LoxClass<'a>> {
    fn arity(&self) -> usize {
        self.find_method(INITIALIZER).map_or(0, |init| init.arity())
    }

    fn call(&self, interpreter: &mut Interpreter<'a>, arguments: Vec<Value<'a>>) -> Result<Value<'a>> {
        debug!("Instantiating class '{}'", self.name);

        let instance = Rc::new(LoxInstance::new(Rc::clone(self)));

        if let Some(init) = self.find_method(INITIALIZER) {
            init.bind(Rc::clone(&instance)).call(interpreter, arguments)?;
        }

        Ok(Value::Instance(instance))
    }
}

impl<'a> fmt::Debug for LoxClass<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

// ───────────────────────────── instances ────────────────────────────────────

pub struct LoxInstance<'a> {
    class: Rc<LoxClass<'a>>,
    fields: RefCell<HashMap<String, Value<'a>>>,
}

impl<'a> LoxInstance<'a> {
    pub fn new(class: Rc<LoxClass<'a>>) -> Self {
        Self {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    pub fn class(&self) -> &Rc<LoxClass<'a>> {
        &self.class
    }

    /// Property read: own field, else a method bound to `instance`.
    pub fn get(instance: &Rc<LoxInstance<'a>>, name: &Token<'_>) -> Result<Value<'a>> {
        if let Some(value) = instance.fields.borrow().get(name.lexeme) {
            return Ok(value.clone());
        }

        match instance.class.find_method(name.lexeme) {
            Some(method) => Ok(Value::Function(Rc::new(method.bind(Rc::clone(instance))))),
            None => Err(LoxError::runtime(
                name,
                format!("Undefined property '{}'.", name.lexeme),
            )),
        }
    }

    /// Always writes an own field, even when a method of that name exists.
    pub fn set(&self, name: &Token<'_>, value: Value<'a>) {
        self.fields.borrow_mut().insert(name.lexeme.to_string(), value);
    }
}

impl<'a> fmt::Debug for LoxInstance<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance", self.class.name)
    }
}

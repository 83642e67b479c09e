//! Runtime values.
//!
//! Primitives are stored inline; functions, classes and instances are shared
//! through `Rc`, so copying a [`Value`] never copies an object.

use std::fmt;
use std::rc::Rc;

use crate::callable::{Callable, LoxClass, LoxFunction, LoxInstance, NativeFunction};

#[derive(Debug, Clone)]
pub enum Value<'a> {
    NativeFunction(Rc<NativeFunction<'a>>),
    Function(Rc<LoxFunction<'a>>),
    Class(Rc<LoxClass<'a>>),
    Instance(Rc<LoxInstance<'a>>),
    Number(f64),
    String(String),
    Bool(bool),
    Nil,
}

impl<'a> Value<'a> {
    /// `nil` and `false` are falsy; everything else, `0` and `""` included, is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// The call interface of the value, if it has one.
    pub fn as_callable(&self) -> Option<&dyn Callable<'a>> {
        match self {
            Value::NativeFunction(native) => Some(native.as_ref()),
            Value::Function(function) => Some(function.as_ref()),
            Value::Class(class) => Some(class),
            _ => None,
        }
    }
}

/// Values of different kinds are never equal. Objects compare by identity.
impl<'a> PartialEq for Value<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => same_number(*a, *b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::NativeFunction(a), Value::NativeFunction(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Numbers are equal when they are the same value, not by IEEE comparison:
/// every `NaN` equals every other `NaN`, and `0` differs from `-0`.
fn same_number(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
}

impl<'a> fmt::Display for Value<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::NativeFunction(_) => write!(f, "<native fn>"),

            Value::Function(function) => write!(f, "<fn {}>", function.name()),

            Value::Class(class) => write!(f, "<class {}>", class.name()),

            Value::Instance(instance) => write!(f, "{} instance", instance.class().name()),

            Value::Number(n) => fmt_number(*n, f),

            Value::String(s) => write!(f, "{}", s),

            Value::Bool(b) => write!(f, "{}", b),

            Value::Nil => write!(f, "nil"),
        }
    }
}

/// Integral numbers print without a fraction: `3.0` → `3`, `3.5` → `3.5`.
fn fmt_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        return write!(f, "NaN");
    }

    if n.is_infinite() {
        return write!(f, "{}Infinity", if n < 0.0 { "-" } else { "" });
    }

    if n == 0.0 && n.is_sign_negative() {
        return write!(f, "-0");
    }

    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        let mut buf = itoa::Buffer::new();
        return write!(f, "{}", buf.format(n as i64));
    }

    write!(f, "{}", n)
}

//! Tree‑walking evaluator.
//!
//! The interpreter owns the global scope, a pointer to the scope currently
//! executing, and the distance table produced by the resolver. Local names
//! are read with a direct hop count from that table; names with no entry are
//! globals and are looked up by name when used, so top‑level functions may
//! refer to each other before both are defined.
//!
//! `return` is not an error. Statements yield a [`Flow`], and only a function
//! call turns `Flow::Return` back into a value. Runtime errors travel as
//! `Err(LoxError::Runtime)` all the way out of [`Interpreter::interpret`].

use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::callable::{LoxClass, LoxFunction, LoxInstance, NativeFunction, INITIALIZER};
use crate::environment::{EnvRef, Environment};
use crate::error::{LoxError, Result};
use crate::resolver::Resolutions;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Deepest chain of nested calls before the program is stopped with a
/// runtime error instead of exhausting the host stack.
pub const MAX_CALL_DEPTH: usize = 1024;

/// How a statement finished.
#[derive(Debug)]
pub enum Flow<'a> {
    Normal,
    /// A `return` is unwinding towards the nearest function call.
    Return(Value<'a>),
}

pub struct Interpreter<'a> {
    globals: EnvRef<'a>,
    environment: EnvRef<'a>,
    locals: Resolutions,
    out: Box<dyn Write + 'a>,
    /// Calls currently in progress.
    depth: usize,
}

impl<'a> Interpreter<'a> {
    /// Interpreter printing to `out`. Globals start with the native `clock`.
    pub fn with_output(locals: Resolutions, out: Box<dyn Write + 'a>) -> Self {
        info!(
            "Initializing Interpreter with {} resolved local(s)",
            locals.len()
        );

        let globals = Environment::new().into_ref();

        debug!("Defining native function 'clock'");
        globals
            .borrow_mut()
            .define("clock", Value::NativeFunction(Rc::new(NativeFunction::clock())));

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals,
            out,
            depth: 0,
        }
    }

    /// Merges distances for code parsed after this interpreter was built.
    pub fn add_resolutions(&mut self, locals: Resolutions) {
        debug!("Adding {} resolved local(s)", locals.len());
        self.locals.extend(locals);
    }

    /// Runs a program. Stops at the first runtime error; output printed
    /// before it stays printed.
    pub fn interpret(&mut self, statements: &'a [Stmt<'a>]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            if let Flow::Return(_) = self.execute(stmt)? {
                // The resolver rejects top-level `return`.
                debug!("Ignoring return signal at top level");
            }
        }

        self.out.flush()?;

        info!("Interpretation completed successfully");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    pub fn execute(&mut self, stmt: &'a Stmt<'a>) -> Result<Flow<'a>> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value)?;
                debug!("Printed value: {}", value);
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Defining variable '{}' = {}", name.lexeme, value);
                self.environment.borrow_mut().define(name.lexeme, value);
            }

            Stmt::Block(statements) => {
                let scope = Environment::with_enclosing(Rc::clone(&self.environment));
                return self.execute_block(statements, scope.into_ref());
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    return self.execute(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.execute(else_branch);
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let flow @ Flow::Return(_) = self.execute(body)? {
                        return Ok(flow);
                    }
                }
            }

            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name.lexeme);
                let function = LoxFunction::new(declaration, Rc::clone(&self.environment), false);
                self.environment
                    .borrow_mut()
                    .define(declaration.name.lexeme, Value::Function(Rc::new(function)));
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                return Ok(Flow::Return(value));
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.declare_class(name, superclass.as_ref(), methods)?,
        }

        Ok(Flow::Normal)
    }

    /// Runs `statements` inside `scope`, then restores the previous scope
    /// whether they finished, returned or failed.
    pub fn execute_block(&mut self, statements: &'a [Stmt<'a>], scope: EnvRef<'a>) -> Result<Flow<'a>> {
        let previous = std::mem::replace(&mut self.environment, scope);

        let result = self.execute_all(statements);

        self.environment = previous;
        result
    }

    fn execute_all(&mut self, statements: &'a [Stmt<'a>]) -> Result<Flow<'a>> {
        for stmt in statements {
            if let flow @ Flow::Return(_) = self.execute(stmt)? {
                return Ok(flow);
            }
        }

        Ok(Flow::Normal)
    }

    fn declare_class(
        &mut self,
        name: &Token<'a>,
        superclass: Option<&Expr<'a>>,
        methods: &'a [FunctionDecl<'a>],
    ) -> Result<()> {
        debug!("Declaring class '{}'", name.lexeme);

        let superclass = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    let token = match expr {
                        Expr::Variable { name, .. } => *name,
                        _ => name,
                    };
                    return Err(LoxError::runtime(token, "Superclass must be a class."));
                }
            },
            None => None,
        };

        // Methods close over a scope holding `super` when there is a superclass.
        let closure = match &superclass {
            Some(class) => {
                let mut scope = Environment::with_enclosing(Rc::clone(&self.environment));
                scope.define("super", Value::Class(Rc::clone(class)));
                scope.into_ref()
            }
            None => Rc::clone(&self.environment),
        };

        let table: HashMap<&'a str, Rc<LoxFunction<'a>>> = methods
            .iter()
            .map(|method| {
                let is_initializer = method.name.lexeme == INITIALIZER;
                let function = LoxFunction::new(method, Rc::clone(&closure), is_initializer);
                (method.name.lexeme, Rc::new(function))
            })
            .collect();

        let class = LoxClass::new(name.lexeme, superclass, table);

        self.environment
            .borrow_mut()
            .define(name.lexeme, Value::Class(Rc::new(class)));

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    pub fn evaluate(&mut self, expr: &Expr<'a>) -> Result<Value<'a>> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;

                let short_circuits = match operator.token_type {
                    TokenType::OR => left.is_truthy(),
                    _ => !left.is_truthy(),
                };

                if short_circuits {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => {
                        Environment::assign_at(&self.environment, distance, name, value.clone())?
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => self.evaluate_call(callee, paren, arguments),

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => LoxInstance::get(&instance, name),
                _ => Err(LoxError::runtime(name, "Only instances have properties.")),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(LoxError::runtime(name, "Only instances have fields."));
                };

                let value = self.evaluate(value)?;
                instance.set(name, value.clone());

                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token<'a>, right: &Expr<'a>) -> Result<Value<'a>> {
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match right {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(LoxError::runtime(operator, "Operand must be a number.")),
            },

            TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),

            _ => Err(LoxError::runtime(operator, "Invalid unary operator.")),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr<'a>,
        operator: &Token<'a>,
        right: &Expr<'a>,
    ) -> Result<Value<'a>> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                _ => Err(LoxError::runtime(
                    operator,
                    "Operands must be two numbers or two strings.",
                )),
            },

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left == right)),
            TokenType::BANG_EQUAL => Ok(Value::Bool(left != right)),

            _ => {
                let (Value::Number(a), Value::Number(b)) = (left, right) else {
                    return Err(LoxError::runtime(operator, "Operands must be numbers."));
                };

                match operator.token_type {
                    TokenType::MINUS => Ok(Value::Number(a - b)),
                    TokenType::STAR => Ok(Value::Number(a * b)),
                    TokenType::SLASH => Ok(Value::Number(a / b)),
                    TokenType::GREATER => Ok(Value::Bool(a > b)),
                    TokenType::GREATER_EQUAL => Ok(Value::Bool(a >= b)),
                    TokenType::LESS => Ok(Value::Bool(a < b)),
                    TokenType::LESS_EQUAL => Ok(Value::Bool(a <= b)),
                    _ => Err(LoxError::runtime(operator, "Invalid binary operator.")),
                }
            }
        }
    }

    fn evaluate_call(
        &mut self,
        callee: &Expr<'a>,
        paren: &Token<'a>,
        arguments: &[Expr<'a>],
    ) -> Result<Value<'a>> {
        let callee = self.evaluate(callee)?;

        let Some(function) = callee.as_callable() else {
            return Err(LoxError::runtime(
                paren,
                "Can only call functions and classes.",
            ));
        };

        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            values.push(self.evaluate(argument)?);
        }

        if values.len() != function.arity() {
            return Err(LoxError::runtime(
                paren,
                format!(
                    "Expected {} arguments but got {}.",
                    function.arity(),
                    values.len()
                ),
            ));
        }

        if self.depth >= MAX_CALL_DEPTH {
            debug!("Call depth {} reached, refusing to call {}", self.depth, callee);
            return Err(LoxError::runtime(paren, "Stack overflow."));
        }

        debug!("Calling {} with {} argument(s)", callee, values.len());

        self.depth += 1;
        let result = function.call(self, values);
        self.depth -= 1;

        result
    }

    /// `super` sits `distance` scopes out; the `this` scope is one nearer.
    fn evaluate_super(&mut self, id: ExprId, keyword: &Token<'a>, method: &Token<'a>) -> Result<Value<'a>> {
        let distance = *self
            .locals
            .get(&id)
            .ok_or_else(|| LoxError::runtime(keyword, "Unresolved 'super'."))?;

        let Some(Value::Class(superclass)) = Environment::get_named_at(&self.environment, distance, "super")
        else {
            return Err(LoxError::runtime(keyword, "Unresolved 'super'."));
        };

        let this_distance = distance.saturating_sub(1);
        let Some(Value::Instance(instance)) =
            Environment::get_named_at(&self.environment, this_distance, "this")
        else {
            return Err(LoxError::runtime(keyword, "Unresolved 'this'."));
        };

        match superclass.find_method(method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),
            None => Err(LoxError::runtime(
                method,
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token<'a>) -> Result<Value<'a>> {
        match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, name),
            None => self.globals.borrow().get(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    use crate::scanner::Scanner;

    fn tokens(source: &str) -> Vec<Token<'_>> {
        let (tokens, errors) = Scanner::new(source).scan_all();
        assert!(errors.is_empty(), "{:?}", errors);
        tokens
    }

    #[test]
    fn scope_is_restored_after_a_runtime_error() {
        let tokens = tokens("var a = 1; { var b = 2; b = a + nope; }");
        let statements = Parser::new(&tokens).parse().unwrap();
        let locals = Resolver::new().resolve(&statements).unwrap();

        let mut out = Vec::new();
        let mut interpreter = Interpreter::with_output(locals, Box::new(&mut out));

        let err = interpreter.interpret(&statements).unwrap_err();
        assert!(matches!(err, LoxError::Runtime { line: 1, .. }));
        assert!(Rc::ptr_eq(&interpreter.environment, &interpreter.globals));
    }

    #[test]
    fn call_depth_unwinds_with_an_error() {
        let tokens = tokens("fun inner() { nope; }\nfun outer() { inner(); }\nouter();");
        let statements = Parser::new(&tokens).parse().unwrap();
        let locals = Resolver::new().resolve(&statements).unwrap();

        let mut interpreter = Interpreter::with_output(locals, Box::new(std::io::sink()));

        let err = interpreter.interpret(&statements).unwrap_err();
        assert!(matches!(err, LoxError::Runtime { line: 1, .. }));
        assert_eq!(interpreter.depth, 0);
    }

    #[test]
    fn return_surfaces_as_flow() {
        // No resolver here: it would reject a top-level `return`.
        let tokens = tokens("{ print 1; return 2; print 3; }");
        let statements = Parser::new(&tokens).parse().unwrap();

        let mut out = Vec::new();
        let mut interpreter = Interpreter::with_output(Resolutions::new(), Box::new(&mut out));

        let flow = interpreter.execute(&statements[0]).unwrap();
        assert!(matches!(flow, Flow::Return(Value::Number(n)) if n == 2.0));
        assert!(Rc::ptr_eq(&interpreter.environment, &interpreter.globals));

        drop(interpreter);
        assert_eq!(out, b"1\n");
    }

    #[test]
    fn globals_start_with_clock() {
        let mut interpreter = Interpreter::with_output(Resolutions::new(), Box::new(std::io::sink()));
        let clock = Token::new(TokenType::IDENTIFIER, "clock", 1);

        let value = interpreter.look_up_variable(ExprId(0), &clock).unwrap();
        assert_eq!(value.to_string(), "<native fn>");

        let Some(callable) = value.as_callable() else {
            panic!("clock is not callable");
        };
        assert_eq!(callable.arity(), 0);
        assert!(matches!(callable.call(&mut interpreter, Vec::new()), Ok(Value::Number(n)) if n > 0.0));
    }
}

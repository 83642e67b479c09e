//! Static resolver pass.
//!
//! One walk over the tree, before anything runs:
//! 1. Track lexical scopes as a stack of `HashMap<&str, bool>`
//!    (`false` = declared, `true` = ready to read).
//! 2. Report static errors: reading a local in its own initializer,
//!    redeclaring in one scope, bad `return`, `this`/`super` misuse and
//!    self‑inheritance.
//! 3. Record, for every name‑bearing expression that refers to a local, how
//!    many scopes out its binding lives. Names found in no scope are globals
//!    and get no entry; the interpreter looks them up by name at run time.
//!
//! The pass does not stop at the first error. It reports them all, and the
//! caller must not run the program if there were any.

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::callable::INITIALIZER;
use crate::error::LoxError;
use crate::token::Token;
use log::{debug, info};
use std::collections::HashMap;

/// Scope distance of each resolved local reference.
pub type Resolutions = HashMap<ExprId, usize>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

pub struct Resolver<'a> {
    scopes: Vec<HashMap<&'a str, bool>>,
    current_function: FunctionType,
    current_class: ClassType,
    resolutions: Resolutions,
    errors: Vec<LoxError>,
}

impl<'a> Default for Resolver<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Resolver<'a> {
    pub fn new() -> Self {
        info!("Resolver instantiated");

        Resolver {
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            resolutions: HashMap::new(),
            errors: Vec::new(),
        }
    }

    /// Resolves a whole program.
    pub fn resolve(mut self, statements: &[Stmt<'a>]) -> Result<Resolutions, Vec<LoxError>> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        self.resolve_stmts(statements);

        if self.errors.is_empty() {
            info!("Resolved {} local reference(s)", self.resolutions.len());
            Ok(self.resolutions)
        } else {
            info!("Resolve pass found {} error(s)", self.errors.len());
            Err(self.errors)
        }
    }

    fn resolve_stmts(&mut self, statements: &[Stmt<'a>]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt<'a>) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_stmts(statements);
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }
                self.define(name);
            }

            Stmt::Function(function) => {
                // Defined before the body so the function can recurse.
                self.declare(function.name);
                self.define(function.name);
                self.resolve_function(function, FunctionType::Function);
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),

            Stmt::Expression(expr) | Stmt::Print(expr) => self.resolve_expr(expr),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "Can't return from top-level code.");
                }

                if let Some(value) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(value);
                }
            }
        }
    }

    /// Scope layout for methods: `[super scope]` → `this` scope → params.
    fn resolve_class(
        &mut self,
        name: &Token<'a>,
        superclass: Option<&Expr<'a>>,
        methods: &[FunctionDecl<'a>],
    ) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(name);

        if let Some(superclass) = superclass {
            if let Expr::Variable { name: super_name, .. } = superclass {
                if super_name.lexeme == name.lexeme {
                    self.error(super_name, "A class can't inherit from itself.");
                }
            }

            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass);

            self.begin_scope();
            self.bind_synthetic("super");
        }

        self.begin_scope();
        self.bind_synthetic("this");

        for method in methods {
            let kind = if method.name.lexeme == INITIALIZER {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(method, kind);
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    fn resolve_function(&mut self, function: &FunctionDecl<'a>, kind: FunctionType) {
        let enclosing = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in &function.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(&function.body);
        self.end_scope();

        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr<'a>) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => self.resolve_expr(inner),

            Expr::Unary { right, .. } => self.resolve_expr(right),

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable { id, name } => {
                let in_own_initializer = self
                    .scopes
                    .last()
                    .is_some_and(|scope| scope.get(name.lexeme) == Some(&false));

                if in_own_initializer {
                    self.error(name, "Can't read local variable in its own initializer.");
                }

                self.resolve_local(*id, name.lexeme);
            }

            Expr::Assign { id, name, value } => {
                self.resolve_expr(value);
                self.resolve_local(*id, name.lexeme);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Can't use 'this' outside of a class.");
                    return;
                }

                self.resolve_local(*id, "this");
            }

            Expr::Super { id, keyword, .. } => match self.current_class {
                ClassType::None => self.error(keyword, "Can't use 'super' outside of a class."),
                ClassType::Class => {
                    self.error(keyword, "Can't use 'super' in a class with no superclass.")
                }
                ClassType::Subclass => self.resolve_local(*id, "super"),
            },
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    /// Globals are not tracked, so redeclaring one is fine.
    fn declare(&mut self, name: &Token<'a>) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };

        if scope.insert(name.lexeme, false).is_some() {
            self.error(name, "Already a variable with this name in this scope.");
        }
    }

    fn define(&mut self, name: &Token<'a>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme, true);
        }
    }

    /// `this` / `super`, bound ready in the innermost scope.
    fn bind_synthetic(&mut self, name: &'static str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, true);
        }
    }

    /// Innermost scope wins; no match means global.
    fn resolve_local(&mut self, id: ExprId, name: &str) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name) {
                debug!("Resolved '{}' {} at depth {}", name, id, depth);
                self.resolutions.insert(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' {} as global", name, id);
    }

    fn error(&mut self, token: &Token<'_>, message: &str) {
        self.errors.push(LoxError::resolve(token, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    /// Distances in source order of the resolved nodes' ids.
    fn distances(source: &str) -> Vec<usize> {
        let (tokens, lex_errors) = Scanner::new(source).scan_all();
        assert!(lex_errors.is_empty());
        let statements = Parser::new(&tokens).parse().expect("parse");
        let resolutions = Resolver::new().resolve(&statements).expect("resolve");

        let mut entries: Vec<_> = resolutions.into_iter().collect();
        entries.sort();
        entries.into_iter().map(|(_, d)| d).collect()
    }

    fn errors(source: &str) -> Vec<String> {
        let (tokens, _) = Scanner::new(source).scan_all();
        let statements = Parser::new(&tokens).parse().expect("parse");

        match Resolver::new().resolve(&statements) {
            Ok(_) => Vec::new(),
            Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn globals_get_no_distance() {
        assert!(distances("var a = 1; print a; a = 2;").is_empty());
    }

    #[test]
    fn local_distances_count_scope_hops() {
        assert_eq!(distances("{ var a = 1; { { print a; } print a; } }"), vec![2, 1]);
    }

    #[test]
    fn parameters_and_recursion() {
        // n (param) at 0 inside body; `f` itself lives in the enclosing block.
        assert_eq!(distances("{ fun f(n) { return f(n); } }"), vec![1, 0]);
    }

    #[test]
    fn this_and_super_distances() {
        let source = "class A { m() {} } class B < A { m() { super.m(); return this; } }";
        // super: method scope → this scope → super scope = 2; this = 1.
        assert_eq!(distances(source), vec![2, 1]);
    }

    #[test]
    fn resolution_is_deterministic() {
        let source = "{ var a; { var b; fun f() { print a; print b; } } }";
        assert_eq!(distances(source), distances(source));
    }

    #[test]
    fn own_initializer_is_rejected_in_local_scope() {
        assert_eq!(
            errors("{ var a = a; }"),
            vec!["[line 1] Error at 'a': Can't read local variable in its own initializer."]
        );
    }

    #[test]
    fn own_initializer_is_fine_at_top_level_and_with_outer_binding() {
        assert!(errors("var a = 1; var a = a;").is_empty());
        assert!(errors("var a = 1; { var b = a; }").is_empty());
    }

    #[test]
    fn duplicate_local_declaration() {
        assert_eq!(
            errors("{ var a; var a; }"),
            vec!["[line 1] Error at 'a': Already a variable with this name in this scope."]
        );
    }

    #[test]
    fn return_rules() {
        assert_eq!(
            errors("return 1;"),
            vec!["[line 1] Error at 'return': Can't return from top-level code."]
        );
        assert_eq!(
            errors("class A { init() { return 1; } }"),
            vec!["[line 1] Error at 'return': Can't return a value from an initializer."]
        );
        assert!(errors("class A { init() { return; } }").is_empty());
    }

    #[test]
    fn this_and_super_misuse() {
        assert_eq!(
            errors("print this;"),
            vec!["[line 1] Error at 'this': Can't use 'this' outside of a class."]
        );
        assert_eq!(
            errors("fun f() { super.m(); }"),
            vec!["[line 1] Error at 'super': Can't use 'super' outside of a class."]
        );
        assert_eq!(
            errors("class A { m() { super.m(); } }"),
            vec!["[line 1] Error at 'super': Can't use 'super' in a class with no superclass."]
        );
    }

    #[test]
    fn self_inheritance() {
        assert_eq!(
            errors("class A < A {}"),
            vec!["[line 1] Error at 'A': A class can't inherit from itself."]
        );
    }

    #[test]
    fn collects_every_error_in_one_pass() {
        let found = errors("return;\n{ var x; var x; }\nprint this;");
        assert_eq!(found.len(), 3);
        assert!(found[0].starts_with("[line 1]"));
        assert!(found[1].starts_with("[line 2]"));
        assert!(found[2].starts_with("[line 3]"));
    }
}

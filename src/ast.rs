//! Syntax tree produced by the parser and read, unchanged, by the resolver
//! and the interpreter.
//!
//! Nodes borrow their tokens from the token buffer (`'a`), which in turn
//! borrows from the source text. Nothing here is ever mutated after parsing.

use std::fmt;

use crate::token::Token;

/// Parser‑assigned identity of a name‑bearing expression node.
///
/// Only [`Expr::Variable`], [`Expr::Assign`], [`Expr::This`] and
/// [`Expr::Super`] carry one; those are the nodes the resolver may attach a
/// scope distance to. Ids are unique within one parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub usize);

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A constant written directly in the source.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Integral lexemes such as `3` are still stored as `3.0`.
    Number(f64),

    /// Contents without the surrounding quotes.
    Str(String),

    True,

    False,

    Nil,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr<'a> {
    Literal(LiteralValue),

    /// `!x` or `-x`.
    Unary {
        operator: &'a Token<'a>,
        right: Box<Expr<'a>>,
    },

    /// Arithmetic, comparison and equality operators.
    Binary {
        left: Box<Expr<'a>>,
        operator: &'a Token<'a>,
        right: Box<Expr<'a>>,
    },

    Grouping(Box<Expr<'a>>),

    Variable {
        id: ExprId,
        name: &'a Token<'a>,
    },

    Assign {
        id: ExprId,
        name: &'a Token<'a>,
        value: Box<Expr<'a>>,
    },

    /// Short‑circuiting `and` / `or`.
    Logical {
        left: Box<Expr<'a>>,
        operator: &'a Token<'a>,
        right: Box<Expr<'a>>,
    },

    Call {
        callee: Box<Expr<'a>>,
        /// Closing `)`, kept for error locations.
        paren: &'a Token<'a>,
        arguments: Vec<Expr<'a>>,
    },

    /// `object.name`
    Get {
        object: Box<Expr<'a>>,
        name: &'a Token<'a>,
    },

    /// `object.name = value`
    Set {
        object: Box<Expr<'a>>,
        name: &'a Token<'a>,
        value: Box<Expr<'a>>,
    },

    This {
        id: ExprId,
        keyword: &'a Token<'a>,
    },

    /// `super.method`
    Super {
        id: ExprId,
        keyword: &'a Token<'a>,
        method: &'a Token<'a>,
    },
}

/// A named function: top‑level `fun` or a method inside a class body.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl<'a> {
    pub name: &'a Token<'a>,

    /// At most 255 parameters.
    pub params: Vec<&'a Token<'a>>,

    pub body: Vec<Stmt<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt<'a> {
    Expression(Expr<'a>),

    Print(Expr<'a>),

    /// `var name = initializer;`. A missing initializer means `nil`.
    Var {
        name: &'a Token<'a>,
        initializer: Option<Expr<'a>>,
    },

    Block(Vec<Stmt<'a>>),

    If {
        condition: Expr<'a>,
        then_branch: Box<Stmt<'a>>,
        else_branch: Option<Box<Stmt<'a>>>,
    },

    /// Also the target of `for` desugaring.
    While {
        condition: Expr<'a>,
        body: Box<Stmt<'a>>,
    },

    Function(FunctionDecl<'a>),

    Return {
        keyword: &'a Token<'a>,
        value: Option<Expr<'a>>,
    },

    Class {
        name: &'a Token<'a>,
        /// Always an [`Expr::Variable`] when present.
        superclass: Option<Expr<'a>>,
        methods: Vec<FunctionDecl<'a>>,
    },
}

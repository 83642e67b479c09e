/*!
Recursive‑descent parser.

Turns the scanner's token buffer into a list of [`Stmt`] nodes. The parser
never stops at the first syntax error: it records the error, skips to the
next statement boundary and carries on, so a single run reports as many
problems as possible.

Grammar
-------

```text
program        → declaration* EOF ;
declaration    → classDecl | funDecl | varDecl | statement ;
classDecl      → "class" IDENT ( "<" IDENT )? "{" function* "}" ;
funDecl        → "fun" function ;
function       → IDENT "(" parameters? ")" block ;
varDecl        → "var" IDENT ( "=" expression )? ";" ;
statement      → exprStmt | forStmt | ifStmt | printStmt
               | returnStmt | whileStmt | block ;
forStmt        → "for" "(" ( varDecl | exprStmt | ";" )
                 expression? ";" expression? ")" statement ;
returnStmt     → "return" expression? ";" ;
block          → "{" declaration* "}" ;
expression     → assignment ;
assignment     → ( call "." )? IDENT "=" assignment | logic_or ;
logic_or       → logic_and ( "or" logic_and )* ;
logic_and      → equality  ( "and" equality )* ;
equality       → comparison ( ( "!=" | "==" ) comparison )* ;
comparison     → term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
term           → factor ( ( "-" | "+" ) factor )* ;
factor         → unary ( ( "/" | "*" ) unary )* ;
unary          → ( "!" | "-" ) unary | call ;
call           → primary ( "(" arguments? ")" | "." IDENT )* ;
primary        → NUMBER | STRING | "true" | "false" | "nil" | "this"
               | IDENT | "(" expression ")" | "super" "." IDENT ;
```

`for` has no node of its own; it is rewritten into `Block`/`While` here.

### Logging

| Location                     | Level   |
|------------------------------|---------|
| `Parser::new`, `parse`       | `info`  |
| `declaration`                | `debug` |
*/

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};

use log::{debug, info};

const MAX_ARGS: usize = 255;

pub struct Parser<'a> {
    /// Must end with an `EOF` token.
    tokens: &'a [Token<'a>],
    current: usize,
    next_id: usize,
    /// Errors that do not need resynchronisation (e.g. bad assignment target).
    errors: Vec<LoxError>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        Self::with_first_id(tokens, 0)
    }

    /// Parser whose node ids start at `first_id`. Successive parses that
    /// feed one interpreter chain [`Parser::next_id`] into this so ids never
    /// collide in its resolution table.
    pub fn with_first_id(tokens: &'a [Token<'a>], first_id: usize) -> Self {
        info!(
            "Parser created with {} tokens, ids from {}",
            tokens.len(),
            first_id
        );

        Self {
            tokens,
            current: 0,
            next_id: first_id,
            errors: Vec::new(),
        }
    }

    /// First id not handed out yet.
    pub fn next_id(&self) -> usize {
        self.next_id
    }

    /// Parses a whole program. Either every statement parsed cleanly, or the
    /// full list of syntax errors is returned.
    pub fn parse(&mut self) -> std::result::Result<Vec<Stmt<'a>>, Vec<LoxError>> {
        info!("Beginning parse phase");

        let mut statements: Vec<Stmt<'a>> = Vec::new();

        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        if self.errors.is_empty() {
            info!("Parsed {} statement(s)", statements.len());
            Ok(statements)
        } else {
            info!("Parse finished with {} error(s)", self.errors.len());
            Err(std::mem::take(&mut self.errors))
        }
    }

    // ──────────────────────── declaration rules ───────────────────

    /// Recovery point: a failed declaration is reported and skipped.
    fn declaration(&mut self) -> Option<Stmt<'a>> {
        debug!("Entering declaration at token {}", self.current);

        let result = if self.matches(TokenType::CLASS) {
            self.class_declaration()
        } else if self.matches(TokenType::FUN) {
            self.function("function").map(Stmt::Function)
        } else if self.matches(TokenType::VAR) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(e) => {
                debug!("Parse debug: {}", e);
                self.errors.push(e);
                self.synchronize();
                None
            }
        }
    }

    fn class_declaration(&mut self) -> Result<Stmt<'a>> {
        let name = self.consume(TokenType::IDENTIFIER, "Expect class name.")?;

        let superclass = if self.matches(TokenType::LESS) {
            let super_name = self.consume(TokenType::IDENTIFIER, "Expect superclass name.")?;
            Some(Expr::Variable {
                id: self.fresh_id(),
                name: super_name,
            })
        } else {
            None
        };

        self.consume(TokenType::LEFT_BRACE, "Expect '{' before class body.")?;

        let mut methods = Vec::new();
        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after class body.")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    fn function(&mut self, kind: &str) -> Result<FunctionDecl<'a>> {
        let name = self.consume(TokenType::IDENTIFIER, &format!("Expect {} name.", kind))?;

        self.consume(
            TokenType::LEFT_PAREN,
            &format!("Expect '(' after {} name.", kind),
        )?;

        let mut params: Vec<&'a Token<'a>> = Vec::new();
        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if params.len() >= MAX_ARGS {
                    let err = LoxError::parse(self.peek(), "Can't have more than 255 parameters.");
                    self.errors.push(err);
                }

                params.push(self.consume(TokenType::IDENTIFIER, "Expect parameter name.")?);

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after parameters.")?;
        self.consume(
            TokenType::LEFT_BRACE,
            &format!("Expect '{{' before {} body.", kind),
        )?;

        let body = self.block()?;

        Ok(FunctionDecl { name, params, body })
    }

    fn var_declaration(&mut self) -> Result<Stmt<'a>> {
        let name = self.consume(TokenType::IDENTIFIER, "Expect variable name.")?;

        let initializer = if self.matches(TokenType::EQUAL) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::SEMICOLON,
            "Expect ';' after variable declaration.",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    // ───────────────────────── statement rules ────────────────────

    fn statement(&mut self) -> Result<Stmt<'a>> {
        if self.matches(TokenType::FOR) {
            self.for_statement()
        } else if self.matches(TokenType::IF) {
            self.if_statement()
        } else if self.matches(TokenType::PRINT) {
            self.print_statement()
        } else if self.matches(TokenType::RETURN) {
            self.return_statement()
        } else if self.matches(TokenType::WHILE) {
            self.while_statement()
        } else if self.matches(TokenType::LEFT_BRACE) {
            Ok(Stmt::Block(self.block()?))
        } else {
            self.expression_statement()
        }
    }

    /// `for (init; cond; incr) body` → `{ init; while (cond) { body; incr; } }`
    fn for_statement(&mut self) -> Result<Stmt<'a>> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'for'.")?;

        let initializer = if self.matches(TokenType::SEMICOLON) {
            None
        } else if self.matches(TokenType::VAR) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if self.check(TokenType::SEMICOLON) {
            Expr::Literal(LiteralValue::True)
        } else {
            self.expression()?
        };
        self.consume(TokenType::SEMICOLON, "Expect ';' after loop condition.")?;

        let increment = if self.check(TokenType::RIGHT_PAREN) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> Result<Stmt<'a>> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.matches(TokenType::ELSE) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn print_statement(&mut self) -> Result<Stmt<'a>> {
        let value = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expect ';' after value.")?;

        Ok(Stmt::Print(value))
    }

    fn return_statement(&mut self) -> Result<Stmt<'a>> {
        let keyword = self.previous();
        let value = if self.check(TokenType::SEMICOLON) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(TokenType::SEMICOLON, "Expect ';' after return value.")?;

        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> Result<Stmt<'a>> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    fn expression_statement(&mut self) -> Result<Stmt<'a>> {
        let expr = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expect ';' after expression.")?;

        Ok(Stmt::Expression(expr))
    }

    /// Statements up to the closing `}` (which is consumed).
    fn block(&mut self) -> Result<Vec<Stmt<'a>>> {
        let mut statements = Vec::new();

        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after block.")?;

        Ok(statements)
    }

    // ───────────────────────── expression rules ───────────────────

    fn expression(&mut self) -> Result<Expr<'a>> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr<'a>> {
        let expr = self.logical_or()?;

        if self.matches(TokenType::EQUAL) {
            let equals = self.previous();
            let value = Box::new(self.assignment()?);

            return match expr {
                Expr::Variable { name, .. } => Ok(Expr::Assign {
                    id: self.fresh_id(),
                    name,
                    value,
                }),

                Expr::Get { object, name } => Ok(Expr::Set {
                    object,
                    name,
                    value,
                }),

                // Reported, but the parser is not confused: keep going.
                other => {
                    self.errors
                        .push(LoxError::parse(equals, "Invalid assignment target."));
                    Ok(other)
                }
            };
        }

        Ok(expr)
    }

    fn logical_or(&mut self) -> Result<Expr<'a>> {
        let mut expr = self.logical_and()?;

        while self.matches(TokenType::OR) {
            let operator = self.previous();
            let right = self.logical_and()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn logical_and(&mut self) -> Result<Expr<'a>> {
        let mut expr = self.equality()?;

        while self.matches(TokenType::AND) {
            let operator = self.previous();
            let right = self.equality()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    /// Left‑associative binary level: `next ( op next )*`.
    fn binary_level(
        &mut self,
        operators: &[TokenType],
        next: fn(&mut Self) -> Result<Expr<'a>>,
    ) -> Result<Expr<'a>> {
        let mut expr = next(self)?;

        while operators.iter().any(|op| self.check(op.clone())) {
            let operator = self.advance();
            let right = next(self)?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr<'a>> {
        self.binary_level(
            &[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr<'a>> {
        self.binary_level(
            &[
                TokenType::GREATER,
                TokenType::GREATER_EQUAL,
                TokenType::LESS,
                TokenType::LESS_EQUAL,
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr<'a>> {
        self.binary_level(&[TokenType::MINUS, TokenType::PLUS], Self::factor)
    }

    fn factor(&mut self) -> Result<Expr<'a>> {
        self.binary_level(&[TokenType::SLASH, TokenType::STAR], Self::unary)
    }

    fn unary(&mut self) -> Result<Expr<'a>> {
        if self.matches(TokenType::BANG) || self.matches(TokenType::MINUS) {
            let operator = self.previous();
            let right = self.unary()?;

            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr<'a>> {
        let mut expr = self.primary()?;

        loop {
            if self.matches(TokenType::LEFT_PAREN) {
                expr = self.finish_call(expr)?;
            } else if self.matches(TokenType::DOT) {
                let name = self.consume(TokenType::IDENTIFIER, "Expect property name after '.'.")?;

                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr<'a>) -> Result<Expr<'a>> {
        let mut arguments = Vec::new();

        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if arguments.len() >= MAX_ARGS {
                    let err = LoxError::parse(self.peek(), "Can't have more than 255 arguments.");
                    self.errors.push(err);
                }

                arguments.push(self.expression()?);

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        let paren = self.consume(TokenType::RIGHT_PAREN, "Expect ')' after arguments.")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr<'a>> {
        if self.matches(TokenType::FALSE) {
            return Ok(Expr::Literal(LiteralValue::False));
        }
        if self.matches(TokenType::TRUE) {
            return Ok(Expr::Literal(LiteralValue::True));
        }
        if self.matches(TokenType::NIL) {
            return Ok(Expr::Literal(LiteralValue::Nil));
        }

        match &self.peek().token_type {
            TokenType::NUMBER(n) => {
                let n = *n;
                self.advance();
                return Ok(Expr::Literal(LiteralValue::Number(n)));
            }
            TokenType::STRING(s) => {
                let s = s.clone();
                self.advance();
                return Ok(Expr::Literal(LiteralValue::Str(s)));
            }
            _ => {}
        }

        if self.matches(TokenType::SUPER) {
            let keyword = self.previous();
            self.consume(TokenType::DOT, "Expect '.' after 'super'.")?;
            let method = self.consume(TokenType::IDENTIFIER, "Expect superclass method name.")?;

            return Ok(Expr::Super {
                id: self.fresh_id(),
                keyword,
                method,
            });
        }

        if self.matches(TokenType::THIS) {
            return Ok(Expr::This {
                id: self.fresh_id(),
                keyword: self.previous(),
            });
        }

        if self.matches(TokenType::IDENTIFIER) {
            return Ok(Expr::Variable {
                id: self.fresh_id(),
                name: self.previous(),
            });
        }

        if self.matches(TokenType::LEFT_PAREN) {
            let expr = self.expression()?;
            self.consume(TokenType::RIGHT_PAREN, "Expect ')' after expression.")?;

            return Ok(Expr::Grouping(Box::new(expr)));
        }

        Err(LoxError::parse(self.peek(), "Expect expression."))
    }

    // ────────────────────── utility helpers ───────────────────────

    #[inline]
    fn fresh_id(&mut self) -> ExprId {
        let id = ExprId(self.next_id);
        self.next_id += 1;
        id
    }

    #[inline(always)]
    fn matches(&mut self, ttype: TokenType) -> bool {
        if self.check(ttype) {
            self.advance();
            return true;
        }

        false
    }

    #[inline(always)]
    fn consume(&mut self, ttype: TokenType, message: &str) -> Result<&'a Token<'a>> {
        if self.check(ttype) {
            return Ok(self.advance());
        }

        Err(LoxError::parse(self.peek(), message))
    }

    #[inline(always)]
    fn check(&self, ttype: TokenType) -> bool {
        !self.is_at_end() && self.peek().token_type == ttype
    }

    #[inline(always)]
    fn advance(&mut self) -> &'a Token<'a> {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::EOF)
    }

    #[inline(always)]
    fn peek(&self) -> &'a Token<'a> {
        &self.tokens[self.current]
    }

    #[inline(always)]
    fn previous(&self) -> &'a Token<'a> {
        &self.tokens[self.current - 1]
    }

    /// Discards tokens until it thinks it is at a statement boundary.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if matches!(self.previous().token_type, TokenType::SEMICOLON) {
                return;
            }

            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FUN
                | TokenType::VAR
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::PRINT
                | TokenType::RETURN => return,
                _ => {}
            }

            self.advance();
        }
    }
}

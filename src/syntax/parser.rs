//! Recursive descent parser for Forge scripts
//!
//! Converts a token stream into a [`Program`]. Expressions use the usual
//! precedence climbing: assignment, `?? ||`, `&&`, equality, comparison,
//! additive, multiplicative, unary, postfix, primary.

use super::ast::*;
use super::tokenizer::{Keyword, TemplateChunk, Token, TokenKind, Tokenizer};
use super::SyntaxError;
use crate::diagnostics::Range;

/// Deepest statement/expression nesting the parser accepts.
///
/// Every later stage walks the tree recursively, so this also bounds the
/// resolver, the linter and the evaluator.
pub const MAX_NESTING: usize = 128;

/// Parser for Forge tokens
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    next_id: u32,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self::with_first_id(tokens, 0)
    }

    fn with_first_id(tokens: Vec<Token>, next_id: u32) -> Self {
        Self {
            tokens,
            position: 0,
            next_id,
            depth: 0,
        }
    }

    /// Parse the whole token stream into a program
    pub fn parse(mut self) -> Result<Program, SyntaxError> {
        let mut body = Vec::new();
        while !self.is_at_end() {
            body.push(self.statement()?);
        }
        let range = match (self.tokens.first(), self.tokens.last()) {
            (Some(first), Some(last)) => first.range.cover(last.range),
            _ => Range::default(),
        };
        Ok(Program { body, range })
    }

    //--------------------------------------------------------------------------
    // Token helpers
    //--------------------------------------------------------------------------

    fn is_at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.position).map(|t| &t.kind)
    }

    fn peek_at(&self, distance: usize) -> Option<&TokenKind> {
        self.tokens.get(self.position + distance).map(|t| &t.kind)
    }

    fn current_range(&self) -> Range {
        self.tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .map(|t| t.range)
            .unwrap_or_default()
    }

    fn previous_range(&self) -> Range {
        self.position
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.range)
            .unwrap_or_default()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn check(&self, expected: &TokenKind) -> bool {
        self.peek() == Some(expected)
    }

    fn match_token(&mut self, expected: &TokenKind) -> bool {
        if self.check(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn check_keyword(&self, kw: Keyword) -> bool {
        matches!(self.peek(), Some(TokenKind::Keyword(k)) if *k == kw)
    }

    fn match_keyword(&mut self, kw: Keyword) -> bool {
        if self.check_keyword(kw) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn check_operator(&self, op: &str) -> bool {
        matches!(self.peek(), Some(TokenKind::Operator(s)) if s == op)
    }

    fn match_operator(&mut self, op: &str) -> bool {
        if self.check_operator(op) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &TokenKind, what: &str) -> Result<Range, SyntaxError> {
        if self.check(expected) {
            let range = self.current_range();
            self.position += 1;
            Ok(range)
        } else {
            Err(self.error(format!("Expected {}", what)))
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        let found = match self.peek() {
            Some(kind) => describe(kind),
            None => "end of input".to_string(),
        };
        SyntaxError::new(
            format!("{}, found {}", message.into(), found),
            self.current_range(),
        )
    }

    /// Run `parse` one nesting level deeper, failing past [`MAX_NESTING`]
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, SyntaxError>,
    ) -> Result<T, SyntaxError> {
        if self.depth >= MAX_NESTING {
            return Err(SyntaxError::new(
                format!("Nesting exceeds {} levels", MAX_NESTING),
                self.current_range(),
            ));
        }
        self.depth += 1;
        let result = parse(&mut *self);
        self.depth -= 1;
        result
    }

    fn skip_semicolons(&mut self) {
        while self.match_token(&TokenKind::Semicolon) {}
    }

    fn identifier(&mut self, what: &str) -> Result<Ident, SyntaxError> {
        match self.peek() {
            Some(TokenKind::Identifier(name)) => {
                let name = name.clone();
                let range = self.current_range();
                self.position += 1;
                Ok(Ident { name, range })
            }
            _ => Err(self.error(format!("Expected {}", what))),
        }
    }

    /// Property names may be keywords (`obj.catch`, `console.text.var`)
    fn property_name(&mut self) -> Result<Ident, SyntaxError> {
        let range = self.current_range();
        let name = match self.peek() {
            Some(TokenKind::Identifier(name)) => name.clone(),
            Some(TokenKind::Keyword(kw)) => kw.as_str().to_string(),
            _ => return Err(self.error("Expected property name")),
        };
        self.position += 1;
        Ok(Ident { name, range })
    }

    fn make_expr(&mut self, kind: ExprKind, range: Range) -> Expr {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        Expr { id, kind, range }
    }

    //--------------------------------------------------------------------------
    // Statements
    //--------------------------------------------------------------------------

    fn statement(&mut self) -> Result<Stmt, SyntaxError> {
        self.nested(Self::statement_at_depth)
    }

    fn statement_at_depth(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.current_range();
        let kind = match self.peek() {
            Some(TokenKind::Keyword(kw)) => match kw {
                Keyword::Let | Keyword::Var | Keyword::Const => {
                    let kind = self.declaration()?;
                    self.skip_semicolons();
                    kind
                }
                Keyword::Function => {
                    self.advance();
                    StmtKind::Function(self.function_decl(false)?)
                }
                Keyword::Async if matches!(self.peek_at(1), Some(TokenKind::Keyword(Keyword::Function))) => {
                    self.advance();
                    self.advance();
                    StmtKind::Function(self.function_decl(true)?)
                }
                Keyword::If => self.if_statement()?,
                Keyword::For => self.for_statement()?,
                Keyword::While => {
                    self.advance();
                    let test = self.paren_expression()?;
                    let body = self.body()?;
                    StmtKind::While { test, body }
                }
                Keyword::Do => {
                    self.advance();
                    let body = self.body()?;
                    if !self.match_keyword(Keyword::While) {
                        return Err(self.error("Expected 'while' after do block"));
                    }
                    let test = self.paren_expression()?;
                    self.skip_semicolons();
                    StmtKind::DoWhile { body, test }
                }
                Keyword::Try => self.try_statement()?,
                Keyword::Return => {
                    self.advance();
                    let value = if self.ends_statement() {
                        None
                    } else {
                        Some(self.expression()?)
                    };
                    self.skip_semicolons();
                    StmtKind::Return(value)
                }
                Keyword::Throw => {
                    self.advance();
                    let value = self.expression()?;
                    self.skip_semicolons();
                    StmtKind::Throw(value)
                }
                Keyword::Break => {
                    self.advance();
                    self.skip_semicolons();
                    StmtKind::Break
                }
                Keyword::Continue => {
                    self.advance();
                    self.skip_semicolons();
                    StmtKind::Continue
                }
                Keyword::Disable => {
                    self.advance();
                    let names = self.module_names()?;
                    self.skip_semicolons();
                    StmtKind::Disable(names)
                }
                Keyword::Able => {
                    self.advance();
                    let names = self.module_names()?;
                    self.skip_semicolons();
                    StmtKind::Enable(names)
                }
                _ => self.expression_statement()?,
            },
            Some(TokenKind::OpenBrace) => StmtKind::Block(self.block()?),
            _ => self.expression_statement()?,
        };
        Ok(Stmt {
            kind,
            range: start.cover(self.previous_range()),
        })
    }

    fn ends_statement(&self) -> bool {
        matches!(
            self.peek(),
            None | Some(TokenKind::Semicolon) | Some(TokenKind::CloseBrace)
        )
    }

    fn declaration(&mut self) -> Result<StmtKind, SyntaxError> {
        let store = match self.advance().map(|t| t.kind) {
            Some(TokenKind::Keyword(Keyword::Let)) => Store::L,
            Some(TokenKind::Keyword(Keyword::Var)) => Store::V,
            _ => Store::C,
        };
        let name = self.identifier("variable name")?;
        let annotation = if self.match_token(&TokenKind::Colon) {
            Some(self.type_expr()?)
        } else {
            None
        };
        let init = if self.match_operator("=") {
            Some(self.expression()?)
        } else {
            None
        };
        Ok(StmtKind::Declaration {
            store,
            name,
            annotation,
            init,
        })
    }

    fn type_expr(&mut self) -> Result<TypeExpr, SyntaxError> {
        let mut members = vec![self.type_primary()?];
        while self.match_operator("|") {
            members.push(self.type_primary()?);
        }
        Ok(if members.len() == 1 {
            members.remove(0)
        } else {
            TypeExpr::Union(members)
        })
    }

    fn type_primary(&mut self) -> Result<TypeExpr, SyntaxError> {
        let mut ty = match self.peek() {
            Some(TokenKind::Identifier(name)) => {
                let ty = TypeExpr::Named(name.clone());
                self.position += 1;
                ty
            }
            Some(TokenKind::Keyword(Keyword::Null)) => {
                self.position += 1;
                TypeExpr::Named("null".to_string())
            }
            Some(TokenKind::OpenParen) => {
                self.position += 1;
                let inner = self.type_expr()?;
                self.expect(&TokenKind::CloseParen, "')'")?;
                inner
            }
            _ => return Err(self.error("Expected type name")),
        };
        while self.check(&TokenKind::OpenBracket)
            && self.peek_at(1) == Some(&TokenKind::CloseBracket)
        {
            self.position += 2;
            ty = TypeExpr::Array(Box::new(ty));
        }
        Ok(ty)
    }

    fn function_decl(&mut self, is_async: bool) -> Result<FunctionDecl, SyntaxError> {
        let name = self.identifier("function name")?;
        let params = self.params()?;
        let body = self.block()?;
        Ok(FunctionDecl {
            name,
            params,
            body,
            is_async,
        })
    }

    fn params(&mut self) -> Result<Vec<Param>, SyntaxError> {
        self.expect(&TokenKind::OpenParen, "'('")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::CloseParen) {
            loop {
                let name = self.identifier("parameter name")?;
                let annotation = if self.match_token(&TokenKind::Colon) {
                    Some(self.type_expr()?)
                } else {
                    None
                };
                params.push(Param { name, annotation });
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::CloseParen, "')'")?;
        Ok(params)
    }

    fn block(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        self.expect(&TokenKind::OpenBrace, "'{'")?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::CloseBrace) {
            if self.is_at_end() {
                return Err(self.error("Expected '}'"));
            }
            body.push(self.statement()?);
        }
        self.advance();
        Ok(body)
    }

    /// A braced block or a single statement
    fn body(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        if self.check(&TokenKind::OpenBrace) {
            self.block()
        } else {
            Ok(vec![self.statement()?])
        }
    }

    fn paren_expression(&mut self) -> Result<Expr, SyntaxError> {
        self.expect(&TokenKind::OpenParen, "'('")?;
        let expr = self.expression()?;
        self.expect(&TokenKind::CloseParen, "')'")?;
        Ok(expr)
    }

    fn if_statement(&mut self) -> Result<StmtKind, SyntaxError> {
        self.advance();
        let mut branches = vec![(self.paren_expression()?, self.body()?)];
        let mut else_body = None;
        loop {
            if self.match_keyword(Keyword::Elif) {
                branches.push((self.paren_expression()?, self.body()?));
            } else if self.check_keyword(Keyword::Else) {
                self.advance();
                if self.match_keyword(Keyword::If) {
                    branches.push((self.paren_expression()?, self.body()?));
                } else {
                    else_body = Some(self.body()?);
                    break;
                }
            } else {
                break;
            }
        }
        Ok(StmtKind::If {
            branches,
            else_body,
        })
    }

    fn for_statement(&mut self) -> Result<StmtKind, SyntaxError> {
        self.advance();
        self.expect(&TokenKind::OpenParen, "'(' after for")?;

        let is_for_each = matches!(
            self.peek(),
            Some(TokenKind::Keyword(Keyword::Let | Keyword::Var | Keyword::Const))
        ) && matches!(self.peek_at(1), Some(TokenKind::Identifier(_)))
            && matches!(self.peek_at(2), Some(TokenKind::Keyword(Keyword::Of)));

        if is_for_each {
            let store = match self.advance().map(|t| t.kind) {
                Some(TokenKind::Keyword(Keyword::Let)) => Store::L,
                Some(TokenKind::Keyword(Keyword::Var)) => Store::V,
                _ => Store::C,
            };
            let binding = self.identifier("loop variable")?;
            self.advance();
            let iterable = self.expression()?;
            self.expect(&TokenKind::CloseParen, "')'")?;
            let body = self.body()?;
            return Ok(StmtKind::ForEach {
                store,
                binding,
                iterable,
                body,
            });
        }

        let init = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            let start = self.current_range();
            let kind = match self.peek() {
                Some(TokenKind::Keyword(Keyword::Let | Keyword::Var | Keyword::Const)) => {
                    self.declaration()?
                }
                _ => self.simple_statement()?,
            };
            Some(Box::new(Stmt {
                kind,
                range: start.cover(self.previous_range()),
            }))
        };
        self.expect(&TokenKind::Semicolon, "';' in for header")?;
        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(&TokenKind::Semicolon, "';' in for header")?;
        let update = if self.check(&TokenKind::CloseParen) {
            None
        } else {
            let start = self.current_range();
            let kind = self.simple_statement()?;
            Some(Box::new(Stmt {
                kind,
                range: start.cover(self.previous_range()),
            }))
        };
        self.expect(&TokenKind::CloseParen, "')'")?;
        let body = self.body()?;
        Ok(StmtKind::For {
            init,
            test,
            update,
            body,
        })
    }

    fn try_statement(&mut self) -> Result<StmtKind, SyntaxError> {
        self.advance();
        let body = self.block()?;
        let catch = if self.match_keyword(Keyword::Catch) {
            let param = if self.match_token(&TokenKind::OpenParen) {
                let ident = self.identifier("catch parameter")?;
                self.expect(&TokenKind::CloseParen, "')'")?;
                Some(ident)
            } else {
                None
            };
            Some(CatchClause {
                param,
                body: self.block()?,
            })
        } else {
            None
        };
        let finally = if self.match_keyword(Keyword::Finally) {
            Some(self.block()?)
        } else {
            None
        };
        Ok(StmtKind::Try {
            body,
            catch,
            finally,
        })
    }

    fn module_names(&mut self) -> Result<Vec<ModuleName>, SyntaxError> {
        let mut names = Vec::new();
        loop {
            match self.peek() {
                Some(TokenKind::Str(name)) => {
                    let name = name.clone();
                    let range = self.current_range();
                    self.position += 1;
                    names.push(ModuleName { name, range });
                }
                _ => return Err(self.error("Expected quoted module name")),
            }
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        Ok(names)
    }

    fn expression_statement(&mut self) -> Result<StmtKind, SyntaxError> {
        let kind = self.simple_statement()?;
        self.skip_semicolons();
        Ok(kind)
    }

    /// Expression, assignment or `x++` / `x--`, without the trailing `;`
    fn simple_statement(&mut self) -> Result<StmtKind, SyntaxError> {
        let expr = self.expression()?;
        if self.check_operator("++") || self.check_operator("--") {
            let op = if self.check_operator("++") {
                AssignOp::Add
            } else {
                AssignOp::Sub
            };
            let op_range = self.current_range();
            self.advance();
            ensure_assignable(&expr)?;
            let one = self.make_expr(ExprKind::Number(1.0), op_range);
            return Ok(StmtKind::Assignment {
                target: expr,
                op,
                value: one,
            });
        }
        Ok(match expr.kind {
            ExprKind::Assign { target, op, value } => StmtKind::Assignment {
                target: *target,
                op,
                value: *value,
            },
            _ => StmtKind::Expression(expr),
        })
    }

    //--------------------------------------------------------------------------
    // Expressions
    //--------------------------------------------------------------------------

    pub fn expression(&mut self) -> Result<Expr, SyntaxError> {
        self.nested(Self::assignment)
    }

    fn assignment(&mut self) -> Result<Expr, SyntaxError> {
        if let Some(arrow) = self.try_arrow_function()? {
            return Ok(arrow);
        }
        let target = self.logical_or()?;
        let op = match self.peek() {
            Some(TokenKind::Operator(op)) => match op.as_str() {
                "=" => Some(AssignOp::Assign),
                "+=" => Some(AssignOp::Add),
                "-=" => Some(AssignOp::Sub),
                "*=" => Some(AssignOp::Mul),
                "/=" => Some(AssignOp::Div),
                _ => None,
            },
            _ => None,
        };
        let Some(op) = op else {
            return Ok(target);
        };
        ensure_assignable(&target)?;
        self.advance();
        let value = self.expression()?;
        let range = target.range.cover(value.range);
        Ok(self.make_expr(
            ExprKind::Assign {
                target: Box::new(target),
                op,
                value: Box::new(value),
            },
            range,
        ))
    }

    /// `x => ...`, `(a, b) => ...`, `async (a) => ...`
    fn try_arrow_function(&mut self) -> Result<Option<Expr>, SyntaxError> {
        let start_pos = self.position;
        let start = self.current_range();
        let is_async = self.check_keyword(Keyword::Async)
            && matches!(
                self.peek_at(1),
                Some(TokenKind::OpenParen) | Some(TokenKind::Identifier(_))
            );
        let offset = usize::from(is_async);

        let params_end = match self.peek_at(offset) {
            Some(TokenKind::Identifier(_))
                if self.peek_at(offset + 1) == Some(&TokenKind::Operator("=>".to_string())) =>
            {
                Some(offset + 1)
            }
            Some(TokenKind::OpenParen) => {
                let mut depth = 0usize;
                let mut i = offset;
                loop {
                    match self.peek_at(i) {
                        Some(TokenKind::OpenParen) => depth += 1,
                        Some(TokenKind::CloseParen) => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        None => break,
                        _ => {}
                    }
                    i += 1;
                }
                if self.peek_at(i + 1) == Some(&TokenKind::Operator("=>".to_string())) {
                    Some(i + 1)
                } else {
                    None
                }
            }
            _ => None,
        };
        if params_end.is_none() {
            return Ok(None);
        }

        if is_async {
            self.advance();
        }
        let params = if self.check(&TokenKind::OpenParen) {
            self.params()?
        } else {
            vec![Param {
                name: self.identifier("parameter name")?,
                annotation: None,
            }]
        };
        if !self.match_operator("=>") {
            self.position = start_pos;
            return Ok(None);
        }
        let body = if self.check(&TokenKind::OpenBrace) {
            FunctionBody::Block(self.block()?)
        } else {
            FunctionBody::Expr(Box::new(self.expression()?))
        };
        let range = start.cover(self.previous_range());
        Ok(Some(self.make_expr(
            ExprKind::Function {
                params,
                body,
                is_arrow: true,
                is_async,
            },
            range,
        )))
    }

    fn logical_or(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.logical_and()?;
        loop {
            let op = if self.match_operator("||") {
                LogicalOp::Or
            } else if self.match_operator("??") {
                LogicalOp::Coalesce
            } else {
                break;
            };
            let right = self.logical_and()?;
            left = self.logical(op, left, right);
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.equality()?;
        while self.match_operator("&&") {
            let right = self.equality()?;
            left = self.logical(LogicalOp::And, left, right);
        }
        Ok(left)
    }

    fn logical(&mut self, op: LogicalOp, left: Expr, right: Expr) -> Expr {
        let range = left.range.cover(right.range);
        self.make_expr(
            ExprKind::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            range,
        )
    }

    fn binary(&mut self, op: BinaryOp, left: Expr, right: Expr) -> Expr {
        let range = left.range.cover(right.range);
        self.make_expr(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            range,
        )
    }

    fn binary_level(
        &mut self,
        ops: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, SyntaxError>,
    ) -> Result<Expr, SyntaxError> {
        let mut left = next(self)?;
        'outer: loop {
            for (text, op) in ops {
                if self.match_operator(text) {
                    let right = next(self)?;
                    left = self.binary(*op, left, right);
                    continue 'outer;
                }
            }
            break;
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(
            &[
                ("===", BinaryOp::StrictEq),
                ("!==", BinaryOp::StrictNotEq),
                ("==", BinaryOp::Eq),
                ("!=", BinaryOp::NotEq),
            ],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(
            &[
                ("<=", BinaryOp::LtEq),
                (">=", BinaryOp::GtEq),
                ("<", BinaryOp::Lt),
                (">", BinaryOp::Gt),
            ],
            Self::additive,
        )
    }

    fn additive(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            Self::multiplicative,
        )
    }

    fn multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(
            &[
                ("*", BinaryOp::Mul),
                ("/", BinaryOp::Div),
                ("%", BinaryOp::Rem),
            ],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.current_range();
        let op = if self.match_operator("!") {
            Some(UnaryOp::Not)
        } else if self.match_operator("-") {
            Some(UnaryOp::Neg)
        } else if self.match_operator("+") {
            Some(UnaryOp::Plus)
        } else {
            None
        };
        if let Some(op) = op {
            let operand = self.nested(Self::unary)?;
            let range = start.cover(operand.range);
            return Ok(self.make_expr(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                range,
            ));
        }
        if self.match_keyword(Keyword::Await) {
            let operand = self.nested(Self::unary)?;
            let range = start.cover(operand.range);
            return Ok(self.make_expr(ExprKind::Await(Box::new(operand)), range));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.primary()?;
        loop {
            if self.match_token(&TokenKind::Dot) {
                let property = self.property_name()?;
                let range = expr.range.cover(property.range);
                expr = self.make_expr(
                    ExprKind::Member {
                        object: Box::new(expr),
                        property,
                    },
                    range,
                );
            } else if self.match_token(&TokenKind::OpenBracket) {
                let index = self.expression()?;
                let close = self.expect(&TokenKind::CloseBracket, "']'")?;
                let range = expr.range.cover(close);
                expr = self.make_expr(
                    ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    range,
                );
            } else if self.match_token(&TokenKind::OpenParen) {
                let mut args = Vec::new();
                if !self.check(&TokenKind::CloseParen) {
                    loop {
                        args.push(self.expression()?);
                        if !self.match_token(&TokenKind::Comma) {
                            break;
                        }
                        if self.check(&TokenKind::CloseParen) {
                            break;
                        }
                    }
                }
                let close = self.expect(&TokenKind::CloseParen, "')'")?;
                let range = expr.range.cover(close);
                expr = self.make_expr(
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    range,
                );
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        let range = self.current_range();
        let token = match self.peek() {
            Some(kind) => kind.clone(),
            None => return Err(self.error("Expected expression")),
        };
        match token {
            TokenKind::Number(n) => {
                self.advance();
                Ok(self.make_expr(ExprKind::Number(n), range))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(self.make_expr(ExprKind::Str(s), range))
            }
            TokenKind::Template(chunks) => {
                self.advance();
                self.template(chunks, range)
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(self.make_expr(ExprKind::Boolean(true), range))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(self.make_expr(ExprKind::Boolean(false), range))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(self.make_expr(ExprKind::Null, range))
            }
            TokenKind::Keyword(Keyword::Function) => {
                self.advance();
                self.function_literal(false, range)
            }
            TokenKind::Keyword(Keyword::Async)
                if matches!(self.peek_at(1), Some(TokenKind::Keyword(Keyword::Function))) =>
            {
                self.advance();
                self.advance();
                self.function_literal(true, range)
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if let Some(store) = Store::from_prefix(&name) {
                    if self.check(&TokenKind::Dot)
                        && matches!(self.peek_at(1), Some(TokenKind::Identifier(_)))
                    {
                        self.advance();
                        let ident = self.identifier("variable name")?;
                        let full = range.cover(ident.range);
                        return Ok(self.make_expr(
                            ExprKind::Namespaced { store, name: ident },
                            full,
                        ));
                    }
                }
                Ok(self.make_expr(ExprKind::Identifier(name), range))
            }
            TokenKind::OpenParen => {
                self.advance();
                let mut expr = self.expression()?;
                let close = self.expect(&TokenKind::CloseParen, "')'")?;
                expr.range = range.cover(close);
                Ok(expr)
            }
            TokenKind::OpenBracket => {
                self.advance();
                let mut items = Vec::new();
                while !self.check(&TokenKind::CloseBracket) {
                    items.push(self.expression()?);
                    if !self.match_token(&TokenKind::Comma) {
                        break;
                    }
                }
                let close = self.expect(&TokenKind::CloseBracket, "']'")?;
                Ok(self.make_expr(ExprKind::Array(items), range.cover(close)))
            }
            TokenKind::OpenBrace => {
                self.advance();
                let mut props = Vec::new();
                while !self.check(&TokenKind::CloseBrace) {
                    let key = match self.peek() {
                        Some(TokenKind::Str(s)) => {
                            let key = Ident {
                                name: s.clone(),
                                range: self.current_range(),
                            };
                            self.advance();
                            key
                        }
                        _ => self.property_name()?,
                    };
                    let value = if self.match_token(&TokenKind::Colon) {
                        self.expression()?
                    } else {
                        self.make_expr(ExprKind::Identifier(key.name.clone()), key.range)
                    };
                    props.push(Property { key, value });
                    if !self.match_token(&TokenKind::Comma) {
                        break;
                    }
                }
                let close = self.expect(&TokenKind::CloseBrace, "'}'")?;
                Ok(self.make_expr(ExprKind::Object(props), range.cover(close)))
            }
            _ => Err(self.error("Expected expression")),
        }
    }

    fn function_literal(&mut self, is_async: bool, start: Range) -> Result<Expr, SyntaxError> {
        // An optional name on a function expression is accepted and ignored.
        if matches!(self.peek(), Some(TokenKind::Identifier(_))) {
            self.advance();
        }
        let params = self.params()?;
        let body = self.block()?;
        let range = start.cover(self.previous_range());
        Ok(self.make_expr(
            ExprKind::Function {
                params,
                body: FunctionBody::Block(body),
                is_arrow: false,
                is_async,
            },
            range,
        ))
    }

    fn template(&mut self, chunks: Vec<TemplateChunk>, range: Range) -> Result<Expr, SyntaxError> {
        let mut parts = Vec::new();
        for chunk in chunks {
            match chunk {
                TemplateChunk::Text(text) => parts.push(TemplatePart::Text(text)),
                TemplateChunk::Expr { source, start } => {
                    let tokens = Tokenizer::starting_at(&source, start).tokenize()?;
                    if tokens.is_empty() {
                        return Err(SyntaxError::new("Empty template interpolation", range));
                    }
                    let mut inner = Parser::with_first_id(tokens, self.next_id);
                    inner.depth = self.depth;
                    let expr = inner.expression()?;
                    if !inner.is_at_end() {
                        return Err(inner.error("Unexpected token in template interpolation"));
                    }
                    self.next_id = inner.next_id;
                    parts.push(TemplatePart::Expr(expr));
                }
            }
        }
        Ok(self.make_expr(ExprKind::Template(parts), range))
    }
}

fn ensure_assignable(target: &Expr) -> Result<(), SyntaxError> {
    match target.kind {
        ExprKind::Identifier(_)
        | ExprKind::Namespaced { .. }
        | ExprKind::Member { .. }
        | ExprKind::Index { .. } => Ok(()),
        _ => Err(SyntaxError::new("Invalid assignment target", target.range)),
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Number(n) => format!("number {}", n),
        TokenKind::Str(s) => format!("string '{}'", s),
        TokenKind::Template(_) => "template string".to_string(),
        TokenKind::Identifier(name) => format!("identifier '{}'", name),
        TokenKind::Keyword(kw) => format!("keyword '{}'", kw.as_str()),
        TokenKind::Operator(op) => format!("'{}'", op),
        TokenKind::OpenParen => "'('".to_string(),
        TokenKind::CloseParen => "')'".to_string(),
        TokenKind::OpenBracket => "'['".to_string(),
        TokenKind::CloseBracket => "']'".to_string(),
        TokenKind::OpenBrace => "'{'".to_string(),
        TokenKind::CloseBrace => "'}'".to_string(),
        TokenKind::Comma => "','".to_string(),
        TokenKind::Colon => "':'".to_string(),
        TokenKind::Semicolon => "';'".to_string(),
        TokenKind::Dot => "'.'".to_string(),
    }
}

/// Convenience function to parse tokens
pub fn parse(tokens: Vec<Token>) -> Result<Program, SyntaxError> {
    Parser::new(tokens).parse()
}

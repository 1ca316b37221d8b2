use std::borrow::Cow;

use crate::ast::{
    Assign, AssignOp, BinaryOp, Decl, Expr, ExprKind, FnDecl, Ident, PostfixOp, Root, Stmt,
    StmtKind, StructDecl, UnaryOp, Var,
};
use crate::error::{Error, IntoPositioned, ParseError, SemanticErrorKind};
use crate::lexer::{Cursor, Lexer, Token, TokenKind};
use crate::scope::{Scope, ScopeStack, Symbol, SymbolKind};
use crate::source::SourceFile;
use crate::types::{TypeInfo, TypeKind, TypeRegistry};

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("unexpected token {actual}, expected {expected}")]
    UnexpectedToken {
        expected: Cow<'static, str>,
        actual: String,
    },
    #[error("for statements are not implemented")]
    ForNotImplemented,
}

fn unexpected(token: &Token, expected: impl Into<Cow<'static, str>>) -> ParseError {
    ErrorKind::UnexpectedToken {
        expected: expected.into(),
        actual: token.kind.to_string(),
    }
    .at(token.pos)
}

/// Binding power of a binary (or postfix-capable) operator token; higher
/// binds tighter. The right-hand power is one less than the left-hand
/// power, making every level left-associative.
fn precedence(kind: &TokenKind, is_lhs: bool) -> u8 {
    match kind {
        TokenKind::PlusPlus
        | TokenKind::MinusMinus
        | TokenKind::Sym(b'(')
        | TokenKind::Sym(b'[') => {
            if is_lhs {
                35
            } else {
                34
            }
        }
        TokenKind::Sym(b'*') | TokenKind::Sym(b'/') | TokenKind::Sym(b'%') => {
            if is_lhs {
                33
            } else {
                32
            }
        }
        TokenKind::Sym(b'+') | TokenKind::Sym(b'-') => {
            if is_lhs {
                31
            } else {
                30
            }
        }
        TokenKind::Shl | TokenKind::Shr => {
            if is_lhs {
                29
            } else {
                28
            }
        }
        TokenKind::Sym(b'<') | TokenKind::Sym(b'>') | TokenKind::Ge | TokenKind::Le => {
            if is_lhs {
                27
            } else {
                26
            }
        }
        TokenKind::EqEq | TokenKind::NotEq => {
            if is_lhs {
                25
            } else {
                24
            }
        }
        TokenKind::Sym(b'&') => {
            if is_lhs {
                23
            } else {
                22
            }
        }
        TokenKind::Sym(b'^') => {
            if is_lhs {
                21
            } else {
                20
            }
        }
        TokenKind::Sym(b'|') => {
            if is_lhs {
                19
            } else {
                18
            }
        }
        TokenKind::AndAnd => {
            if is_lhs {
                17
            } else {
                16
            }
        }
        TokenKind::OrOr => {
            if is_lhs {
                15
            } else {
                14
            }
        }
        _ => 0,
    }
}

/// The token of the identifier an lhs expression ultimately assigns to,
/// used as the assignment's source token.
fn find_identifier(expr: &Expr) -> Option<&Token> {
    match &expr.kind {
        ExprKind::Ident(ident) => Some(&ident.token),
        ExprKind::Unary(_, inner) => find_identifier(inner),
        ExprKind::Index(operand, _) => find_identifier(operand),
        ExprKind::Selector(operand, _) => find_identifier(operand),
        _ => None,
    }
}

/// Drive the whole front end over a source file: lex, then parse. Returns
/// the AST root together with the populated type registry and the (empty
/// after parsing) scope stack for the downstream passes.
pub fn parse_file(source: &mut SourceFile) -> Result<(Root, TypeRegistry, ScopeStack), Error> {
    let tokens = Lexer::new(source).lex()?;
    let mut types = TypeRegistry::default();
    let mut scopes = ScopeStack::default();
    let root = Parser::new(tokens, &mut types, &mut scopes).parse()?;

    Ok((root, types, scopes))
}

/// Recursive-descent parser over the token cursor. Populates the type
/// registry with struct declarations and the scope stack with function and
/// parameter symbols as a side effect.
pub struct Parser<'a> {
    cursor: Cursor,
    types: &'a mut TypeRegistry,
    scopes: &'a mut ScopeStack,
}

impl<'a> Parser<'a> {
    pub fn new(
        tokens: Vec<Token>,
        types: &'a mut TypeRegistry,
        scopes: &'a mut ScopeStack,
    ) -> Self {
        Self {
            cursor: Cursor::new(tokens),
            types,
            scopes,
        }
    }

    pub fn parse(mut self) -> Result<Root, Error> {
        let first_line = self.cursor.current().pos.line;
        self.scopes.push(Scope::new(first_line));

        let mut decls = vec![];

        loop {
            match self.cursor.current().kind {
                TokenKind::Struct => decls.push(Decl::Struct(self.struct_decl()?)),
                TokenKind::Fn => decls.push(Decl::Fn(self.fn_decl()?)),
                TokenKind::Eof => break,
                _ => {
                    let token = self.cursor.current().clone();
                    return Err(unexpected(&token, "a top level statement").into());
                }
            }
        }

        self.scopes.pop();

        if !self.scopes.is_empty() {
            let pos = self.cursor.prev().map(|t| t.pos).unwrap_or_default();
            return Err(SemanticErrorKind::UnbalancedScopes.at(pos).into());
        }

        Ok(Root { decls })
    }

    fn ident(&mut self, expected: &'static str) -> Result<Ident, ParseError> {
        let token = self.cursor.advance();

        match token.kind.clone() {
            TokenKind::Ident(name) => Ok(Ident { name, token }),
            _ => Err(unexpected(&token, expected)),
        }
    }

    fn struct_decl(&mut self) -> Result<StructDecl, ParseError> {
        self.cursor.expect(TokenKind::Struct, "'struct'")?;
        let name = self.ident("struct name")?;
        self.cursor.expect(TokenKind::Sym(b'{'), "'{'")?;

        let mut members = vec![];

        loop {
            let mut token = self.cursor.advance();

            if token.kind == TokenKind::Sym(b'}') {
                break;
            }

            if token.kind == TokenKind::Sym(b';') {
                token = self.cursor.advance();

                if token.kind == TokenKind::Sym(b'}') {
                    break;
                }
            }

            let name = match token.kind.clone() {
                TokenKind::Ident(name) => Ident { name, token },
                _ => return Err(unexpected(&token, "struct member or closing '}'")),
            };

            members.push(self.var(name)?);
        }

        if members.is_empty() {
            let token = self
                .cursor
                .prev()
                .cloned()
                .unwrap_or_else(|| self.cursor.current().clone());
            return Err(unexpected(&token, "struct members"));
        }

        let decl = StructDecl { name, members };

        // registered immediately so following declarations can refer to it
        self.types.add_struct(&decl);
        tracing::debug!(name = %decl.name.name, members = decl.members.len(), "parsed struct");

        Ok(decl)
    }

    /// `name : Type` or `name : =` with the type left for inference.
    fn var(&mut self, name: Ident) -> Result<Var, ParseError> {
        self.cursor.expect(TokenKind::Sym(b':'), "':' after name")?;

        let ty = match self.cursor.current().kind {
            TokenKind::Sym(b'=') => {
                let token = self.cursor.advance();
                TypeInfo::detect(token)
            }
            TokenKind::Ident(_) | TokenKind::Sym(b'*') => self.parse_type(),
            _ => {
                return Err(unexpected(
                    self.cursor.current(),
                    "a type after ':', or '=' in a declaration",
                ))
            }
        };

        Ok(Var {
            ty,
            name,
            is_const: false,
        })
    }

    fn func_arg(&mut self) -> Result<Var, ParseError> {
        let token = self.cursor.advance();

        match token.kind.clone() {
            TokenKind::Ellipsis => Ok(Var {
                ty: TypeInfo::detect(token.clone()),
                name: Ident {
                    name: "...".into(),
                    token,
                },
                is_const: true,
            }),
            TokenKind::Ident(name) => self.var(Ident { name, token }),
            _ => Err(unexpected(&token, "parameter name")),
        }
    }

    fn params(&mut self) -> Result<Vec<Var>, ParseError> {
        self.cursor.expect(TokenKind::Sym(b'('), "'('")?;

        let mut params = vec![];

        loop {
            if self.cursor.current().kind == TokenKind::Sym(b')') {
                break;
            }

            params.push(self.func_arg()?);

            if self.cursor.current().kind == TokenKind::Sym(b')') {
                break;
            }

            self.cursor
                .expect(TokenKind::Sym(b','), "',' between parameters")?;
        }

        self.cursor.advance();

        Ok(params)
    }

    fn fn_decl(&mut self) -> Result<FnDecl, ParseError> {
        self.cursor.expect(TokenKind::Fn, "'fn'")?;
        let name = self.ident("function name")?;
        let params = self.params()?;
        self.cursor.expect(TokenKind::Arrow, "'->'")?;

        let ret = match self.cursor.current().kind {
            TokenKind::Sym(b'{') | TokenKind::Sym(b';') => TypeInfo::void(),
            _ => self.parse_type(),
        };

        // visible before the body parses, enabling recursion and mutual
        // reference between file-level functions
        self.scopes.add_symbol(Symbol {
            kind: SymbolKind::Function,
            name: name.name.clone(),
            token: name.token.clone(),
            ty: ret.clone(),
        });

        let body = match self.cursor.current().kind {
            TokenKind::Sym(b'{') => {
                let open = self.cursor.advance();
                self.scopes.push(Scope::new(open.pos.line));

                for param in &params {
                    self.scopes.add_symbol(Symbol {
                        kind: SymbolKind::FuncArg,
                        name: param.name.name.clone(),
                        token: param.name.token.clone(),
                        ty: param.ty.clone(),
                    });
                }

                Some(self.statements()?)
            }
            TokenKind::Sym(b';') => {
                self.cursor.advance();
                None
            }
            _ => return Err(unexpected(self.cursor.current(), "'{' or ';'")),
        };

        tracing::debug!(name = %name.name, params = params.len(), "parsed function");

        Ok(FnDecl {
            name,
            params,
            ret,
            body,
        })
    }

    /// Statements up to and including the closing `}` of the current block.
    /// The caller has already pushed the block's scope; the `}` pops it.
    fn statements(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = vec![];

        loop {
            let token = self.cursor.current().clone();

            match &token.kind {
                TokenKind::Sym(b'{') => {
                    let open = self.cursor.advance();
                    self.scopes.push(Scope::new(open.pos.line));
                    stmts.push(StmtKind::Block(self.statements()?).at(open));
                }
                TokenKind::If => {
                    self.cursor.advance();
                    let cond = self.expression(Some(b'{'), false)?;
                    let line = self
                        .cursor
                        .prev()
                        .map(|t| t.pos.line)
                        .unwrap_or(token.pos.line);

                    self.scopes.push(Scope::new(line));
                    let body = self.statements()?;
                    stmts.push(StmtKind::If { cond, body }.at(token));
                }
                TokenKind::For => return Err(ErrorKind::ForNotImplemented.at(token.pos)),
                TokenKind::Ident(_) | TokenKind::Sym(b'*') => {
                    stmts.push(self.identifier_stmt()?);
                }
                TokenKind::Arrow => {
                    self.cursor.advance();
                    let expr = self.expression(Some(b';'), false)?;
                    self.scopes.mark_terminated();
                    stmts.push(StmtKind::Return(expr).at(token));
                }
                TokenKind::Break => {
                    self.cursor.advance();
                    self.cursor.expect(TokenKind::Sym(b';'), "';' after break")?;
                    self.scopes.mark_terminated();
                    stmts.push(StmtKind::Break.at(token));
                }
                TokenKind::Sym(b'}') => {
                    self.cursor.advance();
                    self.scopes.pop();
                    break;
                }
                _ => return Err(unexpected(&token, "a statement or '}'")),
            }
        }

        Ok(stmts)
    }

    /// A statement opening with an lhs expression: an assignment, a
    /// compound assignment, or a declaration (`:` / `::`).
    fn identifier_stmt(&mut self) -> Result<Stmt, ParseError> {
        let lhs = match self.expression(None, true)? {
            Some(expr) => expr,
            None => return Err(unexpected(self.cursor.current(), "identifier")),
        };

        let id_token = match find_identifier(&lhs) {
            Some(token) => token.clone(),
            None => return Err(unexpected(self.cursor.current(), "identifier")),
        };

        let token = self.cursor.current().clone();

        if let Some(op) = AssignOp::from_token(&token.kind) {
            self.cursor.advance();
            let rhs = self.expression(Some(b';'), false)?;

            return Ok(StmtKind::Assign(Assign {
                lhs,
                rhs,
                op,
                is_declaration: false,
                is_const: false,
                decl_type: TypeInfo::invalid(),
                token: id_token.clone(),
            })
            .at(id_token));
        }

        match token.kind {
            TokenKind::Sym(b':') | TokenKind::ColonColon => {
                let is_const = token.kind == TokenKind::ColonColon;
                self.cursor.advance();

                let decl_type = match self.cursor.current().kind {
                    TokenKind::Sym(b'=') => TypeInfo::detect(self.cursor.current().clone()),
                    _ => self.parse_type(),
                };

                self.cursor.expect(TokenKind::Sym(b'='), "'='")?;
                let rhs = self.expression(Some(b';'), false)?;

                Ok(StmtKind::Assign(Assign {
                    lhs,
                    rhs,
                    op: AssignOp::Assign,
                    is_declaration: true,
                    is_const,
                    decl_type,
                    token: id_token.clone(),
                })
                .at(id_token))
            }
            _ => Err(unexpected(&token, "a declaration or assignment")),
        }
    }

    /// `*Type` recursively or a registered type name. Unknown names come
    /// back invalid for the analyzer to report; anything else yields an
    /// invalid type without consuming the token.
    fn parse_type(&mut self) -> TypeInfo {
        let token = self.cursor.current().clone();

        match token.kind.clone() {
            TokenKind::Sym(b'*') => {
                self.cursor.advance();
                let inner = self.parse_type();
                TypeInfo::pointer(inner, token)
            }
            TokenKind::Ident(name) => {
                self.cursor.advance();
                let mut info = self.types.resolve(&name);
                info.token = Some(token);
                info
            }
            _ => TypeInfo {
                kind: TypeKind::Invalid,
                name: String::new(),
                token: Some(token),
            },
        }
    }

    /// An expression up to `stop_at` (consumed when given). An expression
    /// that begins at its stop token is the null expression.
    fn expression(
        &mut self,
        stop_at: Option<u8>,
        is_lhs: bool,
    ) -> Result<Option<Expr>, ParseError> {
        if let Some(stop) = stop_at {
            if self.cursor.current().kind == TokenKind::Sym(stop) {
                self.cursor.advance();
                return Ok(None);
            }
        }

        let expr = self.binary_expression(stop_at, 1, is_lhs)?;

        if let Some(stop) = stop_at {
            self.cursor
                .expect(TokenKind::Sym(stop), format!("'{}'", stop as char))?;
        }

        Ok(Some(expr))
    }

    /// Precedence climbing: fold binary operators while their left binding
    /// power stays at or above `min_bp`, recursing into the right operand
    /// with the operator's right binding power.
    fn binary_expression(
        &mut self,
        stop_at: Option<u8>,
        min_bp: u8,
        is_lhs: bool,
    ) -> Result<Expr, ParseError> {
        let mut result = self.unary_expression(stop_at, is_lhs)?;

        loop {
            let current = self.cursor.current().clone();

            if let Some(stop) = stop_at {
                if current.kind == TokenKind::Sym(stop) {
                    break;
                }
            }

            if precedence(&current.kind, true) < min_bp {
                break;
            }

            let r_bp = precedence(&current.kind, false);
            self.cursor.advance();

            if is_lhs {
                return Err(unexpected(
                    &current,
                    "the left-hand side of a statement, not a binary operation",
                ));
            }

            let op = match BinaryOp::from_token(&current.kind) {
                Some(op) => op,
                None => return Err(unexpected(&current, "a binary operator")),
            };

            let rhs = self.binary_expression(stop_at, r_bp, is_lhs)?;
            result = ExprKind::Binary(op, Box::new(result), Box::new(rhs)).at(current);
        }

        Ok(result)
    }

    fn unary_expression(&mut self, stop_at: Option<u8>, is_lhs: bool) -> Result<Expr, ParseError> {
        let token = self.cursor.current().clone();

        if token.kind == TokenKind::Sym(b'#') {
            self.cursor.advance();

            if is_lhs {
                return Err(unexpected(
                    &token,
                    "the left-hand side of a statement, not a cast",
                ));
            }

            let ty = self.parse_type();
            let expr = self.unary_expression(stop_at, false)?;
            return Ok(ExprKind::Cast(ty, Box::new(expr)).at(token));
        }

        if let Some(op) = UnaryOp::from_token(&token.kind) {
            // only a pointer deref is a valid assignment target
            let lhs_unary = op == UnaryOp::Star;
            self.cursor.advance();

            if is_lhs && !lhs_unary {
                return Err(unexpected(
                    &token,
                    "the left-hand side of a statement, not a unary expression",
                ));
            }

            let expr = self.unary_expression(stop_at, false)?;
            return Ok(ExprKind::Unary(op, Box::new(expr)).at(token));
        }

        let operand = match self.operand(is_lhs)? {
            Some(operand) => operand,
            None => return Err(unexpected(self.cursor.current(), "an operand")),
        };

        self.atom_expression(operand, stop_at, is_lhs)
    }

    fn operand(&mut self, is_lhs: bool) -> Result<Option<Expr>, ParseError> {
        let expr = match self.cursor.current().kind.clone() {
            TokenKind::Ident(name) => {
                let token = self.cursor.advance();
                ExprKind::Ident(Ident {
                    name,
                    token: token.clone(),
                })
                .at(token)
            }
            TokenKind::Number(value) => {
                let token = self.cursor.advance();

                if is_lhs {
                    return Err(unexpected(&token, "the left-hand side of a statement"));
                }

                ExprKind::Number(value).at(token)
            }
            TokenKind::ConstStr(value) => {
                let token = self.cursor.advance();

                if is_lhs {
                    return Err(unexpected(&token, "the left-hand side of a statement"));
                }

                ExprKind::Str(value).at(token)
            }
            TokenKind::Char(c) => {
                let token = self.cursor.advance();

                if is_lhs {
                    return Err(unexpected(&token, "the left-hand side of a statement"));
                }

                ExprKind::Char(c).at(token)
            }
            TokenKind::Sym(b'(') => {
                let token = self.cursor.advance();

                if is_lhs {
                    return Err(unexpected(&token, "the left-hand side of a statement"));
                }

                match self.expression(Some(b')'), false)? {
                    Some(expr) => expr,
                    None => return Ok(None),
                }
            }
            _ => return Ok(None),
        };

        Ok(Some(expr))
    }

    /// The postfix chain after an operand: calls, struct initialization,
    /// indexing, selectors and postfix increment/decrement.
    fn atom_expression(
        &mut self,
        mut operand: Expr,
        stop_at: Option<u8>,
        is_lhs: bool,
    ) -> Result<Expr, ParseError> {
        loop {
            let token = self.cursor.current().clone();

            if let Some(stop) = stop_at {
                if token.kind == TokenKind::Sym(stop) {
                    return Ok(operand);
                }
            }

            operand = match token.kind {
                TokenKind::Sym(b'(') => self.func_call(operand)?,
                TokenKind::Sym(b'{') => {
                    if is_lhs {
                        return Err(unexpected(
                            &token,
                            "the left-hand side of a statement, not struct initialization",
                        ));
                    }

                    self.cursor.advance();
                    self.struct_init(operand, token)?
                }
                TokenKind::Sym(b'[') => {
                    let open = self.cursor.advance();
                    let index = self.expression(Some(b']'), false)?;
                    ExprKind::Index(Box::new(operand), index.map(Box::new)).at(open)
                }
                TokenKind::Sym(b'.') => {
                    let dot = self.cursor.advance();
                    let ident = self.ident("identifier")?;
                    ExprKind::Selector(Box::new(operand), ident).at(dot)
                }
                TokenKind::PlusPlus => {
                    let token = self.cursor.advance();
                    ExprKind::Postfix(PostfixOp::Inc, Box::new(operand)).at(token)
                }
                TokenKind::MinusMinus => {
                    let token = self.cursor.advance();
                    ExprKind::Postfix(PostfixOp::Dec, Box::new(operand)).at(token)
                }
                _ => return Ok(operand),
            };
        }
    }

    /// Comma-separated arguments up to `)`; a trailing comma is an error.
    fn func_call(&mut self, operand: Expr) -> Result<Expr, ParseError> {
        let token = self.cursor.advance();
        let mut args = vec![];

        loop {
            if self.cursor.current().kind == TokenKind::Sym(b')') {
                self.cursor.advance();
                break;
            }

            if let Some(arg) = self.expression(None, false)? {
                args.push(arg);
            }

            let next = self.cursor.advance();

            match next.kind {
                TokenKind::Sym(b')') => break,
                TokenKind::Sym(b',') => {
                    if self.cursor.current().kind == TokenKind::Sym(b')') {
                        return Err(unexpected(self.cursor.current(), "an expression after ','"));
                    }
                }
                _ => return Err(unexpected(&next, "',' or ')' after argument")),
            }
        }

        Ok(ExprKind::Call(Box::new(operand), args).at(token))
    }

    /// `Name{ exprs }`; the opening brace was consumed by the postfix loop.
    fn struct_init(&mut self, operand: Expr, token: Token) -> Result<Expr, ParseError> {
        let name = match operand.kind {
            ExprKind::Ident(ident) => ident,
            _ => {
                return Err(unexpected(
                    &token,
                    "an identifier for struct initialization",
                ))
            }
        };

        let mut exprs = vec![];

        loop {
            if self.cursor.current().kind == TokenKind::Sym(b'}') {
                self.cursor.advance();
                break;
            }

            if let Some(expr) = self.expression(None, false)? {
                exprs.push(expr);
            }

            let next = self.cursor.advance();

            match next.kind {
                TokenKind::Sym(b'}') => break,
                TokenKind::Sym(b',') => {
                    if self.cursor.current().kind == TokenKind::Sym(b'}') {
                        return Err(unexpected(self.cursor.current(), "an expression after ','"));
                    }
                }
                _ => return Err(unexpected(&next, "',' or '}' after expression")),
            }
        }

        Ok(ExprKind::StructInit(name, exprs).at(token))
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn parse(text: &str) -> Result<Root, Error> {
        let mut source = SourceFile::new("test.qz", text);
        parse_file(&mut source).map(|(root, _, _)| root)
    }

    fn main_fn(text: &str) -> FnDecl {
        let root = parse(text).unwrap();

        match root.decls.into_iter().next() {
            Some(Decl::Fn(f)) => f,
            other => panic!("expected a function, got {other:?}"),
        }
    }

    fn body_of(stmts: &str) -> Vec<Stmt> {
        main_fn(&format!("fn main() -> {{ {stmts} }}"))
            .body
            .unwrap()
    }

    fn expr_of(text: &str) -> Expr {
        let body = body_of(&format!("-> {text};"));

        match body.into_iter().next() {
            Some(Stmt {
                kind: StmtKind::Return(Some(expr)),
                ..
            }) => expr,
            other => panic!("expected a return statement, got {other:?}"),
        }
    }

    fn number(expr: &Expr) -> &str {
        match &expr.kind {
            ExprKind::Number(n) => n,
            other => panic!("expected a number, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_file() {
        let root = parse("").unwrap();
        assert!(root.decls.is_empty());
    }

    #[test]
    fn test_minimal_function() {
        let f = main_fn("fn main() -> i32 { -> 0; }");

        assert_eq!(f.name.name, "main");
        assert!(f.params.is_empty());
        assert_eq!(f.ret.name, "i32");

        let body = f.body.unwrap();
        assert_eq!(body.len(), 1);
        assert!(matches!(&body[0].kind, StmtKind::Return(Some(_))));
    }

    #[test]
    fn test_void_return_type_is_implied() {
        assert_eq!(main_fn("fn main() -> { }").ret.name, "void");
        assert_eq!(main_fn("fn main() -> ;").ret.name, "void");
    }

    #[test]
    fn test_prototype_then_definition() {
        let root = parse("fn f(x: i32) -> i32; fn main() -> { }").unwrap();
        assert_eq!(root.decls.len(), 2);

        match &root.decls[0] {
            Decl::Fn(f) => {
                assert!(f.body.is_none());
                assert_eq!(f.params.len(), 1);
            }
            other => panic!("expected a prototype, got {other:?}"),
        }
    }

    #[test]
    fn test_variadic_parameter() {
        let f = main_fn("fn printf(fmt: *u8, ...) -> i32;");

        assert_eq!(f.params.len(), 2);
        assert_eq!(f.params[0].ty.name, "u8*");
        assert_eq!(f.params[1].name.name, "...");
        assert!(f.params[1].is_const);
        assert!(matches!(f.params[1].ty.kind, TypeKind::Detect));
    }

    #[test]
    fn test_pointer_types_nest() {
        let f = main_fn("fn f(p: **i32) -> ;");
        assert_eq!(f.params[0].ty.name, "i32**");

        match &f.params[0].ty.kind {
            TypeKind::Pointer(inner) => {
                assert!(matches!(inner.kind, TypeKind::Pointer(_)));
            }
            other => panic!("expected a pointer, got {other:?}"),
        }
    }

    #[test_case("1 + 2 * 3", BinaryOp::Add; "mul binds tighter than add")]
    #[test_case("1 == 2 & 3", BinaryOp::BitAnd; "eq binds tighter than bitand")]
    #[test_case("1 && 2 | 3", BinaryOp::And; "bitor binds tighter than and")]
    #[test_case("1 || 2 && 3", BinaryOp::Or; "and binds tighter than or")]
    fn test_precedence_root(text: &str, op: BinaryOp) {
        match expr_of(text).kind {
            ExprKind::Binary(actual, _, _) => assert_eq!(actual, op),
            other => panic!("expected a binary expression, got {other:?}"),
        }
    }

    #[test]
    fn test_precedence_shape() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let expr = expr_of("1 + 2 * 3");

        match expr.kind {
            ExprKind::Binary(BinaryOp::Add, lhs, rhs) => {
                assert_eq!(number(&lhs), "1");
                assert!(matches!(rhs.kind, ExprKind::Binary(BinaryOp::Mul, _, _)));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_left_associativity() {
        // 10 - 4 - 3 parses as (10 - 4) - 3
        let expr = expr_of("10 - 4 - 3");

        match expr.kind {
            ExprKind::Binary(BinaryOp::Sub, lhs, rhs) => {
                assert!(matches!(lhs.kind, ExprKind::Binary(BinaryOp::Sub, _, _)));
                assert_eq!(number(&rhs), "3");
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_parens_override_precedence() {
        let expr = expr_of("(1 + 2) * 3");

        match expr.kind {
            ExprKind::Binary(BinaryOp::Mul, lhs, _) => {
                assert!(matches!(lhs.kind, ExprKind::Binary(BinaryOp::Add, _, _)));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_unary_and_binary_mix() {
        // *x + 1 parses as (*x) + 1
        let expr = expr_of("*x + 1");

        match expr.kind {
            ExprKind::Binary(BinaryOp::Add, lhs, rhs) => {
                assert!(matches!(lhs.kind, ExprKind::Unary(UnaryOp::Star, _)));
                assert_eq!(number(&rhs), "1");
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_cast_expression() {
        let expr = expr_of("#i32 x");

        match expr.kind {
            ExprKind::Cast(ty, inner) => {
                assert_eq!(ty.name, "i32");
                assert!(matches!(inner.kind, ExprKind::Ident(_)));
            }
            other => panic!("expected a cast, got {other:?}"),
        }
    }

    #[test]
    fn test_postfix_chain() {
        // a.b[1](2)-- nests left to right
        let expr = expr_of("a.b[1](2)--");

        match expr.kind {
            ExprKind::Postfix(PostfixOp::Dec, call) => match call.kind {
                ExprKind::Call(index, args) => {
                    assert_eq!(args.len(), 1);
                    assert!(matches!(index.kind, ExprKind::Index(_, Some(_))));
                }
                other => panic!("expected a call, got {other:?}"),
            },
            other => panic!("expected a postfix, got {other:?}"),
        }
    }

    #[test]
    fn test_char_operand() {
        assert!(matches!(expr_of("'a'").kind, ExprKind::Char(b'a')));
    }

    #[test]
    fn test_call_arguments() {
        let expr = expr_of("f(1, x, \"s\")");

        match expr.kind {
            ExprKind::Call(_, args) => assert_eq!(args.len(), 3),
            other => panic!("expected a call, got {other:?}"),
        }
    }

    #[test]
    fn test_call_trailing_comma_is_rejected() {
        assert!(parse("fn main() -> { -> f(1,); }").is_err());
    }

    #[test_case("x = 1;", false, false; "plain assignment")]
    #[test_case("x : i32 = 1;", true, false; "typed declaration")]
    #[test_case("x :: i32 = 1;", true, true; "const declaration")]
    #[test_case("x : = 1;", true, false; "inferred declaration")]
    fn test_assignment_forms(text: &str, is_declaration: bool, is_const: bool) {
        let body = body_of(text);

        match &body[0].kind {
            StmtKind::Assign(assign) => {
                assert_eq!(assign.is_declaration, is_declaration);
                assert_eq!(assign.is_const, is_const);
                assert!(assign.rhs.is_some());
            }
            other => panic!("expected an assignment, got {other:?}"),
        }
    }

    #[test]
    fn test_inferred_declaration_type_is_detect() {
        let body = body_of("x := 1;");

        match &body[0].kind {
            StmtKind::Assign(assign) => {
                assert!(assign.is_declaration);
                assert!(matches!(assign.decl_type.kind, TypeKind::Detect));
            }
            other => panic!("expected an assignment, got {other:?}"),
        }
    }

    #[test]
    fn test_compound_assignment() {
        let body = body_of("x += 2;");

        match &body[0].kind {
            StmtKind::Assign(assign) => {
                assert_eq!(assign.op, AssignOp::Add);
                assert!(!assign.is_declaration);
            }
            other => panic!("expected an assignment, got {other:?}"),
        }
    }

    #[test]
    fn test_deref_assignment_target() {
        let body = body_of("*p = 3;");

        match &body[0].kind {
            StmtKind::Assign(assign) => {
                assert!(matches!(assign.lhs.kind, ExprKind::Unary(UnaryOp::Star, _)));
            }
            other => panic!("expected an assignment, got {other:?}"),
        }
    }

    #[test]
    fn test_member_assignment_target() {
        let body = body_of("v.x = 3;");

        match &body[0].kind {
            StmtKind::Assign(assign) => {
                assert!(matches!(assign.lhs.kind, ExprKind::Selector(_, _)));
            }
            other => panic!("expected an assignment, got {other:?}"),
        }
    }

    #[test_case("1 = 2;"; "literal lhs")]
    #[test_case("x + 1 = 2;"; "binary lhs")]
    #[test_case("f() = 2;"; "call lhs")]
    #[test_case("-x = 2;"; "unary minus lhs")]
    #[test_case("x++;"; "postfix statement")]
    fn test_invalid_identifier_statements(text: &str) {
        let result = parse(&format!("fn main() -> {{ {text} }}"));
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn test_if_statement() {
        let body = body_of("if x == 1 { -> 2; }");

        match &body[0].kind {
            StmtKind::If { cond, body } => {
                assert!(matches!(
                    cond.as_ref().unwrap().kind,
                    ExprKind::Binary(BinaryOp::Eq, _, _)
                ));
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected an if, got {other:?}"),
        }
    }

    #[test]
    fn test_null_return_expression() {
        let body = body_of("-> ;");
        assert!(matches!(&body[0].kind, StmtKind::Return(None)));
    }

    #[test]
    fn test_break_statement() {
        let body = body_of("break;");
        assert!(matches!(&body[0].kind, StmtKind::Break));
    }

    #[test]
    fn test_nested_blocks() {
        let body = body_of("{ x := 1; { y := 2; } }");

        match &body[0].kind {
            StmtKind::Block(stmts) => {
                assert_eq!(stmts.len(), 2);
                assert!(matches!(&stmts[1].kind, StmtKind::Block(_)));
            }
            other => panic!("expected a block, got {other:?}"),
        }
    }

    #[test]
    fn test_for_is_reserved() {
        let result = parse("fn main() -> { for }");
        assert!(matches!(
            result,
            Err(Error::Parse(e)) if matches!(e.kind, ErrorKind::ForNotImplemented)
        ));
    }

    #[test]
    fn test_struct_declaration() {
        let root = parse("struct V { x : i32; y : i32 }").unwrap();

        match &root.decls[0] {
            Decl::Struct(s) => {
                assert_eq!(s.name.name, "V");
                assert_eq!(s.members.len(), 2);
                assert_eq!(s.members[0].name.name, "x");
                assert_eq!(s.members[1].ty.name, "i32");
            }
            other => panic!("expected a struct, got {other:?}"),
        }
    }

    #[test]
    fn test_struct_members_without_semicolons() {
        let root = parse("struct V {\n x : i32\n y : f64\n}").unwrap();

        match &root.decls[0] {
            Decl::Struct(s) => assert_eq!(s.members.len(), 2),
            other => panic!("expected a struct, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_struct_is_rejected() {
        assert!(parse("struct V { }").is_err());
    }

    #[test]
    fn test_struct_registered_for_later_declarations() {
        let root = parse("struct V { x : i32 } fn f(v: *V) -> ;").unwrap();

        match &root.decls[1] {
            Decl::Fn(f) => {
                assert_eq!(f.params[0].ty.name, "V*");

                match &f.params[0].ty.kind {
                    TypeKind::Pointer(inner) => {
                        assert!(matches!(&inner.kind, TypeKind::Struct(name) if name == "V"));
                    }
                    other => panic!("expected a pointer, got {other:?}"),
                }
            }
            other => panic!("expected a function, got {other:?}"),
        }
    }

    #[test]
    fn test_struct_init() {
        let body = body_of("v : V = V{1, 2};");

        match &body[0].kind {
            StmtKind::Assign(assign) => match assign.rhs.as_ref().map(|e| &e.kind) {
                Some(ExprKind::StructInit(name, exprs)) => {
                    assert_eq!(name.name, "V");
                    assert_eq!(exprs.len(), 2);
                }
                other => panic!("expected struct init, got {other:?}"),
            },
            other => panic!("expected an assignment, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_struct_init() {
        let body = body_of("v := V{};");

        match &body[0].kind {
            StmtKind::Assign(assign) => match assign.rhs.as_ref().map(|e| &e.kind) {
                Some(ExprKind::StructInit(_, exprs)) => assert!(exprs.is_empty()),
                other => panic!("expected struct init, got {other:?}"),
            },
            other => panic!("expected an assignment, got {other:?}"),
        }
    }

    #[test]
    fn test_struct_init_trailing_comma_is_rejected() {
        assert!(parse("fn main() -> { v := V{1,}; }").is_err());
    }

    #[test]
    fn test_struct_init_requires_identifier() {
        assert!(parse("fn main() -> { v := f(){1}; }").is_err());
    }

    #[test]
    fn test_unknown_type_parses_as_invalid() {
        let body = body_of("x : Missing = 1;");

        match &body[0].kind {
            StmtKind::Assign(assign) => {
                assert!(assign.decl_type.is_invalid());
                assert_eq!(assign.decl_type.name, "Missing");
            }
            other => panic!("expected an assignment, got {other:?}"),
        }
    }

    #[test]
    fn test_top_level_junk_is_rejected() {
        assert!(matches!(parse("42"), Err(Error::Parse(_))));
        assert!(matches!(parse("import x;"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_unterminated_body() {
        assert!(parse("fn main() -> {").is_err());
    }

    #[test]
    fn test_scope_stack_is_empty_after_parse() {
        let mut source = SourceFile::new(
            "test.qz",
            "fn main() -> { if 1 == 1 { { x := 2; } } }",
        );
        let (_, _, scopes) = parse_file(&mut source).unwrap();

        assert!(scopes.is_empty());
    }

    #[test]
    fn test_reparsing_yields_identical_ast() {
        let text = "struct V { x : i32 } fn main() -> i32 { v : V = V{1}; -> v.x; }";
        assert_eq!(parse(text).unwrap(), parse(text).unwrap());
    }
}

//! The recursive-descent parser: token stream to declarations.
//!
//! Operator applications are parsed by precedence climbing into unresolved
//! [`ExprKind::Unop`]/[`ExprKind::Binop`] nodes; calls stay unresolved
//! ([`ExprKind::Call`]) with their `(name, expression)` argument pairs, and
//! the typechecker enforces argument-ordering rules. On a syntax error the
//! parser records the diagnostic and resynchronises at the next declaration
//! boundary, so one bad declaration does not hide the rest of the file.

use smallvec::SmallVec;
use crate::error::{Error, Result};
use crate::lexer::{Keyword, Token, TokenStream};
use crate::types::ast::*;
use crate::types::{Ident, Loc, Spanned};
use crate::value::Value;

/// The outcome of parsing one file: the declarations that parsed, plus any
/// diagnostics recovered along the way.
#[derive(Debug)]
pub struct ParseResult {
  /// Successfully parsed declarations, in source order.
  pub decls: Vec<Decl>,
  /// Syntax errors recovered at declaration boundaries.
  pub errors: Vec<Error>,
}

/// Parse a whole token stream.
#[must_use] pub fn parse(ts: &TokenStream) -> ParseResult {
  let mut p = Parser { toks: &ts.tokens, pos: 0 };
  let mut decls = vec![];
  let mut errors = vec![];
  while !p.at(&Token::Eof) {
    match p.parse_decl() {
      Ok(d) => decls.push(d),
      Err(e) => {
        errors.push(e);
        p.recover();
      }
    }
  }
  ParseResult { decls, errors }
}

struct Parser<'a> {
  toks: &'a [Spanned<Token>],
  pos: usize,
}

impl<'a> Parser<'a> {
  fn peek(&self) -> &'a Token { &self.toks[self.pos].k }
  fn peek2(&self) -> &'a Token {
    &self.toks[(self.pos + 1).min(self.toks.len() - 1)].k
  }
  fn span(&self) -> Loc { self.toks[self.pos].span }
  fn prev_span(&self) -> Loc { self.toks[self.pos.saturating_sub(1)].span }

  fn bump(&mut self) -> &'a Spanned<Token> {
    let t = &self.toks[self.pos];
    if self.pos + 1 < self.toks.len() { self.pos += 1 }
    t
  }

  fn at(&self, t: &Token) -> bool { self.peek() == t }
  fn at_kw(&self, k: Keyword) -> bool { matches!(self.peek(), Token::Kw(k2) if *k2 == k) }

  fn eat(&mut self, t: &Token) -> bool {
    if self.at(t) { self.bump(); true } else { false }
  }
  fn eat_kw(&mut self, k: Keyword) -> bool {
    if self.at_kw(k) { self.bump(); true } else { false }
  }

  fn err(&self, msg: impl Into<String>) -> Error { Error::Parse(self.span(), msg.into()) }

  fn expect(&mut self, t: &Token, what: &str) -> Result<Loc> {
    if self.at(t) { Ok(self.bump().span) }
    else { Err(self.err(format!("expected {what}, found `{:?}`", self.peek()))) }
  }

  fn expect_kw(&mut self, k: Keyword, what: &str) -> Result<Loc> {
    if self.at_kw(k) { Ok(self.bump().span) }
    else { Err(self.err(format!("expected {what}, found `{:?}`", self.peek()))) }
  }

  fn ident(&mut self) -> Result<Ident> {
    match self.peek() {
      &Token::Ident(sym) => { self.bump(); Ok(Ident::new(sym)) }
      t => Err(self.err(format!("expected identifier, found `{t:?}`"))),
    }
  }

  /// Skip to the next plausible declaration start after a syntax error.
  fn recover(&mut self) {
    loop {
      match self.peek() {
        Token::Eof => return,
        Token::Kw(
          Keyword::Func | Keyword::Getter | Keyword::Setter | Keyword::Record |
          Keyword::Exception | Keyword::Enumeration | Keyword::Type |
          Keyword::Constant | Keyword::Config | Keyword::Var | Keyword::Builtin |
          Keyword::Operator1 | Keyword::Operator2,
        ) => return,
        _ => { self.bump(); }
      }
    }
  }

  // ---------------------------------------------------------------- decls

  fn parse_decl(&mut self) -> Result<Decl> {
    let start = self.span();
    let k = match self.peek() {
      Token::Kw(Keyword::Builtin) => {
        self.bump();
        if self.eat_kw(Keyword::Type) {
          let name = self.ident()?;
          self.expect(&Token::Semi, "`;`")?;
          DeclKind::BuiltinType(name)
        } else {
          self.expect_kw(Keyword::Func, "`type` or `func` after `__builtin`")?;
          let sig = self.parse_signature(FuncKind::Function)?;
          self.expect(&Token::Semi, "`;`")?;
          DeclKind::BuiltinFunc(sig)
        }
      }
      Token::Kw(Keyword::Type) => {
        self.bump();
        let name = self.ident()?;
        let mut params = vec![];
        if self.eat(&Token::LParen) {
          params = self.comma_list(&Token::RParen, Self::ident)?;
          self.expect(&Token::RParen, "`)`")?;
        }
        if self.eat(&Token::Semi) {
          DeclKind::Forward(name)
        } else {
          self.expect(&Token::Assign, "`=` or `;`")?;
          let ty = self.parse_ty()?;
          self.expect(&Token::Semi, "`;`")?;
          DeclKind::TypeAbbrev(name, params, ty)
        }
      }
      Token::Kw(Keyword::Record) => {
        self.bump();
        let name = self.ident()?;
        let mut params = vec![];
        if self.eat(&Token::LParen) {
          params = self.comma_list(&Token::RParen, Self::ident)?;
          self.expect(&Token::RParen, "`)`")?;
        }
        let fields = self.parse_field_block()?;
        self.eat(&Token::Semi);
        DeclKind::Record(name, params, fields)
      }
      Token::Kw(Keyword::Exception) => {
        self.bump();
        let name = self.ident()?;
        let fields =
          if self.at(&Token::LBrace) { self.parse_field_block()? } else { vec![] };
        self.eat(&Token::Semi);
        DeclKind::Exception(name, fields)
      }
      Token::Kw(Keyword::Enumeration) => {
        self.bump();
        let name = self.ident()?;
        self.expect(&Token::LBrace, "`{`")?;
        let members = self.comma_list(&Token::RBrace, Self::ident)?;
        self.expect(&Token::RBrace, "`}`")?;
        self.eat(&Token::Semi);
        DeclKind::Enum(name, members)
      }
      Token::Kw(Keyword::Func) => {
        self.bump();
        let sig = self.parse_signature(FuncKind::Function)?;
        if self.eat(&Token::Semi) {
          DeclKind::FunType(sig)
        } else {
          let body = self.parse_block()?;
          DeclKind::FunDefn(sig, body)
        }
      }
      Token::Kw(Keyword::Getter) => {
        self.bump();
        let sig = self.parse_getter()?;
        let body = self.parse_block()?;
        DeclKind::FunDefn(sig, body)
      }
      Token::Kw(Keyword::Setter) => {
        self.bump();
        let sig = self.parse_setter()?;
        let body = self.parse_block()?;
        DeclKind::FunDefn(sig, body)
      }
      Token::Kw(Keyword::Constant) => {
        self.bump();
        let ty = self.parse_ty()?;
        let name = self.ident()?;
        self.expect(&Token::Assign, "`=`")?;
        let e = self.parse_expr()?;
        self.expect(&Token::Semi, "`;`")?;
        DeclKind::Const(ty, name, e)
      }
      Token::Kw(Keyword::Config) => {
        self.bump();
        let ty = self.parse_ty()?;
        let name = self.ident()?;
        self.expect(&Token::Assign, "`=`")?;
        let e = self.parse_expr()?;
        self.expect(&Token::Semi, "`;`")?;
        DeclKind::Config(ty, name, e)
      }
      Token::Kw(Keyword::Var) => {
        self.bump();
        let ty = self.parse_ty()?;
        let name = self.ident()?;
        self.expect(&Token::Semi, "`;`")?;
        DeclKind::Var(ty, name)
      }
      Token::Kw(Keyword::Operator1) => {
        self.bump();
        let op = match self.bump().k {
          Token::Minus => Unop::Negate,
          Token::Bang => Unop::BoolNot,
          Token::Kw(Keyword::Not) => Unop::BitsNot,
          ref t => return Err(self.err(format!("expected unary operator, found `{t:?}`"))),
        };
        self.expect(&Token::Assign, "`=`")?;
        let fs = self.comma_list(&Token::Semi, Self::ident)?;
        self.expect(&Token::Semi, "`;`")?;
        DeclKind::Operator1(op, fs)
      }
      Token::Kw(Keyword::Operator2) => {
        self.bump();
        let op = self.parse_binop_token()?;
        self.expect(&Token::Assign, "`=`")?;
        let fs = self.comma_list(&Token::Semi, Self::ident)?;
        self.expect(&Token::Semi, "`;`")?;
        DeclKind::Operator2(op, fs)
      }
      t => return Err(self.err(format!("expected declaration, found `{t:?}`"))),
    };
    Ok(Spanned::new(start.merge(self.prev_span()), k))
  }

  fn parse_binop_token(&mut self) -> Result<Binop> {
    Ok(match self.bump().k {
      Token::EqEq => Binop::Eq,
      Token::Ne => Binop::Ne,
      Token::Gt => Binop::Gt,
      Token::Ge => Binop::Ge,
      Token::Lt => Binop::Lt,
      Token::Le => Binop::Le,
      Token::Plus => Binop::Add,
      Token::Minus => Binop::Sub,
      Token::Star => Binop::Mul,
      Token::Caret => Binop::Pow,
      Token::PlusPlus => Binop::Append,
      Token::Shl => Binop::ShiftL,
      Token::Shr => Binop::ShiftR,
      Token::Kw(Keyword::Div) => Binop::Div,
      Token::Kw(Keyword::Divrm) => Binop::Divrm,
      Token::Kw(Keyword::Mod) => Binop::Mod,
      Token::Kw(Keyword::Quot) => Binop::Quot,
      Token::Kw(Keyword::Rem) => Binop::Rem,
      Token::Kw(Keyword::And) => Binop::BitAnd,
      Token::Kw(Keyword::Or) => Binop::BitOr,
      Token::Kw(Keyword::Xor) => Binop::Eor,
      ref t => return Err(self.err(format!("expected binary operator, found `{t:?}`"))),
    })
  }

  /// `Name[?!] {params}? (formals) [=> rty]`
  fn parse_signature(&mut self, kind: FuncKind) -> Result<FunSig> {
    let name = self.ident()?;
    let throws = self.parse_throws();
    // An explicit parameter list is accepted and re-derived by the
    // typechecker; the names also usable as formals.
    let mut params = vec![];
    if self.eat(&Token::LBrace) {
      params = self.comma_list(&Token::RBrace, Self::ident)?;
      self.expect(&Token::RBrace, "`}`")?;
    }
    self.expect(&Token::LParen, "`(`")?;
    let mut args: Vec<FormalArg> = params.into_iter().map(|name| FormalArg {
      name,
      ty: Type::integer(),
      default: None,
    }).collect();
    let explicit = self.comma_list(&Token::RParen, Self::parse_formal)?;
    // A name may appear both as a parameter and as a formal; the formal's
    // declared type wins.
    for f in explicit {
      if let Some(prev) = args.iter_mut().find(|a| a.name == f.name) { *prev = f }
      else { args.push(f) }
    }
    self.expect(&Token::RParen, "`)`")?;
    let rty = if self.eat(&Token::Arrow) { Some(self.parse_ty()?) } else { None };
    Ok(FunSig { name: name.suffixed(kind.suffix()), kind, args, rty, throws })
  }

  fn parse_throws(&mut self) -> ThrowsTag {
    if self.eat(&Token::Quest) { ThrowsTag::MayThrow }
    else if self.eat(&Token::Bang) { ThrowsTag::AlwaysThrow }
    else { ThrowsTag::NoThrow }
  }

  fn parse_formal(&mut self) -> Result<FormalArg> {
    let name = self.ident()?;
    self.expect(&Token::Colon, "`:`")?;
    let ty = self.parse_ty()?;
    let default = if self.eat(&Token::Assign) { Some(self.parse_expr()?) } else { None };
    Ok(FormalArg { name, ty, default })
  }

  /// `getter F => T` or `getter F[formals] => T`
  fn parse_getter(&mut self) -> Result<FunSig> {
    let name = self.ident()?;
    let throws = self.parse_throws();
    let mut args = vec![];
    if self.eat(&Token::LBrack) {
      args = self.comma_list(&Token::RBrack, Self::parse_formal)?;
      self.expect(&Token::RBrack, "`]`")?;
    }
    self.expect(&Token::Arrow, "`=>`")?;
    let rty = self.parse_ty()?;
    Ok(FunSig {
      name: name.suffixed(FuncKind::Getter.suffix()),
      kind: FuncKind::Getter,
      args,
      rty: Some(rty),
      throws,
    })
  }

  /// `setter F = v : T` or `setter F[formals] = v : T`; the assigned value
  /// becomes the final formal.
  fn parse_setter(&mut self) -> Result<FunSig> {
    let name = self.ident()?;
    let throws = self.parse_throws();
    let mut args = vec![];
    if self.eat(&Token::LBrack) {
      args = self.comma_list(&Token::RBrack, Self::parse_formal)?;
      self.expect(&Token::RBrack, "`]`")?;
    }
    self.expect(&Token::Assign, "`=`")?;
    let val = self.ident()?;
    self.expect(&Token::Colon, "`:`")?;
    let vty = self.parse_ty()?;
    args.push(FormalArg { name: val, ty: vty, default: None });
    Ok(FunSig {
      name: name.suffixed(FuncKind::Setter.suffix()),
      kind: FuncKind::Setter,
      args,
      rty: None,
      throws,
    })
  }

  fn parse_field_block(&mut self) -> Result<Vec<(Ident, Type)>> {
    self.expect(&Token::LBrace, "`{`")?;
    let mut fields = vec![];
    while !self.at(&Token::RBrace) {
      let name = self.ident()?;
      self.expect(&Token::Colon, "`:`")?;
      let ty = self.parse_ty()?;
      fields.push((name, ty));
      if !self.eat(&Token::Semi) && !self.eat(&Token::Comma) { break }
    }
    self.expect(&Token::RBrace, "`}`")?;
    Ok(fields)
  }

  fn comma_list<T>(
    &mut self, close: &Token, f: impl Fn(&mut Self) -> Result<T>,
  ) -> Result<Vec<T>> {
    let mut out = vec![];
    if self.at(close) { return Ok(out) }
    loop {
      out.push(f(self)?);
      if !self.eat(&Token::Comma) { return Ok(out) }
    }
  }

  // ---------------------------------------------------------------- types

  fn parse_ty(&mut self) -> Result<Type> {
    match self.peek() {
      Token::Ident(sym) if sym.as_str() == "integer" => {
        self.bump();
        let cs = if self.at(&Token::LBrace) { Some(self.parse_constraints()?) } else { None };
        Ok(Type::Integer(cs))
      }
      Token::Ident(sym) if sym.as_str() == "bits" => {
        self.bump();
        self.expect(&Token::LParen, "`(`")?;
        let w = self.parse_expr()?;
        self.expect(&Token::RParen, "`)`")?;
        let fields = if self.at(&Token::LBrace) { self.parse_reg_fields()? } else { vec![] };
        Ok(Type::Bits(Box::new(w), fields))
      }
      &Token::Ident(sym) => {
        self.bump();
        let name = Ident::new(sym);
        if self.eat(&Token::LParen) {
          let args = self.comma_list(&Token::RParen, Self::parse_expr)?;
          self.expect(&Token::RParen, "`)`")?;
          Ok(Type::Constructor(name, args))
        } else {
          Ok(Type::named(name))
        }
      }
      Token::Kw(Keyword::Typeof) => {
        self.bump();
        self.expect(&Token::LParen, "`(`")?;
        let e = self.parse_expr()?;
        self.expect(&Token::RParen, "`)`")?;
        Ok(Type::OfExpr(Box::new(e)))
      }
      Token::Kw(Keyword::Array) => {
        self.bump();
        self.expect(&Token::LBrack, "`[`")?;
        let ix = IxType::Int(self.parse_expr()?);
        self.expect(&Token::RBrack, "`]`")?;
        self.expect_kw(Keyword::Of, "`of`")?;
        let ety = self.parse_ty()?;
        Ok(Type::Array(Box::new(ix), Box::new(ety)))
      }
      Token::LParen => {
        self.bump();
        let tys = self.comma_list(&Token::RParen, Self::parse_ty)?;
        self.expect(&Token::RParen, "`)`")?;
        match tys.len() {
          1 => Ok(tys.into_iter().next().expect("len checked")),
          _ => Ok(Type::Tuple(tys)),
        }
      }
      t => Err(self.err(format!("expected type, found `{t:?}`"))),
    }
  }

  fn parse_constraints(&mut self) -> Result<Vec<Constraint>> {
    self.expect(&Token::LBrace, "`{`")?;
    let cs = self.comma_list(&Token::RBrace, |p| {
      let lo = p.parse_expr()?;
      if p.eat(&Token::DotDot) {
        let hi = p.parse_expr()?;
        Ok(Constraint::Range(lo, hi))
      } else {
        Ok(Constraint::Single(lo))
      }
    })?;
    self.expect(&Token::RBrace, "`}`")?;
    Ok(cs)
  }

  fn parse_reg_fields(&mut self) -> Result<Vec<RegField>> {
    self.expect(&Token::LBrace, "`{`")?;
    let fields = self.comma_list(&Token::RBrace, |p| {
      p.expect(&Token::LBrack, "`[`")?;
      let slices = p.comma_list(&Token::RBrack, Self::parse_slice)?;
      p.expect(&Token::RBrack, "`]`")?;
      let name = p.ident()?;
      Ok(RegField { slices, name })
    })?;
    self.expect(&Token::RBrace, "`}`")?;
    Ok(fields)
  }

  // ---------------------------------------------------------------- exprs

  fn parse_expr(&mut self) -> Result<Expr> { self.parse_implies() }

  fn parse_implies(&mut self) -> Result<Expr> {
    let lhs = self.parse_bool_or()?;
    let op = match self.peek() {
      Token::LongArrow => Binop::Implies,
      Token::IffArrow => Binop::Iff,
      _ => return Ok(lhs),
    };
    self.bump();
    // Right associative, so chains nest to the right.
    let rhs = self.parse_implies()?;
    Ok(self.binop(op, lhs, rhs))
  }

  fn binop(&self, op: Binop, lhs: Expr, rhs: Expr) -> Expr {
    let span = lhs.span.merge(rhs.span);
    ExprKind::Binop(op, Box::new(lhs), Box::new(rhs)).at(span)
  }

  fn parse_bool_or(&mut self) -> Result<Expr> {
    let mut lhs = self.parse_bool_and()?;
    while self.eat(&Token::BarBar) {
      let rhs = self.parse_bool_and()?;
      lhs = self.binop(Binop::BoolOr, lhs, rhs);
    }
    Ok(lhs)
  }

  fn parse_bool_and(&mut self) -> Result<Expr> {
    let mut lhs = self.parse_cmp()?;
    while self.eat(&Token::AmpAmp) {
      let rhs = self.parse_cmp()?;
      lhs = self.binop(Binop::BoolAnd, lhs, rhs);
    }
    Ok(lhs)
  }

  /// Comparisons are non-associative; `IN` and `as` sit at the same level.
  fn parse_cmp(&mut self) -> Result<Expr> {
    let lhs = self.parse_add()?;
    let op = match self.peek() {
      Token::EqEq => Some(Binop::Eq),
      Token::Ne => Some(Binop::Ne),
      Token::Lt => Some(Binop::Lt),
      Token::Le => Some(Binop::Le),
      Token::Gt => Some(Binop::Gt),
      Token::Ge => Some(Binop::Ge),
      _ => None,
    };
    if let Some(op) = op {
      self.bump();
      let rhs = self.parse_add()?;
      return Ok(self.binop(op, lhs, rhs))
    }
    if self.eat_kw(Keyword::In) {
      let span = lhs.span;
      let p = self.parse_pattern()?;
      return Ok(ExprKind::In(Box::new(lhs), Box::new(p)).at(span.merge(self.prev_span())))
    }
    if self.eat_kw(Keyword::As) {
      let span = lhs.span;
      if self.at(&Token::LBrace) {
        let cs = self.parse_constraints()?;
        return Ok(ExprKind::AsConstraint(Box::new(lhs), cs).at(span.merge(self.prev_span())))
      }
      let ty = self.parse_ty()?;
      return Ok(ExprKind::AsType(Box::new(lhs), Box::new(ty)).at(span.merge(self.prev_span())))
    }
    Ok(lhs)
  }

  fn parse_add(&mut self) -> Result<Expr> {
    let mut lhs = self.parse_mul()?;
    loop {
      let op = match self.peek() {
        Token::Plus => Binop::Add,
        Token::Minus => Binop::Sub,
        Token::PlusPlus => Binop::Append,
        Token::Shl => Binop::ShiftL,
        Token::Shr => Binop::ShiftR,
        Token::Kw(Keyword::Or) => Binop::BitOr,
        Token::Kw(Keyword::Xor) => Binop::Eor,
        _ => return Ok(lhs),
      };
      self.bump();
      let rhs = self.parse_mul()?;
      lhs = self.binop(op, lhs, rhs);
    }
  }

  fn parse_mul(&mut self) -> Result<Expr> {
    let mut lhs = self.parse_pow()?;
    loop {
      let op = match self.peek() {
        Token::Star => Binop::Mul,
        Token::Kw(Keyword::Div) => Binop::Div,
        Token::Kw(Keyword::Divrm) => Binop::Divrm,
        Token::Kw(Keyword::Mod) => Binop::Mod,
        Token::Kw(Keyword::Quot) => Binop::Quot,
        Token::Kw(Keyword::Rem) => Binop::Rem,
        Token::Kw(Keyword::And) => Binop::BitAnd,
        _ => return Ok(lhs),
      };
      self.bump();
      let rhs = self.parse_pow()?;
      lhs = self.binop(op, lhs, rhs);
    }
  }

  fn parse_pow(&mut self) -> Result<Expr> {
    let lhs = self.parse_unary()?;
    if self.eat(&Token::Caret) {
      let rhs = self.parse_pow()?;
      return Ok(self.binop(Binop::Pow, lhs, rhs))
    }
    Ok(lhs)
  }

  fn parse_unary(&mut self) -> Result<Expr> {
    let span = self.span();
    let op = match self.peek() {
      Token::Minus => Unop::Negate,
      Token::Bang => Unop::BoolNot,
      Token::Kw(Keyword::Not) => Unop::BitsNot,
      _ => return self.parse_postfix(),
    };
    self.bump();
    let e = self.parse_unary()?;
    let span = span.merge(e.span);
    Ok(ExprKind::Unop(op, Box::new(e)).at(span))
  }

  fn parse_postfix(&mut self) -> Result<Expr> {
    let mut e = self.parse_atom()?;
    loop {
      match self.peek() {
        Token::LBrack => {
          self.bump();
          let slices = self.comma_list(&Token::RBrack, Self::parse_slice)?;
          let end = self.expect(&Token::RBrack, "`]`")?;
          let span = e.span.merge(end);
          // A lone plain selector could be an array index or a single-bit
          // slice; the typechecker decides from the base type.
          e = match (slices.len(), slices.first()) {
            (1, Some(Slice::Single(_))) => {
              let Some(Slice::Single(i)) = slices.into_iter().next() else { unreachable!() };
              ExprKind::Index(Box::new(e), Box::new(i)).at(span)
            }
            _ => ExprKind::Slices(Box::new(e), slices, None).at(span),
          };
        }
        Token::Dot => {
          self.bump();
          if self.eat(&Token::LBrack) {
            let fields = self.comma_list(&Token::RBrack, Self::ident)?;
            let end = self.expect(&Token::RBrack, "`]`")?;
            let span = e.span.merge(end);
            e = ExprKind::Fields(Box::new(e), fields).at(span);
          } else {
            let f = self.ident()?;
            let span = e.span.merge(self.prev_span());
            e = ExprKind::Field(Box::new(e), f).at(span);
          }
        }
        Token::Kw(Keyword::With) => {
          self.bump();
          self.expect(&Token::LBrace, "`{`")?;
          let changes = self.comma_list(&Token::RBrace, |p| {
            let c = if p.eat(&Token::LBrack) {
              let ss = p.comma_list(&Token::RBrack, Self::parse_slice)?;
              p.expect(&Token::RBrack, "`]`")?;
              Change::Slices(ss)
            } else {
              Change::Field(p.ident()?)
            };
            p.expect(&Token::Assign, "`=`")?;
            let v = p.parse_expr()?;
            Ok((c, v))
          })?;
          let end = self.expect(&Token::RBrace, "`}`")?;
          let span = e.span.merge(end);
          e = ExprKind::WithChanges(Box::new(e), changes).at(span);
        }
        _ => return Ok(e),
      }
    }
  }

  fn parse_slice(&mut self) -> Result<Slice> {
    let e = self.parse_expr()?;
    Ok(match self.peek() {
      Token::Colon => {
        self.bump();
        Slice::HiLo(e, self.parse_expr()?)
      }
      Token::PlusColon => {
        self.bump();
        Slice::LoWd(e, self.parse_expr()?)
      }
      Token::MinusColon => {
        self.bump();
        Slice::HiWd(e, self.parse_expr()?)
      }
      Token::StarColon => {
        self.bump();
        Slice::Element(e, self.parse_expr()?)
      }
      _ => Slice::Single(e),
    })
  }

  fn parse_atom(&mut self) -> Result<Expr> {
    let span = self.span();
    match self.peek().clone() {
      Token::Int(n) => { self.bump(); Ok(ExprKind::Lit(Value::Int(n)).at(span)) }
      Token::SizedInt(n) => { self.bump(); Ok(ExprKind::Lit(Value::SInt(n)).at(span)) }
      Token::BitsLit(b) => { self.bump(); Ok(ExprKind::Lit(Value::Bits(b)).at(span)) }
      Token::MaskLit(m) => { self.bump(); Ok(ExprKind::Lit(Value::Mask(m)).at(span)) }
      Token::StringLit(s) => { self.bump(); Ok(ExprKind::Lit(Value::String(s)).at(span)) }
      Token::Real(_) => Err(self.err("real literals have no runtime representation here")),
      Token::Kw(Keyword::True) => { self.bump(); Ok(ExprKind::Lit(Value::Bool(true)).at(span)) }
      Token::Kw(Keyword::False) => { self.bump(); Ok(ExprKind::Lit(Value::Bool(false)).at(span)) }
      Token::Kw(Keyword::Unknown) => {
        self.bump();
        self.expect(&Token::Colon, "`:`")?;
        let ty = self.parse_ty()?;
        Ok(ExprKind::Unknown(Box::new(ty)).at(span.merge(self.prev_span())))
      }
      Token::Kw(Keyword::If) => {
        self.bump();
        let mut arms = vec![];
        loop {
          let c = self.parse_expr()?;
          self.expect_kw(Keyword::Then, "`then`")?;
          arms.push((c, self.parse_expr()?));
          if !self.eat_kw(Keyword::Elsif) { break }
        }
        self.expect_kw(Keyword::Else, "`else`")?;
        let els = self.parse_expr()?;
        let span = span.merge(els.span);
        Ok(ExprKind::If(arms, Box::new(els)).at(span))
      }
      Token::Ident(sym) => {
        self.bump();
        let name = Ident::new(sym);
        // A call-site throw marker (`F?(…)`, `F!(…)`) restates the callee's
        // discipline; the typechecker carries the authoritative tag.
        if matches!(self.peek(), Token::Quest | Token::Bang)
          && self.peek2() == &Token::LParen
        {
          self.bump();
        }
        match self.peek() {
          Token::LParen => {
            self.bump();
            let args = self.comma_list(&Token::RParen, Self::parse_call_arg)?;
            let end = self.expect(&Token::RParen, "`)`")?;
            // `R(params){fields}` is parameterised record construction.
            if self.at(&Token::LBrace) && !args.iter().any(|(n, _)| n.is_some()) {
              let params = args.into_iter().map(|(_, e)| e).collect();
              let fields = self.parse_record_fields()?;
              return Ok(ExprKind::Record(name, params, fields).at(span.merge(self.prev_span())))
            }
            Ok(ExprKind::Call(name, args).at(span.merge(end)))
          }
          Token::LBrace if matches!(self.peek2(), Token::Ident(_) | Token::RBrace) => {
            let fields = self.parse_record_fields()?;
            Ok(ExprKind::Record(name, vec![], fields).at(span.merge(self.prev_span())))
          }
          _ => Ok(ExprKind::Var(name).at(span)),
        }
      }
      Token::LParen => {
        self.bump();
        let es = self.comma_list(&Token::RParen, Self::parse_expr)?;
        let end = self.expect(&Token::RParen, "`)`")?;
        match es.len() {
          1 => Ok(es.into_iter().next().expect("len checked")),
          _ => Ok(ExprKind::Tuple(es).at(span.merge(end))),
        }
      }
      t => Err(self.err(format!("expected expression, found `{t:?}`"))),
    }
  }

  fn parse_call_arg(&mut self) -> Result<CallArg> {
    if let Token::Ident(sym) = *self.peek() {
      if self.peek2() == &Token::Assign {
        self.bump();
        self.bump();
        let e = self.parse_expr()?;
        return Ok((Some(Ident::new(sym)), e))
      }
    }
    Ok((None, self.parse_expr()?))
  }

  fn parse_record_fields(&mut self) -> Result<Vec<(Ident, Expr)>> {
    self.expect(&Token::LBrace, "`{`")?;
    let fields = self.comma_list(&Token::RBrace, |p| {
      let f = p.ident()?;
      p.expect(&Token::Assign, "`=`")?;
      let e = p.parse_expr()?;
      Ok((f, e))
    })?;
    self.expect(&Token::RBrace, "`}`")?;
    Ok(fields)
  }

  fn parse_pattern(&mut self) -> Result<Pattern> {
    match self.peek().clone() {
      Token::Int(n) => {
        self.bump();
        if self.eat(&Token::DotDot) {
          let hi = self.parse_expr()?;
          let lo = ExprKind::Lit(Value::Int(n)).synth();
          Ok(Pattern::Range(lo, hi))
        } else {
          Ok(Pattern::Lit(Value::Int(n)))
        }
      }
      Token::SizedInt(n) => { self.bump(); Ok(Pattern::Lit(Value::SInt(n))) }
      Token::BitsLit(b) => { self.bump(); Ok(Pattern::Lit(Value::Bits(b))) }
      Token::MaskLit(m) => { self.bump(); Ok(Pattern::Mask(m)) }
      Token::Kw(Keyword::True) => { self.bump(); Ok(Pattern::Lit(Value::Bool(true))) }
      Token::Kw(Keyword::False) => { self.bump(); Ok(Pattern::Lit(Value::Bool(false))) }
      Token::Minus => {
        self.bump();
        if matches!(self.peek(), Token::Int(_)) {
          // A negative literal, possibly the start of a range.
          let Token::Int(n) = self.bump().k.clone() else { unreachable!() };
          let lo = ExprKind::Lit(Value::Int(-n)).synth();
          if self.eat(&Token::DotDot) {
            let hi = self.parse_expr()?;
            return Ok(Pattern::Range(lo, hi))
          }
          let ExprKind::Lit(v) = lo.k else { unreachable!() };
          return Ok(Pattern::Lit(v))
        }
        Ok(Pattern::Wildcard)
      }
      Token::Ident(sym) => { self.bump(); Ok(Pattern::Const(Ident::new(sym))) }
      Token::LParen => {
        self.bump();
        let ps = self.comma_list(&Token::RParen, Self::parse_pattern)?;
        self.expect(&Token::RParen, "`)`")?;
        Ok(Pattern::Tuple(ps))
      }
      Token::LBrace => {
        self.bump();
        let ps = self.comma_list(&Token::RBrace, Self::parse_pattern)?;
        self.expect(&Token::RBrace, "`}`")?;
        Ok(Pattern::Set(ps))
      }
      t => Err(self.err(format!("expected pattern, found `{t:?}`"))),
    }
  }

  // ---------------------------------------------------------------- stmts

  fn parse_block(&mut self) -> Result<Vec<Stmt>> {
    self.expect_kw(Keyword::Begin, "`begin`")?;
    let ss = self.parse_stmts()?;
    self.expect_kw(Keyword::End, "`end`")?;
    Ok(ss)
  }

  /// Statements up to a block-closing keyword.
  fn parse_stmts(&mut self) -> Result<Vec<Stmt>> {
    let mut out = vec![];
    loop {
      match self.peek() {
        Token::Eof |
        Token::Kw(
          Keyword::End | Keyword::Else | Keyword::Elsif | Keyword::When |
          Keyword::Otherwise | Keyword::Catch | Keyword::Until,
        ) => return Ok(out),
        _ => out.push(self.parse_stmt()?),
      }
    }
  }

  fn parse_stmt(&mut self) -> Result<Stmt> {
    let start = self.span();
    let k = match self.peek() {
      Token::Kw(Keyword::Var) => {
        self.bump();
        let names: SmallVec<[Ident; 2]> = {
          let mut v = SmallVec::new();
          v.push(self.ident()?);
          while self.eat(&Token::Comma) { v.push(self.ident()?) }
          v
        };
        self.expect(&Token::Colon, "`:`")?;
        let ty = self.parse_ty()?;
        if names.len() == 1 && self.eat(&Token::Assign) {
          let init = self.parse_expr()?;
          self.expect(&Token::Semi, "`;`")?;
          StmtKind::VarDecl {
            constant: false,
            item: DeclItem::Var(names[0], Some(ty)),
            init,
          }
        } else {
          self.expect(&Token::Semi, "`;`")?;
          StmtKind::VarDeclsNoInit(ty, names.into_vec())
        }
      }
      Token::Kw(Keyword::Let | Keyword::Constant) => {
        self.bump();
        let item = self.parse_decl_item()?;
        self.expect(&Token::Assign, "`=`")?;
        let init = self.parse_expr()?;
        self.expect(&Token::Semi, "`;`")?;
        StmtKind::VarDecl { constant: true, item, init }
      }
      Token::Kw(Keyword::Return) => {
        self.bump();
        let e = if self.at(&Token::Semi) { None } else { Some(self.parse_expr()?) };
        self.expect(&Token::Semi, "`;`")?;
        StmtKind::Return(e)
      }
      Token::Kw(Keyword::Assert) => {
        self.bump();
        let e = self.parse_expr()?;
        self.expect(&Token::Semi, "`;`")?;
        StmtKind::Assert(e)
      }
      Token::Kw(Keyword::Throw) => {
        self.bump();
        let e = self.parse_expr()?;
        self.expect(&Token::Semi, "`;`")?;
        StmtKind::Throw(e)
      }
      Token::Kw(Keyword::If) => {
        self.bump();
        let mut arms = vec![];
        loop {
          let c = self.parse_expr()?;
          self.expect_kw(Keyword::Then, "`then`")?;
          arms.push((c, self.parse_stmts()?));
          if !self.eat_kw(Keyword::Elsif) { break }
        }
        let els = if self.eat_kw(Keyword::Else) { self.parse_stmts()? } else { vec![] };
        self.expect_kw(Keyword::End, "`end`")?;
        StmtKind::If(arms, els)
      }
      Token::Kw(Keyword::Case) => {
        self.bump();
        let e = self.parse_expr()?;
        self.expect_kw(Keyword::Of, "`of`")?;
        let mut alts = vec![];
        let mut default = None;
        loop {
          if self.at_kw(Keyword::When) {
            let aspan = self.bump().span;
            let mut pats = vec![self.parse_pattern()?];
            while self.eat(&Token::Comma) { pats.push(self.parse_pattern()?) }
            let guard = if self.eat_kw(Keyword::Where) { Some(self.parse_expr()?) } else { None };
            self.expect(&Token::Arrow, "`=>`")?;
            let body = self.parse_stmts()?;
            alts.push(Alt { pats, guard, body, span: aspan });
          } else if self.eat_kw(Keyword::Otherwise) {
            self.expect(&Token::Arrow, "`=>`")?;
            default = Some(self.parse_stmts()?);
          } else {
            break
          }
        }
        self.expect_kw(Keyword::End, "`end`")?;
        StmtKind::Case(e, alts, default)
      }
      Token::Kw(Keyword::For) => {
        self.bump();
        let var = self.ident()?;
        self.expect(&Token::Assign, "`=`")?;
        let from = self.parse_expr()?;
        let dir = if self.eat_kw(Keyword::To) { Direction::Up }
          else { self.expect_kw(Keyword::Downto, "`to` or `downto`")?; Direction::Down };
        let to = self.parse_expr()?;
        self.expect_kw(Keyword::Do, "`do`")?;
        let body = self.parse_stmts()?;
        self.expect_kw(Keyword::End, "`end`")?;
        StmtKind::For { var, from, dir, to, body }
      }
      Token::Kw(Keyword::While) => {
        self.bump();
        let c = self.parse_expr()?;
        self.expect_kw(Keyword::Do, "`do`")?;
        let body = self.parse_stmts()?;
        self.expect_kw(Keyword::End, "`end`")?;
        StmtKind::While(c, body)
      }
      Token::Kw(Keyword::Repeat) => {
        self.bump();
        let body = self.parse_stmts()?;
        self.expect_kw(Keyword::Until, "`until`")?;
        let c = self.parse_expr()?;
        self.expect(&Token::Semi, "`;`")?;
        StmtKind::Repeat(body, c)
      }
      Token::Kw(Keyword::Try) => {
        self.bump();
        let body = self.parse_stmts()?;
        self.expect_kw(Keyword::Catch, "`catch`")?;
        let mut catchers = vec![];
        let mut otherwise = None;
        loop {
          if self.at_kw(Keyword::When) {
            let cspan = self.bump().span;
            let name = self.ident()?;
            self.expect(&Token::Colon, "`:`")?;
            let ty = self.ident()?;
            self.expect(&Token::Arrow, "`=>`")?;
            let body = self.parse_stmts()?;
            catchers.push(Catcher { name, ty, body, span: cspan });
          } else if self.eat_kw(Keyword::Otherwise) {
            self.expect(&Token::Arrow, "`=>`")?;
            otherwise = Some(self.parse_stmts()?);
          } else {
            break
          }
        }
        self.expect_kw(Keyword::End, "`end`")?;
        StmtKind::Try { body, catchers, otherwise }
      }
      // Assignment, procedure call, or an lvalue form starting elsewhere.
      _ => {
        let e = self.parse_assign_or_call()?;
        self.expect(&Token::Semi, "`;`")?;
        e
      }
    };
    Ok(Spanned::new(start.merge(self.prev_span()), k))
  }

  fn parse_decl_item(&mut self) -> Result<DeclItem> {
    if self.eat(&Token::LParen) {
      let items = self.comma_list(&Token::RParen, Self::parse_decl_item)?;
      self.expect(&Token::RParen, "`)`")?;
      return Ok(DeclItem::Tuple(items))
    }
    let name = self.ident()?;
    let ty = if self.eat(&Token::Colon) { Some(self.parse_ty()?) } else { None };
    Ok(DeclItem::Var(name, ty))
  }

  fn parse_assign_or_call(&mut self) -> Result<StmtKind> {
    // `[l1, l2] = e` writes a multi-part bitvector.
    if self.at(&Token::LBrack) {
      let start = self.span();
      self.bump();
      let parts = self.comma_list(&Token::RBrack, |p| {
        let e = p.parse_postfix()?;
        p.expr_to_lexpr(e)
      })?;
      self.expect(&Token::RBrack, "`]`")?;
      self.expect(&Token::Assign, "`=`")?;
      let rhs = self.parse_expr()?;
      let lhs = LExprKind::BitTuple(vec![], parts).at(start.merge(self.prev_span()));
      return Ok(StmtKind::Assign(lhs, rhs))
    }
    // `- = e` evaluates and discards.
    if self.at(&Token::Minus) && self.peek2() == &Token::Assign {
      let start = self.bump().span;
      self.bump();
      let rhs = self.parse_expr()?;
      return Ok(StmtKind::Assign(LExprKind::Wildcard.at(start), rhs))
    }
    let e = self.parse_postfix()?;
    if self.eat(&Token::Assign) {
      let lhs = self.expr_to_lexpr(e)?;
      let rhs = self.parse_expr()?;
      return Ok(StmtKind::Assign(lhs, rhs))
    }
    match e.k {
      ExprKind::Call(name, args) => Ok(StmtKind::Call(name, args)),
      _ => Err(Error::Parse(e.span, "expected assignment or call statement".into())),
    }
  }

  /// Reinterpret an expression in lvalue position.
  fn expr_to_lexpr(&self, e: Expr) -> Result<LExpr> {
    let Spanned { span, k } = e;
    let k = match k {
      ExprKind::Var(x) => LExprKind::Var(x),
      ExprKind::Field(e, f) => LExprKind::Field(Box::new(self.expr_to_lexpr(*e)?), f),
      ExprKind::Fields(e, fs) => LExprKind::Fields(Box::new(self.expr_to_lexpr(*e)?), fs),
      ExprKind::Index(a, i) => LExprKind::Index(Box::new(self.expr_to_lexpr(*a)?), i),
      ExprKind::Slices(e, ss, ty) =>
        LExprKind::Slices(Box::new(self.expr_to_lexpr(*e)?), ss, ty),
      ExprKind::Tuple(es) => LExprKind::Tuple(
        es.into_iter().map(|e| self.expr_to_lexpr(e)).collect::<Result<_>>()?,
      ),
      _ => return Err(Error::Parse(span, "this expression cannot be assigned to".into())),
    };
    Ok(Spanned::new(span, k))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lexer::lex;

  fn parse_ok(src: &str) -> Vec<Decl> {
    let ts = lex("test.asl", src).expect("lexes");
    let r = parse(&ts);
    assert!(r.errors.is_empty(), "parse errors: {:?}", r.errors);
    r.decls
  }

  fn parse_expr_str(src: &str) -> Expr {
    let decls = parse_ok(&format!("constant integer __x = {src};"));
    match decls.into_iter().next().expect("one decl").k {
      DeclKind::Const(_, _, e) => e,
      d => panic!("unexpected decl {d:?}"),
    }
  }

  #[test]
  fn function_definition_round_trip() {
    let decls = parse_ok(
      "func Test(x : bits(4), y : bits(4)) => bits(4)\nbegin\n  return x OR y;\nend",
    );
    assert_eq!(decls.len(), 1);
    let DeclKind::FunDefn(sig, body) = &decls[0].k else { panic!("not a defn") };
    assert_eq!(sig.name, Ident::from_str("Test"));
    assert_eq!(sig.args.len(), 2);
    assert_eq!(sig.throws, ThrowsTag::NoThrow);
    assert_eq!(body.len(), 1);
    assert!(matches!(&body[0].k, StmtKind::Return(Some(_))));
  }

  #[test]
  fn precedence_boolean_vs_comparison() {
    let e = parse_expr_str("1 + 2 * 3 == 7 && TRUE");
    // ((1 + (2 * 3)) == 7) && TRUE
    assert_eq!(e.to_string(), "(((1 + (2 * 3)) == 7) && TRUE)");
  }

  #[test]
  fn named_arguments_after_positional() {
    let e = parse_expr_str("F(1, width = 4)");
    let ExprKind::Call(_, args) = e.k else { panic!("not a call") };
    assert_eq!(args[0].0, None);
    assert_eq!(args[1].0, Some(Ident::from_str("width")));
  }

  #[test]
  fn slice_forms() {
    let e = parse_expr_str("x[7:4]");
    assert!(matches!(&e.k, ExprKind::Slices(_, ss, None) if matches!(ss[0], Slice::HiLo(..))));
    let e = parse_expr_str("x[3 +: 2]");
    assert!(matches!(&e.k, ExprKind::Slices(_, ss, None) if matches!(ss[0], Slice::LoWd(..))));
    let e = parse_expr_str("x[7 -: 4]");
    assert!(matches!(&e.k, ExprKind::Slices(_, ss, None) if matches!(ss[0], Slice::HiWd(..))));
    let e = parse_expr_str("x[i *: 8]");
    assert!(matches!(&e.k, ExprKind::Slices(_, ss, None) if matches!(ss[0], Slice::Element(..))));
    // A bare subscript stays ambiguous between array index and bit slice.
    let e = parse_expr_str("x[3]");
    assert!(matches!(&e.k, ExprKind::Index(..)));
  }

  #[test]
  fn parameterised_record_construction() {
    let e = parse_expr_str("R(4){ x = '1111' }");
    let ExprKind::Record(name, params, fields) = e.k else { panic!("not a record") };
    assert_eq!(name, Ident::from_str("R"));
    assert_eq!(params.len(), 1);
    assert_eq!(fields.len(), 1);
  }

  #[test]
  fn with_changes() {
    let e = parse_expr_str("r with { f = 1, [3:0] = '0000' }");
    let ExprKind::WithChanges(_, changes) = e.k else { panic!("not with-changes") };
    assert!(matches!(changes[0].0, Change::Field(_)));
    assert!(matches!(changes[1].0, Change::Slices(_)));
  }

  #[test]
  fn getter_and_setter_namespaces() {
    let decls = parse_ok(
      "getter PC => bits(32)\nbegin\n  return _pc;\nend\n\
       setter PC = v : bits(32)\nbegin\n  _pc = v;\nend",
    );
    let DeclKind::FunDefn(g, _) = &decls[0].k else { panic!() };
    let DeclKind::FunDefn(s, _) = &decls[1].k else { panic!() };
    assert_eq!(g.kind, FuncKind::Getter);
    assert_eq!(s.kind, FuncKind::Setter);
    assert_ne!(g.name, s.name);
    assert_eq!(s.args.len(), 1, "setter value is the final formal");
  }

  #[test]
  fn throw_markers() {
    let decls = parse_ok("func F?() => integer\nbegin\n  return 1;\nend");
    let DeclKind::FunDefn(sig, _) = &decls[0].k else { panic!() };
    assert_eq!(sig.throws, ThrowsTag::MayThrow);
    let decls = parse_ok("func G!()\nbegin\n  throw Err{};\nend");
    let DeclKind::FunDefn(sig, _) = &decls[0].k else { panic!() };
    assert_eq!(sig.throws, ThrowsTag::AlwaysThrow);
    // Call-site markers are accepted and carried by resolution instead.
    let decls = parse_ok("func H() => integer\nbegin\n  return F?(1) + G!(2);\nend");
    assert_eq!(decls.len(), 1);
  }

  #[test]
  fn explicit_width_parameters_merge_into_formals() {
    let decls = parse_ok(
      "func F{A}(A : integer, src : bits(A)) => boolean\nbegin\n  return TRUE;\nend",
    );
    let DeclKind::FunDefn(sig, _) = &decls[0].k else { panic!() };
    // `A` appears once, with the formal's declared type.
    assert_eq!(sig.args.len(), 2);
    assert_eq!(sig.args[0].name, Ident::from_str("A"));
  }

  #[test]
  fn default_arguments_reference_earlier_formals() {
    let decls = parse_ok(
      "func F(n : integer, w : integer = n) => integer\nbegin\n  return w;\nend",
    );
    let DeclKind::FunDefn(sig, _) = &decls[0].k else { panic!() };
    assert!(sig.args[1].default.is_some());
  }

  #[test]
  fn case_with_guards_and_ranges() {
    let decls = parse_ok(
      "func F(x : integer) => integer\nbegin\n  case x of\n    \
       when 0 => return 0;\n    when 1..15 where x != 9 => return 1;\n    \
       otherwise => return 2;\n  end\nend",
    );
    let DeclKind::FunDefn(_, body) = &decls[0].k else { panic!() };
    let StmtKind::Case(_, alts, default) = &body[0].k else { panic!("not a case") };
    assert_eq!(alts.len(), 2);
    assert!(alts[1].guard.is_some());
    assert!(matches!(alts[1].pats[0], Pattern::Range(..)));
    assert!(default.is_some());
  }

  #[test]
  fn loops_and_try() {
    let decls = parse_ok(
      "func F()\nbegin\n  for i = 3 downto 0 do\n    G(i);\n  end\n  \
       while TRUE do\n    H();\n  end\n  repeat\n    H();\n  until FALSE;\n  \
       try\n    H();\n  catch\n    when e : Err => G(0);\n    otherwise => G(1);\n  end\nend",
    );
    let DeclKind::FunDefn(_, body) = &decls[0].k else { panic!() };
    assert!(matches!(&body[0].k, StmtKind::For { dir: Direction::Down, .. }));
    assert!(matches!(&body[1].k, StmtKind::While(..)));
    assert!(matches!(&body[2].k, StmtKind::Repeat(..)));
    let StmtKind::Try { catchers, otherwise, .. } = &body[3].k else { panic!() };
    assert_eq!(catchers.len(), 1);
    assert!(otherwise.is_some());
  }

  #[test]
  fn bittuple_and_tuple_assignment() {
    let decls = parse_ok(
      "func F()\nbegin\n  [hi, lo] = x;\n  (a, b) = G();\n  - = H();\nend",
    );
    let DeclKind::FunDefn(_, body) = &decls[0].k else { panic!() };
    assert!(matches!(&body[0].k,
      StmtKind::Assign(Spanned { k: LExprKind::BitTuple(..), .. }, _)));
    assert!(matches!(&body[1].k,
      StmtKind::Assign(Spanned { k: LExprKind::Tuple(..), .. }, _)));
    assert!(matches!(&body[2].k,
      StmtKind::Assign(Spanned { k: LExprKind::Wildcard, .. }, _)));
  }

  #[test]
  fn error_recovery_keeps_later_decls() {
    let ts = lex("test.asl", "func Bad( begin end\nconstant integer N = 1;").expect("lexes");
    let r = parse(&ts);
    assert_eq!(r.errors.len(), 1);
    assert_eq!(r.decls.len(), 1);
    assert!(matches!(r.decls[0].k, DeclKind::Const(..)));
  }

  #[test]
  fn operator_registration() {
    let decls = parse_ok("__operator2 + = Int_Add, Bits_Add;");
    let DeclKind::Operator2(op, fs) = &decls[0].k else { panic!() };
    assert_eq!(*op, Binop::Add);
    assert_eq!(fs.len(), 2);
  }

  #[test]
  fn register_field_types() {
    let decls = parse_ok("var bits(8) { [7:4] hi, [3:0] lo } R;");
    let DeclKind::Var(Type::Bits(_, fields), _) = &decls[0].k else { panic!() };
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].name, Ident::from_str("hi"));
  }
}

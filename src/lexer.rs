//! The lexer: ASL surface text to a token stream with source positions.
//!
//! Comment forms: `//` to end of line, nesting `/* */`, and fenced
//! triple-backtick blocks whose fences start in column 0. Digit groups in
//! all numeric literals may be separated with `_`.

use num::{BigInt, BigUint, Num, Zero};
use crate::error::{Error, Result};
use crate::symbol::{Symbol, init_dense_symbol_map, intern};
use crate::types::{Loc, Position, Spanned};
use crate::value::{Bits, Mask, SInt};

macro_rules! keywords {
  {$($x:ident: $e:expr,)*} => {
    /// The reserved words of the surface language.
    #[derive(Debug, PartialEq, Eq, Copy, Clone)]
    pub enum Keyword { $($x),* }

    impl Keyword {
      /// Evaluate a function on all keywords, with their spellings.
      pub fn scan(mut f: impl FnMut(Self, &'static str)) {
        $(f(Keyword::$x, $e);)*
      }

      /// The surface spelling.
      #[must_use] pub fn as_str(self) -> &'static str {
        match self { $(Keyword::$x => $e),* }
      }

      /// Look up a keyword from an interned symbol.
      #[must_use] pub fn from_symbol(s: Symbol) -> Option<Self> {
        use std::sync::LazyLock;
        static SYMBOL_MAP: LazyLock<Box<[Option<Keyword>]>> = LazyLock::new(|| {
          let mut kvs = vec![];
          Keyword::scan(|k, s| kvs.push((intern(s), k)));
          init_dense_symbol_map(&kvs)
        });
        SYMBOL_MAP.get(s.into_usize()).copied().flatten()
      }
    }
  }
}

keywords! {
  If: "if", Elsif: "elsif", Then: "then", Else: "else", End: "end",
  Case: "case", When: "when", Of: "of", Otherwise: "otherwise", Where: "where",
  Try: "try", Catch: "catch", Repeat: "repeat", Until: "until", While: "while",
  For: "for", To: "to", Downto: "downto", Do: "do",
  Return: "return", Throw: "throw", Assert: "assert",
  Let: "let", Var: "var", Constant: "constant", Config: "config",
  Type: "type", Record: "record", Enumeration: "enumeration", Exception: "exception",
  Func: "func", Getter: "getter", Setter: "setter", Begin: "begin",
  With: "with", As: "as", Typeof: "typeof", Array: "array",
  And: "AND", Or: "OR", Xor: "XOR", Not: "NOT",
  Div: "DIV", Mod: "MOD", Divrm: "DIVRM", Quot: "QUOT", Rem: "REM",
  In: "IN", Unknown: "UNKNOWN", True: "TRUE", False: "FALSE",
  Builtin: "__builtin", Operator1: "__operator1", Operator2: "__operator2",
}

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
  /// An identifier.
  Ident(Symbol),
  /// A reserved word.
  Kw(Keyword),
  /// An unbounded integer literal.
  Int(BigInt),
  /// A sized integer literal `i<N>'d<digits>`.
  SizedInt(SInt),
  /// A bitvector literal.
  BitsLit(Bits),
  /// A mask literal containing `x` positions.
  MaskLit(Mask),
  /// A real literal, kept as written; there is no real-number runtime.
  Real(Box<str>),
  /// A string literal, with escapes already processed.
  StringLit(Box<str>),
  /// `(`
  LParen,
  /// `)`
  RParen,
  /// `[`
  LBrack,
  /// `]`
  RBrack,
  /// `{`
  LBrace,
  /// `}`
  RBrace,
  /// `,`
  Comma,
  /// `;`
  Semi,
  /// `:`
  Colon,
  /// `.`
  Dot,
  /// `..`
  DotDot,
  /// `=`
  Assign,
  /// `==`
  EqEq,
  /// `!=`
  Ne,
  /// `<`
  Lt,
  /// `<=`
  Le,
  /// `>`
  Gt,
  /// `>=`
  Ge,
  /// `+`
  Plus,
  /// `-`
  Minus,
  /// `*`
  Star,
  /// `^`
  Caret,
  /// `!`
  Bang,
  /// `?`
  Quest,
  /// `&&`
  AmpAmp,
  /// `||`
  BarBar,
  /// `=>`
  Arrow,
  /// `-->`
  LongArrow,
  /// `<->`
  IffArrow,
  /// `+:`
  PlusColon,
  /// `-:`
  MinusColon,
  /// `*:`
  StarColon,
  /// `++`
  PlusPlus,
  /// `<<`
  Shl,
  /// `>>`
  Shr,
  /// End of input.
  Eof,
}

/// The token stream for one source file, with collected warnings.
#[derive(Debug)]
pub struct TokenStream {
  /// The tokens, ending with [`Token::Eof`].
  pub tokens: Vec<Spanned<Token>>,
  /// Warnings produced while lexing.
  pub warnings: Vec<Spanned<String>>,
}

struct Lexer<'a> {
  src: &'a [u8],
  pos: usize,
  line: u32,
  col: u32,
  file: Symbol,
  out: Vec<Spanned<Token>>,
  warnings: Vec<Spanned<String>>,
}

/// Lex a whole source file.
pub fn lex(file: &str, src: &str) -> Result<TokenStream> {
  let mut lx = Lexer {
    src: src.as_bytes(),
    pos: 0,
    line: 1,
    col: 0,
    file: intern(file),
    out: vec![],
    warnings: vec![],
  };
  lx.run()?;
  Ok(TokenStream { tokens: lx.out, warnings: lx.warnings })
}

impl Lexer<'_> {
  fn here(&self) -> Position {
    Position { file: self.file, line: self.line, column: self.col }
  }

  fn peek(&self) -> Option<u8> { self.src.get(self.pos).copied() }
  fn peek2(&self) -> Option<u8> { self.src.get(self.pos + 1).copied() }

  fn bump(&mut self) -> Option<u8> {
    let c = self.peek()?;
    self.pos += 1;
    if c == b'\n' {
      self.line += 1;
      self.col = 0;
    } else {
      self.col += 1;
    }
    Some(c)
  }

  fn err(&self, msg: impl Into<String>) -> Error {
    Error::Parse(Loc::point(self.here()), msg.into())
  }

  fn push(&mut self, start: Position, tok: Token) {
    self.out.push(Spanned::new(Loc::Range(start, self.here()), tok))
  }

  fn run(&mut self) -> Result<()> {
    loop {
      self.skip_trivia()?;
      let start = self.here();
      let Some(c) = self.peek() else {
        self.push(start, Token::Eof);
        return Ok(())
      };
      match c {
        b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.lex_word(start)?,
        b'0'..=b'9' => self.lex_number(start)?,
        b'\'' => self.lex_quoted(start)?,
        b'"' => self.lex_string(start)?,
        _ => self.lex_punct(start)?,
      }
    }
  }

  fn skip_trivia(&mut self) -> Result<()> {
    loop {
      match (self.peek(), self.peek2()) {
        (Some(b' ' | b'\t' | b'\r' | b'\n'), _) => { self.bump(); }
        (Some(b'/'), Some(b'/')) => {
          while let Some(c) = self.peek() {
            if c == b'\n' { break }
            self.bump();
          }
        }
        (Some(b'/'), Some(b'*')) => {
          let open = self.here();
          self.bump(); self.bump();
          let mut depth = 1_u32;
          loop {
            match (self.peek(), self.peek2()) {
              (Some(b'/'), Some(b'*')) => { self.bump(); self.bump(); depth += 1 }
              (Some(b'*'), Some(b'/')) => {
                self.bump(); self.bump();
                depth -= 1;
                if depth == 0 { break }
              }
              (Some(_), _) => { self.bump(); }
              (None, _) => return Err(Error::Parse(
                Loc::point(open), "unterminated block comment".into())),
            }
          }
        }
        // A fence in column 0 comments out everything to the closing fence.
        (Some(b'`'), _) if self.col == 0 && self.src[self.pos..].starts_with(b"```") => {
          let open = self.here();
          self.bump(); self.bump(); self.bump();
          loop {
            match self.peek() {
              None => return Err(Error::Parse(
                Loc::point(open), "unterminated fenced block".into())),
              Some(b'`') if self.col == 0 && self.src[self.pos..].starts_with(b"```") => {
                self.bump(); self.bump(); self.bump();
                break
              }
              Some(_) => { self.bump(); }
            }
          }
        }
        _ => return Ok(()),
      }
    }
  }

  fn lex_word(&mut self, start: Position) -> Result<()> {
    let from = self.pos;
    while let Some(c) = self.peek() {
      if c.is_ascii_alphanumeric() || c == b'_' { self.bump(); } else { break }
    }
    let word = std::str::from_utf8(&self.src[from..self.pos]).expect("ascii word");
    // `i<N>'b...` / `i<N>'d...` / `i<N>'x...` sized integer literals
    if self.peek() == Some(b'\'') {
      if let Some(width) = word.strip_prefix('i').and_then(|w| w.parse::<u32>().ok()) {
        return self.lex_based(start, width, true)
      }
    }
    let sym = intern(word);
    match Keyword::from_symbol(sym) {
      Some(Keyword::If) => {
        // `else` immediately before `if` on the same line reads like a typo
        // for `elsif` and changes nesting, so flag it.
        if let Some(Spanned { span: Loc::Range(_, end), k: Token::Kw(Keyword::Else) }) =
          self.out.last()
        {
          if end.line == start.line {
            let w = Spanned::new(Loc::point(start),
              "`else if` on one line; did you mean `elsif`?".to_owned());
            tracing::warn!("{}: {}", w.span, w.k);
            self.warnings.push(w);
          }
        }
        self.push(start, Token::Kw(Keyword::If))
      }
      Some(kw) => self.push(start, Token::Kw(kw)),
      None => self.push(start, Token::Ident(sym)),
    }
    Ok(())
  }

  fn lex_digits(&mut self, radix: u32) -> Result<BigUint> {
    let from = self.pos;
    while let Some(c) = self.peek() {
      if c.is_ascii_alphanumeric() || c == b'_' { self.bump(); } else { break }
    }
    let text: String = std::str::from_utf8(&self.src[from..self.pos])
      .expect("ascii digits").chars().filter(|&c| c != '_').collect();
    if text.is_empty() { return Err(self.err("expected digits")) }
    BigUint::from_str_radix(&text, radix)
      .map_err(|_| self.err(format!("bad base-{radix} literal")))
  }

  fn lex_number(&mut self, start: Position) -> Result<()> {
    if self.peek() == Some(b'0') && matches!(self.peek2(), Some(b'x' | b'X')) {
      self.bump(); self.bump();
      let n = self.lex_digits(16)?;
      self.push(start, Token::Int(n.into()));
      return Ok(())
    }
    let n = self.lex_digits(10)?;
    match self.peek() {
      // `<N>'b...`: a based bitvector literal of explicit width
      Some(b'\'') if matches!(self.peek2(), Some(b'b' | b'd' | b'x')) => {
        let width = u32::try_from(&n).map_err(|_| self.err("literal width too large"))?;
        self.lex_based(start, width, false)
      }
      // `digits.digits`: a real literal (but `..` is a range)
      Some(b'.') if self.peek2().is_some_and(|c| c.is_ascii_digit()) => {
        self.bump();
        let frac = self.lex_digits(10)?;
        self.push(start, Token::Real(format!("{n}.{frac}").into_boxed_str()));
        Ok(())
      }
      _ => {
        self.push(start, Token::Int(n.into()));
        Ok(())
      }
    }
  }

  /// Lex the `'b…`/`'d…`/`'x…` tail of a sized literal of known width.
  fn lex_based(&mut self, start: Position, width: u32, signed: bool) -> Result<()> {
    self.bump();
    let radix = match self.bump() {
      Some(b'b') => 2,
      Some(b'd') => 10,
      Some(b'x') => 16,
      _ => return Err(self.err("expected `b`, `d`, or `x` after `'`")),
    };
    let n = self.lex_digits(radix)?;
    if signed {
      if !SInt::fits(width, &n.clone().into()) {
        return Err(self.err(format!("literal does not fit in i{width}")))
      }
      self.push(start, Token::SizedInt(SInt::wrap(width, n.into())))
    } else {
      if !n.is_zero() && n.bits() > u64::from(width) {
        return Err(self.err(format!("literal does not fit in bits({width})")))
      }
      self.push(start, Token::BitsLit(Bits { width, bits: n }))
    }
    Ok(())
  }

  /// Lex a quote-delimited bitvector `'1010 1100'` or mask `'10xx'`.
  fn lex_quoted(&mut self, start: Position) -> Result<()> {
    self.bump();
    let mut width = 0_u32;
    let mut bits = BigUint::zero();
    let mut care = BigUint::zero();
    let mut has_x = false;
    loop {
      match self.bump() {
        Some(b'\'') => break,
        Some(b' ') => {}
        Some(c @ (b'0' | b'1')) => {
          width += 1;
          bits = (bits << 1u32) | BigUint::from(u32::from(c - b'0'));
          care = (care << 1u32) | BigUint::from(1_u32);
        }
        Some(b'x') => {
          width += 1;
          has_x = true;
          bits <<= 1u32;
          care <<= 1u32;
        }
        _ => return Err(Error::Parse(Loc::point(start),
          "unterminated bitvector literal".into())),
      }
    }
    if has_x {
      self.push(start, Token::MaskLit(Mask { width, bits, care }))
    } else {
      self.push(start, Token::BitsLit(Bits { width, bits }))
    }
    Ok(())
  }

  fn lex_string(&mut self, start: Position) -> Result<()> {
    self.bump();
    let mut s = String::new();
    loop {
      match self.bump() {
        Some(b'"') => break,
        Some(b'\\') => match self.bump() {
          Some(b'n') => s.push('\n'),
          Some(b't') => s.push('\t'),
          Some(b'\\') => s.push('\\'),
          Some(b'"') => s.push('"'),
          Some(b'0') => s.push('\0'),
          _ => return Err(self.err("bad escape in string literal")),
        },
        Some(c) => s.push(c as char),
        None => return Err(Error::Parse(Loc::point(start),
          "unterminated string literal".into())),
      }
    }
    self.push(start, Token::StringLit(s.into_boxed_str()));
    Ok(())
  }

  fn lex_punct(&mut self, start: Position) -> Result<()> {
    let c = self.bump().expect("peeked");
    let two = |lx: &mut Self, tok| { lx.bump(); tok };
    let tok = match (c, self.peek()) {
      (b'(', _) => Token::LParen,
      (b')', _) => Token::RParen,
      (b'[', _) => Token::LBrack,
      (b']', _) => Token::RBrack,
      (b'{', _) => Token::LBrace,
      (b'}', _) => Token::RBrace,
      (b',', _) => Token::Comma,
      (b';', _) => Token::Semi,
      (b':', _) => Token::Colon,
      (b'.', Some(b'.')) => two(self, Token::DotDot),
      (b'.', _) => Token::Dot,
      (b'=', Some(b'=')) => two(self, Token::EqEq),
      (b'=', Some(b'>')) => two(self, Token::Arrow),
      (b'=', _) => Token::Assign,
      (b'!', Some(b'=')) => two(self, Token::Ne),
      (b'!', _) => Token::Bang,
      (b'<', Some(b'=')) => two(self, Token::Le),
      (b'<', Some(b'<')) => two(self, Token::Shl),
      (b'<', Some(b'-')) => {
        self.bump();
        if self.bump() != Some(b'>') { return Err(self.err("expected `<->`")) }
        Token::IffArrow
      }
      (b'<', _) => Token::Lt,
      (b'>', Some(b'=')) => two(self, Token::Ge),
      (b'>', Some(b'>')) => two(self, Token::Shr),
      (b'>', _) => Token::Gt,
      (b'+', Some(b':')) => two(self, Token::PlusColon),
      (b'+', Some(b'+')) => two(self, Token::PlusPlus),
      (b'+', _) => Token::Plus,
      (b'-', Some(b':')) => two(self, Token::MinusColon),
      (b'-', Some(b'-')) => {
        self.bump();
        if self.bump() != Some(b'>') { return Err(self.err("expected `-->`")) }
        Token::LongArrow
      }
      (b'-', _) => Token::Minus,
      (b'*', Some(b':')) => two(self, Token::StarColon),
      (b'*', _) => Token::Star,
      (b'^', _) => Token::Caret,
      (b'?', _) => Token::Quest,
      (b'&', Some(b'&')) => two(self, Token::AmpAmp),
      (b'|', Some(b'|')) => two(self, Token::BarBar),
      _ => return Err(self.err(format!("unexpected character `{}`", c as char))),
    };
    self.push(start, tok);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use num::BigInt;

  fn toks(src: &str) -> Vec<Token> {
    let ts = lex("test.asl", src).expect("lexes");
    ts.tokens.into_iter().map(|t| t.k).collect()
  }

  #[test]
  fn integers_with_separators() {
    assert_eq!(toks("1_000_000"), vec![Token::Int(BigInt::from(1_000_000)), Token::Eof]);
    assert_eq!(
      toks("0xFFFF_0000"),
      vec![Token::Int(BigInt::from(0xFFFF_0000_u32)), Token::Eof]
    );
  }

  #[test]
  fn sized_and_quoted_literals() {
    assert_eq!(
      toks("i8'd12"),
      vec![Token::SizedInt(SInt::wrap(8, BigInt::from(12))), Token::Eof]
    );
    assert_eq!(
      toks("4'xe"),
      vec![Token::BitsLit(Bits { width: 4, bits: 0xe_u32.into() }), Token::Eof]
    );
    assert_eq!(
      toks("'1010 1100'"),
      vec![Token::BitsLit(Bits { width: 8, bits: 0b1010_1100_u32.into() }), Token::Eof]
    );
    assert_eq!(
      toks("'10xx'"),
      vec![
        Token::MaskLit(Mask {
          width: 4,
          bits: 0b1000_u32.into(),
          care: 0b1100_u32.into(),
        }),
        Token::Eof
      ]
    );
  }

  #[test]
  fn punctuation_maximal_munch() {
    assert_eq!(
      toks("x[3 +: 2] <-> a --> b ++ c .. d"),
      vec![
        Token::Ident(intern("x")), Token::LBrack, Token::Int(3.into()),
        Token::PlusColon, Token::Int(2.into()), Token::RBrack,
        Token::IffArrow, Token::Ident(intern("a")), Token::LongArrow,
        Token::Ident(intern("b")), Token::PlusPlus, Token::Ident(intern("c")),
        Token::DotDot, Token::Ident(intern("d")), Token::Eof,
      ]
    );
  }

  #[test]
  fn real_vs_range() {
    assert_eq!(toks("1.5"), vec![Token::Real("1.5".into()), Token::Eof]);
    assert_eq!(
      toks("1..5"),
      vec![Token::Int(1.into()), Token::DotDot, Token::Int(5.into()), Token::Eof]
    );
  }

  #[test]
  fn comments_nest_and_fences_hide() {
    assert_eq!(toks("/* a /* b */ c */ 1"), vec![Token::Int(1.into()), Token::Eof]);
    assert_eq!(toks("// all gone\n2"), vec![Token::Int(2.into()), Token::Eof]);
    assert_eq!(toks("```\nnot code if x\n```\n3"), vec![Token::Int(3.into()), Token::Eof]);
  }

  #[test]
  fn else_if_same_line_warns() {
    let ts = lex("test.asl", "else if").expect("lexes");
    assert_eq!(ts.warnings.len(), 1);
    assert!(ts.warnings[0].k.contains("elsif"));
    let ts = lex("test.asl", "else\nif").expect("lexes");
    assert!(ts.warnings.is_empty(), "no warning across a line break");
  }

  #[test]
  fn keywords_and_identifiers() {
    assert_eq!(
      toks("DIVRM UNKNOWN divrm"),
      vec![
        Token::Kw(Keyword::Divrm), Token::Kw(Keyword::Unknown),
        Token::Ident(intern("divrm")), Token::Eof
      ]
    );
  }

  #[test]
  fn string_escapes() {
    assert_eq!(toks(r#""a\nb""#), vec![Token::StringLit("a\nb".into()), Token::Eof]);
  }

  #[test]
  fn oversized_literals_rejected() {
    assert!(lex("t", "4'x1F").is_err());
    assert!(lex("t", "i4'd100").is_err());
  }
}

//! The C-family emitter: lowered monomorphic AST to header and source
//! files, using the backend runtime's capability set for every primitive.
//!
//! One translation unit produces `<base>_types.h` (declarations in
//! dependency order), `<base>_exceptions.{h,c}` (the tagged union over all
//! exception records and its single process-wide instance),
//! `<base>_vars.{h,c}` (globals plus extern prototypes), and one or more
//! `<base>_funs[_i].c`. Exception control flow is label-based: `throw` sets
//! the tag and jumps to the innermost catch label; any call that may throw
//! is followed by a tag check that forwards to the same place.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use hashbrown::{HashMap, HashSet};
use itertools::Itertools;
use serde::Deserialize;
use crate::backend::{Backend, BitsOp, CmpOp, IntOp, Runtime, ShiftOp, runtime};
use crate::consteval::{NoConsts, fold_width};
use crate::error::{Error, Result};
use crate::symbol::Symbol;
use crate::mk_id;
use crate::types::ast::*;
use crate::types::entity::{Entity, GlobalEnv};
use crate::types::{Ident, IdxVec, Loc};
use crate::value::Value;

mk_id! {
  /// The position of an exception record in the session's tag enum; tag 0
  /// is `ASL_no_exception`, so record `i` emits as tag `i + 1`.
  TagId,
}

/// Emitter configuration, fed from the session's JSON configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EmitConfig {
  /// The runtime variant.
  pub backend: Backend,
  /// The `<base>` of every generated file name.
  pub basename: String,
  /// How many `_funs` files to split function definitions across.
  pub num_c_files: usize,
  /// Whether to precede statements with `#line` directives.
  pub line_info: bool,
  /// Functions exported with plain C-callable signatures, names unchanged.
  pub exports: Vec<String>,
  /// When set, globals are accessed through this thread-local pointer.
  pub thread_local_pointer: Option<String>,
}

impl Default for EmitConfig {
  fn default() -> Self {
    EmitConfig {
      backend: Backend::Fallback,
      basename: "asl".to_owned(),
      num_c_files: 1,
      line_info: false,
      exports: vec![],
      thread_local_pointer: None,
    }
  }
}

/// Words that may not appear as identifiers in the emitted C or C++.
const RESERVED: &[&str] = &[
  "auto", "bool", "break", "case", "catch", "char", "class", "const",
  "constexpr", "continue", "default", "delete", "do", "double", "else",
  "enum", "explicit", "export", "extern", "false", "float", "for", "friend",
  "goto", "if", "inline", "int", "long", "mutable", "namespace", "new",
  "noexcept", "operator", "private", "protected", "public", "register",
  "restrict", "return", "short", "signed", "sizeof", "static", "struct",
  "switch", "template", "this", "throw", "true", "try", "typedef", "typeid",
  "typename", "union", "unsigned", "using", "virtual", "void", "volatile",
  "while",
];

/// The identifier rename table: applied at print time, never to the AST.
#[derive(Debug, Default)]
struct Renames {
  map: HashMap<Ident, String>,
  taken: HashSet<String>,
}

impl Renames {
  /// Compute the stable C name for an identifier: dots from derived
  /// accessor names become underscores, overload tags attach only when a
  /// root name is shared, and reserved words take a prefix.
  fn add(&mut self, x: Ident, shared_root: bool) -> Result<()> {
    if self.map.contains_key(&x) { return Ok(()) }
    let mut base = x.name.as_str().replace('.', "_");
    if RESERVED.contains(&base.as_str()) {
      base = format!("__asl_{base}");
    }
    let name = if shared_root || (x.tag != 0 && self.taken.contains(&base)) {
      format!("{base}_{}", x.tag)
    } else {
      base
    };
    if !self.taken.insert(name.clone()) {
      return Err(Error::Internal(format!("emitted name `{name}` is not unique")))
    }
    self.map.insert(x, name);
    Ok(())
  }

  fn get(&self, x: Ident) -> String {
    match self.map.get(&x) {
      Some(s) => s.clone(),
      None => {
        // Locals and temporaries rename on the fly with the same scheme.
        let base = x.name.as_str().replace('.', "_");
        let base = if RESERVED.contains(&base.as_str()) {
          format!("__asl_{base}")
        } else {
          base
        };
        if x.tag == 0 { base } else { format!("{base}_{}", x.tag) }
      }
    }
  }
}

/// An indented text sink for one output file.
#[derive(Default)]
struct CodeBuf {
  text: String,
  indent: usize,
}

impl CodeBuf {
  fn line(&mut self, s: impl AsRef<str>) {
    for _ in 0..self.indent { self.text.push_str("    ") }
    self.text.push_str(s.as_ref());
    self.text.push('\n');
  }
  fn blank(&mut self) { self.text.push('\n') }
  fn open(&mut self, s: impl AsRef<str>) {
    self.line(s);
    self.indent += 1;
  }
  fn close(&mut self, s: impl AsRef<str>) {
    self.indent -= 1;
    self.line(s);
  }
}

/// The C-family emitter for one translation unit.
pub struct Emitter<'a> {
  env: &'a GlobalEnv,
  rt: Box<dyn Runtime>,
  config: EmitConfig,
  names: Renames,
  /// Exception record names, in declaration order.
  exceptions: IdxVec<TagId, Ident>,
  /// The innermost catch labels of the function being emitted.
  catch_labels: Vec<String>,
  label_supply: u32,
  /// The return type of the function being emitted, for propagation exits.
  fn_rty: Option<Type>,
}

impl<'a> Emitter<'a> {
  /// An emitter over a checked environment with the given configuration.
  pub fn new(env: &'a GlobalEnv, config: EmitConfig) -> Self {
    Emitter {
      env,
      rt: runtime(config.backend),
      config,
      names: Renames::default(),
      exceptions: IdxVec::default(),
      catch_labels: vec![],
      label_supply: 0,
      fn_rty: None,
    }
  }

  /// Emit the whole program into `out_dir`, returning the files written.
  pub fn emit_all(&mut self, decls: &[Decl], out_dir: &Path) -> Result<Vec<PathBuf>> {
    self.build_renames(decls)?;
    self.exceptions = IdxVec::default();
    for d in decls {
      if let DeclKind::Exception(name, _) = &d.k {
        self.exceptions.push(*name);
      }
    }

    let base = self.config.basename.clone();
    let mut files = vec![];
    let mut put = |name: String, text: String| -> Result<PathBuf> {
      let path = out_dir.join(name);
      write_file(&path, &text)?;
      Ok(path)
    };

    files.push(put(format!("{base}_types.h"), self.types_header(decls)?)?);
    files.push(put(format!("{base}_exceptions.h"), self.exceptions_header(decls)?)?);
    files.push(put(format!("{base}_exceptions.c"), self.exceptions_source())?);
    files.push(put(format!("{base}_vars.h"), self.vars_header(decls)?)?);
    files.push(put(format!("{base}_vars.c"), self.vars_source(decls)?)?);

    let funs: Vec<&Decl> = decls.iter()
      .filter(|d| matches!(d.k, DeclKind::FunDefn(..)))
      .collect();
    let chunks = self.config.num_c_files.max(1).min(funs.len().max(1));
    let per = funs.len().div_ceil(chunks);
    for (i, chunk) in funs.chunks(per.max(1)).enumerate() {
      let name = if chunks == 1 {
        format!("{base}_funs.c")
      } else {
        format!("{base}_funs_{i}.c")
      };
      let ffi = if i == 0 { Some(decls) } else { None };
      files.push(put(name, self.funs_source(chunk, ffi)?)?);
    }
    Ok(files)
  }

  fn build_renames(&mut self, decls: &[Decl]) -> Result<()> {
    // Count overloads per root so only genuinely shared roots get tags.
    let mut roots: HashMap<Symbol, u32> = HashMap::new();
    for d in decls {
      if let DeclKind::FunDefn(sig, _) | DeclKind::FunType(sig) = &d.k {
        *roots.entry(sig.name.name).or_default() += 1;
      }
    }
    for d in decls {
      match &d.k {
        DeclKind::FunDefn(sig, _) | DeclKind::FunType(sig) | DeclKind::BuiltinFunc(sig) => {
          let shared = roots.get(&sig.name.name).copied().unwrap_or(0) > 1;
          self.names.add(sig.name, shared)?;
        }
        DeclKind::Record(name, ..) | DeclKind::Exception(name, _) |
        DeclKind::Enum(name, _) | DeclKind::TypeAbbrev(name, ..) =>
          self.names.add(*name, false)?,
        DeclKind::Var(_, name) | DeclKind::Const(_, name, _) |
        DeclKind::Config(_, name, _) => self.names.add(*name, false)?,
        _ => {}
      }
      if let DeclKind::Enum(_, members) = &d.k {
        for &m in members { self.names.add(m, false)? }
      }
    }
    Ok(())
  }

  fn guard(&self, buf: &mut CodeBuf, tag: &str) {
    let base = self.config.basename.to_uppercase();
    buf.line(format!("#ifndef {base}_{tag}_H"));
    buf.line(format!("#define {base}_{tag}_H"));
    buf.blank();
  }

  // ------------------------------------------------------------- types.h

  fn types_header(&mut self, decls: &[Decl]) -> Result<String> {
    let mut buf = CodeBuf::default();
    self.guard(&mut buf, "TYPES");
    buf.text.push_str(&self.rt.file_header());
    buf.blank();
    for d in self.topo_types(decls) {
      match &d.k {
        DeclKind::Enum(name, members) => {
          let members = members.iter().map(|m| self.names.get(*m)).join(", ");
          buf.line(format!("typedef enum {{ {members} }} {};", self.names.get(*name)));
        }
        DeclKind::Record(name, _, fields) => {
          buf.open("typedef struct {");
          for (f, ty) in fields {
            let (t, suffix) = self.c_ty(ty)?;
            buf.line(format!("{t} {}{suffix};", self.names.get(*f)));
          }
          buf.close(format!("}} {};", self.names.get(*name)));
        }
        DeclKind::TypeAbbrev(name, params, ty) if params.is_empty() => {
          let (t, suffix) = self.c_ty(ty)?;
          buf.line(format!("typedef {t} {}{suffix};", self.names.get(*name)));
        }
        _ => {}
      }
      buf.blank();
    }
    buf.line("#endif");
    Ok(buf.text)
  }

  /// Type declarations ordered so every dependency precedes its users.
  fn topo_types<'d>(&self, decls: &'d [Decl]) -> Vec<&'d Decl> {
    let mut by_name: HashMap<Symbol, &Decl> = HashMap::new();
    for d in decls {
      match &d.k {
        DeclKind::Enum(name, _) | DeclKind::Record(name, ..) |
        DeclKind::TypeAbbrev(name, ..) => { by_name.insert(name.name, d); }
        _ => {}
      }
    }
    let mut out = vec![];
    let mut done: HashSet<Symbol> = HashSet::new();
    fn visit<'d>(
      sym: Symbol, by_name: &HashMap<Symbol, &'d Decl>,
      done: &mut HashSet<Symbol>, out: &mut Vec<&'d Decl>,
    ) {
      if !done.insert(sym) { return }
      let Some(d) = by_name.get(&sym) else { return };
      let deps: Vec<Symbol> = match &d.k {
        DeclKind::Record(_, _, fields) =>
          fields.iter().filter_map(|(_, t)| named_ty(t)).collect(),
        DeclKind::TypeAbbrev(_, _, t) => named_ty(t).into_iter().collect(),
        _ => vec![],
      };
      for dep in deps { visit(dep, by_name, done, out) }
      out.push(d);
    }
    for d in decls {
      if let Some(name) = d.k.name() {
        if by_name.contains_key(&name.name) {
          visit(name.name, &by_name, &mut done, &mut out);
        }
      }
    }
    out
  }

  // --------------------------------------------------- exceptions.{h,c}

  fn exceptions_header(&mut self, decls: &[Decl]) -> Result<String> {
    let mut buf = CodeBuf::default();
    self.guard(&mut buf, "EXCEPTIONS");
    buf.line(format!("#include \"{}_types.h\"", self.config.basename));
    buf.blank();
    let tags = self.exceptions.iter()
      .map(|e| format!("tag_{}", self.names.get(*e)))
      .join(", ");
    if tags.is_empty() {
      buf.line("typedef enum { ASL_no_exception } ASL_exception_tag;");
    } else {
      buf.line(format!("typedef enum {{ ASL_no_exception, {tags} }} ASL_exception_tag;"));
    }
    buf.blank();
    for d in decls {
      if let DeclKind::Exception(name, fields) = &d.k {
        buf.open("typedef struct {");
        for (f, ty) in fields {
          let (t, suffix) = self.c_ty(ty)?;
          buf.line(format!("{t} {}{suffix};", self.names.get(*f)));
        }
        buf.close(format!("}} {};", self.names.get(*name)));
        buf.blank();
      }
    }
    if self.exceptions.is_empty() {
      buf.line("typedef struct { int _unused; } ASL_exception_payload;");
    } else {
      buf.open("typedef union {");
      for (_, e) in self.exceptions.enum_iter() {
        let n = self.names.get(*e);
        buf.line(format!("{n} _{n};"));
      }
      buf.close("} ASL_exception_payload;");
    }
    buf.blank();
    buf.line("typedef struct { ASL_exception_tag tag; ASL_exception_payload u; } ASL_exception_t;");
    buf.line("extern ASL_exception_t ASL_exception;");
    buf.blank();
    buf.line("#endif");
    Ok(buf.text)
  }

  fn exceptions_source(&mut self) -> String {
    let mut buf = CodeBuf::default();
    buf.line(format!("#include \"{}_exceptions.h\"", self.config.basename));
    buf.blank();
    buf.line("ASL_exception_t ASL_exception = { .tag = ASL_no_exception };");
    buf.text
  }

  // --------------------------------------------------------- vars.{h,c}

  fn vars_header(&mut self, decls: &[Decl]) -> Result<String> {
    let mut buf = CodeBuf::default();
    self.guard(&mut buf, "VARS");
    buf.line(format!("#include \"{}_types.h\"", self.config.basename));
    buf.line(format!("#include \"{}_exceptions.h\"", self.config.basename));
    buf.blank();
    if let Some(ptr) = self.config.thread_local_pointer.clone() {
      // Wrapped mode: the mutable globals live in one state struct reached
      // through a thread-local pointer, so several simulator instances can
      // share the compiled image.
      buf.open(format!("typedef struct {}_state {{", self.config.basename));
      for d in decls {
        if let DeclKind::Var(ty, name) | DeclKind::Config(ty, name, _) = &d.k {
          let (t, suffix) = self.c_ty(ty)?;
          buf.line(format!("{t} {}{suffix};", self.names.get(*name)));
        }
      }
      buf.close(format!("}} {}_state;", self.config.basename));
      buf.line(format!("extern _Thread_local {}_state *{ptr};", self.config.basename));
    } else {
      for d in decls {
        if let DeclKind::Var(ty, name) | DeclKind::Config(ty, name, _) = &d.k {
          let (t, suffix) = self.c_ty(ty)?;
          buf.line(format!("extern {t} {}{suffix};", self.names.get(*name)));
        }
      }
    }
    for d in decls {
      if let DeclKind::Const(ty, name, _) = &d.k {
        let (t, suffix) = self.c_ty(ty)?;
        buf.line(format!("extern const {t} {}{suffix};", self.names.get(*name)));
      }
    }
    buf.blank();
    for d in decls {
      if let DeclKind::FunDefn(sig, _) | DeclKind::FunType(sig) = &d.k {
        buf.line(format!("{};", self.signature(sig)?));
      }
    }
    buf.blank();
    buf.line("#endif");
    Ok(buf.text)
  }

  fn vars_source(&mut self, decls: &[Decl]) -> Result<String> {
    let mut buf = CodeBuf::default();
    buf.line(format!("#include \"{}_vars.h\"", self.config.basename));
    buf.blank();
    if let Some(ptr) = self.config.thread_local_pointer.clone() {
      buf.line(format!("_Thread_local {}_state *{ptr};", self.config.basename));
    } else {
      for d in decls {
        match &d.k {
          DeclKind::Var(ty, name) => {
            let (t, suffix) = self.c_ty(ty)?;
            buf.line(format!("{t} {}{suffix};", self.names.get(*name)));
          }
          DeclKind::Config(ty, name, init) => {
            let (t, suffix) = self.c_ty(ty)?;
            let v = self.expr(init)?;
            buf.line(format!("{t} {}{suffix} = {v};", self.names.get(*name)));
          }
          _ => {}
        }
      }
    }
    for d in decls {
      if let DeclKind::Const(ty, name, init) = &d.k {
        let (t, suffix) = self.c_ty(ty)?;
        let v = self.expr(init)?;
        buf.line(format!("const {t} {}{suffix} = {v};", self.names.get(*name)));
      }
    }
    Ok(buf.text)
  }

  // -------------------------------------------------------- funs[_i].c

  fn funs_source(&mut self, funs: &[&Decl], ffi_decls: Option<&[Decl]>) -> Result<String> {
    let mut buf = CodeBuf::default();
    buf.line(format!("#include \"{}_vars.h\"", self.config.basename));
    buf.blank();
    for d in funs {
      let DeclKind::FunDefn(sig, body) = &d.k else { continue };
      self.fn_rty = sig.rty.clone();
      self.label_supply = 0;
      self.catch_labels.clear();
      buf.open(format!("{} {{", self.signature(sig)?));
      for s in body { self.stmt(&mut buf, s)? }
      buf.close("}");
      buf.blank();
      self.fn_rty = None;
    }
    if let Some(decls) = ffi_decls {
      self.ffi_exports(&mut buf, decls)?;
    }
    Ok(buf.text)
  }

  /// Exported functions appear under their unchanged names with plain C
  /// signatures and delegate to the renamed entry.
  fn ffi_exports(&mut self, buf: &mut CodeBuf, decls: &[Decl]) -> Result<()> {
    for export in &self.config.exports.clone() {
      let Some(sig) = decls.iter().find_map(|d| match &d.k {
        DeclKind::FunDefn(sig, _) if sig.name.name.as_str() == export => Some(sig),
        _ => None,
      }) else {
        tracing::warn!("export `{export}` has no definition");
        continue
      };
      let mut params = vec![];
      let mut args = vec![];
      let mut ok = true;
      for a in &sig.args {
        let n = self.names.get(a.name);
        match ffi_c_ty(&a.ty) {
          Some(FfiKind::Int) => {
            params.push(format!("int64_t {n}"));
            args.push(self.rt.ffi_c_to_int(&n));
          }
          Some(FfiKind::Direct(t)) => {
            params.push(format!("{t} {n}"));
            args.push(n);
          }
          None => {
            tracing::warn!("export `{export}`: argument `{n}` is not C-callable");
            ok = false;
            break
          }
        }
      }
      if !ok { continue }
      let call = format!("{}({})", self.names.get(sig.name), args.join(", "));
      let params = if params.is_empty() { "void".to_owned() } else { params.join(", ") };
      match sig.rty.as_ref().map(ffi_c_ty) {
        None => {
          buf.open(format!("void {export}({params}) {{"));
          buf.line(format!("{call};"));
          buf.close("}");
        }
        Some(Some(FfiKind::Int)) => {
          buf.open(format!("int64_t {export}({params}) {{"));
          buf.line(format!("return {};", self.rt.ffi_int_to_c(&call)));
          buf.close("}");
        }
        Some(Some(FfiKind::Direct(t))) => {
          buf.open(format!("{t} {export}({params}) {{"));
          buf.line(format!("return {call};"));
          buf.close("}");
        }
        Some(None) => {
          tracing::warn!("export `{export}`: return type is not C-callable");
          continue
        }
      }
      buf.blank();
    }
    Ok(())
  }

  // --------------------------------------------------------------- types

  /// The C type of an AST type, plus a declarator suffix for arrays.
  fn c_ty(&self, ty: &Type) -> Result<(String, String)> {
    Ok(match ty {
      Type::Integer(_) => (self.rt.ty_int(), String::new()),
      Type::Bits(w, _) => {
        let n = self.width(w)?;
        (self.rt.ty_bits(n), String::new())
      }
      Type::Constructor(name, args) => match name.name.as_str() {
        "boolean" => ("bool".to_owned(), String::new()),
        "string" => ("const char*".to_owned(), String::new()),
        "__sint" => {
          let n = args.first()
            .and_then(|e| fold_width(e, &NoConsts))
            .ok_or_else(|| Error::Unimplemented(Loc::Unknown,
              "symbolic bounded-integer width".into()))?;
          (self.rt.ty_sint(n), String::new())
        }
        "__RAM" => (self.rt.ty_ram(), String::new()),
        _ => (self.names.get(*name), String::new()),
      },
      Type::Forward(name) => (self.names.get(*name), String::new()),
      Type::Array(ix, ety) => {
        let (t, suffix) = self.c_ty(ety)?;
        let size = match &**ix {
          IxType::Int(n) => self.width(n)?.to_string(),
          IxType::Enum(e) => {
            let crate::types::entity::TypeTc::Enum(ms) =
              &self.env.types.get(&e.name)
                .ok_or(Error::UnknownObject(Loc::Unknown, "type", *e))?.k
            else {
              return Err(Error::IsNotA(Loc::Unknown, *e, "enumeration"))
            };
            ms.len().to_string()
          }
        };
        (t, format!("[{size}]{suffix}"))
      }
      Type::Tuple(ts) if ts.is_empty() => ("void".to_owned(), String::new()),
      Type::Tuple(_) | Type::OfExpr(_) => {
        return Err(Error::Unimplemented(Loc::Unknown, format!("emit type `{ty}`")))
      }
    })
  }

  fn signature(&self, sig: &FunSig) -> Result<String> {
    let ret = match &sig.rty {
      None => "void".to_owned(),
      Some(t) => {
        let (t, suffix) = self.c_ty(t)?;
        if !suffix.is_empty() {
          return Err(Error::Unimplemented(Loc::Unknown, "array return type".into()))
        }
        t
      }
    };
    let args = if sig.args.is_empty() {
      "void".to_owned()
    } else {
      sig.args.iter().map(|a| {
        let (t, suffix) = self.c_ty(&a.ty)?;
        Ok(format!("{t} {}{suffix}", self.names.get(a.name)))
      }).collect::<Result<Vec<_>>>()?.join(", ")
    };
    Ok(format!("{ret} {}({args})", self.names.get(sig.name)))
  }

  fn width(&self, e: &Expr) -> Result<u32> {
    fold_width(e, &NoConsts).ok_or_else(|| {
      Error::Unimplemented(e.span, format!("symbolic width `{e}` at emission"))
    })
  }

  // --------------------------------------------------------- expressions

  fn expr(&self, e: &Expr) -> Result<String> {
    match &e.k {
      ExprKind::Lit(v) => self.literal(v),
      ExprKind::Var(x) => Ok(self.global_access(*x)),
      ExprKind::Field(b, f) => {
        let sep = if self.is_tls_ptr_expr(b) { "->" } else { "." };
        let b = self.expr(b)?;
        Ok(format!("{b}{sep}{}", self.names.get(*f)))
      }
      ExprKind::Index(a, i) => {
        let a = self.expr(a)?;
        let i = self.index_expr(i)?;
        Ok(format!("{a}[{i}]"))
      }
      ExprKind::Record(name, _, fields) => {
        let t = self.names.get(*name);
        let fields = fields.iter().map(|(f, v)| {
          Ok(format!(".{} = {}", self.names.get(*f), self.expr(v)?))
        }).collect::<Result<Vec<_>>>()?.join(", ");
        Ok(format!("(({t}){{ {fields} }})"))
      }
      ExprKind::If(arms, els) => {
        let mut out = String::new();
        for (c, t) in arms {
          let _ = write!(out, "({}) ? ({}) : ", self.expr(c)?, self.expr(t)?);
        }
        let _ = write!(out, "({})", self.expr(els)?);
        Ok(format!("({out})"))
      }
      ExprKind::Binop(op, a, b) => {
        let a = self.expr(a)?;
        let b = self.expr(b)?;
        Ok(match op {
          Binop::BoolAnd => format!("({a} && {b})"),
          Binop::BoolOr => format!("({a} || {b})"),
          Binop::Implies => format!("(!({a}) || {b})"),
          Binop::Iff => format!("({a} == {b})"),
          _ => return Err(Error::Unimplemented(e.span,
            format!("unresolved operator `{op}` at emission"))),
        })
      }
      ExprKind::Unknown(ty) => self.default_value(ty),
      ExprKind::TApply(f, params, args, _) => self.apply(e.span, *f, params, args),
      ExprKind::Concat(ws, es) => {
        // Fold into nested appends, high part first.
        let mut widths = vec![];
        for w in ws { widths.push(self.width(w)?) }
        let mut parts = vec![];
        for p in es { parts.push(self.expr(p)?) }
        let mut acc = parts.pop()
          .ok_or(Error::Unimplemented(e.span, "empty concatenation".into()))?;
        let mut acc_w = *widths.last().expect("same length");
        for i in (0..parts.len()).rev() {
          acc = self.rt.bits_concat(widths[i], acc_w, &parts[i], &acc);
          acc_w += widths[i];
        }
        Ok(acc)
      }
      _ => Err(Error::Unimplemented(e.span, format!("emit expression `{e}`"))),
    }
  }

  /// Indices print as plain C integers.
  fn index_expr(&self, e: &Expr) -> Result<String> {
    match &e.k {
      ExprKind::Lit(Value::Int(n)) => Ok(n.to_string()),
      // Enumeration members are C enum constants already.
      ExprKind::Var(x)
        if matches!(self.env.globals.get(&x.name), Some(Entity::EnumMember(..))) =>
        Ok(self.names.get(*x)),
      _ => {
        let s = self.expr(e)?;
        Ok(self.rt.ffi_int_to_c(&s))
      }
    }
  }

  fn is_tls_ptr_expr(&self, e: &Expr) -> bool {
    match (&e.k, &self.config.thread_local_pointer) {
      (ExprKind::Var(x), Some(ptr)) => x.name.as_str() == ptr,
      _ => false,
    }
  }

  fn global_access(&self, x: Ident) -> String {
    if let Some(ptr) = &self.config.thread_local_pointer {
      if x.name.as_str() == ptr {
        return ptr.clone()
      }
    }
    self.names.get(x)
  }

  fn literal(&self, v: &Value) -> Result<String> {
    Ok(match v {
      Value::Int(n) => self.rt.lit_int(n),
      Value::SInt(s) => self.rt.lit_sint(s),
      Value::Bits(b) => self.rt.lit_bits(b),
      Value::Bool(b) => if *b { "true".to_owned() } else { "false".to_owned() },
      Value::String(s) => format!("{s:?}"),
      Value::Enum(m, _) => self.names.get(*m),
      Value::Mask(_) | Value::Tuple(_) | Value::Array(_) | Value::Record(_) =>
        return Err(Error::Unimplemented(Loc::Unknown, format!("emit literal `{v}`"))),
    })
  }

  fn default_value(&self, ty: &Type) -> Result<String> {
    Ok(match ty {
      Type::Integer(_) => self.rt.lit_int(&num::BigInt::from(0)),
      Type::Bits(w, _) => self.rt.bits_zeros(self.width(w)?),
      Type::Constructor(name, _) => match name.name.as_str() {
        "boolean" => "false".to_owned(),
        "string" => "\"\"".to_owned(),
        "__sint" => "0".to_owned(),
        _ => format!("(({}){{0}})", self.names.get(*name)),
      },
      Type::Forward(name) => format!("(({}){{0}})", self.names.get(*name)),
      _ => return Err(Error::Unimplemented(Loc::Unknown,
        format!("default value for `{ty}`"))),
    })
  }

  /// One resolved call: primitives dispatch to the runtime capability set,
  /// everything else is a plain C call.
  fn apply(&self, span: Loc, f: Ident, params: &[Expr], args: &[Expr]) -> Result<String> {
    let p = |i: usize| -> Result<u32> {
      self.width(params.get(i).ok_or_else(|| Error::Internal(
        format!("missing width parameter {i} on `{f}`")))?)
    };
    let a = |i: usize| -> Result<String> {
      self.expr(args.get(i).ok_or_else(|| Error::Internal(
        format!("missing argument {i} on `{f}`")))?)
    };
    let rt = &self.rt;
    let name = f.name.as_str();

    // sintN operations carry their width as the leading parameter.
    if let Some(rest) = name.strip_suffix("_sintN") {
      return self.apply_sint(span, rest, &p, &a)
    }

    let int_binops: &[(&str, IntOp)] = &[
      ("add_int", IntOp::Add), ("sub_int", IntOp::Sub), ("mul_int", IntOp::Mul),
      ("exact_div_int", IntOp::ExactDiv), ("fdiv_int", IntOp::Fdiv),
      ("frem_int", IntOp::Frem), ("zdiv_int", IntOp::Zdiv), ("zrem_int", IntOp::Zrem),
      ("shl_int", IntOp::Shl), ("shr_int", IntOp::Shr), ("align_int", IntOp::Align),
      ("mod_pow2_int", IntOp::ModPow2), ("pow_int", IntOp::Pow),
      ("min_int", IntOp::Min), ("max_int", IntOp::Max),
      ("Min", IntOp::Min), ("Max", IntOp::Max),
    ];
    if let Some((_, op)) = int_binops.iter().find(|(n, _)| *n == name) {
      return Ok(rt.int_binop(*op, &a(0)?, &a(1)?))
    }
    let int_cmps: &[(&str, CmpOp)] = &[
      ("eq_int", CmpOp::Eq), ("ne_int", CmpOp::Ne), ("lt_int", CmpOp::Lt),
      ("le_int", CmpOp::Le), ("gt_int", CmpOp::Gt), ("ge_int", CmpOp::Ge),
    ];
    if let Some((_, op)) = int_cmps.iter().find(|(n, _)| *n == name) {
      return Ok(rt.int_cmp(*op, &a(0)?, &a(1)?))
    }
    let bits_binops: &[(&str, BitsOp)] = &[
      ("add_bits", BitsOp::Add), ("sub_bits", BitsOp::Sub),
      ("and_bits", BitsOp::And), ("or_bits", BitsOp::Or), ("eor_bits", BitsOp::Eor),
    ];
    if let Some((_, op)) = bits_binops.iter().find(|(n, _)| *n == name) {
      return Ok(rt.bits_binop(*op, p(0)?, &a(0)?, &a(1)?))
    }
    let shifts: &[(&str, ShiftOp)] = &[
      ("lsl_bits", ShiftOp::Lsl), ("lsr_bits", ShiftOp::Lsr), ("asr_bits", ShiftOp::Asr),
    ];
    if let Some((_, op)) = shifts.iter().find(|(n, _)| *n == name) {
      let d = self.index_expr(&args[1])?;
      return Ok(rt.bits_shift(*op, p(0)?, &a(0)?, &d))
    }

    match name {
      "neg_int" => Ok(rt.int_neg(&a(0)?)),
      "pow2_int" => Ok(rt.int_pow2(&a(0)?)),
      "is_pow2_int" => Ok(rt.int_is_pow2(&a(0)?)),
      "Abs" => {
        let x = a(0)?;
        Ok(rt.int_binop(IntOp::Max, &x, &rt.int_neg(&x)))
      }
      "not_bool" => Ok(format!("(!{})", a(0)?)),
      "eq_bool" | "iff_bool" => Ok(format!("({} == {})", a(0)?, a(1)?)),
      "ne_bool" => Ok(format!("({} != {})", a(0)?, a(1)?)),
      "and_bool" => Ok(format!("({} && {})", a(0)?, a(1)?)),
      "or_bool" => Ok(format!("({} || {})", a(0)?, a(1)?)),
      "implies_bool" => Ok(format!("(!({}) || {})", a(0)?, a(1)?)),
      "not_bits" => Ok(rt.bits_not(p(0)?, &a(0)?)),
      "eq_bits" => Ok(rt.bits_cmp(CmpOp::Eq, p(0)?, &a(0)?, &a(1)?)),
      "ne_bits" => Ok(rt.bits_cmp(CmpOp::Ne, p(0)?, &a(0)?, &a(1)?)),
      "append_bits" => Ok(rt.bits_concat(p(0)?, p(1)?, &a(0)?, &a(1)?)),
      "replicate_bits" | "Replicate" => {
        let count = self.width(&args[1])?;
        Ok(rt.bits_replicate(p(0)?, count, &a(0)?))
      }
      "zeros_bits" | "Zeros" => Ok(rt.bits_zeros(self.width(&args[0])?)),
      "ones_bits" | "Ones" => Ok(rt.bits_ones(self.width(&args[0])?)),
      "IsZero" => {
        let n = p(0)?;
        Ok(rt.bits_cmp(CmpOp::Eq, n, &a(0)?, &rt.bits_zeros(n)))
      }
      "IsOnes" => {
        let n = p(0)?;
        Ok(rt.bits_cmp(CmpOp::Eq, n, &a(0)?, &rt.bits_ones(n)))
      }
      "ZeroExtend" => Ok(rt.bits_zero_extend(p(0)?, self.width(&args[1])?, &a(0)?)),
      "SignExtend" => Ok(rt.bits_sign_extend(p(0)?, self.width(&args[1])?, &a(0)?)),
      "cvt_bits_uint" | "UInt" => Ok(rt.cvt_bits_uint(p(0)?, &a(0)?)),
      "cvt_bits_sint" | "SInt" => Ok(rt.cvt_bits_sint(p(0)?, &a(0)?)),
      "cvt_int_bits" => Ok(rt.cvt_int_bits(self.width(&args[1])?, &a(0)?)),
      "cvt_sintN_int" => Ok(rt.cvt_sint_int(p(0)?, &a(0)?)),
      "get_slice" => {
        let lo = self.index_expr(&args[1])?;
        Ok(rt.get_slice(p(0)?, p(1)?, &a(0)?, &lo))
      }
      "set_slice" => {
        let lo = self.index_expr(&args[1])?;
        Ok(rt.set_slice(p(0)?, p(1)?, &a(0)?, &lo, &a(3)?))
      }
      "in_mask" | "notin_mask" => {
        let ExprKind::Lit(Value::Mask(m)) = &args[1].k else {
          return Err(Error::Unimplemented(span, "computed mask operand".into()))
        };
        let test = rt.bits_in_mask(p(0)?, &a(0)?,
          &num::BigInt::from(m.bits.clone()), &num::BigInt::from(m.care.clone()));
        Ok(if name == "in_mask" { test } else { format!("(!{test})") })
      }
      "eq_str" => Ok(format!("(strcmp({}, {}) == 0)", a(0)?, a(1)?)),
      "ne_str" => Ok(format!("(strcmp({}, {}) != 0)", a(0)?, a(1)?)),
      "__RAM_init" => Ok(rt.ram_init(p(0)?, &a(0)?, &a(1)?)),
      "__RAM_read" => {
        let n = self.width(&args[2])?;
        Ok(rt.ram_read(p(0)?, n, &a(0)?, &a(1)?))
      }
      "__RAM_write" => {
        let n = self.width(&args[2])?;
        Ok(rt.ram_write(p(0)?, n, &a(0)?, &a(1)?, &a(3)?))
      }
      "print_str" => Ok(rt.print_str(&a(0)?)),
      "print_char" => Ok(rt.print_char(&self.index_expr(&args[0])?)),
      "print_int_dec" => Ok(rt.print_int_dec(&a(0)?)),
      "print_int_hex" => Ok(rt.print_int_hex(&a(0)?)),
      "print_bits_hex" => Ok(rt.print_bits_hex(p(0)?, &a(0)?)),
      "println" => Ok("ASL_println()".to_owned()),
      "asl_error_unmatched_case" => Ok(format!("ASL_error_unmatched_case({})", a(0)?)),
      "asl_assertion_failure" => Ok(format!("ASL_assertion_failure({})", a(0)?)),
      _ if name.starts_with("eq_enum_") =>
        Ok(format!("({} == {})", a(0)?, a(1)?)),
      _ if name.starts_with("ne_enum_") =>
        Ok(format!("({} != {})", a(0)?, a(1)?)),
      _ => {
        // A user function; widths were already specialised away.
        let args = args.iter().map(|x| self.expr(x)).collect::<Result<Vec<_>>>()?;
        Ok(format!("{}({})", self.names.get(f), args.join(", ")))
      }
    }
  }

  fn apply_sint(
    &self, span: Loc, rest: &str,
    p: &dyn Fn(usize) -> Result<u32>, a: &dyn Fn(usize) -> Result<String>,
  ) -> Result<String> {
    let rt = &self.rt;
    let ops: &[(&str, IntOp)] = &[
      ("add", IntOp::Add), ("sub", IntOp::Sub), ("mul", IntOp::Mul),
      ("exact_div", IntOp::ExactDiv), ("fdiv", IntOp::Fdiv), ("frem", IntOp::Frem),
      ("zdiv", IntOp::Zdiv), ("zrem", IntOp::Zrem), ("align", IntOp::Align),
      ("min", IntOp::Min), ("max", IntOp::Max),
      ("shl", IntOp::Shl), ("shr", IntOp::Shr),
    ];
    if let Some((_, op)) = ops.iter().find(|(n, _)| *n == rest) {
      return Ok(rt.sint_binop(*op, p(0)?, &a(0)?, &a(1)?))
    }
    let cmps: &[(&str, CmpOp)] = &[
      ("eq", CmpOp::Eq), ("ne", CmpOp::Ne), ("lt", CmpOp::Lt),
      ("le", CmpOp::Le), ("gt", CmpOp::Gt), ("ge", CmpOp::Ge),
    ];
    if let Some((_, op)) = cmps.iter().find(|(n, _)| *n == rest) {
      return Ok(rt.sint_cmp(*op, p(0)?, &a(0)?, &a(1)?))
    }
    match rest {
      "neg" => Ok(rt.sint_neg(p(0)?, &a(0)?)),
      "resize" => Ok(rt.sint_resize(p(0)?, p(1)?, &a(0)?)),
      "cvt_int" => Ok(rt.cvt_int_sint(p(0)?, &a(0)?)),
      _ => Err(Error::Unimplemented(span, format!("bounded operation `{rest}_sintN`"))),
    }
  }

  // ---------------------------------------------------------- statements

  fn line_info(&self, buf: &mut CodeBuf, span: Loc) {
    if self.config.line_info {
      if let Loc::Range(p, _) = span {
        buf.line(format!("#line {} \"{}\"", p.line, p.file));
      }
    }
  }

  /// The forwarding target when an exception is pending: the innermost
  /// catch label, or a propagate-and-return exit.
  fn pending_exception_exit(&self) -> Result<String> {
    if let Some(label) = self.catch_labels.last() {
      return Ok(format!("goto {label};"))
    }
    Ok(match &self.fn_rty {
      None => "return;".to_owned(),
      Some(t) => format!("return {};", self.default_value(t)?),
    })
  }

  fn check_exception(&self, buf: &mut CodeBuf) -> Result<()> {
    buf.line(format!(
      "if (ASL_exception.tag != ASL_no_exception) {{ {} }}",
      self.pending_exception_exit()?,
    ));
    Ok(())
  }

  fn stmt(&mut self, buf: &mut CodeBuf, s: &Stmt) -> Result<()> {
    self.line_info(buf, s.span);
    match &s.k {
      StmtKind::VarDeclsNoInit(ty, names) => {
        let (t, suffix) = self.c_ty(ty)?;
        for x in names {
          buf.line(format!("{t} {}{suffix};", self.names.get(*x)));
        }
      }
      StmtKind::VarDecl { item, init, .. } => {
        match item {
          DeclItem::Var(x, Some(ty)) => {
            let (t, suffix) = self.c_ty(ty)?;
            let v = self.expr(init)?;
            buf.line(format!("{t} {}{suffix} = {v};", self.names.get(*x)));
          }
          DeclItem::Var(x, None) => {
            // Pass-generated temporaries bind whatever their initialiser
            // produced.
            let v = self.expr(init)?;
            buf.line(format!("__auto_type {} = {v};", self.names.get(*x)));
          }
          DeclItem::Tuple(_) => {
            return Err(Error::Unimplemented(s.span, "tuple binding at emission".into()))
          }
        }
        if expr_may_throw(init) { self.check_exception(buf)? }
      }
      StmtKind::Assign(lhs, rhs) => {
        let l = self.lexpr(lhs)?;
        let r = self.expr(rhs)?;
        match l {
          Some(l) => buf.line(format!("{l} = {r};")),
          // A wildcard evaluates for effect.
          None => buf.line(format!("(void)({r});")),
        }
        if expr_may_throw(rhs) { self.check_exception(buf)? }
      }
      StmtKind::TCall(f, params, args, throws) => {
        let call = self.apply(s.span, *f, params, args)?;
        buf.line(format!("{call};"));
        if *throws != ThrowsTag::NoThrow || args.iter().any(expr_may_throw) {
          self.check_exception(buf)?
        }
      }
      StmtKind::Return(None) => buf.line("return;"),
      StmtKind::Return(Some(e)) => {
        let v = self.expr(e)?;
        if expr_may_throw(e) {
          // Bind first so the check precedes the return.
          let t = self.c_ty(self.fn_rty.as_ref().ok_or_else(|| {
            Error::Internal("value return from a procedure".into())
          })?)?.0;
          buf.line(format!("{t} ASL_ret = {v};"));
          self.check_exception(buf)?;
          buf.line("return ASL_ret;");
        } else {
          buf.line(format!("return {v};"));
        }
      }
      StmtKind::Assert(e) => {
        let c = self.expr(e)?;
        buf.line(format!("ASL_assert({c});"));
      }
      StmtKind::Throw(e) => {
        let ExprKind::Record(name, _, _) = &e.k else {
          return Err(Error::Unimplemented(s.span, "rethrow of a computed exception".into()))
        };
        let n = self.names.get(*name);
        let v = self.expr(e)?;
        buf.line(format!("ASL_exception.tag = tag_{n};"));
        buf.line(format!("ASL_exception.u._{n} = {v};"));
        buf.line(self.pending_exception_exit()?);
      }
      StmtKind::Try { body, catchers, otherwise } => {
        self.label_supply += 1;
        let label = format!("ASL_catch_{}", self.label_supply);
        let done = format!("ASL_done_{}", self.label_supply);
        self.catch_labels.push(label.clone());
        buf.open("{");
        for s in body { self.stmt(buf, s)? }
        buf.close("}");
        self.catch_labels.pop();
        buf.line(format!("goto {done};"));
        buf.line(format!("{label}: ;"));
        for (i, c) in catchers.iter().enumerate() {
          let tn = self.names.get(c.ty);
          let kw = if i == 0 { "if" } else { "} else if" };
          buf.open(format!("{kw} (ASL_exception.tag == tag_{tn}) {{"));
          buf.line(format!("{tn} {} = ASL_exception.u._{tn};", self.names.get(c.name)));
          buf.line("ASL_exception.tag = ASL_no_exception;");
          for s in &c.body { self.stmt(buf, s)? }
          buf.indent -= 1;
        }
        // No arm matched: run the default or keep propagating outward.
        let opener = if catchers.is_empty() { "{" } else { "} else {" };
        buf.open(opener);
        match otherwise {
          Some(ss) => {
            buf.line("ASL_exception.tag = ASL_no_exception;");
            for s in ss { self.stmt(buf, s)? }
          }
          None => {
            let exit = self.pending_exception_exit()?;
            buf.line(exit);
          }
        }
        buf.close("}");
        buf.line(format!("{done}: ;"));
      }
      StmtKind::If(arms, els) => {
        for (i, (c, ss)) in arms.iter().enumerate() {
          let kw = if i == 0 { "if" } else { "} else if" };
          buf.open(format!("{kw} ({}) {{", self.expr(c)?));
          for s in ss { self.stmt(buf, s)? }
          buf.indent -= 1;
        }
        if !els.is_empty() {
          buf.open("} else {");
          for s in els { self.stmt(buf, s)? }
          buf.indent -= 1;
        }
        buf.line("}");
      }
      StmtKind::For { var: v, from, dir, to, body } => {
        let v = self.names.get(*v);
        let from = self.index_expr(from)?;
        let to = self.index_expr(to)?;
        let (cmp, step) = match dir {
          Direction::Up => ("<=", "++"),
          Direction::Down => (">=", "--"),
        };
        buf.open(format!(
          "for (int64_t {v} = {from}; {v} {cmp} {to}; {v}{step}) {{"));
        for s in body { self.stmt(buf, s)? }
        buf.close("}");
      }
      StmtKind::While(c, body) => {
        buf.open(format!("while ({}) {{", self.expr(c)?));
        for s in body { self.stmt(buf, s)? }
        buf.close("}");
      }
      StmtKind::Repeat(body, c) => {
        buf.open("do {");
        for s in body { self.stmt(buf, s)? }
        buf.close(format!("}} while (!({}));", self.expr(c)?));
      }
      StmtKind::Call(..) | StmtKind::Case(..) => {
        return Err(Error::Unimplemented(s.span, "unlowered statement at emission".into()))
      }
    }
    Ok(())
  }

  fn lexpr(&self, e: &LExpr) -> Result<Option<String>> {
    Ok(match &e.k {
      LExprKind::Wildcard => None,
      LExprKind::Var(x) => Some(self.global_access(*x)),
      LExprKind::Field(b, f) => {
        let sep = match (&b.k, &self.config.thread_local_pointer) {
          (LExprKind::Var(x), Some(ptr)) if x.name.as_str() == ptr => "->",
          _ => ".",
        };
        let b = self.lexpr(b)?
          .ok_or(Error::Unimplemented(e.span, "field of wildcard".into()))?;
        Some(format!("{b}{sep}{}", self.names.get(*f)))
      }
      LExprKind::Index(a, i) => {
        let a = self.lexpr(a)?
          .ok_or(Error::Unimplemented(e.span, "index of wildcard".into()))?;
        Some(format!("{a}[{}]", self.index_expr(i)?))
      }
      _ => return Err(Error::Unimplemented(e.span,
        "unlowered assignment target at emission".into())),
    })
  }
}

/// A call anywhere in the expression may leave the exception tag set.
fn expr_may_throw(e: &Expr) -> bool {
  struct Scan(bool);
  impl crate::visitor::Visitor for Scan {
    fn visit_expr(&mut self, e: &Expr) -> crate::visitor::Action<Expr> {
      if let ExprKind::TApply(_, _, _, t) = &e.k {
        if *t != ThrowsTag::NoThrow {
          self.0 = true;
          return crate::visitor::Action::SkipChildren
        }
      }
      crate::visitor::Action::DoChildren
    }
  }
  let mut s = Scan(false);
  let _ = crate::visitor::visit_expr(&mut s, e.clone());
  s.0
}

fn named_ty(ty: &Type) -> Option<Symbol> {
  match ty {
    Type::Constructor(name, _) | Type::Forward(name) => {
      match name.name.as_str() {
        "boolean" | "string" | "__sint" | "__RAM" | "__mask" => None,
        _ => Some(name.name),
      }
    }
    Type::Array(_, ety) => named_ty(ety),
    _ => None,
  }
}

enum FfiKind {
  /// Runtime integer, converted through the FFI helpers.
  Int,
  /// A type C can take directly.
  Direct(String),
}

fn ffi_c_ty(ty: &Type) -> Option<FfiKind> {
  match ty {
    Type::Integer(_) => Some(FfiKind::Int),
    Type::Bits(w, _) => {
      let n = fold_width(w, &NoConsts)?;
      (n <= 64).then(|| FfiKind::Direct("uint64_t".to_owned()))
    }
    Type::Constructor(name, _) => match name.name.as_str() {
      "boolean" => Some(FfiKind::Direct("bool".to_owned())),
      "__sint" => Some(FfiKind::Direct("int64_t".to_owned())),
      _ => None,
    },
    _ => None,
  }
}

fn write_file(path: &Path, text: &str) -> Result<()> {
  let run = || -> io::Result<()> {
    let mut f = std::fs::File::create(path)?;
    f.write_all(text.as_bytes())
  };
  run().map_err(|e| Error::Internal(format!("write {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::infer::{CheckConfig, TypeChecker};
  use crate::lexer::lex;
  use crate::parser::parse;
  use crate::transforms::{PipelineConfig, run_pipeline};

  fn compile(src: &str, config: EmitConfig) -> (Vec<PathBuf>, tempfile::TempDir) {
    let ts = lex("test.asl", src).expect("lexes");
    let r = parse(&ts);
    assert!(r.errors.is_empty(), "parse errors: {:?}", r.errors);
    let mut env = GlobalEnv::with_prelude();
    let decls = {
      let mut tc = TypeChecker::new(&mut env, CheckConfig {
        max_errors: 1,
        ..CheckConfig::default()
      });
      tc.check_program(r.decls).expect("typechecks")
    };
    let decls = run_pipeline(&mut env, &PipelineConfig::default(), decls)
      .expect("pipeline");
    let dir = tempfile::tempdir().expect("tempdir");
    let files = Emitter::new(&env, config)
      .emit_all(&decls, dir.path())
      .expect("emits");
    (files, dir)
  }

  fn read(files: &[PathBuf], suffix: &str) -> String {
    let p = files.iter().find(|p| p.to_string_lossy().ends_with(suffix))
      .unwrap_or_else(|| panic!("no file ending in {suffix}"));
    std::fs::read_to_string(p).expect("readable")
  }

  const OR4: &str =
    "func Test(x : bits(4), y : bits(4)) => bits(4)\n\
     begin\n  return x OR y;\nend\n\
     func Show()\nbegin\n  print_bits_hex(Test('1100', '1010'));\nend";

  #[test]
  fn emits_the_expected_file_set() {
    let (files, _dir) = compile(OR4, EmitConfig::default());
    for suffix in ["_types.h", "_exceptions.h", "_exceptions.c",
                   "_vars.h", "_vars.c", "_funs.c"] {
      assert!(files.iter().any(|p| p.to_string_lossy().ends_with(suffix)),
        "missing {suffix}: {files:?}");
    }
  }

  #[test]
  fn bitwise_or_reaches_the_runtime() {
    let (files, _dir) = compile(OR4, EmitConfig::default());
    let funs = read(&files, "_funs.c");
    assert!(funs.contains("(x | y)"), "{funs}");
    assert!(funs.contains("ASL_print_bits_hex(4, "), "{funs}");
    // The literal arguments ride through as 4-bit constants.
    assert!(funs.contains("0xc") && funs.contains("0xa"), "{funs}");
  }

  #[test]
  fn exception_machinery_is_complete() {
    let src =
      "exception Fault { code : bits(8) }\n\
       func Raise?(c : bits(8))\nbegin\n  throw Fault{ code = c };\nend\n\
       func Handle() => bits(8)\nbegin\n  try\n    Raise('00000001');\n  catch\n    \
       when e : Fault => return e.code;\n  end\n  return Zeros(8);\nend";
    let (files, _dir) = compile(src, EmitConfig::default());
    let exn_h = read(&files, "_exceptions.h");
    assert!(exn_h.contains("ASL_no_exception"), "{exn_h}");
    assert!(exn_h.contains("tag_Fault"), "{exn_h}");
    assert!(exn_h.contains("extern ASL_exception_t ASL_exception;"), "{exn_h}");
    let funs = read(&files, "_funs.c");
    // Throwing sets the tag; the may-throw call is followed by a check.
    assert!(funs.contains("ASL_exception.tag = tag_Fault;"), "{funs}");
    assert!(funs.contains("if (ASL_exception.tag != ASL_no_exception)"), "{funs}");
    assert!(funs.contains("ASL_catch_1: ;"), "{funs}");
    assert!(funs.contains("ASL_exception.tag = ASL_no_exception;"), "{funs}");
  }

  #[test]
  fn reserved_words_are_renamed() {
    let src = "var integer switch;\n\
       func F() => integer\nbegin\n  return switch;\nend";
    let (files, _dir) = compile(src, EmitConfig::default());
    let vars = read(&files, "_vars.h");
    assert!(vars.contains("__asl_switch"), "{vars}");
    let funs = read(&files, "_funs.c");
    assert!(funs.contains("return __asl_switch"), "{funs}");
  }

  #[test]
  fn splitting_distributes_functions() {
    let src = (0..4).map(|i| format!(
      "func F{i}() => integer\nbegin\n  return {i};\nend\n")).collect::<String>();
    let (files, _dir) = compile(&src, EmitConfig {
      num_c_files: 2,
      ..EmitConfig::default()
    });
    let a = read(&files, "_funs_0.c");
    let b = read(&files, "_funs_1.c");
    assert!(a.contains("F0") && a.contains("F1"), "{a}");
    assert!(b.contains("F2") && b.contains("F3"), "{b}");
  }

  #[test]
  fn line_info_points_at_the_source() {
    let (files, _dir) = compile(OR4, EmitConfig {
      line_info: true,
      ..EmitConfig::default()
    });
    let funs = read(&files, "_funs.c");
    assert!(funs.contains("#line"), "{funs}");
    assert!(funs.contains("\"test.asl\""), "{funs}");
  }

  #[test]
  fn ffi_exports_use_plain_signatures() {
    let src = "func Step(n : integer) => integer\nbegin\n  return n + 1;\nend";
    let (files, _dir) = compile(src, EmitConfig {
      exports: vec!["Step".to_owned()],
      ..EmitConfig::default()
    });
    let funs = read(&files, "_funs.c");
    assert!(funs.contains("int64_t Step(int64_t n)"), "{funs}");
    assert!(funs.contains("ASL_int_to_c"), "{funs}");
  }

  #[test]
  fn for_loops_count_both_ways() {
    let src =
      "func Sum() => integer\nbegin\n  var s : integer = 0;\n  \
       for i = 3 downto 0 do\n    s = s + i;\n  end\n  return s;\nend";
    let (files, _dir) = compile(src, EmitConfig::default());
    let funs = read(&files, "_funs.c");
    assert!(funs.contains("for (int64_t i = 3; i >= 0; i--)"), "{funs}");
  }

  #[test]
  fn thread_local_wrapping_routes_globals() {
    let src = "var integer g;\n\
       func F() => integer\nbegin\n  g = g + 1;\n  return g;\nend";
    let ts = lex("test.asl", src).expect("lexes");
    let r = parse(&ts);
    let mut env = GlobalEnv::with_prelude();
    let decls = {
      let mut tc = TypeChecker::new(&mut env, CheckConfig::default());
      tc.check_program(r.decls).expect("typechecks")
    };
    let pipeline = PipelineConfig {
      thread_local_pointer: Some(crate::symbol::intern("__state")),
    };
    let decls = run_pipeline(&mut env, &pipeline, decls).expect("pipeline");
    let dir = tempfile::tempdir().expect("tempdir");
    let files = Emitter::new(&env, EmitConfig {
      thread_local_pointer: Some("__state".to_owned()),
      ..EmitConfig::default()
    }).emit_all(&decls, dir.path()).expect("emits");
    let vars = read(&files, "_vars.h");
    assert!(vars.contains("_Thread_local asl_state *__state;"), "{vars}");
    let funs = read(&files, "_funs.c");
    assert!(funs.contains("__state->g"), "{funs}");
  }

  #[test]
  fn c23_backend_changes_only_primitive_text() {
    let (files, _dir) = compile(OR4, EmitConfig {
      backend: Backend::C23,
      ..EmitConfig::default()
    });
    let types = read(&files, "_types.h");
    assert!(types.contains("asl_runtime_c23.h"), "{types}");
    let funs = read(&files, "_funs.c");
    assert!(funs.contains("_BitInt"), "{funs}");
  }
}

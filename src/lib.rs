//! Front-end and middle-end for ASL, an executable specification language
//! for instruction set architectures.
//!
//! The pipeline turns specification text into typechecked abstract syntax
//! and, from there, into lower-level monomorphic code emitted as C-family
//! source for linking into native simulators:
//!
//! ```text
//! source text
//!   -> lexer/parser           (surface syntax to AST)
//!   -> evaluation-order check (side-effect policing)
//!   -> typechecker            (inference, overload resolution, SMT
//!                              entailment, runtime-check insertion)
//!   -> transform pipeline     (desugar, slice/tuple/case lowering,
//!                              accessor inlining, constant propagation,
//!                              monomorphization, integer bounds)
//!   -> C emitter              (types/exceptions/vars/funs files over a
//!                              selectable runtime variant)
//! ```
//!
//! The surrounding shell (REPL, ELF loading, command-line wiring, the
//! evaluator) collaborates through [`Compiler`], the global environment,
//! and the emitted file set.

pub mod symbol;
pub mod error;
pub mod types;
pub mod value;
pub mod visitor;
pub mod lexer;
pub mod parser;
pub mod check;
pub mod consteval;
pub mod smt;
pub mod infer;
pub mod transforms;
pub mod backend;
pub mod codegen;

use std::path::{Path, PathBuf};
use serde::Deserialize;

pub use error::{Error, Result};
pub use symbol::{Symbol, intern};
pub use types::entity::GlobalEnv;
pub use types::{Ident, Loc, Spanned};

/// The session configuration, deserialised from the `--configuration` JSON
/// the shell passes in.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Typechecker knobs.
  pub check: infer::CheckConfig,
  /// Emitter knobs, including the backend variant and FFI exports.
  pub emit: codegen::EmitConfig,
}

/// A compilation session: the global environment plus everything the
/// pipeline accumulates while processing source files.
#[derive(Debug)]
pub struct Compiler {
  /// The session-global environment, seeded with the builtin prelude.
  pub env: GlobalEnv,
  /// The session configuration.
  pub config: Config,
  /// Warnings collected by the lexer and typechecker.
  pub warnings: Vec<Spanned<String>>,
  /// Diagnostics the typechecker recovered from.
  pub errors: Vec<Error>,
  decls: Vec<types::ast::Decl>,
}

impl Compiler {
  /// A fresh session.
  #[must_use] pub fn new(config: Config) -> Self {
    Compiler {
      env: GlobalEnv::with_prelude(),
      config,
      warnings: vec![],
      errors: vec![],
      decls: vec![],
    }
  }

  /// Lex, parse, police, and typecheck one source file, extending the
  /// session environment. Files load in dependency order, prelude first.
  pub fn load_source(&mut self, file: &str, text: &str) -> Result<()> {
    let tokens = lexer::lex(file, text)?;
    let parsed = parser::parse(&tokens);
    self.warnings.extend(tokens.warnings);
    if let Some(e) = parsed.errors.into_iter().next() {
      return Err(e)
    }
    let effects = check::EffectInfo::compute(&parsed.decls);
    check::check_evaluation_order(&parsed.decls, &effects)?;
    let mut tc = infer::TypeChecker::new(&mut self.env, self.config.check.clone());
    let checked = tc.check_program(parsed.decls);
    self.errors.append(&mut tc.errors);
    self.decls.extend(checked?);
    Ok(())
  }

  /// The typechecked declarations loaded so far.
  #[must_use] pub fn declarations(&self) -> &[types::ast::Decl] { &self.decls }

  /// Run the transform pipeline and emit C-family sources into `out_dir`.
  /// Returns the files written.
  pub fn compile_to_c(&mut self, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let pipeline = transforms::PipelineConfig {
      thread_local_pointer: self.config.emit.thread_local_pointer
        .as_deref().map(intern),
    };
    let decls = transforms::run_pipeline(
      &mut self.env, &pipeline, std::mem::take(&mut self.decls))?;
    let files = codegen::Emitter::new(&self.env, self.config.emit.clone())
      .emit_all(&decls, out_dir)?;
    self.decls = decls;
    Ok(files)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn a_session_compiles_end_to_end() {
    let mut c = Compiler::new(Config::default());
    c.load_source("test.asl",
      "func Test(x : bits(4), y : bits(4)) => bits(4)\n\
       begin\n  return x OR y;\nend\n\
       func Main()\nbegin\n  print_bits_hex(Test('1100', '1010'));\nend",
    ).expect("loads");
    assert!(c.errors.is_empty());
    let dir = tempfile::tempdir().expect("tempdir");
    let files = c.compile_to_c(dir.path()).expect("compiles");
    assert!(files.len() >= 6, "{files:?}");
  }

  #[test]
  fn configuration_parses_from_json() {
    let cfg: Config = serde_json::from_str(
      r#"{
        "check": { "max_errors": 3 },
        "emit": {
          "backend": "c23",
          "basename": "cpu",
          "num_c_files": 4,
          "line_info": true,
          "exports": ["Step"]
        }
      }"#,
    ).expect("parses");
    assert_eq!(cfg.check.max_errors, 3);
    assert_eq!(cfg.emit.basename, "cpu");
    assert_eq!(cfg.emit.backend, backend::Backend::C23);
    assert_eq!(cfg.emit.exports, vec!["Step".to_owned()]);
  }

  #[test]
  fn evaluation_order_violations_fail_loading() {
    let mut c = Compiler::new(Config::default());
    let err = c.load_source("test.asl",
      "var integer g;\n\
       func WX() => integer\nbegin\n  g = g + 1;\n  return g;\nend\n\
       func Use() => integer\nbegin\n  return WX() + WX();\nend",
    ).unwrap_err();
    assert!(err.to_string().contains("evaluation order"), "{err}");
  }

  #[test]
  fn lexer_warnings_surface_on_the_session() {
    let mut c = Compiler::new(Config::default());
    c.load_source("test.asl",
      "func F(b : boolean) => integer\nbegin\n  \
       if b then\n    return 1;\n  else if b then\n    return 2;\n  end\n  end\n  \
       return 0;\nend",
    ).expect("loads");
    assert!(c.warnings.iter().any(|w| w.k.contains("elsif")), "{:?}", c.warnings);
  }
}

//! The diagnostic type shared by every stage of the pipeline.

use thiserror::Error;
use crate::types::{Ident, Loc};

/// A compilation diagnostic. The typechecker recovers from these up to a
/// configured limit; every other stage fails fast on the first one.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
  /// A syntax error from the lexer or parser.
  #[error("{0}: syntax error: {1}")]
  Parse(Loc, String),
  /// A name that is not bound to anything of the looked-up kind.
  #[error("{0}: unknown {1} `{2}`")]
  UnknownObject(Loc, &'static str, Ident),
  /// A name bound to the wrong kind of object.
  #[error("{0}: `{1}` is not a {2}")]
  IsNotA(Loc, Ident, &'static str),
  /// A structural mismatch between an expected and an actual shape.
  #[error("{0}: {1} does not match: expected {2}, got {3}")]
  DoesNotMatch(Loc, &'static str, String, String),
  /// A call that matches more than one candidate.
  #[error("{0}: ambiguous call to `{1}`; candidates: {2:?}")]
  Ambiguous(Loc, Ident, Vec<Ident>),
  /// A constraint failure or any other type error.
  #[error("{0}: type error: {1}")]
  Type(Loc, String),
  /// A construct the current stage cannot handle.
  #[error("{0}: unimplemented: {1}")]
  Unimplemented(Loc, String),
  /// A violated compiler invariant.
  #[error("internal error: {0}")]
  Internal(String),
}

impl Error {
  /// The source location of the diagnostic, if it has one.
  #[must_use] pub fn loc(&self) -> Loc {
    match *self {
      Error::Parse(l, _) | Error::UnknownObject(l, ..) | Error::IsNotA(l, ..) |
      Error::DoesNotMatch(l, ..) | Error::Ambiguous(l, ..) | Error::Type(l, _) |
      Error::Unimplemented(l, _) => l,
      Error::Internal(_) => Loc::Unknown,
    }
  }
}

/// The pipeline-wide result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

//! The global symbol interner.
//!
//! Every name that appears in a specification is interned once per session
//! and referred to by a [`Symbol`], a small copyable index. Interning is
//! global because identifiers flow through every stage of the pipeline and
//! must compare consistently from the lexer down to the emitter.

use std::fmt;
use std::sync::{LazyLock, Mutex};
use hashbrown::HashMap;

/// An interned string. Two symbols are equal iff they were interned from
/// equal strings in the same session.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
  /// The index of this symbol in the session intern table.
  #[must_use] pub fn into_usize(self) -> usize { self.0 as usize }

  /// The string this symbol was interned from.
  #[must_use] pub fn as_str(self) -> &'static str {
    INTERNER.lock().expect("poisoned interner").strs[self.into_usize()]
  }
}

impl fmt::Display for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.as_str().fmt(f) }
}

impl fmt::Debug for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.as_str().fmt(f) }
}

/// The intern table. Strings are leaked on first interning; the table lives
/// for the whole compilation session.
#[derive(Default)]
pub struct Interner {
  names: HashMap<&'static str, Symbol>,
  strs: Vec<&'static str>,
}

impl Interner {
  /// Intern a string, returning the existing symbol if it was seen before.
  pub fn intern(&mut self, s: &str) -> Symbol {
    if let Some(&sym) = self.names.get(s) { return sym }
    let sym = Symbol(u32::try_from(self.strs.len()).expect("interner overflow"));
    let s: &'static str = Box::leak(s.to_owned().into_boxed_str());
    self.strs.push(s);
    self.names.insert(s, sym);
    sym
  }
}

static INTERNER: LazyLock<Mutex<Interner>> = LazyLock::new(Default::default);

/// Intern a string in the session-global interner.
pub fn intern(s: &str) -> Symbol {
  INTERNER.lock().expect("poisoned interner").intern(s)
}

/// Build a dense lookup table from symbols to `T`, indexed by symbol index.
/// Used for keyword and primitive tables where the symbols are interned
/// early and therefore dense.
#[must_use] pub fn init_dense_symbol_map<T: Copy>(kvs: &[(Symbol, T)]) -> Box<[Option<T>]> {
  let max = kvs.iter().map(|&(s, _)| s.into_usize()).max().map_or(0, |n| n + 1);
  let mut map = vec![None; max].into_boxed_slice();
  for &(s, v) in kvs { map[s.into_usize()] = Some(v) }
  map
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn intern_is_idempotent() {
    let a = intern("Zeros");
    let b = intern("Zeros");
    assert_eq!(a, b);
    assert_eq!(a.as_str(), "Zeros");
    assert_ne!(a, intern("Ones"));
  }

  #[test]
  fn dense_map_round_trips() {
    let kvs = [(intern("alpha"), 1), (intern("beta"), 2)];
    let map = init_dense_symbol_map(&kvs);
    assert_eq!(map[kvs[0].0.into_usize()], Some(1));
    assert_eq!(map[kvs[1].0.into_usize()], Some(2));
  }
}

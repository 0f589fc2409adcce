//! End-to-end pipeline tests: source text through checking, lowering, and
//! emission, with the emitted C inspected for the expected shapes.

use aslc::{Compiler, Config};

fn compile(src: &str) -> (Vec<std::path::PathBuf>, tempfile::TempDir) {
  let mut c = Compiler::new(Config::default());
  c.load_source("test.asl", src).expect("loads");
  assert!(c.errors.is_empty(), "recovered diagnostics: {:?}", c.errors);
  let dir = tempfile::tempdir().expect("tempdir");
  let files = c.compile_to_c(dir.path()).expect("compiles");
  (files, dir)
}

fn read(files: &[std::path::PathBuf], suffix: &str) -> String {
  let p = files.iter().find(|p| p.to_string_lossy().ends_with(suffix))
    .unwrap_or_else(|| panic!("no file ending in {suffix}: {files:?}"));
  std::fs::read_to_string(p).expect("readable")
}

#[test]
fn bitwise_function_and_hex_print() {
  let (files, _dir) = compile(
    "func Test(x : bits(4), y : bits(4)) => bits(4)\n\
     begin\n  return x OR y;\nend\n\
     func Main()\nbegin\n  print_bits_hex(Test('1100', '1010'));\nend",
  );
  let funs = read(&files, "_funs.c");
  assert!(funs.contains("(x | y)"), "{funs}");
  assert!(funs.contains("ASL_print_bits_hex(4, "), "{funs}");
}

#[test]
fn integer_comparison_chain() {
  let (files, _dir) = compile(
    "func Test(x : integer, y : integer) => boolean\n\
     begin\n  return x >= y;\nend\n\
     func Main()\nbegin\n  \
     - = Test(1, 2);\n  - = Test(1, 1);\n  - = Test(1, 0);\n  - = Test(0 - 1, 0);\nend",
  );
  let funs = read(&files, "_funs.c");
  assert!(funs.contains("ASL_ge_int(x, y)"), "{funs}");
}

#[test]
fn descending_loop_accumulates() {
  let (files, _dir) = compile(
    "func Sum() => integer\nbegin\n  var s : integer = 0;\n  \
     for i = 3 downto 0 do\n    s = s + i;\n  end\n  return s;\nend",
  );
  let funs = read(&files, "_funs.c");
  assert!(funs.contains("for (int64_t i = 3; i >= 0; i--)"), "{funs}");
  assert!(funs.contains("ASL_add_int(s, "), "{funs}");
}

#[test]
fn constrained_integers_ride_in_sized_representation() {
  let (files, _dir) = compile(
    "func Clamp(n : integer {0..100}) => integer {0..100}\n\
     begin\n  return n;\nend",
  );
  let vars = read(&files, "_vars.h");
  // 0..100 needs 8 signed bits.
  assert!(vars.contains("Clamp"), "{vars}");
  let funs = read(&files, "_funs.c");
  assert!(!funs.contains("ASL_int_t Clamp"), "bounded, not unbounded: {funs}");
}

#[test]
fn case_without_default_reaches_error_primitive() {
  let (files, _dir) = compile(
    "func Decode(x : bits(2)) => integer\nbegin\n  case x of\n    \
     when '00' => return 0;\n    when '01' => return 1;\n  end\nend",
  );
  let funs = read(&files, "_funs.c");
  assert!(funs.contains("ASL_error_unmatched_case"), "{funs}");
}

#[test]
fn getter_setter_pair_compiles_to_calls() {
  let (files, _dir) = compile(
    "var bits(8) _r;\n\
     getter R => bits(8)\nbegin\n  return _r;\nend\n\
     setter R = v : bits(8)\nbegin\n  _r = v;\nend\n\
     func Bump()\nbegin\n  R = R OR '00000001';\nend",
  );
  let funs = read(&files, "_funs.c");
  assert!(funs.contains("R_read"), "{funs}");
  assert!(funs.contains("R_write"), "{funs}");
}

#[test]
fn width_polymorphism_specialises_per_call() {
  let (files, _dir) = compile(
    "func Low(x : bits(N), N : integer) => bits(1)\n\
     begin\n  return x[0 +: 1];\nend\n\
     func Main() => bits(1)\nbegin\n  \
     return Low('1010', 4) XOR Low('11111111', 8);\nend",
  );
  let funs = read(&files, "_funs.c");
  assert!(funs.contains("Low__4"), "{funs}");
  assert!(funs.contains("Low__8"), "{funs}");
  assert!(!funs.contains(" Low("), "the template is gone: {funs}");
}

#[test]
fn exceptions_round_trip_through_the_union() {
  let (files, _dir) = compile(
    "exception Overflow { amount : integer }\n\
     func Add?(a : integer, b : integer) => integer\nbegin\n  \
     return a + b;\nend\n\
     func Guarded() => integer\nbegin\n  try\n    return Add(1, 2);\n  catch\n    \
     when e : Overflow => return e.amount;\n    otherwise => return 0;\n  end\nend",
  );
  let exn = read(&files, "_exceptions.h");
  assert!(exn.contains("tag_Overflow"), "{exn}");
  let funs = read(&files, "_funs.c");
  assert!(funs.contains("goto ASL_catch_1"), "{funs}");
}

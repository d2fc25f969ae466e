//! End-to-end compilation against the bundled VM.

use ritec::{CompileError, CompileOptions, Compiler, compile};
use ritec_vm::{State, Value};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("ritec=debug")
        .try_init();
}

#[test]
fn test_simple_expression_compiles() {
    init_tracing();
    let mut state = State::new();
    let bin = compile(&mut state, b"1 + 1", &CompileOptions::new()).unwrap();
    assert!(!bin.is_empty());
    assert_eq!(&bin[0..4], b"RITE");
}

#[test]
fn test_incomplete_source_is_a_syntax_error() {
    init_tracing();
    let mut state = State::new();
    let err = compile(&mut state, b"def", &CompileOptions::new()).unwrap_err();
    assert!(err.is_source_error());
    assert_eq!(err.status(), ritec::STATUS_FAILED);
    let message = err.to_string();
    assert!(!message.is_empty());
    assert!(message.contains("syntax error"), "got {:?}", message);
    assert!(message.contains("SyntaxError"), "got {:?}", message);
    assert_eq!(state.open_compile_contexts(), 0);
}

#[test]
fn test_raise_is_not_run_at_compile_time() {
    init_tracing();
    let mut state = State::new();
    let bin = compile(&mut state, b"raise \"boom\"", &CompileOptions::new()).unwrap();
    assert!(!bin.is_empty());
    assert!(state.exc().is_none());
}

#[test]
fn test_top_level_statements_have_no_side_effects() {
    let mut compiler = Compiler::new(State::new());
    compiler.compile(b"puts \"hello\"\n$x = 1").unwrap();
    let handle = compiler.compile_to_handle(b"print 1, 2").unwrap();
    assert_eq!(compiler.context().output(), "");
    assert_eq!(compiler.context().global("$x"), Value::Nil);
    compiler.release_handle(handle);
}

#[test]
fn test_filename_appears_in_diagnostic() {
    let options = CompileOptions::new().with_filename("broken.rb");
    let mut compiler = Compiler::with_options(State::new(), options);
    let err = compiler.compile(b"x = (1 +").unwrap_err();
    assert!(err.to_string().contains("broken.rb"), "got {:?}", err.to_string());
}

#[test]
fn test_both_paths_fail_the_same_way() {
    let mut compiler = Compiler::new(State::new());
    let a = compiler.compile(b"if").unwrap_err();
    let b = compiler.compile_to_handle(b"if").unwrap_err();
    assert_eq!(a.to_string(), b.to_string());
    assert_eq!(compiler.outstanding_handles(), 0);
}

#[test]
fn test_invalid_utf8_is_a_source_error() {
    let mut state = State::new();
    let err = compile(&mut state, b"x = \"\xff\"", &CompileOptions::new()).unwrap_err();
    assert!(matches!(err, CompileError::Source(_)));
}

#[test]
fn test_compile_under_gc_stress() {
    let mut state = State::new();
    state.set_gc_stress(true);
    let source = b"def greet(name)\n  \"hi \" + name\nend\n[greet(\"a\"), greet(\"b\")].join(\",\")";
    let bin = compile(&mut state, source, &CompileOptions::new().with_debug_info(true)).unwrap();

    let mut runner = State::new();
    let unit = runner.load_binary(&bin).unwrap();
    let result = runner.exec(unit).unwrap();
    assert_eq!(runner.string_value(result), Some("hi a,hi b"));
}

#[test]
fn test_binary_matches_handle() {
    let source = b"a = [1, 2, 3]\na << 4\np a.length\na.join(\"-\")";
    let mut compiler = Compiler::new(State::new());

    let bin = compiler.compile(source).unwrap();
    let handle = compiler.compile_to_handle(source).unwrap();
    let unit = compiler.get(&handle).unwrap();
    let direct = compiler.context_mut().exec(unit).unwrap();
    let direct = compiler.context().string_value(direct).map(str::to_string);
    let direct_output = compiler.context_mut().take_output();
    compiler.release_handle(handle);

    let mut runner = State::new();
    let loaded = runner.load_binary(&bin).unwrap();
    let result = runner.exec(loaded).unwrap();
    assert_eq!(runner.string_value(result).map(str::to_string), direct);
    assert_eq!(runner.output(), direct_output);
    assert_eq!(direct.as_deref(), Some("1-2-3-4"));
}

#[test]
fn test_compile_file() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.rb");
    let bad = dir.path().join("bad.rb");
    std::fs::write(&good, "puts 1 + 2\n").unwrap();
    std::fs::write(&bad, "puts (\n").unwrap();

    let mut compiler = Compiler::new(State::new());
    let bin = compiler.compile_file(&good).unwrap();
    assert!(bin.starts_with(b"RITE"));

    let err = compiler.compile_file(&bad).unwrap_err();
    assert!(err.to_string().contains("bad.rb"), "got {:?}", err.to_string());

    let err = compiler.compile_file(dir.path().join("missing.rb")).unwrap_err();
    assert!(matches!(err, CompileError::Io { .. }));
}

#[test]
fn test_deeply_nested_source_is_rejected() {
    init_tracing();
    let mut state = State::new();
    let depth = 10_000;
    let source = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
    let err = compile(&mut state, source.as_bytes(), &CompileOptions::new()).unwrap_err();
    assert!(matches!(err, CompileError::Source(_)));
    assert!(err.to_string().contains("nesting too deep"), "got {:?}", err.to_string());
    assert_eq!(state.open_compile_contexts(), 0);

    let chain = format!("x = 0{}", " + 1".repeat(100_000));
    let err = compile(&mut state, chain.as_bytes(), &CompileOptions::new()).unwrap_err();
    assert!(err.is_source_error());

    // moderate nesting still compiles and runs
    let source = format!("{}42{}", "(".repeat(64), ")".repeat(64));
    let bin = compile(&mut state, source.as_bytes(), &CompileOptions::new()).unwrap();
    let mut runner = State::new();
    let unit = runner.load_binary(&bin).unwrap();
    assert_eq!(runner.exec(unit), Ok(Value::Integer(42)));
}

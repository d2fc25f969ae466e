//! Lifetime of pinned callable units.

use ritec::{CompileOptions, Compiler, compile_to_value, release_value};
use ritec_vm::{State, Value};

#[test]
fn test_handle_survives_unrelated_collections() {
    let mut compiler = Compiler::new(State::new());
    let handle = compiler.compile_to_handle(b"[1, 2, 3].length").unwrap();
    let unit = compiler.get(&handle).unwrap();

    let state = compiler.context_mut();
    for i in 0..100 {
        state.str_new(&format!("noise {}", i));
    }
    state.load_string("x = [\"a\", \"b\"]\nx.join").unwrap();
    state.full_gc();
    state.full_gc();

    assert!(state.is_live(unit));
    assert_eq!(state.exec(unit), Ok(Value::Integer(3)));
    compiler.release_handle(handle);
}

#[test]
fn test_release_makes_unit_collectable() {
    let mut compiler = Compiler::new(State::new());
    let handle = compiler.compile_to_handle(b"1").unwrap();
    let unit = compiler.get(&handle).unwrap();
    compiler.release_handle(handle);
    assert_eq!(compiler.outstanding_handles(), 0);

    let state = compiler.context_mut();
    state.full_gc();
    assert!(!state.is_live(unit));

    // later activity on the same context is unaffected
    state.str_new("after");
    state.full_gc();
    assert_eq!(state.load_string("2 * 21"), Ok(Value::Integer(42)));
}

#[test]
fn test_same_source_pinned_twice() {
    let mut compiler = Compiler::new(State::new());
    let a = compiler.compile_to_handle(b"7").unwrap();
    let b = compiler.compile_to_handle(b"7").unwrap();
    assert_ne!(a.to_raw(), b.to_raw());

    let unit_b = compiler.get(&b).unwrap();
    compiler.release_handle(a);
    compiler.context_mut().full_gc();
    assert_eq!(compiler.context_mut().exec(unit_b), Ok(Value::Integer(7)));
    compiler.release_handle(b);
}

#[test]
fn test_released_token_does_not_resolve() {
    let mut compiler = Compiler::new(State::new());
    let handle = compiler.compile_to_handle(b"nil").unwrap();
    let raw = handle.to_raw();
    assert_ne!(raw, 0);
    assert!(compiler.handle_from_raw(raw).is_some());

    compiler.release_handle(handle);
    assert!(compiler.handle_from_raw(raw).is_none());

    // the slot is reused under a new generation
    let next = compiler.compile_to_handle(b"nil").unwrap();
    assert_ne!(next.to_raw(), raw);
    compiler.release_handle(next);
}

#[test]
fn test_pin_is_taken_while_scope_is_open() {
    let mut state = State::new();
    state.set_gc_stress(true);
    let unit = compile_to_value(&mut state, b"def f(a)\n  a + 1\nend\nf(41)", &CompileOptions::new())
        .unwrap();
    // stress mode collects at every arena restore
    assert!(state.is_live(unit));
    assert_eq!(state.gc_root_count(unit), 1);
    assert_eq!(state.exec(unit), Ok(Value::Integer(42)));
    release_value(&mut state, unit);
    assert_eq!(state.gc_root_count(unit), 0);
}

#[test]
fn test_dropping_compiler_unpins() {
    let mut state = State::new();
    let unit;
    {
        let mut compiler = Compiler::new(&mut state);
        let handle = compiler.compile_to_handle(b"1").unwrap();
        unit = compiler.get(&handle).unwrap();
    }
    assert_eq!(state.gc_root_count(unit), 0);
    state.full_gc();
    assert!(!state.is_live(unit));
}

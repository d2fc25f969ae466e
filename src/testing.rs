// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! A recording execution context for unit tests.
//!
//! Objects created after an arena save die at the matching restore unless
//! pinned, so tests can observe use-after-scope bugs.

use std::cell::RefCell;
use std::collections::HashMap;

use thiserror::Error;

use crate::context::{ExecutionContext, LoadConfig};
use crate::options::DumpFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockValue {
    Nil,
    Integer(i64),
    Proc(usize),
    Exception(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ArenaSave(usize),
    ArenaRestore(usize),
    ContextNew,
    ContextFree,
    Load,
    Dump,
    Pin,
    Unpin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadBehavior {
    /// Produce a proc
    Proc,
    /// Raise an exception and return nil
    Raise(String, Option<Vec<String>>),
    /// Raise an exception but still return a proc
    RaiseWithProc(String),
    /// Return a non-callable value
    Value(MockValue),
    /// Panic inside the load
    Panic,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MockDumpError {
    #[error("object was collected")]
    Collected,
    #[error("not a proc")]
    NotAProc,
    #[error("dump refused")]
    Refused,
}

#[derive(Debug)]
struct Object {
    live: bool,
    arena_depth: usize,
    inspect: String,
    backtrace: Option<Vec<String>>,
}

pub struct MockContext {
    events: RefCell<Vec<Event>>,
    pub open_contexts: usize,
    pub last_config: Option<LoadConfig>,
    pub next_load: LoadBehavior,
    pub fail_dump: bool,
    pub pins: HashMap<MockValue, usize>,
    objects: Vec<Object>,
    arena: Vec<usize>,
    pending: Option<MockValue>,
}

impl MockContext {
    pub fn new() -> Self {
        Self {
            events: RefCell::new(Vec::new()),
            open_contexts: 0,
            last_config: None,
            next_load: LoadBehavior::Proc,
            fail_dump: false,
            pins: HashMap::new(),
            objects: Vec::new(),
            arena: Vec::new(),
            pending: None,
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    fn record(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    /// Sets the pending exception directly.
    pub fn raise(&mut self, inspect: &str, backtrace: Option<Vec<String>>) -> MockValue {
        let exc = MockValue::Exception(self.alloc(inspect, backtrace));
        self.pending = Some(exc);
        exc
    }

    pub fn is_live(&self, value: MockValue) -> bool {
        match value {
            MockValue::Proc(i) | MockValue::Exception(i) => self.objects[i].live,
            _ => true,
        }
    }

    /// Kills every unprotected object, like a full collection.
    pub fn collect(&mut self) {
        let depth = self.arena.len();
        for (index, object) in self.objects.iter_mut().enumerate() {
            let pinned = self.pins.contains_key(&MockValue::Proc(index));
            if object.arena_depth > depth && !pinned {
                object.live = false;
            }
        }
    }

    fn alloc(&mut self, inspect: &str, backtrace: Option<Vec<String>>) -> usize {
        self.objects.push(Object {
            live: true,
            arena_depth: self.arena.len(),
            inspect: inspect.to_string(),
            backtrace,
        });
        self.objects.len() - 1
    }
}

impl ExecutionContext for MockContext {
    type Value = MockValue;
    type CompileContext = LoadConfig;
    type DumpError = MockDumpError;

    fn arena_save(&mut self) -> usize {
        let index = self.arena.len();
        self.record(Event::ArenaSave(index));
        self.arena.push(index);
        index
    }

    fn arena_restore(&mut self, index: usize) {
        self.record(Event::ArenaRestore(index));
        self.arena.truncate(index);
        self.collect();
    }

    fn compile_context_new(&mut self, config: &LoadConfig) -> LoadConfig {
        self.record(Event::ContextNew);
        self.open_contexts += 1;
        self.last_config = Some(config.clone());
        config.clone()
    }

    fn compile_context_free(&mut self, _cxt: &mut LoadConfig) {
        self.record(Event::ContextFree);
        self.open_contexts -= 1;
    }

    fn load(&mut self, _source: &[u8], _cxt: &mut LoadConfig) -> MockValue {
        self.record(Event::Load);
        self.pending = None;
        match self.next_load.clone() {
            LoadBehavior::Proc => MockValue::Proc(self.alloc("#<Proc>", None)),
            LoadBehavior::Raise(inspect, backtrace) => {
                self.raise(&inspect, backtrace);
                MockValue::Nil
            }
            LoadBehavior::RaiseWithProc(inspect) => {
                self.raise(&inspect, None);
                MockValue::Proc(self.alloc("#<Proc>", None))
            }
            LoadBehavior::Value(value) => value,
            LoadBehavior::Panic => panic!("load panicked"),
        }
    }

    fn pending_exception(&self) -> Option<MockValue> {
        self.pending
    }

    fn inspect(&self, value: MockValue) -> String {
        match value {
            MockValue::Nil => "nil".to_string(),
            MockValue::Integer(n) => n.to_string(),
            MockValue::Proc(i) | MockValue::Exception(i) if self.objects[i].live => {
                self.objects[i].inspect.clone()
            }
            _ => "<collected>".to_string(),
        }
    }

    fn backtrace(&self, exception: MockValue) -> Option<Vec<String>> {
        match exception {
            MockValue::Exception(i) => self.objects[i].backtrace.clone(),
            _ => None,
        }
    }

    fn is_callable(&self, value: MockValue) -> bool {
        matches!(value, MockValue::Proc(_))
    }

    fn dump(&self, value: MockValue, _flags: DumpFlags) -> Result<Vec<u8>, MockDumpError> {
        self.record(Event::Dump);
        if self.fail_dump {
            return Err(MockDumpError::Refused);
        }
        match value {
            MockValue::Proc(_) if !self.is_live(value) => Err(MockDumpError::Collected),
            MockValue::Proc(i) => Ok(format!("BIN{}", i).into_bytes()),
            _ => Err(MockDumpError::NotAProc),
        }
    }

    fn pin(&mut self, value: MockValue) {
        self.record(Event::Pin);
        *self.pins.entry(value).or_insert(0) += 1;
    }

    fn unpin(&mut self, value: MockValue) {
        self.record(Event::Unpin);
        if let Some(count) = self.pins.get_mut(&value) {
            *count -= 1;
            if *count == 0 {
                self.pins.remove(&value);
            }
        }
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Garbage collector.
//!
//! A non-moving mark-and-sweep heap. Objects are reachable when they are
//! referenced from:
//! - the GC arena (objects created since the last arena restore)
//! - registered roots (counted; one unregister per register)
//! - the extra roots the owner passes to [`Heap::collect`]
//!
//! Freed slots are reused with a bumped generation, so an [`ObjRef`] that
//! outlives its object is detected instead of aliasing a new one.

mod heap;
mod object;

pub use heap::{Heap, ObjRef};
pub use object::{Exception, Object};

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! C ABI.
//!
//! Every entry point returns [`STATUS_OK`] or [`STATUS_FAILED`]. On failure a
//! NUL-terminated diagnostic is written to `out_err`; release it with
//! [`ritec_free_message`]. Binaries are released with [`ritec_free_binary`].
//!
//! Handles cross the boundary as non-zero `u64` tokens that carry the id of
//! the context that issued them. Releasing a token twice, or on another
//! context, is a caller error: the token resolves to nothing, the call is
//! logged at `error` and otherwise ignored.
//!
//! A panic inside the library is caught and reported as a failure.

use std::ffi::{CString, c_char};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use ritec_vm::State;

use crate::compiler::Compiler;
use crate::error::{CompileError, STATUS_FAILED, STATUS_OK};

const PANIC_MESSAGE: &str = "internal error: compiler panicked";

/// An execution context plus the handles issued against it.
pub struct RitecContext {
    compiler: Compiler<State>,
}

impl RitecContext {
    /// Number of handles issued on this context and not yet released.
    pub fn outstanding_handles(&self) -> usize {
        self.compiler.outstanding_handles()
    }
}

/// Creates a new context. Free it with [`ritec_close`].
#[unsafe(no_mangle)]
pub extern "C" fn ritec_open() -> *mut RitecContext {
    match panic::catch_unwind(|| Compiler::new(State::new())) {
        Ok(compiler) => Box::into_raw(Box::new(RitecContext { compiler })),
        Err(_) => ptr::null_mut(),
    }
}

/// Destroys a context, unpinning any handle that was never released.
///
/// # Safety
///
/// `ctx` must be null or a pointer returned by [`ritec_open`] that has not
/// been closed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ritec_close(ctx: *mut RitecContext) {
    if ctx.is_null() {
        return;
    }
    let ctx = unsafe { Box::from_raw(ctx) };
    let _ = panic::catch_unwind(AssertUnwindSafe(move || drop(ctx)));
}

/// Compiles `len` bytes at `source` into a serialized binary.
///
/// # Safety
///
/// `ctx` must come from [`ritec_open`]. `source` must point to `len`
/// readable bytes (it may be null when `len` is 0). The out pointers must be
/// valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ritec_compile(
    ctx: *mut RitecContext,
    source: *const u8,
    len: usize,
    out_bin: *mut *mut u8,
    out_size: *mut usize,
    out_err: *mut *mut c_char,
) -> i32 {
    unsafe {
        write_out(out_bin, ptr::null_mut());
        write_out(out_size, 0);
        write_out(out_err, ptr::null_mut());
    }
    let Some(ctx) = (unsafe { ctx.as_mut() }) else {
        return unsafe { fail(out_err, "null context") };
    };
    let source = unsafe { source_slice(source, len) };

    let result = panic::catch_unwind(AssertUnwindSafe(|| ctx.compiler.compile(source)));
    match result {
        Ok(Ok(bin)) => {
            let bin = bin.into_boxed_slice();
            let size = bin.len();
            unsafe {
                write_out(out_size, size);
                write_out(out_bin, Box::into_raw(bin).cast::<u8>());
            }
            STATUS_OK
        }
        Ok(Err(err)) => unsafe { fail_with(out_err, &err) },
        Err(_) => unsafe { fail(out_err, PANIC_MESSAGE) },
    }
}

/// Compiles `len` bytes at `source` and writes a handle token to
/// `out_handle`.
///
/// # Safety
///
/// Same requirements as [`ritec_compile`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ritec_compile_to_handle(
    ctx: *mut RitecContext,
    source: *const u8,
    len: usize,
    out_handle: *mut u64,
    out_err: *mut *mut c_char,
) -> i32 {
    unsafe {
        write_out(out_handle, 0);
        write_out(out_err, ptr::null_mut());
    }
    let Some(ctx) = (unsafe { ctx.as_mut() }) else {
        return unsafe { fail(out_err, "null context") };
    };
    let source = unsafe { source_slice(source, len) };

    let result =
        panic::catch_unwind(AssertUnwindSafe(|| ctx.compiler.compile_to_handle(source)));
    match result {
        Ok(Ok(handle)) => {
            unsafe { write_out(out_handle, handle.to_raw()) };
            STATUS_OK
        }
        Ok(Err(err)) => unsafe { fail_with(out_err, &err) },
        Err(_) => unsafe { fail(out_err, PANIC_MESSAGE) },
    }
}

/// Unpins the callable unit behind `handle`.
///
/// # Safety
///
/// `ctx` must come from [`ritec_open`]. `handle` must have been returned by
/// [`ritec_compile_to_handle`] on the same context and not yet released.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ritec_release_handle(ctx: *mut RitecContext, handle: u64) {
    let Some(ctx) = (unsafe { ctx.as_mut() }) else {
        return;
    };
    let _ = panic::catch_unwind(AssertUnwindSafe(|| {
        match ctx.compiler.handle_from_raw(handle) {
            Some(handle) => ctx.compiler.release_handle(handle),
            None => tracing::error!(handle, "ritec_release_handle called with an unknown handle"),
        }
    }));
}

/// Frees a binary returned by [`ritec_compile`].
///
/// # Safety
///
/// `bin` and `size` must be exactly what [`ritec_compile`] wrote, and the
/// binary must not have been freed already.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ritec_free_binary(bin: *mut u8, size: usize) {
    if bin.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(bin, size)) });
}

/// Frees a diagnostic written to an `out_err` parameter.
///
/// # Safety
///
/// `message` must be null or a diagnostic from this library that has not
/// been freed already.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ritec_free_message(message: *mut c_char) {
    if message.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(message) });
}

unsafe fn source_slice<'a>(source: *const u8, len: usize) -> &'a [u8] {
    if source.is_null() || len == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(source, len) }
    }
}

unsafe fn write_out<T>(out: *mut T, value: T) {
    if !out.is_null() {
        unsafe { out.write(value) };
    }
}

unsafe fn fail_with(out_err: *mut *mut c_char, err: &CompileError) -> i32 {
    unsafe { fail(out_err, err.diagnostic().message()) }
}

unsafe fn fail(out_err: *mut *mut c_char, message: &str) -> i32 {
    let message = message.replace('\0', "\\0");
    if let Ok(message) = CString::new(message) {
        unsafe { write_out(out_err, message.into_raw()) };
    }
    STATUS_FAILED
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use super::*;

    #[test]
    fn test_null_context_fails_cleanly() {
        let mut err = ptr::null_mut();
        let mut bin = ptr::null_mut();
        let mut size = 0;
        let status = unsafe {
            ritec_compile(ptr::null_mut(), b"1".as_ptr(), 1, &mut bin, &mut size, &mut err)
        };
        assert_eq!(status, STATUS_FAILED);
        assert!(bin.is_null());
        let message = unsafe { CStr::from_ptr(err) }.to_str().unwrap().to_string();
        assert_eq!(message, "null context");
        unsafe { ritec_free_message(err) };
    }

    #[test]
    fn test_interior_nul_is_escaped() {
        let mut err = ptr::null_mut();
        assert_eq!(unsafe { fail(&mut err, "a\0b") }, STATUS_FAILED);
        let message = unsafe { CStr::from_ptr(err) }.to_str().unwrap().to_string();
        assert_eq!(message, "a\\0b");
        unsafe { ritec_free_message(err) };
    }

    #[test]
    fn test_empty_source_without_pointer() {
        let ctx = ritec_open();
        let mut bin = ptr::null_mut();
        let mut size = 0;
        let mut err = ptr::null_mut();
        let status = unsafe { ritec_compile(ctx, ptr::null(), 0, &mut bin, &mut size, &mut err) };
        assert_eq!(status, STATUS_OK);
        assert!(size > 0);
        unsafe {
            ritec_free_binary(bin, size);
            ritec_close(ctx);
        }
    }

    #[test]
    fn test_free_functions_accept_null() {
        unsafe {
            ritec_free_binary(ptr::null_mut(), 0);
            ritec_free_message(ptr::null_mut());
            ritec_close(ptr::null_mut());
            ritec_release_handle(ptr::null_mut(), 1);
        }
    }
}

//! FFI bindings for HSES scoring
//!
//! C-compatible functions for calling the scorer from other languages. All
//! functions take null-terminated C strings and return allocated memory that
//! must be freed by the caller using `hses_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::ScoringConfig;
use crate::multiplier::{
    noise_environment_multiplier, session_length_multiplier, time_of_day_multiplier,
};
use crate::pipeline::{score_json, ScoreProcessor};

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Score a JSON request with fresh seed bounds and return the JSON report.
///
/// # Safety
/// - `request_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `hses_free_string`.
/// - Returns NULL on error; call `hses_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn hses_score_json(request_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(request_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    match score_json(&json_str) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Time-of-day multiplier for an "HH:MM" string; NULL means no time context.
///
/// # Safety
/// - `time` must be NULL or a valid null-terminated C string.
/// - Returns a negative value on error; call `hses_last_error` for details.
#[no_mangle]
pub unsafe extern "C" fn hses_time_of_day_multiplier(time: *const c_char) -> f64 {
    clear_last_error();

    let time_str = if time.is_null() {
        None
    } else {
        match cstr_to_string(time) {
            Some(s) => Some(s),
            None => {
                set_last_error("Invalid time string pointer");
                return -1.0;
            }
        }
    };

    match time_of_day_multiplier(time_str.as_deref()) {
        Ok(m) => m,
        Err(e) => {
            set_last_error(&e.to_string());
            -1.0
        }
    }
}

/// Session-length multiplier; `has_minutes == 0` means no session context.
///
/// # Safety
/// - Always safe to call; marked unsafe for ABI symmetry.
/// - Returns a negative value on error; call `hses_last_error` for details.
#[no_mangle]
pub unsafe extern "C" fn hses_session_length_multiplier(minutes: f64, has_minutes: i32) -> f64 {
    clear_last_error();

    let minutes = (has_minutes != 0).then_some(minutes);
    match session_length_multiplier(minutes) {
        Ok(m) => m,
        Err(e) => {
            set_last_error(&e.to_string());
            -1.0
        }
    }
}

/// Noise/environment multiplier with the built-in environment table;
/// `has_noise == 0` means no noise reading.
///
/// # Safety
/// - `environment_code` must be a valid null-terminated C string.
/// - Returns a negative value on error; call `hses_last_error` for details.
#[no_mangle]
pub unsafe extern "C" fn hses_noise_environment_multiplier(
    noise: f64,
    has_noise: i32,
    environment_code: *const c_char,
) -> f64 {
    clear_last_error();

    let code = match cstr_to_string(environment_code) {
        Some(s) => s,
        None => {
            set_last_error("Invalid environment code pointer");
            return -1.0;
        }
    };

    noise_environment_multiplier((has_noise != 0).then_some(noise), &code)
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a ScoreProcessor
pub struct ScoreProcessorHandle {
    processor: ScoreProcessor,
}

/// Create a new ScoreProcessor, optionally configured from a TOML string.
///
/// # Safety
/// - `config_toml` must be NULL (defaults) or a valid null-terminated C string.
/// - Must be freed with `hses_processor_free`.
/// - Returns NULL on error; call `hses_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn hses_processor_new(config_toml: *const c_char) -> *mut ScoreProcessorHandle {
    clear_last_error();

    let processor = if config_toml.is_null() {
        ScoreProcessor::new()
    } else {
        let toml_str = match cstr_to_string(config_toml) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match ScoringConfig::from_toml_str(&toml_str).and_then(ScoreProcessor::with_config) {
            Ok(p) => p,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    Box::into_raw(Box::new(ScoreProcessorHandle { processor }))
}

/// Free a ScoreProcessor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `hses_processor_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn hses_processor_free(processor: *mut ScoreProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Score a JSON request with a stateful processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `hses_processor_new`.
/// - `request_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `hses_free_string`.
/// - Returns NULL on error; call `hses_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn hses_processor_score(
    processor: *mut ScoreProcessorHandle,
    request_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    let json_str = match cstr_to_string(request_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    match handle.processor.process(&json_str) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Save processor bounds to JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `hses_processor_new`.
/// - Returns a newly allocated string that must be freed with `hses_free_string`.
/// - Returns NULL on error; call `hses_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn hses_processor_save_bounds(
    processor: *mut ScoreProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    match handle.processor.save_bounds() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Load processor bounds from JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `hses_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `hses_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn hses_processor_load_bounds(
    processor: *mut ScoreProcessorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &*processor;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match handle.processor.load_bounds(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by HSES functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an HSES function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn hses_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next HSES function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn hses_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn hses_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

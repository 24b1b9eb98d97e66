//! Dynamic loading of the system GL library.
//!
//! Uses `libloading` to load `opengl32.dll` (Windows), `libGL.so.1` (Linux)
//! or the OpenGL framework (macOS) and builds the [`Gl`] function table
//! over it. The native context must already be current on the calling
//! thread; resolution goes through `glXGetProcAddress`/`wglGetProcAddress`
//! where the platform has one, with direct symbol lookup as the fallback
//! for core entry points.

use std::ffi::{c_void, CString};

use libloading::{Library, Symbol};
use tracing::{debug, info};

use ashes_api::{Error, Result};

use crate::context::{Gl, GlowTable};

#[cfg(target_os = "windows")]
type FnGetProcAddress = unsafe extern "system" fn(*const u8) -> *const c_void;
#[cfg(not(target_os = "windows"))]
type FnGetProcAddress = unsafe extern "C" fn(*const u8) -> *const c_void;

/// Load the system GL library and resolve the function table through it.
pub fn load_system_gl() -> Result<Box<dyn Gl>> {
    let lib = load_library()?;
    // The table keeps raw function pointers into the library, so it stays
    // loaded for the rest of the process.
    let lib: &'static Library = Box::leak(Box::new(lib));
    let get_proc = proc_address_fn(lib);
    let table = unsafe { GlowTable::load_with(|name| resolve(lib, get_proc, name)) };
    info!("loaded system GL function table");
    Ok(Box::new(table))
}

fn load_library() -> Result<Library> {
    #[cfg(target_os = "windows")]
    let lib_names = &["opengl32.dll"];

    #[cfg(target_os = "linux")]
    let lib_names = &["libGL.so.1", "libGL.so"];

    #[cfg(target_os = "macos")]
    let lib_names = &["/System/Library/Frameworks/OpenGL.framework/Versions/Current/OpenGL"];

    let mut last_err = String::new();
    for name in lib_names {
        match unsafe { Library::new(name) } {
            Ok(lib) => {
                info!("loaded GL library from: {}", name);
                return Ok(lib);
            }
            Err(e) => {
                last_err = format!("{}: {}", name, e);
                debug!("failed to load {}: {}", name, e);
            }
        }
    }

    Err(Error::InitializationFailed(format!(
        "failed to load GL library: {}",
        last_err
    )))
}

#[cfg(target_os = "linux")]
fn proc_address_fn(lib: &Library) -> Option<FnGetProcAddress> {
    unsafe {
        lib.get(b"glXGetProcAddressARB\0")
            .or_else(|_| lib.get(b"glXGetProcAddress\0"))
            .ok()
            .map(|sym: Symbol<FnGetProcAddress>| *sym)
    }
}

#[cfg(target_os = "windows")]
fn proc_address_fn(lib: &Library) -> Option<FnGetProcAddress> {
    unsafe {
        lib.get(b"wglGetProcAddress\0")
            .ok()
            .map(|sym: Symbol<FnGetProcAddress>| *sym)
    }
}

#[cfg(target_os = "macos")]
fn proc_address_fn(_lib: &Library) -> Option<FnGetProcAddress> {
    // The framework exports every entry point directly.
    None
}

fn resolve(lib: &Library, get_proc: Option<FnGetProcAddress>, name: &str) -> *const c_void {
    let Ok(symbol) = CString::new(name) else {
        return std::ptr::null();
    };
    if let Some(get_proc) = get_proc {
        let ptr = unsafe { get_proc(symbol.as_ptr() as *const u8) };
        // wglGetProcAddress reports failure with small non-null sentinels.
        if !matches!(ptr as isize, -1..=3) {
            return ptr;
        }
    }
    unsafe {
        lib.get::<*const c_void>(symbol.as_bytes_with_nul())
            .map(|sym| *sym)
            .unwrap_or(std::ptr::null())
    }
}

//! Engines loaded from EVMC shared libraries.
//!
//! The loader resolves `evmc_create_<name>` first, where `<name>` comes from
//! the library file name with any `lib` prefix and extension removed and
//! dashes turned into underscores, then falls back to plain `evmc_create`.

#![allow(unsafe_code)]

use std::ffi::CStr;
use std::fmt;
use std::path::Path;
use std::ptr::NonNull;

use libloading::{Library, Symbol};
use tracing::{debug, info, warn};

use evmc_bridge_common::BridgeError;

use crate::engine::{HostContext, VmEngine};
use crate::ffi::{self, EVMC_ABI_VERSION, HostBinding};
use crate::types::{Address, ExecutionResult, Message, Revision, StatusCode};

/// Fallback create symbol every EVMC library may export.
const GENERIC_CREATE_SYMBOL: &str = "evmc_create";

/// Derive the name-specific create symbol from a library path.
pub fn create_symbol_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = file_name.strip_prefix("lib").unwrap_or(&file_name);
    let stem = stem.split('.').next().unwrap_or_default();
    format!("{GENERIC_CREATE_SYMBOL}_{}", stem.replace('-', "_"))
}

/// An EVMC engine living in a shared library.
pub struct DynamicEngine {
    vm: NonNull<ffi::evmc_vm>,
    host_interface: Box<ffi::evmc_host_interface>,
    name: String,
    version: String,
    path: String,
    // Dropped after `vm` is destroyed. `None` when the engine is linked in.
    _library: Option<Library>,
}

// One instance serves concurrent executions from several workers.
unsafe impl Send for DynamicEngine {}
unsafe impl Sync for DynamicEngine {}

impl DynamicEngine {
    /// Open the library at `path` and create an engine instance.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The library cannot be opened
    /// - Neither create symbol is exported
    /// - The create function returns null
    /// - The engine speaks a different ABI version
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        let location = path.display().to_string();

        let library = unsafe { Library::new(path) }
            .map_err(|e| BridgeError::library_load(&location, e.to_string()))?;

        let symbol = create_symbol_name(path);
        let create = unsafe { Self::resolve_create(&library, &symbol) }.ok_or_else(|| {
            BridgeError::MissingCreateSymbol {
                path: location.clone(),
                symbol: symbol.clone(),
            }
        })?;

        let vm = NonNull::new(unsafe { create() })
            .ok_or_else(|| BridgeError::library_load(&location, "create function returned null"))?;

        unsafe { Self::bind(vm, Some(library), location) }
    }

    /// Take ownership of a created engine after checking its ABI version.
    ///
    /// # Safety
    ///
    /// `vm` must come from an EVMC create function and must not be owned
    /// elsewhere. It is destroyed on error.
    unsafe fn bind(
        vm: NonNull<ffi::evmc_vm>,
        library: Option<Library>,
        location: String,
    ) -> Result<Self, BridgeError> {
        let (abi_version, name, version) = unsafe {
            let raw = vm.as_ref();
            (raw.abi_version, c_string(raw.name), c_string(raw.version))
        };

        if abi_version != EVMC_ABI_VERSION {
            unsafe { destroy(vm) };
            return Err(BridgeError::AbiMismatch {
                expected: EVMC_ABI_VERSION,
                found: abi_version,
            });
        }

        info!(path = %location, name = %name, version = %version, "EVMC engine loaded");

        Ok(Self {
            vm,
            host_interface: Box::new(ffi::host_interface()),
            name,
            version,
            path: location,
            _library: library,
        })
    }

    unsafe fn resolve_create(library: &Library, symbol: &str) -> Option<ffi::evmc_create_fn> {
        let specific: Result<Symbol<'_, ffi::evmc_create_fn>, _> =
            unsafe { library.get(symbol.as_bytes()) };
        if let Ok(create) = specific {
            return Some(*create);
        }
        debug!(symbol, "Name-specific create symbol not found, trying evmc_create");
        let generic: Result<Symbol<'_, ffi::evmc_create_fn>, _> =
            unsafe { library.get(GENERIC_CREATE_SYMBOL.as_bytes()) };
        generic.ok().map(|create| *create)
    }

    /// Path the engine was loaded from.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Copy a raw result into an owned one and release it.
    ///
    /// # Safety
    ///
    /// `raw` must be a result returned by the engine that has not been
    /// released yet.
    unsafe fn take_result(raw: &ffi::evmc_result) -> ExecutionResult {
        let status = StatusCode::from_code(i64::from(raw.status_code)).unwrap_or_else(|_| {
            warn!(
                status_code = raw.status_code,
                "Engine returned an unknown status code"
            );
            StatusCode::InternalError
        });

        let output = if raw.output_data.is_null() || raw.output_size == 0 {
            Vec::new()
        } else {
            unsafe { std::slice::from_raw_parts(raw.output_data, raw.output_size) }.to_vec()
        };

        let result = ExecutionResult {
            status,
            gas_left: raw.gas_left,
            output: output.into_boxed_slice(),
            create_address: status
                .is_success()
                .then(|| Address::from(raw.create_address)),
        };

        if let Some(release) = raw.release {
            unsafe { release(raw) };
        }

        result
    }
}

impl VmEngine for DynamicEngine {
    fn execute(
        &self,
        host: &dyn HostContext,
        revision: Revision,
        message: &Message,
        code: &[u8],
    ) -> ExecutionResult {
        let Some(execute) = (unsafe { self.vm.as_ref() }).execute else {
            warn!(engine = %self.name, "Engine has no execute function");
            return ExecutionResult::new(StatusCode::InternalError, 0, Vec::new());
        };

        let mut binding = HostBinding { host };
        let raw_message = ffi::message_to_ffi(message);

        unsafe {
            let result = execute(
                self.vm.as_ptr(),
                &raw const *self.host_interface,
                binding.as_context(),
                revision.code(),
                &raw const raw_message,
                code.as_ptr(),
                code.len(),
            );
            Self::take_result(&result)
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }
}

impl Drop for DynamicEngine {
    fn drop(&mut self) {
        debug!(engine = %self.name, "Destroying EVMC engine");
        unsafe { destroy(self.vm) };
    }
}

impl fmt::Debug for DynamicEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicEngine")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

unsafe fn destroy(vm: NonNull<ffi::evmc_vm>) {
    unsafe {
        if let Some(destroy) = vm.as_ref().destroy {
            destroy(vm.as_ptr());
        }
    }
}

unsafe fn c_string(raw: *const std::ffi::c_char) -> String {
    if raw.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned()
}

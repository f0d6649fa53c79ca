//! ROCm/HIP memory backend
//!
//! Device chunks come from `hipMalloc`, host chunks from pinned
//! `hipHostMalloc` so they can be used for asynchronous transfers.
//!
//! `hipSetDevice()` only affects the calling thread, and the pool may call
//! into the backend from any worker thread. The chosen device is therefore
//! activated before every device allocation and free.

use std::ffi::c_void;
use std::ptr::{self, NonNull};

use super::{BackendError, BackendResult, MemoryBackend, MemoryKind};

mod ffi {
    use std::ffi::c_void;

    #[link(name = "amdhip64")]
    extern "C" {
        pub fn hipSetDevice(deviceId: i32) -> i32;
        pub fn hipGetDeviceCount(count: *mut i32) -> i32;
        pub fn hipMalloc(ptr: *mut *mut c_void, size: usize) -> i32;
        pub fn hipFree(ptr: *mut c_void) -> i32;
        pub fn hipHostMalloc(ptr: *mut *mut c_void, size: usize, flags: u32) -> i32;
        pub fn hipHostFree(ptr: *mut c_void) -> i32;
    }

    pub const HIP_SUCCESS: i32 = 0;
    pub const HIP_ERROR_OUT_OF_MEMORY: i32 = 2;
    pub const HIP_ERROR_INVALID_DEVICE: i32 = 101;
    pub const HIP_HOST_MALLOC_DEFAULT: u32 = 0x0;
}

/// Backend for AMD GPUs through the HIP runtime
#[derive(Debug, Clone)]
pub struct HipBackend {
    device_id: i32,
}

impl HipBackend {
    /// Bind the backend to `device_id`, checking that the device exists
    pub fn new(device_id: i32) -> BackendResult<Self> {
        let mut count = 0i32;
        let result = unsafe { ffi::hipGetDeviceCount(&mut count) };
        if result != ffi::HIP_SUCCESS {
            return Err(BackendError::Hip {
                call: "hipGetDeviceCount",
                code: result,
            });
        }
        if device_id < 0 || device_id >= count {
            tracing::error!(
                "HipBackend::new: device {} requested but only {} present",
                device_id,
                count
            );
            return Err(BackendError::Hip {
                call: "hipSetDevice",
                code: ffi::HIP_ERROR_INVALID_DEVICE,
            });
        }

        let backend = Self { device_id };
        backend.activate_device()?;
        tracing::debug!("HipBackend: using device {} of {}", device_id, count);
        Ok(backend)
    }

    pub fn device_id(&self) -> i32 {
        self.device_id
    }

    fn activate_device(&self) -> BackendResult<()> {
        let result = unsafe { ffi::hipSetDevice(self.device_id) };
        if result != ffi::HIP_SUCCESS {
            return Err(BackendError::Hip {
                call: "hipSetDevice",
                code: result,
            });
        }
        Ok(())
    }
}

impl MemoryBackend for HipBackend {
    fn allocate(&self, size: usize, kind: MemoryKind) -> BackendResult<NonNull<u8>> {
        let mut raw: *mut c_void = ptr::null_mut();

        let (call, result) = match kind {
            MemoryKind::Device => {
                self.activate_device()?;
                ("hipMalloc", unsafe { ffi::hipMalloc(&mut raw, size) })
            }
            MemoryKind::Host => ("hipHostMalloc", unsafe {
                ffi::hipHostMalloc(&mut raw, size, ffi::HIP_HOST_MALLOC_DEFAULT)
            }),
        };
        tracing::trace!("HipBackend: {} returned {} for {} bytes", call, result, size);

        if result == ffi::HIP_ERROR_OUT_OF_MEMORY {
            return Err(BackendError::OutOfMemory { size, kind });
        }
        if result != ffi::HIP_SUCCESS {
            return Err(BackendError::Hip { call, code: result });
        }
        NonNull::new(raw.cast::<u8>()).ok_or(BackendError::OutOfMemory { size, kind })
    }

    fn release(&self, ptr: NonNull<u8>, size: usize, kind: MemoryKind) {
        let raw = ptr.as_ptr().cast::<c_void>();
        let (call, result) = match kind {
            MemoryKind::Device => {
                if let Err(err) = self.activate_device() {
                    tracing::error!("HipBackend: {} while freeing {:?}", err, ptr);
                }
                ("hipFree", unsafe { ffi::hipFree(raw) })
            }
            MemoryKind::Host => ("hipHostFree", unsafe { ffi::hipHostFree(raw) }),
        };

        if result != ffi::HIP_SUCCESS {
            // Release must not fail; a driver error here leaks the region
            tracing::error!(
                "HipBackend: {} failed with code {} for {} bytes at {:?}",
                call,
                result,
                size,
                ptr
            );
        }
    }

    fn name(&self) -> &'static str {
        "hip"
    }
}

//! 缓冲区管理
//!
//! Send/receive buffers living in one memory space (host or device). Size and
//! memory space are fixed at allocation; nothing here resizes or relocates.

mod host;
#[cfg(feature = "cuda")]
mod device;

pub use host::HostBuffer;
#[cfg(feature = "cuda")]
pub use device::{DeviceBuffer, device_count};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Memory-layer failures.
#[derive(Debug, Error)]
pub enum MemError {
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("cannot copy between {from:?} and {to:?} buffers")]
    SpaceMismatch { from: MemorySpace, to: MemorySpace },

    #[error("cannot allocate {len} bytes")]
    Alloc { len: usize },

    #[error("device runtime error during {op}: {reason}")]
    Device { op: &'static str, reason: String },
}

/// Where a buffer lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySpace {
    Host,
    Device,
}

/// One contiguous region of exactly `len` bytes.
#[derive(Debug)]
pub enum Buffer {
    Host(HostBuffer),
    #[cfg(feature = "cuda")]
    Device(DeviceBuffer),
}

impl Buffer {
    /// Allocate a zero-initialized buffer of `len` bytes.
    ///
    /// `device` is the accelerator ordinal and is ignored for host memory.
    pub fn allocate(space: MemorySpace, len: usize, device: usize) -> crate::Result<Self> {
        match space {
            MemorySpace::Host => Ok(Self::Host(HostBuffer::zeroed(len)?)),
            #[cfg(feature = "cuda")]
            MemorySpace::Device => Ok(Self::Device(DeviceBuffer::zeroed(device, len)?)),
            #[cfg(not(feature = "cuda"))]
            MemorySpace::Device => {
                let _ = device;
                Err(crate::BenchError::DeviceUnsupported)
            }
        }
    }

    pub fn space(&self) -> MemorySpace {
        match self {
            Self::Host(_) => MemorySpace::Host,
            #[cfg(feature = "cuda")]
            Self::Device(_) => MemorySpace::Device,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Host(b) => b.len(),
            #[cfg(feature = "cuda")]
            Self::Device(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn zero(&mut self) -> Result<(), MemError> {
        match self {
            Self::Host(b) => {
                b.zero();
                Ok(())
            }
            #[cfg(feature = "cuda")]
            Self::Device(b) => b.zero(),
        }
    }

    /// Overwrite the whole buffer with `src`, which must have the same length.
    pub fn fill_from(&mut self, src: &[u8]) -> Result<(), MemError> {
        if src.len() != self.len() {
            return Err(MemError::SizeMismatch {
                expected: self.len(),
                actual: src.len(),
            });
        }
        match self {
            Self::Host(b) => {
                b.as_mut_slice().copy_from_slice(src);
                Ok(())
            }
            #[cfg(feature = "cuda")]
            Self::Device(b) => b.fill_from(src),
        }
    }

    /// Read the buffer content back into host memory.
    pub fn to_vec(&mut self) -> Result<Vec<u8>, MemError> {
        match self {
            Self::Host(b) => Ok(b.as_slice().to_vec()),
            #[cfg(feature = "cuda")]
            Self::Device(b) => b.to_vec(),
        }
    }

    /// Direct copy within one memory space, bypassing the transfer path.
    pub fn copy_from(&mut self, src: &Buffer) -> Result<(), MemError> {
        if src.len() != self.len() {
            return Err(MemError::SizeMismatch {
                expected: self.len(),
                actual: src.len(),
            });
        }
        match (self, src) {
            (Self::Host(dst), Self::Host(src)) => {
                dst.as_mut_slice().copy_from_slice(src.as_slice());
                Ok(())
            }
            #[cfg(feature = "cuda")]
            (Self::Device(dst), Self::Device(src)) => dst.copy_from(src),
            #[cfg(feature = "cuda")]
            (dst, src) => Err(MemError::SpaceMismatch {
                from: src.space(),
                to: dst.space(),
            }),
        }
    }

    /// Host-visible bytes to hand to the transfer primitive.
    ///
    /// Device buffers are staged into their host shadow first.
    pub fn wire_out(&mut self) -> Result<&[u8], MemError> {
        match self {
            Self::Host(b) => Ok(b.as_slice()),
            #[cfg(feature = "cuda")]
            Self::Device(b) => b.stage_out(),
        }
    }

    /// Host-visible region the transfer primitive writes into.
    /// Must be followed by [`Buffer::commit_wire`].
    pub fn wire_in(&mut self) -> &mut [u8] {
        match self {
            Self::Host(b) => b.as_mut_slice(),
            #[cfg(feature = "cuda")]
            Self::Device(b) => b.staging_mut(),
        }
    }

    /// Publish what the transfer wrote through [`Buffer::wire_in`].
    pub fn commit_wire(&mut self) -> Result<(), MemError> {
        match self {
            Self::Host(_) => Ok(()),
            #[cfg(feature = "cuda")]
            Self::Device(b) => b.stage_in(),
        }
    }
}

/// The two buffers owned by one rank for the whole run.
#[derive(Debug)]
pub struct BufferPair {
    pub send: Buffer,
    pub recv: Buffer,
}

impl BufferPair {
    pub fn allocate(space: MemorySpace, len: usize, device: usize) -> crate::Result<Self> {
        let send = Buffer::allocate(space, len, device)?;
        let recv = Buffer::allocate(space, len, device)?;
        debug!(?space, len, device, "buffers allocated");
        Ok(Self { send, recv })
    }

    pub fn len(&self) -> usize {
        self.send.len()
    }

    pub fn is_empty(&self) -> bool {
        self.send.is_empty()
    }

    pub fn space(&self) -> MemorySpace {
        self.send.space()
    }

    /// Free both buffers. Consuming `self` makes a second release impossible.
    pub fn release(self) {
        debug!(space = ?self.space(), len = self.len(), "buffers released");
        drop(self);
    }
}

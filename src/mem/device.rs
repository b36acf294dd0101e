//! Device memory buffer backed by cudarc.
//!
//! Every operation synchronizes the stream before returning, so callers can
//! treat allocation, zeroing, copies and release as complete on return.

use std::sync::Arc;

use cudarc::driver::{CudaContext, CudaSlice, CudaStream, DriverError};

use super::MemError;

fn device_err(op: &'static str) -> impl FnOnce(DriverError) -> MemError {
    move |e| MemError::Device {
        op,
        reason: format!("{e:?}"),
    }
}

/// Number of devices visible to this process.
pub fn device_count() -> Result<usize, MemError> {
    let n = CudaContext::device_count().map_err(device_err("device_count"))?;
    Ok(usize::try_from(n).unwrap_or(0))
}

pub struct DeviceBuffer {
    ordinal: usize,
    stream: Arc<CudaStream>,
    data: CudaSlice<u8>,
    /// Host shadow used by the transfer path; same length as `data`.
    staging: Vec<u8>,
}

impl std::fmt::Debug for DeviceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("ordinal", &self.ordinal)
            .field("len", &self.staging.len())
            .finish()
    }
}

impl DeviceBuffer {
    pub fn zeroed(ordinal: usize, len: usize) -> Result<Self, MemError> {
        let ctx = CudaContext::new(ordinal).map_err(device_err("context"))?;
        let stream = ctx.default_stream();
        let data = stream
            .alloc_zeros::<u8>(len)
            .map_err(device_err("alloc_zeros"))?;
        stream.synchronize().map_err(device_err("synchronize"))?;
        Ok(Self {
            ordinal,
            stream,
            data,
            staging: super::host::try_zeroed_vec(len)?,
        })
    }

    pub fn len(&self) -> usize {
        self.staging.len()
    }

    pub fn zero(&mut self) -> Result<(), MemError> {
        self.stream
            .memset_zeros(&mut self.data)
            .map_err(device_err("memset_zeros"))?;
        self.staging.fill(0);
        self.sync()
    }

    pub fn fill_from(&mut self, src: &[u8]) -> Result<(), MemError> {
        self.stream
            .memcpy_htod(src, &mut self.data)
            .map_err(device_err("memcpy_htod"))?;
        self.sync()
    }

    pub fn to_vec(&mut self) -> Result<Vec<u8>, MemError> {
        self.stage_out().map(<[u8]>::to_vec)
    }

    pub fn copy_from(&mut self, src: &DeviceBuffer) -> Result<(), MemError> {
        self.stream
            .memcpy_dtod(&src.data, &mut self.data)
            .map_err(device_err("memcpy_dtod"))?;
        self.sync()
    }

    pub fn stage_out(&mut self) -> Result<&[u8], MemError> {
        self.stream
            .memcpy_dtoh(&self.data, &mut self.staging)
            .map_err(device_err("memcpy_dtoh"))?;
        self.sync()?;
        Ok(&self.staging)
    }

    pub fn staging_mut(&mut self) -> &mut [u8] {
        &mut self.staging
    }

    pub fn stage_in(&mut self) -> Result<(), MemError> {
        self.stream
            .memcpy_htod(&self.staging, &mut self.data)
            .map_err(device_err("memcpy_htod"))?;
        self.sync()
    }

    fn sync(&self) -> Result<(), MemError> {
        self.stream
            .synchronize()
            .map_err(device_err("synchronize"))
    }
}

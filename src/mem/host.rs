//! Host memory buffer.

use super::MemError;

/// Zero-filled bytes, or [`MemError::Alloc`] when the allocator refuses `len`.
pub(crate) fn try_zeroed_vec(len: usize) -> Result<Vec<u8>, MemError> {
    let mut bytes = Vec::new();
    bytes
        .try_reserve_exact(len)
        .map_err(|_| MemError::Alloc { len })?;
    bytes.resize(len, 0);
    Ok(bytes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBuffer {
    bytes: Box<[u8]>,
}

impl HostBuffer {
    pub fn zeroed(len: usize) -> Result<Self, MemError> {
        Ok(Self {
            bytes: try_zeroed_vec(len)?.into_boxed_slice(),
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn zero(&mut self) {
        self.bytes.fill(0);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

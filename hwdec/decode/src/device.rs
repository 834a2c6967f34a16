/*!
    Device memory and copy streams.

    The session never talks to a GPU runtime directly. Everything it needs
    from one (allocations, pitched 2D copies queued on a stream, blocking
    downloads and stream synchronization) goes through [`DeviceStream`].
    [`HostStream`] implements the trait on host memory with deferred copies,
    which is what the session uses when no GPU runtime is plugged in.
*/

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use hwdec_types::{Error, Result};

/**
    Address in device memory: an allocation handle plus a byte offset.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DevicePtr {
    pub handle: u64,
    pub offset: usize,
}

impl DevicePtr {
    #[inline]
    pub const fn new(handle: u64) -> Self {
        Self { handle, offset: 0 }
    }

    /**
        Pointer `bytes` further into the same allocation.
    */
    #[inline]
    pub const fn add(self, bytes: usize) -> Self {
        Self {
            handle: self.handle,
            offset: self.offset + bytes,
        }
    }
}

/**
    Source of a 2D copy.
*/
#[derive(Clone, Copy, Debug)]
pub enum CopySource<'a> {
    /// Host memory. The stream must not read it after `copy_2d_async` returns.
    Host(&'a [u8]),
    /// Device memory on the same device.
    Device(DevicePtr),
}

/**
    Shape of a pitched 2D copy.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Copy2d {
    pub src_pitch: usize,
    pub dst_pitch: usize,
    /// Bytes copied per row
    pub width_bytes: usize,
    pub rows: usize,
}

impl Copy2d {
    /**
        A single contiguous copy of `len` bytes.
    */
    pub const fn linear(len: usize) -> Self {
        Self {
            src_pitch: len,
            dst_pitch: len,
            width_bytes: len,
            rows: 1,
        }
    }

    /**
        Bytes a source or destination with `pitch` must hold for this copy.
    */
    pub const fn extent(&self, pitch: usize) -> usize {
        if self.rows == 0 {
            0
        } else {
            (self.rows - 1) * pitch + self.width_bytes
        }
    }
}

/**
    An ordered queue of device operations plus the allocator behind it.

    Copies submitted with `copy_2d_async` complete in submission order and
    are only guaranteed to be visible after `synchronize`.
*/
pub trait DeviceStream: Send + Sync {
    /// Allocate `len` bytes of device memory.
    fn alloc(&self, len: usize) -> Result<DevicePtr>;

    /// Free an allocation made by `alloc`.
    fn free(&self, ptr: DevicePtr);

    /// Queue a pitched copy into device memory at `dst`.
    fn copy_2d_async(&self, src: CopySource<'_>, dst: DevicePtr, copy: Copy2d) -> Result<()>;

    /// Copy device memory into `dst`, waiting for all queued work first.
    fn download_2d(&self, src: DevicePtr, dst: &mut [u8], copy: Copy2d) -> Result<()>;

    /// Block until every queued operation has completed.
    fn synchronize(&self) -> Result<()>;
}

/**
    A device allocation that is freed when dropped.
*/
pub struct DeviceBuffer {
    ptr: DevicePtr,
    len: usize,
    stream: Arc<dyn DeviceStream>,
}

impl DeviceBuffer {
    /**
        Allocate `len` bytes on the stream's device.
    */
    pub fn alloc(stream: &Arc<dyn DeviceStream>, len: usize) -> Result<Self> {
        let ptr = stream.alloc(len)?;
        debug!(len, handle = ptr.handle, "allocated device buffer");
        Ok(Self {
            ptr,
            len,
            stream: Arc::clone(stream),
        })
    }

    #[inline]
    pub fn ptr(&self) -> DevicePtr {
        self.ptr
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /**
        The stream this buffer was allocated on.
    */
    pub fn stream(&self) -> &Arc<dyn DeviceStream> {
        &self.stream
    }

    /**
        Copy the whole buffer to a new host vector.
    */
    pub fn to_host(&self) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.len];
        self.stream
            .download_2d(self.ptr, &mut out, Copy2d::linear(self.len))?;
        Ok(out)
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        trace!(handle = self.ptr.handle, "freeing device buffer");
        self.stream.free(self.ptr);
    }
}

impl fmt::Debug for DeviceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

enum PendingSource {
    /// Host rows captured at submission, packed at `width_bytes`
    Staged(Vec<u8>),
    Device(DevicePtr),
}

struct PendingCopy {
    src: PendingSource,
    dst: DevicePtr,
    copy: Copy2d,
}

impl PendingCopy {
    fn touches(&self, handle: u64) -> bool {
        self.dst.handle == handle
            || matches!(self.src, PendingSource::Device(src) if src.handle == handle)
    }
}

#[derive(Default)]
struct HostStreamState {
    next_handle: u64,
    allocated: usize,
    buffers: HashMap<u64, Vec<u8>>,
    pending: Vec<PendingCopy>,
}

/**
    A [`DeviceStream`] backed by host memory.

    Host-to-device copies stage their source at submission (the way a
    pinned staging buffer would); all copies are applied in order on
    `synchronize`.
*/
#[derive(Default)]
pub struct HostStream {
    state: Mutex<HostStreamState>,
    limit: Option<usize>,
}

impl HostStream {
    pub fn new() -> Self {
        Self::default()
    }

    /**
        A stream that refuses allocations beyond `bytes` in total.
    */
    pub fn with_memory_limit(bytes: usize) -> Self {
        Self {
            state: Mutex::new(HostStreamState::default()),
            limit: Some(bytes),
        }
    }

    /**
        Number of live allocations.
    */
    pub fn allocation_count(&self) -> usize {
        self.state.lock().buffers.len()
    }

    /**
        Number of queued, not yet synchronized copies.
    */
    pub fn pending_copies(&self) -> usize {
        self.state.lock().pending.len()
    }
}

fn buffer_range(
    buffers: &HashMap<u64, Vec<u8>>,
    ptr: DevicePtr,
    extent: usize,
) -> Result<std::ops::Range<usize>> {
    let buffer = buffers
        .get(&ptr.handle)
        .ok_or_else(|| Error::invalid_parameter(format!("unknown device buffer {}", ptr.handle)))?;
    let end = ptr.offset + extent;
    if end > buffer.len() {
        return Err(Error::invalid_parameter(format!(
            "device access {}..{end} outside buffer of {} bytes",
            ptr.offset,
            buffer.len()
        )));
    }
    Ok(ptr.offset..end)
}

impl HostStreamState {
    fn apply(&mut self, pending: PendingCopy) -> Result<()> {
        let PendingCopy { src, dst, copy } = pending;
        // Read the source rows first; device copies may alias the destination.
        let (rows, src_pitch) = match src {
            PendingSource::Staged(bytes) => (bytes, copy.width_bytes),
            PendingSource::Device(ptr) => {
                let range = buffer_range(&self.buffers, ptr, copy.extent(copy.src_pitch))?;
                let mut staged = Vec::with_capacity(copy.width_bytes * copy.rows);
                let src = &self.buffers[&ptr.handle][range];
                for row in 0..copy.rows {
                    let start = row * copy.src_pitch;
                    staged.extend_from_slice(&src[start..start + copy.width_bytes]);
                }
                (staged, copy.width_bytes)
            }
        };

        let range = buffer_range(&self.buffers, dst, copy.extent(copy.dst_pitch))?;
        let Some(buffer) = self.buffers.get_mut(&dst.handle) else {
            return Err(Error::invalid_parameter("destination buffer vanished"));
        };
        let dst = &mut buffer[range];
        for row in 0..copy.rows {
            let from = row * src_pitch;
            let to = row * copy.dst_pitch;
            dst[to..to + copy.width_bytes].copy_from_slice(&rows[from..from + copy.width_bytes]);
        }
        Ok(())
    }

    /// Applies every pending copy; the first failure is reported once all
    /// have been attempted.
    fn flush(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        let mut first_error = None;
        for copy in pending {
            if let Err(e) = self.apply(copy) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl DeviceStream for HostStream {
    fn alloc(&self, len: usize) -> Result<DevicePtr> {
        let mut state = self.state.lock();
        if self.limit.is_some_and(|limit| state.allocated + len > limit) {
            return Err(Error::ResourceExhausted { requested: len });
        }
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(len)
            .map_err(|_| Error::ResourceExhausted { requested: len })?;
        buffer.resize(len, 0);

        state.next_handle += 1;
        let handle = state.next_handle;
        state.allocated += len;
        state.buffers.insert(handle, buffer);
        Ok(DevicePtr::new(handle))
    }

    fn free(&self, ptr: DevicePtr) {
        let mut state = self.state.lock();
        if let Some(buffer) = state.buffers.remove(&ptr.handle) {
            state.allocated -= buffer.len();
        }
        let queued = state.pending.len();
        state.pending.retain(|copy| !copy.touches(ptr.handle));
        let dropped = queued - state.pending.len();
        if dropped > 0 {
            debug!(handle = ptr.handle, dropped, "dropped copies queued on a freed buffer");
        }
    }

    fn copy_2d_async(&self, src: CopySource<'_>, dst: DevicePtr, copy: Copy2d) -> Result<()> {
        if copy.rows > 1 && (copy.width_bytes > copy.dst_pitch || copy.width_bytes > copy.src_pitch)
        {
            return Err(Error::invalid_parameter("copy row wider than its pitch"));
        }
        let src = match src {
            CopySource::Host(bytes) => {
                if bytes.len() < copy.extent(copy.src_pitch) {
                    return Err(Error::invalid_parameter(format!(
                        "host source holds {} bytes, copy needs {}",
                        bytes.len(),
                        copy.extent(copy.src_pitch)
                    )));
                }
                let mut staged = Vec::with_capacity(copy.width_bytes * copy.rows);
                for row in 0..copy.rows {
                    let start = row * copy.src_pitch;
                    staged.extend_from_slice(&bytes[start..start + copy.width_bytes]);
                }
                PendingSource::Staged(staged)
            }
            CopySource::Device(ptr) => PendingSource::Device(ptr),
        };
        self.state.lock().pending.push(PendingCopy { src, dst, copy });
        Ok(())
    }

    fn download_2d(&self, src: DevicePtr, dst: &mut [u8], copy: Copy2d) -> Result<()> {
        let mut state = self.state.lock();
        state.flush()?;
        if dst.len() < copy.extent(copy.dst_pitch) {
            return Err(Error::invalid_parameter(format!(
                "host destination holds {} bytes, copy needs {}",
                dst.len(),
                copy.extent(copy.dst_pitch)
            )));
        }
        let range = buffer_range(&state.buffers, src, copy.extent(copy.src_pitch))?;
        let bytes = &state.buffers[&src.handle][range];
        for row in 0..copy.rows {
            let from = row * copy.src_pitch;
            let to = row * copy.dst_pitch;
            dst[to..to + copy.width_bytes].copy_from_slice(&bytes[from..from + copy.width_bytes]);
        }
        Ok(())
    }

    fn synchronize(&self) -> Result<()> {
        let mut state = self.state.lock();
        let count = state.pending.len();
        state.flush()?;
        trace!(count, "host stream synchronized");
        Ok(())
    }
}

/*!
    Frame buffer pool.

    Decoded pictures are materialized into slots in display order and handed
    to the caller FIFO. Copied memory kinds recycle their slots on the next
    decode call; driver-internal surfaces stay mapped until released.
*/

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use hwdec_types::{Error, MemoryKind, Pts, Result};

use crate::device::{Copy2d, DeviceBuffer, DevicePtr, DeviceStream};

/**
    A driver-owned decoded surface, valid until it is unmapped.
*/
#[derive(Clone)]
pub struct MappedPicture {
    /// Decode surface index the mapping belongs to
    pub picture_index: u32,
    /// Start of the luma plane; chroma planes follow at `pitch * vstride`
    pub ptr: DevicePtr,
    pub pitch: u32,
    pub vstride: u32,
    /// Size of the mapped surface in bytes
    pub len: usize,
    pub stream: Arc<dyn DeviceStream>,
}

impl fmt::Debug for MappedPicture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedPicture")
            .field("picture_index", &self.picture_index)
            .field("ptr", &self.ptr)
            .field("pitch", &self.pitch)
            .field("vstride", &self.vstride)
            .finish()
    }
}

/**
    Backing memory of a pool slot.
*/
#[derive(Debug)]
pub enum Surface {
    /// Session-owned host copy
    Host(Box<[u8]>),
    /// Session-owned device copy
    Device(DeviceBuffer),
    /// Driver surface, mapped in place
    Mapped(MappedPicture),
    /// Decoded but not mapped
    NotMapped,
}

impl Surface {
    /**
        Size of the backing memory in bytes.
    */
    pub fn len(&self) -> usize {
        match self {
            Self::Host(bytes) => bytes.len(),
            Self::Device(buffer) => buffer.len(),
            Self::Mapped(mapped) => mapped.len,
            Self::NotMapped => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/**
    A frame handed out by the session.

    The frame stays readable while held, but its contents are only
    meaningful until it is released (driver surfaces are unmapped on
    release, copied slots may be refilled by a later decode call).
*/
#[derive(Clone, Debug)]
pub struct DecodedFrame {
    pts: Pts,
    picture_index: u32,
    surface: Arc<Surface>,
}

impl DecodedFrame {
    #[inline]
    pub fn pts(&self) -> Pts {
        self.pts
    }

    #[inline]
    pub fn picture_index(&self) -> u32 {
        self.picture_index
    }

    #[inline]
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /**
        Frame bytes if the frame lives in host memory.
    */
    pub fn host_bytes(&self) -> Option<&[u8]> {
        match &*self.surface {
            Surface::Host(bytes) => Some(bytes),
            _ => None,
        }
    }

    /**
        Device address of the frame if it lives in device memory.
    */
    pub fn device_ptr(&self) -> Option<DevicePtr> {
        match &*self.surface {
            Surface::Device(buffer) => Some(buffer.ptr()),
            Surface::Mapped(mapped) => Some(mapped.ptr),
            _ => None,
        }
    }

    /**
        Copy the whole surface into host memory.
    */
    pub fn copy_to_host(&self) -> Result<Vec<u8>> {
        match &*self.surface {
            Surface::Host(bytes) => Ok(bytes.to_vec()),
            Surface::Device(buffer) => buffer.to_host(),
            Surface::Mapped(mapped) => {
                let mut out = vec![0u8; mapped.len];
                mapped
                    .stream
                    .download_2d(mapped.ptr, &mut out, Copy2d::linear(mapped.len))?;
                Ok(out)
            }
            Surface::NotMapped => Err(Error::unsupported("frame was decoded without mapping")),
        }
    }
}

/**
    A slot removed from the pool whose driver resources must be returned.
*/
#[derive(Debug)]
pub struct Evicted {
    pub pts: Pts,
    pub picture_index: u32,
    pub surface: Arc<Surface>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotState {
    /// Materialized, not yet handed out
    Ready,
    /// Handed out, not yet recycled or released
    Returned,
    /// Free for the next materialization
    Recyclable,
}

struct Slot {
    seq: u64,
    pts: Pts,
    picture_index: u32,
    state: SlotState,
    surface: Arc<Surface>,
}

#[derive(Default)]
struct PoolState {
    slots: Vec<Slot>,
    next_seq: u64,
    output_count: usize,
}

impl PoolState {
    fn oldest(&self, filter: impl Fn(SlotState) -> bool) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| filter(slot.state))
            .min_by_key(|(_, slot)| slot.seq)
            .map(|(index, _)| index)
    }
}

/**
    Ordered collection of decoded-frame slots.

    All slot bookkeeping happens under one mutex, which is never held while
    a surface is being filled.
*/
pub struct FramePool {
    mem_kind: MemoryKind,
    state: Mutex<PoolState>,
}

impl FramePool {
    pub fn new(mem_kind: MemoryKind) -> Self {
        Self {
            mem_kind,
            state: Mutex::new(PoolState::default()),
        }
    }

    #[inline]
    pub fn mem_kind(&self) -> MemoryKind {
        self.mem_kind
    }

    /**
        Start a decode call: frames handed out by earlier calls become
        recyclable. Driver-internal surfaces stay until released.
    */
    pub fn begin_round(&self) {
        if self.mem_kind == MemoryKind::DeviceInternal {
            return;
        }
        let mut state = self.state.lock();
        for slot in &mut state.slots {
            if slot.state == SlotState::Returned {
                slot.state = SlotState::Recyclable;
            }
        }
    }

    /**
        Materialize a decoded picture into a slot.

        A recyclable slot of exactly `frame_size` bytes is reused if one is
        free, otherwise `alloc` creates new backing memory. `fill` then writes
        the picture into it. If `fill` fails, a reused slot goes back to the
        pool as recyclable, so the pool never shrinks outside a flush.
    */
    pub fn materialize<A, F>(
        &self,
        pts: Pts,
        picture_index: u32,
        frame_size: usize,
        alloc: A,
        fill: F,
    ) -> Result<()>
    where
        A: FnOnce() -> Result<Surface>,
        F: FnOnce(&mut Surface) -> Result<()>,
    {
        let recycled = {
            let mut state = self.state.lock();
            let candidate = state.slots.iter().position(|slot| {
                slot.state == SlotState::Recyclable
                    && slot.surface.len() == frame_size
                    && Arc::strong_count(&slot.surface) == 1
            });
            candidate.and_then(|index| {
                let slot = state.slots.swap_remove(index);
                let seq = slot.seq;
                Arc::into_inner(slot.surface).map(|surface| (seq, surface))
            })
        };

        let (recycled_seq, mut surface) = match recycled {
            Some((seq, surface)) => (Some(seq), surface),
            None => {
                trace!(frame_size, "growing frame pool");
                (None, alloc()?)
            }
        };

        if let Err(e) = fill(&mut surface) {
            if let Some(seq) = recycled_seq {
                self.state.lock().slots.push(Slot {
                    seq,
                    pts,
                    picture_index,
                    state: SlotState::Recyclable,
                    surface: Arc::new(surface),
                });
            }
            return Err(e);
        }

        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.output_count += 1;
        state.slots.push(Slot {
            seq,
            pts,
            picture_index,
            state: SlotState::Ready,
            surface: Arc::new(surface),
        });
        Ok(())
    }

    /**
        Hand out the oldest materialized frame, FIFO.
    */
    pub fn pop(&self) -> Option<DecodedFrame> {
        let mut state = self.state.lock();
        let index = state.oldest(|s| s == SlotState::Ready)?;
        let slot = &mut state.slots[index];
        slot.state = SlotState::Returned;
        Some(DecodedFrame {
            pts: slot.pts,
            picture_index: slot.picture_index,
            surface: Arc::clone(&slot.surface),
        })
    }

    /**
        Release the frame with timestamp `pts`.

        Copied memory is kept for recycling unless `flushing`. Otherwise the
        oldest live slot is evicted, and it must carry `pts`; a mismatch is
        reported without touching the pool.
    */
    pub fn release(&self, pts: Pts, flushing: bool) -> Result<Option<Evicted>> {
        if self.mem_kind != MemoryKind::DeviceInternal && !flushing {
            return Ok(None);
        }
        let mut state = self.state.lock();
        let index = state
            .oldest(|s| s != SlotState::Recyclable)
            .ok_or_else(|| Error::invalid_parameter(format!("no frame to release for pts {pts}")))?;
        let expected = state.slots[index].pts;
        if expected != pts {
            return Err(Error::OutOfOrderRelease { expected, got: pts });
        }
        let slot = state.slots.remove(index);
        Ok(Some(Evicted {
            pts: slot.pts,
            picture_index: slot.picture_index,
            surface: slot.surface,
        }))
    }

    /**
        Remove every slot and reset the output counter.
    */
    pub fn clear(&self) -> Vec<Evicted> {
        let mut state = self.state.lock();
        state.output_count = 0;
        state
            .slots
            .drain(..)
            .map(|slot| Evicted {
                pts: slot.pts,
                picture_index: slot.picture_index,
                surface: slot.surface,
            })
            .collect()
    }

    /**
        Frames materialized but not yet handed out.
    */
    pub fn ready_count(&self) -> usize {
        self.state
            .lock()
            .slots
            .iter()
            .filter(|slot| slot.state == SlotState::Ready)
            .count()
    }

    /**
        Number of slots, in use or recyclable.
    */
    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /**
        Frames materialized since the pool was created or last cleared.
    */
    pub fn output_count(&self) -> usize {
        self.state.lock().output_count
    }
}

static_assertions::assert_impl_all!(FramePool: Send, Sync);
static_assertions::assert_impl_all!(DecodedFrame: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    fn host_alloc(size: usize) -> impl FnOnce() -> Result<Surface> {
        move || Ok(Surface::Host(vec![0u8; size].into_boxed_slice()))
    }

    fn host_fill(value: u8) -> impl FnOnce(&mut Surface) -> Result<()> {
        move |surface| match surface {
            Surface::Host(bytes) => {
                bytes.fill(value);
                Ok(())
            }
            _ => Err(Error::runtime("not a host surface")),
        }
    }

    fn fill_host(pool: &FramePool, pts: i64, value: u8) {
        pool.materialize(Pts(pts), pts as u32, 4, host_alloc(4), host_fill(value))
            .unwrap();
    }

    #[test]
    fn pops_in_materialization_order() {
        let pool = FramePool::new(MemoryKind::HostCopied);
        for i in 0..3 {
            pool.materialize(Pts(i * 10), i as u32, 4, host_alloc(4), host_fill(i as u8))
                .unwrap();
        }
        assert_eq!(pool.ready_count(), 3);
        for i in 0..3 {
            let frame = pool.pop().unwrap();
            assert_eq!(frame.pts(), Pts(i * 10));
            assert_eq!(frame.host_bytes().unwrap(), &[i as u8; 4]);
        }
        assert!(pool.pop().is_none());
    }

    #[test]
    fn slots_are_recycled_on_next_round() {
        let pool = FramePool::new(MemoryKind::HostCopied);
        pool.begin_round();
        fill_host(&pool, 0, 1);
        fill_host(&pool, 1, 2);
        drop(pool.pop());
        drop(pool.pop());
        assert_eq!(pool.len(), 2);

        pool.begin_round();
        let mut allocated = false;
        pool.materialize(
            Pts(2),
            2,
            4,
            || {
                allocated = true;
                host_alloc(4)()
            },
            host_fill(3),
        )
        .unwrap();
        assert!(!allocated);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.pop().unwrap().host_bytes().unwrap(), &[3; 4]);
    }

    #[test]
    fn held_frames_are_not_recycled() {
        let pool = FramePool::new(MemoryKind::HostCopied);
        fill_host(&pool, 0, 1);
        let held = pool.pop().unwrap();

        pool.begin_round();
        fill_host(&pool, 1, 2);
        assert_eq!(pool.len(), 2);
        assert_eq!(held.host_bytes().unwrap(), &[1; 4]);
    }

    #[test]
    fn unpopped_frames_survive_a_round() {
        let pool = FramePool::new(MemoryKind::HostCopied);
        fill_host(&pool, 0, 1);
        pool.begin_round();
        fill_host(&pool, 1, 2);
        assert_eq!(pool.pop().unwrap().pts(), Pts(0));
        assert_eq!(pool.pop().unwrap().pts(), Pts(1));
    }

    #[test]
    fn non_flushing_release_of_copies_is_a_no_op() {
        let pool = FramePool::new(MemoryKind::HostCopied);
        fill_host(&pool, 0, 1);
        let frame = pool.pop().unwrap();
        assert!(pool.release(frame.pts(), false).unwrap().is_none());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn flush_release_must_match_oldest() {
        let pool = FramePool::new(MemoryKind::HostCopied);
        fill_host(&pool, 5, 1);
        fill_host(&pool, 6, 2);

        let err = pool.release(Pts(6), true).unwrap_err();
        assert!(matches!(
            err,
            Error::OutOfOrderRelease {
                expected: Pts(5),
                got: Pts(6)
            }
        ));
        assert_eq!(pool.len(), 2);

        let evicted = pool.release(Pts(5), true).unwrap().unwrap();
        assert_eq!(evicted.pts, Pts(5));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.pop().unwrap().pts(), Pts(6));
    }

    #[test]
    fn internal_surfaces_are_evicted_on_release() {
        let pool = FramePool::new(MemoryKind::DeviceInternal);
        pool.materialize(Pts(0), 3, 0, || Ok(Surface::NotMapped), |_| Ok(()))
            .unwrap();
        let frame = pool.pop().unwrap();

        pool.begin_round();
        assert_eq!(pool.len(), 1);
        let evicted = pool.release(frame.pts(), false).unwrap().unwrap();
        assert_eq!(evicted.picture_index, 3);
        assert!(pool.is_empty());
    }

    #[test]
    fn release_on_empty_pool_fails() {
        let pool = FramePool::new(MemoryKind::DeviceInternal);
        assert!(pool.release(Pts(0), false).is_err());
    }

    #[test]
    fn clear_resets_counter() {
        let pool = FramePool::new(MemoryKind::HostCopied);
        fill_host(&pool, 0, 1);
        fill_host(&pool, 1, 1);
        assert_eq!(pool.output_count(), 2);
        assert_eq!(pool.clear().len(), 2);
        assert_eq!(pool.output_count(), 0);
        assert!(pool.is_empty());
        assert!(pool.pop().is_none());
    }

    #[test]
    fn failed_fill_of_a_new_surface_leaves_no_slot() {
        let pool = FramePool::new(MemoryKind::HostCopied);
        let result = pool.materialize(Pts(0), 0, 4, host_alloc(4), |_| {
            Err(Error::runtime("copy failed"))
        });
        assert!(result.is_err());
        assert_eq!(pool.ready_count(), 0);
        assert!(pool.is_empty());
    }

    #[test]
    fn failed_fill_keeps_the_recycled_slot() {
        let pool = FramePool::new(MemoryKind::HostCopied);
        fill_host(&pool, 0, 7);
        drop(pool.pop());
        pool.begin_round();

        let result = pool.materialize(Pts(1), 1, 4, host_alloc(4), |_| {
            Err(Error::runtime("copy failed"))
        });
        assert!(result.is_err());
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.ready_count(), 0);
        assert_eq!(pool.output_count(), 1);

        let mut allocated = false;
        pool.materialize(
            Pts(2),
            2,
            4,
            || {
                allocated = true;
                host_alloc(4)()
            },
            host_fill(9),
        )
        .unwrap();
        assert!(!allocated);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.pop().unwrap().host_bytes().unwrap(), &[9; 4]);
    }
}

//! Frames in flight.
//!
//! The CPU records frame `n` while the GPU may still be executing frame
//! `n - 1`. Each of the [`FRAMES_IN_FLIGHT`] slots owns everything a frame
//! records into or allocates, and is only reused once its fence shows the
//! GPU has finished with it.
//!
//! [`FrameRing`] is generic over the slot type so the pacing logic can be
//! exercised with a mock fence; [`FrameData`] is the Vulkan slot.

use std::sync::Arc;

use tracing::{debug, warn};

use frame_rhi::RhiResult;
use frame_rhi::command::{CommandBuffer, CommandPool};
use frame_rhi::descriptor_allocator::{DescriptorAllocator, STANDARD_RATIOS};
use frame_rhi::device::Device;
use frame_rhi::sync::{Fence, Semaphore};

use crate::deletion_queue::DeletionQueue;
use crate::error::{RendererError, RendererResult};

/// Number of frame slots.
pub const FRAMES_IN_FLIGHT: usize = 2;

/// How long to wait for a slot to come back from the GPU.
pub const FRAME_FENCE_TIMEOUT_NS: u64 = 1_000_000_000;

/// Descriptor sets in the first pool of each slot's allocator.
const FRAME_DESCRIPTOR_SETS: u32 = 1000;

/// Fence guarding an earlier submission, either a frame slot's or an upload.
pub trait SlotFence {
    /// Returns `false` if `timeout_ns` elapsed before the fence signalled.
    fn wait(&self, timeout_ns: u64) -> RhiResult<bool>;

    fn reset(&self) -> RhiResult<()>;
}

impl SlotFence for Fence {
    fn wait(&self, timeout_ns: u64) -> RhiResult<bool> {
        Fence::wait(self, timeout_ns)
    }

    fn reset(&self) -> RhiResult<()> {
        Fence::reset(self)
    }
}

/// Per-slot state the ring paces.
pub trait FrameResources {
    type Fence: SlotFence;

    fn fence(&self) -> &Self::Fence;

    /// Frees what the slot's previous frame allocated. Only called once the
    /// fence has signalled.
    fn reclaim(&mut self) -> RendererResult<()>;
}

/// Fixed ring of frame slots indexed by frame number.
pub struct FrameRing<S> {
    slots: Vec<S>,
    frame_number: u64,
}

impl<S: FrameResources> FrameRing<S> {
    pub fn new(slots: Vec<S>) -> Self {
        debug_assert!(!slots.is_empty());
        Self {
            slots,
            frame_number: 0,
        }
    }

    /// Frames completed so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn slot_index(&self) -> usize {
        (self.frame_number % self.slots.len() as u64) as usize
    }

    pub fn current(&self) -> &S {
        &self.slots[self.slot_index()]
    }

    pub fn current_mut(&mut self) -> &mut S {
        let index = self.slot_index();
        &mut self.slots[index]
    }

    /// Slot of the most recent submission.
    ///
    /// Anything the GPU may still read on behalf of any in-flight frame can
    /// be handed to this slot: it is reclaimed only after its fence signals,
    /// and that fence covers every earlier submission on the queue.
    pub fn last_submitted_mut(&mut self) -> &mut S {
        let len = self.slots.len() as u64;
        let index = ((self.frame_number + len - 1) % len) as usize;
        &mut self.slots[index]
    }

    pub fn slots_mut(&mut self) -> impl Iterator<Item = &mut S> {
        self.slots.iter_mut()
    }

    /// Waits for the current slot's previous submission and reclaims it.
    ///
    /// The fence is left signalled; the caller resets it once it is certain
    /// to submit.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError::FenceTimeout`] if the fence does not signal
    /// within `timeout_ns`, or any error from waiting or reclaiming.
    pub fn begin_frame(&mut self, timeout_ns: u64) -> RendererResult<&mut S> {
        let frame = self.frame_number;
        let slot = self.current_mut();

        if !slot.fence().wait(timeout_ns)? {
            warn!("Frame {} fence did not signal in {} ns", frame, timeout_ns);
            return Err(RendererError::FenceTimeout { frame });
        }

        slot.reclaim()?;
        Ok(slot)
    }

    /// Advances to the next slot.
    pub fn end_frame(&mut self) {
        self.frame_number += 1;
    }
}

// =============================================================================
// Vulkan frame slot
// =============================================================================

/// Everything one frame in flight owns.
pub struct FrameData {
    pub command_buffer: CommandBuffer,
    pub in_flight_fence: Fence,
    /// Signalled when the acquired swapchain image is ready.
    pub acquire_semaphore: Semaphore,
    /// Released once this slot's fence has signalled.
    pub deletion_queue: DeletionQueue,
    /// Per-frame descriptor sets, reset with the slot.
    pub descriptors: DescriptorAllocator,
    // Declared last: command buffers are freed with their pool.
    _command_pool: CommandPool,
}

impl FrameData {
    /// # Errors
    ///
    /// Returns an error if any of the slot's objects cannot be created.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let command_pool = CommandPool::new(device.clone(), device.graphics_family())?;
        let command_buffer = CommandBuffer::new(device.clone(), &command_pool)?;
        // Signalled so the first wait on each slot returns immediately.
        let in_flight_fence = Fence::new(device.clone(), true)?;
        let acquire_semaphore = Semaphore::new(device.clone())?;
        let descriptors =
            DescriptorAllocator::new(device, FRAME_DESCRIPTOR_SETS, &STANDARD_RATIOS)?;

        Ok(Self {
            command_buffer,
            in_flight_fence,
            acquire_semaphore,
            deletion_queue: DeletionQueue::new(),
            descriptors,
            _command_pool: command_pool,
        })
    }

    /// Creates the full ring of Vulkan slots.
    pub fn ring(device: &Arc<Device>) -> RhiResult<FrameRing<FrameData>> {
        let slots = (0..FRAMES_IN_FLIGHT)
            .map(|_| FrameData::new(device.clone()))
            .collect::<RhiResult<Vec<_>>>()?;
        debug!("Created {} frame slots", slots.len());
        Ok(FrameRing::new(slots))
    }
}

impl FrameResources for FrameData {
    type Fence = Fence;

    fn fence(&self) -> &Fence {
        &self.in_flight_fence
    }

    fn reclaim(&mut self) -> RendererResult<()> {
        self.deletion_queue.flush();
        self.descriptors.clear_pools()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use crate::deletion_queue::{DeletionQueue, Release};

    /// Fence whose signalled state is driven by the test, standing in for
    /// the GPU.
    #[derive(Clone, Default)]
    struct MockFence {
        signalled: Rc<Cell<bool>>,
    }

    impl SlotFence for MockFence {
        fn wait(&self, _timeout_ns: u64) -> RhiResult<bool> {
            Ok(self.signalled.get())
        }

        fn reset(&self) -> RhiResult<()> {
            self.signalled.set(false);
            Ok(())
        }
    }

    struct Released {
        frame: u64,
        log: Rc<RefCell<Vec<u64>>>,
    }

    impl Release for Released {
        fn release(self) {
            self.log.borrow_mut().push(self.frame);
        }
    }

    struct MockSlot {
        fence: MockFence,
        queue: DeletionQueue<Released>,
    }

    impl FrameResources for MockSlot {
        type Fence = MockFence;

        fn fence(&self) -> &MockFence {
            &self.fence
        }

        fn reclaim(&mut self) -> RendererResult<()> {
            self.queue.flush();
            Ok(())
        }
    }

    /// One independent fence per slot.
    fn fences() -> Vec<MockFence> {
        (0..FRAMES_IN_FLIGHT).map(|_| MockFence::default()).collect()
    }

    fn ring(fences: &[MockFence]) -> FrameRing<MockSlot> {
        FrameRing::new(
            fences
                .iter()
                .map(|fence| MockSlot {
                    fence: fence.clone(),
                    queue: DeletionQueue::new(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_slot_fences_are_independent() {
        let fences = fences();
        fences[0].signalled.set(true);
        assert!(!fences[1].signalled.get());

        let ring = ring(&fences);
        assert!(ring.slots[0].fence.wait(0).unwrap());
        assert!(!ring.slots[1].fence.wait(0).unwrap());
    }

    #[test]
    fn test_slot_index_alternates() {
        let fences = fences();
        let mut ring = ring(&fences);
        let indices: Vec<usize> = (0..5)
            .map(|_| {
                let index = ring.slot_index();
                ring.end_frame();
                index
            })
            .collect();
        assert_eq!(indices, vec![0, 1, 0, 1, 0]);
        assert_eq!(ring.frame_number(), 5);
    }

    #[test]
    fn test_unsignalled_fence_times_out_without_reclaiming() {
        let fences = fences();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut ring = ring(&fences);
        ring.current_mut().queue.push(Released {
            frame: 0,
            log: Rc::clone(&log),
        });

        let err = ring.begin_frame(FRAME_FENCE_TIMEOUT_NS).err();
        assert!(matches!(err, Some(RendererError::FenceTimeout { frame: 0 })));
        assert!(log.borrow().is_empty());
        assert_eq!(ring.current().queue.len(), 1);
    }

    #[test]
    fn test_slot_resources_survive_until_fence_signals() {
        let fences = fences();
        for fence in &fences {
            fence.signalled.set(true);
        }
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut ring = ring(&fences);

        for frame in 0..8u64 {
            let slot_index = ring.slot_index();
            let slot = ring.begin_frame(FRAME_FENCE_TIMEOUT_NS).unwrap();

            // Anything reclaimed so far belongs to a frame at least two back.
            assert!(log.borrow().iter().all(|&released| released + 2 <= frame));

            slot.fence.reset().unwrap();
            slot.queue.push(Released {
                frame,
                log: Rc::clone(&log),
            });
            ring.end_frame();

            // The other slot's GPU work completes while this one is in flight.
            let other = (slot_index + 1) % FRAMES_IN_FLIGHT;
            fences[other].signalled.set(true);
            assert!(!fences[slot_index].signalled.get());
        }

        // Resources of frame n are released when frame n + 2 begins.
        assert_eq!(*log.borrow(), (0..6).collect::<Vec<u64>>());
    }

    #[test]
    fn test_busy_slot_blocks_reuse() {
        let fences = fences();
        fences[0].signalled.set(true);
        fences[1].signalled.set(true);
        let mut ring = ring(&fences);

        ring.begin_frame(0).unwrap().fence.reset().unwrap();
        ring.end_frame();
        ring.begin_frame(0).unwrap().fence.reset().unwrap();
        ring.end_frame();

        // Slot 1 has completed, but frame 2 reuses slot 0, which has not.
        fences[1].signalled.set(true);
        assert!(matches!(
            ring.begin_frame(0),
            Err(RendererError::FenceTimeout { frame: 2 })
        ));

        assert!(!fences[0].signalled.get());
        assert_eq!(ring.slot_index(), 0);

        fences[0].signalled.set(true);
        assert!(ring.begin_frame(0).is_ok());
    }

    #[test]
    fn test_deferred_to_last_submission_waits_for_its_fence() {
        let fences = fences();
        for fence in &fences {
            fence.signalled.set(true);
        }
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut ring = ring(&fences);

        // Frames 0 and 1 are submitted and neither has completed.
        for _ in 0..2 {
            ring.begin_frame(0).unwrap().fence.reset().unwrap();
            ring.end_frame();
        }

        // Replaced between frames: frame 1 is the newest submission.
        ring.last_submitted_mut().queue.push(Released {
            frame: 1,
            log: Rc::clone(&log),
        });
        assert_eq!(ring.slots[1].queue.len(), 1);

        // Frame 0 completes; reusing its slot must not release it.
        fences[0].signalled.set(true);
        ring.begin_frame(0).unwrap().fence.reset().unwrap();
        ring.end_frame();
        assert!(log.borrow().is_empty());

        // Frame 3 reuses slot 1, whose submission is still pending.
        assert!(matches!(
            ring.begin_frame(0),
            Err(RendererError::FenceTimeout { frame: 3 })
        ));
        assert!(log.borrow().is_empty());

        fences[1].signalled.set(true);
        ring.begin_frame(0).unwrap();
        assert_eq!(*log.borrow(), vec![1]);
    }

    #[test]
    fn test_last_submitted_before_any_frame_is_the_idle_slot() {
        let fences = fences();
        let mut ring = ring(&fences);
        ring.last_submitted_mut().queue.push(Released {
            frame: 0,
            log: Rc::new(RefCell::new(Vec::new())),
        });
        assert_eq!(ring.slots[FRAMES_IN_FLIGHT - 1].queue.len(), 1);
    }
}

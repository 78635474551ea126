//! Binary semaphores and fences.
//!
//! Each frame slot owns one fence (host waits for the GPU) and one acquire
//! semaphore (presentation engine to graphics queue).
//!
//! ```no_run
//! use std::sync::Arc;
//! use frame_rhi::device::Device;
//! use frame_rhi::sync::Fence;
//!
//! # fn example(device: Arc<Device>) -> frame_rhi::RhiResult<()> {
//! let in_flight = Fence::new(device, true)?;
//! if in_flight.wait(1_000_000_000)? {
//!     in_flight.reset()?;
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::trace;

use crate::device::Device;
use crate::error::RhiResult;

/// Binary semaphore, created unsignalled.
pub struct Semaphore {
    handle: vk::Semaphore,
    device: Arc<Device>,
}

impl Semaphore {
    /// # Errors
    ///
    /// Returns an error if the driver cannot create the semaphore.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        // SAFETY: default create info on a live device.
        let handle = unsafe {
            device
                .handle()
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?
        };
        trace!("Semaphore created");
        Ok(Self { handle, device })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.handle
    }

    /// Wait or signal entry for `vkQueueSubmit2` at `stage`.
    pub fn submit_info(&self, stage: vk::PipelineStageFlags2) -> vk::SemaphoreSubmitInfo<'static> {
        vk::SemaphoreSubmitInfo::default()
            .semaphore(self.handle)
            .stage_mask(stage)
            .value(1)
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        // SAFETY: owners wait for the device to go idle before dropping
        // synchronization objects.
        unsafe { self.device.handle().destroy_semaphore(self.handle, None) };
        trace!("Semaphore destroyed");
    }
}

/// Fence the host waits on.
pub struct Fence {
    handle: vk::Fence,
    device: Arc<Device>,
}

impl Fence {
    /// Creates a fence, already signalled if `signaled` so that the first
    /// wait returns at once.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver cannot create the fence.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        // SAFETY: plain create info on a live device.
        let handle = unsafe {
            device
                .handle()
                .create_fence(&vk::FenceCreateInfo::default().flags(flags), None)?
        };
        trace!(signaled, "Fence created");
        Ok(Self { handle, device })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.handle
    }

    /// Blocks for up to `timeout` nanoseconds.
    ///
    /// Returns `Ok(false)` on timeout.
    ///
    /// # Errors
    ///
    /// Returns any other wait failure, such as device loss.
    pub fn wait(&self, timeout: u64) -> RhiResult<bool> {
        // SAFETY: the fence belongs to this device.
        let result = unsafe {
            self.device
                .handle()
                .wait_for_fences(std::slice::from_ref(&self.handle), true, timeout)
        };
        match result {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the fence to unsignalled. It must not be pending on a queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset fails.
    pub fn reset(&self) -> RhiResult<()> {
        // SAFETY: callers only reset after a successful wait.
        unsafe {
            self.device
                .handle()
                .reset_fences(std::slice::from_ref(&self.handle))?;
        }
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        // SAFETY: owners wait for the device to go idle before dropping
        // synchronization objects.
        unsafe { self.device.handle().destroy_fence(self.handle, None) };
        trace!("Fence destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_primitives_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
        assert_send_sync::<Fence>();
    }
}

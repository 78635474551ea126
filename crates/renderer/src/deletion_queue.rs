//! Deferred destruction of GPU resources.
//!
//! Resources still referenced by recorded or in-flight commands are pushed
//! here instead of being dropped. The owner flushes the queue once the GPU
//! can no longer touch them: a frame slot after its fence signals, the
//! renderer once at shutdown after the device is idle.
//!
//! Entries are released newest first, so a resource registered after the
//! things it depends on is destroyed before them.
//!
//! # Example
//!
//! ```
//! use frame_renderer::deletion_queue::{DeletionQueue, Release};
//!
//! struct Logged(&'static str);
//!
//! impl Release for Logged {
//!     fn release(self) {
//!         println!("releasing {}", self.0);
//!     }
//! }
//!
//! let mut queue: DeletionQueue<Logged> = DeletionQueue::new();
//! queue.push(Logged("image"));
//! queue.push(Logged("view"));
//! queue.flush(); // view, then image
//! assert!(queue.is_empty());
//! ```

use tracing::trace;

use frame_rhi::buffer::Buffer;
use frame_rhi::descriptor::DescriptorSetLayout;
use frame_scene::Renderable;

/// Something a [`DeletionQueue`] can destroy.
pub trait Release {
    fn release(self);
}

/// Owned GPU resources whose destruction is deferred.
pub enum GpuResource {
    Buffer(Buffer),
    DescriptorSetLayout(DescriptorSetLayout),
    /// A scene taken out of rotation, with the mesh buffers it owns.
    Scene(Box<dyn Renderable>),
}

impl GpuResource {
    pub fn kind(&self) -> &'static str {
        match self {
            GpuResource::Buffer(_) => "buffer",
            GpuResource::DescriptorSetLayout(_) => "descriptor set layout",
            GpuResource::Scene(_) => "scene",
        }
    }
}

impl Release for GpuResource {
    fn release(self) {
        trace!("Releasing deferred {}", self.kind());
        // Each wrapper destroys its Vulkan object on drop.
        drop(self);
    }
}

impl From<Buffer> for GpuResource {
    fn from(buffer: Buffer) -> Self {
        GpuResource::Buffer(buffer)
    }
}

impl From<DescriptorSetLayout> for GpuResource {
    fn from(layout: DescriptorSetLayout) -> Self {
        GpuResource::DescriptorSetLayout(layout)
    }
}

impl From<Box<dyn Renderable>> for GpuResource {
    fn from(scene: Box<dyn Renderable>) -> Self {
        GpuResource::Scene(scene)
    }
}

/// LIFO list of resources awaiting destruction.
pub struct DeletionQueue<R: Release = GpuResource> {
    entries: Vec<R>,
}

impl<R: Release> DeletionQueue<R> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers `resource` for the next flush.
    pub fn push(&mut self, resource: impl Into<R>) {
        self.entries.push(resource.into());
    }

    /// Releases every entry, newest first, leaving the queue empty.
    pub fn flush(&mut self) {
        while let Some(entry) = self.entries.pop() {
            entry.release();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<R: Release> Default for DeletionQueue<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Release> Drop for DeletionQueue<R> {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Tracked {
        id: usize,
        log: Rc<RefCell<Vec<usize>>>,
    }

    impl Release for Tracked {
        fn release(self) {
            self.log.borrow_mut().push(self.id);
        }
    }

    fn filled(n: usize, log: &Rc<RefCell<Vec<usize>>>) -> DeletionQueue<Tracked> {
        let mut queue = DeletionQueue::new();
        for id in 0..n {
            queue.push(Tracked {
                id,
                log: Rc::clone(log),
            });
        }
        queue
    }

    #[test]
    fn test_flush_releases_in_reverse_order() {
        for n in [0, 1, 2, 3, 7, 16, 100, 1000] {
            let log = Rc::new(RefCell::new(Vec::new()));
            let mut queue = filled(n, &log);
            assert_eq!(queue.len(), n);

            queue.flush();

            let expected: Vec<usize> = (0..n).rev().collect();
            assert_eq!(*log.borrow(), expected, "n = {n}");
            assert!(queue.is_empty());
        }
    }

    #[test]
    fn test_second_flush_is_noop() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut queue = filled(3, &log);
        queue.flush();
        queue.flush();
        assert_eq!(*log.borrow(), vec![2, 1, 0]);
    }

    #[test]
    fn test_entries_after_flush_are_kept_for_next_flush() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut queue = filled(2, &log);
        queue.flush();
        queue.push(Tracked {
            id: 9,
            log: Rc::clone(&log),
        });
        assert_eq!(queue.len(), 1);
        queue.flush();
        assert_eq!(*log.borrow(), vec![1, 0, 9]);
    }

    #[test]
    fn test_drop_flushes_pending_entries() {
        let log = Rc::new(RefCell::new(Vec::new()));
        drop(filled(4, &log));
        assert_eq!(*log.borrow(), vec![3, 2, 1, 0]);
    }

    struct DropFlag(Rc<std::cell::Cell<bool>>);

    impl Renderable for DropFlag {
        fn draw(&mut self, _top: &glam::Mat4, _ctx: &mut frame_scene::DrawContext) {}
    }

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.set(true);
        }
    }

    #[test]
    fn test_retired_scene_lives_until_flush() {
        let dropped = Rc::new(std::cell::Cell::new(false));
        let scene: Box<dyn Renderable> = Box::new(DropFlag(Rc::clone(&dropped)));

        let mut queue: DeletionQueue = DeletionQueue::new();
        queue.push(scene);
        assert_eq!(queue.len(), 1);
        assert!(!dropped.get());

        queue.flush();
        assert!(dropped.get());
    }
}

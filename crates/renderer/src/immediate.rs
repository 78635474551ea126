//! Blocking one-off submissions for uploads.

use std::sync::{Arc, Mutex, PoisonError};

use ash::vk;
use tracing::{debug, error};

use frame_rhi::RhiResult;
use frame_rhi::command::{CommandBuffer, CommandPool};
use frame_rhi::device::Device;
use frame_rhi::sync::Fence;

use crate::error::{RendererError, RendererResult};
use crate::frame::SlotFence;

/// Upper bound on a single immediate submission.
pub const IMMEDIATE_TIMEOUT_NS: u64 = 9_999_999_999;

/// A command buffer with the fence its submissions signal.
pub trait SubmitContext {
    type Command;
    type Fence: SlotFence;

    fn command(&self) -> &Self::Command;

    fn fence(&self) -> &Self::Fence;

    /// Returns the command buffer to its initial state.
    fn reset_commands(&self) -> RhiResult<()>;

    /// Starts one-time-submit recording.
    fn begin(&self) -> RhiResult<()>;

    fn end(&self) -> RhiResult<()>;

    /// Submits the recorded commands with no semaphores, signalling the
    /// fence on completion.
    fn submit(&self) -> RhiResult<()>;
}

/// Graphics-queue context owned by the renderer.
pub struct ImmediateContext {
    command_buffer: CommandBuffer,
    fence: Fence,
    _command_pool: CommandPool,
    device: Arc<Device>,
}

impl ImmediateContext {
    /// # Errors
    ///
    /// Returns an error if the pool, buffer or fence cannot be created.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let command_pool = CommandPool::new(device.clone(), device.graphics_family())?;
        let command_buffer = CommandBuffer::new(device.clone(), &command_pool)?;
        let fence = Fence::new(device.clone(), true)?;

        Ok(Self {
            command_buffer,
            fence,
            _command_pool: command_pool,
            device,
        })
    }
}

impl SubmitContext for ImmediateContext {
    type Command = CommandBuffer;
    type Fence = Fence;

    fn command(&self) -> &CommandBuffer {
        &self.command_buffer
    }

    fn fence(&self) -> &Fence {
        &self.fence
    }

    fn reset_commands(&self) -> RhiResult<()> {
        self.command_buffer.reset()
    }

    fn begin(&self) -> RhiResult<()> {
        self.command_buffer.begin()
    }

    fn end(&self) -> RhiResult<()> {
        self.command_buffer.end()
    }

    fn submit(&self) -> RhiResult<()> {
        let command_buffers = [self.command_buffer.submit_info()];
        let submit = vk::SubmitInfo2::default().command_buffer_infos(&command_buffers);

        // SAFETY: `ImmediateSubmit::run` resets the fence and finishes
        // recording before submitting, all under its lock.
        unsafe {
            self.device
                .submit_graphics(std::slice::from_ref(&submit), self.fence.handle())
        }
    }
}

/// Dedicated command buffer and fence for record, submit and wait.
///
/// Calls are serialized: a second `run` from another thread waits for the
/// first to complete.
pub struct ImmediateSubmit<C = ImmediateContext> {
    context: Mutex<C>,
}

impl ImmediateSubmit {
    /// # Errors
    ///
    /// Returns an error if the pool, buffer or fence cannot be created.
    pub fn new(device: Arc<Device>) -> RendererResult<Self> {
        let context = ImmediateContext::new(device)?;
        debug!("Immediate submit context created");
        Ok(Self::with_context(context))
    }
}

impl<C: SubmitContext> ImmediateSubmit<C> {
    pub fn with_context(context: C) -> Self {
        Self {
            context: Mutex::new(context),
        }
    }

    /// Records `record` into the dedicated buffer, submits it to the
    /// graphics queue and blocks until the GPU has finished.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError::UploadTimeout`] if the work does not finish
    /// within [`IMMEDIATE_TIMEOUT_NS`], or any error from recording or
    /// submission.
    pub fn run<F>(&self, record: F) -> RendererResult<()>
    where
        F: FnOnce(&C::Command),
    {
        // A panic inside `record` leaves nothing half-submitted: the next
        // call resets both the fence and the buffer.
        let context = self.context.lock().unwrap_or_else(PoisonError::into_inner);

        context.fence().reset()?;
        context.reset_commands()?;

        context.begin()?;
        record(context.command());
        context.end()?;

        context.submit()?;

        if !context.fence().wait(IMMEDIATE_TIMEOUT_NS)? {
            error!("Immediate submission timed out");
            return Err(RendererError::UploadTimeout {
                timeout_ns: IMMEDIATE_TIMEOUT_NS,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    struct TestFence {
        signalled: Cell<bool>,
        waited_for: Cell<Option<u64>>,
        log: Log,
    }

    impl SlotFence for TestFence {
        fn wait(&self, timeout_ns: u64) -> RhiResult<bool> {
            self.log.borrow_mut().push("wait");
            self.waited_for.set(Some(timeout_ns));
            Ok(self.signalled.get())
        }

        fn reset(&self) -> RhiResult<()> {
            self.log.borrow_mut().push("reset fence");
            self.signalled.set(false);
            Ok(())
        }
    }

    /// Context whose "GPU" finishes on submit only if `completes` is set.
    struct TestContext {
        fence: TestFence,
        completes: bool,
        log: Log,
    }

    impl TestContext {
        fn new(completes: bool) -> (Self, Log) {
            let log = Log::default();
            let context = Self {
                fence: TestFence {
                    // Left signalled by an earlier submission.
                    signalled: Cell::new(true),
                    waited_for: Cell::new(None),
                    log: Rc::clone(&log),
                },
                completes,
                log: Rc::clone(&log),
            };
            (context, log)
        }
    }

    impl SubmitContext for TestContext {
        type Command = Log;
        type Fence = TestFence;

        fn command(&self) -> &Log {
            &self.log
        }

        fn fence(&self) -> &TestFence {
            &self.fence
        }

        fn reset_commands(&self) -> RhiResult<()> {
            self.log.borrow_mut().push("reset commands");
            Ok(())
        }

        fn begin(&self) -> RhiResult<()> {
            self.log.borrow_mut().push("begin");
            Ok(())
        }

        fn end(&self) -> RhiResult<()> {
            self.log.borrow_mut().push("end");
            Ok(())
        }

        fn submit(&self) -> RhiResult<()> {
            self.log.borrow_mut().push("submit");
            if self.completes {
                self.fence.signalled.set(true);
            }
            Ok(())
        }
    }

    #[test]
    fn test_run_resets_before_recording_and_waits_after_submit() {
        let (context, log) = TestContext::new(true);
        let immediate = ImmediateSubmit::with_context(context);

        immediate
            .run(|cmd| cmd.borrow_mut().push("record"))
            .unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                "reset fence",
                "reset commands",
                "begin",
                "record",
                "end",
                "submit",
                "wait"
            ]
        );
    }

    #[test]
    fn test_unfinished_submission_is_an_upload_timeout() {
        let (context, log) = TestContext::new(false);
        let immediate = ImmediateSubmit::with_context(context);

        let err = immediate.run(|_| {}).err();

        // The stale signal from the earlier submission must not count.
        assert!(matches!(
            err,
            Some(RendererError::UploadTimeout {
                timeout_ns: IMMEDIATE_TIMEOUT_NS
            })
        ));
        assert_eq!(log.borrow().last(), Some(&"wait"));
        let context = immediate.context.lock().unwrap();
        assert_eq!(context.fence.waited_for.get(), Some(IMMEDIATE_TIMEOUT_NS));
    }

    #[test]
    fn test_run_after_timeout_resets_and_submits_again() {
        let (context, log) = TestContext::new(false);
        let immediate = ImmediateSubmit::with_context(context);

        assert!(immediate.run(|_| {}).is_err());
        immediate.context.lock().unwrap().completes = true;
        immediate.run(|_| {}).unwrap();

        let log = log.borrow();
        assert_eq!(log.iter().filter(|e| **e == "submit").count(), 2);
        assert_eq!(log.iter().filter(|e| **e == "reset fence").count(), 2);
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_immediate_submit_is_shareable() {
        assert_send_sync::<ImmediateSubmit>();
    }
}

//! Main renderer orchestration.
//!
//! [`Renderer`] owns every Vulkan object and drives one frame per
//! [`Renderer::draw_frame`] call:
//!
//! 1. Wait for the current slot's fence, then free what that slot's
//!    previous frame allocated.
//! 2. Acquire a swapchain image.
//! 3. Traverse the scenes, write the scene uniforms and record the passes.
//! 4. Submit and present.
//!
//! An out-of-date or suboptimal swapchain only raises a flag; the swapchain
//! and render targets are rebuilt at the top of the next frame.

use std::collections::BTreeMap;
use std::sync::Arc;

use ash::vk;
use glam::{Mat4, Vec2, Vec3};
use tracing::{debug, error, info};

use frame_core::{RenderSettings, RendererConfig, Timer};
use frame_platform::{Surface, Window, get_required_extensions};
use frame_rhi::buffer::{Buffer, BufferUsage};
use frame_rhi::descriptor::{DescriptorLayoutBuilder, DescriptorWriter};
use frame_rhi::descriptor_allocator::{DescriptorAllocator, STANDARD_RATIOS};
use frame_rhi::device::Device;
use frame_rhi::instance::Instance;
use frame_rhi::physical_device::select_physical_device;
use frame_rhi::swapchain::Swapchain;
use frame_rhi::vertex::Vertex;
use frame_scene::camera::{DEFAULT_FOV_Y_DEGREES, perspective};
use frame_scene::{Camera, DrawContext, GpuMeshBuffers, MaterialInstance, MaterialPass, Renderable};

use crate::background::BackgroundEffects;
use crate::defaults::DefaultTextures;
use crate::deletion_queue::{DeletionQueue, GpuResource};
use crate::draw_list::{DrawList, DrawStats};
use crate::error::RendererResult;
use crate::frame::{FRAME_FENCE_TIMEOUT_NS, FrameData, FrameRing};
use crate::immediate::ImmediateSubmit;
use crate::materials::MaterialFactory;
use crate::overlay::UiOverlay;
use crate::recorder::CommandRecorder;
use crate::render_graph::{FrameTargets, PassRecorder, record_frame};
use crate::render_targets::{RenderTargets, draw_extent};
use crate::scene_data::GpuSceneData;
use crate::stats::{EngineStats, millis};
use crate::upload;

/// Sets in the first pool of the long-lived descriptor allocator.
const GLOBAL_DESCRIPTOR_SETS: u32 = 10;

const CAMERA_START: Vec3 = Vec3::new(0.0, 0.0, 5.0);

/// Descriptor set layouts shared by the pipelines.
///
/// The layout objects themselves live in the global deletion queue.
#[derive(Clone, Copy, Debug)]
struct DescriptorLayouts {
    /// Storage image written by the background effects.
    draw_image: vk::DescriptorSetLayout,
    /// Scene uniforms for the mesh pipelines.
    scene_data: vk::DescriptorSetLayout,
    /// One sampled texture per material.
    single_image: vk::DescriptorSetLayout,
}

impl DescriptorLayouts {
    fn new(device: &Arc<Device>, deletion_queue: &mut DeletionQueue) -> RendererResult<Self> {
        let draw_image = DescriptorLayoutBuilder::new()
            .add_binding(0, vk::DescriptorType::STORAGE_IMAGE)
            .build(device.clone(), vk::ShaderStageFlags::COMPUTE)?;
        let scene_data = DescriptorLayoutBuilder::new()
            .add_binding(0, vk::DescriptorType::UNIFORM_BUFFER)
            .build(
                device.clone(),
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            )?;
        let single_image = DescriptorLayoutBuilder::new()
            .add_binding(0, vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .build(device.clone(), vk::ShaderStageFlags::FRAGMENT)?;

        let layouts = Self {
            draw_image: draw_image.handle(),
            scene_data: scene_data.handle(),
            single_image: single_image.handle(),
        };

        deletion_queue.push(draw_image);
        deletion_queue.push(scene_data);
        deletion_queue.push(single_image);

        Ok(layouts)
    }
}

fn write_draw_image_set(device: &Device, set: vk::DescriptorSet, view: vk::ImageView) {
    let mut writer = DescriptorWriter::new();
    writer.write_image(
        0,
        view,
        vk::Sampler::null(),
        vk::ImageLayout::GENERAL,
        vk::DescriptorType::STORAGE_IMAGE,
    );
    writer.update_set(device, set);
}

/// Writes `data` into a fresh uniform buffer owned by the frame and returns
/// a set pointing at it.
fn write_scene_uniforms(
    device: &Arc<Device>,
    frame: &mut FrameData,
    layout: vk::DescriptorSetLayout,
    data: &GpuSceneData,
) -> RendererResult<vk::DescriptorSet> {
    let size = std::mem::size_of::<GpuSceneData>() as vk::DeviceSize;
    let buffer = Buffer::new(device.clone(), BufferUsage::Uniform, size)?;
    buffer.write_value(data)?;

    let set = frame.descriptors.allocate(layout)?;
    let mut writer = DescriptorWriter::new();
    writer.write_buffer(0, buffer.handle(), size, 0, vk::DescriptorType::UNIFORM_BUFFER);
    writer.update_set(device, set);

    // Freed once this slot's fence signals again.
    frame.deletion_queue.push(buffer);
    Ok(set)
}

/// What the background, geometry and overlay passes record this frame.
struct FramePasses<'a> {
    background: &'a BackgroundEffects,
    effect: usize,
    draw_image_set: vk::DescriptorSet,
    mouse: Vec2,
    draw_list: &'a mut DrawList,
    draw_ctx: &'a DrawContext,
    view_proj: Mat4,
    scene_set: vk::DescriptorSet,
    overlay: &'a mut dyn UiOverlay,
    draw_stats: DrawStats,
    mesh_draw_time: f32,
}

impl<R: CommandRecorder> PassRecorder<R> for FramePasses<'_> {
    fn background(&mut self, cmd: &mut R, targets: &FrameTargets) {
        self.background.record(
            cmd,
            self.effect,
            self.draw_image_set,
            targets.draw_extent,
            self.mouse,
        );
    }

    fn geometry(&mut self, cmd: &mut R, targets: &FrameTargets) {
        let timer = Timer::new();
        self.draw_list.prepare(self.draw_ctx, &self.view_proj);
        self.draw_stats = self
            .draw_list
            .record(cmd, self.draw_ctx, self.scene_set, targets.draw_extent);
        self.mesh_draw_time = timer.elapsed_ms();
    }

    fn overlay(&mut self, cmd: &mut R, targets: &FrameTargets) {
        self.overlay
            .record(cmd.raw(), targets.swapchain_view, targets.swapchain_extent);
    }
}

/// Main renderer that manages all Vulkan resources.
///
/// # Resource Destruction Order
///
/// [`Renderer::shutdown`] (also run on drop) waits for the device to go idle,
/// drops the scenes and flushes every deletion queue. The remaining fields
/// then drop in declaration order, which ends with the swapchain, the
/// surface, the device and finally the instance.
pub struct Renderer {
    scenes: BTreeMap<String, Box<dyn Renderable>>,
    draw_ctx: DrawContext,
    draw_list: DrawList,
    frames: FrameRing<FrameData>,
    default_material: Arc<MaterialInstance>,
    materials: MaterialFactory,
    defaults: DefaultTextures,
    background: BackgroundEffects,
    draw_image_set: vk::DescriptorSet,
    layouts: DescriptorLayouts,
    global_descriptors: DescriptorAllocator,
    /// Long-lived resources, flushed once at shutdown.
    deletion_queue: DeletionQueue,
    targets: RenderTargets,
    immediate: ImmediateSubmit,

    camera: Camera,
    settings: RenderSettings,
    stats: EngineStats,
    frame_timer: Timer,
    mouse: Vec2,
    window_extent: vk::Extent2D,
    resize_requested: bool,
    is_shut_down: bool,

    swapchain: Swapchain,
    surface: Surface,
    device: Arc<Device>,
    instance: Instance,
}

impl Renderer {
    /// Creates the renderer for `window`.
    ///
    /// # Errors
    ///
    /// Returns an error if Vulkan initialization fails, no suitable GPU is
    /// found, or a shader under the configured directory is missing.
    pub fn new(window: &Window, config: &RendererConfig) -> RendererResult<Self> {
        let width = window.width();
        let height = window.height();
        info!("Initializing renderer ({}x{})", width, height);

        let display_handle = window
            .display_handle()
            .map_err(|e| frame_core::Error::Window(e.to_string()))?;
        let extensions = get_required_extensions(display_handle.as_raw())?;
        let instance = Instance::new(c"frame-renderer", &extensions, config.render.validation)?;

        let surface = window.create_surface(instance.entry(), instance.handle())?;
        let gpu = select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &gpu)?;
        let swapchain = Swapchain::new(&instance, device.clone(), surface.handle(), width, height)?;

        let immediate = ImmediateSubmit::new(device.clone())?;
        let window_extent = vk::Extent2D { width, height };
        let targets = RenderTargets::new(&device, window_extent)?;

        let mut deletion_queue = DeletionQueue::new();
        let layouts = DescriptorLayouts::new(&device, &mut deletion_queue)?;

        let mut global_descriptors =
            DescriptorAllocator::new(device.clone(), GLOBAL_DESCRIPTOR_SETS, &STANDARD_RATIOS)?;
        let draw_image_set = global_descriptors.allocate(layouts.draw_image)?;
        write_draw_image_set(&device, draw_image_set, targets.draw_image.view());

        let shader_dir = &config.render.shader_dir;
        let background = BackgroundEffects::new(&device, layouts.draw_image, shader_dir)?;
        let mut materials =
            MaterialFactory::new(&device, layouts.scene_data, layouts.single_image, shader_dir)?;

        let defaults = DefaultTextures::new(&device, &immediate)?;
        let default_material = materials.write_material(
            &device,
            MaterialPass::MainColor,
            defaults.white.view(),
            defaults.linear_sampler.handle(),
            &mut global_descriptors,
        )?;

        let frames = FrameData::ring(&device)?;

        let mut settings = config.render_settings();
        settings.background_effect = background.clamp_index(settings.background_effect);

        info!(
            "Renderer initialized: {} swapchain images, {} background effects",
            swapchain.image_count(),
            background.len()
        );

        Ok(Self {
            scenes: BTreeMap::new(),
            draw_ctx: DrawContext::new(),
            draw_list: DrawList::new(),
            frames,
            default_material,
            materials,
            defaults,
            background,
            draw_image_set,
            layouts,
            global_descriptors,
            deletion_queue,
            targets,
            immediate,
            camera: Camera::new(CAMERA_START),
            settings,
            stats: EngineStats::default(),
            frame_timer: Timer::new(),
            mouse: Vec2::ZERO,
            window_extent,
            resize_requested: false,
            is_shut_down: false,
            swapchain,
            surface,
            device,
            instance,
        })
    }

    // =========================================================================
    // Frame
    // =========================================================================

    /// Renders one frame, with `overlay` drawn over the final image.
    ///
    /// Does nothing while the window is minimized. Returns `Ok(())` early if
    /// the swapchain turns out to be out of date; it is rebuilt on the next
    /// call.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RendererError::FenceTimeout`] if the GPU does not finish an
    /// earlier frame in time, or any Vulkan error from recording, submission
    /// or presentation.
    pub fn draw_frame(&mut self, overlay: &mut dyn UiOverlay) -> RendererResult<()> {
        self.stats.frame_time = millis(self.frame_timer.tick());

        if self.window_extent.width == 0 || self.window_extent.height == 0 {
            return Ok(());
        }

        if self.resize_requested {
            self.recreate_swapchain()?;
        }

        let update_timer = Timer::new();
        self.camera.update();
        self.draw_ctx.clear();
        for scene in self.scenes.values_mut() {
            scene.draw(&Mat4::IDENTITY, &mut self.draw_ctx);
        }
        self.stats.scene_update_time = update_timer.elapsed_ms();

        let frame = self.frames.begin_frame(FRAME_FENCE_TIMEOUT_NS)?;

        let Some((image_index, suboptimal)) = self
            .swapchain
            .acquire_next_image(frame.acquire_semaphore.handle(), FRAME_FENCE_TIMEOUT_NS)?
        else {
            debug!("Swapchain out of date on acquire");
            self.resize_requested = true;
            return Ok(());
        };
        if suboptimal {
            self.resize_requested = true;
        }

        // Only now is a submission certain to signal the fence again.
        frame.in_flight_fence.reset()?;
        frame.command_buffer.reset()?;

        let extent = draw_extent(
            self.swapchain.extent(),
            self.targets.extent(),
            self.settings.render_scale(),
        );
        let aspect = extent.width as f32 / extent.height.max(1) as f32;
        let scene_data = GpuSceneData::new(
            self.camera.view_matrix(),
            perspective(DEFAULT_FOV_Y_DEGREES, aspect),
        );
        let scene_set =
            write_scene_uniforms(&self.device, frame, self.layouts.scene_data, &scene_data)?;

        let targets = FrameTargets {
            draw_image: self.targets.draw_image.handle(),
            draw_view: self.targets.draw_image.view(),
            depth_image: self.targets.depth_image.handle(),
            depth_view: self.targets.depth_image.view(),
            draw_extent: extent,
            swapchain_image: self.swapchain.image(image_index),
            swapchain_view: self.swapchain.image_view(image_index),
            swapchain_extent: self.swapchain.extent(),
        };

        let mut passes = FramePasses {
            background: &self.background,
            effect: self.settings.background_effect,
            draw_image_set: self.draw_image_set,
            mouse: self.mouse,
            draw_list: &mut self.draw_list,
            draw_ctx: &self.draw_ctx,
            view_proj: scene_data.view_proj,
            scene_set,
            overlay,
            draw_stats: DrawStats::default(),
            mesh_draw_time: 0.0,
        };

        frame.command_buffer.begin()?;
        record_frame(&mut frame.command_buffer, &targets, &mut passes);
        frame.command_buffer.end()?;

        self.stats.record_draws(passes.draw_stats);
        self.stats.mesh_draw_time = passes.mesh_draw_time;

        let present_semaphore = self.swapchain.present_semaphore(image_index);
        let wait_infos = [frame
            .acquire_semaphore
            .submit_info(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)];
        let signal_infos = [vk::SemaphoreSubmitInfo::default()
            .semaphore(present_semaphore)
            .stage_mask(vk::PipelineStageFlags2::ALL_GRAPHICS)
            .value(1)];
        let command_buffer_infos = [frame.command_buffer.submit_info()];
        let submit = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&wait_infos)
            .signal_semaphore_infos(&signal_infos)
            .command_buffer_infos(&command_buffer_infos);

        // SAFETY: the command buffer was fully recorded above and the fence
        // was reset after the slot's previous submission completed.
        unsafe {
            self.device
                .submit_graphics(std::slice::from_ref(&submit), frame.in_flight_fence.handle())?;
        }

        if self
            .swapchain
            .present(self.device.present_queue(), image_index, present_semaphore)?
        {
            debug!("Swapchain suboptimal or out of date on present");
            self.resize_requested = true;
        }

        self.frames.end_frame();
        Ok(())
    }

    /// Records a new window size. The swapchain is rebuilt on the next frame;
    /// a zero extent pauses rendering until the window is restored.
    pub fn resize(&mut self, width: u32, height: u32) {
        let extent = vk::Extent2D { width, height };
        if extent == self.window_extent {
            return;
        }

        debug!(
            "Resize: {}x{} -> {}x{}",
            self.window_extent.width, self.window_extent.height, width, height
        );
        self.window_extent = extent;
        if width > 0 && height > 0 {
            self.resize_requested = true;
        }
    }

    fn recreate_swapchain(&mut self) -> RendererResult<()> {
        let vk::Extent2D { width, height } = self.window_extent;

        self.device.wait_idle()?;
        self.swapchain
            .recreate(&self.instance, self.surface.handle(), width, height)?;

        // Nothing is in flight, so the old targets can go immediately.
        self.targets = RenderTargets::new(&self.device, self.window_extent)?;
        write_draw_image_set(&self.device, self.draw_image_set, self.targets.draw_image.view());

        self.resize_requested = false;
        debug!("Swapchain and render targets rebuilt at {}x{}", width, height);
        Ok(())
    }

    // =========================================================================
    // Scene and resources
    // =========================================================================

    /// Adds or replaces a scene drawn every frame. Scenes draw in name order.
    ///
    /// A replaced scene is released once the frames that drew it are done.
    pub fn add_scene(&mut self, name: impl Into<String>, scene: impl Renderable + 'static) {
        let name = name.into();
        debug!("Scene '{}' added", name);
        if let Some(old) = self.scenes.insert(name, Box::new(scene)) {
            self.retire_scene(old);
        }
    }

    /// Stops drawing scene `name`. Returns `false` if there was none.
    pub fn remove_scene(&mut self, name: &str) -> bool {
        match self.scenes.remove(name) {
            Some(old) => {
                debug!("Scene '{}' removed", name);
                self.retire_scene(old);
                true
            }
            None => false,
        }
    }

    /// Hands `scene` to the newest submission's slot, which frees it after
    /// the GPU has finished every frame that could have drawn it.
    fn retire_scene(&mut self, scene: Box<dyn Renderable>) {
        self.frames
            .last_submitted_mut()
            .deletion_queue
            .push(GpuResource::Scene(scene));
    }

    pub fn scene_names(&self) -> impl Iterator<Item = &str> {
        self.scenes.keys().map(String::as_str)
    }

    /// Uploads a mesh to GPU-only buffers, blocking until the copy is done.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RendererError::Asset`] for an empty mesh, or any upload
    /// failure.
    pub fn upload_mesh(&self, indices: &[u32], vertices: &[Vertex]) -> RendererResult<GpuMeshBuffers> {
        upload::upload_mesh(&self.device, &self.immediate, indices, vertices)
    }

    /// Opaque material sampling the white texture.
    pub fn default_material(&self) -> Arc<MaterialInstance> {
        Arc::clone(&self.default_material)
    }

    pub fn default_textures(&self) -> &DefaultTextures {
        &self.defaults
    }

    /// Creates a material drawing `image` in `pass`.
    ///
    /// The image and sampler must outlive the material.
    ///
    /// # Errors
    ///
    /// Returns an error if the material's descriptor set cannot be allocated.
    pub fn create_material(
        &mut self,
        pass: MaterialPass,
        image: vk::ImageView,
        sampler: vk::Sampler,
    ) -> RendererResult<Arc<MaterialInstance>> {
        self.materials.write_material(
            &self.device,
            pass,
            image,
            sampler,
            &mut self.global_descriptors,
        )
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut RenderSettings {
        &mut self.settings
    }

    /// Selects background effect `index`, clamped to the loaded effects.
    pub fn select_background_effect(&mut self, index: usize) {
        self.settings.background_effect = self.background.clamp_index(index);
    }

    pub fn effects(&self) -> &BackgroundEffects {
        &self.background
    }

    /// Background effects, whose parameters may be edited between frames.
    pub fn effects_mut(&mut self) -> &mut BackgroundEffects {
        &mut self.background
    }

    /// Cursor position in window pixels, fed to the background effect.
    pub fn set_mouse_position(&mut self, x: f32, y: f32) {
        self.mouse = Vec2::new(x, y);
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn frame_number(&self) -> u64 {
        self.frames.frame_number()
    }

    /// Whether the swapchain will be rebuilt before the next frame.
    pub fn resize_requested(&self) -> bool {
        self.resize_requested
    }

    pub fn swapchain_extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Waits for the GPU, then releases scenes and every deferred resource.
    ///
    /// Safe to call more than once; later calls do nothing.
    pub fn shutdown(&mut self) {
        if self.is_shut_down {
            return;
        }

        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during shutdown: {:?}", e);
        }

        self.scenes.clear();
        self.draw_ctx.clear();
        for frame in self.frames.slots_mut() {
            frame.deletion_queue.flush();
        }
        self.deletion_queue.flush();
        self.global_descriptors.destroy_pools();

        self.is_shut_down = true;
        info!("Renderer shut down after {} frames", self.frames.frame_number());
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("frame_number", &self.frames.frame_number())
            .field("scenes", &self.scenes.len())
            .field("window_extent", &self.window_extent)
            .field("resize_requested", &self.resize_requested)
            .finish_non_exhaustive()
    }
}

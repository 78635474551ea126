//! Records whole frames against a command log: scene traversal, culling,
//! draw sorting and the pass sequence together.

use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use glam::{Mat4, Vec3};

use frame_renderer::{
    CommandLog, CommandRecorder, DrawList, DrawStats, FrameTargets, PassRecorder, RecordedCommand,
    record_frame,
};
use frame_scene::camera::{DEFAULT_FOV_Y_DEGREES, perspective};
use frame_scene::{
    Bounds, DrawContext, GeoSurface, MaterialId, MaterialInstance, MaterialPass, MaterialPipeline,
    MeshAsset, NodeId, NodeKind, Renderable, SceneGraph,
};

const OPAQUE_PIPELINE: u64 = 10;
const TRANSPARENT_PIPELINE: u64 = 20;

fn material(id: u32, pass: MaterialPass, pipeline: u64) -> Arc<MaterialInstance> {
    Arc::new(MaterialInstance {
        id: MaterialId(id),
        pass,
        pipeline: MaterialPipeline {
            pipeline: vk::Pipeline::from_raw(pipeline),
            layout: vk::PipelineLayout::from_raw(pipeline + 1),
        },
        material_set: vk::DescriptorSet::from_raw(100 + u64::from(id)),
    })
}

fn quad(name: &str, index_buffer: u64, material: Arc<MaterialInstance>) -> Arc<MeshAsset> {
    let surface = GeoSurface {
        start_index: 0,
        count: 6,
        bounds: Bounds::new(Vec3::ZERO, Vec3::new(0.5, 0.5, 0.0)),
        material,
    };
    Arc::new(MeshAsset::from_handles(
        name,
        vec![surface],
        vk::Buffer::from_raw(index_buffer),
        0x4000,
    ))
}

fn targets() -> FrameTargets {
    FrameTargets {
        draw_image: vk::Image::from_raw(1),
        draw_view: vk::ImageView::from_raw(2),
        depth_image: vk::Image::from_raw(3),
        depth_view: vk::ImageView::from_raw(4),
        draw_extent: vk::Extent2D {
            width: 1280,
            height: 720,
        },
        swapchain_image: vk::Image::from_raw(5),
        swapchain_view: vk::ImageView::from_raw(6),
        swapchain_extent: vk::Extent2D {
            width: 1280,
            height: 720,
        },
    }
}

fn view_proj() -> Mat4 {
    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
    perspective(DEFAULT_FOV_Y_DEGREES, 16.0 / 9.0) * view
}

/// Geometry-only passes around a draw list.
struct Geometry<'a> {
    ctx: &'a DrawContext,
    list: DrawList,
    stats: DrawStats,
}

impl PassRecorder<CommandLog> for Geometry<'_> {
    fn background(&mut self, _cmd: &mut CommandLog, _targets: &FrameTargets) {}

    fn geometry(&mut self, cmd: &mut CommandLog, targets: &FrameTargets) {
        self.list.prepare(self.ctx, &view_proj());
        self.stats = self.list.record(
            cmd,
            self.ctx,
            vk::DescriptorSet::from_raw(99),
            targets.draw_extent,
        );
    }

    fn overlay(&mut self, _cmd: &mut CommandLog, _targets: &FrameTargets) {}
}

/// Root with an opaque quad at its origin and a transparent quad one unit
/// in front of it.
fn scene() -> (SceneGraph, NodeId) {
    let opaque = quad(
        "opaque",
        1,
        material(1, MaterialPass::MainColor, OPAQUE_PIPELINE),
    );
    let transparent = quad(
        "transparent",
        2,
        material(2, MaterialPass::Transparent, TRANSPARENT_PIPELINE),
    );

    let mut graph = SceneGraph::new();
    let root = graph.add_root(NodeKind::Empty, Mat4::IDENTITY);
    let body = graph.add_child(root, NodeKind::Mesh(opaque), Mat4::IDENTITY);
    graph.add_child(
        body,
        NodeKind::Mesh(transparent),
        Mat4::from_translation(Vec3::Z),
    );
    (graph, root)
}

fn record(graph: &mut SceneGraph) -> (CommandLog, DrawStats) {
    let mut ctx = DrawContext::new();
    graph.draw(&Mat4::IDENTITY, &mut ctx);

    let mut passes = Geometry {
        ctx: &ctx,
        list: DrawList::new(),
        stats: DrawStats::default(),
    };
    let mut log = CommandLog::new();
    record_frame(&mut log, &targets(), &mut passes);
    (log, passes.stats)
}

fn position(log: &CommandLog, pred: impl Fn(&RecordedCommand) -> bool) -> Vec<usize> {
    log.commands
        .iter()
        .enumerate()
        .filter(|(_, c)| pred(c))
        .map(|(i, _)| i)
        .collect()
}

#[test]
fn test_frame_counts_every_visible_draw() {
    let (mut graph, _) = scene();
    let (_, stats) = record(&mut graph);

    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.triangles, 4);
}

#[test]
fn test_draws_are_inside_geometry_rendering() {
    let (mut graph, _) = scene();
    let (log, _) = record(&mut graph);

    let begins = position(&log, |c| matches!(c, RecordedCommand::BeginRendering { .. }));
    let ends = position(&log, |c| matches!(c, RecordedCommand::EndRendering));
    let draws = position(&log, |c| matches!(c, RecordedCommand::DrawIndexed { .. }));

    assert_eq!(begins.len(), 2);
    assert_eq!(ends.len(), 2);
    assert!(draws.iter().all(|&d| begins[0] < d && d < ends[0]));

    match &log.commands[begins[0]] {
        RecordedCommand::BeginRendering { color, depth, .. } => {
            assert_eq!(*color, Some(targets().draw_view));
            assert_eq!(*depth, Some(targets().depth_view));
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn test_opaque_pipeline_precedes_transparent() {
    let (mut graph, _) = scene();
    let (log, _) = record(&mut graph);

    let pipelines: Vec<vk::Pipeline> = log
        .commands
        .iter()
        .filter_map(|c| match c {
            RecordedCommand::BindPipeline(vk::PipelineBindPoint::GRAPHICS, p) => Some(*p),
            _ => None,
        })
        .collect();

    assert_eq!(
        pipelines,
        vec![
            vk::Pipeline::from_raw(OPAQUE_PIPELINE),
            vk::Pipeline::from_raw(TRANSPARENT_PIPELINE),
        ]
    );
}

#[test]
fn test_moving_root_out_of_view_culls_opaque_only() {
    let (mut graph, root) = scene();
    graph.set_local_transform(root, Mat4::from_translation(Vec3::new(0.0, 0.0, 20.0)));

    let (_, stats) = record(&mut graph);

    // The transparent quad is drawn regardless of visibility.
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.triangles, 2);
}

#[test]
fn test_frame_ends_presentable() {
    let (mut graph, _) = scene();
    let (log, _) = record(&mut graph);

    let swapchain = targets().swapchain_image;
    let last = log
        .transitions()
        .into_iter()
        .rev()
        .find(|(image, _, _)| *image == swapchain);

    assert_eq!(
        last,
        Some((
            swapchain,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        ))
    );
    assert_eq!(log.raw(), vk::CommandBuffer::null());
}

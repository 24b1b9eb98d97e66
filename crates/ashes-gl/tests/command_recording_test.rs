//! Integration test: command buffer recording
//!
//! Drives the record-side state machine and command list against a fake GL
//! table: lifecycle transitions, render pass and subpass structure, the
//! vertex array cache, staged push constants, and secondary buffer splicing.
//! No replay happens here; assertions read the recorded command list.
//!
//! Run with: cargo test --test command_recording_test -- --nocapture

mod common;

use std::sync::Arc;

use ashes_api::{
    BufferCreateInfo, BufferUsageFlags, CommandBufferLevel, Error, MemoryPropertyFlags, Rect2D,
    ShaderStageFlags,
};
use ashes_gl::{Buffer, Command, Device, GeometryBuffers, RecordState};

use common::{bare_pass, gl33_device, mesh_pipeline, new_device, procedural_pipeline};

fn vertex_buffer(device: &Device, size: u64) -> Buffer {
    device
        .create_buffer(&BufferCreateInfo {
            size,
            usage: BufferUsageFlags::VERTEX_BUFFER | BufferUsageFlags::TRANSFER_DST,
            memory: MemoryPropertyFlags::DEVICE_LOCAL,
        })
        .unwrap()
}

fn geometry_binds(commands: &[Command]) -> Vec<Arc<GeometryBuffers>> {
    commands
        .iter()
        .filter_map(|command| match command {
            Command::BindGeometryBuffers { geometry } => Some(geometry.clone()),
            _ => None,
        })
        .collect()
}

fn count_matching(commands: &[Command], pred: impl Fn(&Command) -> bool) -> usize {
    commands.iter().filter(|c| pred(c)).count()
}

#[test]
fn test_record_state_lifecycle() {
    let (device, _log) = new_device();
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();

    assert_eq!(cb.state(), RecordState::Initial);

    cb.begin().unwrap();
    assert_eq!(cb.state(), RecordState::Recording);

    // A second begin while recording is a usage error
    match cb.begin() {
        Err(Error::Validation(msg)) => println!("begin while recording rejected: {msg}"),
        other => panic!("expected Validation error, got {:?}", other),
    }

    cb.end().unwrap();
    assert_eq!(cb.state(), RecordState::Executable);

    match cb.end() {
        Err(Error::Validation(msg)) => println!("end while executable rejected: {msg}"),
        other => panic!("expected Validation error, got {:?}", other),
    }

    cb.reset();
    assert_eq!(cb.state(), RecordState::Initial);
}

#[test]
fn test_begin_discards_previous_recording() {
    let (device, _log) = new_device();
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();

    cb.begin().unwrap();
    cb.set_line_width(2.0);
    cb.end().unwrap();
    assert_eq!(cb.recorded_commands().len(), 1);

    // Re-begin starts from scratch
    cb.begin().unwrap();
    assert_eq!(cb.recorded_commands().len(), 0);
    cb.end().unwrap();
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "draw called while the command buffer is Initial")]
fn test_recording_call_outside_recording_asserts() {
    let (device, _log) = new_device();
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();
    cb.draw(3, 1, 0, 0);
}

#[test]
fn test_end_inside_open_render_pass_rejected() {
    let (device, _log) = new_device();
    let (render_pass, framebuffer) = bare_pass(&device, 1);
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();

    cb.begin().unwrap();
    cb.begin_render_pass(&render_pass, &framebuffer, Rect2D::default(), &[]);
    match cb.end() {
        Err(Error::Validation(msg)) => println!("end inside pass rejected: {msg}"),
        other => panic!("expected Validation error, got {:?}", other),
    }

    cb.end_render_pass();
    cb.end().unwrap();
}

#[test]
fn test_clear_only_pass_records_balanced_structure() {
    let (device, _log) = new_device();
    let (render_pass, framebuffer) = bare_pass(&device, 1);
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();

    cb.begin().unwrap();
    cb.begin_render_pass(&render_pass, &framebuffer, Rect2D::default(), &[]);
    cb.end_render_pass();
    cb.end().unwrap();

    let commands = cb.recorded_commands();
    assert_eq!(commands.len(), 4, "expected pass frame only, got {} commands", commands.len());
    assert!(matches!(commands[0], Command::BeginRenderPass { .. }));
    assert!(matches!(commands[1], Command::BeginSubpass { subpass: 0, .. }));
    assert!(matches!(commands[2], Command::EndSubpass));
    assert!(matches!(commands[3], Command::EndRenderPass { .. }));

    let draws = count_matching(&commands, |c| {
        matches!(
            c,
            Command::Draw { .. }
                | Command::DrawIndexed { .. }
                | Command::DrawIndirect { .. }
                | Command::DrawIndexedIndirect { .. }
                | Command::Dispatch { .. }
                | Command::DispatchIndirect { .. }
        )
    });
    assert_eq!(draws, 0);
    println!("clear-only pass recorded {} commands, no draws", commands.len());
}

#[test]
fn test_subpass_advance_stays_balanced() {
    let (device, _log) = new_device();
    let (render_pass, framebuffer) = bare_pass(&device, 3);
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();

    cb.begin().unwrap();
    cb.begin_render_pass(&render_pass, &framebuffer, Rect2D::default(), &[]);
    cb.next_subpass();
    cb.next_subpass();
    // Past the last subpass: ignored
    cb.next_subpass();
    cb.end_render_pass();
    cb.end().unwrap();

    let commands = cb.recorded_commands();
    let begins = count_matching(&commands, |c| matches!(c, Command::BeginSubpass { .. }));
    let ends = count_matching(&commands, |c| matches!(c, Command::EndSubpass));
    assert_eq!(begins, 3);
    assert_eq!(ends, 3);
    assert_eq!(count_matching(&commands, |c| matches!(c, Command::BeginRenderPass { .. })), 1);
    assert_eq!(count_matching(&commands, |c| matches!(c, Command::EndRenderPass { .. })), 1);

    let subpasses: Vec<u32> = commands
        .iter()
        .filter_map(|c| match c {
            Command::BeginSubpass { subpass, .. } => Some(*subpass),
            _ => None,
        })
        .collect();
    assert_eq!(subpasses, vec![0, 1, 2]);
    println!("three subpasses recorded in order, overflow advance ignored");
}

#[test]
fn test_begin_render_pass_inside_pass_ignored() {
    let (device, _log) = new_device();
    let (render_pass, framebuffer) = bare_pass(&device, 1);
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();

    cb.begin().unwrap();
    cb.begin_render_pass(&render_pass, &framebuffer, Rect2D::default(), &[]);
    let before = cb.recorded_commands().len();
    cb.begin_render_pass(&render_pass, &framebuffer, Rect2D::default(), &[]);
    assert_eq!(cb.recorded_commands().len(), before);
    cb.end_render_pass();
    cb.end().unwrap();
}

#[test]
fn test_layoutless_draw_routes_through_identity_indices() {
    let (device, _log) = new_device();
    let (render_pass, framebuffer) = bare_pass(&device, 1);
    let pipeline = procedural_pipeline(&device, &render_pass);
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();

    cb.begin().unwrap();
    cb.begin_render_pass(&render_pass, &framebuffer, Rect2D::default(), &[]);
    cb.bind_pipeline(&pipeline);
    cb.draw(3, 1, 0, 0);
    cb.draw(6, 1, 0, 0);
    cb.end_render_pass();
    cb.end().unwrap();

    let commands = cb.recorded_commands();
    assert_eq!(count_matching(&commands, |c| matches!(c, Command::Draw { .. })), 0);
    assert_eq!(geometry_binds(&commands).len(), 1, "identity geometry bound once");

    let counts: Vec<u32> = commands
        .iter()
        .filter_map(|c| match c {
            Command::DrawIndexed { index_count, index_type, .. } => {
                assert_eq!(*index_type, glow::UNSIGNED_INT);
                Some(*index_count)
            }
            _ => None,
        })
        .collect();
    assert_eq!(counts, vec![3, 6]);
    println!("layout-less draws became indexed draws of {:?} indices", counts);
}

#[test]
fn test_layoutless_draw_clamps_to_identity_range() {
    let (device, _log) = new_device();
    let (render_pass, framebuffer) = bare_pass(&device, 1);
    let pipeline = procedural_pipeline(&device, &render_pass);
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();

    cb.begin().unwrap();
    cb.begin_render_pass(&render_pass, &framebuffer, Rect2D::default(), &[]);
    cb.bind_pipeline(&pipeline);
    cb.draw(1 << 20, 1, 0, 0);
    cb.end_render_pass();
    cb.end().unwrap();

    let commands = cb.recorded_commands();
    match commands.iter().find(|c| matches!(c, Command::DrawIndexed { .. })) {
        Some(Command::DrawIndexed { index_count, .. }) => {
            assert_eq!(*index_count, 1 << 16);
            println!("oversized draw clamped to {index_count} identity indices");
        }
        _ => panic!("expected an indexed draw to be recorded"),
    }
}

#[test]
fn test_vertex_draws_share_one_geometry_combination() {
    let (device, _log) = new_device();
    let (render_pass, framebuffer) = bare_pass(&device, 1);
    let pipeline = mesh_pipeline(&device, &render_pass);
    let buffer = vertex_buffer(&device, 1024);
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();

    cb.begin().unwrap();
    cb.begin_render_pass(&render_pass, &framebuffer, Rect2D::default(), &[]);
    cb.bind_pipeline(&pipeline);
    cb.bind_vertex_buffers(0, &[(&buffer, 0)]);
    cb.draw(3, 1, 0, 0);
    cb.draw(3, 1, 3, 0);
    cb.end_render_pass();
    cb.end().unwrap();

    let commands = cb.recorded_commands();
    assert_eq!(cb.cached_geometry_count(), 1);
    assert_eq!(geometry_binds(&commands).len(), 1);
    assert_eq!(count_matching(&commands, |c| matches!(c, Command::Draw { .. })), 2);
    println!("two draws reused one vertex array combination");
}

#[test]
fn test_changed_binding_builds_new_geometry_and_rebind_reuses_it() {
    let (device, _log) = new_device();
    let (render_pass, framebuffer) = bare_pass(&device, 1);
    let pipeline = mesh_pipeline(&device, &render_pass);
    let buffer = vertex_buffer(&device, 1024);
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();

    cb.begin().unwrap();
    cb.begin_render_pass(&render_pass, &framebuffer, Rect2D::default(), &[]);
    cb.bind_pipeline(&pipeline);
    cb.bind_vertex_buffers(0, &[(&buffer, 0)]);
    cb.draw(3, 1, 0, 0);
    cb.bind_vertex_buffers(0, &[(&buffer, 16)]);
    cb.draw(3, 1, 0, 0);
    cb.bind_vertex_buffers(0, &[(&buffer, 0)]);
    cb.draw(3, 1, 0, 0);
    cb.end_render_pass();
    cb.end().unwrap();

    // Two distinct combinations, three bind switches
    assert_eq!(cb.cached_geometry_count(), 2);
    let binds = geometry_binds(&cb.recorded_commands());
    assert_eq!(binds.len(), 3);
    assert!(Arc::ptr_eq(&binds[0], &binds[2]), "same combination resolves to the same object");
    assert!(!Arc::ptr_eq(&binds[0], &binds[1]));
    println!("offset change produced a second combination, rebind reused the first");
}

#[test]
fn test_vertex_layout_change_invalidates_geometry_cache() {
    let (device, _log) = new_device();
    let (render_pass, framebuffer) = bare_pass(&device, 1);
    let narrow = mesh_pipeline(&device, &render_pass);
    let wide = common::graphics_pipeline(
        &device,
        &render_pass,
        ashes_api::PipelineVertexInputState {
            bindings: vec![ashes_api::VertexInputBindingDescription {
                binding: 0,
                stride: 32,
                input_rate: ashes_api::VertexInputRate::Vertex,
            }],
            attributes: vec![ashes_api::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: ashes_api::Format::R32G32B32A32Sfloat,
                offset: 0,
            }],
        },
    );
    let buffer = vertex_buffer(&device, 1024);
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();

    cb.begin().unwrap();
    cb.begin_render_pass(&render_pass, &framebuffer, Rect2D::default(), &[]);
    cb.bind_pipeline(&narrow);
    cb.bind_vertex_buffers(0, &[(&buffer, 0)]);
    cb.draw(3, 1, 0, 0);
    assert_eq!(cb.cached_geometry_count(), 1);

    // A different attribute layout drops every cached combination
    cb.bind_pipeline(&wide);
    assert_eq!(cb.cached_geometry_count(), 0);
    cb.draw(3, 1, 0, 0);
    assert_eq!(cb.cached_geometry_count(), 1);
    cb.end_render_pass();
    cb.end().unwrap();

    assert_eq!(geometry_binds(&cb.recorded_commands()).len(), 2);
    println!("layout change rebuilt the vertex array combination");
}

#[test]
fn test_same_layout_rebind_keeps_geometry_cache() {
    let (device, _log) = new_device();
    let (render_pass, framebuffer) = bare_pass(&device, 1);
    let first = mesh_pipeline(&device, &render_pass);
    let second = mesh_pipeline(&device, &render_pass);
    let buffer = vertex_buffer(&device, 256);
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();

    cb.begin().unwrap();
    cb.begin_render_pass(&render_pass, &framebuffer, Rect2D::default(), &[]);
    cb.bind_pipeline(&first);
    cb.bind_vertex_buffers(0, &[(&buffer, 0)]);
    cb.draw(3, 1, 0, 0);
    cb.bind_pipeline(&second);
    cb.draw(3, 1, 0, 0);
    cb.end_render_pass();
    cb.end().unwrap();

    assert_eq!(cb.cached_geometry_count(), 1);
    assert_eq!(geometry_binds(&cb.recorded_commands()).len(), 1);
    println!("identical layout rebind kept the cached combination");
}

#[test]
fn test_push_constants_stage_until_first_pipeline_bind() {
    let (device, _log) = new_device();
    let (render_pass, framebuffer) = bare_pass(&device, 1);
    let pipeline = procedural_pipeline(&device, &render_pass);
    let layout = device.create_pipeline_layout(Vec::new(), Vec::new()).unwrap();
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();

    cb.begin().unwrap();
    cb.push_constants(&layout, ShaderStageFlags::VERTEX, 0, &[1, 2, 3, 4]);
    cb.push_constants(&layout, ShaderStageFlags::VERTEX, 16, &[5, 6, 7, 8]);
    cb.begin_render_pass(&render_pass, &framebuffer, Rect2D::default(), &[]);
    cb.bind_pipeline(&pipeline);
    cb.end_render_pass();
    cb.end().unwrap();

    let commands = cb.recorded_commands();
    let bind_at = commands
        .iter()
        .position(|c| matches!(c, Command::BindPipeline { .. }))
        .expect("pipeline bind recorded");
    match (&commands[bind_at + 1], &commands[bind_at + 2]) {
        (
            Command::PushConstants { offset: 0, data: first, .. },
            Command::PushConstants { offset: 16, data: second, .. },
        ) => {
            assert_eq!(first, &vec![1, 2, 3, 4]);
            assert_eq!(second, &vec![5, 6, 7, 8]);
        }
        _ => panic!("staged push constants must follow the first bind in record order"),
    }
    println!("pre-bind push constants flushed after the bind, oldest first");
}

#[test]
fn test_push_constants_record_inline_once_bound() {
    let (device, _log) = new_device();
    let (render_pass, framebuffer) = bare_pass(&device, 1);
    let pipeline = procedural_pipeline(&device, &render_pass);
    let layout = device.create_pipeline_layout(Vec::new(), Vec::new()).unwrap();
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();

    cb.begin().unwrap();
    cb.begin_render_pass(&render_pass, &framebuffer, Rect2D::default(), &[]);
    cb.bind_pipeline(&pipeline);
    cb.push_constants(&layout, ShaderStageFlags::VERTEX, 8, &[9; 8]);
    cb.end_render_pass();
    cb.end().unwrap();

    let commands = cb.recorded_commands();
    let pushes = count_matching(&commands, |c| matches!(c, Command::PushConstants { .. }));
    assert_eq!(pushes, 1);
    println!("bound-pipeline push recorded inline");
}

#[test]
fn test_draw_without_pipeline_is_dropped() {
    let (device, _log) = new_device();
    let (render_pass, framebuffer) = bare_pass(&device, 1);
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();

    cb.begin().unwrap();
    cb.begin_render_pass(&render_pass, &framebuffer, Rect2D::default(), &[]);
    cb.draw(3, 1, 0, 0);
    cb.draw_indexed(3, 1, 0, 0, 0);
    cb.dispatch(1, 1, 1);
    cb.end_render_pass();
    cb.end().unwrap();

    let commands = cb.recorded_commands();
    assert_eq!(commands.len(), 4, "only the pass frame should remain");
    println!("draws without a pipeline were dropped");
}

#[test]
fn test_execute_commands_splices_secondary() {
    let (device, _log) = new_device();
    let pool = device.create_command_pool();
    let secondary = pool.allocate(CommandBufferLevel::Secondary).unwrap();
    secondary.begin().unwrap();
    secondary.set_line_width(3.0);
    secondary.end().unwrap();

    let primary = pool.allocate(CommandBufferLevel::Primary).unwrap();
    primary.begin().unwrap();
    primary.execute_commands(&[&secondary]).unwrap();
    primary.end().unwrap();

    let commands = primary.recorded_commands();
    assert!(matches!(commands[0], Command::SetLineWidth { width } if width == 3.0));
    println!("secondary commands spliced into the primary");
}

#[test]
fn test_execute_commands_validation() {
    let (device, _log) = new_device();
    let pool = device.create_command_pool();

    let primary = pool.allocate(CommandBufferLevel::Primary).unwrap();
    let other_primary = pool.allocate(CommandBufferLevel::Primary).unwrap();
    other_primary.begin().unwrap();
    other_primary.end().unwrap();

    let unfinished = pool.allocate(CommandBufferLevel::Secondary).unwrap();
    unfinished.begin().unwrap();

    primary.begin().unwrap();
    match primary.execute_commands(&[&primary]) {
        Err(Error::Validation(msg)) => println!("self-execution rejected: {msg}"),
        other => panic!("expected Validation error, got {:?}", other),
    }
    match primary.execute_commands(&[&other_primary]) {
        Err(Error::Validation(msg)) => println!("primary-level secondary rejected: {msg}"),
        other => panic!("expected Validation error, got {:?}", other),
    }
    match primary.execute_commands(&[&unfinished]) {
        Err(Error::Validation(msg)) => println!("still-recording secondary rejected: {msg}"),
        other => panic!("expected Validation error, got {:?}", other),
    }
    primary.end().unwrap();
}

#[test]
fn test_multi_draw_indirect_needs_the_feature() {
    let (device, _log) = gl33_device();
    assert!(!device.features().multi_draw_indirect);

    let indirect = device
        .create_buffer(&BufferCreateInfo {
            size: 256,
            usage: BufferUsageFlags::INDIRECT_BUFFER | BufferUsageFlags::TRANSFER_DST,
            memory: MemoryPropertyFlags::DEVICE_LOCAL,
        })
        .unwrap();
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();

    cb.begin().unwrap();
    match cb.draw_indirect(&indirect, 0, 4, 16) {
        Err(Error::FeatureNotPresent(what)) => {
            println!("multi-draw rejected: {what}");
        }
        other => panic!("expected FeatureNotPresent, got {:?}", other),
    }
    // A single indirect draw does not need the feature; without a bound
    // pipeline it records nothing but is not an error.
    cb.draw_indirect(&indirect, 0, 1, 16).unwrap();
    assert_eq!(cb.recorded_commands().len(), 0);
    cb.end().unwrap();
}

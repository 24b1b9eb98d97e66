//! Integration test: submission and replay
//!
//! Exercises the synchronous replay path against the fake GL table: buffer
//! state around submit, redundant-state suppression, the shared identity
//! index buffer, barrier flushes, presentation and the swap hook.
//!
//! Run with: cargo test --test submit_replay_test -- --nocapture

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ashes_api::{
    BufferCreateInfo, BufferUsageFlags, CommandBufferLevel, Error, FenceCreateFlags,
    MemoryPropertyFlags, PipelineStageFlags, Rect2D,
};
use ashes_gl::{CommandBuffer, Device, RecordState, SubmitInfo, SwapchainCreateInfo};

use common::{bare_pass, new_device, procedural_pipeline};

/// Records one layout-less triangle behind a full render pass frame.
fn record_triangle(device: &Device) -> CommandBuffer {
    let (render_pass, framebuffer) = bare_pass(device, 1);
    let pipeline = procedural_pipeline(device, &render_pass);
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();
    cb.begin().unwrap();
    cb.begin_render_pass(&render_pass, &framebuffer, Rect2D::default(), &[]);
    cb.bind_pipeline(&pipeline);
    cb.draw(3, 1, 0, 0);
    cb.end_render_pass();
    cb.end().unwrap();
    cb
}

#[test]
fn test_submit_returns_buffer_to_executable_and_signals_fence() {
    let (device, _log) = new_device();
    let queue = device.queue();
    let cb = record_triangle(&device);
    let fence = device.create_fence(FenceCreateFlags::empty());
    assert!(!fence.is_signaled());

    queue.submit_one(&cb, Some(&fence)).unwrap();
    assert_eq!(cb.state(), RecordState::Executable);
    assert!(fence.is_signaled());

    // Executable buffers can be submitted again
    queue.submit_one(&cb, None).unwrap();
    assert_eq!(cb.state(), RecordState::Executable);
    println!("buffer replayed twice, fence signaled");
}

#[test]
fn test_submit_rejects_unrecorded_buffer() {
    let (device, _log) = new_device();
    let queue = device.queue();
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();
    let fence = device.create_fence(FenceCreateFlags::empty());

    match queue.submit_one(&cb, Some(&fence)) {
        Err(Error::Validation(msg)) => println!("unrecorded submit rejected: {msg}"),
        other => panic!("expected Validation error, got {:?}", other),
    }
    assert!(!fence.is_signaled(), "a failed submission must not signal the fence");
    assert_eq!(cb.state(), RecordState::Initial);
}

#[test]
fn test_replay_suppresses_redundant_pipeline_binds() {
    let (device, log) = new_device();
    let queue = device.queue();
    let (render_pass, framebuffer) = bare_pass(&device, 1);
    let pipeline = procedural_pipeline(&device, &render_pass);
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();

    cb.begin().unwrap();
    cb.begin_render_pass(&render_pass, &framebuffer, Rect2D::default(), &[]);
    cb.bind_pipeline(&pipeline);
    cb.draw(3, 1, 0, 0);
    cb.bind_pipeline(&pipeline);
    cb.draw(3, 1, 0, 0);
    cb.end_render_pass();
    cb.end().unwrap();

    log.clear();
    queue.submit_one(&cb, None).unwrap();

    let programs: Vec<String> = log
        .take()
        .into_iter()
        .filter(|c| c.starts_with("use_program("))
        .collect();
    // One real bind plus the post-submit reset to program zero
    assert_eq!(programs.len(), 2, "got {:?}", programs);
    assert_ne!(programs[0], "use_program(0)");
    assert_eq!(programs[1], "use_program(0)");
    println!("second identical bind was suppressed: {:?}", programs);
}

#[test]
fn test_layoutless_draw_replays_as_indexed_draw() {
    let (device, log) = new_device();
    let queue = device.queue();
    let cb = record_triangle(&device);

    log.clear();
    queue.submit_one(&cb, None).unwrap();

    assert!(log.contains("draw_elements(count=3"));
    assert_eq!(log.count("draw_arrays("), 0);
    println!("triangle drew through the identity index buffer");
}

#[test]
fn test_identity_index_buffer_is_built_once() {
    let (device, log) = new_device();
    let queue = device.queue();
    let first = record_triangle(&device);
    let second = record_triangle(&device);

    log.clear();
    queue.submit_one(&first, None).unwrap();
    queue.submit_one(&second, None).unwrap();

    // One VAO and one index buffer serve every layout-less draw
    assert_eq!(log.count("create_vertex_array"), 1);
    assert_eq!(log.count("create_buffer"), 1);
    assert_eq!(log.count("draw_elements("), 2);
    println!("both submissions shared the identity geometry");
}

#[test]
fn test_host_read_barrier_replays_barrier_and_flush() {
    let (device, log) = new_device();
    let queue = device.queue();
    let buffer = device
        .create_buffer(&BufferCreateInfo {
            size: 256,
            usage: BufferUsageFlags::TRANSFER_SRC | BufferUsageFlags::TRANSFER_DST,
            memory: MemoryPropertyFlags::DEVICE_LOCAL,
        })
        .unwrap();
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();

    cb.begin().unwrap();
    cb.pipeline_barrier(
        PipelineStageFlags::TOP_OF_PIPE,
        PipelineStageFlags::TRANSFER,
        &[],
        &[buffer.make_transfer_destination()],
        &[],
    );
    cb.pipeline_barrier(
        PipelineStageFlags::TRANSFER,
        PipelineStageFlags::HOST,
        &[],
        &[buffer.make_host_read()],
        &[],
    );
    cb.end().unwrap();

    log.clear();
    queue.submit_one(&cb, None).unwrap();

    assert!(log.contains("memory_barrier("));
    assert!(log.contains("flush"), "a host-read barrier must flush the stream");
    println!("host-read barrier emitted glMemoryBarrier and a flush");
}

#[test]
fn test_wait_idle_finishes_the_stream() {
    let (device, log) = new_device();
    let queue = device.queue();

    log.clear();
    queue.wait_idle();
    assert_eq!(log.count("finish"), 1);

    device.wait_idle();
    assert_eq!(log.count("finish"), 2);
}

#[test]
fn test_unsignaled_wait_semaphore_does_not_fail_submission() {
    let (device, _log) = new_device();
    let queue = device.queue();
    let cb = record_triangle(&device);
    let buffers = [cb.clone()];
    let semaphores = [device.create_semaphore()];

    // Never signaled: logged and tolerated
    queue
        .submit(
            &[SubmitInfo {
                wait_semaphores: &semaphores,
                command_buffers: &buffers,
                signal_semaphores: &[],
            }],
            None,
        )
        .unwrap();

    // Signal in one batch, wait in the next
    queue
        .submit(
            &[SubmitInfo {
                command_buffers: &buffers,
                signal_semaphores: &semaphores,
                ..SubmitInfo::default()
            }],
            None,
        )
        .unwrap();
    queue
        .submit(
            &[SubmitInfo {
                wait_semaphores: &semaphores,
                command_buffers: &buffers,
                ..SubmitInfo::default()
            }],
            None,
        )
        .unwrap();
    println!("semaphore edges resolved across batches");
}

#[test]
fn test_acquire_present_cycle() {
    let (device, log) = new_device();
    let queue = device.queue();
    let swapchain = device
        .create_swapchain(&SwapchainCreateInfo::default())
        .expect("swapchain creation");
    assert_eq!(swapchain.image_count(), 2);

    let semaphore = device.create_semaphore();
    let index = swapchain
        .acquire_next_image(u64::MAX, Some(&semaphore), None)
        .unwrap();
    assert_eq!(index, 0);

    log.clear();
    queue
        .present(&swapchain, index, std::slice::from_ref(&semaphore))
        .unwrap();
    assert!(log.contains("blit_framebuffer"));
    assert!(log.contains("flush"), "without a swap hook present can only flush");

    // The ring rotates and wraps
    assert_eq!(swapchain.acquire_next_image(u64::MAX, None, None).unwrap(), 1);
    assert_eq!(swapchain.acquire_next_image(u64::MAX, None, None).unwrap(), 0);
    println!("present blitted and flushed, ring wrapped after {} images", 2);
}

#[test]
fn test_present_rejects_out_of_range_index() {
    let (device, _log) = new_device();
    let queue = device.queue();
    let swapchain = device
        .create_swapchain(&SwapchainCreateInfo::default())
        .expect("swapchain creation");

    match queue.present(&swapchain, 9, &[]) {
        Err(Error::Validation(msg)) => println!("bad present index rejected: {msg}"),
        other => panic!("expected Validation error, got {:?}", other),
    }
}

#[test]
fn test_swap_hook_replaces_the_flush() {
    let (device, log) = new_device();
    let queue = device.queue();
    let swapchain = device
        .create_swapchain(&SwapchainCreateInfo::default())
        .expect("swapchain creation");

    let presented = Arc::new(AtomicBool::new(false));
    let flag = presented.clone();
    device.set_swap_hook(Box::new(move || flag.store(true, Ordering::SeqCst)));

    let index = swapchain.acquire_next_image(u64::MAX, None, None).unwrap();
    log.clear();
    queue.present(&swapchain, index, &[]).unwrap();

    assert!(presented.load(Ordering::SeqCst), "the hook must run on present");
    assert!(log.contains("blit_framebuffer"));
    assert_eq!(log.count("flush"), 0, "the hook stands in for the flush");
    println!("swap hook invoked in place of the fallback flush");
}

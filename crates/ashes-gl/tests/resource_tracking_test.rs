//! Integration test: resource lifetimes and host transfers
//!
//! Walks the debug registry through create/drop cycles, exercises the
//! texel-buffer-view capability gate, and round-trips real bytes through
//! the fake GL buffer store via upload, download, mapping and recorded
//! copies.
//!
//! Run with: cargo test --test resource_tracking_test -- --nocapture

mod common;

use ashes_api::{
    BufferCopy, BufferCreateInfo, BufferUsageFlags, CommandBufferLevel, Error, Format,
    MemoryPropertyFlags, WHOLE_SIZE,
};
use ashes_gl::{Buffer, Device, MapMode};

use common::{gl33_device, new_device};

#[cfg(debug_assertions)]
use ashes_api::{
    FenceCreateFlags, ImageAspectFlags, ImageCreateInfo, ImageSubresourceRange, ImageUsageFlags,
    ImageViewCreateInfo, QueryType, SamplerCreateInfo,
};
#[cfg(debug_assertions)]
use ashes_gl::SwapchainCreateInfo;
#[cfg(debug_assertions)]
use common::{bare_pass, procedural_pipeline};

fn transfer_buffer(device: &Device, size: u64) -> Buffer {
    device
        .create_buffer(&BufferCreateInfo {
            size,
            usage: BufferUsageFlags::TRANSFER_SRC | BufferUsageFlags::TRANSFER_DST,
            memory: MemoryPropertyFlags::DEVICE_LOCAL,
        })
        .unwrap()
}

#[cfg(debug_assertions)]
#[test]
fn test_live_object_count_tracks_create_and_drop() {
    let (device, _log) = new_device();
    let baseline = device.live_object_count();

    let buffer = transfer_buffer(&device, 64);
    assert_eq!(device.live_object_count(), baseline + 1);

    {
        let image = device
            .create_image(&ImageCreateInfo {
                extent: ashes_api::Extent3D {
                    width: 8,
                    height: 8,
                    depth: 1,
                },
                usage: ImageUsageFlags::SAMPLED | ImageUsageFlags::TRANSFER_DST,
                ..ImageCreateInfo::default()
            })
            .unwrap();
        let _view = device
            .create_image_view(
                &image,
                &ImageViewCreateInfo {
                    view_type: ashes_api::ImageViewType::Type2D,
                    format: image.format(),
                    components: ashes_api::ComponentMapping::default(),
                    subresource_range: ImageSubresourceRange::whole(ImageAspectFlags::COLOR),
                },
            )
            .unwrap();
        let _sampler = device.create_sampler(&SamplerCreateInfo::default()).unwrap();
        let _fence = device.create_fence(FenceCreateFlags::empty());
        let _semaphore = device.create_semaphore();
        let _event = device.create_event();
        let _queries = device.create_query_pool(QueryType::Timestamp, 4, false).unwrap();
        assert_eq!(device.live_object_count(), baseline + 8);
    }
    assert_eq!(device.live_object_count(), baseline + 1);

    drop(buffer);
    assert_eq!(device.live_object_count(), baseline);
    println!("registry returned to {baseline} live objects");
}

#[cfg(debug_assertions)]
#[test]
fn test_command_and_swapchain_objects_unregister() {
    let (device, _log) = new_device();
    let baseline = device.live_object_count();

    {
        let pool = device.create_command_pool();
        let _cb = pool.allocate(CommandBufferLevel::Primary).unwrap();
        let (render_pass, _framebuffer) = bare_pass(&device, 1);
        let _pipeline = procedural_pipeline(&device, &render_pass);
        let _swapchain = device
            .create_swapchain(&SwapchainCreateInfo::default())
            .expect("swapchain creation");
        assert!(device.live_object_count() > baseline);
    }
    assert_eq!(device.live_object_count(), baseline);
    println!("command and swapchain objects all unregistered");
}

#[cfg(debug_assertions)]
#[test]
fn test_registry_rejects_stale_ids() {
    use ashes_gl::{ObjectKind, Registry};

    let registry = Registry::new();
    let first = registry.register(ObjectKind::Buffer);
    assert_eq!(registry.live_count(), 1);
    registry.unregister(first, ObjectKind::Buffer);
    assert_eq!(registry.live_count(), 0);

    // The freed slot is recycled under a new generation
    let second = registry.register(ObjectKind::Buffer);
    assert_ne!(first, second);
    assert_eq!(registry.live_count(), 1);

    // The old id no longer names anything
    registry.unregister(first, ObjectKind::Buffer);
    assert_eq!(registry.live_count(), 1);

    registry.unregister(second, ObjectKind::Buffer);
    assert_eq!(registry.live_count(), 0);
    assert_eq!(registry.report_leaks(), 0);
    println!("stale id was rejected, fresh id was honored");
}

#[test]
fn test_texel_view_range_is_gated_by_capability() {
    let (device, _log) = gl33_device();
    assert!(!device.backend_features().texel_buffer_range);
    let buffer = device
        .create_buffer(&BufferCreateInfo {
            size: 64,
            usage: BufferUsageFlags::UNIFORM_TEXEL_BUFFER | BufferUsageFlags::TRANSFER_DST,
            memory: MemoryPropertyFlags::DEVICE_LOCAL,
        })
        .unwrap();

    // Whole-buffer views never need the range capability
    device
        .create_buffer_view(&buffer, Format::R32G32B32A32Sfloat, 0, WHOLE_SIZE)
        .unwrap();

    match device.create_buffer_view(&buffer, Format::R32G32B32A32Sfloat, 16, 16) {
        Err(Error::FeatureNotPresent(what)) => println!("partial view rejected: {what}"),
        other => panic!("expected FeatureNotPresent, got {:?}", other.map(|_| ())),
    }

    // A GL 4.6 context accepts the same view
    let (device, _log) = new_device();
    let buffer = device
        .create_buffer(&BufferCreateInfo {
            size: 64,
            usage: BufferUsageFlags::UNIFORM_TEXEL_BUFFER | BufferUsageFlags::TRANSFER_DST,
            memory: MemoryPropertyFlags::DEVICE_LOCAL,
        })
        .unwrap();
    device
        .create_buffer_view(&buffer, Format::R32G32B32A32Sfloat, 16, 16)
        .unwrap();
}

#[test]
fn test_texel_view_requires_texel_usage() {
    let (device, _log) = new_device();
    let buffer = transfer_buffer(&device, 64);
    match device.create_buffer_view(&buffer, Format::R32G32B32A32Sfloat, 0, WHOLE_SIZE) {
        Err(Error::Validation(msg)) => println!("usage mismatch rejected: {msg}"),
        other => panic!("expected Validation error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_upload_download_round_trip() {
    let (device, _log) = new_device();
    let buffer = transfer_buffer(&device, 64);

    let pattern: Vec<u8> = (0..16).map(|i| 0xA0 + i).collect();
    buffer.upload(8, &pattern).unwrap();

    let mut read_back = [0u8; 16];
    buffer.download(8, &mut read_back).unwrap();
    assert_eq!(read_back, pattern[..]);

    // Out-of-range transfers are rejected before touching GL
    match buffer.upload(60, &pattern) {
        Err(Error::Validation(msg)) => println!("oversized upload rejected: {msg}"),
        other => panic!("expected Validation error, got {:?}", other),
    }
    match buffer.download(64, &mut read_back) {
        Err(Error::Validation(msg)) => println!("oversized download rejected: {msg}"),
        other => panic!("expected Validation error, got {:?}", other),
    }
}

#[test]
fn test_mapped_writes_reach_the_buffer() {
    let (device, _log) = new_device();
    let buffer = device
        .create_buffer(&BufferCreateInfo {
            size: 32,
            usage: BufferUsageFlags::TRANSFER_SRC | BufferUsageFlags::TRANSFER_DST,
            memory: MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
        })
        .unwrap();

    {
        let mut mapped = buffer.map(0, WHOLE_SIZE, MapMode::Write).unwrap();
        assert_eq!(mapped.len(), 32);
        for (index, byte) in mapped.data_mut().iter_mut().enumerate() {
            *byte = index as u8;
        }
        // Dropping the guard flushes the whole range and unmaps
    }

    let mut read_back = [0u8; 32];
    buffer.download(0, &mut read_back).unwrap();
    for (index, byte) in read_back.iter().enumerate() {
        assert_eq!(*byte, index as u8);
    }
    println!("mapped writes visible after unmap");
}

#[test]
fn test_map_requires_host_visible_memory() {
    let (device, _log) = new_device();
    let buffer = transfer_buffer(&device, 32);
    match buffer.map(0, WHOLE_SIZE, MapMode::Read) {
        Err(Error::MemoryMapFailed(msg)) => println!("device-local map rejected: {msg}"),
        other => panic!("expected MemoryMapFailed, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_recorded_buffer_copy_moves_bytes() {
    let (device, _log) = new_device();
    let queue = device.queue();
    let src = transfer_buffer(&device, 32);
    let dst = transfer_buffer(&device, 32);

    let pattern: Vec<u8> = (0..16).map(|i| 0x10 + i).collect();
    src.upload(0, &pattern).unwrap();

    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();
    cb.begin().unwrap();
    cb.copy_buffer(
        &src,
        &dst,
        &[BufferCopy {
            src_offset: 0,
            dst_offset: 8,
            size: 16,
        }],
    );
    cb.end().unwrap();
    queue.submit_one(&cb, None).unwrap();

    let mut read_back = [0u8; 16];
    dst.download(8, &mut read_back).unwrap();
    assert_eq!(read_back, pattern[..]);
    println!("copy landed at destination offset 8");
}

#[test]
fn test_fill_and_update_buffer_replay() {
    let (device, _log) = new_device();
    let queue = device.queue();
    let buffer = transfer_buffer(&device, 32);

    let inline: Vec<u8> = (0..8).map(|i| 0x80 + i).collect();
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();
    cb.begin().unwrap();
    cb.fill_buffer(&buffer, 0, 8, 0xDEAD_BEEF);
    cb.update_buffer(&buffer, 16, &inline);
    cb.end().unwrap();
    queue.submit_one(&cb, None).unwrap();

    let mut read_back = [0u8; 32];
    buffer.download(0, &mut read_back).unwrap();
    let word = 0xDEAD_BEEFu32.to_ne_bytes();
    assert_eq!(read_back[0..4], word);
    assert_eq!(read_back[4..8], word);
    assert_eq!(read_back[16..24], inline[..]);
    println!("fill wrote two words, update wrote the inline payload");
}

#[test]
fn test_misaligned_fill_is_dropped() {
    let (device, _log) = new_device();
    let buffer = transfer_buffer(&device, 32);
    let pool = device.create_command_pool();
    let cb = pool.allocate(CommandBufferLevel::Primary).unwrap();
    cb.begin().unwrap();
    cb.fill_buffer(&buffer, 2, 8, 0xFFFF_FFFF);
    cb.end().unwrap();
    assert_eq!(cb.recorded_commands().len(), 0);
}

//! One-shot staging transfers.
//!
//! A [`StagingBuffer`] owns a host-visible buffer, a command pool and a
//! fence, and moves data between the host and device-local resources using
//! single-submission command buffers. Buffer uploads and downloads chunk
//! through the staging allocation; image transfers need the whole payload
//! to fit.

use tracing::debug;

use ashes_api::{
    BufferCopy, BufferCreateInfo, BufferImageCopy, BufferUsageFlags, CommandBufferLevel, Error,
    FenceCreateFlags, MemoryPropertyFlags, PipelineStageFlags, Result, WaitResult,
};

use crate::buffer::{Buffer, MapMode};
use crate::command_buffer::{CommandBuffer, CommandPool};
use crate::device::Device;
use crate::image::Image;
use crate::queue::Queue;
use crate::sync::Fence;

pub struct StagingBuffer {
    buffer: Buffer,
    pool: CommandPool,
    queue: Queue,
    fence: Fence,
}

impl StagingBuffer {
    /// Allocates `size` bytes of host-visible staging memory.
    pub fn new(device: &Device, size: u64) -> Result<Self> {
        let buffer = device.create_buffer(&BufferCreateInfo {
            size,
            usage: BufferUsageFlags::TRANSFER_SRC | BufferUsageFlags::TRANSFER_DST,
            memory: MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
        })?;
        debug!("created staging buffer ({} bytes)", size);
        Ok(Self {
            buffer,
            pool: device.create_command_pool(),
            queue: device.queue(),
            fence: device.create_fence(FenceCreateFlags::empty()),
        })
    }

    pub fn capacity(&self) -> u64 {
        self.buffer.size()
    }

    /// Copies `data` into a device-local buffer, chunking through the
    /// staging allocation.
    pub fn upload_buffer(&self, dst: &Buffer, dst_offset: u64, data: &[u8]) -> Result<()> {
        let capacity = self.capacity() as usize;
        for (chunk_index, chunk) in data.chunks(capacity).enumerate() {
            let offset = dst_offset + (chunk_index * capacity) as u64;
            {
                let mut mapped = self.buffer.map(0, chunk.len() as u64, MapMode::Write)?;
                mapped.data_mut().copy_from_slice(chunk);
            }
            self.one_shot(|recorder| {
                recorder.pipeline_barrier(
                    PipelineStageFlags::HOST,
                    PipelineStageFlags::TRANSFER,
                    &[],
                    &[self.buffer.make_transfer_source()],
                    &[],
                );
                recorder.copy_buffer(
                    &self.buffer,
                    dst,
                    &[BufferCopy {
                        src_offset: 0,
                        dst_offset: offset,
                        size: chunk.len() as u64,
                    }],
                );
            })?;
        }
        Ok(())
    }

    /// Reads a device-local buffer back into `out`, chunking through the
    /// staging allocation.
    pub fn download_buffer(&self, src: &Buffer, src_offset: u64, out: &mut [u8]) -> Result<()> {
        let capacity = self.capacity() as usize;
        for (chunk_index, chunk) in out.chunks_mut(capacity).enumerate() {
            let offset = src_offset + (chunk_index * capacity) as u64;
            self.one_shot(|recorder| {
                recorder.copy_buffer(
                    src,
                    &self.buffer,
                    &[BufferCopy {
                        src_offset: offset,
                        dst_offset: 0,
                        size: chunk.len() as u64,
                    }],
                );
                recorder.pipeline_barrier(
                    PipelineStageFlags::TRANSFER,
                    PipelineStageFlags::HOST,
                    &[],
                    &[self.buffer.make_host_read()],
                    &[],
                );
            })?;
            let mapped = self.buffer.map(0, chunk.len() as u64, MapMode::Read)?;
            chunk.copy_from_slice(mapped.data());
        }
        Ok(())
    }

    /// Copies `data` into an image region. `region.buffer_offset` indexes
    /// into `data`, which must fit the staging allocation whole.
    pub fn upload_image(&self, image: &Image, region: &BufferImageCopy, data: &[u8]) -> Result<()> {
        self.check_payload(data.len())?;
        {
            let mut mapped = self.buffer.map(0, data.len() as u64, MapMode::Write)?;
            mapped.data_mut().copy_from_slice(data);
        }
        self.one_shot(|recorder| {
            recorder.pipeline_barrier(
                PipelineStageFlags::HOST,
                PipelineStageFlags::TRANSFER,
                &[],
                &[self.buffer.make_transfer_source()],
                &[image.make_transfer_destination()],
            );
            recorder.copy_buffer_to_image(&self.buffer, image, std::slice::from_ref(region));
        })
    }

    /// Reads an image region back into `out`. `region.buffer_offset`
    /// indexes into `out`, which must fit the staging allocation whole.
    pub fn download_image(
        &self,
        image: &Image,
        region: &BufferImageCopy,
        out: &mut [u8],
    ) -> Result<()> {
        self.check_payload(out.len())?;
        self.one_shot(|recorder| {
            recorder.pipeline_barrier(
                PipelineStageFlags::TRANSFER,
                PipelineStageFlags::TRANSFER,
                &[],
                &[],
                &[image.make_transfer_source()],
            );
            recorder.copy_image_to_buffer(image, &self.buffer, std::slice::from_ref(region));
            recorder.pipeline_barrier(
                PipelineStageFlags::TRANSFER,
                PipelineStageFlags::HOST,
                &[],
                &[self.buffer.make_host_read()],
                &[],
            );
        })?;
        let mapped = self.buffer.map(0, out.len() as u64, MapMode::Read)?;
        out.copy_from_slice(mapped.data());
        Ok(())
    }

    fn check_payload(&self, len: usize) -> Result<()> {
        if len as u64 > self.capacity() {
            return Err(Error::Validation(format!(
                "{} byte payload exceeds the {} byte staging buffer",
                len,
                self.capacity()
            )));
        }
        Ok(())
    }

    /// Records, submits and waits out one transfer command buffer.
    fn one_shot(&self, record: impl FnOnce(&CommandBuffer)) -> Result<()> {
        let recorder = self.pool.allocate(CommandBufferLevel::Primary)?;
        recorder.begin()?;
        record(&recorder);
        recorder.end()?;
        self.queue.submit_one(&recorder, Some(&self.fence))?;
        if self.fence.wait(u64::MAX) != WaitResult::Success {
            return Err(Error::DeviceLost(
                "staging submission never completed".into(),
            ));
        }
        self.fence.reset();
        Ok(())
    }
}

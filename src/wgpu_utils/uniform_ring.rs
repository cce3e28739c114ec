// src/wgpu_utils/uniform_ring.rs
//! Per-frame uniform snapshots addressed by dynamic offsets
//!
//! Every draw pushes the full uniform block of its program. The ring keeps the
//! snapshots on the CPU while the frame is recorded and writes them to one GPU
//! buffer right before the frame is encoded, growing the buffer when needed.

const MIN_CAPACITY: u64 = 4096;

pub struct UniformRing {
    label: String,
    alignment: u32,
    staging: Vec<u8>,
    buffer: Option<wgpu::Buffer>,
    capacity: u64,
}

impl UniformRing {
    /// `alignment` is the device's `min_uniform_buffer_offset_alignment`
    pub fn new(label: &str, alignment: u32) -> Self {
        Self {
            label: label.to_owned(),
            alignment: alignment.max(4),
            staging: Vec::new(),
            buffer: None,
            capacity: 0,
        }
    }

    /// Appends a snapshot, returning its dynamic offset
    pub fn push(&mut self, data: &[u8]) -> u32 {
        let offset = wgpu::util::align_to(self.staging.len() as u32, self.alignment);
        self.staging.resize(offset as usize, 0);
        self.staging.extend_from_slice(data);
        offset
    }

    /// Writes the recorded snapshots to the GPU buffer
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if self.is_empty() {
            return;
        }
        let len = wgpu::util::align_to(self.len() as u64, wgpu::COPY_BUFFER_ALIGNMENT);
        self.staging.resize(len as usize, 0);

        if self.buffer.is_none() || self.capacity < len {
            self.capacity = len.next_power_of_two().max(MIN_CAPACITY);
            log::debug!("{}: growing to {} bytes", self.label, self.capacity);
            self.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&self.label),
                size: self.capacity,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }

        if let Some(buffer) = &self.buffer {
            queue.write_buffer(buffer, 0, &self.staging);
        }
    }

    pub fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }

    /// Drops this frame's snapshots; the GPU buffer is kept
    pub fn reset(&mut self) {
        self.staging.clear();
    }

    pub fn len(&self) -> usize {
        self.staging.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staging.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_start_on_aligned_offsets() {
        let mut ring = UniformRing::new("test ring", 256);
        assert_eq!(ring.push(&[1u8; 224]), 0);
        assert_eq!(ring.push(&[2u8; 64]), 256);
        assert_eq!(ring.push(&[3u8; 16]), 512);
        assert_eq!(ring.len(), 528);
    }

    #[test]
    fn reset_rewinds_to_zero() {
        let mut ring = UniformRing::new("test ring", 256);
        ring.push(&[0u8; 64]);
        ring.reset();
        assert!(ring.is_empty());
        assert_eq!(ring.push(&[0u8; 64]), 0);
    }
}

//! GPU timestamps around the occlusion pass batch.
//!
//! Two timestamps bracket the batch. They are resolved into a ring of
//! readback buffers so reading a result never stalls the frame; results arrive
//! a few frames late.

use std::sync::mpsc;

const TIMESTAMP_COUNT: u32 = 2;
const TIMESTAMP_BYTES: u64 = TIMESTAMP_COUNT as u64 * std::mem::size_of::<u64>() as u64;
const READBACK_SLOTS: usize = 3;

struct Slot {
    resolve: wgpu::Buffer,
    readback: wgpu::Buffer,
    pending: Option<mpsc::Receiver<Result<(), wgpu::BufferAsyncError>>>,
}

/// Converts a pair of raw timestamps to milliseconds.
///
/// Returns `None` for an unwritten or reversed pair.
pub fn ticks_to_ms(start: u64, end: u64, period_ns: f32) -> Option<f64> {
    if start == 0 || end < start {
        return None;
    }
    Some((end - start) as f64 * f64::from(period_ns) / 1_000_000.0)
}

/// Timestamp query timer for the pass batch.
pub struct GpuTimer {
    query_set: wgpu::QuerySet,
    slots: Vec<Slot>,
    frame: u64,
    slot_just_written: Option<usize>,
}

impl GpuTimer {
    /// Creates the timer, or `None` when the device lacks timestamp queries.
    pub fn new(device: &wgpu::Device) -> Option<Self> {
        if !device.features().contains(wgpu::Features::TIMESTAMP_QUERY) {
            log::warn!("device has no TIMESTAMP_QUERY, SSAO GPU timing disabled");
            return None;
        }

        let query_set = device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("SSAO Timestamp Query Set"),
            count: TIMESTAMP_COUNT,
            ty: wgpu::QueryType::Timestamp,
        });

        let slots = (0..READBACK_SLOTS)
            .map(|i| Slot {
                resolve: device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("SSAO Timestamp Resolve {i}")),
                    size: TIMESTAMP_BYTES,
                    usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
                    mapped_at_creation: false,
                }),
                readback: device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("SSAO Timestamp Readback {i}")),
                    size: TIMESTAMP_BYTES,
                    usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                    mapped_at_creation: false,
                }),
                pending: None,
            })
            .collect();

        Some(Self {
            query_set,
            slots,
            frame: 0,
            slot_just_written: None,
        })
    }

    fn write_marker(&self, encoder: &mut wgpu::CommandEncoder, label: &str, index: u32) {
        // an empty compute pass carries the timestamp
        let _pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: Some(wgpu::ComputePassTimestampWrites {
                query_set: &self.query_set,
                beginning_of_pass_write_index: Some(index),
                end_of_pass_write_index: None,
            }),
        });
    }

    /// Records the start timestamp.
    pub fn begin(&self, encoder: &mut wgpu::CommandEncoder) {
        self.write_marker(encoder, "SSAO Timer Begin", 0);
    }

    /// Records the end timestamp and resolves both into the next free slot.
    pub fn end(&mut self, encoder: &mut wgpu::CommandEncoder) {
        self.write_marker(encoder, "SSAO Timer End", 1);

        let index = (self.frame as usize) % self.slots.len();
        let slot = &self.slots[index];
        if slot.pending.is_some() {
            // still being read back, drop this frame's sample
            self.slot_just_written = None;
            return;
        }
        encoder.resolve_query_set(&self.query_set, 0..TIMESTAMP_COUNT, &slot.resolve, 0);
        encoder.copy_buffer_to_buffer(&slot.resolve, 0, &slot.readback, 0, TIMESTAMP_BYTES);
        self.slot_just_written = Some(index);
    }

    /// Call once after the encoder holding the batch was submitted. Starts the
    /// readback of this frame and returns every result that became ready.
    pub fn collect(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> Vec<f64> {
        let _ = device.poll(wgpu::PollType::Poll);

        let period = queue.get_timestamp_period();
        let mut results = Vec::new();
        for slot in &mut self.slots {
            let Some(rx) = slot.pending.as_ref() else {
                continue;
            };
            match rx.try_recv() {
                Ok(Ok(())) => {}
                Err(mpsc::TryRecvError::Empty) => continue,
                Ok(Err(_)) | Err(mpsc::TryRecvError::Disconnected) => {
                    slot.pending = None;
                    continue;
                }
            }

            {
                let mapped = slot.readback.slice(..).get_mapped_range();
                let timestamps: &[u64] = bytemuck::cast_slice(&mapped);
                if let [start, end, ..] = timestamps {
                    results.extend(ticks_to_ms(*start, *end, period));
                }
            }
            slot.readback.unmap();
            slot.pending = None;
        }

        if let Some(index) = self.slot_just_written.take() {
            let slot = &mut self.slots[index];
            let (tx, rx) = mpsc::channel();
            slot.readback
                .slice(..)
                .map_async(wgpu::MapMode::Read, move |result| {
                    let _ = tx.send(result);
                });
            slot.pending = Some(rx);
        }
        self.frame += 1;

        results
    }
}

//! Playback buffer pool and cycler
//!
//! A fixed set of sink buffers is primed with silence and queued before
//! playback starts. From then on each step takes back exactly one finished
//! buffer, refills it with the latest capture block and re-queues it, so at
//! most one buffer is ever outside the queue and added latency stays below
//! `(buffers - 1) × block duration`.

use tracing::{debug, trace, warn};

use crate::audio::buffer::PcmBlock;
use crate::audio::error::{AudioError, AudioResult};
use crate::audio::sink::{BufferId, PlaybackSink};

/// Scheduling state of one pool buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Out of the queue, waiting for new content
    Free,
    /// Queued on the sink
    Queued,
}

#[derive(Debug, Clone)]
struct Slot {
    id: BufferId,
    state: BufferState,
    /// Samples written on the last fill
    len: usize,
}

/// Outcome of [`BufferPool::cycle_step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No buffer has finished playing yet
    Idle,
    /// `id` was refilled with `samples` samples and re-queued
    Refilled { id: BufferId, samples: usize },
}

/// Fixed pool of playback buffers cycled through a [`PlaybackSink`]
#[derive(Debug)]
pub struct BufferPool {
    slots: Vec<Slot>,
    block_capacity: usize,
    sample_rate: u32,
    released: bool,
}

impl BufferPool {
    /// Allocate `count` buffers, fill each with `block_capacity` samples of
    /// silence and queue them all, in order
    ///
    /// Must run once, before playback starts. Any failure deletes the
    /// buffers created so far and is returned; there is no partial pool.
    pub fn prime<P>(
        sink: &mut P,
        count: usize,
        block_capacity: usize,
        sample_rate: u32,
    ) -> AudioResult<Self>
    where
        P: PlaybackSink + ?Sized,
    {
        if count == 0 || block_capacity == 0 {
            return Err(AudioError::InvalidState(format!(
                "cannot prime {} buffers of {} samples",
                count, block_capacity
            )));
        }

        let ids = sink.create_buffers(count)?;
        if ids.len() != count {
            sink.delete_buffers(&ids);
            return Err(AudioError::InvalidState(format!(
                "sink created {} of {} buffers",
                ids.len(),
                count
            )));
        }

        let silence = PcmBlock::silent(block_capacity);
        let filled = ids
            .iter()
            .try_for_each(|&id| sink.fill_buffer(id, silence.as_slice(), sample_rate))
            .and_then(|()| sink.queue(&ids));

        if let Err(e) = filled {
            warn!("Priming playback buffers failed: {}", e);
            sink.delete_buffers(&ids);
            return Err(e);
        }

        debug!(
            "Primed {} playback buffers of {} samples",
            count, block_capacity
        );

        Ok(Self {
            slots: ids
                .into_iter()
                .map(|id| Slot {
                    id,
                    state: BufferState::Queued,
                    len: block_capacity,
                })
                .collect(),
            block_capacity,
            sample_rate,
            released: false,
        })
    }

    /// Total number of buffers
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn block_capacity(&self) -> usize {
        self.block_capacity
    }

    /// Buffers currently queued on the sink
    pub fn queued(&self) -> usize {
        self.count(BufferState::Queued)
    }

    /// Buffers taken out of the queue and awaiting refill
    pub fn refilling(&self) -> usize {
        self.count(BufferState::Free)
    }

    /// Whether every buffer is accounted for and at most one is out
    pub fn is_conserved(&self) -> bool {
        self.queued() + self.refilling() == self.len() && self.refilling() <= 1
    }

    pub fn ids(&self) -> Vec<BufferId> {
        self.slots.iter().map(|slot| slot.id).collect()
    }

    pub fn state_of(&self, id: BufferId) -> Option<BufferState> {
        self.slots
            .iter()
            .find(|slot| slot.id == id)
            .map(|slot| slot.state)
    }

    /// Samples written into `id` on its last fill
    pub fn filled_len(&self, id: BufferId) -> Option<usize> {
        self.slots
            .iter()
            .find(|slot| slot.id == id)
            .map(|slot| slot.len)
    }

    /// Whether a cycle step would find a buffer to refill
    pub fn has_finished<P>(&self, sink: &P) -> bool
    where
        P: PlaybackSink + ?Sized,
    {
        self.pending().is_some() || sink.completed_count() > 0
    }

    /// Take back one finished buffer, refill it with `block` and re-queue it
    ///
    /// Only one buffer is serviced per call even when the sink reports more
    /// as completed. If the refill fails after the buffer was taken back, it
    /// stays out of the queue and the next call reuses it instead of
    /// dequeuing another one.
    pub fn cycle_step<P>(&mut self, sink: &mut P, block: &PcmBlock) -> AudioResult<CycleOutcome>
    where
        P: PlaybackSink + ?Sized,
    {
        if self.released {
            return Err(AudioError::InvalidState("buffer pool released".to_string()));
        }
        if block.is_empty() {
            return Err(AudioError::EmptyBlock);
        }
        if block.len() > self.block_capacity {
            return Err(AudioError::BlockTooLarge {
                len: block.len(),
                capacity: self.block_capacity,
            });
        }

        let index = match self.pending() {
            Some(index) => index,
            None => {
                let completed = sink.completed_count();
                if completed == 0 {
                    return Ok(CycleOutcome::Idle);
                }
                if completed > 1 {
                    trace!("{} buffers finished, servicing one", completed);
                }

                let id = sink.dequeue_one()?;
                let index = self
                    .slots
                    .iter()
                    .position(|slot| slot.id == id)
                    .ok_or(AudioError::UnknownBuffer(id))?;
                if self.slots[index].state != BufferState::Queued {
                    return Err(AudioError::InvalidState(format!(
                        "sink returned buffer {} that was not queued",
                        id
                    )));
                }
                self.slots[index].state = BufferState::Free;
                index
            }
        };

        let id = self.slots[index].id;
        sink.fill_buffer(id, block.as_slice(), self.sample_rate)?;
        self.slots[index].len = block.len();
        sink.queue(&[id])?;
        self.slots[index].state = BufferState::Queued;

        Ok(CycleOutcome::Refilled {
            id,
            samples: block.len(),
        })
    }

    /// Delete every buffer from the sink
    ///
    /// The source must be stopped first. Only the first call has an effect.
    pub fn release<P>(&mut self, sink: &mut P)
    where
        P: PlaybackSink + ?Sized,
    {
        if self.released {
            return;
        }
        sink.delete_buffers(&self.ids());
        for slot in &mut self.slots {
            slot.state = BufferState::Free;
        }
        self.released = true;
        debug!("Released {} playback buffers", self.slots.len());
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn pending(&self) -> Option<usize> {
        if self.released {
            return None;
        }
        self.slots
            .iter()
            .position(|slot| slot.state == BufferState::Free)
    }

    fn count(&self, state: BufferState) -> usize {
        self.slots.iter().filter(|slot| slot.state == state).count()
    }
}

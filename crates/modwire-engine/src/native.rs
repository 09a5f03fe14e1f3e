//! In-process reference backend.
//!
//! `NativeEngine` implements `EngineBackend` with the same state shape and
//! locking discipline a real render engine uses: every piece of graph
//! state lives behind one `parking_lot::RwLock`, the render thread takes
//! the lock once per iteration, and control-side mutations insert only
//! fully-built records under the write lock. Stopping joins the
//! render thread, so no teardown can race a live iteration.
//!
//! It performs no DSP and opens no audio device; the render thread exists
//! to exercise the start/mutate and teardown protocols.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;

use modwire_core::{Direction, Entity, GraphError, Result, Sample, Width, WireId};

use crate::backend::{BlockDesc, BlockIo, EngineBackend, Transform};
use crate::EngineConfig;

struct NativeBlock {
    desc: BlockDesc,
    inputs: Vec<Sample>,
    outputs: Vec<Sample>,
    input_ids: Vec<Entity>,
    output_ids: Vec<Entity>,
}

struct NativeWire {
    src: Entity,
    dst: Entity,
    src_index: usize,
    dst_index: usize,
    transform: Transform,
    gain: Sample,
    offset: Sample,
}

#[derive(Default)]
struct EngineState {
    blocks: HashMap<Entity, NativeBlock>,
    wires: HashMap<WireId, NativeWire>,
    output: Option<(Entity, Width)>,
    frames_rendered: u64,
}

struct RenderHandle {
    stop_tx: Sender<()>,
    thread: JoinHandle<()>,
}

/// In-process engine backend
pub struct NativeEngine {
    config: EngineConfig,
    state: Arc<RwLock<EngineState>>,
    next_id: Arc<AtomicU64>,
    render: Option<RenderHandle>,
}

impl NativeEngine {
    /// Create a stopped engine with the given configuration
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(EngineState::default())),
            next_id: Arc::new(AtomicU64::new(1)),
            render: None,
        }
    }

    /// Whether the render thread is currently running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.render.is_some()
    }

    /// Total frames the render context has consumed so far
    #[must_use]
    pub fn frames_rendered(&self) -> u64 {
        self.state.read().frames_rendered
    }

    /// Current output routing, if any
    #[must_use]
    pub fn output_ref(&self) -> Option<(Entity, Width)> {
        self.state.read().output
    }

    fn alloc_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn render_loop(
        state: &Arc<RwLock<EngineState>>,
        stop_rx: &Receiver<()>,
        block_size: usize,
        sample_rate: u32,
    ) {
        let period = Duration::from_secs_f64(f64::from(block_size as u32) / f64::from(sample_rate));
        loop {
            {
                // One render iteration holds the lock for the whole graph
                // traversal, mirroring the real engine's callback.
                let mut state = state.write();
                state.frames_rendered += block_size as u64;
            }
            match stop_rx.recv_timeout(period) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
    }
}

impl EngineBackend for NativeEngine {
    fn create_block(&mut self, desc: &BlockDesc) -> Entity {
        let entity = Entity(self.alloc_id());
        let input_ids = (0..desc.input_size())
            .map(|_| Entity(self.alloc_id()))
            .collect();
        let output_ids = (0..desc.output_size())
            .map(|_| Entity(self.alloc_id()))
            .collect();
        let block = NativeBlock {
            desc: *desc,
            inputs: desc.initial_inputs(),
            outputs: vec![0.0; desc.output_size()],
            input_ids,
            output_ids,
        };
        self.state.write().blocks.insert(entity, block);
        tracing::debug!("Created block {} ({:?})", entity, desc);
        entity
    }

    fn view_block(&self, block: Entity) -> Result<BlockIo> {
        let state = self.state.read();
        let native = state
            .blocks
            .get(&block)
            .ok_or(GraphError::UnknownBlock(block))?;
        Ok(BlockIo {
            input_ids: native.input_ids.clone(),
            output_ids: native.output_ids.clone(),
        })
    }

    fn get_value(
        &self,
        block: Entity,
        direction: Direction,
        index: usize,
        width: Width,
    ) -> Result<Vec<Sample>> {
        let state = self.state.read();
        let native = state
            .blocks
            .get(&block)
            .ok_or(GraphError::UnknownBlock(block))?;
        let storage = match direction {
            Direction::Input => &native.inputs,
            Direction::Output => &native.outputs,
        };
        storage
            .get(index..index + width)
            .map(<[Sample]>::to_vec)
            .ok_or_else(|| {
                GraphError::InvalidSchema(format!(
                    "{direction} range {index}..{} out of bounds for {:?}",
                    index + width,
                    native.desc
                ))
            })
    }

    fn set_value(&mut self, block: Entity, index: usize, value: &[Sample]) -> Result<()> {
        let mut state = self.state.write();
        let native = state
            .blocks
            .get_mut(&block)
            .ok_or(GraphError::UnknownBlock(block))?;
        let slot = native
            .inputs
            .get_mut(index..index + value.len())
            .ok_or_else(|| {
                GraphError::InvalidSchema(format!(
                    "input range {index}..{} out of bounds for {:?}",
                    index + value.len(),
                    native.desc
                ))
            })?;
        slot.copy_from_slice(value);
        Ok(())
    }

    fn add_wire(
        &mut self,
        src: Entity,
        dst: Entity,
        src_index: usize,
        dst_index: usize,
        transform: Transform,
        gain: Sample,
        offset: Sample,
    ) -> Result<WireId> {
        let id = WireId(self.alloc_id());
        let mut state = self.state.write();
        if !state.blocks.contains_key(&src) {
            return Err(GraphError::UnknownBlock(src));
        }
        if !state.blocks.contains_key(&dst) {
            return Err(GraphError::UnknownBlock(dst));
        }
        // One wire per input; a second driver must go through a mixer.
        if state
            .wires
            .values()
            .any(|w| w.dst == dst && w.dst_index == dst_index)
        {
            return Err(GraphError::InputOccupied {
                block: dst,
                index: dst_index,
            });
        }
        state.wires.insert(
            id,
            NativeWire {
                src,
                dst,
                src_index,
                dst_index,
                transform,
                gain,
                offset,
            },
        );
        tracing::debug!("Added wire {} {} -> {} ({:?})", id, src, dst, transform);
        Ok(id)
    }

    fn add_wire_to_mixer(
        &mut self,
        src: Entity,
        mixer: Entity,
        src_index: usize,
        slot_index: usize,
        transform: Transform,
        gain: Sample,
        offset: Sample,
    ) -> Result<WireId> {
        let id = WireId(self.alloc_id());
        let mut state = self.state.write();
        if !state.blocks.contains_key(&src) {
            return Err(GraphError::UnknownBlock(src));
        }
        if !state.blocks.contains_key(&mixer) {
            return Err(GraphError::UnknownBlock(mixer));
        }
        if state
            .wires
            .values()
            .any(|w| w.dst == mixer && w.dst_index == slot_index)
        {
            return Err(GraphError::InputOccupied {
                block: mixer,
                index: slot_index,
            });
        }
        state.wires.insert(
            id,
            NativeWire {
                src,
                dst: mixer,
                src_index,
                dst_index: slot_index,
                transform,
                gain,
                offset,
            },
        );
        tracing::debug!(
            "Added mixer wire {} {} -> {} slot {} ({:?})",
            id,
            src,
            mixer,
            slot_index,
            transform
        );
        Ok(id)
    }

    fn disconnect_wire(&mut self, wire: WireId) -> Result<()> {
        let mut state = self.state.write();
        state
            .wires
            .remove(&wire)
            .map(|_| tracing::debug!("Removed wire {}", wire))
            .ok_or(GraphError::UnknownWire(wire))
    }

    fn remove_block(&mut self, block: Entity) -> Result<()> {
        let mut state = self.state.write();
        state
            .blocks
            .remove(&block)
            .map(|_| tracing::debug!("Removed block {}", block))
            .ok_or(GraphError::UnknownBlock(block))?;
        if state.output.is_some_and(|(out, _)| out == block) {
            state.output = None;
        }
        Ok(())
    }

    fn tweak_wire_gain(&mut self, wire: WireId, gain: Sample) -> Result<()> {
        let mut state = self.state.write();
        let native = state
            .wires
            .get_mut(&wire)
            .ok_or(GraphError::UnknownWire(wire))?;
        native.gain = gain;
        Ok(())
    }

    fn tweak_wire_offset(&mut self, wire: WireId, offset: Sample) -> Result<()> {
        let mut state = self.state.write();
        let native = state
            .wires
            .get_mut(&wire)
            .ok_or(GraphError::UnknownWire(wire))?;
        native.offset = offset;
        Ok(())
    }

    fn set_output(&mut self, block: Entity, width: Width) -> Result<()> {
        let mut state = self.state.write();
        if !state.blocks.contains_key(&block) {
            return Err(GraphError::UnknownBlock(block));
        }
        state.output = Some((block, width));
        tracing::debug!("Output routed to {} ({} channel(s))", block, width);
        Ok(())
    }

    fn start_audio(&mut self) {
        if self.render.is_some() {
            tracing::warn!("start_audio called while already running");
            return;
        }
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let state = Arc::clone(&self.state);
        let block_size = self.config.block_size;
        let sample_rate = self.config.sample_rate;
        let thread = std::thread::spawn(move || {
            Self::render_loop(&state, &stop_rx, block_size, sample_rate);
        });
        self.render = Some(RenderHandle { stop_tx, thread });
        tracing::info!("Render context started");
    }

    fn stop_audio(&mut self) {
        if let Some(handle) = self.render.take() {
            // The join is the acknowledgement: once it returns, the render
            // context can no longer observe graph state.
            let _ = handle.stop_tx.send(());
            if handle.thread.join().is_err() {
                tracing::error!("Render thread panicked during shutdown");
            }
            tracing::info!("Render context stopped");
        }
    }
}

impl Drop for NativeEngine {
    fn drop(&mut self) {
        self.stop_audio();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MixerSize;

    fn engine() -> NativeEngine {
        NativeEngine::new(EngineConfig::default())
    }

    #[test]
    fn test_create_and_view_block() {
        let mut engine = engine();
        let osc = engine.create_block(&BlockDesc::SineOsc {
            freq: 440.0,
            amp: 1.0,
        });
        let io = engine.view_block(osc).unwrap();
        assert_eq!(io.input_ids.len(), 2);
        assert_eq!(io.output_ids.len(), 1);

        assert!(engine.view_block(Entity(9999)).is_err());
    }

    #[test]
    fn test_value_roundtrip() {
        let mut engine = engine();
        let osc = engine.create_block(&BlockDesc::SineOsc {
            freq: 440.0,
            amp: 0.5,
        });

        // Constructor arguments land in the input storage
        assert_eq!(
            engine.get_value(osc, Direction::Input, 0, 2).unwrap(),
            vec![440.0, 0.5]
        );

        engine.set_value(osc, 0, &[220.0]).unwrap();
        assert_eq!(
            engine.get_value(osc, Direction::Input, 0, 1).unwrap(),
            vec![220.0]
        );
    }

    #[test]
    fn test_value_out_of_range() {
        let mut engine = engine();
        let osc = engine.create_block(&BlockDesc::SineOsc {
            freq: 440.0,
            amp: 1.0,
        });
        assert!(engine.get_value(osc, Direction::Input, 1, 4).is_err());
        assert!(engine.set_value(osc, 2, &[1.0]).is_err());
    }

    #[test]
    fn test_input_occupied() {
        let mut engine = engine();
        let a = engine.create_block(&BlockDesc::SineOsc {
            freq: 440.0,
            amp: 1.0,
        });
        let b = engine.create_block(&BlockDesc::SineOsc {
            freq: 220.0,
            amp: 1.0,
        });
        let dst = engine.create_block(&BlockDesc::Product);

        engine
            .add_wire(a, dst, 0, 0, Transform::Direct1to1, 1.0, 0.0)
            .unwrap();
        let second = engine.add_wire(b, dst, 0, 0, Transform::Direct1to1, 1.0, 0.0);
        assert!(matches!(second, Err(GraphError::InputOccupied { .. })));

        // The other input is still free
        engine
            .add_wire(b, dst, 0, 1, Transform::Direct1to1, 1.0, 0.0)
            .unwrap();
    }

    #[test]
    fn test_disconnect_frees_input() {
        let mut engine = engine();
        let a = engine.create_block(&BlockDesc::SineOsc {
            freq: 440.0,
            amp: 1.0,
        });
        let dst = engine.create_block(&BlockDesc::Product);

        let wire = engine
            .add_wire(a, dst, 0, 0, Transform::Direct1to1, 1.0, 0.0)
            .unwrap();
        engine.disconnect_wire(wire).unwrap();
        assert!(matches!(
            engine.disconnect_wire(wire),
            Err(GraphError::UnknownWire(_))
        ));

        // Input is free again
        engine
            .add_wire(a, dst, 0, 0, Transform::Direct1to1, 1.0, 0.0)
            .unwrap();
    }

    #[test]
    fn test_mixer_slot_occupancy_is_per_slot() {
        let mut engine = engine();
        let a = engine.create_block(&BlockDesc::SineOsc {
            freq: 440.0,
            amp: 1.0,
        });
        let mixer = engine.create_block(&BlockDesc::MonoMixer(MixerSize::M4));

        let transform = Transform::MonoToMonoMixer(MixerSize::M4);
        engine
            .add_wire_to_mixer(a, mixer, 0, 0, transform, 1.0, 0.0)
            .unwrap();
        assert!(matches!(
            engine.add_wire_to_mixer(a, mixer, 0, 0, transform, 1.0, 0.0),
            Err(GraphError::InputOccupied { .. })
        ));
        engine
            .add_wire_to_mixer(a, mixer, 0, 1, transform, 1.0, 0.0)
            .unwrap();
    }

    #[test]
    fn test_start_stop_joins_render_thread() {
        let mut engine = engine();
        assert!(!engine.is_running());

        engine.start_audio();
        assert!(engine.is_running());

        // The render loop advances the frame counter on its first
        // iteration, before its first sleep.
        engine.stop_audio();
        assert!(!engine.is_running());
        assert!(engine.frames_rendered() > 0);

        // Stop twice is a no-op
        engine.stop_audio();
    }

    #[test]
    fn test_mutate_while_running() {
        let mut engine = engine();
        engine.start_audio();

        let osc = engine.create_block(&BlockDesc::SineOsc {
            freq: 440.0,
            amp: 1.0,
        });
        engine.set_value(osc, 0, &[880.0]).unwrap();
        assert_eq!(
            engine.get_value(osc, Direction::Input, 0, 1).unwrap(),
            vec![880.0]
        );

        engine.stop_audio();
    }

    #[test]
    fn test_remove_block_clears_output_routing() {
        let mut engine = engine();
        let mixer = engine.create_block(&BlockDesc::StereoMixer(MixerSize::M4));
        engine.set_output(mixer, 2).unwrap();
        assert_eq!(engine.output_ref(), Some((mixer, 2)));

        engine.remove_block(mixer).unwrap();
        assert_eq!(engine.output_ref(), None);
    }
}

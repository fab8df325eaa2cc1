//! Per-source voice sessions
//!
//! A [`Session`] owns everything needed to render one remote speaker. All
//! mutable state sits behind one lock; packets and asynchronous lifecycle
//! work go through a per-session queue drained by a tokio task, so the
//! network thread never waits on decoding.

pub mod compensation;
pub mod gain;
pub mod lifecycle;
pub mod manager;
pub mod observer;
pub mod pipeline;
pub mod sequence;

pub use compensation::LossCompensator;
pub use gain::{GainInputs, GainOutcome, OcclusionFilter, SpatialGainCalculator, SpatialUpdate};
pub use lifecycle::{EndOfStreamTimer, Lifecycle, LifecycleState};
pub use manager::SourceManager;
pub use observer::{SessionObserver, TracingObserver};
pub use pipeline::DecodePipeline;
pub use sequence::{SequenceDecision, SequenceTracker};

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::audio::{DeviceEvent, OutputDevice, SinkGroup, SinkParams};
use crate::codec::{AudioDecoder, BuiltinDecoders, DecoderFactory};
use crate::config::SharedConfig;
use crate::crypto::Cipher;
use crate::error::{PositionUnavailable, Result, SessionError};
use crate::line::{LineRegistry, SourceLine};
use crate::position::{
    provider_for, NoOcclusion, OcclusionProvider, PositionProvider, Vec3, World,
};
use crate::protocol::{DataPacket, EndPacket, SourceInfo};

/// Collaborators shared by every session of a connection
#[derive(Clone)]
pub struct SessionContext {
    pub config: SharedConfig,
    pub lines: Arc<dyn LineRegistry>,
    pub output: Arc<dyn OutputDevice>,
    pub decoders: Arc<dyn DecoderFactory>,
    pub world: Arc<dyn World>,
    pub occlusion: Arc<dyn OcclusionProvider>,
    pub observer: Arc<dyn SessionObserver>,
    /// Owned by the connection; dropped there when encryption is revoked
    pub cipher: Option<Weak<dyn Cipher>>,
    pub runtime: Handle,
}

impl SessionContext {
    pub fn new(
        config: SharedConfig,
        lines: Arc<dyn LineRegistry>,
        output: Arc<dyn OutputDevice>,
        world: Arc<dyn World>,
        runtime: Handle,
    ) -> Self {
        Self {
            decoders: Arc::new(BuiltinDecoders::new(config.clone())),
            config,
            lines,
            output,
            world,
            occlusion: Arc::new(NoOcclusion),
            observer: Arc::new(TracingObserver),
            cipher: None,
            runtime,
        }
    }

    pub fn with_decoders(mut self, decoders: Arc<dyn DecoderFactory>) -> Self {
        self.decoders = decoders;
        self
    }

    pub fn with_occlusion(mut self, occlusion: Arc<dyn OcclusionProvider>) -> Self {
        self.occlusion = occlusion;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cipher(mut self, cipher: &Arc<dyn Cipher>) -> Self {
        self.cipher = Some(Arc::downgrade(cipher));
        self
    }

    fn resolve_line(&self, id: Uuid) -> std::result::Result<SourceLine, SessionError> {
        self.lines.line(id).ok_or(SessionError::LineNotFound(id))
    }

    /// Stereo sinks are only used when stereo is not downmixed
    fn output_stereo(&self, info: &SourceInfo) -> bool {
        info.stereo && !self.config.stereo_to_mono()
    }

    fn create_sinks(&self, stereo: bool) -> Result<Box<dyn SinkGroup>> {
        let params = SinkParams::for_panning(self.config.panning());
        Ok(self.output.create_group(stereo, &params)?)
    }

    fn create_decoder(&self, info: &SourceInfo) -> Result<Option<Box<dyn AudioDecoder>>> {
        match &info.codec {
            Some(codec) => Ok(Some(self.decoders.create(codec, info.stereo)?)),
            None => Ok(None),
        }
    }
}

/// Work queued for the session worker
enum Command {
    Data(DataPacket),
    End(EndPacket),
    DelayedReset(u64),
    Reset,
    Close,
    Flush(oneshot::Sender<()>),
}

struct State {
    info: SourceInfo,
    line: SourceLine,
    positions: Box<dyn PositionProvider>,
    decoder: Option<Box<dyn AudioDecoder>>,
    cipher: Option<Weak<dyn Cipher>>,
    sinks: Box<dyn SinkGroup>,
    sequences: SequenceTracker,
    occlusion: OcclusionFilter,
    lifecycle: Lifecycle,
    end_timer: EndOfStreamTimer,
}

struct Inner {
    id: Uuid,
    ctx: SessionContext,
    /// Mirrors the lifecycle for lock-free fast paths
    closed: AtomicBool,
    /// Mute key of the current line
    line_key: RwLock<String>,
    state: Mutex<State>,
}

/// Receiving end of one remote speaker
pub struct Session {
    inner: Arc<Inner>,
    queue: mpsc::UnboundedSender<Command>,
}

impl Session {
    /// Create the session and start its worker on the context runtime
    ///
    /// Fails if the source line is unknown or the decoder or sinks cannot
    /// be created.
    pub fn new(ctx: SessionContext, info: SourceInfo) -> Result<Self> {
        let line = ctx.resolve_line(info.line_id)?;
        let decoder = ctx.create_decoder(&info)?;
        let stereo = ctx.output_stereo(&info);
        let sinks = ctx.create_sinks(stereo)?;

        let state = State {
            info: info.clone(),
            positions: provider_for(&info.kind, ctx.world.clone()),
            line: line.clone(),
            decoder,
            cipher: ctx.cipher.clone(),
            sinks,
            sequences: SequenceTracker::new(),
            occlusion: OcclusionFilter::new(),
            lifecycle: Lifecycle::new(),
            end_timer: EndOfStreamTimer::new(),
        };

        let inner = Arc::new(Inner {
            id: info.id,
            ctx,
            closed: AtomicBool::new(false),
            line_key: RwLock::new(line.name),
            state: Mutex::new(state),
        });

        let (queue, commands) = mpsc::unbounded_channel();
        inner
            .ctx
            .runtime
            .spawn(run_worker(inner.clone(), commands, queue.downgrade()));

        info!(
            "Source {} initialized in {}",
            info,
            if stereo { "stereo" } else { "mono" }
        );
        inner.ctx.observer.on_initialized(&info);

        Ok(Self { inner, queue })
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn source_info(&self) -> SourceInfo {
        self.inner.state.lock().info.clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.state.lock().lifecycle.state()
    }

    /// Last accepted sequence number on the current line
    pub fn last_sequence(&self) -> Option<u64> {
        let state = self.inner.state.lock();
        state.sequences.last(state.info.line_id)
    }

    /// Apply new source info from the server
    ///
    /// A stereo change swaps sinks and decoder in place. Nothing changes
    /// if the new line is unknown or a resource cannot be created.
    pub fn update(&self, info: SourceInfo) -> Result<()> {
        if self.is_closed() {
            return Err(SessionError::Closed.into());
        }
        let ctx = &self.inner.ctx;

        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        if state.lifecycle.is_closed() {
            return Err(SessionError::Closed.into());
        }

        let line = if info.line_id != state.info.line_id {
            Some(ctx.resolve_line(info.line_id)?)
        } else {
            None
        };

        let stereo = ctx.output_stereo(&info);
        let sinks = if stereo != ctx.output_stereo(&state.info) {
            Some(ctx.create_sinks(stereo)?)
        } else {
            None
        };

        let decoder = if info.stereo != state.info.stereo || info.codec != state.info.codec {
            Some(ctx.create_decoder(&info)?)
        } else {
            None
        };

        if let Some(sinks) = sinks {
            let mut old = std::mem::replace(&mut state.sinks, sinks);
            old.clear();
            info!(
                "Update device sources for {} in {}",
                info,
                if stereo { "stereo" } else { "mono" }
            );
        }

        if let Some(decoder) = decoder {
            if let Some(mut old) = std::mem::replace(&mut state.decoder, decoder) {
                old.close();
            }
            info!("Update decoder for {}", info);
        }

        if let Some(line) = line {
            *self.inner.line_key.write() = line.name.clone();
            state.line = line;
            info!("Update source line for {}", info);
        }

        if info.kind != state.info.kind {
            state.positions = provider_for(&info.kind, ctx.world.clone());
        }

        state.cipher = ctx.cipher.clone();
        state.info = info.clone();
        drop(guard);

        ctx.observer.on_initialized(&info);
        Ok(())
    }

    /// Queue a data packet
    ///
    /// Returns false if the session is closed or its line is muted.
    pub fn process_data(&self, packet: DataPacket) -> bool {
        if self.rejects_packets() {
            return false;
        }
        self.queue.send(Command::Data(packet)).is_ok()
    }

    /// Queue an end-of-stream packet
    pub fn process_end(&self, packet: EndPacket) -> bool {
        if self.rejects_packets() {
            return false;
        }
        self.queue.send(Command::End(packet)).is_ok()
    }

    fn rejects_packets(&self) -> bool {
        self.is_closed() || self.inner.ctx.config.is_muted(&self.inner.line_key.read())
    }

    /// Close now; later calls are no-ops
    pub fn close(&self) {
        self.inner.close();
    }

    /// Close from the session worker
    pub fn close_async(&self) {
        let _ = self.queue.send(Command::Close);
    }

    fn reset_async(&self) {
        let _ = self.queue.send(Command::Reset);
    }

    /// Whether audio arrived recently
    ///
    /// An active source silent for longer than the close timeout is assumed
    /// to have lost its end packet: a reset is queued and false returned.
    pub fn is_activated(&self) -> bool {
        let state = self.inner.state.lock();
        if !state.lifecycle.is_active() {
            return false;
        }
        if state
            .lifecycle
            .is_stale(Instant::now(), self.inner.ctx.config.close_timeout())
        {
            drop(state);
            warn!(
                "Voice end packet was not received. Resetting source {}",
                self.inner.id
            );
            self.reset_async();
            return false;
        }
        true
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Whether the listener was in range for the last packet
    pub fn can_hear(&self) -> bool {
        self.inner.state.lock().lifecycle.is_audible()
    }

    /// React to a host device event concerning one of this session's sinks
    pub fn on_device_event(&self, event: &DeviceEvent) {
        if self.is_closed() || !self.inner.state.lock().sinks.contains(event.sink()) {
            return;
        }
        match event {
            DeviceEvent::SinkDestroyed(sink) => {
                debug!("{} destroyed, closing source {}", sink, self.inner.id);
                self.close_async();
            }
            DeviceEvent::StreamStopped(sink) => {
                if self.inner.ctx.config.close_timeout().is_zero() {
                    return;
                }
                debug!("{} stopped, resetting source {}", sink, self.inner.id);
                self.reset_async();
            }
        }
    }

    /// Wait until everything queued before this call has been handled
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.queue.send(Command::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl Inner {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn handle_data(&self, packet: DataPacket) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.lifecycle.is_closed() {
            return;
        }

        if packet.source_state != state.info.state {
            let mismatch = SessionError::ProtocolMismatch {
                packet: packet.source_state,
                session: state.info.state,
            };
            debug!("Drop packet for source {}: {}", self.id, mismatch);
            return;
        }
        if packet.line_id != state.info.line_id {
            debug!(
                "Drop packet for source {} on line {} while on line {}",
                self.id, packet.line_id, state.info.line_id
            );
            return;
        }

        let line = state.info.line_id;
        let sequence = packet.sequence_number;
        let previous = match state.sequences.classify(line, sequence) {
            SequenceDecision::Accept { previous } => previous,
            SequenceDecision::DropReordered => {
                debug!(
                    "Drop packet {} with bad order for source {} (last {:?})",
                    sequence,
                    self.id,
                    state.sequences.last(line)
                );
                return;
            }
            SequenceDecision::ResetAndAccept => {
                debug!(
                    "Sequence for source {} restarted at {}",
                    self.id, sequence
                );
                state.sequences.forget(line);
                None
            }
        };

        state.end_timer.cancel();

        let (listener, emitter, look) = match sample_positions(state.positions.as_ref()) {
            Ok(sampled) => sampled,
            Err(e) => {
                warn!(
                    "Closing source {}: {}",
                    self.id,
                    SessionError::PositionUnavailable(e)
                );
                let closed = self.close_locked(state);
                let info = state.info.clone();
                drop(guard);
                if closed {
                    self.ctx.observer.on_closed(&info);
                }
                return;
            }
        };

        let config = &self.ctx.config;
        let inputs = GainInputs {
            listener,
            emitter,
            look,
            max_distance: packet.max_distance as f32,
            master_volume: config.master_volume(),
            source_volume: config.volume(&format!("source_{}", self.id)),
            line_volume: config.volume(&state.line.name),
            stereo: self.ctx.output_stereo(&state.info),
            panning: config.panning(),
            directional: config.directional_sources(),
            occlusion: config
                .sound_occlusion()
                .then(|| self.ctx.occlusion.occluded_fraction(listener, emitter)),
        };
        let outcome = SpatialGainCalculator.compute(&inputs, &mut state.occlusion);
        outcome.update.apply_to(state.sinks.as_mut());

        let stereo = state.info.stereo;
        let channels = if stereo { 2 } else { 1 };
        let compensator = LossCompensator::default();
        let missing = compensator.frames_to_insert(previous, sequence);
        if missing > 0 {
            trace!("Compensate {} packets for source {}", missing, self.id);
        }
        for _ in 0..missing {
            match compensator.synthesize(decoder_mut(&mut state.decoder), stereo, channels) {
                Ok(frame) => state.sinks.write(&frame),
                Err(e) => {
                    warn!("Failed to conceal lost audio for source {}: {}", self.id, e);
                    return;
                }
            }
        }

        let cipher = state.cipher.as_ref().and_then(Weak::upgrade);
        let decoded = DecodePipeline.run(
            cipher.as_deref(),
            decoder_mut(&mut state.decoder),
            &packet.payload,
            stereo,
            config.stereo_to_mono(),
        );
        match decoded {
            Ok(frame) => state.sinks.write(&frame),
            Err(e) => {
                warn!("Failed to process audio for source {}: {}", self.id, e);
                return;
            }
        }

        state.sequences.record(line, sequence);
        state.lifecycle.activate(Instant::now(), outcome.audible);
    }

    fn handle_end(&self, packet: EndPacket, queue: &mpsc::WeakUnboundedSender<Command>) {
        let mut state = self.state.lock();
        if !state.lifecycle.is_active() {
            return;
        }

        let line = state.info.line_id;
        state.sequences.record(line, packet.sequence_number);

        let grace = self.ctx.config.end_grace();
        let runtime = &self.ctx.runtime;
        state.end_timer.arm(|generation| {
            let queue = queue.clone();
            runtime.spawn(async move {
                tokio::time::sleep(grace).await;
                if let Some(queue) = queue.upgrade() {
                    let _ = queue.send(Command::DelayedReset(generation));
                }
            })
        });
        trace!(
            "Source {} ended at {}, reset in {:?}",
            self.id,
            packet.sequence_number,
            grace
        );
    }

    fn handle_delayed_reset(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.end_timer.fire(generation) {
            self.reset_locked(&mut state);
        }
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        self.reset_locked(&mut state);
    }

    fn reset_locked(&self, state: &mut State) -> bool {
        if !state.lifecycle.reset() {
            return false;
        }
        if let Some(decoder) = state.decoder.as_mut() {
            if let Err(e) = decoder.reset() {
                warn!("Failed to reset decoder for source {}: {}", self.id, e);
            }
        }
        debug!("Source {} reset", self.id);
        true
    }

    fn close(&self) {
        let mut state = self.state.lock();
        let closed = self.close_locked(&mut state);
        let info = state.info.clone();
        drop(state);
        if closed {
            self.ctx.observer.on_closed(&info);
        }
    }

    fn close_locked(&self, state: &mut State) -> bool {
        if !state.lifecycle.close() {
            return false;
        }
        self.closed.store(true, Ordering::SeqCst);
        state.end_timer.cancel();
        if let Some(mut decoder) = state.decoder.take() {
            decoder.close();
        }
        state.sinks.clear();
        info!("Source {} closed", state.info);
        true
    }
}

fn sample_positions(
    positions: &dyn PositionProvider,
) -> std::result::Result<(Vec3, Vec3, Vec3), PositionUnavailable> {
    Ok((
        positions.listener_position()?,
        positions.emitter_position()?,
        positions.emitter_look_direction()?,
    ))
}

fn decoder_mut(decoder: &mut Option<Box<dyn AudioDecoder>>) -> Option<&mut dyn AudioDecoder> {
    match decoder {
        Some(decoder) => Some(decoder.as_mut()),
        None => None,
    }
}

async fn run_worker(
    inner: Arc<Inner>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    queue: mpsc::WeakUnboundedSender<Command>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Data(packet) => inner.handle_data(packet),
            Command::End(packet) => inner.handle_end(packet, &queue),
            Command::DelayedReset(generation) => inner.handle_delayed_reset(generation),
            Command::Reset => inner.reset(),
            Command::Close => inner.close(),
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
        if inner.is_closed() {
            break;
        }
    }
    trace!("Worker for source {} stopped", inner.id);
}

//! The sequential ingestion loop: frames in, chunk payloads out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::config::RunConfig;
use super::sink::PayloadSink;
use crate::annotation::{Annotation, AnnotationProvider};
use crate::decoder::{Frame, FrameSource, SourceGuard, SourceInfo};
use crate::engine::{ChunkPayload, CollectorState, EngineConfig, ExtractionEngine};
use crate::error::{ChunkError, Result};
use crate::utils::logger;
use crate::utils::time_utils::Timer;

/// Cooperative stop request, checked once per frame.
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Snapshot handed to a progress observer.
pub struct Progress<'a> {
    pub source: &'a SourceInfo,
    pub frame: &'a Frame,
    pub annotation: &'a Annotation,
    pub state: CollectorState,
    pub chunks_forwarded: u32,
    pub number_chunks: u32,
}

/// Side channel for progress display. Must not block for long.
pub trait ProgressObserver {
    /// Called once, after the engine accepted its configuration and before
    /// the first frame is read.
    fn on_configured(
        &mut self,
        _source: &SourceInfo,
        _number_chunks: u32,
        _chunk_duration_s: f64,
    ) {
    }

    fn on_progress(&mut self, progress: &Progress<'_>);

    fn on_finish(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The engine reported `Completed` on a frame.
    Completed,
    /// The source ran dry first and the remainder was flushed.
    EndOfStream,
    /// Stopped through the cancellation token.
    Interrupted,
}

impl RunOutcome {
    pub fn is_success(self) -> bool {
        !matches!(self, RunOutcome::Interrupted)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub frames_submitted: u64,
    pub last_frame: Option<u64>,
    pub chunks_forwarded: u32,
    pub empty_chunks: u32,
    pub flushed: bool,
    pub number_chunks: u32,
}

pub struct ChunkOrchestrator<E: ExtractionEngine, K: PayloadSink> {
    engine: E,
    sink: K,
    config: RunConfig,
    observer: Option<Box<dyn ProgressObserver>>,
    cancel: CancellationToken,
}

impl<E: ExtractionEngine, K: PayloadSink> ChunkOrchestrator<E, K> {
    pub fn new(engine: E, sink: K, config: RunConfig) -> Self {
        Self {
            engine,
            sink,
            config,
            observer: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[cfg(test)]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Drive `source` to completion, interruption or the first fatal error.
    /// The source is released before this returns on every path.
    pub fn run<S: FrameSource, A: AnnotationProvider>(
        &mut self,
        source: S,
        annotations: &A,
    ) -> Result<RunReport> {
        let mut source = SourceGuard::new(source);
        let result = self.drive(&mut *source, annotations);
        if let Some(observer) = self.observer.as_mut() {
            observer.on_finish();
        }
        if let Err(e) = &result {
            logger::error(&format!("run failed: {}", e));
        }
        result
    }

    fn configure(&mut self, info: &SourceInfo) -> Result<u32> {
        if self.engine.state() == CollectorState::Error {
            return Err(ChunkError::CollectorCreationFailed(self.engine_error()));
        }

        let config = EngineConfig::for_duration(
            info.target_fps,
            self.config.chunk_duration_s,
            info.total_duration_s(),
        );
        logger::info(&format!(
            "{}: {} frames at {:.3} fps ({:.2}s) -> {} chunk(s) of {}s",
            info.name,
            info.total_frames,
            info.target_fps,
            info.total_duration_s(),
            config.number_chunks,
            config.chunk_duration_s
        ));

        if self.engine.configure(config) != CollectorState::Collecting {
            return Err(ChunkError::EngineInitializationFailed(self.engine_error()));
        }

        logger::info(&format!("    mode: {}", self.engine.mode()));
        logger::info(&format!("    number chunks: {}", self.engine.number_chunks()));
        logger::info(&format!("    chunk duration: {}s", self.engine.chunk_duration_s()));
        for constraint in self.engine.enabled_constraints() {
            logger::info(&format!("    enabled constraint: {}", constraint));
        }
        let (number_chunks, chunk_duration_s) =
            (self.engine.number_chunks(), self.engine.chunk_duration_s());
        if let Some(observer) = self.observer.as_mut() {
            observer.on_configured(info, number_chunks, chunk_duration_s);
        }
        Ok(config.number_chunks)
    }

    fn drive<S: FrameSource, A: AnnotationProvider>(
        &mut self,
        source: &mut S,
        annotations: &A,
    ) -> Result<RunReport> {
        let info = source.info().clone();
        let number_chunks = self.configure(&info)?;
        let timer = Timer::new();

        let mut report = RunReport {
            outcome: RunOutcome::EndOfStream,
            frames_submitted: 0,
            last_frame: None,
            chunks_forwarded: 0,
            empty_chunks: 0,
            flushed: false,
            number_chunks,
        };

        loop {
            let Some(mut frame) = source.next_frame()? else {
                logger::debug(&format!("end of stream after {} frames", report.frames_submitted));
                report.flushed = true;
                let chunk = self.engine.request_final_flush();
                if self.engine.state() == CollectorState::Error {
                    return Err(ChunkError::EngineRuntimeError {
                        frame: report.last_frame.unwrap_or(0),
                        message: self.engine_error(),
                    });
                }
                self.forward(chunk, &mut report)?;
                report.outcome = RunOutcome::EndOfStream;
                break;
            };

            let annotation = annotations.lookup(frame.index)?;
            for text in self.config.markers_for(frame.index) {
                frame.add_marker(text.clone());
            }

            let state = self.engine.submit(&frame, annotation);
            report.frames_submitted += 1;
            report.last_frame = Some(frame.index);

            match state {
                CollectorState::Collecting => {}
                CollectorState::ChunkReady => {
                    let chunk = self.engine.retrieve_pending_chunk();
                    self.forward(chunk, &mut report)?;
                }
                CollectorState::Completed => {
                    let chunk = self.engine.retrieve_pending_chunk();
                    self.forward(chunk, &mut report)?;
                    logger::info(&format!("COMPLETED at frame {}", frame.index));
                    report.outcome = RunOutcome::Completed;
                    break;
                }
                CollectorState::Error | CollectorState::Uninitialized => {
                    return Err(ChunkError::EngineRuntimeError {
                        frame: frame.index,
                        message: self.engine_error(),
                    });
                }
            }

            let interval = self.config.progress_interval;
            if let Some(observer) = self.observer.as_mut() {
                if interval > 0 && frame.index % interval == 0 {
                    observer.on_progress(&Progress {
                        source: &info,
                        frame: &frame,
                        annotation,
                        state,
                        chunks_forwarded: report.chunks_forwarded,
                        number_chunks,
                    });
                }
            }

            if self.cancel.is_cancelled() {
                logger::info(&format!("interrupted at frame {}", frame.index));
                report.outcome = RunOutcome::Interrupted;
                break;
            }
        }

        logger::info(&format!(
            "{:?}: {} frames, {} chunk(s), {} empty, {:.1} frames/s",
            report.outcome,
            report.frames_submitted,
            report.chunks_forwarded,
            report.empty_chunks,
            timer.rate(report.frames_submitted)
        ));
        Ok(report)
    }

    fn forward(&mut self, chunk: Option<ChunkPayload>, report: &mut RunReport) -> Result<()> {
        let Some(payload) = chunk else {
            report.empty_chunks += 1;
            logger::info("Got empty chunk");
            return Ok(());
        };

        let expected = report.chunks_forwarded;
        if payload.chunk_number != expected || payload.chunk_number >= report.number_chunks {
            return Err(ChunkError::ChunkSequenceViolation {
                expected,
                actual: payload.chunk_number,
                number_chunks: report.number_chunks,
            });
        }

        logger::info(&format!("Got {}", payload));
        self.sink.accept(&payload)?;
        report.chunks_forwarded += 1;
        Ok(())
    }

    fn engine_error(&self) -> String {
        self.engine
            .last_error()
            .map(str::to_string)
            .unwrap_or_else(|| format!("engine state {}", self.engine.state()))
    }
}

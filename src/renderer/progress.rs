use std::io::Write;

use crossterm::{
    cursor::MoveToColumn,
    queue,
    style::Print,
    terminal::{Clear, ClearType},
};

use crate::core::{Progress, ProgressObserver};
use crate::decoder::SourceInfo;

/// Rewrites a single status line on a terminal stream.
pub struct TerminalProgress<W: Write> {
    out: W,
    dirty: bool,
    status_line: bool,
}

impl TerminalProgress<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> TerminalProgress<W> {
    pub fn new(out: W) -> Self {
        Self { out, dirty: false, status_line: true }
    }

    /// Keep the configuration summary but skip per-frame status lines.
    pub fn without_status_line(mut self) -> Self {
        self.status_line = false;
        self
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

pub fn status_line(progress: &Progress<'_>) -> String {
    let face = if progress.annotation.detected { "face" } else { "no face" };
    format!(
        "Extracting from {} - frame {} of {} - chunk {}/{} - {} [{}]",
        progress.source.name,
        progress.frame.index,
        progress.source.total_frames,
        progress.chunks_forwarded,
        progress.number_chunks,
        face,
        progress.state
    )
}

impl<W: Write> ProgressObserver for TerminalProgress<W> {
    fn on_configured(&mut self, _source: &SourceInfo, number_chunks: u32, chunk_duration_s: f64) {
        let written = writeln!(self.out, "    number chunks: {}", number_chunks)
            .and_then(|_| writeln!(self.out, "    chunk duration: {}s", chunk_duration_s))
            .and_then(|_| self.out.flush());
        if let Err(e) = written {
            crate::utils::logger::debug(&format!("progress write failed: {}", e));
        }
    }

    fn on_progress(&mut self, progress: &Progress<'_>) {
        if !self.status_line {
            return;
        }
        let line = status_line(progress);
        let written = queue!(self.out, MoveToColumn(0), Clear(ClearType::CurrentLine), Print(line))
            .and_then(|_| self.out.flush());
        if let Err(e) = written {
            crate::utils::logger::debug(&format!("progress write failed: {}", e));
        }
        self.dirty = true;
    }

    fn on_finish(&mut self) {
        if self.dirty {
            let _ = writeln!(self.out);
            let _ = self.out.flush();
            self.dirty = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Annotation;
    use crate::decoder::{ChannelOrder, Frame, SourceInfo};
    use crate::engine::CollectorState;

    #[test]
    fn test_progress_line_written_and_terminated() {
        let info = SourceInfo { name: "clip.mp4".into(), target_fps: 30.0, total_frames: 300 };
        let frame = Frame::new(20, 30.0, Vec::new(), 0, 0, ChannelOrder::Bgr);
        let annotation = Annotation::sample(true);
        let progress = Progress {
            source: &info,
            frame: &frame,
            annotation: &annotation,
            state: CollectorState::Collecting,
            chunks_forwarded: 0,
            number_chunks: 2,
        };

        let mut observer = TerminalProgress::new(Vec::new());
        observer.on_progress(&progress);
        observer.on_finish();
        let text = String::from_utf8(observer.into_inner()).unwrap();

        assert!(text.contains("Extracting from clip.mp4 - frame 20 of 300"));
        assert!(text.contains("[COLLECTING]"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_configuration_printed_without_status_line() {
        let info = SourceInfo { name: "clip.mp4".into(), target_fps: 30.0, total_frames: 300 };
        let frame = Frame::new(20, 30.0, Vec::new(), 0, 0, ChannelOrder::Bgr);
        let annotation = Annotation::sample(false);

        let mut observer = TerminalProgress::new(Vec::new()).without_status_line();
        observer.on_configured(&info, 2, 5.0);
        observer.on_progress(&Progress {
            source: &info,
            frame: &frame,
            annotation: &annotation,
            state: CollectorState::Collecting,
            chunks_forwarded: 0,
            number_chunks: 2,
        });
        observer.on_finish();
        let text = String::from_utf8(observer.into_inner()).unwrap();

        assert_eq!(text, "    number chunks: 2\n    chunk duration: 5s\n");
    }
}

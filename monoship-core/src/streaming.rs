//! Output streaming for units of work.
//!
//! Units send lines tagged with their package over an unbounded channel.
//! The handler decides how lines reach the terminal; the prefix always
//! comes from the package a line was sent for, never from its content.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub package: String,
    pub line: String,
    pub stream: OutputStream,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Line(OutputLine),
    /// The unit of work for a package returned.
    Finished(String),
}

pub type OutputSender = mpsc::UnboundedSender<OutputEvent>;
pub type OutputReceiver = mpsc::UnboundedReceiver<OutputEvent>;

pub fn output_channel() -> (OutputSender, OutputReceiver) {
    mpsc::unbounded_channel()
}

/// How collected output is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Hold each package's lines until its unit finishes, then print them together.
    #[default]
    Buffered,
    /// Print lines as they arrive, prefixed with the package name.
    Prefixed,
    /// Print lines as they arrive, without a prefix.
    Raw,
}

/// A line ready to be printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine {
    /// `None` in raw mode.
    pub prefix: Option<String>,
    pub text: String,
    pub stream: OutputStream,
}

impl RenderedLine {
    fn from_line(line: OutputLine, prefixed: bool) -> Self {
        Self {
            prefix: prefixed.then_some(line.package),
            text: line.line,
            stream: line.stream,
        }
    }

    pub fn plain(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}: {}", prefix, self.text),
            None => self.text.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct OutputHandler {
    mode: OutputMode,
    buffers: BTreeMap<String, Vec<OutputLine>>,
}

impl OutputHandler {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            buffers: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Lines to print now in response to `event`.
    pub fn handle(&mut self, event: OutputEvent) -> Vec<RenderedLine> {
        match (self.mode, event) {
            (OutputMode::Buffered, OutputEvent::Line(line)) => {
                self.buffers.entry(line.package.clone()).or_default().push(line);
                Vec::new()
            }
            (OutputMode::Buffered, OutputEvent::Finished(package)) => self
                .buffers
                .remove(&package)
                .unwrap_or_default()
                .into_iter()
                .map(|line| RenderedLine::from_line(line, true))
                .collect(),
            (mode, OutputEvent::Line(line)) => {
                vec![RenderedLine::from_line(line, mode == OutputMode::Prefixed)]
            }
            (_, OutputEvent::Finished(_)) => Vec::new(),
        }
    }

    /// Anything still buffered, grouped by package.
    pub fn flush(&mut self) -> Vec<RenderedLine> {
        std::mem::take(&mut self.buffers)
            .into_values()
            .flatten()
            .map(|line| RenderedLine::from_line(line, true))
            .collect()
    }

    /// Consumes `receiver` until every sender is dropped, passing each
    /// rendered line to `write`.
    pub async fn drain<F>(mut self, mut receiver: OutputReceiver, mut write: F)
    where
        F: FnMut(&RenderedLine),
    {
        while let Some(event) = receiver.recv().await {
            for line in self.handle(event) {
                write(&line);
            }
        }
        for line in self.flush() {
            write(&line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(package: &str, text: &str) -> OutputEvent {
        OutputEvent::Line(OutputLine {
            package: package.to_string(),
            line: text.to_string(),
            stream: OutputStream::Stdout,
        })
    }

    #[test]
    fn buffered_output_is_released_per_package() {
        let mut handler = OutputHandler::new(OutputMode::Buffered);
        assert!(handler.handle(line("a", "one")).is_empty());
        assert!(handler.handle(line("b", "two")).is_empty());
        assert!(handler.handle(line("a", "three")).is_empty());

        let released: Vec<String> = handler
            .handle(OutputEvent::Finished("a".to_string()))
            .iter()
            .map(RenderedLine::plain)
            .collect();
        assert_eq!(released, vec!["a: one", "a: three"]);

        let rest: Vec<String> = handler.flush().iter().map(RenderedLine::plain).collect();
        assert_eq!(rest, vec!["b: two"]);
    }

    #[test]
    fn prefix_comes_from_the_package_not_the_line() {
        let mut handler = OutputHandler::new(OutputMode::Prefixed);
        let rendered = handler.handle(line("pkg-a", "pkg-b: looks like a prefix"));
        assert_eq!(rendered[0].prefix.as_deref(), Some("pkg-a"));
        assert_eq!(rendered[0].plain(), "pkg-a: pkg-b: looks like a prefix");
    }

    #[test]
    fn raw_output_has_no_prefix() {
        let mut handler = OutputHandler::new(OutputMode::Raw);
        let rendered = handler.handle(line("pkg-a", "hello"));
        assert_eq!(rendered[0].plain(), "hello");
    }
}

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Asks the operator for a file or folder. `None` means cancelled.
pub trait PathPrompt {
    fn choose_path(&mut self, prompt: &str, filter: &str) -> Option<PathBuf>;
}

/// Cancels every request. For non-interactive runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl PathPrompt for NoPrompt {
    fn choose_path(&mut self, prompt: &str, _filter: &str) -> Option<PathBuf> {
        tracing::debug!(prompt, "No interactive prompt available");
        None
    }
}

/// Answers requests from a prepared queue, then cancels.
#[derive(Debug, Default, Clone)]
pub struct FixedPrompt {
    answers: VecDeque<PathBuf>,
}

impl FixedPrompt {
    pub fn new(answers: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
        }
    }
}

impl PathPrompt for FixedPrompt {
    fn choose_path(&mut self, _prompt: &str, _filter: &str) -> Option<PathBuf> {
        self.answers.pop_front()
    }
}

/// Reads one path per request from a line-based reader. An empty line or
/// end of input cancels.
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> PathPrompt for LinePrompt<R, W> {
    fn choose_path(&mut self, prompt: &str, filter: &str) -> Option<PathBuf> {
        let shown = if filter.is_empty() {
            write!(self.output, "{prompt}: ")
        } else {
            write!(self.output, "{prompt} [{filter}]: ")
        };
        if shown.and_then(|_| self.output.flush()).is_err() {
            return None;
        }

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                let trimmed = line.trim();
                (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
            }
        }
    }
}

/// [`LinePrompt`] over the process stdin, locked only while a request
/// is being answered.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

impl PathPrompt for StdinPrompt {
    fn choose_path(&mut self, prompt: &str, filter: &str) -> Option<PathBuf> {
        LinePrompt::new(std::io::stdin().lock(), std::io::stdout()).choose_path(prompt, filter)
    }
}

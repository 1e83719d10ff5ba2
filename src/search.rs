use std::time::Duration;

use log::{debug, warn};
use regex::RegexBuilder;
use teloxide::utils::html;
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
    time::sleep,
};

pub const HIGHLIGHT_OPEN: &str = "<b>";
pub const HIGHLIGHT_CLOSE: &str = "</b>";

/// Settles bursts of search input into single values.
///
/// A value is emitted once no newer input has arrived for the quiet period,
/// and only if it differs from the previously emitted value. Dropping the
/// debouncer stops the pipeline; whatever `on_settled` already started keeps
/// running.
pub struct Debouncer {
    tx: UnboundedSender<Input>,
    task: JoinHandle<()>,
}

enum Input {
    Value(String),
    Reset,
}

impl Debouncer {
    pub fn spawn<F>(quiet: Duration, on_settled: F) -> Self
    where
        F: FnMut(String) + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_pipeline(rx, quiet, on_settled));
        Debouncer { tx, task }
    }

    pub fn push(&self, value: impl Into<String>) {
        self.send(Input::Value(value.into()));
    }

    /// Drops any unsettled value and forgets the last emitted one, so the
    /// next value is emitted even if it repeats an earlier search.
    pub fn reset(&self) {
        self.send(Input::Reset);
    }

    fn send(&self, input: Input) {
        if self.tx.send(input).is_err() {
            warn!("search pipeline is gone, input dropped");
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_pipeline<F>(mut rx: UnboundedReceiver<Input>, quiet: Duration, mut on_settled: F)
where
    F: FnMut(String),
{
    let mut last_emitted: Option<String> = None;
    let mut pending: Option<String> = None;

    loop {
        let Some(value) = pending.take() else {
            match rx.recv().await {
                Some(Input::Value(value)) => pending = Some(value),
                Some(Input::Reset) => last_emitted = None,
                None => break,
            }
            continue;
        };

        tokio::select! {
            newer = rx.recv() => match newer {
                Some(Input::Value(newer)) => pending = Some(newer),
                Some(Input::Reset) => last_emitted = None,
                None => break,
            },
            _ = sleep(quiet) => {
                if last_emitted.as_deref() == Some(value.as_str()) {
                    debug!("search input unchanged, skipping");
                } else {
                    last_emitted = Some(value.clone());
                    on_settled(value);
                }
            }
        }
    }
}

/// Escapes `text` for HTML and wraps every case-insensitive occurrence of
/// `term` in a highlight tag. The term is matched literally.
pub fn highlight_match(text: &str, term: &str) -> String {
    if term.trim().is_empty() {
        return html::escape(text);
    }

    let re = match RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
    {
        Ok(re) => re,
        Err(e) => {
            warn!("cannot highlight {term:?}: {e}");
            return html::escape(text);
        }
    };

    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;
    for m in re.find_iter(text) {
        out.push_str(&html::escape(&text[last..m.start()]));
        out.push_str(HIGHLIGHT_OPEN);
        out.push_str(&html::escape(m.as_str()));
        out.push_str(HIGHLIGHT_CLOSE);
        last = m.end();
    }
    out.push_str(&html::escape(&text[last..]));
    out
}

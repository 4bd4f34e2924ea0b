use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ScanError;
use crate::executor::Scanner;

/// Initialize tracing for tests with appropriate settings
#[inline]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Split a text block into owned lines.
pub fn lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}

/// One recorded scanner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Full,
    Narrow(Vec<u32>),
}

type Response = Result<Vec<String>, ScanError>;

#[derive(Default)]
struct State {
    full: VecDeque<Response>,
    narrow: VecDeque<Response>,
    calls: Vec<(Call, Instant)>,
}

/// Scripted scanner.
///
/// Queued responses are returned in order; once a queue runs dry a full scan
/// returns `full_default` and a narrow scan returns no output.
#[derive(Clone)]
pub struct FakeScanner {
    interface: String,
    full_default: Vec<String>,
    delay: Option<Duration>,
    state: Arc<Mutex<State>>,
}

impl FakeScanner {
    pub fn new(full_default: &str) -> Self {
        Self {
            interface: "wlan0".to_string(),
            full_default: lines(full_default),
            delay: None,
            state: Arc::default(),
        }
    }

    /// Make every scan take `delay` (cancellable).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_full(&self, response: Response) {
        self.state.lock().unwrap().full.push_back(response);
    }

    pub fn push_narrow(&self, response: Response) {
        self.state.lock().unwrap().narrow.push_back(response);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|(call, _)| call.clone())
            .collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|(_, at)| *at)
            .collect()
    }

    async fn wait(&self, cancel: &CancellationToken) -> Result<(), ScanError> {
        let Some(delay) = self.delay else {
            return Ok(());
        };
        tokio::select! {
            _ = cancel.cancelled() => Err(ScanError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

#[async_trait]
impl Scanner for FakeScanner {
    fn interface(&self) -> &str {
        &self.interface
    }

    async fn full_scan(&self, cancel: &CancellationToken) -> Result<Vec<String>, ScanError> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push((Call::Full, Instant::now()));
        self.wait(cancel).await?;
        let next = self.state.lock().unwrap().full.pop_front();
        next.unwrap_or_else(|| Ok(self.full_default.clone()))
    }

    async fn narrow_scan(
        &self,
        freqs: &BTreeSet<u32>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ScanError> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push((Call::Narrow(freqs.iter().copied().collect()), Instant::now()));
        self.wait(cancel).await?;
        let next = self.state.lock().unwrap().narrow.pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }
}

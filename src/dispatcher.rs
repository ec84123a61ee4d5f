use std::future::Future;
use std::sync::Arc;
use anyhow::Result;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinError;

use crate::config::ProbeConfig;
use crate::prober::{panic_message, ProbeOutcome, Prober};

/// A fault that escaped the probe task.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct DispatchFault {
    pub message: String,
}

impl From<JoinError> for DispatchFault {
    fn from(err: JoinError) -> Self {
        let message = if err.is_panic() {
            panic_message(err.into_panic().as_ref())
        } else {
            "probe task was cancelled".to_string()
        };
        Self { message }
    }
}

/// Runs probes on a shared runtime and hands results to callbacks.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    handle: Handle,
    prober: Arc<Prober>,
}

impl Dispatcher {
    pub fn new(handle: Handle, prober: Prober) -> Self {
        Self {
            handle,
            prober: Arc::new(prober),
        }
    }

    /// Dispatcher on the runtime the caller is running in.
    pub fn current(prober: Prober) -> Result<Self> {
        let handle = Handle::try_current()?;
        Ok(Self::new(handle, prober))
    }

    /// Schedule a probe of `host` and return immediately.
    ///
    /// Exactly one of `on_result` / `on_fault` is called, once.
    pub fn dispatch<R, F>(
        &self,
        host: impl Into<String>,
        config: Arc<ProbeConfig>,
        on_result: R,
        on_fault: F,
    ) where
        R: FnOnce(ProbeOutcome) + Send + 'static,
        F: FnOnce(DispatchFault) + Send + 'static,
    {
        let job = probe_job(self.prober.clone(), host.into(), config);
        self.spawn_isolated(job, on_result, on_fault);
    }

    /// Probe `host`, or `config.default_host` when `None`. The outcome
    /// arrives on the returned channel.
    pub fn probe_async(
        &self,
        host: Option<&str>,
        config: Arc<ProbeConfig>,
    ) -> oneshot::Receiver<Result<ProbeOutcome, DispatchFault>> {
        let host = host.unwrap_or(&config.default_host).to_string();
        self.spawn_to_channel(probe_job(self.prober.clone(), host, config))
    }

    /// [`spawn_isolated`](Self::spawn_isolated) with both callbacks feeding
    /// one oneshot channel.
    pub fn spawn_to_channel<T, J>(&self, job: J) -> oneshot::Receiver<Result<T, DispatchFault>>
    where
        T: Send + 'static,
        J: Future<Output = T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let fault_tx = Arc::new(std::sync::Mutex::new(Some(tx)));
        let result_tx = fault_tx.clone();

        self.spawn_isolated(
            job,
            move |value| send_once(&result_tx, Ok(value)),
            move |fault| send_once(&fault_tx, Err(fault)),
        );
        rx
    }

    /// Run `job` on the runtime, isolated in its own task.
    ///
    /// A panic or cancellation of `job` goes to `on_fault`; a completed
    /// value goes to `on_result`. Never both.
    pub fn spawn_isolated<T, J, R, F>(&self, job: J, on_result: R, on_fault: F)
    where
        T: Send + 'static,
        J: Future<Output = T> + Send + 'static,
        R: FnOnce(T) + Send + 'static,
        F: FnOnce(DispatchFault) + Send + 'static,
    {
        let inner = self.handle.spawn(job);
        self.handle.spawn(async move {
            match inner.await {
                Ok(value) => on_result(value),
                Err(e) => {
                    let fault = DispatchFault::from(e);
                    tracing::error!(error = %fault, "probe task faulted");
                    on_fault(fault);
                }
            }
        });
    }
}

fn probe_job(
    prober: Arc<Prober>,
    host: String,
    config: Arc<ProbeConfig>,
) -> impl Future<Output = ProbeOutcome> + Send + 'static {
    tracing::debug!(host = %host, port = config.port, "dispatching probe");
    async move { prober.probe(&host, &config).await }
}

type SharedSender<T> = Arc<std::sync::Mutex<Option<oneshot::Sender<T>>>>;

fn send_once<T>(slot: &SharedSender<T>, value: T) {
    let sender = match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };
    if let Some(tx) = sender {
        // Receiver dropped means the caller stopped waiting.
        let _ = tx.send(value);
    }
}

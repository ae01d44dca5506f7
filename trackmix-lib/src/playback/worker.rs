//! The mixing thread and its owned handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{error, info};

use crate::error::PreviewError;
use crate::settings::PreviewSettings;
use crate::sink::{OutputDevice, SinkConfig};

use super::controls::LiveControls;
use super::session::{MixSession, SessionEnd};

/// Clears the liveness flag when the mixing thread exits, panics included.
struct MixThreadGuard {
    alive: Arc<AtomicBool>,
}

impl MixThreadGuard {
    fn new(alive: Arc<AtomicBool>) -> Self {
        Self { alive }
    }
}

impl Drop for MixThreadGuard {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

/// Handle to a running mixing thread. Dropping it stops the thread.
#[derive(Debug)]
pub(crate) struct MixWorker {
    handle: Option<JoinHandle<()>>,
    alive: Arc<AtomicBool>,
    controls: Arc<LiveControls>,
    join_timeout: Duration,
}

impl MixWorker {
    /// Move `session` onto a new thread, open the sink there and start
    /// mixing. Returns once the sink is running, or with the open/start
    /// error after the thread has been torn down.
    pub(crate) fn spawn(
        session: MixSession,
        device: Arc<dyn OutputDevice>,
        config: SinkConfig,
        controls: Arc<LiveControls>,
        settings: &PreviewSettings,
    ) -> Result<Self, PreviewError> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let alive = Arc::new(AtomicBool::new(true));
        let write_timeout = settings.write_timeout();

        let handle = {
            let alive = alive.clone();
            let controls = controls.clone();
            thread::Builder::new()
                .name("trackmix-mixer".to_string())
                .spawn(move || {
                    let _guard = MixThreadGuard::new(alive);
                    run_mixer(session, device, config, &controls, write_timeout, ready_tx);
                })?
        };

        let mut worker = Self {
            handle: Some(handle),
            alive,
            controls,
            join_timeout: settings.join_timeout(),
        };

        let failure = match ready_rx.recv_timeout(settings.open_timeout()) {
            Ok(Ok(())) => return Ok(worker),
            Ok(Err(err)) => err,
            Err(mpsc::RecvTimeoutError::Timeout) => PreviewError::Device(format!(
                "output did not open within {:?}",
                settings.open_timeout()
            )),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                PreviewError::Device("mixing thread exited before the output opened".to_string())
            }
        };
        drop(ready_rx);
        worker.shutdown();
        Err(failure)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Flag that stays set until the thread has released its sink.
    pub(crate) fn liveness(&self) -> Arc<AtomicBool> {
        self.alive.clone()
    }

    /// Raise the stop flag and join the thread, waiting at most the join
    /// timeout. A thread that does not finish in time is detached and
    /// `false` is returned.
    pub(crate) fn shutdown(&mut self) -> bool {
        self.controls.request_stop();
        let Some(handle) = self.handle.take() else {
            return !self.is_running();
        };

        let deadline = Instant::now() + self.join_timeout;
        while self.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        if self.is_running() {
            error!(
                "mixing thread still running after {:?}, detached with its output open",
                self.join_timeout
            );
            return false;
        }
        if handle.join().is_err() {
            error!("mixing thread panicked");
        }
        true
    }
}

impl Drop for MixWorker {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

fn run_mixer(
    mut session: MixSession,
    device: Arc<dyn OutputDevice>,
    config: SinkConfig,
    controls: &LiveControls,
    write_timeout: Duration,
    ready: mpsc::Sender<Result<(), PreviewError>>,
) {
    let mut sink = match device.open(&config) {
        Ok(sink) => sink,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    let started = session
        .prepare_output(sink.channels())
        .and_then(|()| sink.start());
    if let Err(err) = started {
        sink.close();
        let _ = ready.send(Err(err));
        return;
    }
    if ready.send(Ok(())).is_err() {
        sink.stop();
        sink.close();
        return;
    }

    info!(
        "mixing {} track(s) at {} Hz into {} output channels",
        session.track_count(),
        session.sample_rate(),
        sink.channels()
    );

    let end = session.run(sink.as_mut(), controls, write_timeout);
    if end == SessionEnd::Drained {
        sink.drain(write_timeout);
    }
    sink.stop();
    sink.close();
    info!("mixing thread finished ({:?})", end);
}

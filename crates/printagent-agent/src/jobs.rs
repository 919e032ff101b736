// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Backend job processor.
//
// A timer polls the backend for queued jobs and prints them one at a time
// through the dispatcher.  Passes are single-flight: a tick that arrives
// while a pass is still running does nothing.  Every job ends in `completed`
// or `failed` on the backend; a failing job never stops the ones after it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use printagent_core::error::{AgentError, Result};
use printagent_core::types::{JobEvent, JobStatus, PrintJob, PrintOptions};
use printagent_print::PrintDispatcher;

use crate::api::BackendApi;

/// Capacity of the job event channel.
const EVENT_CAPACITY: usize = 64;

/// Message recorded on the backend when the operator cancels a job.
pub const CANCELLED_MESSAGE: &str = "Cancelled by agent";

/// What a single polling pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Another pass was already running.
    Skipped,
    /// The queue could not be fetched.
    FetchFailed,
    /// Jobs attempted in this pass.
    Processed(usize),
}

struct Inner {
    api: Arc<dyn BackendApi>,
    dispatcher: Arc<PrintDispatcher>,
    temp_dir: PathBuf,
    processing: AtomicBool,
    current: Mutex<Option<PrintJob>>,
    events: broadcast::Sender<JobEvent>,
}

/// Clears the in-flight flag and the current job slot when a pass ends.
struct PassGuard<'a>(&'a Inner);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.set_current(None);
        self.0.processing.store(false, Ordering::Release);
    }
}

/// The polling task and the signal that ends it between passes.
struct Timer {
    handle: JoinHandle<()>,
    stop: watch::Sender<bool>,
}

pub struct JobProcessor {
    inner: Arc<Inner>,
    interval: Duration,
    timer: Mutex<Option<Timer>>,
}

impl JobProcessor {
    pub fn new(api: Arc<dyn BackendApi>, dispatcher: Arc<PrintDispatcher>, temp_dir: PathBuf, interval: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                api,
                dispatcher,
                temp_dir,
                processing: AtomicBool::new(false),
                current: Mutex::new(None),
                events,
            }),
            interval,
            timer: Mutex::new(None),
        }
    }

    /// Job completion and failure notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    /// Start polling.  The first pass runs immediately.  Calling `start`
    /// while already running does nothing.
    pub fn start(&self) {
        let Ok(mut timer) = self.timer.lock() else {
            return;
        };
        if timer.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            debug!("job processor already running");
            return;
        }

        let inner = Arc::clone(&self.inner);
        let period = self.interval;
        let (stop, mut stopped) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = stopped.changed() => break,
                    _ = ticker.tick() => {}
                }
                inner.run_pass().await;
                if *stopped.borrow() {
                    break;
                }
            }
            debug!("job polling loop exited");
        });
        *timer = Some(Timer { handle, stop });
        info!(interval_secs = period.as_secs(), "job processor started");
    }

    /// Stop polling.  A pass in flight runs to completion, including status
    /// reporting and temp-file cleanup; no further pass starts.
    pub fn stop(&self) {
        if self.signal_stop().is_some() {
            info!("job processor stopped");
        }
    }

    /// Stop polling and wait for the pass in flight, if any, to finish.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.signal_stop() {
            if let Err(e) = handle.await {
                warn!(error = %e, "job polling task ended abnormally");
            }
            info!("job processor shut down");
        }
    }

    fn signal_stop(&self) -> Option<JoinHandle<()>> {
        let timer = self.timer.lock().ok()?.take()?;
        let _ = timer.stop.send(true);
        Some(timer.handle)
    }

    pub fn is_running(&self) -> bool {
        self.timer
            .lock()
            .map(|t| t.as_ref().is_some_and(|t| !t.handle.is_finished()))
            .unwrap_or(false)
    }

    /// Run one pass now, unless one is already in flight.
    pub async fn process_now(&self) -> PassOutcome {
        self.inner.run_pass().await
    }

    /// The job currently being printed.
    pub fn current_job(&self) -> Option<PrintJob> {
        self.inner.current.lock().ok().and_then(|c| c.clone())
    }

    /// Mark the current job failed on the backend and clear the slot.
    /// Returns `false` when no job is in progress.
    pub async fn cancel_current_job(&self) -> Result<bool> {
        let Some(job) = self.current_job() else {
            return Ok(false);
        };
        self.inner
            .api
            .update_job_status(job.id, JobStatus::Failed, Some(CANCELLED_MESSAGE))
            .await?;
        self.inner.set_current(None);
        warn!(job_id = %job.job_id, "job cancelled by operator");
        Ok(true)
    }
}

impl Drop for JobProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn set_current(&self, job: Option<PrintJob>) {
        if let Ok(mut current) = self.current.lock() {
            *current = job;
        }
    }

    async fn run_pass(&self) -> PassOutcome {
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("job pass already in progress");
            return PassOutcome::Skipped;
        }
        let _guard = PassGuard(self);

        let jobs = match self.api.fetch_jobs(JobStatus::Queued).await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "failed to fetch queued jobs");
                return PassOutcome::FetchFailed;
            }
        };
        if !jobs.is_empty() {
            info!(count = jobs.len(), "processing queued jobs");
        }

        let count = jobs.len();
        for job in jobs {
            self.set_current(Some(job.clone()));
            self.process_job(&job).await;
        }
        PassOutcome::Processed(count)
    }

    /// Temp file for a job inside the job directory.  The job id comes from
    /// the backend and must be a plain file stem.
    fn temp_path(&self, job: &PrintJob) -> Result<PathBuf> {
        if !is_safe_component(&job.job_id) {
            return Err(AgentError::JobContent(format!("Invalid job id: {:?}", job.job_id)));
        }
        let ext = Some(job.file_extension())
            .filter(|ext| is_safe_component(ext))
            .unwrap_or("pdf");
        Ok(self.temp_dir.join(format!("{}.{ext}", job.job_id)))
    }

    #[instrument(skip(self, job), fields(job_id = %job.job_id, printer = %job.printer.name))]
    async fn process_job(&self, job: &PrintJob) {
        let (result, temp) = match self.temp_path(job) {
            Ok(temp) => (self.execute(job, &temp).await, Some(temp)),
            Err(e) => (Err(e), None),
        };

        match result {
            Ok(()) => {
                if let Err(e) = self.api.update_job_status(job.id, JobStatus::Completed, None).await {
                    warn!(error = %e, "failed to report job completion");
                }
                let mut data = json!({ "job_id": job.job_id, "printer_id": job.printer.id });
                if let Some(ms) = duration_since(job.created_at.as_deref()) {
                    data["duration"] = json!(ms);
                }
                self.api.send_telemetry("job_completed", data).await;
                info!("job completed");
                let _ = self.events.send(JobEvent::JobCompleted {
                    job_id: job.job_id.clone(),
                });
            }
            Err(e) => {
                let message = e.to_string();
                error!(error = %message, "job failed");
                if let Err(e) = self
                    .api
                    .update_job_status(job.id, JobStatus::Failed, Some(&message))
                    .await
                {
                    warn!(error = %e, "failed to report job failure");
                }
                self.api
                    .send_telemetry(
                        "job_failed",
                        json!({ "job_id": job.job_id, "printer_id": job.printer.id, "error": message }),
                    )
                    .await;
                let _ = self.events.send(JobEvent::JobFailed {
                    job_id: job.job_id.clone(),
                    error: message,
                });
            }
        }

        if let Some(temp) = temp
            && let Err(e) = tokio::fs::remove_file(&temp).await
        {
            debug!(path = %temp.display(), error = %e, "temp file cleanup failed");
        }
    }

    async fn execute(&self, job: &PrintJob, temp: &Path) -> Result<()> {
        if let Err(e) = self.api.update_job_status(job.id, JobStatus::Printing, None).await {
            warn!(error = %e, "failed to report job start");
        }
        self.api
            .send_telemetry(
                "job_started",
                json!({ "job_id": job.job_id, "printer_id": job.printer.id }),
            )
            .await;

        self.materialize(job, temp).await?;

        let printers = self.dispatcher.printers().await;
        let printer = printers
            .iter()
            .find(|p| p.name == job.printer.name)
            .ok_or_else(|| AgentError::PrinterNotFound(job.printer.name.clone()))?;

        self.dispatcher
            .print_system(&printer.name, temp, &PrintOptions::from(job))
            .await
    }

    /// Put the job's content at `temp`: copy the local file when the job
    /// names one, else download it.
    async fn materialize(&self, job: &PrintJob, temp: &Path) -> Result<()> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;

        if let Some(source) = job.file_path.as_deref().filter(|p| !p.is_empty()) {
            tokio::fs::copy(source, temp).await?;
            debug!(source, "job file copied");
        } else if let Some(url) = job.file_url.as_deref().filter(|u| !u.is_empty()) {
            let bytes = self.api.download_file(url).await?;
            tokio::fs::write(temp, &bytes).await?;
            debug!(bytes = bytes.len(), "job file downloaded");
        } else {
            return Err(AgentError::JobContent("No file path or URL provided".into()));
        }
        Ok(())
    }
}

fn is_safe_component(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Milliseconds since `created_at`, when it parses as RFC 3339.
fn duration_since(created_at: Option<&str>) -> Option<i64> {
    let created = DateTime::parse_from_rfc3339(created_at?).ok()?;
    Some((Utc::now() - created.with_timezone(&Utc)).num_milliseconds())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use async_trait::async_trait;
    use serde_json::Value;
    use tokio::sync::Notify;

    use super::*;
    use printagent_core::types::{ConnectionType, JobPrinter, LocalPrinter, PrinterCapabilities, PrinterState};
    use printagent_print::{PrinterSource, Spooler, UsbTransport};

    #[derive(Default)]
    struct FakeBackend {
        jobs: Mutex<Vec<PrintJob>>,
        statuses: Mutex<Vec<(i64, JobStatus, Option<String>)>>,
        telemetry: Mutex<Vec<String>>,
        download: Option<Vec<u8>>,
        /// When set, `fetch_jobs` parks until `release` is notified.
        gate: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    impl FakeBackend {
        fn with_jobs(jobs: Vec<PrintJob>) -> Self {
            Self {
                jobs: Mutex::new(jobs),
                ..Self::default()
            }
        }

        fn statuses(&self) -> Vec<(i64, JobStatus, Option<String>)> {
            self.statuses.lock().expect("lock").clone()
        }

        fn telemetry(&self) -> Vec<String> {
            self.telemetry.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl BackendApi for FakeBackend {
        async fn fetch_jobs(&self, _status: JobStatus) -> Result<Vec<PrintJob>> {
            if let Some((entered, release)) = &self.gate {
                entered.notify_one();
                release.notified().await;
            }
            Ok(std::mem::take(&mut *self.jobs.lock().expect("lock")))
        }

        async fn update_job_status(&self, id: i64, status: JobStatus, message: Option<&str>) -> Result<()> {
            self.statuses
                .lock()
                .expect("lock")
                .push((id, status, message.map(str::to_string)));
            Ok(())
        }

        async fn send_telemetry(&self, event_type: &str, _event_data: Value) {
            self.telemetry.lock().expect("lock").push(event_type.to_string());
        }

        async fn download_file(&self, _url: &str) -> Result<Vec<u8>> {
            self.download
                .clone()
                .ok_or_else(|| AgentError::Backend("404 Not Found".into()))
        }
    }

    struct NoUsb;

    #[async_trait]
    impl UsbTransport for NoUsb {
        async fn send(&self, _vendor_id: u16, _product_id: u16, _data: &[u8]) -> Result<()> {
            Err(AgentError::Usb("USB printer not found".into()))
        }
    }

    #[derive(Default)]
    struct RecordingSpooler {
        printed: Mutex<Vec<(String, Vec<u8>, u32)>>,
        /// When set, `print_file` parks until `release` is notified.
        gate: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    #[async_trait]
    impl Spooler for RecordingSpooler {
        async fn print_file(&self, printer_name: &str, file: &Path, options: &PrintOptions) -> Result<()> {
            let content = tokio::fs::read(file).await?;
            if let Some((entered, release)) = &self.gate {
                entered.notify_one();
                release.notified().await;
            }
            self.printed
                .lock()
                .expect("lock")
                .push((printer_name.to_string(), content, options.copies()));
            Ok(())
        }
    }

    struct Installed(Vec<&'static str>);

    #[async_trait]
    impl PrinterSource for Installed {
        async fn system_printers(&self) -> Vec<LocalPrinter> {
            self.0
                .iter()
                .map(|name| LocalPrinter {
                    name: name.to_string(),
                    driver: String::new(),
                    is_default: false,
                    status: PrinterState::Ready,
                    connection_type: ConnectionType::Local,
                    capabilities: PrinterCapabilities {
                        duplex: false,
                        color: false,
                        paper_sizes: vec!["A4".into()],
                        max_resolution: "600x600".into(),
                    },
                })
                .collect()
        }
    }

    fn job(id: i64, printer: &str) -> PrintJob {
        PrintJob {
            id,
            job_id: format!("J-{id}"),
            status: JobStatus::Queued,
            file_url: Some(format!("http://backend/files/{id}")),
            file_path: None,
            filename: "doc.pdf".into(),
            pages: 1,
            copies: 2,
            color_mode: "bw".into(),
            paper_size: "A4".into(),
            duplex: false,
            priority: "normal".into(),
            created_at: Some("2026-01-01T10:00:00Z".into()),
            printer: JobPrinter {
                id: 5,
                name: printer.into(),
            },
        }
    }

    struct Harness {
        backend: Arc<FakeBackend>,
        spooler: Arc<RecordingSpooler>,
        processor: JobProcessor,
        _temp: tempfile::TempDir,
        temp_dir: PathBuf,
    }

    fn harness(backend: FakeBackend, installed: Vec<&'static str>) -> Harness {
        harness_with(backend, RecordingSpooler::default(), installed)
    }

    fn harness_with(backend: FakeBackend, spooler: RecordingSpooler, installed: Vec<&'static str>) -> Harness {
        let backend = Arc::new(backend);
        let spooler = Arc::new(spooler);
        let dispatcher = Arc::new(PrintDispatcher::new(
            Arc::new(NoUsb),
            spooler.clone(),
            Arc::new(Installed(installed)),
        ));
        let temp = tempfile::tempdir().expect("tempdir");
        let temp_dir = temp.path().join("print-jobs");
        let processor = JobProcessor::new(backend.clone(), dispatcher, temp_dir.clone(), Duration::from_secs(5));
        Harness {
            backend,
            spooler,
            processor,
            _temp: temp,
            temp_dir,
        }
    }

    #[tokio::test]
    async fn downloaded_job_is_printed_and_completed() {
        let backend = FakeBackend {
            download: Some(b"%PDF-1.4".to_vec()),
            ..FakeBackend::with_jobs(vec![job(1, "Office")])
        };
        let h = harness(backend, vec!["Office"]);
        let mut events = h.processor.subscribe();

        assert_eq!(h.processor.process_now().await, PassOutcome::Processed(1));

        let printed = h.spooler.printed.lock().expect("lock").clone();
        assert_eq!(printed, vec![("Office".to_string(), b"%PDF-1.4".to_vec(), 2)]);
        assert_eq!(
            h.backend.statuses(),
            vec![(1, JobStatus::Printing, None), (1, JobStatus::Completed, None)]
        );
        assert_eq!(h.backend.telemetry(), vec!["job_started", "job_completed"]);
        assert_eq!(
            events.try_recv().expect("event"),
            JobEvent::JobCompleted { job_id: "J-1".into() }
        );
        assert!(!h.temp_dir.join("J-1.pdf").exists());
        assert!(h.processor.current_job().is_none());
    }

    #[tokio::test]
    async fn unknown_printer_fails_job() {
        let backend = FakeBackend {
            download: Some(b"data".to_vec()),
            ..FakeBackend::with_jobs(vec![job(2, "Printer X")])
        };
        let h = harness(backend, vec!["Office"]);
        let mut events = h.processor.subscribe();

        h.processor.process_now().await;

        assert_eq!(
            h.backend.statuses().last().cloned(),
            Some((2, JobStatus::Failed, Some("Printer Printer X not found".into())))
        );
        assert_eq!(h.backend.telemetry(), vec!["job_started", "job_failed"]);
        assert!(matches!(events.try_recv().expect("event"), JobEvent::JobFailed { .. }));
        assert!(h.spooler.printed.lock().expect("lock").is_empty());
        assert!(!h.temp_dir.join("J-2.pdf").exists());
    }

    #[tokio::test]
    async fn missing_content_fails_and_later_jobs_still_run() {
        let mut empty = job(3, "Office");
        empty.file_url = None;
        let mut local = job(4, "Office");
        local.file_url = None;

        let source = tempfile::NamedTempFile::new().expect("temp");
        std::fs::write(source.path(), b"local bytes").expect("write");
        local.file_path = Some(source.path().to_string_lossy().into_owned());

        let h = harness(FakeBackend::with_jobs(vec![empty, local]), vec!["Office"]);
        assert_eq!(h.processor.process_now().await, PassOutcome::Processed(2));

        let statuses = h.backend.statuses();
        assert!(statuses.contains(&(3, JobStatus::Failed, Some("No file path or URL provided".into()))));
        assert!(statuses.contains(&(4, JobStatus::Completed, None)));
        let printed = h.spooler.printed.lock().expect("lock").clone();
        assert_eq!(printed.len(), 1);
        assert_eq!(printed[0].1, b"local bytes".to_vec());
        assert!(source.path().exists());
    }

    #[tokio::test]
    async fn overlapping_pass_is_skipped() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let backend = FakeBackend {
            gate: Some((entered.clone(), release.clone())),
            ..FakeBackend::default()
        };
        let h = harness(backend, vec![]);
        let processor = Arc::new(h.processor);

        let first = {
            let processor = Arc::clone(&processor);
            tokio::spawn(async move { processor.process_now().await })
        };
        entered.notified().await;

        assert_eq!(processor.process_now().await, PassOutcome::Skipped);

        release.notify_one();
        assert_eq!(first.await.expect("join"), PassOutcome::Processed(0));
        // The guard is released once the pass ends.
        let third = {
            let processor = Arc::clone(&processor);
            tokio::spawn(async move { processor.process_now().await })
        };
        entered.notified().await;
        release.notify_one();
        assert_eq!(third.await.expect("join"), PassOutcome::Processed(0));
    }

    #[tokio::test]
    async fn cancel_without_current_job_is_noop() {
        let h = harness(FakeBackend::default(), vec![]);
        assert!(!h.processor.cancel_current_job().await.expect("cancel"));
        assert!(h.backend.statuses().is_empty());
    }

    #[tokio::test]
    async fn cancel_marks_current_job_failed() {
        let h = harness(FakeBackend::default(), vec![]);
        h.processor.inner.set_current(Some(job(7, "Office")));

        assert!(h.processor.cancel_current_job().await.expect("cancel"));
        assert_eq!(
            h.backend.statuses(),
            vec![(7, JobStatus::Failed, Some(CANCELLED_MESSAGE.into()))]
        );
        assert!(h.processor.current_job().is_none());
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_halts() {
        let h = harness(FakeBackend::default(), vec![]);
        h.processor.start();
        h.processor.start();
        assert!(h.processor.is_running());
        h.processor.stop();
        assert!(!h.processor.is_running());
        h.processor.stop();

        h.processor.start();
        assert!(h.processor.is_running());
        h.processor.shutdown().await;
        assert!(!h.processor.is_running());
    }

    #[tokio::test]
    async fn stop_lets_the_job_in_flight_finish() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let backend = FakeBackend {
            download: Some(b"%PDF-1.4".to_vec()),
            ..FakeBackend::with_jobs(vec![job(1, "Office")])
        };
        let spooler = RecordingSpooler {
            gate: Some((entered.clone(), release.clone())),
            ..RecordingSpooler::default()
        };
        let h = harness_with(backend, spooler, vec!["Office"]);
        let mut events = h.processor.subscribe();

        h.processor.start();
        entered.notified().await;
        h.processor.stop();
        assert!(!h.processor.is_running());
        release.notify_one();

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("job finished after stop")
            .expect("event");
        assert_eq!(event, JobEvent::JobCompleted { job_id: "J-1".into() });
        assert_eq!(
            h.backend.statuses(),
            vec![(1, JobStatus::Printing, None), (1, JobStatus::Completed, None)]
        );

        // Cleanup runs right after the event is sent.
        let temp = h.temp_dir.join("J-1.pdf");
        tokio::time::timeout(Duration::from_secs(5), async {
            while temp.exists() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("temp file removed");
    }

    #[tokio::test]
    async fn shutdown_waits_for_the_job_in_flight() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let backend = FakeBackend {
            download: Some(b"data".to_vec()),
            ..FakeBackend::with_jobs(vec![job(6, "Office")])
        };
        let spooler = RecordingSpooler {
            gate: Some((entered.clone(), release.clone())),
            ..RecordingSpooler::default()
        };
        let h = harness_with(backend, spooler, vec!["Office"]);

        h.processor.start();
        entered.notified().await;
        release.notify_one();
        tokio::time::timeout(Duration::from_secs(5), h.processor.shutdown())
            .await
            .expect("shutdown");

        assert_eq!(h.backend.statuses().last().cloned(), Some((6, JobStatus::Completed, None)));
        assert!(!h.temp_dir.join("J-6.pdf").exists());
    }

    #[tokio::test]
    async fn job_id_with_path_components_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let victim = temp.path().join("victim.pdf");
        std::fs::write(&victim, b"keep me").expect("write");

        let mut escaping = job(8, "Office");
        escaping.job_id = "../victim".into();
        let backend = FakeBackend {
            download: Some(b"overwritten".to_vec()),
            ..FakeBackend::with_jobs(vec![escaping])
        };
        let backend = Arc::new(backend);
        let spooler = Arc::new(RecordingSpooler::default());
        let dispatcher = Arc::new(PrintDispatcher::new(
            Arc::new(NoUsb),
            spooler.clone(),
            Arc::new(Installed(vec!["Office"])),
        ));
        let processor = JobProcessor::new(
            backend.clone(),
            dispatcher,
            temp.path().join("print-jobs"),
            Duration::from_secs(5),
        );

        assert_eq!(processor.process_now().await, PassOutcome::Processed(1));

        assert_eq!(std::fs::read(&victim).expect("victim intact"), b"keep me".to_vec());
        let (id, status, message) = backend.statuses().last().cloned().expect("status");
        assert_eq!((id, status), (8, JobStatus::Failed));
        assert!(message.expect("message").contains("Invalid job id"));
        assert!(spooler.printed.lock().expect("lock").is_empty());
    }

    #[test]
    fn safe_components() {
        assert!(is_safe_component("J-12_a"));
        assert!(!is_safe_component(""));
        assert!(!is_safe_component(".."));
        assert!(!is_safe_component("a/b"));
        assert!(!is_safe_component("a\\b"));
    }

    #[test]
    fn duration_needs_rfc3339() {
        assert!(duration_since(Some("2026-01-01T10:00:00Z")).is_some());
        assert!(duration_since(Some("yesterday")).is_none());
        assert!(duration_since(None).is_none());
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: initialises storage, discovery, transports, the
// backend client and the job processor, and exposes one method per
// operation the front end offers.
//
// Every user-facing operation returns data or an `OperationResult`; errors
// are turned into a message plus suggestion here and never reach the caller
// as an error value.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use printagent_agent::api::BackendPrinter;
use printagent_agent::store::new_devices;
use printagent_agent::{HttpBackend, JobProcessor, KvStore, MemoryStore, PrinterRegistry, SqliteStore};
use printagent_core::error::{AgentError, Result};
use printagent_core::human_errors::{Severity, humanize_error};
use printagent_core::types::{
    ConnectionCheck, DiscoveredUsbDevice, LocalPrinter, OperationResult, PrintOptions, PrinterRecord,
    PrinterState, USB_PREFIX,
};
use printagent_core::AgentConfig;
use printagent_print::{NusbTransport, Platform, PrintDispatcher, ShellRunner, SystemPrinters, SystemSpooler, raw_client, usb};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::data_dir;

/// Shared application services.  Cheap to clone.
#[derive(Clone)]
pub struct AppServices {
    config: AgentConfig,
    data_dir: PathBuf,
    registry: PrinterRegistry,
    system: Arc<SystemPrinters>,
    dispatcher: Arc<PrintDispatcher>,
    backend: Arc<HttpBackend>,
    jobs: Arc<JobProcessor>,
}

/// Convert a failed operation into the message shown to the operator.
fn failure(err: &AgentError) -> OperationResult {
    let human = humanize_error(err);
    match human.severity {
        Severity::Transient => warn!(error = %err, "operation failed; retrying may help"),
        Severity::ActionRequired => error!(error = %err, suggestion = %human.suggestion, "operation failed"),
        Severity::Permanent => error!(error = %err, "operation failed"),
    }
    OperationResult::failed(human.to_line())
}

fn outcome(result: Result<()>, success: impl Into<String>) -> OperationResult {
    match result {
        Ok(()) => OperationResult::ok(success),
        Err(e) => failure(&e),
    }
}

impl AppServices {
    /// Initialise all services from the default data directory.
    pub fn init() -> Result<Self> {
        let dir = data_dir::data_dir();
        info!(path = %dir.display(), "initialising app services");

        let config = match load_config(&dir) {
            Some(config) => config,
            None => {
                let config = AgentConfig::default();
                if let Err(e) = persist_config(&dir, &config) {
                    warn!(error = %e, "could not write default config");
                }
                config
            }
        }
        .with_env_overrides();

        let store = SqliteStore::open(dir.join("printagent.db"))?;
        Self::build(config, dir, Arc::new(store))
    }

    /// Services backed by an in-memory store, for when the database cannot
    /// be opened.
    pub fn fallback() -> Result<Self> {
        let dir = data_dir::data_dir();
        let config = load_config(&dir).unwrap_or_default().with_env_overrides();
        Self::build(config, dir, Arc::new(MemoryStore::default()))
    }

    fn build(config: AgentConfig, data_dir: PathBuf, store: Arc<dyn KvStore>) -> Result<Self> {
        let platform = Platform::current();
        let runner = Arc::new(ShellRunner::new(config.command_timeout()));
        let system = Arc::new(SystemPrinters::new(runner.clone(), platform, config.system_cache_ttl()));
        let spooler = Arc::new(SystemSpooler::new(runner, platform));
        let transport = Arc::new(NusbTransport::new(config.usb_transfer_timeout()));
        let dispatcher = Arc::new(PrintDispatcher::new(transport, spooler, system.clone()));

        let backend = Arc::new(HttpBackend::new(config.api_url.clone(), store.clone())?);
        let jobs = Arc::new(JobProcessor::new(
            backend.clone(),
            dispatcher.clone(),
            config.job_temp_dir(),
            config.poll_interval(),
        ));

        info!(platform = platform.name(), api_url = %config.api_url, "app services initialised");
        Ok(Self {
            config,
            data_dir,
            registry: PrinterRegistry::new(store),
            system,
            dispatcher,
            backend,
            jobs,
        })
    }

    // -- Network RAW ---------------------------------------------------------

    pub async fn check_connection(&self, host: &str, port: u16) -> ConnectionCheck {
        raw_client::check_connection(host, port, self.config.probe_timeout()).await
    }

    pub async fn send_to_printer(&self, file: &Path, host: &str, port: u16) -> OperationResult {
        match raw_client::send_file(file, host, port, self.config.send_timeout()).await {
            Ok(result) => result,
            Err(e) => failure(&e),
        }
    }

    /// Native file picker.  `None` when the user cancels.
    pub fn select_file(&self) -> Option<PathBuf> {
        rfd::FileDialog::new()
            .add_filter("Documents", &["pdf", "doc", "docx", "xls", "xlsx", "txt"])
            .add_filter("Images", &["png", "jpg", "jpeg"])
            .add_filter("All files", &["*"])
            .pick_file()
    }

    // -- Saved printers ------------------------------------------------------

    pub fn printers(&self) -> Result<Vec<PrinterRecord>> {
        self.registry.list()
    }

    pub fn save_printer(&self, printer: PrinterRecord) -> OperationResult {
        let name = printer.name.clone();
        outcome(self.registry.save(printer), format!("Printer {name} saved"))
    }

    /// Save a network RAW printer under a fresh id.
    pub fn add_network_printer(&self, name: &str, ip: &str, port: u16, is_default: bool) -> Result<PrinterRecord> {
        let mut record = PrinterRecord::network(format!("network_{}", Uuid::new_v4()), name, ip, port);
        record.is_default = is_default;
        self.registry.save(record.clone())?;
        Ok(record)
    }

    /// Save a discovered USB device.
    pub fn add_usb_printer(&self, device_id: &str, is_default: bool) -> Result<PrinterRecord> {
        let device = self
            .usb_printers()
            .into_iter()
            .find(|d| d.id == device_id)
            .ok_or_else(|| AgentError::Usb(format!("USB printer {device_id} is not connected")))?;
        let mut record = PrinterRecord::from(&device);
        record.is_default = is_default;
        self.registry.save(record.clone())?;
        Ok(record)
    }

    pub fn delete_printer(&self, id: &str) -> OperationResult {
        match self.registry.delete(id) {
            Ok(true) => OperationResult::ok(format!("Printer {id} deleted")),
            Ok(false) => failure(&AgentError::PrinterNotFound(id.to_string())),
            Err(e) => failure(&e),
        }
    }

    pub fn set_default_printer(&self, id: &str) -> OperationResult {
        outcome(self.registry.set_default(id), format!("Printer {id} is now the default"))
    }

    // -- USB -----------------------------------------------------------------

    pub fn usb_printers(&self) -> Vec<DiscoveredUsbDevice> {
        usb::list_usb_printers()
    }

    /// Connected USB printers that have not been saved yet.
    pub fn new_usb_printers(&self) -> Result<Vec<DiscoveredUsbDevice>> {
        let discovered = self.usb_printers();
        let saved = self.registry.list()?;
        Ok(new_devices(&discovered, &saved).into_iter().cloned().collect())
    }

    pub async fn print_to_usb(&self, device_id: &str, file: &Path, options: &PrintOptions) -> OperationResult {
        let printer_id = format!("{USB_PREFIX}{device_id}");
        let result = self.dispatcher.print_universal(&printer_id, file, options).await;
        if result.is_ok()
            && let Err(e) = self.registry.touch(device_id)
        {
            warn!(error = %e, "could not record last use");
        }
        outcome(result, "Файл успешно отправлен на принтер")
    }

    // -- System printers -----------------------------------------------------

    pub async fn system_printers(&self) -> Vec<LocalPrinter> {
        self.system.list().await
    }

    /// Re-query the OS instead of using the cached listing.
    pub async fn refresh_system_printers(&self) -> Vec<LocalPrinter> {
        self.system.invalidate();
        self.system.list().await
    }

    pub async fn printer_status(&self, name: &str) -> Result<PrinterState> {
        self.system.printer_status(name).await
    }

    pub async fn cancel_spooler_job(&self, job_id: &str) -> OperationResult {
        outcome(self.system.cancel_job(job_id).await, format!("Job {job_id} cancelled"))
    }

    /// Print by printer id.  A saved printer id is resolved through its
    /// record: network printers get the file over RAW, USB and system ones go
    /// to the dispatcher.  Any other id (`usb_...`, `system_...` or a bare
    /// system printer name) goes to the dispatcher unchanged.
    pub async fn print(&self, printer_id: &str, file: &Path, options: &PrintOptions) -> OperationResult {
        let saved = match self.registry.get(printer_id) {
            Ok(saved) => saved,
            Err(e) => return failure(&e),
        };
        let Some(record) = saved else {
            return outcome(
                self.dispatcher.print_universal(printer_id, file, options).await,
                "Файл успешно отправлен на принтер",
            );
        };

        let result = match (record.dispatch_id(), record.ip_address.as_deref(), record.port) {
            (Some(target), _, _) => self
                .dispatcher
                .print_universal(&target, file, options)
                .await
                .map(|()| OperationResult::ok("Файл успешно отправлен на принтер")),
            (None, Some(ip), Some(port)) => self.send_copies(file, ip, port, options.copies()).await,
            (None, _, _) => Err(AgentError::InvalidPrinterId(record.id.clone())),
        };
        match result {
            Ok(done) => {
                if let Err(e) = self.registry.touch(&record.id) {
                    warn!(error = %e, "could not record last use");
                }
                done
            }
            Err(e) => failure(&e),
        }
    }

    /// RAW has no copy count, so the file is streamed once per copy.
    async fn send_copies(&self, file: &Path, ip: &str, port: u16, copies: u32) -> Result<OperationResult> {
        let mut last = OperationResult::ok("Файл успешно отправлен на принтер");
        for _ in 0..copies {
            last = raw_client::send_file(file, ip, port, self.config.send_timeout()).await?;
        }
        Ok(last)
    }

    // -- Backend -------------------------------------------------------------

    /// Create or update a saved printer in the backend catalogue and push its
    /// online state.
    pub async fn sync_printer(&self, id: &str) -> OperationResult {
        outcome(self.sync_printer_inner(id).await, format!("Printer {id} synced"))
    }

    async fn sync_printer_inner(&self, id: &str) -> Result<()> {
        let mut record = self
            .registry
            .get(id)?
            .ok_or_else(|| AgentError::PrinterNotFound(id.to_string()))?;
        let payload = BackendPrinter::from(&record);

        let backend_id = match record.backend_id {
            Some(backend_id) => {
                self.backend.update_printer(backend_id, &payload).await?;
                backend_id
            }
            None => {
                let backend_id = self.backend.create_printer(&payload).await?;
                record.backend_id = Some(backend_id);
                self.registry.save(record.clone())?;
                backend_id
            }
        };

        self.backend
            .update_printer_status(backend_id, &payload.status, 0, record.is_connected)
            .await
    }

    /// Remove a saved printer from the backend catalogue.
    pub async fn unsync_printer(&self, id: &str) -> OperationResult {
        let result: Result<()> = async {
            let mut record = self
                .registry
                .get(id)?
                .ok_or_else(|| AgentError::PrinterNotFound(id.to_string()))?;
            if let Some(backend_id) = record.backend_id.take() {
                self.backend.delete_printer(backend_id).await?;
                self.registry.save(record)?;
            }
            Ok(())
        }
        .await;
        outcome(result, format!("Printer {id} removed from the backend"))
    }

    pub async fn login(&self, email: &str, password: &str) -> OperationResult {
        match self.backend.login(email, password).await {
            Ok(_) => OperationResult::ok("Logged in"),
            Err(e) => failure(&e),
        }
    }

    pub fn logout(&self) -> OperationResult {
        self.backend.logout();
        OperationResult::ok("Logged out")
    }

    pub async fn check_auth(&self) -> bool {
        self.backend.check_auth().await
    }

    pub fn jobs(&self) -> &JobProcessor {
        &self.jobs
    }

    // -- Config --------------------------------------------------------------

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

// -- Config file persistence -------------------------------------------------

const CONFIG_FILE: &str = "config.json";

fn load_config(data_dir: &Path) -> Option<AgentConfig> {
    let path = data_dir.join(CONFIG_FILE);
    let data = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&data) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable config");
            None
        }
    }
}

fn persist_config(data_dir: &Path, config: &AgentConfig) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn services(dir: &Path) -> AppServices {
        AppServices::build(
            AgentConfig::default(),
            dir.to_path_buf(),
            Arc::new(MemoryStore::default()),
        )
        .expect("services")
    }

    #[test]
    fn config_round_trips_through_data_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_config(dir.path()).is_none());

        let config = AgentConfig {
            poll_interval_secs: 9,
            ..AgentConfig::default()
        };
        persist_config(dir.path(), &config).expect("persist");
        assert_eq!(load_config(dir.path()), Some(config));
    }

    #[test]
    fn broken_config_is_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(CONFIG_FILE), "{ nope").expect("write");
        assert!(load_config(dir.path()).is_none());
    }

    #[tokio::test]
    async fn network_printer_gets_unique_id_and_single_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = services(dir.path());

        let a = svc.add_network_printer("Office", "10.0.0.5", 9100, true).expect("add");
        let b = svc.add_network_printer("Hall", "10.0.0.6", 9100, true).expect("add");
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("network_"));

        let printers = svc.printers().expect("list");
        assert_eq!(printers.iter().filter(|p| p.is_default).count(), 1);

        assert!(svc.delete_printer(&a.id).success);
        assert!(!svc.delete_printer(&a.id).success);
    }

    #[tokio::test]
    async fn send_failure_keeps_transport_message() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = services(dir.path());
        let result = svc
            .send_to_printer(Path::new("/no/such/file.pdf"), "127.0.0.1", 9100)
            .await;
        assert!(!result.success);
        assert!(result.message.starts_with("Файл не найден: "));
    }

    #[tokio::test]
    async fn saved_network_printer_is_printed_over_raw() {
        use tokio::io::AsyncReadExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let svc = services(dir.path());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let receiver = tokio::spawn(async move {
            let mut received = Vec::new();
            for _ in 0..2 {
                let (mut socket, _) = listener.accept().await.expect("accept");
                socket.read_to_end(&mut received).await.expect("read");
            }
            received
        });

        let record = svc
            .add_network_printer("Hall", "127.0.0.1", port, false)
            .expect("add");
        let file = dir.path().join("page.prn");
        std::fs::write(&file, b"PAGE").expect("write");
        let options = PrintOptions {
            copies: 2,
            ..PrintOptions::default()
        };

        let result = svc.print(&record.id, &file, &options).await;
        assert!(result.success, "{}", result.message);
        assert_eq!(receiver.await.expect("join"), b"PAGEPAGE".to_vec());
        let saved = svc.printers().expect("list");
        assert!(saved[0].last_used.is_some());
    }

    #[tokio::test]
    async fn sync_of_unknown_printer_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = services(dir.path());
        let result = svc.sync_printer("missing").await;
        assert!(!result.success);
        assert!(result.message.contains("Printer missing not found"));
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printagent: print agent for USB, network RAW and system printers.
//
// Entry point.  Initialises logging and the service layer, then runs one
// subcommand.  Logs go to stderr so command output on stdout stays
// machine-readable.

mod services;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use printagent_core::human_errors::humanize_error;
use printagent_core::types::{OperationResult, PrintOptions, RAW_PORT};

use services::app_services::AppServices;

#[derive(Parser)]
#[command(name = "printagent")]
#[command(about = "Print agent for USB, network RAW and system printers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that a network printer accepts connections
    Check {
        host: String,
        #[arg(short, long, default_value_t = RAW_PORT)]
        port: u16,
    },

    /// Send a file to a network printer over RAW TCP
    Send {
        file: PathBuf,
        host: String,
        #[arg(short, long, default_value_t = RAW_PORT)]
        port: u16,
    },

    /// Pick a file with the native dialog and print its path
    SelectFile,

    /// Saved printers
    #[command(subcommand)]
    Printers(PrintersCommand),

    /// Directly attached USB printers
    #[command(subcommand)]
    Usb(UsbCommand),

    /// Printers registered with the operating system
    #[command(subcommand)]
    System(SystemCommand),

    /// Print a file by saved printer id, `usb_<vvvv>:<pppp>`, `system_<name>`
    /// or a system printer name
    Print {
        printer_id: String,
        file: PathBuf,
        #[command(flatten)]
        options: PrintArgs,
    },

    /// Create or update a saved printer in the backend catalogue
    Sync {
        id: String,
        /// Remove the printer from the backend instead
        #[arg(long)]
        remove: bool,
    },

    /// Log in to the backend with the agent account
    Login {
        #[arg(long, env = "PRINTAGENT_EMAIL")]
        email: String,
        #[arg(long, env = "PRINTAGENT_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the backend session and stored credentials
    Logout,

    /// Check (and restore) the backend session
    Auth,

    /// Process backend jobs until interrupted
    Run,

    /// Show the effective configuration and data directory
    Config,
}

#[derive(Subcommand)]
enum PrintersCommand {
    /// List saved printers
    List,
    /// Save a network printer (`--ip`) or a connected USB printer (`--usb`)
    Save {
        #[arg(long, required_unless_present = "usb")]
        name: Option<String>,
        #[arg(long, conflicts_with = "usb", requires = "name")]
        ip: Option<String>,
        #[arg(long, default_value_t = RAW_PORT)]
        port: u16,
        /// USB device id `vvvv:pppp`
        #[arg(long)]
        usb: Option<String>,
        #[arg(long)]
        default: bool,
    },
    /// Delete a saved printer
    Delete { id: String },
    /// Make a saved printer the default
    Default { id: String },
}

#[derive(Subcommand)]
enum UsbCommand {
    /// List connected USB printers
    List {
        /// Only devices that are not saved yet
        #[arg(long)]
        new: bool,
    },
    /// Print a file on a USB printer
    Print {
        /// Device id `vvvv:pppp`
        device_id: String,
        file: PathBuf,
        #[command(flatten)]
        options: PrintArgs,
    },
}

#[derive(Subcommand)]
enum SystemCommand {
    /// List OS printers
    List {
        /// Bypass the cached listing
        #[arg(long)]
        refresh: bool,
    },
    /// Readiness of one OS printer
    Status { name: String },
    /// Cancel a spooler job by its OS job id
    Cancel { job_id: String },
}

#[derive(Args)]
struct PrintArgs {
    #[arg(short = 'n', long, default_value_t = 1)]
    copies: u32,
    /// Print in grayscale
    #[arg(long)]
    mono: bool,
    #[arg(long)]
    duplex: bool,
    #[arg(long)]
    paper: Option<String>,
    #[arg(long)]
    priority: bool,
}

impl From<PrintArgs> for PrintOptions {
    fn from(args: PrintArgs) -> Self {
        Self {
            copies: args.copies.max(1),
            color: !args.mono,
            duplex: args.duplex,
            paper_size: args.paper,
            priority: args.priority,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn report(result: OperationResult) -> ExitCode {
    if result.success {
        println!("{}", result.message);
        ExitCode::SUCCESS
    } else {
        eprintln!("{}", result.message);
        ExitCode::FAILURE
    }
}

fn report_error(err: &printagent_core::AgentError) -> ExitCode {
    eprintln!("{}", humanize_error(err).to_line());
    ExitCode::FAILURE
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let svc = match AppServices::init() {
        Ok(svc) => svc,
        Err(e) => {
            tracing::error!(error = %e, "persistent storage failed, using in-memory fallback");
            match AppServices::fallback() {
                Ok(svc) => svc,
                Err(e) => return report_error(&e),
            }
        }
    };

    match cli.command {
        Command::Check { host, port } => print_json(&svc.check_connection(&host, port).await),
        Command::Send { file, host, port } => report(svc.send_to_printer(&file, &host, port).await),
        Command::SelectFile => match svc.select_file() {
            Some(path) => {
                println!("{}", path.display());
                ExitCode::SUCCESS
            }
            None => ExitCode::FAILURE,
        },
        Command::Printers(command) => printers(&svc, command),
        Command::Usb(UsbCommand::List { new }) => {
            if new {
                match svc.new_usb_printers() {
                    Ok(devices) => print_json(&devices),
                    Err(e) => report_error(&e),
                }
            } else {
                print_json(&svc.usb_printers())
            }
        }
        Command::Usb(UsbCommand::Print {
            device_id,
            file,
            options,
        }) => report(svc.print_to_usb(&device_id, &file, &options.into()).await),
        Command::System(SystemCommand::List { refresh }) => {
            let printers = if refresh {
                svc.refresh_system_printers().await
            } else {
                svc.system_printers().await
            };
            print_json(&printers)
        }
        Command::System(SystemCommand::Status { name }) => match svc.printer_status(&name).await {
            Ok(state) => {
                println!("{state}");
                ExitCode::SUCCESS
            }
            Err(e) => report_error(&e),
        },
        Command::System(SystemCommand::Cancel { job_id }) => report(svc.cancel_spooler_job(&job_id).await),
        Command::Print {
            printer_id,
            file,
            options,
        } => report(svc.print(&printer_id, &file, &options.into()).await),
        Command::Sync { id, remove } => {
            if remove {
                report(svc.unsync_printer(&id).await)
            } else {
                report(svc.sync_printer(&id).await)
            }
        }
        Command::Login { email, password } => report(svc.login(&email, &password).await),
        Command::Logout => report(svc.logout()),
        Command::Auth => {
            if svc.check_auth().await {
                println!("authenticated");
                ExitCode::SUCCESS
            } else {
                eprintln!("not authenticated");
                ExitCode::FAILURE
            }
        }
        Command::Run => run(&svc).await,
        Command::Config => print_json(&serde_json::json!({
            "dataDir": svc.data_dir(),
            "config": svc.config(),
        })),
    }
}

fn printers(svc: &AppServices, command: PrintersCommand) -> ExitCode {
    match command {
        PrintersCommand::List => match svc.printers() {
            Ok(printers) => print_json(&printers),
            Err(e) => report_error(&e),
        },
        PrintersCommand::Save {
            name,
            ip,
            port,
            usb,
            default,
        } => {
            let saved = match (usb, ip, name) {
                (Some(device_id), _, name) => svc.add_usb_printer(&device_id, default).and_then(|mut record| {
                    if let Some(name) = name {
                        record.name = name;
                        let result = svc.save_printer(record.clone());
                        if !result.success {
                            tracing::warn!(message = %result.message, "could not rename printer");
                        }
                    }
                    Ok(record)
                }),
                (None, Some(ip), Some(name)) => svc.add_network_printer(&name, &ip, port, default),
                (None, _, _) => {
                    eprintln!("either --ip or --usb is required");
                    return ExitCode::FAILURE;
                }
            };
            match saved {
                Ok(record) => print_json(&record),
                Err(e) => report_error(&e),
            }
        }
        PrintersCommand::Delete { id } => report(svc.delete_printer(&id)),
        PrintersCommand::Default { id } => report(svc.set_default_printer(&id)),
    }
}

/// Run the job processor until Ctrl-C.
async fn run(svc: &AppServices) -> ExitCode {
    if !svc.check_auth().await {
        tracing::warn!("not logged in; job polling will fail until `printagent login` succeeds");
    }

    let jobs = svc.jobs();
    let mut events = jobs.subscribe();
    jobs.start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    if let Ok(line) = serde_json::to_string(&event) {
                        println!("{line}");
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "job events dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    // Let a job in flight finish reporting before the runtime goes away.
    jobs.shutdown().await;
    tracing::info!("printagent stopped");
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn print_args_map_to_options() {
        let cli = Cli::try_parse_from([
            "printagent", "print", "usb_04b8:1120", "a.pdf", "-n", "2", "--mono", "--paper", "A4",
        ])
        .expect("parse");
        let Command::Print { printer_id, options, .. } = cli.command else {
            panic!("expected print");
        };
        assert_eq!(printer_id, "usb_04b8:1120");
        let options = PrintOptions::from(options);
        assert_eq!(options.copies, 2);
        assert!(!options.color);
        assert_eq!(options.paper_size.as_deref(), Some("A4"));
    }

    #[test]
    fn network_save_requires_name() {
        assert!(Cli::try_parse_from(["printagent", "printers", "save", "--ip", "10.0.0.5"]).is_err());
        assert!(
            Cli::try_parse_from(["printagent", "printers", "save", "--name", "Office", "--ip", "10.0.0.5"]).is_ok()
        );
        assert!(Cli::try_parse_from(["printagent", "printers", "save", "--usb", "04b8:0003"]).is_ok());
    }
}

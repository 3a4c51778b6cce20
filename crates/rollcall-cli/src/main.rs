use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rollcall_core::{AttendanceMark, CaptureState, PhotoEncoder, ReportView};
use rollcall_http::HttpTransport;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod controller;
mod render;

use config::Config;
use controller::{spawn_controller, ControllerHandle};

#[derive(Parser)]
#[command(name = "rollcall", version, about = "Photo-based classroom attendance client")]
struct Cli {
    /// Attendance service base URL (overrides config and ROLLCALL_SERVER_URL)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List or create classes
    Classes {
        #[command(subcommand)]
        action: ClassAction,
    },
    /// List, enrol or remove students
    Students {
        #[command(subcommand)]
        action: StudentAction,
    },
    /// Take attendance for a class from a photo
    Take {
        #[arg(long = "class")]
        class_id: String,
        /// YYYY-MM-DD, defaults to today
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        photo: PathBuf,
    },
    /// Show attendance reports
    Report {
        #[command(subcommand)]
        kind: ReportKind,
    },
    /// Record one student's attendance manually
    Mark {
        #[arg(long = "student")]
        student_id: String,
        #[arg(long = "class")]
        class_id: String,
        #[arg(long)]
        date: Option<String>,
        /// Mark absent instead of present
        #[arg(long)]
        absent: bool,
    },
}

#[derive(Subcommand)]
enum ClassAction {
    List,
    Add {
        #[arg(long)]
        name: String,
    },
}

#[derive(Subcommand)]
enum StudentAction {
    List,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long = "id")]
        student_id: String,
        #[arg(long = "class")]
        class_id: String,
        /// Enrolment photo (JPEG, PNG, ...)
        #[arg(long)]
        photo: PathBuf,
    },
    Delete {
        student_id: String,
    },
}

#[derive(Subcommand)]
enum ReportKind {
    /// Attendance of a class on one date
    Class {
        #[arg(long = "class")]
        class_id: String,
        #[arg(long)]
        date: Option<String>,
    },
    /// Attendance history of one student
    Student {
        #[arg(long = "id")]
        student_id: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    tracing::debug!(server_url = %config.server_url, source = ?config.source, "configuration loaded");

    let transport = HttpTransport::new(&config.server_url, config.timeout())
        .with_context(|| format!("invalid server url {}", config.server_url))?;
    let controller = spawn_controller(transport, PhotoEncoder::new(config.jpeg_quality))?;

    match cli.command {
        Commands::Classes { action } => match action {
            ClassAction::List => {
                let classes = controller.refresh_classes().await?;
                println!("{}", render::classes(&classes));
            }
            ClassAction::Add { name } => {
                controller.add_class(&name).await?;
                println!("Class added successfully");
            }
        },
        Commands::Students { action } => match action {
            StudentAction::List => {
                // Class names are best effort; the student list is what was asked for.
                if let Err(error) = controller.refresh_classes().await {
                    tracing::warn!(%error, "class list unavailable");
                }
                controller.refresh_students().await?;
                println!("{}", render::students(&controller.roster().await?));
            }
            StudentAction::Add {
                name,
                student_id,
                class_id,
                photo,
            } => {
                let bytes = read_photo(&photo)?;
                controller
                    .add_student(&name, &student_id, &class_id, bytes)
                    .await?;
                println!("Student added successfully");
            }
            StudentAction::Delete { student_id } => {
                controller.delete_student(&student_id).await?;
                println!("Student deleted successfully");
            }
        },
        Commands::Take {
            class_id,
            date,
            photo,
        } => take_attendance(&controller, &class_id, &date_or_today(date), &photo).await?,
        Commands::Report { kind } => match kind {
            ReportKind::Class { class_id, date } => {
                if let Err(error) = controller.refresh_classes().await {
                    tracing::warn!(%error, "class list unavailable");
                }
                let token = controller.query_class(&class_id, &date_or_today(date)).await?;
                match controller.wait_class_report(token).await? {
                    ReportView::Ready { report, .. } => println!("{}", render::class_report(&report)),
                    ReportView::Failed { error, .. } => return Err(error.into()),
                    other => bail!("report query ended unexpectedly: {other:?}"),
                }
            }
            ReportKind::Student { student_id } => {
                if let Err(error) = controller.refresh_classes().await {
                    tracing::warn!(%error, "class list unavailable");
                }
                if let Err(error) = controller.refresh_students().await {
                    tracing::warn!(%error, "student list unavailable");
                }
                let token = controller.query_student(&student_id).await?;
                match controller.wait_student_report(token).await? {
                    ReportView::Ready { report, .. } => {
                        println!("{}", render::student_report(&report))
                    }
                    ReportView::Failed { error, .. } => return Err(error.into()),
                    other => bail!("report query ended unexpectedly: {other:?}"),
                }
            }
        },
        Commands::Mark {
            student_id,
            class_id,
            date,
            absent,
        } => {
            let mark = AttendanceMark::from(!absent);
            let date = date_or_today(date);
            controller
                .mark_attendance(&student_id, &class_id, &date, mark)
                .await?;
            println!("Marked {student_id} {mark} for {date}");
        }
    }

    Ok(())
}

async fn take_attendance(
    controller: &ControllerHandle,
    class_id: &str,
    date: &str,
    photo: &Path,
) -> Result<()> {
    let bytes = read_photo(photo)?;
    controller.refresh_classes().await?;

    let attempt = controller.begin_capture(class_id, date).await?;
    controller.image_ready(bytes).await?;
    println!("Processing attendance...");

    let state = tokio::select! {
        state = controller.wait_for_capture(attempt) => state?,
        _ = tokio::signal::ctrl_c() => match controller.interrupt_capture().await? {
            // The result landed before the cancel did.
            Some(settled) => settled,
            None => {
                tracing::info!(state = controller.capture_state().name(), "capture cancelled");
                bail!("attendance capture cancelled");
            }
        },
    };

    let result = match state {
        CaptureState::Resolved { outcome, .. } => {
            println!("{}", render::outcome(&outcome));
            Ok(())
        }
        CaptureState::Failed { error, .. } => Err(error.into()),
        other => bail!("capture ended in state {}", other.name()),
    };
    controller.reset_capture().await?;
    result
}

fn read_photo(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading photo {}", path.display()))
}

fn date_or_today(date: Option<String>) -> String {
    date.unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string())
}

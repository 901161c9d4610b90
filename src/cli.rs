use std::fs;
use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use inquire::{Confirm, Text};
use meetingGuard::config::Settings;
use meetingGuard::models::availability::AvailabilityCalendar;
use meetingGuard::models::decision::{Decision, DeliveryResult, ReschedulePayload};
use meetingGuard::service::extraction::{build_extraction_prompt, today_in};
use meetingGuard::service::pipeline::{AnalysisRequest, PipelineOptions};

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze an email and send a reschedule request when the meeting is out of hours.
    Analyze {
        /// Email file, reads stdin when omitted.
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        timezone: Option<String>,
        /// JSON calendar file overriding CALENDAR_FILE.
        #[arg(long)]
        calendar: Option<String>,
        #[arg(long)]
        dry_run: bool,
        /// Review and edit the drafted reply before sending.
        #[arg(long)]
        edit: bool,
    },
    /// Send a reschedule request directly, e.g. to retry a failed delivery.
    Dispatch {
        sender: String,
        subject: String,
        body: String,
    },
    /// Print the extraction prompt for an email.
    Prompt {
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        timezone: Option<String>,
    },
}

pub async fn cli(settings: Settings) {
    // Fine to panic here
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Analyze {
            file,
            timezone,
            calendar,
            dry_run,
            edit,
        } => analyze(&settings, file, timezone, calendar, dry_run, edit).await,
        Commands::Dispatch {
            sender,
            subject,
            body,
        } => dispatch(
            &settings,
            ReschedulePayload {
                sender,
                subject,
                body,
            },
        )
        .await
        .map(|result| print_delivery(&result)),
        Commands::Prompt { file, timezone } => read_email(file).map(|email| {
            let timezone = timezone.unwrap_or_else(|| settings.timezone.clone());
            let today = today_in(&timezone);
            println!(
                "{}",
                build_extraction_prompt(&email, &timezone, today, &settings.calendar)
            );
        }),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn read_email(file: Option<PathBuf>) -> Result<String, Box<dyn std::error::Error>> {
    let email = match file {
        Some(path) => fs::read_to_string(path)?,
        None => io::read_to_string(io::stdin())?,
    };
    if email.trim().is_empty() {
        return Err("No email content supplied".into());
    }
    Ok(email)
}

async fn analyze(
    settings: &Settings,
    file: Option<PathBuf>,
    timezone: Option<String>,
    calendar: Option<String>,
    dry_run: bool,
    edit: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let email = read_email(file)?;
    let calendar = match calendar {
        Some(path) => AvailabilityCalendar::from_file(&path)?,
        None => settings.calendar.clone(),
    };
    let request = AnalysisRequest {
        email,
        timezone: timezone.unwrap_or_else(|| settings.timezone.clone()),
        calendar,
    };

    let pipeline = settings.build_pipeline()?;
    let send_now = !dry_run && !edit && pipeline.dispatcher().is_some();
    if !dry_run && pipeline.dispatcher().is_none() {
        println!("WEBHOOK_URL not set, running as a dry run.");
    }

    let outcome = pipeline
        .run(&request, PipelineOptions { dispatch: send_now })
        .await?;

    let Decision::Action(payload) = outcome.decision else {
        println!(
            "No action needed. The email either doesn't contain a meeting \
             or the meeting is within your available hours."
        );
        return Ok(());
    };

    println!("Meeting outside available hours detected!");
    println!("Sender: {}", payload.sender);
    println!("Subject: {}", payload.subject);
    println!("Proposed response:\n{}", payload.body);

    if let Some(delivery) = outcome.delivery {
        print_delivery(&delivery);
        return Ok(());
    }
    if !edit || dry_run || pipeline.dispatcher().is_none() {
        return Ok(());
    }

    let body = Text::new("Edit response if needed:")
        .with_initial_value(&payload.body)
        .prompt()?;
    if !Confirm::new("Send this response?").with_default(true).prompt()? {
        println!("Not sent.");
        return Ok(());
    }
    let edited = ReschedulePayload { body, ..payload };
    let delivery = dispatch(settings, edited).await?;
    print_delivery(&delivery);
    Ok(())
}

async fn dispatch(
    settings: &Settings,
    payload: ReschedulePayload,
) -> Result<DeliveryResult, Box<dyn std::error::Error>> {
    let dispatcher = settings
        .build_dispatcher()
        .ok_or("WEBHOOK_URL must be set to send a response")?;
    Ok(dispatcher.dispatch(&payload).await)
}

fn print_delivery(result: &DeliveryResult) {
    if result.success {
        println!("{}", result.status_detail);
    } else {
        println!("Delivery failed: {}", result.status_detail);
    }
}

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use gander::attendance::{self, AttendanceService, PortalScraper};
use gander::care::CareService;
use gander::channels::{LineClient, MessageSink};
use gander::clock::{Clock, TaipeiClock};
use gander::config::Config;
use gander::llm::{GeminiProvider, TextGenerator};
use gander::reminders::ReminderEngine;
use gander::router::Router;
use gander::scheduler::{self, Scheduler};
use gander::server::{AppContext, build_router};
use gander::state::BotState;

#[derive(Parser)]
#[command(name = "gander", version, about = "Personal LINE assistant daemon")]
struct Cli {
    /// Port to bind; overrides the PORT environment variable.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gander=info,tower_http=warn")),
        )
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let clock: Arc<dyn Clock> = Arc::new(TaipeiClock);
    let state = Arc::new(BotState::new());
    let recipients = config.recipients();
    let sink: Arc<dyn MessageSink> = Arc::new(LineClient::new(&config.line));

    let generator: Option<Arc<dyn TextGenerator>> = GeminiProvider::from_config(&config.llm)
        .map(|provider| Arc::new(provider) as Arc<dyn TextGenerator>);
    if generator.is_none() {
        tracing::warn!("no GEMINI_API_KEY set; chat falls back to canned replies");
    }

    let scraper = Arc::new(PortalScraper::new(config.portal.clone(), clock.clone()));
    let attendance_service = Arc::new(AttendanceService::new(
        scraper,
        sink.clone(),
        state.clone(),
        clock.clone(),
        config.portal.username.clone(),
        recipients.clone(),
    ));
    let scrape = attendance::spawn_worker(attendance_service.clone());

    let reminders = Arc::new(ReminderEngine::new(
        sink.clone(),
        state.clone(),
        clock.clone(),
        recipients.clone(),
    ));
    let care = Arc::new(CareService::new(
        sink.clone(),
        state.clone(),
        clock.clone(),
        recipients.clone(),
    ));
    let message_router = Arc::new(Router::new(
        generator,
        reminders.clone(),
        scrape.clone(),
        clock.clone(),
        recipients,
    ));

    // Catch anything already due before the server starts taking traffic.
    tracing::info!("running startup holiday check");
    reminders.run_check().await;

    let mut jobs = Scheduler::new(clock.clone());
    {
        let reminders = reminders.clone();
        jobs.add("holiday-check", "0 0 0,12 * * *", move || {
            let reminders = reminders.clone();
            async move {
                reminders.run_check().await;
            }
        })?;
    }
    {
        let scrape = scrape.clone();
        jobs.add("attendance-push", "0 0 12 * * *", move || {
            let scrape = scrape.clone();
            async move {
                let _ = scrape.request();
            }
        })?;
    }
    {
        let care = care.clone();
        jobs.add("care-check", "0 0 * * * *", move || {
            let care = care.clone();
            async move {
                care.run_inactivity_check().await;
            }
        })?;
    }
    {
        let state = state.clone();
        let clock = clock.clone();
        jobs.add("daily-mark-reset", "0 1 0 * * *", move || {
            let state = state.clone();
            let clock = clock.clone();
            async move {
                state.gc_daily_marks(clock.today());
            }
        })?;
    }
    {
        let state = state.clone();
        let clock = clock.clone();
        jobs.add("reminder-gc", "0 0 1 * * *", move || {
            let state = state.clone();
            let clock = clock.clone();
            async move {
                state.gc_reminders(clock.today());
            }
        })?;
    }
    {
        let attendance_service = attendance_service.clone();
        jobs.add("work-end-sweep", "0 * * * * *", move || {
            let attendance_service = attendance_service.clone();
            async move {
                attendance_service.sweep_work_end_alerts().await;
            }
        })?;
    }
    tokio::spawn(jobs.run());

    if let Some(public_url) = config.server.public_url.clone() {
        tokio::spawn(scheduler::keep_alive(public_url));
    }

    let app = build_router(AppContext {
        state,
        clock,
        sink,
        message_router,
        care,
        reminders,
        scrape,
        channel_secret: config.line.channel_secret.clone(),
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.server.port)).await?;
    tracing::info!(port = config.server.port, "gander listening");
    axum::serve(listener, app).await?;
    Ok(())
}

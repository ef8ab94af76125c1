//! Binary startup: configuration, logging and the in-memory deployment

use super::cli::args::Args;
use super::console::Console;
use crate::cache::api::MemoryCache;
use crate::coordinator::api::{CoordinatorContext, QueueCoordinator};
use crate::core::logging::init_logging;
use crate::core::shutdown::ShutdownCoordinator;
use crate::core::time::{Clock, SystemClock};
use crate::dispatch::api::{HttpNotifier, LogNotifier, NotificationDispatcher, Notifier};
use crate::fanout::api::FanoutHub;
use crate::store::api::MemoryStore;
use clap::Parser;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;

/// Time the dispatcher gets to finish queued notifications on exit
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Run the control room; returns the process exit code
pub async fn startup() -> i32 {
    let mut args = Args::parse();

    let config_path = match Args::load_config_file(&mut args).await {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{}", e);
            return 1;
        }
    };

    let use_color = args
        .color_choice()
        .unwrap_or_else(|| std::io::stdout().is_terminal());
    colored::control::set_override(use_color);

    if let Err(e) = init_logging(
        args.log_level.as_deref(),
        args.log_format.as_deref(),
        args.log_file_path().as_deref(),
        use_color,
    ) {
        eprintln!("Failed to initialise logging: {}", e);
        return 1;
    }

    if let Some(path) = &config_path {
        log::debug!("Loaded configuration from {}", path.display());
    }
    let config = args.coordinator_config();
    log::debug!("Configuration: {:?}", config);

    let (shutdown, shutdown_rx) = ShutdownCoordinator::new();
    shutdown.install_signal_handlers();

    let notifier: Arc<dyn Notifier> = match &config.notifier_url {
        Some(url) => {
            let notifier = HttpNotifier::new(url);
            log::info!("Notifications are sent to {}", notifier.endpoint());
            Arc::new(notifier)
        }
        None => {
            log::info!("No notifier configured; notifications are only logged");
            Arc::new(LogNotifier)
        }
    };
    let (dispatcher, worker) = NotificationDispatcher::spawn(
        notifier,
        config.dispatch_settings(),
        Some(shutdown.subscribe()),
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let context = CoordinatorContext {
        store: Arc::new(MemoryStore::new()),
        cache: Arc::new(MemoryCache::new()),
        fanout: Arc::new(FanoutHub::new(config.fanout_capacity)),
        dispatcher: dispatcher.clone(),
        clock,
    };
    let coordinator = Arc::new(QueueCoordinator::new(context, config));

    log::info!("Walk-in control room ready; type 'help' for commands");
    let mut console = Console::new(coordinator, dispatcher);
    let exit_code = match console
        .run(BufReader::new(tokio::io::stdin()), shutdown_rx)
        .await
    {
        Ok(()) => 0,
        Err(e) => {
            log::error!("Console input failed: {}", e);
            1
        }
    };

    shutdown.trigger_shutdown();
    drop(console);
    if tokio::time::timeout(SHUTDOWN_GRACE, worker).await.is_err() {
        log::warn!("Notification dispatcher did not finish within {:?}", SHUTDOWN_GRACE);
    }
    log::info!("Stopped");
    exit_code
}

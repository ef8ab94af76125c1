//! Interactive control-room console
//!
//! Reads one command per line and drives the coordinator the way a front
//! desk would. Queues can be named by internal id or public id. `watch`
//! attaches a viewer whose events are printed as JSON lines while the
//! console keeps accepting commands.

use crate::coordinator::api::{
    CoordinatorError, CoordinatorResult, EnrollRequest, QueueCoordinator,
};
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::reconfigure_logging;
use crate::core::validation::ValidationError;
use crate::dispatch::api::DispatchHandle;
use crate::store::api::QueueStatus;
use colored::Colorize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, EnumString};
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Keyword {
    Enroll,
    Admit,
    Next,
    Skip,
    Open,
    Close,
    Snapshot,
    Lookup,
    Watch,
    Unwatch,
    Stats,
    Level,
    Help,
    Quit,
}

impl Keyword {
    pub fn usage(&self) -> &'static str {
        match self {
            Keyword::Enroll => {
                "enroll <doctor> | <location> | <address> | <type> | <queue> | <prefix> [| <email> [| <mobile>]]"
            }
            Keyword::Admit => "admit <queue> <mobile> [patient name]",
            Keyword::Next => "next <queue>",
            Keyword::Skip => "skip <queue>",
            Keyword::Open => "open <queue>",
            Keyword::Close => "close <queue>",
            Keyword::Snapshot => "snapshot <queue>",
            Keyword::Lookup => "lookup <queue> <mobile>",
            Keyword::Watch => "watch <queue>",
            Keyword::Unwatch => "unwatch <queue>",
            Keyword::Stats => "stats",
            Keyword::Level => "level <trace|debug|info|warn|error|off>",
            Keyword::Help => "help",
            Keyword::Quit => "quit",
        }
    }

    /// Operation name used when logging a failed command
    fn context(&self) -> &'static str {
        match self {
            Keyword::Enroll => "Enrollment",
            Keyword::Admit => "Token admission",
            Keyword::Next => "Call next token",
            Keyword::Skip => "Skip current token",
            Keyword::Open | Keyword::Close => "Queue status change",
            Keyword::Snapshot => "Queue snapshot",
            Keyword::Lookup => "Token lookup",
            Keyword::Watch | Keyword::Unwatch => "Queue watch",
            Keyword::Stats | Keyword::Level | Keyword::Help | Keyword::Quit => "Console",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Enroll(EnrollRequest),
    Admit {
        queue: String,
        mobile: String,
        patient_name: Option<String>,
    },
    Next(String),
    Skip(String),
    SetStatus(String, QueueStatus),
    Snapshot(String),
    Lookup { queue: String, mobile: String },
    Watch(String),
    Unwatch(String),
    Stats,
    Level(String),
    Help,
    Quit,
}

impl ConsoleCommand {
    pub fn keyword(&self) -> Keyword {
        match self {
            ConsoleCommand::Enroll(_) => Keyword::Enroll,
            ConsoleCommand::Admit { .. } => Keyword::Admit,
            ConsoleCommand::Next(_) => Keyword::Next,
            ConsoleCommand::Skip(_) => Keyword::Skip,
            ConsoleCommand::SetStatus(_, QueueStatus::Open) => Keyword::Open,
            ConsoleCommand::SetStatus(_, QueueStatus::Closed) => Keyword::Close,
            ConsoleCommand::Snapshot(_) => Keyword::Snapshot,
            ConsoleCommand::Lookup { .. } => Keyword::Lookup,
            ConsoleCommand::Watch(_) => Keyword::Watch,
            ConsoleCommand::Unwatch(_) => Keyword::Unwatch,
            ConsoleCommand::Stats => Keyword::Stats,
            ConsoleCommand::Level(_) => Keyword::Level,
            ConsoleCommand::Help => Keyword::Help,
            ConsoleCommand::Quit => Keyword::Quit,
        }
    }

    /// Parse one input line; blank lines and `#` comments yield `None`
    pub fn parse(line: &str) -> Result<Option<Self>, ValidationError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let keyword = Keyword::from_str(word)
            .map_err(|_| ValidationError::new(format!("Unknown command '{}', try 'help'", word)))?;
        let usage = || ValidationError::new(format!("usage: {}", keyword.usage()));

        let args: Vec<&str> = rest.split_whitespace().collect();
        let single = || match args.as_slice() {
            [queue] => Ok(queue.to_string()),
            _ => Err(usage()),
        };

        let command = match keyword {
            Keyword::Enroll => ConsoleCommand::Enroll(parse_enrollment(rest).ok_or_else(usage)?),
            Keyword::Admit => match args.as_slice() {
                [queue, mobile, name @ ..] => ConsoleCommand::Admit {
                    queue: queue.to_string(),
                    mobile: mobile.to_string(),
                    patient_name: (!name.is_empty()).then(|| name.join(" ")),
                },
                _ => return Err(usage()),
            },
            Keyword::Next => ConsoleCommand::Next(single()?),
            Keyword::Skip => ConsoleCommand::Skip(single()?),
            Keyword::Open => ConsoleCommand::SetStatus(single()?, QueueStatus::Open),
            Keyword::Close => ConsoleCommand::SetStatus(single()?, QueueStatus::Closed),
            Keyword::Snapshot => ConsoleCommand::Snapshot(single()?),
            Keyword::Lookup => match args.as_slice() {
                [queue, mobile] => ConsoleCommand::Lookup {
                    queue: queue.to_string(),
                    mobile: mobile.to_string(),
                },
                _ => return Err(usage()),
            },
            Keyword::Watch => ConsoleCommand::Watch(single()?),
            Keyword::Unwatch => ConsoleCommand::Unwatch(single()?),
            Keyword::Level => match args.as_slice() {
                [level] if LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) => {
                    ConsoleCommand::Level(level.to_ascii_lowercase())
                }
                _ => return Err(usage()),
            },
            Keyword::Stats => ConsoleCommand::Stats,
            Keyword::Help => ConsoleCommand::Help,
            Keyword::Quit => ConsoleCommand::Quit,
        };
        Ok(Some(command))
    }
}

fn parse_enrollment(rest: &str) -> Option<EnrollRequest> {
    let fields: Vec<&str> = rest.split('|').map(str::trim).collect();
    if fields.len() < 6 || fields.len() > 8 {
        return None;
    }
    let optional = |i: usize| {
        fields
            .get(i)
            .filter(|value| !value.is_empty())
            .map(|value| value.to_string())
    };
    Some(EnrollRequest {
        doctor_name: fields[0].to_string(),
        location_name: fields[1].to_string(),
        location_address: fields[2].to_string(),
        location_type: fields[3].to_string(),
        queue_name: fields[4].to_string(),
        token_prefix: fields[5].to_string(),
        doctor_email: optional(6),
        doctor_mobile: optional(7),
    })
}

pub fn help_text() -> String {
    Keyword::iter()
        .map(|keyword| format!("  {}", keyword.usage()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct Console {
    coordinator: Arc<QueueCoordinator>,
    dispatcher: DispatchHandle,
    watchers: HashMap<String, JoinHandle<()>>,
}

impl Console {
    pub fn new(coordinator: Arc<QueueCoordinator>, dispatcher: DispatchHandle) -> Self {
        Self {
            coordinator,
            dispatcher,
            watchers: HashMap::new(),
        }
    }

    /// Process commands until `quit`, end of input, or shutdown
    pub async fn run<R>(
        &mut self,
        input: R,
        mut shutdown: broadcast::Receiver<()>,
    ) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            let line = tokio::select! {
                _ = shutdown.recv() => break,
                line = lines.next_line() => line?,
            };
            let Some(line) = line else {
                log::debug!("Console input closed");
                break;
            };

            match ConsoleCommand::parse(&line) {
                Ok(None) => {}
                Ok(Some(ConsoleCommand::Quit)) => break,
                Ok(Some(command)) => {
                    let keyword = command.keyword();
                    match self.execute(command).await {
                        Ok(output) => println!("{}", output),
                        Err(e) => {
                            log_error_with_context(&e, keyword.context());
                            println!("{} {}", "error:".red().bold(), e);
                        }
                    }
                }
                Err(e) => println!("{} {}", "error:".red().bold(), e),
            }
        }
        self.stop_watchers();
        Ok(())
    }

    /// Run one command and render its result
    pub async fn execute(&mut self, command: ConsoleCommand) -> CoordinatorResult<String> {
        match command {
            ConsoleCommand::Enroll(request) => {
                let receipt = self.coordinator.enroll(request).await?;
                Ok(format!(
                    "queue {} ({}) ready, doctor {}\njoin link: {}",
                    receipt.public_id.bold(),
                    receipt.queue_id,
                    receipt.doctor_id,
                    receipt.qr_url
                ))
            }
            ConsoleCommand::Admit {
                queue,
                mobile,
                patient_name,
            } => {
                let queue = self.coordinator.resolve_queue(&queue).await?;
                let receipt = self
                    .coordinator
                    .admit(&queue.id, &mobile, patient_name.as_deref())
                    .await?;
                Ok(format!(
                    "{} admitted, {} waiting",
                    receipt.token_number.green().bold(),
                    receipt.waiting_count
                ))
            }
            ConsoleCommand::Next(queue) => {
                let queue = self.coordinator.resolve_queue(&queue).await?;
                let outcome = self.coordinator.call_next(&queue.id).await?;
                Ok(match outcome.current {
                    Some(token_number) => format!(
                        "now serving {}, {} waiting",
                        token_number.green().bold(),
                        outcome.waiting_count
                    ),
                    None => format!("{} is idle", queue.name),
                })
            }
            ConsoleCommand::Skip(queue) => {
                let queue = self.coordinator.resolve_queue(&queue).await?;
                let token_number = self.coordinator.skip(&queue.id).await?;
                Ok(format!("skipped {}", token_number.yellow()))
            }
            ConsoleCommand::SetStatus(queue, status) => {
                let queue = self.coordinator.resolve_queue(&queue).await?;
                let status = self.coordinator.set_status(&queue.id, status).await?;
                Ok(format!("{} is {}", queue.name, status))
            }
            ConsoleCommand::Snapshot(queue) => {
                let queue = self.coordinator.resolve_queue(&queue).await?;
                let snapshot = self.coordinator.snapshot(&queue.public_id).await?;
                to_json(&snapshot)
            }
            ConsoleCommand::Lookup { queue, mobile } => {
                let queue = self.coordinator.resolve_queue(&queue).await?;
                let lookup = self
                    .coordinator
                    .lookup_token(&queue.public_id, &mobile)
                    .await?;
                to_json(&lookup)
            }
            ConsoleCommand::Watch(queue) => self.watch(&queue).await,
            ConsoleCommand::Unwatch(queue) => {
                let queue = self.coordinator.resolve_queue(&queue).await?;
                match self.watchers.remove(&queue.id) {
                    Some(watcher) => {
                        watcher.abort();
                        Ok(format!("stopped watching {}", queue.name))
                    }
                    None => Ok(format!("{} is not being watched", queue.name)),
                }
            }
            ConsoleCommand::Stats => {
                let stats = self.dispatcher.statistics();
                Ok(format!(
                    "notifications: {} queued, {} sent, {} failed, {} dropped; {} watches",
                    stats.queued(),
                    stats.sent(),
                    stats.failed(),
                    stats.dropped(),
                    self.watchers.len()
                ))
            }
            ConsoleCommand::Level(level) => {
                if let Err(e) = reconfigure_logging(&level) {
                    log::warn!("Could not change log level: {}", e);
                }
                Ok(format!("log level {}", level))
            }
            ConsoleCommand::Help => Ok(format!("commands:\n{}", help_text())),
            ConsoleCommand::Quit => Ok(String::new()),
        }
    }

    async fn watch(&mut self, key: &str) -> CoordinatorResult<String> {
        let queue = self.coordinator.resolve_queue(key).await?;
        if self
            .watchers
            .get(&queue.id)
            .is_some_and(|watcher| !watcher.is_finished())
        {
            return Ok(format!("already watching {}", queue.name));
        }

        let mut subscription = self.coordinator.subscribe(&queue.id, "console").await?;
        let name = queue.name.clone();
        let watcher = tokio::spawn(async move {
            while let Some(update) = subscription.recv().await {
                match serde_json::to_string(&update) {
                    Ok(line) => println!("{} {}", format!("[{}]", name).cyan(), line),
                    Err(e) => log::warn!("Could not render event: {}", e),
                }
            }
            log::debug!("Watch on {} ended", name);
        });
        self.watchers.insert(queue.id, watcher);
        Ok(format!("watching {}", queue.name))
    }

    fn stop_watchers(&mut self) {
        for (_, watcher) in self.watchers.drain() {
            watcher.abort();
        }
    }

    #[cfg(test)]
    fn watch_count(&self) -> usize {
        self.watchers.len()
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        self.stop_watchers();
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> CoordinatorResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| CoordinatorError::internal(e.to_string()))
}

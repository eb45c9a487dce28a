//! Pledge CLI
//!
//! Runs small scenarios on an event loop and prints how each deferred value settled.

use anyhow::Context;
use clap::{Parser, Subcommand};
use pledge::prelude::*;
use pledge::VERSION;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pledge")]
#[command(author, version, about = "Deferred values with chained continuations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Load event loop configuration from a JSON file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print settled values as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Settle a deferred value with a deferred value wrapping a thenable
    Nested,

    /// Run all, race, any and allSettled over a few inputs
    Combinators,

    /// Settle a deferred value with itself
    Cycle,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => EventLoopConfig::from_json_file(path)
            .map_err(into_anyhow)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => EventLoopConfig::from_env()
            .map_err(into_anyhow)
            .context("invalid environment configuration")?,
    };
    let (event_loop, scheduler) = EventLoop::shared(config);
    let report = Report { json: cli.json };

    let outcomes = match cli.command.unwrap_or(Commands::Nested) {
        Commands::Nested => run_nested(&scheduler),
        Commands::Combinators => run_combinators(&event_loop, &scheduler)?,
        Commands::Cycle => run_cycle(&scheduler),
    };

    let run = event_loop.run_until_idle();
    tracing::info!(tasks = run.tasks_run, time = run.final_time, "event loop idle");
    if run.budget_exhausted {
        anyhow::bail!("task budget of {} exhausted", event_loop.config().task_budget);
    }

    for (label, deferred) in &outcomes {
        report.print(label, deferred);
    }
    Ok(())
}

/// Pledge errors may carry single-threaded values, so they are flattened to text
fn into_anyhow(err: Error) -> anyhow::Error {
    anyhow::anyhow!("{}", err)
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!(version = VERSION, "logging initialized");
}

struct Report {
    json: bool,
}

impl Report {
    fn print(&self, label: &str, deferred: &DeferredValue) {
        let (status, payload) = match deferred.status() {
            Status::Pending => (Status::Pending, Value::Undefined),
            Status::Fulfilled => (Status::Fulfilled, deferred.value().unwrap_or(Value::Undefined)),
            Status::Rejected => (Status::Rejected, deferred.reason().unwrap_or(Value::Undefined)),
        };
        if self.json {
            let line = serde_json::json!({
                "scenario": label,
                "status": status,
                "payload": payload.to_json(),
            });
            println!("{}", line);
        } else if status == Status::Pending {
            println!("{:<12} {}", label, status);
        } else {
            println!("{:<12} {:<9} {}", label, status, payload);
        }
    }
}

type Outcomes = Vec<(&'static str, DeferredValue)>;

/// A deferred value fulfilled with a deferred value fulfilled with a thenable
fn run_nested(scheduler: &SchedulerHandle) -> Outcomes {
    let inner_scheduler = scheduler.clone();
    let outer = DeferredValue::new(scheduler, move |fulfill, _| {
        let inner = DeferredValue::new(&inner_scheduler, |fulfill, _| {
            let thenable = Object::new()
                .with_method("then", |_, args| {
                    let on_fulfilled = args.first().cloned().unwrap_or(Value::Undefined);
                    on_fulfilled.call(&Value::Undefined, &[Value::from("data")])
                })
                .into_value();
            fulfill(thenable);
            Ok(())
        });
        fulfill(Value::Deferred(inner));
        Ok(())
    });
    let logged = outer.then(
        handler(|value| {
            tracing::info!(%value, "nested value arrived");
            Ok(value)
        }),
        None,
    );
    vec![("nested", logged)]
}

/// Fulfill with `value` once `delay` ms of virtual time have passed
fn delayed(event_loop: &EventLoop, scheduler: &SchedulerHandle, delay: u64, value: Value) -> DeferredValue {
    let Resolvers { deferred, fulfill, .. } = DeferredValue::with_resolvers(scheduler);
    event_loop.set_timeout(delay, Box::new(move || fulfill(value)));
    deferred
}

fn run_combinators(event_loop: &EventLoop, scheduler: &SchedulerHandle) -> anyhow::Result<Outcomes> {
    let all_ok = all(scheduler, vec![resolve(scheduler, 1), resolve(scheduler, 2), resolve(scheduler, 3)])
        .map_err(into_anyhow)?;
    let all_err = all(scheduler, vec![resolve(scheduler, 1), reject(scheduler, "e"), resolve(scheduler, 3)])
        .map_err(into_anyhow)?;
    let raced = race(
        scheduler,
        vec![
            delayed(event_loop, scheduler, 10, Value::from("slow")),
            delayed(event_loop, scheduler, 1, Value::from("fast")),
        ],
    )
    .map_err(into_anyhow)?;
    let any_err = any(scheduler, vec![reject(scheduler, "a"), reject(scheduler, "b")]).map_err(into_anyhow)?;
    let settled = all_settled(scheduler, vec![resolve(scheduler, 1), reject(scheduler, "e")]).map_err(into_anyhow)?;

    Ok(vec![
        ("all", all_ok),
        ("all-reject", all_err),
        ("race", raced),
        ("any", any_err),
        ("allSettled", settled),
    ])
}

fn run_cycle(scheduler: &SchedulerHandle) -> Outcomes {
    let Resolvers { deferred, fulfill, .. } = DeferredValue::with_resolvers(scheduler);
    fulfill(Value::Deferred(deferred.clone()));
    vec![("cycle", deferred)]
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
use anyhow::{Context as _, Result};
use clap::Parser;
use daq_logging::config::{
    apply_defaults, Environment, ProcessEnv, RoutingConfig, Settings, ENV_TRACE_LVLM,
};
use daq_logging::severity::{clamp_trace_level, TLVL_DEBUG};
use daq_logging::trace::show;
use daq_logging::{
    ers_error, ers_fatal, ers_info, ers_warning, here, logging, setup, tlog, tlog_debug,
    IssueDefinition, IssueRegistry, SeverityKind,
};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser, Debug, PartialEq)]
enum Command {
    /// Send one message on each of the six streams, then dump the trace buffer
    SixStreams {
        /// Run setup first (otherwise only the environment configures routing)
        #[arg(long)]
        setup: bool,
    },
    /// Print the effective routing and settings as JSON
    Config {
        /// Apply the setup defaults to the environment before reading it
        #[arg(long)]
        defaults: bool,
    },
    /// Write debug messages into the trace buffer and dump it
    Show {
        /// Messages to write
        #[arg(long, default_value_t = 10)]
        count: u32,
        /// Debug sub-level to write at
        #[arg(long, default_value_t = 1)]
        level: i64,
    },
}

#[derive(Serialize)]
struct EffectiveConfig {
    routing: BTreeMap<SeverityKind, String>,
    settings: Settings,
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::SixStreams { setup: run_setup } => six_streams(run_setup)?,
        Command::Config { defaults } => {
            if defaults {
                apply_defaults(&ProcessEnv);
            }
            let settings = Settings::from_env(&ProcessEnv);
            let (mut routing, problems) = RoutingConfig::from_env(&ProcessEnv);
            if settings.force_trace_forwarding {
                routing.force_trace_forwarding();
            }
            for (kind, err) in problems {
                eprintln!("{}: {}", kind, err);
            }
            let effective = EffectiveConfig {
                routing: SeverityKind::ALL
                    .into_iter()
                    .map(|kind| (kind, routing.render(kind)))
                    .collect(),
                settings,
            };
            println!("{}", serde_json::to_string_pretty(&effective)?);
        }
        Command::Show { count, level } => {
            // Make sure the level written is recorded
            let lvl = clamp_trace_level(TLVL_DEBUG as i64 + level);
            ProcessEnv.set_if_absent(ENV_TRACE_LVLM, &(1u64 << lvl).to_string());
            let logging = setup();
            for ii in 0..count {
                tlog_debug!(level, "message {} at debug level {}", ii, level);
            }
            print!("{}", show(&logging.trace().drain(), &logging.trace().names()));
        }
    }

    Ok(())
}

fn six_streams(run_setup: bool) -> Result<()> {
    if run_setup {
        setup();
    }

    let registry = IssueRegistry::global();
    registry.register(
        IssueDefinition::new("FileDoesNotExist", "file {file_name} does not exist")
            .attributes(["file_name"]),
    )?;
    let file_issue = |name: &str| {
        registry
            .create("FileDoesNotExist", here!(), &[("file_name", name)])
            .context("creating FileDoesNotExist")
    };

    ers_fatal!(file_issue("fatal file")?);
    ers_error!(file_issue("error file")?);
    ers_warning!(file_issue("warning file")?);
    ers_info!(file_issue("info file")?);
    tlog!("Hello log stream");
    tlog_debug!(1, "Hello debug stream arg={}", 3);

    let trace = logging().trace();
    print!("{}", show(&trace.drain(), &trace.names()));
    Ok(())
}

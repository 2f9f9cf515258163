// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Tour of the six streams
//!
//! ```bash
//! cargo run --example basic_functionality
//! DUNEDAQ_ERS_VERBOSITY_LEVEL=2 cargo run --example basic_functionality
//! TRACE_LVLS=-1 cargo run --example basic_functionality
//! ```

use anyhow::Result;
use daq_logging::config::{ENV_TRACE_LVLM, ENV_TRACE_LVLS};
use daq_logging::trace::show;
use daq_logging::{
    ers_error, ers_fatal, ers_info, ers_warning, here, logging, setup, tlog, tlog_debug,
    Environment, Issue, IssueDefinition, IssueRegistry, ProcessEnv,
};
use std::sync::{Arc, Barrier};
use std::thread;

const NUM_THREADS: usize = 5;

fn register_issues(registry: &IssueRegistry) -> Result<()> {
    registry.register(IssueDefinition::new("File2", "").attributes(["file_name"]))?;
    registry.register(
        IssueDefinition::new(
            "CantOpenFile2",
            "Can not open \"{file_name}\" file arg2={arg2} arg3={arg3}",
        )
        .parent("File2")
        .attributes(["arg2", "arg3"]),
    )?;
    registry.register(
        IssueDefinition::new(
            "CommandNotRegistered2",
            "Command '{command_name}' does not have an entry in the CommandOrderMap! \
             UserModules will receive this command in an unspecified order!",
        )
        .attributes(["command_name"]),
    )?;
    Ok(())
}

fn cant_open(file_name: &str, arg2: i32, arg3: &str) -> Result<Issue> {
    let arg2 = arg2.to_string();
    Ok(IssueRegistry::global().create(
        "CantOpenFile2",
        here!(),
        &[("file_name", file_name), ("arg2", &arg2), ("arg3", arg3)],
    )?)
}

fn main() -> Result<()> {
    // Record everything in memory for this tour; normally left to the user
    ProcessEnv.set_if_absent(ENV_TRACE_LVLM, "-1");
    ProcessEnv.set_if_absent(ENV_TRACE_LVLS, "0xff");
    setup();
    register_issues(IssueRegistry::global())?;

    tlog_debug!(0, "a message which doesn't go to the central logger");
    tlog!("another example of a message that doesn't go to the central logger");
    tlog!(name = "MYNAME", "yet another example -- messages are controllable via name+level");

    let message = Issue::message(here!(), "Using the in-memory trace buffer")
        .with_qualifier("Logging_qual2");
    tlog!(message);

    ers_fatal!(cant_open(
        "My_Fatal_FileName - usually associated with an exit",
        4,
        "four"
    )?);
    ers_error!(cant_open("My_Error_FileName", 5, "five")?);
    ers_error!("error with just a string");
    ers_warning!(cant_open("My_Warn_FileName", 6, "six")?);
    ers_warning!(name = "IGNORED", Issue::message(here!(), "My_Warn_Message with ignored name"));
    ers_info!("info with arguments: {} and {}", 1, "two");

    let not_registered = IssueRegistry::global().create(
        "CommandNotRegistered2",
        here!(),
        &[("command_name", "MyCommand")],
    )?;
    tlog!(name = "TEST1", not_registered);
    tlog!("log stating debug messages follow; they must be enabled via TRACE_LVLS or DUNEDAQ_ERS_DEBUG_LEVEL");

    tlog_debug!(6, Issue::message(here!(), "A debug(6) using a plain message issue"));
    tlog_debug!(6, cant_open("My_Fatal_FileName_via_debug_6", 7, "seven")?);
    tlog_debug!(0, "hello - debug level 0");
    tlog_debug!(5, "hello - debug level 5");
    tlog_debug!(6, "hello - debug level 6");
    tlog_debug!(7, cant_open("My_d07_FileName", 8, "eight")?);
    tlog_debug!(8, name = "TEST2", "testing name argument");
    tlog_debug!(55, "debug lvl 55");
    tlog_debug!(56, "debug lvl 56");
    tlog_debug!(63, "debug lvl 63");
    tlog_debug!(64, "debug lvl 64");

    let trace = logging().trace();
    println!("\nbuffer follows:\n\n{}", show(&trace.drain(), &trace.names()));

    tlog!("One could try the same with DUNEDAQ_ERS_VERBOSITY_LEVEL=2 or 3");
    tlog!("Now, fast multithread...");

    let start = Arc::new(Barrier::new(NUM_THREADS));
    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|thread_idx| {
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for uu in 0..5 {
                    tlog_debug!(8, "tidx {} fast debug(8) #{}", thread_idx, uu);
                }
            })
        })
        .collect();
    for handle in handles {
        if handle.join().is_err() {
            anyhow::bail!("worker thread panicked");
        }
    }

    let entries = trace.drain();
    let tail = entries.len().saturating_sub(25);
    println!("\nbuffer follows:\n\n{}", show(&entries[tail..], &trace.names()));
    Ok(())
}

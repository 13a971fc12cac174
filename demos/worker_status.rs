//! Random workload routed over one worker per CPU, with a periodic status table.
//!
//! Run with `RUST_LOG=taskloop=debug cargo run --example worker_status` to see
//! lifecycle logs. The demo quits itself after a few seconds.

use rand::Rng;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use taskloop::prelude::*;
use tracing_subscriber::EnvFilter;

const RUN_FOR: Duration = Duration::from_secs(4);
const REFRESH: Duration = Duration::from_millis(250);

fn main() -> taskloop::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::builder().tag_names_with_thread(true).build()?;
    let runtime = Arc::new(Runtime::new(config)?);
    runtime.start()?;
    println!("=== {} workers started ===\n", runtime.workers().len());

    let printer = {
        let runtime = runtime.clone();
        thread::spawn(move || {
            while runtime.is_running() {
                for status in runtime.statuses() {
                    println!(
                        "{:<32} queued: {:>3}  done: {:>4}",
                        status.name, status.queued, status.executed
                    );
                }
                println!();
                thread::sleep(REFRESH);
            }
        })
    };

    {
        let runtime = runtime.clone();
        thread::spawn(move || {
            thread::sleep(RUN_FOR);
            println!("time is up, quitting");
            runtime.quit(0);
        });
    }

    let mut rng = rand::thread_rng();
    while runtime.is_running() {
        let work = Duration::from_millis(rng.gen_range(250..=2000));
        runtime.submit(move || thread::sleep(work));
        thread::sleep(Duration::from_millis(rng.gen_range(10..=250)));
    }

    let code = runtime.wait();
    let _ = printer.join();

    let executed: u64 = runtime.statuses().iter().map(|s| s.executed).sum();
    println!("=== main loop exited with {}, {} tasks executed ===", code, executed);
    Ok(())
}

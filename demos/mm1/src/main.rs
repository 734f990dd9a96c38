use std::rc::Rc;

use procsim::scenarios::{run_mm1, Mm1Config};
use procsim::SeededSampler;

const RANDOM_SEED: u64 = 42;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => match std::fs::read_to_string(&path) {
            Ok(json) => match Mm1Config::from_json(&json) {
                Ok(config) => config,
                Err(e) => {
                    log::error!("invalid config {}: {}", path, e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                log::error!("cannot read {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => Mm1Config::default(),
    };

    let report = match run_mm1(config, Rc::new(SeededSampler::new(RANDOM_SEED))) {
        Ok(report) => report,
        Err(e) => {
            log::error!("simulation aborted: {}", e);
            std::process::exit(1);
        }
    };

    let (stats, theory) = (&report.stats, &report.theory);
    println!("Customers served: {}", stats.served);
    println!();
    println!("Average wait in queue: {:.2} (theory {:.2})", stats.mean_queue_delay, theory.queue_delay);
    println!("Average time in system: {:.2} (theory {:.2})", stats.mean_time_in_system, theory.time_in_system);
    println!(
        "Average number of customers in system: {:.2} (theory {:.2})",
        stats.mean_customers_in_system, theory.customers_in_system
    );
    println!("Average utilization: {:.2} (theory {:.2})", stats.utilization, theory.utilization);

    if log::log_enabled!(log::Level::Debug) {
        println!("{}", serde_json::to_string_pretty(&report.samples).unwrap_or_default());
    }
}

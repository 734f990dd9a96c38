use std::rc::Rc;

use procsim::scenarios::{run_fuel_station, FuelStationConfig};
use procsim::SeededSampler;

const RANDOM_SEED: u64 = 42;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let base = match std::env::args().nth(1) {
        Some(path) => match std::fs::read_to_string(&path) {
            Ok(json) => match FuelStationConfig::from_json(&json) {
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
        None => FuelStationConfig::default(),
    };

    // Compare station sizes as in the classic example: 2 or 4 pumps, 5000 or 10000 liters
    for pumps in [2, 4] {
        for tank_capacity in [5000., 10000.] {
            let config = FuelStationConfig {
                pumps,
                tank_capacity,
                ..base.clone()
            };
            let sampler = Rc::new(SeededSampler::new(RANDOM_SEED));
            let report = match run_fuel_station(config, sampler) {
                Ok(report) => report,
                Err(e) => {
                    log::error!("simulation aborted: {}", e);
                    std::process::exit(1);
                }
            };
            let max_queue = report.samples.iter().map(|s| s.queue_len).max().unwrap_or(0);
            println!(
                "pumps={} capacity={}: {} cars served, {:.1} liters dispensed, {} truck trips, max pump queue {}",
                pumps,
                tank_capacity,
                report.cars.len(),
                report.fuel_dispensed(),
                report.refills.len(),
                max_queue,
            );
            if log::log_enabled!(log::Level::Debug) {
                println!("{}", serde_json::to_string_pretty(&report.samples).unwrap_or_default());
            }
        }
    }
}

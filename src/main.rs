mod logger;
mod utils;
mod catalog;
mod strategies;
mod allocator;
mod estimator;
mod dataset;
mod config;
mod market;
mod charts;
mod scenarios;

use config::{Command, ConfigError, RunConfig};
use logger::{Logger, LogEvent, ConsoleReceiver, FileReceiver, sanitize_filename};
use market::Market;
use strategies::StrategyType;
use std::error::Error;
use std::path::PathBuf;

use scenarios::get_scenario_catalog;
use utils::{RAND_SEED, VERBOSE_QUERIES};
use std::sync::atomic::Ordering;

fn print_usage(error: &ConfigError) {
    eprintln!("Error: {}", error);
    eprintln!("Usage:");
    eprintln!("  adwords <strategy> [--bidders PATH] [--queries PATH] [--trials N] [--seed S] [--chart] [--verbose queries]");
    eprintln!("  adwords compare [same options]");
    eprintln!("  adwords scenario <name|all> [iterations] [start_iteration]");
    eprintln!("Available strategies:");
    for strategy_type in StrategyType::ALL {
        eprintln!("  - {}", strategy_type.name());
    }
}

/// Console shows only the results, everything else goes to log/<strategy>/
fn setup_run_logger(strategy_name: &str, config: &RunConfig) -> Result<Logger, Box<dyn Error>> {
    let mut logger = Logger::new();
    logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Validation]));
    let log_dir = PathBuf::from("log").join(sanitize_filename(strategy_name));
    logger.add_receiver(FileReceiver::new(&log_dir.join("allocation.log"), vec![LogEvent::Trial, LogEvent::Allocation])?);
    if config.verbose_queries {
        VERBOSE_QUERIES.store(true, Ordering::Relaxed);
        logger.add_receiver(FileReceiver::new(&log_dir.join("queries.csv"), vec![LogEvent::Query])?);
        logger.log(LogEvent::Query, &allocator::query_log_header()?)?;
    }
    Ok(logger)
}

fn run_strategy(strategy_type: StrategyType, config: &RunConfig) -> Result<(), Box<dyn Error>> {
    let mut logger = setup_run_logger(strategy_type.name(), config)?;
    let mut market = Market::load(&config.bidders_path, &config.queries_path)?;
    market.printout(&mut logger);

    let result = market.run_variant(strategy_type, config.trials, config.seed, &mut logger);
    for line in result.output_lines() {
        logln!(&mut logger, LogEvent::Validation, "{}", line);
    }

    if config.chart {
        let filename = charts::generate_trial_revenue_histogram(strategy_type.name(), &result.estimate)?;
        logln!(&mut logger, LogEvent::Validation, "Chart written to {}", filename);
    }
    logger.flush()?;
    Ok(())
}

fn run_compare(config: &RunConfig) -> Result<(), Box<dyn Error>> {
    let mut logger = setup_run_logger("compare", config)?;
    let mut market = Market::load(&config.bidders_path, &config.queries_path)?;
    market.printout(&mut logger);

    logln!(&mut logger, LogEvent::Validation, "{:<10} {:>14} {:>14} {:>14} {:>8}",
        "strategy", "revenue", "mean revenue", "optimum", "ratio");
    let mut ratios = Vec::new();
    for strategy_type in StrategyType::ALL {
        let result = market.run_variant(strategy_type, config.trials, config.seed, &mut logger);
        logln!(&mut logger, LogEvent::Validation, "{:<10} {:>14.2} {:>14.2} {:>14.2} {:>8.4}",
            strategy_type.name(),
            result.revenue,
            result.estimate.mean_revenue,
            result.estimate.optimal_revenue,
            result.estimate.ratio);
        ratios.push((strategy_type.name(), result.estimate.ratio));
    }

    if config.chart {
        let filename = charts::generate_strategy_comparison_chart(&ratios)?;
        logln!(&mut logger, LogEvent::Validation, "Chart written to {}", filename);
    }
    logger.flush()?;
    Ok(())
}

fn run_scenarios(scenario_arg: &str, iterations: u64, start_iteration: u64) -> Result<(), Box<dyn Error>> {
    let all_scenarios = get_scenario_catalog();

    let scenarios: Vec<_> = if scenario_arg == "all" {
        all_scenarios.clone()
    } else {
        match all_scenarios.iter().find(|s| s.short_name == scenario_arg) {
            Some(scenario) => vec![scenario.clone()],
            None => {
                let available: Vec<&str> = all_scenarios.iter().map(|s| s.short_name).collect();
                return Err(format!("Scenario '{}' not found. Available scenarios: {}", scenario_arg, available.join(", ")).into());
            }
        }
    };

    // Individual validations are only readable for a single scenario run once
    let mut logger = Logger::new();
    if scenario_arg != "all" && iterations == 1 {
        logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Validation, LogEvent::Scenario]));
    } else {
        logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Validation]));
    }
    let summary_receiver_id = logger.add_receiver(FileReceiver::new(&PathBuf::from("log/summary.log"), vec![LogEvent::Validation])?);

    if scenario_arg == "all" {
        logln!(&mut logger, LogEvent::Validation, "Running all scenarios {} time(s)...\n", iterations);
    } else {
        logln!(&mut logger, LogEvent::Validation, "Running scenario '{}' {} time(s)...\n", scenario_arg, iterations);
    }

    let mut failures = 0;
    for scenario in &scenarios {
        log!(&mut logger, LogEvent::Validation, "{}: ", scenario.short_name);
        let scenario_log = PathBuf::from(format!("log/{}/scenario.log", sanitize_filename(scenario.short_name)));
        let scenario_receiver_id = logger.add_receiver(FileReceiver::new(&scenario_log, vec![LogEvent::Scenario])?);

        for i in start_iteration..(start_iteration + iterations) {
            if iterations > 1 {
                log!(&mut logger, LogEvent::Validation, "[{}/{}] ", i - start_iteration + 1, iterations);
            }
            RAND_SEED.store(i, Ordering::Relaxed);

            match (scenario.run)(scenario.short_name, &mut logger) {
                Ok(()) => {
                    if iterations > 1 {
                        logln!(&mut logger, LogEvent::Validation, "✓");
                    } else {
                        logln!(&mut logger, LogEvent::Validation, "✓ PASSED");
                    }
                }
                Err(e) => {
                    failures += 1;
                    if iterations > 1 {
                        logln!(&mut logger, LogEvent::Validation, "✗ (seed {})", i);
                    } else {
                        logln!(&mut logger, LogEvent::Validation, "✗ FAILED: {}", e);
                    }
                }
            }
            let _ = logger.flush();
        }

        logger.remove_receiver(scenario_receiver_id);
    }

    logger.remove_receiver(summary_receiver_id);
    if failures > 0 {
        return Err(format!("{} scenario run(s) failed", failures).into());
    }
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match config::parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            print_usage(&e);
            std::process::exit(2);
        }
    };

    let result = match command {
        Command::Run { strategy, config } => run_strategy(strategy, &config),
        Command::Compare { config } => run_compare(&config),
        Command::Scenario { name, iterations, start_iteration } => run_scenarios(&name, iterations, start_iteration),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

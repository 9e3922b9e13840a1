//! Command line parsing.
//!
//! ```text
//! adwords <greedy|balance|msvv> [options]
//! adwords compare [options]
//! adwords scenario <name|all> [iterations] [start_iteration]
//!
//! options: --bidders PATH  --queries PATH  --trials N  --seed S  --chart  --verbose queries
//! ```

use crate::strategies::StrategyType;
use crate::utils::{DEFAULT_BIDDERS_PATH, DEFAULT_QUERIES_PATH, DEFAULT_SEED, DEFAULT_TRIALS};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("missing command, expected one of: greedy, balance, msvv, compare, scenario")]
    MissingCommand,
    #[error("invalid strategy '{0}', expected one of: greedy, balance, msvv")]
    UnknownStrategy(String),
    #[error("unknown option '{0}'")]
    UnknownOption(String),
    #[error("option '{0}' needs a value")]
    MissingValue(String),
    #[error("invalid value '{value}' for '{option}'")]
    InvalidValue { option: String, value: String },
}

/// Settings shared by the strategy and compare commands
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub bidders_path: PathBuf,
    pub queries_path: PathBuf,
    pub trials: usize,
    pub seed: u64,
    pub chart: bool,
    pub verbose_queries: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            bidders_path: PathBuf::from(DEFAULT_BIDDERS_PATH),
            queries_path: PathBuf::from(DEFAULT_QUERIES_PATH),
            trials: DEFAULT_TRIALS,
            seed: DEFAULT_SEED,
            chart: false,
            verbose_queries: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Single strategy: deterministic revenue, then competitive ratio
    Run { strategy: StrategyType, config: RunConfig },
    /// All strategies side by side
    Compare { config: RunConfig },
    /// Registered validation scenarios
    Scenario { name: String, iterations: u64, start_iteration: u64 },
}

fn parse_number<T: std::str::FromStr>(option: &str, value: &str) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| ConfigError::InvalidValue {
        option: option.to_string(),
        value: value.to_string(),
    })
}

fn parse_run_options(options: &[String]) -> Result<RunConfig, ConfigError> {
    let mut config = RunConfig::default();
    let mut iter = options.iter();
    while let Some(option) = iter.next() {
        match option.as_str() {
            "--chart" => config.chart = true,
            "--bidders" | "--queries" | "--trials" | "--seed" | "--verbose" => {
                let value = iter.next().ok_or_else(|| ConfigError::MissingValue(option.clone()))?;
                match option.as_str() {
                    "--bidders" => config.bidders_path = PathBuf::from(value),
                    "--queries" => config.queries_path = PathBuf::from(value),
                    "--trials" => {
                        config.trials = parse_number(option, value)?;
                        if config.trials == 0 {
                            return Err(ConfigError::InvalidValue { option: option.clone(), value: value.clone() });
                        }
                    }
                    "--seed" => config.seed = parse_number(option, value)?,
                    _ => {
                        if value != "queries" {
                            return Err(ConfigError::InvalidValue { option: option.clone(), value: value.clone() });
                        }
                        config.verbose_queries = true;
                    }
                }
            }
            _ => return Err(ConfigError::UnknownOption(option.clone())),
        }
    }
    Ok(config)
}

/// Parse the arguments following the program name
pub fn parse_args(args: &[String]) -> Result<Command, ConfigError> {
    let (command, rest) = args.split_first().ok_or(ConfigError::MissingCommand)?;
    match command.as_str() {
        "compare" => Ok(Command::Compare { config: parse_run_options(rest)? }),
        "scenario" => {
            let name = rest.first().ok_or_else(|| ConfigError::MissingValue("scenario".to_string()))?.clone();
            let iterations = match rest.get(1) {
                Some(value) => parse_number("iterations", value)?,
                None => 1,
            };
            let start_iteration = match rest.get(2) {
                Some(value) => parse_number("start_iteration", value)?,
                None => 0,
            };
            if let Some(extra) = rest.get(3) {
                return Err(ConfigError::UnknownOption(extra.clone()));
            }
            Ok(Command::Scenario { name, iterations, start_iteration })
        }
        name => {
            let strategy = StrategyType::from_name(name).ok_or_else(|| ConfigError::UnknownStrategy(name.to_string()))?;
            Ok(Command::Run { strategy, config: parse_run_options(rest)? })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_strategy_with_defaults() {
        let command = parse_args(&args("msvv")).unwrap();
        assert_eq!(command, Command::Run { strategy: StrategyType::MSVV, config: RunConfig::default() });
    }

    #[test]
    fn test_strategy_with_options() {
        let command = parse_args(&args("balance --bidders b.csv --queries q.txt --trials 7 --seed 42 --chart --verbose queries")).unwrap();
        let expected = RunConfig {
            bidders_path: PathBuf::from("b.csv"),
            queries_path: PathBuf::from("q.txt"),
            trials: 7,
            seed: 42,
            chart: true,
            verbose_queries: true,
        };
        assert_eq!(command, Command::Run { strategy: StrategyType::BALANCE, config: expected });
    }

    #[test]
    fn test_invalid_strategy() {
        assert_eq!(parse_args(&args("random")), Err(ConfigError::UnknownStrategy("random".to_string())));
        assert_eq!(parse_args(&[]), Err(ConfigError::MissingCommand));
    }

    #[test]
    fn test_bad_option_values() {
        assert!(matches!(parse_args(&args("greedy --trials many")), Err(ConfigError::InvalidValue { .. })));
        assert!(matches!(parse_args(&args("greedy --trials 0")), Err(ConfigError::InvalidValue { .. })));
        assert_eq!(parse_args(&args("greedy --seed")), Err(ConfigError::MissingValue("--seed".to_string())));
        assert_eq!(parse_args(&args("greedy --fast")), Err(ConfigError::UnknownOption("--fast".to_string())));
    }

    #[test]
    fn test_compare_and_scenario() {
        let command = parse_args(&args("compare --trials 3")).unwrap();
        assert_eq!(command, Command::Compare { config: RunConfig { trials: 3, ..RunConfig::default() } });

        let command = parse_args(&args("scenario all 5 10")).unwrap();
        assert_eq!(command, Command::Scenario { name: "all".to_string(), iterations: 5, start_iteration: 10 });

        let command = parse_args(&args("scenario random_market")).unwrap();
        assert_eq!(command, Command::Scenario { name: "random_market".to_string(), iterations: 1, start_iteration: 0 });
    }
}

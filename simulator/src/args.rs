use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Deterministic sql-loom execution queue simulator")]
pub(crate) struct Args {
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) duration: Option<Duration>,
    #[arg(long)]
    pub(crate) iterations: Option<u64>,
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Pool size; ignored with `--single`.
    #[arg(long, default_value_t = 4)]
    pub(crate) pool_size: u32,
    /// Run against one shared connection instead of a pool.
    #[arg(long)]
    pub(crate) single: bool,
    #[arg(long, default_value_t = 8)]
    pub(crate) max_concurrent_queries: usize,
    /// Largest number of statements submitted in one step.
    #[arg(long, default_value_t = 6)]
    pub(crate) max_batch: usize,
    #[arg(long, default_value_t = 0.05)]
    pub(crate) failure_rate: f64,
    #[arg(long, default_value_t = 0.02)]
    pub(crate) disconnect_rate: f64,
    #[arg(long, default_value_t = 0.05)]
    pub(crate) sleep_rate: f64,
    #[arg(long)]
    pub(crate) log: Option<PathBuf>,
    #[arg(long)]
    pub(crate) quick: bool,
    #[arg(long)]
    pub(crate) stress: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SimConfig {
    pub(crate) duration_ms: Option<u64>,
    pub(crate) iterations: Option<u64>,
    pub(crate) seed: u64,
    pub(crate) pool_size: u32,
    pub(crate) single: bool,
    pub(crate) max_concurrent_queries: usize,
    pub(crate) max_batch: usize,
    pub(crate) failure_rate: f64,
    pub(crate) disconnect_rate: f64,
    pub(crate) sleep_rate: f64,
    pub(crate) log: Option<PathBuf>,
    pub(crate) preset: Option<String>,
    pub(crate) first_steps: usize,
    pub(crate) tail_steps: usize,
}

impl SimConfig {
    pub(crate) fn from_args(args: Args) -> Self {
        let mut config = SimConfig {
            duration_ms: args.duration.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            iterations: args.iterations,
            seed: args.seed.unwrap_or_else(random_seed),
            pool_size: args.pool_size.max(1),
            single: args.single,
            max_concurrent_queries: args.max_concurrent_queries.max(1),
            max_batch: args.max_batch.max(1),
            failure_rate: clamp_rate(args.failure_rate),
            disconnect_rate: clamp_rate(args.disconnect_rate),
            sleep_rate: clamp_rate(args.sleep_rate),
            log: args.log,
            preset: None,
            first_steps: 30,
            tail_steps: 80,
        };

        if args.quick {
            config.apply_quick();
        }
        if args.stress {
            config.apply_stress();
        }

        config
    }

    /// Sessions that may be open at once.
    pub(crate) fn connection_limit(&self) -> usize {
        if self.single {
            1
        } else {
            self.pool_size as usize
        }
    }

    fn apply_quick(&mut self) {
        self.preset = Some("quick".to_string());
        self.iterations = Some(2_000);
        self.duration_ms = None;
        self.pool_size = 2;
        self.max_concurrent_queries = 3;
        self.max_batch = 4;
        self.failure_rate = 0.05;
        self.disconnect_rate = 0.02;
        self.sleep_rate = 0.05;
    }

    fn apply_stress(&mut self) {
        self.preset = Some("stress".to_string());
        self.iterations = Some(50_000);
        self.duration_ms = None;
        self.pool_size = 16;
        self.max_concurrent_queries = 24;
        self.max_batch = 32;
        self.failure_rate = 0.08;
        self.disconnect_rate = 0.04;
        self.sleep_rate = 0.08;
    }
}

fn clamp_rate(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

fn random_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    now.as_secs() ^ u64::from(now.subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_rate_limits_bounds() {
        assert_eq!(clamp_rate(-1.0), 0.0);
        assert_eq!(clamp_rate(2.0), 1.0);
        assert_eq!(clamp_rate(0.5), 0.5);
        assert_eq!(clamp_rate(f64::NAN), 0.0);
    }

    #[test]
    fn single_mode_allows_one_session() {
        let args = Args::parse_from(["simulator", "--single", "--pool-size", "9"]);
        let config = SimConfig::from_args(args);
        assert_eq!(config.connection_limit(), 1);
    }
}

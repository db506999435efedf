use crate::config::Config;
use log::LevelFilter;
use simplelog::{self, ConfigBuilder, SharedLogger, TermLogger};

/// Dependencies whose logs are suppressed unless running at Trace.
const FILTERED_MODULES: &[&str] = &["tower", "hyper", "h2", "axum", "redis"];

pub struct Logger {}

impl Logger {
    /// Installs the global terminal logger at the level chosen in `config`.
    ///
    /// Fails if a global logger was already installed, which happens when tests in the
    /// same process initialize logging more than once.
    pub fn init_logger(config: &Config) -> Result<(), log::SetLoggerError> {
        simplelog::CombinedLogger::init(vec![Self::term_logger(config.log_level_filter)])
    }

    fn term_logger(level: LevelFilter) -> Box<dyn SharedLogger> {
        TermLogger::new(
            Self::convert_level_filter(level),
            Self::build_log_config(Self::should_filter_dependencies(level)),
            simplelog::TerminalMode::Mixed,
            simplelog::ColorChoice::Auto,
        )
    }

    fn convert_level_filter(level: LevelFilter) -> simplelog::LevelFilter {
        match level {
            LevelFilter::Off => simplelog::LevelFilter::Off,
            LevelFilter::Error => simplelog::LevelFilter::Error,
            LevelFilter::Warn => simplelog::LevelFilter::Warn,
            LevelFilter::Info => simplelog::LevelFilter::Info,
            LevelFilter::Debug => simplelog::LevelFilter::Debug,
            LevelFilter::Trace => simplelog::LevelFilter::Trace,
        }
    }

    /// Trace shows everything, every other level hides dependency noise.
    fn should_filter_dependencies(level: LevelFilter) -> bool {
        level != LevelFilter::Trace
    }

    fn build_log_config(apply_filters: bool) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder
            .set_time_format_rfc3339()
            .set_target_level(simplelog::LevelFilter::Error)
            .set_thread_level(simplelog::LevelFilter::Off);

        if apply_filters {
            for module in FILTERED_MODULES {
                builder.add_filter_ignore_str(module);
            }
        }

        builder.build()
    }
}

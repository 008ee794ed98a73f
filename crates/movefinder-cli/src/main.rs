// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, anyhow};
use config::Config;
use movefinder_app::{ClientMetadata, FormSession, LogAnalytics, MountContext};
use movefinder_db::Store;
use runtime::{SessionRuntime, Submitter};
use std::env;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "MOVEFINDER_LOG";

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `movefinder --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let db_path = if options.demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    init_tracing(&config, options.check_only)?;
    // resolve the local offset before any worker thread exists
    let clock = config.clock()?;

    let store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or {}",
            db_path.display(),
            movefinder_db::DB_PATH_ENV
        )
    })?;
    store.bootstrap()?;

    let submitter = if options.demo {
        Submitter::Demo
    } else {
        let client = movefinder_client::Client::new(
            config.endpoint(),
            config.timeout()?,
            config.retry_policy()?,
        )
        .with_context(|| {
            format!(
                "invalid [submission] config in {}; fix endpoint/timeout/max_attempts values",
                options.config_path.display()
            )
        })?;
        Submitter::Http(client)
    };
    if options.check_only {
        tracing::info!(
            db_path = %db_path.display(),
            endpoint = config.endpoint(),
            offset = %clock.offset(),
            "startup checks passed"
        );
        return Ok(());
    }

    let context = MountContext {
        client: ClientMetadata {
            user_agent: movefinder_client::USER_AGENT.to_owned(),
            referrer: options.referrer.clone(),
        },
        referrer: options.referrer,
        landing_url: options.landing_url,
    };
    let (session, effects) = FormSession::mount(
        config.form_definition(),
        context,
        &store,
        LogAnalytics,
        clock,
    );
    let mut runtime = SessionRuntime::new(session, submitter);
    movefinder_tui::run_app(&mut runtime, effects)
}

/// Logs go to the configured file, or stderr for `--check`. Without
/// either, no subscriber is installed so the terminal UI stays clean.
fn init_tracing(config: &Config, to_stderr: bool) -> Result<()> {
    let log_file = config.log_file();
    if !to_stderr && log_file.is_none() {
        return Ok(());
    }

    let filter = match env::var(LOG_ENV) {
        Ok(raw) => EnvFilter::try_new(&raw).with_context(|| format!("parse {LOG_ENV}={raw:?}"))?,
        Err(_) => EnvFilter::try_new(config.log_filter())
            .with_context(|| format!("parse logging.filter {:?}", config.log_filter()))?,
    };

    let installed = match log_file {
        Some(path) if !to_stderr => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init(),
    };
    installed.map_err(|error| anyhow!("install log subscriber: {error}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
    referrer: Option<String>,
    landing_url: Option<String>,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
        referrer: None,
        landing_url: None,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--referrer" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--referrer requires a URL"))?;
                options.referrer = Some(value.as_ref().to_owned());
            }
            "--landing-url" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow!("--landing-url requires a URL with optional utm_* parameters")
                })?;
                options.landing_url = Some(value.as_ref().to_owned());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-path" => {
                options.print_db_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("movefinder: Austin Move Finder quote form");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   In-memory drafts, submissions answered locally");
    println!("  --check                  Validate config + DB + endpoint, logging to stderr");
    println!("  --referrer <url>         Referring page recorded with the lead");
    println!("  --landing-url <url>      Landing page; utm_* parameters become tracking");
    println!("  --help                   Show this help");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, parse_cli_args};
    use anyhow::Result;
    use std::path::PathBuf;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/movefinder-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                print_config_path: false,
                print_db_path: false,
                demo: false,
                print_example: false,
                check_only: false,
                show_help: false,
                referrer: None,
                landing_url: None,
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_config_path_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["--config", "/custom/config.toml"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/custom/config.toml"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_missing_values() {
        let error = parse_cli_args(vec!["--config"], default_options_path())
            .expect_err("missing config value should fail");
        assert!(error.to_string().contains("--config requires a file path"));

        let error = parse_cli_args(vec!["--landing-url"], default_options_path())
            .expect_err("missing landing url should fail");
        assert!(error.to_string().contains("--landing-url requires"));
    }

    #[test]
    fn parse_cli_args_errors_for_unknown_argument() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown arg should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));
    }

    #[test]
    fn parse_cli_args_captures_page_context() -> Result<()> {
        let options = parse_cli_args(
            vec![
                "--referrer",
                "https://google.com/",
                "--landing-url",
                "https://austinmovefinder.com/?utm_source=google",
            ],
            default_options_path(),
        )?;
        assert_eq!(options.referrer.as_deref(), Some("https://google.com/"));
        assert_eq!(
            options.landing_url.as_deref(),
            Some("https://austinmovefinder.com/?utm_source=google")
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_print_demo_and_check_flags() -> Result<()> {
        let options = parse_cli_args(
            vec!["--print-example-config", "--check", "--demo", "--print-path"],
            default_options_path(),
        )?;
        assert!(!options.print_config_path);
        assert!(options.print_db_path);
        assert!(options.demo);
        assert!(options.print_example);
        assert!(options.check_only);
        assert!(!options.show_help);
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_help_flag_for_long_and_short_variants() -> Result<()> {
        let long = parse_cli_args(vec!["--help"], default_options_path())?;
        assert!(long.show_help);

        let short = parse_cli_args(vec!["-h"], default_options_path())?;
        assert!(short.show_help);
        Ok(())
    }
}

use clap::Parser;
use config_file::FromConfigFile;
use std::io::{BufRead, IsTerminal};

pub use crate::args::Args;
pub use crate::config::{Config, DEFAULT_STORAGE_KEY};
pub use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Parses the command line, reads piped input and merges the config file.
pub fn build_args() -> Result<Args> {
    let args = parse_prompt(Args::parse())?;
    let (args, config) = build_config(args)?;

    merge_args_and_config(args, config)
}

/// Reads the configuration file. If it or the config directory doesn't exist, they'll be created.
pub fn build_config(mut args: Args) -> Result<(Args, Config)> {
    let home = std::env::var("HOME")?;
    args.config_dir = args.config_dir.replace('~', &home);

    if !std::path::Path::new(&args.config_dir).exists() {
        std::fs::create_dir_all(&args.config_dir)?;
    }

    let config_file = match args.config_file.take() {
        Some(config_file) => config_file.replace('~', &home),
        None => args.config_dir.clone() + "/config.toml",
    };

    log::info!("config_dir: {}", &args.config_dir);
    log::info!("config_file: {}", &config_file);

    let config = if !std::path::Path::new(&config_file).exists() {
        let config = Config::new();
        std::fs::write(&config_file, toml::to_string(&config)?)?;

        config
    } else {
        Config::from_config_file(&config_file)?
    };

    args.config_file = Some(config_file);

    Ok((args, config))
}

/// Uses piped `stdin` as the prompt when no prompt argument was given.
///
/// ```bash
/// echo -n "What did you present at PLDI?" | folio-chat
/// ```
///
/// With a prompt argument, piped input is appended after a blank line so a
/// file can be asked about:
///
/// ```bash
/// cat abstract.txt | folio-chat "Summarize this abstract"
/// ```
pub fn parse_prompt(mut args: Args) -> Result<Args> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(args);
    }

    let piped = stdin
        .lock()
        .lines()
        .collect::<std::result::Result<Vec<String>, std::io::Error>>()?
        .join("\n");

    if piped.trim().is_empty() {
        return Ok(args);
    }

    args.prompt = Some(match args.prompt.take() {
        Some(prompt) => format!("{prompt}\n\n{piped}"),
        None => piped,
    });

    Ok(args)
}

/// Fills the options the command line left unset, in this order:
///
/// 1. CLI options/Environment variables.
/// 2. Config file options.
/// 3. Built-in defaults.
pub fn merge_args_and_config(mut args: Args, config: Config) -> Result<Args> {
    if args.endpoint.is_none() {
        args.endpoint = config.endpoint;
    }
    if args.system.is_none() {
        args.system = config.system;
    }
    if args.greeting.is_none() {
        args.greeting = config.greeting;
    }
    if args.storage_key.is_none() {
        args.storage_key = config.storage_key;
    }
    if args.quota.is_none() {
        args.quota = config.quota;
    }
    if args.timeout.is_none() {
        args.timeout = config.timeout;
    }
    if args.quiet.is_none() {
        args.quiet = config.quiet;
    }

    if args.storage_key.is_none() {
        args.storage_key = Some(DEFAULT_STORAGE_KEY.to_string());
    }

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_only_gain_the_default_key_on_empty_config(
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let args = Args::default();
        let config: Config = Config::default();

        let mut expected = args.clone();
        expected.storage_key = Some(DEFAULT_STORAGE_KEY.to_string());

        let actual = merge_args_and_config(args, config)?;

        assert_eq!(
            expected, actual,
            "merge_args_and_config changed more than the storage key"
        );

        Ok(())
    }

    #[test]
    fn test_args_override_config() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut args = Args::default();
        args.endpoint = Some("http://localhost:8787/api/chat".to_string());
        args.system = Some("args system".to_string());
        args.greeting = Some("args greeting".to_string());
        args.storage_key = Some("args-key".to_string());
        args.quota = Some(1024);
        args.timeout = Some(5);
        args.quiet = Some(true);

        let expected = args.clone();

        let mut config: Config = Config::default();
        config.endpoint = Some("https://example.org/api/chat".to_string());
        config.system = Some("config system".to_string());
        config.greeting = Some("config greeting".to_string());
        config.storage_key = Some("config-key".to_string());
        config.quota = Some(4096);
        config.timeout = Some(30);
        config.quiet = Some(false);

        let actual = merge_args_and_config(args, config)?;

        assert_eq!(expected, actual, "merge_args_and_config overrode the args");

        Ok(())
    }

    #[test]
    fn test_config_fills_missing_args() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let args = Args::default();

        let mut config: Config = Config::default();
        config.endpoint = Some("https://example.org/api/chat".to_string());
        config.system = Some("config system".to_string());
        config.timeout = Some(30);

        let actual = merge_args_and_config(args, config)?;

        assert_eq!(
            actual.endpoint.as_deref(),
            Some("https://example.org/api/chat")
        );
        assert_eq!(actual.system.as_deref(), Some("config system"));
        assert_eq!(actual.timeout, Some(30));
        assert_eq!(actual.storage_key.as_deref(), Some(DEFAULT_STORAGE_KEY));

        Ok(())
    }

    #[test]
    fn test_missing_config_file_is_created() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempfile::tempdir()?;
        let args = Args {
            config_dir: dir.path().join("nested").to_string_lossy().into_owned(),
            ..Default::default()
        };

        let (args, config) = build_config(args)?;

        let config_file = args.config_file.unwrap_or_default();
        assert!(std::path::Path::new(&config_file).exists());
        assert_eq!(config.storage_key.as_deref(), Some(DEFAULT_STORAGE_KEY));

        Ok(())
    }
}

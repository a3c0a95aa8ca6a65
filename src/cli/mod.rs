mod config;
mod handlers;

use crate::error::Result;
use crate::transformer::DEFAULT_DELIMITER;
use crate::{Compiler, CompilerConfig, NativeFileSystem};
use clap::{Arg, ArgAction, Command};
use std::rc::Rc;

pub struct Cli {
    config: config::ConfigFile,
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}

impl Cli {
    pub fn new() -> Self {
        Self {
            config: config::ConfigFile::default(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let matches = self.build_cli().get_matches();

        if let Some(config_path) = matches.get_one::<String>("config") {
            self.config = config::load(config_path)?;
        }

        self.setup_logging(matches.get_count("verbose"));

        match matches.subcommand() {
            Some(("build", sub_matches)) => handlers::handle_build_command(self, sub_matches),
            Some(("bundle", sub_matches)) => handlers::handle_bundle_command(self, sub_matches),
            Some(("check", sub_matches)) => handlers::handle_check_command(self, sub_matches),
            _ => {
                println!("No subcommand specified. Use --help for usage information.");
                Ok(())
            }
        }
    }

    fn build_cli(&self) -> Command {
        Command::new(crate::NAME)
            .version(crate::VERSION)
            .about(crate::DESCRIPTION)
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path (.toml or .json)")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .help("Increase verbosity (can be used multiple times)")
                    .action(ArgAction::Count),
            )
            .subcommand(
                Command::new("build")
                    .about("Compile one stylesheet to scoped CSS")
                    .arg(
                        Arg::new("input")
                            .help("Input stylesheet")
                            .required(true)
                            .index(1),
                    )
                    .arg(
                        Arg::new("output")
                            .short('o')
                            .long("output")
                            .value_name("FILE")
                            .help("Output CSS file"),
                    )
                    .arg(
                        Arg::new("exports")
                            .long("exports")
                            .value_name("FILE")
                            .help("Write the name-export map as JSON"),
                    ),
            )
            .subcommand(
                Command::new("bundle")
                    .about("Compose entry stylesheets into one cascade-correct document")
                    .arg(
                        Arg::new("entries")
                            .help("Entry stylesheets in cascade order")
                            .required(true)
                            .num_args(1..),
                    )
                    .arg(
                        Arg::new("output")
                            .short('o')
                            .long("output")
                            .value_name("FILE")
                            .help("Output CSS file"),
                    ),
            )
            .subcommand(
                Command::new("check")
                    .about("Parse and process without emitting output, reporting diagnostics")
                    .arg(
                        Arg::new("input")
                            .help("Stylesheet or directory")
                            .required(true)
                            .index(1),
                    )
                    .arg(
                        Arg::new("recursive")
                            .short('r')
                            .long("recursive")
                            .help("Recurse into subdirectories")
                            .action(ArgAction::SetTrue),
                    ),
            )
    }

    fn setup_logging(&self, verbose_count: u8) {
        let log_level = match verbose_count {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        env_logger::Builder::from_default_env()
            .filter_level(log_level)
            .format_timestamp_secs()
            .init();
    }

    pub fn delimiter(&self) -> &str {
        self.config.delimiter.as_deref().unwrap_or(DEFAULT_DELIMITER)
    }

    pub fn output_directory(&self) -> Option<&str> {
        self.config.output_directory.as_deref()
    }

    /// A fresh session over the native file system with the configured
    /// delimiter.
    pub fn session(&self) -> Compiler {
        Compiler::new(
            CompilerConfig::new(Rc::new(NativeFileSystem)).with_delimiter(self.delimiter()),
        )
    }
}

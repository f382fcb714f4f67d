use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::{Styles, styling::{AnsiColor, Effects}}, crate_description, crate_name, crate_version};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = crate_name!(),
    version = crate_version!(),
    about = crate_description!(),
    styles = Styles::styled()
        .header(AnsiColor::BrightGreen.on_default() | Effects::BOLD | Effects::UNDERLINE)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default()))]
pub struct Cli {
    #[command(flatten)]
    pub verbosity: Verbosity,

    #[command(subcommand)]
    pub command: Option<TopLevel>,
}

#[derive(Args)]
pub struct Verbosity {
    /// More log output (repeatable)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Verbosity {
    pub fn level(&self) -> log::LevelFilter {
        if self.quiet {
            return log::LevelFilter::Error;
        }
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand)]
pub enum TopLevel {
    /// Disassembles a bytecode file into a HASM project directory
    Disasm {
        /// Path to the bytecode file
        input: PathBuf,

        /// Project directory to create
        output: PathBuf,

        /// Replace an existing output directory
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Fail on functions that cannot be decoded instead of keeping their raw bytes
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
    /// Assembles a HASM project directory back into a bytecode file
    Asm {
        /// Project directory
        project: PathBuf,

        /// Path of the bytecode file to write
        output: PathBuf,

        /// Replace an existing output file
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Prints a summary of a bytecode file
    Info {
        /// Path to the bytecode file
        input: PathBuf,
    },
    /// Generate shell completion
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

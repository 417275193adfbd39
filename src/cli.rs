use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pointpaste", about = "Paste text into the control under the pointer")]
pub struct Cli {
    /// JSON settings file (defaults apply when omitted)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Install the keyboard hook and relay hotkey captures into pastes
    Listen,

    /// Paste text once
    Paste {
        /// Screen x coordinate (defaults to the pointer position)
        #[arg(
            long,
            allow_negative_numbers = true,
            requires = "y",
            conflicts_with = "foreground"
        )]
        x: Option<i32>,

        /// Screen y coordinate
        #[arg(
            long,
            allow_negative_numbers = true,
            requires = "x",
            conflicts_with = "foreground"
        )]
        y: Option<i32>,

        /// Paste into the foreground window instead of resolving a point
        #[arg(long)]
        foreground: bool,

        /// Read the text from standard input
        #[arg(long, conflicts_with = "text")]
        stdin: bool,

        /// Text to paste
        #[arg(required_unless_present = "stdin")]
        text: Option<String>,
    },

    /// Show the window target and delivery category at a point
    Probe {
        #[arg(allow_negative_numbers = true)]
        x: i32,
        #[arg(allow_negative_numbers = true)]
        y: i32,
    },

    /// Classify a class name and process name with the configured rules
    Classify {
        #[arg(long, default_value = "")]
        class: String,

        #[arg(long, default_value = "")]
        process: String,
    },

    /// Print the effective settings as JSON
    Config,
}

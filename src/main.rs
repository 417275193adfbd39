mod cli;

use std::io::Read;

use clap::Parser;
use cli::{Cli, Command};
use pointpaste::config::Settings;
use pointpaste::daemon::{self, DaemonError};
use pointpaste::platform::ScreenPoint;
use pointpaste::transaction::PasteOutcome;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => fail("config", e),
    };

    match cli.command {
        Command::Listen => {
            if let Err(e) = daemon::run(&settings).await {
                fail("listen", e);
            }
        }
        Command::Paste {
            x,
            y,
            foreground,
            stdin,
            text,
        } => {
            let text = if stdin {
                let mut buf = String::new();
                if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
                    fail("paste", e);
                }
                buf
            } else {
                text.unwrap_or_default()
            };
            let point = x.zip(y).map(|(x, y)| ScreenPoint::new(x, y));
            match paste(&settings, point, foreground, &text) {
                Ok(outcome) => match outcome.result {
                    Ok(delivery) => println!("{}: {delivery}", outcome.id),
                    Err(e) => fail("paste", format!("{}: {e}", outcome.id)),
                },
                Err(e) => fail("paste", e),
            }
        }
        Command::Probe { x, y } => match daemon::native_engine(&settings) {
            Ok(engine) => {
                let (target, category) = engine.resolver().probe(ScreenPoint::new(x, y));
                println!("top_level:   {}", target.top_level);
                println!("point:       {}", target.point);
                println!("deep_child:  {}", target.deep_child);
                println!("class:       {}", target.window_class_name);
                println!("top_class:   {}", target.top_class_name);
                println!("process:     {}", target.owner_process_name);
                println!("category:    {category}");
            }
            Err(e) => fail("probe", e),
        },
        Command::Classify { class, process } => match settings.classification_rules() {
            Ok(rules) => println!("{}", rules.classify(&class, &process)),
            Err(e) => fail("classify", e),
        },
        Command::Config => match settings.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => fail("config", e),
        },
    }
}

fn paste(
    settings: &Settings,
    point: Option<ScreenPoint>,
    foreground: bool,
    text: &str,
) -> Result<PasteOutcome, DaemonError> {
    let engine = daemon::native_engine(settings)?;
    Ok(match point {
        _ if foreground => engine.paste_to_foreground(text),
        Some(point) => engine.paste_at_point(point, text),
        None => engine.paste_at_cursor(text),
    })
}

fn fail(command: &str, error: impl std::fmt::Display) -> ! {
    tracing::error!(error = %error, "{command} failed");
    eprintln!("pointpaste {command}: {error}");
    std::process::exit(1);
}

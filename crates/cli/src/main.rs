use clap::{Parser, Subcommand};
use medchat::chat::ChatManager;
use medchat::{markup, quick_menu};

#[derive(Parser)]
#[command(name = "medchat")]
#[command(about = "medchat CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and default files (config, primer).
    Init {
        /// Config file path (default: MEDCHAT_CONFIG_PATH or ~/.medchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// List the quick-menu questions.
    Menu,

    /// Chat with the assistant (interactive). Numbers pick a quick-menu question while it is shown;
    /// the panel starts open when chat.openOnStart is set, otherwise /open or the first message opens it.
    Chat {
        /// Config file path (default: MEDCHAT_CONFIG_PATH or ~/.medchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("medchat {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Menu) => print_menu(),
        Some(Commands::Chat { config }) => {
            if let Err(e) = run_chat(config).await {
                log::error!("chat failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(medchat::config::default_config_path);
    let dir = medchat::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

/// Numbered list, 1-based across all categories.
fn print_menu() {
    let mut n = 1;
    for category in quick_menu::catalog() {
        println!("{} {}", category.icon, category.label);
        for question in category.questions {
            println!("  {:>2}. {}", n, question);
            n += 1;
        }
    }
}

/// Question for a 1-based menu number.
fn menu_choice(input: &str) -> Option<&'static str> {
    let n: usize = input.parse().ok()?;
    quick_menu::all_questions().nth(n.checked_sub(1)?)
}

async fn run_chat(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let (config, path) = medchat::config::load_config(config_path)?;
    let manager = ChatManager::from_config(&config, &path)?;
    if !manager.panel_open().await {
        println!("chat panel is closed; type /open or a message to start");
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut menu_printed = false;

    loop {
        let panel_open = manager.panel_open().await;
        if panel_open && !menu_printed && manager.show_quick_menu().await {
            print_menu();
            menu_printed = true;
        }
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }
        if input.eq_ignore_ascii_case("/open") {
            manager.open_panel().await;
            continue;
        }
        if input.eq_ignore_ascii_case("/close") {
            manager.close_panel().await;
            menu_printed = false;
            continue;
        }

        manager.open_panel().await;
        let menu_open = panel_open && manager.show_quick_menu().await;
        let submitted = match menu_choice(input) {
            Some(question) if menu_open => {
                println!("> {}", question);
                manager.select_quick_menu_option(question).await
            }
            _ => manager.submit_user_message(input).await,
        };
        match submitted {
            Ok(flight) => flight.wait().await,
            Err(e) => {
                eprintln!("chat error: {}", e);
                continue;
            }
        }

        if let Some(turn) = manager.turns().await.last() {
            let text = markup::strip_tags(&turn.text);
            if turn.is_error {
                eprintln!("! {}", text);
            } else {
                println!("< {}", text);
            }
        }
    }

    manager.close_panel().await;
    Ok(())
}

use clap::{Parser, Subcommand};
use linebridge::channels::TextPayload;
use linebridge::config::{self, BackendSettings, RelaySettings};
use linebridge::llm::{ChatBackend, ChatCompletionClient};
use linebridge::relay::{build_request, reply_text, RequestInput};

#[derive(Parser)]
#[command(name = "linebridge")]
#[command(about = "LINE webhook relay to a chat-completion backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: LINEBRIDGE_CONFIG_PATH or ~/.linebridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the webhook gateway. Secrets come from LINE_CHANNEL_SECRET, LINE_CHANNEL_ACCESS_TOKEN and BACKEND_API_TOKEN (or the config file).
    Serve {
        /// Config file path (default: LINEBRIDGE_CONFIG_PATH or ~/.linebridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 5000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Send one text message to the backend and print the reply the user would get.
    Ask {
        /// Config file path (default: LINEBRIDGE_CONFIG_PATH or ~/.linebridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Message text
        text: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = match cli.command {
        Some(Commands::Serve { .. }) => "info",
        _ => "warn",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Some(Commands::Version) => {
            println!("linebridge {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("serve failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Ask { config, text }) => {
            if let Err(e) = run_ask(config, text).await {
                log::error!("ask failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(config::default_config_path);
    let dir = linebridge::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!("using config {}", path.display());
    let settings = RelaySettings::from_config(&config)?;
    linebridge::gateway::run_gateway(config, settings).await
}

async fn run_ask(config_path: Option<std::path::PathBuf>, text: String) -> anyhow::Result<()> {
    let (config, _) = config::load_config(config_path)?;
    let token = config::resolve_backend_token(&config).ok_or_else(|| {
        anyhow::anyhow!("backend API token not configured (set BACKEND_API_TOKEN or backend.apiToken)")
    })?;
    let settings = BackendSettings::resolve(&config, token)?;
    let client = ChatCompletionClient::new(&settings)?;
    let payload = TextPayload { text };
    let request = build_request(RequestInput::Text(&payload), &settings.model);
    let result = client.invoke(&request).await;
    println!("{}", reply_text(&result));
    Ok(())
}

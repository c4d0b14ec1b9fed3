use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use brandpage_contracts::events::RelayEventLog;
use brandpage_contracts::generation::build_prompt;
use brandpage_contracts::profile::{read_logo, BrandProfile};
use brandpage_engine::{
    enhance_content, ChatCompletionClient, ChatCompletionConfig, ConfigError, ConnectOptions,
    RelayClient, RelayContext, RelayServer, ServerConfig,
};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "brandpage", version, about = "Brand landing page generator relay")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the WebSocket relay.
    Serve(ServeArgs),
    /// Submit a profile to a running relay and write the page it returns.
    Generate(GenerateArgs),
    /// Print the prompt a profile would produce, without any network call.
    Prompt(PromptArgs),
    /// Ask a running relay to polish one profile field.
    Enhance(EnhanceArgs),
}

#[derive(Debug, Parser)]
struct ServeArgs {
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    api_base: Option<String>,
    /// Browser origin allowed to open the socket; `*` accepts any.
    #[arg(long)]
    allowed_origin: Option<String>,
}

#[derive(Debug, Args)]
struct ProfileArgs {
    /// JSON file holding a profile; flags below override its fields.
    #[arg(long)]
    profile: Option<PathBuf>,
    #[arg(long)]
    company_name: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    primary_color: Option<String>,
    #[arg(long)]
    industry: Option<String>,
    #[arg(long)]
    target_audience: Option<String>,
    #[arg(long)]
    website: Option<String>,
    #[arg(long)]
    twitter: Option<String>,
    #[arg(long)]
    linkedin: Option<String>,
    #[arg(long)]
    instagram: Option<String>,
    #[arg(long)]
    logo: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[command(flatten)]
    profile: ProfileArgs,
    #[arg(long, default_value = "http://localhost:3000")]
    server: String,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    prompt_log: Option<PathBuf>,
    /// Seconds to wait for the generated page.
    #[arg(long, default_value_t = 120)]
    wait: u64,
}

#[derive(Debug, Parser)]
struct PromptArgs {
    #[command(flatten)]
    profile: ProfileArgs,
}

#[derive(Debug, Parser)]
struct EnhanceArgs {
    #[arg(long, default_value = "http://localhost:3000")]
    server: String,
    #[arg(long, default_value = "description")]
    field: String,
    #[arg(long)]
    text: String,
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("brandpage error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_logging();
    match cli.command {
        Command::Serve(args) => run_serve(args),
        Command::Generate(args) => run_generate(args),
        Command::Prompt(args) => {
            let profile = load_profile(&args.profile)?;
            println!("{}", build_prompt(&profile));
            Ok(0)
        }
        Command::Enhance(args) => {
            let enhanced = enhance_content(
                &args.server,
                &args.text,
                &args.field,
                Duration::from_secs(args.timeout),
            );
            println!("{enhanced}");
            Ok(0)
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_serve(args: ServeArgs) -> Result<i32> {
    serve_with_lookup(args, |key| std::env::var(key).ok())
}

/// Configuration problems are reported and turn into exit code 1 before the
/// listener is bound.
fn serve_with_lookup(args: ServeArgs, lookup: impl Fn(&str) -> Option<String>) -> Result<i32> {
    let (generation, server) = match resolve_serve_config(&args, lookup) {
        Ok(resolved) => resolved,
        Err(err) => {
            error!(error = %err, "relay configuration rejected");
            return Ok(1);
        }
    };

    let model = generation.model.clone();
    let client = ChatCompletionClient::new(generation)?;
    let mut context =
        RelayContext::new(Arc::new(client)).with_allowed_origin(server.allowed_origin.clone());
    if let Some(path) = &server.events_path {
        let server_id = uuid::Uuid::new_v4().to_string();
        context = context.with_events(RelayEventLog::open(path, server_id)?);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(async move {
        let relay = RelayServer::bind(server.listen_addr(), context).await?;
        info!(
            addr = %relay.local_addr()?,
            model = %model,
            allowed_origin = server.allowed_origin.as_deref().unwrap_or("*"),
            "relay listening"
        );
        relay.serve().await
    })?;
    Ok(0)
}

/// Environment first, then command-line overrides.
fn resolve_serve_config(
    args: &ServeArgs,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(ChatCompletionConfig, ServerConfig), ConfigError> {
    let mut generation = ChatCompletionConfig::from_lookup(&lookup)?;
    let mut server = ServerConfig::from_lookup(&lookup)?;
    if let Some(model) = &args.model {
        generation.model = model.clone();
    }
    if let Some(api_base) = &args.api_base {
        generation.api_base = api_base.clone();
    }
    if let Some(host) = &args.host {
        server.host = host.clone();
    }
    if let Some(port) = args.port {
        server.port = port;
    }
    if let Some(origin) = &args.allowed_origin {
        server.allowed_origin = if origin.trim() == "*" {
            None
        } else {
            Some(origin.clone())
        };
    }
    server.events_path = args.events.clone();
    Ok((generation, server))
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let profile = load_profile(&args.profile)?;
    profile.validate()?;

    let mut client = RelayClient::connect(&args.server, &ConnectOptions::default())?;
    let result = client.generate(&profile, Duration::from_secs(args.wait));
    if let Some(path) = &args.prompt_log {
        client.prompt_log().append_jsonl(path)?;
    }
    let result = result?;
    client.close()?;

    if let Some(parent) = args.out.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating {}", parent.display()))?;
    }
    fs::write(&args.out, &result.html)
        .with_context(|| format!("failed writing {}", args.out.display()))?;
    if result.is_failure() {
        error!(out = %args.out.display(), "relay reported a generation failure");
        return Ok(1);
    }
    info!(out = %args.out.display(), bytes = result.html.len(), "page written");
    Ok(0)
}

fn load_profile(args: &ProfileArgs) -> Result<BrandProfile> {
    let mut profile = match &args.profile {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed reading {}", path.display()))?;
            let value = serde_json::from_str(&raw)
                .with_context(|| format!("invalid profile JSON in {}", path.display()))?;
            BrandProfile::from_value(value)
                .with_context(|| format!("invalid profile in {}", path.display()))?
        }
        None => BrandProfile::default(),
    };
    if let Some(name) = &args.company_name {
        profile.company_name = name.clone();
    }
    if let Some(description) = &args.description {
        profile.description = description.clone();
    }
    if let Some(color) = &args.primary_color {
        profile.primary_color = color.clone();
    }
    if let Some(industry) = &args.industry {
        profile.industry = Some(industry.clone());
    }
    if let Some(audience) = &args.target_audience {
        profile.target_audience = Some(audience.clone());
    }
    for (platform, url) in [
        ("website", &args.website),
        ("twitter", &args.twitter),
        ("linkedin", &args.linkedin),
        ("instagram", &args.instagram),
    ] {
        if let Some(url) = url {
            profile.set_social_link(platform, url.as_str())?;
        }
    }
    if let Some(path) = &args.logo {
        profile.logo_url = read_logo(path)?;
    }
    Ok(profile)
}

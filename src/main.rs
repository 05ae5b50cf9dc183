use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use anisource::catalog::MediaEntry;
use anisource::config::Settings;
use anisource::player::{choose_source, launch_player};
use anisource::{
    CanonicalTitles, EpisodeResolver, ProviderKind, Resolution, ResolutionRequest, ResolveError,
    generate_variants,
};

#[derive(Debug, Parser)]
#[command(
    name = "anisource",
    about = "Find playable streams for an anime episode.",
    version
)]
struct Cli {
    /// Romaji title; words are joined with spaces.
    #[arg(value_name = "TITLE")]
    title: Vec<String>,

    #[arg(long, value_name = "TITLE")]
    english: Option<String>,

    #[arg(long = "synonym", value_name = "TITLE")]
    synonyms: Vec<String>,

    /// Catalog media JSON to take titles and episode counts from.
    #[arg(long, value_name = "FILE", conflicts_with_all = ["title", "english", "synonyms"])]
    media: Option<PathBuf>,

    #[arg(short = 'e', long, default_value_t = 1, allow_negative_numbers = true)]
    episode: i64,

    #[arg(long)]
    dub: bool,

    /// Search for the subbed release even if the config asks for dubs.
    #[arg(long, conflicts_with = "dub")]
    sub: bool,

    /// Search result to use when several shows share a title.
    #[arg(long, value_name = "N")]
    index: Option<usize>,

    #[arg(long, value_enum)]
    provider: Option<ProviderKind>,

    /// Per provider call, in seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long)]
    json: bool,

    /// Play the first source.
    #[arg(long)]
    play: bool,

    /// Pick the source to play from a menu.
    #[arg(long, requires = "play")]
    pick: bool,

    /// Print the generated title variants and exit.
    #[arg(long)]
    variants: bool,

    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run().await;
    if let Err(err) = &result {
        eprintln!("error: {err:?}");
    }
    result
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = apply_overrides(Settings::load(cli.config.as_deref())?, &cli);

    if cli.print_config {
        print!("{}", settings.to_toml()?);
        return Ok(());
    }

    let media = match &cli.media {
        Some(path) => Some(MediaEntry::load(path)?),
        None => None,
    };
    let titles = match &media {
        Some(entry) => entry.canonical_titles(),
        None => CanonicalTitles {
            romaji: Some(cli.title.join(" ")).filter(|t| !t.trim().is_empty()),
            english: cli.english.clone(),
            synonyms: cli.synonyms.clone(),
        },
    };
    let variants = generate_variants(&titles);

    if cli.variants {
        for variant in &variants {
            println!("{variant}");
        }
        return Ok(());
    }
    if variants.is_empty() {
        println!("No title provided. Use `anisource <title>` or `anisource --media <file>`.");
        return Ok(());
    }

    let display_title = media
        .as_ref()
        .map(MediaEntry::display_title)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| variants[0].clone());
    if let Some(available) = media.as_ref().and_then(MediaEntry::available_episodes) {
        if cli.episode > i64::from(available) {
            println!(
                "Warning: {} has only {} episode(s) out so far.",
                display_title, available
            );
        }
    }

    let provider = settings.build_provider()?;
    let resolver = EpisodeResolver::new(provider);
    let request = ResolutionRequest::new(variants, cli.episode, settings.dubbed);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    println!(
        "Looking for {} episode {} ({}) on {}...",
        display_title,
        cli.episode,
        if settings.dubbed { "Dub" } else { "Sub" },
        settings.provider.as_str()
    );
    let sources = match resolver
        .resolve_with_cancel(&request, &settings.resolve_options(), &cancel)
        .await
    {
        Ok(Resolution::Found(sources)) => sources,
        Ok(Resolution::NotFound) => {
            println!(
                "No stream found for {} episode {}.",
                display_title, cli.episode
            );
            return Ok(());
        }
        Err(ResolveError::Cancelled) => {
            println!("Cancelled.");
            return Ok(());
        }
        Err(err) => bail!(err),
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&sources)?);
    } else {
        for (idx, source) in sources.iter().enumerate() {
            println!("{:>2}. {} {}", idx + 1, source.label(), source.url);
        }
    }

    if cli.play {
        let chosen = if cli.pick {
            choose_source(sources)?
        } else {
            sources.into_iter().next()
        };
        let Some(source) = chosen else {
            println!("Stream selection cancelled.");
            return Ok(());
        };
        // Validated by the resolver, so the episode fits.
        let episode = u32::try_from(cli.episode)?;
        launch_player(&settings.player, &source, &display_title, episode).await?;
    }
    Ok(())
}

fn apply_overrides(mut settings: Settings, cli: &Cli) -> Settings {
    if cli.dub {
        settings.dubbed = true;
    } else if cli.sub {
        settings.dubbed = false;
    }
    if let Some(index) = cli.index {
        settings.index = index;
    }
    if let Some(provider) = cli.provider {
        settings.provider = provider;
    }
    if let Some(timeout) = cli.timeout {
        settings.timeout_secs = timeout;
    }
    settings
}

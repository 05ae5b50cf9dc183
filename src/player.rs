use anyhow::{Context, Result, anyhow, bail};
use dialoguer::{Select, theme::ColorfulTheme};
use tokio::process::Command;

use crate::types::VideoSource;

/// Let the user pick one of several sources. `None` when cancelled.
pub fn choose_source(mut sources: Vec<VideoSource>) -> Result<Option<VideoSource>> {
    if sources.len() <= 1 {
        return Ok(sources.pop());
    }
    let labels: Vec<String> = sources.iter().map(VideoSource::label).collect();
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a stream")
        .items(&labels)
        .default(0)
        .interact_opt()?;
    Ok(selection.map(|idx| sources.remove(idx)))
}

/// mpv-style arguments for playing `source`.
pub fn player_args(source: &VideoSource, title: &str, episode: u32) -> Vec<String> {
    let mut args = vec![
        "--quiet".to_string(),
        "--terminal=no".to_string(),
        format!("--force-media-title={title} - Episode {episode}"),
    ];
    if let Some(sub) = &source.subtitle {
        args.push(format!("--sub-file={sub}"));
    }
    let mut headers: Vec<_> = source.headers.iter().collect();
    headers.sort();
    for (key, value) in headers {
        if key.eq_ignore_ascii_case("user-agent") {
            args.push(format!("--user-agent={value}"));
        } else if key.eq_ignore_ascii_case("referer") {
            args.push(format!("--referrer={value}"));
            args.push(format!("--http-header-fields=Referer: {value}"));
        } else {
            args.push(format!("--http-header-fields={key}: {value}"));
        }
    }
    args.push(source.url.clone());
    args
}

pub async fn launch_player(
    player: &str,
    source: &VideoSource,
    title: &str,
    episode: u32,
) -> Result<()> {
    let mut cmd = Command::new(player);
    cmd.args(player_args(source, title, episode));

    tracing::info!(player, url = %source.url, "launching player");
    let status = match cmd.status().await {
        Ok(status) => status,
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                return Err(anyhow!(
                    "Player '{}' not found. Install mpv or set ANISOURCE_PLAYER to a valid command.",
                    player
                ));
            }
            return Err(anyhow!(err)).context(format!("failed to launch player '{player}'"));
        }
    };

    if !status.success() {
        bail!("player exited with status {status}");
    }
    Ok(())
}

use anyhow::{Result, anyhow, bail};
use tokio::process::Command;

use crate::types::{EpisodeRecord, ResolvedStream};

pub const PLAYER_ENV_KEY: &str = "ANIMIST_PLAYER";

/// Player binary chosen from the environment, with a configured value as
/// the base and "mpv" as the last resort.
pub fn detect_player(configured: &str) -> String {
    std::env::var(PLAYER_ENV_KEY)
        .ok()
        .filter(|val| !val.trim().is_empty())
        .unwrap_or_else(|| {
            if configured.trim().is_empty() {
                "mpv".to_string()
            } else {
                configured.to_string()
            }
        })
}

/// Hands a resolved stream to the external player and waits for it to
/// exit. A missing binary gets an actionable error instead of a raw
/// io::Error.
pub async fn launch_player(
    player: &str,
    stream: &ResolvedStream,
    title: &str,
    episode: u32,
) -> Result<()> {
    let mut cmd = Command::new(player);
    let media_title = format!("{title} - Episode {episode}");
    cmd.arg("--quiet");
    cmd.arg("--terminal=no");
    cmd.arg(format!("--force-media-title={media_title}"));
    cmd.arg(&stream.url);

    let status = match cmd.status().await {
        Ok(status) => status,
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                return Err(anyhow!(
                    "Player '{}' not found. Install mpv or set {} to a valid command.",
                    player,
                    PLAYER_ENV_KEY
                ));
            }
            return Err(anyhow!(err).context(format!("failed to launch player '{player}'")));
        }
    };

    if !status.success() {
        bail!("player exited with status {status}");
    }
    Ok(())
}

/// Episodes synthesized from externally-hosted links have no stream to
/// resolve; they open in the system handler (usually a browser).
pub fn open_external(episode: &EpisodeRecord) -> Result<()> {
    let url = episode
        .external_url
        .as_deref()
        .ok_or_else(|| anyhow!("episode has no external link"))?;
    open::that(url).map_err(|err| anyhow!("failed to open {url}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_player_prefers_env_then_config_then_mpv() {
        // Serialized through a single test to avoid env races.
        unsafe { std::env::remove_var(PLAYER_ENV_KEY) };
        assert_eq!(detect_player("vlc"), "vlc");
        assert_eq!(detect_player("  "), "mpv");
        unsafe { std::env::set_var(PLAYER_ENV_KEY, "celluloid") };
        assert_eq!(detect_player("vlc"), "celluloid");
        unsafe { std::env::remove_var(PLAYER_ENV_KEY) };
    }

    #[test]
    fn open_external_rejects_records_without_a_link() {
        let record = EpisodeRecord {
            id: String::from("x-episode-1"),
            ordinal: 1,
            title: None,
            external_url: None,
        };
        assert!(open_external(&record).is_err());
    }
}

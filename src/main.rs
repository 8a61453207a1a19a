use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Parser;
use dialoguer::{FuzzySelect, Select, theme::ColorfulTheme};
use regex::Regex;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod catalog;
mod config;
mod episodes;
mod error;
mod history;
mod meta;
mod placeholders;
mod player;
mod stream;
mod transport;
mod types;

use catalog::{CatalogClient, CategorySort, match_ledger};
use config::Settings;
use history::{FileStore, WatchEntry, WatchHistory};
use meta::MetaResolver;
use player::{detect_player, launch_player, open_external};
use types::{EpisodeList, Provider, ProviderResult, Title, Track};

#[derive(Debug, Parser)]
#[command(
    name = "animist",
    about = "Browse the AniList catalog and stream episodes via mpv.",
    version
)]
struct Cli {
    /// Prefer the dubbed track when available.
    #[arg(long)]
    dub: bool,

    /// List a catalog category instead of searching:
    /// trending, airing, popularity, score, favourites or movies.
    #[arg(long, value_name = "CATEGORY")]
    browse: Option<String>,

    /// Pick up a title from the watch history.
    #[arg(long = "continue")]
    continue_watching: bool,

    /// Remove an entry from the watch history.
    #[arg(long)]
    remove: bool,

    /// Provider tried first: gogoanime or zoro.
    #[arg(long)]
    provider: Option<String>,

    /// Skip the search and play a title by its MAL identifier.
    #[arg(long, value_name = "MAL_ID", conflicts_with = "query")]
    id: Option<i64>,

    #[arg(short = 'e', long, value_name = "EPISODE")]
    episode: Option<u32>,

    #[arg(value_name = "QUERY")]
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
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
    let settings = Settings::load()?;
    if !Settings::settings_path()?.exists() {
        settings.save()?;
    }

    let track = if cli.dub { Track::Dub } else { settings.track };
    let provider = match &cli.provider {
        Some(name) => match Provider::parse(name) {
            Some(provider) => provider,
            None => bail!("Unknown provider: {name}. Expected gogoanime or zoro."),
        },
        None => settings.provider,
    };

    let mut ledger = WatchHistory::<FileStore>::open()?;
    let catalog = CatalogClient::new().context("failed to build catalog client")?;
    let resolver = MetaResolver::new(settings.backend_url.as_deref())
        .context("failed to build metadata resolver")?;

    if cli.remove {
        return remove_entry(&mut ledger);
    }
    if cli.continue_watching {
        return continue_watching(&cli, &catalog, &resolver, &settings, &mut ledger, provider)
            .await;
    }
    if let Some(category) = &cli.browse {
        return browse(
            &cli, category, &catalog, &resolver, &settings, &mut ledger, track, provider,
        )
        .await;
    }

    if let Some(mal_id) = cli.id {
        let title = catalog
            .find_by_id(mal_id)
            .await
            .with_context(|| format!("no title with MAL id {mal_id}"))?;
        return play_title(
            &resolver,
            &settings,
            &mut ledger,
            &title,
            track,
            provider,
            cli.episode,
        )
        .await;
    }

    if cli.query.is_empty() {
        println!("No query provided. Use `animist <name>`, `animist --browse trending` or `animist --continue`.");
        return Ok(());
    }
    let query = cli.query.join(" ");
    let titles = catalog.search(&query).await?;
    if titles.is_empty() {
        bail!("No results for \"{query}\"");
    }

    let options: Vec<String> = titles.iter().map(describe_title).collect();
    let selection = FuzzySelect::with_theme(&theme())
        .with_prompt("Select a title (Esc to cancel)")
        .items(&options)
        .default(0)
        .interact_opt()?;
    let Some(idx) = selection else {
        println!("Cancelled.");
        return Ok(());
    };

    play_title(
        &resolver,
        &settings,
        &mut ledger,
        &titles[idx],
        track,
        provider,
        cli.episode,
    )
    .await
}

async fn browse(
    cli: &Cli,
    category: &str,
    catalog: &CatalogClient<transport::HttpTransport>,
    resolver: &MetaResolver<transport::HttpTransport>,
    settings: &Settings,
    ledger: &mut WatchHistory<FileStore>,
    track: Track,
    provider: Provider,
) -> Result<()> {
    let Some(sort) = CategorySort::parse(category) else {
        bail!(
            "Unknown category: {category}. Expected trending, airing, popularity, score, favourites or movies."
        );
    };
    let titles = catalog.category_or_placeholders(sort, 1, 20).await;
    println!("{} · {} titles", sort.label(), titles.len());

    let options: Vec<String> = titles.iter().map(describe_title).collect();
    let selection = Select::with_theme(&theme())
        .with_prompt("Select a title to play (Esc to exit)")
        .items(&options)
        .default(0)
        .interact_opt()?;
    let Some(idx) = selection else {
        return Ok(());
    };

    // Category pages (and the placeholder constants especially) carry
    // sparse records; refresh the pick for synopsis and external links.
    let title = match catalog.find_by_anilist_id(titles[idx].id).await {
        Ok(full) => full,
        Err(err) => {
            warn!("detail refresh for {} failed: {err}", titles[idx].id);
            titles[idx].clone()
        }
    };
    play_title(resolver, settings, ledger, &title, track, provider, cli.episode).await
}

async fn continue_watching(
    cli: &Cli,
    catalog: &CatalogClient<transport::HttpTransport>,
    resolver: &MetaResolver<transport::HttpTransport>,
    settings: &Settings,
    ledger: &mut WatchHistory<FileStore>,
    provider: Provider,
) -> Result<()> {
    if ledger.is_empty() {
        println!("Watch history is empty.");
        return Ok(());
    }

    let ids: Vec<i64> = ledger.entries().iter().map(|e| e.title_id).collect();
    let titles = catalog.find_batch(&ids).await?;
    let matched = match_ledger(ledger.entries(), &titles);
    if matched.is_empty() {
        println!("None of the watched titles could be resolved against the catalog.");
        return Ok(());
    }

    let options: Vec<String> = matched
        .iter()
        .map(|(entry, title)| {
            format!(
                "{} · episode {} [{}] · watched {}",
                title.name.display(),
                entry.episode,
                entry.track.label(),
                entry.watched_at.format("%Y-%m-%d %H:%M")
            )
        })
        .collect();
    let selection = Select::with_theme(&theme())
        .with_prompt("Continue watching (Esc to cancel)")
        .items(&options)
        .default(0)
        .interact_opt()?;
    let Some(idx) = selection else {
        println!("Cancelled.");
        return Ok(());
    };

    let (entry, title) = &matched[idx];
    let preferred = cli.episode.or(Some(entry.episode));
    play_title(resolver, settings, ledger, title, entry.track, provider, preferred).await
}

fn remove_entry(ledger: &mut WatchHistory<FileStore>) -> Result<()> {
    if ledger.is_empty() {
        println!("Watch history is empty.");
        return Ok(());
    }
    let options: Vec<String> = ledger
        .entries()
        .iter()
        .map(|entry| {
            format!(
                "{} · episode {} [{}] · watched {}",
                entry.slug,
                entry.episode,
                entry.track.label(),
                entry.watched_at.format("%Y-%m-%d %H:%M")
            )
        })
        .collect();
    let selection = Select::with_theme(&theme())
        .with_prompt("Remove which entry? (Esc to cancel)")
        .items(&options)
        .default(0)
        .interact_opt()?;
    if let Some(idx) = selection {
        ledger.remove(idx)?;
        println!("Removed.");
    }
    Ok(())
}

async fn play_title(
    resolver: &MetaResolver<transport::HttpTransport>,
    settings: &Settings,
    ledger: &mut WatchHistory<FileStore>,
    title: &Title,
    track: Track,
    provider: Provider,
    prefer_episode: Option<u32>,
) -> Result<()> {
    let name = title.name.display().to_string();
    print_details(title);
    println!("Resolving episodes for {name}...");
    let result = resolver.resolve_episodes(title.id, provider).await;

    if result.is_empty() {
        let external = episodes::synthesize_external(&title.streaming_links);
        if external.is_empty() {
            bail!("No episodes available for {name} from any provider.");
        }
        println!("No provider episodes found. Falling back to externally hosted links.");
        let slug = fallback_slug(title);
        return play_loop(
            resolver,
            settings,
            ledger,
            title,
            &name,
            &slug,
            &external,
            track,
            provider,
            prefer_episode,
        )
        .await;
    }

    let (track_used, list) = pick_track(&result, track);
    if track_used != track {
        println!(
            "No {} episodes for {name}; using the {} track instead.",
            track.label(),
            track_used.label()
        );
    }
    let slug = match track_used {
        Track::Sub => result.sub_slug.clone(),
        Track::Dub => result.dub_slug.clone(),
    }
    .or_else(|| result.sub_slug.clone())
    .unwrap_or_else(|| fallback_slug(title));

    let provider_used = result
        .provider
        .and_then(Provider::parse)
        .unwrap_or(provider);
    println!(
        "Found {} {} episodes via {}.",
        list.len(),
        track_used.label(),
        provider_used.as_str()
    );

    play_loop(
        resolver,
        settings,
        ledger,
        title,
        &name,
        &slug,
        list,
        track_used,
        provider_used,
        prefer_episode,
    )
    .await
}

/// Episode selection and playback loop. After a successful playback the
/// ledger is updated and the next episode becomes the default selection;
/// picking the default auto-advances without re-prompting.
#[allow(clippy::too_many_arguments)]
async fn play_loop(
    resolver: &MetaResolver<transport::HttpTransport>,
    settings: &Settings,
    ledger: &mut WatchHistory<FileStore>,
    title: &Title,
    name: &str,
    slug: &str,
    list: &EpisodeList,
    track: Track,
    provider: Provider,
    prefer_episode: Option<u32>,
) -> Result<()> {
    let labels: Vec<String> = list.iter().map(describe_episode).collect();
    let last_watched = ledger.last_episode(slug);
    if let Some(prev) = last_watched {
        println!("Last watched episode: {prev}.");
    }

    let (mut current, mut skip_selection) = match prefer_episode {
        Some(ordinal) if list.iter().any(|ep| ep.ordinal == ordinal) => (ordinal, true),
        Some(ordinal) => {
            println!("Episode {ordinal} does not exist for {name}. Showing episode list.");
            (last_watched.unwrap_or_else(|| first_ordinal(list)), false)
        }
        None => (last_watched.unwrap_or_else(|| first_ordinal(list)), false),
    };

    loop {
        let default_idx = list
            .iter()
            .position(|ep| ep.ordinal == current)
            .unwrap_or(0);

        let idx = if skip_selection {
            skip_selection = false;
            default_idx
        } else {
            let selection = Select::with_theme(&theme())
                .with_prompt("Episode to play (Enter to select, Esc to exit)")
                .items(&labels)
                .default(default_idx)
                .interact_opt()?;
            let Some(i) = selection else {
                println!("Exiting playback loop.");
                return Ok(());
            };
            i
        };

        let chosen = &list[idx];
        let auto_advance = idx == default_idx;

        if let Some(url) = &chosen.external_url {
            println!("Opening episode {} externally: {url}", chosen.ordinal);
            open_external(chosen)?;
        } else {
            println!("Resolving stream for episode {}...", chosen.ordinal);
            let Some(stream) = resolver.resolve_stream(&chosen.id, provider).await else {
                println!(
                    "No playable source for episode {}. Try another episode or rerun later.",
                    chosen.ordinal
                );
                continue;
            };
            println!("Playing [{}] {}", stream.kind.label(), stream.url);
            launch_player(&detect_player(&settings.player), &stream, name, chosen.ordinal).await?;
        }

        ledger.record(WatchEntry {
            slug: slug.to_string(),
            episode: chosen.ordinal,
            title_id: title.mal_id.unwrap_or(title.id),
            track,
            watched_at: Utc::now(),
        })?;

        let next = list.get(idx + 1).map(|ep| ep.ordinal);
        match (auto_advance, next) {
            (true, Some(ordinal)) => current = ordinal,
            (true, None) => {
                println!("No further episodes. Exiting.");
                return Ok(());
            }
            (false, candidate) => current = candidate.unwrap_or(chosen.ordinal),
        }
    }
}

/// The wanted track if it has episodes, otherwise the other one. Callers
/// check `ProviderResult::is_empty` first, so one of the two is non-empty.
fn pick_track(result: &ProviderResult, wanted: Track) -> (Track, &EpisodeList) {
    let (primary, secondary) = match wanted {
        Track::Sub => (&result.sub, &result.dub),
        Track::Dub => (&result.dub, &result.sub),
    };
    if !primary.is_empty() {
        (wanted, primary)
    } else {
        (
            match wanted {
                Track::Sub => Track::Dub,
                Track::Dub => Track::Sub,
            },
            secondary,
        )
    }
}

fn first_ordinal(list: &EpisodeList) -> u32 {
    list.first().map(|ep| ep.ordinal).unwrap_or(1)
}

/// Ledger key for titles whose provider slug could not be derived.
fn fallback_slug(title: &Title) -> String {
    if title.name.is_empty() {
        return format!("title-{}", title.id);
    }
    let mut slug = String::new();
    for ch in title.name.display().to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let trimmed = slug.trim_matches('-');
    if trimmed.is_empty() {
        format!("title-{}", title.id)
    } else {
        trimmed.to_string()
    }
}

static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid literal regex"));

/// Detail block shown before playback starts.
fn print_details(title: &Title) {
    if !title.genres.is_empty() {
        println!("Genres: {}", title.genres.join(", "));
    }
    if let Some(start) = &title.start_date {
        match &title.end_date {
            Some(end) => println!("Aired: {start} to {end}"),
            None => println!("Aired: from {start}"),
        }
    }
    if let Some(popularity) = title.popularity {
        println!("Popularity: {popularity}");
    }
    if let Some(art) = title.banner_image.as_deref().or(title.cover_image.as_deref()) {
        println!("Art: {art}");
    }
    if let Some(synopsis) = &title.synopsis {
        let text = flatten_markup(synopsis);
        if !text.is_empty() {
            println!("{text}");
        }
    }
}

/// Catalog synopses arrive as HTML fragments; flatten them to plain text
/// for the terminal.
fn flatten_markup(text: &str) -> String {
    let text = text
        .replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("<br />", "\n");
    MARKUP
        .replace_all(&text, "")
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .trim()
        .to_string()
}

fn describe_title(title: &Title) -> String {
    let mut line = title.name.display().to_string();
    if let Some(score) = title.average_score {
        line.push_str(&format!(" · {score}%"));
    }
    if let Some(count) = title.episodes {
        line.push_str(&format!(" · {count} eps"));
    }
    if let Some(status) = &title.status {
        line.push_str(&format!(" · {status}"));
    }
    line
}

fn describe_episode(episode: &types::EpisodeRecord) -> String {
    match &episode.title {
        Some(title) if !title.trim().is_empty() => {
            format!("Episode {} · {title}", episode.ordinal)
        }
        _ => format!("Episode {}", episode.ordinal),
    }
}

fn theme() -> ColorfulTheme {
    ColorfulTheme::default()
}

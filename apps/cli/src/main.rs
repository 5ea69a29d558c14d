use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, DaySectionBuilder, FeedController, FeedLayout, FeedSnapshot, FilterKey,
    GalleryClient, LikeTarget, MasonryGrid, PageFetcher,
};
use shared::{
    domain::{AlbumId, MediaId, SortOrder},
    protocol::MediaItem,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Browse a photo gallery from the terminal")]
struct Cli {
    /// Overrides the configured base url.
    #[arg(long)]
    base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Media feed grouped by day (date order) or flat (likes order).
    Feed {
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value_t = SortOrder::Date)]
        sort: SortOrder,
        #[arg(long, default_value_t = 1)]
        pages: u32,
        #[arg(long, default_value_t = 390.0)]
        width: f32,
    },
    Albums {
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Media of one album; protected albums need `--password`.
    Album {
        id: String,
        #[arg(long)]
        password: Option<String>,
        #[arg(long, default_value_t = 1)]
        pages: u32,
        #[arg(long, default_value_t = 390.0)]
        width: f32,
    },
    /// Full metadata of one media item.
    Media {
        id: String,
    },
    Like {
        id: String,
        /// Treat `id` as an album instead of a media item.
        #[arg(long)]
        album: bool,
    },
    Comments {
        album_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let cli = Cli::parse();

    let mut settings = load_settings()?;
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
    }
    let client = GalleryClient::from_settings(&settings)?;

    match cli.command {
        Command::Feed {
            category,
            sort,
            pages,
            width,
        } => {
            let feed = client.media_feed(FilterKey::new(category, sort));
            let snapshot = load_pages(&feed, pages).await;
            report(&snapshot)?;
            print_media(&snapshot.items, sort, width);
        }
        Command::Albums { category, pages } => {
            let albums = client.album_list(FilterKey::new(category, SortOrder::Date));
            let snapshot = load_pages(&albums, pages).await;
            report(&snapshot)?;
            for album in &snapshot.items {
                let lock = if album.is_protected() { " [locked]" } else { "" };
                println!(
                    "{}  {} ({} items){lock}",
                    album.id,
                    album.title,
                    album.media_count.unwrap_or(0)
                );
            }
        }
        Command::Album {
            id,
            password,
            pages,
            width,
        } => {
            let album_id = AlbumId::new(id);
            let header = client.album_detail(album_id.clone());
            header.load().await;
            let feed = Arc::new(client.album_feed(album_id));

            if header.snapshot().await.requires_unlock {
                let Some(password) = password else {
                    bail!("album is password protected; pass --password");
                };
                let unlock = client.album_unlock(Arc::clone(&feed));
                unlock.submit(&password).await;
                if let Some(message) = unlock.snapshot().await.error_message {
                    bail!("unlock failed: {message}");
                }
                header.load().await;
            }
            let snapshot = load_pages(feed.as_ref(), pages).await;
            report(&snapshot)?;

            let header = header.snapshot().await;
            if let Some(message) = header.error_message {
                bail!("album unavailable: {message}");
            }
            if let Some(album) = &header.detail {
                println!("# {}", album.title);
                if let Some(description) = &album.description {
                    println!("{description}");
                }
            }
            print_media(&snapshot.items, SortOrder::Date, width);
        }
        Command::Media { id } => {
            let detail = client.media_detail(MediaId::new(id.clone()));
            detail.load().await;
            let snapshot = detail.snapshot().await;
            if let Some(message) = snapshot.error_message {
                bail!("media unavailable: {message}");
            }
            match snapshot.detail {
                Some(media) => {
                    println!("{}  {}", media.id, media.url);
                    if let Some((width, height)) = media.dimensions() {
                        println!("size: {width}x{height}");
                    }
                    let camera = [media.camera_make, media.camera_model, media.lens_model]
                        .into_iter()
                        .flatten()
                        .collect::<Vec<_>>();
                    if !camera.is_empty() {
                        println!("camera: {}", camera.join(" "));
                    }
                    if let Some(taken) = media.datetime_original {
                        println!("taken: {taken}");
                    }
                }
                None => println!("{id}: no details published"),
            }
        }
        Command::Like { id, album } => {
            let target = if album {
                LikeTarget::Album(AlbumId::new(id))
            } else {
                LikeTarget::Media(MediaId::new(id))
            };
            let likes = client.likes(target);
            likes.load().await;
            likes.toggle().await;
            let snapshot = likes.snapshot().await;
            if let Some(message) = snapshot.error_message {
                bail!("like failed: {message}");
            }
            println!("likes={} liked={}", snapshot.likes, snapshot.liked);
        }
        Command::Comments { album_id } => {
            let comments = client.comments(AlbumId::new(album_id));
            comments.load().await;
            let snapshot = comments.snapshot().await;
            if let Some(message) = snapshot.error_message {
                bail!("comments unavailable: {message}");
            }
            for comment in &snapshot.comments {
                println!(
                    "{}: {}",
                    comment.author_name.as_deref().unwrap_or("anonymous"),
                    comment.content
                );
            }
        }
    }

    Ok(())
}

/// Page 1 plus up to `pages - 1` further pages.
async fn load_pages<F: PageFetcher>(
    feed: &FeedController<F>,
    pages: u32,
) -> FeedSnapshot<F::Item> {
    if !feed.snapshot().await.has_attempted_initial_load {
        feed.load_initial().await;
    }
    for _ in 1..pages.max(1) {
        if !feed.load_next_page_if_possible().await {
            break;
        }
    }
    let snapshot = feed.snapshot().await;
    info!(
        items = snapshot.items.len(),
        page = snapshot.current_page,
        total_pages = snapshot.total_pages,
        "cli: feed loaded"
    );
    snapshot
}

fn report<T>(snapshot: &FeedSnapshot<T>) -> Result<()> {
    if snapshot.requires_unlock {
        bail!("collection is password protected");
    }
    if let Some(message) = &snapshot.error_message {
        bail!("request failed: {message}");
    }
    Ok(())
}

fn print_media(items: &[MediaItem], sort: SortOrder, width: f32) {
    let grid = MasonryGrid::new(width, 8.0);
    match DaySectionBuilder::local().layout_for_sort(items, sort) {
        FeedLayout::Sections(sections) => {
            for section in sections {
                println!("== {} ({})", section.title, section.items.len());
                for (index, column) in grid.layout_section(&section.items).iter().enumerate() {
                    let ids: Vec<&str> = column.items.iter().map(|item| item.id.as_str()).collect();
                    println!("  col {index} [{:.0}pt]: {}", column.height, ids.join(" "));
                }
            }
        }
        FeedLayout::Flat(flat) => {
            for (index, column) in grid.layout(&flat).iter().enumerate() {
                let ids: Vec<&str> = column.items.iter().map(|item| item.id.as_str()).collect();
                println!("col {index} [{:.0}pt]: {}", column.height, ids.join(" "));
            }
        }
    }
}

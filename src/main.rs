use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use feedfold::article::FeedEntry;
use feedfold::clustering::ClusterConfig;
use feedfold::db::Database;
use feedfold::filters::RawFilterRule;
use feedfold::ingest::Ingestor;
use feedfold::repository::{Repository, Store};

#[derive(Parser)]
#[clap(name = "feedfold", about = "Filter RSS/Atom entries and fold duplicate stories into clusters")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a category
    AddCategory {
        /// Owning user
        #[clap(short, long)]
        user: i64,

        name: String,

        /// Cluster within the category only, also matching exact titles
        #[clap(long)]
        cluster_on_title: bool,
    },

    /// Create a feed, optionally with filter rules read from a JSON file
    AddFeed {
        /// Owning user
        #[clap(short, long)]
        user: i64,

        #[clap(short, long)]
        category: Option<i64>,

        title: String,

        /// JSON list of {"action", "action on", "type", "pattern"} rules
        #[clap(short, long)]
        filters: Option<PathBuf>,
    },

    /// Parse an RSS/Atom document and ingest its entries into a feed
    Ingest {
        #[clap(required = true)]
        feed: i64,

        #[clap(required = true)]
        path: PathBuf,
    },

    /// Detach an article from its cluster and delete it
    DeleteArticle {
        #[clap(required = true)]
        id: i64,
    },

    /// Show a cluster and its members
    ShowCluster {
        #[clap(required = true)]
        id: i64,
    },
}

fn read_filters(path: &Path) -> Result<Vec<RawFilterRule>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read filters from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid filters in {}", path.display()))
}

fn read_entries(path: &Path) -> Result<Vec<FeedEntry>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let parsed = feed_rs::parser::parse(bytes.as_slice())
        .with_context(|| format!("Failed to parse feed {}", path.display()))?;
    let feed_lang = parsed.language.as_deref();
    Ok(parsed
        .entries
        .iter()
        .map(|entry| FeedEntry::from_feed_rs(entry, feed_lang))
        .collect())
}

#[tokio::main]
async fn main() -> Result<()> {
    feedfold::logging::configure_logging();

    let args = Cli::parse();
    let db = Database::from_env().await?;

    match args.command {
        Commands::AddCategory {
            user,
            name,
            cluster_on_title,
        } => {
            let category = db.add_category(user, &name, cluster_on_title).await?;
            println!("{}", serde_json::to_string_pretty(&category)?);
        }
        Commands::AddFeed {
            user,
            category,
            title,
            filters,
        } => {
            let filters = match filters {
                Some(path) => read_filters(&path)?,
                None => Vec::new(),
            };
            let feed = db.add_feed(user, category, &title, filters).await?;
            println!("{}", serde_json::to_string_pretty(&feed)?);
        }
        Commands::Ingest { feed, path } => {
            let entries = read_entries(&path)?;
            info!("Ingesting {} entries into feed {}", entries.len(), feed);
            let ingestor = Ingestor::new(db, ClusterConfig::from_env());
            let report = ingestor.ingest_entries(feed, &entries).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::DeleteArticle { id } => {
            let ingestor = Ingestor::new(db, ClusterConfig::from_env());
            if !ingestor.delete_article(id).await? {
                bail!("Article {} not found", id);
            }
            println!("Deleted article {}", id);
        }
        Commands::ShowCluster { id } => {
            let engine = feedfold::clustering::ClusterEngine::new(ClusterConfig::from_env());
            let mut tx = db.begin().await?;
            let Some(view) = engine.view(&mut tx, id).await? else {
                bail!("Cluster {} not found", id);
            };
            println!("{}", serde_json::to_string_pretty(&view)?);
            for article in tx.cluster_members(id).await? {
                let marker = if view.cluster.main_article_id == Some(article.id) { "*" } else { " " };
                println!(
                    "{} {:>6}  {:<8}  {}",
                    marker,
                    article.id,
                    article.cluster.cluster_reason.map(|r| r.as_str()).unwrap_or("-"),
                    article.title.as_deref().unwrap_or("(untitled)")
                );
            }
        }
    }

    Ok(())
}

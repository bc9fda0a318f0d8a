use anyhow::Result;
use clap::{Parser, Subcommand};
use quillpost_backend::api;
use quillpost_backend::auth::AuthService;
use quillpost_backend::cache::PageCache;
use quillpost_backend::config::QuillpostConfig;
use quillpost_backend::database::models::GroupRecord;
use quillpost_backend::database::repositories::GroupRepository;
use quillpost_backend::database::Database;
use quillpost_backend::telemetry;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about = "Quillpost backend daemon and admin CLI")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (Axum) for the web frontend
    Serve,
    /// Create a user account
    CreateUser { username: String, password: String },
    /// Create a post group
    CreateGroup {
        title: String,
        slug: String,
        #[arg(default_value = "")]
        description: String,
    },
    /// Delete a post group; its posts survive without a group
    DeleteGroup { slug: String },
    /// List all post groups
    ListGroups,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let args = Args::parse();

    let config = QuillpostConfig::from_env()?;
    let database = Database::connect(&config.paths)?;
    if database.ensure_migrations()? {
        tracing::info!(db_path = %config.paths.db_path.display(), "created fresh database");
    }

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let cache = PageCache::new(config.cache.index_ttl);
            api::serve_http(config, database, cache).await
        }
        Command::CreateUser { username, password } => {
            let user = AuthService::new(database).signup(&username, &password)?;
            println!("created user {} ({})", user.username, user.id);
            Ok(())
        }
        Command::CreateGroup {
            title,
            slug,
            description,
        } => {
            if slug.is_empty()
                || !slug
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            {
                anyhow::bail!("slug must be non-empty lowercase letters, digits and '-'");
            }
            let record = GroupRecord {
                id: Uuid::new_v4().to_string(),
                title,
                slug,
                description,
            };
            database.with_repositories(|repos| repos.groups().create(&record))?;
            println!("created group {} ({})", record.slug, record.id);
            Ok(())
        }
        Command::DeleteGroup { slug } => {
            let removed = database.with_repositories(|repos| repos.groups().delete_by_slug(&slug))?;
            if removed {
                println!("deleted group {slug}");
            } else {
                println!("no group with slug {slug}");
            }
            Ok(())
        }
        Command::ListGroups => {
            let groups = database.with_repositories(|repos| repos.groups().list())?;
            for group in groups {
                println!("{}\t{}\t{}", group.slug, group.title, group.description);
            }
            Ok(())
        }
    }
}

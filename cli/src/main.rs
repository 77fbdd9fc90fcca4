mod relay;

use anyhow::Context;
use clap::Parser;
use clap_derive::Subcommand;
use config::{load_env_file, PathManager, Settings, StoreConfig};
use imgbed_core::{
    GitHubBackend, GitHubBackendConfig, RepositoryObjectStore, RepositoryRef, StoreOptions,
};
use relay::RelayClient;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(author, version, about = "Image hosting on a GitHub repository branch", long_about = None)]
struct Args {
    #[arg(long, short)]
    tracing: bool,

    /// Directory holding settings.toml
    #[arg(long, env = "IMGBED_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Compression relay endpoint (e.g., http://127.0.0.1:8787/api/tinypng)
    #[arg(long, env = "IMGBED_RELAY_URL")]
    relay_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prepare the working branch and root folder
    Init,
    /// List folders under the root
    Folders,
    /// Create a folder under the root
    Mkdir { name: String },
    /// Upload one or more images and print their CDN URLs
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        folder: Option<String>,
        /// Compress through the relay before uploading
        #[arg(long)]
        compress: bool,
    },
    /// List images under the root or a folder
    List {
        #[arg(long)]
        folder: Option<String>,
    },
    /// Delete an image by repository path
    Delete { path: String },
    /// Save non-secret settings to settings.toml
    Configure {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        repo: Option<String>,
        #[arg(long)]
        branch: Option<String>,
        #[arg(long)]
        root: Option<String>,
        #[arg(long)]
        cdn_host: Option<String>,
        #[arg(long)]
        save_relay_url: Option<String>,
    },
}

fn setup_tracing(enable: bool) -> anyhow::Result<()> {
    if enable {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("setting default subscriber failed")?;
    }
    Ok(())
}

fn build_store(config: &StoreConfig) -> anyhow::Result<RepositoryObjectStore> {
    let backend = GitHubBackend::with_config(
        &config.token,
        GitHubBackendConfig {
            api_base: config.api_base.clone(),
            timeout: config.timeout,
            ..Default::default()
        },
    )?;
    let repo = RepositoryRef::new(&config.owner, &config.repo, &config.branch);
    let options = StoreOptions {
        root: config.root.clone(),
        cdn_host: config.cdn_host.clone(),
    };
    Ok(RepositoryObjectStore::with_options(repo, Arc::new(backend), options))
}

fn file_name(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .with_context(|| format!("Not a file name: {}", path.display()))
}

async fn read_image(
    path: &Path,
    relay: Option<&RelayClient>,
) -> anyhow::Result<Vec<u8>> {
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let Some(relay) = relay else {
        return Ok(content);
    };

    let original_size = content.len();
    match relay.compress(content.clone()).await {
        Ok(compressed) => {
            tracing::info!(
                "Compressed {}: {} -> {} bytes",
                path.display(),
                original_size,
                compressed.len()
            );
            Ok(compressed)
        }
        Err(e) => {
            tracing::warn!("{}, uploading original", e);
            eprintln!("Warning: {}; uploading original {}", e, path.display());
            Ok(content)
        }
    }
}

async fn run(command: Command, relay_url: Option<String>) -> anyhow::Result<()> {
    if let Command::Configure {
        owner,
        repo,
        branch,
        root,
        cdn_host,
        save_relay_url,
    } = command
    {
        let mut settings = Settings::load();
        settings.owner = owner.or(settings.owner);
        settings.repo = repo.or(settings.repo);
        settings.branch = branch.or(settings.branch);
        settings.root = root.or(settings.root);
        settings.cdn_host = cdn_host.or(settings.cdn_host);
        settings.relay_url = save_relay_url.or(settings.relay_url);
        settings.save().map_err(anyhow::Error::msg)?;
        println!("Settings saved");
        return Ok(());
    }

    let config = Settings::load().resolve(config::env_var)?;
    let mut store = build_store(&config)?;

    match command {
        Command::Init => {
            store.initialize().await?;
            println!(
                "Ready: {}@{} under {}/",
                store.repository().full_name(),
                store.repository().branch(),
                store.root()
            );
        }
        Command::Folders => {
            for folder in store.list_folders().await {
                println!("{}", folder);
            }
        }
        Command::Mkdir { name } => {
            if !store.create_folder(&name).await {
                anyhow::bail!("Failed to create folder '{}'", name);
            }
            println!("Created {}/{}", store.root(), name);
        }
        Command::Upload {
            files,
            folder,
            compress,
        } => {
            store.initialize().await?;

            let relay = match (compress, relay_url.or(config.relay_url.clone())) {
                (false, _) => None,
                (true, Some(url)) => Some(RelayClient::new(&url, config.timeout)?),
                (true, None) => {
                    anyhow::bail!("--compress needs a relay URL (IMGBED_RELAY_URL)")
                }
            };

            for path in &files {
                let name = file_name(path)?;
                let content = read_image(path, relay.as_ref()).await?;
                let url = store
                    .upload_object(&content, &name, folder.as_deref())
                    .await
                    .with_context(|| format!("Failed to upload {}", path.display()))?;
                println!("{}", url);
            }
        }
        Command::List { folder } => {
            for object in store.list_objects(folder.as_deref()).await {
                println!("{}\t{}", object.path, object.url);
            }
        }
        Command::Delete { path } => {
            let outcome = store.delete_object(&path).await?;
            if !outcome.success {
                anyhow::bail!("{} is not a file", path);
            }
            println!("Deleted {} ({})", path, outcome.hash);
        }
        Command::Configure { .. } => unreachable!("handled above"),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    load_env_file();

    let args = Args::parse();
    setup_tracing(args.tracing)?;
    if let Some(dir) = args.config_dir {
        PathManager::set_config_dir(dir);
    }

    run(args.command, args.relay_url).await
}

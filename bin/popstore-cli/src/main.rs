//! Popstore CLI - Command line client
//!
//! This binary exposes the bucket and object operations of the popstore
//! client library.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use popstore_client::{ObjectSource, PopClient, PutObjectOptions};
use popstore_common::{BucketAcl, ChecksumAlgorithm, ClientConfig, DEFAULT_CONTENT_TYPE};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "popstore")]
#[command(about = "Popstore object storage client")]
#[command(version)]
struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, env = "POPSTORE_CONFIG")]
    config: Option<PathBuf>,

    /// Service endpoint, overrides the configuration file
    #[arg(short, long, env = "POPSTORE_ENDPOINT")]
    endpoint: Option<String>,

    /// Access identifier
    #[arg(long, env = "POPSTORE_ACCESS_ID")]
    access_id: Option<String>,

    /// Secret key
    #[arg(long, env = "POPSTORE_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bucket operations
    Bucket {
        #[command(subcommand)]
        action: BucketCommands,
    },
    /// Object operations
    Object {
        #[command(subcommand)]
        action: ObjectCommands,
    },
    /// Show service status
    Status {
        /// Only report the node answering the request
        #[arg(long)]
        node_only: bool,
    },
}

#[derive(Subcommand, Debug)]
enum BucketCommands {
    /// Create a bucket
    Create {
        /// Bucket name
        name: String,
        /// Access control (private, public-read, public-read-write, authenticated-read)
        #[arg(long, default_value = "private")]
        acl: BucketAcl,
        /// Reject deletion of the bucket
        #[arg(long)]
        locked: bool,
    },
    /// List all buckets
    List,
    /// Delete a bucket
    Delete {
        /// Bucket name
        name: String,
    },
}

#[derive(Subcommand, Debug)]
enum ObjectCommands {
    /// Upload a local file
    Put {
        /// Bucket name
        bucket: String,
        /// Local file to upload
        file: PathBuf,
        /// Object key (defaults to the file name)
        #[arg(short, long)]
        key: Option<String>,
        /// Content type
        #[arg(long, default_value = DEFAULT_CONTENT_TYPE)]
        content_type: String,
        /// Verify the stored object's SHA-256 after upload
        #[arg(long)]
        verify: bool,
    },
    /// List objects in a bucket
    List {
        /// Bucket name
        bucket: String,
    },
    /// Download an object
    Get {
        /// Bucket name
        bucket: String,
        /// Object key
        key: String,
        /// Destination path (defaults to the key in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show an object's checksum
    Checksum {
        /// Bucket name
        bucket: String,
        /// Object key
        key: String,
        /// Algorithm (crc32, crc32c, sha1, sha256)
        #[arg(short, long, default_value = "sha256")]
        algorithm: ChecksumAlgorithm,
    },
}

/// Build the client configuration from the file/environment and flags
fn client_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match (&args.config, &args.endpoint) {
        (None, Some(endpoint)) => ClientConfig::new(
            endpoint.as_str(),
            args.access_id.clone().unwrap_or_default(),
            args.secret_key.clone().unwrap_or_default(),
        ),
        (path, _) => ClientConfig::load(path.as_deref()).context("failed to load configuration")?,
    };

    if let Some(endpoint) = &args.endpoint {
        config.endpoint.clone_from(endpoint);
    }
    if let Some(access_id) = &args.access_id {
        config.credentials.access_id.clone_from(access_id);
    }
    if let Some(secret_key) = &args.secret_key {
        config.credentials.secret_key.clone_from(secret_key);
    }
    config.validate()?;
    Ok(config)
}

/// Format bytes as a human-readable size string.
fn format_size(bytes: u64) -> String {
    const GIB: u64 = 1024 * 1024 * 1024;
    const MIB: u64 = 1024 * 1024;
    const KIB: u64 = 1024;

    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn key_from_path(file: &std::path::Path) -> Result<String> {
    file.file_name()
        .and_then(|name| name.to_str())
        .map(ToString::to_string)
        .ok_or_else(|| anyhow::anyhow!("cannot derive an object key from {}", file.display()))
}

async fn run_bucket(client: &PopClient, action: BucketCommands) -> Result<()> {
    match action {
        BucketCommands::Create { name, acl, locked } => {
            let created = client.create_bucket(&name, acl, locked).await?;
            println!("Bucket created: {}", created.bucket);
            println!("  ACL:    {}", created.acl);
            println!("  Locked: {}", created.locked);
        }
        BucketCommands::List => {
            let buckets = client.list_buckets().await?;
            println!("Buckets");
            println!("=======");
            if buckets.is_empty() {
                println!("No buckets found");
            } else {
                println!("{:<40} {:<20} {:<8} {:<25}", "NAME", "ACL", "LOCKED", "CREATED");
                println!("{}", "-".repeat(95));
                for bucket in buckets {
                    println!(
                        "{:<40} {:<20} {:<8} {:<25}",
                        bucket.name,
                        bucket.acl.map_or_else(|| "-".to_string(), |acl| acl.to_string()),
                        bucket.locked.map_or("-", |locked| if locked { "yes" } else { "no" }),
                        bucket
                            .creation_date
                            .map_or_else(|| "-".to_string(), |date| date.to_rfc3339()),
                    );
                }
            }
        }
        BucketCommands::Delete { name } => {
            client.delete_bucket(&name).await?;
            println!("Bucket deleted: {name}");
        }
    }
    Ok(())
}

async fn run_object(client: &PopClient, action: ObjectCommands) -> Result<()> {
    match action {
        ObjectCommands::Put {
            bucket,
            file,
            key,
            content_type,
            verify,
        } => {
            let key = match key {
                Some(key) => key,
                None => key_from_path(&file)?,
            };
            let options = PutObjectOptions::default()
                .content_type(content_type)
                .verify_sha256(verify);
            let result = client
                .put_object(&bucket, &key, ObjectSource::path(&file), options)
                .await?;

            println!("Uploaded {} to {}/{}", file.display(), result.bucket, result.key);
            println!("  Upload ID: {}", result.upload_id);
            println!("  Parts:     {}", result.part_count);
            println!("  Size:      {}", format_size(result.bytes_uploaded));
            if let Some(sha256) = result.sha256 {
                println!("  SHA-256:   {sha256} (verified)");
            }
        }
        ObjectCommands::List { bucket } => {
            let objects = client.list_objects(&bucket).await?;
            println!("Objects in {bucket}");
            println!("{}", "=".repeat(11 + bucket.len()));
            if objects.is_empty() {
                println!("No objects found");
            } else {
                println!("{:<50} {:>12} {:<30}", "KEY", "SIZE", "CONTENT TYPE");
                println!("{}", "-".repeat(94));
                for object in objects {
                    println!(
                        "{:<50} {:>12} {:<30}",
                        object.name,
                        format_size(object.size),
                        object.content_type.as_deref().unwrap_or("-"),
                    );
                }
            }
        }
        ObjectCommands::Get {
            bucket,
            key,
            output,
        } => {
            let destination = output.unwrap_or_else(|| PathBuf::from(&key));
            let result = client.get_object(&bucket, &key, &destination).await?;
            println!(
                "Downloaded {bucket}/{key} to {} ({})",
                result.path.display(),
                format_size(result.bytes_written)
            );
        }
        ObjectCommands::Checksum {
            bucket,
            key,
            algorithm,
        } => {
            let checksum = client.get_object_checksum(&bucket, &key, algorithm).await?;
            println!("{}  {bucket}/{key} ({})", checksum.digest, checksum.algorithm);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = client_config(&args)?;
    debug!(endpoint = %config.endpoint, "using endpoint");
    let client = PopClient::new(config)?;

    match args.command {
        Commands::Bucket { action } => run_bucket(&client, action).await?,
        Commands::Object { action } => run_object(&client, action).await?,
        Commands::Status { node_only } => {
            let status = client.status(node_only).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}

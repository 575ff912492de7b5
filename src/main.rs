//! luci-rpc CLI
//!
//! Entry point for the `luci-rpc` command-line tool.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};

use luci_rpc::client::auth::provider_from_config;
use luci_rpc::client::{HttpTransport, TokenProvider, Transport};
use luci_rpc::config::EffectiveConfig;
use luci_rpc::{logging, BuildRef, BuildbucketClient, ResultDbClient};
use luci_rpc_protocol::DEFAULT_COUNT;

const EXIT_OK: i32 = 0;
const EXIT_USAGE: i32 = 1;
const EXIT_NO_DATA: i32 = 2;
const EXIT_BATCH_ITEM: i32 = 3;

#[derive(Parser)]
#[command(name = "luci-rpc")]
#[command(about = "Query Buildbucket and ResultDB over pRPC", version)]
struct Cli {
    /// Config file (default: ~/.config/luci-rpc/config.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Override buildbucket.host
    #[arg(long, global = true)]
    buildbucket_host: Option<String>,

    /// Override resultdb.host
    #[arg(long, global = true)]
    resultdb_host: Option<String>,

    /// Read the access token from this environment variable
    #[arg(long, global = true)]
    token_env: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one build
    GetBuild {
        /// Builder name
        builder: String,

        /// Build number (default: latest)
        #[arg(long, short = 'n', conflicts_with = "id")]
        number: Option<u64>,

        /// Buildbucket build ID
        #[arg(long)]
        id: Option<String>,

        /// Bucket (default: buildbucket.bucket)
        #[arg(long, short = 'b')]
        bucket: Option<String>,

        /// Build field to return (repeatable)
        #[arg(long = "field", short = 'f')]
        fields: Vec<String>,
    },

    /// List builds of a builder, newest first
    SearchBuilds {
        /// Builder name
        #[arg(long)]
        builder: String,

        /// Bucket (default: buildbucket.bucket)
        #[arg(long, short = 'b')]
        bucket: Option<String>,

        /// Only builds with this status (e.g. SUCCESS, FAILURE)
        #[arg(long)]
        status: Option<String>,

        /// Maximum number of builds
        #[arg(long, default_value_t = DEFAULT_COUNT)]
        count: usize,

        /// Builds per request (default: count)
        #[arg(long)]
        page_size: Option<usize>,

        /// Build field to return (repeatable)
        #[arg(long = "field", short = 'f')]
        fields: Vec<String>,
    },

    /// Fetch several builds in one Batch call
    BatchGet {
        /// BUILDER or BUILDER:NUMBER
        #[arg(required = true)]
        builds: Vec<BuildRef>,

        /// Bucket (default: buildbucket.bucket)
        #[arg(long, short = 'b')]
        bucket: Option<String>,

        /// Build field to return (repeatable)
        #[arg(long = "field", short = 'f')]
        fields: Vec<String>,
    },

    /// List artifacts recorded by builds
    QueryArtifacts {
        /// Buildbucket build ID (repeatable)
        #[arg(long = "build-id", required = true)]
        build_ids: Vec<String>,

        /// ArtifactPredicate as JSON
        #[arg(long)]
        predicate: Option<String>,

        /// Maximum number of artifacts
        #[arg(long, default_value_t = DEFAULT_COUNT)]
        count: usize,

        /// Artifacts per request (default: count)
        #[arg(long)]
        page_size: Option<usize>,
    },

    /// Print the effective configuration and where it came from
    Config,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Exit code 2 is reserved for "no data".
            let code = if e.use_stderr() { EXIT_USAGE } else { EXIT_OK };
            let _ = e.print();
            process::exit(code);
        }
    };
    logging::init(cli.verbose);

    let effective = match EffectiveConfig::load(cli.config.as_deref(), cli_overrides(&cli)) {
        Ok(effective) => effective,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(EXIT_USAGE);
        }
    };

    let code = match cli.command {
        Commands::GetBuild {
            builder,
            number,
            id,
            bucket,
            fields,
        } => run_get_build(&effective, builder, number, id, bucket, &fields),
        Commands::SearchBuilds {
            builder,
            bucket,
            status,
            count,
            page_size,
            fields,
        } => run_search_builds(&effective, &builder, bucket, status, count, page_size, &fields),
        Commands::BatchGet { builds, bucket, fields } => run_batch_get(&effective, &builds, bucket, &fields),
        Commands::QueryArtifacts {
            build_ids,
            predicate,
            count,
            page_size,
        } => run_query_artifacts(&effective, &build_ids, predicate, count, page_size),
        Commands::Config => run_config(&effective),
    };
    process::exit(code);
}

/// Global flags as a config layer.
fn cli_overrides(cli: &Cli) -> Option<Value> {
    let mut overrides = Map::new();
    if let Some(host) = &cli.buildbucket_host {
        overrides.insert("buildbucket".to_string(), json!({"host": host}));
    }
    if let Some(host) = &cli.resultdb_host {
        overrides.insert("resultdb".to_string(), json!({"host": host}));
    }
    if let Some(var) = &cli.token_env {
        overrides.insert("auth".to_string(), json!({"token_env": var}));
    }
    (!overrides.is_empty()).then_some(Value::Object(overrides))
}

fn run_config(effective: &EffectiveConfig) -> i32 {
    match effective.to_json() {
        Ok(json) => {
            println!("{}", json);
            EXIT_OK
        }
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            EXIT_USAGE
        }
    }
}

/// Transport and token source shared by both clients.
fn open_channel_parts(effective: &EffectiveConfig) -> Result<(Arc<dyn Transport>, Arc<dyn TokenProvider>), i32> {
    let config = &effective.config;
    let transport: Arc<dyn Transport> = match HttpTransport::new(&config.http) {
        Ok(transport) => Arc::new(transport),
        Err(e) => {
            eprintln!("Error creating HTTP client: {}", e);
            return Err(EXIT_USAGE);
        }
    };
    let tokens = match provider_from_config(&config.auth) {
        Ok(tokens) => tokens,
        Err(e) => {
            eprintln!("Error configuring auth: {}", e);
            return Err(EXIT_USAGE);
        }
    };
    Ok((transport, tokens))
}

fn open_buildbucket(effective: &EffectiveConfig) -> Result<BuildbucketClient, i32> {
    let (transport, tokens) = open_channel_parts(effective)?;
    Ok(BuildbucketClient::from_config(&effective.config.buildbucket, transport, tokens))
}

fn open_resultdb(effective: &EffectiveConfig) -> Result<ResultDbClient, i32> {
    let (transport, tokens) = open_channel_parts(effective)?;
    Ok(ResultDbClient::from_config(&effective.config.resultdb, transport, tokens))
}

fn run_get_build(
    effective: &EffectiveConfig,
    builder: String,
    number: Option<u64>,
    id: Option<String>,
    bucket: Option<String>,
    fields: &[String],
) -> i32 {
    let client = match open_buildbucket(effective) {
        Ok(client) => client,
        Err(code) => return code,
    };

    let build = match (number, id) {
        (Some(number), _) => BuildRef::numbered(builder, number),
        (None, Some(id)) => BuildRef::latest(builder).with_id(id),
        (None, None) => BuildRef::latest(builder),
    };
    let bucket = bucket.unwrap_or_else(|| effective.config.buildbucket.bucket.clone());

    match client.get_build(&build, &bucket, &as_strs(fields)).into_result() {
        Ok(value) => print_json(&value),
        Err(failure) => {
            eprintln!("No build for {}: {}", build, failure);
            EXIT_NO_DATA
        }
    }
}

fn run_search_builds(
    effective: &EffectiveConfig,
    builder: &str,
    bucket: Option<String>,
    status: Option<String>,
    count: usize,
    page_size: Option<usize>,
    fields: &[String],
) -> i32 {
    let client = match open_buildbucket(effective) {
        Ok(client) => client,
        Err(code) => return code,
    };

    let bucket = bucket.unwrap_or_else(|| effective.config.buildbucket.bucket.clone());
    let mut predicate = client.builder_predicate(&bucket, builder);
    if let (Some(status), Value::Object(map)) = (status, &mut predicate) {
        map.insert("status".to_string(), Value::String(status));
    }

    print_entities(client.search_builds(predicate, &as_strs(fields), page_size, count))
}

fn run_batch_get(effective: &EffectiveConfig, builds: &[BuildRef], bucket: Option<String>, fields: &[String]) -> i32 {
    let mut client = match open_buildbucket(effective) {
        Ok(client) => client,
        Err(code) => return code,
    };

    let bucket = bucket.unwrap_or_else(|| effective.config.buildbucket.bucket.clone());
    let fields = as_strs(fields);
    for build in builds {
        client.enqueue_get_build(build, &bucket, &fields);
    }

    let mut entities = Vec::new();
    for result in client.execute_batch() {
        match result {
            Ok(value) => entities.push(value),
            Err(err) => {
                print_json(&Value::Array(entities));
                eprintln!("Batch item failed: {}", err);
                return EXIT_BATCH_ITEM;
            }
        }
    }
    print_json(&Value::Array(entities))
}

fn run_query_artifacts(
    effective: &EffectiveConfig,
    build_ids: &[String],
    predicate: Option<String>,
    count: usize,
    page_size: Option<usize>,
) -> i32 {
    let predicate = match predicate.as_deref().map(serde_json::from_str::<Value>) {
        None => json!({}),
        Some(Ok(value)) => value,
        Some(Err(e)) => {
            eprintln!("Invalid --predicate JSON: {}", e);
            return EXIT_USAGE;
        }
    };

    let client = match open_resultdb(effective) {
        Ok(client) => client,
        Err(code) => return code,
    };
    print_entities(client.query_artifacts(&as_strs(build_ids), predicate, page_size, count))
}

fn as_strs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}

fn print_json(value: &Value) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            EXIT_OK
        }
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            EXIT_USAGE
        }
    }
}

fn print_entities(entities: Vec<Value>) -> i32 {
    if entities.is_empty() {
        eprintln!("No results");
        return EXIT_NO_DATA;
    }
    print_json(&Value::Array(entities))
}

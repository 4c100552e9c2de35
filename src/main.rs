use std::sync::Arc;

use clap::{Parser, Subcommand};
use curator::config::{GraphQlConfig, env_var};
use curator::consts::{ENV_API_TOKEN, ENV_GRAPHQL_URL};
use curator::editor::{CreateOutcome, EditorError, IssueEditor};
use curator::graphql::GraphQlClient;
use curator::issue::{BucketId, IssueId, LinkId, LinkPatch};
use curator::source::{DataSource, SourceError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration: {0}")]
    Config(SourceError),
    #[error(transparent)]
    Editor(#[from] EditorError),
    #[error("nothing to change; pass at least one of --title, --text, --url")]
    EmptyEdit,
    #[error("link creation failed for {input}: {error}")]
    CreateFailed { input: String, error: String },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "curator", about = "Edit newsletter issues against the curation GraphQL API")]
struct Cli {
    #[arg(long, env = ENV_GRAPHQL_URL)]
    endpoint: Option<String>,

    #[arg(long, env = ENV_API_TOKEN, hide_env_values = true)]
    token: Option<String>,

    /// Buffer the change and print the result without saving.
    #[arg(long, default_value_t = false, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every bucket of an issue with its links.
    Show {
        issue: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Move a link to a topic, or to `unassigned`.
    Move { issue: String, link: String, bucket: String },
    Delete { issue: String, link: String },
    Edit {
        issue: String,
        link: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        url: Option<String>,
    },
    /// Create a link from a URL, optionally straight into a topic.
    Add {
        issue: String,
        url: String,
        #[arg(long)]
        topic: Option<String>,
    },
    CreateTopic {
        issue: String,
        title: String,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Detach every topic from an issue that is being deleted.
    DetachTopics { issue: String },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();

    if let Err(error) = dotenvy::dotenv() {
        if !error.not_found() {
            warn!(error = %error, "could not read .env");
        }
    }

    let cli = Cli::parse();
    let source = connect(&cli)?;

    match cli.command {
        Command::Show { issue, json } => run_show(source, issue, json).await,
        Command::Move { issue, link, bucket } => {
            let mut editor = open(source, issue).await?;
            if !editor.move_link(&LinkId::from(link.as_str()), &BucketId::from(bucket))? {
                info!("link is already in that bucket");
            }
            finish(editor, cli.dry_run).await
        }
        Command::Delete { issue, link } => {
            let mut editor = open(source, issue).await?;
            editor.delete_link(&LinkId::from(link.as_str()))?;
            finish(editor, cli.dry_run).await
        }
        Command::Edit { issue, link, title, text, url } => {
            let patch = LinkPatch { title, text, url };
            if patch.is_empty() {
                return Err(CliError::EmptyEdit);
            }
            let mut editor = open(source, issue).await?;
            editor.set_field(&LinkId::from(link.as_str()), &patch)?;
            finish(editor, cli.dry_run).await
        }
        Command::Add { issue, url, topic } => run_add(source, issue, url, topic, cli.dry_run).await,
        Command::CreateTopic { issue, title, comment } => {
            let mut editor = open(source, issue).await?;
            let id = editor.create_topic(&title, comment.as_deref()).await?;
            println!("{id}");
            Ok(())
        }
        Command::DetachTopics { issue } => {
            let mut editor = open(source, issue).await?;
            let detached = editor.detach_topics_for_deleted_issue().await?;
            println!("detached {detached} topics");
            Ok(())
        }
    }
}

fn connect(cli: &Cli) -> Result<Arc<dyn DataSource>, CliError> {
    let lookup = |key: &str| match key {
        ENV_GRAPHQL_URL => cli.endpoint.clone(),
        ENV_API_TOKEN => cli.token.clone(),
        _ => env_var(key),
    };
    let config = GraphQlConfig::from_lookup(lookup).map_err(CliError::Config)?;
    let client = GraphQlClient::new(&config).map_err(CliError::Config)?;
    Ok(Arc::new(client))
}

async fn open(source: Arc<dyn DataSource>, issue: String) -> Result<IssueEditor, CliError> {
    Ok(IssueEditor::open(source, IssueId::new(issue)).await?)
}

async fn run_show(source: Arc<dyn DataSource>, issue: String, json: bool) -> Result<(), CliError> {
    let editor = open(source, issue).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(editor.snapshot())?);
        return Ok(());
    }
    print_view(&editor);
    Ok(())
}

async fn run_add(
    source: Arc<dyn DataSource>,
    issue: String,
    url: String,
    topic: Option<String>,
    dry_run: bool,
) -> Result<(), CliError> {
    let mut editor = open(source, issue).await?;
    let bucket = topic.map_or(BucketId::Unassigned, BucketId::from);
    if dry_run {
        let pending = editor.begin_create_link(&url, &bucket)?;
        info!(temp_id = %pending.temp_id, "dry run; link not created");
        print_view(&editor);
        return Ok(());
    }
    match editor.create_link(&url, &bucket).await? {
        CreateOutcome::Created(id) => info!(link = %id, "link created"),
        CreateOutcome::RolledBack { input, error } => return Err(CliError::CreateFailed { input, error }),
    }
    finish(editor, false).await
}

/// Save whatever the command buffered, or just show it on a dry run.
async fn finish(mut editor: IssueEditor, dry_run: bool) -> Result<(), CliError> {
    if dry_run {
        info!(pending = editor.dirty_count(), "dry run; nothing saved");
        print_view(&editor);
        return Ok(());
    }
    if editor.dirty_count() > 0 {
        let pending = editor.dirty_count();
        editor.save_all().await?;
        info!(saved = pending, "changes saved");
    }
    print_view(&editor);
    Ok(())
}

fn print_view(editor: &IssueEditor) {
    for bucket in editor.view() {
        println!("[{}] {}", bucket.id, bucket.title);
        for link in bucket.links {
            let label = if link.title.is_empty() { link.url.as_str() } else { link.title.as_str() };
            println!("  {}  {}", link.id, label);
        }
    }
    if editor.dirty_count() > 0 {
        println!("({} unsaved changes)", editor.dirty_count());
    }
}

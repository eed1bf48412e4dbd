mod commands;

use std::path::PathBuf;

use bidwise_core::bootstrap::{AppBuilder, resolve_config_path};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Question answering over preprocessed RFP documents.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (falls back to `BIDWISE_CONFIG`, then `config/bidwise.toml`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split preprocessed documents into the chunk JSONL artifact
    Chunk {
        /// Directory of preprocessed `*.json` documents
        #[arg(long)]
        input: Option<PathBuf>,
        /// Output JSONL path
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Embed the chunk artifact and upsert it into the vector store
    Index {
        /// Chunk JSONL path
        #[arg(long)]
        chunks: Option<PathBuf>,
    },
    /// Retrieve passages for a query
    Search {
        query: String,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// Fuse BM25 and vector scores
        #[arg(long)]
        hybrid: bool,
        /// Skip MMR reranking
        #[arg(long)]
        no_rerank: bool,
        #[command(flatten)]
        filters: FilterArgs,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Answer a question with the retrieve-grade-generate loop
    Ask {
        question: String,
        /// Restrict evidence to these document ids
        #[arg(long = "doc")]
        docs: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Summarize one document, or one of its sections
    Summarize {
        doc_id: String,
        /// Section heading as it appears in the chunk metadata
        #[arg(long)]
        section: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Extract structured fields from one document as JSON
    Extract {
        doc_id: String,
        /// JSON object of `{field: {type, description}}`; defaults to budget, deadline and bid terms
        #[arg(long)]
        schema: Option<PathBuf>,
    },
    /// Score retrieval against a JSONL set of `{query, relevant_doc_ids}`
    Eval {
        file: PathBuf,
        #[arg(short = 'k', long, default_value_t = 10)]
        k: usize,
        #[arg(long)]
        hybrid: bool,
        /// Run the full loop and score citation recall and answer accuracy
        #[arg(long, conflicts_with_all = ["k", "hybrid"])]
        answers: bool,
    },
}

#[derive(clap::Args, Debug, Default, Clone)]
struct FilterArgs {
    /// Ordering organization; close spellings are corrected against the corpus
    #[arg(long)]
    org: Option<String>,
    /// Keywords that must all appear in the business name
    #[arg(long)]
    business: Option<String>,
    #[arg(long)]
    amount_min: Option<f64>,
    #[arg(long)]
    amount_max: Option<f64>,
    /// Earliest bid deadline (YYYY-MM-DD)
    #[arg(long)]
    deadline_from: Option<NaiveDate>,
    /// Latest bid deadline (YYYY-MM-DD)
    #[arg(long)]
    deadline_to: Option<NaiveDate>,
    #[arg(long = "doc")]
    docs: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();
    let cli = Cli::parse();
    let app = AppBuilder::from_path(resolve_config_path(cli.config.as_deref())).await?;

    match cli.command {
        Command::Chunk { input, output } => {
            commands::chunk(&app, input.as_deref(), output.as_deref()).await
        }
        Command::Index { chunks } => commands::index(&app, chunks.as_deref()).await,
        Command::Search {
            query,
            top_k,
            hybrid,
            no_rerank,
            filters,
            json,
        } => {
            let opts = commands::SearchOptions {
                top_k,
                hybrid,
                rerank: !no_rerank,
                json,
            };
            commands::search(&app, &query, &filters, &opts).await
        }
        Command::Ask {
            question,
            docs,
            json,
        } => commands::ask(&app, &question, docs, json).await,
        Command::Summarize {
            doc_id,
            section,
            json,
        } => commands::summarize(&app, &doc_id, section.as_deref(), json).await,
        Command::Extract { doc_id, schema } => {
            commands::extract(&app, &doc_id, schema.as_deref()).await
        }
        Command::Eval { file, answers: true, .. } => commands::eval_answers(&app, &file).await,
        Command::Eval { file, k, hybrid, .. } => commands::eval(&app, &file, k, hybrid).await,
    }
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

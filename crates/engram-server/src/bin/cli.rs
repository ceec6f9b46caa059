//! Engram CLI
//!
//! Diagnostic command-line interface for a running Engram server. Talks to
//! the HTTP journal API; exits non-zero on upstream failure.

use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;

/// Engram - persistent memory system CLI
#[derive(Parser)]
#[command(name = "engram")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CLI for the Engram memory engine")]
#[command(long_about = "Diagnostic surface for a running Engram server: list and inspect \
memories, run semantic searches, trigger consolidation, and watch live stats.")]
struct Cli {
    /// Base URL of the Engram server
    #[arg(long, default_value = "http://127.0.0.1:8543", global = true)]
    endpoint: String,

    /// API path prefix
    #[arg(long, default_value = "/api/v1", global = true)]
    prefix: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect stored memories
    Memory {
        #[command(subcommand)]
        command: MemoryCommands,
    },

    /// Show live memory statistics
    Stats,

    /// Consolidation commands
    Consolidate {
        #[command(subcommand)]
        command: ConsolidateCommands,
    },

    /// Poll stats continuously
    Monitor {
        /// Seconds between polls
        #[arg(long, default_value = "5")]
        interval: u64,
    },
}

#[derive(Subcommand)]
enum MemoryCommands {
    /// List recent memories
    List {
        /// Maximum memories to show
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Memory type (episodic, semantic, procedural, metacognitive)
        #[arg(long = "type", default_value = "episodic")]
        memory_type: String,
    },
    /// Show one memory by id (records an access)
    Show {
        /// Memory id
        id: String,
    },
    /// Semantic search
    Search {
        /// Query text
        query: String,
        /// Maximum results
        #[arg(long, default_value = "10")]
        limit: usize,
        /// Memory type to search
        #[arg(long = "type", default_value = "episodic")]
        memory_type: String,
    },
}

#[derive(Subcommand)]
enum ConsolidateCommands {
    /// Trigger a consolidation pass and print the report
    Test {
        /// One-off batch-size override (2-10)
        #[arg(long)]
        batch_size: Option<usize>,
    },
}

/// HTTP client against the journal API
struct Api {
    client: reqwest::Client,
    base: String,
}

impl Api {
    fn new(endpoint: &str, prefix: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base: format!(
                "{}{}",
                endpoint.trim_end_matches('/'),
                prefix.trim_end_matches('/')
            ),
        }
    }

    async fn get(&self, path: &str) -> anyhow::Result<Value> {
        let response = self.client.get(format!("{}{path}", self.base)).send().await?;
        Self::parse(response).await
    }

    async fn post(&self, path: &str, body: Value) -> anyhow::Result<Value> {
        let response = self
            .client
            .post(format!("{}{path}", self.base))
            .json(&body)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn parse(response: reqwest::Response) -> anyhow::Result<Value> {
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let message = body["error"].as_str().unwrap_or("unknown error");
            anyhow::bail!("server returned {status}: {message}");
        }
        Ok(body)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let api = Api::new(&cli.endpoint, &cli.prefix);

    match cli.command {
        Commands::Memory { command } => match command {
            MemoryCommands::List { limit, memory_type } => run_list(&api, limit, &memory_type).await,
            MemoryCommands::Show { id } => run_show(&api, &id).await,
            MemoryCommands::Search {
                query,
                limit,
                memory_type,
            } => run_search(&api, &query, limit, &memory_type).await,
        },
        Commands::Stats => run_stats(&api).await,
        Commands::Consolidate { command } => match command {
            ConsolidateCommands::Test { batch_size } => run_consolidate(&api, batch_size).await,
        },
        Commands::Monitor { interval } => run_monitor(&api, interval).await,
    }
}

/// List recent memories
async fn run_list(api: &Api, limit: usize, memory_type: &str) -> anyhow::Result<()> {
    let body = api
        .get(&format!("/journal?limit={limit}&type={memory_type}"))
        .await?;

    let memories = body["memories"].as_array().cloned().unwrap_or_default();
    println!(
        "{} {} {}",
        "===".cyan(),
        format!("{} {} memories", memories.len(), memory_type).cyan().bold(),
        "===".cyan()
    );
    for memory in &memories {
        print_memory_line(memory);
    }
    if memories.is_empty() {
        println!("{}", "No memories found.".dimmed());
    }
    Ok(())
}

/// Show one memory in full
async fn run_show(api: &Api, id: &str) -> anyhow::Result<()> {
    let body = api.get(&format!("/journal/{id}")).await?;
    let memory = &body["memory"];

    println!("{}: {}", "Id".white().bold(), memory["id"].as_str().unwrap_or("?"));
    println!("{}: {}", "Kind".white().bold(), memory["kind"].as_str().unwrap_or("?"));
    println!("{}: {}", "Created".white().bold(), memory["createdAt"].as_str().unwrap_or("?"));
    println!(
        "{}: {}",
        "Last accessed".white().bold(),
        memory["lastAccessedAt"].as_str().unwrap_or("?")
    );
    println!(
        "{}: {}",
        "Access count".white().bold(),
        memory["accessCount"].as_u64().unwrap_or(0)
    );
    if let Some(metadata) = memory["metadata"].as_object().filter(|m| !m.is_empty()) {
        println!("{}:", "Metadata".white().bold());
        for (key, value) in metadata {
            println!("  {key}: {}", value.as_str().unwrap_or(""));
        }
    }
    if let Some(sources) = memory["sourceIds"].as_array().filter(|s| !s.is_empty()) {
        println!("{}: {} source memories", "Consolidated from".white().bold(), sources.len());
    }
    println!();
    println!("{}", memory["content"].as_str().unwrap_or(""));
    Ok(())
}

/// Semantic search
async fn run_search(api: &Api, query: &str, limit: usize, memory_type: &str) -> anyhow::Result<()> {
    let body = api
        .post(
            "/journal/search",
            serde_json::json!({ "content": query, "memoryType": memory_type, "limit": limit }),
        )
        .await?;

    let memories = body["memories"].as_array().cloned().unwrap_or_default();
    println!(
        "{} {} {}",
        "===".cyan(),
        format!("{} results", memories.len()).cyan().bold(),
        "===".cyan()
    );
    for memory in &memories {
        let composite = memory["score"]["composite"].as_f64().unwrap_or(0.0);
        let relevance = memory["score"]["relevanceScore"].as_f64().unwrap_or(0.0);
        println!(
            "{} {}",
            format!("[{composite:.3} composite / {relevance:.3} relevance]").yellow(),
            snippet(memory["content"].as_str().unwrap_or(""))
        );
    }
    if memories.is_empty() {
        println!("{}", "No matches.".dimmed());
    }
    Ok(())
}

/// One-shot stats
async fn run_stats(api: &Api) -> anyhow::Result<()> {
    let body = api.get("/journal/stats").await?;
    print_stats(&body);
    Ok(())
}

/// Trigger consolidation and print the report
async fn run_consolidate(api: &Api, batch_size: Option<usize>) -> anyhow::Result<()> {
    let path = match batch_size {
        Some(size) => format!("/journal/consolidate?max_batch_size={size}"),
        None => "/journal/consolidate".to_string(),
    };
    let report = api.post(&path, serde_json::json!({})).await?;

    println!("{}", "=== Consolidation Report ===".cyan().bold());
    println!(
        "{}: {}",
        "Candidates examined".white().bold(),
        report["candidatesExamined"].as_u64().unwrap_or(0)
    );
    println!("{}: {}", "Groups formed".white().bold(), report["groupsFormed"].as_u64().unwrap_or(0));
    println!(
        "{}: {}",
        "Batches attempted".white().bold(),
        report["batchesAttempted"].as_u64().unwrap_or(0)
    );
    println!(
        "{}: {}",
        "Batches consolidated".white().bold(),
        report["batchesConsolidated"].as_u64().unwrap_or(0)
    );
    println!(
        "{}: {}",
        "Memories created".white().bold(),
        report["memoriesCreated"].as_u64().unwrap_or(0)
    );
    println!(
        "{}: {} ms",
        "Duration".white().bold(),
        report["durationMs"].as_u64().unwrap_or(0)
    );

    let failures = report["failures"].as_array().cloned().unwrap_or_default();
    if failures.is_empty() {
        println!("{}", "No failures.".green());
    } else {
        println!("{}", format!("{} failures:", failures.len()).red().bold());
        for failure in failures {
            println!("  {}", failure.as_str().unwrap_or("?").red());
        }
    }
    Ok(())
}

/// Poll stats until interrupted
async fn run_monitor(api: &Api, interval: u64) -> anyhow::Result<()> {
    let interval = interval.max(1);
    println!(
        "{}",
        format!("Polling stats every {interval}s (Ctrl+C to stop)").dimmed()
    );
    loop {
        match api.get("/journal/stats").await {
            Ok(body) => {
                println!();
                println!("{}", chrono::Utc::now().format("%H:%M:%S").to_string().dimmed());
                print_stats(&body);
            }
            Err(e) => println!("{}", format!("stats unavailable: {e}").red()),
        }
        tokio::time::sleep(Duration::from_secs(interval)).await;
    }
}

fn print_stats(body: &Value) {
    println!("{}", "=== Engram Memory Statistics ===".cyan().bold());
    for kind in ["episodic", "semantic", "procedural", "metacognitive"] {
        println!(
            "{}: {}",
            capitalized(kind).white().bold(),
            body[kind].as_u64().unwrap_or(0)
        );
    }
    println!("{}: {}", "Total".white().bold(), body["total"].as_u64().unwrap_or(0));
    if let Some(dropped) = body["droppedEvents"].as_u64() {
        if dropped > 0 {
            println!("{}: {}", "Dropped events".red().bold(), dropped);
        }
    }
}

fn print_memory_line(memory: &Value) {
    let id = memory["id"].as_str().unwrap_or("?");
    let short_id = &id[..id.len().min(8)];
    let created = memory["createdAt"].as_str().unwrap_or("?");
    println!(
        "{} {} {}",
        short_id.yellow(),
        created.dimmed(),
        snippet(memory["content"].as_str().unwrap_or(""))
    );
}

fn snippet(content: &str) -> String {
    const MAX: usize = 80;
    let line = content.lines().next().unwrap_or("");
    if line.chars().count() <= MAX {
        line.to_string()
    } else {
        let truncated: String = line.chars().take(MAX).collect();
        format!("{truncated}...")
    }
}

fn capitalized(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

use clap::Parser;
use docqa_context::text::{
    Chunker, ChunkingConfig, ChunkPolicy, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, PageText,
};
use std::fs;
use std::io::{self, Read};
use std::process;

/// A CLI tool to chunk extracted page records into JSON output using docqa-context.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON array of `{page, type, content}` records. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Maximum length for each chunk, in characters.
    #[arg(short = 's', long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Characters shared by consecutive chunks of the same page.
    #[arg(short = 'o', long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,

    /// Chunking policy: `sliding-window` or `whole-page`.
    #[arg(short, long, default_value = "sliding-window")]
    policy: ChunkPolicy,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let input = if let Some(input_path) = args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let pages: Vec<PageText> = serde_json::from_str(&input)?;

    let chunker = Chunker::new(
        ChunkingConfig::default()
            .with_chunk_size(args.chunk_size)
            .with_chunk_overlap(args.chunk_overlap)
            .with_policy(args.policy),
    )?;

    let chunks = chunker.chunk_pages(&pages)?;

    println!("{}", serde_json::to_string_pretty(&chunks)?);

    Ok(())
}

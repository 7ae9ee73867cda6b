use bgcode::{BgcodeFile, BlockContent, CancelToken};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bgcode", about = "The .bgcode binary G-code container CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the container header and block table
    Info {
        input: PathBuf,
        /// Emit machine-readable JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print metadata properties from every metadata block
    Meta {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Reassemble the instruction stream as plain G-code text
    Gcode {
        input: PathBuf,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Extract embedded thumbnails as PNG files
    Thumbnails {
        input: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Verify per-block checksums
    Check {
        input: PathBuf,
    },
}

#[derive(Serialize)]
struct BlockSummary {
    kind: &'static str,
    compression: &'static str,
    uncompressed_size: u32,
    compressed_size: u32,
    checksum_valid: bool,
}

#[derive(Serialize)]
struct FileSummary {
    magic: String,
    magic_valid: bool,
    version: u32,
    checksum: &'static str,
    blocks: Vec<BlockSummary>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input, json } => {
            let file = open(&input)?;
            let summary = summarize(&file);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("── .bgcode container ───────────────────────────────────");
                println!("  Path           {}", input.display());
                println!("  Magic          {} ({})", summary.magic,
                         if summary.magic_valid { "ok" } else { "MISMATCH" });
                println!("  Version        {}", summary.version);
                println!("  Checksums      {}", summary.checksum);
                println!("  Blocks         {}", summary.blocks.len());
                println!();
                println!("{:<4} {:<18} {:<16} {:>12} {:>12}  Checksum",
                         "#", "Kind", "Compression", "Size", "Stored");
                for (index, block) in summary.blocks.iter().enumerate() {
                    println!("{:<4} {:<18} {:<16} {:>12} {:>12}  {}",
                        index, block.kind, block.compression,
                        block.uncompressed_size, block.compressed_size,
                        if block.checksum_valid { "ok" } else { "INVALID" });
                }
            }
        }

        // ── Meta ─────────────────────────────────────────────────────────────
        Commands::Meta { input, json } => {
            let file = open(&input)?;
            let mut merged: BTreeMap<String, String> = BTreeMap::new();
            for block in file.blocks() {
                if let Some(properties) = block.properties() {
                    for (key, value) in properties {
                        merged.insert(key.clone(), value.clone());
                    }
                }
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&merged)?);
            } else {
                for (key, value) in &merged {
                    println!("{key} = {value}");
                }
            }
        }

        // ── Gcode ────────────────────────────────────────────────────────────
        Commands::Gcode { input, output } => {
            let file = open(&input)?;
            let mut text = String::new();
            for instruction in file.instructions() {
                text.push_str(&instruction.raw);
                text.push('\n');
            }
            match output {
                Some(path) => {
                    File::create(&path)?.write_all(text.as_bytes())?;
                    println!("Wrote {}", path.display());
                }
                None => print!("{text}"),
            }
        }

        // ── Thumbnails ───────────────────────────────────────────────────────
        Commands::Thumbnails { input, output_dir } => {
            let file = open(&input)?;
            if !output_dir.exists() {
                std::fs::create_dir_all(&output_dir)?;
            }
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "thumbnail".to_owned());
            let mut count = 0usize;
            for block in file.thumbnails() {
                if let BlockContent::Thumbnail { width, height, image, .. } = block.content() {
                    let path = output_dir.join(format!("{stem}_{count}_{width}x{height}.png"));
                    File::create(&path)?.write_all(image.png_bytes())?;
                    println!("  extracted  {}", path.display());
                    count += 1;
                }
            }
            println!("Extracted {count} thumbnail(s)");
        }

        // ── Check ────────────────────────────────────────────────────────────
        Commands::Check { input } => {
            let file = open(&input)?;
            let mut failures = 0usize;
            if !file.header.magic_valid() {
                println!("magic tag mismatch: {:?}", file.header.magic);
            }
            for (index, block) in file.blocks().iter().enumerate() {
                let verdict = if block.checksum.valid { "ok" } else { "INVALID" };
                println!("block {:<3} {:<18} {}", index, block.kind().name(), verdict);
                if !block.checksum.valid {
                    failures += 1;
                }
            }
            if failures > 0 {
                eprintln!("{failures} block(s) failed checksum verification");
                std::process::exit(1);
            }
            println!("All {} block(s) verified", file.blocks().len());
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn open(path: &Path) -> Result<BgcodeFile, Box<dyn std::error::Error>> {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file = File::open(path)?;
    Ok(bgcode::parse(&name, file, &CancelToken::new())?)
}

fn summarize(file: &BgcodeFile) -> FileSummary {
    FileSummary {
        magic: String::from_utf8_lossy(&file.header.magic).into_owned(),
        magic_valid: file.header.magic_valid(),
        version: file.header.version,
        checksum: file.header.checksum_kind.name(),
        blocks: file
            .blocks()
            .iter()
            .map(|block| BlockSummary {
                kind: block.kind().name(),
                compression: block.header.compression.name(),
                uncompressed_size: block.header.uncompressed_size,
                compressed_size: block.header.compressed_size,
                checksum_valid: block.checksum.valid,
            })
            .collect(),
    }
}

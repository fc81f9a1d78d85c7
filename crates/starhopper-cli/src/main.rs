//! starhopper - A tool for browsing Bethesda game data containers
//!
//! Usage:
//!   starhopper list <ba2_file> [filter]      - List files matching filter
//!   starhopper extract <ba2_file> [filter]   - Extract files matching filter
//!   starhopper info <ba2_file>               - Show archive information
//!   starhopper esm <esm_file> [-f filter]    - Dump the record tree of a plugin
//!   starhopper strings <strings_file>        - Dump a string table
//!   starhopper cdb <cdb_file>                - List CompiledDB records
//!   starhopper mesh <mesh_file> [-o obj]     - Show a mesh header or export OBJ

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use starhopper::btdx_utils::{extract_archive, list_files, show_info, ExtractOptions};
use starhopper::esm::utils::{dump_esm, show_info as show_esm_info};
use starhopper::utils::format_size;
use starhopper::{CompiledDb, MeshFile, StringTable, StringsKind};

#[derive(Parser)]
#[command(name = "starhopper")]
#[command(version = "0.1.0")]
#[command(about = "Browse and extract Bethesda game data containers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Strings,
    Dlstrings,
    Ilstrings,
}

impl From<Kind> for StringsKind {
    fn from(k: Kind) -> Self {
        match k {
            Kind::Strings => StringsKind::Strings,
            Kind::Dlstrings => StringsKind::DlStrings,
            Kind::Ilstrings => StringsKind::IlStrings,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List files in a BA2 archive
    List {
        /// Path to the .ba2 file
        ba2_file: PathBuf,
        /// Filter pattern (e.g., *.nif, meshes/*)
        filter: Option<String>,
    },
    /// Extract files from a BA2 archive
    Extract {
        /// Path to the .ba2 file
        ba2_file: PathBuf,
        /// Filter pattern
        filter: Option<String>,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
        /// Overwrite existing files
        #[arg(short = 'w', long)]
        overwrite: bool,
        /// Write every file into the output directory, dropping archive directories
        #[arg(long)]
        flatten: bool,
    },
    /// Show BA2 archive information
    Info {
        /// Path to the .ba2 file
        ba2_file: PathBuf,
    },
    /// Show or dump an ESM plugin
    Esm {
        /// Path to the .esm file
        esm_file: PathBuf,
        /// Only dump top level groups whose label matches (e.g., GMST)
        #[arg(short, long)]
        filter: Option<String>,
        /// Show a summary instead of the record tree
        #[arg(long)]
        info: bool,
    },
    /// Dump a string table
    Strings {
        /// Path to the .strings, .dlstrings or .ilstrings file
        strings_file: PathBuf,
        /// Table kind (default: from the file extension)
        #[arg(short, long, value_enum)]
        kind: Option<Kind>,
        /// Only print this string id
        #[arg(long, value_parser = parse_id)]
        id: Option<u32>,
    },
    /// List CompiledDB records
    Cdb {
        /// Path to the .cdb file
        cdb_file: PathBuf,
        /// Write a copy of the database to this path
        #[arg(long)]
        save: Option<PathBuf>,
        /// Version to write with --save (default: keep the current one)
        #[arg(long)]
        version: Option<u32>,
    },
    /// Show a mesh header or export it as Wavefront OBJ
    Mesh {
        /// Path to the .mesh file
        mesh_file: PathBuf,
        /// Write an OBJ file
        #[arg(short, long)]
        obj: Option<PathBuf>,
    },
}

/// Accept decimal or `0x` prefixed hexadecimal ids
fn parse_id(s: &str) -> Result<u32, String> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    }
    .map_err(|e| format!("invalid string id {}: {}", s, e))
}

/// `RUST_LOG` style directives, falling back to `warn` when unset or invalid
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"))
}

fn main() -> Result<()> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(directives.as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List { ba2_file, filter } => {
            list_files(&ba2_file, filter.as_deref())?;
        }
        Commands::Extract {
            ba2_file,
            filter,
            output,
            overwrite,
            flatten,
        } => {
            let options = ExtractOptions { overwrite, flatten };
            let summary = extract_archive(&ba2_file, filter.as_deref(), &output, &options)?;
            if summary.failed > 0 {
                tracing::warn!(failed = summary.failed, "some entries could not be extracted");
                std::process::exit(2);
            }
        }
        Commands::Info { ba2_file } => {
            show_info(&ba2_file)?;
        }
        Commands::Esm {
            esm_file,
            filter,
            info,
        } => {
            if info {
                show_esm_info(&esm_file)?;
            } else {
                dump_esm(&esm_file, filter.as_deref())?;
            }
        }
        Commands::Strings { strings_file, kind, id } => {
            let mut table = match kind {
                Some(kind) => StringTable::open_as(&strings_file, kind.into()),
                None => StringTable::open(&strings_file),
            }
            .with_context(|| format!("Failed to open {}", strings_file.display()))?;

            let strings = table.strings()?;
            match id {
                Some(id) => match strings.get(&id) {
                    Some(text) => println!("{}", text),
                    None => anyhow::bail!("String {:#010x} not found", id),
                },
                None => {
                    for (id, text) in strings {
                        println!("{:#010x}\t{}", id, text);
                    }
                }
            }
        }
        Commands::Cdb {
            cdb_file,
            save,
            version,
        } => {
            let db = CompiledDb::open(&cdb_file).with_context(|| format!("Failed to open {}", cdb_file.display()))?;

            println!("Version: {}", db.version);
            println!("Records: {}", db.records.len());
            for (index, record) in db.records.iter().enumerate() {
                println!("{:>6} {} {:>10}", index, record.tag, format_size(record.data.len() as u64));
            }

            if let Some(path) = save {
                let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
                db.save(BufWriter::new(file), version.unwrap_or(db.version))?;
                println!("Saved {}", path.display());
            }
        }
        Commands::Mesh { mesh_file, obj } => {
            let mut mesh =
                MeshFile::open(&mesh_file).with_context(|| format!("Failed to open {}", mesh_file.display()))?;

            let header = mesh.mesh().clone();
            println!("Version: {}", header.version);
            println!("Coordinate scale: {}", header.coordinate_scale);
            println!("Weights per vertex: {}", header.weights_per_vertex);
            println!("Triangles: {}", header.triangles.count / 3);
            println!("Vertices: {}", header.vertices.count);
            println!("UVs: {}", header.uvs.count);
            println!("Colors: {}", header.colors.count);
            println!("Normals: {}", header.normals.count);
            println!("Tangents: {}", header.tangents.count);

            if let Some(path) = obj {
                let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
                let mut out = BufWriter::new(file);
                mesh.write_obj(&mut out)?;
                println!("Exported {}", path.display());
            }
        }
    }

    Ok(())
}

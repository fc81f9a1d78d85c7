//! BA2 archive utility functions
//!
//! This module contains the listing, extraction and summary operations the
//! command line tool runs over package containers.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use crate::{
    archive::Archive,
    utils::{create_glob_matcher, flatten_path, format_size, matches_filter},
    BtdxArchive,
};

/// Options for extracting entries to disk
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Overwrite files that already exist in the output directory
    pub overwrite: bool,
    /// Drop directory components and write every entry into the output root
    pub flatten: bool,
}

/// Totals gathered by [`extract_files`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub extracted: u64,
    pub failed: u64,
}

/// List files in a BA2 archive with optional filtering
pub fn list_files(ba2_path: &Path, filter: Option<&str>) -> Result<()> {
    println!("Opening {}...", ba2_path.display());

    let mut ba2 = BtdxArchive::open(ba2_path)
        .with_context(|| format!("Failed to open {}", ba2_path.display()))?;

    let matcher = filter.map(create_glob_matcher).transpose()?;

    let mut count = 0u64;
    let mut total_size = 0u64;
    let mut packed_size = 0u64;

    for file in ba2.files()? {
        if matches_filter(&file.path, matcher.as_ref()) {
            let method = if file.is_compressed() { "Packed" } else { "Store" };

            println!(
                "{:>10} {:>10} {:>6} {}",
                format_size(file.unpacked_size as u64),
                format_size(file.stored_size()),
                method,
                file.path
            );

            count += 1;
            total_size += file.unpacked_size as u64;
            packed_size += file.stored_size();
        }
    }

    println!();
    println!(
        "Total: {} files, {} ({} stored)",
        count,
        format_size(total_size),
        format_size(packed_size)
    );

    Ok(())
}

/// Extract files from an archive into `output`, with optional filtering.
///
/// A failing entry is reported and skipped; the remaining entries are still
/// extracted.
pub fn extract_files<A: Archive>(
    archive: &mut A,
    filter: Option<&str>,
    output: &Path,
    options: &ExtractOptions,
) -> Result<ExtractSummary> {
    let matcher = filter.map(create_glob_matcher).transpose()?;

    let entries: Vec<_> = archive
        .entries()?
        .into_iter()
        .filter(|e| matches_filter(&e.path, matcher.as_ref()))
        .collect();

    let mut summary = ExtractSummary::default();
    if entries.is_empty() {
        println!("No files match the filter");
        return Ok(summary);
    }

    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    println!("Extracting {} files...", entries.len());

    let pb = ProgressBar::new(entries.len() as u64);
    pb.set_style(ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
    )?);

    for entry in &entries {
        pb.set_message(entry.path.clone());

        let result = if options.flatten {
            let mut flat = entry.clone();
            flat.path = flatten_path(&entry.path).to_string();
            archive.extract_into(&flat, output, options.overwrite)
        } else {
            archive.extract_into(entry, output, options.overwrite)
        };

        match result {
            Ok(_) => summary.extracted += 1,
            Err(e) => {
                pb.println(format!("Error extracting {}: {}", entry.path, e));
                summary.failed += 1;
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("Done");

    println!();
    println!("Extracted: {} files", summary.extracted);
    if summary.failed > 0 {
        println!("Failed: {} files", summary.failed);
    }

    Ok(summary)
}

/// Open a BA2 archive and extract matching files
pub fn extract_archive(
    ba2_path: &Path,
    filter: Option<&str>,
    output: &Path,
    options: &ExtractOptions,
) -> Result<ExtractSummary> {
    println!("Opening {}...", ba2_path.display());

    let mut ba2 = BtdxArchive::open(ba2_path)
        .with_context(|| format!("Failed to open {}", ba2_path.display()))?;

    extract_files(&mut ba2, filter, output, options)
}

/// Show BA2 archive information
pub fn show_info(ba2_path: &Path) -> Result<()> {
    println!("Opening {}...", ba2_path.display());

    let mut ba2 = BtdxArchive::open(ba2_path)
        .with_context(|| format!("Failed to open {}", ba2_path.display()))?;

    let header = ba2.header().clone();
    let files = ba2.files()?;

    let mut total_size = 0u64;
    let mut stored_size = 0u64;
    let mut packed_count = 0u64;

    for file in files {
        total_size += file.unpacked_size as u64;
        stored_size += file.stored_size();
        if file.is_compressed() {
            packed_count += 1;
        }
    }

    let ratio = if total_size > 0 {
        (stored_size as f64 / total_size as f64) * 100.0
    } else {
        0.0
    };

    println!();
    println!("Archive Information:");
    println!("  File: {}", ba2_path.display());
    println!("  Version: {}", header.version);
    println!("  Kind: {}", header.kind);
    println!("  Declared files: {}", header.file_count);
    println!("  Indexed files: {}", files.len());
    println!("  Uncompressed size: {}", format_size(total_size));
    println!("  Stored size: {} ({:.1}%)", format_size(stored_size), ratio);
    println!();
    println!("Compression:");
    println!("  Packed: {} files", packed_count);
    println!("  Stored: {} files", files.len() as u64 - packed_count);

    Ok(())
}

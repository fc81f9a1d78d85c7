//! ESM utility functions
//!
//! Summary and tree dumps used by the command line tool.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::{self, Read, Seek, Write};
use std::path::Path;

use super::records::HighLevelRecord;
use super::{EsmFile, Group, Record, Unit};
use crate::common::Tag;
use crate::utils::{create_glob_matcher, matches_filter};

/// Totals gathered while walking a whole file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EsmStats {
    pub top_level_groups: u64,
    pub groups: u64,
    pub records: BTreeMap<Tag, u64>,
}

impl EsmStats {
    pub fn record_count(&self) -> u64 {
        self.records.values().sum()
    }
}

/// Walk every group and record of the file
pub fn collect_stats<R: Read + Seek>(esm: &mut EsmFile<R>) -> Result<EsmStats> {
    let mut stats = EsmStats::default();
    let top = esm.units()?.to_vec();
    stats.top_level_groups = top.iter().filter(|u| matches!(u, Unit::Group(_))).count() as u64;

    let mut pending = top;
    while let Some(unit) = pending.pop() {
        match unit {
            Unit::Group(group) => {
                stats.groups += 1;
                let children = esm
                    .children(&group)
                    .collect::<crate::Result<Vec<_>>>()
                    .with_context(|| format!("Failed to read group {}", group.display_label()))?;
                pending.extend(children);
            }
            Unit::Record(record) => {
                *stats.records.entry(record.tag).or_default() += 1;
            }
        }
    }
    Ok(stats)
}

/// Show ESM file information
pub fn show_info(esm_path: &Path) -> Result<()> {
    println!("Opening {}...", esm_path.display());

    let mut esm = EsmFile::open(esm_path).with_context(|| format!("Failed to open {}", esm_path.display()))?;
    let header = esm.header().clone();
    let stats = collect_stats(&mut esm)?;

    println!();
    println!("ESM Information:");
    println!("  File: {}", esm_path.display());
    println!("  Version: {}", header.version);
    println!("  Flags: {:?}", header.flags);
    println!("  Top level groups: {}", stats.top_level_groups);
    println!("  Groups: {}", stats.groups);
    println!("  Records: {}", stats.record_count());
    println!();
    println!("Records by type:");
    for (tag, count) in &stats.records {
        println!("  {}: {}", tag, count);
    }

    Ok(())
}

/// Print the group/record tree, decoding records that have a descriptor.
///
/// `filter` selects top level groups by label, e.g. `GMST` or `GL*`. A top
/// level group that fails to parse is reported and skipped.
pub fn dump_tree<R: Read + Seek, W: Write>(esm: &mut EsmFile<R>, filter: Option<&str>, out: &mut W) -> Result<()> {
    let matcher = filter.map(create_glob_matcher).transpose()?;

    let header = esm.header().clone();
    write_record(esm, &header, 0, out)?;

    for unit in esm.units()?.to_vec() {
        if let Unit::Group(group) = &unit {
            if !matches_filter(&group.display_label(), matcher.as_ref()) {
                continue;
            }
        } else if matcher.is_some() {
            continue;
        }

        if let Err(e) = write_unit(esm, &unit, 0, out) {
            writeln!(out, "Error reading {}: {:#}", unit, e)?;
        }
    }
    Ok(())
}

/// Print the tree of an ESM file to stdout
pub fn dump_esm(esm_path: &Path, filter: Option<&str>) -> Result<()> {
    let mut esm = EsmFile::open(esm_path).with_context(|| format!("Failed to open {}", esm_path.display()))?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    dump_tree(&mut esm, filter, &mut out)
}

fn write_unit<R: Read + Seek, W: Write>(esm: &mut EsmFile<R>, unit: &Unit, depth: usize, out: &mut W) -> Result<()> {
    match unit {
        Unit::Group(group) => write_group(esm, group, depth, out),
        Unit::Record(record) => write_record(esm, record, depth, out),
    }
}

fn write_group<R: Read + Seek, W: Write>(esm: &mut EsmFile<R>, group: &Group, depth: usize, out: &mut W) -> Result<()> {
    writeln!(out, "{:indent$}GRUP {}", "", group.display_label(), indent = depth * 2)?;
    let children = esm.children(group).collect::<crate::Result<Vec<_>>>()?;
    for child in &children {
        write_unit(esm, child, depth + 1, out)?;
    }
    Ok(())
}

fn write_record<R: Read + Seek, W: Write>(
    esm: &mut EsmFile<R>,
    record: &Record,
    depth: usize,
    out: &mut W,
) -> Result<()> {
    let handler = HighLevelRecord::handler(record);
    writeln!(
        out,
        "{:indent$}{} [{:08X}] {}",
        "",
        record.tag,
        record.form_id,
        handler.label(),
        indent = depth * 2
    )?;

    if !HighLevelRecord::can_be_handled(record) {
        return Ok(());
    }

    let decoded = HighLevelRecord::read(esm, record)?;
    for field in decoded.results() {
        for (name, value) in field.values.iter() {
            writeln!(
                out,
                "{:indent$}{} ({}): {}",
                "",
                field.name,
                name,
                value,
                indent = depth * 2 + 2
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::esm::file::tests::{esm, field, group, record};
    use std::io::Cursor;

    fn sample() -> EsmFile<Cursor<Vec<u8>>> {
        let glob = record(
            b"GLOB",
            0,
            0x10,
            &[field(b"EDID", b"GameHour\0"), field(b"FLTV", &9.5f32.to_le_bytes())].concat(),
        );
        let weap = record(b"WEAP", 0, 0x20, &field(b"EDID", b"Gun\0"));
        let nested = group(b"\x01\0\0\0", 1, &weap);
        let bytes = esm(&[group(b"GLOB", 0, &glob), group(b"WEAP", 0, &[weap.clone(), nested].concat())]);
        EsmFile::new(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn test_collect_stats() {
        let stats = collect_stats(&mut sample()).unwrap();
        assert_eq!(stats.top_level_groups, 2);
        assert_eq!(stats.groups, 3);
        assert_eq!(stats.records.get(&Tag::new(b"WEAP")), Some(&2));
        assert_eq!(stats.record_count(), 3);
    }

    #[test]
    fn test_dump_tree_decodes_known_records() {
        let mut out = Vec::new();
        dump_tree(&mut sample(), None, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("TES4 [00000000] An Unknown Record\n"));
        assert!(text.contains("GRUP GLOB\n  GLOB [00000010] Global\n"));
        assert!(text.contains("    Value (value): 9.5\n"));
        assert!(text.contains("\n  GRUP World Children [00000001]\n"));
    }

    #[test]
    fn test_dump_tree_filter() {
        let mut out = Vec::new();
        dump_tree(&mut sample(), Some("GLOB"), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("GRUP GLOB"));
        assert!(!text.contains("WEAP"));
    }
}

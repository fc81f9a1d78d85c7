use byteorder::{LittleEndian, WriteBytesExt};
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use starhopper::esm::records::{HighLevelRecord, Value};
use starhopper::esm::{EsmFile, Unit};
use starhopper::io::BinaryWriter;
use starhopper::strings::write_strings;
use starhopper::{Archive, BtdxArchive, CdbRecord, CompiledDb, Error, StringTable, StringsKind, Tag};

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Version 1 GNRL archive with one stored and one zlib packed entry
fn ba2() -> Vec<u8> {
    let stored = b"hello";
    let text = b"packed text packed text packed text";
    let packed = zlib(text);

    let data_start = 24 + 2 * 36;
    let names_offset = data_start + stored.len() + packed.len();

    let mut out = Vec::new();
    out.write_all(b"BTDX").unwrap();
    out.write_u32::<LittleEndian>(1).unwrap();
    out.write_all(b"GNRL").unwrap();
    out.write_u32::<LittleEndian>(2).unwrap();
    out.write_u64::<LittleEndian>(names_offset as u64).unwrap();

    for (offset, packed_size, unpacked_size) in [
        (data_start, 0, stored.len()),
        (data_start + stored.len(), packed.len(), text.len()),
    ] {
        out.write_u32::<LittleEndian>(0).unwrap();
        out.write_all(b"txt\0").unwrap();
        out.write_u32::<LittleEndian>(0).unwrap();
        out.write_u32::<LittleEndian>(0).unwrap();
        out.write_u64::<LittleEndian>(offset as u64).unwrap();
        out.write_u32::<LittleEndian>(packed_size as u32).unwrap();
        out.write_u32::<LittleEndian>(unpacked_size as u32).unwrap();
        out.write_u32::<LittleEndian>(0).unwrap();
    }
    out.write_all(stored).unwrap();
    out.write_all(&packed).unwrap();
    for name in ["a.txt", "docs\\b.txt"] {
        out.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        out.write_all(name.as_bytes()).unwrap();
    }
    out
}

#[test]
fn package_archive_through_the_archive_trait() {
    let mut archive = BtdxArchive::new(Cursor::new(ba2())).unwrap();
    let entries = archive.entries().unwrap();
    assert_eq!(entries.len(), 2);

    let mut hello = String::new();
    archive.open(&entries[0]).unwrap().read_to_string(&mut hello).unwrap();
    assert_eq!(hello, "hello");

    assert!(entries[1].is_compressed());
    assert_eq!(
        archive.read(&entries[1]).unwrap(),
        b"packed text packed text packed text"
    );

    let dir = tempfile::tempdir().unwrap();
    let written = archive.extract_into(&entries[1], dir.path(), false).unwrap();
    assert_eq!(written, dir.path().join("docs").join("b.txt"));
    assert!(matches!(
        archive.extract_into(&entries[1], dir.path(), false),
        Err(Error::AlreadyExists(_))
    ));
}

#[test]
fn compiled_db_round_trip() {
    let db = CompiledDb {
        version: 4,
        record_count: 0,
        records: vec![CdbRecord::new(Tag::new(b"BETH"), vec![]), CdbRecord::new(Tag::new(b"STRT"), b"x".to_vec())],
    };
    let mut out = Cursor::new(Vec::new());
    db.save(&mut out, 5).unwrap();

    let reread = CompiledDb::read_from(Cursor::new(out.into_inner())).unwrap();
    assert_eq!(reread.records, db.records);
    assert_eq!(reread.record_count, 3);
}

#[test]
fn string_table_round_trip_with_fallback_text() {
    let mut strings = BTreeMap::new();
    strings.insert(0x10, "Ship".to_string());
    strings.insert(0x11, "Señor".to_string());

    for kind in [StringsKind::Strings, StringsKind::DlStrings, StringsKind::IlStrings] {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new())).unwrap();
        write_strings(&mut writer, kind, &strings, true).unwrap();
        let bytes = writer.into_inner().into_inner();
        assert!(bytes.windows(5).any(|w| w == b"Se\xf1or"));

        let mut table = StringTable::new(Cursor::new(bytes), kind).unwrap();
        assert_eq!(table.strings().unwrap(), &strings);
    }
}

fn record(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    out.write_u32::<LittleEndian>(body.len() as u32).unwrap();
    out.write_u32::<LittleEndian>(0).unwrap();
    out.write_u32::<LittleEndian>(0).unwrap();
    out.write_u32::<LittleEndian>(0).unwrap();
    out.write_u16::<LittleEndian>(0).unwrap();
    out.write_u16::<LittleEndian>(0).unwrap();
    out.extend_from_slice(body);
    out
}

fn field(tag: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    out.write_u16::<LittleEndian>(data.len() as u16).unwrap();
    out.extend_from_slice(data);
    out
}

#[test]
fn plugin_with_game_settings() {
    let setting = record(b"GMST", &[field(b"EDID", b"fJumpHeight\0"), field(b"DATA", &1.5f32.to_le_bytes())].concat());

    let mut bytes = record(b"TES4", &[]);
    bytes.write_all(b"GRUP").unwrap();
    bytes.write_u32::<LittleEndian>(24 + setting.len() as u32).unwrap();
    bytes.write_all(b"GMST").unwrap();
    bytes.write_u32::<LittleEndian>(0).unwrap();
    bytes.write_u64::<LittleEndian>(0).unwrap();
    bytes.write_all(&setting).unwrap();

    let mut esm = EsmFile::new(Cursor::new(bytes)).unwrap();
    let Unit::Group(group) = esm.units().unwrap()[0].clone() else {
        panic!("expected a group")
    };
    assert_eq!(group.display_label(), "GMST");

    let children: Vec<Unit> = esm.children(&group).collect::<Result<_, _>>().unwrap();
    let Unit::Record(gmst) = &children[0] else {
        panic!("expected a record")
    };
    let decoded = HighLevelRecord::read(&mut esm, gmst).unwrap();
    assert_eq!(decoded.first("DATA").unwrap().get("value"), Some(&Value::Float(1.5)));
}

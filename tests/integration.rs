//! Integration tests for d64burner images and packing

use d64burner::filesystem::{chain_sectors, read_file};
use d64burner::format::sectors_per_track;
use d64burner::*;

fn program(name: &str, len: usize) -> ProgramFile {
    let data = (0..len).map(|i| (i % 251) as u8 + 1).collect();
    ProgramFile::new(name, data).expect("Failed to create program")
}

#[test]
fn test_geometry_totals() {
    let counts: Vec<usize> = DiskSize::ALL.iter().map(|s| s.total_sectors()).collect();
    assert_eq!(counts[0], 683);
    assert_eq!(counts[1], 700);
    assert_eq!(counts[5], 768);

    for size in DiskSize::ALL {
        let image = DiskImage::format(size);
        let per_track: usize = (1..=size.track_count())
            .map(|t| sectors_per_track(t) as usize)
            .sum();
        assert_eq!(image.total_sectors(), per_track);
        assert_eq!(image.serialize_bytes().len(), per_track * 256);
    }
}

#[test]
fn test_serialize_and_reload_preserves_structures() {
    let mut image = DiskImage::default();
    image
        .generate(&[program("ALPHA", 300), program("BETA", 10)], "ROUND TRIP")
        .expect("Failed to pack");

    let reloaded = DiskImage::from_bytes(&image.serialize_bytes()).expect("Failed to reload");
    assert_eq!(reloaded.serialize_bytes(), image.serialize_bytes());
    assert_eq!(reloaded.disk_name(), "ROUND TRIP");
    assert_eq!(reloaded.disk_id(), *b"00");
    assert_eq!(reloaded.bam(), image.bam());
    assert_eq!(reloaded.directory(), image.directory());
    assert!(!reloaded.is_changed());
}

#[test]
fn test_error_info_variant_loads() {
    let image = DiskImage::format(DiskSize::Standard);
    let mut bytes = image.serialize_bytes();
    bytes.extend(std::iter::repeat(1).take(683));

    let loaded = DiskImage::from_bytes(&bytes).expect("Failed to load image with error info");
    assert_eq!(loaded.size(), DiskSize::Standard);

    assert!(DiskImage::from_bytes(&bytes[..1000]).is_err());
}

#[test]
fn test_petascii_names_decode() {
    let mut image = DiskImage::format(DiskSize::Standard);
    let header = image.sector_mut(18, 0);
    header.set_bytes(0x90, &[0xC1, 0xC2, 0x20, 0x31, 0xA0, 0xA0]);
    header.set_bytes(0xA2, b"7X");
    image.refresh();

    assert_eq!(image.disk_name(), "AB 1");
    assert_eq!(image.header().id_string(), "7X");
}

#[test]
fn test_packed_chains_match_sizes() {
    let sizes = [1usize, 254, 255, 508, 2000];
    let programs: Vec<ProgramFile> = sizes
        .iter()
        .enumerate()
        .map(|(i, &len)| program(&format!("FILE{}", i), len))
        .collect();

    let mut image = DiskImage::default();
    let report = image.generate(&programs, "CHAINS").expect("Failed to pack");
    assert_eq!(report.files, sizes.len());
    assert_eq!(image.directory().len(), sizes.len());

    for (entry, (program, &len)) in image.directory().iter().zip(programs.iter().zip(&sizes)) {
        assert_eq!(entry.title, program.name());
        assert_eq!(entry.file_type, FileType::Prg);

        let chain = chain_sectors(&image, entry.first_track, entry.first_sector);
        let expected = len.div_ceil(254).max(1);
        assert_eq!(chain.len(), expected);
        assert_eq!(entry.blocks as usize, expected);
        assert!(chain.iter().all(|&(t, _)| t != 18));

        let (last_t, last_s) = chain[chain.len() - 1];
        assert_eq!(image.read_sector(last_t, last_s).link(), (0, 0));

        let data = read_file(&image, entry);
        assert_eq!(&data[..len], program.data());
    }

    let used: usize = sizes.iter().map(|&l| l.div_ceil(254)).sum();
    assert_eq!(report.data_sectors, used);
    assert_eq!(report.blocks_free, 664 - used);
    assert_eq!(image.header().blocks_free(), 664 - used);
}

#[test]
fn test_files_are_packed_in_order() {
    let mut image = DiskImage::default();
    image
        .generate(&[program("FIRST", 600), program("SECOND", 100)], "ORDER")
        .expect("Failed to pack");

    let first = &image.directory()[0];
    let second = &image.directory()[1];
    assert_eq!((first.first_track, first.first_sector), (1, 0));
    assert_eq!(
        chain_sectors(&image, 1, 0),
        vec![(1, 0), (1, 1), (1, 2)]
    );
    assert_eq!((second.first_track, second.first_sector), (1, 3));
}

#[test]
fn test_disk_full_leaves_image_untouched() {
    let mut image = DiskImage::default();
    image
        .generate(&[program("KEEP", 10)], "BEFORE")
        .expect("Failed to pack");
    let before = image.serialize_bytes();

    let programs = vec![program("SMALL", 100), program("HUGE", 254 * 700)];
    match image.generate(&programs, "AFTER") {
        Err(D64Error::DiskFull { file, packed }) => {
            assert_eq!(file, "HUGE");
            assert_eq!(packed, 1);
        }
        other => panic!("expected DiskFull, got {:?}", other.map(|r| r.files)),
    }
    assert_eq!(image.serialize_bytes(), before);
    assert_eq!(image.disk_name(), "BEFORE");
}

#[test]
fn test_save_and_open() {
    let dir = std::env::temp_dir().join("d64burner_integration");
    std::fs::create_dir_all(&dir).expect("Failed to create temp dir");
    let path = dir.join("saved.d64");

    let mut image = DiskImage::format(DiskSize::Extended40);
    image
        .generate(&[program("SAVED", 1000)], "ON DISK")
        .expect("Failed to pack");
    image.save(&path).expect("Failed to save image");
    assert!(!image.is_changed());
    assert_eq!(image.filename(), Some("saved.d64"));

    let opened = DiskImage::open(&path).expect("Failed to open image");
    assert_eq!(opened.size(), DiskSize::Extended40);
    assert_eq!(opened.disk_name(), "ON DISK");
    assert_eq!(opened.directory().len(), 1);
    assert_eq!(opened.serialize_bytes(), image.serialize_bytes());

    let _ = std::fs::remove_file(&path);
}

#[test]
#[should_panic]
fn test_out_of_range_sector_panics() {
    let image = DiskImage::format(DiskSize::Standard);
    image.read_sector(18, 19);
}

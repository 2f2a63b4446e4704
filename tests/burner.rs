//! Integration tests for the burner protocol against the emulated programmer

use d64burner::*;
use std::time::Duration;

fn burner() -> Burner {
    Burner::new(
        BurnerConfig::new("emulator")
            .with_timeout(Duration::from_millis(30))
            .with_poll_interval(Duration::ZERO),
    )
}

fn packed_image() -> DiskImage {
    let programs = vec![
        ProgramFile::new("LOADER", vec![0x01; 100]).expect("Failed to create program"),
        ProgramFile::new("MAIN", vec![0x02; 3000]).expect("Failed to create program"),
    ];
    let mut image = DiskImage::default();
    image.generate(&programs, "BURN TEST").expect("Failed to pack");
    image
}

#[test]
fn test_full_burn_sends_every_sector_in_order() {
    let image = packed_image();
    let mut emulator = EmulatedBurner::new(DiskSize::Standard);
    let mut reports = Vec::new();

    let report = burner()
        .burn(&mut emulator, &image, BurnMode::Full, |p| reports.push(*p))
        .expect("Failed to burn");

    assert_eq!(report.progress.state, BurnState::Completed);
    assert_eq!(report.progress.transmitted, 683);
    assert_eq!(report.progress.processed, 683);
    assert_eq!(reports.len(), 683);
    assert!(reports.iter().all(|p| p.state == BurnState::FullBurn));

    let expected: Vec<(u8, u8)> = DiskSize::Standard.locations().collect();
    assert_eq!(emulator.burned(), expected.as_slice());
    assert_eq!(emulator.erase_count(), 1);
    assert_eq!(emulator.flash(), image.serialize_bytes().as_slice());
    assert!(!emulator.is_open());
}

#[test]
fn test_quick_burn_skips_empty_sectors() {
    let image = packed_image();
    let mut emulator = EmulatedBurner::new(DiskSize::Standard);

    let report = burner()
        .burn(&mut emulator, &image, BurnMode::Quick, |_| {})
        .expect("Failed to burn");

    let used = image.used_sector_count();
    assert_eq!(report.progress.transmitted, used);
    assert_eq!(report.progress.processed, 683);
    assert!(report.progress.transmitted < 683);
    assert_eq!(emulator.burned().len(), used);
    assert!(emulator
        .burned()
        .iter()
        .all(|&(t, s)| !image.read_sector(t, s).is_free()));
    assert_eq!(emulator.flash(), image.serialize_bytes().as_slice());
}

#[test]
fn test_quick_burn_of_blank_image_sends_nothing() {
    let image = DiskImage::format(DiskSize::Standard);
    let mut emulator = EmulatedBurner::new(DiskSize::Standard);

    let report = burner()
        .burn(&mut emulator, &image, BurnMode::Quick, |_| {})
        .expect("Failed to burn");

    assert_eq!(report.progress.transmitted, 0);
    assert_eq!(report.progress.state, BurnState::Completed);
    assert_eq!(emulator.erase_count(), 1);
    assert!(emulator.burned().is_empty());
}

#[test]
fn test_silent_programmer_times_out_after_erase() {
    let image = packed_image();
    let mut emulator = EmulatedBurner::new(DiskSize::Standard).silent();

    let result = burner().burn(&mut emulator, &image, BurnMode::Full, |_| {});
    match result {
        Err(D64Error::Timeout { progress }) => {
            assert_eq!(progress.state, BurnState::Aborted);
            assert_eq!(progress.transmitted, 0);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(emulator.burned().is_empty());
    assert!(!emulator.is_open());
    assert_eq!(emulator.close_count(), 1);
}

#[test]
fn test_rejected_sector_aborts_with_partial_progress() {
    let image = packed_image();
    // Erase, then three sectors with two acknowledges each
    let mut emulator = EmulatedBurner::new(DiskSize::Standard).reject_after(7);

    let result = burner().burn(&mut emulator, &image, BurnMode::Full, |_| {});
    match result {
        Err(D64Error::ProtocolMismatch { received, progress }) => {
            assert_eq!(received, 0x13);
            assert_eq!(progress.transmitted, 3);
            assert_eq!(progress.state, BurnState::Aborted);
        }
        other => panic!("expected mismatch, got {:?}", other),
    }
    assert!(!emulator.is_open());
}

#[test]
fn test_verify_reads_back_exact_bytes() {
    let image = packed_image();
    let mut emulator = EmulatedBurner::with_image(&image);
    let mut last = None;

    let (read, report) = burner()
        .verify(&mut emulator, DiskSize::Standard, |p| last = Some(*p))
        .expect("Failed to verify");

    assert_eq!(read.serialize_bytes(), image.serialize_bytes());
    assert_eq!(read.disk_name(), "BURN TEST");
    assert_eq!(read.directory(), image.directory());
    assert_eq!(report.bytes, 683 * 256);
    assert_eq!(report.sectors, 683);
    assert_eq!(last.map(|p| p.processed), Some(683));
    assert!(!emulator.is_open());
}

#[test]
fn test_short_read_back_leaves_image_unchanged() {
    let mut target = packed_image();
    let before = target.serialize_bytes();
    let mut emulator =
        EmulatedBurner::with_image(&DiskImage::format(DiskSize::Standard)).with_stream_limit(1000);

    let result = burner().verify_into(&mut emulator, &mut target, |_| {});
    match result {
        Err(D64Error::Timeout { progress }) => {
            assert_eq!(progress.processed, 3);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(target.serialize_bytes(), before);
    assert_eq!(target.disk_name(), "BURN TEST");
    assert!(!emulator.is_open());
}

#[test]
fn test_read_back_without_first_byte_times_out() {
    let mut target = packed_image();
    let before = target.serialize_bytes();
    let mut emulator = EmulatedBurner::with_image(&target).silent();

    let result = burner().verify_into(&mut emulator, &mut target, |_| {});
    match result {
        Err(D64Error::Timeout { progress }) => {
            assert_eq!(progress.processed, 0);
            assert_eq!(progress.state, BurnState::Aborted);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(target.serialize_bytes(), before);
    assert_eq!(target.directory().len(), 2);
    assert!(!emulator.is_open());
    assert_eq!(emulator.close_count(), 1);
}

#[test]
fn test_burn_then_verify_into() {
    let image = packed_image();
    let burner = burner();
    let mut emulator = EmulatedBurner::new(DiskSize::Standard);
    burner
        .burn(&mut emulator, &image, BurnMode::Quick, |_| {})
        .expect("Failed to burn");

    let mut target = DiskImage::format(DiskSize::Standard);
    burner
        .verify_into(&mut emulator, &mut target, |_| {})
        .expect("Failed to verify");

    assert_eq!(target.serialize_bytes(), image.serialize_bytes());
    assert_eq!(emulator.open_count(), 2);
    assert_eq!(emulator.close_count(), 2);
}

#[test]
fn test_unreachable_port_is_configuration_error() {
    let image = DiskImage::default();
    let burner = burner();
    let mut emulator = EmulatedBurner::new(DiskSize::Standard).failing_open();

    let result = burner.burn(&mut emulator, &image, BurnMode::Quick, |_| {});
    assert!(matches!(result, Err(D64Error::Configuration(_))));
    assert_eq!(emulator.erase_count(), 0);
    assert!(!burner.is_busy());
}

#[test]
fn test_background_verify_job() {
    let image = packed_image();
    let burner = burner();
    let job = BurnJob::spawn(
        &burner,
        EmulatedBurner::with_image(&image),
        JobKind::Verify {
            size: DiskSize::Standard,
        },
    )
    .expect("Failed to start job");

    let finished = job.join();
    match finished.outcome {
        Ok(JobOutcome::Verified(read, report)) => {
            assert_eq!(read.serialize_bytes(), image.serialize_bytes());
            assert_eq!(report.sectors, 683);
        }
        Ok(other) => panic!("unexpected outcome {:?}", other),
        Err(e) => panic!("job failed: {}", e),
    }
    assert!(!finished.transport.is_open());
    assert!(!burner.is_busy());
}

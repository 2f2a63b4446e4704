//! Running burner operations on a worker thread

use crate::burner::{BurnMode, BurnReport, Burner, Progress, Transport, VerifyReport};
use crate::error::Result;
use crate::format::DiskSize;
use crate::image::DiskImage;
use log::debug;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

/// Operation to run in the background
#[derive(Debug, Clone)]
pub enum JobKind {
    /// Erase and burn an image
    Burn {
        /// Image to transmit
        image: DiskImage,
        /// Full or quick
        mode: BurnMode,
    },
    /// Read the flash back
    Verify {
        /// Geometry to read
        size: DiskSize,
    },
    /// Read the flash status register
    FlashStatus,
    /// Write the test byte
    WriteTest,
    /// Read the test byte
    ReadTest,
}

/// Successful result of a background operation
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// Burn finished
    Burned(BurnReport),
    /// Read-back finished with the assembled image
    Verified(DiskImage, VerifyReport),
    /// Status register value
    FlashStatus(u8),
    /// Test byte written
    TestWritten,
    /// Test byte value
    TestByte(u8),
}

/// Terminal result of a job, handing the transport back
pub struct Finished<T> {
    /// The transport the job ran on, closed
    pub transport: T,
    /// What happened
    pub outcome: Result<JobOutcome>,
}

/// A burner operation running on its own thread
///
/// Progress arrives over a channel; [`BurnJob::join`] yields the one
/// terminal result.
pub struct BurnJob<T> {
    handle: JoinHandle<Finished<T>>,
    updates: Receiver<Progress>,
    latest: Option<Progress>,
}

impl<T: Transport + Send + 'static> BurnJob<T> {
    /// Start an operation; fails with `Busy` if one is already running
    pub fn spawn(burner: &Burner, mut transport: T, kind: JobKind) -> Result<Self> {
        let guard = burner.acquire()?;
        let burner = burner.clone();
        let (sender, updates) = mpsc::channel();

        let handle = thread::spawn(move || {
            let _guard = guard;
            let report = |p: &Progress| {
                let _ = sender.send(*p);
            };

            let outcome = match kind {
                JobKind::Burn { image, mode } => burner
                    .run_burn(&mut transport, &image, mode, report)
                    .map(JobOutcome::Burned),
                JobKind::Verify { size } => burner
                    .run_verify(&mut transport, size, report)
                    .map(|(image, report)| JobOutcome::Verified(image, report)),
                JobKind::FlashStatus => burner
                    .run_flash_status(&mut transport)
                    .map(JobOutcome::FlashStatus),
                JobKind::WriteTest => burner
                    .run_write_test(&mut transport)
                    .map(|_| JobOutcome::TestWritten),
                JobKind::ReadTest => burner
                    .run_read_test(&mut transport)
                    .map(JobOutcome::TestByte),
            };
            debug!("Background job finished: ok={}", outcome.is_ok());

            Finished { transport, outcome }
        });

        Ok(Self {
            handle,
            updates,
            latest: None,
        })
    }
}

impl<T> BurnJob<T> {
    /// Most recent progress report, draining any queued updates
    pub fn progress(&mut self) -> Option<Progress> {
        if let Some(last) = self.updates.try_iter().last() {
            self.latest = Some(last);
        }
        self.latest
    }

    /// Whether the worker has returned
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker and take its result
    ///
    /// A panic on the worker is resumed on the caller.
    pub fn join(self) -> Finished<T> {
        match self.handle.join() {
            Ok(finished) => finished,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::burner::{BurnState, BurnerConfig, EmulatedBurner};
    use crate::error::D64Error;
    use std::time::Duration;

    fn burner() -> Burner {
        Burner::new(
            BurnerConfig::new("emu")
                .with_timeout(Duration::from_millis(50))
                .with_poll_interval(Duration::ZERO),
        )
    }

    #[test]
    fn test_background_burn() {
        let burner = burner();
        let mut image = DiskImage::format(DiskSize::Standard);
        image.write_byte(1, 0, 2, 0x42);

        let emulator = EmulatedBurner::new(DiskSize::Standard);
        let job = BurnJob::spawn(
            &burner,
            emulator,
            JobKind::Burn {
                image,
                mode: BurnMode::Quick,
            },
        )
        .unwrap();

        let finished = job.join();
        match finished.outcome {
            Ok(JobOutcome::Burned(report)) => {
                assert_eq!(report.progress.transmitted, 1);
                assert_eq!(report.progress.state, BurnState::Completed);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(finished.transport.burned(), &[(1, 0)]);
        assert!(!finished.transport.is_open());
        assert!(!burner.is_busy());
    }

    #[test]
    fn test_progress_is_streamed() {
        let burner = burner();
        let image = DiskImage::format(DiskSize::Standard);
        let mut job = BurnJob::spawn(
            &burner,
            EmulatedBurner::new(DiskSize::Standard),
            JobKind::Burn {
                image,
                mode: BurnMode::Full,
            },
        )
        .unwrap();

        while !job.is_finished() {
            thread::sleep(Duration::from_millis(1));
        }
        let last = job.progress().unwrap();
        assert_eq!(last.processed, 683);
        job.join().outcome.unwrap();
    }

    #[test]
    fn test_second_job_is_rejected_while_busy() {
        let burner = burner();
        let job = BurnJob::spawn(
            &burner,
            EmulatedBurner::new(DiskSize::Standard).silent(),
            JobKind::ReadTest,
        )
        .unwrap();

        let second = BurnJob::spawn(
            &burner,
            EmulatedBurner::new(DiskSize::Standard),
            JobKind::FlashStatus,
        );
        assert!(matches!(second, Err(D64Error::Busy)));

        let finished = job.join();
        assert!(matches!(finished.outcome, Err(D64Error::Timeout { .. })));
        assert!(!burner.is_busy());
    }
}

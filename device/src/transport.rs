//! Fixed-size report transport.

use std::io;
use std::time::Duration;

use hidapi::HidDevice;

/// Consecutive read errors after which the handle is considered gone
pub const MAX_READ_FAILURES: u32 = 8;

/// Write one report, read one report with a bounded wait.
///
/// A read returning `Ok(0)` means nothing arrived before the timeout.
pub trait Transport {
    fn write_report(&mut self, report: &[u8]) -> io::Result<usize>;
    fn read_report(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;
}

impl Transport for HidDevice {
    fn write_report(&mut self, report: &[u8]) -> io::Result<usize> {
        self.write(report).map_err(|e| io::Error::other(e.to_string()))
    }

    fn read_report(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let ms = timeout.as_millis().min(i32::MAX as u128) as i32;
        self.read_timeout(buf, ms).map_err(|e| io::Error::other(e.to_string()))
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write_report(&mut self, report: &[u8]) -> io::Result<usize> {
        (**self).write_report(report)
    }

    fn read_report(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        (**self).read_report(buf, timeout)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted transport for exercising the polling loops without hardware.

    use std::collections::VecDeque;
    use std::io;
    use std::time::Duration;

    use super::Transport;

    /// What the next read returns
    #[derive(Debug, Clone)]
    pub enum Read {
        Report(Vec<u8>),
        Empty,
        Fail,
    }

    /// Replays a script of reads; once exhausted every read times out empty.
    #[derive(Debug, Default)]
    pub struct ScriptedTransport {
        pub reads: VecDeque<Read>,
        pub writes: Vec<Vec<u8>>,
        pub fail_writes: bool,
        /// Reads that hit the end of the script sleep this long
        pub idle_wait: Duration,
    }

    impl ScriptedTransport {
        pub fn new(reads: impl IntoIterator<Item = Read>) -> Self {
            Self {
                reads: reads.into_iter().collect(),
                idle_wait: Duration::from_millis(1),
                ..Default::default()
            }
        }

        /// Never delivers anything
        pub fn silent() -> Self {
            Self::new(Vec::<Read>::new())
        }

        pub fn failing_writes() -> Self {
            Self {
                fail_writes: true,
                ..Default::default()
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn write_report(&mut self, report: &[u8]) -> io::Result<usize> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device removed"));
            }
            self.writes.push(report.to_vec());
            Ok(report.len())
        }

        fn read_report(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Read::Report(report)) => {
                    let n = report.len().min(buf.len());
                    buf[..n].copy_from_slice(&report[..n]);
                    Ok(n)
                },
                Some(Read::Empty) => Ok(0),
                Some(Read::Fail) => Err(io::Error::other("read failed")),
                None => {
                    std::thread::sleep(self.idle_wait.min(timeout));
                    Ok(0)
                },
            }
        }
    }
}

//! Trace reading. Parsing happens on a dedicated thread that feeds the
//! simulation loop batches of requests over a bounded channel; a malformed
//! line is delivered in-band and ends the run.

use std::{
    fs,
    io::{self, BufRead, BufReader},
    path::PathBuf,
    thread::{self, JoinHandle},
};

use crossbeam::channel::{Receiver, Sender};
use thiserror::Error;
use xz2::read::XzDecoder;

use crate::cache::ReqKind;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("unable to open file {path}: {source}")]
    Open { path: String, source: io::Error },
    #[error("unable to read trace: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: unknown request type {kind:?}")]
    UnknownKind { line: usize, kind: String },
    #[error("line {line}: malformed request {text:?}")]
    Malformed { line: usize, text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub kind: ReqKind,
    pub addr: u32,
}

#[derive(Debug)]
pub struct Trace {
    pub rec: Receiver<Result<Vec<Request>, TraceError>>,
    _thread: JoinHandle<()>,
}

impl Trace {
    pub fn read(path: PathBuf, batch_size: usize, queue_depth: usize) -> Result<Trace, TraceError> {
        let file = fs::File::open(&path).map_err(|source| TraceError::Open {
            path: path.display().to_string(),
            source,
        })?;
        let is_xz = path.extension().map_or(false, |ext| ext == "xz");
        let reader: Box<dyn BufRead + Send> = if is_xz {
            Box::new(BufReader::new(XzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };

        let (sender, receiver) = crossbeam::channel::bounded(queue_depth);
        let t = thread::spawn(move || Trace::run_thread(reader, batch_size, sender));

        Ok(Trace {
            rec: receiver,
            _thread: t,
        })
    }

    fn run_thread(
        reader: Box<dyn BufRead + Send>,
        batch_size: usize,
        queue: Sender<Result<Vec<Request>, TraceError>>,
    ) {
        let mut batch = Vec::with_capacity(batch_size);
        for (idx, line) in reader.lines().enumerate() {
            let parsed = line
                .map_err(TraceError::from)
                .and_then(|l| parse_line(&l, idx + 1));
            match parsed {
                Ok(request) => batch.push(request),
                Err(err) => {
                    let _ = queue.send(Err(err));
                    return;
                }
            }
            if batch.len() == batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                if queue.send(Ok(full)).is_err() {
                    return;
                }
            }
        }
        if !batch.is_empty() {
            let _ = queue.send(Ok(batch));
        }
    }
}

/// One request per line: `r <hex addr>` or `w <hex addr>`.
pub fn parse_line(line: &str, lineno: usize) -> Result<Request, TraceError> {
    let malformed = || TraceError::Malformed {
        line: lineno,
        text: line.to_string(),
    };
    let mut parts = line.split_whitespace();
    let (Some(kind), Some(addr), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed());
    };
    let kind = match kind {
        "r" => ReqKind::Read,
        "w" => ReqKind::Write,
        other => {
            return Err(TraceError::UnknownKind {
                line: lineno,
                kind: other.to_string(),
            })
        }
    };
    let addr = u32::from_str_radix(addr, 16).map_err(|_| malformed())?;
    Ok(Request { kind, addr })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_reads_and_writes() {
        assert_eq!(
            parse_line("r ff32b58", 1).unwrap(),
            Request {
                kind: ReqKind::Read,
                addr: 0xff32b58
            }
        );
        assert_eq!(
            parse_line("w 0", 2).unwrap(),
            Request {
                kind: ReqKind::Write,
                addr: 0
            }
        );
    }

    #[test]
    fn unknown_kind_is_fatal() {
        let err = parse_line("x ff32b58", 7).unwrap_err();
        assert!(matches!(err, TraceError::UnknownKind { line: 7, .. }));
    }

    #[test]
    fn bad_address_is_malformed() {
        assert!(matches!(
            parse_line("r 0xg", 3).unwrap_err(),
            TraceError::Malformed { line: 3, .. }
        ));
    }

    #[test]
    fn blank_and_overlong_lines_are_malformed() {
        assert!(matches!(
            parse_line("", 1).unwrap_err(),
            TraceError::Malformed { .. }
        ));
        assert!(matches!(
            parse_line("r ff 20", 1).unwrap_err(),
            TraceError::Malformed { .. }
        ));
    }

    #[test]
    fn file_round_trip_in_batches() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..10u32 {
            writeln!(file, "r {:x}", i * 16).unwrap();
        }
        writeln!(file, "w 400").unwrap();
        file.flush().unwrap();

        let trace = Trace::read(file.path().to_path_buf(), 4, 2).unwrap();
        let mut requests = Vec::new();
        for batch in trace.rec.iter() {
            requests.extend(batch.unwrap());
        }
        assert_eq!(requests.len(), 11);
        assert_eq!(
            requests[10],
            Request {
                kind: ReqKind::Write,
                addr: 0x400
            }
        );
    }

    #[test]
    fn xz_traces_are_decompressed() {
        use xz2::write::XzEncoder;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.txt.xz");
        let mut encoder = XzEncoder::new(fs::File::create(&path).unwrap(), 6);
        writeln!(encoder, "r 10").unwrap();
        writeln!(encoder, "w 20").unwrap();
        encoder.finish().unwrap();

        let trace = Trace::read(path, 64, 2).unwrap();
        let batches: Vec<_> = trace.rec.iter().collect::<Result<Vec<_>, _>>().unwrap();
        let requests: Vec<Request> = batches.concat();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].kind, ReqKind::Write);
        assert_eq!(requests[1].addr, 0x20);
    }

    #[test]
    fn parse_error_carries_line_number() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "r 10").unwrap();
        writeln!(file, "q 20").unwrap();
        file.flush().unwrap();

        let trace = Trace::read(file.path().to_path_buf(), 64, 2).unwrap();
        let result: Result<Vec<_>, _> = trace.rec.iter().collect();
        assert!(matches!(
            result.unwrap_err(),
            TraceError::UnknownKind { line: 2, .. }
        ));
    }

    #[test]
    fn missing_file_fails_to_open() {
        assert!(matches!(
            Trace::read(PathBuf::from("no_such_trace.txt"), 64, 2).unwrap_err(),
            TraceError::Open { .. }
        ));
    }
}

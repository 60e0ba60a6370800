//! Legacy binary Office formats (`.doc`, `.ppt`).
//!
//! Text is taken from the first external converter that is installed and
//! produces usable output (`antiword`, then `catdoc` for Word; `catppt` for
//! PowerPoint). When none does, the raw bytes are scanned for runs of
//! printable text in both 8-bit and UTF-16LE encodings.
//!
//! A converter that runs longer than [`CONVERTER_TIMEOUT`] is killed and
//! counts as unusable.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::{read_bytes, ExtractError, Extractor};

/// Shortest run of printable characters kept by the byte scan.
const MIN_RUN: usize = 4;

/// Wall-clock limit for one converter run.
pub const CONVERTER_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct LegacyExtractor {
    kind: &'static str,
    converters: Vec<String>,
    timeout: Duration,
}

impl LegacyExtractor {
    pub fn word() -> Self {
        Self::with_converters("doc", ["antiword", "catdoc"])
    }

    pub fn powerpoint() -> Self {
        Self::with_converters("ppt", ["catppt"])
    }

    /// A handler that only tries `converters`, in order.
    pub fn with_converters<I, S>(kind: &'static str, converters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            converters: converters.into_iter().map(Into::into).collect(),
            timeout: CONVERTER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Extractor for LegacyExtractor {
    fn name(&self) -> &'static str {
        self.kind
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        for program in &self.converters {
            match run_converter(program, path, self.timeout) {
                Ok(text) => {
                    tracing::debug!(path = %path.display(), converter = %program, "converted");
                    return Ok(text);
                }
                Err(reason) => {
                    tracing::debug!(path = %path.display(), converter = %program, %reason, "converter unusable");
                }
            }
        }

        let bytes = read_bytes(path)?;
        let text = scan_printable(&bytes);
        if text.trim().is_empty() {
            return Err(ExtractError::Legacy(format!(
                "no converter produced text and no printable runs found in {}",
                path.display()
            )));
        }
        Ok(text)
    }
}

fn run_converter(program: &str, path: &Path, timeout: Duration) -> Result<String, String> {
    let mut child = Command::new(program)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("{} failed to start: {}", program, e))?;

    // Drained on their own threads so a large document cannot fill the pipe
    // while we poll.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(format!("{} timed out after {:?}", program, timeout));
            }
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                return Err(format!("waiting on {} failed: {}", program, e));
            }
        }
    };
    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();

    if !status.success() {
        let stderr = String::from_utf8_lossy(&stderr);
        return Err(format!("{} exited with {}: {}", program, status, stderr.trim()));
    }

    let text = String::from_utf8_lossy(&stdout).into_owned();
    if text.contains('\0') {
        return Err(format!("{} produced binary output", program));
    }
    if text.trim().is_empty() {
        return Err(format!("{} produced no output", program));
    }
    Ok(text)
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn is_printable(b: u8) -> bool {
    matches!(b, 0x20..=0x7e | b'\t' | b'\n' | b'\r')
}

fn push_run(out: &mut Vec<String>, run: &mut String) {
    if run.trim().chars().count() >= MIN_RUN {
        out.push(run.trim().to_string());
    }
    run.clear();
}

/// Runs of printable ASCII, one per line.
fn scan_ascii(bytes: &[u8]) -> Vec<String> {
    let mut runs = Vec::new();
    let mut run = String::new();
    for &b in bytes {
        if is_printable(b) {
            run.push(b as char);
        } else {
            push_run(&mut runs, &mut run);
        }
    }
    push_run(&mut runs, &mut run);
    runs
}

/// Runs of printable UTF-16LE code units, one per line. Word documents keep
/// most body text in this form.
fn scan_utf16le(bytes: &[u8]) -> Vec<String> {
    let mut runs = Vec::new();
    let mut run = String::new();
    for pair in bytes.chunks_exact(2) {
        let unit = u16::from_le_bytes([pair[0], pair[1]]);
        match char::from_u32(unit as u32) {
            Some(c) if (c as u32) < 0x80 && is_printable(c as u8) => run.push(c),
            Some(c) if (c as u32) >= 0xa0 && !c.is_control() && unit < 0xd800 => run.push(c),
            _ => push_run(&mut runs, &mut run),
        }
    }
    push_run(&mut runs, &mut run);
    runs
}

/// Best-effort text recovery from an undecodable binary document.
///
/// Both alignments of the UTF-16LE scan are tried; the candidate with the
/// highest [`text_score`] wins.
pub fn scan_printable(bytes: &[u8]) -> String {
    let candidates = [
        scan_ascii(bytes),
        scan_utf16le(bytes),
        scan_utf16le(bytes.get(1..).unwrap_or_default()),
    ];
    candidates
        .into_iter()
        .max_by_key(|runs| runs.iter().map(|r| text_score(r)).sum::<usize>())
        .unwrap_or_default()
        .join("\n")
}

/// ASCII letters, digits and spaces count double. A misaligned UTF-16 read
/// of Latin text turns into CJK code points and scores low.
fn text_score(run: &str) -> usize {
    run.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == ' ' { 2 } else { 1 })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    #[test]
    fn ascii_runs_are_recovered() {
        let mut bytes = vec![0u8, 1, 2, 0xff];
        bytes.extend_from_slice(b"Quarterly evaluation notes");
        bytes.extend_from_slice(&[0, 0, 7]);
        bytes.extend_from_slice(b"ab");
        assert_eq!(scan_printable(&bytes), "Quarterly evaluation notes");
    }

    #[test]
    fn utf16_runs_win_when_longer() {
        let mut bytes = vec![0xd0, 0xcf, 0x11, 0xe0];
        bytes.extend(utf16("Sergeant Bravo exceeded standards"));
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        let text = scan_printable(&bytes);
        assert_eq!(text, "Sergeant Bravo exceeded standards");
    }

    #[test]
    fn missing_converter_falls_back_to_scan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.doc");
        let mut bytes = vec![0xd0, 0xcf, 0x11, 0xe0, 0xa1, 0xb1, 0x1a, 0xe1];
        bytes.extend(utf16("Legacy memo body text"));
        std::fs::write(&path, bytes).unwrap();

        let handler = LegacyExtractor::with_converters("doc", vec!["rh-no-such-converter"]);
        assert_eq!(handler.extract(&path).unwrap(), "Legacy memo body text");
    }

    #[cfg(unix)]
    #[test]
    fn hung_converter_is_killed_and_scan_is_used() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow-converter");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let path = dir.path().join("old.doc");
        let mut bytes = vec![0xd0, 0xcf, 0x11, 0xe0];
        bytes.extend(utf16("Memo recovered after timeout"));
        std::fs::write(&path, bytes).unwrap();

        let handler = LegacyExtractor::with_converters("doc", [script.to_string_lossy()])
            .with_timeout(Duration::from_millis(200));
        let started = Instant::now();
        assert_eq!(handler.extract(&path).unwrap(), "Memo recovered after timeout");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn converter_output_is_used_when_it_finishes_in_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.doc");
        std::fs::write(&path, "Converted memo text").unwrap();

        // `cat` stands in for a converter that prints the document text.
        let handler = LegacyExtractor::with_converters("doc", ["cat"]);
        assert_eq!(handler.extract(&path).unwrap(), "Converted memo text");
    }

    #[test]
    fn binary_noise_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.ppt");
        std::fs::write(&path, [0u8, 1, 2, 3, 0xff, 0xfe]).unwrap();
        let handler = LegacyExtractor::with_converters("ppt", Vec::<String>::new());
        assert!(matches!(handler.extract(&path), Err(ExtractError::Legacy(_))));
    }
}

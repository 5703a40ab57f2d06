use super::error::Error;
use super::{fasta, Aligner, Alignment};
use std::collections::hash_map::DefaultHasher;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// One-shot, blocking invocation of the external `muscle` aligner.
///
/// Each call writes the input sequences to `<work_dir>/<key>.fa`, spawns the
/// aligner, and polls for completion under a hard deadline; a run that
/// produces no non-empty output within the bound fails with a typed
/// [`Error::TimedOut`] rather than an empty alignment. Output files double
/// as a cache: when `<key>.afa` already exists and is non-empty it is reused
/// without invoking the aligner again.
#[derive(Debug, Clone)]
pub struct MuscleAligner {
    program: PathBuf,
    work_dir: PathBuf,
    timeout: Duration,
    poll_interval: Duration,
}

impl MuscleAligner {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: PathBuf::from("muscle"),
            work_dir: work_dir.into(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    fn input_path(&self, key: &str) -> PathBuf {
        self.work_dir.join(format!("{key}.fa"))
    }

    fn output_path(&self, key: &str) -> PathBuf {
        self.work_dir.join(format!("{key}.afa"))
    }

    fn run_aligner(&self, input: &Path, output: &Path) -> Result<(), Error> {
        log::info!(
            "invoking {} on {} -> {}",
            self.program_name(),
            input.display(),
            output.display()
        );
        let mut child = Command::new(&self.program)
            .arg("-in")
            .arg(input)
            .arg("-out")
            .arg(output)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| Error::Launch {
                program: self.program_name(),
                source,
            })?;

        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait().map_err(|e| Error::io(output, e))? {
                Some(status) if status.success() => break,
                Some(status) => {
                    return Err(Error::Failed {
                        program: self.program_name(),
                        status,
                    });
                }
                None => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(Error::TimedOut {
                            path: output.to_path_buf(),
                            seconds: self.timeout.as_secs(),
                        });
                    }
                    thread::sleep(self.poll_interval);
                }
            }
        }

        // The process may exit before its output is visible; keep polling
        // the file under the same deadline.
        while !has_content(output) {
            if Instant::now() >= deadline {
                return Err(Error::TimedOut {
                    path: output.to_path_buf(),
                    seconds: self.timeout.as_secs(),
                });
            }
            thread::sleep(self.poll_interval);
        }
        Ok(())
    }

    fn parse_output(
        &self,
        output: &Path,
        sequences: &[(String, String)],
    ) -> Result<Alignment, Error> {
        let file = File::open(output).map_err(|e| Error::io(output, e))?;
        let parsed =
            fasta::parse_records(BufReader::new(file)).map_err(|e| Error::io(output, e))?;

        let mut rows = Vec::with_capacity(sequences.len());
        for (id, _) in sequences {
            let aligned = parsed
                .iter()
                .find(|(parsed_id, _)| parsed_id == id)
                .map(|(_, seq)| seq.clone())
                .ok_or_else(|| {
                    Error::malformed(output, format!("aligned output lost sequence '{id}'"))
                })?;
            rows.push((id.clone(), aligned));
        }
        Alignment::new(rows)
    }
}

impl Aligner for MuscleAligner {
    fn align(&self, sequences: &[(String, String)]) -> Result<Alignment, Error> {
        self.align_keyed(&content_key(sequences), sequences)
    }

    fn align_keyed(&self, key: &str, sequences: &[(String, String)]) -> Result<Alignment, Error> {
        if sequences.is_empty() {
            return Alignment::new(Vec::new());
        }

        let output = self.output_path(key);
        if has_content(&output) {
            log::debug!("reusing cached alignment {}", output.display());
            return self.parse_output(&output, sequences);
        }

        std::fs::create_dir_all(&self.work_dir)
            .map_err(|e| Error::io(&self.work_dir, e))?;
        let input = self.input_path(key);
        let file = File::create(&input).map_err(|e| Error::io(&input, e))?;
        let mut writer = BufWriter::new(file);
        fasta::write_records(&mut writer, sequences).map_err(|e| Error::io(&input, e))?;
        drop(writer);

        self.run_aligner(&input, &output)?;
        self.parse_output(&output, sequences)
    }
}

fn has_content(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

/// Deterministic cache key over the input ids and sequence content.
fn content_key(sequences: &[(String, String)]) -> String {
    let mut hasher = DefaultHasher::new();
    for (id, sequence) in sequences {
        id.hash(&mut hasher);
        sequence.hash(&mut hasher);
    }
    format!("aln-{:016x}", hasher.finish())
}

use crate::io::error::Error;
use crate::model::ids::{NewResidueId, ResidueId};
use crate::utils::parallel::*;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Default residue-number stride separating concatenated chains. Large
/// enough that no single chain's author numbering can reach the next slot.
pub const DEFAULT_CONCAT_STRIDE: i32 = 50_000;

/// Everything the rewriter may substitute into one structure's coordinate
/// records. Empty maps leave the corresponding fields untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteEdits {
    /// Old chain id to destination chain id.
    pub chain_map: BTreeMap<String, String>,
    /// `(old chain id, old residue id)` to standardized residue id.
    pub residue_map: BTreeMap<(String, ResidueId), NewResidueId>,
    /// Old chain id to 1-based concatenation order.
    pub concat_orders: BTreeMap<String, u32>,
    /// Residue-number offset per concatenation slot.
    pub concat_stride: i32,
}

impl Default for RewriteEdits {
    fn default() -> Self {
        Self {
            chain_map: BTreeMap::new(),
            residue_map: BTreeMap::new(),
            concat_orders: BTreeMap::new(),
            concat_stride: DEFAULT_CONCAT_STRIDE,
        }
    }
}

impl RewriteEdits {
    pub fn new() -> Self {
        Self::default()
    }

    fn residue_offset(&self, chain_id: &str) -> i32 {
        match self.concat_orders.get(chain_id) {
            Some(&order) => (order as i32 - 1) * self.concat_stride,
            None => 0,
        }
    }
}

/// Tally of one rewrite pass. `lines_in == lines_out` always holds; the
/// rewriter only ever replaces lines, never drops or adds them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    pub lines_in: usize,
    pub lines_out: usize,
    pub records_rewritten: usize,
}

/// One file's rewrite work unit for the batch pass.
#[derive(Debug, Clone)]
pub struct RewriteJob {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub edits: RewriteEdits,
}

#[derive(Default)]
struct AtomSiteColumns {
    auth_asym_id: Option<usize>,
    label_asym_id: Option<usize>,
    auth_seq_id: Option<usize>,
    label_seq_id: Option<usize>,
    pdbx_pdb_ins_code: Option<usize>,
}

enum ScanState {
    Base,
    InLoopHeader,
    InAtomSiteLoop,
}

/// Streams `reader` to `writer`, substituting chain identifiers and residue
/// numbers in coordinate records according to `edits`.
///
/// Field positions are learned from the `_atom_site` loop header earlier in
/// the same stream, so column layouts may vary between depositions. A line
/// is rewritten only when its first token is `ATOM` or `HETATM` inside an
/// `_atom_site` loop; every other line is emitted byte-identical.
pub fn rewrite<R: BufRead, W: Write>(
    reader: R,
    writer: &mut W,
    edits: &RewriteEdits,
) -> Result<RewriteSummary, Error> {
    let mut summary = RewriteSummary::default();
    let mut state = ScanState::Base;
    let mut headers: Vec<String> = Vec::new();
    let mut columns = AtomSiteColumns::default();
    let mut line_num = 0;

    for line in reader.lines() {
        line_num += 1;
        let line = line.map_err(|e| Error::from_io(e, None))?;
        summary.lines_in += 1;

        let first = line.split_whitespace().next().unwrap_or("");

        match state {
            ScanState::Base => {
                if first == "loop_" {
                    state = ScanState::InLoopHeader;
                    headers.clear();
                }
            }
            ScanState::InLoopHeader => {
                if first.starts_with('_') {
                    headers.push(first.to_string());
                } else if headers.iter().any(|h| h.starts_with("_atom_site.")) {
                    state = ScanState::InAtomSiteLoop;
                    columns = map_columns(&headers);
                    if is_coordinate_record(first) {
                        let rewritten = rewrite_record(&line, &columns, edits, line_num)?;
                        emit(writer, &rewritten, &mut summary)?;
                        summary.records_rewritten += 1;
                        continue;
                    }
                } else if first == "loop_" {
                    headers.clear();
                } else {
                    state = ScanState::Base;
                }
            }
            ScanState::InAtomSiteLoop => {
                if first == "loop_" {
                    state = ScanState::InLoopHeader;
                    headers.clear();
                } else if first.starts_with('_') {
                    state = ScanState::Base;
                } else if is_coordinate_record(first) {
                    let rewritten = rewrite_record(&line, &columns, edits, line_num)?;
                    emit(writer, &rewritten, &mut summary)?;
                    summary.records_rewritten += 1;
                    continue;
                }
            }
        }

        emit(writer, &line, &mut summary)?;
    }

    Ok(summary)
}

/// Rewrites `source` into `dest`. The destination is removed again if the
/// pass fails part-way, so no truncated file is ever left behind.
pub fn rewrite_file(
    source: &Path,
    dest: &Path,
    edits: &RewriteEdits,
) -> Result<RewriteSummary, Error> {
    let input =
        File::open(source).map_err(|e| Error::from_io(e, Some(source.to_path_buf())))?;
    let output =
        File::create(dest).map_err(|e| Error::from_io(e, Some(dest.to_path_buf())))?;
    let mut writer = BufWriter::new(output);

    let result = rewrite(BufReader::new(input), &mut writer, edits)
        .and_then(|summary| {
            writer
                .flush()
                .map_err(|e| Error::from_io(e, Some(dest.to_path_buf())))?;
            Ok(summary)
        })
        .map_err(|e| e.with_path(source.to_path_buf()));

    if result.is_err() {
        drop(writer);
        let _ = std::fs::remove_file(dest);
    }
    result
}

/// Runs every job, in parallel when the `parallel` feature is enabled.
/// Results come back in job order.
pub fn rewrite_files(jobs: &[RewriteJob]) -> Vec<(PathBuf, Result<RewriteSummary, Error>)> {
    jobs.par_iter()
        .map(|job| {
            (
                job.source.clone(),
                rewrite_file(&job.source, &job.dest, &job.edits),
            )
        })
        .collect()
}

fn is_coordinate_record(first_token: &str) -> bool {
    first_token == "ATOM" || first_token == "HETATM"
}

fn emit<W: Write>(writer: &mut W, line: &str, summary: &mut RewriteSummary) -> Result<(), Error> {
    writeln!(writer, "{line}").map_err(|e| Error::from_io(e, None))?;
    summary.lines_out += 1;
    Ok(())
}

fn map_columns(headers: &[String]) -> AtomSiteColumns {
    let mut columns = AtomSiteColumns::default();
    for (i, header) in headers.iter().enumerate() {
        match header.as_str() {
            "_atom_site.auth_asym_id" => columns.auth_asym_id = Some(i),
            "_atom_site.label_asym_id" => columns.label_asym_id = Some(i),
            "_atom_site.auth_seq_id" => columns.auth_seq_id = Some(i),
            "_atom_site.label_seq_id" => columns.label_seq_id = Some(i),
            "_atom_site.pdbx_PDB_ins_code" => columns.pdbx_pdb_ins_code = Some(i),
            _ => {}
        }
    }
    columns
}

fn rewrite_record(
    line: &str,
    columns: &AtomSiteColumns,
    edits: &RewriteEdits,
    line_num: usize,
) -> Result<String, Error> {
    let mut fields: Vec<String> = line.split_whitespace().map(str::to_string).collect();

    let chain_idx = columns
        .auth_asym_id
        .or(columns.label_asym_id)
        .ok_or_else(|| Error::missing_column("mmCIF", None, "_atom_site.auth_asym_id"))?;
    let old_chain = fields
        .get(chain_idx)
        .cloned()
        .ok_or_else(|| {
            Error::parse(
                "mmCIF",
                None,
                line_num,
                "coordinate record shorter than its _atom_site definition",
            )
        })?;

    let needs_residue_edit = !edits.residue_map.is_empty() || !edits.concat_orders.is_empty();
    if needs_residue_edit {
        rewrite_residue_fields(&mut fields, columns, edits, &old_chain, line_num)?;
    }

    if let Some(new_chain) = edits.chain_map.get(&old_chain) {
        fields[chain_idx] = new_chain.clone();
        if let Some(label_idx) = columns.label_asym_id {
            if label_idx != chain_idx && label_idx < fields.len() {
                fields[label_idx] = new_chain.clone();
            }
        }
    }

    Ok(fields.join(" "))
}

fn rewrite_residue_fields(
    fields: &mut [String],
    columns: &AtomSiteColumns,
    edits: &RewriteEdits,
    old_chain: &str,
    line_num: usize,
) -> Result<(), Error> {
    let seq_idx = columns
        .auth_seq_id
        .ok_or_else(|| Error::missing_column("mmCIF", None, "_atom_site.auth_seq_id"))?;
    let seq_str = fields
        .get(seq_idx)
        .map(|s| s.as_str())
        .ok_or_else(|| {
            Error::parse(
                "mmCIF",
                None,
                line_num,
                "coordinate record shorter than its _atom_site definition",
            )
        })?;
    if matches!(seq_str, "." | "?") {
        return Ok(());
    }
    let old_number: i32 = seq_str.parse().map_err(|_| {
        Error::parse(
            "mmCIF",
            None,
            line_num,
            format!("invalid residue sequence number '{seq_str}'"),
        )
    })?;

    let icode = columns
        .pdbx_pdb_ins_code
        .and_then(|idx| fields.get(idx))
        .map(|s| s.as_str())
        .filter(|s| !matches!(*s, "." | "?"))
        .and_then(|s| s.chars().next());
    let old_id = match icode {
        Some(code) => ResidueId::with_icode(old_number, code),
        None => ResidueId::new(old_number),
    };

    let offset = edits.residue_offset(old_chain);
    let key = (old_chain.to_string(), old_id);

    if let Some(new_id) = edits.residue_map.get(&key) {
        let number = new_id.number + offset;
        fields[seq_idx] = number.to_string();
        if let Some(label_idx) = columns.label_seq_id {
            if label_idx < fields.len() && !matches!(fields[label_idx].as_str(), "." | "?") {
                fields[label_idx] = number.to_string();
            }
        }
        if let Some(icode_idx) = columns.pdbx_pdb_ins_code {
            if icode_idx < fields.len() {
                fields[icode_idx] = match new_id.suffix {
                    Some(letter) => letter.to_string(),
                    None => "?".to_string(),
                };
            }
        }
    } else if offset != 0 && edits.residue_map.is_empty() {
        // Concatenation-only pass: shift the author numbering wholesale.
        fields[seq_idx] = (old_number + offset).to_string();
    }

    Ok(())
}

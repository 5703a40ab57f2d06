use crate::io::context::ResidueCodeTable;
use crate::io::error::Error;
use crate::model::chain::Chain;
use crate::model::ids::ResidueId;
use crate::model::structure::Structure;
use std::collections::{HashMap, HashSet};
use std::io::BufRead;

#[derive(Default)]
struct AtomSiteIndices {
    group_pdb: Option<usize>,
    auth_comp_id: Option<usize>,
    label_comp_id: Option<usize>,
    auth_asym_id: Option<usize>,
    label_asym_id: Option<usize>,
    auth_seq_id: Option<usize>,
    label_seq_id: Option<usize>,
    pdbx_pdb_ins_code: Option<usize>,
    label_entity_id: Option<usize>,
}

#[derive(Default)]
struct EntityIndices {
    id: Option<usize>,
    description: Option<usize>,
}

enum ParserState {
    Base,
    InLoopHeader,
    InAtomSiteLoop,
    InEntityLoop,
    InOtherLoop,
}

#[derive(Default)]
struct Collector {
    chain_order: Vec<String>,
    chain_residues: HashMap<String, Vec<(ResidueId, char)>>,
    seen_residues: HashSet<(String, ResidueId)>,
    entity_chains: Vec<(String, Vec<String>)>,
    entity_rows: Vec<(String, String)>,
    entity_id_values: Vec<String>,
    entity_desc_values: Vec<String>,
}

/// Reads one mmCIF deposition into a [`Structure`]: chains in file order with
/// per-residue one-letter codes and author numbering, plus the entity table.
///
/// Only the `_atom_site` and `_entity` categories are consumed; everything
/// else is skipped. Entities whose chains never appear in the coordinate
/// records are dropped.
pub fn read<R: BufRead>(
    reader: R,
    id: &str,
    table: &ResidueCodeTable,
) -> Result<Structure, Error> {
    let mut collector = Collector::default();

    let mut state = ParserState::Base;
    let mut atom_indices = AtomSiteIndices::default();
    let mut entity_indices = EntityIndices::default();
    let mut current_loop_headers: Vec<String> = Vec::new();
    let mut line_num = 0;

    for line in reader.lines() {
        line_num += 1;
        let line = line.map_err(|e| Error::from_io(e, None))?;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let tokens = tokenize_cif_line(trimmed);
        if tokens.is_empty() {
            continue;
        }

        if tokens[0] == "loop_" {
            state = ParserState::InLoopHeader;
            current_loop_headers.clear();
            continue;
        }

        match state {
            ParserState::Base => {
                // Single-entity files carry `_entity` as key-value pairs
                // instead of a loop.
                if tokens[0] == "_entity.id" && tokens.len() >= 2 {
                    collector.entity_id_values.push(tokens[1].clone());
                } else if tokens[0] == "_entity.pdbx_description" && tokens.len() >= 2 {
                    collector.entity_desc_values.push(tokens[1].clone());
                }
            }
            ParserState::InLoopHeader => {
                if tokens[0].starts_with('_') {
                    current_loop_headers.push(tokens[0].clone());
                } else if current_loop_headers
                    .iter()
                    .any(|h| h.starts_with("_atom_site."))
                {
                    state = ParserState::InAtomSiteLoop;
                    atom_indices = map_atom_site_indices(&current_loop_headers);
                    process_atom_line(&tokens, &atom_indices, line_num, table, &mut collector)?;
                } else if current_loop_headers.iter().any(|h| h.starts_with("_entity.")) {
                    state = ParserState::InEntityLoop;
                    entity_indices = map_entity_indices(&current_loop_headers);
                    process_entity_line(&tokens, &entity_indices, &mut collector);
                } else {
                    state = ParserState::InOtherLoop;
                }
            }
            ParserState::InAtomSiteLoop => {
                if leaves_loop(&tokens[0]) {
                    state = next_state(&tokens[0], &mut current_loop_headers);
                } else {
                    process_atom_line(&tokens, &atom_indices, line_num, table, &mut collector)?;
                }
            }
            ParserState::InEntityLoop => {
                if leaves_loop(&tokens[0]) {
                    state = next_state(&tokens[0], &mut current_loop_headers);
                } else {
                    process_entity_line(&tokens, &entity_indices, &mut collector);
                }
            }
            ParserState::InOtherLoop => {
                if leaves_loop(&tokens[0]) {
                    state = next_state(&tokens[0], &mut current_loop_headers);
                }
            }
        }
    }

    Ok(build_structure(id, collector))
}

fn leaves_loop(token: &str) -> bool {
    token.starts_with('_') || token == "loop_"
}

fn next_state(token: &str, headers: &mut Vec<String>) -> ParserState {
    if token == "loop_" {
        headers.clear();
        ParserState::InLoopHeader
    } else {
        ParserState::Base
    }
}

/// Splits a CIF line into tokens, honoring single and double quotes.
fn tokenize_cif_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quote = None;

    for c in line.chars() {
        match in_quote {
            Some(q) => {
                if c == q {
                    in_quote = None;
                } else {
                    current.push(c);
                }
            }
            None => {
                if c.is_whitespace() {
                    if !current.is_empty() {
                        tokens.push(current.clone());
                        current.clear();
                    }
                } else if c == '\'' || c == '"' {
                    if !current.is_empty() {
                        current.push(c);
                    } else {
                        in_quote = Some(c);
                    }
                } else {
                    current.push(c);
                }
            }
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn map_atom_site_indices(headers: &[String]) -> AtomSiteIndices {
    let mut indices = AtomSiteIndices::default();
    for (i, header) in headers.iter().enumerate() {
        match header.as_str() {
            "_atom_site.group_PDB" => indices.group_pdb = Some(i),
            "_atom_site.auth_comp_id" => indices.auth_comp_id = Some(i),
            "_atom_site.label_comp_id" => indices.label_comp_id = Some(i),
            "_atom_site.auth_asym_id" => indices.auth_asym_id = Some(i),
            "_atom_site.label_asym_id" => indices.label_asym_id = Some(i),
            "_atom_site.auth_seq_id" => indices.auth_seq_id = Some(i),
            "_atom_site.label_seq_id" => indices.label_seq_id = Some(i),
            "_atom_site.pdbx_PDB_ins_code" => indices.pdbx_pdb_ins_code = Some(i),
            "_atom_site.label_entity_id" => indices.label_entity_id = Some(i),
            _ => {}
        }
    }
    indices
}

fn map_entity_indices(headers: &[String]) -> EntityIndices {
    let mut indices = EntityIndices::default();
    for (i, header) in headers.iter().enumerate() {
        match header.as_str() {
            "_entity.id" => indices.id = Some(i),
            "_entity.pdbx_description" => indices.description = Some(i),
            _ => {}
        }
    }
    indices
}

fn token<'a>(tokens: &'a [String], idx: usize, line_num: usize) -> Result<&'a str, Error> {
    tokens.get(idx).map(|s| s.as_str()).ok_or_else(|| {
        Error::parse(
            "mmCIF",
            None,
            line_num,
            "coordinate record shorter than its _atom_site definition",
        )
    })
}

fn optional_token<'a>(
    tokens: &'a [String],
    idx: Option<usize>,
    line_num: usize,
) -> Result<Option<&'a str>, Error> {
    if let Some(idx) = idx {
        token(tokens, idx, line_num).map(Some)
    } else {
        Ok(None)
    }
}

fn is_absent(value: &str) -> bool {
    matches!(value, "." | "?")
}

fn process_atom_line(
    tokens: &[String],
    indices: &AtomSiteIndices,
    line_num: usize,
    table: &ResidueCodeTable,
    collector: &mut Collector,
) -> Result<(), Error> {
    let comp_idx = indices
        .auth_comp_id
        .or(indices.label_comp_id)
        .ok_or_else(|| Error::missing_column("mmCIF", None, "_atom_site.auth_comp_id"))?;
    let asym_idx = indices
        .auth_asym_id
        .or(indices.label_asym_id)
        .ok_or_else(|| Error::missing_column("mmCIF", None, "_atom_site.auth_asym_id"))?;
    let seq_idx = indices
        .auth_seq_id
        .or(indices.label_seq_id)
        .ok_or_else(|| Error::missing_column("mmCIF", None, "_atom_site.auth_seq_id"))?;

    let res_name = token(tokens, comp_idx, line_num)?;
    let chain_id_raw = token(tokens, asym_idx, line_num)?;
    let seq_str = token(tokens, seq_idx, line_num)?;
    let icode_str = optional_token(tokens, indices.pdbx_pdb_ins_code, line_num)?;
    let entity_str = optional_token(tokens, indices.label_entity_id, line_num)?;
    // The group column is only consulted for validity; both ATOM and HETATM
    // records contribute residues.
    let _ = optional_token(tokens, indices.group_pdb, line_num)?;

    if is_absent(seq_str) {
        return Ok(());
    }
    let number: i32 = seq_str.parse().map_err(|_| {
        Error::parse(
            "mmCIF",
            None,
            line_num,
            format!("invalid residue sequence number '{seq_str}'"),
        )
    })?;

    let icode = icode_str
        .filter(|code| !is_absent(code))
        .and_then(|code| code.chars().next());
    let residue_id = match icode {
        Some(code) => ResidueId::with_icode(number, code),
        None => ResidueId::new(number),
    };

    let chain_id = if is_absent(chain_id_raw) {
        "?".to_string()
    } else {
        chain_id_raw.to_string()
    };

    if !collector.chain_residues.contains_key(&chain_id) {
        collector
            .chain_residues
            .insert(chain_id.clone(), Vec::new());
        collector.chain_order.push(chain_id.clone());
    }

    let seen_key = (chain_id.clone(), residue_id);
    if collector.seen_residues.insert(seen_key) {
        let code = table.one_letter(res_name);
        collector
            .chain_residues
            .get_mut(&chain_id)
            .expect("chain registered above")
            .push((residue_id, code));
    }

    if let Some(entity_id) = entity_str.filter(|e| !is_absent(e)) {
        record_entity_chain(collector, entity_id, &chain_id);
    }

    Ok(())
}

fn record_entity_chain(collector: &mut Collector, entity_id: &str, chain_id: &str) {
    if let Some((_, chains)) = collector
        .entity_chains
        .iter_mut()
        .find(|(id, _)| id == entity_id)
    {
        if !chains.iter().any(|c| c == chain_id) {
            chains.push(chain_id.to_string());
        }
    } else {
        collector
            .entity_chains
            .push((entity_id.to_string(), vec![chain_id.to_string()]));
    }
}

fn process_entity_line(tokens: &[String], indices: &EntityIndices, collector: &mut Collector) {
    let (Some(id_idx), Some(desc_idx)) = (indices.id, indices.description) else {
        return;
    };
    if let (Some(id), Some(description)) = (tokens.get(id_idx), tokens.get(desc_idx)) {
        collector
            .entity_rows
            .push((id.clone(), description.clone()));
    }
}

fn build_structure(id: &str, mut collector: Collector) -> Structure {
    let mut structure = Structure::new(id);

    for chain_id in &collector.chain_order {
        if let Some(residues) = collector.chain_residues.remove(chain_id) {
            let mut chain = Chain::new(chain_id);
            for (residue_id, code) in residues {
                chain.push_residue(code, residue_id);
            }
            structure.add_chain(chain);
        }
    }

    // Key-value entity records join the loop-format rows.
    let kv_rows = collector
        .entity_id_values
        .into_iter()
        .zip(collector.entity_desc_values);
    let rows: Vec<(String, String)> = collector.entity_rows.into_iter().chain(kv_rows).collect();

    for (entity_id, description) in rows {
        if let Some((_, chains)) = collector.entity_chains.iter().find(|(id, _)| *id == entity_id)
        {
            for chain_id in chains {
                structure.record_entity_chain(&description, chain_id);
            }
        }
    }

    structure
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "\
data_test
#
loop_
_entity.id
_entity.pdbx_description
1 'INSULIN A CHAIN'
2 water
#
loop_
_atom_site.group_PDB
_atom_site.id
_atom_site.label_comp_id
_atom_site.label_asym_id
_atom_site.auth_asym_id
_atom_site.auth_seq_id
_atom_site.pdbx_PDB_ins_code
_atom_site.label_entity_id
ATOM 1 MET A A 1 ? 1
ATOM 2 MET A A 1 ? 1
ATOM 3 LYS A A 2 ? 1
ATOM 4 VAL A A 2 A 1
HETATM 5 HOH B B 100 ? 2
#
";

    fn parse(text: &str) -> Structure {
        read(
            Cursor::new(text),
            "test.cif",
            &ResidueCodeTable::new_default(),
        )
        .unwrap()
    }

    #[test]
    fn reader_extracts_sequences_and_numbering() {
        let structure = parse(SAMPLE);

        let chain_a = structure.chain("A").unwrap();
        assert_eq!(chain_a.full_sequence(), "MKV");
        assert_eq!(
            chain_a.residue_ids(),
            &[
                ResidueId::new(1),
                ResidueId::new(2),
                ResidueId::with_icode(2, 'A'),
            ]
        );
    }

    #[test]
    fn reader_collapses_atoms_into_one_residue() {
        let structure = parse(SAMPLE);

        // Two MET atoms under residue 1 count once.
        assert_eq!(structure.chain("A").unwrap().residue_count(), 3);
    }

    #[test]
    fn reader_translates_unknown_residues_to_x() {
        let structure = parse(SAMPLE);

        assert_eq!(structure.chain("B").unwrap().full_sequence(), "X");
    }

    #[test]
    fn reader_builds_entity_table_from_atom_records() {
        let structure = parse(SAMPLE);

        assert_eq!(structure.entity_count(), 2);
        let insulin = structure.entity("INSULIN A CHAIN").unwrap();
        assert_eq!(insulin.chain_ids(), &["A".to_string()]);
        let water = structure.entity("WATER").unwrap();
        assert_eq!(water.chain_ids(), &["B".to_string()]);
    }

    #[test]
    fn reader_drops_entities_without_atoms() {
        let text = SAMPLE.replace("2 water\n", "2 water\n3 'GHOST ENTITY'\n");
        let structure = parse(&text);

        assert!(structure.entity("GHOST ENTITY").is_none());
        assert_eq!(structure.entity_count(), 2);
    }

    #[test]
    fn reader_accepts_key_value_entity_records() {
        let text = "\
data_single
_entity.id 1
_entity.pdbx_description 'LYSOZYME'
loop_
_atom_site.group_PDB
_atom_site.label_comp_id
_atom_site.auth_asym_id
_atom_site.auth_seq_id
_atom_site.label_entity_id
ATOM GLY A 1 1
ATOM ALA A 2 1
#
";
        let structure = parse(text);

        assert_eq!(structure.chain("A").unwrap().full_sequence(), "GA");
        assert_eq!(
            structure.entity("LYSOZYME").unwrap().chain_ids(),
            &["A".to_string()]
        );
    }

    #[test]
    fn reader_skips_records_with_absent_numbering() {
        let text = "\
loop_
_atom_site.group_PDB
_atom_site.label_comp_id
_atom_site.auth_asym_id
_atom_site.auth_seq_id
ATOM GLY A 1
ATOM ALA A ?
ATOM VAL A 2
#
";
        let structure = parse(text);

        assert_eq!(structure.chain("A").unwrap().full_sequence(), "GV");
    }

    #[test]
    fn reader_rejects_short_coordinate_records() {
        let text = "\
loop_
_atom_site.group_PDB
_atom_site.label_comp_id
_atom_site.auth_asym_id
_atom_site.auth_seq_id
ATOM GLY A
";
        let err = read(
            Cursor::new(text),
            "bad.cif",
            &ResidueCodeTable::new_default(),
        )
        .unwrap_err();

        assert!(err.to_string().contains("_atom_site definition"));
    }

    #[test]
    fn reader_requires_a_chain_column() {
        let text = "\
loop_
_atom_site.group_PDB
_atom_site.label_comp_id
_atom_site.auth_seq_id
ATOM GLY 1
";
        let err = read(
            Cursor::new(text),
            "bad.cif",
            &ResidueCodeTable::new_default(),
        )
        .unwrap_err();

        assert!(matches!(err, Error::MissingColumn { .. }));
    }

    #[test]
    fn tokenizer_honors_quoted_fields() {
        let tokens = tokenize_cif_line("1 'INSULIN A CHAIN' rest");

        assert_eq!(tokens, vec!["1", "INSULIN A CHAIN", "rest"]);
    }
}

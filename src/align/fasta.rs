//! The aligner's multi-sequence exchange format: one `>` header line
//! carrying an identifier token, followed by the sequence.

use std::io::{self, BufRead, Write};

/// Writes records as `>{id}` header lines followed by one sequence line.
pub fn write_records<W: Write>(writer: &mut W, records: &[(String, String)]) -> io::Result<()> {
    for (id, sequence) in records {
        writeln!(writer, ">{id}")?;
        writeln!(writer, "{sequence}")?;
    }
    Ok(())
}

/// Reads records back, tolerating sequences wrapped over several lines.
/// The identifier is the first whitespace token after `>`.
pub fn parse_records<R: BufRead>(reader: R) -> io::Result<Vec<(String, String)>> {
    let mut records: Vec<(String, String)> = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(header) = trimmed.strip_prefix('>') {
            let id = header
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string();
            records.push((id, String::new()));
        } else if let Some((_, sequence)) = records.last_mut() {
            sequence.push_str(trimmed);
        } else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "sequence data before the first '>' header",
            ));
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn records_round_trip() {
        let records = vec![
            ("1abc.cif".to_string(), "MKV".to_string()),
            ("2def.cif".to_string(), "M-V".to_string()),
        ];
        let mut buffer = Vec::new();
        write_records(&mut buffer, &records).unwrap();

        let parsed = parse_records(Cursor::new(buffer)).unwrap();

        assert_eq!(parsed, records);
    }

    #[test]
    fn parse_joins_wrapped_sequence_lines() {
        let text = ">seq1\nMKV\nLE\n>seq2\nMKVLE\n";

        let parsed = parse_records(Cursor::new(text)).unwrap();

        assert_eq!(parsed[0], ("seq1".to_string(), "MKVLE".to_string()));
        assert_eq!(parsed[1], ("seq2".to_string(), "MKVLE".to_string()));
    }

    #[test]
    fn parse_takes_first_header_token_as_id() {
        let text = "> 1abc.cif trailing note\nMKV\n";

        let parsed = parse_records(Cursor::new(text)).unwrap();

        assert_eq!(parsed[0].0, "1abc.cif");
    }

    #[test]
    fn parse_rejects_headerless_data() {
        let err = parse_records(Cursor::new("MKV\n")).unwrap_err();

        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn parse_of_empty_input_yields_no_records() {
        assert!(parse_records(Cursor::new("")).unwrap().is_empty());
    }
}

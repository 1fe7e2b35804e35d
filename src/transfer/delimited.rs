use crate::error::{PhraseError, Result};

use super::records::Table;

pub fn encode(table: &Table) -> Result<Vec<u8>> {
    let mut writer = ::csv::Writer::from_writer(Vec::new());
    writer
        .write_record(&table.headers)
        .map_err(|e| PhraseError::Export(format!("csv header: {}", e)))?;
    for row in &table.rows {
        writer
            .write_record(row)
            .map_err(|e| PhraseError::Export(format!("csv row: {}", e)))?;
    }
    writer
        .into_inner()
        .map_err(|e| PhraseError::Export(format!("csv flush: {}", e)))
}

/// Read a CSV file. An unreadable header fails the whole file; an unreadable
/// data row is kept as an empty row and listed in `unreadable`.
pub fn decode(bytes: &[u8]) -> Result<Table> {
    let mut reader = ::csv::ReaderBuilder::new()
        .flexible(true)
        .trim(::csv::Trim::Headers)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| PhraseError::validation(format!("unreadable csv header: {}", e)))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut unreadable = Vec::new();
    for (position, record) in reader.byte_records().enumerate() {
        match record.map_err(|e| e.to_string()).and_then(|r| text_fields(&r)) {
            Ok(fields) => rows.push(fields),
            Err(message) => {
                unreadable.push((position, format!("unreadable csv row: {}", message)));
                rows.push(Vec::new());
            }
        }
    }

    Ok(Table {
        headers,
        rows,
        unreadable,
    })
}

fn text_fields(record: &::csv::ByteRecord) -> std::result::Result<Vec<String>, String> {
    record
        .iter()
        .enumerate()
        .map(|(column, field)| {
            std::str::from_utf8(field)
                .map(str::to_string)
                .map_err(|_| format!("column {} is not valid UTF-8", column + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_quotes_commas() {
        let table = Table {
            headers: vec!["key".into(), "tags".into()],
            rows: vec![vec!["save".into(), "a,b".into()]],
            ..Default::default()
        };
        let bytes = encode(&table).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "key,tags\nsave,\"a,b\"\n");
    }

    #[test]
    fn test_decode_reads_headers_and_rows() {
        let table = decode(b"key,sourceText\nsave,Save\ncancel,\"Cancel, now\"\n").unwrap();
        assert_eq!(table.headers, vec!["key", "sourceText"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1][1], "Cancel, now");
    }

    #[test]
    fn test_decode_tolerates_short_rows() {
        let table = decode(b"key,sourceText,context\nsave,Save\n").unwrap();
        assert_eq!(table.rows[0].len(), 2);
    }

    #[test]
    fn test_decode_keeps_going_after_invalid_utf8_row() {
        let mut bytes = b"key,sourceText\nsave,Save\nbad,".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        bytes.extend_from_slice(b"\ncancel,Cancel\n");

        let table = decode(&bytes).unwrap();
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.unreadable.len(), 1);
        assert_eq!(table.unreadable[0].0, 1);
        assert!(table.unreadable[0].1.contains("column 2"));

        let records = table.into_records();
        assert_eq!(records[0].as_ref().unwrap().key.as_deref(), Some("save"));
        assert!(records[1].as_ref().unwrap_err().contains("UTF-8"));
        assert_eq!(records[2].as_ref().unwrap().key.as_deref(), Some("cancel"));
    }
}

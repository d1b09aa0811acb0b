//! Newline-delimited JSON: one object per line, each line ending in `\n`.

use serde::de::DeserializeOwned;
use serde::Serialize;

pub fn to_ndjson<T: Serialize>(rows: &[T]) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::with_capacity(rows.len() * 256);
    for row in rows {
        serde_json::to_writer(&mut buf, row)?;
        buf.push(b'\n');
    }
    Ok(buf)
}

pub fn from_ndjson<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>, serde_json::Error> {
    bytes
        .split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .map(serde_json::from_slice)
        .collect()
}

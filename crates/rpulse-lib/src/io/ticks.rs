use crate::signal::Sample;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::{fs::File, io::Read, path::Path};

/// Read `timestamp,value` rows. A header row is detected and skipped when its
/// first field is not numeric.
pub fn read_ticks_from<R: Read>(reader: R) -> Result<Vec<Sample>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .flexible(true)
        .from_reader(reader);
    let mut samples = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading row {}", idx + 1))?;
        let (Some(ts), Some(value)) = (record.get(0), record.get(1)) else {
            anyhow::bail!("row {} needs a timestamp and a value", idx + 1);
        };
        let timestamp = match ts.parse::<f64>() {
            Ok(t) => t,
            Err(_) if idx == 0 => continue,
            Err(e) => return Err(e).with_context(|| format!("row {} timestamp {ts:?}", idx + 1)),
        };
        let value = value
            .parse::<f64>()
            .with_context(|| format!("row {} value {value:?}", idx + 1))?;
        samples.push(Sample::new(timestamp, value));
    }
    Ok(samples)
}

pub fn read_ticks(path: &Path) -> Result<Vec<Sample>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_ticks_from(file).with_context(|| format!("in {}", path.display()))
}

pub fn write_ticks(path: &Path, samples: &[Sample]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["timestamp", "value"])?;
    for s in samples {
        writer.write_record([s.timestamp.to_string(), s.value.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_with_and_without_header() {
        let with = read_ticks_from("timestamp,value\n0.0, 1.5\n0.033,1.6\n".as_bytes()).unwrap();
        let without = read_ticks_from("0.0,1.5\n# gap\n0.033,1.6\n".as_bytes()).unwrap();
        assert_eq!(with, without);
        assert_eq!(with[1], Sample::new(0.033, 1.6));
    }

    #[test]
    fn rejects_short_rows() {
        let err = read_ticks_from("0.0,1.0\n0.1\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn write_then_read_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ticks.csv");
        let samples = vec![Sample::new(0.0, 100.25), Sample::new(0.04, 101.0)];
        write_ticks(&path, &samples).unwrap();
        assert_eq!(read_ticks(&path).unwrap(), samples);
    }
}

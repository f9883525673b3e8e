use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::LazyLock;

use flate2::read::MultiGzDecoder;
use log::warn;
use regex::Regex;

use crate::errors::{IngestError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const READ_BUFFER: usize = 256 * 1024;

static DATE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})(.*)$").expect("valid date regex"));

///
/// Reduce a date string to its leading `YYYY-MM-DD`.
///
/// Upstream data has been seen with spurious suffixes after the date, those are
/// dropped with a warning.
///
/// # Errors
/// [IngestError::InvalidDate] if the string does not start with a date at all.
///
pub fn sanitize_date(date: &str) -> Result<String> {
    let trimmed = date.trim();
    match DATE_PREFIX.captures(trimmed) {
        Some(caps) => {
            let rest = caps.get(2).map_or("", |m| m.as_str());
            if !rest.is_empty() {
                warn!("Discarding trailing content {:?} from date {:?}", rest, date);
            }
            Ok(caps[1].to_string())
        }
        None => Err(IngestError::InvalidDate(date.to_string())),
    }
}

/// [sanitize_date] over an optional value.
pub fn sanitize_opt_date(date: Option<String>) -> Result<Option<String>> {
    date.as_deref().map(sanitize_date).transpose()
}

/// Parse a numeric attribute. Non-numeric values are logged and dropped.
pub fn parse_count(value: Option<String>) -> Option<i64> {
    let value = value?;
    match value.trim().parse::<i64>() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!("Ignoring non-numeric count {:?}", value);
            None
        }
    }
}

/// Flatten one level of nesting.
pub fn flatten1<T>(nested: Vec<Vec<T>>) -> Vec<T> {
    nested.into_iter().flatten().collect()
}

///
/// Wrap a byte stream so that gzip input is decompressed transparently.
///
/// The format is detected from the gzip magic bytes, not from a file name.
///
pub fn get_dynamic_reader_from<R: Read + Send + 'static>(
    inner: R,
) -> Result<Box<dyn BufRead + Send>> {
    let mut buffered = BufReader::with_capacity(READ_BUFFER, inner);
    let is_gzipped = {
        let head = buffered.fill_buf()?;
        head.len() >= 2 && head[..2] == GZIP_MAGIC
    };

    if is_gzipped {
        Ok(Box::new(BufReader::with_capacity(
            READ_BUFFER,
            MultiGzDecoder::new(buffered),
        )))
    } else {
        Ok(Box::new(buffered))
    }
}

///
/// Get a reader for either a gzip'd or non-gzip'd file.
///
/// # Arguments
///
/// - path: path to the file to read
///
pub fn get_dynamic_reader(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    get_dynamic_reader_from(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::io::Write;

    #[rstest]
    #[case("2024-01-05", "2024-01-05")]
    #[case("2024-01-05T00:00:00", "2024-01-05")]
    #[case("2018-05-17-05:00", "2018-05-17")]
    #[case(" 2020-02-29 ", "2020-02-29")]
    fn test_sanitize_date(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_date(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("May 2019")]
    #[case("19-05-2019")]
    fn test_sanitize_date_rejects(#[case] input: &str) {
        assert!(matches!(sanitize_date(input), Err(IngestError::InvalidDate(_))));
    }

    #[rstest]
    fn test_parse_count() {
        assert_eq!(parse_count(Some("3".to_string())), Some(3));
        assert_eq!(parse_count(Some("three".to_string())), None);
        assert_eq!(parse_count(None), None);
    }

    #[rstest]
    fn test_flatten1() {
        assert_eq!(flatten1(vec![vec![1, 2], vec![], vec![3]]), vec![1, 2, 3]);
    }

    #[rstest]
    fn test_dynamic_reader_plain_and_gzip() {
        let payload = b"<ClinVarVariationRelease/>".to_vec();

        let mut plain = String::new();
        get_dynamic_reader_from(std::io::Cursor::new(payload.clone()))
            .unwrap()
            .read_to_string(&mut plain)
            .unwrap();
        assert_eq!(plain.as_bytes(), payload.as_slice());

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut unzipped = String::new();
        get_dynamic_reader_from(std::io::Cursor::new(compressed))
            .unwrap()
            .read_to_string(&mut unzipped)
            .unwrap();
        assert_eq!(unzipped.as_bytes(), payload.as_slice());
    }

    #[rstest]
    fn test_dynamic_reader_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("release.xml");
        std::fs::write(&path, "<a/>").unwrap();
        let mut out = String::new();
        get_dynamic_reader(&path).unwrap().read_to_string(&mut out).unwrap();
        assert_eq!(out, "<a/>");
    }
}

//! Row abstraction and the streaming tab-separated hit reader.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::io::Read;

use csv::{ReaderBuilder, StringRecord};

pub const IP_COLUMN: &str = "ip";
pub const USER_AGENT_COLUMN: &str = "user_agent";
pub const REFERRER_COLUMN: &str = "referrer";
pub const EVENT_LIST_COLUMN: &str = "event_list";
pub const PRODUCT_LIST_COLUMN: &str = "product_list";

pub const REQUIRED_COLUMNS: [&str; 5] = [
    IP_COLUMN,
    USER_AGENT_COLUMN,
    REFERRER_COLUMN,
    EVENT_LIST_COLUMN,
    PRODUCT_LIST_COLUMN,
];

/// One hit row: column name → string value.
pub trait HitRecord {
    fn field(&self, column: &str) -> Option<&str>;
}

impl<S: BuildHasher> HitRecord for HashMap<String, String, S> {
    fn field(&self, column: &str) -> Option<&str> {
        self.get(column).map(String::as_str)
    }
}

impl HitRecord for BTreeMap<String, String> {
    fn field(&self, column: &str) -> Option<&str> {
        self.get(column).map(String::as_str)
    }
}

impl<T: HitRecord + ?Sized> HitRecord for &T {
    fn field(&self, column: &str) -> Option<&str> {
        (**self).field(column)
    }
}

#[derive(Debug)]
pub enum InputError {
    Io(std::io::Error),
    Csv(csv::Error),
    MissingColumns(Vec<String>),
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(error) => write!(f, "failed to read hit data: {error}"),
            Self::Csv(error) => write!(f, "failed to read hit data: {error}"),
            Self::MissingColumns(columns) => write!(
                f,
                "input is missing required columns: {}",
                columns.join(", ")
            ),
        }
    }
}

impl std::error::Error for InputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(error) => Some(error),
            Self::Csv(error) => Some(error),
            Self::MissingColumns(_) => None,
        }
    }
}

impl From<std::io::Error> for InputError {
    fn from(error: std::io::Error) -> Self {
        InputError::Io(error)
    }
}

impl From<csv::Error> for InputError {
    fn from(error: csv::Error) -> Self {
        InputError::Csv(error)
    }
}

/// A record pulled from the TSV stream.
pub enum TsvRecord<'a> {
    Hit(TsvRow<'a>),
    /// The line could not be decoded (for example invalid UTF-8). The stream
    /// itself is still healthy and reading may continue.
    Malformed { line: Option<u64>, reason: String },
}

/// Borrowed view of the current TSV line, valid until the next read.
pub struct TsvRow<'a> {
    record: &'a StringRecord,
    columns: &'a HashMap<String, usize>,
}

impl TsvRow<'_> {
    pub fn line(&self) -> Option<u64> {
        self.record.position().map(|position| position.line())
    }
}

impl HitRecord for TsvRow<'_> {
    fn field(&self, column: &str) -> Option<&str> {
        self.columns
            .get(column)
            .and_then(|&index| self.record.get(index))
    }
}

/// Forward-only reader over tab-separated hit data with a header line.
///
/// Holds a single reusable record buffer, so memory stays flat no matter how
/// long the input is. Ragged lines are accepted; columns past the end of a
/// short line simply read as missing.
pub struct TsvHitReader<R> {
    reader: csv::Reader<R>,
    columns: HashMap<String, usize>,
    record: StringRecord,
}

impl<R: Read> TsvHitReader<R> {
    /// Reads the header and checks that every required column is present.
    pub fn new(source: R) -> Result<Self, InputError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .quoting(false)
            .from_reader(source);

        let columns: HashMap<String, usize> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(index, name)| (name.trim().to_string(), index))
            .collect();

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|column| !columns.contains_key(**column))
            .map(|column| column.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(InputError::MissingColumns(missing));
        }

        Ok(Self {
            reader,
            columns,
            record: StringRecord::new(),
        })
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Pulls the next record. `Ok(None)` marks the end of input; only I/O
    /// failures of the underlying reader are returned as errors.
    pub fn next_record(&mut self) -> Result<Option<TsvRecord<'_>>, InputError> {
        match self.reader.read_record(&mut self.record) {
            Ok(false) => Ok(None),
            Ok(true) => Ok(Some(TsvRecord::Hit(TsvRow {
                record: &self.record,
                columns: &self.columns,
            }))),
            Err(error) if error.is_io_error() => Err(InputError::Csv(error)),
            Err(error) => Ok(Some(TsvRecord::Malformed {
                line: error.position().map(|position| position.line()),
                reason: error.to_string(),
            })),
        }
    }
}

//! Delimited record reader for registry address files
//!
//! Members are `;`-separated, Windows-1250 encoded text with a header row.
//! Columns are addressed through [`Field`] rather than by header string; the
//! header row is mapped onto the fixed schema once when the reader is built.

use super::error::ImportError;
use encoding_rs::WINDOWS_1250;
use encoding_rs_io::{DecodeReaderBytes, DecodeReaderBytesBuilder};
use std::io::Read;

/// Logical columns consumed by the row processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Settlement part code, the town key
    TownCode,
    TownName,
    TownPartName,
    PostalCode,
    StreetName,
    HouseNumber,
    OrientationNumber,
    OrientationLetter,
    /// Address point code, the number key
    NumberCode,
    CoordX,
    CoordY,
}

impl Field {
    pub const ALL: [Field; 11] = [
        Field::TownCode,
        Field::TownName,
        Field::TownPartName,
        Field::PostalCode,
        Field::StreetName,
        Field::HouseNumber,
        Field::OrientationNumber,
        Field::OrientationLetter,
        Field::NumberCode,
        Field::CoordX,
        Field::CoordY,
    ];

    /// Header as published in the source files
    pub fn header(&self) -> &'static str {
        match self {
            Field::TownCode => "Kód části obce",
            Field::TownName => "Název obce",
            Field::TownPartName => "Název části obce",
            Field::PostalCode => "PSČ",
            Field::StreetName => "Název ulice",
            Field::HouseNumber => "Číslo domovní",
            Field::OrientationNumber => "Číslo orientační",
            Field::OrientationLetter => "Číslo orientační písmeno",
            Field::NumberCode => "Kód ADM",
            Field::CoordX => "Souřadnice X",
            Field::CoordY => "Souřadnice Y",
        }
    }

    /// Whether a file lacking this column is rejected
    pub fn is_required(&self) -> bool {
        !matches!(
            self,
            Field::TownPartName
                | Field::PostalCode
                | Field::OrientationNumber
                | Field::OrientationLetter
        )
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// One row, with every schema field resolved to a string
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: [String; 11],
}

impl Record {
    /// Value of a field; absent columns and short rows read as `""`
    pub fn get(&self, field: Field) -> &str {
        &self.values[field.index()]
    }

    /// Build a record from field/value pairs
    pub fn from_fields<'a>(pairs: impl IntoIterator<Item = (Field, &'a str)>) -> Self {
        let mut record = Record::default();
        for (field, value) in pairs {
            record.values[field.index()] = value.to_string();
        }
        record
    }
}

/// Streaming reader producing [`Record`]s from one member
pub struct RecordReader<R: Read> {
    records: csv::StringRecordsIntoIter<DecodeReaderBytes<R, Vec<u8>>>,
    columns: [Option<usize>; 11],
    rows_read: u64,
}

impl<R: Read> RecordReader<R> {
    /// Read the header row and map it onto [`Field`].
    ///
    /// Fails with [`ImportError::MissingHeaders`] when a required column is
    /// absent.
    pub fn new(source: R) -> Result<Self, ImportError> {
        let decoded = DecodeReaderBytesBuilder::new()
            .encoding(Some(WINDOWS_1250))
            .build(source);
        let mut csv = csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(true)
            .flexible(true)
            .from_reader(decoded);

        let headers = csv.headers()?.clone();
        let mut columns = [None; 11];
        for field in Field::ALL {
            columns[field.index()] = headers.iter().position(|h| h.trim() == field.header());
        }

        let missing: Vec<String> = Field::ALL
            .iter()
            .filter(|f| f.is_required() && columns[f.index()].is_none())
            .map(|f| f.header().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ImportError::MissingHeaders(missing));
        }

        Ok(Self {
            records: csv.into_records(),
            columns,
            rows_read: 0,
        })
    }

    /// Rows yielded so far
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Record, ImportError>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.records.next()?;
        self.rows_read += 1;
        Some(raw.map_err(ImportError::from).map(|row| {
            let mut record = Record::default();
            for field in Field::ALL {
                if let Some(value) = self.columns[field.index()].and_then(|i| row.get(i)) {
                    record.values[field.index()] = value.to_string();
                }
            }
            record
        }))
    }
}

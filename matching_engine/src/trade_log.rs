use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::trade::Trade;

pub const CSV_HEADER: &str = "timestamp,buyOrderID,sellOrderID,price,quantity";

/// Append-only CSV sink for executed trades.
///
/// Opened in append mode; the header is written only when the file is
/// empty, so re-opening an existing log keeps appending rows. Each row is
/// flushed as it is written. The engine serializes access with its own
/// lock, independent of the book lock.
#[derive(Debug)]
pub struct TradeLog {
    path: PathBuf,
    file: File,
}

impl TradeLog {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if file.metadata()?.len() == 0 {
            writeln!(file, "{}", CSV_HEADER)?;
            file.flush()?;
        }
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, trade: &Trade) -> io::Result<()> {
        writeln!(self.file, "{}", trade.to_csv_row())?;
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.csv");

        {
            let mut log = TradeLog::open(&path).unwrap();
            log.append(&Trade::new(1, 2, 100, 5)).unwrap();
        }
        {
            let mut log = TradeLog::open(&path).unwrap();
            log.append(&Trade::new(3, 4, 101, 7)).unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].ends_with(",1,2,100,5"));
        assert!(lines[2].ends_with(",3,4,101,7"));
    }
}

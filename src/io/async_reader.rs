//! Asynchronous CSV reader with batch interface
//!
//! Reads CSV rows in batches and converts each row to a domain value.
//! Works for both input files: accounts and actions.
//!
//! # Design
//!
//! The AsyncReader uses:
//! - csv-async for streaming CSV parsing
//! - a caller-supplied conversion from the raw row to a domain type
//! - batch reading so memory stays bounded by the batch size
//!
//! Rows that fail to parse or convert are logged with their line number and
//! skipped; they never abort the read.
//!
//! # Architecture
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of Accounts / ActionRequests
//!                  ↓
//!           csv_format module
//!           (AccountRecord, ActionRecord, convert_*)
//! ```

use crate::types::FeeFineError;
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Asynchronous CSV reader
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,

    /// Data rows consumed so far, good or bad
    rows: u64,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    /// Create a new AsyncReader
    ///
    /// Fields are trimmed and rows may have fewer columns than the header;
    /// missing trailing columns read as empty.
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self { csv_reader, rows: 0 }
    }

    /// Data rows consumed so far, including skipped ones
    pub fn rows_read(&self) -> u64 {
        self.rows
    }

    /// Read up to `batch_size` rows, converting each with `convert`
    ///
    /// # Arguments
    ///
    /// * `batch_size` - Maximum number of rows to consume
    /// * `convert` - Turns a deserialized row into the wanted value
    ///
    /// # Returns
    ///
    /// The successfully converted values, in file order. The vector is also
    /// empty when every row of the batch was skipped; compare `rows_read`
    /// before and after to detect the end of the file.
    pub async fn read_batch<T, U, F>(&mut self, batch_size: usize, convert: F) -> Vec<U>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) -> Result<U, FeeFineError>,
    {
        let mut batch = Vec::with_capacity(batch_size);
        let mut consumed = 0;
        let mut records = self.csv_reader.deserialize::<T>();

        while consumed < batch_size {
            let Some(record) = records.next().await else {
                break;
            };
            consumed += 1;
            self.rows += 1;
            // header is line 1
            let line = self.rows + 1;

            match record {
                Ok(record) => match convert(record) {
                    Ok(value) => batch.push(value),
                    Err(e) => warn!(line, error = %e, "skipping invalid record"),
                },
                Err(e) => warn!(line, error = %e, "skipping unreadable record"),
            }
        }

        batch
    }

    /// Read every remaining row
    pub async fn read_all<T, U, F>(&mut self, batch_size: usize, convert: F) -> Vec<U>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) -> Result<U, FeeFineError>,
    {
        let mut all = Vec::new();
        loop {
            let start = self.rows;
            let batch = self.read_batch::<T, U, _>(batch_size, &convert).await;
            if self.rows == start {
                break;
            }
            all.extend(batch);
        }
        all
    }
}

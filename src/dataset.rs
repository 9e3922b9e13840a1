//! Loading of the bidder table and the query stream.

use crate::catalog::{AdvertiserId, BidderCatalog, BidderRecord, CatalogError};
use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("cannot read {path}: {source}")]
    Io { path: String, source: io::Error },
    #[error("malformed bidder row: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid bidder table: {0}")]
    Catalog(#[from] CatalogError),
}

/// Row layout of the bidder CSV: `Advertiser,Keyword,Bid Value,Budget`
#[derive(Debug, Deserialize)]
struct BidderRow {
    #[serde(rename = "Advertiser")]
    advertiser: AdvertiserId,
    #[serde(rename = "Keyword")]
    keyword: String,
    #[serde(rename = "Bid Value")]
    bid_value: f64,
    #[serde(rename = "Budget", default)]
    budget: Option<f64>,
}

impl From<BidderRow> for BidderRecord {
    fn from(row: BidderRow) -> Self {
        BidderRecord {
            advertiser_id: row.advertiser,
            keyword: row.keyword,
            bid_value: row.bid_value,
            budget: row.budget,
        }
    }
}

/// Parse bidder records from CSV with a header row
/// Blank budget cells are read as absent
pub fn read_bidder_records<R: Read>(reader: R) -> Result<Vec<BidderRecord>, DatasetError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();
    for row in csv_reader.deserialize::<BidderRow>() {
        records.push(row?.into());
    }
    Ok(records)
}

/// Parse a query stream, one keyword per line
/// Keywords are trimmed like the bidder table's cells and blank lines are skipped
pub fn read_queries<R: Read>(reader: R) -> Result<Vec<String>, io::Error> {
    let mut queries = Vec::new();
    for line in BufReader::new(reader).lines() {
        let line = line?;
        let keyword = line.trim();
        if !keyword.is_empty() {
            queries.push(keyword.to_string());
        }
    }
    Ok(queries)
}

fn open(path: &Path) -> Result<File, DatasetError> {
    File::open(path).map_err(|source| DatasetError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Load and validate the bidder catalog from a CSV file
pub fn load_catalog(path: &Path) -> Result<BidderCatalog, DatasetError> {
    let records = read_bidder_records(open(path)?)?;
    Ok(BidderCatalog::from_records(records)?)
}

/// Load the query stream from a text file
pub fn load_queries(path: &Path) -> Result<Vec<String>, DatasetError> {
    read_queries(open(path)?).map_err(|source| DatasetError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BIDDERS: &str = "Advertiser,Keyword,Bid Value,Budget\n\
        0,running shoes,0.5,100\n\
        0,hiking boots,1.0,\n\
        1,running shoes,0.75,50\n";

    #[test]
    fn test_read_bidder_records() {
        let records = read_bidder_records(BIDDERS.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], BidderRecord {
            advertiser_id: 0,
            keyword: "running shoes".to_string(),
            bid_value: 0.5,
            budget: Some(100.0),
        });
        assert_eq!(records[1].budget, None);
    }

    #[test]
    fn test_records_build_catalog() {
        let catalog = BidderCatalog::from_records(read_bidder_records(BIDDERS.as_bytes()).unwrap()).unwrap();
        assert_eq!(catalog.eligible_bidders("running shoes").len(), 2);
        assert_eq!(catalog.remaining_budget(0), 100.0);
        assert_eq!(catalog.remaining_budget(1), 50.0);
    }

    #[test]
    fn test_malformed_bid_is_rejected() {
        let input = "Advertiser,Keyword,Bid Value,Budget\n0,shoes,cheap,10\n";
        let result = read_bidder_records(input.as_bytes());
        assert!(matches!(result, Err(DatasetError::Csv(_))));
    }

    #[test]
    fn test_read_queries_skips_blank_lines() {
        let input = "shoes\r\nboots\n\n  \nrunning shoes\n";
        let queries = read_queries(input.as_bytes()).unwrap();
        assert_eq!(queries, vec!["shoes", "boots", "running shoes"]);
    }

    #[test]
    fn test_padded_query_matches_trimmed_keyword() {
        let bidders = "Advertiser , Keyword , Bid Value , Budget\n3 ,  shoes , 1.5 , 30\n";
        let catalog = BidderCatalog::from_records(read_bidder_records(bidders.as_bytes()).unwrap()).unwrap();
        let queries = read_queries(" shoes\nshoes  \r\n\tshoes\n".as_bytes()).unwrap();

        assert_eq!(queries, vec!["shoes", "shoes", "shoes"]);
        for keyword in &queries {
            assert_eq!(catalog.eligible_bidders(keyword).len(), 1);
        }
    }

    #[test]
    fn test_missing_file_reports_path() {
        let result = load_queries(Path::new("does/not/exist.txt"));
        match result {
            Err(DatasetError::Io { path, .. }) => assert_eq!(path, "does/not/exist.txt"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}

use std::fs::File;
use std::path::Path;

use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use log::{error, info, warn};
use serde::Deserialize;

use crate::error::{InputError, QueryError};
use crate::models::{JobType, SearchQuery, DEFAULT_RESULTS_WANTED};
use crate::sources::SourceKind;

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct QueryRecord {
    #[serde(
        rename = "Source",
        alias = "source",
        alias = "Board",
        alias = "board",
        default
    )]
    pub source: Option<String>,
    #[serde(
        rename = "Keywords",
        alias = "keywords",
        alias = "Keyword",
        alias = "keyword",
        alias = "Query"
    )]
    pub keywords: String,
    #[serde(rename = "Location", alias = "location", alias = "Country", alias = "country", default)]
    pub location: Option<String>,
    #[serde(rename = "Job Type", alias = "job_type", alias = "JobType", alias = "Type", default)]
    pub job_type: Option<String>,
    #[serde(rename = "Remote", alias = "remote", alias = "Remote Only", default)]
    pub remote: Option<String>,
    #[serde(rename = "Hours Old", alias = "hours_old", alias = "Max Age Hours", default)]
    pub hours_old: Option<u32>,
    #[serde(
        rename = "Results",
        alias = "results",
        alias = "Results Wanted",
        alias = "results_wanted",
        default
    )]
    pub results_wanted: Option<usize>,
}

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "ya"
    )
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl QueryRecord {
    /// Source defaults to LinkedIn when the column is absent or blank.
    pub fn source_kind(&self) -> Result<SourceKind, QueryError> {
        non_empty(&self.source).map_or(Ok(SourceKind::LinkedIn), str::parse)
    }

    pub fn to_query<I>(&self, known_ids: I) -> Result<SearchQuery, QueryError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut builder = SearchQuery::builder(self.keywords.clone())
            .results_wanted(self.results_wanted.unwrap_or(DEFAULT_RESULTS_WANTED))
            .known_ids(known_ids);
        if let Some(location) = non_empty(&self.location) {
            builder = builder.location(location);
        }
        if let Some(job_type) = non_empty(&self.job_type) {
            builder = builder.job_type(job_type.parse::<JobType>()?);
        }
        if let Some(remote) = non_empty(&self.remote) {
            builder = builder.remote_only(truthy(remote));
        }
        if let Some(hours) = self.hours_old {
            builder = builder.max_age_hours(hours);
        }
        builder.build()
    }
}

/// Reads query rows from a CSV or `.xlsx` file. Rows that fail to parse are
/// logged and skipped.
pub fn load_records<P: AsRef<Path>>(filename: P) -> Result<Vec<QueryRecord>, InputError> {
    let path = filename.as_ref();
    if !path.exists() {
        return Err(InputError::NotFound(path.display().to_string()));
    }

    let is_excel = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));
    if is_excel {
        load_excel(path)
    } else {
        load_csv(path)
    }
}

fn load_csv(path: &Path) -> Result<Vec<QueryRecord>, InputError> {
    let file = File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut records = Vec::new();
    for (row, result) in rdr.deserialize::<QueryRecord>().enumerate() {
        match result {
            Ok(record) if record.keywords.trim().is_empty() => {
                warn!("Skipping CSV row {} without keywords", row + 1);
            }
            Ok(record) => records.push(record),
            Err(e) => error!("Error parsing CSV row {}: {}", row + 1, e),
        }
    }
    info!("Loaded {} query rows from CSV {:?}", records.len(), path);
    Ok(records)
}

#[derive(Debug, Default)]
struct Columns {
    source: Option<usize>,
    keywords: Option<usize>,
    location: Option<usize>,
    job_type: Option<usize>,
    remote: Option<usize>,
    hours_old: Option<usize>,
    results_wanted: Option<usize>,
}

impl Columns {
    fn from_header(header: &[Data]) -> Self {
        let mut columns = Columns::default();
        for (idx, cell) in header.iter().enumerate() {
            let name = cell.to_string().to_lowercase();
            let slot = if name.contains("keyword") || name.contains("query") {
                &mut columns.keywords
            } else if name.contains("source") || name.contains("board") {
                &mut columns.source
            } else if name.contains("location") || name.contains("country") {
                &mut columns.location
            } else if name.contains("type") {
                &mut columns.job_type
            } else if name.contains("remote") {
                &mut columns.remote
            } else if name.contains("hour") || name.contains("age") {
                &mut columns.hours_old
            } else if name.contains("result") {
                &mut columns.results_wanted
            } else {
                continue;
            };
            if slot.is_none() {
                *slot = Some(idx);
            }
        }
        columns
    }
}

fn cell_text(row: &[Data], idx: Option<usize>) -> Option<String> {
    let text = row.get(idx?)?.to_string();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn cell_number(row: &[Data], idx: Option<usize>) -> Option<u64> {
    match row.get(idx?)? {
        Data::Int(n) => u64::try_from(*n).ok(),
        Data::Float(f) if *f >= 0.0 => Some(f.round() as u64),
        other => other.to_string().trim().parse().ok(),
    }
}

fn records_from_range(range: &Range<Data>) -> Result<Vec<QueryRecord>, InputError> {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };
    let columns = Columns::from_header(header);
    if columns.keywords.is_none() {
        return Err(InputError::MissingColumn("keywords"));
    }

    Ok(rows
        .filter_map(|row| {
            let keywords = cell_text(row, columns.keywords)?;
            Some(QueryRecord {
                source: cell_text(row, columns.source),
                keywords,
                location: cell_text(row, columns.location),
                job_type: cell_text(row, columns.job_type),
                remote: cell_text(row, columns.remote),
                hours_old: cell_number(row, columns.hours_old)
                    .and_then(|h| u32::try_from(h).ok()),
                results_wanted: cell_number(row, columns.results_wanted)
                    .and_then(|r| usize::try_from(r).ok()),
            })
        })
        .collect())
}

fn load_excel(path: &Path) -> Result<Vec<QueryRecord>, InputError> {
    let mut excel: Xlsx<_> = open_workbook(path)?;

    let records = match excel.worksheets().into_iter().next() {
        Some((_name, range)) => records_from_range(&range)?,
        None => {
            warn!("Workbook {:?} has no worksheets", path);
            Vec::new()
        }
    };
    info!("Loaded {} query rows from Excel {:?}", records.len(), path);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn temp_csv(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "job_scraper_{}_{}.csv",
            name,
            std::process::id()
        ));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn csv_rows_accept_header_aliases() {
        let path = temp_csv(
            "aliases",
            "source,keyword,Location,Job Type,Remote,Hours Old,Results\n\
             jobstreet, python developer ,Jakarta,full time,yes,48,10\n\
             linkedin,,Bandung,,,,\n\
             glints,golang,ID,,,,\n",
        );
        let records = load_records(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.source_kind().unwrap(), SourceKind::JobStreet);
        let query = first.to_query(vec!["jobstreet_1".to_string()]).unwrap();
        assert_eq!(query.keywords(), "python developer");
        assert_eq!(query.job_type(), JobType::FullTime);
        assert!(query.remote_only());
        assert_eq!(query.max_age_hours(), Some(48));
        assert_eq!(query.results_wanted(), 10);
        assert!(query.known_ids().contains("jobstreet_1"));

        let second = records[1].to_query(Vec::new()).unwrap();
        assert_eq!(second.results_wanted(), DEFAULT_RESULTS_WANTED);
        assert_eq!(second.location(), "ID");
    }

    #[test]
    fn bad_values_surface_as_query_errors() {
        let record = QueryRecord {
            source: Some("indeed".into()),
            keywords: "rust".into(),
            job_type: Some("freelance".into()),
            ..QueryRecord::default()
        };
        assert!(matches!(record.source_kind(), Err(QueryError::UnknownSource(_))));
        assert!(matches!(
            record.to_query(Vec::new()),
            Err(QueryError::UnknownJobType(_))
        ));
        assert_eq!(QueryRecord::default().source_kind().unwrap(), SourceKind::LinkedIn);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(matches!(
            load_records("definitely-not-here.csv"),
            Err(InputError::NotFound(_))
        ));
    }

    #[test]
    fn sheet_rows_map_by_header() {
        let mut range = Range::new((0, 0), (2, 3));
        range.set_value((0, 0), Data::String("Keywords".into()));
        range.set_value((0, 1), Data::String("Source".into()));
        range.set_value((0, 2), Data::String("Hours Old".into()));
        range.set_value((0, 3), Data::String("Results Wanted".into()));
        range.set_value((1, 0), Data::String("data engineer".into()));
        range.set_value((1, 1), Data::String("glints".into()));
        range.set_value((1, 2), Data::Float(72.0));
        range.set_value((1, 3), Data::Int(15));

        let records = records_from_range(&range).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].keywords, "data engineer");
        assert_eq!(records[0].hours_old, Some(72));
        assert_eq!(records[0].results_wanted, Some(15));

        let mut headless = Range::new((0, 0), (1, 0));
        headless.set_value((0, 0), Data::String("Company".into()));
        assert!(matches!(
            records_from_range(&headless),
            Err(InputError::MissingColumn("keywords"))
        ));
    }
}

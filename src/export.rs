use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Local;
use log::info;

use crate::models::NormalizedJob;

pub const RESULT_HEADERS: [&str; 12] = [
    "id",
    "title",
    "company",
    "company_url",
    "location",
    "salary",
    "date_posted",
    "job_url",
    "work_arrangement",
    "source",
    "query",
    "timestamp",
];

pub struct ResultWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl ResultWriter<File> {
    /// Opens `path` for appending; headers are written only for a new file.
    pub fn append(path: impl AsRef<Path>) -> Result<Self, csv::Error> {
        let path = path.as_ref();
        let file_exists = path.exists();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        ResultWriter::from_writer(file, !file_exists)
    }
}

impl<W: Write> ResultWriter<W> {
    pub fn from_writer(inner: W, write_headers: bool) -> Result<Self, csv::Error> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        if write_headers {
            writer.write_record(RESULT_HEADERS)?;
            writer.flush()?;
        }
        Ok(ResultWriter { writer })
    }

    pub fn write_jobs(
        &mut self,
        source: &str,
        query: &str,
        jobs: &[NormalizedJob],
    ) -> Result<usize, csv::Error> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        for job in jobs {
            self.writer.write_record([
                job.id.as_str(),
                job.title.as_str(),
                job.company.as_str(),
                job.company_url.as_deref().unwrap_or_default(),
                job.location.as_str(),
                job.salary.as_deref().unwrap_or_default(),
                job.date_posted.as_deref().unwrap_or_default(),
                job.job_url.as_str(),
                job.work_arrangement.as_str(),
                source,
                query,
                timestamp.as_str(),
            ])?;
        }
        self.writer.flush()?;
        info!("Wrote {} rows for '{}'", jobs.len(), query);
        Ok(jobs.len())
    }

    pub fn into_inner(self) -> Result<W, csv::Error> {
        self.writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkArrangement;

    #[test]
    fn rows_follow_headers() {
        let job = NormalizedJob {
            id: "jobstreet_1".into(),
            title: "Data Analyst, Senior".into(),
            company: "Acme".into(),
            company_url: None,
            location: "Jakarta Raya".into(),
            salary: Some("IDR 9,000,000+".into()),
            date_posted: Some("2024-05-18".into()),
            job_url: "https://id.jobstreet.com/id/job/1".into(),
            description: Some("<p>not exported</p>".into()),
            work_arrangement: WorkArrangement::Remote,
            source_keyword: Some("data".into()),
        };
        let mut writer = ResultWriter::from_writer(Vec::new(), true).unwrap();
        assert_eq!(writer.write_jobs("jobstreet", "data", &[job]).unwrap(), 1);

        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some(RESULT_HEADERS.join(",").as_str()));
        let row = lines.next().unwrap();
        assert!(row.starts_with(
            r#"jobstreet_1,"Data Analyst, Senior",Acme,,Jakarta Raya,"IDR 9,000,000+",2024-05-18,https://id.jobstreet.com/id/job/1,remote,jobstreet,data,"#
        ));
        assert_eq!(lines.next(), None);
    }
}

//! Run summary rendering.

use std::io::{self, Write};
use std::path::Path;

use clap::ValueEnum;
use gts_archive::ArchiveSummary;

/// Summary encoding on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Write the summary of an archive run.
pub fn write_summary<W: Write>(
    out: &mut W,
    format: OutputFormat,
    archive_dir: &Path,
    summary: &ArchiveSummary,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => {
            let doc = serde_json::json!({
                "command": "archive",
                "archive_dir": archive_dir,
                "range": summary.range,
                "partitions": summary.partitions,
                "totals": {
                    "partitions": summary.partitions.len(),
                    "new_rows": summary.total_new_rows(),
                    "skipped_rows": summary.total_skipped_rows(),
                    "copied_rows": summary.total_copied_rows(),
                },
            });
            serde_json::to_writer_pretty(&mut *out, &doc)?;
            writeln!(out)
        }
        OutputFormat::Text => {
            if summary.range.is_none() {
                return writeln!(out, "Nothing to archive: the store holds no valid rows");
            }
            writeln!(out, "Archive: {}", archive_dir.display())?;
            for p in &summary.partitions {
                writeln!(
                    out,
                    "  {}  {:<8} copied={} new={} skipped={}",
                    p.partition,
                    if p.created { "created" } else { "merged" },
                    p.copied_rows,
                    p.new_rows,
                    p.skipped_rows
                )?;
            }
            writeln!(
                out,
                "{} partitions, {} new rows, {} skipped",
                summary.partitions.len(),
                summary.total_new_rows(),
                summary.total_skipped_rows()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_summary_text() {
        let mut out = Vec::new();
        write_summary(&mut out, OutputFormat::Text, Path::new("a"), &ArchiveSummary::default())
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Nothing to archive"));
    }

    #[test]
    fn empty_summary_json() {
        let mut out = Vec::new();
        write_summary(&mut out, OutputFormat::Json, Path::new("a"), &ArchiveSummary::default())
            .unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert!(doc["range"].is_null());
        assert_eq!(doc["totals"]["new_rows"], 0);
        assert_eq!(doc["partitions"].as_array().unwrap().len(), 0);
    }
}

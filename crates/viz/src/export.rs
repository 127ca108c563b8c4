//! Files written to the output directory: the server's stats export and the
//! batch run report.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use world_model::StatsRecord;

/// File name for the server-side statistics export.
pub const STATS_EXPORT_FILE: &str = "stats.csv";

/// File name for the batch run report.
pub const BATCH_REPORT_FILE: &str = "run_stats.csv";

/// Render batch records as CSV: `tick,hour` followed by one column per POI.
///
/// POIs a record does not mention are written as 0.
pub fn batch_report_csv<'a>(
    records: &[StatsRecord],
    poi_names: impl IntoIterator<Item = &'a str>,
) -> String {
    let poi_names: Vec<&str> = poi_names.into_iter().collect();

    let mut header = vec!["tick", "hour"];
    header.extend(poi_names.iter().copied());

    let mut lines = vec![header.join(",")];
    for record in records {
        let mut row = vec![record.tick.to_string(), record.hour.to_string()];
        row.extend(
            poi_names
                .iter()
                .map(|poi| record.count(poi).unwrap_or(0).to_string()),
        );
        lines.push(row.join(","));
    }
    lines.join("\n")
}

/// Write `contents` to `dir/file_name`, creating the directory if needed.
pub fn write_output(dir: &Path, file_name: &str, contents: &[u8]) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    fs::write(&path, contents)?;
    Ok(path)
}

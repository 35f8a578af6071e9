//! 别名种子清单 CSV 读取
//!
//! 每行 `slug[,id]`，可带 `slug,id` 表头；`#` 开头的行视为注释

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use csv::ReaderBuilder;

use crate::errors::TallyError;
use crate::services::AliasSeedEntry;

/// 从 CSV 文件读取别名种子清单
pub fn read_alias_listing<P: AsRef<Path>>(path: P) -> Result<Vec<AliasSeedEntry>, TallyError> {
    let file = File::open(path.as_ref())
        .map_err(|e| TallyError::internal(format!("Failed to open file: {}", e)))?;
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let mut entries = Vec::new();
    let mut errors = Vec::new();

    for (row_idx, result) in csv_reader.records().enumerate() {
        let row_num = row_idx + 1;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                errors.push(format!("Row {}: CSV parse error: {}", row_num, e));
                continue;
            }
        };

        let slug = record.get(0).unwrap_or_default();
        if slug.is_empty() {
            continue;
        }
        if row_idx == 0 && slug.eq_ignore_ascii_case("slug") {
            continue;
        }

        let id = record
            .get(1)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        entries.push(AliasSeedEntry {
            slug: slug.to_string(),
            id,
        });
    }

    if !errors.is_empty() && entries.is_empty() {
        return Err(TallyError::serialization(format!(
            "Failed to read alias listing:\n{}",
            errors.join("\n")
        )));
    }

    if !errors.is_empty() {
        tracing::warn!("Alias listing warnings:\n{}", errors.join("\n"));
    }

    Ok(entries)
}

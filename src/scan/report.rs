//! CSV scan reports.
//!
//! Column sets are stable; downstream tooling joins these reports with
//! I/O traces by epoch. Booleans render as 0/1.

use std::io::Write;
use std::path::Path;

use crate::scan::group::GroupVerdict;
use crate::scan::reason;
use crate::scan::single::FileVerdict;

pub const SINGLE_HEADER: &str = "epoch,file,bytes,sha256,load_ok,nan_total,inf_total,shape_ok,\
expected_digest_present,digest_match,expected_file_sha_present,file_sha_match,corrupted,note";

pub const GROUP_HEADER: &str = "epoch,dir,has_commit,has_manifest,parts_ok,group_ok,note";

fn flag(b: bool) -> u8 {
    u8::from(b)
}

// Minimal CSV quoting; note fields are `;`-joined and paths can carry
// commas.
fn field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Writes the single-file scan report.
pub fn write_single_report(path: &Path, verdicts: &[FileVerdict]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut out = std::fs::File::create(path)?;
    writeln!(out, "{}", SINGLE_HEADER)?;
    for v in verdicts {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            v.epoch,
            field(&v.file),
            v.bytes,
            v.sha256,
            flag(v.load_ok),
            v.nan_total,
            v.inf_total,
            flag(v.shape_ok),
            flag(v.expected_digest_present),
            flag(v.digest_match),
            flag(v.expected_file_sha_present),
            flag(v.file_sha_match),
            flag(v.corrupted),
            field(&reason::join(&v.reasons)),
        )?;
    }
    Ok(())
}

/// Writes the group scan report.
pub fn write_group_report(path: &Path, verdicts: &[GroupVerdict]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut out = std::fs::File::create(path)?;
    writeln!(out, "{}", GROUP_HEADER)?;
    for v in verdicts {
        writeln!(
            out,
            "{},{},{},{},{},{},{}",
            v.epoch,
            field(&v.dir.display().to_string()),
            flag(v.has_commit),
            flag(v.has_manifest),
            flag(v.parts_ok),
            flag(v.group_ok),
            field(&reason::join(&v.reasons)),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::reason::Reason;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sample_file_verdict() -> FileVerdict {
        FileVerdict {
            epoch: 3,
            file: "ckpt_epoch_0003.tbin".to_string(),
            bytes: 1024,
            sha256: "ab".repeat(32),
            load_ok: true,
            nan_total: 0,
            inf_total: 0,
            shape_ok: true,
            expected_digest_present: true,
            digest_match: false,
            expected_file_sha_present: true,
            file_sha_match: false,
            corrupted: true,
            reasons: vec![Reason::DigestMismatch, Reason::FileShaMismatch],
        }
    }

    #[test]
    fn test_single_report_layout() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("guard/ckpt_scan.csv");
        write_single_report(&out, &[sample_file_verdict()]).unwrap();

        let content = std::fs::read_to_string(&out).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), SINGLE_HEADER);
        let row = lines.next().unwrap();
        assert!(row.starts_with("3,ckpt_epoch_0003.tbin,1024,"));
        assert!(row.ends_with(",1,digest_mismatch;file_sha_mismatch"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_group_report_layout() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("group_scan.csv");
        let verdict = GroupVerdict {
            epoch: 6,
            dir: PathBuf::from("groups/demo/epoch_0006"),
            has_commit: false,
            has_manifest: true,
            parts_ok: false,
            group_ok: false,
            reasons: vec![Reason::NoCommit],
        };
        write_group_report(&out, &[verdict]).unwrap();

        let content = std::fs::read_to_string(&out).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), GROUP_HEADER);
        assert_eq!(
            lines.next().unwrap(),
            "6,groups/demo/epoch_0006,0,1,0,0,no_commit"
        );
    }

    #[test]
    fn test_fields_with_commas_are_quoted() {
        assert_eq!(field("plain"), "plain");
        assert_eq!(field("a,b"), "\"a,b\"");
        assert_eq!(field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}

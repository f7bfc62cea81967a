//! Git output parsing helpers.

use std::path::Path;
use std::process::Output;

use super::error::{GitError, Result};
use super::types::CommitFileRecord;

/// Formats a git error with both stdout and stderr for better debugging.
pub fn format_git_error(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();

    match (stderr.is_empty(), stdout.is_empty()) {
        (true, true) => format!(
            "Command failed with exit code {}",
            output.status.code().unwrap_or(-1)
        ),
        (true, false) => stdout,
        (false, true) => stderr,
        (false, false) => format!("{}\n{}", stderr, stdout),
    }
}

/// Parses `git diff-tree --name-status -z` output into change records.
///
/// Paths are joined onto `repo_root`. Renames and copies carry two paths;
/// a rename deletes the old path and upserts the new one.
pub fn parse_name_status(output: &str, repo_root: &Path) -> Result<Vec<CommitFileRecord>> {
    let mut records = Vec::new();
    let mut tokens = output.split('\0').filter(|token| !token.is_empty());

    while let Some(status) = tokens.next() {
        let mut next_path = || {
            tokens
                .next()
                .map(|path| repo_root.join(path))
                .ok_or_else(|| GitError::MalformedOutput(format!("status '{}' without a path", status)))
        };

        match status.chars().next() {
            Some('A' | 'M' | 'T') => records.push(CommitFileRecord::upserted(next_path()?)),
            Some('D') => records.push(CommitFileRecord::deleted(next_path()?)),
            Some('R') => {
                let old = next_path()?;
                let new = next_path()?;
                records.push(CommitFileRecord::deleted(old));
                records.push(CommitFileRecord::upserted(new));
            }
            Some('C') => {
                let _source = next_path()?;
                records.push(CommitFileRecord::upserted(next_path()?));
            }
            _ => {
                // Unmerged or unknown entries still carry a path.
                let path = next_path()?;
                log::debug!("Ignoring '{}' entry for {}", status, path.display());
            }
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::types::ChangeKind;
    use std::path::PathBuf;

    #[test]
    fn test_parse_name_status() {
        let output = "M\0apis/orders/apiInformation.json\0A\0tags/new/tagInformation.json\0D\0apis/old/apiInformation.json\0";
        let records = parse_name_status(output, Path::new("/repo")).unwrap();
        assert_eq!(
            records,
            vec![
                CommitFileRecord::upserted("/repo/apis/orders/apiInformation.json"),
                CommitFileRecord::upserted("/repo/tags/new/tagInformation.json"),
                CommitFileRecord::deleted("/repo/apis/old/apiInformation.json"),
            ]
        );
    }

    #[test]
    fn test_parse_rename_and_paths_with_spaces() {
        let output = "R100\0version sets/a/versionSetInformation.json\0version sets/b/versionSetInformation.json\0";
        let records = parse_name_status(output, Path::new("/repo")).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].change, ChangeKind::Deleted);
        assert_eq!(
            records[1].path,
            PathBuf::from("/repo/version sets/b/versionSetInformation.json")
        );
    }

    #[test]
    fn test_parse_copy_upserts_destination() {
        let records = parse_name_status("C75\0a.json\0b.json\0", Path::new("/r")).unwrap();
        assert_eq!(records, vec![CommitFileRecord::upserted("/r/b.json")]);
    }

    #[test]
    fn test_parse_truncated_output() {
        let result = parse_name_status("M\0", Path::new("/repo"));
        assert!(matches!(result, Err(GitError::MalformedOutput(_))));
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_name_status("", Path::new("/repo")).unwrap().is_empty());
    }

    #[cfg(unix)]
    mod unix_tests {
        use super::*;
        use std::os::unix::process::ExitStatusExt;
        use std::process::ExitStatus;

        fn make_output(status_code: i32, stdout: &[u8], stderr: &[u8]) -> Output {
            Output {
                status: ExitStatus::from_raw(status_code << 8),
                stdout: stdout.to_vec(),
                stderr: stderr.to_vec(),
            }
        }

        #[test]
        fn test_format_git_error_empty_output() {
            let output = make_output(1, b"", b"");
            assert_eq!(format_git_error(&output), "Command failed with exit code 1");
        }

        #[test]
        fn test_format_git_error_both() {
            let output = make_output(128, b"some output", b"fatal: bad object");
            assert_eq!(format_git_error(&output), "fatal: bad object\nsome output");
        }
    }
}

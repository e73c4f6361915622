use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Overwrites a save slot. The new text lands in `<slot>.tmp` first, the
/// previous slot moves to `<slot>.bak`, then the tmp file takes the slot
/// name. A crash at any point leaves either the old or the new save readable.
pub fn replace_save_slot(slot: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = slot.parent() {
        fs::create_dir_all(parent)?;
    }

    let staged = with_suffix(slot, ".tmp");
    fs::write(&staged, text)?;

    if slot.is_file() {
        let backup = backup_path(slot);
        remove_if_present(&backup)
            .and_then(|()| fs::rename(slot, &backup))
            .inspect_err(|_| {
                let _ = fs::remove_file(&staged);
            })?;
    }

    fs::rename(&staged, slot).inspect_err(|_| {
        let _ = fs::remove_file(&staged);
    })
}

/// Where the previous contents of `slot` are kept after a replace.
pub fn backup_path(slot: &Path) -> PathBuf {
    with_suffix(slot, ".bak")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(error) if error.kind() != io::ErrorKind::NotFound => Err(error),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn first_write_creates_the_slot_without_a_backup() {
        let temp = TempDir::new().expect("temp");
        let slot = temp.path().join("saves").join("level1.save.json");

        replace_save_slot(&slot, "first").expect("write");

        assert_eq!(fs::read_to_string(&slot).expect("read"), "first");
        assert!(!backup_path(&slot).exists());
        assert!(!with_suffix(&slot, ".tmp").exists());
    }

    #[test]
    fn overwrite_keeps_only_the_previous_save_as_backup() {
        let temp = TempDir::new().expect("temp");
        let slot = temp.path().join("level1.save.json");

        replace_save_slot(&slot, "first").expect("first");
        replace_save_slot(&slot, "second").expect("second");
        replace_save_slot(&slot, "third").expect("third");

        assert_eq!(fs::read_to_string(&slot).expect("read"), "third");
        assert_eq!(
            fs::read_to_string(backup_path(&slot)).expect("read backup"),
            "second"
        );
        assert!(!with_suffix(&slot, ".tmp").exists());
    }

    #[test]
    fn backup_sits_next_to_the_slot() {
        let slot = Path::new("cache").join("saves").join("level2.save.json");
        assert_eq!(
            backup_path(&slot),
            Path::new("cache").join("saves").join("level2.save.json.bak")
        );
    }
}

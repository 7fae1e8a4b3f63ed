use std::path::{Path, PathBuf};

// Find WAV files to offer as the startup sample when none was given on
// the command line. Sorted so the pick is stable run to run.
pub fn index_wav_in_dir(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.extension()
                .map(|e| e.eq_ignore_ascii_case("wav"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    Ok(paths)
}

pub fn default_sample(dir: &Path) -> Option<PathBuf> {
    index_wav_in_dir(dir).ok()?.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dir_is_an_error_not_a_panic() {
        assert!(index_wav_in_dir(Path::new("/definitely/not/here")).is_err());
    }
}

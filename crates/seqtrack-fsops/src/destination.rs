//! Destination planning for finalized batches.
//!
//! The batch directory's path, minus its root or drive prefix, is mirrored
//! under the output root. When a trim segment is configured and found, every
//! component up to and including it is dropped so only the nesting below the
//! trim point is kept.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Compute where a batch directory is relocated to.
///
/// `trim_segment` may span several components (`Incoming/Lab1`); it matches
/// case-insensitively as a contiguous run. `.` components are dropped and `..`
/// components are kept literally.
#[must_use]
pub fn compute_destination(source_dir: &Path, output_root: &Path, trim_segment: &str) -> PathBuf {
    let relative: Vec<&OsStr> = source_dir
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment),
            Component::ParentDir => Some(OsStr::new("..")),
            Component::Prefix(_) | Component::RootDir | Component::CurDir => None,
        })
        .collect();

    let trim: Vec<String> = trim_segment
        .split(['/', '\\'])
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .map(str::to_lowercase)
        .collect();

    let kept = find_run(&relative, &trim).map_or(relative.as_slice(), |end| &relative[end..]);

    let mut destination = output_root.to_path_buf();
    for component in kept {
        destination.push(component);
    }
    destination
}

/// Index just past the first occurrence of `trim` inside `components`.
fn find_run(components: &[&OsStr], trim: &[String]) -> Option<usize> {
    if trim.is_empty() || trim.len() > components.len() {
        return None;
    }
    (0..=components.len() - trim.len())
        .find(|&start| {
            components[start..start + trim.len()]
                .iter()
                .zip(trim)
                .all(|(component, wanted)| component.to_string_lossy().to_lowercase() == *wanted)
        })
        .map(|start| start + trim.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_through_first_matching_component() {
        assert_eq!(
            compute_destination(
                Path::new("/data/incoming/LabA/Run7"),
                Path::new("/out"),
                "Incoming"
            ),
            PathBuf::from("/out/LabA/Run7")
        );
    }

    #[test]
    fn trim_equal_to_whole_path_yields_output_root() {
        assert_eq!(
            compute_destination(Path::new("/Incoming"), Path::new("/out"), "incoming"),
            PathBuf::from("/out")
        );
        assert_eq!(
            compute_destination(Path::new("/data/Incoming"), Path::new("/out"), "Incoming"),
            PathBuf::from("/out")
        );
    }

    #[test]
    fn missing_or_empty_trim_mirrors_whole_path() {
        let expected = PathBuf::from("/out/data/raw/Run7");
        assert_eq!(
            compute_destination(Path::new("/data/raw/Run7"), Path::new("/out"), "Incoming"),
            expected
        );
        assert_eq!(
            compute_destination(Path::new("/data/raw/Run7"), Path::new("/out"), ""),
            expected
        );
    }

    #[test]
    fn multi_component_trim_matches_contiguous_run() {
        assert_eq!(
            compute_destination(
                Path::new("/data/Incoming/x/Incoming/Lab1/Run2"),
                Path::new("/out"),
                "incoming/lab1"
            ),
            PathBuf::from("/out/Run2")
        );
    }

    #[test]
    fn dot_components_are_dropped_and_parent_components_kept() {
        assert_eq!(
            compute_destination(Path::new("./a/../b/Run"), Path::new("/out"), ""),
            PathBuf::from("/out/a/../b/Run")
        );
    }

    #[test]
    fn planning_is_idempotent() {
        let once = compute_destination(Path::new("/d/Incoming/R1"), Path::new("/o"), "Incoming");
        let twice = compute_destination(Path::new("/d/Incoming/R1"), Path::new("/o"), "Incoming");
        assert_eq!(once, twice);
    }
}

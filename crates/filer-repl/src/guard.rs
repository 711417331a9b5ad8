//! Recursive replication guard.
//!
//! Replicating a filer into itself is only safe when the sink directory lies
//! outside the observed source directory; otherwise every write the sink does
//! shows up as a new change and the loop never settles. The check is made on
//! configuration alone, before the sink is built.

use crate::config::Config;
use crate::error::{ReplError, Result};

/// True if writing to `sink_dir` on `sink_addr` would be observed by a source
/// watching `source_dir` on `source_addr`.
///
/// This is a literal string prefix test; directories are not normalized.
pub fn is_recursive(source_addr: &str, source_dir: &str, sink_addr: &str, sink_dir: &str) -> bool {
    source_addr == sink_addr && sink_dir.starts_with(source_dir)
}

/// Registered name of the namespace sink that writes back into a filer.
pub const FILER_SINK: &str = "filer";

/// Reject configurations that replicate a filer subtree into itself.
///
/// `sink` is the name of the sink selection will pick. Only the filer sink
/// can write back into the source, so any other sink (or none) passes.
pub fn check_recursive_replication(config: &Config, sink: Option<&str>) -> Result<()> {
    let source = config.sub("source.filer");
    if source.is_empty() || sink != Some(FILER_SINK) {
        return Ok(());
    }

    let target = config.sub("sink.filer");
    let source_dir = source.get_string("directory");
    let sink_dir = target.get_string("directory");
    if is_recursive(
        &source.get_string("grpcAddress"),
        &source_dir,
        &target.get_string("grpcAddress"),
        &sink_dir,
    ) {
        return Err(ReplError::RecursiveReplication { source_dir, sink_dir });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filer_pair(source_addr: &str, source_dir: &str, sink_addr: &str, sink_dir: &str) -> Config {
        Config::new()
            .with("source.filer.grpcAddress", source_addr)
            .with("source.filer.directory", source_dir)
            .with("sink.filer.enabled", true)
            .with("sink.filer.grpcAddress", sink_addr)
            .with("sink.filer.directory", sink_dir)
    }

    mod predicate {
        use super::*;

        #[test]
        fn test_nested_on_same_filer() {
            assert!(is_recursive("f:18888", "/data", "f:18888", "/data/backup"));
            assert!(is_recursive("f:18888", "/data", "f:18888", "/data"));
        }

        #[test]
        fn test_disjoint_directories() {
            assert!(!is_recursive("f:18888", "/data", "f:18888", "/other"));
            assert!(!is_recursive("f:18888", "/data/backup", "f:18888", "/data"));
        }

        #[test]
        fn test_different_filers() {
            assert!(!is_recursive("a:18888", "/data", "b:18888", "/data/backup"));
        }

        #[test]
        fn test_literal_prefix_not_path_aware() {
            assert!(is_recursive("f:1", "/data", "f:1", "/data2"));
            assert!(!is_recursive("f:1", "/data/", "f:1", "/data"));
        }
    }

    mod config_check {
        use super::*;

        const FILER: Option<&str> = Some(FILER_SINK);

        #[test]
        fn test_sink_under_source_is_fatal() {
            let config = filer_pair("localhost:18888", "/data", "localhost:18888", "/data/backup");
            let err = check_recursive_replication(&config, FILER).unwrap_err();
            assert!(err.is_fatal());
            assert!(matches!(err, ReplError::RecursiveReplication { .. }));
        }

        #[test]
        fn test_sink_elsewhere_passes() {
            let config = filer_pair("localhost:18888", "/data", "localhost:18888", "/other");
            check_recursive_replication(&config, FILER).unwrap();
        }

        #[test]
        fn test_other_selected_sink_passes() {
            // a leftover filer section does not matter when another sink wins
            let config = filer_pair("f:1", "/data", "f:1", "/data/backup");
            check_recursive_replication(&config, Some("local")).unwrap();
            check_recursive_replication(&config, None).unwrap();
        }

        #[test]
        fn test_without_source_section_passes() {
            let config = Config::new()
                .with("sink.filer.enabled", true)
                .with("sink.filer.directory", "/data");
            check_recursive_replication(&config, FILER).unwrap();
        }

        #[test]
        fn test_address_keys_are_case_insensitive() {
            let config = Config::new()
                .with("source.filer.grpcaddress", "f:1")
                .with("source.filer.directory", "/a")
                .with("sink.filer.enabled", true)
                .with("SINK.FILER.GRPCADDRESS", "f:1")
                .with("sink.filer.directory", "/a/b");
            assert!(check_recursive_replication(&config, FILER).is_err());
        }
    }
}

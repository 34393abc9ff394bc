//! Output relay
//!
//! `sm-action` writes each output value straight into the `GITHUB_OUTPUT`
//! file and prints a marker line. The relay only declares that the named
//! output exists; values never travel through stdout.

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::host::Host;

/// Value passed to the host when declaring a relayed output
pub const OUTPUT_PLACEHOLDER: &str = "***";

// The marker may arrive wrapped in a workflow command such as `::debug::`
static MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:::[a-z][a-z-]*(?: [^:]*)?::)?Successfully wrote '([^']+)' to GITHUB_OUTPUT$")
        .expect("marker pattern is valid")
});

/// Named output reported by the wrapped program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputMarker {
    pub name: String,
}

/// Extract markers from captured stdout, in order of appearance
pub fn parse_markers(stdout: &str) -> Vec<OutputMarker> {
    stdout
        .lines()
        .filter_map(|line| MARKER.captures(line.trim()))
        .map(|caps| OutputMarker {
            name: caps[1].to_string(),
        })
        .collect()
}

/// Declare every marked output on the host; returns how many were declared
pub fn relay_outputs(stdout: &str, host: &dyn Host) -> usize {
    let mut declared = 0;
    for marker in parse_markers(stdout) {
        match host.set_output(&marker.name, OUTPUT_PLACEHOLDER) {
            Ok(()) => {
                host.debug(&format!("Declared output {}", marker.name));
                declared += 1;
            }
            Err(e) => {
                warn!("Failed to declare output {}: {e}", marker.name);
                host.warning(&format!("Failed to declare output {}: {e}", marker.name));
            }
        }
    }
    declared
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordingHost;

    #[test]
    fn single_marker_registers_one_output() {
        let host = RecordingHost::new();
        let count = relay_outputs("Successfully wrote 'FOO' to GITHUB_OUTPUT\n", &host);

        assert_eq!(count, 1);
        assert_eq!(host.outputs(), vec![("FOO".to_string(), OUTPUT_PLACEHOLDER.to_string())]);
    }

    #[test]
    fn unrelated_lines_are_ignored() {
        let stdout = "Parsing secrets input...\n\
                      Authenticating with Bitwarden...\n\
                      Successfully wrote 'FOO' to GITHUB_ENV\n\
                      wrote 'BAR' to GITHUB_OUTPUT\n";
        let host = RecordingHost::new();

        assert_eq!(relay_outputs(stdout, &host), 0);
        assert!(host.outputs().is_empty());
    }

    #[test]
    fn markers_keep_order_and_tolerate_whitespace() {
        let stdout = "  Successfully wrote 'DB_PASSWORD' to GITHUB_OUTPUT\r\n\
                      noise\n\
                      Successfully wrote 'API_KEY' to GITHUB_OUTPUT";
        let names: Vec<_> = parse_markers(stdout).into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["DB_PASSWORD", "API_KEY"]);
    }

    #[test]
    fn marker_inside_workflow_command_is_recognised() {
        let stdout = "::debug::Successfully wrote 'FOO' to GITHUB_OUTPUT\n\
                      ::notice title=sm-action::Successfully wrote 'BAR' to GITHUB_OUTPUT\n";
        let host = RecordingHost::new();

        assert_eq!(relay_outputs(stdout, &host), 2);
        assert_eq!(
            host.outputs(),
            vec![
                ("FOO".to_string(), OUTPUT_PLACEHOLDER.to_string()),
                ("BAR".to_string(), OUTPUT_PLACEHOLDER.to_string()),
            ]
        );
    }

    #[test]
    fn arbitrary_prefix_is_not_a_marker() {
        assert!(parse_markers("echo Successfully wrote 'FOO' to GITHUB_OUTPUT").is_empty());
    }

    #[test]
    fn empty_name_is_not_a_marker() {
        assert!(parse_markers("Successfully wrote '' to GITHUB_OUTPUT").is_empty());
    }
}

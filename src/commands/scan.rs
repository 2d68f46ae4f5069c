//! `promptforge scan`: offline template report.

use super::read_input;
use crate::cli::ScanArgs;
use crate::error::Result;
use crate::scan::find_floating_variables;
use crate::text::extract_placeholder_names;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub placeholders: BTreeSet<String>,
    /// Placeholder usages outside any tag, in order of appearance.
    pub floating: Vec<String>,
}

impl ScanReport {
    pub fn of(template: &str) -> Self {
        Self {
            placeholders: extract_placeholder_names(template),
            floating: find_floating_variables(template),
        }
    }

    pub fn render(&self) -> String {
        let list = |items: Vec<&str>| {
            if items.is_empty() {
                "(none)".to_string()
            } else {
                items.join(", ")
            }
        };

        format!(
            "Variables identified: {}\nFloating variables: {}\n",
            list(self.placeholders.iter().map(String::as_str).collect()),
            list(self.floating.iter().map(String::as_str).collect()),
        )
    }
}

pub fn cmd_scan(args: ScanArgs) -> Result<()> {
    let template = read_input(&args.template_file, "template file")?;
    print!("{}", ScanReport::of(&template).render());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_lists_floating_usage() {
        let report = ScanReport::of("Review {$ESSAY} now.\n<essay>\n{$ESSAY}\n</essay>");

        assert_eq!(report.placeholders, BTreeSet::from(["$ESSAY".to_string()]));
        assert_eq!(report.floating, vec!["{$ESSAY}".to_string()]);
        assert_eq!(
            report.render(),
            "Variables identified: $ESSAY\nFloating variables: {$ESSAY}\n"
        );
    }

    #[test]
    fn test_report_for_clean_template() {
        let report = ScanReport::of("<essay>{$ESSAY}</essay>");
        assert!(report.render().ends_with("Floating variables: (none)\n"));
    }
}

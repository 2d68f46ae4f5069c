//! Rendering the conversation history injected into each turn's prompt.

use super::tool_call::wrap_cdata;

const INDENT: &str = "  ";

/// Remove the whitespace prefix shared by all non-blank lines.
/// Whitespace-only lines become empty.
pub fn dedent(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();

    let mut margin: Option<&str> = None;
    for line in lines.iter().filter(|line| !line.trim().is_empty()) {
        let indent = &line[..line.len() - line.trim_start_matches([' ', '\t']).len()];
        margin = Some(match margin {
            None => indent,
            Some(current) => common_prefix(current, indent),
        });
    }
    let margin = margin.unwrap_or("");

    lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                &line[margin.len()..]
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    &a[..len]
}

/// Dedent and trim `text`, then indent every non-empty line by `level`
/// steps of two spaces.
pub fn indent_block(text: &str, level: usize) -> String {
    let dedented = dedent(text);
    let trimmed = dedented.trim();
    let prefix = INDENT.repeat(level);

    trimmed
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the `<history>` block from the seed turns and the turns so far.
pub fn render_history(initial_turns: &[String], entries: &[String]) -> String {
    let blocks: Vec<String> = initial_turns
        .iter()
        .chain(entries)
        .map(|block| block.trim())
        .filter(|block| !block.is_empty())
        .map(|block| indent_block(block, 1))
        .collect();

    if blocks.is_empty() {
        return "<history />".to_string();
    }
    format!("<history>\n{}\n</history>", blocks.join("\n"))
}

/// History entry for a successful turn.
pub fn render_turn_entry(turn: u32, tool_call_xml: &str, observation: &str) -> String {
    [
        format!("  <turn index=\"{turn}\">"),
        "    <agent>".to_string(),
        indent_block(tool_call_xml, 3),
        "    </agent>".to_string(),
        "    <environment>".to_string(),
        indent_block(observation, 3),
        "    </environment>".to_string(),
        "  </turn>".to_string(),
    ]
    .join("\n")
}

/// History entry for a rejected attempt.
pub fn render_format_violation(turn: u32, raw_output: &str, feedback: &str, attempt: u32) -> String {
    let invalid = format!("<invalid_output>{}</invalid_output>", wrap_cdata(raw_output));

    [
        format!("  <turn index=\"{turn}\" type=\"format_violation\" attempt=\"{attempt}\">"),
        "    <agent>".to_string(),
        indent_block(&invalid, 3),
        "    </agent>".to_string(),
        "    <environment>".to_string(),
        indent_block(feedback, 3),
        "    </environment>".to_string(),
        "  </turn>".to_string(),
    ]
    .join("\n")
}

/// System feedback appended after a rejected attempt.
pub fn format_error_feedback(error: &str) -> String {
    format!(
        "<observation role=\"system\">FORMAT ERROR: {} Respond with exactly one <tool_call> element and no surrounding narration.</observation>",
        error
    )
}

//! Splits wiki markup into heading-addressed sections with structural flags.
//!
//! Generalizes block-collection from file-reader blocks to markdown-ish
//! wiki markup, and adds heading-level tracking so the semantic strategy
//! can address a chunk by its section path.

/// One paragraph-sized span of body text within a [`Section`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub text: String,
    pub has_code: bool,
    pub has_table: bool,
    pub has_list: bool,
}

/// A heading and the body blocks beneath it, up to the next heading of
/// equal or lower level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub level: u8,
    pub heading: String,
    pub anchor: String,
    /// Ancestor heading titles, root-first, not including this section.
    pub ancestors: Vec<String>,
    pub blocks: Vec<Block>,
}

impl Section {
    pub fn body_text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn has_code(&self) -> bool {
        self.blocks.iter().any(|b| b.has_code)
    }

    pub fn has_table(&self) -> bool {
        self.blocks.iter().any(|b| b.has_table)
    }

    pub fn has_list(&self) -> bool {
        self.blocks.iter().any(|b| b.has_list)
    }

    /// Section path for citations/metadata: "Parent > Child > Heading".
    pub fn path(&self) -> String {
        let mut parts = self.ancestors.clone();
        parts.push(self.heading.clone());
        parts.join(" > ")
    }
}

/// Lowercases the first 50 characters of `heading`, replaces non-alphanumeric
/// runs with `-`, trims leading and trailing `-`. Empty input slugs to
/// `"section"`.
pub fn slugify(heading: &str) -> String {
    let truncated: String = heading.chars().take(50).collect();
    let mut out = String::with_capacity(truncated.len());
    let mut last_was_dash = false;
    for ch in truncated.chars() {
        if ch.is_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            out.push('-');
            last_was_dash = true;
        }
    }
    let trimmed = out.trim_matches('-').to_string();
    if trimmed.is_empty() {
        "section".to_string()
    } else {
        trimmed
    }
}

fn heading_level(line: &str) -> Option<(u8, &str)> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|&c| c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    // require a space after the hashes, e.g. "## Title" not "##Title"
    if trimmed.as_bytes().get(hashes) != Some(&b' ') {
        return None;
    }
    let rest = trimmed[hashes..].trim();
    if rest.is_empty() {
        return None;
    }
    Some((hashes as u8, rest))
}

fn classify_block(text: &str) -> Block {
    let has_code = text.contains("```") || text.lines().any(|l| l.trim_start().starts_with("    ") && !l.trim().is_empty());
    let has_table = text.lines().any(|l| l.trim_start().starts_with('|'));
    let has_list = text.lines().any(|l| {
        let t = l.trim_start();
        t.starts_with("- ") || t.starts_with("* ") || t.starts_with("+ ") || starts_with_ordered(t)
    });
    Block {
        text: text.trim().to_string(),
        has_code,
        has_table,
        has_list,
    }
}

fn starts_with_ordered(line: &str) -> bool {
    let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
    !digits.is_empty() && line[digits.len()..].starts_with(". ")
}

/// Parses markup into a flat list of sections in document order. A page
/// with no headings produces a single level-0 section holding the whole
/// body.
pub fn parse_sections(markup: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut stack: Vec<(u8, String)> = Vec::new();
    let mut current_level = 0u8;
    let mut current_heading = String::new();
    let mut current_ancestors: Vec<String> = Vec::new();
    let mut paragraph_lines: Vec<&str> = Vec::new();
    let mut pending_blocks: Vec<Block> = Vec::new();
    let mut in_fence = false;

    let flush_paragraph = |paragraph_lines: &mut Vec<&str>, pending_blocks: &mut Vec<Block>| {
        if !paragraph_lines.is_empty() {
            let text = paragraph_lines.join("\n");
            if !text.trim().is_empty() {
                pending_blocks.push(classify_block(&text));
            }
            paragraph_lines.clear();
        }
    };

    let flush_section = |sections: &mut Vec<Section>,
                          level: u8,
                          heading: &str,
                          ancestors: &[String],
                          blocks: &mut Vec<Block>| {
        if !blocks.is_empty() || !heading.is_empty() {
            sections.push(Section {
                level,
                heading: heading.to_string(),
                anchor: slugify(heading),
                ancestors: ancestors.to_vec(),
                blocks: std::mem::take(blocks),
            });
        }
    };

    for line in markup.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            paragraph_lines.push(line);
            continue;
        }

        if !in_fence {
            if let Some((level, title)) = heading_level(line) {
                flush_paragraph(&mut paragraph_lines, &mut pending_blocks);
                flush_section(
                    &mut sections,
                    current_level,
                    &current_heading,
                    &current_ancestors,
                    &mut pending_blocks,
                );

                while stack.last().map(|(l, _)| *l >= level).unwrap_or(false) {
                    stack.pop();
                }
                current_ancestors = stack.iter().map(|(_, t)| t.clone()).collect();
                stack.push((level, title.to_string()));
                current_level = level;
                current_heading = title.to_string();
                continue;
            }

            if line.trim().is_empty() {
                flush_paragraph(&mut paragraph_lines, &mut pending_blocks);
                continue;
            }
        }

        paragraph_lines.push(line);
    }

    flush_paragraph(&mut paragraph_lines, &mut pending_blocks);
    flush_section(
        &mut sections,
        current_level,
        &current_heading,
        &current_ancestors,
        &mut pending_blocks,
    );

    if sections.is_empty() {
        sections.push(Section {
            level: 0,
            heading: String::new(),
            anchor: "section".to_string(),
            ancestors: Vec::new(),
            blocks: Vec::new(),
        });
    }

    sections
}

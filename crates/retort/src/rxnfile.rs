//! Reaction-file (CTFile-derived) import and export. The layout is a `$RXN`
//! header, a free-text name on the second line, a counts line, and one
//! `$MOL`-introduced V2000 molfile block per template.

use std::fmt::Write;

use molgraph::sdf;

use crate::errors::{Result, RetortError};
use crate::schema::ReactionSchema;

/// Line index (zero-based) where a reaction file keeps its name
const NAME_LINE: usize = 1;

impl ReactionSchema {
    /// Parse reaction-file text. A missing or blank name line is tolerated
    /// and yields the empty name.
    pub fn from_rxnfile(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text.lines().collect();
        if lines.first().map(|l| l.trim_end()) != Some("$RXN") {
            return Err(RetortError::reaction_file(1, "missing $RXN header"));
        }
        let name = reaction_file_name(text).unwrap_or_default();

        let counts_line = lines
            .get(4)
            .ok_or_else(|| RetortError::reaction_file(5, "missing counts line"))?;
        let counts: Vec<usize> = counts_line
            .split_whitespace()
            .map(str::parse)
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| RetortError::reaction_file(5, "unreadable counts line"))?;
        let (reactant_count, product_count, agent_count) = match counts.as_slice() {
            [r, p] => (*r, *p, 0),
            [r, p, a] => (*r, *p, *a),
            _ => return Err(RetortError::reaction_file(5, "expected 2 or 3 counts")),
        };

        let blocks = split_mol_blocks(&lines[5..]);
        let expected = reactant_count + product_count + agent_count;
        if blocks.len() != expected {
            return Err(RetortError::reaction_file(
                6,
                format!("expected {expected} $MOL blocks, found {}", blocks.len()),
            ));
        }

        let mut templates = blocks
            .iter()
            .map(|block| sdf::parse_pattern_molblock(block).map_err(Into::into))
            .collect::<Result<Vec<_>>>()?
            .into_iter();

        let reactants = templates.by_ref().take(reactant_count).collect();
        let products = templates.by_ref().take(product_count).collect();
        let agents = templates.collect();

        let mut schema = Self::from_templates(reactants, agents, products)?;
        schema.set_name(name);
        Ok(schema)
    }

    /// Export as reaction-file text. `wilds_to_r` rewrites wildcard
    /// attachment atoms to R-group notation so downstream CTFile consumers
    /// load them properly; import reverses the rewrite.
    #[must_use]
    pub fn to_rxnfile(&self, wilds_to_r: bool) -> String {
        let mut out = String::from("$RXN\n");
        out.push_str(self.name());
        out.push('\n');
        out.push_str("  retort\n\n");
        // SAFETY: writing into a String cannot fail
        if self.agents().is_empty() {
            writeln!(out, "{:>3}{:>3}", self.reactant_count(), self.product_count()).unwrap();
        } else {
            writeln!(
                out,
                "{:>3}{:>3}{:>3}",
                self.reactant_count(),
                self.product_count(),
                self.agents().len()
            )
            .unwrap();
        }

        for template in self
            .reactants()
            .iter()
            .chain(self.products())
            .chain(self.agents())
        {
            out.push_str("$MOL\n");
            out.push_str(&sdf::write_pattern_molblock(template, wilds_to_r));
        }
        out
    }
}

/// Extract the name from reaction-file text without parsing the rest
#[must_use]
pub fn reaction_file_name(text: &str) -> Option<String> {
    text.lines().nth(NAME_LINE).map(|line| line.trim().to_owned())
}

fn split_mol_blocks<'t>(lines: &[&'t str]) -> Vec<Vec<&'t str>> {
    let mut blocks = Vec::new();
    let mut current: Option<Vec<&str>> = None;
    for &line in lines {
        if line.trim_end() == "$MOL" {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            current = Some(Vec::new());
        } else if let Some(block) = current.as_mut() {
            block.push(line);
        }
    }
    if let Some(block) = current.take() {
        blocks.push(block);
    }
    blocks
}

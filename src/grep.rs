// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
use regex::Regex;

/// Mnemonics worth flagging for manual review by default: external
/// calls and storage writes, the two instruction classes most often
/// behind a reentrancy or storage-corruption bug.
pub const DEFAULT_INTERESTING: &[&str] = &["CALL", "SSTORE"];

/// One instruction line, from a single node's label, that matched an
/// interesting mnemonic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterestingLine {
    pub node_id: String,
    pub instruction: String,
}

/// Scans rendered DOT `content` (as produced by [`crate::render`]) for
/// nodes whose instruction listing contains any of `instructions`,
/// matched as whole words so e.g. `CALL` does not also match
/// `STATICCALL`. Nodes are found by the same label-splitting
/// convention the renderer uses: the label's instruction section is
/// everything after its last `---------` marker, one instruction per
/// `\n`-separated line.
pub fn find_interesting_nodes(content: &str, instructions: &[&str]) -> Vec<InterestingLine> {
    let node_pattern = Regex::new(r#""([A-Za-z0-9_]+)"\s*\[label="((?s).+?)"\]"#)
        .expect("static pattern is valid");
    let word_patterns: Vec<Regex> = instructions
        .iter()
        .map(|instr| Regex::new(&format!(r"\b{}\b", regex::escape(instr))).expect("escaped word pattern is valid"))
        .collect();

    let mut found = Vec::new();
    for caps in node_pattern.captures_iter(content) {
        let node_id = caps[1].to_string();
        let label = &caps[2];
        let Some(instr_section) = label.rsplit("---------").next() else {
            continue;
        };
        for line in instr_section.split("\\n") {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if word_patterns.iter().any(|p| p.is_match(line)) {
                found.push(InterestingLine { node_id: node_id.clone(), instruction: line.to_string() });
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dot() -> String {
        "digraph Contract_CFG {\n    \
        \"block_0\" [label=\"0x1234...\\nstart: 0x0 | end: 0x5\\nterminator: CALL\\n---------\\n0x0: PUSH1 0x0\\n0x5: CALL\", fillcolor=\"#e6f7ff\"];\n    \
        \"block_6\" [label=\"0x1234...\\nstart: 0x6 | end: 0x7\\nterminator: STOP\\n---------\\n0x6: SSTORE\\n0x7: STOP\", fillcolor=\"#e6f7ff\"];\n    \
        \"block_8\" [label=\"0x1234...\\nstart: 0x8 | end: 0x9\\nterminator: STOP\\n---------\\n0x8: STATICCALL\\n0x9: STOP\", fillcolor=\"#e6f7ff\"];\n\
        }\n".to_string()
    }

    #[test]
    fn finds_call_and_sstore_lines() {
        let dot = sample_dot();
        let hits = find_interesting_nodes(&dot, DEFAULT_INTERESTING);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].node_id, "block_0");
        assert!(hits[0].instruction.contains("CALL"));
        assert_eq!(hits[1].node_id, "block_6");
        assert!(hits[1].instruction.contains("SSTORE"));
    }

    #[test]
    fn staticcall_does_not_match_bare_call_word() {
        let dot = sample_dot();
        let hits = find_interesting_nodes(&dot, DEFAULT_INTERESTING);
        assert!(!hits.iter().any(|h| h.node_id == "block_8"));
    }

    #[test]
    fn empty_content_yields_no_hits() {
        assert!(find_interesting_nodes("", DEFAULT_INTERESTING).is_empty());
    }
}

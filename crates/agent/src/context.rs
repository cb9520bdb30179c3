//! Context assembly: retrieved passages into one numbered block.

use syllabot_core::retrieval::Passage;

/// Number passages `Source 1..N` in rank order, separated by a blank line.
///
/// Returns an empty string for an empty slice; callers treat that as
/// "nothing retrieved".
pub fn assemble_context(passages: &[Passage]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| format!("Source {}\n{}", i + 1, p.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_sources_in_order() {
        let passages = vec![Passage::new("first"), Passage::new("second")];
        assert_eq!(
            assemble_context(&passages),
            "Source 1\nfirst\n\nSource 2\nsecond"
        );
    }

    #[test]
    fn empty_input_gives_empty_context() {
        assert!(assemble_context(&[]).is_empty());
    }
}

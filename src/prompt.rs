use std::fmt::{Display, Write};

use crate::models::RankedCandidate;

/// Opening and closing text of a citation marker. The answer extractor builds
/// its patterns from these.
pub const CITATION_PREFIX: &str = "<ID:";
pub const CITATION_SUFFIX: &str = ">";

const INSTRUCTIONS: &str = "You are an AI Q&A bot. You will be given a question and a list of \
relevant text segments with their IDs. Please provide an accurate and concise answer based on \
the information provided, or indicate if you cannot answer the question with the given \
information. Answer on a single line. Also, please include the ID of the segment that helped \
you the most in your answer by appending";

/// The literal marker a completion must carry to cite segment `id`.
pub fn citation_marker(id: impl Display) -> String {
    format!("{CITATION_PREFIX} {id}{CITATION_SUFFIX}")
}

pub fn build_prompt(question: &str, candidates: &[RankedCandidate<'_>]) -> String {
    let mut prompt = format!(
        "{INSTRUCTIONS} {}, where n is that segment's ID number.\n\nQuestion: {question}\n\nRelevant Segments:",
        citation_marker("n")
    );
    for candidate in candidates {
        // Writing into a String cannot fail.
        let _ = write!(
            prompt,
            "\n{}. \"{}\"",
            candidate.segment.id, candidate.segment.text
        );
    }
    prompt
}

//! Instruction payloads for the structuring interface.
//!
//! Instructions are deterministic for a given `(text, posted_at)` pair so
//! that re-extraction of an unchanged record replays the same request.

use crate::error::SchemaViolation;
use crate::types::record::{Category, RawRecord};

/// Base instruction for structuring a raw record.
pub const STRUCTURE_PROMPT: &str = r#"You are a strict data normalizer for university course records.
Convert the raw record below into exactly one JSON object.

[OUTPUT SCHEMA]
{
    "category": "{categories}",
    "real_date": "the due or event date, YYYY-MM-DD, or null",
    "importance": "integer 1 (trivial) to 5 (critical exam or deadline)",
    "summary": "concise, action-oriented summary (Korean)",
    "past_due_correction": "boolean, true only when the date intentionally lies before the posting date"
}

[RULES]
1. The record was posted on {anchor}. Calculate every relative date
   expression ("다음 주 금요일", "until Friday") from that posting date,
   never from today's date.
2. If the text contains no interpretable date, set "real_date" to null.
   Do not guess a date.
3. OUTPUT ONLY VALID JSON. No conversational text.

Course: {course_id}
Posted: {anchor}
Record:
{text}"#;

/// Follow-up instruction naming the violated constraint.
pub const REPAIR_PROMPT: &str = r#"Your previous output violated the record schema:

    {violation}

Produce the JSON object again with that constraint satisfied. All other
rules still apply.

"#;

/// Build the deterministic structuring instruction for a raw record.
pub fn structure_instruction(raw: &RawRecord) -> String {
    STRUCTURE_PROMPT
        .replace("{categories}", &Category::NAMES.join("|"))
        .replace("{anchor}", &raw.posted_at.date_naive().to_string())
        .replace("{course_id}", &raw.course_id)
        .replace("{text}", &raw.text)
}

/// Build the repair instruction for a specific schema violation.
pub fn repair_instruction(raw: &RawRecord, violation: &SchemaViolation) -> String {
    let mut instruction = REPAIR_PROMPT.replace("{violation}", &violation.to_string());
    instruction.push_str(&structure_instruction(raw));
    instruction
}

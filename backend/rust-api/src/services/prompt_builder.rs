use crate::models::quiz::{QuizSettings, OPTIONS_PER_QUESTION};

/// Builds the generation instruction for a quiz. Pure and deterministic:
/// the same settings always yield the same prompt.
pub fn build_prompt(settings: &QuizSettings) -> String {
    let count = settings.question_count;

    let mut requirements = vec![
        format!("Generate exactly {} questions.", count),
        format!(
            "Each question must have exactly {} options.",
            OPTIONS_PER_QUESTION
        ),
        "Exactly one option per question is correct.".to_string(),
        "Vary the difficulty across easy, medium and hard questions.".to_string(),
        "Make the wrong options plausible but clearly incorrect.".to_string(),
        "Keep every question clear, concise and unambiguous, and cover different parts of the content."
            .to_string(),
        "Only ask about information contained in the content above; do not rely on outside knowledge."
            .to_string(),
    ];
    if settings.show_explanations {
        requirements.push(
            "For each question provide a short explanation of why the correct option is right."
                .to_string(),
        );
    }

    let numbered = requirements
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{}. {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n");

    let explanation_field = if settings.show_explanations {
        ",\n    \"explanation\": \"Why the correct option is right\""
    } else {
        ""
    };

    format!(
        r#"You are a quiz author. Write exactly {count} multiple-choice questions about the content below.

CONTENT:
"""
{content}
"""

REQUIREMENTS:
{numbered}

OUTPUT FORMAT:
Respond with a single JSON array and nothing else. Each element must look like:

[
  {{
    "question": "Question text?",
    "options": ["First option", "Second option", "Third option", "Fourth option"],
    "correctAnswer": 0{explanation_field}
  }}
]

RULES:
- "options" holds exactly {options} strings.
- "correctAnswer" is the integer index (0, 1, 2 or 3) of the correct option.
- No text before or after the JSON array.
- All JSON must be valid and properly escaped."#,
        count = count,
        content = settings.content,
        numbered = numbered,
        explanation_field = explanation_field,
        options = OPTIONS_PER_QUESTION,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::api_key::ApiKey;

    fn settings(count: u32, explanations: bool) -> QuizSettings {
        QuizSettings::new(
            "Photosynthesis converts light energy into chemical energy stored in glucose. ".repeat(3),
            ApiKey::new("test-key-0123456789"),
            count,
            30,
            explanations,
        )
        .unwrap()
    }

    #[test]
    fn prompt_states_count_and_option_rule() {
        for count in [1, 7, 60] {
            let prompt = build_prompt(&settings(count, false));
            assert!(prompt.contains(&format!("exactly {} questions", count)));
            assert!(prompt.contains("exactly 4 options"));
            assert!(prompt.contains("Exactly one option per question is correct"));
        }
    }

    #[test]
    fn explanation_field_only_when_requested() {
        let without = build_prompt(&settings(5, false));
        assert!(!without.contains("\"explanation\""));

        let with = build_prompt(&settings(5, true));
        assert!(with.contains("\"explanation\""));
        assert!(with.contains("8. For each question provide a short explanation"));
    }

    #[test]
    fn prompt_is_deterministic_and_embeds_content() {
        let s = settings(3, true);
        assert_eq!(build_prompt(&s), build_prompt(&s));
        assert!(build_prompt(&s).contains("Photosynthesis converts light energy"));
        assert!(build_prompt(&s).contains("\"correctAnswer\": 0"));
    }
}

//! Few-shot examples drawn from accepted historical substitutions.

use std::fmt::Write as _;

use pantry_core::types::SubstitutionLogEntry;

/// Default number of examples included in a generation prompt.
pub const DEFAULT_MAX_EXAMPLES: usize = 3;

/// Default recipe-context length kept per example, in characters.
pub const DEFAULT_CONTEXT_CHARS: usize = 400;

/// Format up to `max_examples` accepted substitutions from `logs` as prompt
/// blocks, in log order.
///
/// An entry contributes only if exactly one substitute was picked and that
/// pick has a non-empty English name and a non-empty ratio. Recipe context is
/// cut to `context_chars` characters. Returns an empty string when no entry
/// qualifies.
#[must_use]
pub fn build_few_shot_examples(logs: &[SubstitutionLogEntry], max_examples: usize, context_chars: usize) -> String {
    let mut out = String::new();
    let mut count = 0;

    for log in logs {
        if count >= max_examples {
            break;
        }
        let Some(pick) = log.accepted_pick() else {
            continue;
        };
        let Some(name) = pick.name.english().map(str::trim).filter(|n| !n.is_empty()) else {
            continue;
        };
        let Some(ratio) = pick.ratio.as_deref().map(str::trim).filter(|r| !r.is_empty()) else {
            continue;
        };

        count += 1;
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        let context: String = log.recipe_context.chars().take(context_chars).collect();
        let _ = write!(
            out,
            "Example {count}:\nIngredient: {}\nRecipe: {}\nSubstitute: {name}\nRatio: {ratio}",
            log.ingredient.trim(),
            context.trim(),
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pantry_core::types::{LocalizedText, LoggedSubstitute};

    fn sub(name: &str, ratio: Option<&str>, picked: u8) -> LoggedSubstitute {
        LoggedSubstitute {
            name: LocalizedText::en(name),
            ratio: ratio.map(String::from),
            picked,
        }
    }

    fn log(ingredient: &str, context: &str, subs: Vec<LoggedSubstitute>) -> SubstitutionLogEntry {
        SubstitutionLogEntry {
            ingredient: ingredient.into(),
            recipe_context: context.into(),
            generated_substitutes: subs,
            created_at: None,
        }
    }

    #[test]
    fn only_valid_single_picks_contribute() {
        let logs = vec![
            log("butter", "Cookies", vec![sub("ghee", Some("1 cup"), 1), sub("lard", Some("1"), 0)]),
            log("egg", "Cake", vec![sub("flax egg", Some("1"), 0)]),
            log("milk", "Pancakes", vec![sub("", Some("1"), 1)]),
            log("flour", "Bread", vec![sub("spelt", None, 1)]),
            log("sugar", "Tea cake", vec![sub("honey", Some("0.75 cup"), 1)]),
        ];

        let text = build_few_shot_examples(&logs, DEFAULT_MAX_EXAMPLES, DEFAULT_CONTEXT_CHARS);
        assert_eq!(text.matches("Example ").count(), 2);
        assert!(text.contains("Example 1:\nIngredient: butter\nRecipe: Cookies\nSubstitute: ghee\nRatio: 1 cup"));
        assert!(text.contains("Example 2:\nIngredient: sugar"));
        assert!(!text.contains("spelt"));
    }

    #[test]
    fn two_picks_in_one_entry_are_ambiguous() {
        let logs = vec![log("butter", "Cookies", vec![sub("ghee", Some("1"), 1), sub("lard", Some("1"), 1)])];
        assert!(build_few_shot_examples(&logs, 3, 400).is_empty());
    }

    #[test]
    fn stops_at_cap_in_log_order() {
        let logs: Vec<_> = (0..6)
            .map(|i| log(&format!("ing{i}"), "ctx", vec![sub("x", Some("1"), 1)]))
            .collect();
        let text = build_few_shot_examples(&logs, 3, 400);
        assert!(text.contains("ing0") && text.contains("ing2"));
        assert!(!text.contains("ing3"));
    }

    #[test]
    fn context_is_truncated_by_characters() {
        let context = "é".repeat(500);
        let logs = vec![log("butter", &context, vec![sub("ghee", Some("1"), 1)])];
        let text = build_few_shot_examples(&logs, 3, 400);
        assert_eq!(text.matches('é').count(), 400);
    }

    #[test]
    fn nothing_qualifies_yields_empty() {
        assert!(build_few_shot_examples(&[], 3, 400).is_empty());
        let logs = vec![log("butter", "Cookies", vec![sub("ghee", Some("1"), 1)])];
        assert!(build_few_shot_examples(&logs, 0, 400).is_empty());
    }
}

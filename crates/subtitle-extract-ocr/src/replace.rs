use regex::Regex;
use subtitle_extract_types::ReplaceRule;

use crate::error::OcrError;

enum Rule {
    Literal { from: String, to: String },
    Pattern { regex: Regex, to: String },
}

/// Ordered list of text substitutions, compiled once.
///
/// Pattern rules expand `$1`-style group references in their replacement.
#[derive(Default)]
pub struct Replacer {
    rules: Vec<Rule>,
}

impl Replacer {
    pub fn new(rules: &[ReplaceRule]) -> Result<Self, OcrError> {
        let rules = rules
            .iter()
            .map(|rule| {
                if rule.regexp {
                    let regex = Regex::new(&rule.from).map_err(|source| OcrError::Pattern {
                        pattern: rule.from.clone(),
                        source,
                    })?;
                    Ok(Rule::Pattern {
                        regex,
                        to: rule.to.clone(),
                    })
                } else {
                    Ok(Rule::Literal {
                        from: rule.from.clone(),
                        to: rule.to.clone(),
                    })
                }
            })
            .collect::<Result<Vec<_>, OcrError>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn apply(&self, text: &str) -> String {
        let mut current = text.to_string();
        for rule in &self.rules {
            current = match rule {
                // an empty literal would match between every character
                Rule::Literal { from, .. } if from.is_empty() => current,
                Rule::Literal { from, to } => current.replace(from.as_str(), to),
                Rule::Pattern { regex, to } => regex.replace_all(&current, to.as_str()).into_owned(),
            };
        }
        current
    }
}

impl std::fmt::Debug for Replacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replacer")
            .field("rules", &self.rules.len())
            .finish()
    }
}

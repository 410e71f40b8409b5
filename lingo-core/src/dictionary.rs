//! Dictionary lookup results and their overlay rendering
//!
//! The lookup endpoint answers with one of two shapes: a structured entry from
//! the dictionary service (phonetics + meanings, optionally enriched with an
//! explanation and examples) or a generated fallback (definition,
//! pronunciation, examples). The `generated_fallback` flag decides which one
//! applies; field presence alone is ambiguous since both carry `examples`.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

/// Result of a word lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryResult {
    pub word: String,
    #[serde(default)]
    pub phonetics: Vec<Phonetic>,
    #[serde(default)]
    pub meanings: Vec<Meaning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<String>>,
    #[serde(
        default,
        rename = "openaiGenerated",
        alias = "generatedFallback",
        skip_serializing_if = "Option::is_none"
    )]
    pub generated_fallback: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronunciation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phonetic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

impl Phonetic {
    /// Entries without audio get no playback affordance
    pub fn is_playable(&self) -> bool {
        self.audio.as_deref().is_some_and(|a| !a.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meaning {
    pub part_of_speech: String,
    #[serde(default)]
    pub definitions: Vec<Definition>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub definition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synonyms: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub antonyms: Option<Vec<String>>,
}

/// Borrowed view over whichever shape a [`DictionaryResult`] carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictionaryView<'a> {
    Generated {
        word: &'a str,
        definition: &'a str,
        pronunciation: Option<&'a str>,
        part_of_speech: Option<&'a str>,
        examples: &'a [String],
    },
    Structured {
        word: &'a str,
        phonetics: &'a [Phonetic],
        explanation: Option<&'a str>,
        examples: &'a [String],
        meanings: &'a [Meaning],
    },
}

impl DictionaryResult {
    pub fn is_generated_fallback(&self) -> bool {
        self.generated_fallback.unwrap_or(false)
    }

    pub fn examples(&self) -> &[String] {
        self.examples.as_deref().unwrap_or(&[])
    }

    /// Pick the rendering path, branching on the fallback flag only
    pub fn view(&self) -> DictionaryView<'_> {
        if self.is_generated_fallback() {
            DictionaryView::Generated {
                word: &self.word,
                definition: self.definition.as_deref().unwrap_or_default(),
                pronunciation: non_empty(self.pronunciation.as_deref()),
                part_of_speech: non_empty(self.part_of_speech.as_deref()),
                examples: self.examples(),
            }
        } else {
            DictionaryView::Structured {
                word: &self.word,
                phonetics: &self.phonetics,
                explanation: non_empty(self.explanation.as_deref()),
                examples: self.examples(),
                meanings: &self.meanings,
            }
        }
    }

    /// Plain-text rendering of the dictionary overlay
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = self.write_overlay(&mut out);
        out
    }

    fn write_overlay(&self, out: &mut String) -> std::fmt::Result {
        match self.view() {
            DictionaryView::Generated {
                word,
                definition,
                pronunciation,
                part_of_speech,
                examples,
            } => {
                writeln!(out, "{word}")?;
                if let Some(pronunciation) = pronunciation {
                    writeln!(out, "{pronunciation}")?;
                }
                writeln!(out)?;
                match part_of_speech {
                    Some(pos) => writeln!(out, "Definition ({pos})")?,
                    None => writeln!(out, "Definition")?,
                }
                writeln!(out, "{definition}")?;
                write_examples(out, examples)?;
            }
            DictionaryView::Structured {
                word,
                phonetics,
                explanation,
                examples,
                meanings,
            } => {
                writeln!(out, "{word}")?;
                for phonetic in phonetics {
                    let text = phonetic.text.as_deref().unwrap_or_default();
                    if phonetic.is_playable() {
                        writeln!(out, "{text} [play]")?;
                    } else if !text.is_empty() {
                        writeln!(out, "{text}")?;
                    }
                }
                if let Some(explanation) = explanation {
                    writeln!(out)?;
                    writeln!(out, "Explanation")?;
                    writeln!(out, "{explanation}")?;
                }
                write_examples(out, examples)?;
                if !meanings.is_empty() {
                    writeln!(out)?;
                    writeln!(out, "Meanings")?;
                }
                for meaning in meanings {
                    writeln!(out, "{}", meaning.part_of_speech)?;
                    for (i, def) in meaning.definitions.iter().enumerate() {
                        writeln!(out, "  {}. {}", i + 1, def.definition)?;
                        if let Some(example) = &def.example {
                            writeln!(out, "     \"{example}\"")?;
                        }
                        if let Some(synonyms) = def.synonyms.as_ref().filter(|s| !s.is_empty()) {
                            writeln!(out, "     Synonyms: {}", synonyms.join(", "))?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn write_examples(out: &mut String, examples: &[String]) -> std::fmt::Result {
    if examples.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    writeln!(out, "Examples")?;
    for example in examples {
        writeln!(out, "- {example}")?;
    }
    Ok(())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

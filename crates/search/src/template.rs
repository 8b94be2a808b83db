//! Prompt templates with `{{TAG}}` placeholders.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PromptTag {
    Context,
    Previous,
    Error,
    Count,
    Destination,
    Project,
}

impl PromptTag {
    pub const ALL: [PromptTag; 6] = [
        PromptTag::Context,
        PromptTag::Previous,
        PromptTag::Error,
        PromptTag::Count,
        PromptTag::Destination,
        PromptTag::Project,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptTag::Context => "CONTEXT",
            PromptTag::Previous => "PREVIOUS",
            PromptTag::Error => "ERROR",
            PromptTag::Count => "COUNT",
            PromptTag::Destination => "DESTINATION",
            PromptTag::Project => "PROJECT",
        }
    }

    pub fn token(&self) -> String {
        format!("{{{{{}}}}}", self.as_str())
    }
}

pub type TagMap = BTreeMap<PromptTag, String>;

const REGULAR: &str = "\
You are helping to make {{PROJECT}} faster without changing its behaviour.
{{CONTEXT}}
Give {{COUNT}} different Java implementations of the following statement that \
could be used in its place and would run faster:

```java
{{DESTINATION}}
```

Each implementation must be a drop-in replacement for the statement above. \
Put each implementation in its own fenced ```java block and write nothing \
else inside the blocks.
";

const ERROR: &str = "\
You are helping to make {{PROJECT}} faster without changing its behaviour.
{{CONTEXT}}
Your previous suggestion produced this program:

```java
{{PREVIOUS}}
```

which failed with:

{{ERROR}}

Avoid that mistake. Give {{COUNT}} different Java implementations of the \
following statement that could be used in its place and would run faster:

```java
{{DESTINATION}}
```

Put each implementation in its own fenced ```java block and write nothing \
else inside the blocks.
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read prompt template {}", path.display()))?;
        Ok(Self::new(text))
    }

    /// Used when the previous step succeeded or was never run.
    pub fn default_regular() -> Self {
        Self::new(REGULAR)
    }

    /// Used after a compile error or test failure.
    pub fn default_error() -> Self {
        Self::new(ERROR)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Tags that occur in this template.
    pub fn tags(&self) -> Vec<PromptTag> {
        PromptTag::ALL
            .into_iter()
            .filter(|tag| self.text.contains(&tag.token()))
            .collect()
    }

    /// Substitute recognised tags. A tag without a value renders as the
    /// empty string; anything else in braces is left alone.
    pub fn render(&self, tags: &TagMap) -> String {
        let mut text = self.text.clone();
        for tag in self.tags() {
            let value = tags.get(&tag).map(String::as_str).unwrap_or("");
            text = text.replace(&tag.token(), value);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_and_blanks() {
        let template = PromptTemplate::new("ctx={{CONTEXT}} err={{ERROR}} keep={{OTHER}}");
        let mut tags = TagMap::new();
        tags.insert(PromptTag::Context, "history".into());
        tags.insert(PromptTag::Destination, "unused".into());

        assert_eq!(template.render(&tags), "ctx=history err= keep={{OTHER}}");
    }

    #[test]
    fn test_defaults_carry_their_tags() {
        let regular = PromptTemplate::default_regular().tags();
        assert!(regular.contains(&PromptTag::Context));
        assert!(regular.contains(&PromptTag::Destination));
        assert!(!regular.contains(&PromptTag::Error));

        let error = PromptTemplate::default_error().tags();
        assert!(error.contains(&PromptTag::Previous));
        assert!(error.contains(&PromptTag::Error));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.txt");
        std::fs::write(&path, "improve {{DESTINATION}}").unwrap();
        let template = PromptTemplate::from_file(&path).unwrap();
        assert_eq!(template.tags(), vec![PromptTag::Destination]);

        assert!(PromptTemplate::from_file(dir.path().join("missing.txt")).is_err());
    }
}

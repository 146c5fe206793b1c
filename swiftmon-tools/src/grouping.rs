//! `grppha` scripts for setting auxiliary-file keys and grouping channels.

use crate::runner::{Stage, ToolCommand};

/// Commands fed to `grppha` through its `comm` parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrpphaScript {
    commands: Vec<String>,
}

impl GrpphaScript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header keyword such as `backfile` or `respfile`.
    #[must_use]
    pub fn chkey(mut self, keyword: &str, value: impl AsRef<str>) -> Self {
        self.commands.push(format!("chkey {keyword} {}", value.as_ref()));
        self
    }

    /// Groups channels to at least `min_counts` counts, if set.
    #[must_use]
    pub fn group_min(mut self, min_counts: Option<u32>) -> Self {
        if let Some(min) = min_counts {
            self.commands.push(format!("group min {min}"));
        }
        self
    }

    /// Script text, terminated by `exit`.
    #[must_use]
    pub fn script(&self) -> String {
        self.commands
            .iter()
            .map(String::as_str)
            .chain(std::iter::once("exit"))
            .collect::<Vec<_>>()
            .join(" & ")
    }

    /// `grppha` call applying this script to `infile`, writing `outfile`.
    #[must_use]
    pub fn command(&self, infile: &str, outfile: &str) -> ToolCommand {
        ToolCommand::new(Stage::Grouping, "grppha")
            .kv("infile", infile)
            .kv("outfile", outfile)
            .kv("clobber", "yes")
            .kv("comm", self.script())
    }
}

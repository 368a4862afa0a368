use std::{collections::BTreeSet, fmt, str::FromStr};

/// How a script line should be displayed. Purely cosmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    Header,
    Body,
}

const SHORT_HEADER_LEN: usize = 60;

pub fn classify_line(line: &str) -> LineKind {
    let line = line.trim();
    if line.is_empty() {
        return LineKind::Blank;
    }
    if line.starts_with('#') || line.starts_with('[') {
        return LineKind::Header;
    }
    if line.chars().count() <= SHORT_HEADER_LEN && line.contains(':') {
        return LineKind::Header;
    }
    if is_shouting(line) {
        return LineKind::Header;
    }
    LineKind::Body
}

fn is_shouting(line: &str) -> bool {
    let mut cased = false;
    for c in line.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            cased = true;
        }
    }
    cased
}

pub fn classify_script(script: &str) -> Vec<(LineKind, &str)> {
    script
        .lines()
        .map(|line| (classify_line(line), line.trim()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Section {
    Research,
    Script,
    Shots,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Research, Section::Script, Section::Shots];

    pub fn title(&self) -> &'static str {
        match self {
            Section::Research => "Research",
            Section::Script => "Script",
            Section::Shots => "Storyboard",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "research" => Ok(Section::Research),
            "script" => Ok(Section::Script),
            "shots" | "storyboard" => Ok(Section::Shots),
            other => Err(format!(
                "unknown section '{}', expected research, script or shots",
                other
            )),
        }
    }
}

/// Which result sections are expanded. Everything starts open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionToggles {
    collapsed: BTreeSet<Section>,
}

impl SectionToggles {
    pub fn collapsed(sections: &[Section]) -> Self {
        Self {
            collapsed: sections.iter().copied().collect(),
        }
    }

    pub fn is_open(&self, section: Section) -> bool {
        !self.collapsed.contains(&section)
    }

    pub fn toggle(&mut self, section: Section) {
        if !self.collapsed.remove(&section) {
            self.collapsed.insert(section);
        }
    }
}

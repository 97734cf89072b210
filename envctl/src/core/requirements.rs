//! Declaration file model: parsing, name normalization, and snapshot rendering.
//!
//! The format is the installer's own (`pip` requirements files). Only the parts
//! envctl needs to reason about are modelled; everything else is either carried
//! through verbatim (option lines) or left to the installer.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

static REQUIREMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(\[[^\]]*\])?\s*(.*)$")
        .expect("valid requirement regex")
});

static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_.]+").expect("valid separator regex"));

/// A single dependency entry (`name[extras] spec ; marker`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    /// Distribution name as written, without extras.
    pub name: String,
    /// Extras including brackets, e.g. `[socks]`.
    pub extras: Option<String>,
    /// Version constraint text, e.g. `==2.31.0` or `>=1,<2`. Empty when unconstrained.
    pub spec: String,
    /// Environment marker after `;`, without the separator.
    pub marker: Option<String>,
}

impl Requirement {
    /// Parse a single requirement line. Returns `None` for lines that do not
    /// start with a distribution name (paths, URLs, options).
    pub fn parse(line: &str) -> Option<Self> {
        let caps = REQUIREMENT_RE.captures(line.trim())?;
        let name = caps.get(1)?.as_str().to_string();
        let extras = caps.get(2).map(|m| m.as_str().replace(' ', ""));
        let rest = caps.get(3).map_or("", |m| m.as_str());
        // `https://...` would otherwise parse as a distribution named `https`.
        if rest.starts_with([':', '/']) {
            return None;
        }
        let (spec, marker) = match rest.split_once(';') {
            Some((spec, marker)) => (spec, Some(marker.trim().to_string())),
            None => (rest, None),
        };
        Some(Self {
            name,
            extras,
            spec: spec.split_whitespace().collect::<String>(),
            marker: marker.filter(|m| !m.is_empty()),
        })
    }

    /// Exact pin: `name==1.2.3`.
    pub fn pinned(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            extras: None,
            spec: format!("=={version}"),
            marker: None,
        }
    }

    /// Normalized distribution name (PEP 503), used for identity comparisons.
    pub fn key(&self) -> String {
        normalize_name(&self.name)
    }

    /// URL of a direct reference (`name @ url`).
    pub fn direct_url(&self) -> Option<&str> {
        self.spec.strip_prefix('@')
    }

    /// Version when the constraint is a single exact `==` pin without wildcards.
    pub fn pinned_version(&self) -> Option<&str> {
        let version = self.spec.strip_prefix("==")?;
        if version.is_empty() || version.starts_with('=') || version.contains([',', '*']) {
            return None;
        }
        Some(version)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(extras) = &self.extras {
            write!(f, "{extras}")?;
        }
        if self.spec.starts_with('@') {
            write!(f, " {}", self.spec.replacen('@', "@ ", 1))?;
        } else {
            write!(f, "{}", self.spec)?;
        }
        if let Some(marker) = &self.marker {
            write!(f, "; {marker}")?;
        }
        Ok(())
    }
}

/// Lowercase and collapse runs of `-`, `_`, `.` into a single `-`.
pub fn normalize_name(name: &str) -> String {
    SEPARATOR_RE.replace_all(name, "-").to_lowercase()
}

/// Parsed contents of a declaration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declaration {
    /// Requirement entries in file order.
    pub entries: Vec<Requirement>,
    /// Option lines (`-r other.txt`, `--index-url ...`, `-e ...`) kept verbatim.
    pub directives: Vec<String>,
    /// Lines that are neither options nor named requirements (paths, bare URLs).
    pub unparsed: Vec<String>,
}

impl Declaration {
    /// Parse declaration text. Blank lines and comments are dropped; trailing `\`
    /// joins a line with the next one.
    pub fn parse(text: &str) -> Self {
        let mut decl = Declaration::default();
        for line in logical_lines(text) {
            let line = strip_comment(&line);
            if line.is_empty() {
                continue;
            }
            if line.starts_with('-') {
                decl.directives.push(line.to_string());
            } else if let Some(req) = Requirement::parse(line) {
                decl.entries.push(req);
            } else {
                decl.unparsed.push(line.to_string());
            }
        }
        decl
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|entry| entry.key() == key)
    }

    /// Whether an installed direct reference (`name @ url`) came from one of the
    /// path or URL lines of this declaration.
    ///
    /// The installer reports local paths as absolute `file://` URLs, so a line
    /// like `./vendor/pkg` matches any URL ending in `/vendor/pkg`.
    pub fn declares_location(&self, url: &str) -> bool {
        let url = url.trim_end_matches('/');
        self.unparsed.iter().any(|line| {
            let location = line
                .trim_start_matches("file:")
                .trim_start_matches("./")
                .trim_end_matches('/');
            if location.is_empty() || location == "." {
                return false;
            }
            url == location || url.ends_with(&format!("/{}", location.trim_start_matches('/')))
        })
    }
}

fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending = String::new();
    for raw in text.lines() {
        if let Some(head) = raw.strip_suffix('\\') {
            pending.push_str(head);
            pending.push(' ');
            continue;
        }
        pending.push_str(raw);
        lines.push(std::mem::take(&mut pending));
    }
    if !pending.is_empty() {
        lines.push(pending);
    }
    lines
}

/// A comment starts at `#` at line start or after whitespace (so URL fragments survive).
fn strip_comment(line: &str) -> &str {
    let trimmed = line.trim();
    if trimmed.starts_with('#') {
        return "";
    }
    let bytes = trimmed.as_bytes();
    for (idx, byte) in bytes.iter().enumerate() {
        if *byte == b'#' && idx > 0 && bytes[idx - 1].is_ascii_whitespace() {
            return trimmed[..idx].trim_end();
        }
    }
    trimmed
}

/// Editable installs are the same directive when they name the same project.
fn same_directive(a: &str, b: &str) -> bool {
    match (editable_project(a), editable_project(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

/// Normalized `#egg=` project of an `-e`/`--editable` line.
fn editable_project(directive: &str) -> Option<String> {
    let target = directive
        .strip_prefix("--editable")
        .or_else(|| directive.strip_prefix("-e"))?;
    if !target.starts_with([' ', '\t', '=']) {
        return None;
    }
    let (_, fragment) = target.split_once('#')?;
    let egg = fragment
        .split('&')
        .find_map(|part| part.strip_prefix("egg="))?;
    let project = egg.split('[').next().unwrap_or(egg).trim();
    (!project.is_empty()).then(|| normalize_name(project))
}

/// Which installed packages `freeze` records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FreezeScope {
    /// Every installed distribution, including transitive dependencies.
    #[default]
    All,
    /// Only distributions named in the current declaration file.
    Declared,
}

/// Deterministic list of installed pins ready to be written as a declaration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub directives: Vec<String>,
    pub pins: Vec<Requirement>,
}

impl Snapshot {
    /// Build a snapshot from installer listing output (`pip freeze` format).
    ///
    /// `carried` directives come first, followed by directives reported by the
    /// listing itself (editable installs), which replace a carried line for the
    /// same `#egg=` project. Pins are deduplicated by normalized name and sorted
    /// by it.
    pub fn from_listing(listing: &str, carried: &[String]) -> Self {
        let installed = Declaration::parse(listing);

        let mut directives: Vec<String> = Vec::new();
        for directive in carried {
            if !directives.contains(directive) {
                directives.push(directive.clone());
            }
        }
        // The installer's editable line names the installed revision; it wins.
        for directive in installed.directives {
            match directives
                .iter()
                .position(|have| same_directive(have, &directive))
            {
                Some(idx) => directives[idx] = directive,
                None => directives.push(directive),
            }
        }

        let mut by_key: BTreeMap<String, Requirement> = BTreeMap::new();
        for pin in installed.entries {
            by_key.entry(pin.key()).or_insert(pin);
        }

        Self {
            directives,
            pins: by_key.into_values().collect(),
        }
    }

    /// Apply the freeze scope against the current declaration.
    pub fn scoped(mut self, scope: FreezeScope, declared: &Declaration) -> Self {
        if scope == FreezeScope::Declared {
            self.pins.retain(|pin| {
                declared.contains_key(&pin.key())
                    || pin.direct_url().is_some_and(|url| declared.declares_location(url))
            });
        }
        self
    }

    /// Render as declaration text: one entry per line, `\n` endings, trailing newline.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for directive in &self.directives {
            out.push_str(directive);
            out.push('\n');
        }
        for pin in &self.pins {
            out.push_str(&pin.to_string());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_name_spec_and_marker() {
        let req = Requirement::parse("Requests[socks] >= 2.0, <3 ; python_version >= '3.8'")
            .expect("parse");
        assert_eq!(req.name, "Requests");
        assert_eq!(req.extras.as_deref(), Some("[socks]"));
        assert_eq!(req.spec, ">=2.0,<3");
        assert_eq!(req.marker.as_deref(), Some("python_version >= '3.8'"));
        assert_eq!(req.key(), "requests");
    }

    #[test]
    fn key_collapses_separators() {
        assert_eq!(normalize_name("Zope.Interface"), "zope-interface");
        assert_eq!(normalize_name("typing__extensions"), "typing-extensions");
        assert_eq!(normalize_name("ruamel.yaml.clib"), "ruamel-yaml-clib");
    }

    #[test]
    fn pinned_version_only_for_exact_pins() {
        let exact = Requirement::parse("requests==2.31.0").expect("parse");
        assert_eq!(exact.pinned_version(), Some("2.31.0"));

        for line in ["requests>=2", "requests==2.*", "requests===2.31.0", "requests"] {
            let req = Requirement::parse(line).expect("parse");
            assert_eq!(req.pinned_version(), None, "{line}");
        }
    }

    #[test]
    fn declaration_sorts_lines_into_buckets() {
        let text = "\
# pinned deps
--index-url https://pypi.org/simple
requests==2.31.0  # http
numpy>=1.26 \\
    ; python_version >= '3.9'

./local/pkg
https://example.com/pkg-1.0.tar.gz
-e git+https://example.com/repo.git#egg=tool
";
        let decl = Declaration::parse(text);
        assert_eq!(
            decl.directives,
            vec![
                "--index-url https://pypi.org/simple".to_string(),
                "-e git+https://example.com/repo.git#egg=tool".to_string(),
            ]
        );
        let names: Vec<&str> = decl.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["requests", "numpy"]);
        assert_eq!(decl.entries[1].marker.as_deref(), Some("python_version >= '3.9'"));
        assert_eq!(
            decl.unparsed,
            vec![
                "./local/pkg".to_string(),
                "https://example.com/pkg-1.0.tar.gz".to_string(),
            ]
        );
    }

    #[test]
    fn snapshot_sorts_and_dedupes_by_key() {
        let listing = "urllib3==2.0.7\nRequests==2.31.0\ncertifi==2023.7.22\nrequests==2.31.0\n";
        let snapshot = Snapshot::from_listing(listing, &[]);
        assert_eq!(
            snapshot.render(),
            "certifi==2023.7.22\nRequests==2.31.0\nurllib3==2.0.7\n"
        );
    }

    #[test]
    fn snapshot_carries_directives_before_pins() {
        let carried = vec!["--index-url https://mirror.local/simple".to_string()];
        let snapshot = Snapshot::from_listing("six==1.16.0\n", &carried);
        assert_eq!(
            snapshot.render(),
            "--index-url https://mirror.local/simple\nsix==1.16.0\n"
        );
    }

    #[test]
    fn installed_editable_revision_replaces_carried_line() {
        let carried = vec![
            "--index-url https://mirror.local/simple".to_string(),
            "-e git+https://example.com/repo.git#egg=Tool".to_string(),
        ];
        let listing = "-e git+https://example.com/repo.git@0a1b2c3#egg=tool\nsix==1.16.0\n";
        let snapshot = Snapshot::from_listing(listing, &carried);
        assert_eq!(
            snapshot.render(),
            "--index-url https://mirror.local/simple\n-e git+https://example.com/repo.git@0a1b2c3#egg=tool\nsix==1.16.0\n"
        );
    }

    #[test]
    fn declared_scope_drops_transitive_pins() {
        let declared = Declaration::parse("requests==2.31.0\n");
        let snapshot = Snapshot::from_listing(
            "certifi==2023.7.22\nrequests==2.31.0\nidna==3.4\n",
            &[],
        )
        .scoped(FreezeScope::Declared, &declared);
        assert_eq!(snapshot.render(), "requests==2.31.0\n");
    }

    #[test]
    fn declared_scope_keeps_path_and_url_requirements() {
        let declared = Declaration::parse(
            "requests==2.31.0\n./vendor/localpkg\nhttps://example.com/dist/tool-1.0.tar.gz\n",
        );
        let listing = "\
localpkg @ file:///proj/vendor/localpkg
requests==2.31.0
tool @ https://example.com/dist/tool-1.0.tar.gz
other @ file:///proj/elsewhere/other
idna==3.4
";
        let snapshot = Snapshot::from_listing(listing, &[]).scoped(FreezeScope::Declared, &declared);
        assert_eq!(
            snapshot.render(),
            "localpkg @ file:///proj/vendor/localpkg\nrequests==2.31.0\ntool @ https://example.com/dist/tool-1.0.tar.gz\n"
        );
    }

    #[test]
    fn empty_snapshot_renders_empty_text() {
        assert_eq!(Snapshot::from_listing("", &[]).render(), "");
    }

    #[test]
    fn direct_reference_round_trips_through_display() {
        let req = Requirement::parse("tool @ https://example.com/tool-1.0.tar.gz").expect("parse");
        assert_eq!(req.spec, "@https://example.com/tool-1.0.tar.gz");
        assert_eq!(req.to_string(), "tool @ https://example.com/tool-1.0.tar.gz");
    }
}

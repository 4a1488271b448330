pub mod cobertura;
pub mod jacoco;

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use quick_xml::events::BytesStart;
use quick_xml::reader::Reader;
use tracing::debug;

use crate::detect::{sniff_root, Dialect, RootElement};
use crate::error::{CovgateError, Result};
use crate::model::{Counter, Counters};
use crate::resolve::PathResolver;

pub use cobertura::CoberturaHandler;
pub use jacoco::JacocoHandler;

/// Sparse hit data for one file: line number → hit count.
pub type FileHits = BTreeMap<u32, u64>;

/// Coverage extracted from a single report, before it is merged with any
/// other report.
#[derive(Debug, Clone)]
pub struct ReportCoverage {
    pub dialect: Dialect,
    /// Resolved file key → hit counts.
    pub files: BTreeMap<String, FileHits>,
    pub counters: Counters,
}

impl ReportCoverage {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            files: BTreeMap::new(),
            counters: Counters::default(),
        }
    }

    /// Make sure `key` exists even if no line is ever recorded for it.
    pub fn touch_file(&mut self, key: &str) {
        self.files.entry(key.to_string()).or_default();
    }

    /// Record a hit count, keeping the larger value when the line is
    /// already known. Line numbers outside `1..=MAX_LINE_NUMBER` are
    /// dropped.
    pub fn record_line(&mut self, key: &str, line: u32, hits: u64) {
        if !is_valid_line(line) {
            debug!(file = key, line, "dropping out-of-range line number");
            return;
        }
        let entry = self
            .files
            .entry(key.to_string())
            .or_default()
            .entry(line)
            .or_insert(hits);
        if hits > *entry {
            *entry = hits;
        }
    }

    /// Fold another result for the same document into this one.
    pub fn absorb(&mut self, other: ReportCoverage) {
        for (key, lines) in other.files {
            for (line, hits) in lines {
                self.record_line(&key, line, hits);
            }
        }
        self.counters.add(&other.counters);
    }

    /// Digest of the extracted coverage. Two reports with the same digest
    /// describe the same data, whatever their bytes looked like.
    pub fn digest(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.dialect.as_str().as_bytes());
        for (key, lines) in &self.files {
            hasher.update(&(key.len() as u64).to_le_bytes());
            hasher.update(key.as_bytes());
            hasher.update(&(lines.len() as u64).to_le_bytes());
            for (line, hits) in lines {
                hasher.update(&line.to_le_bytes());
                hasher.update(&hits.to_le_bytes());
            }
        }
        let c = &self.counters;
        for counter in [c.package, c.file, c.class, c.method, c.line, c.conditional] {
            hasher.update(&counter.covered.to_le_bytes());
            hasher.update(&counter.missed.to_le_bytes());
        }
        hasher.finalize()
    }

    /// File and line tallies derived from the collected hit data.
    pub fn derived_file_and_line_counters(&self) -> (Counter, Counter) {
        let mut files = Counter::default();
        let mut lines = Counter::default();
        for hits in self.files.values() {
            files.record(hits.values().any(|&h| h > 0));
            for &h in hits.values() {
                lines.record(h > 0);
            }
        }
        (files, lines)
    }
}

/// Highest line number accepted from a report. Coverage is expanded to one
/// slot per line, so larger numbers are treated as corrupt input.
pub const MAX_LINE_NUMBER: u32 = 10_000_000;

/// Whether `line` can be recorded: numbering starts at 1.
pub fn is_valid_line(line: u32) -> bool {
    (1..=MAX_LINE_NUMBER).contains(&line)
}

/// Every dialect parser implements this trait.
pub trait DialectHandler: Sync {
    fn dialect(&self) -> Dialect;

    /// Whether this handler understands a document with the given root.
    fn applicable(&self, root: &RootElement) -> bool;

    /// Parse the whole document. Paths are mapped through `resolver`.
    fn parse(&self, input: &[u8], resolver: &PathResolver) -> Result<ReportCoverage>;
}

/// The closed set of supported dialects.
pub static HANDLERS: &[&dyn DialectHandler] = &[&CoberturaHandler, &JacocoHandler];

/// Parse a report with every applicable handler.
///
/// Returns `Ok(None)` when no handler understands the document. This
/// touches no shared state, so reports may be parsed in parallel and merged
/// afterwards.
pub fn parse_report(input: &[u8], resolver: &PathResolver) -> Result<Option<ReportCoverage>> {
    let Some(root) = sniff_root(input)? else {
        return Ok(None);
    };

    let mut result: Option<ReportCoverage> = None;
    for handler in HANDLERS.iter().filter(|h| h.applicable(&root)) {
        debug!(dialect = %handler.dialect(), root = %root.name, "parsing report");
        let parsed = handler.parse(input, resolver)?;
        match result.as_mut() {
            Some(existing) => existing.absorb(parsed),
            None => result = Some(parsed),
        }
    }
    Ok(result)
}

pub(crate) fn xml_reader(input: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);
    reader
}

pub(crate) fn xml_err(e: quick_xml::Error, reader: &Reader<&[u8]>) -> CovgateError {
    CovgateError::Xml {
        source: e,
        position: reader.buffer_position(),
    }
}

/// The attributes of one element, with typed accessors that report
/// missing or malformed values against the element.
pub(crate) struct Attributes {
    element: &'static str,
    position: usize,
    values: HashMap<String, String>,
}

impl Attributes {
    pub(crate) fn read(
        e: &BytesStart,
        element: &'static str,
        reader: &Reader<&[u8]>,
    ) -> Result<Self> {
        let mut values = HashMap::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| xml_err(err.into(), reader))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| xml_err(err, reader))?
                .into_owned();
            values.insert(key, value);
        }
        Ok(Self {
            element,
            position: reader.buffer_position(),
            values,
        })
    }

    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub(crate) fn required(&self, name: &'static str) -> Result<&str> {
        self.get(name).ok_or(CovgateError::MissingAttribute {
            element: self.element,
            attribute: name,
            position: self.position,
        })
    }

    pub(crate) fn required_num<T: FromStr>(&self, name: &'static str) -> Result<T> {
        let value = self.required(name)?;
        self.number(name, value)
    }

    pub(crate) fn optional_num<T: FromStr>(&self, name: &'static str) -> Result<Option<T>> {
        match self.get(name) {
            Some(value) => self.number(name, value).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) fn invalid(&self, name: &'static str, value: &str) -> CovgateError {
        CovgateError::InvalidAttribute {
            element: self.element,
            attribute: name,
            value: value.to_string(),
            position: self.position,
        }
    }

    fn number<T: FromStr>(&self, name: &'static str, value: &str) -> Result<T> {
        value.trim().parse().map_err(|_| self.invalid(name, value))
    }
}

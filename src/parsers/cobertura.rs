/// Parser for Cobertura XML coverage reports.
///
/// Cobertura XML structure:
///   <coverage branches-covered="..." branches-valid="..." ...>
///     <sources><source>...</source></sources>
///     <packages>
///       <package name="...">
///         <classes>
///           <class name="..." filename="...">
///             <methods>
///               <method name="..." signature="...">
///                 <lines><line number="..." hits="..."/></lines>
///               </method>
///             </methods>
///             <lines>
///               <line number="..." hits="..." branch="true|false"
///                     condition-coverage="50% (1/2)" />
///             </lines>
///           </class>
///         </classes>
///       </package>
///     </packages>
///   </coverage>
///
/// Package, class and method coverage are counts of entities: a method is
/// covered when any of its lines was hit, a class when any of its methods
/// was, a package when any of its classes was.
///
/// The `branches-covered`/`branches-valid` root attributes only exist in the
/// newer schema. When they are absent the branch tally is summed from the
/// per-line `condition-coverage` attributes instead.
use std::collections::HashSet;
use std::sync::LazyLock;

use quick_xml::events::Event;
use regex::Regex;
use tracing::debug;

use super::{
    xml_err, xml_reader, Attributes, DialectHandler, ReportCoverage, MAX_LINE_NUMBER,
};
use crate::detect::{Dialect, RootElement};
use crate::error::Result;
use crate::model::Counter;
use crate::resolve::PathResolver;

/// Pre-compiled regex for condition-coverage attributes like "75% (3/4)".
static BRANCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+)/(\d+)\)").expect("valid branch regex"));

/// Cobertura XML dialect handler.
pub struct CoberturaHandler;

impl DialectHandler for CoberturaHandler {
    fn dialect(&self) -> Dialect {
        Dialect::Cobertura
    }

    fn applicable(&self, root: &RootElement) -> bool {
        // Clover also uses a <coverage> root, marked by its `clover` attribute.
        root.name == "coverage" && !root.has_attribute("clover")
    }

    fn parse(&self, input: &[u8], resolver: &PathResolver) -> Result<ReportCoverage> {
        parse_cobertura(input, resolver)
    }
}

/// Rollup state of the class currently being read.
struct ClassState {
    /// Report-native filename, used to dedupe branch lines.
    filename: String,
    /// Resolved key, `None` when the class's lines are not merged.
    key: Option<String>,
    hit: bool,
}

fn parse_cobertura(input: &[u8], resolver: &PathResolver) -> Result<ReportCoverage> {
    let mut reader = xml_reader(input);
    let mut buf = Vec::new();
    let mut report = ReportCoverage::new(Dialect::Cobertura);

    // Rollup state
    let mut package_hit: Option<bool> = None;
    let mut class: Option<ClassState> = None;
    let mut method_hit: Option<bool> = None;

    // Branch tallies
    let mut root_branches: Option<Counter> = None;
    let mut line_branches = Counter::default();
    let mut branch_lines: HashSet<(String, u32)> = HashSet::new();

    loop {
        let event = reader.read_event_into(&mut buf);
        let is_empty = matches!(&event, Ok(Event::Empty(_)));
        match event {
            Err(e) => return Err(xml_err(e, &reader)),
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"coverage" => {
                    let attrs = Attributes::read(e, "coverage", &reader)?;
                    let covered = attrs.optional_num::<u64>("branches-covered")?;
                    let valid = attrs.optional_num::<u64>("branches-valid")?;
                    if let (Some(covered), Some(valid)) = (covered, valid) {
                        root_branches =
                            Some(Counter::new(covered, valid.saturating_sub(covered)));
                    }
                }
                b"package" => {
                    if is_empty {
                        report.counters.package.record(false);
                    } else {
                        package_hit = Some(false);
                    }
                }
                b"class" => {
                    let attrs = Attributes::read(e, "class", &reader)?;
                    let filename = attrs.required("filename")?.to_string();
                    let key = resolver.resolve(&filename);
                    let key = if key.is_empty() {
                        debug!(
                            class = attrs.get("name").unwrap_or_default(),
                            "class has no usable file, skipping"
                        );
                        None
                    } else {
                        report.touch_file(&key);
                        Some(key)
                    };
                    if is_empty {
                        report.counters.class.record(false);
                    } else {
                        class = Some(ClassState {
                            filename,
                            key,
                            hit: false,
                        });
                    }
                }
                b"method" => {
                    if is_empty {
                        report.counters.method.record(false);
                    } else {
                        method_hit = Some(false);
                    }
                }
                b"line" => {
                    if let Some(current) = class.as_ref() {
                        let attrs = Attributes::read(e, "line", &reader)?;
                        let hit = read_line(
                            &attrs,
                            current,
                            &mut report,
                            &mut line_branches,
                            &mut branch_lines,
                        )?;
                        if hit {
                            if let Some(method) = method_hit.as_mut() {
                                *method = true;
                            }
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"method" => {
                    if let Some(hit) = method_hit.take() {
                        report.counters.method.record(hit);
                        if hit {
                            if let Some(current) = class.as_mut() {
                                current.hit = true;
                            }
                        }
                    }
                }
                b"class" => {
                    if let Some(current) = class.take() {
                        report.counters.class.record(current.hit);
                        if current.hit {
                            if let Some(hit) = package_hit.as_mut() {
                                *hit = true;
                            }
                        }
                    }
                }
                b"package" => {
                    if let Some(hit) = package_hit.take() {
                        report.counters.package.record(hit);
                    }
                }
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    let (files, lines) = report.derived_file_and_line_counters();
    report.counters.file = files;
    report.counters.line = lines;
    report.counters.conditional = root_branches.unwrap_or(line_branches);

    Ok(report)
}

/// Merge one `<line>` into the report and tally its conditions. Returns
/// whether the line was hit.
fn read_line(
    attrs: &Attributes,
    class: &ClassState,
    report: &mut ReportCoverage,
    line_branches: &mut Counter,
    branch_lines: &mut HashSet<(String, u32)>,
) -> Result<bool> {
    let line_number: u32 = attrs.required_num("number")?;
    if line_number > MAX_LINE_NUMBER {
        return Err(attrs.invalid("number", &line_number.to_string()));
    }
    let hits: u64 = attrs.required_num("hits")?;

    if line_number == 0 {
        debug!(file = %class.filename, "ignoring line number 0");
    } else if let Some(key) = class.key.as_deref() {
        report.record_line(key, line_number, hits);
    }

    // A branch line may appear under both <method> and <class>; count its
    // conditions once.
    if attrs.get("branch") == Some("true") {
        if let Some(cond) = attrs.get("condition-coverage") {
            let (covered, total) = condition_coverage(cond)
                .ok_or_else(|| attrs.invalid("condition-coverage", cond))?;
            if branch_lines.insert((class.filename.clone(), line_number)) {
                line_branches.add(Counter::new(covered, total.saturating_sub(covered)));
            }
        }
    }

    Ok(hits > 0)
}

/// Parse "75% (3/4)" into `(3, 4)`.
fn condition_coverage(value: &str) -> Option<(u64, u64)> {
    let caps = BRANCH_RE.captures(value)?;
    let covered = caps[1].parse().ok()?;
    let total = caps[2].parse().ok()?;
    Some((covered, total))
}

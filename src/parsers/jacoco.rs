/// Parser for JaCoCo XML coverage reports.
///
/// JaCoCo XML structure:
///   <report name="...">
///     <sessioninfo id="..." start="..." dump="..."/>
///     <package name="com/example">
///       <class name="com/example/Foo" sourcefilename="Foo.java">
///         <method name="doStuff" desc="()V" line="10">
///           <counter type="METHOD" missed="0" covered="1"/>
///         </method>
///       </class>
///       <sourcefile name="Foo.java">
///         <line nr="10" mi="0" ci="3" mb="0" cb="2"/>
///         <counter type="LINE" missed="1" covered="5"/>
///       </sourcefile>
///       <counter type="LINE" missed="1" covered="5"/>
///     </package>
///     <counter type="INSTRUCTION" missed="2" covered="10"/>
///     <counter type="BRANCH" missed="1" covered="3"/>
///     <counter type="LINE" missed="1" covered="5"/>
///     <counter type="METHOD" missed="0" covered="2"/>
///     <counter type="CLASS" missed="0" covered="1"/>
///   </report>
///
/// Key differences from Cobertura:
///   - Line-level data lives inside `<sourcefile>` elements, not `<class>`.
///   - There is no per-line hit count. A line with any covered instruction
///     (`ci > 0`) is recorded as hit once, otherwise as missed.
///   - Class, method, line and branch totals are taken verbatim from the
///     `<counter>` elements directly under `<report>`; counters nested in
///     packages, classes and methods repeat the same data at finer grain.
///   - Paths are constructed from the package name + source filename.
use quick_xml::events::Event;

use super::{
    xml_err, xml_reader, Attributes, DialectHandler, ReportCoverage, MAX_LINE_NUMBER,
};
use crate::detect::{Dialect, RootElement};
use crate::error::Result;
use crate::model::Counter;
use crate::resolve::PathResolver;

/// JaCoCo XML dialect handler.
pub struct JacocoHandler;

impl DialectHandler for JacocoHandler {
    fn dialect(&self) -> Dialect {
        Dialect::Jacoco
    }

    fn applicable(&self, root: &RootElement) -> bool {
        root.name == "report"
    }

    fn parse(&self, input: &[u8], resolver: &PathResolver) -> Result<ReportCoverage> {
        parse_jacoco(input, resolver)
    }
}

fn parse_jacoco(input: &[u8], resolver: &PathResolver) -> Result<ReportCoverage> {
    let mut reader = xml_reader(input);
    let mut buf = Vec::new();
    let mut report = ReportCoverage::new(Dialect::Jacoco);

    // Number of currently open elements; report-level counters sit at depth 1.
    let mut depth: usize = 0;
    let mut package: Option<String> = None;
    let mut package_hit = false;
    let mut sourcefile: Option<String> = None;
    let mut reported_lines: Option<Counter> = None;

    loop {
        let event = reader.read_event_into(&mut buf);
        let is_start = matches!(&event, Ok(Event::Start(_)));
        match event {
            Err(e) => return Err(xml_err(e, &reader)),
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                match e.name().as_ref() {
                    b"package" => {
                        let attrs = Attributes::read(e, "package", &reader)?;
                        let name = attrs.required("name")?.to_string();
                        if is_start {
                            package = Some(name);
                            package_hit = false;
                        } else {
                            report.counters.package.record(false);
                        }
                    }
                    b"sourcefile" => {
                        let attrs = Attributes::read(e, "sourcefile", &reader)?;
                        let name = attrs.required("name")?;
                        let path = match package.as_deref() {
                            Some(pkg) if !pkg.is_empty() => format!("{pkg}/{name}"),
                            _ => name.to_string(),
                        };
                        let key = resolver.resolve(&path);
                        if !key.is_empty() {
                            report.touch_file(&key);
                            if is_start {
                                sourcefile = Some(key);
                            }
                        }
                    }
                    b"line" => {
                        let attrs = Attributes::read(e, "line", &reader)?;
                        let nr: u32 = attrs.required_num("nr")?;
                        if nr > MAX_LINE_NUMBER {
                            return Err(attrs.invalid("nr", &nr.to_string()));
                        }
                        let ci: u64 = attrs.required_num("ci")?;
                        // Validated only; hit status comes from ci alone.
                        attrs.optional_num::<u64>("mi")?;
                        attrs.optional_num::<u64>("mb")?;
                        attrs.optional_num::<u64>("cb")?;

                        if ci > 0 {
                            package_hit = true;
                        }
                        if let Some(key) = sourcefile.as_deref() {
                            if nr > 0 {
                                report.record_line(key, nr, u64::from(ci > 0));
                            }
                        }
                    }
                    b"counter" => {
                        let attrs = Attributes::read(e, "counter", &reader)?;
                        let kind = attrs.required("type")?.to_string();
                        let missed: u64 = attrs.required_num("missed")?;
                        let covered: u64 = attrs.required_num("covered")?;
                        if depth == 1 {
                            let counter = Counter::new(covered, missed);
                            match kind.as_str() {
                                "CLASS" => report.counters.class.add(counter),
                                "METHOD" => report.counters.method.add(counter),
                                "BRANCH" => report.counters.conditional.add(counter),
                                "LINE" => {
                                    reported_lines.get_or_insert_with(Counter::default).add(counter)
                                }
                                _ => {}
                            }
                        }
                    }
                    _ => {}
                }
                if is_start {
                    depth += 1;
                }
            }
            Ok(Event::End(ref e)) => {
                depth = depth.saturating_sub(1);
                match e.name().as_ref() {
                    b"package" => {
                        if package.take().is_some() {
                            report.counters.package.record(package_hit);
                        }
                    }
                    b"sourcefile" => {
                        sourcefile = None;
                    }
                    _ => {}
                }
            }
            _ => {}
        }
        buf.clear();
    }

    let (files, lines) = report.derived_file_and_line_counters();
    report.counters.file = files;
    report.counters.line = reported_lines.unwrap_or(lines);

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CovgateError;

    fn parse(input: &[u8]) -> Result<ReportCoverage> {
        JacocoHandler.parse(input, &PathResolver::default())
    }

    #[test]
    fn test_parse_jacoco() {
        let input = include_bytes!("../../tests/fixtures/jacoco_basic.xml");
        let report = parse(input).unwrap();

        assert_eq!(report.files.len(), 2);

        let foo = &report.files["com/example/Foo.java"];
        assert_eq!(foo.len(), 5);
        assert_eq!(foo[&3], 1);
        assert_eq!(foo[&10], 1);
        // Partially covered: ci > 0 still counts as a hit.
        assert_eq!(foo[&11], 1);
        assert_eq!(foo[&12], 0);
        assert_eq!(foo[&15], 1);

        let bar = &report.files["com/example/Bar.java"];
        assert_eq!(bar.len(), 2);
        assert!(bar.values().all(|&h| h == 0));

        // Verbatim from the report-level counters.
        assert_eq!(report.counters.class, Counter::new(1, 1));
        assert_eq!(report.counters.method, Counter::new(2, 1));
        assert_eq!(report.counters.conditional, Counter::new(1, 1));
        assert_eq!(report.counters.line, Counter::new(4, 3));

        assert_eq!(report.counters.package, Counter::new(1, 0));
        assert_eq!(report.counters.file, Counter::new(1, 1));
    }

    #[test]
    fn test_nested_counters_are_ignored() {
        let input = br#"<report name="r">
  <package name="p">
    <sourcefile name="A.java">
      <line nr="1" mi="0" ci="2" mb="0" cb="0"/>
      <counter type="CLASS" missed="9" covered="9"/>
    </sourcefile>
    <counter type="CLASS" missed="9" covered="9"/>
  </package>
  <counter type="CLASS" missed="0" covered="1"/>
</report>"#;
        let report = parse(input).unwrap();
        assert_eq!(report.counters.class, Counter::new(1, 0));
        // No report-level LINE counter: derived from the lines instead.
        assert_eq!(report.counters.line, Counter::new(1, 0));
        assert_eq!(report.files["p/A.java"][&1], 1);
    }

    #[test]
    fn test_default_package() {
        let input = br#"<report name="r"><package name=""><sourcefile name="App.java">
            <line nr="1" mi="1" ci="0"/><line nr="2" mi="0" ci="1"/>
        </sourcefile></package></report>"#;
        let report = parse(input).unwrap();
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files["App.java"].len(), 2);
    }

    #[test]
    fn test_empty_report() {
        let report = parse(br#"<report name="empty"/>"#).unwrap();
        assert!(report.files.is_empty());
        assert_eq!(report.counters.class.percent(), 100.0);
    }

    #[test]
    fn test_missing_counter_type_is_fatal() {
        let input = br#"<report name="r"><counter missed="0" covered="1"/></report>"#;
        let err = parse(input).unwrap_err();
        assert!(matches!(
            err,
            CovgateError::MissingAttribute { element: "counter", attribute: "type", .. }
        ));
    }

    #[test]
    fn test_non_numeric_line_is_fatal() {
        let input = br#"<report name="r"><package name="p"><sourcefile name="A.java">
            <line nr="one" mi="0" ci="1"/></sourcefile></package></report>"#;
        let err = parse(input).unwrap_err();
        assert!(err.is_malformed_report());
        assert!(matches!(
            err,
            CovgateError::InvalidAttribute { element: "line", attribute: "nr", .. }
        ));
    }

    #[test]
    fn test_resolves_through_changed_files() {
        let input = include_bytes!("../../tests/fixtures/jacoco_basic.xml");
        let resolver = PathResolver::new(["app/src/main/java/com/example/Bar.java"]);
        let report = JacocoHandler.parse(input, &resolver).unwrap();
        assert!(report
            .files
            .contains_key("app/src/main/java/com/example/Bar.java"));
        assert!(report.files.contains_key("com/example/Foo.java"));
    }

    #[test]
    fn test_report_counters_of_same_type_are_summed() {
        let input = br#"<report name="r">
  <counter type="LINE" missed="2" covered="3"/>
  <counter type="CLASS" missed="1" covered="0"/>
  <counter type="LINE" missed="1" covered="4"/>
  <counter type="CLASS" missed="0" covered="2"/>
</report>"#;
        let report = parse(input).unwrap();
        assert_eq!(report.counters.line, Counter::new(7, 3));
        assert_eq!(report.counters.class, Counter::new(2, 1));
    }

    #[test]
    fn test_grouped_modules() {
        let input = br#"<report name="multi">
  <group name="core">
    <package name="org/acme/core">
      <sourcefile name="Engine.java">
        <line nr="4" mi="0" ci="2" mb="0" cb="0"/>
        <line nr="5" mi="1" ci="0" mb="0" cb="0"/>
      </sourcefile>
      <counter type="CLASS" missed="5" covered="5"/>
    </package>
    <counter type="CLASS" missed="5" covered="5"/>
  </group>
  <group name="web">
    <group name="api">
      <package name="org/acme/web">
        <sourcefile name="Routes.java">
          <line nr="1" mi="3" ci="0" mb="0" cb="0"/>
        </sourcefile>
      </package>
    </group>
  </group>
  <counter type="CLASS" missed="1" covered="1"/>
  <counter type="METHOD" missed="2" covered="3"/>
</report>"#;
        let report = parse(input).unwrap();

        assert_eq!(report.files.len(), 2);
        assert_eq!(report.files["org/acme/core/Engine.java"][&4], 1);
        assert_eq!(report.files["org/acme/core/Engine.java"][&5], 0);
        assert_eq!(report.files["org/acme/web/Routes.java"][&1], 0);

        // Only the counters directly under <report> are read.
        assert_eq!(report.counters.class, Counter::new(1, 1));
        assert_eq!(report.counters.method, Counter::new(3, 2));
        assert_eq!(report.counters.package, Counter::new(1, 1));
        assert_eq!(report.counters.file, Counter::new(1, 1));
        assert_eq!(report.counters.line, Counter::new(1, 2));
    }

    #[test]
    fn test_huge_line_number_is_fatal() {
        let input = br#"<report name="r"><package name="p"><sourcefile name="A.java">
            <line nr="4294967295" mi="0" ci="1"/></sourcefile></package></report>"#;
        let err = parse(input).unwrap_err();
        assert!(matches!(
            err,
            CovgateError::InvalidAttribute { element: "line", attribute: "nr", .. }
        ));
    }
}

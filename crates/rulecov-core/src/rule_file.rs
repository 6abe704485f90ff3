//! PMD ruleset navigation.
//!
//! Rule files are parsed with `roxmltree`. Every node keeps its byte range in
//! the source, so each rule carries its own slice of the file and the line it
//! starts on. Only the constructs PMD rule definitions use are read: `<rule>`
//! elements, the `xpath` property in attribute or element form and
//! `<example>` blocks.

use roxmltree::{Document, Node};
use serde::Serialize;
use std::ops::Range;

pub use roxmltree::Error as XmlError;

/// One `<rule>` element of a ruleset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDefinition {
    pub name: String,
    pub message: String,
    /// XPath expression, trimmed. `None` when the rule has no `xpath`
    /// property.
    pub xpath: Option<String>,
    /// `<example>` bodies in document order.
    pub examples: Vec<String>,
    /// The rule's own slice of the file.
    #[serde(skip)]
    pub text: String,
    /// 0-based line of the file where `text` begins.
    pub line_offset: usize,
    /// Byte range of the `xpath` property element within `text`.
    #[serde(skip)]
    pub xpath_span: Option<Range<usize>>,
}

/// Split a ruleset into its rules.
///
/// `<rule ref="..."/>` references are skipped. A document without any
/// `<rule>` element is treated as a single unnamed rule; blank input has no
/// rules. Malformed XML is an error.
pub fn parse_ruleset(text: &str) -> Result<Vec<RuleDefinition>, XmlError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let doc = Document::parse(text)?;

    let mut rules: Vec<RuleDefinition> = doc
        .descendants()
        .filter(|n| is_element(n, "rule") && !n.has_attribute("ref"))
        .map(|n| build_rule(text, n))
        .collect();

    if rules.is_empty() {
        let root = doc.root();
        let property = xpath_property(root);
        rules.push(RuleDefinition {
            xpath: property.map(property_value),
            examples: examples_of(root),
            xpath_span: property.map(|p| p.range()),
            text: text.to_string(),
            ..RuleDefinition::default()
        });
    }
    Ok(rules)
}

fn build_rule(source: &str, node: Node<'_, '_>) -> RuleDefinition {
    let range = node.range();
    let property = xpath_property(node);
    RuleDefinition {
        name: node.attribute("name").unwrap_or_default().to_string(),
        message: node.attribute("message").unwrap_or_default().to_string(),
        xpath: property.map(property_value),
        examples: examples_of(node),
        xpath_span: property.map(|p| {
            let span = p.range();
            span.start - range.start..span.end - range.start
        }),
        line_offset: source[..range.start].matches('\n').count(),
        text: source[range].to_string(),
    }
}

fn examples_of(node: Node<'_, '_>) -> Vec<String> {
    node.descendants()
        .filter(|n| is_element(n, "example"))
        .map(|n| dedent(&text_content(n)))
        .collect()
}

fn is_element(node: &Node<'_, '_>, local_name: &str) -> bool {
    node.is_element() && node.tag_name().name() == local_name
}

fn xpath_property<'a, 'input>(node: Node<'a, 'input>) -> Option<Node<'a, 'input>> {
    node.descendants()
        .find(|n| is_element(n, "property") && n.attribute("name") == Some("xpath"))
}

/// `value` attribute, else the `<value>` child, else the property's own text.
fn property_value(property: Node<'_, '_>) -> String {
    if let Some(value) = property.attribute("value") {
        return value.trim().to_string();
    }
    let holder = property
        .children()
        .find(|n| is_element(n, "value"))
        .unwrap_or(property);
    text_content(holder).trim().to_string()
}

/// Concatenated text of every descendant; CDATA arrives verbatim.
fn text_content(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

/// Extract the first XPath expression in `text`.
///
/// Supports `<property name="xpath" value="..."/>` and
/// `<property name="xpath"><value>...</value></property>`, with or without
/// CDATA. `None` when there is no such property or `text` is not well-formed.
pub fn extract_xpath(text: &str) -> Option<String> {
    let doc = Document::parse(text).ok()?;
    xpath_property(doc.root()).map(property_value)
}

/// Byte range of the `xpath` property element, from `<property` through the
/// closing `</property>` (or the tag itself when self-closing).
pub fn xpath_property_span(text: &str) -> Option<Range<usize>> {
    let doc = Document::parse(text).ok()?;
    xpath_property(doc.root()).map(|n| n.range())
}

/// Remove leading/trailing blank lines and the common indentation.
fn dedent(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    let (Some(first), Some(last)) = (first, last) else {
        return String::new();
    };
    let lines = &lines[first..=last];
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| l.get(indent..).unwrap_or_else(|| l.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULESET: &str = r#"<?xml version="1.0"?>
<ruleset name="Custom">
    <!-- <rule name="Commented" /> -->
    <rule ref="category/apex/bestpractices.xml/ApexUnitTestClassShouldHaveAsserts"/>
    <rule name="AvoidPublicTestMethods"
          language="apex"
          message="Test methods should not be public"
          class="net.sourceforge.pmd.lang.rule.xpath.XPathRule">
        <properties>
            <property name="xpath">
                <value>
<![CDATA[
//Method[@Visibility='public' and @Name="test"]
]]>
                </value>
            </property>
        </properties>
        <example>
<![CDATA[
    public class Foo {
        public void test() {} // ❌ public test
    }
]]>
        </example>
    </rule>
    <rule name="NoDml" message="a &lt; b">
        <properties>
            <property name="xpath" value="//DmlInsertStatement[@Op = &apos;x&apos;]"/>
        </properties>
    </rule>
</ruleset>
"#;

    #[test]
    fn test_parse_ruleset_skips_refs_and_comments() {
        let rules = parse_ruleset(RULESET).unwrap();
        let names: Vec<_> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["AvoidPublicTestMethods", "NoDml"]);
    }

    #[test]
    fn test_rule_fields() {
        let rules = parse_ruleset(RULESET).unwrap();
        let first = &rules[0];
        assert_eq!(first.message, "Test methods should not be public");
        assert_eq!(
            first.xpath.as_deref(),
            Some(r#"//Method[@Visibility='public' and @Name="test"]"#)
        );
        assert_eq!(first.examples.len(), 1);
        assert!(first.examples[0].starts_with("public class Foo {"));
        assert!(first.examples[0].contains("\n    public void test()"));
        assert_eq!(first.line_offset, 4);
        assert!(first.text.starts_with("<rule name=\"AvoidPublicTestMethods\""));
        assert!(first.text.ends_with("</rule>"));
    }

    #[test]
    fn test_xpath_span_is_relative_to_rule_text() {
        let rules = parse_ruleset(RULESET).unwrap();
        for rule in &rules {
            let span = rule.xpath_span.clone().unwrap();
            assert!(rule.text[span.clone()].starts_with("<property name=\"xpath\""));
            assert_eq!(xpath_property_span(&rule.text), Some(span));
        }
    }

    #[test]
    fn test_attribute_form_is_decoded() {
        let rules = parse_ruleset(RULESET).unwrap();
        assert_eq!(rules[1].message, "a < b");
        assert_eq!(
            rules[1].xpath.as_deref(),
            Some("//DmlInsertStatement[@Op = 'x']")
        );
        assert!(rules[1].examples.is_empty());
    }

    #[test]
    fn test_greater_than_inside_value_attribute() {
        let text = "<rule name=\"R\">\n<properties>\n<property name=\"xpath\" value=\"//Method[@Arity > 2]\"/>\n</properties>\n<example>void a() {}</example>\n</rule>";
        assert_eq!(
            extract_xpath(text).as_deref(),
            Some("//Method[@Arity > 2]")
        );
        let rules = parse_ruleset(text).unwrap();
        assert_eq!(rules[0].xpath.as_deref(), Some("//Method[@Arity > 2]"));
        assert_eq!(rules[0].examples, vec!["void a() {}"]);
        let span = rules[0].xpath_span.clone().unwrap();
        assert!(rules[0].text[span].ends_with("/>"));
    }

    #[test]
    fn test_namespaced_ruleset() {
        let text = r#"<ruleset xmlns="http://pmd.sourceforge.net/ruleset/2.0.0" name="ns">
<rule name="Ns"><properties><property name="xpath" value="//Field"/></properties></rule>
</ruleset>"#;
        let rules = parse_ruleset(text).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].xpath.as_deref(), Some("//Field"));
        assert_eq!(rules[0].line_offset, 1);
    }

    #[test]
    fn test_bare_document_is_one_rule() {
        let text = "<property name=\"xpath\"><value>//Method</value></property>";
        let rules = parse_ruleset(text).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "");
        assert_eq!(rules[0].xpath.as_deref(), Some("//Method"));
        assert!(parse_ruleset("   \n").unwrap().is_empty());
    }

    #[test]
    fn test_extract_xpath_without_property() {
        assert_eq!(extract_xpath("<rule name=\"x\"></rule>"), None);
    }

    #[test]
    fn test_extract_xpath_entities_outside_cdata_only() {
        let text = "<property name=\"xpath\"><value>//X[@A &gt; 2]<![CDATA[ and @B &gt; 3]]></value></property>";
        assert_eq!(
            extract_xpath(text).as_deref(),
            Some("//X[@A > 2] and @B &gt; 3")
        );
    }

    #[test]
    fn test_dedent() {
        assert_eq!(dedent("\n\n    a\n      b\n\n    c\n  \n"), "a\n  b\n\nc");
        assert_eq!(dedent("   \n"), "");
    }

    #[test]
    fn test_xpath_property_span() {
        let element = "<rule>\n<property name=\"xpath\">\n<value>//X</value>\n</property>\n</rule>";
        let span = xpath_property_span(element).unwrap();
        assert!(element[span.clone()].starts_with("<property"));
        assert!(element[span].ends_with("</property>"));

        let attr = "<properties><property name=\"xpath\" value=\"//X\"/><property name=\"version\"/></properties>";
        let span = xpath_property_span(attr).unwrap();
        assert_eq!(&attr[span], "<property name=\"xpath\" value=\"//X\"/>");
        assert!(xpath_property_span("<rule/>").is_none());
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        assert!(parse_ruleset("<rule name=\"Open\">\n<property name=\"xpath\" value=\"//X\"/>").is_err());
        assert!(parse_ruleset("<rule name=\"A\"></rule><rule name=\"B\"></rule>").is_err());
        assert_eq!(extract_xpath("<property name=\"xpath\" value=\"//X\">"), None);
    }
}

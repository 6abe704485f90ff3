//! XPath expression analysis.
//!
//! The extractors are syntactic: they recognise the restricted XPath subset
//! PMD rules are written in (axis steps, attribute predicates, boolean
//! connectives, `let ... return`, unions) without evaluating anything. Every
//! extractor is total: malformed input yields empty or partial output, never
//! a panic. Offsets are byte offsets into the exact string passed in.

pub mod attributes;
pub mod conditionals;
pub mod literals;
pub mod node_types;
pub(crate) mod scan;

pub use attributes::{extract_attributes, extract_operators};
pub use conditionals::{Conditional, ConditionalType, extract_conditionals};
pub use literals::{
    HardcodedValue, LetVariable, LiteralKind, extract_hardcoded_values, extract_let_variables,
};
pub use node_types::{CollisionPolicy, extract_node_types, extract_node_types_with};

use crate::config::NodeTypeConfig;
use serde::{Deserialize, Serialize};

/// Structured decomposition of one rule's XPath.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XPathAnalysis {
    pub node_types: Vec<String>,
    pub attributes: Vec<String>,
    pub operators: Vec<String>,
    pub conditionals: Vec<Conditional>,
    pub has_unions: bool,
    pub has_let_expressions: bool,
}

impl XPathAnalysis {
    /// True when nothing was extracted.
    pub fn is_empty(&self) -> bool {
        self.node_types.is_empty()
            && self.attributes.is_empty()
            && self.operators.is_empty()
            && self.conditionals.is_empty()
    }
}

impl From<&NodeTypeConfig> for CollisionPolicy {
    fn from(config: &NodeTypeConfig) -> Self {
        if !config.exclude_attribute_collisions {
            CollisionPolicy::PatternOnly
        } else if config.extra_collisions.is_empty() {
            CollisionPolicy::ExcludeAttributeNames
        } else {
            CollisionPolicy::ExcludeWith(config.extra_collisions.clone())
        }
    }
}

/// Analyze an XPath with the default collision policy.
pub fn analyze_xpath(xpath: Option<&str>) -> XPathAnalysis {
    analyze_xpath_with(xpath, &CollisionPolicy::default())
}

pub fn analyze_xpath_with(xpath: Option<&str>, policy: &CollisionPolicy) -> XPathAnalysis {
    let xpath = match xpath {
        Some(x) if !x.is_empty() => x,
        _ => return XPathAnalysis::default(),
    };

    XPathAnalysis {
        node_types: extract_node_types_with(xpath, policy),
        attributes: extract_attributes(xpath),
        operators: extract_operators(xpath),
        conditionals: extract_conditionals(xpath),
        has_unions: xpath.contains('|'),
        has_let_expressions: xpath.contains("let "),
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn extractors_never_panic(xpath in ".*") {
            let _ = analyze_xpath(Some(&xpath));
            let _ = extract_hardcoded_values(&xpath);
            let _ = extract_let_variables(&xpath);
        }

        #[test]
        fn op_is_never_an_attribute(xpath in r#"[/@A-Za-z='" \[\]()|,]*"#) {
            prop_assert!(!extract_attributes(&xpath).iter().any(|a| a == "Op"));
        }

        #[test]
        fn positions_are_valid_offsets(xpath in ".*") {
            for c in extract_conditionals(&xpath) {
                prop_assert!(xpath.is_char_boundary(c.position));
                prop_assert!(xpath[c.position..].starts_with(c.expression.chars().next().unwrap()));
            }
            for v in extract_hardcoded_values(&xpath) {
                prop_assert!(xpath[v.position..].starts_with(&v.value));
            }
        }

        #[test]
        fn zero_and_one_never_hardcoded(xpath in r"[0-9 @A=\[\]]*") {
            prop_assert!(!extract_hardcoded_values(&xpath)
                .iter()
                .any(|v| v.value == "0" || v.value == "1"));
        }

        #[test]
        fn let_block_literals_suppressed(
            value in "[2-9][0-9]{0,3}",
            tail in "[2-9][0-9]{0,3}",
        ) {
            let xpath = format!("let $a := {value} return //X[@B = {tail}]");
            let found = extract_hardcoded_values(&xpath);
            let span_end = xpath.find("return").unwrap();
            prop_assert!(found.iter().all(|v| v.position >= span_end));
            prop_assert_eq!(found.len(), 1);
        }
    }
}

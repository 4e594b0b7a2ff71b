//! Acceptance checks for a returned translation.

use crate::{markup::MarkupSummary, placeholder};

use super::FailureReason;

/// Check `translation` against `source`.
///
/// A translation is rejected when it is blank, when its printf placeholders
/// differ, or when its inline markup differs in element names, nesting or
/// CDATA sections.
pub fn validate(source: &str, translation: &str) -> Result<(), FailureReason> {
    if translation.trim().is_empty() {
        return Err(FailureReason::Blank);
    }
    placeholder::compare(source, translation).map_err(FailureReason::Placeholder)?;

    let expected = MarkupSummary::of(source);
    let actual = MarkupSummary::of(translation);
    if expected.balanced && !actual.balanced {
        return Err(FailureReason::Markup("markup is not well nested".to_string()));
    }
    if expected.elements != actual.elements {
        let names = |s: &MarkupSummary| {
            s.elements
                .iter()
                .map(|(name, n)| format!("{}×{}", name, n))
                .collect::<Vec<_>>()
                .join(", ")
        };
        return Err(FailureReason::Markup(format!(
            "markup elements differ: expected [{}], got [{}]",
            names(&expected),
            names(&actual)
        )));
    }
    if expected.cdata_sections != actual.cdata_sections {
        return Err(FailureReason::Markup(format!(
            "expected {} CDATA section(s), got {}",
            expected.cdata_sections, actual.cdata_sections
        )));
    }
    Ok(())
}

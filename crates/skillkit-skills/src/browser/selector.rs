//! Selector parsing, validation, and JavaScript generation.
//!
//! Supports CSS and XPath selectors.  XPath is detected by a leading `/` or
//! `(//` and validated against a list of script-injection markers before it
//! is ever interpolated into page JavaScript.  The generated snippets are
//! evaluated via `Runtime.evaluate` and return JSON strings so results can
//! be parsed uniformly on the Rust side.

use crate::error::{Result, SkillError};

/// Maximum accepted XPath length.
const MAX_XPATH_LEN: usize = 1000;

/// Substrings that must never appear in an XPath expression.
const DANGEROUS_PATTERNS: &[&str] = &[
    "javascript:",
    "<script",
    "onerror=",
    "onload=",
    "onclick=",
    "onmouseover=",
    "eval(",
    "function(",
    "constructor(",
];

/// The selector language a raw selector was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    Css,
    Xpath,
}

/// A validated selector ready for JS generation.
#[derive(Debug, Clone)]
pub struct ParsedSelector {
    pub kind: SelectorKind,
    pub raw: String,
}

/// Parse and validate a selector string.
pub fn parse_selector(raw: &str) -> Result<ParsedSelector> {
    if raw.is_empty() {
        return Err(SkillError::InvalidInput {
            skill: "browser".into(),
            reason: "selector must be a non-empty string".into(),
        });
    }

    if raw.starts_with('/') || raw.starts_with("(//") {
        validate_xpath(raw)?;
        return Ok(ParsedSelector {
            kind: SelectorKind::Xpath,
            raw: raw.to_string(),
        });
    }

    Ok(ParsedSelector {
        kind: SelectorKind::Css,
        raw: raw.to_string(),
    })
}

/// Reject XPath expressions carrying script-injection markers or absurd
/// lengths.
fn validate_xpath(xpath: &str) -> Result<()> {
    let lower = xpath.to_lowercase();
    for pattern in DANGEROUS_PATTERNS {
        if lower.contains(pattern) {
            return Err(SkillError::InvalidInput {
                skill: "browser".into(),
                reason: format!("potential XPath injection detected: {pattern}"),
            });
        }
    }

    if xpath.len() > MAX_XPATH_LEN {
        return Err(SkillError::InvalidInput {
            skill: "browser".into(),
            reason: format!("XPath selector too long (max {MAX_XPATH_LEN} characters)"),
        });
    }

    Ok(())
}

/// JS expression yielding the first element matched by the selector, as a
/// local `el` binding inside an IIFE body.
fn lookup_snippet(selector: &ParsedSelector) -> String {
    let quoted = serde_json::to_string(&selector.raw).expect("string serializes");
    match selector.kind {
        SelectorKind::Css => format!("const el = document.querySelector({quoted});"),
        SelectorKind::Xpath => format!(
            "const el = document.evaluate({quoted}, document, null, \
             XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;"
        ),
    }
}

/// JS that reports whether the element exists and is visible.
///
/// Returns `{"found": bool, "visible": bool}` as a JSON string.
pub fn probe_js(selector: &ParsedSelector) -> String {
    format!(
        r#"(() => {{
            {lookup}
            if (!el) return JSON.stringify({{ found: false, visible: false }});
            const rect = el.getBoundingClientRect();
            const style = window.getComputedStyle(el);
            const visible = rect.width > 0 && rect.height > 0 &&
                style.visibility !== 'hidden' && style.display !== 'none';
            return JSON.stringify({{ found: true, visible }});
        }})()"#,
        lookup = lookup_snippet(selector)
    )
}

/// JS that clicks the element.
///
/// Returns `{"success": true, "tag": ...}` or `{"error": ...}`.
pub fn click_js(selector: &ParsedSelector) -> String {
    format!(
        r#"(() => {{
            {lookup}
            if (!el) return JSON.stringify({{ error: "element not found" }});
            el.scrollIntoView({{ block: 'center' }});
            el.click();
            return JSON.stringify({{ success: true, tag: el.tagName }});
        }})()"#,
        lookup = lookup_snippet(selector)
    )
}

/// JS that fills the element with `value`, optionally clearing it first, and
/// dispatches input/change events for frameworks that listen to them.
pub fn fill_js(selector: &ParsedSelector, value: &str, clear: bool) -> String {
    let quoted_value = serde_json::to_string(value).expect("string serializes");
    let clear_stmt = if clear {
        "if ('value' in el) el.value = ''; else el.textContent = '';"
    } else {
        ""
    };
    format!(
        r#"(() => {{
            {lookup}
            if (!el) return JSON.stringify({{ error: "element not found" }});
            el.focus();
            {clear_stmt}
            const text = {quoted_value};
            if ('value' in el) {{
                el.value += text;
            }} else {{
                el.textContent += text;
            }}
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return JSON.stringify({{ success: true, tag: el.tagName, length: text.length }});
        }})()"#,
        lookup = lookup_snippet(selector)
    )
}

/// JS returning the element's bounding rect (for element screenshots).
///
/// Returns `{"x", "y", "width", "height"}` or `{"error": ...}`.
pub fn rect_js(selector: &ParsedSelector) -> String {
    format!(
        r#"(() => {{
            {lookup}
            if (!el) return JSON.stringify({{ error: "element not found" }});
            el.scrollIntoView({{ block: 'center' }});
            const r = el.getBoundingClientRect();
            return JSON.stringify({{ x: r.x, y: r.y, width: r.width, height: r.height }});
        }})()"#,
        lookup = lookup_snippet(selector)
    )
}

/// Append troubleshooting hints to an element-wait failure.
pub fn not_found_error(selector: &str, timeout_ms: u64) -> SkillError {
    SkillError::ExecutionFailed {
        skill: "browser".into(),
        reason: format!(
            "element not found for selector `{selector}` within {timeout_ms}ms\n\n\
             Troubleshooting:\n\
             1. Use `skillkit browser snapshot` to list available selectors\n\
             2. Try an XPath selector: //button[contains(text(),\"Click\")]\n\
             3. Check the element is visible (not display:none or hidden)\n\
             4. Increase --timeout\n\
             5. Change the wait strategy: --wait-until load or domcontentloaded"
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_selectors_pass_through() {
        let parsed = parse_selector(".login > button#submit").expect("should parse");
        assert_eq!(parsed.kind, SelectorKind::Css);
        assert_eq!(parsed.raw, ".login > button#submit");
    }

    #[test]
    fn xpath_detected_by_leading_slash() {
        let parsed = parse_selector("//button[text()='Go']").expect("should parse");
        assert_eq!(parsed.kind, SelectorKind::Xpath);
        let parsed = parse_selector("(//div)[1]").expect("should parse");
        assert_eq!(parsed.kind, SelectorKind::Xpath);
    }

    #[test]
    fn empty_selector_rejected() {
        assert!(parse_selector("").is_err());
    }

    #[test]
    fn xpath_injection_patterns_rejected() {
        for bad in [
            "//a[@href='javascript:alert(1)']",
            "//img[@onerror=x]",
            "//div[eval(1)]",
        ] {
            let result = parse_selector(bad);
            assert!(result.is_err(), "expected rejection for {bad}");
        }
    }

    #[test]
    fn overlong_xpath_rejected() {
        let long = format!("//div[{}]", "a".repeat(MAX_XPATH_LEN));
        assert!(parse_selector(&long).is_err());
    }

    #[test]
    fn click_js_embeds_escaped_selector() {
        let parsed = parse_selector(r#"button[name="it's"]"#).expect("should parse");
        let js = click_js(&parsed);
        // The selector must be JSON-escaped, not interpolated raw.
        assert!(js.contains(r#"button[name=\"it's\"]"#));
        assert!(js.contains("querySelector"));
    }

    #[test]
    fn xpath_uses_document_evaluate() {
        let parsed = parse_selector("//input[@id='q']").expect("should parse");
        let js = probe_js(&parsed);
        assert!(js.contains("document.evaluate"));
        assert!(!js.contains("querySelector"));
    }

    #[test]
    fn fill_js_clear_flag_controls_reset() {
        let parsed = parse_selector("#q").expect("should parse");
        let with_clear = fill_js(&parsed, "hello", true);
        assert!(with_clear.contains("el.value = ''"));
        let without_clear = fill_js(&parsed, "hello", false);
        assert!(!without_clear.contains("el.value = ''"));
    }

    #[test]
    fn not_found_error_carries_hints() {
        let err = not_found_error("#missing", 5000);
        let text = err.to_string();
        assert!(text.contains("#missing"));
        assert!(text.contains("Troubleshooting"));
    }
}

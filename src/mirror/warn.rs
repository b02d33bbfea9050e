fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_ascii_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if ch.is_ascii_graphic() {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        trimmed.to_string()
    }
}

/// One-line `key=value` warning for log scrapers.
pub fn format_line(code: &str, stage: &str, action: &str, target: &str, err: &str) -> String {
    format!(
        "MIRROR_WARN code={} stage={} action={} target={} err={}",
        sanitize_value(code),
        sanitize_value(stage),
        sanitize_value(action),
        sanitize_value(target),
        sanitize_value(err),
    )
}

pub fn emit(code: &str, stage: &str, action: &str, target: &str, err: &str) {
    eprintln!("{}", format_line(code, stage, action, target, err));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_value_rewrites_whitespace() {
        assert_eq!(sanitize_value("a b\tc"), "a_b_c");
    }

    #[test]
    fn sanitize_value_falls_back_for_empty() {
        assert_eq!(sanitize_value("   "), "na");
    }

    #[test]
    fn warn_line_is_single_line() {
        let line = format_line("E002_RETRIES_EXHAUSTED", "fetch", "abort", "page 3", "timed out\nafter 30s");
        assert_eq!(
            line,
            "MIRROR_WARN code=E002_RETRIES_EXHAUSTED stage=fetch action=abort target=page_3 err=timed_out_after_30s"
        );
    }
}

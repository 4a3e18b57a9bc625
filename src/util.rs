//! Small utility helpers used across modules.

/// Log-safe truncation for large strings, cut on a char boundary.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}

/// Filesystem-safe slug for download names.
pub fn file_slug(s: &str) -> String {
  let slug: String = s
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
    .collect();
  let slug = slug.trim_matches('-').to_string();
  if slug.is_empty() { "export".into() } else { slug }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn truncation_respects_utf8() {
    let s = "مرحبا بالعالم";
    let t = trunc_for_log(s, 3);
    assert!(t.starts_with('م'));
    assert!(t.ends_with(&format!("({} bytes total)", s.len())));
    assert_eq!(trunc_for_log("short", 10), "short");
  }

  #[test]
  fn slug() {
    assert_eq!(file_slug("Grade 3 / A"), "grade-3---a");
    assert_eq!(file_slug("صف"), "export");
  }
}

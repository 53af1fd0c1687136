//! Formatting helpers shared by the report and the console output.

use std::time::Duration;

/// Formats an integer with `,` thousands separators.
pub fn format_count(n: u64) -> String {
   let digits = n.to_string();
   let mut out = String::with_capacity(digits.len() + digits.len() / 3);
   for (i, ch) in digits.chars().enumerate() {
      if i > 0 && (digits.len() - i) % 3 == 0 {
         out.push(',');
      }
      out.push(ch);
   }
   out
}

/// Formats a decimal megabyte figure as a human-readable size string
pub fn format_size_mb(mb: f64) -> String {
   if mb >= 1000.0 {
      format!("{:.2} GB", mb / 1000.0)
   } else if mb >= 1.0 {
      format!("{mb:.2} MB")
   } else {
      format!("{:.1} KB", mb * 1000.0)
   }
}

pub fn format_duration(d: Duration) -> String {
   let secs = d.as_secs();
   if secs >= 60 {
      format!("{}m {:02}s", secs / 60, secs % 60)
   } else {
      format!("{:.1}s", d.as_secs_f64())
   }
}

/// Keeps `[A-Za-z0-9_-]`, replacing everything else with `_`.
pub fn sanitize_file_component(value: &str) -> String {
   let cleaned: String = value
      .trim()
      .chars()
      .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
      .collect();
   if cleaned.is_empty() { "UNKNOWN".to_string() } else { cleaned }
}

/// Replaces characters the base-14 PDF fonts cannot show with `?`.
pub fn pdf_text(value: &str) -> String {
   value
      .chars()
      .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
      .collect()
}

/// Shortens `value` to `max` characters, marking the cut with `...`.
pub fn truncate(value: &str, max: usize) -> String {
   if value.chars().count() <= max {
      return value.to_string();
   }
   let keep = max.saturating_sub(3);
   let mut out: String = value.chars().take(keep).collect();
   out.push_str("...");
   out
}

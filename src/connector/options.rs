//! WHERE clause wrapping for the `OPTIONS` table of `RFC_READ_TABLE`.

use crate::error::{Error, Result};

/// Width of one `OPTIONS` line (`RFC_DB_OPT-TEXT`).
pub const MAX_OPTION_LENGTH: usize = 72;

/// Splits a clause into whitespace-separated tokens; quoted literals
/// (including doubled `''` escapes) stay whole.
fn tokens(clause: &str) -> Vec<String> {
   let mut out = Vec::new();
   let mut current = String::new();
   let mut in_quote = false;
   let mut chars = clause.chars().peekable();
   while let Some(ch) = chars.next() {
      if ch == '\'' {
         current.push(ch);
         if in_quote && chars.peek() == Some(&'\'') {
            current.push('\'');
            chars.next();
         } else {
            in_quote = !in_quote;
         }
      } else if ch.is_whitespace() && !in_quote {
         if !current.is_empty() {
            out.push(std::mem::take(&mut current));
         }
      } else {
         current.push(ch);
      }
   }
   if !current.is_empty() {
      out.push(current);
   }
   out
}

/// Whether `token` can follow `previous` on the next line without a blank.
///
/// A literal is self-delimiting unless the previous line ends in a quote,
/// where joining would read as a doubled `''` escape.
fn joins_without_blank(previous: &str, token: &str) -> bool {
   token.starts_with('\'') && !previous.ends_with('\'')
}

/// Packs a WHERE clause into lines of at most [`MAX_OPTION_LENGTH`]
/// characters without splitting a token.
///
/// Continuation lines start with a blank so the server-side concatenation
/// keeps tokens apart; a literal needs none after an operator or comma.
pub fn wrap_options(clause: &str) -> Result<Vec<String>> {
   let mut lines: Vec<String> = Vec::new();
   let mut line = String::new();

   for token in tokens(clause) {
      let token_len = token.chars().count();
      if line.is_empty() {
         if token_len > MAX_OPTION_LENGTH {
            return Err(Error::OptionTooLong { token, limit: MAX_OPTION_LENGTH });
         }
         line = token;
         continue;
      }
      if line.chars().count() + 1 + token_len <= MAX_OPTION_LENGTH {
         line.push(' ');
         line.push_str(&token);
         continue;
      }

      let next = if joins_without_blank(&line, &token) {
         token.clone()
      } else {
         format!(" {token}")
      };
      if next.chars().count() > MAX_OPTION_LENGTH {
         return Err(Error::OptionTooLong { token, limit: MAX_OPTION_LENGTH });
      }
      lines.push(std::mem::replace(&mut line, next));
   }
   if !line.is_empty() {
      lines.push(line);
   }

   tracing::debug!("wrapped where clause into {} option rows", lines.len());
   Ok(lines)
}

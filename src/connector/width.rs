//! Output width of dictionary fields as `RFC_READ_TABLE` formats them.

/// Maximum length of one `DATA-WA` line.
pub const MAX_LINE_WIDTH: usize = 512;

/// Width assumed for fields without usable dictionary information.
pub const FALLBACK_WIDTH: usize = 50;

/// One entry of `DDIF_FIELDINFO_GET-DFIES_TAB`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictField {
   pub name:     String,
   pub datatype: String,
   pub length:   usize,
}

pub fn field_width(datatype: &str, length: usize) -> usize {
   match datatype {
      "CHAR" | "NUMC" | "CLNT" | "LANG" | "CUKY" | "UNIT" | "ACCP" => length,
      "DATS" => 8,
      "TIMS" => 6,
      "INT1" => 3,
      "INT2" => 5,
      "INT4" => 10,
      "DEC" | "QUAN" | "CURR" => length + 2,
      _ => FALLBACK_WIDTH,
   }
}

/// Total line width of `fields` including one delimiter between columns.
pub fn line_width(dictionary: &[DictField], fields: &[&str], delimiter: usize) -> usize {
   let columns: usize = fields
      .iter()
      .map(|name| {
         dictionary.iter().find(|f| f.name == *name).map_or_else(
            || {
               tracing::warn!("field {name} not in dictionary, assuming width {FALLBACK_WIDTH}");
               FALLBACK_WIDTH
            },
            |f| field_width(&f.datatype, f.length),
         )
      })
      .sum();
   columns + delimiter * fields.len().saturating_sub(1)
}

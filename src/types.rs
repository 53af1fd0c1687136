use serde::{Deserialize, Serialize};

use crate::rfc::RfcRow;

fn field(row: &RfcRow, name: &str) -> String {
   row.get(name).map(|v| v.trim().to_string()).unwrap_or_default()
}

/// GOS link between a business object and a stored document (SRGBTBREL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRecord {
   pub guid:          String,
   pub reltype:       String,
   pub object_id:     String,
   pub object_type:   String,
   pub document_id:   String,
   pub document_type: String,
}

impl RelationshipRecord {
   /// Returns `None` when the row has no document identifier.
   pub fn from_row(row: &RfcRow) -> Option<Self> {
      let document_id = field(row, "INSTID_B");
      if document_id.is_empty() {
         return None;
      }
      Some(Self {
         guid: field(row, "BRELGUID"),
         reltype: field(row, "RELTYPE"),
         object_id: field(row, "INSTID_A"),
         object_type: field(row, "TYPEID_A"),
         document_id,
         document_type: field(row, "TYPEID_B"),
      })
   }
}

/// Physical document metadata (SOFFPHIO). Never carries content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalDocument {
   pub phio_id:    String,
   pub ph_class:   String,
   pub loio_id:    String,
   pub created_at: String,
}

impl PhysicalDocument {
   pub fn from_row(row: &RfcRow) -> Option<Self> {
      let phio_id = field(row, "PHIO_ID");
      if phio_id.is_empty() {
         return None;
      }
      Some(Self {
         phio_id,
         ph_class: field(row, "PH_CLASS"),
         loio_id: field(row, "LOIO_ID"),
         created_at: field(row, "CREA_TIME"),
      })
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::rfc::row;

   #[test]
   fn relationship_without_document_is_skipped() {
      assert!(RelationshipRecord::from_row(&row([("BRELGUID", "G1"), ("INSTID_B", "   ")])).is_none());
   }

   #[test]
   fn values_are_trimmed() {
      let rec = RelationshipRecord::from_row(&row([
         ("BRELGUID", "G1 "),
         ("INSTID_A", " 4500000001"),
         ("INSTID_B", "FOL18 "),
      ]))
      .expect("record");
      assert_eq!(rec.guid, "G1");
      assert_eq!(rec.object_id, "4500000001");
      assert_eq!(rec.document_id, "FOL18");
      assert_eq!(rec.reltype, "");
   }
}

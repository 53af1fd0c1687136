#![allow(dead_code)]

use gosscan::{
   connector::SapConnector,
   rfc::{MemorySystem, MemoryTransport, Password, RfcRow, memory::MemoryField, row},
   scan::ScanTarget,
};

pub const USER: &str = "AUDITOR";
pub const PASSWORD: &str = "s3cret";

/// An in-memory system with the GOS tables and their dictionary layout.
pub fn gos_system() -> MemorySystem {
   MemorySystem::new()
      .with_user(USER, PASSWORD)
      .with_table("SRGBTBREL", vec![
         MemoryField::new("MANDT", "CLNT", 3),
         MemoryField::new("BRELGUID", "CHAR", 32),
         MemoryField::new("RELTYPE", "CHAR", 4),
         MemoryField::new("INSTID_A", "CHAR", 70),
         MemoryField::new("TYPEID_A", "CHAR", 32),
         MemoryField::new("CATID_A", "CHAR", 2),
         MemoryField::new("INSTID_B", "CHAR", 70),
         MemoryField::new("TYPEID_B", "CHAR", 32),
         MemoryField::new("CATID_B", "CHAR", 2),
      ])
      .with_table("SOFFPHIO", vec![
         MemoryField::new("MANDT", "CLNT", 3),
         MemoryField::new("PH_CLASS", "CHAR", 10),
         MemoryField::new("PHIO_ID", "CHAR", 32),
         MemoryField::new("LOIO_ID", "CHAR", 32),
         MemoryField::new("CREA_TIME", "DEC", 15),
      ])
      .with_table("SOFFCONT1", vec![
         MemoryField::new("MANDT", "CLNT", 3),
         MemoryField::new("PHIO_ID", "CHAR", 32),
         MemoryField::new("SRTF2", "INT4", 10),
         MemoryField::new("CLUSTR", "INT2", 5),
         MemoryField::new("CLUSTD", "LRAW", 2550),
      ])
}

pub fn relationship(guid: &str, object_id: &str, document_id: &str) -> RfcRow {
   relationship_of_type(guid, "ATTA", object_id, document_id)
}

pub fn relationship_of_type(guid: &str, reltype: &str, object_id: &str, document_id: &str) -> RfcRow {
   row([
      ("MANDT", "100"),
      ("BRELGUID", guid),
      ("RELTYPE", reltype),
      ("INSTID_A", object_id),
      ("TYPEID_A", "BUS2081"),
      ("INSTID_B", document_id),
      ("TYPEID_B", "MESSAGE"),
   ])
}

pub fn document(phio_id: &str) -> RfcRow {
   row([
      ("MANDT", "100"),
      ("PH_CLASS", "SOFFPHIO"),
      ("PHIO_ID", phio_id),
      ("LOIO_ID", format!("L{phio_id}").as_str()),
      ("CREA_TIME", "20240102093000"),
   ])
}

pub fn content(phio_id: &str, part: u32) -> RfcRow {
   row([
      ("MANDT", "100"),
      ("PHIO_ID", phio_id),
      ("SRTF2", part.to_string().as_str()),
      ("CLUSTD", "DEADBEEF"),
   ])
}

pub fn connector(system: &MemorySystem) -> SapConnector<MemoryTransport> {
   SapConnector::new(system.transport(USER, &Password::new(PASSWORD)), "TST/100@memory")
}

pub fn target() -> ScanTarget {
   ScanTarget {
      system: "TST".to_string(),
      client: "100".to_string(),
      host:   "memory".to_string(),
   }
}

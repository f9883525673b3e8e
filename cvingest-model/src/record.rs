use cvingest_core::{IngestError, Result, XmlNode};

use crate::disassemble::disassemble;
use crate::entity::Entity;
use crate::models::{RcvMapping, VariationArchive};

pub const VARIATION_ARCHIVE_TAG: &str = "VariationArchive";
pub const CLINVAR_SET_TAG: &str = "ClinVarSet";

/// A second-level record of either release flavour.
#[derive(Debug, Clone, PartialEq)]
pub enum ReleaseRecord {
    VariationArchive(Box<VariationArchive>),
    RcvMapping(RcvMapping),
}

impl ReleaseRecord {
    ///
    /// Build the domain object for one record.
    ///
    /// # Arguments
    /// - tag: element name of the record
    /// - node: its generic tree
    ///
    pub fn build(tag: &str, node: XmlNode) -> Result<Self> {
        match tag {
            VARIATION_ARCHIVE_TAG => Ok(ReleaseRecord::VariationArchive(Box::new(
                VariationArchive::from_xml(node)?,
            ))),
            CLINVAR_SET_TAG => Ok(ReleaseRecord::RcvMapping(RcvMapping::from_xml(node)?)),
            other => Err(IngestError::UnknownShape(format!("record element <{}>", other))),
        }
    }

    /// Accession of the record, for logging.
    pub fn accession(&self) -> &str {
        match self {
            ReleaseRecord::VariationArchive(archive) => &archive.id,
            ReleaseRecord::RcvMapping(mapping) => &mapping.rcv_accession,
        }
    }

    /// The flat, ordered entity stream of this record.
    pub fn disassemble(&self) -> Result<Vec<Entity>> {
        match self {
            ReleaseRecord::VariationArchive(archive) => disassemble(archive),
            ReleaseRecord::RcvMapping(mapping) => Ok(vec![Entity::RcvMapping(mapping.clone())]),
        }
    }

    /// The whole record as a single nested entity.
    pub fn into_entity(self) -> Entity {
        match self {
            ReleaseRecord::VariationArchive(archive) => Entity::VariationArchive(*archive),
            ReleaseRecord::RcvMapping(mapping) => Entity::RcvMapping(mapping),
        }
    }
}

use serde::Serialize;

use crate::models::{
    ClinicalAssertion, ClinicalAssertionObservation, ClinicalAssertionTrait, ClinicalAssertionTraitSet,
    ClinicalAssertionVariation, Gene, GeneAssociation, RcvAccession, RcvAccessionClassification, RcvMapping,
    Submission, Submitter, Trait, TraitMapping, TraitSet, Variation, VariationArchive,
    VariationArchiveClassification,
};

///
/// One record handed to a sink, tagged with its `entity_type`.
///
/// After disassembly every variant holds only id references to the entities it used
/// to embed. In structured mode a whole [VariationArchive] travels as one entity.
///
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "entity_type", rename_all = "snake_case")]
pub enum Entity {
    Variation(Variation),
    Gene(Gene),
    GeneAssociation(GeneAssociation),
    Submitter(Submitter),
    Submission(Submission),
    ClinicalAssertionObservation(ClinicalAssertionObservation),
    ClinicalAssertionTraitSet(ClinicalAssertionTraitSet),
    ClinicalAssertionTrait(ClinicalAssertionTrait),
    ClinicalAssertion(ClinicalAssertion),
    ClinicalAssertionVariation(ClinicalAssertionVariation),
    TraitSet(TraitSet),
    Trait(Trait),
    TraitMapping(TraitMapping),
    RcvAccession(RcvAccession),
    RcvAccessionClassification(RcvAccessionClassification),
    VariationArchiveClassification(VariationArchiveClassification),
    VariationArchive(VariationArchive),
    RcvMapping(RcvMapping),
}

impl Entity {
    /// The `entity_type` tag, also used to name output files.
    pub fn entity_type(&self) -> &'static str {
        match self {
            Entity::Variation(_) => "variation",
            Entity::Gene(_) => "gene",
            Entity::GeneAssociation(_) => "gene_association",
            Entity::Submitter(_) => "submitter",
            Entity::Submission(_) => "submission",
            Entity::ClinicalAssertionObservation(_) => "clinical_assertion_observation",
            Entity::ClinicalAssertionTraitSet(_) => "clinical_assertion_trait_set",
            Entity::ClinicalAssertionTrait(_) => "clinical_assertion_trait",
            Entity::ClinicalAssertion(_) => "clinical_assertion",
            Entity::ClinicalAssertionVariation(_) => "clinical_assertion_variation",
            Entity::TraitSet(_) => "trait_set",
            Entity::Trait(_) => "trait",
            Entity::TraitMapping(_) => "trait_mapping",
            Entity::RcvAccession(_) => "rcv_accession",
            Entity::RcvAccessionClassification(_) => "rcv_accession_classification",
            Entity::VariationArchiveClassification(_) => "variation_archive_classification",
            Entity::VariationArchive(_) => "variation_archive",
            Entity::RcvMapping(_) => "rcv_mapping",
        }
    }

    /// Own id, for the entity types that have one.
    pub fn id(&self) -> Option<&str> {
        let id = match self {
            Entity::Variation(e) => &e.id,
            Entity::Gene(e) => &e.id,
            Entity::Submitter(e) => &e.id,
            Entity::Submission(e) => &e.id,
            Entity::ClinicalAssertionObservation(e) => &e.id,
            Entity::ClinicalAssertionTraitSet(e) => &e.id,
            Entity::ClinicalAssertionTrait(e) => &e.id,
            Entity::ClinicalAssertion(e) => &e.id,
            Entity::ClinicalAssertionVariation(e) => &e.id,
            Entity::TraitSet(e) => &e.id,
            Entity::Trait(e) => &e.id,
            Entity::RcvAccession(e) => &e.id,
            Entity::VariationArchive(e) => &e.id,
            Entity::RcvMapping(e) => &e.rcv_accession,
            Entity::GeneAssociation(_)
            | Entity::TraitMapping(_)
            | Entity::RcvAccessionClassification(_)
            | Entity::VariationArchiveClassification(_) => return None,
        };
        Some(id.as_str())
    }

    /// Whether the id was synthesized during ingestion rather than read from the source.
    pub fn has_generated_id(&self) -> bool {
        matches!(
            self,
            Entity::ClinicalAssertionObservation(_)
                | Entity::ClinicalAssertionTraitSet(_)
                | Entity::ClinicalAssertionTrait(_)
                | Entity::ClinicalAssertionVariation(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::json;

    #[rstest]
    fn test_entity_tag() {
        let entity = Entity::Gene(Gene {
            id: "672".to_string(),
            hgnc_id: Some("HGNC:1100".to_string()),
            symbol: Some("BRCA1".to_string()),
            full_name: None,
            vcv_id: "VCV000017661".to_string(),
        });
        assert_eq!(entity.entity_type(), "gene");
        assert_eq!(entity.id(), Some("672"));
        assert!(!entity.has_generated_id());
        assert_eq!(
            serde_json::to_value(&entity).unwrap(),
            json!({
                "entity_type": "gene",
                "id": "672",
                "hgnc_id": "HGNC:1100",
                "symbol": "BRCA1",
                "full_name": null,
                "vcv_id": "VCV000017661"
            })
        );
    }

    #[rstest]
    fn test_tag_matches_serde_name() {
        let entity = Entity::RcvMapping(RcvMapping {
            rcv_accession: "RCV1".to_string(),
            scv_accessions: vec![],
            trait_set_id: None,
        });
        let value = serde_json::to_value(&entity).unwrap();
        assert_eq!(value["entity_type"], json!(entity.entity_type()));
    }
}

//! Linearization of a composed record into an ordered entity stream.
//!
//! Embedded collections are emitted before the entity that embeds them, which then
//! keeps only their ids. The exceptions are a variation's gene associations and a
//! submission's variant tree: those point back at their parent and follow it. For a
//! [VariationArchive] the order is
//!
//! 1. the variation, then each gene followed by its association
//! 2. trait mappings
//! 3. trait sets, each preceded by its traits
//! 4. clinical assertions: submitters, submission, observations (each preceded by its
//!    trait set), the top-level trait set, the assertion, its variant tree
//! 5. RCVs, each preceded by its classifications
//! 6. archive classifications
//! 7. the archive itself
//!
//! Every reference is checked against what has already been emitted for the record,
//! as is the uniqueness of generated ids.

use std::collections::{HashMap, HashSet};

use cvingest_core::{IngestError, Result};

use crate::entity::Entity;
use crate::models::{
    ClinicalAssertion, ClinicalAssertionObservation, ClinicalAssertionTraitSet, RcvAccession, TraitSet,
    Variation, VariationArchive,
};

#[derive(Default)]
struct Disassembly {
    entities: Vec<Entity>,
    seen: HashMap<&'static str, HashSet<String>>,
    record: String,
}

impl Disassembly {
    fn new(record: &str) -> Self {
        Disassembly {
            record: record.to_string(),
            ..Default::default()
        }
    }

    fn emit(&mut self, entity: Entity) -> Result<()> {
        if let Some(id) = entity.id() {
            let fresh = self
                .seen
                .entry(entity.entity_type())
                .or_default()
                .insert(id.to_string());
            if !fresh && entity.has_generated_id() {
                return Err(IngestError::Inconsistent(format!(
                    "{}: {} id {} assigned twice",
                    self.record,
                    entity.entity_type(),
                    id
                )));
            }
        }
        self.entities.push(entity);
        Ok(())
    }

    /// Fail unless an entity of `entity_type` with this id was already emitted.
    fn require(&self, entity_type: &str, id: &str, referrer: &str) -> Result<()> {
        let known = self
            .seen
            .get(entity_type)
            .is_some_and(|ids| ids.contains(id));
        if known {
            Ok(())
        } else {
            Err(IngestError::Inconsistent(format!(
                "{}: {} refers to {} {} which was never emitted",
                self.record, referrer, entity_type, id
            )))
        }
    }

    fn require_all(&self, entity_type: &str, ids: &[String], referrer: &str) -> Result<()> {
        ids.iter()
            .try_for_each(|id| self.require(entity_type, id, referrer))
    }

    fn variation(&mut self, mut variation: Variation) -> Result<()> {
        let associations = std::mem::take(&mut variation.gene_associations);
        let variation_id = variation.id.clone();
        self.emit(Entity::Variation(variation))?;

        for mut association in associations {
            if let Some(gene) = association.gene.take() {
                self.emit(Entity::Gene(gene))?;
            }
            self.require("gene", &association.gene_id, "gene association")?;
            if association.variation_id != variation_id {
                return Err(IngestError::Inconsistent(format!(
                    "{}: gene association {} belongs to variation {}",
                    self.record, association.gene_id, association.variation_id
                )));
            }
            self.emit(Entity::GeneAssociation(association))?;
        }
        Ok(())
    }

    fn trait_set(&mut self, mut trait_set: TraitSet) -> Result<()> {
        for t in std::mem::take(&mut trait_set.traits) {
            self.emit(Entity::Trait(t))?;
        }
        self.require_all("trait", &trait_set.trait_ids, &format!("trait set {}", trait_set.id))?;
        self.emit(Entity::TraitSet(trait_set))
    }

    fn submitted_trait_set(&mut self, mut trait_set: ClinicalAssertionTraitSet) -> Result<()> {
        for t in std::mem::take(&mut trait_set.traits) {
            self.emit(Entity::ClinicalAssertionTrait(t))?;
        }
        self.require_all(
            "clinical_assertion_trait",
            &trait_set.trait_ids,
            &format!("trait set {}", trait_set.id),
        )?;
        self.emit(Entity::ClinicalAssertionTraitSet(trait_set))
    }

    fn observation(&mut self, mut observation: ClinicalAssertionObservation) -> Result<()> {
        if let Some(trait_set) = observation.clinical_assertion_trait_set.take() {
            self.submitted_trait_set(trait_set)?;
        }
        if let Some(id) = &observation.clinical_assertion_trait_set_id {
            self.require(
                "clinical_assertion_trait_set",
                id,
                &format!("observation {}", observation.id),
            )?;
        }
        self.emit(Entity::ClinicalAssertionObservation(observation))
    }

    fn clinical_assertion(&mut self, mut assertion: ClinicalAssertion) -> Result<()> {
        let referrer = format!("clinical assertion {}", assertion.id);

        for submitter in std::mem::take(&mut assertion.submitters) {
            self.emit(Entity::Submitter(submitter))?;
        }
        self.require_all("submitter", &assertion.submitter_ids, &referrer)?;

        if let Some(submission) = assertion.submission.take() {
            self.emit(Entity::Submission(submission))?;
        }
        self.require("submission", &assertion.submission_id, &referrer)?;

        for observation in std::mem::take(&mut assertion.clinical_assertion_observations) {
            self.observation(observation)?;
        }
        self.require_all(
            "clinical_assertion_observation",
            &assertion.clinical_assertion_observation_ids,
            &referrer,
        )?;

        if let Some(trait_set) = assertion.clinical_assertion_trait_set.take() {
            self.submitted_trait_set(trait_set)?;
        }
        if let Some(id) = &assertion.clinical_assertion_trait_set_id {
            self.require("clinical_assertion_trait_set", id, &referrer)?;
        }

        let variations = std::mem::take(&mut assertion.clinical_assertion_variations);
        let assertion_id = assertion.id.clone();
        self.emit(Entity::ClinicalAssertion(assertion))?;

        for variation in &variations {
            if variation.clinical_assertion_id != assertion_id {
                return Err(IngestError::Inconsistent(format!(
                    "{}: variation {} filed under {} instead of {}",
                    self.record, variation.id, variation.clinical_assertion_id, assertion_id
                )));
            }
        }
        // child ids point forward within the tree, check once it is complete
        let mut variation_ids = Vec::with_capacity(variations.len());
        for variation in variations {
            variation_ids.push((variation.id.clone(), variation.descendant_ids.clone()));
            self.emit(Entity::ClinicalAssertionVariation(variation))?;
        }
        for (id, descendants) in &variation_ids {
            self.require_all(
                "clinical_assertion_variation",
                descendants,
                &format!("variation {}", id),
            )?;
        }
        Ok(())
    }

    fn rcv_accession(&mut self, mut rcv: RcvAccession) -> Result<()> {
        for classification in std::mem::take(&mut rcv.classifications) {
            if classification.rcv_id != rcv.id {
                return Err(IngestError::Inconsistent(format!(
                    "{}: classification of {} found under {}",
                    self.record, classification.rcv_id, rcv.id
                )));
            }
            self.emit(Entity::RcvAccessionClassification(classification))?;
        }
        self.emit(Entity::RcvAccession(rcv))
    }

    fn variation_archive(&mut self, mut archive: VariationArchive) -> Result<()> {
        let referrer = format!("variation archive {}", archive.id);

        if let Some(variation) = archive.variation.take() {
            self.variation(variation)?;
        }
        self.require("variation", &archive.variation_id, &referrer)?;

        for mapping in std::mem::take(&mut archive.trait_mappings) {
            self.emit(Entity::TraitMapping(mapping))?;
        }

        for trait_set in std::mem::take(&mut archive.trait_sets) {
            self.trait_set(trait_set)?;
        }
        self.require_all("trait_set", &archive.trait_set_ids, &referrer)?;

        for assertion in std::mem::take(&mut archive.clinical_assertions) {
            self.clinical_assertion(assertion)?;
        }
        self.require_all("clinical_assertion", &archive.clinical_assertion_ids, &referrer)?;

        for rcv in std::mem::take(&mut archive.rcv_accessions) {
            self.rcv_accession(rcv)?;
        }
        self.require_all("rcv_accession", &archive.rcv_accession_ids, &referrer)?;

        for classification in std::mem::take(&mut archive.classifications) {
            self.emit(Entity::VariationArchiveClassification(classification))?;
        }

        self.emit(Entity::VariationArchive(archive))
    }
}

///
/// Flatten a composed archive into its ordered entity stream.
///
/// The input is left untouched.
///
/// # Errors
/// [IngestError::Inconsistent] if a reference or a generated id does not add up.
///
pub fn disassemble(archive: &VariationArchive) -> Result<Vec<Entity>> {
    let mut out = Disassembly::new(&archive.id);
    out.variation_archive(archive.clone())?;
    Ok(out.entities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::parse_node;
    use pretty_assertions::assert_eq;
    use rstest::*;

    const RECORD: &str = r#"<VariationArchive VariationID="17661" Accession="VCV000017661" Version="42" RecordType="classified">
        <RecordStatus>current</RecordStatus>
        <ClassifiedRecord>
          <SimpleAllele AlleleID="32700" VariationID="17661">
            <GeneList><Gene Symbol="BRCA1" GeneID="672" Source="submitted" RelationshipType="within single gene"/></GeneList>
          </SimpleAllele>
          <RCVList>
            <RCVAccession Accession="RCV000019283" Version="10">
              <ClassifiedConditionList TraitSetID="1"/>
              <RCVClassifications>
                <GermlineClassification><ReviewStatus>x</ReviewStatus><Description SubmissionCount="2">Pathogenic</Description></GermlineClassification>
              </RCVClassifications>
            </RCVAccession>
          </RCVList>
          <Classifications>
            <GermlineClassification NumberOfSubmissions="2" NumberOfSubmitters="2">
              <Description>Pathogenic</Description>
              <ConditionList><TraitSet ID="1" Type="Disease"><Trait ID="10" Type="Disease"/></TraitSet></ConditionList>
            </GermlineClassification>
          </Classifications>
          <ClinicalAssertionList>
            <ClinicalAssertion ID="1" SubmissionDate="2017-01-26">
              <ClinVarAccession Accession="SCV000000001" Version="1" OrgID="3"/>
              <Classification><GermlineClassification>Pathogenic</GermlineClassification></Classification>
              <ObservedInList><ObservedIn><Sample/></ObservedIn></ObservedInList>
              <SimpleAllele/>
              <TraitSet Type="Disease"><Trait Type="Disease"/></TraitSet>
            </ClinicalAssertion>
            <ClinicalAssertion ID="2" SubmissionDate="2018-01-01">
              <ClinVarAccession Accession="SCV000000002" Version="1" OrgID="4"/>
              <Classification><GermlineClassification>Pathogenic</GermlineClassification></Classification>
              <ObservedInList><ObservedIn><Sample/></ObservedIn></ObservedInList>
              <SimpleAllele/>
              <TraitSet Type="Disease"><Trait Type="Disease"/></TraitSet>
            </ClinicalAssertion>
          </ClinicalAssertionList>
          <TraitMappingList>
            <TraitMapping ClinicalAssertionID="1" TraitType="Disease" MappingType="Name" MappingValue="x" MappingRef="Preferred"/>
          </TraitMappingList>
        </ClassifiedRecord>
      </VariationArchive>"#;

    fn types(entities: &[Entity]) -> Vec<&'static str> {
        entities.iter().map(Entity::entity_type).collect()
    }

    #[rstest]
    fn test_entity_order() {
        let archive = VariationArchive::from_xml(parse_node(RECORD)).unwrap();
        let entities = disassemble(&archive).unwrap();

        let per_scv = [
            "submitter",
            "submission",
            "clinical_assertion_observation",
            "clinical_assertion_trait",
            "clinical_assertion_trait_set",
            "clinical_assertion",
            "clinical_assertion_variation",
        ];
        let mut expected = vec!["variation", "gene", "gene_association", "trait_mapping", "trait", "trait_set"];
        expected.extend(per_scv);
        expected.extend(per_scv);
        expected.extend([
            "rcv_accession_classification",
            "rcv_accession",
            "variation_archive_classification",
            "variation_archive",
        ]);
        assert_eq!(types(&entities), expected);
    }

    #[rstest]
    fn test_input_untouched_and_references_kept() {
        let archive = VariationArchive::from_xml(parse_node(RECORD)).unwrap();
        let before = archive.clone();
        let entities = disassemble(&archive).unwrap();
        assert_eq!(archive, before);

        let Some(Entity::VariationArchive(flat)) = entities.last() else {
            panic!("archive must come last");
        };
        assert!(flat.variation.is_none());
        assert!(flat.clinical_assertions.is_empty());
        assert_eq!(flat.clinical_assertion_ids, vec!["SCV000000001", "SCV000000002"]);
        assert_eq!(flat.rcv_accession_ids, vec!["RCV000019283"]);
        assert_eq!(flat.trait_set_ids, vec!["1"]);

        let value = serde_json::to_value(flat).unwrap();
        assert!(value.get("clinical_assertions").is_none());
        assert!(value.get("variation").is_none());
    }

    #[rstest]
    fn test_dangling_reference() {
        let mut archive = VariationArchive::from_xml(parse_node(RECORD)).unwrap();
        archive.clinical_assertions[0]
            .submitter_ids
            .push("999".to_string());
        assert!(matches!(
            disassemble(&archive),
            Err(IngestError::Inconsistent(_))
        ));
    }

    #[rstest]
    fn test_duplicate_generated_id() {
        let mut archive = VariationArchive::from_xml(parse_node(RECORD)).unwrap();
        let observation = archive.clinical_assertions[0].clinical_assertion_observations[0].clone();
        archive.clinical_assertions[0]
            .clinical_assertion_observations
            .push(observation);
        assert!(matches!(
            disassemble(&archive),
            Err(IngestError::Inconsistent(_))
        ));
    }
}

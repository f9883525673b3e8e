use cvingest_core::utils::{parse_count, sanitize_opt_date};
use cvingest_core::{IngestError, Result, XmlNode};
use log::debug;
use serde::Serialize;
use serde_json::Value;

use crate::models::clinical_assertion::{AssertionContext, ClinicalAssertion};
use crate::models::rcv::RcvAccession;
use crate::models::traits::{TraitMapping, TraitSet};
use crate::models::variation::Variation;
use crate::statement::{StatementFields, StatementType, legacy_interpretation, take_statements};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Classified,
    Included,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariationArchiveClassification {
    pub vcv_id: String,
    pub statement_type: StatementType,
    pub review_status: Option<String>,
    pub interpretation_description: Option<String>,
    pub num_submitters: Option<i64>,
    pub num_submissions: Option<i64>,
    pub date_created: Option<String>,
    pub date_last_evaluated: Option<String>,
    pub most_recent_submission: Option<String>,
    pub clinical_impact_assertion_type: Option<String>,
    pub clinical_impact_clinical_significance: Option<String>,
    pub content: Option<Value>,
}

impl VariationArchiveClassification {
    pub fn from_statement(fields: StatementFields, vcv_id: &str) -> Self {
        VariationArchiveClassification {
            vcv_id: vcv_id.to_string(),
            statement_type: fields.statement_type,
            review_status: fields.review_status,
            interpretation_description: fields.description,
            num_submitters: fields.num_submitters,
            num_submissions: fields.num_submissions,
            date_created: fields.date_created,
            date_last_evaluated: fields.date_last_evaluated,
            most_recent_submission: fields.most_recent_submission,
            clinical_impact_assertion_type: fields.clinical_impact_assertion_type,
            clinical_impact_clinical_significance: fields.clinical_impact_clinical_significance,
            content: fields.rest.into_content(),
        }
    }
}

/// A `VariationArchive` record with everything it contains.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariationArchive {
    pub id: String,
    pub name: Option<String>,
    pub version: Option<String>,
    pub variation_id: String,
    pub record_type: RecordType,
    pub date_created: Option<String>,
    pub date_last_updated: Option<String>,
    pub most_recent_submission: Option<String>,
    pub num_submissions: Option<i64>,
    pub num_submitters: Option<i64>,
    pub record_status: Option<String>,
    pub species: Option<String>,
    pub trait_set_ids: Vec<String>,
    pub clinical_assertion_ids: Vec<String>,
    pub rcv_accession_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variation: Option<Variation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trait_sets: Vec<TraitSet>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trait_mappings: Vec<TraitMapping>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub clinical_assertions: Vec<ClinicalAssertion>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rcv_accessions: Vec<RcvAccession>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub classifications: Vec<VariationArchiveClassification>,
    pub content: Option<Value>,
}

/// The record body and how it was labelled.
fn take_container(node: &mut XmlNode, vcv_id: &str) -> Result<(RecordType, &'static str, XmlNode)> {
    for (record_type, tag) in [
        (RecordType::Classified, "ClassifiedRecord"),
        (RecordType::Included, "IncludedRecord"),
        // pre-2024 name of ClassifiedRecord
        (RecordType::Classified, "InterpretedRecord"),
    ] {
        if let Some(container) = node.take_one(tag, vcv_id)? {
            return Ok((record_type, tag, container));
        }
    }
    Err(IngestError::UnknownShape(format!(
        "{} has neither ClassifiedRecord nor IncludedRecord",
        vcv_id
    )))
}

/// Archive-level statements in either layout, placeholders dropped.
fn take_archive_statements(container: &mut XmlNode, vcv_id: &str) -> Result<Vec<StatementFields>> {
    let statements = if let Some(mut list) = container.take_one("Classifications", vcv_id)? {
        let statements = take_statements(&mut list, vcv_id)?;
        if !list.is_empty() {
            container.push_child("Classifications", list);
        }
        statements
    } else if let Some(mut list) = container.take_one("Interpretations", vcv_id)? {
        let statements = list
            .take_one("Interpretation", vcv_id)?
            .map(|i| legacy_interpretation(i, vcv_id))
            .transpose()?;
        if !list.is_empty() {
            container.push_child("Interpretations", list);
        }
        statements.into_iter().collect()
    } else {
        Vec::new()
    };

    Ok(statements
        .into_iter()
        .filter(|s| {
            if s.is_placeholder() {
                debug!("Skipping placeholder {} in {}", s.statement_type.tag(), vcv_id);
            }
            !s.is_placeholder()
        })
        .collect())
}

/// Condition sets of every statement, first occurrence of an id wins.
fn take_trait_sets(statements: &mut [StatementFields], vcv_id: &str) -> Result<Vec<TraitSet>> {
    let mut trait_sets: Vec<TraitSet> = Vec::new();
    for statement in statements.iter_mut() {
        let Some(mut conditions) = statement.rest.take_one("ConditionList", vcv_id)? else {
            continue;
        };
        for node in conditions.take_list("TraitSet") {
            let trait_set = TraitSet::from_xml(node, vcv_id)?;
            if trait_sets.iter().all(|t| t.id != trait_set.id) {
                trait_sets.push(trait_set);
            }
        }
        if !conditions.is_empty() {
            statement.rest.push_child("ConditionList", conditions);
        }
    }
    Ok(trait_sets)
}

impl VariationArchive {
    ///
    /// Build a full archive record from a `VariationArchive` element.
    ///
    /// # Errors
    /// - [IngestError::UnknownShape] when the record body or its variation is missing
    /// - anything the nested constructors raise
    ///
    pub fn from_xml(mut node: XmlNode) -> Result<Self> {
        let id = node.take_attr("Accession").ok_or_else(|| {
            IngestError::UnknownShape("VariationArchive without Accession".to_string())
        })?;

        let (record_type, container_tag, mut container) = take_container(&mut node, &id)?;
        let variation = Variation::take_from(&mut container, &id)?;
        let variation_id = node
            .take_attr("VariationID")
            .unwrap_or_else(|| variation.id.clone());

        let trait_mappings = match container.take_one("TraitMappingList", &id)? {
            Some(mut list) => list
                .take_list("TraitMapping")
                .into_iter()
                .map(|m| TraitMapping::from_xml(m, &id))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let mut statements = take_archive_statements(&mut container, &id)?;
        let trait_sets = take_trait_sets(&mut statements, &id)?;

        let ctx = AssertionContext {
            variation_archive_id: &id,
            variation_id: &variation_id,
            trait_mappings: &trait_mappings,
        };
        let clinical_assertions = match container.take_one("ClinicalAssertionList", &id)? {
            Some(mut list) => list
                .take_list("ClinicalAssertion")
                .into_iter()
                .map(|ca| ClinicalAssertion::from_xml(ca, &ctx))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let rcv_accessions = match container.take_one("RCVList", &id)? {
            Some(mut list) => list
                .take_list("RCVAccession")
                .into_iter()
                .map(|rcv| RcvAccession::from_xml(rcv, &id, &variation_id))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let classifications = statements
            .into_iter()
            .map(|s| VariationArchiveClassification::from_statement(s, &id))
            .collect();

        if !container.is_empty() {
            node.push_child(container_tag, container);
        }
        // implied by the container
        node.take_attr("RecordType");

        Ok(VariationArchive {
            name: node.take_attr("VariationName"),
            version: node.take_attr("Version"),
            variation_id,
            record_type,
            date_created: sanitize_opt_date(node.take_attr("DateCreated"))?,
            date_last_updated: sanitize_opt_date(node.take_attr("DateLastUpdated"))?,
            most_recent_submission: sanitize_opt_date(node.take_attr("MostRecentSubmission"))?,
            num_submissions: parse_count(node.take_attr("NumberOfSubmissions")),
            num_submitters: parse_count(node.take_attr("NumberOfSubmitters")),
            record_status: node.take_child_text("RecordStatus", &id)?,
            species: node.take_child_text("Species", &id)?,
            trait_set_ids: trait_sets.iter().map(|t| t.id.clone()).collect(),
            clinical_assertion_ids: clinical_assertions.iter().map(|c| c.id.clone()).collect(),
            rcv_accession_ids: rcv_accessions.iter().map(|r| r.id.clone()).collect(),
            variation: Some(variation),
            trait_sets,
            trait_mappings,
            clinical_assertions,
            rcv_accessions,
            classifications,
            content: node.into_content(),
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::parse_node;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn archive(body: &str) -> XmlNode {
        parse_node(&format!(
            r#"<VariationArchive RecordType="classified" VariationID="17661" VariationName="BRCA1 del" Accession="VCV000017661" Version="42" NumberOfSubmitters="2" NumberOfSubmissions="2" DateCreated="2016-10-30" DateLastUpdated="2024-02-20" MostRecentSubmission="2023-11-24">
                 <RecordStatus>current</RecordStatus>
                 <Species>Homo sapiens</Species>
                 {}
               </VariationArchive>"#,
            body
        ))
    }

    #[rstest]
    fn test_classified_record() {
        let va = VariationArchive::from_xml(archive(
            r#"<ClassifiedRecord>
                 <SimpleAllele AlleleID="32700" VariationID="17661"><Name>del</Name></SimpleAllele>
                 <Classifications>
                   <SomaticClinicalImpact NumberOfSubmissions="1" NumberOfSubmitters="1">
                     <ReviewStatus>criteria provided, single submitter</ReviewStatus>
                     <Description ClinicalImpactAssertionType="diagnostic" ClinicalImpactClinicalSignificance="supports diagnosis">Tier I - Strong</Description>
                     <ConditionList>
                       <TraitSet ID="2" Type="Disease"><Trait ID="20" Type="Disease"/></TraitSet>
                     </ConditionList>
                   </SomaticClinicalImpact>
                   <GermlineClassification NumberOfSubmissions="1" NumberOfSubmitters="1">
                     <ReviewStatus>no assertion criteria provided</ReviewStatus>
                     <Description>Pathogenic</Description>
                     <ConditionList>
                       <TraitSet ID="1" Type="Disease"><Trait ID="10" Type="Disease"/></TraitSet>
                       <TraitSet ID="2" Type="Disease"><Trait ID="20" Type="Disease"/></TraitSet>
                     </ConditionList>
                   </GermlineClassification>
                 </Classifications>
                 <DeletedSCVList><SCV Accession="SCV000000001"/></DeletedSCVList>
               </ClassifiedRecord>"#,
        ))
        .unwrap();

        assert_eq!(va.id, "VCV000017661");
        assert_eq!(va.record_type, RecordType::Classified);
        assert_eq!(va.variation_id, "17661");
        assert_eq!(va.name.as_deref(), Some("BRCA1 del"));
        assert_eq!(va.num_submitters, Some(2));
        assert_eq!(va.species.as_deref(), Some("Homo sapiens"));
        assert_eq!(va.most_recent_submission.as_deref(), Some("2023-11-24"));
        assert_eq!(va.variation.as_ref().unwrap().allele_id.as_deref(), Some("32700"));

        let types: Vec<StatementType> = va.classifications.iter().map(|c| c.statement_type).collect();
        assert_eq!(
            types,
            vec![StatementType::GermlineClassification, StatementType::SomaticClinicalImpact]
        );
        assert_eq!(va.trait_set_ids, vec!["1", "2"]);
        assert!(va.content.unwrap().get("ClassifiedRecord").is_some());
    }

    #[rstest]
    fn test_included_record_placeholder() {
        let va = VariationArchive::from_xml(archive(
            r#"<IncludedRecord>
                 <SimpleAllele VariationID="17661"/>
                 <Classifications>
                   <GermlineClassification NumberOfSubmissions="0" NumberOfSubmitters="0">
                     <ReviewStatus>no classification for the single variant</ReviewStatus>
                     <Description>no classification for the single variant</Description>
                   </GermlineClassification>
                 </Classifications>
                 <SubmittedClassificationList><SCV Accession="SCV000000002" Version="1"/></SubmittedClassificationList>
               </IncludedRecord>"#,
        ))
        .unwrap();
        assert_eq!(va.record_type, RecordType::Included);
        assert!(va.classifications.is_empty());
        assert!(va.clinical_assertions.is_empty());
        assert!(va.rcv_accessions.is_empty());
    }

    #[rstest]
    fn test_unknown_record_shape() {
        let err = VariationArchive::from_xml(archive("<SomethingElse/>")).unwrap_err();
        match err {
            IngestError::UnknownShape(msg) => assert!(msg.contains("VCV000017661")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[rstest]
    fn test_legacy_interpreted_record() {
        let va = VariationArchive::from_xml(archive(
            r#"<InterpretedRecord>
                 <SimpleAllele VariationID="17661"/>
                 <Interpretations>
                   <Interpretation Type="Clinical significance" NumberOfSubmissions="2" NumberOfSubmitters="2" DateLastEvaluated="2015-01-01">
                     <Description>Pathogenic</Description>
                   </Interpretation>
                 </Interpretations>
               </InterpretedRecord>"#,
        ))
        .unwrap();
        assert_eq!(va.record_type, RecordType::Classified);
        assert_eq!(va.classifications.len(), 1);
        assert_eq!(
            va.classifications[0].interpretation_description.as_deref(),
            Some("Pathogenic")
        );
    }
}

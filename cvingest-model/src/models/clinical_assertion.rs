use cvingest_core::utils::sanitize_opt_date;
use cvingest_core::{IngestError, Result, XmlNode};
use serde::Serialize;
use serde_json::Value;

use crate::models::submitter::{Submission, Submitter};
use crate::models::traits::{ClinicalAssertionTraitSet, TraitContext, TraitMapping};
use crate::statement::{StatementFields, StatementType, legacy_interpretation, take_single_statement};
use crate::variant_tree::{SubmittedVariantNode, VariantKind, assign_submission_ids, take_variant_nodes};

/// One `ObservedIn` entry of a submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicalAssertionObservation {
    pub id: String,
    pub clinical_assertion_trait_set_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinical_assertion_trait_set: Option<ClinicalAssertionTraitSet>,
    pub content: Option<Value>,
}

/// A node of the variant tree a submitter described.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicalAssertionVariation {
    pub id: String,
    pub clinical_assertion_id: String,
    pub subclass_type: VariantKind,
    pub variation_type: Option<String>,
    pub child_ids: Vec<String>,
    pub descendant_ids: Vec<String>,
    pub content: Option<Value>,
}

impl ClinicalAssertionVariation {
    fn from_submitted(variant: SubmittedVariantNode, assertion_id: &str) -> Result<Self> {
        let mut node = variant.node;
        let variation_type = match node.take_child_text("VariantType", &variant.id)? {
            Some(t) => Some(t),
            None => node.take_child_text("VariationType", &variant.id)?,
        };
        Ok(ClinicalAssertionVariation {
            id: variant.id,
            clinical_assertion_id: assertion_id.to_string(),
            subclass_type: variant.kind,
            variation_type,
            child_ids: variant.child_ids,
            descendant_ids: variant.descendant_ids,
            content: node.into_content(),
        })
    }
}

/// The archive a submission belongs to.
#[derive(Debug, Clone, Copy)]
pub struct AssertionContext<'a> {
    pub variation_archive_id: &'a str,
    pub variation_id: &'a str,
    pub trait_mappings: &'a [TraitMapping],
}

/// A submitted clinical assertion (SCV).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicalAssertion {
    pub id: String,
    pub internal_id: Option<String>,
    pub version: Option<String>,
    pub title: Option<String>,
    pub local_key: Option<String>,
    pub assertion_type: Option<String>,
    pub date_created: Option<String>,
    pub date_last_updated: Option<String>,
    pub submission_date: Option<String>,
    pub submitted_assembly: Option<String>,
    pub record_status: Option<String>,
    pub review_status: Option<String>,
    pub interpretation_date_last_evaluated: Option<String>,
    pub interpretation_description: Option<String>,
    pub interpretation_comments: Vec<String>,
    pub statement_type: Option<StatementType>,
    pub clinical_impact_assertion_type: Option<String>,
    pub clinical_impact_clinical_significance: Option<String>,
    pub submission_names: Vec<String>,
    pub variation_id: String,
    pub variation_archive_id: String,
    pub submitter_id: String,
    pub submitter_ids: Vec<String>,
    pub submission_id: String,
    pub clinical_assertion_observation_ids: Vec<String>,
    pub clinical_assertion_trait_set_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub submitters: Vec<Submitter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission: Option<Submission>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub clinical_assertion_observations: Vec<ClinicalAssertionObservation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinical_assertion_trait_set: Option<ClinicalAssertionTraitSet>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub clinical_assertion_variations: Vec<ClinicalAssertionVariation>,
    pub content: Option<Value>,
}

/// Classification of a submission, in either the current or the pre-2024 layout.
struct SubmittedClassification {
    review_status: Option<String>,
    date_last_evaluated: Option<String>,
    comments: Vec<String>,
    statement: Option<StatementFields>,
}

fn take_classification(node: &mut XmlNode, context: &str) -> Result<SubmittedClassification> {
    if let Some(mut classification) = node.take_one("Classification", context)? {
        let review_status = classification.take_child_text("ReviewStatus", context)?;
        let mut date_last_evaluated = classification.take_attr("DateLastEvaluated");
        let comments = classification.take_child_texts("Comment");
        let mut statement = take_single_statement(&mut classification, context)?;
        if let Some(s) = statement.as_mut() {
            if s.date_last_evaluated.is_some() {
                date_last_evaluated = s.date_last_evaluated.take();
            }
            if !s.rest.is_empty() {
                classification.push_child(s.statement_type.tag(), std::mem::take(&mut s.rest));
            }
        }
        if !classification.is_empty() {
            node.push_child("Classification", classification);
        }
        return Ok(SubmittedClassification {
            review_status,
            date_last_evaluated: sanitize_opt_date(date_last_evaluated)?,
            comments,
            statement,
        });
    }

    // pre-2024: Interpretation next to a top-level ReviewStatus
    let review_status = node.take_child_text("ReviewStatus", context)?;
    let Some(interpretation) = node.take_one("Interpretation", context)? else {
        return Ok(SubmittedClassification {
            review_status,
            date_last_evaluated: None,
            comments: Vec::new(),
            statement: None,
        });
    };
    let mut statement = legacy_interpretation(interpretation, context)?;
    let comments = statement.rest.take_child_texts("Comment");
    if !statement.rest.is_empty() {
        node.push_child("Interpretation", std::mem::take(&mut statement.rest));
    }
    Ok(SubmittedClassification {
        review_status,
        date_last_evaluated: statement.date_last_evaluated.take(),
        comments,
        statement: Some(statement),
    })
}

impl ClinicalAssertion {
    ///
    /// Build an assertion from a `ClinicalAssertionList/ClinicalAssertion` element.
    ///
    /// # Arguments
    /// - node: the `ClinicalAssertion` element
    /// - ctx: owning archive accession and variation, and the archive's trait mappings
    ///
    /// # Errors
    /// - [IngestError::UnknownShape] without `ClinVarAccession` or a submission date
    /// - [IngestError::UnexpectedCardinality] for two statement types or two root variants
    ///
    pub fn from_xml(mut node: XmlNode, ctx: &AssertionContext) -> Result<Self> {
        let vcv_id = ctx.variation_archive_id;

        let mut accession = node.take_one("ClinVarAccession", vcv_id)?.ok_or_else(|| {
            IngestError::UnknownShape(format!("ClinicalAssertion without ClinVarAccession in {}", vcv_id))
        })?;
        let id = accession.take_attr("Accession").ok_or_else(|| {
            IngestError::UnknownShape(format!("ClinVarAccession without Accession in {}", vcv_id))
        })?;
        let version = accession.take_attr("Version");
        let submitter = Submitter::take_from(&mut accession, &id)?;

        let internal_id = node.take_attr("ID");
        let submission_date = node.take_attr("SubmissionDate");
        let date_created = node
            .take_attr("DateCreated")
            .or_else(|| accession.take_attr("DateCreated"));
        let date_last_updated = node
            .take_attr("DateLastUpdated")
            .or_else(|| accession.take_attr("DateUpdated"));
        if !accession.is_empty() {
            node.push_child("ClinVarAccession", accession);
        }

        let (local_key, title, submitted_assembly) = match node.take_one("ClinVarSubmissionID", &id)? {
            Some(mut submission_id) => {
                let fields = (
                    submission_id.take_attr("localKey"),
                    submission_id.take_attr("title"),
                    submission_id.take_attr("submittedAssembly"),
                );
                if !submission_id.is_empty() {
                    node.push_child("ClinVarSubmissionID", submission_id);
                }
                fields
            }
            None => (None, None, None),
        };

        let additional = match node.take_one("AdditionalSubmitters", &id)? {
            Some(mut list) => {
                let submitters = list
                    .take_list("SubmitterDescription")
                    .into_iter()
                    .map(|s| Submitter::from_description(s, &id))
                    .collect::<Result<Vec<_>>>()?;
                if !list.is_empty() {
                    node.push_child("AdditionalSubmitters", list);
                }
                submitters
            }
            None => Vec::new(),
        };
        let submission = Submission::new(&submitter, &additional, submission_date, &id)?;

        let record_status = node.take_child_text("RecordStatus", &id)?;
        let classification = take_classification(&mut node, &id)?;
        let assertion_type = node.take_child_text("Assertion", &id)?;
        let submission_names = match node.take_one("SubmissionNameList", &id)? {
            Some(mut names) => {
                let submission_names = names.take_child_texts("SubmissionName");
                if !names.is_empty() {
                    node.push_child("SubmissionNameList", names);
                }
                submission_names
            }
            None => Vec::new(),
        };

        let trait_ctx = TraitContext {
            accession: &id,
            internal_id: internal_id.as_deref(),
            mappings: ctx.trait_mappings,
        };
        let mut trait_counter = 0;

        let mut observations = Vec::new();
        if let Some(mut list) = node.take_one("ObservedInList", &id)? {
            for (i, mut observed) in list.take_list("ObservedIn").into_iter().enumerate() {
                let observation_id = format!("{}.{}", id, i);
                let trait_set = match observed.take_one("TraitSet", &observation_id)? {
                    Some(ts) => Some(ClinicalAssertionTraitSet::from_xml(
                        ts,
                        observation_id.clone(),
                        &trait_ctx,
                        &mut trait_counter,
                    )?),
                    None => None,
                };
                observations.push(ClinicalAssertionObservation {
                    id: observation_id,
                    clinical_assertion_trait_set_id: trait_set.as_ref().map(|t| t.id.clone()),
                    clinical_assertion_trait_set: trait_set,
                    content: observed.into_content(),
                });
            }
            if !list.is_empty() {
                node.push_child("ObservedInList", list);
            }
        }

        let trait_set = match node.take_one("TraitSet", &id)? {
            Some(ts) => Some(ClinicalAssertionTraitSet::from_xml(
                ts,
                id.clone(),
                &trait_ctx,
                &mut trait_counter,
            )?),
            None => None,
        };

        let mut roots = take_variant_nodes(&mut node, &id)?;
        if roots.len() > 1 {
            return Err(IngestError::cardinality(&id, "root variant in submission"));
        }
        let variations = match roots.pop() {
            Some(root) => assign_submission_ids(root, &id)?
                .into_iter()
                .map(|v| ClinicalAssertionVariation::from_submitted(v, &id))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let mut submitters = vec![submitter];
        submitters.extend(additional);

        let SubmittedClassification {
            review_status,
            date_last_evaluated,
            comments,
            statement,
        } = classification;
        let (statement_type, description, impact_type, impact_significance) = match statement {
            Some(s) => (
                Some(s.statement_type),
                s.description,
                s.clinical_impact_assertion_type,
                s.clinical_impact_clinical_significance,
            ),
            None => (None, None, None, None),
        };

        Ok(ClinicalAssertion {
            internal_id,
            version,
            title,
            local_key,
            assertion_type,
            date_created: sanitize_opt_date(date_created)?,
            date_last_updated: sanitize_opt_date(date_last_updated)?,
            submission_date: Some(submission.submission_date.clone()),
            submitted_assembly,
            record_status,
            review_status,
            interpretation_date_last_evaluated: date_last_evaluated,
            interpretation_description: description,
            interpretation_comments: comments,
            statement_type,
            clinical_impact_assertion_type: impact_type,
            clinical_impact_clinical_significance: impact_significance,
            submission_names,
            variation_id: ctx.variation_id.to_string(),
            variation_archive_id: vcv_id.to_string(),
            submitter_id: submitters[0].id.clone(),
            submitter_ids: submitters.iter().map(|s| s.id.clone()).collect(),
            submission_id: submission.id.clone(),
            clinical_assertion_observation_ids: observations.iter().map(|o| o.id.clone()).collect(),
            clinical_assertion_trait_set_id: trait_set.as_ref().map(|t| t.id.clone()),
            submitters,
            submission: Some(submission),
            clinical_assertion_observations: observations,
            clinical_assertion_trait_set: trait_set,
            clinical_assertion_variations: variations,
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
    use serde_json::json;

    const SCV: &str = r#"<ClinicalAssertion ID="20155" SubmissionDate="2017-01-26" DateLastUpdated="2017-02-06" DateCreated="2013-04-04">
        <ClinVarSubmissionID localKey="113705.0003_BREAST-OVARIAN CANCER" title="BRCA1, 4-BP DEL" submittedAssembly="GRCh37"/>
        <ClinVarAccession Accession="SCV000020155" Type="SCV" Version="3" SubmitterName="OMIM" OrgID="3" OrganizationCategory="resource" OrgAbbreviation="OMIM"/>
        <AdditionalSubmitters><SubmitterDescription OrgID="505" SubmitterName="Lab B" Type="behalf"/></AdditionalSubmitters>
        <RecordStatus>current</RecordStatus>
        <Classification DateLastEvaluated="2000-05-01">
          <ReviewStatus>no assertion criteria provided</ReviewStatus>
          <GermlineClassification>Pathogenic</GermlineClassification>
          <Comment>Seen in two families.</Comment>
        </Classification>
        <Assertion>variation to disease</Assertion>
        <ObservedInList>
          <ObservedIn>
            <Sample><Origin>germline</Origin></Sample>
            <TraitSet Type="Finding"><Trait Type="Finding"><Name><ElementValue Type="Preferred">Tumor</ElementValue></Name></Trait></TraitSet>
          </ObservedIn>
          <ObservedIn><Sample><Origin>unknown</Origin></Sample></ObservedIn>
        </ObservedInList>
        <Haplotype>
          <SimpleAllele><VariantType>Deletion</VariantType></SimpleAllele>
          <SimpleAllele><VariantType>single nucleotide variant</VariantType></SimpleAllele>
        </Haplotype>
        <TraitSet Type="Disease">
          <Trait Type="Disease"><Name><ElementValue Type="Preferred">Breast cancer</ElementValue></Name></Trait>
        </TraitSet>
        <SubmissionNameList><SubmissionName>OMIM_2017</SubmissionName></SubmissionNameList>
      </ClinicalAssertion>"#;

    fn ctx(mappings: &[TraitMapping]) -> AssertionContext<'_> {
        AssertionContext {
            variation_archive_id: "VCV000017661",
            variation_id: "17661",
            trait_mappings: mappings,
        }
    }

    #[rstest]
    fn test_assertion_fields() {
        let ca = ClinicalAssertion::from_xml(parse_node(SCV), &ctx(&[])).unwrap();
        assert_eq!(ca.id, "SCV000020155");
        assert_eq!(ca.internal_id.as_deref(), Some("20155"));
        assert_eq!(ca.version.as_deref(), Some("3"));
        assert_eq!(ca.title.as_deref(), Some("BRCA1, 4-BP DEL"));
        assert_eq!(ca.submitted_assembly.as_deref(), Some("GRCh37"));
        assert_eq!(ca.record_status.as_deref(), Some("current"));
        assert_eq!(ca.review_status.as_deref(), Some("no assertion criteria provided"));
        assert_eq!(ca.statement_type, Some(StatementType::GermlineClassification));
        assert_eq!(ca.interpretation_description.as_deref(), Some("Pathogenic"));
        assert_eq!(ca.interpretation_date_last_evaluated.as_deref(), Some("2000-05-01"));
        assert_eq!(ca.interpretation_comments, vec!["Seen in two families."]);
        assert_eq!(ca.assertion_type.as_deref(), Some("variation to disease"));
        assert_eq!(ca.submission_names, vec!["OMIM_2017"]);
        assert_eq!(ca.variation_archive_id, "VCV000017661");
        assert_eq!(ca.submitter_ids, vec!["3", "505"]);
        assert_eq!(ca.submission_id, "3.2017-01-26");
        assert_eq!(ca.content, Some(json!({"ClinVarAccession": {"@Type": "SCV"}})));
    }

    #[rstest]
    fn test_assertion_ids() {
        let ca = ClinicalAssertion::from_xml(parse_node(SCV), &ctx(&[])).unwrap();
        assert_eq!(
            ca.clinical_assertion_observation_ids,
            vec!["SCV000020155.0", "SCV000020155.1"]
        );
        let observed = ca.clinical_assertion_observations[0]
            .clinical_assertion_trait_set
            .as_ref()
            .unwrap();
        assert_eq!(observed.id, "SCV000020155.0");
        assert_eq!(observed.trait_ids, vec!["SCV000020155.0"]);
        assert_eq!(ca.clinical_assertion_observations[1].clinical_assertion_trait_set_id, None);

        // trait numbering continues across trait sets
        let top = ca.clinical_assertion_trait_set.as_ref().unwrap();
        assert_eq!(top.id, "SCV000020155");
        assert_eq!(top.trait_ids, vec!["SCV000020155.1"]);

        let variation_ids: Vec<&str> = ca
            .clinical_assertion_variations
            .iter()
            .map(|v| v.id.as_str())
            .collect();
        assert_eq!(
            variation_ids,
            vec!["SCV000020155.0", "SCV000020155.1", "SCV000020155.2"]
        );
        assert_eq!(
            ca.clinical_assertion_variations[1].variation_type.as_deref(),
            Some("Deletion")
        );
        assert!(
            ca.clinical_assertion_variations
                .iter()
                .all(|v| v.clinical_assertion_id == "SCV000020155")
        );
    }

    #[rstest]
    #[case(
        "</ObservedInList>",
        "<Comment>Family history only</Comment></ObservedInList>",
        json!({"ObservedInList": {"Comment": {"$": "Family history only"}}})
    )]
    #[case(
        "<SubmissionNameList>",
        r#"<SubmissionNameList Type="batch">"#,
        json!({"SubmissionNameList": {"@Type": "batch"}})
    )]
    fn test_list_leftovers_kept_in_content(#[case] from: &str, #[case] to: &str, #[case] kept: Value) {
        let ca = ClinicalAssertion::from_xml(parse_node(&SCV.replace(from, to)), &ctx(&[])).unwrap();
        assert_eq!(ca.clinical_assertion_observation_ids.len(), 2);
        assert_eq!(ca.submission_names, vec!["OMIM_2017"]);
        let content = ca.content.unwrap();
        let (key, value) = kept.as_object().unwrap().iter().next().unwrap();
        assert_eq!(&content[key], value);
    }

    #[rstest]
    fn test_two_statement_types_rejected() {
        let xml = SCV.replace(
            "<GermlineClassification>Pathogenic</GermlineClassification>",
            "<GermlineClassification>Pathogenic</GermlineClassification><SomaticClinicalImpact>Tier I</SomaticClinicalImpact>",
        );
        let err = ClinicalAssertion::from_xml(parse_node(&xml), &ctx(&[])).unwrap_err();
        assert!(matches!(err, IngestError::UnexpectedCardinality { .. }));
        assert!(err.to_string().contains("SCV000020155"));
    }

    #[rstest]
    fn test_two_root_variants_rejected() {
        let xml = SCV.replace(
            "<SubmissionNameList>",
            "<Haplotype><SimpleAllele/></Haplotype><SubmissionNameList>",
        );
        assert!(matches!(
            ClinicalAssertion::from_xml(parse_node(&xml), &ctx(&[])),
            Err(IngestError::UnexpectedCardinality { .. })
        ));
    }

    #[rstest]
    fn test_legacy_interpretation() {
        let ca = ClinicalAssertion::from_xml(
            parse_node(
                r#"<ClinicalAssertion ID="7" SubmissionDate="2012-08-09">
                     <ClinVarAccession Accession="SCV000000007" Version="1" OrgID="9"/>
                     <ReviewStatus>criteria provided, single submitter</ReviewStatus>
                     <Interpretation DateLastEvaluated="2012-01-01">
                       <Description>Benign</Description>
                       <Comment>old style</Comment>
                     </Interpretation>
                   </ClinicalAssertion>"#,
            ),
            &ctx(&[]),
        )
        .unwrap();
        assert_eq!(ca.statement_type, Some(StatementType::GermlineClassification));
        assert_eq!(ca.interpretation_description.as_deref(), Some("Benign"));
        assert_eq!(ca.interpretation_date_last_evaluated.as_deref(), Some("2012-01-01"));
        assert_eq!(ca.review_status.as_deref(), Some("criteria provided, single submitter"));
        assert_eq!(ca.interpretation_comments, vec!["old style"]);
        assert!(ca.clinical_assertion_variations.is_empty());
    }

    #[rstest]
    fn test_missing_accession() {
        assert!(matches!(
            ClinicalAssertion::from_xml(
                parse_node(r#"<ClinicalAssertion ID="1" SubmissionDate="2020-01-01"/>"#),
                &ctx(&[])
            ),
            Err(IngestError::UnknownShape(_))
        ));
    }
}

//! Conditions: normalized traits and trait sets of an archive, their per-submission
//! counterparts, and the trait mappings linking the two.

use cvingest_core::{IngestError, Result, XmlNode};
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

/// A cross-reference, optionally tied to the trait field it was found under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XRef {
    pub db: String,
    pub id: String,
    #[serde(rename = "type")]
    pub xref_type: Option<String>,
    pub ref_field: Option<String>,
    pub ref_field_element: Option<String>,
}

impl XRef {
    pub fn from_xml(mut node: XmlNode, ref_field: Option<&str>, ref_field_element: Option<&str>) -> Option<Self> {
        let (Some(db), Some(id)) = (node.take_attr("DB"), node.take_attr("ID")) else {
            warn!("Skipping XRef without DB or ID: {}", node.to_json());
            return None;
        };
        Some(XRef {
            db,
            id,
            xref_type: node.take_attr("Type"),
            ref_field: ref_field.map(str::to_string),
            ref_field_element: ref_field_element.map(str::to_string),
        })
    }
}

fn take_xrefs(node: &mut XmlNode, ref_field: Option<&str>, ref_field_element: Option<&str>) -> Vec<XRef> {
    node.take_list("XRef")
        .into_iter()
        .filter_map(|x| XRef::from_xml(x, ref_field, ref_field_element))
        .collect()
}

fn first_medgen(xrefs: &[XRef]) -> Option<String> {
    xrefs.iter().find(|x| x.db == "MedGen").map(|x| x.id.clone())
}

/// Preferred and alternate values of a repeated `Name` or `Symbol` element.
#[derive(Debug, Default)]
struct ElementValues {
    preferred: Option<String>,
    alternates: Vec<String>,
    xrefs: Vec<XRef>,
}

///
/// Read every `<tag><ElementValue Type=...>` child of `node`.
///
/// # Arguments
/// - tag: `Name` or `Symbol`
/// - fields: output field names for the preferred and the alternate values, recorded on
///   the xrefs found next to each value
/// - context: id used in error messages
///
/// # Errors
/// [IngestError::UnexpectedCardinality] for a second preferred value.
///
fn take_element_values(
    node: &mut XmlNode,
    tag: &str,
    fields: (&str, &str),
    context: &str,
) -> Result<ElementValues> {
    let mut values = ElementValues::default();
    let mut leftovers = Vec::new();

    for mut child in node.take_list(tag) {
        let Some(mut element) = child.take_one("ElementValue", context)? else {
            leftovers.push(child);
            continue;
        };
        let value_type = element.take_attr("Type");
        let Some(value) = element.take_text() else {
            child.push_child("ElementValue", element);
            leftovers.push(child);
            continue;
        };

        let field = if value_type.as_deref() == Some("Preferred") {
            if values.preferred.is_some() {
                return Err(IngestError::cardinality(context, format!("preferred {}", tag)));
            }
            values.preferred = Some(value.clone());
            fields.0
        } else {
            values.alternates.push(value.clone());
            fields.1
        };
        values.xrefs.extend(take_xrefs(&mut child, Some(field), Some(&value)));

        if !element.is_empty() {
            child.push_child("ElementValue", element);
        }
        if !child.is_empty() {
            leftovers.push(child);
        }
    }

    for leftover in leftovers {
        node.push_child(tag, leftover);
    }
    Ok(values)
}

/// A normalized condition, as attached to archive-level classifications.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trait {
    pub id: String,
    #[serde(rename = "type")]
    pub trait_type: Option<String>,
    pub name: Option<String>,
    pub alternate_names: Vec<String>,
    pub symbol: Option<String>,
    pub alternate_symbols: Vec<String>,
    pub medgen_id: Option<String>,
    pub public_definition: Option<String>,
    pub gene_reviews_short: Option<String>,
    pub ghr_links: Vec<String>,
    pub keywords: Vec<String>,
    pub mode_of_inheritance: Option<String>,
    pub gard_id: Option<String>,
    pub disease_mechanism: Option<String>,
    pub disease_mechanism_id: Option<String>,
    pub attribute_content: Vec<Value>,
    pub xrefs: Vec<XRef>,
    pub content: Option<Value>,
}

impl Trait {
    pub fn from_xml(mut node: XmlNode, context: &str) -> Result<Self> {
        let id = node.take_attr("ID").ok_or_else(|| {
            IngestError::UnknownShape(format!("Trait without ID in {}", context))
        })?;
        let trait_context = format!("{} trait {}", context, id);

        let names = take_element_values(&mut node, "Name", ("name", "alternate_names"), &trait_context)?;
        let symbols = take_element_values(
            &mut node,
            "Symbol",
            ("symbol", "alternate_symbols"),
            &trait_context,
        )?;

        let mut xrefs = names.xrefs;
        xrefs.extend(symbols.xrefs);

        let mut trait_ = Trait {
            id,
            trait_type: node.take_attr("Type"),
            name: names.preferred,
            alternate_names: names.alternates,
            symbol: symbols.preferred,
            alternate_symbols: symbols.alternates,
            medgen_id: None,
            public_definition: None,
            gene_reviews_short: None,
            ghr_links: Vec::new(),
            keywords: Vec::new(),
            mode_of_inheritance: None,
            gard_id: None,
            disease_mechanism: None,
            disease_mechanism_id: None,
            attribute_content: Vec::new(),
            xrefs,
            content: None,
        };

        for set in node.take_list("AttributeSet") {
            trait_.take_attribute_set(set, &trait_context)?;
        }

        let own_xrefs = take_xrefs(&mut node, None, None);
        trait_.medgen_id = first_medgen(&own_xrefs);
        trait_.xrefs.extend(own_xrefs);
        trait_.content = node.into_content();
        Ok(trait_)
    }

    ///
    /// Route one `AttributeSet` into the matching field. Singular fields keep the first
    /// value seen; anything unrecognised (or left over) is kept in `attribute_content`.
    ///
    fn take_attribute_set(&mut self, mut set: XmlNode, context: &str) -> Result<()> {
        let Some(mut attribute) = set.take_one("Attribute", context)? else {
            self.xrefs.extend(take_xrefs(&mut set, None, None));
            if !set.is_empty() {
                self.attribute_content.push(set.to_json());
            }
            return Ok(());
        };

        let kind = attribute.attr("Type").unwrap_or_default().to_string();
        let (field, element) = match kind.as_str() {
            "public definition" if self.public_definition.is_none() => {
                self.public_definition = attribute.take_text();
                ("public_definition", None)
            }
            "GeneReviews short" if self.gene_reviews_short.is_none() => {
                self.gene_reviews_short = attribute.take_text();
                ("gene_reviews_short", None)
            }
            "mode of inheritance" if self.mode_of_inheritance.is_none() => {
                self.mode_of_inheritance = attribute.take_text();
                ("mode_of_inheritance", None)
            }
            "GARD id" if self.gard_id.is_none() => {
                self.gard_id = attribute
                    .take_attr("integerValue")
                    .or_else(|| attribute.take_text());
                ("gard_id", None)
            }
            "disease mechanism" if self.disease_mechanism.is_none() => {
                self.disease_mechanism = attribute.take_text();
                self.disease_mechanism_id = attribute.take_attr("integerValue");
                ("disease_mechanism", None)
            }
            "keyword" => {
                let keyword = attribute.take_text();
                self.keywords.extend(keyword.clone());
                ("keywords", keyword)
            }
            "Genetics Home Reference (GHR) links" => {
                let link = attribute.take_text();
                self.ghr_links.extend(link.clone());
                ("ghr_links", link)
            }
            _ => {
                self.xrefs.extend(take_xrefs(&mut set, None, None));
                set.push_child("Attribute", attribute);
                self.attribute_content.push(set.to_json());
                return Ok(());
            }
        };

        self.xrefs
            .extend(take_xrefs(&mut set, Some(field), element.as_deref()));

        // @Type is still on the attribute
        if attribute.len() > 1 || !set.is_empty() {
            set.push_child("Attribute", attribute);
            self.attribute_content.push(set.to_json());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraitSet {
    pub id: String,
    #[serde(rename = "type")]
    pub trait_set_type: Option<String>,
    pub trait_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub traits: Vec<Trait>,
    pub content: Option<Value>,
}

impl TraitSet {
    pub fn from_xml(mut node: XmlNode, context: &str) -> Result<Self> {
        let id = node.take_attr("ID").ok_or_else(|| {
            IngestError::UnknownShape(format!("TraitSet without ID in {}", context))
        })?;
        let traits = node
            .take_list("Trait")
            .into_iter()
            .map(|t| Trait::from_xml(t, context))
            .collect::<Result<Vec<_>>>()?;

        Ok(TraitSet {
            id,
            trait_set_type: node.take_attr("Type"),
            trait_ids: traits.iter().map(|t| t.id.clone()).collect(),
            traits,
            content: node.into_content(),
        })
    }
}

/// Link from a submitted trait description to a MedGen concept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraitMapping {
    pub clinical_assertion_id: String,
    pub trait_type: String,
    pub mapping_type: String,
    pub mapping_value: String,
    pub mapping_ref: String,
    pub medgen_id: Option<String>,
    pub medgen_name: Option<String>,
}

impl TraitMapping {
    pub fn from_xml(mut node: XmlNode, context: &str) -> Result<Self> {
        let mut required = |name: &str| {
            node.take_attr(name).ok_or_else(|| {
                IngestError::UnknownShape(format!("TraitMapping without {} in {}", name, context))
            })
        };
        let clinical_assertion_id = required("ClinicalAssertionID")?;
        let trait_type = required("TraitType")?;
        let mapping_type = required("MappingType")?;
        let mapping_value = required("MappingValue")?;
        let mapping_ref = required("MappingRef")?;

        let (medgen_id, medgen_name) = match node.take_one("MedGen", context)? {
            Some(mut medgen) => (medgen.take_attr("CUI"), medgen.take_attr("Name")),
            None => (None, None),
        };

        Ok(TraitMapping {
            clinical_assertion_id,
            trait_type,
            mapping_type,
            mapping_value,
            mapping_ref,
            medgen_id,
            medgen_name,
        })
    }

    ///
    /// Whether this mapping describes the given submitted trait.
    ///
    /// # Arguments
    /// - assertion_id: internal `ID` of the submitting assertion
    /// - trait_type: the trait's `Type`
    /// - name: the trait's preferred name
    /// - xrefs: the trait's cross-references
    ///
    pub fn matches(&self, assertion_id: &str, trait_type: &str, name: Option<&str>, xrefs: &[XRef]) -> bool {
        if self.clinical_assertion_id != assertion_id || !self.trait_type.eq_ignore_ascii_case(trait_type) {
            return false;
        }
        match self.mapping_type.as_str() {
            "Name" => self.mapping_ref == "Preferred" && name == Some(self.mapping_value.as_str()),
            "XRef" => xrefs
                .iter()
                .any(|x| x.db == self.mapping_ref && x.id == self.mapping_value),
            _ => false,
        }
    }
}

/// What a submitted trait needs to know about its assertion.
#[derive(Debug, Clone, Copy)]
pub struct TraitContext<'a> {
    /// Accession, the prefix of generated ids.
    pub accession: &'a str,
    /// Internal `ID`, the key trait mappings refer to.
    pub internal_id: Option<&'a str>,
    pub mappings: &'a [TraitMapping],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicalAssertionTrait {
    pub id: String,
    #[serde(rename = "type")]
    pub trait_type: Option<String>,
    pub name: Option<String>,
    pub alternate_names: Vec<String>,
    pub symbol: Option<String>,
    pub alternate_symbols: Vec<String>,
    pub medgen_id: Option<String>,
    /// Link to the normalized trait. Never resolved.
    pub trait_id: Option<String>,
    pub xrefs: Vec<XRef>,
    pub content: Option<Value>,
}

impl ClinicalAssertionTrait {
    pub fn from_xml(mut node: XmlNode, id: String, ctx: &TraitContext) -> Result<Self> {
        let names = take_element_values(&mut node, "Name", ("name", "alternate_names"), &id)?;
        let symbols = take_element_values(&mut node, "Symbol", ("symbol", "alternate_symbols"), &id)?;
        let trait_type = node.take_attr("Type");

        let mut xrefs = names.xrefs;
        xrefs.extend(symbols.xrefs);

        // attributes stay in content, their xrefs do not
        for mut set in node.take_list("AttributeSet") {
            xrefs.extend(take_xrefs(&mut set, None, None));
            if !set.is_empty() {
                node.push_child("AttributeSet", set);
            }
        }

        let own_xrefs = take_xrefs(&mut node, None, None);
        let mut medgen_id = first_medgen(&own_xrefs);
        xrefs.extend(own_xrefs);

        if medgen_id.is_none() {
            medgen_id = match (ctx.internal_id, trait_type.as_deref()) {
                (Some(assertion_id), Some(t)) => ctx
                    .mappings
                    .iter()
                    .find(|m| m.matches(assertion_id, t, names.preferred.as_deref(), &xrefs))
                    .and_then(|m| m.medgen_id.clone()),
                _ => None,
            };
            if medgen_id.is_none() {
                debug!("No MedGen concept for submitted trait {}", id);
            }
        }

        Ok(ClinicalAssertionTrait {
            id,
            trait_type,
            name: names.preferred,
            alternate_names: names.alternates,
            symbol: symbols.preferred,
            alternate_symbols: symbols.alternates,
            medgen_id,
            trait_id: None,
            xrefs,
            content: node.into_content(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicalAssertionTraitSet {
    pub id: String,
    #[serde(rename = "type")]
    pub trait_set_type: Option<String>,
    pub trait_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub traits: Vec<ClinicalAssertionTrait>,
    pub content: Option<Value>,
}

impl ClinicalAssertionTraitSet {
    ///
    /// Build a submitted trait set. Traits are numbered `{accession}.{n}` from
    /// `counter`, which is shared by every trait set of the same assertion.
    ///
    pub fn from_xml(mut node: XmlNode, id: String, ctx: &TraitContext, counter: &mut usize) -> Result<Self> {
        let mut traits = Vec::new();
        for t in node.take_list("Trait") {
            let trait_id = format!("{}.{}", ctx.accession, counter);
            *counter += 1;
            traits.push(ClinicalAssertionTrait::from_xml(t, trait_id, ctx)?);
        }

        Ok(ClinicalAssertionTraitSet {
            id,
            trait_set_type: node.take_attr("Type"),
            trait_ids: traits.iter().map(|t| t.id.clone()).collect(),
            traits,
            content: node.into_content(),
        })
    }
}

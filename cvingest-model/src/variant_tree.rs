//! Genotype ⊃ Haplotype ⊃ SimpleAllele hierarchy handling.
//!
//! Two algorithms live here:
//!
//! - [DescendantTree] mirrors the nesting of an archived variation by its
//!   `VariationID`s and projects direct children and full descendants from it.
//! - [assign_submission_ids] numbers the private variant tree of one submission
//!   (`{assertion_id}.{n}`) in pre-order with a single counter.

use cvingest_core::{IngestError, Result, XmlNode};
use serde::ser::{Serialize, SerializeSeq, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum VariantKind {
    SimpleAllele,
    Haplotype,
    Genotype,
}

impl VariantKind {
    pub const ALL: [VariantKind; 3] = [
        VariantKind::SimpleAllele,
        VariantKind::Haplotype,
        VariantKind::Genotype,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            VariantKind::SimpleAllele => "SimpleAllele",
            VariantKind::Haplotype => "Haplotype",
            VariantKind::Genotype => "Genotype",
        }
    }
}

/// A variant element lifted out of its container.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantNode {
    pub kind: VariantKind,
    pub node: XmlNode,
}

/// Reject a Genotype next to anything else on the same level.
fn check_level(simple: usize, haplo: usize, geno: usize, context: &str) -> Result<()> {
    if geno > 1 {
        return Err(IngestError::cardinality(context, "Genotype"));
    }
    if geno == 1 && (simple > 0 || haplo > 0) {
        return Err(IngestError::cardinality(
            context,
            "Genotype alongside SimpleAllele/Haplotype",
        ));
    }
    Ok(())
}

/// Variant children of `container`, without consuming them.
pub fn variant_children<'a>(container: &'a XmlNode, context: &str) -> Result<Vec<(VariantKind, &'a XmlNode)>> {
    let simple = container.children(VariantKind::SimpleAllele.tag());
    let haplo = container.children(VariantKind::Haplotype.tag());
    let geno = container.children(VariantKind::Genotype.tag());
    check_level(simple.len(), haplo.len(), geno.len(), context)?;

    let mut children = Vec::with_capacity(simple.len() + haplo.len() + geno.len());
    children.extend(simple.into_iter().map(|n| (VariantKind::SimpleAllele, n)));
    children.extend(haplo.into_iter().map(|n| (VariantKind::Haplotype, n)));
    children.extend(geno.into_iter().map(|n| (VariantKind::Genotype, n)));
    Ok(children)
}

/// Remove and return the variant children of `container`.
pub fn take_variant_nodes(container: &mut XmlNode, context: &str) -> Result<Vec<VariantNode>> {
    // validate before consuming anything
    variant_children(container, context)?;

    let mut nodes = Vec::new();
    for kind in VariantKind::ALL {
        nodes.extend(
            container
                .take_list(kind.tag())
                .into_iter()
                .map(|node| VariantNode { kind, node }),
        );
    }
    Ok(nodes)
}

///
/// Nested ids of a variation and everything below it.
///
/// Serializes as the list-of-lists form `[id, [child, ...], ...]`.
///
#[derive(Debug, Clone, PartialEq)]
pub struct DescendantTree {
    pub id: String,
    pub children: Vec<DescendantTree>,
}

impl DescendantTree {
    ///
    /// Build the tree for a variant node.
    ///
    /// # Arguments
    /// - node: a `SimpleAllele`, `Haplotype` or `Genotype` element
    /// - context: accession used in error messages
    ///
    pub fn build(node: &XmlNode, context: &str) -> Result<Self> {
        let id = node.attr("VariationID").ok_or_else(|| {
            IngestError::UnknownShape(format!("variant without VariationID in {}", context))
        })?;
        let children = variant_children(node, context)?
            .into_iter()
            .map(|(_, child)| DescendantTree::build(child, context))
            .collect::<Result<Vec<_>>>()?;
        Ok(DescendantTree {
            id: id.to_string(),
            children,
        })
    }

    /// Ids of the immediate children.
    pub fn get_all_children(&self) -> Vec<String> {
        self.children.iter().map(|c| c.id.clone()).collect()
    }

    /// Ids of every node below the root: direct children first, then each child's descendants.
    pub fn get_all_descendants(&self) -> Vec<String> {
        let mut ids = self.get_all_children();
        for child in &self.children {
            ids.extend(child.get_all_descendants());
        }
        ids
    }
}

impl Serialize for DescendantTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.children.len() + 1))?;
        seq.serialize_element(&self.id)?;
        for child in &self.children {
            seq.serialize_element(child)?;
        }
        seq.end()
    }
}

/// One node of a submission's variant tree after id assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedVariantNode {
    pub id: String,
    pub kind: VariantKind,
    pub child_ids: Vec<String>,
    pub descendant_ids: Vec<String>,
    /// The element with its variant children removed.
    pub node: XmlNode,
}

struct IdAssigner<'a> {
    assertion_id: &'a str,
    counter: usize,
    out: Vec<SubmittedVariantNode>,
}

impl IdAssigner<'_> {
    fn visit(&mut self, variant: VariantNode) -> Result<usize> {
        let id = format!("{}.{}", self.assertion_id, self.counter);
        self.counter += 1;

        let mut node = variant.node;
        let children = take_variant_nodes(&mut node, self.assertion_id)?;

        let index = self.out.len();
        self.out.push(SubmittedVariantNode {
            id,
            kind: variant.kind,
            child_ids: Vec::new(),
            descendant_ids: Vec::new(),
            node,
        });

        let child_indices = children
            .into_iter()
            .map(|child| self.visit(child))
            .collect::<Result<Vec<_>>>()?;

        let child_ids: Vec<String> = child_indices.iter().map(|&i| self.out[i].id.clone()).collect();
        // one level down only
        let mut descendant_ids = child_ids.clone();
        for &i in &child_indices {
            descendant_ids.extend(self.out[i].child_ids.iter().cloned());
        }

        let entry = &mut self.out[index];
        entry.child_ids = child_ids;
        entry.descendant_ids = descendant_ids;
        Ok(index)
    }
}

///
/// Number a submission's variant tree in pre-order.
///
/// Ids are `{assertion_id}.{n}` from one counter shared by the whole traversal, so a
/// parent always has a lower number than anything below it. The returned list is in
/// the same pre-order.
///
pub fn assign_submission_ids(root: VariantNode, assertion_id: &str) -> Result<Vec<SubmittedVariantNode>> {
    let mut assigner = IdAssigner {
        assertion_id,
        counter: 0,
        out: Vec::new(),
    };
    assigner.visit(root)?;
    Ok(assigner.out)
}

//! Locating the bonds that must be severed to recover monomer-scale
//! fragments from a reacted product

use ahash::{HashSet, HashSetExt};
use derive_more::Display;
use itertools::Itertools;
use molgraph::{AtomId, BondChange, BondId, Molecule, paths};

use crate::errors::{Result, RetortError};

/// A strategy for identifying inter-monomer bonds in a reaction product
pub trait FragmentationStrategy {
    /// Every bond the strategy would cut, possibly listing some more than
    /// once when they are reachable along several routes
    fn candidate_cut_bonds(&self, product: &Molecule) -> Vec<BondId>;

    /// The candidate bonds with duplicates removed, in first-seen order.
    /// Cutting is only defined over a duplicate-free set, so this is the
    /// method consumers should call.
    fn locate_cut_bonds(&self, product: &Molecule) -> Vec<BondId> {
        let mut seen = HashSet::new();
        self.candidate_cut_bonds(product)
            .into_iter()
            .filter(|&bond| seen.insert(bond))
            .collect()
    }

    /// Sever every located bond and return the resulting fragments,
    /// unsanitized; callers decide when to re-normalize them
    fn produce_fragments(&self, product: &Molecule) -> Result<Vec<Molecule>> {
        let cuts = self.locate_cut_bonds(product);
        paths::cut_bonds(product, &cuts).map_err(Into::into)
    }
}

/// Cuts every newly formed bond found on a shortest path between two former
/// attachment points: exactly the bonds that joined previously separate
/// monomers at their template-designated ports
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct ReseparateAtFormerAttachmentPoints;

fn attachment_atoms(product: &Molecule) -> Vec<AtomId> {
    product
        .atoms()
        .filter(|&id| {
            let atom = product.atom(id);
            atom.former_attachment && atom.atomic_num > 1
        })
        .collect()
}

impl FragmentationStrategy for ReseparateAtFormerAttachmentPoints {
    fn candidate_cut_bonds(&self, product: &Molecule) -> Vec<BondId> {
        let mut candidates = Vec::new();
        for pair in attachment_atoms(product).into_iter().combinations(2) {
            let Some(path) = paths::shortest_bond_path(product, pair[0], pair[1]) else {
                continue;
            };
            for bond in path {
                if product.bond(bond).change == Some(BondChange::Formed) {
                    candidates.push(bond);
                }
            }
        }
        candidates
    }
}

/// Every fragmentation strategy this crate knows about. The set is closed:
/// variants are registered here at compile time, not discovered at runtime.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
pub enum KnownStrategy {
    #[display("reseparate_at_former_attachment_points")]
    ReseparateAtFormerAttachmentPoints,
}

impl KnownStrategy {
    pub const ALL: [Self; 1] = [Self::ReseparateAtFormerAttachmentPoints];

    pub fn lookup(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.to_string() == name)
            .ok_or_else(|| RetortError::strategy_lookup(name))
    }
}

impl FragmentationStrategy for KnownStrategy {
    fn candidate_cut_bonds(&self, product: &Molecule) -> Vec<BondId> {
        match self {
            Self::ReseparateAtFormerAttachmentPoints => {
                ReseparateAtFormerAttachmentPoints.candidate_cut_bonds(product)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::reactor::{ReactOptions, Reactor};
    use crate::schema::ReactionSchema;

    use super::*;

    const ESTERIFICATION: &str =
        "[*:1][C:2](=[O:3])[OH:4].[*:5][OH:6]>>[*:1][C:2](=[O:3])[O:6][*:5]";

    fn ester_product() -> Molecule {
        let reactor = Reactor::new(ReactionSchema::from_smarts(ESTERIFICATION).unwrap());
        let reactants = [
            Molecule::from_smiles("CC(=O)O").unwrap(),
            Molecule::from_smiles("CO").unwrap(),
        ];
        reactor
            .react(&reactants, &ReactOptions::default())
            .unwrap()
            .remove(0)
    }

    #[test]
    fn locates_the_newly_formed_bond() {
        let product = ester_product();
        let strategy = ReseparateAtFormerAttachmentPoints;
        let cuts = strategy.locate_cut_bonds(&product);
        assert_eq!(cuts.len(), 1);
        assert_eq!(product.bond(cuts[0]).change, Some(BondChange::Formed));
    }

    #[test]
    fn cut_location_is_idempotent() {
        let product = ester_product();
        let strategy = ReseparateAtFormerAttachmentPoints;
        let first = strategy.locate_cut_bonds(&product);
        let second = strategy.locate_cut_bonds(&product);
        assert_eq!(first, second);
        assert_eq!(
            first.iter().collect::<HashSet<_>>().len(),
            first.len(),
            "no bond may be listed twice"
        );
    }

    #[test]
    fn fragments_reseparate_the_monomer_skeletons() {
        let product = ester_product();
        let fragments = ReseparateAtFormerAttachmentPoints
            .produce_fragments(&product)
            .unwrap();
        assert_eq!(fragments.len(), 2);
        let mut sizes: Vec<_> = fragments.iter().map(Molecule::heavy_atom_count).collect();
        sizes.sort_unstable();
        // Acetyl-derived piece and the methanol-derived piece
        assert_eq!(sizes, vec![2, 3]);
    }

    #[test]
    fn products_without_attachments_stay_whole() {
        let plain = Molecule::from_smiles("CCO").unwrap();
        let fragments = ReseparateAtFormerAttachmentPoints
            .produce_fragments(&plain)
            .unwrap();
        assert_eq!(fragments.len(), 1);
    }

    #[test]
    fn registry_lookup() {
        assert_eq!(
            KnownStrategy::lookup("reseparate_at_former_attachment_points").unwrap(),
            KnownStrategy::ReseparateAtFormerAttachmentPoints
        );
        assert!(matches!(
            KnownStrategy::lookup("cleave_everything"),
            Err(RetortError::StrategyLookup { .. })
        ));
    }

    #[test]
    fn registry_variant_behaves_like_its_strategy() {
        let product = ester_product();
        assert_eq!(
            KnownStrategy::ReseparateAtFormerAttachmentPoints.locate_cut_bonds(&product),
            ReseparateAtFormerAttachmentPoints.locate_cut_bonds(&product)
        );
    }
}

//! Mapped reaction templates and the bond-provenance bookkeeping derived
//! from them

use ahash::{HashMap, HashSet};
use itertools::Itertools;
use molgraph::{AtomId, BondChange, BondId, BondOrder, Pattern, paths};

use crate::errors::{Result, RetortError};

/// A mapped reaction template: ordered reactant and product patterns whose
/// shared atom-map numbers tie product atoms back to the reactants they came
/// from. All provenance bookkeeping is derived once at construction; the
/// schema is immutable afterwards, so sharing it between concurrent readers
/// is sound by construction.
#[derive(Clone, Debug)]
pub struct ReactionSchema {
    name: String,
    reactants: Vec<Pattern>,
    agents: Vec<Pattern>,
    products: Vec<Pattern>,
    map_to_reactant: HashMap<u32, usize>,
    map_to_product: HashMap<u32, usize>,
    /// Map numbers whose bonding environment, charge, or presence changes
    /// across the reaction, sorted for deterministic iteration
    reacting_map_nums: Vec<u32>,
    /// Map numbers whose reactant-template atom is a wildcard attachment
    wildcard_map_nums: HashSet<u32>,
    product_infos: Vec<ProductBondInfo>,
}

/// Which bonds of one product template participate in the reaction, keyed by
/// template bond with the pair of atom-map numbers it connects. The two
/// partitions are exhaustive and exclusive over bonds between reactive atoms.
#[derive(Clone, Debug, Default)]
pub struct ProductBondInfo {
    pub product_index: usize,
    pub reactive_atom_map_nums: Vec<u32>,
    /// Bonds whose endpoints trace to *different* reactant templates
    pub formed_bonds: HashMap<BondId, (u32, u32)>,
    /// Bonds whose endpoints trace to the *same* reactant template
    pub modified_bonds: HashMap<BondId, (u32, u32)>,
}

impl ProductBondInfo {
    /// Classify the bond between two mapped product atoms, if it is one of
    /// the bonds this reaction touches
    #[must_use]
    pub fn classify(&self, a: u32, b: u32) -> Option<BondChange> {
        let key = normalize(a, b);
        let touched = |bonds: &HashMap<BondId, (u32, u32)>| {
            bonds.values().any(|&(x, y)| normalize(x, y) == key)
        };
        if touched(&self.formed_bonds) {
            Some(BondChange::Formed)
        } else if touched(&self.modified_bonds) {
            Some(BondChange::Modified)
        } else {
            None
        }
    }
}

const fn normalize(a: u32, b: u32) -> (u32, u32) {
    if a <= b { (a, b) } else { (b, a) }
}

impl ReactionSchema {
    /// Parse a mapped reaction SMARTS string (`reactants>agents>products`,
    /// with `>>` for the common agentless case)
    pub fn from_smarts(text: &str) -> Result<Self> {
        let parts: Vec<_> = text.split('>').collect();
        let [reactants, agents, products] = parts.as_slice() else {
            return Err(RetortError::malformed_reaction_smarts(text));
        };

        let parse_side = |side: &str| -> Result<Vec<Pattern>> {
            side.split('.')
                .filter(|part| !part.is_empty())
                .map(|part| Pattern::from_smarts(part).map_err(Into::into))
                .collect()
        };

        Self::from_templates(parse_side(reactants)?, parse_side(agents)?, parse_side(products)?)
    }

    /// Build a schema directly from already-parsed templates
    pub fn from_templates(
        reactants: Vec<Pattern>,
        agents: Vec<Pattern>,
        products: Vec<Pattern>,
    ) -> Result<Self> {
        if reactants.is_empty() {
            return Err(RetortError::EmptyTemplates { side: "reactant" });
        }
        if products.is_empty() {
            return Err(RetortError::EmptyTemplates { side: "product" });
        }

        let map_to_reactant = map_index(&reactants, "reactant")?;
        let map_to_product = map_index(&products, "product")?;

        let reacting_map_nums =
            derive_reacting_map_nums(&reactants, &products, &map_to_reactant, &map_to_product);

        let wildcard_map_nums = reactants
            .iter()
            .flat_map(|template| {
                template.atoms().filter_map(|id| {
                    let atom = template.atom(id);
                    (atom.is_wildcard() && atom.map_num != 0).then_some(atom.map_num)
                })
            })
            .collect();

        let product_infos = products
            .iter()
            .enumerate()
            .map(|(product_index, template)| {
                derive_product_info(
                    product_index,
                    template,
                    &reacting_map_nums,
                    &map_to_reactant,
                )
            })
            .collect();

        Ok(Self {
            name: String::new(),
            reactants,
            agents,
            products,
            map_to_reactant,
            map_to_product,
            reacting_map_nums,
            wildcard_map_nums,
            product_infos,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[must_use]
    pub fn reactant_count(&self) -> usize {
        self.reactants.len()
    }

    #[must_use]
    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    #[must_use]
    pub fn reactants(&self) -> &[Pattern] {
        &self.reactants
    }

    #[must_use]
    pub fn agents(&self) -> &[Pattern] {
        &self.agents
    }

    #[must_use]
    pub fn products(&self) -> &[Pattern] {
        &self.products
    }

    #[must_use]
    pub fn product_info(&self, product_index: usize) -> &ProductBondInfo {
        &self.product_infos[product_index]
    }

    #[must_use]
    pub fn reacting_map_nums(&self) -> &[u32] {
        &self.reacting_map_nums
    }

    /// Which reactant template a map number originates from
    #[must_use]
    pub fn reactant_of_map(&self, map_num: u32) -> Option<usize> {
        self.map_to_reactant.get(&map_num).copied()
    }

    #[must_use]
    pub fn product_of_map(&self, map_num: u32) -> Option<usize> {
        self.map_to_product.get(&map_num).copied()
    }

    #[must_use]
    pub(crate) fn is_attachment_map(&self, map_num: u32) -> bool {
        self.wildcard_map_nums.contains(&map_num)
    }

    /// Export as mapped reaction SMARTS
    #[must_use]
    pub fn to_smarts(&self) -> String {
        let side = |templates: &[Pattern]| templates.iter().map(Pattern::to_smarts).join(".");
        format!(
            "{}>{}>{}",
            side(&self.reactants),
            side(&self.agents),
            side(&self.products)
        )
    }

    /// Export as mapped SMILES. The template model carries no query-only
    /// syntax beyond what `to_smarts` already emits, so the renditions agree.
    #[must_use]
    pub fn to_smiles(&self) -> String {
        self.to_smarts()
    }
}

fn map_index(templates: &[Pattern], side: &'static str) -> Result<HashMap<u32, usize>> {
    let mut index = HashMap::default();
    for (template_index, template) in templates.iter().enumerate() {
        for id in template.atoms() {
            let map_num = template.atom(id).map_num;
            if map_num == 0 {
                continue;
            }
            if index.insert(map_num, template_index).is_some() {
                return Err(RetortError::DuplicateMapNumber { map_num, side });
            }
        }
    }
    Ok(index)
}

/// A mapped atom is "reacting" when its presence, charge constraint, or
/// bonding environment towards other mapped atoms differs between the
/// reactant and product sides
fn derive_reacting_map_nums(
    reactants: &[Pattern],
    products: &[Pattern],
    map_to_reactant: &HashMap<u32, usize>,
    map_to_product: &HashMap<u32, usize>,
) -> Vec<u32> {
    let mut reacting: Vec<u32> = map_to_reactant
        .iter()
        .filter(|&(&map_num, &template_index)| {
            let reactant = &reactants[template_index];
            let Some(&product_index) = map_to_product.get(&map_num) else {
                // Consumed by a leaving group
                return true;
            };
            let product = &products[product_index];

            // SAFETY: the map indices were derived from these exact templates
            let r_atom = atom_with_map(reactant, map_num).unwrap();
            let p_atom = atom_with_map(product, map_num).unwrap();

            reactant.atom(r_atom).charge != product.atom(p_atom).charge
                || mapped_environment(reactant, r_atom) != mapped_environment(product, p_atom)
        })
        .map(|(&map_num, _)| map_num)
        .collect();
    reacting.sort_unstable();
    reacting
}

fn atom_with_map(template: &Pattern, map_num: u32) -> Option<AtomId> {
    template.atoms().find(|&id| template.atom(id).map_num == map_num)
}

/// The (map number, bond order) multiset an atom sees among its mapped
/// neighbors, sorted for comparison
fn mapped_environment(template: &Pattern, atom: AtomId) -> Vec<(u32, Option<BondOrder>)> {
    let mut environment: Vec<_> = template
        .bonds_of(atom)
        .filter_map(|bond| {
            let neighbor = template.other_end(bond, atom);
            let map_num = template.atom(neighbor).map_num;
            (map_num != 0).then(|| (map_num, template.bond(bond).order))
        })
        .collect();
    environment.sort_unstable();
    environment
}

fn derive_product_info(
    product_index: usize,
    template: &Pattern,
    reacting_map_nums: &[u32],
    map_to_reactant: &HashMap<u32, usize>,
) -> ProductBondInfo {
    let present: HashSet<u32> = template
        .atoms()
        .map(|id| template.atom(id).map_num)
        .filter(|&m| m != 0)
        .collect();
    let reactive_atom_map_nums: Vec<u32> = reacting_map_nums
        .iter()
        .copied()
        .filter(|m| present.contains(m))
        .collect();

    let reactive_atoms: Vec<AtomId> = template
        .atoms()
        .filter(|&id| reactive_atom_map_nums.contains(&template.atom(id).map_num))
        .collect();

    let mut info = ProductBondInfo {
        product_index,
        reactive_atom_map_nums,
        ..ProductBondInfo::default()
    };

    for (bond, (a, b)) in paths::bonds_between(template, &reactive_atoms) {
        let pair = (template.atom(a).map_num, template.atom(b).map_num);
        // Reacting atoms always trace back to a reactant template: map
        // numbers found only on the product side are never marked reacting
        let same_reactant = map_to_reactant[&pair.0] == map_to_reactant[&pair.1];
        if same_reactant {
            info.modified_bonds.insert(bond, pair);
        } else {
            info.formed_bonds.insert(bond, pair);
        }
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    const ESTERIFICATION: &str =
        "[*:1][C:2](=[O:3])[OH:4].[*:5][OH:6]>>[*:1][C:2](=[O:3])[O:6][*:5]";

    #[test]
    fn template_counts() {
        let schema = ReactionSchema::from_smarts(ESTERIFICATION).unwrap();
        assert_eq!(schema.reactant_count(), 2);
        assert_eq!(schema.product_count(), 1);
        assert!(schema.agents().is_empty());
    }

    #[test]
    fn map_provenance() {
        let schema = ReactionSchema::from_smarts(ESTERIFICATION).unwrap();
        for map_num in [1, 2, 3, 4] {
            assert_eq!(schema.reactant_of_map(map_num), Some(0));
        }
        for map_num in [5, 6] {
            assert_eq!(schema.reactant_of_map(map_num), Some(1));
        }
        // The hydroxyl oxygen leaves; it has no product home
        assert_eq!(schema.product_of_map(4), None);
    }

    #[test]
    fn reacting_atoms() {
        let schema = ReactionSchema::from_smarts(ESTERIFICATION).unwrap();
        // The carbonyl carbon (2) swaps an oxygen, the leaving hydroxyl (4)
        // disappears, and the alcohol oxygen (6) gains a bond
        assert_eq!(schema.reacting_map_nums(), &[2, 4, 6]);
    }

    #[test]
    fn bond_classification() {
        let schema = ReactionSchema::from_smarts(ESTERIFICATION).unwrap();
        let info = schema.product_info(0);
        assert_eq!(info.reactive_atom_map_nums, vec![2, 6]);
        assert_eq!(info.formed_bonds.len(), 1);
        assert!(info.modified_bonds.is_empty());
        assert_eq!(info.classify(2, 6), Some(BondChange::Formed));
        assert_eq!(info.classify(6, 2), Some(BondChange::Formed));
        assert_eq!(info.classify(2, 3), None);
    }

    #[test]
    fn modified_bonds_stay_within_one_reactant() {
        // Keto-enol style shift inside a single reactant
        let schema = ReactionSchema::from_smarts("[C:1]=[O:2]>>[C:1][O:2]").unwrap();
        let info = schema.product_info(0);
        assert_eq!(info.modified_bonds.len(), 1);
        assert!(info.formed_bonds.is_empty());
        assert_eq!(info.classify(1, 2), Some(BondChange::Modified));
    }

    #[test]
    fn classification_is_exclusive() {
        let schema = ReactionSchema::from_smarts(ESTERIFICATION).unwrap();
        let info = schema.product_info(0);
        let formed: HashSet<_> = info.formed_bonds.keys().copied().collect();
        let modified: HashSet<_> = info.modified_bonds.keys().copied().collect();
        assert!(formed.is_disjoint(&modified));
    }

    #[test]
    fn attachment_maps() {
        let schema = ReactionSchema::from_smarts(ESTERIFICATION).unwrap();
        assert!(schema.is_attachment_map(1));
        assert!(schema.is_attachment_map(5));
        assert!(!schema.is_attachment_map(2));
    }

    #[test]
    fn duplicate_map_numbers_are_rejected() {
        let result = ReactionSchema::from_smarts("[C:1][C:1]>>[C:1][C:1]");
        assert!(matches!(
            result,
            Err(RetortError::DuplicateMapNumber { map_num: 1, side: "reactant" })
        ));
    }

    #[test]
    fn malformed_text_is_rejected() {
        assert!(ReactionSchema::from_smarts("no arrows here").is_err());
        assert!(ReactionSchema::from_smarts("[C:1]>>").is_err());
        assert!(ReactionSchema::from_smarts(">>[C:1]").is_err());
        assert!(ReactionSchema::from_smarts("[C:1]>>[C:1]>>[C:1]").is_err());
        assert!(ReactionSchema::from_smarts("[C:1](>>[C:1]").is_err());
    }

    #[test]
    fn smarts_round_trip_preserves_structure() {
        let schema = ReactionSchema::from_smarts(ESTERIFICATION).unwrap();
        let rewritten = schema.to_smarts();
        let reparsed = ReactionSchema::from_smarts(&rewritten).unwrap();

        assert_eq!(reparsed.reactant_count(), schema.reactant_count());
        assert_eq!(reparsed.product_count(), schema.product_count());
        assert_eq!(reparsed.reacting_map_nums(), schema.reacting_map_nums());

        let (a, b) = (schema.product_info(0), reparsed.product_info(0));
        let pairs = |bonds: &HashMap<BondId, (u32, u32)>| {
            bonds.values().map(|&(x, y)| normalize(x, y)).sorted().collect::<Vec<_>>()
        };
        assert_eq!(pairs(&a.formed_bonds), pairs(&b.formed_bonds));
        assert_eq!(pairs(&a.modified_bonds), pairs(&b.modified_bonds));
    }

    #[test]
    fn agents_are_carried_through() {
        let schema = ReactionSchema::from_smarts("[C:1]=[C:2]>[Fe]>[C:1][C:2]").unwrap();
        assert_eq!(schema.agents().len(), 1);
        assert!(schema.to_smarts().contains(">[Fe]>"));
    }
}
